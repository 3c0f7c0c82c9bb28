//! 属性聚合器
//!
//! 合并顺序（后者覆盖前者）：
//! 环境属性（兜底模式）→ 声明属性与属性文件 → 加载器注入的属性 → 环境属性（覆盖模式）。
//! 其他持有者的本地属性在此之上按 `other_holder_override` 合并。

use crate::providers::parse_property_file;
use crate::selector::SelectorResolver;
use config_abstractions::{PropertyHolder, PropertySet, ResourceLocator, SystemPropertiesMode};
use configurator_common::{ConfigError, ConfigResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 属性聚合器
pub struct PropertyAggregator {
    name: String,
    mode: SystemPropertiesMode,
    local_override: bool,
    other_holder_override: bool,
    resolver: Option<Arc<SelectorResolver>>,
    environment: Option<PropertySet>,
    declared: RwLock<PropertySet>,
    locations: RwLock<Vec<String>>,
    location_selectors: RwLock<Vec<String>>,
    injected: RwLock<PropertySet>,
    others: RwLock<Vec<Arc<dyn PropertyHolder>>>,
    cached_all: RwLock<Option<PropertySet>>,
    cached_local: RwLock<Option<PropertySet>>,
}

impl PropertyAggregator {
    /// 创建聚合器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: SystemPropertiesMode::Fallback,
            local_override: false,
            other_holder_override: true,
            resolver: None,
            environment: None,
            declared: RwLock::new(PropertySet::new()),
            locations: RwLock::new(Vec::new()),
            location_selectors: RwLock::new(Vec::new()),
            injected: RwLock::new(PropertySet::new()),
            others: RwLock::new(Vec::new()),
            cached_all: RwLock::new(None),
            cached_local: RwLock::new(None),
        }
    }

    /// 设置环境属性的合并位置
    pub fn with_system_properties_mode(mut self, mode: SystemPropertiesMode) -> Self {
        self.mode = mode;
        self
    }

    /// 设置声明属性是否覆盖属性文件
    pub fn with_local_override(mut self, local_override: bool) -> Self {
        self.local_override = local_override;
        self
    }

    /// 设置其他持有者是否覆盖本地属性
    pub fn with_other_holder_override(mut self, other_override: bool) -> Self {
        self.other_holder_override = other_override;
        self
    }

    /// 设置用于定位属性文件的解析器
    pub fn with_resolver(mut self, resolver: Arc<SelectorResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// 使用固定的环境属性代替进程环境变量
    pub fn with_environment(mut self, environment: PropertySet) -> Self {
        self.environment = Some(environment);
        self
    }

    /// 声明单个属性
    pub fn add_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.declared.write().insert(key, value);
        self.reset_cache();
    }

    /// 声明一组属性
    pub fn add_properties(&self, properties: &PropertySet) {
        self.declared.write().merge(properties);
        self.reset_cache();
    }

    /// 添加属性文件位置
    pub fn add_location(&self, location: impl Into<String>) {
        self.locations.write().push(location.into());
        self.reset_cache();
    }

    /// 添加属性文件选择器（只在内嵌空间中解析）
    pub fn add_location_selector(&self, selector: impl Into<String>) {
        self.location_selectors.write().push(selector.into());
        self.reset_cache();
    }

    /// 注入最终属性，优先于声明属性和属性文件
    pub fn inject_properties(&self, properties: &PropertySet) {
        if properties.is_empty() {
            return;
        }
        info!("注入属性: {} 个 -> {}", properties.len(), self.name);
        self.injected.write().merge(properties);
        self.reset_cache();
    }

    /// 添加其他持有者
    pub fn add_other_holder(&self, holder: Arc<dyn PropertyHolder>) {
        debug!("添加属性持有者: {} -> {}", holder.name(), self.name);
        self.others.write().push(holder);
        self.reset_cache();
    }

    /// 获取属性
    ///
    /// `include_other` 为 `false` 时只返回本地属性。
    pub fn properties(&self, include_other: bool) -> ConfigResult<PropertySet> {
        if !include_other {
            return self.cached_local_properties();
        }
        if let Some(cached) = self.cached_all.read().clone() {
            return Ok(cached);
        }

        let local = self.cached_local_properties()?;
        let mut others = PropertySet::new();
        for holder in self.others.read().iter() {
            others.merge(&holder.local_properties()?);
        }

        let merged = if self.other_holder_override {
            let mut merged = local;
            merged.merge(&others);
            merged
        } else {
            others.merge(&local);
            others
        };

        *self.cached_all.write() = Some(merged.clone());
        Ok(merged)
    }

    /// 预先计算并缓存属性
    pub fn cache_properties(&self) -> ConfigResult<()> {
        self.properties(true).map(|_| ())
    }

    /// 清空缓存
    pub fn reset_cache(&self) {
        *self.cached_all.write() = None;
        *self.cached_local.write() = None;
    }

    fn cached_local_properties(&self) -> ConfigResult<PropertySet> {
        if let Some(cached) = self.cached_local.read().clone() {
            return Ok(cached);
        }
        let local = self.compute_local_properties()?;
        *self.cached_local.write() = Some(local.clone());
        Ok(local)
    }

    fn compute_local_properties(&self) -> ConfigResult<PropertySet> {
        let environment = match self.mode {
            SystemPropertiesMode::Never => PropertySet::new(),
            _ => self.environment_properties(),
        };

        let mut result = PropertySet::new();
        if self.mode == SystemPropertiesMode::Fallback {
            result.merge(&environment);
        }

        let declared = self.declared.read().clone();
        let files = self.load_files()?;
        if self.local_override {
            result.merge(&files);
            result.merge(&declared);
        } else {
            result.merge(&declared);
            result.merge(&files);
        }

        result.merge(&self.injected.read());

        if self.mode == SystemPropertiesMode::Override {
            result.merge(&environment);
        }
        Ok(result)
    }

    fn environment_properties(&self) -> PropertySet {
        match &self.environment {
            Some(environment) => environment.clone(),
            None => std::env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .collect(),
        }
    }

    fn load_files(&self) -> ConfigResult<PropertySet> {
        let mut result = PropertySet::new();
        let locations = self.locations.read().clone();
        let selectors = self.location_selectors.read().clone();
        if locations.is_empty() && selectors.is_empty() {
            return Ok(result);
        }

        let resolver = self.resolver.as_ref().ok_or_else(|| {
            ConfigError::invalid_state(format!("属性聚合器 {} 未配置资源解析器", self.name))
        })?;

        for location in &locations {
            match resolver.locate(location)? {
                Some(handle) => {
                    let resource = handle.location().to_string();
                    let bytes = handle.read_all().map_err(|source| ConfigError::ResourceReadError {
                        resource: resource.clone(),
                        source,
                    })?;
                    result.merge(&parse_property_file(&resource, &bytes)?);
                }
                None => warn!("属性文件不存在，已跳过: {}", location),
            }
        }

        for selector in &selectors {
            if selector.trim().is_empty() {
                debug!("跳过空的属性文件选择器");
                continue;
            }
            for handle in resolver.select(selector, true, false)? {
                let resource = handle.location().to_string();
                let bytes = handle.read_all().map_err(|source| ConfigError::ResourceReadError {
                    resource: resource.clone(),
                    source,
                })?;
                result.merge(&parse_property_file(&resource, &bytes)?);
            }
        }
        Ok(result)
    }
}

impl PropertyHolder for PropertyAggregator {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_properties(&self) -> ConfigResult<PropertySet> {
        self.properties(false)
    }
}

impl std::fmt::Debug for PropertyAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyAggregator")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("local_override", &self.local_override)
            .field("other_holder_override", &self.other_holder_override)
            .finish_non_exhaustive()
    }
}
