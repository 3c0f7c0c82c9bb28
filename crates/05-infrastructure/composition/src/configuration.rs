//! 配置主入口

use crate::bootstrapper::{FailedResource, LoaderBootstrapper};
use crate::builder::ConfigurationBuilder;
use crate::holder::DelayedModuleHolder;
use config_abstractions::{
    CoreSettings, LoaderDefinition, PropertySet, ResourceHandle, ResourceOrigin, StreamSource,
};
use config_impl::{PropertyAggregator, SelectorResolver, TransformValidatePipeline};
use configurator_common::{
    is_reserved_identity, ConfigError, ConfiguratorError, ConfiguratorResult, DependencyError,
    LifecycleResult, Module, ModuleInstance, PropertyValue, CORE_CONFIGURATION_ID,
    CORE_PROPERTY_HOLDER_ID, CORE_SETTINGS_ID,
};
use di_abstractions::ModuleHolder;
use di_impl::{FactoryRegistry, InstantiationScheduler, ModuleContainer, Supersession};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 注入实例在模块集合中的类型名
pub const INJECTED_TYPE_NAME: &str = "injected";

/// 配置
///
/// 运行加载器、注册定义、按阶段构建模块，并对外提供模块查询、
/// 延迟加载与释放。
pub struct Configuration {
    settings: Arc<CoreSettings>,
    resolver: Arc<SelectorResolver>,
    aggregator: Arc<PropertyAggregator>,
    pipeline: Arc<TransformValidatePipeline>,
    factories: FactoryRegistry,
    initial_loaders: Vec<(String, LoaderDefinition)>,
    loaders: RwLock<IndexMap<String, LoaderDefinition>>,
    container: RwLock<Option<Arc<ModuleContainer>>>,
    failed: RwLock<Vec<FailedResource>>,
    supersessions: RwLock<Vec<Supersession>>,
    status: RwLock<ConfigurationStatus>,
    metrics: RwLock<ConfigurationMetrics>,
}

impl Configuration {
    /// 创建配置构建器
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// 内部构造函数
    pub(crate) fn new(
        settings: CoreSettings,
        resolver: Arc<SelectorResolver>,
        aggregator: Arc<PropertyAggregator>,
        pipeline: Arc<TransformValidatePipeline>,
        factories: FactoryRegistry,
        initial_loaders: Vec<(String, LoaderDefinition)>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            resolver,
            aggregator,
            pipeline,
            factories,
            initial_loaders,
            loaders: RwLock::new(IndexMap::new()),
            container: RwLock::new(None),
            failed: RwLock::new(Vec::new()),
            supersessions: RwLock::new(Vec::new()),
            status: RwLock::new(ConfigurationStatus::Initialized),
            metrics: RwLock::new(ConfigurationMetrics::default()),
        }
    }

    /// 加载配置
    ///
    /// 运行全部加载器并构建所有定义。`injections` 中的实例以给定标识注册，
    /// 同名定义被忽略。只能调用一次。
    pub fn load_configuration(
        &self,
        injections: impl IntoIterator<Item = (String, ModuleInstance)>,
    ) -> ConfiguratorResult<()> {
        {
            let mut status = self.status.write();
            if *status != ConfigurationStatus::Initialized {
                return Err(ConfigError::invalid_state(format!(
                    "配置当前状态为 {:?}，不能再次加载",
                    *status
                ))
                .into());
            }
            *status = ConfigurationStatus::Loading;
        }
        self.metrics.write().load_started_at = Some(chrono::Utc::now());
        info!("开始加载配置");

        match self.load_inner(injections) {
            Ok(()) => {
                *self.status.write() = ConfigurationStatus::Loaded;
                let metrics = self.metrics();
                info!(
                    "配置加载完成: {} 个模块, 耗时 {:?} ms",
                    metrics.modules_constructed,
                    metrics.load_duration_ms()
                );
                Ok(())
            }
            Err(e) => {
                error!("配置加载失败: {}", e);
                *self.status.write() = ConfigurationStatus::Failed;
                Err(e)
            }
        }
    }

    fn load_inner(
        &self,
        injections: impl IntoIterator<Item = (String, ModuleInstance)>,
    ) -> ConfiguratorResult<()> {
        let bootstrapper =
            LoaderBootstrapper::new(&self.settings, &self.resolver, &self.pipeline, &self.aggregator);
        let outcome = bootstrapper.run(self.initial_loaders.iter().cloned())?;

        {
            let mut metrics = self.metrics.write();
            metrics.loaders_processed = outcome.loaders_processed;
            metrics.resources_processed = outcome.resources_processed;
            metrics.resources_failed = outcome.failed.len();
            metrics.definitions_registered = outcome.registry.len();
        }
        *self.loaders.write() = outcome.loaders;
        *self.failed.write() = outcome.failed;
        *self.supersessions.write() = outcome.registry.supersessions().to_vec();

        let container = Arc::new(ModuleContainer::new(self.factories.clone()));
        container.register_infrastructure(
            CORE_SETTINGS_ID,
            "CoreSettings",
            self.settings.clone(),
        );
        container.register_infrastructure(
            CORE_PROPERTY_HOLDER_ID,
            "PropertyAggregator",
            self.aggregator.clone(),
        );
        container.register_infrastructure(
            CORE_CONFIGURATION_ID,
            "ContainerHandle",
            Arc::new(container.handle()),
        );

        let mut injected = Vec::new();
        for (identity, instance) in injections {
            if is_reserved_identity(&identity) {
                return Err(ConfigError::invalid_definition(identity, "保留标识不能被注入").into());
            }
            if outcome.registry.contains(&identity) {
                warn!("注入的实例覆盖定义: {}", identity);
            }
            container.register_injected(identity.clone(), INJECTED_TYPE_NAME, instance);
            injected.push(identity);
        }
        debug!("注入 {} 个实例", injected.len());

        for definition in outcome.registry.into_definitions() {
            if is_reserved_identity(&definition.identity) {
                return Err(ConfigError::invalid_definition(
                    definition.identity,
                    format!("保留标识不能被定义 (加载器 {})", definition.origin_loader),
                )
                .into());
            }
            if injected.contains(&definition.identity) {
                continue;
            }
            container.register_definition(definition);
        }
        *self.container.write() = Some(container.clone());

        let report = InstantiationScheduler::new().run(&container)?;
        let mut metrics = self.metrics.write();
        metrics.modules_constructed = container.constructed_count();
        metrics.modules_preloaded = container.preloaded_count();
        metrics.deferred_constructions = report.deferred.len();
        metrics.load_finished_at = Some(chrono::Utc::now());
        Ok(())
    }

    fn loaded_container(&self) -> ConfiguratorResult<Arc<ModuleContainer>> {
        let status = *self.status.read();
        if status != ConfigurationStatus::Loaded {
            return Err(ConfigError::invalid_state(format!("配置当前状态为 {status:?}，尚未加载")).into());
        }
        self.container
            .read()
            .clone()
            .ok_or_else(|| ConfigError::invalid_state("模块容器不存在").into())
    }

    /// 获取模块，构建失败时返回错误
    ///
    /// 已有定义但尚未构建的模块会被立即构建。标识未知时返回 `Ok(None)`。
    pub fn try_get_module(&self, identity: &str) -> ConfiguratorResult<Option<Module>> {
        let container = self.loaded_container()?;
        self.metrics.write().module_lookups += 1;
        match container.get_or_construct(identity) {
            Ok(module) => Ok(Some(module)),
            Err(DependencyError::ComponentNotRegistered { identity: missing }) if missing == identity => {
                debug!("模块不存在: {}", identity);
                Ok(None)
            }
            Err(source) => Err(ConfiguratorError::ConstructionFailed {
                identity: identity.to_string(),
                origin_loader: container
                    .definition(identity)
                    .map(|d| d.origin_loader)
                    .unwrap_or_default(),
                source,
            }),
        }
    }

    /// 获取模块，失败时记录日志并返回 `None`
    pub fn get_module(&self, identity: &str) -> Option<Module> {
        match self.try_get_module(identity) {
            Ok(module) => module,
            Err(e) => {
                error!("获取模块 {} 失败: {}", identity, e);
                None
            }
        }
    }

    /// 获取模块并转换为具体类型
    pub fn get_module_as<T: Any + Send + Sync>(&self, identity: &str) -> Option<Arc<T>> {
        self.get_module(identity)?.downcast::<T>()
    }

    /// 全部可见模块，按标识排序
    pub fn get_all_modules(&self) -> BTreeMap<String, Module> {
        match self.loaded_container() {
            Ok(container) => container.visible_modules(),
            Err(e) => {
                debug!("获取全部模块: {}", e);
                BTreeMap::new()
            }
        }
    }

    /// 以已知加载器处理单个资源，在子作用域中构建其中的全部定义
    ///
    /// 子作用域可以引用主作用域的模块，但新模块不并入主作用域。
    pub fn load_delayed(
        &self,
        loader_id: &str,
        resource: ResourceHandle,
    ) -> ConfiguratorResult<DelayedModuleHolder> {
        let container = self.loaded_container()?;
        let loader = self
            .loaders
            .read()
            .get(loader_id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownLoader {
                loader_id: loader_id.to_string(),
            })?;
        info!("延迟加载: {} (加载器 {})", resource.location(), loader_id);

        let bootstrapper =
            LoaderBootstrapper::new(&self.settings, &self.resolver, &self.pipeline, &self.aggregator);
        let registry = bootstrapper.process_stream(loader_id, &loader, resource)?;

        let child = Arc::new(ModuleContainer::child(&container, format!("delayed:{loader_id}")));
        let origins: IndexMap<String, String> = registry
            .iter()
            .map(|d| (d.identity.clone(), d.origin_loader.clone()))
            .collect();
        child.register_definitions(registry);

        for (identity, origin_loader) in origins {
            if let Err(source) = child.get_or_construct(&identity) {
                if let Err(e) = child.destroy_all() {
                    warn!("清理延迟加载作用域失败: {}", e);
                }
                return Err(ConfiguratorError::ConstructionFailed {
                    identity,
                    origin_loader,
                    source,
                });
            }
        }

        self.metrics.write().delayed_loads += 1;
        info!(
            "延迟加载完成: 作用域 {}, {} 个模块",
            child.scope().name,
            child.constructed_count()
        );
        Ok(DelayedModuleHolder::new(loader_id, child))
    }

    /// 以调用方提供的内存内容进行延迟加载
    pub fn load_delayed_stream(
        &self,
        loader_id: &str,
        stream: &StreamSource,
    ) -> ConfiguratorResult<DelayedModuleHolder> {
        let handle = ResourceHandle::from_bytes(
            stream.location(),
            ResourceOrigin::Stream,
            Arc::from(stream.content()),
        );
        self.load_delayed(loader_id, handle)
    }

    /// 通过组件工厂创建不受管理的实例，引用按主作用域解析
    pub fn create_instance(
        &self,
        component_type: &str,
        properties: IndexMap<String, PropertyValue>,
    ) -> ConfiguratorResult<ModuleInstance> {
        let container = self.loaded_container()?;
        Ok(container.create_instance(component_type, properties)?)
    }

    /// 解析后的属性
    pub fn properties(&self) -> ConfiguratorResult<PropertySet> {
        Ok(self.aggregator.properties(true)?)
    }

    /// 已知的加载器标识
    pub fn loaders(&self) -> Vec<String> {
        self.loaders.read().keys().cloned().collect()
    }

    /// 按隔离策略跳过的资源
    pub fn failed_resources(&self) -> Vec<FailedResource> {
        self.failed.read().clone()
    }

    /// 加载期间被覆盖的定义
    pub fn supersessions(&self) -> Vec<Supersession> {
        self.supersessions.read().clone()
    }

    /// 引擎设置
    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    /// 状态
    pub fn status(&self) -> ConfigurationStatus {
        *self.status.read()
    }

    /// 统计信息
    pub fn metrics(&self) -> ConfigurationMetrics {
        self.metrics.read().clone()
    }

    /// 是否已释放
    pub fn is_released(&self) -> bool {
        self.status() == ConfigurationStatus::Released
    }

    /// 释放主作用域的全部模块，重复调用无效果
    pub fn release(&self) -> LifecycleResult<()> {
        {
            let mut status = self.status.write();
            if *status == ConfigurationStatus::Released {
                return Ok(());
            }
            *status = ConfigurationStatus::Released;
        }
        self.metrics.write().released_at = Some(chrono::Utc::now());

        let container = self.container.write().take();
        match container {
            Some(container) => {
                info!("释放配置");
                container.destroy_all()
            }
            None => Ok(()),
        }
    }
}

impl ModuleHolder for Configuration {
    fn get_module(&self, identity: &str) -> Option<Module> {
        Configuration::get_module(self, identity)
    }

    fn get_all_modules(&self) -> BTreeMap<String, Module> {
        Configuration::get_all_modules(self)
    }

    fn release(&self) -> LifecycleResult<()> {
        Configuration::release(self)
    }

    fn is_released(&self) -> bool {
        Configuration::is_released(self)
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("status", &self.status())
            .field("loaders", &self.loaders())
            .field("factories", &self.factories)
            .finish()
    }
}

/// 配置状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationStatus {
    /// 已创建，尚未加载
    Initialized,
    /// 正在加载
    Loading,
    /// 已加载
    Loaded,
    /// 已释放
    Released,
    /// 加载失败
    Failed,
}

/// 配置统计信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationMetrics {
    /// 开始加载时间
    pub load_started_at: Option<chrono::DateTime<chrono::Utc>>,
    /// 加载完成时间
    pub load_finished_at: Option<chrono::DateTime<chrono::Utc>>,
    /// 释放时间
    pub released_at: Option<chrono::DateTime<chrono::Utc>>,
    /// 运行过的加载器数
    pub loaders_processed: usize,
    /// 处理过的资源数
    pub resources_processed: usize,
    /// 被跳过的资源数
    pub resources_failed: usize,
    /// 注册的定义数
    pub definitions_registered: usize,
    /// 主作用域构建的模块数
    pub modules_constructed: usize,
    /// 作为依赖被提前构建的模块数
    pub modules_preloaded: usize,
    /// 被推迟的构建数
    pub deferred_constructions: usize,
    /// 延迟加载次数
    pub delayed_loads: u64,
    /// 模块查询次数
    pub module_lookups: u64,
}

impl ConfigurationMetrics {
    /// 加载耗时（毫秒）
    pub fn load_duration_ms(&self) -> Option<i64> {
        match (self.load_started_at, self.load_finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}
