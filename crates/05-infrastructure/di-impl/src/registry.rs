//! 定义注册表
//!
//! 按注册顺序保存组件定义，按覆盖策略处理标识冲突。

use configurator_common::{
    rekeyed_identity, ComponentDefinition, ConfigError, ConfigResult, DefinitionKind,
    OverridePolicy, Phase, PropertyValue,
};
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::{debug, warn};

/// 一次定义覆盖的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supersession {
    /// 被覆盖的标识
    pub identity: String,
    /// 原定义的加载器
    pub previous_loader: String,
    /// 新定义的加载器
    pub new_loader: String,
}

/// 定义注册表
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: IndexMap<String, ComponentDefinition>,
    supersessions: Vec<Supersession>,
}

impl DefinitionRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册单个定义，返回最终使用的标识
    ///
    /// 匿名定义冲突时改用新的唯一标识；具名定义冲突时按 `policy` 拒绝或覆盖。
    pub fn register(
        &mut self,
        mut definition: ComponentDefinition,
        policy: OverridePolicy,
    ) -> ConfigResult<String> {
        if definition.anonymous {
            if self.definitions.contains_key(&definition.identity) {
                let rekeyed = rekeyed_identity(&definition.identity);
                debug!("匿名定义 {} 标识冲突，改为 {}", definition.identity, rekeyed);
                definition.identity = rekeyed;
            }
            let identity = definition.identity.clone();
            self.definitions.insert(identity.clone(), definition);
            return Ok(identity);
        }

        let identity = definition.identity.clone();
        if let Some(existing) = self.definitions.get(&identity) {
            let supersession = Supersession {
                identity: identity.clone(),
                previous_loader: existing.origin_loader.clone(),
                new_loader: definition.origin_loader.clone(),
            };
            match policy {
                OverridePolicy::Reject => {
                    return Err(ConfigError::duplicate_definition(
                        identity,
                        supersession.previous_loader,
                        supersession.new_loader,
                    ));
                }
                OverridePolicy::WarnAndReplace => warn!(
                    "定义 {} (加载器 {}) 被加载器 {} 覆盖",
                    identity, supersession.previous_loader, supersession.new_loader
                ),
                OverridePolicy::Replace => debug!(
                    "定义 {} (加载器 {}) 被加载器 {} 覆盖",
                    identity, supersession.previous_loader, supersession.new_loader
                ),
            }
            self.supersessions.push(supersession);
        } else {
            debug!("添加定义: {} (加载器 {})", identity, definition.origin_loader);
        }
        self.definitions.insert(identity.clone(), definition);
        Ok(identity)
    }

    /// 注册一批定义
    ///
    /// 要么全部注册成功，要么注册表保持不变。批内对被改名的匿名定义的引用会同步改写。
    pub fn register_all(
        &mut self,
        definitions: impl IntoIterator<Item = ComponentDefinition>,
        policy: OverridePolicy,
    ) -> ConfigResult<()> {
        let mut batch: Vec<ComponentDefinition> = definitions.into_iter().collect();

        let mut renames = HashMap::new();
        for definition in &batch {
            if definition.anonymous && self.definitions.contains_key(&definition.identity) {
                renames.insert(definition.identity.clone(), rekeyed_identity(&definition.identity));
            }
        }
        if !renames.is_empty() {
            for definition in &mut batch {
                rename_references(definition, &renames);
            }
        }

        let mut staged = self.clone();
        for definition in batch {
            staged.register(definition, policy)?;
        }
        *self = staged;
        Ok(())
    }

    /// 合并另一个注册表的全部定义，冲突规则与注册相同
    pub fn merge_from(&mut self, other: Self, policy: OverridePolicy) -> ConfigResult<()> {
        debug!("合并 {} 个定义", other.len());
        let mut staged = self.clone();
        staged.supersessions.extend(other.supersessions);
        staged.register_all(other.definitions.into_values(), policy)?;
        *self = staged;
        Ok(())
    }

    /// 获取定义
    pub fn get(&self, identity: &str) -> Option<&ComponentDefinition> {
        self.definitions.get(identity)
    }

    /// 是否包含标识
    pub fn contains(&self, identity: &str) -> bool {
        self.definitions.contains_key(identity)
    }

    /// 按注册顺序的全部标识
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// 按注册顺序遍历定义
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.definitions.values()
    }

    /// 指定阶段的定义，按注册顺序
    pub fn in_phase(&self, phase: Phase) -> impl Iterator<Item = &ComponentDefinition> {
        self.definitions.values().filter(move |d| d.phase == phase)
    }

    /// 覆盖记录
    pub fn supersessions(&self) -> &[Supersession] {
        &self.supersessions
    }

    /// 定义数量
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// 取出全部定义
    pub fn into_definitions(self) -> impl Iterator<Item = ComponentDefinition> {
        self.definitions.into_values()
    }
}

fn rename_references(definition: &mut ComponentDefinition, renames: &HashMap<String, String>) {
    if let Some(renamed) = renames.get(&definition.identity) {
        definition.identity.clone_from(renamed);
    }
    for value in definition.properties.values_mut() {
        rename_value(value, renames);
    }
    if let DefinitionKind::Invocation {
        target, arguments, ..
    } = &mut definition.kind
    {
        if let Some(renamed) = renames.get(target.as_str()) {
            target.clone_from(renamed);
        }
        for argument in arguments {
            rename_value(argument, renames);
        }
    }
}

fn rename_value(value: &mut PropertyValue, renames: &HashMap<String, String>) {
    match value {
        PropertyValue::Reference(identity) => {
            if let Some(renamed) = renames.get(identity.as_str()) {
                identity.clone_from(renamed);
            }
        }
        PropertyValue::List(items) => {
            for item in items {
                rename_value(item, renames);
            }
        }
        PropertyValue::Literal(_) => {}
    }
}
