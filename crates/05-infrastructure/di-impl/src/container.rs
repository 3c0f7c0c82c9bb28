//! 模块容器
//!
//! 一个作用域内的定义与已构建模块。引用先在本作用域解析，找不到时交给父作用域；
//! 父作用域中的模块只被引用，销毁时不受影响。

use crate::factories::FactoryRegistry;
use crate::registry::DefinitionRegistry;
use configurator_common::{
    module_instance, ComponentDefinition, DefinitionKind, DependencyError, DependencyResult,
    InvocationOutcome, LifecycleError, LifecycleResult, Module, ModuleInstance, ModuleKind,
    PropertyValue, Scope,
};
use di_abstractions::{ConstructionContext, ResolveContext, ResolvedValue};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};

/// 方法调用适配器模块的类型名
pub const INVOCATION_TYPE_NAME: &str = "invoke";

/// 模块容器
pub struct ModuleContainer {
    scope: Scope,
    parent: Option<Arc<ModuleContainer>>,
    factories: FactoryRegistry,
    definitions: RwLock<IndexMap<String, ComponentDefinition>>,
    modules: RwLock<HashMap<String, Module>>,
    construction_order: Mutex<Vec<String>>,
    preloaded: AtomicUsize,
    released: AtomicBool,
}

impl ModuleContainer {
    /// 创建根作用域容器
    pub fn new(factories: FactoryRegistry) -> Self {
        Self::with_scope(Scope::root(), None, factories)
    }

    /// 创建以 `parent` 为父作用域的子容器，共享父容器的组件工厂
    pub fn child(parent: &Arc<Self>, name: impl Into<String>) -> Self {
        let scope = parent.scope.child(name);
        Self::with_scope(scope, Some(parent.clone()), parent.factories.clone())
    }

    fn with_scope(scope: Scope, parent: Option<Arc<Self>>, factories: FactoryRegistry) -> Self {
        debug!("创建作用域: {}", scope.name);
        Self {
            scope,
            parent,
            factories,
            definitions: RwLock::new(IndexMap::new()),
            modules: RwLock::new(HashMap::new()),
            construction_order: Mutex::new(Vec::new()),
            preloaded: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        }
    }

    /// 作用域
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// 父容器
    pub fn parent(&self) -> Option<&Arc<Self>> {
        self.parent.as_ref()
    }

    /// 组件工厂
    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    /// 指向本容器的弱引用句柄
    pub fn handle(self: &Arc<Self>) -> ContainerHandle {
        ContainerHandle {
            container: Arc::downgrade(self),
        }
    }

    /// 按注册顺序加入注册表中的全部定义
    pub fn register_definitions(&self, registry: DefinitionRegistry) {
        let mut definitions = self.definitions.write();
        for definition in registry.into_definitions() {
            definitions.insert(definition.identity.clone(), definition);
        }
    }

    /// 加入单个定义
    pub fn register_definition(&self, definition: ComponentDefinition) {
        self.definitions
            .write()
            .insert(definition.identity.clone(), definition);
    }

    /// 注册引擎内部对象
    pub fn register_infrastructure(
        &self,
        identity: impl Into<String>,
        type_name: impl Into<String>,
        instance: ModuleInstance,
    ) -> Module {
        self.register_prebuilt(Module::new(
            identity,
            ModuleKind::Infrastructure,
            type_name,
            instance,
        ))
    }

    /// 注册调用方注入的实例
    pub fn register_injected(
        &self,
        identity: impl Into<String>,
        type_name: impl Into<String>,
        instance: ModuleInstance,
    ) -> Module {
        self.register_prebuilt(Module::new(identity, ModuleKind::Injected, type_name, instance))
    }

    fn register_prebuilt(&self, module: Module) -> Module {
        debug!("注册现成模块: {} ({:?})", module.identity(), module.kind());
        self.modules
            .write()
            .insert(module.identity().to_string(), module.clone());
        module
    }

    /// 本作用域的定义
    pub fn definition(&self, identity: &str) -> Option<ComponentDefinition> {
        self.definitions.read().get(identity).cloned()
    }

    /// 本作用域是否有该定义
    pub fn has_definition(&self, identity: &str) -> bool {
        self.definitions.read().contains_key(identity)
    }

    /// 本作用域的定义标识，按注册顺序
    pub fn definition_identities(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }

    /// 本作用域的全部定义，按注册顺序
    pub fn definitions(&self) -> Vec<ComponentDefinition> {
        self.definitions.read().values().cloned().collect()
    }

    /// 本作用域中该标识是否已有模块
    pub fn is_constructed(&self, identity: &str) -> bool {
        self.modules.read().contains_key(identity)
    }

    /// 本作用域中已有的模块，不触发构建
    pub fn module(&self, identity: &str) -> Option<Module> {
        self.modules.read().get(identity).cloned()
    }

    /// 本作用域构建模块的顺序
    pub fn construction_order(&self) -> Vec<String> {
        self.construction_order.lock().clone()
    }

    /// 本作用域构建的模块数量
    pub fn constructed_count(&self) -> usize {
        self.construction_order.lock().len()
    }

    /// 作为依赖被提前构建的模块数量
    pub fn preloaded_count(&self) -> usize {
        self.preloaded.load(Ordering::Relaxed)
    }

    /// 本作用域中对外可见的模块
    pub fn visible_modules(&self) -> BTreeMap<String, Module> {
        self.modules
            .read()
            .iter()
            .filter(|(_, module)| module.is_visible())
            .map(|(identity, module)| (identity.clone(), module.clone()))
            .collect()
    }

    /// 获取模块，尚未构建时立即构建
    pub fn get_or_construct(&self, identity: &str) -> DependencyResult<Module> {
        let mut chain = ResolveContext::new();
        self.construct_with(identity, &mut chain)
    }

    fn construct_with(&self, identity: &str, chain: &mut ResolveContext) -> DependencyResult<Module> {
        let existing = self.modules.read().get(identity).cloned();
        if let Some(module) = existing {
            return Ok(module);
        }

        let definition = self.definitions.read().get(identity).cloned();
        let Some(definition) = definition else {
            return match &self.parent {
                Some(parent) => parent.construct_with(identity, chain),
                None => Err(DependencyError::not_registered(identity)),
            };
        };

        chain.push_identity(identity)?;
        let result = self.construct_definition(&definition, chain);
        chain.pop_identity();
        let module = result?;

        {
            let mut modules = self.modules.write();
            if let Some(existing) = modules.get(identity) {
                return Ok(existing.clone());
            }
            modules.insert(identity.to_string(), module.clone());
        }
        self.construction_order.lock().push(identity.to_string());

        match chain.chain().last() {
            Some(dependent) => {
                self.preloaded.fetch_add(1, Ordering::Relaxed);
                debug!("预加载模块: {} (被 {} 依赖)", identity, dependent);
            }
            None => debug!("构建模块: {} [{}]", identity, self.scope.name),
        }
        Ok(module)
    }

    fn construct_definition(
        &self,
        definition: &ComponentDefinition,
        chain: &mut ResolveContext,
    ) -> DependencyResult<Module> {
        let identity = definition.identity.as_str();
        match &definition.kind {
            DefinitionKind::Component { component_type } => {
                let factory = self.factories.get(component_type).ok_or_else(|| {
                    DependencyError::UnknownComponentType {
                        identity: identity.to_string(),
                        component_type: component_type.clone(),
                    }
                })?;
                let mut ctx = ContainerContext {
                    container: self,
                    definition,
                    chain,
                };
                let instance = factory
                    .create(&mut ctx)
                    .map_err(|e| creation_failed(identity, e))?;
                Ok(Module::new(identity, ModuleKind::Component, component_type.clone(), instance)
                    .with_anonymous(definition.anonymous))
            }
            DefinitionKind::Invocation {
                target,
                method,
                arguments,
            } => {
                let target_module = self.construct_with(target, chain)?;
                let arguments = arguments
                    .iter()
                    .map(|argument| self.resolve_value(argument, chain))
                    .collect::<DependencyResult<Vec<_>>>()?;
                let factory = self.factories.get(target_module.type_name()).ok_or_else(|| {
                    DependencyError::invocation_failed(
                        target.clone(),
                        method.clone(),
                        format!("类型 {} 没有组件工厂", target_module.type_name()),
                    )
                })?;
                factory
                    .invoke(&target_module, method, &arguments)
                    .map_err(|e| DependencyError::invocation_failed(target.clone(), method.clone(), e.to_string()))?;
                debug!("执行方法调用: {}.{} ({})", target, method, identity);

                let outcome = InvocationOutcome {
                    target: target.clone(),
                    method: method.clone(),
                };
                Ok(Module::new(
                    identity,
                    ModuleKind::InvocationHelper,
                    INVOCATION_TYPE_NAME,
                    module_instance(outcome),
                )
                .with_anonymous(definition.anonymous))
            }
        }
    }

    fn resolve_value(&self, value: &PropertyValue, chain: &mut ResolveContext) -> DependencyResult<ResolvedValue> {
        match value {
            PropertyValue::Literal(text) => Ok(ResolvedValue::Text(text.clone())),
            PropertyValue::Reference(identity) => {
                Ok(ResolvedValue::Module(self.construct_with(identity, chain)?))
            }
            PropertyValue::List(items) => items
                .iter()
                .map(|item| self.resolve_value(item, chain))
                .collect::<DependencyResult<Vec<_>>>()
                .map(ResolvedValue::List),
        }
    }

    /// 通过组件工厂构建不受管理的实例，引用按本作用域解析
    pub fn create_instance(
        &self,
        component_type: &str,
        properties: IndexMap<String, PropertyValue>,
    ) -> DependencyResult<ModuleInstance> {
        let mut definition = ComponentDefinition::component(format!("{component_type}#instance"), component_type)
            .with_anonymous(true);
        definition.properties = properties;

        let factory = self.factories.get(component_type).ok_or_else(|| {
            DependencyError::UnknownComponentType {
                identity: definition.identity.clone(),
                component_type: component_type.to_string(),
            }
        })?;
        let mut chain = ResolveContext::new();
        let mut ctx = ContainerContext {
            container: self,
            definition: &definition,
            chain: &mut chain,
        };
        trace!("创建实例: {}", component_type);
        factory
            .create(&mut ctx)
            .map_err(|e| creation_failed(&definition.identity, e))
    }

    /// 是否已释放
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// 按构建顺序的逆序销毁本作用域构建的模块，重复调用无效果
    pub fn destroy_all(&self) -> LifecycleResult<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            trace!("作用域 {} 已释放，忽略重复释放", self.scope.name);
            return Ok(());
        }

        let order = std::mem::take(&mut *self.construction_order.lock());
        let mut modules = std::mem::take(&mut *self.modules.write());
        self.definitions.write().clear();

        let mut destroyed = 0;
        let mut failures = Vec::new();
        for identity in order.iter().rev() {
            let Some(module) = modules.remove(identity) else {
                continue;
            };
            if module.kind() != ModuleKind::Component {
                continue;
            }
            if let Some(factory) = self.factories.get(module.type_name()) {
                match factory.destroy(&module) {
                    Ok(()) => destroyed += 1,
                    Err(e) => {
                        warn!("销毁模块 {} 失败: {}", identity, e);
                        failures.push(format!("{identity}: {e}"));
                    }
                }
            }
        }

        info!("作用域 {} 已释放, 销毁 {} 个模块", self.scope.name, destroyed);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::ScopeDestructionFailed {
                scope: self.scope.name.clone(),
                message: failures.join("; "),
            })
        }
    }
}

impl std::fmt::Debug for ModuleContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContainer")
            .field("scope", &self.scope.name)
            .field("parent", &self.parent.as_ref().map(|p| p.scope.name.clone()))
            .field("definitions", &self.definitions.read().len())
            .field("modules", &self.modules.read().len())
            .field("released", &self.is_released())
            .finish()
    }
}

fn creation_failed(identity: &str, error: anyhow::Error) -> DependencyError {
    match error.downcast::<DependencyError>() {
        Ok(DependencyError::CircularDependency { dependency_chain }) => {
            DependencyError::CircularDependency { dependency_chain }
        }
        Ok(other) => DependencyError::ComponentCreationFailed {
            identity: identity.to_string(),
            source: Box::new(other),
        },
        Err(error) => DependencyError::ComponentCreationFailed {
            identity: identity.to_string(),
            source: error.into(),
        },
    }
}

struct ContainerContext<'a> {
    container: &'a ModuleContainer,
    definition: &'a ComponentDefinition,
    chain: &'a mut ResolveContext,
}

impl ConstructionContext for ContainerContext<'_> {
    fn identity(&self) -> &str {
        &self.definition.identity
    }

    fn definition(&self) -> &ComponentDefinition {
        self.definition
    }

    fn resolve_module(&mut self, identity: &str) -> DependencyResult<Module> {
        self.container.construct_with(identity, self.chain)
    }

    fn resolve_property(&mut self, name: &str) -> DependencyResult<Option<ResolvedValue>> {
        let definition = self.definition;
        match definition.properties.get(name) {
            Some(value) => self.container.resolve_value(value, self.chain).map(Some),
            None => Ok(None),
        }
    }
}

/// 指向容器的弱引用句柄
///
/// 作为 `coreConfiguration` 模块注册，避免容器与自身形成引用环。
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    container: Weak<ModuleContainer>,
}

impl ContainerHandle {
    /// 容器仍存活时返回容器
    pub fn upgrade(&self) -> Option<Arc<ModuleContainer>> {
        self.container.upgrade()
    }

    /// 容器是否仍存活且未释放
    pub fn is_alive(&self) -> bool {
        self.upgrade().is_some_and(|c| !c.is_released())
    }

    /// 通过句柄获取模块
    pub fn get_module(&self, identity: &str) -> Option<Module> {
        self.upgrade()?.get_or_construct(identity).ok()
    }
}
