//! 延迟加载的模块持有者

use configurator_common::{LifecycleResult, Module, Scope};
use di_abstractions::ModuleHolder;
use di_impl::ModuleContainer;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// 延迟加载产生的模块持有者
///
/// 持有以主容器为父作用域的子容器。只暴露子容器自己构建的可见模块，
/// 释放时只销毁这些模块，父作用域不受影响。
#[derive(Debug)]
pub struct DelayedModuleHolder {
    loader_id: String,
    container: Arc<ModuleContainer>,
}

impl DelayedModuleHolder {
    pub(crate) fn new(loader_id: impl Into<String>, container: Arc<ModuleContainer>) -> Self {
        Self {
            loader_id: loader_id.into(),
            container,
        }
    }

    /// 产生本持有者的加载器
    pub fn loader_id(&self) -> &str {
        &self.loader_id
    }

    /// 子作用域
    pub fn scope(&self) -> &Scope {
        self.container.scope()
    }

    /// 获取模块并转换为具体类型
    pub fn get_module_as<T: Any + Send + Sync>(&self, identity: &str) -> Option<Arc<T>> {
        self.get_module(identity)?.downcast::<T>()
    }
}

impl ModuleHolder for DelayedModuleHolder {
    fn get_module(&self, identity: &str) -> Option<Module> {
        if self.container.is_released() {
            return None;
        }
        self.container.module(identity).filter(Module::is_visible)
    }

    fn get_all_modules(&self) -> BTreeMap<String, Module> {
        self.container.visible_modules()
    }

    fn release(&self) -> LifecycleResult<()> {
        info!("释放延迟加载作用域: {}", self.container.scope().name);
        self.container.destroy_all()
    }

    fn is_released(&self) -> bool {
        self.container.is_released()
    }
}
