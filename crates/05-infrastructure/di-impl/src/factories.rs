//! 组件工厂注册表

use di_abstractions::ComponentFactory;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// 按类型名索引的组件工厂
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn ComponentFactory>>,
}

impl FactoryRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工厂，同名工厂被替换
    pub fn register(&mut self, factory: Arc<dyn ComponentFactory>) {
        let type_name = factory.type_name().to_string();
        if self.factories.insert(type_name.clone(), factory).is_some() {
            warn!("组件工厂 {} 被替换", type_name);
        } else {
            info!("注册组件工厂: {}", type_name);
        }
    }

    /// 注册工厂（构建器风格）
    pub fn with_factory(mut self, factory: impl ComponentFactory + 'static) -> Self {
        self.register(Arc::new(factory));
        self
    }

    /// 获取工厂
    pub fn get(&self, type_name: &str) -> Option<Arc<dyn ComponentFactory>> {
        self.factories.get(type_name).cloned()
    }

    /// 是否存在工厂
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// 已注册的类型名，按字典序
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 工厂数量
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
