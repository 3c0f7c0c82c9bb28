//! 模块实例
//!
//! 模块是由定义构建出来的、带标识的运行时对象。

use crate::conventions::is_reserved_identity;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 类型擦除后的模块实例
pub type ModuleInstance = Arc<dyn Any + Send + Sync>;

/// 将任意值包装为模块实例
pub fn module_instance<T: Any + Send + Sync>(value: T) -> ModuleInstance {
    Arc::new(value)
}

/// 模块来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// 由定义构建的组件
    Component,
    /// 启动时由调用方注入的实例
    Injected,
    /// 引擎内部对象（设置、属性聚合器、配置句柄）
    Infrastructure,
    /// 方法调用适配器的构建产物
    InvocationHelper,
}

/// 方法调用适配器执行后留下的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    /// 目标模块标识
    pub target: String,
    /// 调用的方法名
    pub method: String,
}

/// 模块
#[derive(Clone)]
pub struct Module {
    identity: String,
    anonymous: bool,
    kind: ModuleKind,
    type_name: String,
    instance: ModuleInstance,
}

impl Module {
    /// 创建模块
    pub fn new(
        identity: impl Into<String>,
        kind: ModuleKind,
        type_name: impl Into<String>,
        instance: ModuleInstance,
    ) -> Self {
        Self {
            identity: identity.into(),
            anonymous: false,
            kind,
            type_name: type_name.into(),
            instance,
        }
    }

    /// 标记为匿名模块
    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    /// 模块标识
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// 是否为匿名模块
    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// 模块来源
    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    /// 组件类型名
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// 类型擦除的实例
    pub fn instance(&self) -> &ModuleInstance {
        &self.instance
    }

    /// 向下转型为具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast::<T>().ok()
    }

    /// 实例是否为指定类型
    pub fn is<T: Any>(&self) -> bool {
        self.instance.is::<T>()
    }

    /// 是否与另一个模块指向同一实例
    pub fn same_instance(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.instance).cast::<()>(),
            Arc::as_ptr(&other.instance).cast::<()>(),
        )
    }

    /// 是否属于对外可见的模块集合
    ///
    /// 排除保留标识、匿名模块、引擎内部对象与方法调用适配器。
    pub fn is_visible(&self) -> bool {
        !self.anonymous
            && !is_reserved_identity(&self.identity)
            && !matches!(
                self.kind,
                ModuleKind::Infrastructure | ModuleKind::InvocationHelper
            )
            && !self.instance.is::<InvocationOutcome>()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("identity", &self.identity)
            .field("anonymous", &self.anonymous)
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Greeter {
        greeting: String,
    }

    #[test]
    fn test_downcast_and_identity() {
        let module = Module::new(
            "svc",
            ModuleKind::Component,
            "greeter",
            module_instance(Greeter {
                greeting: "hello".into(),
            }),
        );

        let greeter = module.downcast::<Greeter>().unwrap();
        assert_eq!(greeter.greeting, "hello");
        assert!(module.downcast::<String>().is_none());
        assert!(module.same_instance(&module.clone()));
    }

    #[test]
    fn test_visibility_rules() {
        let component = Module::new("svc", ModuleKind::Component, "t", module_instance(1_u8));
        assert!(component.is_visible());

        let anonymous = component.clone().with_anonymous(true);
        assert!(!anonymous.is_visible());

        // 匿名与否只看标记，不看标识的形式
        let named_like_synthetic = Module::new("greeter#3", ModuleKind::Component, "t", module_instance(1_u8));
        assert!(named_like_synthetic.is_visible());

        let reserved = Module::new("coreSettings", ModuleKind::Injected, "t", module_instance(1_u8));
        assert!(!reserved.is_visible());

        let helper = Module::new(
            "start",
            ModuleKind::Component,
            "invoke",
            module_instance(InvocationOutcome {
                target: "svc".into(),
                method: "start".into(),
            }),
        );
        assert!(!helper.is_visible());
    }
}
