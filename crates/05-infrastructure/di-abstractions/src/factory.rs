//! 组件工厂抽象接口
//!
//! 工厂按组件类型名注册，负责构建实例、执行方法调用适配器以及销毁实例。
//! 构建时通过 [`ConstructionContext`] 取得已解析的属性和依赖模块。

use anyhow::anyhow;
use configurator_common::{
    ComponentDefinition, DependencyError, DependencyResult, Module, ModuleInstance,
};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// 已解析的属性值
#[derive(Debug, Clone)]
pub enum ResolvedValue {
    /// 字面量（占位符已替换）
    Text(String),
    /// 引用的模块
    Module(Module),
    /// 列表
    List(Vec<ResolvedValue>),
}

impl ResolvedValue {
    /// 字面量内容
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// 引用的模块
    pub fn as_module(&self) -> Option<&Module> {
        match self {
            Self::Module(module) => Some(module),
            _ => None,
        }
    }

    /// 列表元素
    pub fn as_list(&self) -> Option<&[ResolvedValue]> {
        match self {
            Self::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// 将引用的模块转换为具体类型
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_module().and_then(Module::downcast::<T>)
    }
}

/// 构建上下文
///
/// 由容器在调用 [`ComponentFactory::create`] 时提供，解析引用时会按需构建依赖模块。
pub trait ConstructionContext {
    /// 正在构建的模块标识
    fn identity(&self) -> &str;

    /// 正在构建的定义
    fn definition(&self) -> &ComponentDefinition;

    /// 按标识解析模块，未构建时立即构建
    fn resolve_module(&mut self, identity: &str) -> DependencyResult<Module>;

    /// 解析定义中的属性，属性未声明时返回 `None`
    fn resolve_property(&mut self, name: &str) -> DependencyResult<Option<ResolvedValue>>;

    /// 字面量属性
    fn property_str(&mut self, name: &str) -> DependencyResult<Option<String>> {
        match self.resolve_property(name)? {
            None => Ok(None),
            Some(ResolvedValue::Text(text)) => Ok(Some(text)),
            Some(_) => Err(DependencyError::PropertyTypeMismatch {
                identity: self.identity().to_string(),
                property: name.to_string(),
                expected: "literal".to_string(),
            }),
        }
    }

    /// 必需的字面量属性
    fn require_str(&mut self, name: &str) -> DependencyResult<String> {
        self.property_str(name)?
            .ok_or_else(|| DependencyError::MissingProperty {
                identity: self.identity().to_string(),
                property: name.to_string(),
            })
    }

    /// 必需的模块引用属性
    fn require_module(&mut self, name: &str) -> DependencyResult<Module> {
        match self.resolve_property(name)? {
            Some(ResolvedValue::Module(module)) => Ok(module),
            Some(_) => Err(DependencyError::PropertyTypeMismatch {
                identity: self.identity().to_string(),
                property: name.to_string(),
                expected: "reference".to_string(),
            }),
            None => Err(DependencyError::MissingProperty {
                identity: self.identity().to_string(),
                property: name.to_string(),
            }),
        }
    }
}

impl dyn ConstructionContext + '_ {
    /// 解析字面量属性并转换类型
    pub fn property_as<T>(&mut self, name: &str) -> DependencyResult<Option<T>>
    where
        T: FromStr,
    {
        let Some(text) = self.property_str(name)? else {
            return Ok(None);
        };
        text.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| DependencyError::PropertyTypeMismatch {
                identity: self.identity().to_string(),
                property: name.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    /// 必需的模块引用属性，转换为具体类型
    pub fn require_module_as<T: Any + Send + Sync>(&mut self, name: &str) -> DependencyResult<Arc<T>> {
        let module = self.require_module(name)?;
        module
            .downcast::<T>()
            .ok_or_else(|| DependencyError::PropertyTypeMismatch {
                identity: self.identity().to_string(),
                property: name.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    /// 按标识解析模块并转换为具体类型
    pub fn resolve_as<T: Any + Send + Sync>(&mut self, identity: &str) -> DependencyResult<Arc<T>> {
        let module = self.resolve_module(identity)?;
        module
            .downcast::<T>()
            .ok_or_else(|| DependencyError::PropertyTypeMismatch {
                identity: self.identity().to_string(),
                property: identity.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }
}

/// 组件工厂 trait
///
/// 用于创建组件实例
pub trait ComponentFactory: Send + Sync {
    /// 工厂支持的组件类型名
    fn type_name(&self) -> &str;

    /// 创建组件实例
    fn create(&self, ctx: &mut dyn ConstructionContext) -> anyhow::Result<ModuleInstance>;

    /// 在已构建的模块上执行方法，默认不支持任何方法
    fn invoke(&self, target: &Module, method: &str, arguments: &[ResolvedValue]) -> anyhow::Result<()> {
        let _ = arguments;
        Err(anyhow!(
            "类型 {} 不支持方法 {} (模块 {})",
            self.type_name(),
            method,
            target.identity()
        ))
    }

    /// 销毁模块，默认什么都不做
    fn destroy(&self, module: &Module) -> anyhow::Result<()> {
        let _ = module;
        Ok(())
    }
}

type CreateFn = dyn Fn(&mut dyn ConstructionContext) -> anyhow::Result<ModuleInstance> + Send + Sync;
type MethodFn = dyn Fn(&Module, &[ResolvedValue]) -> anyhow::Result<()> + Send + Sync;
type DestroyFn = dyn Fn(&Module) -> anyhow::Result<()> + Send + Sync;

/// 闭包工厂
pub struct FnFactory {
    type_name: String,
    create: Box<CreateFn>,
    methods: HashMap<String, Box<MethodFn>>,
    destroy: Option<Box<DestroyFn>>,
}

impl FnFactory {
    /// 以构建闭包创建工厂
    pub fn new<F>(type_name: impl Into<String>, create: F) -> Self
    where
        F: Fn(&mut dyn ConstructionContext) -> anyhow::Result<ModuleInstance> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            create: Box::new(create),
            methods: HashMap::new(),
            destroy: None,
        }
    }

    /// 注册可由方法调用适配器执行的方法
    pub fn with_method<F>(mut self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Module, &[ResolvedValue]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.methods.insert(method.into(), Box::new(f));
        self
    }

    /// 注册销毁回调
    pub fn with_destroy<F>(mut self, f: F) -> Self
    where
        F: Fn(&Module) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(f));
        self
    }
}

impl ComponentFactory for FnFactory {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn create(&self, ctx: &mut dyn ConstructionContext) -> anyhow::Result<ModuleInstance> {
        (self.create)(ctx)
    }

    fn invoke(&self, target: &Module, method: &str, arguments: &[ResolvedValue]) -> anyhow::Result<()> {
        match self.methods.get(method) {
            Some(f) => f(target, arguments),
            None => Err(anyhow!(
                "类型 {} 不支持方法 {} (模块 {})",
                self.type_name,
                method,
                target.identity()
            )),
        }
    }

    fn destroy(&self, module: &Module) -> anyhow::Result<()> {
        match &self.destroy {
            Some(f) => f(module),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for FnFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("FnFactory")
            .field("type_name", &self.type_name)
            .field("methods", &methods)
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}
