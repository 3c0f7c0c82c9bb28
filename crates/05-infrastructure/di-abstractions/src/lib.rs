//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件构建和模块持有的核心接口。
//!
//! ## 核心接口
//!
//! - [`ComponentFactory`] - 组件工厂接口
//! - [`ConstructionContext`] - 构建上下文接口
//! - [`ResolveContext`] - 循环依赖检测
//! - [`ModuleHolder`] - 模块持有者接口

pub mod factory;
pub mod holder;
pub mod resolver;

pub use factory::*;
pub use holder::*;
pub use resolver::*;
