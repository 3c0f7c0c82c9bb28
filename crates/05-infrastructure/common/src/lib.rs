//! # Configurator Common
//!
//! 配置引擎各层共享的类型：错误分类、组件定义、模块实例、
//! 标识约定与作用域。
//!
//! ## 核心类型
//!
//! - [`ComponentDefinition`] - 声明式的模块构建记录
//! - [`Phase`] - 实例化阶段
//! - [`Module`] - 带标识的运行时实例
//! - [`Scope`] - 模块作用域
//! - [`ConfiguratorError`] - 顶层错误类型

pub mod component;
pub mod conventions;
pub mod errors;
pub mod lifecycle;
pub mod module;

pub use component::*;
pub use conventions::*;
pub use errors::*;
pub use lifecycle::*;
pub use module::*;
