//! # 依赖注入具体实现
//!
//! 提供定义注册表、作用域模块容器与分阶段实例化调度器
//!
//! ## 主要组件
//!
//! - [`DefinitionRegistry`] - 定义注册表
//! - [`FactoryRegistry`] - 组件工厂注册表
//! - [`ModuleContainer`] - 作用域模块容器
//! - [`InstantiationScheduler`] - 实例化调度器

pub mod container;
pub mod factories;
pub mod registry;
pub mod scheduler;

pub use container::*;
pub use factories::*;
pub use registry::*;
pub use scheduler::*;
