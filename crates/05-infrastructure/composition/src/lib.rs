//! # 配置组合层
//!
//! 将选择器解析、属性聚合、转换验证流水线、定义注册表与模块容器组合为
//! 一个完整的配置引擎。
//!
//! ## 主要功能
//!
//! - **配置构建器**: 使用构建者模式组装资源、加载器、组件工厂与属性
//! - **加载器引导**: 运行加载器队列，包括文档中递归声明的加载器
//! - **模块查询**: 按标识获取模块，未构建的模块按需构建
//! - **延迟加载**: 在子作用域中加载单个资源，可独立释放
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use config_abstractions::LoaderDefinition;
//! use configurator_common::module_instance;
//! use configurator_composition::Configuration;
//! use di_abstractions::FnFactory;
//! use std::collections::HashMap;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let configuration = Configuration::builder()
//!         .with_working_dir("/etc/app")
//!         .with_loader("core", LoaderDefinition::new("conf/*.xml"))
//!         .with_factory(FnFactory::new("greeter", |ctx| {
//!             let greeting = ctx.require_str("greeting")?;
//!             Ok(module_instance(greeting))
//!         }))
//!         .bootstrap(HashMap::new())?;
//!
//!     if let Some(greeting) = configuration.get_module_as::<String>("svc") {
//!         println!("{greeting}");
//!     }
//!
//!     configuration.release()?;
//!     Ok(())
//! }
//! ```

pub mod bootstrapper;
pub mod builder;
pub mod configuration;
pub mod holder;

// 重新导出主要类型
pub use bootstrapper::{BootstrapOutcome, FailedResource, LoaderBootstrapper};
pub use builder::{ConfigurationBuilder, LoggingConfig};
pub use configuration::{
    Configuration, ConfigurationMetrics, ConfigurationStatus, INJECTED_TYPE_NAME,
};
pub use holder::DelayedModuleHolder;

// 重新导出常用类型
pub use configurator_common::{ConfiguratorError, ConfiguratorResult};
pub use di_abstractions::ModuleHolder;
