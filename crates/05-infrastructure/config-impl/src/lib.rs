//! # Configuration Implementation
//!
//! 配置解析的具体实现：资源选择、属性聚合、占位符替换、模式验证、
//! 样式表转换以及把文档读成组件定义。
//!
//! ## 主要组件
//!
//! - [`SelectorResolver`] - 选择器解析器
//! - [`PlaceholderEngine`] / [`XmlPropertyReplacer`] - 占位符引擎
//! - [`PropertyAggregator`] - 属性聚合器
//! - [`TransformValidatePipeline`] - 转换-验证管线
//! - [`read_definitions`] - 定义语言读取
//! - [`SettingsLoader`] - 引擎设置加载器

pub mod aggregator;
pub mod binder;
pub mod definitions;
pub mod pipeline;
pub mod placeholder;
pub mod providers;
pub mod selector;
pub mod transform;
pub mod validation;
pub mod xml;

pub use aggregator::*;
pub use binder::*;
pub use definitions::*;
pub use pipeline::*;
pub use placeholder::*;
pub use providers::*;
pub use selector::*;
pub use transform::*;
pub use validation::*;
pub use xml::*;
