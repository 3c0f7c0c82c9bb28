//! # Configuration Abstractions
//!
//! 配置解析抽象层，定义资源定位、属性来源、占位符替换、
//! 模式验证与文档转换的核心接口和数据模型。
//!
//! ## 核心接口
//!
//! - [`ResourceResolver`] - 选择器解析接口
//! - [`PropertyHolder`] - 属性持有者接口
//! - [`PropertyReplacer`] / [`DocumentReplacer`] - 占位符替换接口
//! - [`SchemaCompiler`] / [`SchemaValidator`] - 模式验证接口
//! - [`TransformerCompiler`] / [`Transformer`] - 文档转换接口
//! - [`LoaderDefinition`] - 加载器定义

pub mod document;
pub mod loader;
pub mod placeholder;
pub mod provider;
pub mod resource;
pub mod settings;
pub mod transformer;
pub mod validator;

pub use document::*;
pub use loader::*;
pub use placeholder::*;
pub use provider::*;
pub use resource::*;
pub use settings::*;
pub use transformer::*;
pub use validator::*;
