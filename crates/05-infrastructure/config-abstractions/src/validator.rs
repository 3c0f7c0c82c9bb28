//! 文档模式验证抽象接口

use crate::document::XmlDocument;
use configurator_common::{SchemaResult, ValidationResult};
use std::sync::Arc;

/// 已编译的模式
pub trait SchemaValidator: Send + Sync {
    /// 验证文档，失败时返回全部违规项
    fn validate(&self, resource: &str, document: &XmlDocument) -> ValidationResult<()>;
}

/// 模式编译器
///
/// 模式在设置时编译一次，无效的模式立即报错。
pub trait SchemaCompiler: Send + Sync {
    /// 编译模式文档
    fn compile(&self, location: &str, source: &[u8]) -> SchemaResult<Arc<dyn SchemaValidator>>;
}
