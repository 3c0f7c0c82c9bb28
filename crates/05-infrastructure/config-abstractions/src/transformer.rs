//! 文档转换抽象接口

use crate::document::XmlDocument;
use configurator_common::TransformResult;
use std::sync::Arc;

/// 已编译的转换
pub trait Transformer: Send + Sync {
    /// 转换标识
    fn id(&self) -> &str;

    /// 将文档转换为组件定义语言
    fn transform(&self, document: &XmlDocument) -> TransformResult<XmlDocument>;
}

/// 转换编译器
pub trait TransformerCompiler: Send + Sync {
    /// 编译样式表
    fn compile(&self, id: &str, stylesheet: &[u8]) -> TransformResult<Arc<dyn Transformer>>;
}
