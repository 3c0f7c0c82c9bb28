//! 占位符替换抽象接口

use crate::document::XmlDocument;
use crate::provider::PropertySet;
use configurator_common::ConfigResult;

/// 文本占位符替换器
pub trait PropertyReplacer: Send + Sync {
    /// 替换文本中的 `${key}` 占位符
    fn replace_placeholders(&self, input: &str, properties: &PropertySet) -> ConfigResult<String>;
}

/// 文档占位符替换器
pub trait DocumentReplacer: Send + Sync {
    /// 返回替换后的文档副本，输入文档保持不变
    fn replace_in_document(
        &self,
        document: &XmlDocument,
        properties: &PropertySet,
    ) -> ConfigResult<XmlDocument>;
}
