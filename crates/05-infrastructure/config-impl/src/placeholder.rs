//! 占位符替换实现
//!
//! 支持 `${key}`、默认值 `${key:default}` 与嵌套键 `${a.${b}}`。
//! 替换值中的占位符会被递归解析，循环引用和超过深度上限都会报错。

use config_abstractions::{
    DocumentReplacer, PropertyReplacer, PropertySet, XmlDocument, XmlElement, XmlNode,
};
use configurator_common::{ConfigError, ConfigResult};
use tracing::trace;

const PREFIX: &str = "${";
const SUFFIX: &str = "}";
const VALUE_SEPARATOR: &str = ":";

/// 占位符引擎
#[derive(Debug, Clone)]
pub struct PlaceholderEngine {
    ignore_unresolvable: bool,
    max_depth: usize,
}

impl PlaceholderEngine {
    /// 创建宽松模式的引擎
    pub fn new() -> Self {
        Self {
            ignore_unresolvable: true,
            max_depth: 32,
        }
    }

    /// 设置严格模式，无法解析的占位符将报错
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.ignore_unresolvable = !strict;
        self
    }

    /// 设置递归深度上限
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// 是否为严格模式
    pub fn is_strict(&self) -> bool {
        !self.ignore_unresolvable
    }

    fn parse(
        &self,
        value: &str,
        properties: &PropertySet,
        visiting: &mut Vec<String>,
    ) -> ConfigResult<String> {
        let mut result = value.to_string();
        let mut search_from = 0;

        while let Some(offset) = result[search_from..].find(PREFIX) {
            let start = search_from + offset;
            let Some(end) = find_placeholder_end(&result, start) else {
                break;
            };

            let original = result[start + PREFIX.len()..end].to_string();
            if visiting.contains(&original) {
                return Err(ConfigError::PlaceholderCycle { token: original });
            }
            if visiting.len() >= self.max_depth {
                return Err(ConfigError::PlaceholderDepthExceeded {
                    token: original,
                    max_depth: self.max_depth,
                });
            }
            visiting.push(original.clone());

            let key = self.parse(&original, properties, visiting)?;
            let resolved = match properties.get(&key) {
                Some(found) => Some(found.to_string()),
                None => key
                    .split_once(VALUE_SEPARATOR)
                    .map(|(name, default)| properties.get(name).unwrap_or(default).to_string()),
            };

            match resolved {
                Some(raw) => {
                    let replacement = self.parse(&raw, properties, visiting)?;
                    trace!("解析占位符: {} -> {}", original, replacement);
                    result.replace_range(start..end + SUFFIX.len(), &replacement);
                    search_from = start + replacement.len();
                }
                None if self.ignore_unresolvable => {
                    search_from = end + SUFFIX.len();
                }
                None => {
                    return Err(ConfigError::UnresolvablePlaceholder { token: original });
                }
            }

            visiting.pop();
        }

        Ok(result)
    }
}

impl Default for PlaceholderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyReplacer for PlaceholderEngine {
    fn replace_placeholders(&self, input: &str, properties: &PropertySet) -> ConfigResult<String> {
        self.parse(input, properties, &mut Vec::new())
    }
}

/// 找到与 `start` 处前缀配对的后缀位置，跳过嵌套的占位符
fn find_placeholder_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut index = start + PREFIX.len();
    let mut nested = 0_usize;

    while index < bytes.len() {
        if bytes[index..].starts_with(SUFFIX.as_bytes()) {
            if nested == 0 {
                return Some(index);
            }
            nested -= 1;
            index += SUFFIX.len();
        } else if bytes[index..].starts_with(PREFIX.as_bytes()) {
            nested += 1;
            index += PREFIX.len();
        } else {
            index += 1;
        }
    }
    None
}

/// 文档占位符替换器
///
/// 替换属性值、文本与 CDATA 节点，不修改注释和处理指令。
#[derive(Debug, Clone, Default)]
pub struct XmlPropertyReplacer {
    engine: PlaceholderEngine,
}

impl XmlPropertyReplacer {
    /// 以指定引擎创建替换器
    pub fn new(engine: PlaceholderEngine) -> Self {
        Self { engine }
    }

    /// 内部使用的文本引擎
    pub fn engine(&self) -> &PlaceholderEngine {
        &self.engine
    }

    fn replace_element(&self, element: &mut XmlElement, properties: &PropertySet) -> ConfigResult<()> {
        for (_, value) in &mut element.attributes {
            if value.contains(PREFIX) {
                *value = self.engine.replace_placeholders(value, properties)?;
            }
        }
        for child in &mut element.children {
            match child {
                XmlNode::Element(nested) => self.replace_element(nested, properties)?,
                XmlNode::Text(text) | XmlNode::CData(text) => {
                    if text.contains(PREFIX) {
                        *text = self.engine.replace_placeholders(text, properties)?;
                    }
                }
                XmlNode::Comment(_) | XmlNode::ProcessingInstruction(_) => {}
            }
        }
        Ok(())
    }
}

impl DocumentReplacer for XmlPropertyReplacer {
    fn replace_in_document(
        &self,
        document: &XmlDocument,
        properties: &PropertySet,
    ) -> ConfigResult<XmlDocument> {
        let mut copy = document.clone();
        self.replace_element(&mut copy.root, properties)?;
        Ok(copy)
    }
}
