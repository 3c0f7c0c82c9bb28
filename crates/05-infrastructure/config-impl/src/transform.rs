//! 样式表转换
//!
//! 样式表把任意结构的文档改写为组件定义语言：
//!
//! ```xml
//! <stylesheet output="components" passthrough="true">
//!   <template match="greeter" element="component">
//!     <set attribute="type" value="greeter"/>
//!     <copy from="name" to="id"/>
//!     <property from="text" name="greeting" required="true"/>
//!     <copy-children/>
//!   </template>
//! </stylesheet>
//! ```
//!
//! 模板作用于输入根元素的直接子元素；未匹配的元素在 `passthrough` 为真时原样保留。

use crate::xml::parse_document;
use config_abstractions::{Transformer, TransformerCompiler, XmlDocument, XmlElement, XmlNode};
use configurator_common::{TransformError, TransformResult};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
enum Action {
    Set { attribute: String, value: String },
    Copy { from: String, to: String, required: bool },
    Property { from: String, name: String, required: bool },
    CopyAttributes,
    CopyChildren,
}

#[derive(Debug, Clone)]
struct Template {
    element: String,
    actions: Vec<Action>,
}

/// 已编译的样式表
#[derive(Debug, Clone)]
pub struct StylesheetTransformer {
    id: String,
    output: String,
    passthrough: bool,
    templates: HashMap<String, Template>,
}

impl StylesheetTransformer {
    /// 编译样式表
    pub fn compile(id: &str, stylesheet: &[u8]) -> TransformResult<Self> {
        let invalid = |message: String| TransformError::invalid_stylesheet(id, message);
        let document = parse_document(id, stylesheet).map_err(|e| invalid(e.to_string()))?;
        let root = &document.root;
        if root.name != "stylesheet" {
            return Err(invalid(format!("根元素必须是 <stylesheet>，实际为 <{}>", root.name)));
        }

        let output = root.attribute("output").unwrap_or("components").to_string();
        let passthrough = match root.attribute("passthrough") {
            None | Some("true") => true,
            Some("false") => false,
            Some(other) => return Err(invalid(format!("passthrough 取值无效: {other}"))),
        };

        let mut templates = HashMap::new();
        for template in root.child_elements() {
            if template.name != "template" {
                return Err(invalid(format!("不支持的样式表元素 <{}>", template.name)));
            }
            let matched = template
                .attribute("match")
                .ok_or_else(|| invalid("<template> 缺少 match 属性".into()))?;
            let element = template.attribute("element").unwrap_or("component").to_string();
            let actions = template
                .child_elements()
                .map(|action| compile_action(action).map_err(&invalid))
                .collect::<TransformResult<Vec<_>>>()?;
            if templates
                .insert(matched.to_string(), Template { element, actions })
                .is_some()
            {
                return Err(invalid(format!("模板 {matched} 重复声明")));
            }
        }

        debug!("编译样式表: {} ({} 个模板)", id, templates.len());
        Ok(Self {
            id: id.to_string(),
            output,
            passthrough,
            templates,
        })
    }

    fn apply_template(&self, template: &Template, source: &XmlElement) -> TransformResult<XmlElement> {
        let mut target = XmlElement::new(template.element.clone());
        for action in &template.actions {
            match action {
                Action::Set { attribute, value } => target.set_attribute(attribute.clone(), value.clone()),
                Action::Copy { from, to, required } => match source.attribute(from) {
                    Some(value) => target.set_attribute(to.clone(), value),
                    None if *required => {
                        return Err(self.missing_attribute(source, from));
                    }
                    None => {}
                },
                Action::Property { from, name, required } => match source.attribute(from) {
                    Some(value) => target.children.push(XmlNode::Element(
                        XmlElement::new("property")
                            .with_attribute("name", name.clone())
                            .with_attribute("value", value),
                    )),
                    None if *required => {
                        return Err(self.missing_attribute(source, from));
                    }
                    None => {}
                },
                Action::CopyAttributes => {
                    for (name, value) in &source.attributes {
                        if target.attribute(name).is_none() {
                            target.attributes.push((name.clone(), value.clone()));
                        }
                    }
                }
                Action::CopyChildren => target.children.extend(source.children.iter().cloned()),
            }
        }
        Ok(target)
    }

    fn missing_attribute(&self, source: &XmlElement, attribute: &str) -> TransformError {
        TransformError::failed(
            self.id.clone(),
            format!("元素 <{}> 缺少属性 {attribute}", source.name),
        )
    }
}

impl Transformer for StylesheetTransformer {
    fn id(&self) -> &str {
        &self.id
    }

    fn transform(&self, document: &XmlDocument) -> TransformResult<XmlDocument> {
        let mut output = XmlElement::new(self.output.clone());
        for node in &document.root.children {
            match node {
                XmlNode::Element(element) => match self.templates.get(&element.name) {
                    Some(template) => {
                        let transformed = self.apply_template(template, element)?;
                        output.children.push(XmlNode::Element(transformed));
                    }
                    None if self.passthrough => output.children.push(node.clone()),
                    None => {}
                },
                _ if self.passthrough => output.children.push(node.clone()),
                _ => {}
            }
        }
        Ok(XmlDocument {
            prolog: document.prolog.clone(),
            root: output,
        })
    }
}

fn compile_action(action: &XmlElement) -> Result<Action, String> {
    let required = |name: &str| {
        action
            .attribute(name)
            .map(str::to_string)
            .ok_or_else(|| format!("<{}> 缺少 {name} 属性", action.name))
    };
    let flag = action.attribute("required") == Some("true");

    match action.name.as_str() {
        "set" => Ok(Action::Set {
            attribute: required("attribute")?,
            value: required("value")?,
        }),
        "copy" => {
            let from = required("from")?;
            let to = action.attribute("to").map_or_else(|| from.clone(), str::to_string);
            Ok(Action::Copy {
                from,
                to,
                required: flag,
            })
        }
        "property" => {
            let from = required("from")?;
            let name = action.attribute("name").map_or_else(|| from.clone(), str::to_string);
            Ok(Action::Property {
                from,
                name,
                required: flag,
            })
        }
        "copy-attributes" => Ok(Action::CopyAttributes),
        "copy-children" => Ok(Action::CopyChildren),
        other => Err(format!("不支持的模板动作 <{other}>")),
    }
}

/// 样式表编译器
#[derive(Debug, Clone, Copy, Default)]
pub struct StylesheetCompiler;

impl TransformerCompiler for StylesheetCompiler {
    fn compile(&self, id: &str, stylesheet: &[u8]) -> TransformResult<Arc<dyn Transformer>> {
        Ok(Arc::new(StylesheetTransformer::compile(id, stylesheet)?))
    }
}

/// 已编译转换的缓存，按转换标识索引
#[derive(Default)]
pub struct TransformCache {
    entries: DashMap<String, Arc<dyn Transformer>>,
}

impl TransformCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已缓存
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// 获取缓存的转换
    pub fn get(&self, id: &str) -> Option<Arc<dyn Transformer>> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// 获取缓存的转换，不存在时用 `compile` 编译并缓存
    pub fn get_or_compile<F>(&self, id: &str, compile: F) -> TransformResult<Arc<dyn Transformer>>
    where
        F: FnOnce() -> TransformResult<Arc<dyn Transformer>>,
    {
        if let Some(cached) = self.get(id) {
            debug!("使用缓存的转换: {}", id);
            return Ok(cached);
        }
        let compiled = compile()?;
        self.entries.insert(id.to_string(), compiled.clone());
        Ok(compiled)
    }

    /// 缓存数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for TransformCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformCache")
            .field("len", &self.entries.len())
            .finish()
    }
}
