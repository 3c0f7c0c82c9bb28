//! 结构化模式验证
//!
//! 模式文档示例：
//!
//! ```xml
//! <schema root="components" closed="false">
//!   <element name="component" closed="true">
//!     <attribute name="id"/>
//!     <attribute name="type" required="true"/>
//!     <attribute name="phase" pattern="head|body|tail"/>
//!     <child name="property" min="0" max="unbounded"/>
//!   </element>
//! </schema>
//! ```

use crate::xml::parse_document;
use config_abstractions::{SchemaCompiler, SchemaValidator, XmlDocument, XmlElement};
use configurator_common::{SchemaError, SchemaResult, ValidationError, ValidationResult};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct AttributeRule {
    name: String,
    required: bool,
    pattern: Option<Regex>,
}

#[derive(Debug, Clone)]
struct ChildRule {
    name: String,
    min: usize,
    max: Option<usize>,
}

#[derive(Debug, Clone)]
struct ElementRule {
    closed: bool,
    attributes: Vec<AttributeRule>,
    children: Vec<ChildRule>,
}

/// 已编译的结构化模式
#[derive(Debug, Clone)]
pub struct StructuralSchema {
    location: String,
    root: String,
    closed: bool,
    elements: HashMap<String, ElementRule>,
}

impl StructuralSchema {
    /// 从模式文档编译
    pub fn compile(location: &str, source: &[u8]) -> SchemaResult<Self> {
        let document = parse_document(location, source).map_err(|e| SchemaError::Unreadable {
            location: location.to_string(),
            message: e.to_string(),
        })?;
        let schema = &document.root;
        if schema.name != "schema" {
            return Err(SchemaError::invalid(format!(
                "{location}: 根元素必须是 <schema>，实际为 <{}>",
                schema.name
            )));
        }
        let root = schema
            .attribute("root")
            .filter(|r| !r.is_empty())
            .ok_or_else(|| SchemaError::invalid(format!("{location}: <schema> 缺少 root 属性")))?
            .to_string();
        let closed = parse_flag(schema.attribute("closed"), false)
            .map_err(|m| SchemaError::invalid(format!("{location}: {m}")))?;

        let mut elements = HashMap::new();
        for element in schema.children_named("element") {
            let name = element
                .attribute("name")
                .filter(|n| !n.is_empty())
                .ok_or_else(|| SchemaError::invalid(format!("{location}: <element> 缺少 name 属性")))?;
            let rule = compile_element(location, element)?;
            if elements.insert(name.to_string(), rule).is_some() {
                return Err(SchemaError::invalid(format!("{location}: 元素 {name} 重复声明")));
            }
        }

        debug!("编译模式: {} (根元素 {}, {} 条元素规则)", location, root, elements.len());
        Ok(Self {
            location: location.to_string(),
            root,
            closed,
            elements,
        })
    }

    /// 模式来源位置
    pub fn location(&self) -> &str {
        &self.location
    }

    fn check_element(&self, element: &XmlElement, path: &str, violations: &mut Vec<String>) {
        match self.elements.get(&element.name) {
            Some(rule) => check_rule(rule, element, path, violations),
            None if self.closed => violations.push(format!("{path}: 未声明的元素 <{}>", element.name)),
            None => {}
        }
        for child in element.child_elements() {
            let child_path = format!("{path}/{}", child.name);
            self.check_element(child, &child_path, violations);
        }
    }
}

impl SchemaValidator for StructuralSchema {
    fn validate(&self, resource: &str, document: &XmlDocument) -> ValidationResult<()> {
        let mut violations = Vec::new();
        if document.root.name != self.root {
            violations.push(format!(
                "根元素应为 <{}>，实际为 <{}>",
                self.root, document.root.name
            ));
        }
        self.check_element(&document.root, &format!("/{}", document.root.name), &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::failed(resource, violations))
        }
    }
}

fn compile_element(location: &str, element: &XmlElement) -> SchemaResult<ElementRule> {
    let invalid = |message: String| SchemaError::invalid(format!("{location}: {message}"));
    let closed = parse_flag(element.attribute("closed"), false).map_err(invalid)?;

    let mut attributes = Vec::new();
    for attribute in element.children_named("attribute") {
        let name = attribute
            .attribute("name")
            .ok_or_else(|| invalid("<attribute> 缺少 name 属性".into()))?;
        let required = parse_flag(attribute.attribute("required"), false).map_err(invalid)?;
        let pattern = attribute
            .attribute("pattern")
            .map(|p| Regex::new(&format!("^(?:{p})$")))
            .transpose()
            .map_err(|e| invalid(format!("属性 {name} 的 pattern 无效: {e}")))?;
        attributes.push(AttributeRule {
            name: name.to_string(),
            required,
            pattern,
        });
    }

    let mut children = Vec::new();
    for child in element.children_named("child") {
        let name = child
            .attribute("name")
            .ok_or_else(|| invalid("<child> 缺少 name 属性".into()))?;
        let min = match child.attribute("min") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| invalid(format!("子元素 {name} 的 min 无效: {value}")))?,
            None => 0,
        };
        let max = match child.attribute("max") {
            None | Some("unbounded") => None,
            Some(value) => Some(
                value
                    .parse::<usize>()
                    .map_err(|_| invalid(format!("子元素 {name} 的 max 无效: {value}")))?,
            ),
        };
        if max.is_some_and(|max| max < min) {
            return Err(invalid(format!("子元素 {name} 的 max 小于 min")));
        }
        children.push(ChildRule {
            name: name.to_string(),
            min,
            max,
        });
    }

    Ok(ElementRule {
        closed,
        attributes,
        children,
    })
}

fn check_rule(rule: &ElementRule, element: &XmlElement, path: &str, violations: &mut Vec<String>) {
    for attribute in &rule.attributes {
        match element.attribute(&attribute.name) {
            None if attribute.required => {
                violations.push(format!("{path}: 缺少必需属性 {}", attribute.name));
            }
            Some(value) => {
                if let Some(pattern) = &attribute.pattern {
                    if !pattern.is_match(value) {
                        violations.push(format!(
                            "{path}: 属性 {}=\"{value}\" 不匹配 {}",
                            attribute.name,
                            pattern.as_str()
                        ));
                    }
                }
            }
            None => {}
        }
    }

    if rule.closed {
        for (name, _) in &element.attributes {
            let declared = rule.attributes.iter().any(|a| &a.name == name);
            if !declared && !is_namespace_attribute(name) {
                violations.push(format!("{path}: 未声明的属性 {name}"));
            }
        }
        for child in element.child_elements() {
            if !rule.children.iter().any(|c| c.name == child.name) {
                violations.push(format!("{path}: 不允许的子元素 <{}>", child.name));
            }
        }
    }

    for child_rule in &rule.children {
        let count = element.children_named(&child_rule.name).count();
        if count < child_rule.min {
            violations.push(format!(
                "{path}: 子元素 <{}> 至少出现 {} 次，实际 {count} 次",
                child_rule.name, child_rule.min
            ));
        }
        if let Some(max) = child_rule.max {
            if count > max {
                violations.push(format!(
                    "{path}: 子元素 <{}> 至多出现 {max} 次，实际 {count} 次",
                    child_rule.name
                ));
            }
        }
    }
}

fn is_namespace_attribute(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:") || name.starts_with("xsi:")
}

fn parse_flag(value: Option<&str>, default: bool) -> Result<bool, String> {
    match value.map(str::trim) {
        None => Ok(default),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(format!("布尔值无效: {other}")),
    }
}

/// 文档自身声明的模式位置
///
/// 依次检查根元素的 `schema`、`xsi:noNamespaceSchemaLocation` 与 `schemaLocation`
/// （后者取最后一个空白分隔的片段）。
pub fn declared_schema_location(document: &XmlDocument) -> Option<String> {
    let root = &document.root;
    if let Some(location) = root.attribute("schema") {
        return Some(location.to_string());
    }
    if let Some(location) = root.attribute("xsi:noNamespaceSchemaLocation") {
        return Some(location.to_string());
    }
    root.attributes
        .iter()
        .find(|(name, _)| name == "schemaLocation" || name.ends_with(":schemaLocation"))
        .and_then(|(_, value)| value.split_whitespace().last())
        .map(str::to_string)
}

/// 结构化模式编译器
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralSchemaCompiler;

impl SchemaCompiler for StructuralSchemaCompiler {
    fn compile(&self, location: &str, source: &[u8]) -> SchemaResult<Arc<dyn SchemaValidator>> {
        Ok(Arc::new(StructuralSchema::compile(location, source)?))
    }
}
