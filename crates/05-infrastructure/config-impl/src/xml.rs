//! 文档解析与序列化

use config_abstractions::{XmlDocument, XmlElement, XmlNode};
use configurator_common::{ConfigError, ConfigResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write;

/// 解析文档
///
/// `resource` 仅用于错误信息。
pub fn parse_document(resource: &str, bytes: &[u8]) -> ConfigResult<XmlDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ConfigError::malformed(resource, format!("内容不是有效的 UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = Reader::from_str(text);
    let mut prolog = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(ConfigError::malformed(
                    resource,
                    format!("位置 {}: {e}", reader.buffer_position()),
                ))
            }
        };

        match event {
            Event::Start(start) => stack.push(element_from(resource, &start)?),
            Event::Empty(start) => {
                let element = element_from(resource, &start)?;
                attach(resource, &mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ConfigError::malformed(resource, "存在多余的结束标签"))?;
                attach(resource, &mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| ConfigError::malformed(resource, e.to_string()))?
                    .into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(value));
                } else if !value.trim().is_empty() {
                    return Err(ConfigError::malformed(resource, "根元素之外存在文本"));
                }
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| ConfigError::malformed(resource, e.to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::CData(value)),
                    None => return Err(ConfigError::malformed(resource, "根元素之外存在 CDATA")),
                }
            }
            Event::Comment(comment) => {
                let value = String::from_utf8_lossy(&comment.into_inner()).into_owned();
                push_misc(&mut stack, &mut prolog, root.is_some(), XmlNode::Comment(value));
            }
            Event::PI(instruction) => {
                let value = String::from_utf8_lossy(&instruction).into_owned();
                push_misc(
                    &mut stack,
                    &mut prolog,
                    root.is_some(),
                    XmlNode::ProcessingInstruction(value),
                );
            }
            Event::Decl(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(ConfigError::malformed(
            resource,
            format!("元素未闭合: <{}>", open.name),
        ));
    }

    let root = root.ok_or_else(|| ConfigError::malformed(resource, "缺少根元素"))?;
    Ok(XmlDocument { prolog, root })
}

fn element_from(resource: &str, start: &BytesStart<'_>) -> ConfigResult<XmlElement> {
    let name = String::from_utf8(start.name().as_ref().to_vec())
        .map_err(|e| ConfigError::malformed(resource, e.to_string()))?;
    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| ConfigError::malformed(resource, e.to_string()))?;
        let key = String::from_utf8(attribute.key.as_ref().to_vec())
            .map_err(|e| ConfigError::malformed(resource, e.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| ConfigError::malformed(resource, e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    resource: &str,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> ConfigResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(ConfigError::malformed(resource, "存在多个根元素"));
    }
    *root = Some(element);
    Ok(())
}

fn push_misc(stack: &mut [XmlElement], prolog: &mut Vec<XmlNode>, after_root: bool, node: XmlNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if !after_root {
        prolog.push(node);
    }
}

/// 序列化文档
pub fn write_document(document: &XmlDocument) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    for node in &document.prolog {
        write_node(&mut out, node);
        out.push('\n');
    }
    write_element(&mut out, &document.root);
    out
}

fn write_element(out: &mut String, element: &XmlElement) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        let _ = write!(out, " {}=\"{}\"", key, quick_xml::escape::escape(value.as_str()));
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        write_node(out, child);
    }
    let _ = write!(out, "</{}>", element.name);
}

fn write_node(out: &mut String, node: &XmlNode) {
    match node {
        XmlNode::Element(element) => write_element(out, element),
        XmlNode::Text(text) => out.push_str(&quick_xml::escape::escape(text.as_str())),
        XmlNode::CData(data) => {
            let _ = write!(out, "<![CDATA[{data}]]>");
        }
        XmlNode::Comment(comment) => {
            let _ = write!(out, "<!--{comment}-->");
        }
        XmlNode::ProcessingInstruction(instruction) => {
            let _ = write!(out, "<?{instruction}?>");
        }
    }
}
