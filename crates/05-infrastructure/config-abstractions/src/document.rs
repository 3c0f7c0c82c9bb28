//! 结构化文档模型
//!
//! 资源在管道中以树形文档的形式流转：占位符替换、模式验证和样式转换
//! 都作用于这一模型。

/// 文档节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// 元素
    Element(XmlElement),
    /// 文本
    Text(String),
    /// CDATA 段
    CData(String),
    /// 注释
    Comment(String),
    /// 处理指令
    ProcessingInstruction(String),
}

/// 文档元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// 创建空元素
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// 添加属性
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// 添加子元素
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// 添加文本子节点
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// 获取属性值
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// 设置属性值（已存在时替换）
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    /// 子元素迭代器
    pub fn child_elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// 指定名称的子元素
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.child_elements().filter(move |child| child.name == name)
    }

    /// 拼接直接子文本与 CDATA 内容
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) | XmlNode::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// 文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    /// 根元素之前的注释和处理指令
    pub prolog: Vec<XmlNode>,
    /// 根元素
    pub root: XmlElement,
}

impl XmlDocument {
    /// 以根元素创建文档
    pub fn new(root: XmlElement) -> Self {
        Self {
            prolog: Vec::new(),
            root,
        }
    }
}
