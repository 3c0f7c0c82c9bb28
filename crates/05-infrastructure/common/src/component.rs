//! 组件定义
//!
//! 描述“如何构建一个模块”的声明式记录。定义本身不持有任何实例，
//! 由外部容器能力（组件工厂）解释其中的类型与属性。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 实例化阶段
///
/// 决定定义在启动调度中的构建时机，在定义创建时即确定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// 最先执行（工厂类适配器的默认阶段）
    Head,
    /// 普通组件
    Body,
    /// 在其他阶段之后执行（初始化类适配器）
    Tail,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Body
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Body => write!(f, "body"),
            Self::Tail => write!(f, "tail"),
        }
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "head" | "factory" => Ok(Self::Head),
            "body" => Ok(Self::Body),
            "tail" | "init" => Ok(Self::Tail),
            other => Err(format!("未知的实例化阶段: {other}")),
        }
    }
}

/// 定义冲突时的覆盖策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// 拒绝覆盖，产生配置错误
    Reject,
    /// 覆盖并记录警告
    WarnAndReplace,
    /// 静默覆盖
    Replace,
}

impl OverridePolicy {
    /// 由“是否允许覆盖”标志推导策略
    pub fn from_allow_override(allow: bool) -> Self {
        if allow {
            Self::WarnAndReplace
        } else {
            Self::Reject
        }
    }

    /// 是否允许覆盖
    pub fn allows_override(self) -> bool {
        !matches!(self, Self::Reject)
    }
}

impl Default for OverridePolicy {
    fn default() -> Self {
        Self::Reject
    }
}

/// 属性值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// 字面量（占位符已替换）
    Literal(String),
    /// 对另一个模块标识的引用
    Reference(String),
    /// 值列表
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// 创建字面量
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// 创建引用
    pub fn reference(identity: impl Into<String>) -> Self {
        Self::Reference(identity.into())
    }

    /// 收集该值直接或间接引用的模块标识
    pub fn references(&self) -> Vec<&str> {
        match self {
            Self::Literal(_) => Vec::new(),
            Self::Reference(identity) => vec![identity.as_str()],
            Self::List(values) => values.iter().flat_map(Self::references).collect(),
        }
    }
}

/// 定义种类
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinitionKind {
    /// 由组件工厂按类型名构建的组件
    Component { component_type: String },
    /// 仅参与构建过程的方法调用适配器
    Invocation {
        target: String,
        method: String,
        arguments: Vec<PropertyValue>,
    },
}

/// 组件定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// 模块标识
    pub identity: String,
    /// 是否为匿名（合成标识）定义
    pub anonymous: bool,
    /// 定义种类
    pub kind: DefinitionKind,
    /// 实例化阶段
    pub phase: Phase,
    /// 属性，按声明顺序
    pub properties: IndexMap<String, PropertyValue>,
    /// 贡献该定义的加载器标识
    pub origin_loader: String,
    /// 贡献该定义的资源
    pub origin_resource: Option<String>,
}

impl ComponentDefinition {
    /// 创建组件定义
    pub fn component(identity: impl Into<String>, component_type: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            anonymous: false,
            kind: DefinitionKind::Component {
                component_type: component_type.into(),
            },
            phase: Phase::Body,
            properties: IndexMap::new(),
            origin_loader: String::new(),
            origin_resource: None,
        }
    }

    /// 创建方法调用适配器定义，默认位于首阶段
    pub fn invocation(
        identity: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            anonymous: false,
            kind: DefinitionKind::Invocation {
                target: target.into(),
                method: method.into(),
                arguments: Vec::new(),
            },
            phase: Phase::Head,
            properties: IndexMap::new(),
            origin_loader: String::new(),
            origin_resource: None,
        }
    }

    /// 标记为匿名定义
    pub fn with_anonymous(mut self, anonymous: bool) -> Self {
        self.anonymous = anonymous;
        self
    }

    /// 设置实例化阶段
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// 添加属性
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// 添加调用参数（仅对调用适配器有效）
    pub fn with_argument(mut self, argument: PropertyValue) -> Self {
        if let DefinitionKind::Invocation { arguments, .. } = &mut self.kind {
            arguments.push(argument);
        }
        self
    }

    /// 设置来源
    pub fn with_origin(mut self, loader: impl Into<String>, resource: Option<String>) -> Self {
        self.origin_loader = loader.into();
        self.origin_resource = resource;
        self
    }

    /// 组件类型名，调用适配器返回 `None`
    pub fn component_type(&self) -> Option<&str> {
        match &self.kind {
            DefinitionKind::Component { component_type } => Some(component_type),
            DefinitionKind::Invocation { .. } => None,
        }
    }

    /// 是否为方法调用适配器
    pub fn is_invocation(&self) -> bool {
        matches!(self.kind, DefinitionKind::Invocation { .. })
    }

    /// 获取属性
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}
