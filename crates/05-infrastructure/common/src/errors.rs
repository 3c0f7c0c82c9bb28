//! 错误类型定义

use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("模块标识重复: {identity}, 已由加载器 {existing_loader} 定义, 加载器 {new_loader} 不允许覆盖")]
    DuplicateDefinition {
        identity: String,
        existing_loader: String,
        new_loader: String,
    },

    #[error("加载器标识重复: {loader_id}")]
    DuplicateLoader { loader_id: String },

    #[error("未知的加载器: {loader_id}")]
    UnknownLoader { loader_id: String },

    #[error("选择器无效: {selector}, 原因: {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("占位符循环引用: {token}")]
    PlaceholderCycle { token: String },

    #[error("占位符解析超过最大深度 {max_depth}: {token}")]
    PlaceholderDepthExceeded { token: String, max_depth: usize },

    #[error("无法解析占位符: {token}")]
    UnresolvablePlaceholder { token: String },

    #[error("资源不存在: {path}")]
    FileNotFound { path: String },

    #[error("资源读取失败: {resource}, 原因: {source}")]
    ResourceReadError {
        resource: String,
        source: std::io::Error,
    },

    #[error("配置解析失败: {resource}, 原因: {source}")]
    ParseError {
        resource: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("文档格式错误: {resource}, 原因: {message}")]
    MalformedDocument { resource: String, message: String },

    #[error("组件定义无效: {identity}, 原因: {message}")]
    InvalidDefinition { identity: String, message: String },

    #[error("引擎设置加载失败: {message}")]
    SettingsError { message: String },

    #[error("状态无效: {message}")]
    InvalidState { message: String },
}

impl ConfigError {
    /// 创建重复定义错误
    pub fn duplicate_definition(
        identity: impl Into<String>,
        existing_loader: impl Into<String>,
        new_loader: impl Into<String>,
    ) -> Self {
        Self::DuplicateDefinition {
            identity: identity.into(),
            existing_loader: existing_loader.into(),
            new_loader: new_loader.into(),
        }
    }

    /// 创建文档格式错误
    pub fn malformed(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// 创建组件定义错误
    pub fn invalid_definition(identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            identity: identity.into(),
            message: message.into(),
        }
    }

    /// 创建状态错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

/// 模式（schema）错误类型
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("模式文档不可读: {location}, 原因: {message}")]
    Unreadable { location: String, message: String },

    #[error("模式文档无效: {message}")]
    InvalidSchema { message: String },
}

impl SchemaError {
    /// 创建模式无效错误
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }
}

/// 验证错误类型
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("文档验证失败: {resource}, 违规项: {violations:?}")]
    ValidationFailed {
        resource: String,
        violations: Vec<String>,
    },

    #[error("文档声明的模式无法使用: {resource}, 模式: {schema}, 原因: {message}")]
    DeclaredSchemaUnavailable {
        resource: String,
        schema: String,
        message: String,
    },
}

impl ValidationError {
    /// 创建验证失败错误
    pub fn failed(resource: impl Into<String>, violations: Vec<String>) -> Self {
        Self::ValidationFailed {
            resource: resource.into(),
            violations,
        }
    }

    /// 返回违规项列表
    pub fn violations(&self) -> &[String] {
        match self {
            Self::ValidationFailed { violations, .. } => violations,
            Self::DeclaredSchemaUnavailable { .. } => &[],
        }
    }
}

/// 转换错误类型
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("样式表无效: {transform_id}, 原因: {message}")]
    InvalidStylesheet {
        transform_id: String,
        message: String,
    },

    #[error("文档转换失败: {transform_id}, 原因: {message}")]
    TransformationFailed {
        transform_id: String,
        message: String,
    },
}

impl TransformError {
    /// 创建样式表无效错误
    pub fn invalid_stylesheet(transform_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidStylesheet {
            transform_id: transform_id.into(),
            message: message.into(),
        }
    }

    /// 创建转换失败错误
    pub fn failed(transform_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransformationFailed {
            transform_id: transform_id.into(),
            message: message.into(),
        }
    }
}

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("模块未注册: {identity}")]
    ComponentNotRegistered { identity: String },

    #[error("未知的组件类型: {identity} ({component_type})")]
    UnknownComponentType {
        identity: String,
        component_type: String,
    },

    #[error("组件创建失败: {identity}, 原因: {source}")]
    ComponentCreationFailed {
        identity: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("方法调用失败: {target}.{method}, 原因: {message}")]
    InvocationFailed {
        target: String,
        method: String,
        message: String,
    },

    #[error("属性类型不匹配: {identity}.{property}, 期望 {expected}")]
    PropertyTypeMismatch {
        identity: String,
        property: String,
        expected: String,
    },

    #[error("必需属性缺失: {identity}.{property}")]
    MissingProperty { identity: String, property: String },
}

impl DependencyError {
    /// 创建未注册错误
    pub fn not_registered(identity: impl Into<String>) -> Self {
        Self::ComponentNotRegistered {
            identity: identity.into(),
        }
    }

    /// 创建方法调用失败错误
    pub fn invocation_failed(
        target: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvocationFailed {
            target: target.into(),
            method: method.into(),
            message: message.into(),
        }
    }
}

/// 生命周期管理错误类型
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("作用域已释放: {scope}")]
    ScopeReleased { scope: String },

    #[error("作用域销毁失败: {scope}, 原因: {message}")]
    ScopeDestructionFailed { scope: String, message: String },
}

/// 配置引擎顶层错误类型
#[derive(Error, Debug)]
pub enum ConfiguratorError {
    #[error("配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("模式错误: {source}")]
    Schema {
        #[from]
        source: SchemaError,
    },

    #[error("验证错误: {source}")]
    Validation {
        #[from]
        source: ValidationError,
    },

    #[error("转换错误: {source}")]
    Transform {
        #[from]
        source: TransformError,
    },

    #[error("依赖注入错误: {source}")]
    Dependency {
        #[from]
        source: DependencyError,
    },

    #[error("生命周期错误: {source}")]
    Lifecycle {
        #[from]
        source: LifecycleError,
    },

    #[error("加载器 {loader_id} 处理资源 {resource} 失败: {source}")]
    ResourceFailed {
        loader_id: String,
        resource: String,
        source: Box<ConfiguratorError>,
    },

    #[error("模块 {identity} (加载器 {origin_loader}) 构建失败: {source}")]
    ConstructionFailed {
        identity: String,
        origin_loader: String,
        source: DependencyError,
    },
}

impl ConfiguratorError {
    /// 为错误附加加载器与资源信息
    pub fn in_resource(
        self,
        loader_id: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self::ResourceFailed {
            loader_id: loader_id.into(),
            resource: resource.into(),
            source: Box::new(self),
        }
    }

    /// 去掉资源包装后的根本错误
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::ResourceFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// 是否为验证失败
    pub fn is_validation(&self) -> bool {
        matches!(self.root_cause(), Self::Validation { .. })
    }

    /// 是否为配置错误
    pub fn is_config(&self) -> bool {
        matches!(self.root_cause(), Self::Config { .. })
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SchemaResult<T> = Result<T, SchemaError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type TransformResult<T> = Result<T, TransformError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type LifecycleResult<T> = Result<T, LifecycleError>;
pub type ConfiguratorResult<T> = Result<T, ConfiguratorError>;
