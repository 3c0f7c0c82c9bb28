//! 引擎核心设置

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 资源失败的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceFailurePolicy {
    /// 记录并跳过失败的资源，同一加载器的其他资源继续处理
    Isolate,
    /// 第一个失败的资源终止启动，该加载器的定义全部丢弃
    AbortLoader,
}

impl Default for ResourceFailurePolicy {
    fn default() -> Self {
        Self::Isolate
    }
}

/// 引擎核心设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    /// 全局验证开关
    pub validation_enabled: bool,
    /// 嵌套加载器能否重新定义已知的加载器标识
    pub user_loader_overriding_allowed: bool,
    /// 无法解析的占位符是否报错
    pub strict_placeholders: bool,
    /// 占位符递归的最大深度
    pub max_placeholder_depth: usize,
    /// 资源失败的处理策略
    pub resource_failure_policy: ResourceFailurePolicy,
    /// 文件系统搜索根目录，缺省为进程工作目录
    pub working_dir: Option<PathBuf>,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            validation_enabled: true,
            user_loader_overriding_allowed: false,
            strict_placeholders: false,
            max_placeholder_depth: 32,
            resource_failure_policy: ResourceFailurePolicy::Isolate,
            working_dir: None,
        }
    }
}

impl CoreSettings {
    /// 设置全局验证开关
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    /// 允许嵌套加载器重新定义已知的加载器
    pub fn with_user_loader_overriding(mut self, allowed: bool) -> Self {
        self.user_loader_overriding_allowed = allowed;
        self
    }

    /// 设置严格占位符模式
    pub fn with_strict_placeholders(mut self, strict: bool) -> Self {
        self.strict_placeholders = strict;
        self
    }

    /// 设置资源失败策略
    pub fn with_resource_failure_policy(mut self, policy: ResourceFailurePolicy) -> Self {
        self.resource_failure_policy = policy;
        self
    }

    /// 设置文件系统搜索根目录
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// 解析后的文件系统根目录
    pub fn resolved_working_dir(&self) -> PathBuf {
        self.working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
