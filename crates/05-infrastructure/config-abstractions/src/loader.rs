//! 加载器定义
//!
//! 加载器描述“从哪里取资源、如何转换、是否验证、冲突如何处理”。
//! 创建后不可变，修改只能通过消费式的 `with_*` 方法得到新值。

use crate::resource::SelectorRequest;
use configurator_common::OverridePolicy;
use std::fmt;
use std::sync::Arc;

/// 转换或模式的内容来源
#[derive(Clone, PartialEq, Eq)]
pub struct StreamSource {
    id: Option<String>,
    location: String,
    content: Arc<[u8]>,
}

impl StreamSource {
    /// 由内容创建来源
    pub fn new(location: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: None,
            location: location.into(),
            content: content.into(),
        }
    }

    /// 设置缓存标识，相同标识的转换只编译一次
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// 缓存标识
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// 来源位置
    pub fn location(&self) -> &str {
        &self.location
    }

    /// 内容
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

impl fmt::Debug for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSource")
            .field("id", &self.id)
            .field("location", &self.location)
            .field("len", &self.content.len())
            .finish()
    }
}

/// 加载器定义
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderDefinition {
    selector: String,
    default_selector: Option<String>,
    transform: Option<StreamSource>,
    schema: Option<StreamSource>,
    search_embedded: bool,
    search_filesystem: bool,
    default_search_embedded: bool,
    default_search_filesystem: bool,
    override_policy: OverridePolicy,
    validation_enabled: bool,
    context: Option<String>,
}

impl LoaderDefinition {
    /// 以选择器创建加载器定义
    ///
    /// 默认搜索内嵌空间和文件系统、不允许覆盖、启用验证。
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            default_selector: None,
            transform: None,
            schema: None,
            search_embedded: true,
            search_filesystem: true,
            default_search_embedded: true,
            default_search_filesystem: true,
            override_policy: OverridePolicy::Reject,
            validation_enabled: true,
            context: None,
        }
    }

    /// 设置默认选择器
    pub fn with_default_selector(mut self, selector: impl Into<String>) -> Self {
        self.default_selector = Some(selector.into());
        self
    }

    /// 设置转换
    pub fn with_transform(mut self, transform: StreamSource) -> Self {
        self.transform = Some(transform);
        self
    }

    /// 设置模式
    pub fn with_schema(mut self, schema: StreamSource) -> Self {
        self.schema = Some(schema);
        self
    }

    /// 设置主选择器的搜索范围
    pub fn with_search(mut self, embedded: bool, filesystem: bool) -> Self {
        self.search_embedded = embedded;
        self.search_filesystem = filesystem;
        self
    }

    /// 设置默认选择器的搜索范围
    pub fn with_default_search(mut self, embedded: bool, filesystem: bool) -> Self {
        self.default_search_embedded = embedded;
        self.default_search_filesystem = filesystem;
        self
    }

    /// 设置是否允许覆盖已有定义
    pub fn with_allow_override(mut self, allow: bool) -> Self {
        self.override_policy = OverridePolicy::from_allow_override(allow);
        self
    }

    /// 直接设置覆盖策略
    pub fn with_override_policy(mut self, policy: OverridePolicy) -> Self {
        self.override_policy = policy;
        self
    }

    /// 设置是否启用验证
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    /// 设置命名空间范围
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// 主选择器
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// 默认选择器
    pub fn default_selector(&self) -> Option<&str> {
        self.default_selector.as_deref()
    }

    /// 转换
    pub fn transform(&self) -> Option<&StreamSource> {
        self.transform.as_ref()
    }

    /// 模式
    pub fn schema(&self) -> Option<&StreamSource> {
        self.schema.as_ref()
    }

    /// 覆盖策略
    pub fn override_policy(&self) -> OverridePolicy {
        self.override_policy
    }

    /// 是否允许覆盖
    pub fn allow_override(&self) -> bool {
        self.override_policy.allows_override()
    }

    /// 是否启用验证
    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    /// 命名空间范围
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// 生成选择器请求，`selector` 为占位符替换后的主选择器
    pub fn selector_request(&self, selector: impl Into<String>) -> SelectorRequest {
        let mut request = SelectorRequest::new(selector)
            .with_search(self.search_embedded, self.search_filesystem)
            .with_default_search(self.default_search_embedded, self.default_search_filesystem);
        if let Some(default_selector) = &self.default_selector {
            request = request.with_default_selector(default_selector.clone());
        }
        if let Some(context) = &self.context {
            request = request.with_context(context.clone());
        }
        request
    }
}
