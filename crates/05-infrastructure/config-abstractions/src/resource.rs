//! 资源抽象
//!
//! 选择器解析的结果是一组只读一次的资源流。流的所有权交给调用方，
//! 读取即消费，丢弃即关闭。

use configurator_common::ConfigResult;
use std::fmt;
use std::io::{Cursor, Read};
use std::sync::Arc;

/// 资源来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceOrigin {
    /// 内嵌资源空间
    Embedded,
    /// 工作目录下的文件系统
    Filesystem,
    /// 调用方直接提供的流
    Stream,
}

/// 单个可读资源
pub struct ResourceHandle {
    location: String,
    origin: ResourceOrigin,
    reader: Box<dyn Read + Send>,
}

impl ResourceHandle {
    /// 由读取器创建资源
    pub fn new(
        location: impl Into<String>,
        origin: ResourceOrigin,
        reader: Box<dyn Read + Send>,
    ) -> Self {
        Self {
            location: location.into(),
            origin,
            reader,
        }
    }

    /// 由内存中的字节创建资源
    pub fn from_bytes(location: impl Into<String>, origin: ResourceOrigin, bytes: Arc<[u8]>) -> Self {
        Self::new(location, origin, Box::new(Cursor::new(bytes)))
    }

    /// 资源位置（用于日志与错误信息）
    pub fn location(&self) -> &str {
        &self.location
    }

    /// 资源来源
    pub fn origin(&self) -> ResourceOrigin {
        self.origin
    }

    /// 读取全部内容并关闭资源
    pub fn read_all(mut self) -> std::io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.reader.read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("location", &self.location)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// 可枚举的资源空间
pub trait ResourceSpace: Send + Sync {
    /// 空间名称
    fn name(&self) -> &str;

    /// 列出全部资源路径（使用 `/` 分隔）
    fn list(&self) -> ConfigResult<Vec<String>>;

    /// 打开指定路径的资源
    fn open(&self, path: &str) -> ConfigResult<Option<ResourceHandle>>;
}

/// 按路径定位单个资源
pub trait ResourceLocator: Send + Sync {
    /// 定位资源，先查内嵌空间再查文件系统
    fn locate(&self, path: &str) -> ConfigResult<Option<ResourceHandle>>;
}

/// 选择器请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRequest {
    /// 主选择器
    pub selector: String,
    /// 主选择器无结果时使用的默认选择器
    pub default_selector: Option<String>,
    /// 主选择器是否搜索内嵌空间
    pub search_embedded: bool,
    /// 主选择器是否搜索文件系统
    pub search_filesystem: bool,
    /// 默认选择器是否搜索内嵌空间
    pub default_search_embedded: bool,
    /// 默认选择器是否搜索文件系统
    pub default_search_filesystem: bool,
    /// 命名空间范围，设置后选择器被视为该命名空间下的精确路径
    pub context: Option<String>,
}

impl SelectorRequest {
    /// 创建同时搜索两个空间的请求
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            default_selector: None,
            search_embedded: true,
            search_filesystem: true,
            default_search_embedded: true,
            default_search_filesystem: true,
            context: None,
        }
    }

    /// 设置默认选择器
    pub fn with_default_selector(mut self, default_selector: impl Into<String>) -> Self {
        self.default_selector = Some(default_selector.into());
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

    /// 设置命名空间范围
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// 选择器解析器
pub trait ResourceResolver: Send + Sync {
    /// 将选择器解析为有序的资源列表
    ///
    /// 主选择器无结果时回退到默认选择器；两者都无结果时返回空列表。
    fn resolve(&self, request: &SelectorRequest) -> ConfigResult<Vec<ResourceHandle>>;
}
