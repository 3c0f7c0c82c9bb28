//! 选择器解析实现
//!
//! 选择器是 glob 模式，分别在内嵌资源空间和工作目录树中匹配。
//! 结果顺序固定：先内嵌（按路径字典序），后文件系统（按路径字典序）。

use config_abstractions::{
    ResourceHandle, ResourceLocator, ResourceOrigin, ResourceResolver, ResourceSpace,
    SelectorRequest,
};
use configurator_common::{ConfigError, ConfigResult};
use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// 内嵌资源空间
///
/// 宿主程序通常用 `include_bytes!` 填充。
#[derive(Debug, Clone, Default)]
pub struct EmbeddedResources {
    resources: IndexMap<String, Arc<[u8]>>,
}

impl EmbeddedResources {
    /// 创建空的资源空间
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加资源
    pub fn with_resource(mut self, path: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        self.insert(path, content);
        self
    }

    /// 添加或替换资源
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Arc<[u8]>>) {
        let path = normalize(&path.into());
        self.resources.insert(path, content.into());
    }

    /// 是否包含资源
    pub fn contains(&self, path: &str) -> bool {
        self.resources.contains_key(&normalize(path))
    }

    /// 资源数量
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl ResourceSpace for EmbeddedResources {
    fn name(&self) -> &str {
        "embedded"
    }

    fn list(&self) -> ConfigResult<Vec<String>> {
        let mut paths: Vec<String> = self.resources.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }

    fn open(&self, path: &str) -> ConfigResult<Option<ResourceHandle>> {
        let path = normalize(path);
        Ok(self.resources.get(&path).map(|content| {
            ResourceHandle::from_bytes(
                format!("embedded:{path}"),
                ResourceOrigin::Embedded,
                content.clone(),
            )
        }))
    }
}

/// 工作目录文件系统空间
#[derive(Debug, Clone)]
pub struct FilesystemSpace {
    root: PathBuf,
}

impl FilesystemSpace {
    /// 以根目录创建
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

impl ResourceSpace for FilesystemSpace {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn list(&self) -> ConfigResult<Vec<String>> {
        if !self.root.is_dir() {
            debug!("工作目录不存在，跳过文件系统搜索: {}", self.root.display());
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/**/*",
            Pattern::escape(&self.root.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| ConfigError::InvalidSelector {
            selector: pattern.clone(),
            message: e.to_string(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => {
                    if let Some(relative) = self.relative(&path) {
                        paths.push(relative);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("无法读取目录项: {}", e),
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn open(&self, path: &str) -> ConfigResult<Option<ResourceHandle>> {
        let full_path = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.root.join(normalize(path))
        };
        if !full_path.is_file() {
            return Ok(None);
        }
        let file = File::open(&full_path).map_err(|source| ConfigError::ResourceReadError {
            resource: full_path.display().to_string(),
            source,
        })?;
        Ok(Some(ResourceHandle::new(
            full_path.display().to_string(),
            ResourceOrigin::Filesystem,
            Box::new(file),
        )))
    }
}

/// 选择器解析器
#[derive(Debug, Clone)]
pub struct SelectorResolver {
    embedded: Arc<EmbeddedResources>,
    filesystem: FilesystemSpace,
}

impl SelectorResolver {
    /// 创建解析器
    pub fn new(embedded: EmbeddedResources, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            embedded: Arc::new(embedded),
            filesystem: FilesystemSpace::new(working_dir),
        }
    }

    /// 内嵌资源空间
    pub fn embedded(&self) -> &EmbeddedResources {
        &self.embedded
    }

    /// 文件系统空间
    pub fn filesystem(&self) -> &FilesystemSpace {
        &self.filesystem
    }

    /// 在指定空间中按选择器选取资源
    pub fn select(
        &self,
        selector: &str,
        search_embedded: bool,
        search_filesystem: bool,
    ) -> ConfigResult<Vec<ResourceHandle>> {
        let pattern = compile_selector(selector)?;
        let mut handles = Vec::new();

        if search_embedded {
            collect_matches(self.embedded.as_ref(), &pattern, &mut handles)?;
        }
        if search_filesystem {
            collect_matches(&self.filesystem, &pattern, &mut handles)?;
        }

        debug!("选择器 {} 匹配到 {} 个资源", selector, handles.len());
        Ok(handles)
    }

    /// 在命名空间下按精确路径选取内嵌资源
    fn select_in_context(&self, context: &str, selector: &str) -> ConfigResult<Vec<ResourceHandle>> {
        let path = format!("{}/{}", context.replace('.', "/"), normalize(selector));
        match self.embedded.open(&path)? {
            Some(handle) => Ok(vec![handle]),
            None => {
                debug!("命名空间 {} 下不存在资源: {}", context, path);
                Ok(Vec::new())
            }
        }
    }

    fn select_request(
        &self,
        selector: &str,
        context: Option<&str>,
        search_embedded: bool,
        search_filesystem: bool,
    ) -> ConfigResult<Vec<ResourceHandle>> {
        if selector.trim().is_empty() {
            return Ok(Vec::new());
        }
        match context {
            Some(_) if !search_embedded => {
                debug!("命名空间只在内嵌资源中查找，已关闭内嵌搜索: {}", selector);
                Ok(Vec::new())
            }
            Some(context) => self.select_in_context(context, selector),
            None => self.select(selector, search_embedded, search_filesystem),
        }
    }
}

impl ResourceResolver for SelectorResolver {
    fn resolve(&self, request: &SelectorRequest) -> ConfigResult<Vec<ResourceHandle>> {
        let primary = self.select_request(
            &request.selector,
            request.context.as_deref(),
            request.search_embedded,
            request.search_filesystem,
        )?;
        if !primary.is_empty() {
            return Ok(primary);
        }

        match &request.default_selector {
            Some(default_selector) => {
                debug!(
                    "选择器 {} 无匹配，使用默认选择器 {}",
                    request.selector, default_selector
                );
                self.select_request(
                    default_selector,
                    request.context.as_deref(),
                    request.default_search_embedded,
                    request.default_search_filesystem,
                )
            }
            None => Ok(Vec::new()),
        }
    }
}

impl ResourceLocator for SelectorResolver {
    fn locate(&self, path: &str) -> ConfigResult<Option<ResourceHandle>> {
        if let Some(handle) = self.embedded.open(path)? {
            return Ok(Some(handle));
        }
        self.filesystem.open(path)
    }
}

fn compile_selector(selector: &str) -> ConfigResult<Pattern> {
    Pattern::new(&normalize(selector)).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn collect_matches(
    space: &dyn ResourceSpace,
    pattern: &Pattern,
    handles: &mut Vec<ResourceHandle>,
) -> ConfigResult<()> {
    for path in space.list()? {
        if pattern.matches_with(&path, MATCH_OPTIONS) {
            if let Some(handle) = space.open(&path)? {
                handles.push(handle);
            }
        }
    }
    Ok(())
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").trim_start_matches('/').to_string()
}
