//! 转换-验证管线
//!
//! 每个资源依次经过：读取、解析、占位符替换、模式验证、样式表转换。

use crate::placeholder::{PlaceholderEngine, XmlPropertyReplacer};
use crate::transform::{StylesheetCompiler, TransformCache};
use crate::validation::{declared_schema_location, StructuralSchemaCompiler};
use crate::xml::parse_document;
use config_abstractions::{
    DocumentReplacer, LoaderDefinition, PropertyReplacer, PropertySet, ResourceHandle,
    ResourceLocator, SchemaCompiler, SchemaValidator, Transformer, TransformerCompiler, XmlDocument,
};
use configurator_common::{
    ConfigError, ConfiguratorError, ConfiguratorResult, TransformError, ValidationError,
};
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, trace};

/// 转换的缓存键：显式标识或样式表位置，加上替换后内容的摘要
fn transform_cache_key(name: &str, substituted: &str) -> String {
    let mut hasher = DefaultHasher::new();
    substituted.hash(&mut hasher);
    format!("{}#{:016x}", name, hasher.finish())
}

/// 为单个加载器准备好的处理参数
///
/// 模式与转换在这里编译一次，之后该加载器的所有资源共享。
#[derive(Clone)]
pub struct PreparedLoader {
    loader_id: String,
    definition: LoaderDefinition,
    selector: String,
    schema: Option<Arc<dyn SchemaValidator>>,
    transformer: Option<Arc<dyn Transformer>>,
}

impl PreparedLoader {
    /// 加载器标识
    pub fn loader_id(&self) -> &str {
        &self.loader_id
    }

    /// 加载器定义
    pub fn definition(&self) -> &LoaderDefinition {
        &self.definition
    }

    /// 占位符替换后的选择器
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// 是否配置了显式模式
    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    /// 是否配置了转换
    pub fn has_transform(&self) -> bool {
        self.transformer.is_some()
    }
}

impl std::fmt::Debug for PreparedLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedLoader")
            .field("loader_id", &self.loader_id)
            .field("selector", &self.selector)
            .field("schema", &self.schema.is_some())
            .field("transform", &self.transformer.as_ref().map(|t| t.id().to_string()))
            .finish()
    }
}

/// 转换-验证管线
pub struct TransformValidatePipeline {
    validation_enabled: bool,
    replacer: XmlPropertyReplacer,
    locator: Arc<dyn ResourceLocator>,
    schema_compiler: Arc<dyn SchemaCompiler>,
    transformer_compiler: Arc<dyn TransformerCompiler>,
    transforms: TransformCache,
    declared_schemas: DashMap<String, Arc<dyn SchemaValidator>>,
}

impl TransformValidatePipeline {
    /// 创建管线，使用内置的结构化模式与样式表实现
    pub fn new(locator: Arc<dyn ResourceLocator>, engine: PlaceholderEngine) -> Self {
        Self {
            validation_enabled: true,
            replacer: XmlPropertyReplacer::new(engine),
            locator,
            schema_compiler: Arc::new(StructuralSchemaCompiler),
            transformer_compiler: Arc::new(StylesheetCompiler),
            transforms: TransformCache::new(),
            declared_schemas: DashMap::new(),
        }
    }

    /// 全局验证开关
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation_enabled = enabled;
        self
    }

    /// 替换模式编译器
    pub fn with_schema_compiler(mut self, compiler: Arc<dyn SchemaCompiler>) -> Self {
        self.schema_compiler = compiler;
        self
    }

    /// 替换转换编译器
    pub fn with_transformer_compiler(mut self, compiler: Arc<dyn TransformerCompiler>) -> Self {
        self.transformer_compiler = compiler;
        self
    }

    /// 占位符引擎
    pub fn engine(&self) -> &PlaceholderEngine {
        self.replacer.engine()
    }

    /// 已缓存的转换数量
    pub fn cached_transforms(&self) -> usize {
        self.transforms.len()
    }

    /// 准备加载器：替换选择器中的占位符，编译模式与转换
    ///
    /// 模式或样式表无效时立即失败，该加载器的任何资源都不会被处理。
    pub fn prepare(
        &self,
        loader_id: &str,
        definition: &LoaderDefinition,
        properties: &PropertySet,
    ) -> ConfiguratorResult<PreparedLoader> {
        let selector = self
            .engine()
            .replace_placeholders(definition.selector(), properties)?;

        let schema = match definition.schema() {
            Some(source) => Some(self.schema_compiler.compile(source.location(), source.content())?),
            None => None,
        };

        let transformer = match definition.transform() {
            Some(source) => {
                let text = String::from_utf8_lossy(source.content());
                let substituted = self
                    .engine()
                    .replace_placeholders(&text, properties)
                    .map_err(|e| TransformError::invalid_stylesheet(source.location(), e.to_string()))?;
                let cache_id = transform_cache_key(source.id().unwrap_or(source.location()), &substituted);
                let transformer = self.transforms.get_or_compile(&cache_id, || {
                    self.transformer_compiler.compile(&cache_id, substituted.as_bytes())
                })?;
                Some(transformer)
            }
            None => None,
        };

        debug!(
            "准备加载器 {}: 选择器 {}, 模式 {}, 转换 {}",
            loader_id,
            selector,
            schema.is_some(),
            transformer.is_some()
        );
        Ok(PreparedLoader {
            loader_id: loader_id.to_string(),
            definition: definition.clone(),
            selector,
            schema,
            transformer,
        })
    }

    /// 处理单个资源，返回定义语言文档
    ///
    /// 资源句柄在此被完整读取并关闭。错误附带加载器标识和资源位置。
    pub fn process(
        &self,
        prepared: &PreparedLoader,
        resource: ResourceHandle,
        properties: &PropertySet,
    ) -> ConfiguratorResult<XmlDocument> {
        let location = resource.location().to_string();
        self.process_inner(prepared, resource, &location, properties)
            .map_err(|e| e.in_resource(prepared.loader_id(), &location))
    }

    fn process_inner(
        &self,
        prepared: &PreparedLoader,
        resource: ResourceHandle,
        location: &str,
        properties: &PropertySet,
    ) -> ConfiguratorResult<XmlDocument> {
        trace!("读取资源: {}", location);
        let bytes = resource
            .read_all()
            .map_err(|source| ConfigError::ResourceReadError {
                resource: location.to_string(),
                source,
            })?;
        let parsed = parse_document(location, &bytes)?;
        let document = self.replacer.replace_in_document(&parsed, properties)?;

        if self.validation_enabled && prepared.definition.validation_enabled() {
            self.validate(prepared, location, &document)?;
        } else {
            trace!("跳过验证: {}", location);
        }

        match &prepared.transformer {
            Some(transformer) => {
                trace!("转换资源 {} (转换 {})", location, transformer.id());
                Ok(transformer.transform(&document)?)
            }
            None => Ok(document),
        }
    }

    fn validate(
        &self,
        prepared: &PreparedLoader,
        location: &str,
        document: &XmlDocument,
    ) -> ConfiguratorResult<()> {
        if let Some(schema) = &prepared.schema {
            schema.validate(location, document)?;
            debug!("资源 {} 通过验证", location);
            return Ok(());
        }

        let Some(declared) = declared_schema_location(document) else {
            trace!("资源 {} 未声明模式，仅检查格式", location);
            return Ok(());
        };
        let schema = self.declared_schema(location, &declared)?;
        schema.validate(location, document)?;
        debug!("资源 {} 通过声明的模式 {} 验证", location, declared);
        Ok(())
    }

    fn declared_schema(&self, resource: &str, declared: &str) -> ConfiguratorResult<Arc<dyn SchemaValidator>> {
        if let Some(cached) = self.declared_schemas.get(declared) {
            return Ok(cached.value().clone());
        }

        let unavailable = |message: String| ValidationError::DeclaredSchemaUnavailable {
            resource: resource.to_string(),
            schema: declared.to_string(),
            message,
        };
        let handle = self
            .locator
            .locate(declared)
            .map_err(|e| unavailable(e.to_string()))?
            .ok_or_else(|| unavailable("模式资源不存在".to_string()))?;
        let schema_location = handle.location().to_string();
        let bytes = handle.read_all().map_err(|e| unavailable(e.to_string()))?;
        let schema = self
            .schema_compiler
            .compile(&schema_location, &bytes)
            .map_err(ConfiguratorError::from)?;
        self.declared_schemas.insert(declared.to_string(), schema.clone());
        Ok(schema)
    }
}

impl std::fmt::Debug for TransformValidatePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformValidatePipeline")
            .field("validation_enabled", &self.validation_enabled)
            .field("transforms", &self.transforms)
            .field("declared_schemas", &self.declared_schemas.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::{EmbeddedResources, SelectorResolver};
    use config_abstractions::{ResourceOrigin, StreamSource};

    const SCHEMA: &str = r#"<schema root="components">
        <element name="component"><attribute name="type" required="true"/></element>
    </schema>"#;

    const STYLESHEET: &str = r#"<stylesheet passthrough="false">
        <template match="${plugin.element}">
            <set attribute="type" value="greeter"/>
            <copy from="name" to="id" required="true"/>
        </template>
    </stylesheet>"#;

    fn pipeline() -> TransformValidatePipeline {
        let resources = EmbeddedResources::new()
            .with_resource("schemas/components.xml", SCHEMA.as_bytes().to_vec());
        let locator = Arc::new(SelectorResolver::new(resources, "/nonexistent-configurator-root"));
        TransformValidatePipeline::new(locator, PlaceholderEngine::new())
    }

    fn handle(location: &str, content: &str) -> ResourceHandle {
        ResourceHandle::from_bytes(location, ResourceOrigin::Stream, Arc::from(content.as_bytes()))
    }

    fn properties() -> PropertySet {
        [("user", "world"), ("plugin.element", "plugin")].into_iter().collect()
    }

    #[test]
    fn test_substitutes_then_validates() {
        let pipeline = pipeline();
        let loader = LoaderDefinition::new("*.xml")
            .with_schema(StreamSource::new("schema.xml", SCHEMA.as_bytes().to_vec()));
        let prepared = pipeline.prepare("core", &loader, &properties()).unwrap();
        assert!(prepared.has_schema());

        let document = pipeline
            .process(
                &prepared,
                handle("a.xml", r#"<components><component type="t" id="${user}"/></components>"#),
                &properties(),
            )
            .unwrap();
        let component = document.root.child_elements().next().unwrap();
        assert_eq!(component.attribute("id"), Some("world"));

        let err = pipeline
            .process(&prepared, handle("b.xml", "<components><component/></components>"), &properties())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("b.xml"));
        assert!(err.to_string().contains("core"));
    }

    #[test]
    fn test_validation_toggles() {
        let loader = LoaderDefinition::new("*.xml")
            .with_schema(StreamSource::new("schema.xml", SCHEMA.as_bytes().to_vec()));
        let invalid = "<components><component/></components>";

        let disabled_globally = pipeline().with_validation(false);
        let prepared = disabled_globally.prepare("core", &loader, &properties()).unwrap();
        disabled_globally
            .process(&prepared, handle("a.xml", invalid), &properties())
            .unwrap();

        let pipeline = pipeline();
        let prepared = pipeline
            .prepare("core", &loader.clone().with_validation(false), &properties())
            .unwrap();
        pipeline.process(&prepared, handle("a.xml", invalid), &properties()).unwrap();
    }

    #[test]
    fn test_declared_schema() {
        let pipeline = pipeline();
        let prepared = pipeline
            .prepare("core", &LoaderDefinition::new("*.xml"), &properties())
            .unwrap();

        let err = pipeline
            .process(
                &prepared,
                handle("a.xml", r#"<components schema="schemas/components.xml"><component/></components>"#),
                &properties(),
            )
            .unwrap_err();
        assert!(err.is_validation());

        let err = pipeline
            .process(
                &prepared,
                handle("b.xml", r#"<components schema="schemas/missing.xml"/>"#),
                &properties(),
            )
            .unwrap_err();
        assert!(matches!(
            err.root_cause(),
            ConfiguratorError::Validation {
                source: ValidationError::DeclaredSchemaUnavailable { .. }
            }
        ));

        pipeline
            .process(&prepared, handle("c.xml", "<components/>"), &properties())
            .unwrap();
    }

    #[test]
    fn test_transform_is_substituted_and_cached() {
        let pipeline = pipeline();
        let loader = LoaderDefinition::new("*.xml")
            .with_transform(StreamSource::new("plugins.xsl", STYLESHEET.as_bytes().to_vec()));

        let prepared = pipeline.prepare("plugins", &loader, &properties()).unwrap();
        pipeline.prepare("plugins", &loader, &properties()).unwrap();
        assert_eq!(pipeline.cached_transforms(), 1);

        let document = pipeline
            .process(&prepared, handle("p.xml", r#"<plugins><plugin name="p1"/></plugins>"#), &properties())
            .unwrap();
        let component = document.root.child_elements().next().unwrap();
        assert_eq!(component.attribute("id"), Some("p1"));
        assert_eq!(component.attribute("type"), Some("greeter"));
    }

    #[test]
    fn test_transform_cache_follows_stylesheet_content() {
        let pipeline = pipeline();
        let first = LoaderDefinition::new("*.xml")
            .with_transform(StreamSource::new("plugins.xsl", STYLESHEET.as_bytes().to_vec()));
        let replaced = LoaderDefinition::new("*.xml").with_transform(StreamSource::new(
            "plugins.xsl",
            STYLESHEET.replace("greeter", "formatter").into_bytes(),
        ));

        pipeline.prepare("plugins", &first, &properties()).unwrap();
        let prepared = pipeline.prepare("plugins", &replaced, &properties()).unwrap();
        assert_eq!(pipeline.cached_transforms(), 2);

        let document = pipeline
            .process(&prepared, handle("p.xml", r#"<plugins><plugin name="p1"/></plugins>"#), &properties())
            .unwrap();
        let component = document.root.child_elements().next().unwrap();
        assert_eq!(component.attribute("type"), Some("formatter"));

        // 属性不同则替换后的样式表不同
        let other_properties: PropertySet = [("plugin.element", "addon")].into_iter().collect();
        pipeline.prepare("plugins", &first, &other_properties).unwrap();
        assert_eq!(pipeline.cached_transforms(), 3);
    }

    #[test]
    fn test_broken_schema_fails_prepare() {
        let loader = LoaderDefinition::new("*.xml").with_schema(StreamSource::new("s.xml", b"<nope/>".to_vec()));
        let err = pipeline().prepare("core", &loader, &properties()).unwrap_err();
        assert!(matches!(err, ConfiguratorError::Schema { .. }));
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let pipeline = pipeline();
        let prepared = pipeline
            .prepare("core", &LoaderDefinition::new("*.xml"), &properties())
            .unwrap();
        let err = pipeline
            .process(&prepared, handle("bad.xml", "<components>"), &properties())
            .unwrap_err();
        assert!(err.is_config());
    }
}
