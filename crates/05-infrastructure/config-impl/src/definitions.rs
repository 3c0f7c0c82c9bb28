//! 组件定义语言读取
//!
//! 根元素 `<components>` 下允许 `<component>`、`<invoke>`、`<loader>` 与 `<properties>`。

use config_abstractions::{LoaderDefinition, PropertySet, ResourceLocator, StreamSource, XmlDocument, XmlElement};
use configurator_common::{
    synthetic_identity, ComponentDefinition, ConfigError, ConfigResult, Phase, PropertyValue,
};
use std::collections::HashMap;
use tracing::debug;

/// 定义语言的根元素名
pub const DEFINITIONS_ROOT: &str = "components";

/// 单个文档读出的全部内容
#[derive(Debug, Default)]
pub struct DefinitionBatch {
    /// 组件与调用适配器定义，按文档顺序（内部组件位于其外层组件之前）
    pub components: Vec<ComponentDefinition>,
    /// 嵌套加载器
    pub loaders: Vec<(String, LoaderDefinition)>,
    /// 注入核心属性聚合器的属性
    pub properties: PropertySet,
}

impl DefinitionBatch {
    /// 是否没有任何内容
    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.loaders.is_empty() && self.properties.is_empty()
    }
}

/// 读取文档中的定义
pub fn read_definitions(
    loader_id: &str,
    resource: &str,
    document: &XmlDocument,
    locator: &dyn ResourceLocator,
) -> ConfigResult<DefinitionBatch> {
    let mut reader = DefinitionReader {
        loader_id,
        resource,
        locator,
        counters: HashMap::new(),
        batch: DefinitionBatch::default(),
    };
    reader.read(document)?;
    debug!(
        "读取定义: {} -> {} 个组件, {} 个加载器, {} 个属性",
        resource,
        reader.batch.components.len(),
        reader.batch.loaders.len(),
        reader.batch.properties.len()
    );
    Ok(reader.batch)
}

struct DefinitionReader<'a> {
    loader_id: &'a str,
    resource: &'a str,
    locator: &'a dyn ResourceLocator,
    counters: HashMap<String, usize>,
    batch: DefinitionBatch,
}

impl DefinitionReader<'_> {
    fn read(&mut self, document: &XmlDocument) -> ConfigResult<()> {
        let root = &document.root;
        if root.name != DEFINITIONS_ROOT {
            return Err(ConfigError::malformed(
                self.resource,
                format!("根元素应为 <{DEFINITIONS_ROOT}>，实际为 <{}>", root.name),
            ));
        }

        for element in root.child_elements() {
            match element.name.as_str() {
                "component" => {
                    self.read_component(element)?;
                }
                "invoke" => self.read_invocation(element)?,
                "loader" => self.read_loader(element)?,
                "properties" => self.read_properties(element)?,
                other => {
                    return Err(ConfigError::malformed(
                        self.resource,
                        format!("不支持的元素 <{other}>"),
                    ))
                }
            }
        }
        Ok(())
    }

    fn next_synthetic(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_string()).or_insert(0);
        let identity = synthetic_identity(base, *counter);
        *counter += 1;
        identity
    }

    fn identity_for(&mut self, element: &XmlElement, base: &str) -> (String, bool) {
        match element.attribute("id").filter(|id| !id.trim().is_empty()) {
            Some(id) => (id.trim().to_string(), false),
            None => (self.next_synthetic(base), true),
        }
    }

    fn phase_for(&self, element: &XmlElement, identity: &str, default: Phase) -> ConfigResult<Phase> {
        match element.attribute("phase") {
            Some(phase) => phase
                .parse()
                .map_err(|message: String| ConfigError::invalid_definition(identity, message)),
            None => Ok(default),
        }
    }

    /// 读取组件，返回其标识
    fn read_component(&mut self, element: &XmlElement) -> ConfigResult<String> {
        let component_type = element
            .attribute("type")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::invalid_definition(
                    element.attribute("id").unwrap_or("<anonymous>"),
                    "组件缺少 type 属性",
                )
            })?
            .trim()
            .to_string();
        let (identity, anonymous) = self.identity_for(element, &component_type);
        let phase = self.phase_for(element, &identity, Phase::Body)?;

        let mut definition = ComponentDefinition::component(identity.clone(), component_type)
            .with_anonymous(anonymous)
            .with_phase(phase)
            .with_origin(self.loader_id, Some(self.resource.to_string()));

        for property in element.children_named("property") {
            let name = property
                .attribute("name")
                .ok_or_else(|| ConfigError::invalid_definition(&identity, "<property> 缺少 name 属性"))?;
            let value = self.read_property_value(&identity, property)?;
            definition.properties.insert(name.to_string(), value);
        }

        self.batch.components.push(definition);
        Ok(identity)
    }

    fn read_property_value(&mut self, owner: &str, element: &XmlElement) -> ConfigResult<PropertyValue> {
        if let Some(value) = element.attribute("value") {
            return Ok(PropertyValue::literal(value));
        }
        if let Some(reference) = element.attribute("ref") {
            return Ok(PropertyValue::reference(reference));
        }
        match element.child_elements().next() {
            Some(child) => self.read_value(owner, child),
            None => {
                let text = element.text();
                if text.trim().is_empty() {
                    Err(ConfigError::invalid_definition(
                        owner,
                        format!("{} 缺少值", element.attribute("name").unwrap_or("<argument>")),
                    ))
                } else {
                    Ok(PropertyValue::literal(text.trim()))
                }
            }
        }
    }

    fn read_value(&mut self, owner: &str, element: &XmlElement) -> ConfigResult<PropertyValue> {
        match element.name.as_str() {
            "value" => Ok(PropertyValue::literal(element.text())),
            "ref" => {
                let target = element
                    .attribute("component")
                    .map(str::to_string)
                    .unwrap_or_else(|| element.text().trim().to_string());
                if target.is_empty() {
                    return Err(ConfigError::invalid_definition(owner, "<ref> 缺少引用目标"));
                }
                Ok(PropertyValue::Reference(target))
            }
            "list" => {
                let items = element
                    .child_elements()
                    .map(|item| self.read_value(owner, item))
                    .collect::<ConfigResult<Vec<_>>>()?;
                Ok(PropertyValue::List(items))
            }
            "component" => {
                let mut inner = element.clone();
                inner.attributes.retain(|(name, _)| name != "id");
                let identity = self.read_component(&inner)?;
                Ok(PropertyValue::Reference(identity))
            }
            other => Err(ConfigError::invalid_definition(
                owner,
                format!("不支持的值元素 <{other}>"),
            )),
        }
    }

    fn read_invocation(&mut self, element: &XmlElement) -> ConfigResult<()> {
        let (identity, anonymous) = self.identity_for(element, "invoke");
        let target = element
            .attribute("target")
            .ok_or_else(|| ConfigError::invalid_definition(&identity, "<invoke> 缺少 target 属性"))?;
        let method = element
            .attribute("method")
            .ok_or_else(|| ConfigError::invalid_definition(&identity, "<invoke> 缺少 method 属性"))?;
        let phase = self.phase_for(element, &identity, Phase::Head)?;

        let mut definition = ComponentDefinition::invocation(identity.clone(), target, method)
            .with_anonymous(anonymous)
            .with_phase(phase)
            .with_origin(self.loader_id, Some(self.resource.to_string()));
        for argument in element.children_named("argument") {
            let value = self.read_property_value(&identity, argument)?;
            definition = definition.with_argument(value);
        }

        self.batch.components.push(definition);
        Ok(())
    }

    fn read_loader(&mut self, element: &XmlElement) -> ConfigResult<()> {
        let id = element
            .attribute("id")
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ConfigError::malformed(self.resource, "<loader> 缺少 id 属性"))?
            .trim()
            .to_string();
        let selector = element
            .attribute("selector")
            .ok_or_else(|| ConfigError::invalid_definition(&id, "<loader> 缺少 selector 属性"))?;

        let flag = |name: &str, default: bool| -> ConfigResult<bool> {
            match element.attribute(name).map(str::trim) {
                None => Ok(default),
                Some("true") => Ok(true),
                Some("false") => Ok(false),
                Some(other) => Err(ConfigError::invalid_definition(
                    &id,
                    format!("{name} 取值无效: {other}"),
                )),
            }
        };

        let mut loader = LoaderDefinition::new(selector)
            .with_search(flag("loadFromClassPath", true)?, flag("loadFromWorkingDir", true)?)
            .with_default_search(
                flag("defaultLoadFromClassPath", true)?,
                flag("defaultLoadFromWorkingDir", true)?,
            )
            .with_allow_override(flag("beanOverridingAllowed", false)?)
            .with_validation(flag("validationEnabled", true)?);

        if let Some(default_selector) = element.attribute("defaultSelector").filter(|s| !s.is_empty()) {
            loader = loader.with_default_selector(default_selector);
        }
        if let Some(context) = element.attribute("context").filter(|s| !s.is_empty()) {
            loader = loader.with_context(context);
        }
        if let Some(path) = element.attribute("xslt").filter(|s| !s.is_empty()) {
            loader = loader.with_transform(self.load_stream(path)?);
        }
        if let Some(path) = element.attribute("xsd").filter(|s| !s.is_empty()) {
            loader = loader.with_schema(self.load_stream(path)?);
        }

        self.batch.loaders.push((id, loader));
        Ok(())
    }

    fn load_stream(&self, path: &str) -> ConfigResult<StreamSource> {
        let handle = self
            .locator
            .locate(path)?
            .ok_or_else(|| ConfigError::FileNotFound {
                path: path.to_string(),
            })?;
        let location = handle.location().to_string();
        let content = handle.read_all().map_err(|source| ConfigError::ResourceReadError {
            resource: location.clone(),
            source,
        })?;
        Ok(StreamSource::new(location, content))
    }

    fn read_properties(&mut self, element: &XmlElement) -> ConfigResult<()> {
        for property in element.children_named("property") {
            let name = property
                .attribute("name")
                .ok_or_else(|| ConfigError::malformed(self.resource, "<property> 缺少 name 属性"))?;
            let value = property
                .attribute("value")
                .map_or_else(|| property.text(), str::to_string);
            self.batch.properties.insert(name, value);
        }
        Ok(())
    }
}
