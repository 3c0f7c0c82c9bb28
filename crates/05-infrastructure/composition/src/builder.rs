//! 配置构建器

use crate::configuration::Configuration;
use config_abstractions::{
    CoreSettings, LoaderDefinition, PropertyHolder, PropertySet, SystemPropertiesMode,
};
use config_impl::{
    parse_document, read_definitions, EmbeddedResources, PlaceholderEngine, PropertyAggregator,
    SelectorResolver, SettingsLoader, TransformValidatePipeline,
};
use configurator_common::{
    ConfigError, ConfiguratorError, ConfiguratorResult, ModuleInstance, CORE_PROPERTY_HOLDER_ID,
};
use di_abstractions::ComponentFactory;
use di_impl::FactoryRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// 核心文档中加载器与属性的归属
const CORE_DOCUMENT_LOADER: &str = "core";

/// 配置构建器
///
/// 使用建造者模式组装资源、加载器、组件工厂、属性与设置
pub struct ConfigurationBuilder {
    /// 显式设置
    settings: Option<CoreSettings>,
    /// 设置加载器，未提供显式设置时使用
    settings_loader: Option<SettingsLoader>,
    /// 内嵌资源
    embedded: EmbeddedResources,
    /// 文件系统搜索根目录
    working_dir: Option<PathBuf>,
    /// 初始加载器
    loaders: Vec<(String, LoaderDefinition)>,
    /// 声明加载器与属性的核心文档
    core_documents: Vec<(String, Vec<u8>)>,
    /// 组件工厂
    factories: FactoryRegistry,
    /// 本地属性
    properties: PropertySet,
    /// 属性文件位置
    property_locations: Vec<String>,
    /// 属性文件选择器
    property_selectors: Vec<String>,
    /// 系统属性模式
    system_properties_mode: SystemPropertiesMode,
    /// 替代进程环境的环境变量
    environment: Option<PropertySet>,
    /// 本地属性是否覆盖属性文件
    local_override: bool,
    /// 合并属性的其他持有者
    property_holders: Vec<Arc<dyn PropertyHolder>>,
    /// 是否启用日志初始化
    logging_enabled: bool,
    /// 日志配置
    logging_config: LoggingConfig,
}

impl ConfigurationBuilder {
    /// 创建新的配置构建器
    pub fn new() -> Self {
        Self {
            settings: None,
            settings_loader: None,
            embedded: EmbeddedResources::new(),
            working_dir: None,
            loaders: Vec::new(),
            core_documents: Vec::new(),
            factories: FactoryRegistry::new(),
            properties: PropertySet::new(),
            property_locations: Vec::new(),
            property_selectors: Vec::new(),
            system_properties_mode: SystemPropertiesMode::default(),
            environment: None,
            local_override: false,
            property_holders: Vec::new(),
            logging_enabled: false, // 默认不启用日志初始化
            logging_config: LoggingConfig::default(),
        }
    }

    /// 使用显式设置
    pub fn with_settings(mut self, settings: CoreSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// 从设置文件与环境变量加载设置
    pub fn with_settings_loader(mut self, loader: SettingsLoader) -> Self {
        self.settings_loader = Some(loader);
        self
    }

    /// 添加内嵌资源
    pub fn with_embedded_resource(mut self, path: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        self.embedded.insert(path, content);
        self
    }

    /// 替换整个内嵌资源空间
    pub fn with_embedded_resources(mut self, embedded: EmbeddedResources) -> Self {
        self.embedded = embedded;
        self
    }

    /// 设置文件系统搜索根目录，优先于设置中的目录
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// 添加初始加载器
    pub fn with_loader(mut self, loader_id: impl Into<String>, loader: LoaderDefinition) -> Self {
        self.loaders.push((loader_id.into(), loader));
        self
    }

    /// 添加核心文档，其中只能声明加载器与属性
    pub fn with_core_document(mut self, location: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.core_documents.push((location.into(), content.into()));
        self
    }

    /// 注册组件工厂
    pub fn with_factory(mut self, factory: impl ComponentFactory + 'static) -> Self {
        self.factories.register(Arc::new(factory));
        self
    }

    /// 注册共享的组件工厂
    pub fn with_shared_factory(mut self, factory: Arc<dyn ComponentFactory>) -> Self {
        self.factories.register(factory);
        self
    }

    /// 添加本地属性
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key, value);
        self
    }

    /// 添加属性文件位置
    pub fn with_property_location(mut self, location: impl Into<String>) -> Self {
        self.property_locations.push(location.into());
        self
    }

    /// 添加属性文件选择器
    pub fn with_property_selector(mut self, selector: impl Into<String>) -> Self {
        self.property_selectors.push(selector.into());
        self
    }

    /// 设置系统属性模式
    pub fn with_system_properties_mode(mut self, mode: SystemPropertiesMode) -> Self {
        self.system_properties_mode = mode;
        self
    }

    /// 用给定的环境变量代替进程环境
    pub fn with_environment(mut self, environment: PropertySet) -> Self {
        self.environment = Some(environment);
        self
    }

    /// 本地属性覆盖属性文件
    pub fn with_local_override(mut self, local_override: bool) -> Self {
        self.local_override = local_override;
        self
    }

    /// 合并其他持有者的属性
    pub fn with_property_holder(mut self, holder: Arc<dyn PropertyHolder>) -> Self {
        self.property_holders.push(holder);
        self
    }

    /// 启用日志初始化
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_enabled = true;
        self.logging_config = config;
        self
    }

    /// 构建配置，不加载
    pub fn build(self) -> ConfiguratorResult<Configuration> {
        if self.logging_enabled {
            self.initialize_logging()?;
        }
        info!("构建配置");

        let mut settings = match (self.settings, &self.settings_loader) {
            (Some(settings), _) => settings,
            (None, Some(loader)) => loader.load()?,
            (None, None) => CoreSettings::default(),
        };
        if let Some(dir) = self.working_dir {
            settings.working_dir = Some(dir);
        }
        debug!("引擎设置: {:?}", settings);

        let resolver = Arc::new(SelectorResolver::new(
            self.embedded,
            settings.resolved_working_dir(),
        ));

        let mut aggregator = PropertyAggregator::new(CORE_PROPERTY_HOLDER_ID)
            .with_system_properties_mode(self.system_properties_mode)
            .with_local_override(self.local_override)
            .with_resolver(resolver.clone());
        if let Some(environment) = self.environment {
            aggregator = aggregator.with_environment(environment);
        }
        aggregator.add_properties(&self.properties);
        for location in self.property_locations {
            aggregator.add_location(location);
        }
        for selector in self.property_selectors {
            aggregator.add_location_selector(selector);
        }
        for holder in self.property_holders {
            aggregator.add_other_holder(holder);
        }

        let mut loaders = Vec::new();
        for (location, content) in &self.core_documents {
            let document = parse_document(location, content)?;
            let batch = read_definitions(CORE_DOCUMENT_LOADER, location, &document, resolver.as_ref())?;
            if let Some(component) = batch.components.first() {
                return Err(ConfigError::malformed(
                    location,
                    format!("核心文档只能声明加载器与属性, 发现组件 {}", component.identity),
                )
                .into());
            }
            aggregator.add_properties(&batch.properties);
            debug!("核心文档 {} 声明 {} 个加载器", location, batch.loaders.len());
            loaders.extend(batch.loaders);
        }
        loaders.extend(self.loaders);

        let engine = PlaceholderEngine::new()
            .with_strict(settings.strict_placeholders)
            .with_max_depth(settings.max_placeholder_depth);
        let pipeline = TransformValidatePipeline::new(resolver.clone(), engine)
            .with_validation(settings.validation_enabled);

        info!(
            "配置构建完成: {} 个加载器, {} 个组件工厂",
            loaders.len(),
            self.factories.len()
        );
        Ok(Configuration::new(
            settings,
            resolver,
            Arc::new(aggregator),
            Arc::new(pipeline),
            self.factories,
            loaders,
        ))
    }

    /// 构建并加载配置
    pub fn bootstrap(
        self,
        injections: impl IntoIterator<Item = (String, ModuleInstance)>,
    ) -> ConfiguratorResult<Configuration> {
        let configuration = self.build()?;
        configuration.load_configuration(injections)?;
        Ok(configuration)
    }

    /// 初始化日志系统
    fn initialize_logging(&self) -> ConfiguratorResult<()> {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(self.logging_config.level)
            .with_target(self.logging_config.show_target)
            .with_thread_ids(self.logging_config.show_thread_ids)
            .with_file(self.logging_config.show_file)
            .with_line_number(self.logging_config.show_line_number);

        if self.logging_config.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| {
            ConfiguratorError::from(ConfigError::SettingsError {
                message: format!("日志初始化失败: {}", e),
            })
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: tracing::Level,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 开发环境：调试级别，显示位置信息
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 生产环境：JSON 输出
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 设置日志级别
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }
}
