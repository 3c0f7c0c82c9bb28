//! 加载器引导
//!
//! 按队列依次运行加载器：解析选择器、逐个资源经过转换验证流水线、
//! 读取定义并合并到定义注册表。文档中声明的加载器追加到队列末尾，
//! 声明的属性在所属加载器完成后注入核心属性聚合器。

use config_abstractions::{
    CoreSettings, LoaderDefinition, PropertySet, ResourceFailurePolicy, ResourceHandle,
    ResourceResolver,
};
use config_impl::{
    read_definitions, DefinitionBatch, PreparedLoader, PropertyAggregator, SelectorResolver,
    TransformValidatePipeline,
};
use configurator_common::{ConfigError, ConfiguratorError, ConfiguratorResult};
use di_impl::DefinitionRegistry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

/// 被跳过的资源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedResource {
    /// 加载器标识
    pub loader_id: String,
    /// 资源位置
    pub resource: String,
    /// 失败原因
    pub message: String,
}

/// 一次引导的结果
#[derive(Debug, Default)]
pub struct BootstrapOutcome {
    /// 合并后的定义
    pub registry: DefinitionRegistry,
    /// 已知的加载器，按首次出现的顺序
    pub loaders: IndexMap<String, LoaderDefinition>,
    /// 按隔离策略跳过的资源
    pub failed: Vec<FailedResource>,
    /// 运行过的加载器数
    pub loaders_processed: usize,
    /// 处理过的资源数
    pub resources_processed: usize,
}

#[derive(Default)]
struct LoaderRun {
    registry: DefinitionRegistry,
    loaders: Vec<(String, LoaderDefinition)>,
    properties: PropertySet,
}

/// 加载器引导器
pub struct LoaderBootstrapper<'a> {
    settings: &'a CoreSettings,
    resolver: &'a SelectorResolver,
    pipeline: &'a TransformValidatePipeline,
    aggregator: &'a PropertyAggregator,
}

impl<'a> LoaderBootstrapper<'a> {
    /// 创建引导器
    pub fn new(
        settings: &'a CoreSettings,
        resolver: &'a SelectorResolver,
        pipeline: &'a TransformValidatePipeline,
        aggregator: &'a PropertyAggregator,
    ) -> Self {
        Self {
            settings,
            resolver,
            pipeline,
            aggregator,
        }
    }

    /// 运行全部加载器，包括文档中递归声明的加载器
    pub fn run(
        &self,
        initial: impl IntoIterator<Item = (String, LoaderDefinition)>,
    ) -> ConfiguratorResult<BootstrapOutcome> {
        let mut outcome = BootstrapOutcome::default();
        let mut queue = VecDeque::new();
        for (loader_id, loader) in initial {
            if outcome.loaders.contains_key(&loader_id) {
                return Err(ConfigError::DuplicateLoader { loader_id }.into());
            }
            outcome.loaders.insert(loader_id.clone(), loader.clone());
            queue.push_back((loader_id, loader));
        }

        while let Some((loader_id, loader)) = queue.pop_front() {
            let run = self.run_loader(&loader_id, &loader, &mut outcome)?;
            outcome.loaders_processed += 1;

            debug!("合并加载器 {} 的 {} 个定义", loader_id, run.registry.len());
            outcome
                .registry
                .merge_from(run.registry, loader.override_policy())?;

            if !run.properties.is_empty() {
                self.aggregator.inject_properties(&run.properties);
            }

            for (nested_id, nested) in run.loaders {
                if outcome.loaders.contains_key(&nested_id) {
                    if !self.settings.user_loader_overriding_allowed {
                        return Err(ConfigError::DuplicateLoader {
                            loader_id: nested_id,
                        }
                        .into());
                    }
                    warn!("加载器 {} 被加载器 {} 重新定义", nested_id, loader_id);
                    queue.retain(|(queued, _)| queued != &nested_id);
                }
                info!("加载器 {} 声明了嵌套加载器 {}", loader_id, nested_id);
                outcome.loaders.insert(nested_id.clone(), nested.clone());
                queue.push_back((nested_id, nested));
            }
        }

        info!(
            "引导完成: {} 个加载器, {} 个资源, {} 个定义, {} 个资源被跳过",
            outcome.loaders_processed,
            outcome.resources_processed,
            outcome.registry.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// 只处理调用方提供的单个资源
    ///
    /// 文档中声明的加载器与属性被忽略，任何失败都直接返回。
    pub fn process_stream(
        &self,
        loader_id: &str,
        loader: &LoaderDefinition,
        resource: ResourceHandle,
    ) -> ConfiguratorResult<DefinitionRegistry> {
        let properties = self.aggregator.properties(true)?;
        let prepared = self.pipeline.prepare(loader_id, loader, &properties)?;
        let batch = self.process_resource(&prepared, resource, &properties)?;

        if !batch.loaders.is_empty() {
            info!("延迟加载忽略 {} 个加载器声明", batch.loaders.len());
        }
        if !batch.properties.is_empty() {
            info!("延迟加载忽略 {} 个属性声明", batch.properties.len());
        }

        let mut registry = DefinitionRegistry::new();
        registry.register_all(batch.components, loader.override_policy())?;
        Ok(registry)
    }

    fn run_loader(
        &self,
        loader_id: &str,
        loader: &LoaderDefinition,
        outcome: &mut BootstrapOutcome,
    ) -> ConfiguratorResult<LoaderRun> {
        let properties = self.aggregator.properties(true)?;
        let prepared = self.pipeline.prepare(loader_id, loader, &properties)?;
        info!("运行加载器 {}: 选择器 {}", loader_id, prepared.selector());

        let request = loader.selector_request(prepared.selector());
        let resources = self.resolver.resolve(&request)?;
        let count = resources.len();

        let mut run = LoaderRun::default();
        for resource in resources {
            let location = resource.location().to_string();
            outcome.resources_processed += 1;
            debug!("处理资源 {} (加载器 {})", location, loader_id);

            let batch = match self.process_resource(&prepared, resource, &properties) {
                Ok(batch) => batch,
                Err(e) => match self.settings.resource_failure_policy {
                    ResourceFailurePolicy::Isolate => {
                        error!("跳过资源 {} (加载器 {}): {}", location, loader_id, e);
                        outcome.failed.push(FailedResource {
                            loader_id: loader_id.to_string(),
                            resource: location,
                            message: e.to_string(),
                        });
                        continue;
                    }
                    ResourceFailurePolicy::AbortLoader => return Err(e),
                },
            };

            run.registry
                .register_all(batch.components, loader.override_policy())?;
            run.loaders.extend(batch.loaders);
            run.properties.merge(&batch.properties);
        }

        info!("加载器 {} 完成: {} 个资源", loader_id, count);
        Ok(run)
    }

    fn process_resource(
        &self,
        prepared: &PreparedLoader,
        resource: ResourceHandle,
        properties: &PropertySet,
    ) -> ConfiguratorResult<DefinitionBatch> {
        let location = resource.location().to_string();
        let document = self.pipeline.process(prepared, resource, properties)?;
        read_definitions(prepared.loader_id(), &location, &document, self.resolver).map_err(|e| {
            ConfiguratorError::from(e).in_resource(prepared.loader_id(), &location)
        })
    }
}
