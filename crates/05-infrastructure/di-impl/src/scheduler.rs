//! 实例化调度
//!
//! 按 Head、Body、Tail 三个阶段构建容器中的定义，阶段内按注册顺序。
//! Head 与 Body 阶段的失败被推迟，Tail 阶段与最终补全阶段的失败直接返回。

use crate::container::ModuleContainer;
use configurator_common::{ConfiguratorError, ConfiguratorResult, Phase};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 一次调度的结果
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    /// 本次调度中实际构建的模块，按构建顺序
    pub constructed: Vec<String>,
    /// 在 Head 或 Body 阶段构建失败、留待后续重试的标识
    pub deferred: Vec<String>,
    /// 在最终补全阶段才构建的标识
    pub swept: Vec<String>,
    /// 耗时
    pub elapsed: Duration,
}

/// 实例化调度器
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantiationScheduler;

impl InstantiationScheduler {
    /// 创建调度器
    pub fn new() -> Self {
        Self
    }

    /// 构建容器中所有尚未构建的定义
    pub fn run(&self, container: &ModuleContainer) -> ConfiguratorResult<ScheduleReport> {
        let started = Instant::now();
        let already_built = container.constructed_count();
        let definitions = container.definitions();
        let mut report = ScheduleReport::default();

        for phase in [Phase::Head, Phase::Body] {
            for definition in definitions.iter().filter(|d| d.phase == phase) {
                if container.is_constructed(&definition.identity) {
                    continue;
                }
                if let Err(e) = container.get_or_construct(&definition.identity) {
                    warn!("推迟构建 {} ({} 阶段): {}", definition.identity, phase, e);
                    report.deferred.push(definition.identity.clone());
                }
            }
            debug!("{} 阶段完成", phase);
        }

        for definition in definitions.iter().filter(|d| d.phase == Phase::Tail) {
            if container.is_constructed(&definition.identity) {
                continue;
            }
            container
                .get_or_construct(&definition.identity)
                .map_err(|source| ConfiguratorError::ConstructionFailed {
                    identity: definition.identity.clone(),
                    origin_loader: definition.origin_loader.clone(),
                    source,
                })?;
        }
        debug!("{} 阶段完成", Phase::Tail);

        for definition in &definitions {
            if container.is_constructed(&definition.identity) {
                continue;
            }
            container
                .get_or_construct(&definition.identity)
                .map_err(|source| ConfiguratorError::ConstructionFailed {
                    identity: definition.identity.clone(),
                    origin_loader: definition.origin_loader.clone(),
                    source,
                })?;
            report.swept.push(definition.identity.clone());
        }

        report.constructed = container
            .construction_order()
            .into_iter()
            .skip(already_built)
            .collect();
        report.elapsed = started.elapsed();
        info!(
            "调度完成: 构建 {} 个模块, 推迟 {} 个, 补全 {} 个, 耗时 {:?}",
            report.constructed.len(),
            report.deferred.len(),
            report.swept.len(),
            report.elapsed
        );
        Ok(report)
    }
}
