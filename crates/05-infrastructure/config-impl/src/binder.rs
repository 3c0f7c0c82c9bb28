//! 引擎设置加载
//!
//! 可选的设置文件（按扩展名识别 TOML/JSON/YAML）叠加 `CONFIGURATOR_` 前缀的环境变量。

use config_abstractions::CoreSettings;
use configurator_common::{ConfigError, ConfigResult};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error};

/// 默认环境变量前缀
pub const SETTINGS_ENV_PREFIX: &str = "CONFIGURATOR";

/// 引擎设置加载器
#[derive(Debug, Clone)]
pub struct SettingsLoader {
    file: Option<PathBuf>,
    env_prefix: String,
    environment: Option<HashMap<String, String>>,
}

impl SettingsLoader {
    /// 创建加载器，只读取环境变量
    pub fn new() -> Self {
        Self {
            file: None,
            env_prefix: SETTINGS_ENV_PREFIX.to_string(),
            environment: None,
        }
    }

    /// 设置文件，文件不存在时忽略
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// 环境变量前缀
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// 用给定的映射代替进程环境
    pub fn with_environment(mut self, environment: HashMap<String, String>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// 加载设置，缺省项取默认值
    pub fn load(&self) -> ConfigResult<CoreSettings> {
        let mut builder = config::Config::builder();
        if let Some(file) = &self.file {
            debug!("加载引擎设置文件: {}", file.display());
            builder = builder.add_source(config::File::from(file.clone()).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(self.environment.clone()),
        );

        let settings = builder
            .build()
            .and_then(|c| c.try_deserialize::<CoreSettings>())
            .map_err(|e| {
                error!("引擎设置加载失败: {}", e);
                ConfigError::SettingsError {
                    message: e.to_string(),
                }
            })?;
        debug!("引擎设置: {:?}", settings);
        Ok(settings)
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}
