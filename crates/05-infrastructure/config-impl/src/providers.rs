//! 属性文件解析
//!
//! 按扩展名识别 `.properties`、`.toml`、`.json`、`.yaml`/`.yml`，
//! 嵌套表以 `.` 展平为键。

use config_abstractions::PropertySet;
use configurator_common::{ConfigError, ConfigResult};
use serde_json::Value;
use tracing::debug;

/// 属性文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyFormat {
    /// `key=value` 行格式
    Properties,
    /// TOML
    Toml,
    /// JSON
    Json,
    /// YAML
    Yaml,
}

impl PropertyFormat {
    /// 根据资源位置的扩展名判断格式，未知扩展名按行格式处理
    pub fn from_location(location: &str) -> Self {
        let extension = location
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "toml" => Self::Toml,
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            _ => Self::Properties,
        }
    }
}

/// 解析属性文件内容
pub fn parse_property_file(location: &str, bytes: &[u8]) -> ConfigResult<PropertySet> {
    let text = std::str::from_utf8(bytes).map_err(|e| ConfigError::ParseError {
        resource: location.to_string(),
        source: Box::new(e),
    })?;
    let format = PropertyFormat::from_location(location);
    debug!("解析属性文件: {} ({:?})", location, format);

    let parse_error = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::ParseError {
        resource: location.to_string(),
        source,
    };

    let value = match format {
        PropertyFormat::Properties => return Ok(parse_properties_text(text)),
        PropertyFormat::Toml => {
            let table: toml::Value = toml::from_str(text).map_err(|e| parse_error(Box::new(e)))?;
            toml_to_json(&table)
        }
        PropertyFormat::Json => serde_json::from_str(text).map_err(|e| parse_error(Box::new(e)))?,
        PropertyFormat::Yaml => serde_yaml::from_str(text).map_err(|e| parse_error(Box::new(e)))?,
    };

    let mut properties = PropertySet::new();
    flatten(&value, String::new(), &mut properties);
    Ok(properties)
}

/// 解析 `key=value` / `key: value` 行格式，`#` 与 `!` 开头为注释
fn parse_properties_text(text: &str) -> PropertySet {
    let mut properties = PropertySet::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let separator = line.find(['=', ':']);
        let (key, value) = match separator {
            Some(index) => (&line[..index], &line[index + 1..]),
            None => (line, ""),
        };
        properties.insert(key.trim(), value.trim());
    }
    properties
}

/// 将 TOML 值转换为 JSON 值
fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Number(serde_json::Number::from(*i)),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map_or_else(|| Value::String(f.to_string()), Value::Number),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Array(arr) => Value::Array(arr.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
    }
}

/// 递归展平嵌套值
fn flatten(value: &Value, prefix: String, properties: &mut PropertySet) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let full_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(nested, full_key, properties);
            }
        }
        other if !prefix.is_empty() => {
            properties.insert(prefix, scalar_to_string(other));
        }
        _ => {}
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(scalar_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
