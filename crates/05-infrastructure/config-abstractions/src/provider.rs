//! 属性来源抽象接口

use configurator_common::ConfigResult;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 有序的属性集合
///
/// 合并时后写入者覆盖先写入者，键保持首次出现的顺序。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertySet {
    entries: IndexMap<String, String>,
}

impl PropertySet {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取属性值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// 设置属性，返回旧值
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    /// 是否包含属性
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 将另一集合合并进来，冲突时以 `other` 为准
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
    }

    /// 迭代属性
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 属性数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertySet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

/// 环境属性的合并位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemPropertiesMode {
    /// 从不合并环境属性
    Never,
    /// 环境属性作为兜底，本地属性优先
    Fallback,
    /// 环境属性覆盖本地属性
    Override,
}

impl Default for SystemPropertiesMode {
    fn default() -> Self {
        Self::Fallback
    }
}

/// 属性持有者 trait
///
/// 其他聚合器只贡献自己的本地属性。
pub trait PropertyHolder: Send + Sync {
    /// 持有者名称
    fn name(&self) -> &str;

    /// 本地属性（不含其他持有者的贡献）
    fn local_properties(&self) -> ConfigResult<PropertySet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_later_wins_and_keeps_order() {
        let mut base: PropertySet = [("a", "1"), ("b", "2")].into_iter().collect();
        let other: PropertySet = [("b", "3"), ("c", "4")].into_iter().collect();
        base.merge(&other);

        let entries: Vec<_> = base.iter().collect();
        assert_eq!(entries, vec![("a", "1"), ("b", "3"), ("c", "4")]);
    }
}
