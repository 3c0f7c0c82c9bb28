//! 标识约定
//!
//! 保留标识、匿名标识的命名格式，以及匿名标识冲突时的重命名规则。

/// 引擎设置的保留标识
pub const CORE_SETTINGS_ID: &str = "coreSettings";
/// 配置对象自身的保留标识
pub const CORE_CONFIGURATION_ID: &str = "coreConfiguration";
/// 核心属性聚合器的保留标识
pub const CORE_PROPERTY_HOLDER_ID: &str = "corePropertyHolder";

/// 全部保留标识
pub const RESERVED_IDENTITIES: [&str; 3] = [
    CORE_SETTINGS_ID,
    CORE_CONFIGURATION_ID,
    CORE_PROPERTY_HOLDER_ID,
];

/// 匿名标识中类型名与序号之间的分隔符
pub const SYNTHETIC_SEPARATOR: char = '#';

/// 判断是否为保留标识
pub fn is_reserved_identity(identity: &str) -> bool {
    RESERVED_IDENTITIES.contains(&identity)
}

/// 生成匿名定义的合成标识，例如 `greeter#0`
pub fn synthetic_identity(base: &str, ordinal: usize) -> String {
    format!("{base}{SYNTHETIC_SEPARATOR}{ordinal}")
}

/// 匿名标识冲突时生成新的唯一标识
pub fn rekeyed_identity(identity: &str) -> String {
    format!("{}_{}", uuid::Uuid::new_v4(), identity)
}
