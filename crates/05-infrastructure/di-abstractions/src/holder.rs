//! 模块持有者抽象接口

use configurator_common::{LifecycleResult, Module};
use std::collections::BTreeMap;

/// 模块持有者
///
/// 持有一组模块并负责销毁它们；父作用域中的模块只被引用，不被销毁。
pub trait ModuleHolder: Send + Sync {
    /// 按标识获取可见模块
    fn get_module(&self, identity: &str) -> Option<Module>;

    /// 全部可见模块，按标识排序
    fn get_all_modules(&self) -> BTreeMap<String, Module>;

    /// 销毁持有的模块，重复调用无效果
    fn release(&self) -> LifecycleResult<()>;

    /// 是否已释放
    fn is_released(&self) -> bool;
}
