//! 集成测试共用的组件工厂与夹具

#![allow(dead_code)]

use config_abstractions::{LoaderDefinition, PropertySet};
use configurator_common::module_instance;
use configurator_composition::{Configuration, ConfigurationBuilder};
use di_abstractions::{FnFactory, ResolvedValue};
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// 构建与销毁事件
pub type Events = Arc<Mutex<Vec<String>>>;

/// 测试服务
#[derive(Debug)]
pub struct Service {
    pub identity: String,
    pub greeting: String,
    pub dependencies: Vec<Arc<Service>>,
}

pub fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

/// `service` 类型的工厂
///
/// `greeting` 为字面量，`deps` 为模块引用列表，`start` 方法记录调用。
pub fn service_factory(events: Events) -> FnFactory {
    let on_create = events.clone();
    let on_start = events.clone();
    FnFactory::new("service", move |ctx| {
        let greeting = ctx.property_str("greeting")?.unwrap_or_default();
        let dependencies = match ctx.resolve_property("deps")? {
            Some(ResolvedValue::List(items)) => items.iter().filter_map(ResolvedValue::downcast::<Service>).collect(),
            Some(single) => single.downcast::<Service>().into_iter().collect(),
            None => Vec::new(),
        };
        on_create.lock().push(format!("create:{}", ctx.identity()));
        Ok(module_instance(Service {
            identity: ctx.identity().to_string(),
            greeting,
            dependencies,
        }))
    })
    .with_method("start", move |module, _| {
        on_start.lock().push(format!("start:{}", module.identity()));
        Ok(())
    })
    .with_destroy(move |module| {
        events.lock().push(format!("destroy:{}", module.identity()));
        Ok(())
    })
}

/// 在临时目录下写入文件
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// 只搜索文件系统的加载器
pub fn filesystem_loader(selector: &str) -> LoaderDefinition {
    LoaderDefinition::new(selector).with_search(false, true)
}

/// 以临时目录为工作目录、注入空环境的构建器
pub fn builder_in(dir: &TempDir, events: &Events) -> ConfigurationBuilder {
    Configuration::builder()
        .with_working_dir(dir.path())
        .with_environment(PropertySet::new())
        .with_factory(service_factory(events.clone()))
}

/// 只含组件的定义文档
pub fn components(body: &str) -> String {
    format!("<components>{body}</components>")
}
