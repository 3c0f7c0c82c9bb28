//! 延迟加载作用域集成测试

mod common;

use common::{builder_in, components, events, filesystem_loader, write_file, Events, Service};
use config_abstractions::{ResourceHandle, ResourceOrigin, StreamSource};
use configurator_common::{ConfiguratorError, DependencyError};
use configurator_composition::{Configuration, ModuleHolder};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn loaded(events: &Events) -> (TempDir, Configuration) {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "conf/main.xml",
        &components(
            r#"<component id="svc" type="service"><property name="greeting" value="main"/></component>
               <component id="db" type="service"/>"#,
        ),
    );
    let configuration = builder_in(&dir, events)
        .with_property("plugin.greeting", "from properties")
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();
    (dir, configuration)
}

fn plugin(location: &str, body: &str) -> StreamSource {
    StreamSource::new(location, components(body).into_bytes())
}

#[test]
fn test_holders_release_independently() {
    let events = events();
    let (_dir, configuration) = loaded(&events);

    let first = configuration
        .load_delayed_stream(
            "core",
            &plugin("first.xml", r#"<component id="p1" type="service"><property name="deps" ref="db"/></component>"#),
        )
        .unwrap();
    let second = configuration
        .load_delayed_stream("core", &plugin("second.xml", r#"<component id="p2" type="service"/>"#))
        .unwrap();

    let p1 = first.get_module_as::<Service>("p1").unwrap();
    assert_eq!(p1.dependencies[0].identity, "db");
    assert!(first.get_module("p2").is_none());
    assert!(second.get_module("p1").is_none());
    assert_ne!(first.scope().id, second.scope().id);

    first.release().unwrap();
    assert!(first.is_released());
    assert!(first.get_module("p1").is_none());
    assert!(!second.is_released());
    assert!(second.get_module("p2").is_some());

    let recorded = events.lock().clone();
    assert!(recorded.contains(&"destroy:p1".to_string()));
    assert!(!recorded.contains(&"destroy:p2".to_string()));
    assert!(!recorded.contains(&"destroy:db".to_string()));

    let main = configuration.get_module_as::<Service>("db").unwrap();
    assert!(Arc::ptr_eq(&main, &p1.dependencies[0]));
    assert_eq!(configuration.metrics().delayed_loads, 2);
}

#[test]
fn test_delayed_definition_shadows_main_scope() {
    let events = events();
    let (_dir, configuration) = loaded(&events);

    let holder = configuration
        .load_delayed_stream(
            "core",
            &plugin(
                "shadow.xml",
                r#"<component id="svc" type="service"><property name="greeting" value="${plugin.greeting}"/></component>"#,
            ),
        )
        .unwrap();

    assert_eq!(holder.get_module_as::<Service>("svc").unwrap().greeting, "from properties");
    assert_eq!(configuration.get_module_as::<Service>("svc").unwrap().greeting, "main");
    assert!(configuration.supersessions().is_empty());

    holder.release().unwrap();
    assert_eq!(configuration.get_module_as::<Service>("svc").unwrap().greeting, "main");
}

#[test]
fn test_delayed_failure_releases_partial_scope() {
    let events = events();
    let (_dir, configuration) = loaded(&events);
    events.lock().clear();

    let err = configuration
        .load_delayed_stream(
            "core",
            &plugin(
                "broken.xml",
                r#"<component id="ok" type="service"/><component id="bad" type="missing"/>"#,
            ),
        )
        .unwrap_err();

    match &err {
        ConfiguratorError::ConstructionFailed {
            identity,
            origin_loader,
            source,
        } => {
            assert_eq!(identity, "bad");
            assert_eq!(origin_loader, "core");
            assert!(matches!(source, DependencyError::UnknownComponentType { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(events.lock().clone(), vec!["create:ok", "destroy:ok"]);
    assert!(configuration.get_module("svc").is_some());
    assert_eq!(configuration.metrics().delayed_loads, 0);
}

#[test]
fn test_delayed_load_from_resource_handle() {
    let events = events();
    let (_dir, configuration) = loaded(&events);

    let handle = ResourceHandle::from_bytes(
        "memory:plugin.xml",
        ResourceOrigin::Stream,
        Arc::from(components(r#"<component id="handled" type="service"/>"#).into_bytes()),
    );
    let holder = configuration.load_delayed("core", handle).unwrap();
    let visible: Vec<String> = holder.get_all_modules().into_keys().collect();
    assert_eq!(visible, vec!["handled"]);
}

#[test]
fn test_delayed_load_requires_loaded_configuration() {
    let events = events();
    let dir = TempDir::new().unwrap();
    let configuration = builder_in(&dir, &events)
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .build()
        .unwrap();

    let err = configuration
        .load_delayed_stream("core", &plugin("early.xml", r#"<component id="x" type="service"/>"#))
        .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_releasing_main_configuration_keeps_holders_alive() {
    let events = events();
    let (_dir, configuration) = loaded(&events);
    let holder = configuration
        .load_delayed_stream("core", &plugin("late.xml", r#"<component id="late" type="service"/>"#))
        .unwrap();

    configuration.release().unwrap();
    assert!(configuration.get_module("svc").is_none());
    assert!(holder.get_module("late").is_some());

    holder.release().unwrap();
    let destroyed: Vec<String> = events
        .lock()
        .iter()
        .filter(|e| e.starts_with("destroy:"))
        .cloned()
        .collect();
    assert_eq!(destroyed, vec!["destroy:db", "destroy:svc", "destroy:late"]);
}
