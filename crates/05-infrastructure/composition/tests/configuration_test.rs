//! 配置组合层测试

use config_abstractions::{LoaderDefinition, PropertySet, StreamSource};
use configurator_common::{module_instance, ConfigError, ModuleKind, PropertyValue};
use configurator_composition::{
    Configuration, ConfigurationBuilder, ConfigurationStatus, ConfiguratorError, ModuleHolder,
};
use di_abstractions::FnFactory;
use indexmap::IndexMap;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;

type Events = Arc<Mutex<Vec<String>>>;

#[derive(Debug)]
struct Greeter {
    greeting: String,
}

const MAIN: &str = r#"<components>
    <component id="svc" type="greeter">
        <property name="greeting" value="hello ${user}"/>
        <property name="helper" ref="helper"/>
    </component>
    <component id="helper" type="greeter" phase="head"/>
    <component type="greeter"/>
    <invoke target="svc" method="start" phase="tail"/>
</components>"#;

fn greeter_factory(events: Events) -> FnFactory {
    let on_create = events.clone();
    let on_start = events.clone();
    FnFactory::new("greeter", move |ctx| {
        if ctx.definition().property("helper").is_some() {
            ctx.require_module("helper")?;
        }
        let greeting = ctx.property_str("greeting")?.unwrap_or_default();
        on_create.lock().push(format!("create:{}", ctx.identity()));
        Ok(module_instance(Greeter { greeting }))
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

fn base_builder(events: &Events) -> ConfigurationBuilder {
    Configuration::builder()
        .with_working_dir(std::env::temp_dir().join("configurator-composition-unused"))
        .with_embedded_resource("conf/main.xml", MAIN.as_bytes())
        .with_environment(PropertySet::new())
        .with_factory(greeter_factory(events.clone()))
}

fn builder(events: &Events) -> ConfigurationBuilder {
    base_builder(events)
        .with_loader("core", LoaderDefinition::new("conf/*.xml").with_search(true, false))
        .with_property("user", "world")
}

fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn test_bootstrap_constructs_every_definition() {
    let events = events();
    let configuration = builder(&events).bootstrap(HashMap::new()).unwrap();

    assert_eq!(configuration.status(), ConfigurationStatus::Loaded);
    assert_eq!(
        events.lock().clone(),
        vec!["create:helper", "create:svc", "create:greeter#0", "start:svc"]
    );

    let svc = configuration.get_module_as::<Greeter>("svc").unwrap();
    assert_eq!(svc.greeting, "hello world");

    let visible: Vec<String> = configuration.get_all_modules().into_keys().collect();
    assert_eq!(visible, vec!["helper", "svc"]);
}

#[test]
fn test_lookup_is_idempotent() {
    let events = events();
    let configuration = builder(&events).bootstrap(HashMap::new()).unwrap();

    let first = configuration.get_module("svc").unwrap();
    let second = configuration.get_module("svc").unwrap();
    assert!(first.same_instance(&second));

    assert!(configuration.get_module("missing").is_none());
    assert!(configuration.try_get_module("missing").unwrap().is_none());

    let settings = configuration.get_module("coreSettings").unwrap();
    assert_eq!(settings.kind(), ModuleKind::Infrastructure);
    assert!(!settings.is_visible());
    assert_eq!(configuration.metrics().module_lookups, 5);
}

#[test]
fn test_second_load_is_rejected() {
    let events = events();
    let configuration = builder(&events).bootstrap(HashMap::new()).unwrap();

    let err = configuration.load_configuration(HashMap::new()).unwrap_err();
    assert!(err.is_config());
    assert_eq!(configuration.status(), ConfigurationStatus::Loaded);
}

#[test]
fn test_injection_wins_over_definition() {
    let events = events();
    let injections = HashMap::from([(
        "helper".to_string(),
        module_instance(Greeter {
            greeting: "injected".to_string(),
        }),
    )]);
    let configuration = builder(&events).bootstrap(injections).unwrap();

    assert!(!events.lock().contains(&"create:helper".to_string()));
    let helper = configuration.get_module("helper").unwrap();
    assert_eq!(helper.kind(), ModuleKind::Injected);
    assert_eq!(helper.downcast::<Greeter>().unwrap().greeting, "injected");
    assert!(configuration.get_module("svc").is_some());
}

#[test]
fn test_reserved_identity_cannot_be_injected() {
    let events = events();
    let injections = HashMap::from([("coreSettings".to_string(), module_instance(()))]);
    let err = builder(&events).bootstrap(injections).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_release_destroys_in_reverse_order() {
    let events = events();
    let configuration = builder(&events).bootstrap(HashMap::new()).unwrap();
    events.lock().clear();

    configuration.release().unwrap();
    assert_eq!(
        events.lock().clone(),
        vec!["destroy:greeter#0", "destroy:svc", "destroy:helper"]
    );

    configuration.release().unwrap();
    assert_eq!(events.lock().len(), 3);
    assert!(configuration.is_released());
    assert!(configuration.get_module("svc").is_none());
    assert!(configuration.get_all_modules().is_empty());
}

#[test]
fn test_delayed_load_is_scoped() {
    let events = events();
    let configuration = builder(&events).bootstrap(HashMap::new()).unwrap();

    let stream = StreamSource::new(
        "plugin.xml",
        br#"<components>
            <component id="plugin" type="greeter"><property name="helper" ref="svc"/></component>
        </components>"#
            .as_slice(),
    );
    let holder = configuration.load_delayed_stream("core", &stream).unwrap();

    let visible: Vec<String> = holder.get_all_modules().into_keys().collect();
    assert_eq!(visible, vec!["plugin"]);
    assert!(holder.get_module("svc").is_none());
    assert!(configuration.get_module("plugin").is_none());
    assert_eq!(holder.loader_id(), "core");

    holder.release().unwrap();
    assert!(holder.is_released());
    assert!(holder.get_module("plugin").is_none());
    let recorded = events.lock().clone();
    assert!(recorded.contains(&"destroy:plugin".to_string()));
    assert!(!recorded.contains(&"destroy:svc".to_string()));
    assert!(configuration.get_module("svc").is_some());
    assert_eq!(configuration.metrics().delayed_loads, 1);
}

#[test]
fn test_delayed_load_requires_known_loader() {
    let events = events();
    let configuration = builder(&events).bootstrap(HashMap::new()).unwrap();

    let stream = StreamSource::new("plugin.xml", b"<components/>".as_slice());
    let err = configuration.load_delayed_stream("unknown", &stream).unwrap_err();
    assert!(matches!(
        err,
        ConfiguratorError::Config {
            source: ConfigError::UnknownLoader { .. }
        }
    ));
}

#[test]
fn test_core_document_declares_loaders_and_properties() {
    let events = events();
    let configuration = base_builder(&events)
        .with_core_document(
            "core.xml",
            r#"<components>
                <properties><property name="user" value="core"/></properties>
                <loader id="main" selector="conf/*.xml" loadFromWorkingDir="false"/>
            </components>"#,
        )
        .bootstrap(HashMap::new())
        .unwrap();

    assert_eq!(configuration.loaders(), vec!["main"]);
    let svc = configuration.get_module_as::<Greeter>("svc").unwrap();
    assert_eq!(svc.greeting, "hello core");
    assert_eq!(configuration.get_module("svc").map(|m| m.type_name().to_string()), Some("greeter".to_string()));
}

#[test]
fn test_core_document_rejects_components() {
    let events = events();
    let result = base_builder(&events)
        .with_core_document(
            "core.xml",
            r#"<components><component id="svc" type="greeter"/></components>"#,
        )
        .build();
    assert!(result.is_err());
}

#[test]
fn test_create_instance_is_unmanaged() {
    let events = events();
    let configuration = builder(&events).bootstrap(HashMap::new()).unwrap();

    let properties = IndexMap::from([
        ("greeting".to_string(), PropertyValue::literal("standalone")),
        ("helper".to_string(), PropertyValue::reference("helper")),
    ]);
    let instance = configuration.create_instance("greeter", properties).unwrap();
    let greeter = instance.downcast::<Greeter>().unwrap();
    assert_eq!(greeter.greeting, "standalone");
    assert_eq!(configuration.get_all_modules().len(), 2);
}

#[test]
fn test_metrics_and_properties() {
    let events = events();
    let configuration = builder(&events).bootstrap(HashMap::new()).unwrap();

    let metrics = configuration.metrics();
    assert_eq!(metrics.loaders_processed, 1);
    assert_eq!(metrics.resources_processed, 1);
    assert_eq!(metrics.definitions_registered, 4);
    assert_eq!(metrics.modules_constructed, 4);
    assert!(metrics.load_duration_ms().is_some());

    assert_eq!(configuration.properties().unwrap().get("user"), Some("world"));
    assert!(configuration.failed_resources().is_empty());
}
