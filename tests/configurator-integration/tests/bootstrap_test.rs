//! 引导流程集成测试：覆盖策略、匿名定义、验证隔离、阶段顺序与转换

mod common;

use common::{builder_in, components, events, filesystem_loader, write_file, Service};
use config_abstractions::{CoreSettings, ResourceFailurePolicy, StreamSource};
use config_impl::SettingsLoader;
use configurator_common::{ConfigError, ConfiguratorError};
use configurator_composition::ModuleHolder;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use tempfile::TempDir;

fn two_loader_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "l1/a.xml",
        &components(r#"<component id="svc" type="service"><property name="greeting" value="from L1"/></component>"#),
    );
    write_file(
        dir.path(),
        "l1/b.xml",
        &components(r#"<component id="helper" type="service"/>"#),
    );
    write_file(
        dir.path(),
        "l2/override.xml",
        &components(r#"<component id="svc" type="service"><property name="greeting" value="from L2"/></component>"#),
    );
    dir
}

#[test]
fn test_lookup_returns_same_instance() {
    let dir = two_loader_tree();
    let events = events();
    let configuration = builder_in(&dir, &events)
        .with_loader("L1", filesystem_loader("l1/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    let first = configuration.get_module("svc").unwrap();
    for _ in 0..3 {
        assert!(configuration.get_module("svc").unwrap().same_instance(&first));
    }
    let visible: Vec<String> = configuration.get_all_modules().into_keys().collect();
    assert_eq!(visible, vec!["helper", "svc"]);
}

#[test]
fn test_duplicate_without_override_halts_before_construction() {
    let dir = two_loader_tree();
    let events = events();
    let err = builder_in(&dir, &events)
        .with_loader("L1", filesystem_loader("l1/*.xml"))
        .with_loader("L2", filesystem_loader("l2/*.xml").with_allow_override(false))
        .bootstrap(HashMap::new())
        .unwrap_err();

    match err.root_cause() {
        ConfiguratorError::Config {
            source:
                ConfigError::DuplicateDefinition {
                    identity,
                    existing_loader,
                    new_loader,
                },
        } => {
            assert_eq!(identity, "svc");
            assert_eq!(existing_loader, "L1");
            assert_eq!(new_loader, "L2");
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("L1") && message.contains("L2"));
    assert!(events.lock().is_empty());
}

#[test]
fn test_override_allowed_second_definition_wins() {
    let dir = two_loader_tree();
    let events = events();
    let configuration = builder_in(&dir, &events)
        .with_loader("L1", filesystem_loader("l1/*.xml"))
        .with_loader("L2", filesystem_loader("l2/*.xml").with_allow_override(true))
        .bootstrap(HashMap::new())
        .unwrap();

    let svc = configuration.get_module_as::<Service>("svc").unwrap();
    assert_eq!(svc.greeting, "from L2");

    let supersessions = configuration.supersessions();
    assert_eq!(supersessions.len(), 1);
    assert_eq!(supersessions[0].identity, "svc");
    assert_eq!(supersessions[0].previous_loader, "L1");
    assert_eq!(supersessions[0].new_loader, "L2");
    assert_eq!(
        events.lock().iter().filter(|e| e.as_str() == "create:svc").count(),
        1
    );
}

#[test]
fn test_anonymous_definitions_never_collide() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "a/one.xml",
        &components(r#"<component type="service"/><invoke target="named" method="start"/><component id="named" type="service"/>"#),
    );
    write_file(
        dir.path(),
        "b/two.xml",
        &components(r#"<component type="service"/><invoke target="named2" method="start"/><component id="named2" type="service"/>"#),
    );
    let events = events();
    let configuration = builder_in(&dir, &events)
        .with_loader("A", filesystem_loader("a/*.xml"))
        .with_loader("B", filesystem_loader("b/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    let metrics = configuration.metrics();
    assert_eq!(metrics.definitions_registered, 6);
    assert_eq!(metrics.modules_constructed, 6);
    let visible: Vec<String> = configuration.get_all_modules().into_keys().collect();
    assert_eq!(visible, vec!["named", "named2"]);
    assert!(configuration.supersessions().is_empty());
}

const SCHEMA: &str = r#"<schema root="components">
    <element name="component" closed="true">
        <attribute name="id" required="true"/>
        <attribute name="type" pattern="service"/>
        <attribute name="phase"/>
        <child name="property"/>
    </element>
</schema>"#;

fn validated_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "conf/a-good.xml", &components(r#"<component id="good" type="service"/>"#));
    write_file(
        dir.path(),
        "conf/b-bad.xml",
        &components(r#"<component id="bad" type="service"/><component id="worse" type="service" color="red"/>"#),
    );
    write_file(dir.path(), "conf/c-also-good.xml", &components(r#"<component id="fine" type="service"/>"#));
    dir
}

#[test]
fn test_validation_failure_isolates_resource() {
    let dir = validated_tree();
    let events = events();
    let loader = filesystem_loader("conf/*.xml")
        .with_schema(StreamSource::new("components.schema.xml", SCHEMA.as_bytes()));
    let configuration = builder_in(&dir, &events)
        .with_loader("core", loader)
        .bootstrap(HashMap::new())
        .unwrap();

    let visible: Vec<String> = configuration.get_all_modules().into_keys().collect();
    assert_eq!(visible, vec!["fine", "good"]);
    assert!(configuration.get_module("bad").is_none());

    let failed = configuration.failed_resources();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].loader_id, "core");
    assert!(failed[0].resource.ends_with("b-bad.xml"));
    assert!(failed[0].message.contains("color"));
}

#[test]
fn test_validation_failure_aborts_under_abort_policy() {
    let dir = validated_tree();
    let events = events();
    let settings = CoreSettings::default().with_resource_failure_policy(ResourceFailurePolicy::AbortLoader);
    let loader = filesystem_loader("conf/*.xml")
        .with_schema(StreamSource::new("components.schema.xml", SCHEMA.as_bytes()));

    let err = builder_in(&dir, &events)
        .with_settings(settings)
        .with_loader("core", loader)
        .bootstrap(HashMap::new())
        .unwrap_err();
    assert!(err.is_validation());
    match &err {
        ConfiguratorError::ResourceFailed {
            loader_id, resource, ..
        } => {
            assert_eq!(loader_id, "core");
            assert!(resource.ends_with("b-bad.xml"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(events.lock().is_empty());
}

#[test]
fn test_validation_disabled_by_settings_file() {
    let dir = validated_tree();
    write_file(dir.path(), "settings/engine.toml", "validation_enabled = false\n");
    let events = events();
    let loader = filesystem_loader("conf/*.xml")
        .with_schema(StreamSource::new("components.schema.xml", SCHEMA.as_bytes()));

    let settings_loader = SettingsLoader::new()
        .with_file(dir.path().join("settings/engine.toml"))
        .with_environment(HashMap::new());
    let configuration = builder_in(&dir, &events)
        .with_settings_loader(settings_loader)
        .with_loader("core", loader)
        .bootstrap(HashMap::new())
        .unwrap();

    assert!(!configuration.settings().validation_enabled);
    assert!(configuration.get_module("worse").is_some());
    assert!(configuration.failed_resources().is_empty());
}

#[test]
fn test_phase_order_is_independent_of_declaration() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "conf/phases.xml",
        &components(
            r#"<component id="t1" type="service" phase="init"/>
               <component id="b1" type="service"/>
               <component id="h1" type="service" phase="factory"/>
               <component id="t2" type="service" phase="tail"/>
               <component id="b2" type="service" phase="body"/>
               <component id="h2" type="service" phase="head"/>"#,
        ),
    );
    let events = events();
    builder_in(&dir, &events)
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    assert_eq!(
        events.lock().clone(),
        vec!["create:h1", "create:h2", "create:b1", "create:b2", "create:t1", "create:t2"]
    );
}

#[test]
fn test_dependencies_are_pulled_early() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "conf/deps.xml",
        &components(
            r#"<component id="early" type="service" phase="head">
                   <property name="deps"><list><ref>late</ref><component type="service"/></list></property>
               </component>
               <component id="late" type="service" phase="tail"/>"#,
        ),
    );
    let events = events();
    let configuration = builder_in(&dir, &events)
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    let early = configuration.get_module_as::<Service>("early").unwrap();
    let dependencies: Vec<&str> = early.dependencies.iter().map(|d| d.identity.as_str()).collect();
    assert_eq!(dependencies, vec!["late", "service#0"]);
    assert_eq!(events.lock().last().map(String::as_str), Some("create:early"));
    assert_eq!(configuration.metrics().modules_preloaded, 2);
}

const STYLESHEET: &str = r#"<stylesheet output="components" passthrough="false">
    <template match="greeter" element="component">
        <set attribute="type" value="service"/>
        <copy from="name" to="id" required="true"/>
        <property from="text" name="greeting"/>
    </template>
</stylesheet>"#;

#[test]
fn test_transform_rewrites_foreign_documents() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "greeters/en.xml", r#"<greeters><greeter name="en" text="hello ${user}"/></greeters>"#);
    write_file(dir.path(), "greeters/fr.xml", r#"<greeters><greeter name="fr" text="bonjour"/></greeters>"#);
    write_file(dir.path(), "greeters/broken.xml", r#"<greeters><greeter text="anonymous"/></greeters>"#);
    let events = events();
    let loader = filesystem_loader("greeters/*.xml")
        .with_transform(StreamSource::new("greeters.xsl", STYLESHEET.as_bytes()).with_id("greeters"));

    let configuration = builder_in(&dir, &events)
        .with_property("user", "world")
        .with_loader("greeters", loader)
        .bootstrap(HashMap::new())
        .unwrap();

    assert_eq!(configuration.get_module_as::<Service>("en").unwrap().greeting, "hello world");
    assert_eq!(configuration.get_module_as::<Service>("fr").unwrap().greeting, "bonjour");
    let failed = configuration.failed_resources();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].resource.ends_with("broken.xml"));
}

#[test]
fn test_default_selector_and_nested_loader() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "defaults/core.xml",
        &components(
            r#"<properties><property name="plugin.root" value="plugins"/></properties>
               <loader id="plugins" selector="${plugin.root}/*.xml" loadFromClassPath="false"/>
               <component id="core" type="service"/>"#,
        ),
    );
    write_file(
        dir.path(),
        "plugins/p.xml",
        &components(r#"<component id="plugin" type="service"><property name="deps" ref="core"/></component>"#),
    );
    let events = events();
    let loader = filesystem_loader("custom/*.xml").with_default_selector("defaults/*.xml");
    let configuration = builder_in(&dir, &events)
        .with_loader("core", loader)
        .bootstrap(HashMap::new())
        .unwrap();

    assert_eq!(configuration.loaders(), vec!["core", "plugins"]);
    let plugin = configuration.get_module_as::<Service>("plugin").unwrap();
    assert_eq!(plugin.dependencies[0].identity, "core");
    assert_eq!(
        configuration.properties().unwrap().get("plugin.root"),
        Some("plugins")
    );
}

#[test]
fn test_configuration_is_a_module_holder() {
    let dir = two_loader_tree();
    let events = events();
    let configuration = builder_in(&dir, &events)
        .with_loader("L1", filesystem_loader("l1/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    let holder: &dyn ModuleHolder = &configuration;
    assert_eq!(holder.get_all_modules().len(), 2);
    holder.release().unwrap();
    assert!(holder.is_released());
    assert_eq!(events.lock().iter().filter(|e| e.starts_with("destroy:")).count(), 2);
}

fn greeting_stylesheet(source_attribute: &str) -> String {
    format!(
        r#"<stylesheet output="components" passthrough="true">
    <template match="plugin" element="component">
        <set attribute="type" value="service"/>
        <copy from="name" to="id" required="true"/>
        <property from="{source_attribute}" name="greeting"/>
    </template>
</stylesheet>"#
    )
}

#[test]
fn test_redeclared_loader_uses_its_new_stylesheet() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "xsl/t1.xsl", &greeting_stylesheet("old"));
    write_file(dir.path(), "xsl/t2.xsl", &greeting_stylesheet("new"));
    write_file(
        dir.path(),
        "conf/core.xml",
        &components(r#"<loader id="plugins" selector="a/*.xml" xslt="xsl/t1.xsl" loadFromClassPath="false"/>"#),
    );
    write_file(
        dir.path(),
        "a/x.xml",
        r#"<plugins>
            <plugin name="p1" old="first" new="second"/>
            <loader id="plugins" selector="b/*.xml" xslt="xsl/t2.xsl" loadFromClassPath="false"/>
        </plugins>"#,
    );
    write_file(dir.path(), "b/y.xml", r#"<plugins><plugin name="p2" old="first" new="second"/></plugins>"#);
    let events = events();

    let configuration = builder_in(&dir, &events)
        .with_settings(CoreSettings::default().with_user_loader_overriding(true))
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    assert_eq!(configuration.get_module_as::<Service>("p1").unwrap().greeting, "first");
    assert_eq!(configuration.get_module_as::<Service>("p2").unwrap().greeting, "second");
    assert!(configuration.failed_resources().is_empty());
}
