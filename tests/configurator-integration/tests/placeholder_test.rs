//! 占位符与属性聚合集成测试

mod common;

use common::{builder_in, components, events, filesystem_loader, write_file, Service};
use config_abstractions::{CoreSettings, DocumentReplacer, PropertySet, SystemPropertiesMode};
use config_impl::{parse_document, write_document, PlaceholderEngine, XmlPropertyReplacer};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use tempfile::TempDir;

fn greeting_tree(greeting: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "conf/svc.xml",
        &components(&format!(
            r#"<component id="svc" type="service"><property name="greeting" value="{greeting}"/></component>"#
        )),
    );
    write_file(dir.path(), "conf/other.xml", &components(r#"<component id="other" type="service"/>"#));
    dir
}

#[test]
fn test_chained_placeholders_resolve_fully() {
    let dir = greeting_tree("${a}");
    let events = events();
    let configuration = builder_in(&dir, &events)
        .with_property("a", "${b}")
        .with_property("b", "${c}")
        .with_property("c", "final")
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    assert_eq!(configuration.get_module_as::<Service>("svc").unwrap().greeting, "final");
}

#[test]
fn test_placeholder_cycle_isolates_resource() {
    let dir = greeting_tree("${a}");
    let events = events();
    let configuration = builder_in(&dir, &events)
        .with_property("a", "${b}")
        .with_property("b", "${a}")
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    assert!(configuration.get_module("svc").is_none());
    assert!(configuration.get_module("other").is_some());
    let failed = configuration.failed_resources();
    assert_eq!(failed.len(), 1);
    assert!(failed[0].resource.ends_with("svc.xml"));
    assert!(failed[0].message.contains("循环"));
}

#[test]
fn test_lenient_and_strict_unresolved_placeholders() {
    let dir = greeting_tree("hello ${nobody}");
    let events = events();
    let lenient = builder_in(&dir, &events)
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();
    assert_eq!(
        lenient.get_module_as::<Service>("svc").unwrap().greeting,
        "hello ${nobody}"
    );

    let strict = builder_in(&dir, &events)
        .with_settings(CoreSettings::default().with_strict_placeholders(true))
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();
    assert!(strict.get_module("svc").is_none());
    assert_eq!(strict.failed_resources().len(), 1);
}

#[test]
fn test_comments_are_never_substituted() {
    let source = r#"<components>
    <!-- owner: ${owner} -->
    <component id="${name}" type="service"/>
</components>"#;
    let document = parse_document("doc.xml", source.as_bytes()).unwrap();
    let properties: PropertySet = [("name", "svc"), ("owner", "ops")].into_iter().collect();

    let replaced = XmlPropertyReplacer::new(PlaceholderEngine::new())
        .replace_in_document(&document, &properties)
        .unwrap();
    let written = write_document(&replaced);

    assert!(written.contains("<!-- owner: ${owner} -->"));
    assert!(written.contains(r#"id="svc""#));
    assert!(!written.contains("ops"));
}

#[test]
fn test_property_file_precedence() {
    let dir = greeting_tree("${greeting.text}");
    write_file(
        dir.path(),
        "props/app.yaml",
        "greeting:\n  text: from file\n  extra: file only\n",
    );
    let events = events();

    // 默认情况下属性文件覆盖声明属性
    let files_win = builder_in(&dir, &events)
        .with_property("greeting.text", "declared")
        .with_property_location("props/app.yaml")
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();
    assert_eq!(files_win.get_module_as::<Service>("svc").unwrap().greeting, "from file");
    assert_eq!(files_win.properties().unwrap().get("greeting.extra"), Some("file only"));

    let declared_wins = builder_in(&dir, &events)
        .with_property("greeting.text", "declared")
        .with_property_location("props/app.yaml")
        .with_local_override(true)
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();
    assert_eq!(declared_wins.get_module_as::<Service>("svc").unwrap().greeting, "declared");
}

#[test]
fn test_environment_modes() {
    let dir = greeting_tree("${greeting.text}");
    let environment: PropertySet = [("greeting.text", "from env"), ("HOME", "/home/test")].into_iter().collect();
    let events = events();

    let fallback = builder_in(&dir, &events)
        .with_environment(environment.clone())
        .with_property("greeting.text", "declared")
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();
    assert_eq!(fallback.get_module_as::<Service>("svc").unwrap().greeting, "declared");
    assert_eq!(fallback.properties().unwrap().get("HOME"), Some("/home/test"));

    let overriding = builder_in(&dir, &events)
        .with_environment(environment.clone())
        .with_system_properties_mode(SystemPropertiesMode::Override)
        .with_property("greeting.text", "declared")
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();
    assert_eq!(overriding.get_module_as::<Service>("svc").unwrap().greeting, "from env");

    let never = builder_in(&dir, &events)
        .with_environment(environment)
        .with_system_properties_mode(SystemPropertiesMode::Never)
        .with_loader("core", filesystem_loader("conf/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();
    assert!(never.properties().unwrap().get("HOME").is_none());
    assert_eq!(
        never.get_module_as::<Service>("svc").unwrap().greeting,
        "${greeting.text}"
    );
}

#[test]
fn test_properties_declared_by_one_loader_reach_the_next() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "first/props.xml",
        &components(r#"<properties><property name="who" value="first loader"/></properties>"#),
    );
    write_file(
        dir.path(),
        "second/svc.xml",
        &components(r#"<component id="svc" type="service"><property name="greeting" value="hi ${who}"/></component>"#),
    );
    let events = events();
    let configuration = builder_in(&dir, &events)
        .with_loader("first", filesystem_loader("first/*.xml"))
        .with_loader("second", filesystem_loader("second/*.xml"))
        .bootstrap(HashMap::new())
        .unwrap();

    assert_eq!(
        configuration.get_module_as::<Service>("svc").unwrap().greeting,
        "hi first loader"
    );
}
