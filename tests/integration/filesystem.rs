//! Resolution over real web roots with OS-native watching.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clientdeps::config::ClientDepsConfig;
use clientdeps::specifier::DependencySpecifier;
use clientdeps::test_utils::{init_test_logging, library_xml};
use clientdeps::watch::NotifyWatchService;
use tempfile::TempDir;

fn write(root: &Path, path: &str, contents: &str) {
    let file = root.join(path);
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(file, contents).unwrap();
}

fn config(dir: &TempDir, toml: &str) -> ClientDepsConfig {
    let path = dir.path().join("clientdeps.toml");
    fs::write(&path, toml).unwrap();
    ClientDepsConfig::load_from(&path).unwrap()
}

#[test]
fn test_roots_overlay_in_order() {
    init_test_logging(None);
    let dir = TempDir::new().unwrap();
    write(dir.path(), "core/web/Ext4.lib.xml", &library_xml(&[], &["ext4/ext-all.js"]));
    write(dir.path(), "core/web/ext4/ext-all.js", "");
    write(dir.path(), "query/web/query/Grid.js", "");
    write(dir.path(), "query/web/Ext4.lib.xml", &library_xml(&[], &["shadowed.js"]));

    let config = config(
        &dir,
        r#"
dev_mode = true
roots = ["core/web", "query/web"]

[modules.query]
dependencies = ["Ext4", "query/Grid.js"]
"#,
    );
    let (builder, _registry) = config.resolver_builder();
    let resolver = builder.build();

    let mut page = resolver.client_dependencies();
    page.add_dependency("query.context");
    assert_eq!(page.script_paths(), vec!["ext4/ext-all.js", "query/Grid.js"]);
    assert_eq!(page.required_modules().len(), 1);
}

#[test]
fn test_editing_a_manifest_on_disk_invalidates_it() {
    init_test_logging(None);
    let dir = TempDir::new().unwrap();
    write(dir.path(), "webapp/page.lib.xml", &library_xml(&["old.js"], &[]));
    write(dir.path(), "webapp/old.js", "");
    write(dir.path(), "webapp/new.js", "");

    let config = config(&dir, "dev_mode = true\n");
    let (builder, _registry) = config.resolver_builder();
    let resolver = builder.watcher(Arc::new(NotifyWatchService::new().unwrap())).build();

    let mut page = resolver.client_dependencies();
    page.add_dependency("page");
    assert_eq!(page.script_paths(), vec!["old.js"]);
    assert_eq!(resolver.watched_files(), 1);

    let generation = resolver.generation();
    write(dir.path(), "webapp/page.lib.xml", &library_xml(&["new.js"], &[]));

    let deadline = Instant::now() + Duration::from_secs(10);
    while resolver.generation() == generation && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(25));
    }
    assert!(resolver.generation() > generation, "no watch event within 10s");

    // a second event for the same write may still be in flight
    thread::sleep(Duration::from_millis(100));
    assert_eq!(page.script_paths(), vec!["new.js"]);
}

#[test]
fn test_unwatched_resolver_keeps_stale_result_until_invalidated() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "webapp/page.lib.xml", &library_xml(&["old.js"], &[]));
    write(dir.path(), "webapp/old.js", "");
    write(dir.path(), "webapp/new.js", "");

    let config = config(&dir, "dev_mode = true\n");
    let (builder, _registry) = config.resolver_builder();
    let resolver = builder.build();
    let spec = DependencySpecifier::parse("page");

    let before = resolver.resolve(&spec).unwrap();
    write(dir.path(), "webapp/page.lib.xml", &library_xml(&["new.js"], &[]));
    assert!(Arc::ptr_eq(&before, &resolver.resolve(&spec).unwrap()));

    let file = dir.path().join("webapp/page.lib.xml");
    assert_eq!(resolver.invalidate_file(&file), 1);
    let after = resolver.resolve(&spec).unwrap();
    assert_eq!(after.children()[0].identifier(), "new.js");
}
