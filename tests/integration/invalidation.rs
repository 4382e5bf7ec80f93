//! Watch and reload driven invalidation.

use std::sync::Arc;

use clientdeps::core::Mode;
use clientdeps::modules::ModuleDeclaration;
use clientdeps::specifier::DependencySpecifier;
use clientdeps::test_utils::library_xml;
use clientdeps::watch::WatchEventKind;

use crate::common::Harness;

#[test]
fn test_touching_one_manifest_only_invalidates_its_entries() {
    let harness = Harness::new(false);
    harness.file("a.lib.xml", library_xml(&["a.js"], &[]));
    harness.file("b.lib.xml", library_xml(&["b.js"], &[]));
    harness.files(&["a.js", "b.js"]);

    let a = DependencySpecifier::parse("a");
    let b = DependencySpecifier::parse("b");
    let first_a = harness.resolver.resolve(&a).unwrap();
    let first_b = harness.resolver.resolve(&b).unwrap();

    assert_eq!(harness.fire("a.lib.xml", WatchEventKind::Modify), 1);

    assert!(!harness.resolver.is_cached(&a.cache_key()));
    assert!(harness.resolver.is_cached(&b.cache_key()));
    assert!(harness.resolver.is_cached(&DependencySpecifier::parse("a.js").cache_key()));

    let second_a = harness.resolver.resolve(&a).unwrap();
    let second_b = harness.resolver.resolve(&b).unwrap();
    assert!(!Arc::ptr_eq(&first_a, &second_a));
    assert!(Arc::ptr_eq(&first_b, &second_b));
    assert_eq!(harness.resources.read_count("a.lib.xml"), 2);
    assert_eq!(harness.resources.read_count("b.lib.xml"), 1);
}

#[test]
fn test_one_watch_per_manifest_across_modes() {
    let harness = Harness::new(false);
    harness.file("a.lib.xml", library_xml(&[], &[]));

    let dev = DependencySpecifier::new("a", Mode::Dev);
    let prod = DependencySpecifier::new("a", Mode::Production);
    harness.resolver.resolve(&dev);
    harness.resolver.resolve(&prod);
    harness.resolver.resolve(&DependencySpecifier::parse("a"));

    assert_eq!(harness.watcher.total_registrations(), 1);
    assert_eq!(harness.resolver.watched_files(), 1);

    harness.fire("a.lib.xml", WatchEventKind::Modify);
    assert!(!harness.resolver.is_cached(&dev.cache_key()));
    assert!(!harness.resolver.is_cached(&prod.cache_key()));

    // reloading does not register a second watch
    harness.resolver.resolve(&dev);
    assert_eq!(harness.watcher.total_registrations(), 1);
}

#[test]
fn test_supplier_sees_edited_manifest() {
    let harness = Harness::new(true);
    harness.file("page.lib.xml", library_xml(&["old.js"], &[]));
    harness.files(&["old.js", "new.js"]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("page");
    assert_eq!(page.script_paths(), vec!["old.js"]);

    harness.edit("page.lib.xml", library_xml(&["new.js"], &[]));
    assert_eq!(page.script_paths(), vec!["new.js"]);
}

#[test]
fn test_deleted_manifest_stops_resolving() {
    let harness = Harness::new(false);
    harness.file("page.lib.xml", library_xml(&[], &[]));
    let spec = DependencySpecifier::parse("page");
    assert!(harness.resolver.resolve(&spec).is_some());

    harness.resources.remove("page.lib.xml");
    harness.fire("page.lib.xml", WatchEventKind::Delete);
    assert!(harness.resolver.resolve(&spec).is_none());

    harness.file("page.lib.xml", library_xml(&[], &[]));
    harness.fire("page.lib.xml", WatchEventKind::Create);
    assert!(harness.resolver.resolve(&spec).is_some());
}

#[test]
fn test_broken_manifest_recovers_after_fix() {
    let harness = Harness::new(false);
    harness.file("page.lib.xml", "<libraries><dependencies>");
    harness.files(&["a.js"]);
    let spec = DependencySpecifier::parse("page");
    assert!(harness.resolver.resolve(&spec).is_none());

    harness.edit("page.lib.xml", library_xml(&["a.js"], &[]));
    assert!(harness.resolver.resolve(&spec).is_some());
}

#[test]
fn test_module_context_recovers_fixed_library() {
    let harness = Harness::with_modules(true, vec![ModuleDeclaration::new("query", ["page.lib.xml"])]);
    harness.file("page.lib.xml", "<libraries><dependencies>");
    harness.files(&["a.js"]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("query.context");
    assert!(page.script_paths().is_empty());

    let context = harness.resolver.resolve(&DependencySpecifier::parse("query.context")).unwrap();
    assert_eq!(context.children().len(), 1);

    assert_eq!(harness.edit("page.lib.xml", library_xml(&["a.js"], &[])), 1);
    assert_eq!(page.script_paths(), vec!["a.js"]);
}

#[test]
fn test_parent_survives_child_invalidation() {
    let harness = Harness::new(true);
    harness.file("page.lib.xml", library_xml(&["a.js"], &[]));
    harness.files(&["a.js"]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("page");
    assert_eq!(page.script_paths(), vec!["a.js"]);

    assert!(harness.resolver.invalidate_key(&DependencySpecifier::parse("a.js").cache_key()));
    assert!(harness.resolver.is_cached(&DependencySpecifier::parse("page").cache_key()));
    assert_eq!(page.script_paths(), vec!["a.js"]);
}

#[test]
fn test_module_reload_clears_everything() {
    let harness = Harness::with_modules(false, vec![ModuleDeclaration::new("query", ["query/Grid.js"])]);
    harness.files(&["query/Grid.js", "query/Grid2.js"]);

    let context = DependencySpecifier::parse("query.context");
    let before = harness.resolver.resolve(&context).unwrap();
    assert_eq!(before.children().len(), 1);
    let generation = harness.resolver.generation();

    harness.modules.reload([ModuleDeclaration::new("query", ["query/Grid.js", "query/Grid2.js"])]);

    assert_eq!(harness.resolver.stats().entries, 0);
    assert!(harness.resolver.generation() > generation);
    let after = harness.resolver.resolve(&context).unwrap();
    assert_eq!(after.children().len(), 2);
}

#[test]
fn test_invalidate_all_keeps_watches() {
    let harness = Harness::new(false);
    harness.file("page.lib.xml", library_xml(&[], &[]));
    let spec = DependencySpecifier::parse("page");
    harness.resolver.resolve(&spec);

    harness.resolver.invalidate_all();
    assert!(!harness.resolver.is_cached(&spec.cache_key()));
    assert_eq!(harness.resolver.watched_files(), 1);

    // the file index was cleared, a reload re-indexes it
    harness.resolver.resolve(&spec);
    harness.fire("page.lib.xml", WatchEventKind::Modify);
    assert!(!harness.resolver.is_cached(&spec.cache_key()));
}

#[test]
fn test_dropping_resolver_unregisters_watches() {
    let harness = Harness::new(false);
    harness.file("page.lib.xml", library_xml(&[], &[]));
    harness.resolver.resolve(&DependencySpecifier::parse("page"));
    assert_eq!(harness.watcher.watched().len(), 1);

    let Harness {
        watcher,
        resolver,
        ..
    } = harness;
    drop(resolver);
    assert!(watcher.watched().is_empty());
}
