//! Resolution through the cache: single flight, structural rules and
//! failure handling.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use clientdeps::core::{AssetType, Mode};
use clientdeps::modules::{ModuleDeclaration, ModuleId};
use clientdeps::node::DependencyNode;
use clientdeps::specifier::DependencySpecifier;
use clientdeps::test_utils::{MemoryResources, library_xml};

use crate::common::Harness;

fn child_ids(node: &DependencyNode) -> Vec<String> {
    node.children().iter().map(|c| c.identifier().to_string()).collect()
}

#[test]
fn test_concurrent_resolution_reads_manifest_once() {
    let harness = Harness::build(
        MemoryResources::new().with_read_delay(Duration::from_millis(50)),
        false,
        Vec::new(),
    );
    harness.file("reports.lib.xml", library_xml(&["core.js"], &["reports/Grid.js"]));
    harness.files(&["core.js", "reports/Grid.js"]);

    let barrier = Arc::new(Barrier::new(16));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let resolver = harness.resolver.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                resolver.resolve(&DependencySpecifier::parse("reports.lib.xml")).unwrap()
            })
        })
        .collect();

    let nodes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(nodes.iter().all(|n| Arc::ptr_eq(n, &nodes[0])));
    assert_eq!(harness.resources.read_count("reports.lib.xml"), 1);
    assert_eq!(harness.resolver.stats().loads, 3);
}

#[test]
fn test_repeated_resolution_is_idempotent() {
    let harness = Harness::new(false);
    harness.files(&["a.js"]);
    let spec = DependencySpecifier::parse("a.js");

    let first = harness.resolver.resolve(&spec).unwrap();
    let second = harness.resolver.resolve(&DependencySpecifier::parse("/A.JS")).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_library_cannot_include_library() {
    let harness = Harness::new(false);
    harness.file("outer.lib.xml", library_xml(&["inner", "a.js"], &[]));
    harness.file("inner.lib.xml", library_xml(&[], &["b.js"]));
    harness.files(&["a.js", "b.js"]);

    let outer = harness.resolver.resolve(&DependencySpecifier::parse("outer")).unwrap();
    assert_eq!(child_ids(&outer), vec!["a.js"]);
}

#[test]
fn test_lib_suffix_normalizes_to_manifest() {
    let harness = Harness::new(false);
    harness.file("reports.lib.xml", library_xml(&[], &[]));

    let node = harness.resolver.resolve(&DependencySpecifier::parse("reports.lib")).unwrap();
    assert!(node.is_library());
    assert_eq!(node.dev_path(), Some("reports.lib.xml"));
}

#[test]
fn test_missing_file_is_cached_as_none() {
    let harness = Harness::new(false);
    let spec = DependencySpecifier::parse("missing.js");

    assert!(harness.resolver.resolve(&spec).is_none());
    assert!(harness.resolver.resolve(&spec).is_none());
    let stats = harness.resolver.stats();
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.hits, 1);
}

#[test]
fn test_dev_deployment_tolerates_missing_production_files() {
    let dev = Harness::new(true);
    let spec = DependencySpecifier::new("reports.min.js", Mode::Production);
    let node = dev.resolver.resolve(&spec).unwrap();
    assert_eq!(node.prod_path(), Some("reports.min.js"));
    assert_eq!(node.dev_path(), None);

    // only production requests get the pass
    assert!(dev.resolver.resolve(&DependencySpecifier::new("reports.min.js", Mode::Dev)).is_none());

    let prod = Harness::new(false);
    assert!(prod.resolver.resolve(&spec).is_none());
}

#[test]
fn test_dev_deployment_missing_production_library() {
    let dev = Harness::new(true);
    assert!(dev.resolver.resolve(&DependencySpecifier::new("gone.lib.xml", Mode::Production)).is_none());
}

#[test]
fn test_malformed_manifest_resolves_to_none() {
    let harness = Harness::new(false);
    harness.file("broken.lib.xml", "<libraries><dependencies>");
    harness.file("page.lib.xml", library_xml(&["a.js", "missing.js"], &[]));
    harness.files(&["a.js"]);

    assert!(harness.resolver.resolve(&DependencySpecifier::parse("broken")).is_none());

    // an unresolvable child only drops that child
    let page = harness.resolver.resolve(&DependencySpecifier::parse("page")).unwrap();
    assert_eq!(child_ids(&page), vec!["a.js"]);
}

#[test]
fn test_module_context_children_and_modes() {
    let harness = Harness::with_modules(
        false,
        vec![ModuleDeclaration::new("query", ["query/Grid.js", "query/Debug.js"])],
    );
    harness.files(&["query/Grid.js", "query/Debug.js"]);

    let spec = DependencySpecifier::module_context("Query", Mode::Dev);
    let context = harness.resolver.resolve(&spec).unwrap();
    assert_eq!(context.primary_type(), Some(AssetType::ModuleContext));
    assert_eq!(child_ids(&context), vec!["query/Grid.js", "query/Debug.js"]);
    assert!(context.children().iter().all(|c| c.mode() == Mode::Dev));
    assert_eq!(context.required_modules(), &[ModuleId::new("query")]);
}

#[test]
fn test_unknown_modules_are_skipped() {
    let harness = Harness::with_modules(false, vec![ModuleDeclaration::new("core", Vec::<String>::new())]);
    harness.file(
        "page.lib.xml",
        r#"<libraries>
            <requiredModules>
                <module name="core"/>
                <module name="nonexistent"/>
            </requiredModules>
        </libraries>"#,
    );

    let page = harness.resolver.resolve(&DependencySpecifier::parse("page")).unwrap();
    assert_eq!(page.required_modules(), &[ModuleId::new("core")]);
    assert_eq!(child_ids(&page), vec!["core.context"]);
    assert!(harness.resolver.resolve(&DependencySpecifier::parse("nonexistent.context")).is_none());
}

fn module_cycle() -> Harness {
    let harness =
        Harness::with_modules(false, vec![ModuleDeclaration::new("query", ["query/Ctx.js", "query.lib.xml"])]);
    harness.file(
        "query.lib.xml",
        r#"<libraries>
            <dependencies><dependency path="query/Grid.js"/></dependencies>
            <requiredModules><module name="query"/></requiredModules>
        </libraries>"#,
    );
    harness.files(&["query/Grid.js", "query/Ctx.js"]);
    harness
}

#[test]
fn test_module_cycle_resolves_without_waiting() {
    let harness = module_cycle();

    let started = Instant::now();
    let context = harness.resolver.resolve(&DependencySpecifier::parse("query.context")).unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(child_ids(&context), vec!["query/Ctx.js", "query.lib.xml"]);

    // the back edge to the context being loaded is kept
    let library = harness.resolver.resolve(&DependencySpecifier::parse("query.lib.xml")).unwrap();
    assert_eq!(child_ids(&library), vec!["query/Grid.js", "query.context"]);
    assert_eq!(library.required_modules(), &[ModuleId::new("query")]);
}

#[test]
fn test_module_cycle_is_independent_of_load_order() {
    let cold = module_cycle();
    let mut cold_page = cold.resolver.client_dependencies();
    cold_page.add_dependency("query.lib");

    let warm = module_cycle();
    assert!(warm.resolver.resolve(&DependencySpecifier::parse("query.context")).is_some());
    let mut warm_page = warm.resolver.client_dependencies();
    warm_page.add_dependency("query.lib");

    assert_eq!(cold_page.script_paths(), vec!["query/Grid.js", "query/Ctx.js"]);
    assert_eq!(warm_page.script_paths(), cold_page.script_paths());

    let library = DependencySpecifier::parse("query.lib");
    assert_eq!(
        child_ids(&warm.resolver.resolve(&library).unwrap()),
        child_ids(&cold.resolver.resolve(&library).unwrap())
    );
}

#[test]
fn test_externals_bypass_the_cache() {
    let harness = Harness::new(false);
    let spec = DependencySpecifier::parse("https://cdn.example.com/d3.v7.min.js");

    let node = harness.resolver.resolve(&spec).unwrap();
    assert!(node.is_external());
    assert_eq!(node.primary_type(), Some(AssetType::Script));
    assert_eq!(harness.resolver.stats().entries, 0);
}
