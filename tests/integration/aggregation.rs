//! Flattening through `ClientDependencies`.

use clientdeps::core::{AssetType, Mode};
use clientdeps::modules::{ModuleDeclaration, ModuleId};
use clientdeps::specifier::DependencySpecifier;
use clientdeps::test_utils::library_xml;

use crate::common::Harness;

const REPORTS: &str = r#"<libraries>
    <library compileInProduction="true">
        <script path="reports/Grid.js"/>
        <script path="reports/Grid.css"/>
    </library>
    <dependencies>
        <dependency path="core/api.js"/>
    </dependencies>
</libraries>"#;

#[test]
fn test_duplicates_collapse_in_first_seen_order() {
    let harness = Harness::new(true);
    harness.file("x.lib.xml", library_xml(&["shared/util.js"], &["x/one.js"]));
    harness.file("y.lib.xml", library_xml(&["shared/util.js"], &["y/one.js"]));
    harness.files(&["shared/util.js", "x/one.js", "y/one.js"]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("x").add_dependency("y").add_dependency("x");

    assert_eq!(page.len(), 3);
    assert_eq!(page.script_paths(), vec!["shared/util.js", "x/one.js", "y/one.js"]);
}

#[test]
fn test_modes_are_exclusive() {
    let manifest = r#"<libraries>
        <dependencies>
            <dependency path="debug.js" mode="dev"/>
            <dependency path="bundle.js" mode="production"/>
            <dependency path="shared.js"/>
        </dependencies>
    </libraries>"#;

    for (dev_mode, expected) in [(true, vec!["debug.js", "shared.js"]), (false, vec!["bundle.js", "shared.js"])] {
        let harness = Harness::new(dev_mode);
        harness.file("page.lib.xml", manifest);
        harness.files(&["debug.js", "bundle.js", "shared.js"]);

        let mut page = harness.resolver.client_dependencies();
        page.add_dependency("page");
        assert_eq!(page.script_paths(), expected, "dev_mode={dev_mode}");
    }

    let harness = Harness::new(true);
    harness.file("page.lib.xml", manifest);
    harness.files(&["debug.js", "bundle.js", "shared.js"]);
    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("page");
    assert_eq!(page.paths(AssetType::Script, Mode::Production), vec!["bundle.js", "shared.js"]);
}

#[test]
fn test_bundles_replace_sources_in_production() {
    let harness = Harness::new(false);
    harness.file("reports.lib.xml", REPORTS);
    harness.files(&[
        "core/api.js",
        "reports/Grid.js",
        "reports/Grid.css",
        "reports.min.js",
        "reports.min.css",
    ]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("reports.lib");

    assert_eq!(page.script_paths(), vec!["core/api.js", "reports.min.js"]);
    assert_eq!(page.style_paths(), vec!["reports.min.css"]);

    assert_eq!(page.paths(AssetType::Script, Mode::Dev), vec!["core/api.js", "reports/Grid.js"]);
    assert_eq!(page.paths(AssetType::Style, Mode::Dev), vec!["reports/Grid.css"]);
}

#[test]
fn test_dev_only_request_has_no_bundles() {
    let harness = Harness::new(false);
    harness.file("reports.lib.xml", REPORTS);
    harness.files(&["core/api.js", "reports/Grid.js", "reports/Grid.css", "reports.min.js"]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency(DependencySpecifier::new("reports", Mode::Dev));

    let rendered = page.render(Mode::Dev);
    assert_eq!(rendered.scripts, vec!["core/api.js", "reports/Grid.js"]);
    assert!(page.paths(AssetType::Script, Mode::Production).is_empty());
}

#[test]
fn test_dev_deployment_references_unbuilt_bundles() {
    let harness = Harness::new(true);
    harness.file("reports.lib.xml", REPORTS);
    harness.files(&["core/api.js", "reports/Grid.js", "reports/Grid.css"]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("reports");

    assert_eq!(page.script_paths(), vec!["core/api.js", "reports/Grid.js"]);
    assert_eq!(page.paths(AssetType::Script, Mode::Production), vec!["core/api.js", "reports.min.js"]);
}

#[test]
fn test_required_modules_and_manifests() {
    let harness = Harness::with_modules(
        true,
        vec![
            ModuleDeclaration::new("query", ["query/app.json", "query/Grid.js"]),
            ModuleDeclaration::new("core", Vec::<String>::new()),
        ],
    );
    harness.file(
        "page.lib.xml",
        r#"<libraries>
            <requiredModules>
                <module name="query"/>
                <module name="core"/>
            </requiredModules>
        </libraries>"#,
    );
    harness.files(&["query/app.json", "query/Grid.js"]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("page");

    assert_eq!(page.required_modules(), vec![ModuleId::new("query"), ModuleId::new("core")]);
    assert_eq!(page.manifest_paths(), vec!["query/app.json"]);
    assert_eq!(page.script_paths(), vec!["query/Grid.js"]);
}

#[test]
fn test_failures_and_externals() {
    let harness = Harness::new(false);
    harness.files(&["a.js"]);

    let mut page = harness.resolver.client_dependencies();
    page.add_dependency("missing.js")
        .add_dependency("https://cdn.example.com/chart.js")
        .add_dependency(String::from("a.js"))
        .add_dependency(harness.resolver.supplier_for("https://cdn.example.com/chart.css", Mode::Both));

    assert_eq!(page.script_paths(), vec!["https://cdn.example.com/chart.js", "a.js"]);
    assert_eq!(page.style_paths(), vec!["https://cdn.example.com/chart.css"]);
    assert!(page.required_modules().is_empty());
}
