//! End-to-end tests of the `clientdeps` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use clientdeps::test_utils::library_xml;

const REPORTS: &str = r#"<libraries>
    <library compileInProduction="true">
        <script path="reports/Grid.js"/>
    </library>
    <dependencies>
        <dependency path="core/api.js"/>
    </dependencies>
    <requiredModules>
        <module name="query"/>
    </requiredModules>
</libraries>"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let write = |path: &str, contents: &str| {
        let file = dir.path().join("webapp").join(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, contents).unwrap();
    };
    write("reports.lib.xml", REPORTS);
    write("reports.min.js", "");
    write("reports/Grid.js", "");
    write("core/api.js", "");
    write("query/Query.js", "");
    fs::write(
        dir.path().join("clientdeps.toml"),
        "[modules.query]\ndependencies = [\"query/Query.js\"]\n",
    )
    .unwrap();
    dir
}

fn clientdeps(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("clientdeps").unwrap();
    cmd.current_dir(dir)
        .env_remove("CLIENTDEPS_CONFIG")
        .env_remove("CLIENTDEPS_DEV_MODE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_resolve_text_output() {
    let dir = project();
    clientdeps(dir.path())
        .args(["resolve", "reports.lib"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reports.min.js"))
        .stdout(predicate::str::contains("core/api.js"))
        .stdout(predicate::str::contains("query/Query.js"))
        .stdout(predicate::str::contains("reports/Grid.js").not());
}

#[test]
fn test_resolve_dev_flag_uses_sources() {
    let dir = project();
    clientdeps(dir.path())
        .args(["--dev", "resolve", "reports"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reports/Grid.js"))
        .stdout(predicate::str::contains("reports.min.js").not());
}

#[test]
fn test_resolve_json_output() {
    let dir = project();
    let output = clientdeps(dir.path())
        .args(["resolve", "reports", "--format", "json", "--type", "script"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["mode"], "production");
    assert_eq!(
        json["scripts"],
        serde_json::json!(["core/api.js", "query/Query.js", "reports.min.js"])
    );
    assert_eq!(json["styles"], serde_json::json!([]));
    assert_eq!(json["required_modules"], serde_json::json!(["query"]));
}

#[test]
fn test_check_passes_on_valid_tree() {
    let dir = project();
    clientdeps(dir.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checked 1 library"));
}

#[test]
fn test_check_fails_on_broken_manifest() {
    let dir = project();
    fs::write(dir.path().join("webapp/broken.lib.xml"), "<libraries><dependencies>").unwrap();
    fs::write(dir.path().join("webapp/fine.lib.xml"), library_xml(&["core/api.js"], &[])).unwrap();

    clientdeps(dir.path())
        .args(["check", "--format", "json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"checked\": 3"))
        .stdout(predicate::str::contains("broken.lib.xml"))
        .stdout(predicate::str::contains("fine.lib.xml").not());
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = project();
    clientdeps(dir.path())
        .args(["--config", "nope.toml", "resolve", "reports"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

#[test]
fn test_invalid_config_reports_file() {
    let dir = project();
    fs::write(dir.path().join("clientdeps.toml"), "dev_mode = \"sometimes\"\n").unwrap();
    clientdeps(dir.path())
        .args(["resolve", "reports"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("clientdeps.toml"));
}
