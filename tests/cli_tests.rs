/// CLI tests
///
/// Runs the `onsoftdelete` binary against mapping documents on disk.
/// Run with: cargo test --test cli_tests

use std::fs;
use std::process::Command;

const SHOP: &str = r#"{
    "config": {"max_depth": 4, "detect_cycles": false},
    "entities": [
        {
            "name": "shop::Customer",
            "soft_delete": {"field": "deleted_at"},
            "fields": [{"name": "deleted_at", "type": "timestamp"}]
        },
        {
            "name": "shop::Order",
            "fields": [
                {"name": "customer", "type": "reference", "target": "Customer", "on_soft_delete": "CASCADE"}
            ]
        },
        {
            "name": "shop::Invoice",
            "fields": [
                {"name": "customer", "type": "reference", "target": "Customer", "on_soft_delete": "SET NULL"}
            ]
        }
    ]
}"#;

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_onsoftdelete"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("binary runs")
}

#[test]
fn test_validate_lists_relationships() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.json");
    fs::write(&path, SHOP).unwrap();

    let output = run(&["validate", path.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("3 entity types, 2 onSoftDelete relationships"));
    assert!(stdout.contains("cascade: max_depth=4, detect_cycles=false"));
    assert!(!stdout.contains("validate_on_startup"));
    assert!(stdout.contains("shop::Order.customer -> Customer (many-to-one, CASCADE)"));
}

#[test]
fn test_validate_fails_on_unknown_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.json");
    fs::write(&path, SHOP.replace("SET NULL", "FOO")).unwrap();

    let output = run(&["validate", path.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Type FOO for onSoftDelete does not exist"));
}

#[test]
fn test_plan_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.json");
    fs::write(&path, SHOP).unwrap();

    let output = run(&["plan", path.to_str().unwrap(), "--entity", "shop::Customer", "--json"]);
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["entity"], "shop::Customer");
    assert_eq!(plan["config"]["max_depth"], 4);
    assert_eq!(plan["config"]["detect_cycles"], false);
    let entries = plan["relations"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["entity"], "shop::Order");
    assert_eq!(entries[0]["side"], "referencing");
    assert_eq!(entries[1]["policy"], "SET NULL");
}

#[test]
fn test_plan_rejects_unknown_entity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.json");
    fs::write(&path, SHOP).unwrap();

    let output = run(&["plan", path.to_str().unwrap(), "--entity", "shop::Missing"]);
    assert!(!output.status.success());
}

#[test]
fn test_validate_notes_ignored_startup_flag() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.json");
    fs::write(
        &path,
        SHOP.replace(r#""detect_cycles": false"#, r#""detect_cycles": false, "validate_on_startup": false"#),
    )
    .unwrap();

    let output = run(&["validate", path.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("validate_on_startup=false is ignored here"));
}

#[test]
fn test_plan_text_shows_cascade_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.json");
    fs::write(&path, SHOP).unwrap();

    let output = run(&["plan", path.to_str().unwrap(), "--entity", "shop::Customer"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Deleting shop::Customer touches (max depth 4, cycle detection off):"));
}
