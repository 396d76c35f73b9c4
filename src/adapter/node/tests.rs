use std::fs;

use super::*;
use crate::{
    adapter::CheckOptions, process::ProcessOutput, test_helpers::ScriptedRunner,
};

const LS: &str = r#"{"name":"demo","version":"1.0.0","dependencies":{"left-pad":{"version":"1.0.0"}}}"#;

const OUTDATED: &str =
    r#"{"left-pad":{"current":"1.0.0","wanted":"1.1.0","latest":"1.1.0"}}"#;

fn node_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("package.json"),
        "{\n  \"name\": \"demo\",\n  \"dependencies\": {\n    \"left-pad\": \"^1.0.0\"\n  }\n}\n",
    )
    .unwrap();
    dir
}

fn runner(outdated: &str) -> ScriptedRunner {
    ScriptedRunner::new()
        .on("npm", &[], ProcessOutput::new("usage", "", Some(1)))
        .ok("npm", &["ls"], LS)
        .on("npm", &["outdated"], ProcessOutput::new(outdated, "", Some(1)))
}

fn project(dir: &tempfile::TempDir) -> Project {
    Project::new("demo", dir.path().to_string_lossy(), Ecosystem::Npm)
}

#[tokio::test]
async fn merges_all_and_outdated_reports() {
    let dir = node_dir();
    let adapter = NodeAdapter::new(runner(OUTDATED).into_arc());

    let checked = adapter
        .check(project(&dir), CheckOptions::default())
        .await
        .unwrap();

    let dependencies = checked.dependencies();
    assert_eq!(dependencies.len(), 1);
    assert_eq!(dependencies[0].name, "left-pad");
    assert_eq!(dependencies[0].current_version, "1.0.0");
    assert_eq!(dependencies[0].available_versions, r#"["1.1.0"]"#);
    assert!(dependencies[0].data.contains("wanted"));
}

#[tokio::test]
async fn includes_wanted_and_latest_when_distinct() {
    let dir = node_dir();
    let outdated =
        r#"{"left-pad":{"current":"1.0.0","wanted":"1.3.0","latest":"2.0.0"}}"#;
    let adapter = NodeAdapter::new(runner(outdated).into_arc());

    let dependencies = adapter.load_dependencies(&project(&dir)).await.unwrap();

    assert_eq!(
        dependencies[0].available_versions().unwrap(),
        vec!["2.0.0", "1.3.0"]
    );
}

#[tokio::test]
async fn up_to_date_dependencies_have_no_available_versions() {
    let dir = node_dir();
    let outdated =
        r#"{"left-pad":{"current":"1.0.0","wanted":"1.0.0","latest":"1.0.0"}}"#;
    let adapter = NodeAdapter::new(runner(outdated).into_arc());

    let dependencies = adapter.load_dependencies(&project(&dir)).await.unwrap();

    assert!(dependencies[0].available_versions().unwrap().is_empty());
}

#[tokio::test]
async fn empty_outdated_output_means_nothing_is_outdated() {
    let dir = node_dir();
    let runner = ScriptedRunner::new()
        .ok("npm", &["ls"], LS)
        .ok("npm", &["outdated"], "");
    let adapter = NodeAdapter::new(runner.into_arc());

    let dependencies = adapter.load_dependencies(&project(&dir)).await.unwrap();

    assert_eq!(dependencies.len(), 1);
    assert!(!dependencies[0].is_upgradable());
}

#[tokio::test]
async fn outdated_package_missing_from_all_is_inconsistent() {
    let dir = node_dir();
    let outdated = r#"{"foo":{"current":"1.0.0","wanted":"1.1.0","latest":"1.1.0"}}"#;
    let adapter = NodeAdapter::new(runner(outdated).into_arc());

    let err = adapter
        .load_dependencies(&project(&dir))
        .await
        .unwrap_err();

    assert!(matches!(err, WatchError::InconsistentReport(name) if name == "foo"));
}

#[tokio::test]
async fn rechecking_keeps_dependency_identities() {
    let dir = node_dir();
    let adapter = NodeAdapter::new(runner(OUTDATED).into_arc());

    let mut checked = adapter
        .check(project(&dir), CheckOptions::default())
        .await
        .unwrap();
    // as assigned by the store
    if let Some(meta) = checked.meta.as_mut() {
        meta.dependencies[0].id = Some(11);
    }

    let rechecked = adapter
        .check(checked, CheckOptions::default())
        .await
        .unwrap();

    assert_eq!(rechecked.dependencies().len(), 1);
    assert_eq!(rechecked.dependencies()[0].id, Some(11));
}

#[tokio::test]
async fn global_projects_pass_the_global_flag() {
    let runner = runner(OUTDATED).into_arc();
    let adapter = NodeAdapter::new(runner.clone());
    let project = Project::global("globals", Ecosystem::Npm);

    adapter
        .check(project, CheckOptions::default())
        .await
        .unwrap();

    assert!(runner.called("npm", &["ls", "--json", "-g"]));
    assert!(runner.called("npm", &["outdated", "--json", "-g"]));
    let calls = runner.calls();
    assert!(calls.iter().all(|call| call.dir == std::path::Path::new("/")));
}

#[tokio::test]
async fn probe_requires_manifest_for_local_projects() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = NodeAdapter::new(runner(OUTDATED).into_arc());

    let err = adapter
        .check(project(&dir), CheckOptions::validity_only())
        .await
        .unwrap_err();

    assert!(matches!(err, WatchError::InvalidProject(_)));
}

#[tokio::test]
async fn npm_failure_with_stderr_is_surfaced() {
    let dir = node_dir();
    let runner = runner(OUTDATED).on(
        "npm",
        &["ls"],
        ProcessOutput::new("", "npm ERR! code ELSPROBLEMS", Some(1)),
    );
    let adapter = NodeAdapter::new(runner.into_arc());

    let err = adapter
        .load_dependencies(&project(&dir))
        .await
        .unwrap_err();

    assert!(matches!(err, WatchError::ProcessFailure { .. }));
}

#[tokio::test]
async fn upgrade_rewrites_package_json() {
    let dir = node_dir();
    let adapter = NodeAdapter::new(runner(OUTDATED).into_arc());
    let checked = adapter
        .check(project(&dir), CheckOptions::default())
        .await
        .unwrap();

    adapter
        .upgrade_deps(&checked, checked.dependencies())
        .await
        .unwrap();

    let manifest = fs::read_to_string(dir.path().join("package.json")).unwrap();
    assert!(manifest.contains(r#""left-pad": "^1.1.0""#));
}

#[tokio::test]
async fn global_upgrade_is_not_implemented() {
    let adapter = NodeAdapter::new(runner(OUTDATED).into_arc());
    let project = Project::global("globals", Ecosystem::Npm);

    let err = adapter.upgrade_deps(&project, &[]).await.unwrap_err();
    assert!(matches!(err, WatchError::NotImplemented(_)));
}
