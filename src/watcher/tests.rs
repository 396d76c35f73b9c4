use chrono::TimeZone;
use std::fs;

use super::*;
use crate::{
    entity::Ecosystem,
    forge::{request::PullRequest, traits::MockPullRequestCreator},
    process::ProcessOutput,
    store::MemoryStore,
    test_helpers::{ScriptedRunner, test_identity},
};

const LS: &str = r#"{"name":"demo","version":"1.0.0","dependencies":{"left-pad":{"version":"1.0.0"}}}"#;

const OUTDATED: &str =
    r#"{"left-pad":{"current":"1.0.0","wanted":"1.1.0","latest":"1.1.0"}}"#;

const REMOTES: &str = "\
origin\thttps://github.com/acme/demo.git (fetch)
origin\thttps://github.com/acme/demo.git (push)
";

const PACKAGE_JSON: &str =
    "{\n  \"name\": \"demo\",\n  \"dependencies\": {\n    \"left-pad\": \"^1.0.0\"\n  }\n}\n";

struct Fixture {
    project_dir: tempfile::TempDir,
    work_dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let project_dir = tempfile::tempdir().unwrap();
        fs::write(project_dir.path().join("package.json"), PACKAGE_JSON).unwrap();
        let work_dir = tempfile::tempdir().unwrap();
        Self {
            project_dir,
            work_dir,
        }
    }

    fn project(&self) -> Project {
        Project::new(
            "demo",
            self.project_dir.path().to_string_lossy(),
            Ecosystem::Npm,
        )
    }

    fn working_copy(&self) -> PathBuf {
        self.work_dir.path().join("demo")
    }

    fn runner(&self, outdated: &str) -> ScriptedRunner {
        ScriptedRunner::new()
            .on("npm", &[], ProcessOutput::new("usage", "", Some(1)))
            .ok("npm", &["ls"], LS)
            .on("npm", &["outdated"], ProcessOutput::new(outdated, "", Some(1)))
            .on_in(
                self.project_dir.path(),
                "git",
                &["rev-parse", "--show-toplevel"],
                ProcessOutput::new(
                    &format!("{}\n", self.project_dir.path().display()),
                    "",
                    Some(0),
                ),
            )
            .ok("git", &["remote", "-v"], REMOTES)
            .ok(
                "git",
                &["commit"],
                "[upgrade] chore: upgrade dependencies\n 1 file changed, 1 insertion(+), 1 deletion(-)\n",
            )
            .ok("git", &["branch", "-a"], "* upgrade\n  main\n")
            .ok("git", &["rev-parse", "--abbrev-ref"], "upgrade\n")
    }

    fn watcher(
        &self,
        runner: Arc<ScriptedRunner>,
        store: Arc<MemoryStore>,
        forge: MockPullRequestCreator,
    ) -> Watcher {
        let git = GitOrchestrator::new(
            runner.clone(),
            store.clone(),
            Arc::new(test_identity()),
            Arc::new(forge),
        );
        Watcher::new(runner, store, Arc::new(git), self.work_dir.path())
    }
}

#[test]
fn names_upgrade_branches_by_day() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 0).unwrap();
    assert_eq!(upgrade_branch(now), "upgrade-2024-05-01");
}

#[tokio::test]
async fn validity_checks_are_not_persisted() {
    let fixture = Fixture::new();
    let store = Arc::new(MemoryStore::new());
    let watcher = fixture.watcher(
        fixture.runner(OUTDATED).into_arc(),
        store.clone(),
        MockPullRequestCreator::new(),
    );

    let checked = watcher
        .check(fixture.project(), CheckOptions::validity_only())
        .await
        .unwrap();

    assert!(checked.meta.is_none());
    assert!(store.load_projects().await.unwrap().is_empty());
}

#[tokio::test]
async fn checks_are_persisted() {
    let fixture = Fixture::new();
    let store = Arc::new(MemoryStore::new());
    let watcher = fixture.watcher(
        fixture.runner(OUTDATED).into_arc(),
        store.clone(),
        MockPullRequestCreator::new(),
    );

    let checked = watcher
        .check(fixture.project(), CheckOptions::default())
        .await
        .unwrap();

    let stored = store.find_project_by_name("demo").await.unwrap().unwrap();
    assert_eq!(stored.id, checked.id);
    assert_eq!(stored.dependencies().len(), 1);
    assert!(stored.last_run().is_some());
}

#[test_log::test(tokio::test)]
async fn upgrades_outdated_projects_through_a_pull_request() {
    let fixture = Fixture::new();
    fs::create_dir_all(fixture.working_copy()).unwrap();
    fs::write(fixture.working_copy().join("package.json"), PACKAGE_JSON).unwrap();

    let mut forge = MockPullRequestCreator::new();
    forge
        .expect_create_pull_request()
        .withf(|req| req.repo == "demo" && req.base_branch == "main")
        .times(1)
        .returning(|_| {
            Ok(PullRequest {
                number: 7,
                url: None,
            })
        });

    let runner = fixture.runner(OUTDATED).into_arc();
    let store = Arc::new(MemoryStore::new());
    let watcher = fixture.watcher(runner.clone(), store.clone(), forge);

    let outcome = watcher.watch_project(fixture.project()).await.unwrap();

    assert_eq!(
        outcome,
        UpgradeOutcome::Upgraded {
            dependencies: 1,
            changed_files: 1,
            pull_request: Some(PullRequestOutcome::Created(PullRequest {
                number: 7,
                url: None,
            })),
        }
    );

    let manifest =
        fs::read_to_string(fixture.working_copy().join("package.json")).unwrap();
    assert!(manifest.contains("\"left-pad\": \"^1.1.0\""));
    let original =
        fs::read_to_string(fixture.project_dir.path().join("package.json")).unwrap();
    assert_eq!(original, PACKAGE_JSON);

    let stored = store.find_project_by_name("demo").await.unwrap().unwrap();
    assert_eq!(stored.remotes.len(), 1);
    assert_eq!(stored.dependencies()[0].available_versions, r#"["1.1.0"]"#);

    let clone = runner
        .calls()
        .into_iter()
        .find(|call| call.plain_args().first().is_some_and(|a| a == "clone"))
        .unwrap();
    assert_eq!(clone.dir, fixture.work_dir.path());
    assert!(runner.called("git", &["push", "origin", "HEAD"]));
}

#[tokio::test]
async fn up_to_date_projects_are_not_committed() {
    let fixture = Fixture::new();
    let runner = fixture.runner("").into_arc();
    let mut forge = MockPullRequestCreator::new();
    forge.expect_create_pull_request().never();
    let watcher =
        fixture.watcher(runner.clone(), Arc::new(MemoryStore::new()), forge);

    let outcome = watcher.watch_project(fixture.project()).await.unwrap();

    assert_eq!(outcome, UpgradeOutcome::UpToDate);
    assert!(fixture.working_copy().is_dir());
    assert!(!runner.calls_of("git").iter().any(|args| args[0] == "commit"));
}

#[tokio::test]
async fn projects_outside_git_are_only_checked() {
    let fixture = Fixture::new();
    let runner = ScriptedRunner::new()
        .on("npm", &[], ProcessOutput::new("usage", "", Some(1)))
        .ok("npm", &["ls"], LS)
        .on("npm", &["outdated"], ProcessOutput::new(OUTDATED, "", Some(1)))
        .on(
            "git",
            &["rev-parse"],
            ProcessOutput::new("", "fatal: not a git repository", Some(128)),
        )
        .into_arc();
    let store = Arc::new(MemoryStore::new());
    let watcher =
        fixture.watcher(runner.clone(), store.clone(), MockPullRequestCreator::new());

    let outcome = watcher.watch_project(fixture.project()).await.unwrap();

    assert_eq!(outcome, UpgradeOutcome::NotARepository);
    assert_eq!(store.load_projects().await.unwrap().len(), 1);
    assert!(!fixture.working_copy().exists());
}

#[tokio::test]
async fn invalid_projects_fail_the_round() {
    let fixture = Fixture::new();
    let watcher = fixture.watcher(
        ScriptedRunner::new().missing("npm").into_arc(),
        Arc::new(MemoryStore::new()),
        MockPullRequestCreator::new(),
    );

    let err = watcher.watch_project(fixture.project()).await.unwrap_err();
    assert!(matches!(err, WatchError::InvalidProject(_)));
}

#[test_log::test(tokio::test)]
async fn pip_upgrades_are_reported_unsupported() {
    const PIP_ALL: &str = r#"[{"name": "requests", "version": "2.25.0"}]"#;
    const PIP_OUTDATED: &str = r#"[{"name": "requests", "version": "2.25.0", "latest_version": "2.31.0", "latest_filetype": "wheel"}]"#;

    let fixture = Fixture::new();
    let project = Project::new(
        "demo",
        fixture.project_dir.path().to_string_lossy(),
        Ecosystem::Pip,
    );
    let pip = fixture.project_dir.path().join(".venv/bin/pip");
    let pip = pip.to_string_lossy();

    let runner = ScriptedRunner::new()
        .ok(&pip, &[], "Usage: pip <command> [options]")
        .ok(&pip, &["list", "--format"], PIP_ALL)
        .ok(&pip, &["list", "--outdated"], PIP_OUTDATED)
        .on_in(
            fixture.project_dir.path(),
            "git",
            &["rev-parse", "--show-toplevel"],
            ProcessOutput::new(
                &format!("{}\n", fixture.project_dir.path().display()),
                "",
                Some(0),
            ),
        )
        .ok("git", &["remote", "-v"], REMOTES)
        .into_arc();
    let mut forge = MockPullRequestCreator::new();
    forge.expect_create_pull_request().never();
    let store = Arc::new(MemoryStore::new());
    let watcher = fixture.watcher(runner.clone(), store.clone(), forge);

    let outcome = watcher.watch_project(project).await.unwrap();

    assert_eq!(outcome, UpgradeOutcome::Unsupported);
    let stored = store.find_project_by_name("demo").await.unwrap().unwrap();
    assert!(stored.dependencies()[0].is_upgradable());
    let git = runner.calls_of("git");
    assert!(!git.iter().any(|args| args[0] == "commit" || args[0] == "add"));
    assert!(!git.iter().any(|args| args[0] == "push" && args.contains(&"HEAD".to_string())));
}
