use predicates::str::contains;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use walkdir::WalkDir;

fn ccarchive(root: &Path, projects_dir: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ccarchive");
    cmd.current_dir(root)
        .env("CCARCHIVE_PROJECTS_DIR", projects_dir)
        .env("CCARCHIVE_HOME", root.join("state"))
        .env("CCARCHIVE_CONFIG_PATH", root.join("absent.toml"))
        .env_remove("CCARCHIVE_MODE");
    cmd
}

fn seed_project(base: &Path) -> PathBuf {
    let project = base.join("-work-app");
    fs::create_dir_all(project.join("S")).expect("mkdir companion");
    fs::write(
        project.join("S.jsonl"),
        "{\"type\":\"summary\",\"summary\":\"Fix bug\",\"timestamp\":\"2025-05-01T08:00:00Z\"}\n",
    )
    .expect("write S");
    fs::write(project.join("S").join("image.png"), vec![7u8; 32]).expect("write companion");
    fs::write(project.join("agent-X.jsonl"), "{\"sessionId\":\"S\"}\n").expect("write agent");
    fs::write(
        project.join("T.jsonl"),
        "{\"type\":\"custom-title\",\"customTitle\":\"keep me\"}\n",
    )
    .expect("write T");
    project
}

fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.expect("walk entry");
            let content = if entry.file_type().is_file() {
                fs::read(entry.path()).expect("read")
            } else {
                Vec::new()
            };
            (entry.into_path(), content)
        })
        .collect()
}

#[test]
fn archive_moves_transcript_companion_and_agent() {
    let tmp = tempdir().expect("tempdir");
    let base = tmp.path().join("projects");
    let project = seed_project(&base);

    ccarchive(tmp.path(), &base)
        .args(["archive", "--project", "-work-app", "--filter", "unnamed"])
        .assert()
        .success()
        .stdout(contains("archived session=S"))
        .stdout(contains("summary total=1 successful=1 failed=0"));

    let archived = project.join(".archived");
    assert!(archived.join("S.jsonl").is_file());
    assert!(archived.join("S").join("image.png").is_file());
    assert!(archived.join("agent-X.jsonl").is_file());
    assert!(!project.join("S.jsonl").exists());
    assert!(!project.join("S").exists());
    assert!(!project.join("agent-X.jsonl").exists());
    assert!(project.join("T.jsonl").exists());

    let audit = fs::read_to_string(tmp.path().join("state/logs/audit.log")).expect("audit log");
    assert!(audit.contains("\"session\":\"S\""));
}

#[test]
fn archiving_twice_fails_with_already_exists() {
    let tmp = tempdir().expect("tempdir");
    let base = tmp.path().join("projects");
    let project = seed_project(&base);

    ccarchive(tmp.path(), &base)
        .args(["archive", "--project", "-work-app", "--session", "S"])
        .assert()
        .success();

    let archived_copy = project.join(".archived").join("S.jsonl");
    let before = fs::read(&archived_copy).expect("archived copy");
    fs::write(project.join("S.jsonl"), "{\"type\":\"user\"}\n").expect("recreate S");

    ccarchive(tmp.path(), &base)
        .args(["archive", "--project", "-work-app", "--session", "S"])
        .assert()
        .code(2)
        .stdout(contains("failed session=S kind=already-exists"));

    assert_eq!(fs::read(&archived_copy).expect("archived copy"), before);
    assert!(project.join("S.jsonl").exists());
}

#[test]
fn dry_run_and_dev_leave_the_tree_untouched() {
    for (flag, tag) in [("--dry-run", "[DRY-RUN]"), ("--dev", "[DEV]")] {
        let tmp = tempdir().expect("tempdir");
        let base = tmp.path().join("projects");
        seed_project(&base);
        let before = snapshot(&base);

        ccarchive(tmp.path(), &base)
            .args(["archive", "--project", "-work-app", "--filter", "unnamed", flag])
            .assert()
            .success()
            .stdout(contains(tag));

        assert_eq!(snapshot(&base), before);
        assert!(!tmp.path().join("state/logs/audit.log").exists());
    }
}

#[test]
fn mode_can_come_from_environment() {
    let tmp = tempdir().expect("tempdir");
    let base = tmp.path().join("projects");
    let project = seed_project(&base);

    ccarchive(tmp.path(), &base)
        .env("CCARCHIVE_MODE", "dry-run")
        .args(["archive", "--project", "-work-app", "--filter", "unnamed"])
        .assert()
        .success()
        .stdout(contains("mode=dry-run"));

    assert!(project.join("S.jsonl").exists());
    assert!(!project.join(".archived").exists());
}

#[test]
fn archive_refuses_an_unfiltered_selection() {
    let tmp = tempdir().expect("tempdir");
    let base = tmp.path().join("projects");
    let project = seed_project(&base);

    ccarchive(tmp.path(), &base)
        .args(["archive", "--project", "-work-app"])
        .assert()
        .code(2)
        .stdout(contains("refusing to archive"));

    assert!(project.join("S.jsonl").exists());
    assert!(project.join("T.jsonl").exists());
}

#[test]
fn archive_json_exposes_artifact_outcomes() {
    let tmp = tempdir().expect("tempdir");
    let base = tmp.path().join("projects");
    seed_project(&base);

    let out = ccarchive(tmp.path(), &base)
        .args([
            "--json",
            "archive",
            "--project",
            "-work-app",
            "--filter",
            "by-title",
            "--title",
            "KEEP",
        ])
        .output()
        .expect("run");
    assert!(out.status.success());

    let report: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    let results = report["data"]["results"].as_array().expect("results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["session"]["id"], "T");
    assert_eq!(results[0]["success"], true);
    assert_eq!(results[0]["artifacts"][0]["status"], "moved");
    assert_eq!(results[0]["artifacts"][0]["file"]["kind"], "transcript");
    assert_eq!(report["data"]["summary"]["successful"], 1);
}
