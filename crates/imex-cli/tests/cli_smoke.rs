use serde_json::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "imex-cli-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn run_imex<I, S>(args: I, credentials: Option<(&str, &str)>) -> Output
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = env!("CARGO_BIN_EXE_imex");
    let mut command = Command::new(bin);
    command
        .args(args)
        .env_remove("IMEX_USERNAME")
        .env_remove("IMEX_PASSWORD")
        .env_remove("IMEX_LOG");
    if let Some((username, password)) = credentials {
        command
            .env("IMEX_USERNAME", username)
            .env("IMEX_PASSWORD", password);
    }
    command.output().expect("imex command should execute")
}

fn assert_success(output: &Output) {
    if !output.status.success() {
        panic!(
            "command failed with status {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn assert_exit_code(output: &Output, expected: i32) {
    if output.status.code() != Some(expected) {
        panic!(
            "expected exit code {expected}, got {:?}\nstdout:\n{}\nstderr:\n{}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
}

fn parse_json_stdout(output: &Output) -> Value {
    serde_json::from_slice::<Value>(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "expected valid JSON stdout, got error: {e}\nstdout:\n{}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

fn write_sample_store(path: &Path) {
    let lines = [
        r#"{"ac":"EBI-100","external_ref":"PMID:123","interactions":[{"ac":"EBI-101"},{"ac":"EBI-102"}]}"#,
        r#"{"ac":"EBI-200","external_ref":"PMID:200","xrefs":[{"database":"imex","id":"IM-2000","qualifier":"imex-primary"}]}"#,
        r#"{"ac":"EBI-300","external_ref":"unassigned604"}"#,
        r#"{"ac":"EBI-400","external_ref":"PMID:400","status":"curation-in-progress"}"#,
    ];
    fs::write(path, format!("{}\n", lines.join("\n"))).expect("sample store should be written");
}

/// `imex init` plus a seeded store; returns the config path.
fn init_workspace(dir: &Path) -> PathBuf {
    let output = run_imex(
        [
            OsStr::new("init"),
            dir.as_os_str(),
            OsStr::new("--institution"),
            OsStr::new("IntAct"),
            OsStr::new("--first-id"),
            OsStr::new("1000"),
            OsStr::new("--user"),
            OsStr::new("curator"),
            OsStr::new("--json"),
        ],
        None,
    );
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["createdConfig"], true);
    assert_eq!(payload["createdRegistry"], true);
    write_sample_store(&dir.join("store.jsonl"));
    dir.join("imex.toml")
}

#[test]
fn assign_then_rerun_is_idempotent() {
    let temp = TempDirGuard::new("assign");
    let config = init_workspace(temp.path());

    let output = run_imex(
        [
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("assign"),
            OsStr::new("--json"),
        ],
        Some(("curator", "secret")),
    );
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    let summary = &payload["summary"];
    assert_eq!(summary["assigned"], 1);
    assert_eq!(summary["skipped"], 1);
    assert_eq!(summary["ineligible"], 1);
    assert_eq!(summary["errored"], 0);
    assert_eq!(payload["events"].as_array().map(Vec::len), Some(3));
    assert_eq!(payload["events"][0]["imex_id"], "IM-1000");

    let report_dir = temp.path().join("report");
    for file in [
        "all.tsv",
        "assigned.tsv",
        "up_to_date.tsv",
        "conflicts.tsv",
        "ineligible.tsv",
        "registered_elsewhere.tsv",
        "errors.tsv",
    ] {
        assert!(report_dir.join(file).exists(), "{file} should exist");
    }
    let store = fs::read_to_string(temp.path().join("store.jsonl")).expect("store readable");
    assert!(store.contains("IM-1000"));

    let rerun = run_imex(
        [
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("assign"),
            OsStr::new("--json"),
        ],
        Some(("curator", "secret")),
    );
    assert_success(&rerun);
    let summary = &parse_json_stdout(&rerun)["summary"];
    assert_eq!(summary["assigned"], 0);
    assert_eq!(summary["skipped"], 2);
    assert_eq!(summary["acquireCalls"], 0);
}

#[test]
fn assign_without_credentials_fails_before_processing() {
    let temp = TempDirGuard::new("nocreds");
    let config = init_workspace(temp.path());

    let output = run_imex(
        [
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("assign"),
        ],
        None,
    );
    assert_exit_code(&output, 1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("IMEX_USERNAME"), "{stderr}");
    assert!(!temp.path().join("report").exists());
}

#[test]
fn registry_refusal_exits_with_error_status_and_full_report() {
    let temp = TempDirGuard::new("refused");
    let config = init_workspace(temp.path());

    let output = run_imex(
        [
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("assign"),
        ],
        Some(("intruder", "secret")),
    );
    assert_exit_code(&output, 2);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("errored: 1"), "{stdout}");

    let errors = fs::read_to_string(temp.path().join("report").join("errors.tsv"))
        .expect("errors report exists");
    assert_eq!(errors.lines().count(), 2);
    assert!(errors.contains("EBI-100"));
}

#[test]
fn dry_run_leaves_store_untouched() {
    let temp = TempDirGuard::new("dryrun");
    let config = init_workspace(temp.path());
    let before = fs::read_to_string(temp.path().join("store.jsonl")).expect("store readable");

    let output = run_imex(
        [
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("assign"),
            OsStr::new("--dry-run"),
            OsStr::new("--json"),
        ],
        Some(("curator", "secret")),
    );
    assert_success(&output);
    let summary = &parse_json_stdout(&output)["summary"];
    assert_eq!(summary["planned"], 1);
    assert_eq!(summary["dryRun"], true);

    let after = fs::read_to_string(temp.path().join("store.jsonl")).expect("store readable");
    assert_eq!(before, after);
}

#[test]
fn classify_reports_states_without_credentials() {
    let temp = TempDirGuard::new("classify");
    let config = init_workspace(temp.path());

    let output = run_imex(
        [
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("classify"),
            OsStr::new("--json"),
        ],
        None,
    );
    assert_success(&output);
    let rows = parse_json_stdout(&output);
    let states: Vec<(&str, &str)> = rows
        .as_array()
        .expect("array of rows")
        .iter()
        .map(|row| {
            (
                row["ac"].as_str().unwrap_or_default(),
                row["state"].as_str().unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        states,
        vec![
            ("EBI-100", "NONE"),
            ("EBI-200", "PRIMARY_ASSIGNED"),
            ("EBI-300", "NONE"),
        ]
    );
    assert_eq!(rows[2]["decision"], "reject_ineligible");
}

#[test]
fn status_reports_store_and_registry() {
    let temp = TempDirGuard::new("status");
    let config = init_workspace(temp.path());

    let output = run_imex(
        [
            OsStr::new("--config"),
            config.as_os_str(),
            OsStr::new("status"),
            OsStr::new("--json"),
        ],
        None,
    );
    assert_success(&output);
    let payload = parse_json_stdout(&output);
    assert_eq!(payload["institution"], "IntAct");
    assert_eq!(payload["store"]["publications"], 4);
    assert_eq!(payload["store"]["pendingReview"], 3);
    assert_eq!(payload["store"]["byState"]["PRIMARY_ASSIGNED"], 1);
    assert_eq!(payload["registry"]["nextIdentifier"], 1000);
    assert!(
        payload["store"]["snapshotRef"]
            .as_str()
            .is_some_and(|r| r.starts_with("cs1_"))
    );
}

#[test]
fn explicit_missing_config_is_a_startup_error() {
    let temp = TempDirGuard::new("noconfig");
    let missing = temp.path().join("absent.toml");

    let output = run_imex(
        [
            OsStr::new("--config"),
            missing.as_os_str(),
            OsStr::new("status"),
        ],
        None,
    );
    assert_exit_code(&output, 1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("absent.toml"), "{stderr}");
}
