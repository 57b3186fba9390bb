//! ---
//! ems_section: "05-networking-external-interfaces"
//! ems_subsection: "binary"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Control CLI for operators managing bundle jobs."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
    definition: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let config = root.join("bsched.toml");
        fs::write(
            &config,
            format!(
                "[store]\nstate_file = {:?}\njournal = {:?}\n\n[logging]\ndirectory = {:?}\nformat = \"pretty\"\n",
                path_str(&root.join("state/jobs.json")),
                path_str(&root.join("state/journal.log")),
                path_str(&root.join("logs")),
            ),
        )
        .unwrap();
        let definition = root.join("bundle.xml");
        fs::write(&definition, "<bundle-app name='daily'/>").unwrap();
        Self {
            dir,
            config,
            definition,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("bschedctl").unwrap();
        cmd.current_dir(self.dir.path())
            .env("BSCHED_CONFIG", &self.config)
            .env("BSCHED_LOG", "warn")
            .env_remove("BSCHED_USER")
            .env_remove("BSCHED_TOKEN");
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().arg("--json").args(args).assert().success();
        serde_json::from_slice(&output.get_output().stdout).unwrap()
    }

    fn submit(&self, start: bool) -> String {
        let definition = path_str(&self.definition);
        let mut args = vec![
            "submit",
            "--name",
            "daily",
            "--definition",
            definition.as_str(),
            "--coordinator",
            "ingest",
        ];
        if start {
            args.push("--start");
        }
        self.json(&args)["id"].as_str().unwrap().to_owned()
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn submit_start_and_inspect() {
    let ws = Workspace::new();
    let id = ws.submit(true);
    assert!(id.ends_with("-bsched-B"), "{id}");

    let info = ws.json(&["info", id.as_str()]);
    assert_eq!(info["status"], "RUNNING");
    assert_eq!(info["user"], "system");

    let page = ws.json(&["jobs", "--filter", "status=RUNNING"]);
    assert_eq!(page["total"], 1);
    assert_eq!(page["jobs"][0]["id"], id.as_str());

    let output = ws.cmd().args(["definition", id.as_str()]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("<bundle-app name='daily'/>"));
}

#[test]
fn lifecycle_errors_carry_codes() {
    let ws = Workspace::new();
    let id = ws.submit(false);
    ws.cmd().args(["kill", id.as_str()]).assert().success();

    let output = ws.cmd().args(["suspend", id.as_str()]).output().unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("E1018"), "{}", stderr(&output));

    let output = ws
        .cmd()
        .args(["info", "0000099-20240101000000000-bsched-B"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("E0604"), "{}", stderr(&output));
}

#[test]
fn invalid_filter_is_rejected() {
    let ws = Workspace::new();
    let output = ws.cmd().args(["jobs", "--filter", "foo=bar"]).output().unwrap();
    assert!(!output.status.success());
    let message = stderr(&output);
    assert!(message.contains("E0420"), "{message}");
    assert!(message.contains("invalid name [foo]"), "{message}");
}

#[test]
fn dry_run_creates_nothing() {
    let ws = Workspace::new();
    let definition = path_str(&ws.definition);
    let output = ws
        .cmd()
        .args(["dryrun", "--name", "daily", "--definition", definition.as_str()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "OK");

    let page = ws.json(&["jobs"]);
    assert_eq!(page["total"], 0);
}

#[test]
fn log_shows_journalled_transitions() {
    let ws = Workspace::new();
    let id = ws.submit(true);
    ws.cmd()
        .args(["change", id.as_str(), "--value", "endtime=2030-01-01T00:00:00Z"])
        .assert()
        .success();

    let output = ws.cmd().args(["log", id.as_str()]).output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    assert_eq!(text.lines().count(), 3, "{text}");
    assert!(text.contains("submitted"), "{text}");

    let lines = ws.json(&["log", id.as_str()]);
    assert_eq!(lines.as_array().map(Vec::len), Some(3));
}

#[test]
fn user_requires_token() {
    let ws = Workspace::new();
    let output = ws.cmd().args(["--user", "alice", "jobs"]).output().unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--token"));

    let id = ws
        .cmd()
        .args(["--user", "alice", "--token", "secret", "--json"])
        .args(["submit", "--name", "daily", "--definition"])
        .arg(&ws.definition)
        .output()
        .unwrap();
    assert!(id.status.success(), "{}", stderr(&id));
    let id: Value = serde_json::from_slice(&id.stdout).unwrap();
    let info = ws.json(&["info", id["id"].as_str().unwrap()]);
    assert_eq!(info["user"], "alice");
}
