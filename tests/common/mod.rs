//! Shared harness for CLI integration tests.
//!
//! Every case writes its invocation and captured output to a log file under
//! the system temp directory so failures can be inspected after the run.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use tempfile::TempDir;

const ENV_OVERRIDES: [&str; 7] = [
    "UNOTIFY_LOG",
    "UNOTIFY_POLICY_FILE",
    "UNOTIFY_SERVICE_UNIT",
    "UNOTIFY_SYSTEMCTL",
    "UNOTIFY_TELEGRAM_API",
    "UNOTIFY_TELEGRAM_TIMEOUT_SECS",
    "UNOTIFY_PARSE_MODE",
];

/// Captured result of one CLI invocation.
pub struct CliResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

impl CliResult {
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout).unwrap_or_else(|e| {
            panic!(
                "stdout is not JSON ({e}); log: {}",
                self.log_path.display()
            )
        })
    }
}

/// Run the `unotify` binary with `args` and an environment scrubbed of
/// `UNOTIFY_*` overrides.
pub fn run_cli_case(case_name: &str, args: &[&str]) -> CliResult {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_unotify"));
    cmd.args(args).env("NO_COLOR", "1");
    for key in ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    let output = cmd
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn unotify for {case_name}: {e}"));

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let log_path = write_case_log(case_name, args, &output.status, &stdout, &stderr);

    CliResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

fn write_case_log(
    case_name: &str,
    args: &[&str],
    status: &ExitStatus,
    stdout: &str,
    stderr: &str,
) -> PathBuf {
    let dir = std::env::temp_dir().join("unotify-cli-test-logs");
    let _ = fs::create_dir_all(&dir);
    let path = dir.join(format!("{case_name}.log"));
    let body = format!(
        "case: {case_name}\nargs: {args:?}\nstatus: {status}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}\n"
    );
    let _ = fs::write(&path, body);
    path
}

/// Isolated settings and policy location for one test.
pub struct Sandbox {
    pub dir: TempDir,
    pub settings_path: PathBuf,
    pub policy_path: PathBuf,
}

impl Sandbox {
    /// Sandbox whose service manager is `systemctl` (e.g. `true`/`false`).
    pub fn new(systemctl: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let policy_path = dir.path().join("uniquenotify").join("config.json");
        let settings_path = dir.path().join("unotify.toml");
        let settings = format!(
            r#"[paths]
policy_file = "{}"

[service]
unit = "uniquenotify-test.service"
systemctl = "{systemctl}"

[telegram]
api_base = "http://127.0.0.1:9"
timeout_secs = 2
"#,
            policy_path.display()
        );
        fs::write(&settings_path, settings).expect("write settings");
        Self {
            dir,
            settings_path,
            policy_path,
        }
    }

    /// Run with `--config` pointing at this sandbox.
    pub fn run(&self, case_name: &str, args: &[&str]) -> CliResult {
        let config = self.settings_path.to_string_lossy().into_owned();
        let mut full = vec!["--config", config.as_str()];
        full.extend_from_slice(args);
        run_cli_case(case_name, &full)
    }

    pub fn write_policy(&self, raw: &str) {
        fs::create_dir_all(self.policy_path.parent().unwrap_or(Path::new("."))).expect("mkdir");
        fs::write(&self.policy_path, raw).expect("write policy");
    }

    pub fn read_policy(&self) -> serde_json::Value {
        let raw = fs::read_to_string(&self.policy_path).expect("read policy");
        serde_json::from_str(&raw).expect("policy is JSON")
    }
}
