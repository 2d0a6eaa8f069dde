//! Shared helpers for integration tests.
//!
//! [`FakeTool`] is a small shell script standing in for the deployment tool.
//! It understands `deploy <name>` and `id <name>` and keeps the "remote"
//! state as one file per provisioned resource.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// Well-Known Identifiers
// =============================================================================

pub const GOOD_ID: &str = "ggggg-ggggg-ggggg-ggggg-cai";
pub const CRASH_ID: &str = "ccccc-ccccc-ccccc-ccccc-cai";
pub const LINGER_ID: &str = "lllll-lllll-lllll-lllll-cai";

/// Resource behaviors understood by the fake tool:
///
/// - `good`: provisions and exits 0
/// - `crash`: provisions, then dies with exit 134
/// - `linger`: provisions, then keeps running
/// - `hang`: never provisions, keeps running
///
/// `linger` and `hang` fork a worker and record its pid in
/// `state/<name>.worker`, like a deploy that runs build steps in children.
const SCRIPT: &str = r#"#!/bin/sh
state="$(dirname "$0")/state"
mkdir -p "$state"
case "$1" in
  deploy)
    echo "Deploying: $2"
    case "$2" in
      good) echo "ggggg-ggggg-ggggg-ggggg-cai" > "$state/$2" ;;
      crash)
        echo "ccccc-ccccc-ccccc-ccccc-cai" > "$state/$2"
        echo "thread 'main' panicked at 'color output'" >&2
        exit 134 ;;
      linger)
        echo "lllll-lllll-lllll-lllll-cai" > "$state/$2"
        sleep 30 & echo $! > "$state/$2.worker"; wait ;;
      hang) sleep 30 & echo $! > "$state/$2.worker"; wait ;;
      *) echo "unknown canister $2" >&2; exit 1 ;;
    esac ;;
  id)
    if [ -f "$state/$2" ]; then
      echo "WARN: The default identity is not stored securely." >&2
      cat "$state/$2"
    else
      echo "Error: Cannot find canister id. Please issue 'dfx canister create $2'." >&2
      exit 255
    fi ;;
  *) echo "usage: fake-tool deploy|id <name>" >&2; exit 2 ;;
esac
"#;

/// Artifact with one anchor per fake-tool behavior.
pub const ARTIFACT: &str = "\
// Generated canister configuration
export const canisterIds = {
  good: import.meta.env.VITE_GOOD_CANISTER_ID || '',
  crash: import.meta.env.VITE_CRASH_CANISTER_ID || '',
  linger: import.meta.env.VITE_LINGER_CANISTER_ID || '',
  hang: import.meta.env.VITE_HANG_CANISTER_ID || 'placeholder',
};
";

pub struct FakeTool {
    dir: TempDir,
}

impl FakeTool {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("fake-tool.sh"), SCRIPT).unwrap();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn script(&self) -> PathBuf {
        self.dir.path().join("fake-tool.sh")
    }

    /// Pretend `name` was provisioned by an earlier run.
    pub fn preprovision(&self, name: &str, id: &str) {
        let state = self.dir.path().join("state");
        std::fs::create_dir_all(&state).unwrap();
        std::fs::write(state.join(name), format!("{id}\n")).unwrap();
    }

    /// Pid of the worker forked by a `linger` or `hang` deploy.
    pub fn worker_pid(&self, name: &str) -> Option<String> {
        let path = self.dir.path().join("state").join(format!("{name}.worker"));
        std::fs::read_to_string(path)
            .ok()
            .map(|pid| pid.trim().to_string())
            .filter(|pid| !pid.is_empty())
    }

    /// Wait up to two seconds for the worker forked by `name` to die.
    ///
    /// Zombies count as dead: reaping orphans is up to the init process.
    #[cfg(target_os = "linux")]
    pub async fn worker_gone(&self, name: &str) -> bool {
        let Some(pid) = self.worker_pid(name) else {
            return true;
        };
        for _ in 0..100 {
            let running = std::fs::read_to_string(format!("/proc/{pid}/stat"))
                .map(|stat| {
                    stat.rsplit_once(')')
                        .map(|(_, rest)| !rest.trim_start().starts_with('Z'))
                        .unwrap_or(false)
                })
                .unwrap_or(false);
            if !running {
                return true;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        false
    }

    /// Write the standard artifact and return its path.
    pub fn artifact(&self) -> PathBuf {
        let path = self.dir.path().join("canisterConfig.ts");
        std::fs::write(&path, ARTIFACT).unwrap();
        path
    }

    /// Argument templates invoking the script through `sh`.
    pub fn templates(&self) -> (Vec<String>, Vec<String>) {
        let script = self.script().display().to_string();
        (
            vec![script.clone(), "deploy".into(), "{resource}".into()],
            vec![script, "id".into(), "{resource}".into()],
        )
    }

    /// Write a provisioner.toml driving this tool with short timings.
    pub fn write_config(&self, resources: &[&str], max_attempts: u32) -> PathBuf {
        let (provision, status) = self.templates();
        let config = format!(
            r#"resources = {resources:?}

[tool]
program = "sh"

[commands]
provision = {provision:?}
status = {status:?}
account_id = []
account_balance = []

[polling]
launch_grace_secs = 0
interval_secs = 2
status_timeout_secs = 1
max_attempts = {max_attempts}
exit_grace_secs = 0
settle_delay_ms = 0

[patch]
artifact = {artifact:?}

[logging]
level = "warn"
"#,
            artifact = self.dir.path().join("canisterConfig.ts").display().to_string(),
        );
        let path = self.dir.path().join("provisioner.toml");
        std::fs::write(&path, config).unwrap();
        path
    }
}
