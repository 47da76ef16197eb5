#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use modelrelay_common::Error;
use modelrelay_supervisor::reclaim_port;

// Stands in for lsof. Answers from files keyed by the queried port:
// `pids-<port>` is printed as the listener list, `fail-<port>` makes it exit 1 with
// a permission error, and anything else is a silent "nothing matched".
const FAKE_LSOF: &str = r#"#!/bin/sh
dir=$(dirname "$0")
for arg in "$@"; do
  case "$arg" in -iTCP:*) port="${arg#-iTCP:}" ;; esac
done
if [ -f "$dir/fail-$port" ]; then
  echo "lsof: Permission denied" >&2
  exit 1
fi
if [ -f "$dir/pids-$port" ]; then
  cat "$dir/pids-$port"
  exit 0
fi
exit 1
"#;

/// Installs the fake lsof at the front of PATH once per test binary.
fn fake_lsof_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap().keep();
        let script = dir.join("lsof");
        std::fs::write(&script, FAKE_LSOF).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let path = std::env::var_os("PATH").unwrap_or_default();
        let mut entries = vec![dir.clone()];
        entries.extend(std::env::split_paths(&path));
        let joined = std::env::join_paths(entries).unwrap();
        // SAFETY: runs once, before any test in this binary spawns a subprocess.
        unsafe { std::env::set_var("PATH", joined) };
        dir
    })
}

#[tokio::test]
async fn kills_listeners_but_never_itself() {
    let dir = fake_lsof_dir();
    let mut child = Command::new("sleep")
        .arg("30")
        .stdin(Stdio::null())
        .spawn()
        .unwrap();
    let own = std::process::id();
    std::fs::write(dir.join("pids-41001"), format!("{}\n{own}\n", child.id())).unwrap();

    let killed = reclaim_port(41001).await.unwrap();

    assert_eq!(killed, vec![child.id()]);
    let status = child.wait().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGKILL));
}

#[tokio::test]
async fn nothing_listening_is_empty_success() {
    fake_lsof_dir();
    assert!(reclaim_port(41002).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_owner_is_process_error() {
    let dir = fake_lsof_dir();
    std::fs::write(dir.join("fail-41003"), "").unwrap();

    let err = reclaim_port(41003).await.unwrap_err();

    assert!(matches!(err, Error::Process(_)));
    assert!(err.to_string().contains("Permission denied"));
}
