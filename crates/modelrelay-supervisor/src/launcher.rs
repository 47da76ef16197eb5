use std::ffi::OsString;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use modelrelay_common::{Error, Result};
use tracing::{info, warn};

/// Starts a serving process bound to a port.
pub trait Launcher: Send + Sync {
    /// Launch the process and return its pid when known.
    fn launch(&self, port: u16) -> Result<Option<u32>>;
}

/// Spawns `program args.. --port <port>` as a daemon.
///
/// The child runs in its own session with stdin and stdout detached. No handle is
/// retained, so it outlives the launcher.
pub struct DetachedLauncher {
    program: PathBuf,
    args: Vec<OsString>,
    log_path: Option<PathBuf>,
}

impl DetachedLauncher {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            log_path: None,
        }
    }

    /// Append the child's stderr to `path` instead of discarding it.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    fn stderr(&self) -> Stdio {
        let Some(path) = &self.log_path else {
            return Stdio::null();
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Stdio::from(file),
            Err(e) => {
                warn!("cannot open server log {}: {e}", path.display());
                Stdio::null()
            }
        }
    }
}

impl Launcher for DetachedLauncher {
    fn launch(&self, port: u16) -> Result<Option<u32>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(self.stderr());
        detach(&mut cmd);

        let child = cmd.spawn().map_err(|e| {
            Error::Process(format!(
                "failed to spawn {}: {e}",
                self.program.display()
            ))
        })?;
        let pid = child.id();
        // Dropping the handle neither waits on nor kills the child.
        drop(child);

        info!("launched {} (pid {pid}) for port {port}", self.program.display());
        Ok(Some(pid))
    }
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: setsid is async-signal-safe and touches no parent state.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    use windows_sys::Win32::System::Threading::{CREATE_NEW_PROCESS_GROUP, DETACHED_PROCESS};

    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut Command) {}
