use std::time::Duration;

use modelrelay_common::{Error, Result};
use tokio::process::Command;
use tracing::{info, warn};

const ENUMERATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Forcibly terminate every process listening on `port`, whoever started it.
///
/// Returns the pids that were killed. The calling process is never targeted.
pub async fn reclaim_port(port: u16) -> Result<Vec<u32>> {
    let own_pid = std::process::id();
    let pids: Vec<u32> = listening_pids(port)
        .await?
        .into_iter()
        .filter(|pid| *pid != own_pid)
        .collect();

    if pids.is_empty() {
        info!("no process is listening on port {port}");
        return Ok(pids);
    }

    for pid in &pids {
        kill(*pid)?;
        info!("killed pid {pid} listening on port {port}");
    }
    Ok(pids)
}

async fn run(cmd: &mut Command, tool: &str) -> Result<std::process::Output> {
    let output = tokio::time::timeout(ENUMERATE_TIMEOUT, cmd.kill_on_drop(true).output())
        .await
        .map_err(|_| Error::Process(format!("{tool} timed out")))?
        .map_err(|e| {
            Error::Process(format!(
                "could not determine the process owning the port ({tool} unavailable: {e})"
            ))
        })?;
    Ok(output)
}

#[cfg(not(windows))]
async fn listening_pids(port: u16) -> Result<Vec<u32>> {
    let filter = format!("-iTCP:{port}");
    let output = run(
        Command::new("lsof").args(["-nP", "-t", filter.as_str(), "-sTCP:LISTEN"]),
        "lsof",
    )
    .await?;
    lsof_pids(&output)
}

/// Interpret an `lsof -t` run. Exit 1 with no output at all means nothing matched;
/// any other failure without pids leaves the owner unknown.
#[cfg_attr(windows, allow(dead_code))]
fn lsof_pids(output: &std::process::Output) -> Result<Vec<u32>> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let pids = parse_lsof(&stdout);

    if output.status.success() {
        return Ok(pids);
    }
    if !pids.is_empty() {
        warn!("lsof exited with {} but reported listeners: {stderr}", output.status);
        return Ok(pids);
    }
    if output.status.code() == Some(1) && stdout.trim().is_empty() && stderr.is_empty() {
        return Ok(pids);
    }
    Err(Error::Process(format!(
        "could not determine the process owning the port (lsof exited with {}: {})",
        output.status,
        if stderr.is_empty() { "no output" } else { stderr }
    )))
}

#[cfg(windows)]
async fn listening_pids(port: u16) -> Result<Vec<u32>> {
    let output = run(Command::new("netstat").args(["-ano", "-p", "TCP"]), "netstat").await?;
    if !output.status.success() {
        return Err(Error::Process(format!(
            "netstat failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(parse_netstat(&String::from_utf8_lossy(&output.stdout), port))
}

/// Parse `lsof -t` output: one pid per line.
#[cfg_attr(windows, allow(dead_code))]
fn parse_lsof(output: &str) -> Vec<u32> {
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

/// Parse `netstat -ano` rows in the LISTENING state whose local address ends in `:port`.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_netstat(output: &str, port: u16) -> Vec<u32> {
    let suffix = format!(":{port}");
    let mut pids: Vec<u32> = output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            match cols.as_slice() {
                [proto, local, _remote, state, pid]
                    if proto.eq_ignore_ascii_case("tcp")
                        && state.eq_ignore_ascii_case("listening")
                        && local.ends_with(&suffix) =>
                {
                    pid.parse().ok()
                }
                _ => None,
            }
        })
        .filter(|pid| *pid != 0)
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

#[cfg(unix)]
fn kill(pid: u32) -> Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| Error::Process(format!("pid {pid} out of range")))?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGKILL) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        warn!("pid {pid} exited before it could be killed");
        return Ok(());
    }
    Err(Error::Process(format!("failed to kill pid {pid}: {err}")))
}

#[cfg(windows)]
fn kill(pid: u32) -> Result<()> {
    use windows_sys::Win32::Foundation::CloseHandle;
    use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_TERMINATE, TerminateProcess};

    // SAFETY: the handle is checked before use and closed on every path.
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
        if handle == 0 {
            return Err(Error::Process(format!(
                "failed to open pid {pid}: {}",
                std::io::Error::last_os_error()
            )));
        }
        let ok = TerminateProcess(handle, 1);
        CloseHandle(handle);
        if ok == 0 {
            return Err(Error::Process(format!(
                "failed to terminate pid {pid}: {}",
                std::io::Error::last_os_error()
            )));
        }
    }
    Ok(())
}

#[cfg(not(any(unix, windows)))]
fn kill(pid: u32) -> Result<()> {
    Err(Error::Process(format!(
        "killing pid {pid} is not supported on this platform"
    )))
}
