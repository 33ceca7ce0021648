//! ssh and rsync invocations against a cloud's console server.

use anyhow::{Context, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::client::ConsoleConnection;

/// Root of the shared file storage on every cloud.
pub const DISK_ROOT: &str = "/srv/glusterfs/disk";

fn ssh_options(conn: &ConsoleConnection) -> Vec<String> {
    vec![
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-p".to_string(),
        conn.port.to_string(),
        "-l".to_string(),
        conn.user.clone(),
    ]
}

/// `ssh <options> -t <host> [command]`
pub fn ssh_command(conn: &ConsoleConnection, command: Option<&str>) -> Command {
    let mut cmd = Command::new("ssh");
    cmd.args(ssh_options(conn)).arg("-t").arg(&conn.host);
    if let Some(command) = command {
        cmd.arg(command);
    }
    cmd
}

/// `rsync -avz -e 'ssh <options>' --progress <source> <destination>`
pub fn rsync_command(conn: &ConsoleConnection, source: &str, destination: &str) -> Command {
    let shell = format!("ssh {}", ssh_options(conn).join(" "));
    let mut cmd = Command::new("rsync");
    cmd.args(["-avz", "-e", &shell, "--progress", source, destination]);
    cmd
}

/// Remote `host:path` under the shared disk.
pub fn disk_path(conn: &ConsoleConnection, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if relative.is_empty() {
        format!("{}:{}", conn.host, DISK_ROOT)
    } else {
        format!("{}:{}/{}", conn.host, DISK_ROOT, relative)
    }
}

/// Run with the terminal attached and return the exit code.
pub async fn run_interactive(mut cmd: Command) -> Result<i32> {
    debug!(command = ?cmd.as_std(), "Running interactive command");
    let program = cmd.as_std().get_program().to_string_lossy().to_string();
    let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("Failed to execute {program}"))?;

    Ok(status.code().unwrap_or(1))
}
