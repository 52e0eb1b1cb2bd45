//! Remote command execution for the sync hub.

use tokio::process::Command;

/// Run a shell command and return its combined stdout and stderr.
///
/// Spawn failures come back as the output text rather than an error so
/// viewers always see what happened.
pub async fn run(command: &str) -> String {
    let output = shell(command).output().await;
    match output {
        Ok(output) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            if !output.status.success() {
                if let Some(code) = output.status.code() {
                    combined.push_str(&format!("\n[exit status {code}]"));
                }
            }
            combined
        }
        Err(e) => format!("failed to run command: {e}"),
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let output = run("echo hello").await;
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn test_captures_stderr_and_status() {
        let output = run("echo oops >&2; exit 3").await;
        assert!(output.contains("oops"));
        assert!(output.contains("[exit status 3]"));
    }

    #[tokio::test]
    async fn test_unknown_command_reports_failure() {
        let output = run("definitely-not-a-real-binary-12345").await;
        assert!(output.contains("not found") || output.contains("[exit status"));
    }
}
