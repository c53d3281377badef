use std::time::Duration;

/// Timeout for external desktop tools (xdotool, scrot).
const TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs an external tool, returning trimmed stdout on success or an error message.
pub async fn run_tool(program: &str, args: &[&str]) -> Result<String, String> {
    run_tool_with_timeout(program, args, TOOL_TIMEOUT).await
}

/// Like [`run_tool`]. A child still running at `timeout` is killed, so a hung
/// tool cannot deliver input after its iteration has moved on.
pub async fn run_tool_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, String> {
    let result = tokio::time::timeout(
        timeout,
        tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match result {
        Ok(Ok(output)) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(format!("{program} {} failed ({}): {}", args.join(" "), output.status, stderr.trim()))
            }
        }
        Ok(Err(e)) => Err(format!("Failed to execute {program}: {e}")),
        Err(_) => {
            tracing::warn!(program, timeout_ms = timeout.as_millis() as u64, "tool timed out, killed");
            Err(format!("{program} timed out after {}ms", timeout.as_millis()))
        }
    }
}
