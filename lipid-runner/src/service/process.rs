//! External program execution

use anyhow::{Context, Result};
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// Longest stderr excerpt carried into an error message
const STDERR_TAIL_CHARS: usize = 2000;

/// Runs `command_line --input <input> --output <output>` to completion
///
/// `command_line` is split on whitespace; the first word is the program.
pub async fn run_tool(command_line: &str, input: &Path, output: &Path) -> Result<()> {
    let mut words = command_line.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty command line"))?;

    debug!(
        "Executing process: {} --input {} --output {}",
        command_line,
        input.display(),
        output.display()
    );

    let result = Command::new(program)
        .args(words)
        .arg("--input")
        .arg(input)
        .arg("--output")
        .arg(output)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to execute '{}'", program))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let stderr = stderr.trim();
        warn!("'{}' exited with {}", program, result.status);

        let tail: String = {
            let skip = stderr.chars().count().saturating_sub(STDERR_TAIL_CHARS);
            stderr.chars().skip(skip).collect()
        };
        anyhow::bail!("'{}' exited with {}: {}", program, result.status, tail);
    }

    Ok(())
}
