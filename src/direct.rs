use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::process::Command;
use tokio::time;

/// Measure round-trip latency to `host` with one ICMP echo via the system `ping`.
///
/// Single attempt, no retry. Errors when `ping` cannot run, exits unsuccessfully,
/// or prints no round-trip time; callers treat that as an unreachable target.
pub async fn probe_direct(host: &str, timeout: Duration) -> Result<u64> {
    let mut cmd = Command::new("ping");

    #[cfg(windows)]
    {
        cmd.arg("-n").arg("1").arg("-w").arg(timeout.as_millis().max(1).to_string());
    }

    #[cfg(not(windows))]
    {
        cmd.arg("-c").arg("1");
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            let secs = ((timeout.as_millis() + 999) / 1000).max(1);
            cmd.arg("-w").arg(secs.to_string());
        }
    }

    cmd.arg(host).kill_on_drop(true);

    // Outer bound in case the platform ping ignores its own deadline.
    let output = time::timeout(timeout + Duration::from_secs(1), cmd.output())
        .await
        .with_context(|| format!("ping {host} did not finish"))?
        .context("failed to run ping")?;

    if !output.status.success() {
        bail!("target {host} unreachable (ping exited with {})", output.status);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_ping_ms(&stdout) {
        Some(ms) => Ok(ms),
        None => bail!("target {host} unreachable (no round-trip time in ping output)"),
    }
}

/// Pull a round-trip time in whole milliseconds out of `ping` output.
///
/// Prefers the summary average (`Average = 12ms` on Windows, `min/avg/max` on Unix),
/// then falls back to the first per-reply `time=` / `time<`.
pub fn parse_ping_ms(output: &str) -> Option<u64> {
    for line in output.lines() {
        if let Some(idx) = line.find("Average") {
            let value = line[idx + "Average".len()..].trim_start_matches([' ', '=']);
            if let Some(ms) = leading_number(value) {
                return Some(ms.round() as u64);
            }
        }
        if line.contains("min/avg/max") {
            let Some((_, values)) = line.split_once('=') else {
                continue;
            };
            if let Some(avg) = values.trim().split('/').nth(1).and_then(leading_number) {
                return Some(avg.round() as u64);
            }
        }
    }

    for marker in ["time=", "time<"] {
        if let Some(idx) = output.find(marker) {
            if let Some(ms) = leading_number(&output[idx + marker.len()..]) {
                return Some(ms.round() as u64);
            }
        }
    }
    None
}

fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    let ms = s[..end].replace(',', ".").parse::<f64>().ok()?;
    ms.is_finite().then_some(ms)
}
