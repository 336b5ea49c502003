use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use proxy_ping_rs::config::{self, ProbeConfig};
use proxy_ping_rs::descriptor::DescriptorReader;
use proxy_ping_rs::{direct, report, scheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// proxy-ping-rs — Measure which proxies from a list accept TCP connections, and how fast.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "proxy-ping-rs",
    version,
    about = "Measure which proxies from a list accept TCP connections, and how fast.",
    long_about = None
)]
struct Cli {
    /// Target host checked directly before any proxy is probed.
    target: String,

    /// Proxies file (one `[n. ]host[:port]` per line). Prompted for when omitted.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Max probes in flight at once.
    #[arg(long, default_value_t = config::MAX_CONCURRENT)]
    concurrency: usize,

    /// Per-proxy connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = config::DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Where working proxies are written (overwritten each run).
    #[arg(long, default_value = config::WORKING_PROXIES_FILE)]
    output: PathBuf,

    /// Also write the full report as pretty JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Number of fastest proxies to list in the summary.
    #[arg(long, default_value_t = config::DEFAULT_TOP_N)]
    top: usize,

    /// Skip the direct ping of the target (for hosts that drop ICMP).
    #[arg(long = "skip-direct", default_value_t = false)]
    skip_direct: bool,

    /// Log level (trace/debug/info/warn/error). RUST_LOG takes precedence.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
    if let Err(e) = run(cli).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = ProbeConfig::new()
        .with_concurrency(cli.concurrency)
        .with_timeout(Duration::from_millis(cli.timeout_ms))
        .with_top_n(cli.top)
        .with_output(cli.output.clone())
        .with_json_output(cli.json.clone());

    let file = match cli.file.as_deref() {
        Some(path) if path.is_file() => path.to_path_buf(),
        Some(path) => bail!("proxies file not found: {}", path.display()),
        None => prompt_for_file()?,
    };

    println!("proxy-ping-rs configuration:");
    println!("  target       : {}", cli.target);
    println!("  proxies file : {}", file.display());
    println!("  concurrency  : {}", cfg.concurrency);
    println!("  timeout_ms   : {}", cfg.timeout.as_millis());
    println!("  output       : {}", cfg.output.display());
    println!(
        "  json         : {}",
        cfg.json_output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string())
    );

    if cli.skip_direct {
        info!("skipping direct check of {}", cli.target);
    } else {
        let started = Instant::now();
        let ms = direct::probe_direct(&cli.target, cfg.timeout)
            .await
            .with_context(|| format!("invalid server {}", cli.target))?;
        info!(
            "valid server; {ms}ms round trip (checked in {:.2?})",
            started.elapsed()
        );
    }

    let reader = DescriptorReader::open(&file).await?;

    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    info!("starting proxy processing");
    let started = Instant::now();
    let results =
        scheduler::probe_proxies_with_cancel(reader, cfg.concurrency, cfg.timeout, cancel)
            .await
            .context("error processing proxies")?;
    info!("all proxies processed");

    report::print_summary(&results, cfg.top_n);

    if report::write_working_proxies(&cfg.output, &results)? {
        println!("\nWorking proxies saved to {}", cfg.output.display());
    }
    if let Some(path) = cfg.json_output.as_deref() {
        report::write_report_json(path, &results)?;
        println!("Wrote JSON report to {}", path.display());
    }

    println!(
        "Time taken for {} proxies: {:.2?}",
        results.total_count,
        started.elapsed()
    );
    Ok(())
}

/// Ask on stdin until the user names an existing file.
fn prompt_for_file() -> Result<PathBuf> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("Enter the name of your file: ");
        stdout.flush().context("failed to write prompt")?;

        let mut answer = String::new();
        let read = stdin
            .lock()
            .read_line(&mut answer)
            .context("failed to read file name")?;
        if read == 0 {
            bail!("no proxies file given (stdin closed)");
        }

        let path = Path::new(answer.trim());
        if path.is_file() {
            println!("Set proxies file to: {}", path.display());
            return Ok(path.to_path_buf());
        }
        println!("Invalid file name");
    }
}
