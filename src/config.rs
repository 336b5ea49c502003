use std::path::PathBuf;
use std::time::Duration;

/// Default ceiling on simultaneously outstanding probes.
pub const MAX_CONCURRENT: usize = 20;

/// Default per-probe connect timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default number of fastest proxies shown in the summary.
pub const DEFAULT_TOP_N: usize = 10;

/// File the working subset is written to.
pub const WORKING_PROXIES_FILE: &str = "working_proxies.txt";

/// Parameters for one probing run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Maximum probes in flight at once
    pub concurrency: usize,
    /// Connect timeout for each probe
    pub timeout: Duration,
    /// How many ranked successes the summary prints
    pub top_n: usize,
    /// Where working proxies are persisted
    pub output: PathBuf,
    /// Optional pretty-JSON dump of the full report
    pub json_output: Option<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: MAX_CONCURRENT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            top_n: DEFAULT_TOP_N,
            output: PathBuf::from(WORKING_PROXIES_FILE),
            json_output: None,
        }
    }
}

impl ProbeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_output(mut self, output: PathBuf) -> Self {
        self.output = output;
        self
    }

    pub fn with_json_output(mut self, path: Option<PathBuf>) -> Self {
        self.json_output = path;
        self
    }
}
