use serde::{Deserialize, Serialize};

/// One proxy endpoint parsed from a line of the input file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProxyDescriptor {
    /// Trimmed source line, written back verbatim to the working-proxies file.
    pub raw: String,
    pub host: String,
    pub port: u16,
    /// Position among the non-blank lines of the input, starting at 0.
    pub index: usize,
}

impl ProxyDescriptor {
    /// `host:port` form suitable for display.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Terminal result of one probe. Exactly one of `latency_ms` / `error` is set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub descriptor: ProxyDescriptor,
    pub success: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
    pub checked_at: String,
}

impl ProbeOutcome {
    pub fn success(descriptor: ProxyDescriptor, latency_ms: u64) -> Self {
        Self {
            descriptor,
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
            checked_at: crate::now_rfc3339(),
        }
    }

    pub fn failure(descriptor: ProxyDescriptor, reason: impl Into<String>) -> Self {
        Self {
            descriptor,
            success: false,
            latency_ms: None,
            error: Some(reason.into()),
            checked_at: crate::now_rfc3339(),
        }
    }

    pub fn index(&self) -> usize {
        self.descriptor.index
    }
}

/// Final counts plus the successful outcomes ranked fastest first.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AggregateReport {
    pub total_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub ordered_successes: Vec<ProbeOutcome>,
}

impl AggregateReport {
    /// First `n` ranked successes (fewer when there are not enough).
    pub fn top_n(&self, n: usize) -> &[ProbeOutcome] {
        &self.ordered_successes[..n.min(self.ordered_successes.len())]
    }

    pub fn has_successes(&self) -> bool {
        !self.ordered_successes.is_empty()
    }
}
