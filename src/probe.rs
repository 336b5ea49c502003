use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::types::{ProbeOutcome, ProxyDescriptor};

/// TCP-connect probe against one proxy endpoint.
///
/// - Bounds connect time (including name resolution) with `tokio::time::timeout`.
/// - Latency is wall-clock time from the attempt start until the connect completes.
/// - The stream is dropped as soon as the connect finishes, so the socket is released on every path.
/// - Never fails: errors and timeouts become a failure outcome.
pub async fn probe(descriptor: ProxyDescriptor, timeout: Duration) -> ProbeOutcome {
    let host = descriptor.host.clone();
    let port = descriptor.port;
    measure(descriptor, timeout, async move {
        TcpStream::connect((host.as_str(), port)).await.map(drop)
    })
    .await
}

/// Time `connect` under `timeout` and turn the result into an outcome.
pub(crate) async fn measure<F>(descriptor: ProxyDescriptor, timeout: Duration, connect: F) -> ProbeOutcome
where
    F: Future<Output = io::Result<()>>,
{
    let start = Instant::now();
    match time::timeout(timeout, connect).await {
        Ok(Ok(())) => {
            let latency_ms = start.elapsed().as_millis() as u64;
            debug!(endpoint = %descriptor.endpoint(), latency_ms, "connect ok");
            ProbeOutcome::success(descriptor, latency_ms)
        }
        Ok(Err(e)) => ProbeOutcome::failure(descriptor, e.to_string()),
        Err(_) => ProbeOutcome::failure(
            descriptor,
            format!("connect timed out after {}ms", timeout.as_millis()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn desc(host: &str, port: u16) -> ProxyDescriptor {
        ProxyDescriptor {
            raw: format!("{host}:{port}"),
            host: host.to_string(),
            port,
            index: 0,
        }
    }

    #[tokio::test]
    async fn listening_port_succeeds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while listener.accept().await.is_ok() {}
        });

        let out = probe(desc("127.0.0.1", port), Duration::from_secs(2)).await;
        assert!(out.success, "unexpected failure: {:?}", out.error);
        assert!(out.latency_ms.is_some());
        assert!(out.error.is_none());
    }

    #[tokio::test]
    async fn closed_port_fails_with_reason() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let out = probe(desc("127.0.0.1", port), Duration::from_secs(2)).await;
        assert!(!out.success);
        assert!(out.latency_ms.is_none());
        assert!(!out.error.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn stalled_connect_times_out() {
        let out = measure(
            desc("10.255.255.1", 8080),
            Duration::from_millis(50),
            std::future::pending::<io::Result<()>>(),
        )
        .await;
        assert!(!out.success);
        let reason = out.error.unwrap();
        assert!(reason.contains("timed out"), "reason: {reason}");
        assert!(reason.contains("50ms"), "reason: {reason}");
    }

    #[tokio::test]
    async fn connect_error_message_is_kept() {
        let out = measure(desc("h", 1), Duration::from_secs(1), async {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused by peer"))
        })
        .await;
        assert_eq!(out.error.as_deref(), Some("refused by peer"));
    }
}
