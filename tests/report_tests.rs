use proxy_ping_rs::report::{render_working_proxies, write_working_proxies};
use proxy_ping_rs::types::{AggregateReport, ProbeOutcome, ProxyDescriptor};
use std::path::PathBuf;

fn desc(raw: &str, index: usize) -> ProxyDescriptor {
    ProxyDescriptor {
        raw: raw.to_string(),
        host: "10.0.0.1".to_string(),
        port: 8080,
        index,
    }
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("proxy-ping-rs-{}-{name}", std::process::id()))
}

#[test]
fn no_file_without_successes() {
    let path = temp_path("empty.txt");
    let _ = std::fs::remove_file(&path);
    let report = AggregateReport {
        total_count: 1,
        success_count: 0,
        failure_count: 1,
        ordered_successes: Vec::new(),
    };
    let written = write_working_proxies(&path, &report).expect("write ok");
    assert!(!written);
    assert!(!path.exists());
}

#[test]
fn file_is_overwritten_with_ranked_lines() {
    let path = temp_path("working.txt");
    std::fs::write(&path, "stale content from a previous run\n").expect("seed");

    let report = AggregateReport {
        total_count: 3,
        success_count: 2,
        failure_count: 1,
        ordered_successes: vec![
            ProbeOutcome::success(desc("2. 10.0.0.2", 1), 40),
            ProbeOutcome::success(desc("1. 10.0.0.1:1080", 0), 95),
        ],
    };
    assert!(write_working_proxies(&path, &report).expect("write ok"));

    let body = std::fs::read_to_string(&path).expect("read back");
    assert_eq!(body, "2. 10.0.0.2 # 40ms\n1. 10.0.0.1:1080 # 95ms");
    assert_eq!(body, render_working_proxies(&report));
    let _ = std::fs::remove_file(&path);
}
