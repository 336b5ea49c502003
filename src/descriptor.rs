use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::types::ProxyDescriptor;

/// Port used when a line has no port, or one that is not a valid TCP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Parse a single proxies-file line into a descriptor carrying `index`.
///
/// Supported formats:
/// - `host:port`
/// - `host` (port defaults to 8080)
/// - either of the above behind an ordinal label such as `12. ` or `3) `
///
/// Blank lines and `#` comments yield `None`. Any other line parses; a
/// malformed port falls back to [`DEFAULT_PORT`] instead of rejecting the line.
pub fn parse_line(line: &str, index: usize) -> Option<ProxyDescriptor> {
    let raw = line.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let body = strip_ordinal(raw);
    let (host, port) = match body.split_once(':') {
        Some((h, p)) => (h.trim(), parse_port_or_default(p)),
        None => (body, DEFAULT_PORT),
    };

    Some(ProxyDescriptor {
        raw: raw.to_string(),
        host: host.to_string(),
        port,
        index,
    })
}

/// Parse a whole proxies file held in memory. Indices count only the lines that parse.
pub fn parse_descriptors_str(s: &str) -> Vec<ProxyDescriptor> {
    let mut out = Vec::new();
    for line in s.lines() {
        if let Some(d) = parse_line(line, out.len()) {
            out.push(d);
        }
    }
    out
}

/// Streaming reader that turns an async byte source into descriptors one line at a time.
///
/// Lines are decoded lossily, so stray non-UTF-8 bytes become U+FFFD instead of an error.
pub struct DescriptorReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    next_index: usize,
}

impl<R: AsyncRead + Unpin> DescriptorReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
            next_index: 0,
        }
    }

    /// Next descriptor, skipping blank and comment lines. `Ok(None)` at end of input.
    pub async fn next_descriptor(&mut self) -> Result<Option<ProxyDescriptor>> {
        loop {
            self.buf.clear();
            let n = self
                .inner
                .read_until(b'\n', &mut self.buf)
                .await
                .context("failed to read proxies input")?;
            if n == 0 {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&self.buf);
            if let Some(d) = parse_line(&line, self.next_index) {
                self.next_index += 1;
                return Ok(Some(d));
            }
        }
    }

    /// Number of descriptors handed out so far.
    pub fn count(&self) -> usize {
        self.next_index
    }
}

impl DescriptorReader<File> {
    /// Open a proxies file for streaming. Errors if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .await
            .with_context(|| format!("failed to open proxies file: {}", path.as_ref().display()))?;
        Ok(Self::new(file))
    }
}

// `12. host` / `3) host`: digits, a separator, then whitespace. The whitespace
// requirement keeps `10.0.0.1` intact.
fn strip_ordinal(s: &str) -> &str {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return s;
    }
    let rest = &s[digits..];
    let Some(after_sep) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) else {
        return s;
    };
    if after_sep.starts_with(char::is_whitespace) {
        after_sep.trim_start()
    } else {
        s
    }
}

fn parse_port_or_default(s: &str) -> u16 {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => DEFAULT_PORT,
        Ok(p) => p,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_and_port() {
        let d = parse_line("192.168.1.1:3128", 0).unwrap();
        assert_eq!(d.host, "192.168.1.1");
        assert_eq!(d.port, 3128);
        assert_eq!(d.raw, "192.168.1.1:3128");
    }

    #[test]
    fn strips_ordinal_label() {
        let d = parse_line("  17. 10.0.0.1:1080  ", 4).unwrap();
        assert_eq!(d.host, "10.0.0.1");
        assert_eq!(d.port, 1080);
        assert_eq!(d.index, 4);
        assert_eq!(d.raw, "17. 10.0.0.1:1080");

        let d = parse_line("3) proxy.example.net:80", 0).unwrap();
        assert_eq!(d.host, "proxy.example.net");
    }

    #[test]
    fn dotted_ip_is_not_an_ordinal() {
        let d = parse_line("10.0.0.1:1080", 0).unwrap();
        assert_eq!(d.host, "10.0.0.1");
    }

    #[test]
    fn missing_or_bad_port_defaults() {
        for line in ["10.0.0.2", "10.0.0.2:", "10.0.0.2:abc", "10.0.0.2:0", "10.0.0.2:70000"] {
            let d = parse_line(line, 0).unwrap();
            assert_eq!(d.host, "10.0.0.2", "line {line}");
            assert_eq!(d.port, DEFAULT_PORT, "line {line}");
        }
    }

    #[test]
    fn blank_and_comment_lines_skip() {
        assert!(parse_line("", 0).is_none());
        assert!(parse_line("   \t", 0).is_none());
        assert!(parse_line("# exported 2024-01-01", 0).is_none());
    }

    #[test]
    fn indices_skip_blank_lines() {
        let ds = parse_descriptors_str("1. 10.0.0.1:1080\n\n2. 10.0.0.2\n");
        assert_eq!(ds.len(), 2);
        assert_eq!(ds[0].index, 0);
        assert_eq!(ds[1].index, 1);
        assert_eq!(ds[1].port, DEFAULT_PORT);
    }

    #[tokio::test]
    async fn reader_streams_descriptors() {
        let input = "a:1\n\n# note\nb\r\nc:3\n";
        let mut reader = DescriptorReader::new(input.as_bytes());
        let mut hosts = Vec::new();
        while let Some(d) = reader.next_descriptor().await.unwrap() {
            hosts.push((d.index, d.host, d.port));
        }
        assert_eq!(
            hosts,
            vec![
                (0, "a".to_string(), 1),
                (1, "b".to_string(), DEFAULT_PORT),
                (2, "c".to_string(), 3),
            ]
        );
        assert_eq!(reader.count(), 3);
    }

    #[tokio::test]
    async fn invalid_utf8_line_is_decoded_lossily() {
        let input: &[u8] = b"1. 10.0.0.1:1080\n2. caf\xe9.example:80\n3. 10.0.0.3\n";
        let mut reader = DescriptorReader::new(input);
        let mut got = Vec::new();
        while let Some(d) = reader.next_descriptor().await.unwrap() {
            got.push(d);
        }
        assert_eq!(got.len(), 3);
        assert_eq!(got[1].host, "caf\u{fffd}.example");
        assert_eq!(got[1].port, 80);
        assert_eq!(got[2].index, 2);
    }
}
