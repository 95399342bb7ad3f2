//! Rule sources: where rule stores come from.
//!
//! [`RuleSource`] abstracts one subscription endpoint producing a
//! [`RuleStore`]; [`HttpSource`] is the production implementation fetching
//! a filter list document over HTTP. Lists served as gzip files are
//! detected by their magic bytes and decompressed transparently.

use flate2::read::GzDecoder;
use std::io::{BufRead, BufReader, Read};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::rule::Rule;
use crate::store::RuleStore;

/// One source of filter rules.
///
/// Implementations must be callable from the engine's background loader
/// thread; a failed fetch is skipped and logged by the caller, never
/// fatal.
pub trait RuleSource: Send + Sync {
    /// Identifier used in logs (typically the endpoint URL).
    fn name(&self) -> &str;

    /// Fetch and parse this source into a fresh store.
    fn fetch(&self) -> Result<RuleStore>;
}

/// A subscription endpoint fetched over HTTP.
pub struct HttpSource {
    url: String,
    timeout: Duration,
}

impl HttpSource {
    /// Create a source for one endpoint URL.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RuleSource for HttpSource {
    fn name(&self) -> &str {
        &self.url
    }

    fn fetch(&self) -> Result<RuleStore> {
        let agent = ureq::AgentBuilder::new().timeout(self.timeout).build();
        let response = agent.get(&self.url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => Error::Status(code),
            ureq::Error::Transport(t) => Error::Fetch(t.to_string()),
        })?;

        let mut raw = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut raw)
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let store = if is_gzip(&raw) {
            parse_rules(GzDecoder::new(&raw[..]))
        } else {
            parse_rules(&raw[..])
        };

        log::info!(
            "fetched {} rules ({} exceptions, {} exclusions) from {}",
            store.rule_count(),
            store.exception_count(),
            store.exclusion_count(),
            self.url
        );
        Ok(store)
    }
}

/// Check if data is gzip compressed.
fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}

/// Parse a filter list line by line into a store.
///
/// Malformed lines are skipped and logged; they never fail the list.
pub fn parse_rules<R: Read>(reader: R) -> RuleStore {
    let buf_reader = BufReader::new(reader);
    let mut store = RuleStore::new();
    let mut skipped = 0usize;

    for line in buf_reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        match Rule::parse(&line) {
            Ok(rule) => store.add(rule),
            Err(e) => {
                skipped += 1;
                log::debug!("skipping rule line: {}", e);
            }
        }
    }

    if skipped > 0 {
        log::warn!("skipped {} malformed rule lines", skipped);
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_LIST: &str = "\
[Adblock Plus 2.0]
! Title: test list
||doubleclick.net^
@@||doubleclick.net/safe^
*tracker*

! trailing comment
";

    fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_is_gzip() {
        assert!(is_gzip(&gzip_bytes(b"hello")));
        assert!(!is_gzip(b"||plain.list^"));
        assert!(!is_gzip(b""));
    }

    #[test]
    fn test_parse_rules() {
        let store = parse_rules(SAMPLE_LIST.as_bytes());
        assert_eq!(store.rule_count(), 3);
        assert_eq!(store.exception_count(), 1);
        assert_eq!(store.exclusion_count(), 2);
        assert!(store.matches_exclusion("http://doubleclick.net/ad"));
        assert!(store.matches_exception("http://doubleclick.net/safe"));
    }

    #[test]
    fn test_parse_rules_ignores_junk_lines() {
        let list = "\
! comment
[Adblock Plus 2.0]
example.com##.ad-banner

||good.example.com^
";
        let store = parse_rules(list.as_bytes());
        assert_eq!(store.rule_count(), 1);
        assert!(store.matches_exclusion("http://good.example.com/"));
    }

    #[test]
    fn test_parse_gzip_payload() {
        let compressed = gzip_bytes(SAMPLE_LIST.as_bytes());
        assert!(is_gzip(&compressed));

        let store = parse_rules(GzDecoder::new(&compressed[..]));
        assert_eq!(store.rule_count(), 3);
    }

    #[test]
    fn test_http_source_name_is_url() {
        let source = HttpSource::new("https://example.com/list.txt", Duration::from_secs(5));
        assert_eq!(source.name(), "https://example.com/list.txt");
        assert_eq!(source.url(), "https://example.com/list.txt");
    }
}
