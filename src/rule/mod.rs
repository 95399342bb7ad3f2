//! Filter rule types and line classification.
//!
//! A [`Rule`] is one parsed filter-list line. Lines starting with `@@` are
//! exceptions ("allow despite blocking rules"); blank lines, comments
//! (`!`, `[Adblock …]` headers) and element-hiding rules (`##`, `#@#`,
//! `#?#`) are empty; everything else is an exclusion ("block this URL").

mod pattern;

pub use pattern::RulePattern;

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::Result;

/// Marker prefix for exception rules.
const EXCEPTION_MARKER: &str = "@@";

/// Markers for element-hiding rules, which carry no URL verdict.
const HIDING_MARKERS: [&str; 3] = ["#@#", "#?#", "##"];

/// Classification of a filter-list line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// A match overrides a would-be exclusion: allow the URL.
    Exception,
    /// A match means: block the URL.
    Exclusion,
    /// Comment or blank line; parsed but never stored or matched.
    Empty,
}

impl RuleKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Exception => "exception",
            RuleKind::Exclusion => "exclusion",
            RuleKind::Empty => "empty",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single parsed filter-list rule.
///
/// Immutable after parsing; shared read-only across concurrent matching
/// calls. Equality and hashing use the effective line and kind so that
/// duplicate rules across subscription sources collapse.
#[derive(Debug, Clone)]
pub struct Rule {
    kind: RuleKind,
    original_line: String,
    effective_line: String,
    pattern: RulePattern,
}

impl Rule {
    /// Parse one filter-list line.
    ///
    /// Returns an error only when the pattern cannot be translated into a
    /// matcher; callers skip (and log) such lines rather than failing the
    /// whole list.
    pub fn parse(line: &str) -> Result<Self> {
        let trimmed = line.trim();
        let kind = classify(trimmed);

        let effective = match kind {
            RuleKind::Exception => trimmed[EXCEPTION_MARKER.len()..].trim_start(),
            RuleKind::Exclusion => trimmed,
            RuleKind::Empty => "",
        };

        Ok(Self {
            kind,
            original_line: line.to_string(),
            effective_line: effective.to_string(),
            pattern: RulePattern::compile(effective)?,
        })
    }

    /// The classification of this rule.
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// The raw source line (for diagnostics).
    pub fn original_line(&self) -> &str {
        &self.original_line
    }

    /// The line after normalization (kind marker stripped).
    pub fn effective_line(&self) -> &str {
        &self.effective_line
    }

    /// The translated regular expression (for diagnostics).
    pub fn regex_str(&self) -> &str {
        self.pattern.as_regex_str()
    }

    /// Check whether a URL matches this rule.
    ///
    /// Safe to call concurrently from many threads. Pass the URL through
    /// [`normalize_url`] first so host matching is case-insensitive.
    pub fn applies(&self, url: &str) -> bool {
        if self.kind == RuleKind::Empty {
            return false;
        }
        self.pattern.matches(url)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.effective_line == other.effective_line
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.effective_line.hash(state);
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.original_line)
    }
}

/// Classify a trimmed filter-list line.
fn classify(line: &str) -> RuleKind {
    if line.is_empty() || line.starts_with('!') || line.starts_with('[') {
        return RuleKind::Empty;
    }
    if HIDING_MARKERS.iter().any(|m| line.contains(m)) {
        return RuleKind::Empty;
    }
    if line.starts_with(EXCEPTION_MARKER) {
        return RuleKind::Exception;
    }
    RuleKind::Exclusion
}

/// Normalize a request URL for matching: lowercase the scheme and
/// authority, leave path, query and fragment untouched.
///
/// Host matching in filter lists is case-insensitive while path matching
/// is case-sensitive; this is the query-side half of that convention.
pub fn normalize_url(url: &str) -> Cow<'_, str> {
    let authority_end = match url.find("://") {
        Some(idx) => {
            let after = idx + 3;
            url[after..]
                .find(&['/', '?', '#'][..])
                .map(|i| after + i)
                .unwrap_or(url.len())
        }
        None => return Cow::Borrowed(url),
    };

    if url[..authority_end].bytes().any(|b| b.is_ascii_uppercase()) {
        let mut out = String::with_capacity(url.len());
        out.push_str(&url[..authority_end].to_ascii_lowercase());
        out.push_str(&url[authority_end..]);
        Cow::Owned(out)
    } else {
        Cow::Borrowed(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    #[test]
    fn test_classify_exclusion() {
        let rule = Rule::parse("||ads.example.com^").unwrap();
        assert_eq!(rule.kind(), RuleKind::Exclusion);
        assert_eq!(rule.effective_line(), "||ads.example.com^");
        assert_eq!(rule.original_line(), "||ads.example.com^");
    }

    #[test]
    fn test_classify_exception() {
        let rule = Rule::parse("@@||example.com/safe^").unwrap();
        assert_eq!(rule.kind(), RuleKind::Exception);
        assert_eq!(rule.effective_line(), "||example.com/safe^");
        assert_eq!(rule.original_line(), "@@||example.com/safe^");
    }

    #[test]
    fn test_classify_empty() {
        for line in ["", "   ", "! comment", "[Adblock Plus 2.0]"] {
            assert_eq!(Rule::parse(line).unwrap().kind(), RuleKind::Empty, "{:?}", line);
        }
    }

    #[test]
    fn test_classify_element_hiding_as_empty() {
        for line in [
            "example.com##.ad-banner",
            "example.com#@#.ad-banner",
            "example.com#?#.ad:has(.sponsor)",
        ] {
            assert_eq!(Rule::parse(line).unwrap().kind(), RuleKind::Empty, "{:?}", line);
        }
    }

    #[test]
    fn test_empty_rule_never_applies() {
        let rule = Rule::parse("! anything").unwrap();
        assert!(!rule.applies("http://anything/"));
    }

    #[test]
    fn test_applies() {
        let rule = Rule::parse("||doubleclick.net^").unwrap();
        assert!(rule.applies("http://doubleclick.net/ad"));
        assert!(!rule.applies("http://example.com/"));
    }

    #[test]
    fn test_equality_by_effective_line_and_kind() {
        let a = Rule::parse("@@||example.com^").unwrap();
        let b = Rule::parse("@@||example.com^").unwrap();
        let c = Rule::parse("||example.com^").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c); // same effective line, different kind

        let mut set = AHashSet::new();
        set.insert(a);
        set.insert(b);
        set.insert(c);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_normalize_url_lowercases_host_only() {
        assert_eq!(
            normalize_url("HTTP://Ads.Example.COM/Banner?Q=1"),
            "http://ads.example.com/Banner?Q=1"
        );
        assert_eq!(
            normalize_url("https://example.com/path"),
            "https://example.com/path"
        );
    }

    #[test]
    fn test_normalize_url_without_scheme() {
        assert_eq!(normalize_url("Example.com/Path"), "Example.com/Path");
    }

    #[test]
    fn test_normalize_url_borrows_when_already_lowercase() {
        let url = "http://example.com/CASE";
        assert!(matches!(normalize_url(url), Cow::Borrowed(_)));
    }
}
