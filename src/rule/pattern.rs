//! Filter-list pattern compilation.
//!
//! Translates one EasyList-style pattern into a regular expression over
//! request URLs:
//!
//! - `*` matches any run of characters
//! - `^` matches a separator (anything but a letter, digit, `_`, `-`, `.`
//!   or `%`) or the end of the URL
//! - `||` anchors the pattern at a domain boundary (any subdomain matches)
//! - `|` at the start/end anchors the pattern at the URL start/end
//!
//! Everything else is matched literally. Host matching is case-insensitive
//! while path matching is case-sensitive: the host segment of a `||`
//! pattern is lowercased at translation time and [`normalize_url`]
//! lowercases the scheme and authority of the queried URL, leaving the
//! path untouched.
//!
//! [`normalize_url`]: super::normalize_url

use regex::Regex;

use crate::error::{Error, Result};

/// Separator: any character that cannot appear in a host or token,
/// or the end of the URL.
const SEPARATOR: &str = "(?:[^0-9A-Za-z_.%-]|$)";

/// Domain anchor: a scheme, `://`, and optionally any chain of subdomains.
const DOMAIN_ANCHOR: &str = r"^[a-z][a-z0-9+.-]*://(?:[^/?#]*\.)?";

/// A compiled filter-list pattern.
///
/// Cheap to clone and safe to match from many threads concurrently.
#[derive(Debug, Clone)]
pub struct RulePattern {
    regex: Regex,
}

impl RulePattern {
    /// Compile an effective (marker-stripped) pattern line.
    pub fn compile(pattern: &str) -> Result<Self> {
        let translated = translate(pattern);
        let regex = Regex::new(&translated).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    /// Check whether a URL matches this pattern.
    ///
    /// The URL is expected to be normalized via [`normalize_url`] so that
    /// host matching is case-insensitive.
    ///
    /// [`normalize_url`]: super::normalize_url
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The translated regular expression (for diagnostics).
    pub fn as_regex_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Translate a filter-list pattern into regex syntax.
fn translate(pattern: &str) -> String {
    let collapsed = collapse_wildcards(pattern);
    let mut body = collapsed.as_str();

    // A trailing "^|" is a separator followed by the end anchor; the
    // separator class already matches the end of the URL.
    if let Some(rest) = body.strip_suffix("^|") {
        body = &collapsed[..rest.len() + 1];
    }

    let domain_anchored = body.starts_with("||");
    let start_anchored = !domain_anchored && body.starts_with('|');
    if domain_anchored {
        body = &body[2..];
    } else if start_anchored {
        body = &body[1..];
    }

    let end_anchored = body.ends_with('|');
    if end_anchored {
        body = &body[..body.len() - 1];
    }

    // Unanchored leading/trailing wildcards are redundant.
    if !domain_anchored && !start_anchored {
        body = body.trim_start_matches('*');
    }
    if !end_anchored {
        body = body.trim_end_matches('*');
    }

    let mut out = String::with_capacity(body.len() * 2 + 32);
    if domain_anchored {
        out.push_str(DOMAIN_ANCHOR);
    } else if start_anchored {
        out.push('^');
    }

    // Host matching is case-insensitive: lowercase the host segment of a
    // domain-anchored pattern (up to the first non-host character).
    let host_len = if domain_anchored {
        body.find(|c: char| !c.is_ascii_alphanumeric() && c != '.' && c != '-')
            .unwrap_or(body.len())
    } else {
        0
    };

    for (idx, c) in body.char_indices() {
        match c {
            '*' => out.push_str(".*"),
            '^' => out.push_str(SEPARATOR),
            c if c.is_ascii_alphanumeric() => {
                if idx < host_len {
                    out.push(c.to_ascii_lowercase());
                } else {
                    out.push(c);
                }
            }
            // A bare < or > is already a literal; escaped they become
            // word-boundary assertions.
            '<' | '>' => out.push(c),
            c if c.is_ascii() => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }

    if end_anchored {
        out.push('$');
    }

    out
}

/// Collapse runs of `*` into a single wildcard.
fn collapse_wildcards(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut prev_star = false;
    for c in pattern.chars() {
        if c == '*' {
            if !prev_star {
                out.push(c);
            }
            prev_star = true;
        } else {
            out.push(c);
            prev_star = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_substring() {
        let pattern = RulePattern::compile("/banner/").unwrap();
        assert!(pattern.matches("http://example.com/banner/img.gif"));
        assert!(!pattern.matches("http://example.com/images/img.gif"));
    }

    #[test]
    fn test_wildcard() {
        let pattern = RulePattern::compile("*tracker*").unwrap();
        assert!(pattern.matches("http://x/tracker/y"));
        assert!(pattern.matches("http://tracker.net/"));
        assert!(!pattern.matches("http://example.com/"));
    }

    #[test]
    fn test_wildcard_in_the_middle() {
        let pattern = RulePattern::compile("/ads/*.js").unwrap();
        assert!(pattern.matches("http://cdn.example.com/ads/pop.js"));
        assert!(pattern.matches("http://cdn.example.com/ads/x/y.js"));
        assert!(!pattern.matches("http://cdn.example.com/ads/pop.css"));
    }

    #[test]
    fn test_domain_anchor() {
        let pattern = RulePattern::compile("||doubleclick.net^").unwrap();
        assert!(pattern.matches("http://doubleclick.net/ad"));
        assert!(pattern.matches("https://ads.doubleclick.net/ad"));
        assert!(pattern.matches("http://doubleclick.net"));
        // A domain anchor must not match inside another registrable domain.
        assert!(!pattern.matches("http://notdoubleclick.net/ad"));
        assert!(!pattern.matches("http://doubleclick.net.evil.org/"));
    }

    #[test]
    fn test_domain_anchor_with_path() {
        let pattern = RulePattern::compile("||doubleclick.net/safe^").unwrap();
        assert!(pattern.matches("http://doubleclick.net/safe"));
        assert!(pattern.matches("http://doubleclick.net/safe?x=1"));
        assert!(!pattern.matches("http://doubleclick.net/safety"));
    }

    #[test]
    fn test_start_and_end_anchors() {
        let pattern = RulePattern::compile("|http://ads.|").unwrap();
        assert!(pattern.matches("http://ads."));
        assert!(!pattern.matches("xhttp://ads."));
        assert!(!pattern.matches("http://ads.example.com"));
    }

    #[test]
    fn test_separator() {
        let pattern = RulePattern::compile("example.com^ad").unwrap();
        assert!(pattern.matches("http://example.com/ad"));
        assert!(pattern.matches("http://example.com:ad"));
        assert!(!pattern.matches("http://example.com-ad"));
        assert!(!pattern.matches("http://example.comxad"));
    }

    #[test]
    fn test_separator_matches_url_end() {
        let pattern = RulePattern::compile("||example.com^").unwrap();
        assert!(pattern.matches("http://example.com"));
    }

    #[test]
    fn test_trailing_separator_pipe() {
        // "^|" at the end means "separator, then end of URL"; the separator
        // class already covers the end of the input.
        let pattern = RulePattern::compile("||example.com^|").unwrap();
        assert!(pattern.matches("http://example.com"));
        assert!(pattern.matches("http://example.com/"));
    }

    #[test]
    fn test_host_case_insensitive_path_case_sensitive() {
        let pattern = RulePattern::compile("||Ads.Example.com/Banner").unwrap();
        // The host half of the pattern is lowercased at translation time;
        // queried URLs get their host lowercased by normalize_url.
        assert!(pattern.matches("http://ads.example.com/Banner"));
        assert!(!pattern.matches("http://ads.example.com/banner"));
    }

    #[test]
    fn test_regex_metachars_are_literal() {
        let pattern = RulePattern::compile("/ad?id=1&size=(300x250)").unwrap();
        assert!(pattern.matches("http://x.com/ad?id=1&size=(300x250)"));
        assert!(!pattern.matches("http://x.com/adxid=1"));
    }

    #[test]
    fn test_angle_brackets_are_literal() {
        let pattern = RulePattern::compile("/frame?src=<ad>").unwrap();
        assert!(pattern.matches("http://x.com/frame?src=<ad>"));
        assert!(!pattern.matches("http://x.com/frame?src=ad"));
    }

    #[test]
    fn test_collapse_wildcards() {
        assert_eq!(collapse_wildcards("a***b"), "a*b");
        assert_eq!(collapse_wildcards("**"), "*");
        assert_eq!(collapse_wildcards("plain"), "plain");
    }

    #[test]
    fn test_translate_strips_redundant_wildcards() {
        assert_eq!(translate("*ads*"), "ads");
        // Anchors keep their wildcards meaningful.
        assert_eq!(translate("|*ads"), "^.*ads");
    }

    #[test]
    fn test_translation_diagnostics() {
        let pattern = RulePattern::compile("||example.com^").unwrap();
        assert!(pattern.as_regex_str().starts_with('^'));
        assert!(pattern.as_regex_str().contains(r"example\.com"));
    }
}
