//! Pattern Matching
//!
//! Policy patterns use a single wildcard glyph: `*` matches any run of
//! characters, everything else is literal. A pattern must match the whole URL,
//! and matching is case-sensitive.

use regex_lite::Regex;

use crate::types::RedirectRule;

/// Longest pattern accepted, in bytes.
pub const MAX_PATTERN_LEN: usize = 8 * 1024;

/// Error type for pattern compilation.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Pattern of {len} bytes exceeds the {max} byte limit")]
    TooLong { len: usize, max: usize },
    #[error("Invalid pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}

// =============================================================================
// Wildcard Pattern
// =============================================================================

/// A compiled, fully anchored wildcard pattern.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    /// Compile a wildcard pattern.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(PatternError::TooLong {
                len: pattern.len(),
                max: MAX_PATTERN_LEN,
            });
        }
        let regex = Regex::new(&to_anchored_regex(pattern)).map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Does `url` match the pattern from start to end?
    #[inline]
    pub fn test(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The pattern as written in the policy.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Translate a wildcard pattern into an anchored regex source.
///
/// Literal runs are escaped before `*` becomes `.*`, so a `*` can never be
/// confused with an escaped metacharacter.
pub fn to_anchored_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("^(?:");
    for (i, literal) in pattern.split('*').enumerate() {
        if i > 0 {
            out.push_str(".*");
        }
        out.push_str(&regex_lite::escape(literal));
    }
    out.push_str(")$");
    out
}

// =============================================================================
// Redirect Matcher
// =============================================================================

/// Redirect rules with their compiled patterns, in policy order.
#[derive(Debug, Clone, Default)]
pub struct RedirectMatcher {
    entries: Vec<(WildcardPattern, RedirectRule)>,
}

impl RedirectMatcher {
    /// Compile every rule's pattern. Rules whose pattern does not compile are
    /// logged and left out; the rest keep their relative order.
    pub fn new(rules: &[RedirectRule]) -> Self {
        let mut entries = Vec::with_capacity(rules.len());
        for rule in rules {
            match WildcardPattern::compile(&rule.pattern) {
                Ok(pattern) => entries.push((pattern, rule.clone())),
                Err(e) => log::warn!("Skipping redirect rule: {e}"),
            }
        }
        Self { entries }
    }

    /// Every rule matching `url`, in policy order.
    ///
    /// Lazy, so callers that stop at the first usable rule never test the rest.
    pub fn matches<'a, 'u>(&'a self, url: &'u str) -> impl Iterator<Item = &'a RedirectRule> + 'u
    where
        'a: 'u,
    {
        self.entries
            .iter()
            .filter(move |(pattern, _)| pattern.test(url))
            .map(|(_, rule)| rule)
    }

    /// The first rule matching `url`.
    pub fn first_match(&self, url: &str) -> Option<&RedirectRule> {
        self.matches(url).next()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RedirectSpec;

    fn rule(pattern: &str, html: &str) -> RedirectRule {
        RedirectRule {
            pattern: pattern.to_string(),
            own: RedirectSpec {
                inline_html: Some(html.to_string()),
                remote_html_url: None,
            },
            fallback: RedirectSpec::default(),
        }
    }

    #[test]
    fn test_literal_pattern_is_exact() {
        for p in ["https://example.com/", "a.b", "x+y?(z)|[w]{1}$^\\"] {
            let m = WildcardPattern::compile(p).expect("compile");
            assert!(m.test(p), "{p} should match itself");
            assert!(!m.test(&format!("{p}x")), "{p} should not match with suffix");
            assert!(!m.test(&format!("x{p}")), "{p} should not match with prefix");
        }
    }

    #[test]
    fn test_dot_is_literal() {
        let m = WildcardPattern::compile("a.b").expect("compile");
        assert!(!m.test("axb"));
    }

    #[test]
    fn test_wildcard_is_anchored() {
        let m = WildcardPattern::compile("https://example.com/*").expect("compile");
        assert!(m.test("https://example.com/a"));
        assert!(m.test("https://example.com/"));
        assert!(!m.test("https://evil.com/https://example.com/a"));
    }

    #[test]
    fn test_wildcard_needs_context() {
        let m = WildcardPattern::compile("*.example.com/*").expect("compile");
        assert!(m.test("https://www.example.com/page"));
        assert!(!m.test("example.com"));
    }

    #[test]
    fn test_wildcard_matches_empty() {
        let m = WildcardPattern::compile("a*b").expect("compile");
        assert!(m.test("ab"));
        assert!(m.test("a-anything-b"));
        assert!(!m.test("a-anything-bc"));
    }

    #[test]
    fn test_case_sensitive() {
        let m = WildcardPattern::compile("https://Example.com/*").expect("compile");
        assert!(m.test("https://Example.com/x"));
        assert!(!m.test("https://example.com/x"));
    }

    #[test]
    fn test_to_anchored_regex() {
        assert_eq!(to_anchored_regex("a*b"), "^(?:a.*b)$");
        assert_eq!(to_anchored_regex("a.b"), "^(?:a\\.b)$");
        assert_eq!(to_anchored_regex("*"), "^(?:.*)$");
    }

    #[test]
    fn test_redirect_matcher_order() {
        let rules = vec![
            rule("https://news.example/*", "first"),
            rule("https://*.example/*", "second"),
        ];
        let matcher = RedirectMatcher::new(&rules);
        assert_eq!(matcher.len(), 2);

        let hits: Vec<_> = matcher
            .matches("https://news.example/today")
            .map(|r| r.own.inline_html.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(hits, vec!["first", "second"]);

        let first = matcher.first_match("https://shop.example/cart").expect("match");
        assert_eq!(first.own.inline_html.as_deref(), Some("second"));
        assert!(matcher.first_match("https://other.test/").is_none());
    }

    #[test]
    fn test_overlong_pattern_is_rejected() {
        let long = "a*".repeat(MAX_PATTERN_LEN);
        assert!(matches!(
            WildcardPattern::compile(&long),
            Err(PatternError::TooLong { .. })
        ));
    }

    #[test]
    fn test_bad_pattern_skips_only_that_rule() {
        let rules = vec![
            rule("https://one.example/*", "one"),
            rule(&"a*".repeat(MAX_PATTERN_LEN), "broken"),
            rule("https://*", "two"),
        ];
        let matcher = RedirectMatcher::new(&rules);
        assert_eq!(matcher.len(), 2);

        let hits: Vec<_> = matcher
            .matches("https://one.example/x")
            .map(|r| r.own.inline_html.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(hits, vec!["one", "two"]);
        let second = matcher.first_match("https://two.example/x").expect("match");
        assert_eq!(second.own.inline_html.as_deref(), Some("two"));
        assert!(matcher.first_match("aaaa").is_none());
    }

    #[test]
    fn test_matches_outlive_the_url() {
        let matcher = RedirectMatcher::new(&[rule("*", "any")]);
        let found = {
            let url = String::from("https://scoped.example/");
            matcher.first_match(&url)
        };
        assert_eq!(found.map(|r| r.pattern.as_str()), Some("*"));
    }
}
