use serde_yaml::{Mapping, Value};

use rb_core::types::RedirectSpec;

/// Error type for policy parsing. Every variant is treated the same upstream.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Policy content is not a valid object.")]
    NotAnObject,
}

/// A parsed policy document.
///
/// Parsing is lenient below the top level: fields with the wrong type are
/// treated as absent, and entries without a string `url` are kept as
/// `pattern: None` so the compiler can count and skip them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    pub lock: bool,
    pub authn_hash: Option<String>,
    pub default_redirect: RedirectFields,
    pub entries: Vec<PolicyEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyEntry {
    pub pattern: Option<String>,
    pub redirect: RedirectFields,
}

/// The redirect keys of one mapping.
///
/// `declared` records whether `html` or `htmlsrc` is present at all, whatever
/// its value; it decides block vs redirect. `spec` keeps only string values
/// and is what resolution later works from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectFields {
    pub declared: bool,
    pub spec: RedirectSpec,
}

impl RedirectFields {
    pub fn from_spec(spec: RedirectSpec) -> Self {
        let declared = spec.inline_html.is_some() || spec.remote_html_url.is_some();
        Self { declared, spec }
    }
}

pub fn parse_policy(text: &str) -> Result<PolicyDocument, ParseError> {
    let value: Value = serde_yaml::from_str(text)?;
    let root = match value {
        Value::Mapping(map) => map,
        _ => return Err(ParseError::NotAnObject),
    };

    let lock = matches!(root.get("lock"), Some(Value::Bool(true)));
    let authn_hash = get_string(&root, "authn");

    let default_redirect = match root.get("global") {
        Some(Value::Mapping(global)) => parse_redirect_spec(global),
        _ => RedirectFields::default(),
    };

    let entries = match root.get("urls") {
        Some(Value::Sequence(items)) => items.iter().map(parse_entry).collect(),
        _ => Vec::new(),
    };

    Ok(PolicyDocument {
        lock,
        authn_hash,
        default_redirect,
        entries,
    })
}

fn parse_entry(item: &Value) -> PolicyEntry {
    match item {
        Value::Mapping(map) => PolicyEntry {
            pattern: get_string(map, "url"),
            redirect: parse_redirect_spec(map),
        },
        _ => PolicyEntry::default(),
    }
}

fn parse_redirect_spec(map: &Mapping) -> RedirectFields {
    RedirectFields {
        declared: map.contains_key("html") || map.contains_key("htmlsrc"),
        spec: RedirectSpec {
            inline_html: get_string(map, "html"),
            remote_html_url: get_string(map, "htmlsrc"),
        },
    }
}

fn get_string(map: &Mapping, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_document() {
        let doc = parse_policy(
            r#"
lock: true
authn: "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
global:
  html: "<p>nope</p>"
  htmlsrc: "https://blocked.example/"
urls:
  - url: "*.ads.example/*"
  - url: "*.news.example/*"
    html: "<p>blocked</p>"
"#,
        )
        .expect("parse");

        assert!(doc.lock);
        assert_eq!(doc.authn_hash.as_deref().map(str::len), Some(64));
        let global = &doc.default_redirect;
        assert!(global.declared);
        assert_eq!(global.spec.inline_html.as_deref(), Some("<p>nope</p>"));
        assert_eq!(global.spec.remote_html_url.as_deref(), Some("https://blocked.example/"));
        assert_eq!(doc.entries.len(), 2);
        assert_eq!(doc.entries[0].pattern.as_deref(), Some("*.ads.example/*"));
        assert!(!doc.entries[0].redirect.declared);
        assert_eq!(
            doc.entries[1].redirect.spec.inline_html.as_deref(),
            Some("<p>blocked</p>")
        );
    }

    #[test]
    fn accepts_json() {
        let doc = parse_policy(r#"{"urls": [{"url": "https://a.example/*"}]}"#).expect("parse");
        assert_eq!(doc.entries.len(), 1);
        assert!(!doc.lock);
    }

    #[test]
    fn rejects_non_object() {
        assert!(matches!(parse_policy("- a\n- b"), Err(ParseError::NotAnObject)));
        assert!(matches!(parse_policy("just a string"), Err(ParseError::NotAnObject)));
        assert!(parse_policy("").is_err());
    }

    #[test]
    fn rejects_invalid_yaml() {
        assert!(matches!(parse_policy("urls: [unclosed"), Err(ParseError::Yaml(_))));
    }

    #[test]
    fn lenient_fields() {
        let doc = parse_policy(
            r#"
lock: "yes"
authn: 12
global: "not a map"
urls:
  - url: 42
  - "bare string"
  - url: "ok"
    html: 7
"#,
        )
        .expect("parse");
        assert!(!doc.lock);
        assert_eq!(doc.authn_hash, None);
        assert_eq!(doc.default_redirect, RedirectFields::default());
        assert_eq!(doc.entries.len(), 3);
        assert_eq!(doc.entries[0].pattern, None);
        assert_eq!(doc.entries[1].pattern, None);
        assert_eq!(doc.entries[2].pattern.as_deref(), Some("ok"));
    }

    #[test]
    fn redirect_keys_count_whatever_their_value() {
        let doc = parse_policy(
            r#"
global:
  html:
urls:
  - url: "a"
    htmlsrc: 7
  - url: "b"
    other: "x"
"#,
        )
        .expect("parse");
        assert!(doc.default_redirect.declared);
        assert_eq!(doc.default_redirect.spec, RedirectSpec::default());

        assert!(doc.entries[0].redirect.declared);
        assert_eq!(doc.entries[0].redirect.spec.remote_html_url, None);
        assert!(!doc.entries[1].redirect.declared);
    }

    #[test]
    fn urls_not_a_list() {
        let doc = parse_policy("urls: nope").expect("parse");
        assert!(doc.entries.is_empty());
    }
}
