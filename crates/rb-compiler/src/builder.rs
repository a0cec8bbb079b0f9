use serde::{Deserialize, Serialize};

use rb_core::hash::is_valid_digest;
use rb_core::types::{AccessLock, BlockRule, RedirectRule};

use crate::parser::PolicyDocument;

/// Output of one compilation. Persisted as a unit by the agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPolicy {
    pub block_rules: Vec<BlockRule>,
    pub redirect_rules: Vec<RedirectRule>,
    pub lock: AccessLock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub entries: usize,
    pub skipped: usize,
    pub block_rules: usize,
    pub redirect_rules: usize,
}

pub fn compile_policy(doc: &PolicyDocument) -> (CompiledPolicy, CompileStats) {
    let lock = compile_lock(doc);

    let default_declared = doc.default_redirect.declared;
    let mut block_rules = Vec::new();
    let mut redirect_rules = Vec::new();
    let mut skipped = 0usize;

    for (index, entry) in doc.entries.iter().enumerate() {
        let Some(pattern) = entry.pattern.as_ref() else {
            log::debug!("Skipping policy entry {index}: no url pattern");
            skipped += 1;
            continue;
        };

        if entry.redirect.declared || default_declared {
            redirect_rules.push(RedirectRule {
                pattern: pattern.clone(),
                own: entry.redirect.spec.clone(),
                fallback: doc.default_redirect.spec.clone(),
            });
        } else {
            let id = block_rules.len() as u32 + 1;
            block_rules.push(BlockRule::new(id, pattern.clone()));
        }
    }

    let stats = CompileStats {
        entries: doc.entries.len(),
        skipped,
        block_rules: block_rules.len(),
        redirect_rules: redirect_rules.len(),
    };

    let policy = CompiledPolicy {
        block_rules,
        redirect_rules,
        lock,
    };

    (policy, stats)
}

fn compile_lock(doc: &PolicyDocument) -> AccessLock {
    if !doc.lock {
        return AccessLock::unlocked();
    }
    match doc.authn_hash.as_deref() {
        Some(digest) if is_valid_digest(digest) => AccessLock::locked(digest),
        _ => {
            log::warn!("Lock requested but authn is not a SHA-256 hex digest; lock disabled");
            AccessLock::unlocked()
        }
    }
}

#[cfg(test)]
mod tests {
    use rb_core::hash::sha256_hex;
    use rb_core::types::{LockStatus, RedirectSpec};

    use crate::parser::{parse_policy, PolicyEntry, RedirectFields};

    use super::*;

    fn entry(pattern: &str) -> PolicyEntry {
        PolicyEntry {
            pattern: Some(pattern.to_string()),
            redirect: RedirectFields::default(),
        }
    }

    #[test]
    fn compiles_scenario_document() {
        let text = format!(
            r#"
lock: true
authn: "{}"
urls:
  - url: "*.ads.example/*"
  - url: "*.news.example/*"
    html: "<p>blocked</p>"
"#,
            "a".repeat(64)
        );
        let doc = parse_policy(&text).expect("parse");
        let (policy, stats) = compile_policy(&doc);

        assert_eq!(policy.block_rules, vec![BlockRule::new(1, "*.ads.example/*")]);
        assert_eq!(policy.redirect_rules.len(), 1);
        assert_eq!(policy.redirect_rules[0].pattern, "*.news.example/*");
        assert_eq!(
            policy.redirect_rules[0].own.inline_html.as_deref(),
            Some("<p>blocked</p>")
        );
        assert_eq!(policy.lock.status, LockStatus::Locked);
        assert_eq!(policy.lock.digest_hex, Some("a".repeat(64)));
        assert_eq!(stats.block_rules, 1);
        assert_eq!(stats.redirect_rules, 1);
    }

    #[test]
    fn plain_entry_without_default_is_block() {
        let doc = PolicyDocument {
            entries: vec![entry("https://a.example/*")],
            ..Default::default()
        };
        let (policy, _) = compile_policy(&doc);
        assert_eq!(policy.block_rules.len(), 1);
        assert!(policy.redirect_rules.is_empty());
    }

    #[test]
    fn plain_entry_with_default_is_redirect() {
        let doc = PolicyDocument {
            default_redirect: RedirectFields::from_spec(RedirectSpec {
                inline_html: None,
                remote_html_url: Some("https://blocked.example/".to_string()),
            }),
            entries: vec![entry("https://a.example/*")],
            ..Default::default()
        };
        let (policy, _) = compile_policy(&doc);
        assert!(policy.block_rules.is_empty());
        assert_eq!(policy.redirect_rules.len(), 1);
        assert_eq!(policy.redirect_rules[0].fallback, doc.default_redirect.spec);
    }

    #[test]
    fn null_default_still_makes_redirects() {
        let doc = parse_policy("global:\n  html:\nurls:\n  - url: \"https://a.example/*\"\n")
            .expect("parse");
        let (policy, stats) = compile_policy(&doc);
        assert!(policy.block_rules.is_empty());
        assert_eq!(stats.redirect_rules, 1);
        assert_eq!(policy.redirect_rules[0].fallback, RedirectSpec::default());
    }

    #[test]
    fn block_ids_are_continuous_and_ordered() {
        let doc = parse_policy(
            r#"
urls:
  - url: "a"
  - url: "r1"
    htmlsrc: "https://x.example/"
  - {}
  - url: "b"
  - url: "r2"
    html: ""
  - url: "c"
"#,
        )
        .expect("parse");
        let (policy, stats) = compile_policy(&doc);

        assert_eq!(
            policy.block_rules,
            vec![BlockRule::new(1, "a"), BlockRule::new(2, "b"), BlockRule::new(3, "c")]
        );
        let redirects: Vec<_> = policy.redirect_rules.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(redirects, vec!["r1", "r2"]);
        assert_eq!(stats.entries, 6);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn lock_requires_valid_digest() {
        let mut doc = PolicyDocument {
            lock: true,
            authn_hash: Some("not-a-digest".to_string()),
            ..Default::default()
        };
        assert_eq!(compile_policy(&doc).0.lock, AccessLock::unlocked());

        doc.authn_hash = None;
        assert_eq!(compile_policy(&doc).0.lock, AccessLock::unlocked());

        let digest = sha256_hex(b"secret").to_ascii_uppercase();
        doc.authn_hash = Some(digest.clone());
        assert_eq!(compile_policy(&doc).0.lock, AccessLock::locked(digest));
    }

    #[test]
    fn digest_without_lock_flag_is_ignored() {
        let doc = PolicyDocument {
            lock: false,
            authn_hash: Some(sha256_hex(b"secret")),
            ..Default::default()
        };
        assert_eq!(compile_policy(&doc).0.lock, AccessLock::unlocked());
    }
}
