//! Filtering engine seam.
//!
//! The engine is the only sink for block enforcement. It reports what it has
//! installed and applies a [`RuleDiff`] as a single update: a rejected diff
//! leaves the installed set untouched.

use std::collections::BTreeSet;
use std::sync::RwLock;

use rb_core::matcher::WildcardPattern;
use rb_core::reconcile::RuleDiff;
use rb_core::types::BlockRule;

use crate::error::EngineError;

#[async_trait::async_trait]
pub trait FilterEngine: Send + Sync {
    async fn active_rules(&self) -> Result<Vec<BlockRule>, EngineError>;
    async fn apply_diff(&self, diff: &RuleDiff) -> Result<(), EngineError>;
}

// =============================================================================
// Memory Engine
// =============================================================================

#[derive(Debug, Default)]
struct Installed {
    rules: Vec<BlockRule>,
    patterns: Vec<Option<WildcardPattern>>,
}

/// In-process engine. Evaluates block patterns with the same wildcard syntax
/// as redirect patterns.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    installed: RwLock<Installed>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> Vec<BlockRule> {
        match self.installed.read() {
            Ok(installed) => installed.rules.clone(),
            Err(poisoned) => poisoned.into_inner().rules.clone(),
        }
    }

    /// The first installed rule blocking `url`.
    pub fn blocking_rule(&self, url: &str) -> Option<BlockRule> {
        let installed = match self.installed.read() {
            Ok(installed) => installed,
            Err(poisoned) => poisoned.into_inner(),
        };
        installed
            .rules
            .iter()
            .zip(&installed.patterns)
            .find(|(_, pattern)| pattern.as_ref().map_or(false, |p| p.test(url)))
            .map(|(rule, _)| rule.clone())
    }
}

#[async_trait::async_trait]
impl FilterEngine for MemoryEngine {
    async fn active_rules(&self) -> Result<Vec<BlockRule>, EngineError> {
        Ok(self.rules())
    }

    async fn apply_diff(&self, diff: &RuleDiff) -> Result<(), EngineError> {
        let mut installed = self
            .installed
            .write()
            .map_err(|_| EngineError::Rejected("engine state poisoned".to_string()))?;

        let next = diff.apply(&installed.rules);

        // apply() keys by id, so a duplicate only shows up as a size mismatch
        let kept = installed
            .rules
            .iter()
            .filter(|rule| !diff.remove_ids.contains(&rule.id))
            .count();
        if next.len() != kept + diff.add_rules.len() {
            let mut seen = BTreeSet::new();
            let duplicate = installed
                .rules
                .iter()
                .filter(|rule| !diff.remove_ids.contains(&rule.id))
                .chain(&diff.add_rules)
                .find(|rule| !seen.insert(rule.id))
                .map(|rule| rule.id)
                .unwrap_or_default();
            return Err(EngineError::Rejected(format!("duplicate rule id {duplicate}")));
        }

        let patterns = next
            .iter()
            .map(|rule| match WildcardPattern::compile(&rule.pattern) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    log::warn!("Block rule {} cannot be evaluated: {e}", rule.id);
                    None
                }
            })
            .collect();

        *installed = Installed {
            rules: next,
            patterns,
        };
        Ok(())
    }
}
