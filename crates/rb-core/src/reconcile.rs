//! Block rule reconciliation
//!
//! The filtering engine holds the block rules of the last applied generation.
//! A new generation replaces it completely: after applying the diff the engine
//! holds exactly the new rules, with no stale ids left behind and no id added
//! twice. Rules that are already installed with the same id and pattern are
//! left alone, so reconciling an unchanged set is a no-op.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::BlockRule;

/// Instructions for the filtering engine. Must be applied as one update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDiff {
    pub remove_ids: BTreeSet<u32>,
    pub add_rules: Vec<BlockRule>,
}

impl RuleDiff {
    /// Diff that removes everything installed. Used when the policy source is
    /// unreachable or broken.
    pub fn clear(installed: &[BlockRule]) -> Self {
        reconcile(installed, &[])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remove_ids.is_empty() && self.add_rules.is_empty()
    }

    /// The rule set an engine holding `installed` ends up with.
    pub fn apply(&self, installed: &[BlockRule]) -> Vec<BlockRule> {
        let mut by_id: BTreeMap<u32, BlockRule> = installed
            .iter()
            .filter(|rule| !self.remove_ids.contains(&rule.id))
            .map(|rule| (rule.id, rule.clone()))
            .collect();
        for rule in &self.add_rules {
            by_id.insert(rule.id, rule.clone());
        }
        by_id.into_values().collect()
    }
}

/// Compute the diff taking `installed` to `new_rules`.
pub fn reconcile(installed: &[BlockRule], new_rules: &[BlockRule]) -> RuleDiff {
    let wanted: BTreeMap<u32, &str> = new_rules
        .iter()
        .map(|rule| (rule.id, rule.pattern.as_str()))
        .collect();

    let mut remove_ids = BTreeSet::new();
    let mut kept = BTreeSet::new();
    for rule in installed {
        if wanted.get(&rule.id) == Some(&rule.pattern.as_str()) && kept.insert(rule.id) {
            continue;
        }
        remove_ids.insert(rule.id);
    }
    // an id removed for any reason must be re-added if it is still wanted
    kept.retain(|id| !remove_ids.contains(id));

    let add_rules = new_rules
        .iter()
        .filter(|rule| !kept.contains(&rule.id))
        .cloned()
        .collect();

    RuleDiff {
        remove_ids,
        add_rules,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(patterns: &[&str]) -> Vec<BlockRule> {
        patterns
            .iter()
            .enumerate()
            .map(|(i, p)| BlockRule::new(i as u32 + 1, *p))
            .collect()
    }

    #[test]
    fn test_fresh_install() {
        let new_rules = rules(&["*.ads.example/*", "*.track.example/*"]);
        let diff = reconcile(&[], &new_rules);
        assert!(diff.remove_ids.is_empty());
        assert_eq!(diff.add_rules, new_rules);
        assert_eq!(diff.apply(&[]), new_rules);
    }

    #[test]
    fn test_idempotent() {
        let installed = rules(&["a", "b"]);
        let new_rules = rules(&["a", "c", "d"]);
        let diff = reconcile(&installed, &new_rules);
        let active = diff.apply(&installed);
        assert_eq!(active, new_rules);
        assert!(reconcile(&active, &new_rules).is_empty());
    }

    #[test]
    fn test_changed_pattern_same_id_is_replaced() {
        let installed = rules(&["a", "b"]);
        let new_rules = rules(&["a", "changed"]);
        let diff = reconcile(&installed, &new_rules);
        assert_eq!(diff.remove_ids, BTreeSet::from([2]));
        assert_eq!(diff.add_rules, vec![BlockRule::new(2, "changed")]);
        assert_eq!(diff.apply(&installed), new_rules);
    }

    #[test]
    fn test_stale_ids_removed() {
        let installed = rules(&["a", "b", "c"]);
        let new_rules = rules(&["a"]);
        let diff = reconcile(&installed, &new_rules);
        assert_eq!(diff.remove_ids, BTreeSet::from([2, 3]));
        assert!(diff.add_rules.is_empty());
    }

    #[test]
    fn test_clear_empties_engine() {
        let installed = rules(&["a", "b"]);
        let diff = RuleDiff::clear(&installed);
        assert_eq!(diff.remove_ids, BTreeSet::from([1, 2]));
        assert!(diff.apply(&installed).is_empty());
    }

    #[test]
    fn test_duplicate_installed_ids_are_cleaned() {
        let installed = vec![BlockRule::new(1, "a"), BlockRule::new(1, "a")];
        let new_rules = rules(&["a"]);
        let diff = reconcile(&installed, &new_rules);
        assert_eq!(diff.remove_ids, BTreeSet::from([1]));
        assert_eq!(diff.add_rules, new_rules);
        assert_eq!(diff.apply(&installed), new_rules);
    }
}
