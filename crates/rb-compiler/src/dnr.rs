//! Declarative rule export
//!
//! Block rules are enforced by the browser's declarative request filter. This
//! module renders them in that engine's rule format.

use serde::Serialize;

use rb_core::reconcile::RuleDiff;
use rb_core::types::BlockRule;

/// Resource types every block rule applies to.
pub const BLOCKED_RESOURCE_TYPES: [&str; 8] = [
    "main_frame",
    "sub_frame",
    "script",
    "xmlhttprequest",
    "image",
    "stylesheet",
    "object",
    "other",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnrRule {
    pub id: u32,
    pub priority: u32,
    pub action: DnrAction,
    pub condition: DnrCondition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnrAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnrCondition {
    pub url_filter: String,
    pub resource_types: Vec<&'static str>,
}

/// An `updateDynamicRules` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnrUpdate {
    pub remove_rule_ids: Vec<u32>,
    pub add_rules: Vec<DnrRule>,
}

impl From<&BlockRule> for DnrRule {
    fn from(rule: &BlockRule) -> Self {
        Self {
            id: rule.id,
            priority: 1,
            action: DnrAction { kind: "block" },
            condition: DnrCondition {
                url_filter: rule.pattern.clone(),
                resource_types: BLOCKED_RESOURCE_TYPES.to_vec(),
            },
        }
    }
}

impl From<&RuleDiff> for DnrUpdate {
    fn from(diff: &RuleDiff) -> Self {
        Self {
            remove_rule_ids: diff.remove_ids.iter().copied().collect(),
            add_rules: to_dnr_rules(&diff.add_rules),
        }
    }
}

pub fn to_dnr_rules(rules: &[BlockRule]) -> Vec<DnrRule> {
    rules.iter().map(DnrRule::from).collect()
}

#[cfg(test)]
mod tests {
    use rb_core::reconcile::reconcile;
    use serde_json::json;

    use super::*;

    #[test]
    fn renders_block_rule() {
        let rules = to_dnr_rules(&[BlockRule::new(1, "*.ads.example/*")]);
        let value = serde_json::to_value(&rules).expect("serialize");
        assert_eq!(
            value,
            json!([{
                "id": 1,
                "priority": 1,
                "action": {"type": "block"},
                "condition": {
                    "urlFilter": "*.ads.example/*",
                    "resourceTypes": [
                        "main_frame", "sub_frame", "script", "xmlhttprequest",
                        "image", "stylesheet", "object", "other"
                    ]
                }
            }])
        );
    }

    #[test]
    fn renders_update_payload() {
        let installed = vec![BlockRule::new(1, "a"), BlockRule::new(2, "b")];
        let diff = reconcile(&installed, &[BlockRule::new(1, "a")]);
        let update = DnrUpdate::from(&diff);
        let value = serde_json::to_value(&update).expect("serialize");
        assert_eq!(value["removeRuleIds"], json!([2]));
        assert_eq!(value["addRules"], json!([]));
    }
}
