//! JSON snapshots of a card collection.
//!
//! Export is the wire form of every card in collection order. Import runs the
//! full schema validator, then the business rules, and either yields a whole
//! new collection or fails without partial results.

use core_model::{CardCollection, SchemaError, validate_collection};
use core_rules::{RulePolicy, RuleReport, RuleValidator, RuleViolation};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("snapshot is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("snapshot failed schema validation at {0}")]
    Schema(#[from] SchemaError),
    #[error("snapshot rejected by {} blocking rule violation(s)", .0.len())]
    Rules(Vec<RuleViolation>),
}

/// Outcome of a successful import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub cards_imported: usize,
    pub cards_replaced: usize,
    /// Violations found but not blocking under the active policy.
    pub advisories: Vec<RuleViolation>,
}

pub fn export_snapshot(cards: &CardCollection) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(cards)
}

/// Parse and validate a snapshot, returning the collection together with its
/// rule report. Fails if any violation blocks under `policy`.
pub fn parse_snapshot(
    data: &str,
    policy: &RulePolicy,
) -> Result<(CardCollection, RuleReport), ImportError> {
    let value: serde_json::Value = serde_json::from_str(data).inspect_err(|e| {
        warn!(target: "state.snapshot", error = %e, "snapshot_parse_failed");
    })?;
    let cards = validate_collection(&value).inspect_err(|e| {
        warn!(target: "state.snapshot", error = %e, "snapshot_schema_rejected");
    })?;
    let report = RuleValidator::new(&cards).validate_collection();
    let blocking: Vec<RuleViolation> = report.blocking(policy).into_iter().cloned().collect();
    if !blocking.is_empty() {
        warn!(target: "state.snapshot", blocking = blocking.len(), "snapshot_rules_rejected");
        return Err(ImportError::Rules(blocking));
    }
    debug!(
        target: "state.snapshot",
        cards = cards.len(),
        violations = report.len(),
        "snapshot_parsed"
    );
    Ok((cards, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{Card, CardType};
    use serde_json::json;

    #[test]
    fn export_uses_wire_field_names() {
        let cards = CardCollection::new(vec![
            Card::new("a", CardType::Function, "run").with_dependencies(["b"]),
        ])
        .unwrap();
        let text = export_snapshot(&cards).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["type"], "function");
        assert_eq!(value[0]["isCustomCard"], false);
        assert_eq!(value[0]["markType"], "auto");
        assert_eq!(value[0]["dependencies"], json!(["b"]));
        assert!(text.contains('\n'));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_snapshot("[{", &RulePolicy::advisory()).unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }

    #[test]
    fn schema_error_carries_path() {
        let data = json!([{ "id": "a", "type": "widget" }]).to_string();
        match parse_snapshot(&data, &RulePolicy::advisory()).unwrap_err() {
            ImportError::Schema(e) => assert_eq!(e.path, "[0].type"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn policy_decides_whether_violations_block() {
        let cards = CardCollection::new(vec![
            Card::new("a", CardType::Function, "run").with_dependencies(["missing"]),
        ])
        .unwrap();
        let data = export_snapshot(&cards).unwrap();

        let (_, report) = parse_snapshot(&data, &RulePolicy::advisory()).unwrap();
        assert_eq!(report.errors().count(), 1);

        let strict = RulePolicy {
            enforce_references: true,
            ..RulePolicy::default()
        };
        match parse_snapshot(&data, &strict).unwrap_err() {
            ImportError::Rules(v) => assert!(v[0].is_missing_dependency()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
