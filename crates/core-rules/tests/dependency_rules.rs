//! Collection-level rule checks: dangling references, cycles, and parity
//! between the per-card and shared-traversal paths.

use core_model::{Card, CardCollection, CardType, validate_collection};
use core_rules::{RuleValidator, RuleViolation, Severity};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

fn card(id: &str, deps: &[&str]) -> Card {
    Card::new(id, CardType::Function, id).with_dependencies(deps.iter().copied())
}

#[test]
fn three_card_cycle_reported_for_a() {
    let cards =
        CardCollection::new(vec![card("A", &["B"]), card("B", &["C"]), card("C", &["A"])]).unwrap();
    let v = RuleValidator::new(&cards);
    let errs = v.validate_dependencies(&cards.as_slice()[0]);
    assert_eq!(
        errs,
        vec![RuleViolation::Cycle {
            card_id: "A".into()
        }]
    );
    assert_eq!(errs[0].severity(), Severity::Error);
}

#[test]
fn chain_reports_no_cycle_for_any_card() {
    let cards =
        CardCollection::new(vec![card("A", &["B"]), card("B", &["C"]), card("C", &[])]).unwrap();
    let v = RuleValidator::new(&cards);
    for c in cards.iter() {
        assert!(v.validate_dependencies(c).iter().all(|e| !e.is_cycle()));
    }
    assert!(v.validate_collection().cyclic_card_ids().is_empty());
}

#[test]
fn load_user_missing_set_user() {
    let value = json!([
        {
            "id": "loadUser", "type": "function", "name": "loadUser",
            "code": "async function loadUser(id) { setUser(await api.get(id)); }",
            "startLine": 1, "endLine": 3, "status": "warning",
            "expanded": false, "editable": true,
            "dependencies": ["setUser", "api"], "dependents": [],
            "description": "Loads a user", "isCustomCard": false, "markType": "auto"
        },
        {
            "id": "api", "type": "state", "name": "api",
            "code": "const api = createClient();",
            "startLine": 5, "endLine": 5, "status": "success",
            "expanded": false, "editable": true,
            "dependencies": [], "dependents": ["loadUser"],
            "description": "", "isCustomCard": false, "markType": "auto"
        },
        {
            "id": "render", "type": "component", "name": "UserView",
            "code": "return <div>{user.name}</div>;",
            "startLine": 7, "endLine": 9, "status": "success",
            "expanded": true, "editable": true,
            "dependencies": [], "dependents": [],
            "description": "", "isCustomCard": false, "markType": "hash"
        }
    ]);
    let cards = validate_collection(&value).unwrap();
    let v = RuleValidator::new(&cards);
    let errs = v.validate_dependencies(cards.get("loadUser").unwrap());
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs[0],
        RuleViolation::MissingDependency {
            card_id: "loadUser".into(),
            missing: "setUser".into()
        }
    );

    let report = v.validate_collection();
    assert_eq!(report.errors().count(), 1);
    assert!(report.cyclic_card_ids().is_empty());
}

#[test]
fn collection_report_collects_every_kind_without_short_circuit() {
    let cards = CardCollection::new(vec![
        Card::new("x", CardType::Custom, "bad-name")
            .with_code("if (a { }")
            .with_dependencies(["nowhere", "y"]),
        card("y", &["x"]),
    ])
    .unwrap();
    let report = RuleValidator::new(&cards).validate_collection();
    let x: Vec<&RuleViolation> = report.for_card("x").collect();
    assert!(matches!(x[0], RuleViolation::InvalidName { .. }));
    assert!(matches!(x[1], RuleViolation::Integrity { .. }));
    assert!(matches!(
        x[2],
        RuleViolation::MissingDependency { missing, .. } if missing == "nowhere"
    ));
    assert!(x[3].is_cycle());
    assert!(report.for_card("y").any(|v| v.is_cycle()));
}

fn arbitrary_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..9).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0..n + 2, 0..4), n)
    })
}

proptest! {
    // The shared pass must agree with a fresh traversal per card.
    #[test]
    fn collection_pass_matches_per_card(graph in arbitrary_graph()) {
        // Targets >= n are dangling ids.
        let cards: Vec<Card> = graph
            .iter()
            .enumerate()
            .map(|(i, deps)| {
                Card::new(format!("c{i}"), CardType::Function, format!("c{i}"))
                    .with_dependencies(deps.iter().map(|d| format!("c{d}")))
            })
            .collect();
        let cards = CardCollection::new(cards).unwrap();
        let v = RuleValidator::new(&cards);
        let report = v.validate_collection();
        for c in cards.iter() {
            let per_card = v.validate_card(c);
            let shared: Vec<RuleViolation> = report.for_card(&c.id).cloned().collect();
            prop_assert_eq!(per_card, shared);
        }
    }
}
