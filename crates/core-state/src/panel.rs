//! `CardPanel`: one card collection plus the panel state driving its view.

use std::cell::{Cell, RefCell};

use core_model::{Card, CardCollection, PanelConfig};
use core_query::{CardGroup, QueryParameters, group, query_indices};
use core_rules::{CardMetrics, DependencyIndex, RulePolicy, RuleReport, RuleValidator};
use core_text::{TextPosition, insert_text};
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::snapshot::{ImportError, ImportReport, export_snapshot, parse_snapshot};
use crate::{PanelAction, PanelState, reduce};

/// Cached view, valid while both the collection revision and the query
/// parameters are unchanged.
#[derive(Debug)]
struct ViewMemo {
    revision: u64,
    params: QueryParameters,
    indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("no card with id `{0}`")]
    UnknownCard(String),
    #[error("card `{0}` is not editable")]
    NotEditable(String),
}

#[derive(Debug)]
pub struct CardPanel {
    cards: CardCollection,
    state: PanelState,
    policy: RulePolicy,
    /// Bumped whenever `cards` changes.
    revision: u64,
    memo: RefCell<Option<ViewMemo>>,
    recomputations: Cell<usize>,
}

impl CardPanel {
    pub fn new(cards: CardCollection, config: &PanelConfig) -> Self {
        let mut state = PanelState::from_config(config);
        state.seed_expanded(&cards);
        Self::with_state(cards, state)
    }

    pub fn with_state(cards: CardCollection, state: PanelState) -> Self {
        Self {
            cards,
            state,
            policy: RulePolicy::advisory(),
            revision: 0,
            memo: RefCell::new(None),
            recomputations: Cell::new(0),
        }
    }

    pub fn with_policy(mut self, policy: RulePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cards(&self) -> &CardCollection {
        &self.cards
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    pub fn policy(&self) -> RulePolicy {
        self.policy
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn dispatch(&mut self, action: PanelAction) {
        trace!(target: "state.panel", ?action, "dispatch");
        self.state = reduce(&self.state, action);
    }

    /// Select `id`. Returns whether the id names a card in the collection.
    pub fn select_card(&mut self, id: &str) -> bool {
        self.dispatch(PanelAction::Select(id.to_string()));
        self.cards.contains(id)
    }

    pub fn toggle_card(&mut self, id: &str) {
        self.dispatch(PanelAction::ToggleExpand(id.to_string()));
    }

    pub fn expand_all(&mut self) {
        let ids = self.cards.ids().map(str::to_string).collect();
        self.dispatch(PanelAction::ExpandAll(ids));
    }

    pub fn collapse_all(&mut self) {
        self.dispatch(PanelAction::CollapseAll);
    }

    /// The selected card, if the selection names one in the collection.
    pub fn selected_card(&self) -> Option<&Card> {
        self.state
            .selected_card_id
            .as_deref()
            .and_then(|id| self.cards.get(id))
    }

    /// Cards to display under the current state. Recomputed only when the
    /// collection or the query parameters changed since the last call.
    pub fn visible_cards(&self) -> Vec<&Card> {
        let params = self.state.query_parameters();
        let mut memo = self.memo.borrow_mut();
        let fresh = memo
            .as_ref()
            .is_some_and(|m| m.revision == self.revision && m.params == params);
        if !fresh {
            let indices = query_indices(&self.cards, &params);
            self.recomputations.set(self.recomputations.get() + 1);
            trace!(
                target: "state.panel",
                revision = self.revision,
                visible = indices.len(),
                "view_recomputed"
            );
            *memo = Some(ViewMemo {
                revision: self.revision,
                params,
                indices,
            });
        }
        let slice = self.cards.as_slice();
        memo.as_ref()
            .map(|m| m.indices.iter().map(|&i| &slice[i]).collect())
            .unwrap_or_default()
    }

    /// Number of times the visible view was actually computed.
    pub fn view_recomputations(&self) -> usize {
        self.recomputations.get()
    }

    /// Visible cards partitioned by the current grouping. Collapsed groups
    /// are listed with no cards.
    pub fn visible_groups(&self) -> Vec<CardGroup<'_>> {
        let view = self.visible_cards();
        let mut groups = group(&view, self.state.group_by);
        for g in &mut groups {
            if self.state.collapsed_groups.contains(g.key) {
                g.cards.clear();
            }
        }
        groups
    }

    pub fn rule_report(&self) -> RuleReport {
        RuleValidator::new(&self.cards).validate_collection()
    }

    pub fn metrics(&self, id: &str) -> Option<CardMetrics> {
        DependencyIndex::new(&self.cards).metrics(id)
    }

    /// Replace the collection, keeping the panel state for ids that survive.
    pub fn replace_cards(&mut self, cards: CardCollection) -> usize {
        let replaced = self.cards.len();
        self.cards = cards;
        self.revision += 1;
        self.state.prune(&self.cards);
        self.state.seed_expanded(&self.cards);
        replaced
    }

    /// Splice `snippet` into a card's code at a 1-based position, or append
    /// it when `at` is `None`. Lines count from the card's first code line,
    /// not from `start_line`. Out-of-range positions clamp.
    pub fn insert_code(
        &mut self,
        id: &str,
        snippet: &str,
        at: Option<TextPosition>,
    ) -> Result<(), EditError> {
        let card = self
            .cards
            .get(id)
            .ok_or_else(|| EditError::UnknownCard(id.to_string()))?;
        if !card.editable {
            return Err(EditError::NotEditable(id.to_string()));
        }
        let code = insert_text(&card.code, snippet, at);
        self.cards.replace_code(id, code);
        self.revision += 1;
        debug!(
            target: "state.panel",
            id,
            inserted = snippet.len(),
            revision = self.revision,
            "code_inserted"
        );
        Ok(())
    }

    pub fn export_cards(&self) -> Result<String, serde_json::Error> {
        export_snapshot(&self.cards)
    }

    /// Replace the collection with a validated snapshot. On any error the
    /// panel is left exactly as it was.
    pub fn import_cards(&mut self, data: &str) -> Result<ImportReport, ImportError> {
        let (cards, report) = parse_snapshot(data, &self.policy)?;
        let cards_imported = cards.len();
        let cards_replaced = self.replace_cards(cards);
        info!(
            target: "state.panel",
            imported = cards_imported,
            replaced = cards_replaced,
            advisories = report.len(),
            revision = self.revision,
            "cards_imported"
        );
        Ok(ImportReport {
            cards_imported,
            cards_replaced,
            advisories: report.violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{CardType, SortDirection, SortKey};
    use pretty_assertions::assert_eq;

    fn panel() -> CardPanel {
        let cards = CardCollection::new(vec![
            Card::new("a", CardType::Function, "alpha").with_order(2),
            Card::new("b", CardType::State, "beta").with_order(1),
            Card::new("c", CardType::Function, "gamma").with_order(3),
        ])
        .unwrap();
        CardPanel::new(cards, &PanelConfig::default())
    }

    fn ids(view: &[&Card]) -> Vec<String> {
        view.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn select_unknown_id_yields_no_card() {
        let mut p = panel();
        assert!(p.select_card("b"));
        assert_eq!(p.selected_card().map(|c| c.name.as_str()), Some("beta"));
        assert!(!p.select_card("zzz"));
        assert!(p.selected_card().is_none());
    }

    #[test]
    fn expand_all_covers_collection() {
        let mut p = panel();
        p.toggle_card("ghost");
        p.expand_all();
        assert_eq!(p.state().expanded_cards.len(), 3);
        p.toggle_card("a");
        assert!(!p.state().is_expanded("a"));
        p.collapse_all();
        assert!(p.state().expanded_cards.is_empty());
    }

    #[test]
    fn view_is_memoised_until_inputs_change() {
        let mut p = panel();
        assert_eq!(ids(&p.visible_cards()), vec!["b", "a", "c"]);
        assert_eq!(ids(&p.visible_cards()), vec!["b", "a", "c"]);
        assert_eq!(p.view_recomputations(), 1);

        // Selection does not affect the view.
        p.select_card("a");
        p.visible_cards();
        assert_eq!(p.view_recomputations(), 1);

        p.dispatch(PanelAction::SetSort(SortKey::Name, SortDirection::Desc));
        assert_eq!(ids(&p.visible_cards()), vec!["c", "b", "a"]);
        assert_eq!(p.view_recomputations(), 2);

        let next = CardCollection::new(vec![Card::new("z", CardType::Class, "zeta")]).unwrap();
        p.replace_cards(next);
        assert_eq!(ids(&p.visible_cards()), vec!["z"]);
        assert_eq!(p.view_recomputations(), 3);
    }

    #[test]
    fn collapsed_group_lists_no_cards() {
        let mut p = panel();
        p.dispatch(PanelAction::SetGroupBy(core_query::GroupBy::Type));
        p.dispatch(PanelAction::ToggleGroup("function".into()));
        let groups = p.visible_groups();
        let sizes: Vec<(&str, usize)> = groups.iter().map(|g| (g.key, g.cards.len())).collect();
        assert_eq!(sizes, vec![("state", 1), ("function", 0)]);
    }

    #[test]
    fn insert_code_splices_and_invalidates_view() {
        let mut p = panel();
        p.dispatch(PanelAction::SetSearch("ready".into()));
        assert!(p.visible_cards().is_empty());

        p.insert_code("b", "ready = true;\n", Some(TextPosition::origin()))
            .unwrap();
        assert_eq!(p.cards().get("b").unwrap().code, "ready = true;\n");
        assert_eq!(ids(&p.visible_cards()), vec!["b"]);
        assert_eq!(p.view_recomputations(), 2);

        assert_eq!(
            p.insert_code("nope", "x", None),
            Err(EditError::UnknownCard("nope".into()))
        );
    }

    #[test]
    fn read_only_card_rejects_edits() {
        let mut card = Card::new("ro", CardType::Class, "Frozen").with_code("class Frozen {}");
        card.editable = false;
        let mut p = CardPanel::new(
            CardCollection::new(vec![card]).unwrap(),
            &PanelConfig::default(),
        );
        assert_eq!(
            p.insert_code("ro", "x", None),
            Err(EditError::NotEditable("ro".into()))
        );
        assert_eq!(p.revision(), 0);
    }

    #[test]
    fn replace_prunes_state_and_bumps_revision() {
        let mut p = panel();
        p.select_card("a");
        p.toggle_card("c");
        let next = CardCollection::new(vec![Card::new("c", CardType::Function, "gamma")]).unwrap();
        assert_eq!(p.replace_cards(next), 3);
        assert_eq!(p.revision(), 1);
        assert_eq!(p.state().selected_card_id, None);
        assert!(p.state().is_expanded("c"));
    }
}
