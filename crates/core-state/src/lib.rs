//! Panel state: what the user has selected, expanded, searched for and how
//! the list is ordered.
//!
//! State transitions are pure. [`reduce`] takes the previous [`PanelState`]
//! and one [`PanelAction`] and returns the next state; it never touches the
//! card collection and never fails. Actions naming ids that do not exist are
//! accepted: selection and expansion are resolved against the collection at
//! read time (see [`CardPanel::selected_card`]) and pruned when the
//! collection is replaced.
//!
//! [`CardPanel`] owns one collection plus its state and is the only place
//! where both meet: the memoised visible view, snapshot import/export and the
//! rule report live there.

use std::collections::BTreeSet;

use core_model::{
    CardCollection, CardFilter, CardStatus, CardType, Filter, PanelConfig, SortDirection, SortKey,
};
use core_query::{GroupBy, QueryParameters, SearchOptions};

pub mod panel;
pub mod snapshot;

pub use panel::{CardPanel, EditError};
pub use snapshot::{ImportError, ImportReport, export_snapshot, parse_snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Grid,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelState {
    pub selected_card_id: Option<String>,
    pub expanded_cards: BTreeSet<String>,
    /// Group keys (see [`core_query::group`]) whose cards are hidden.
    pub collapsed_groups: BTreeSet<String>,
    pub search_query: String,
    pub search: SearchOptions,
    pub filter_type: Filter<CardType>,
    pub filter_status: Filter<CardStatus>,
    pub tags: Vec<String>,
    pub sort_by: SortKey,
    pub sort_direction: SortDirection,
    pub group_by: GroupBy,
    pub view_mode: ViewMode,
    pub show_dependencies: bool,
}

impl PanelState {
    /// Initial state carried by a panel configuration. Expansion starts empty.
    pub fn from_config(config: &PanelConfig) -> Self {
        Self {
            selected_card_id: config.selected_card_id.clone(),
            search_query: config.search_query.clone(),
            filter_type: config.filter_type,
            sort_by: config.sort_by,
            sort_direction: config.sort_direction,
            show_dependencies: config.show_dependencies,
            ..Self::default()
        }
    }

    /// Mark every card flagged `expanded` in the collection.
    pub fn seed_expanded(&mut self, cards: &CardCollection) {
        self.expanded_cards.extend(
            cards
                .iter()
                .filter(|c| c.expanded)
                .map(|c| c.id.clone()),
        );
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded_cards.contains(id)
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_card_id.as_deref() == Some(id)
    }

    /// Drop selection/expansion entries that no longer name a card.
    pub fn prune(&mut self, cards: &CardCollection) {
        if let Some(id) = &self.selected_card_id
            && !cards.contains(id)
        {
            self.selected_card_id = None;
        }
        self.expanded_cards.retain(|id| cards.contains(id));
    }

    pub fn filter(&self) -> CardFilter {
        CardFilter {
            kind: self.filter_type,
            status: self.filter_status,
            search_query: self.search_query.clone(),
            tags: self.tags.clone(),
        }
    }

    pub fn query_parameters(&self) -> QueryParameters {
        QueryParameters {
            search_query: self.search_query.clone(),
            filter_type: self.filter_type,
            filter_status: self.filter_status,
            tags: self.tags.clone(),
            sort_by: self.sort_by,
            sort_direction: self.sort_direction,
            search: self.search,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    Select(String),
    ClearSelection,
    ToggleExpand(String),
    /// Expand one card; a no-op when it is already expanded.
    Expand(String),
    /// Replace the expanded set with exactly these ids.
    ExpandAll(Vec<String>),
    CollapseAll,
    SetSearch(String),
    SetSearchOptions(SearchOptions),
    SetFilterType(Filter<CardType>),
    SetFilterStatus(Filter<CardStatus>),
    SetTags(Vec<String>),
    /// Replace type/status/search/tags in one step.
    ApplyFilter(CardFilter),
    /// Clicking the active sort key flips direction; another key starts ascending.
    SortBy(SortKey),
    SetSort(SortKey, SortDirection),
    SetSortDirection(SortDirection),
    ToggleSortDirection,
    SetGroupBy(GroupBy),
    ToggleGroup(String),
    SetViewMode(ViewMode),
    ToggleDependencies,
}

/// Next state after `action`. `state` is left untouched.
pub fn reduce(state: &PanelState, action: PanelAction) -> PanelState {
    let mut next = state.clone();
    match action {
        PanelAction::Select(id) => next.selected_card_id = Some(id),
        PanelAction::ClearSelection => next.selected_card_id = None,
        PanelAction::ToggleExpand(id) => {
            if !next.expanded_cards.remove(&id) {
                next.expanded_cards.insert(id);
            }
        }
        PanelAction::Expand(id) => {
            next.expanded_cards.insert(id);
        }
        PanelAction::ExpandAll(ids) => next.expanded_cards = ids.into_iter().collect(),
        PanelAction::CollapseAll => next.expanded_cards.clear(),
        PanelAction::SetSearch(query) => next.search_query = query,
        PanelAction::SetSearchOptions(options) => next.search = options,
        PanelAction::SetFilterType(kind) => next.filter_type = kind,
        PanelAction::SetFilterStatus(status) => next.filter_status = status,
        PanelAction::SetTags(tags) => next.tags = tags,
        PanelAction::ApplyFilter(filter) => {
            next.filter_type = filter.kind;
            next.filter_status = filter.status;
            next.search_query = filter.search_query;
            next.tags = filter.tags;
        }
        PanelAction::SortBy(key) => {
            if next.sort_by == key {
                next.sort_direction = next.sort_direction.reversed();
            } else {
                next.sort_by = key;
                next.sort_direction = SortDirection::Asc;
            }
        }
        PanelAction::SetSort(key, direction) => {
            next.sort_by = key;
            next.sort_direction = direction;
        }
        PanelAction::SetSortDirection(direction) => next.sort_direction = direction,
        PanelAction::ToggleSortDirection => next.sort_direction = next.sort_direction.reversed(),
        PanelAction::SetGroupBy(by) => {
            next.group_by = by;
            next.collapsed_groups.clear();
        }
        PanelAction::ToggleGroup(key) => {
            if !next.collapsed_groups.remove(&key) {
                next.collapsed_groups.insert(key);
            }
        }
        PanelAction::SetViewMode(mode) => next.view_mode = mode,
        PanelAction::ToggleDependencies => next.show_dependencies = !next.show_dependencies,
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{Card, Theme};
    use pretty_assertions::assert_eq;

    #[test]
    fn toggle_expand_twice_restores_state() {
        let s0 = PanelState::default();
        let s1 = reduce(&s0, PanelAction::ToggleExpand("a".into()));
        assert!(s1.is_expanded("a"));
        assert!(!s0.is_expanded("a"));
        let s2 = reduce(&s1, PanelAction::ToggleExpand("a".into()));
        assert_eq!(s2, s0);
    }

    #[test]
    fn expand_all_then_collapse_all() {
        let s = reduce(
            &PanelState::default(),
            PanelAction::ExpandAll(vec!["a".into(), "b".into(), "a".into()]),
        );
        assert_eq!(s.expanded_cards.len(), 2);
        let s = reduce(&s, PanelAction::CollapseAll);
        assert!(s.expanded_cards.is_empty());
    }

    #[test]
    fn expand_all_replaces_stale_entries() {
        let s = reduce(&PanelState::default(), PanelAction::ToggleExpand("ghost".into()));
        let s = reduce(&s, PanelAction::ExpandAll(vec!["a".into(), "b".into()]));
        assert_eq!(s.expanded_cards.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn expand_is_idempotent() {
        let s = reduce(&PanelState::default(), PanelAction::Expand("a".into()));
        let again = reduce(&s, PanelAction::Expand("a".into()));
        assert_eq!(again, s);
        assert!(again.is_expanded("a"));
    }

    #[test]
    fn sort_by_same_key_flips_direction() {
        let s = PanelState::default();
        assert_eq!(s.sort_by, SortKey::Order);
        let s = reduce(&s, PanelAction::SortBy(SortKey::Order));
        assert_eq!(s.sort_direction, SortDirection::Desc);
        let s = reduce(&s, PanelAction::SortBy(SortKey::Name));
        assert_eq!((s.sort_by, s.sort_direction), (SortKey::Name, SortDirection::Asc));
        let s = reduce(&s, PanelAction::ToggleSortDirection);
        assert_eq!(s.sort_direction, SortDirection::Desc);
        let s = reduce(&s, PanelAction::SetSortDirection(SortDirection::Asc));
        assert_eq!(s.sort_direction, SortDirection::Asc);
    }

    #[test]
    fn selection_accepts_any_id() {
        let s = reduce(&PanelState::default(), PanelAction::Select("ghost".into()));
        assert!(s.is_selected("ghost"));
        let s = reduce(&s, PanelAction::ClearSelection);
        assert_eq!(s.selected_card_id, None);
    }

    #[test]
    fn apply_filter_replaces_every_field() {
        let filter = CardFilter {
            kind: Filter::Only(CardType::Effect),
            status: Filter::Only(CardStatus::Error),
            search_query: "use".into(),
            tags: vec!["react".into()],
        };
        let s = reduce(&PanelState::default(), PanelAction::ApplyFilter(filter.clone()));
        assert_eq!(s.filter(), filter);
        let params = s.query_parameters();
        assert_eq!(params.filter_type, Filter::Only(CardType::Effect));
        assert_eq!(params.search_query, "use");
    }

    #[test]
    fn changing_grouping_reopens_groups() {
        let s = reduce(&PanelState::default(), PanelAction::SetGroupBy(GroupBy::Type));
        let s = reduce(&s, PanelAction::ToggleGroup("hook".into()));
        assert!(s.collapsed_groups.contains("hook"));
        let s = reduce(&s, PanelAction::SetGroupBy(GroupBy::Status));
        assert!(s.collapsed_groups.is_empty());
    }

    #[test]
    fn from_config_copies_view_settings() {
        let config = PanelConfig {
            theme: Theme::Light,
            selected_card_id: Some("x".into()),
            filter_type: Filter::Only(CardType::State),
            sort_by: SortKey::Name,
            sort_direction: SortDirection::Desc,
            search_query: "count".into(),
            show_dependencies: true,
            ..PanelConfig::default()
        };
        let s = PanelState::from_config(&config);
        assert!(s.is_selected("x"));
        assert_eq!(s.filter_type, Filter::Only(CardType::State));
        assert_eq!((s.sort_by, s.sort_direction), (SortKey::Name, SortDirection::Desc));
        assert_eq!(s.search_query, "count");
        assert!(s.show_dependencies);
    }

    #[test]
    fn prune_drops_unknown_ids() {
        let cards = CardCollection::new(vec![
            Card::new("a", CardType::Function, "a"),
            Card::new("b", CardType::Function, "b"),
        ])
        .unwrap();
        let mut s = reduce(
            &PanelState::default(),
            PanelAction::ExpandAll(vec!["a".into(), "gone".into()]),
        );
        s = reduce(&s, PanelAction::Select("gone".into()));
        s.prune(&cards);
        assert_eq!(s.selected_card_id, None);
        assert_eq!(s.expanded_cards.iter().collect::<Vec<_>>(), vec!["a"]);
    }
}
