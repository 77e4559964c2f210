//! Query engine: turns a card collection plus the panel's current
//! search/filter/sort selection into the ordered list the panel renders.
//!
//! Pipeline (fixed order):
//! 1. type filter
//! 2. status filter
//! 3. tag filter (every requested tag must be present)
//! 4. search (non-empty query only; substring of name, description or code)
//! 5. stable sort by the selected key, reversed for descending
//!
//! The filters are conjunctive: a card is shown only if it passes every
//! stage. An empty result is ordinary output; callers compare against the
//! collection length to tell "nothing matched" from "nothing loaded".
//!
//! The engine never mutates its input and holds no state; the same inputs
//! always yield the same output.

use core_model::{
    Card, CardCollection, CardFilter, CardStatus, CardType, Filter, SortDirection, SortKey,
    WireEnum,
};
use std::cmp::Ordering;
use tracing::trace;

/// Which fields the search text is matched against, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub in_name: bool,
    pub in_description: bool,
    pub in_code: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            in_name: true,
            in_description: true,
            in_code: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryParameters {
    pub search_query: String,
    pub filter_type: Filter<CardType>,
    pub filter_status: Filter<CardStatus>,
    pub tags: Vec<String>,
    pub sort_by: SortKey,
    pub sort_direction: SortDirection,
    pub search: SearchOptions,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search_query = query.into();
        self
    }

    pub fn of_type(mut self, kind: CardType) -> Self {
        self.filter_type = Filter::Only(kind);
        self
    }

    pub fn with_status(mut self, status: CardStatus) -> Self {
        self.filter_status = Filter::Only(status);
        self
    }

    pub fn sorted_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort_by = key;
        self.sort_direction = direction;
        self
    }

    /// Parameters equivalent to a stored filter selection, default sort.
    pub fn from_filter(filter: &CardFilter) -> Self {
        Self {
            search_query: filter.search_query.clone(),
            filter_type: filter.kind,
            filter_status: filter.status,
            tags: filter.tags.clone(),
            ..Self::default()
        }
    }

    /// Does `card` survive every filter stage?
    pub fn matches(&self, card: &Card) -> bool {
        self.filter_type.matches(card.kind)
            && self.filter_status.matches(card.status)
            && self.tags.iter().all(|t| card.has_tag(t))
            && self.matches_search(card)
    }

    fn matches_search(&self, card: &Card) -> bool {
        if self.search_query.is_empty() {
            return true;
        }
        let opts = self.search;
        let fields = [
            (opts.in_name, card.name.as_str()),
            (opts.in_description, card.description.as_str()),
            (opts.in_code, card.code.as_str()),
        ];
        if opts.case_sensitive {
            fields
                .iter()
                .any(|(on, text)| *on && text.contains(self.search_query.as_str()))
        } else {
            let needle = self.search_query.to_lowercase();
            fields
                .iter()
                .any(|(on, text)| *on && text.to_lowercase().contains(&needle))
        }
    }
}

/// Ascending comparison of two cards under `key`.
pub fn compare(a: &Card, b: &Card, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Type => a.kind.as_str().cmp(b.kind.as_str()),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
        SortKey::Order => a.order_key().cmp(&b.order_key()),
    }
}

/// Sort a view in place. Stable: equal keys keep their relative order in
/// both directions.
pub fn sort_view(view: &mut [&Card], key: SortKey, direction: SortDirection) {
    view.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

/// Filter, search and order `cards` for display.
pub fn query<'a>(cards: &'a CardCollection, params: &QueryParameters) -> Vec<&'a Card> {
    let mut view: Vec<&Card> = cards.iter().filter(|c| params.matches(c)).collect();
    sort_view(&mut view, params.sort_by, params.sort_direction);
    trace!(
        target: "query",
        total = cards.len(),
        visible = view.len(),
        sort_by = %params.sort_by,
        direction = %params.sort_direction,
        searching = !params.search_query.is_empty(),
        "query_applied"
    );
    view
}

/// Same result as [`query`], expressed as positions in the collection so a
/// caller can keep it across borrows.
pub fn query_indices(cards: &CardCollection, params: &QueryParameters) -> Vec<usize> {
    let slice = cards.as_slice();
    let mut idx: Vec<usize> = (0..slice.len())
        .filter(|&i| params.matches(&slice[i]))
        .collect();
    idx.sort_by(|&a, &b| {
        let ord = compare(&slice[a], &slice[b], params.sort_by);
        match params.sort_direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    idx
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    None,
    Type,
    Status,
}

/// A run of cards sharing a group key, in view order.
#[derive(Debug, Clone, PartialEq)]
pub struct CardGroup<'a> {
    pub key: &'static str,
    pub cards: Vec<&'a Card>,
}

/// Partition an already ordered view. Groups appear in order of first
/// occurrence and keep the view order inside.
pub fn group<'a>(view: &[&'a Card], by: GroupBy) -> Vec<CardGroup<'a>> {
    let key_of = |card: &Card| -> &'static str {
        match by {
            GroupBy::None => "all",
            GroupBy::Type => card.kind.as_str(),
            GroupBy::Status => card.status.as_str(),
        }
    };
    let mut groups: Vec<CardGroup<'a>> = Vec::new();
    for &card in view {
        let key = key_of(card);
        match groups.iter_mut().find(|g| g.key == key) {
            Some(g) => g.cards.push(card),
            None => groups.push(CardGroup {
                key,
                cards: vec![card],
            }),
        }
    }
    groups
}
