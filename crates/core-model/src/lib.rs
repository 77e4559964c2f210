//! Card model: the typed representation of a code fragment shown in the
//! card panel, plus the ordered collection the panel renders.
//!
//! A `Card` is a named, typed, line-bounded region of a source buffer
//! (function, state declaration, effect, class, component, or a custom
//! marker-delimited block). Cards are produced by an external parser and
//! enter this crate as untrusted JSON; [`schema`] is the only way to turn
//! such input into a `Card`, which is why `Card` derives `Serialize` but not
//! `Deserialize`.
//!
//! Invariants (guaranteed for every `Card` returned by the schema layer):
//! * `name` is non-empty.
//! * `1 <= start_line <= end_line`.
//! * `complexity` (when present) lies in `0..=10`, `coverage` in `0..=100`.
//!
//! Invariants for `CardCollection`:
//! * No two cards share an `id`.
//! * Order is the producer's order; nothing in the core reorders it in place.
//!
//! Not invariants (validated elsewhere, reported rather than repaired):
//! * every id in `dependencies` / `dependents` resolves inside the collection;
//! * `dependents` is the inverse of `dependencies`.
//!
//! See `core-rules` for those checks.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub mod schema;

pub use schema::{
    CardFilter, PanelConfig, PanelProps, SchemaError, SchemaErrorKind, validate_card,
    validate_collection, validate_filter, validate_panel_config, validate_panel_props,
};

/// A closed set of string-tagged variants with a stable wire spelling.
///
/// Implemented by every enum that crosses the JSON boundary so the schema
/// layer can parse them uniformly and report the accepted spellings.
pub trait WireEnum: Sized + Copy + 'static {
    const VARIANTS: &'static [Self];

    fn as_str(self) -> &'static str;

    fn from_wire(s: &str) -> Option<Self> {
        Self::VARIANTS.iter().copied().find(|v| v.as_str() == s)
    }

    /// Comma separated list of accepted spellings (used in error messages).
    fn expected() -> String {
        Self::VARIANTS
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum $name {
            $(#[serde(rename = $wire)] $variant),+
        }

        impl WireEnum for $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),+];

            fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// Structural category of a card.
    CardType {
        Function => "function",
        State => "state",
        Effect => "effect",
        Class => "class",
        Custom => "custom",
        Component => "component",
    }
);

wire_enum!(
    /// Externally computed health indicator; opaque to the core.
    CardStatus {
        Success => "success",
        Warning => "warning",
        Error => "error",
    }
);

wire_enum!(
    /// How the card boundaries were detected.
    MarkType {
        Hash => "hash",
        Class => "class",
        IdCard => "idCard",
        Auto => "auto",
    }
);

wire_enum!(
    /// Field the query engine orders by.
    SortKey {
        Name => "name",
        Type => "type",
        Order => "order",
        Status => "status",
    }
);

wire_enum!(
    SortDirection {
        Asc => "asc",
        Desc => "desc",
    }
);

wire_enum!(
    Theme {
        Dark => "dark",
        Light => "light",
    }
);

impl Default for SortKey {
    fn default() -> Self {
        SortKey::Order
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Asc
    }
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Dark
    }
}

/// Either "all" or a single accepted variant. Serialized as the literal
/// string `"all"` or the variant's wire spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter<T> {
    All,
    Only(T),
}

impl<T> Default for Filter<T> {
    fn default() -> Self {
        Filter::All
    }
}

impl<T: WireEnum + PartialEq> Filter<T> {
    pub fn matches(&self, value: T) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(wanted) => *wanted == value,
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        if s == "all" {
            Some(Filter::All)
        } else {
            T::from_wire(s).map(Filter::Only)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Only(v) => v.as_str(),
        }
    }

    pub fn expected() -> String {
        format!("all, {}", T::expected())
    }
}

impl<T: WireEnum + PartialEq> Serialize for Filter<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A named, typed region of source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CardType,
    pub name: String,
    pub code: String,
    pub start_line: u32,
    pub end_line: u32,
    pub status: CardStatus,
    pub expanded: bool,
    pub editable: bool,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub description: String,
    pub is_custom_card: bool,
    pub mark_type: MarkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
}

impl Card {
    /// Minimal well-formed card on a single line; the remaining fields take
    /// neutral values and can be adjusted with the `with_*` helpers.
    pub fn new(id: impl Into<String>, kind: CardType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            code: String::new(),
            start_line: 1,
            end_line: 1,
            status: CardStatus::Success,
            expanded: false,
            editable: true,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            description: String::new(),
            is_custom_card: false,
            mark_type: MarkType::Auto,
            order: None,
            tags: Vec::new(),
            author: None,
            complexity: None,
            coverage: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_lines(mut self, start_line: u32, end_line: u32) -> Self {
        self.start_line = start_line;
        self.end_line = end_line;
        self
    }

    pub fn with_status(mut self, status: CardStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependents<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependents = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Inclusive line span of the card.
    pub fn lines_of_code(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Sort key used for `SortKey::Order`; a missing order sorts as 0.
    pub fn order_key(&self) -> u32 {
        self.order.unwrap_or(0)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Ordered cards with unique ids.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct CardCollection {
    cards: Vec<Card>,
}

impl CardCollection {
    /// Build a collection, rejecting the first repeated id.
    pub fn new(cards: Vec<Card>) -> Result<Self, SchemaError> {
        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(cards.len());
        for (idx, card) in cards.iter().enumerate() {
            if seen.insert(card.id.as_str(), idx).is_some() {
                return Err(SchemaError::new(
                    format!("[{idx}].id"),
                    SchemaErrorKind::DuplicateId {
                        id: card.id.clone(),
                    },
                ));
            }
        }
        Ok(Self { cards })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn as_slice(&self) -> &[Card] {
        &self.cards
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Card> {
        self.cards.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().map(|c| c.id.as_str())
    }

    /// Replace the code of card `id`. Returns false when no such card exists.
    pub fn replace_code(&mut self, id: &str, code: String) -> bool {
        match self.cards.iter_mut().find(|c| c.id == id) {
            Some(card) => {
                card.code = code;
                true
            }
            None => false,
        }
    }
}

impl<'a> IntoIterator for &'a CardCollection {
    type Item = &'a Card;
    type IntoIter = std::slice::Iter<'a, Card>;

    fn into_iter(self) -> Self::IntoIter {
        self.cards.iter()
    }
}
