//! Structural validation of untrusted card input.
//!
//! Input arrives as a `serde_json::Value` (a parsed snapshot or the props a
//! host hands the panel). Validation is fail-fast: the first violated
//! constraint is returned as a [`SchemaError`] naming the field path
//! (`startLine`, `[3].markType`, `cards[0].dependencies[2]`) and the kind of
//! violation. On success the caller gets a fully populated value; defaults
//! are only ever applied to an object that validates as a whole.
//!
//! The checks are purely structural. Code contents, naming conventions and
//! cross-card references are the business-rule layer's concern.
//!
//! Unknown fields are ignored so producers can add metadata without breaking
//! older panels.

use crate::{
    Card, CardCollection, CardStatus, CardType, Filter, SortDirection, SortKey, Theme, WireEnum,
};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

pub const PANEL_WIDTH_MIN: u32 = 200;
pub const PANEL_WIDTH_MAX: u32 = 800;
pub const PANEL_WIDTH_DEFAULT: u32 = 400;
pub const COMPLEXITY_MAX: f64 = 10.0;
pub const COVERAGE_MAX: f64 = 100.0;

/// A single structural violation, located by field path.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: {kind}")]
pub struct SchemaError {
    pub path: String,
    pub kind: SchemaErrorKind,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaErrorKind {
    #[error("required field is missing")]
    Missing,
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("must be between {min} and {max}, found {found}")]
    OutOfRange { min: f64, max: f64, found: f64 },
    #[error("must not be empty")]
    Empty,
    #[error("unknown value `{found}` (expected one of: {expected})")]
    UnknownVariant { found: String, expected: String },
    #[error("startLine {start} is greater than endLine {end}")]
    LineRangeInverted { start: u32, end: u32 },
    #[error("duplicate card id `{id}`")]
    DuplicateId { id: String },
}

impl SchemaError {
    pub fn new(path: impl Into<String>, kind: SchemaErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Re-root the error under `prefix` (`startLine` -> `cards[1].startLine`).
    fn under(mut self, prefix: &str) -> Self {
        self.path = if self.path.is_empty() {
            prefix.to_string()
        } else if self.path.starts_with('[') {
            format!("{prefix}{}", self.path)
        } else {
            format!("{prefix}.{}", self.path)
        };
        self
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_type(path: impl Into<String>, expected: &'static str, found: &Value) -> SchemaError {
    SchemaError::new(
        path,
        SchemaErrorKind::WrongType {
            expected,
            found: type_name(found),
        },
    )
}

/// Whole numbers only; `3.0` is accepted the same as `3`.
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Field accessor over a JSON object that produces path-tagged errors.
struct Fields<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn object(value: &'a Value) -> Result<Self, SchemaError> {
        match value {
            Value::Object(map) => Ok(Self { map }),
            other => Err(wrong_type("", "object", other)),
        }
    }

    fn optional(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    fn required(&self, key: &str) -> Result<&'a Value, SchemaError> {
        self.optional(key)
            .ok_or_else(|| SchemaError::new(key, SchemaErrorKind::Missing))
    }

    fn string_value(key: &str, value: &Value) -> Result<String, SchemaError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| wrong_type(key, "string", value))
    }

    fn string(&self, key: &str) -> Result<String, SchemaError> {
        Self::string_value(key, self.required(key)?)
    }

    fn non_empty_string(&self, key: &str) -> Result<String, SchemaError> {
        let s = self.string(key)?;
        if s.is_empty() {
            return Err(SchemaError::new(key, SchemaErrorKind::Empty));
        }
        Ok(s)
    }

    fn opt_string(&self, key: &str) -> Result<Option<String>, SchemaError> {
        self.optional(key)
            .map(|v| Self::string_value(key, v))
            .transpose()
    }

    fn string_or(&self, key: &str, default: &str) -> Result<String, SchemaError> {
        Ok(self.opt_string(key)?.unwrap_or_else(|| default.to_string()))
    }

    fn bool_value(key: &str, value: &Value) -> Result<bool, SchemaError> {
        value.as_bool().ok_or_else(|| wrong_type(key, "boolean", value))
    }

    fn boolean(&self, key: &str) -> Result<bool, SchemaError> {
        Self::bool_value(key, self.required(key)?)
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool, SchemaError> {
        match self.optional(key) {
            Some(v) => Self::bool_value(key, v),
            None => Ok(default),
        }
    }

    fn integer_value(key: &str, value: &Value, min: u32, max: u32) -> Result<u32, SchemaError> {
        let Some(found) = value.as_f64() else {
            return Err(wrong_type(key, "number", value));
        };
        if found.fract() != 0.0 {
            return Err(wrong_type(key, "integer", value));
        }
        // Whole numbers beyond i64 fall through to the range error.
        match as_integer(value) {
            Some(n) if n >= i64::from(min) && n <= i64::from(max) => Ok(n as u32),
            _ => Err(SchemaError::new(
                key,
                SchemaErrorKind::OutOfRange {
                    min: f64::from(min),
                    max: f64::from(max),
                    found,
                },
            )),
        }
    }

    /// 1-based line number.
    fn line(&self, key: &str) -> Result<u32, SchemaError> {
        Self::integer_value(key, self.required(key)?, 1, u32::MAX)
    }

    fn opt_count(&self, key: &str) -> Result<Option<u32>, SchemaError> {
        self.optional(key)
            .map(|v| Self::integer_value(key, v, 0, u32::MAX))
            .transpose()
    }

    fn integer_in_or(
        &self,
        key: &str,
        min: u32,
        max: u32,
        default: u32,
    ) -> Result<u32, SchemaError> {
        match self.optional(key) {
            Some(v) => Self::integer_value(key, v, min, max),
            None => Ok(default),
        }
    }

    fn opt_number_in(&self, key: &str, min: f64, max: f64) -> Result<Option<f64>, SchemaError> {
        let Some(value) = self.optional(key) else {
            return Ok(None);
        };
        let n = value.as_f64().ok_or_else(|| wrong_type(key, "number", value))?;
        if !(min..=max).contains(&n) {
            return Err(SchemaError::new(
                key,
                SchemaErrorKind::OutOfRange { min, max, found: n },
            ));
        }
        Ok(Some(n))
    }

    fn list_value(key: &str, value: &Value) -> Result<Vec<String>, SchemaError> {
        let items = value.as_array().ok_or_else(|| wrong_type(key, "array", value))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| Self::string_value(&format!("{key}[{i}]"), item))
            .collect()
    }

    fn string_list(&self, key: &str) -> Result<Vec<String>, SchemaError> {
        Self::list_value(key, self.required(key)?)
    }

    fn string_list_or_empty(&self, key: &str) -> Result<Vec<String>, SchemaError> {
        match self.optional(key) {
            Some(v) => Self::list_value(key, v),
            None => Ok(Vec::new()),
        }
    }

    fn variant_value<T: WireEnum>(key: &str, value: &Value) -> Result<T, SchemaError> {
        let s = value.as_str().ok_or_else(|| wrong_type(key, "string", value))?;
        T::from_wire(s).ok_or_else(|| {
            SchemaError::new(
                key,
                SchemaErrorKind::UnknownVariant {
                    found: s.to_string(),
                    expected: T::expected(),
                },
            )
        })
    }

    fn variant<T: WireEnum>(&self, key: &str) -> Result<T, SchemaError> {
        Self::variant_value(key, self.required(key)?)
    }

    fn variant_or<T: WireEnum>(&self, key: &str, default: T) -> Result<T, SchemaError> {
        match self.optional(key) {
            Some(v) => Self::variant_value(key, v),
            None => Ok(default),
        }
    }

    fn filter_value<T: WireEnum + PartialEq>(
        key: &str,
        value: &Value,
    ) -> Result<Filter<T>, SchemaError> {
        let s = value.as_str().ok_or_else(|| wrong_type(key, "string", value))?;
        Filter::from_wire(s).ok_or_else(|| {
            SchemaError::new(
                key,
                SchemaErrorKind::UnknownVariant {
                    found: s.to_string(),
                    expected: Filter::<T>::expected(),
                },
            )
        })
    }

    fn filter<T: WireEnum + PartialEq>(&self, key: &str) -> Result<Filter<T>, SchemaError> {
        Self::filter_value(key, self.required(key)?)
    }

    fn filter_or<T: WireEnum + PartialEq>(
        &self,
        key: &str,
        default: Filter<T>,
    ) -> Result<Filter<T>, SchemaError> {
        match self.optional(key) {
            Some(v) => Self::filter_value(key, v),
            None => Ok(default),
        }
    }
}

/// Validate a single card record.
pub fn validate_card(value: &Value) -> Result<Card, SchemaError> {
    let f = Fields::object(value)?;
    let id = f.string("id")?;
    let kind = f.variant::<CardType>("type")?;
    let name = f.non_empty_string("name")?;
    let code = f.string("code")?;
    let start_line = f.line("startLine")?;
    let end_line = f.line("endLine")?;
    if start_line > end_line {
        return Err(SchemaError::new(
            "endLine",
            SchemaErrorKind::LineRangeInverted {
                start: start_line,
                end: end_line,
            },
        ));
    }
    let status = f.variant::<CardStatus>("status")?;
    let expanded = f.boolean("expanded")?;
    let editable = f.boolean("editable")?;
    let dependencies = f.string_list("dependencies")?;
    let dependents = f.string_list("dependents")?;
    let description = f.string("description")?;
    let is_custom_card = f.boolean("isCustomCard")?;
    let mark_type = f.variant("markType")?;
    let order = f.opt_count("order")?;
    let tags = f.string_list_or_empty("tags")?;
    let author = f.opt_string("author")?;
    let complexity = f.opt_number_in("complexity", 0.0, COMPLEXITY_MAX)?;
    let coverage = f.opt_number_in("coverage", 0.0, COVERAGE_MAX)?;

    Ok(Card {
        id,
        kind,
        name,
        code,
        start_line,
        end_line,
        status,
        expanded,
        editable,
        dependencies,
        dependents,
        description,
        is_custom_card,
        mark_type,
        order,
        tags,
        author,
        complexity,
        coverage,
    })
}

/// Validate an array of card records into a collection with unique ids.
pub fn validate_collection(value: &Value) -> Result<CardCollection, SchemaError> {
    let collection = collect_cards(value);
    if let Err(err) = &collection {
        debug!(target: "model.schema", path = %err.path, error = %err.kind, "collection_rejected");
    }
    collection
}

fn collect_cards(value: &Value) -> Result<CardCollection, SchemaError> {
    let items = value
        .as_array()
        .ok_or_else(|| wrong_type("", "array", value))?;
    let mut cards = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let card = validate_card(item).map_err(|e| e.under(&format!("[{idx}]")))?;
        cards.push(card);
    }
    CardCollection::new(cards)
}

/// Panel-level configuration accompanying a card collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelConfig {
    pub width: u32,
    pub is_visible: bool,
    pub theme: Theme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_card_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlighted_card_id: Option<String>,
    pub filter_type: Filter<CardType>,
    pub sort_by: SortKey,
    pub sort_direction: SortDirection,
    pub search_query: String,
    pub show_dependencies: bool,
    pub show_data_flow: bool,
    pub collapsible: bool,
    pub resizable: bool,
    pub drag_and_drop: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            width: PANEL_WIDTH_DEFAULT,
            is_visible: true,
            theme: Theme::Dark,
            selected_card_id: None,
            highlighted_card_id: None,
            filter_type: Filter::All,
            sort_by: SortKey::Order,
            sort_direction: SortDirection::Asc,
            search_query: String::new(),
            show_dependencies: false,
            show_data_flow: false,
            collapsible: true,
            resizable: true,
            drag_and_drop: true,
        }
    }
}

/// Validate the configuration fields of a panel props object. Card data, if
/// present, is not looked at; see [`validate_panel_props`].
pub fn validate_panel_config(value: &Value) -> Result<PanelConfig, SchemaError> {
    let f = Fields::object(value)?;
    let d = PanelConfig::default();
    Ok(PanelConfig {
        width: f.integer_in_or("width", PANEL_WIDTH_MIN, PANEL_WIDTH_MAX, d.width)?,
        is_visible: f.bool_or("isVisible", d.is_visible)?,
        theme: f.variant_or("theme", d.theme)?,
        selected_card_id: f.opt_string("selectedCardId")?,
        highlighted_card_id: f.opt_string("highlightedCardId")?,
        filter_type: f.filter_or("filterType", d.filter_type)?,
        sort_by: f.variant_or("sortBy", d.sort_by)?,
        sort_direction: f.variant_or("sortDirection", d.sort_direction)?,
        search_query: f.string_or("searchQuery", &d.search_query)?,
        show_dependencies: f.bool_or("showDependencies", d.show_dependencies)?,
        show_data_flow: f.bool_or("showDataFlow", d.show_data_flow)?,
        collapsible: f.bool_or("collapsible", d.collapsible)?,
        resizable: f.bool_or("resizable", d.resizable)?,
        drag_and_drop: f.bool_or("dragAndDrop", d.drag_and_drop)?,
    })
}

/// Cards plus the panel configuration they are displayed with.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelProps {
    pub cards: CardCollection,
    pub config: PanelConfig,
}

pub fn validate_panel_props(value: &Value) -> Result<PanelProps, SchemaError> {
    let f = Fields::object(value)?;
    let cards = validate_collection(f.required("cards")?).map_err(|e| e.under("cards"))?;
    let config = validate_panel_config(value)?;
    Ok(PanelProps { cards, config })
}

/// A stored filter selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardFilter {
    #[serde(rename = "type")]
    pub kind: Filter<CardType>,
    pub status: Filter<CardStatus>,
    pub search_query: String,
    pub tags: Vec<String>,
}

pub fn validate_filter(value: &Value) -> Result<CardFilter, SchemaError> {
    let f = Fields::object(value)?;
    Ok(CardFilter {
        kind: f.filter("type")?,
        status: f.filter_or("status", Filter::All)?,
        search_query: f.string("searchQuery")?,
        tags: f.string_list_or_empty("tags")?,
    })
}
