//! Configuration loading and parsing.
//!
//! Parses `cardpanel.toml` (or an override path supplied by the binary).
//! Sections:
//! * `[panel]` initial panel settings (width, theme, sort, type filter)
//! * `[editor]` code editor settings carried alongside the panel
//! * `[rules]` which business-rule violations block an import
//!
//! Every field has a default and unknown fields are ignored, so a partial
//! file is always usable. A file that fails to parse is reported at `warn`
//! and replaced by defaults. The raw parsed values are kept in
//! [`Config::file`]; [`Config::apply`] derives the effective, clamped values
//! and logs each adjustment at `info`.

use anyhow::Result;
use core_model::schema::{PANEL_WIDTH_DEFAULT, PANEL_WIDTH_MAX, PANEL_WIDTH_MIN};
use core_model::{CardType, Filter, PanelConfig, SortDirection, SortKey, Theme, WireEnum};
use core_rules::RulePolicy;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

pub const FONT_SIZE_MIN: u32 = 8;
pub const FONT_SIZE_MAX: u32 = 72;
pub const TAB_SIZE_MIN: u32 = 1;
pub const TAB_SIZE_MAX: u32 = 8;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PanelSection {
    pub width: u32,
    pub theme: String,
    pub sort_by: String,
    pub sort_direction: String,
    pub filter_type: String,
    pub show_dependencies: bool,
}

impl Default for PanelSection {
    fn default() -> Self {
        Self {
            width: PANEL_WIDTH_DEFAULT,
            theme: Theme::default().as_str().to_string(),
            sort_by: SortKey::default().as_str().to_string(),
            sort_direction: SortDirection::default().as_str().to_string(),
            filter_type: "all".to_string(),
            show_dependencies: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct EditorSettings {
    pub font_size: u32,
    pub tab_size: u32,
    pub line_numbers: bool,
    pub word_wrap: bool,
    pub read_only: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            font_size: 14,
            tab_size: 2,
            line_numbers: true,
            word_wrap: false,
            read_only: false,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, Copy)]
#[serde(default)]
pub struct RulesSection {
    pub enforce_names: bool,
    pub enforce_integrity: bool,
    pub enforce_references: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ConfigFile {
    pub panel: PanelSection,
    pub editor: EditorSettings,
    pub rules: RulesSection,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
    pub panel: PanelConfig,  // effective, after `apply`
    pub editor: EditorSettings,
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("cardpanel.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("cardpanel").join("cardpanel.toml");
    }
    PathBuf::from("cardpanel.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => Ok(Config::parse(&content)),
        Err(_) => {
            let mut cfg = Config::default();
            cfg.apply();
            Ok(cfg)
        }
    }
}

impl Config {
    /// Parse file contents, falling back to defaults on a syntax error.
    pub fn parse(content: &str) -> Self {
        let file = match toml::from_str::<ConfigFile>(content) {
            Ok(file) => file,
            Err(e) => {
                warn!(target: "config", error = %e, "config_parse_failed_using_defaults");
                ConfigFile::default()
            }
        };
        let mut cfg = Config {
            raw: Some(content.to_string()),
            file,
            ..Config::default()
        };
        cfg.apply();
        cfg
    }

    /// Derive effective settings from the raw file values. Returns the number
    /// of values that had to be clamped or replaced.
    pub fn apply(&mut self) -> usize {
        let mut adjusted = 0;
        let raw = &self.file.panel;

        let width = raw.width.clamp(PANEL_WIDTH_MIN, PANEL_WIDTH_MAX);
        if width != raw.width {
            adjusted += 1;
            info!(
                target: "config",
                raw = raw.width,
                clamped = width,
                min = PANEL_WIDTH_MIN,
                max = PANEL_WIDTH_MAX,
                "panel_width_clamped"
            );
        }

        let theme = wire_or_default::<Theme>("panel.theme", &raw.theme, &mut adjusted);
        let sort_by = wire_or_default::<SortKey>("panel.sort_by", &raw.sort_by, &mut adjusted);
        let sort_direction = wire_or_default::<SortDirection>(
            "panel.sort_direction",
            &raw.sort_direction,
            &mut adjusted,
        );
        let filter_type = Filter::<CardType>::from_wire(&raw.filter_type).unwrap_or_else(|| {
            adjusted += 1;
            info!(
                target: "config",
                key = "panel.filter_type",
                value = %raw.filter_type,
                "config_value_replaced_with_default"
            );
            Filter::All
        });

        self.panel = PanelConfig {
            width,
            theme,
            sort_by,
            sort_direction,
            filter_type,
            show_dependencies: raw.show_dependencies,
            ..PanelConfig::default()
        };

        let editor = self.file.editor;
        let font_size = editor.font_size.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX);
        if font_size != editor.font_size {
            adjusted += 1;
            info!(
                target: "config",
                raw = editor.font_size,
                clamped = font_size,
                "editor_font_size_clamped"
            );
        }
        let tab_size = editor.tab_size.clamp(TAB_SIZE_MIN, TAB_SIZE_MAX);
        if tab_size != editor.tab_size {
            adjusted += 1;
            info!(
                target: "config",
                raw = editor.tab_size,
                clamped = tab_size,
                "editor_tab_size_clamped"
            );
        }
        self.editor = EditorSettings {
            font_size,
            tab_size,
            ..editor
        };
        adjusted
    }

    pub fn rule_policy(&self) -> RulePolicy {
        let rules = self.file.rules;
        RulePolicy {
            enforce_names: rules.enforce_names,
            enforce_integrity: rules.enforce_integrity,
            enforce_references: rules.enforce_references,
        }
    }
}

fn wire_or_default<T: WireEnum + Default>(key: &str, value: &str, adjusted: &mut usize) -> T {
    T::from_wire(value).unwrap_or_else(|| {
        *adjusted += 1;
        info!(
            target: "config",
            key,
            value,
            expected = %T::expected(),
            "config_value_replaced_with_default"
        );
        T::default()
    })
}
