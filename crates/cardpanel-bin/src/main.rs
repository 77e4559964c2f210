//! Cardpanel entrypoint: load a card snapshot, apply the requested view and
//! print it together with the collection's rule report.
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use core_config::{Config, load_from};
use core_model::{CardStatus, CardType, Filter, SortDirection, SortKey, WireEnum};
use core_query::GroupBy;
use core_state::{CardPanel, PanelAction};
use core_text::TextPosition;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Once;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GroupArg {
    None,
    Type,
    Status,
}

impl From<GroupArg> for GroupBy {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::None => GroupBy::None,
            GroupArg::Type => GroupBy::Type,
            GroupArg::Status => GroupBy::Status,
        }
    }
}

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "cardpanel", version, about = "Inspect a card snapshot")]
struct Args {
    /// Card snapshot (JSON array of card records).
    pub snapshot: PathBuf,
    /// Optional configuration file path (overrides discovery of `cardpanel.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Case-insensitive substring matched against name, description and code.
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long = "type", value_parser = parse_filter::<CardType>)]
    pub kind: Option<Filter<CardType>>,
    #[arg(long, value_parser = parse_filter::<CardStatus>)]
    pub status: Option<Filter<CardStatus>>,
    /// Require a tag; repeat for several.
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    #[arg(long, value_parser = parse_wire::<SortKey>)]
    pub sort: Option<SortKey>,
    #[arg(long)]
    pub desc: bool,
    #[arg(long, value_enum)]
    pub group: Option<GroupArg>,
    /// Collapse a group (by key) in grouped output; repeatable.
    #[arg(long = "collapse")]
    pub collapse: Vec<String>,
    #[arg(long)]
    pub select: Option<String>,
    /// Show a card's code; repeatable.
    #[arg(long = "expand")]
    pub expand: Vec<String>,
    #[arg(long)]
    pub expand_all: bool,
    #[arg(long)]
    pub dependencies: bool,
    /// Print cards in dependency-first order instead of the query view.
    #[arg(long)]
    pub dependency_order: bool,
    /// Insert text into a card's code: `--insert <ID> <TEXT>`.
    #[arg(long, num_args = 2, value_names = ["ID", "TEXT"])]
    pub insert: Option<Vec<String>>,
    /// Insert position as `LINE:COLUMN` (1-based); appends when omitted.
    #[arg(long, value_parser = parse_position, requires = "insert")]
    pub at: Option<TextPosition>,
    /// Write the (possibly edited) collection back out as a snapshot.
    #[arg(long)]
    pub export: Option<PathBuf>,
    /// Exit with failure when the rule report contains errors.
    #[arg(long)]
    pub check: bool,
}

fn parse_wire<T: WireEnum + Send + Sync>(s: &str) -> Result<T, String> {
    T::from_wire(s).ok_or_else(|| format!("expected one of: {}", T::expected()))
}

fn parse_filter<T: WireEnum + PartialEq + Send + Sync>(s: &str) -> Result<Filter<T>, String> {
    Filter::from_wire(s).ok_or_else(|| format!("expected one of: {}", Filter::<T>::expected()))
}

fn parse_position(s: &str) -> Result<TextPosition, String> {
    let (line, column) = s
        .split_once(':')
        .ok_or_else(|| "expected LINE:COLUMN".to_string())?;
    let line = line.trim().parse().map_err(|e| format!("line: {e}"))?;
    let column = column.trim().parse().map_err(|e| format!("column: {e}"))?;
    Ok(TextPosition::new(line, column))
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("cardpanel.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "cardpanel.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Translate query/view flags into panel actions.
fn view_actions(args: &Args) -> Vec<PanelAction> {
    let mut actions = Vec::new();
    if let Some(query) = &args.search {
        actions.push(PanelAction::SetSearch(query.clone()));
    }
    if let Some(kind) = args.kind {
        actions.push(PanelAction::SetFilterType(kind));
    }
    if let Some(status) = args.status {
        actions.push(PanelAction::SetFilterStatus(status));
    }
    if !args.tags.is_empty() {
        actions.push(PanelAction::SetTags(args.tags.clone()));
    }
    if let Some(key) = args.sort {
        actions.push(PanelAction::SetSort(key, SortDirection::Asc));
    }
    if args.desc {
        actions.push(PanelAction::SetSortDirection(SortDirection::Desc));
    }
    if let Some(group) = args.group {
        actions.push(PanelAction::SetGroupBy(group.into()));
    }
    actions.extend(args.collapse.iter().cloned().map(PanelAction::ToggleGroup));
    if let Some(id) = &args.select {
        actions.push(PanelAction::Select(id.clone()));
    }
    actions.extend(args.expand.iter().cloned().map(PanelAction::Expand));
    if args.dependencies {
        actions.push(PanelAction::ToggleDependencies);
    }
    actions
}

fn run(args: &Args, config: &Config) -> Result<ExitCode> {
    let data = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;
    let mut panel =
        CardPanel::new(Default::default(), &config.panel).with_policy(config.rule_policy());
    let report = panel
        .import_cards(&data)
        .with_context(|| format!("importing {}", args.snapshot.display()))?;
    info!(
        target: "runtime",
        cards = report.cards_imported,
        advisories = report.advisories.len(),
        "snapshot_loaded"
    );

    if let Some(insert) = &args.insert
        && let [id, text] = insert.as_slice()
    {
        if config.editor.read_only {
            warn!(target: "runtime", id = %id, "insert_skipped_read_only");
        } else {
            panel
                .insert_code(id, text, args.at)
                .with_context(|| format!("inserting into {id}"))?;
        }
    }

    for action in view_actions(args) {
        panel.dispatch(action);
    }
    if args.expand_all {
        panel.expand_all();
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.dependency_order {
        render::write_dependency_order(&mut out, &panel)?;
    } else {
        render::write_view(&mut out, &panel, &config.editor)?;
    }
    let rules = panel.rule_report();
    render::write_report(&mut out, &rules)?;
    out.flush()?;

    if let Some(path) = &args.export {
        let snapshot = panel.export_cards()?;
        std::fs::write(path, snapshot).with_context(|| format!("writing {}", path.display()))?;
        info!(target: "runtime", path = %path.display(), "snapshot_exported");
    }

    if args.check && rules.errors().next().is_some() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let config = load_from(args.config.clone())?;
    info!(
        target: "runtime",
        config_override = args.config.is_some(),
        width = config.panel.width,
        theme = %config.panel.theme,
        font_size = config.editor.font_size,
        tab_size = config.editor.tab_size,
        "config_loaded"
    );
    let code = run(&args, &config)?;
    info!(target: "runtime", "shutdown");
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{Card, CardCollection, PanelConfig};

    #[test]
    fn parses_view_flags() {
        let args = Args::try_parse_from([
            "cardpanel",
            "cards.json",
            "--search",
            "user",
            "--type",
            "function",
            "--sort",
            "name",
            "--desc",
            "--group",
            "status",
        ])
        .unwrap();
        assert_eq!(args.kind, Some(Filter::Only(CardType::Function)));
        assert_eq!(args.sort, Some(SortKey::Name));
        let actions = view_actions(&args);
        assert_eq!(actions[0], PanelAction::SetSearch("user".into()));
        assert!(actions.contains(&PanelAction::SetSortDirection(SortDirection::Desc)));
        assert!(actions.contains(&PanelAction::SetGroupBy(GroupBy::Status)));
    }

    #[test]
    fn expand_flag_keeps_preexpanded_card_open() {
        let mut card = Card::new("load", CardType::Function, "loadUser").with_code("load();");
        card.expanded = true;
        let mut panel = CardPanel::new(
            CardCollection::new(vec![card]).unwrap(),
            &PanelConfig::default(),
        );
        assert!(panel.state().is_expanded("load"));

        let args = Args::try_parse_from(["cardpanel", "c.json", "--expand", "load"]).unwrap();
        for action in view_actions(&args) {
            panel.dispatch(action);
        }
        assert!(panel.state().is_expanded("load"));
    }

    #[test]
    fn rejects_unknown_variant() {
        let err =
            Args::try_parse_from(["cardpanel", "cards.json", "--status", "pending"]).unwrap_err();
        assert!(err.to_string().contains("success, warning, error"));
    }

    #[test]
    fn type_filter_accepts_all() {
        let args = Args::try_parse_from(["cardpanel", "c.json", "--type", "all"]).unwrap();
        assert_eq!(args.kind, Some(Filter::All));
    }

    #[test]
    fn position_argument() {
        assert_eq!(parse_position("3:7"), Ok(TextPosition::new(3, 7)));
        assert!(parse_position("3").is_err());
        assert!(parse_position("a:1").is_err());
        let args = Args::try_parse_from([
            "cardpanel", "c.json", "--insert", "load", "// note\n", "--at", "2:1",
        ])
        .unwrap();
        assert_eq!(
            args.insert.as_deref(),
            Some(&["load".to_string(), "// note\n".to_string()][..])
        );
        assert_eq!(args.at, Some(TextPosition::new(2, 1)));
    }
}
