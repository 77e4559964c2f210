//! Plain-text rendering of the panel view and the rule report.

use core_config::EditorSettings;
use core_model::Card;
use core_query::GroupBy;
use core_rules::{DependencyIndex, RuleReport, Severity};
use core_state::CardPanel;
use std::io::{self, Write};

pub fn write_view(
    out: &mut impl Write,
    panel: &CardPanel,
    editor: &EditorSettings,
) -> io::Result<()> {
    let total = panel.cards().len();
    let visible = panel.visible_cards().len();
    if total == 0 {
        return writeln!(out, "no cards loaded");
    }
    if visible == 0 {
        return writeln!(out, "no cards match (0 of {total})");
    }
    writeln!(out, "{visible} of {total} cards")?;

    let index = DependencyIndex::new(panel.cards());
    let state = panel.state();
    for group in panel.visible_groups() {
        if state.group_by != GroupBy::None {
            let marker = if state.collapsed_groups.contains(group.key) { "+" } else { "-" };
            writeln!(out, "{marker} {}", group.key)?;
        }
        for card in group.cards {
            write_card(out, panel, &index, card, editor)?;
        }
    }
    Ok(())
}

fn write_card(
    out: &mut impl Write,
    panel: &CardPanel,
    index: &DependencyIndex<'_>,
    card: &Card,
    editor: &EditorSettings,
) -> io::Result<()> {
    let state = panel.state();
    let cursor = if state.is_selected(&card.id) { '>' } else { ' ' };
    writeln!(
        out,
        "{cursor} {:<24} {:<10} {:<8} L{}-{}",
        card.name, card.kind, card.status, card.start_line, card.end_line
    )?;
    if state.show_dependencies {
        if !card.dependencies.is_empty() {
            writeln!(out, "    depends on: {}", card.dependencies.join(", "))?;
        }
        let users: Vec<&str> = index
            .dependents_of(&card.id)
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        if !users.is_empty() {
            writeln!(out, "    used by: {}", users.join(", "))?;
        }
    }
    if state.is_expanded(&card.id) {
        write_code(out, card, editor)?;
    }
    Ok(())
}

/// Gutter numbers count from 1 within the card's code, the same numbering
/// `--at LINE:COLUMN` takes.
fn write_code(out: &mut impl Write, card: &Card, editor: &EditorSettings) -> io::Result<()> {
    let tab = " ".repeat(editor.tab_size as usize);
    let width = core_text::line_count(&card.code).to_string().len();
    for (i, line) in card.code.split('\n').enumerate() {
        let line = line.replace('\t', &tab);
        if editor.line_numbers {
            let number = i + 1;
            writeln!(out, "    {number:>width$} | {line}")?;
        } else {
            writeln!(out, "    {line}")?;
        }
    }
    Ok(())
}

pub fn write_report(out: &mut impl Write, report: &RuleReport) -> io::Result<()> {
    if report.is_clean() {
        return writeln!(out, "rules: clean");
    }
    writeln!(
        out,
        "rules: {} error(s), {} advisory",
        report.errors().count(),
        report.advisories().count()
    )?;
    for violation in &report.violations {
        let tag = match violation.severity() {
            Severity::Error => "error",
            Severity::Advisory => "note",
        };
        writeln!(out, "  {tag}: {violation}")?;
    }
    Ok(())
}

pub fn write_dependency_order(out: &mut impl Write, panel: &CardPanel) -> io::Result<()> {
    let index = DependencyIndex::new(panel.cards());
    match index.topological_order() {
        Ok(order) => {
            for (n, card) in order.iter().enumerate() {
                writeln!(out, "{:>3}. {} ({})", n + 1, card.name, card.id)?;
            }
            Ok(())
        }
        Err(blocked) => writeln!(out, "dependency cycle blocks: {}", blocked.join(", ")),
    }
}
