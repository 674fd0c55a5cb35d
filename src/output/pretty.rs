use colored::Colorize;

use super::{MacroView, SegmentView, VariableView};
use crate::engine::TickReport;

fn status_icon(item: &MacroView) -> colored::ColoredString {
    if item.paused {
        "‖".dimmed()
    } else if item.matched {
        "●".green()
    } else {
        "○".white()
    }
}

/// Format a list of macros as a pretty table
#[must_use]
pub fn format_macros_pretty(macros: &[MacroView]) -> String {
    if macros.is_empty() {
        return "Macros (0)\n  No macros".to_string();
    }

    let mut output = format!("Macros ({})\n", macros.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for item in macros {
        let mut line = format!("{} {}", status_icon(item), item.name.bold());
        line.push_str(&format!(
            "  {}",
            format!(
                "{} conditions, {} actions",
                item.conditions.len(),
                item.actions.len()
            )
            .dimmed()
        ));
        if item.run_count > 0 {
            line.push_str(&format!("  {}", format!("runs: {}", item.run_count).cyan()));
        }
        if item.paused {
            line.push_str(&format!("  {}", "paused".yellow()));
        }
        output.push_str(&line);
        output.push('\n');
    }

    output
}

fn push_segments(output: &mut String, title: &str, segments: &[SegmentView]) {
    if segments.is_empty() {
        return;
    }
    output.push_str(&format!("\n{}\n", title.bold()));
    for (index, segment) in segments.iter().enumerate() {
        let mut line = format!("  {index}. ");
        if let Some(logic) = segment.logic {
            line.push_str(&format!("{} ", logic.display_name().cyan()));
        }
        let description = if segment.description.is_empty() {
            segment.id.clone()
        } else {
            segment.description.clone()
        };
        if segment.enabled {
            line.push_str(&description);
        } else {
            line.push_str(&format!("{} {}", description.dimmed(), "(disabled)".dimmed()));
        }
        if let Some(duration) = &segment.duration {
            line.push_str(&format!("  {}", duration.yellow()));
        }
        output.push_str(&line);
        output.push('\n');
    }
}

/// Format a single macro as pretty output
#[must_use]
pub fn format_macro_pretty(item: &MacroView) -> String {
    let mut output = format!("{} {}\n", status_icon(item), item.name.bold());
    output.push_str(&format!("  {}: {}\n", "State".dimmed(), item.phase.display_name()));
    output.push_str(&format!(
        "  {}: {}\n",
        "Paused".dimmed(),
        if item.paused { "yes" } else { "no" }
    ));
    output.push_str(&format!("  {}: {}\n", "Runs".dimmed(), item.run_count));
    if item.on_change {
        output.push_str(&format!("  {}: on change\n", "Trigger".dimmed()));
    }
    if let Some(interval) = item.check_interval_ms {
        output.push_str(&format!("  {}: {interval} ms\n", "Check interval".dimmed()));
    }
    output.push_str(&format!(
        "  {}: {}\n",
        "Pause on load".dimmed(),
        item.pause_save_behavior.display_name()
    ));
    if let Some(last_run) = item.last_run {
        output.push_str(&format!(
            "  {}: {}\n",
            "Last run".dimmed(),
            last_run.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    push_segments(&mut output, "Conditions", &item.conditions);
    push_segments(&mut output, "Actions", &item.actions);
    push_segments(&mut output, "Else actions", &item.else_actions);
    output
}

/// Format variables as a pretty table
#[must_use]
pub fn format_variables_pretty(variables: &[VariableView]) -> String {
    if variables.is_empty() {
        return "Variables (0)\n  No variables".to_string();
    }

    let width = variables.iter().map(|v| v.name.len()).max().unwrap_or(0);
    let mut output = format!("Variables ({})\n", variables.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for variable in variables {
        output.push_str(&format!(
            "{:width$}  {}  {}\n",
            variable.name.bold(),
            variable.value,
            variable.save_action.display_name().dimmed(),
        ));
    }
    output
}

/// Format an evaluation report as pretty output
#[must_use]
pub fn format_tick_report_pretty(report: &TickReport, passes: u64) -> String {
    let mut output = format!(
        "{} pass(es): {} evaluated, {} matched, {} paused, {} actions\n",
        passes,
        report.macros_evaluated,
        report.macros_matched.to_string().green(),
        report.macros_paused,
        report.actions_performed
    );
    for run in &report.runs {
        let list = if run.matched { "actions" } else { "else actions" };
        let status = if run.completed {
            "✓".green()
        } else {
            "✗".red()
        };
        output.push_str(&format!(
            "  {} {} ran {} {}\n",
            status,
            run.macro_name.bold(),
            run.actions_performed,
            list
        ));
    }
    if report.aborted {
        output.push_str(&format!("  {}\n", "aborted".yellow()));
    }
    output
}
