//! Text rendering of the popover
//!
//! Renders a [`PopoverView`] as a compact colored report for the terminal.
//! Colors follow the resolved theme and the meter level; `colored` drops
//! them automatically when stdout is not a terminal or `NO_COLOR` is set.

use colored::{ColoredString, Colorize};

use super::{ChartDay, MeterLevel, ModelBar, ModelFamily, PopoverView, ReadyView, UsageMeter};
use crate::format::format_token_count;
use crate::settings::AppSettings;
use crate::theme::Theme;

const METER_WIDTH: usize = 20;
const MODEL_BAR_WIDTH: usize = 16;
const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render the complete popover as text
pub fn render_report(view: &PopoverView) -> String {
    match view {
        PopoverView::Loading => format!("{}\n", "Loading usage data...".dimmed()),
        PopoverView::Error { message } => format!("{}\n", message.red()),
        PopoverView::Ready(ready) => render_ready(ready),
    }
}

fn render_ready(view: &ReadyView) -> String {
    let theme = view.theme;
    let mut out = String::new();

    // Header
    let status = if view.header.refreshing {
        format!("{} (refreshing)", view.header.updated)
    } else {
        view.header.updated.clone()
    };
    out.push_str(&format!("{}  {}\n", heading("Claude Pulse", theme), status.dimmed()));
    if let Some(error) = &view.header.stale_error {
        out.push_str(&format!("{} {}\n", "!".yellow().bold(), error.yellow()));
    }

    // Window
    let window = &view.window;
    out.push_str(&format!(
        "\n{}  {}\n",
        heading(&window.title, theme),
        format!("{} msgs", window.message_count).dimmed()
    ));
    if let Some(meter) = &window.meter {
        out.push_str(&format!("  {}\n", meter_line(meter)));
    }
    out.push_str(&format!(
        "  Output {}  Input {}  Cache Read {}  Sessions {}\n",
        window.output.bold(),
        window.input.bold(),
        window.cache_read.bold(),
        window.sessions.to_string().bold()
    ));

    // Week
    let weekly = &view.weekly;
    out.push_str(&format!(
        "\n{}  {}\n",
        heading("This Week", theme),
        format!("{} msgs · {} sessions", weekly.message_count, weekly.session_count).dimmed()
    ));
    let chart: Vec<String> = weekly.chart.days.iter().map(chart_cell).collect();
    out.push_str(&format!("  {}\n", chart.join("  ")));
    out.push_str(&format!(
        "  Output {}  Input {}  Cache {}\n",
        weekly.output.bold(),
        weekly.input.bold(),
        weekly.cache.bold()
    ));

    // Models
    out.push_str(&format!("\n{}\n", heading("Model Breakdown", theme)));
    if view.models.is_empty() {
        out.push_str(&format!("  {}\n", "No model data in this window".dimmed()));
    } else {
        let name_width = view
            .models
            .iter()
            .map(|m| m.display_name.chars().count())
            .max()
            .unwrap_or(0);
        for model in &view.models {
            out.push_str(&format!("  {}\n", model_line(model, name_width)));
        }
    }

    // Cost
    out.push_str(&format!(
        "\n{}  {} {}   This Week {}\n",
        heading("Est. Cost", theme),
        window.title,
        view.cost.window.green().bold(),
        view.cost.weekly.green().bold()
    ));

    if view.settings_open {
        out.push('\n');
        out.push_str(&render_settings(&view.settings, theme));
    }

    out
}

/// Render the settings panel
pub fn render_settings(settings: &AppSettings, theme: Theme) -> String {
    let limit = settings
        .usage_limit_tokens
        .map(format_token_count)
        .unwrap_or_else(|| "None".to_string());

    let mut out = format!("{}\n", heading("Settings", theme));
    out.push_str(&format!(
        "  Refresh Interval         {}\n",
        settings.refresh_interval_secs.label()
    ));
    out.push_str(&format!(
        "  Window Duration (hours)  {}\n",
        settings.window_hours
    ));
    out.push_str(&format!("  Token Limit              {}\n", limit));
    out.push_str(&format!("  Theme                    {}\n", settings.theme));
    out
}

fn heading(text: &str, theme: Theme) -> ColoredString {
    match theme {
        Theme::Dark => text.bright_white().bold(),
        Theme::Light => text.black().bold(),
    }
}

fn meter_line(meter: &UsageMeter) -> String {
    let bar = progress_bar(meter.percent, METER_WIDTH);
    let bar = match meter.level {
        MeterLevel::Normal => bar.green(),
        MeterLevel::Warning => bar.yellow(),
        MeterLevel::Critical => bar.red(),
    };
    format!("{}  {}  {}", bar, meter.label(), meter.percent_label().bold())
}

fn model_line(model: &ModelBar, name_width: usize) -> String {
    let dot = match model.family {
        ModelFamily::Opus => "●".magenta(),
        ModelFamily::Sonnet => "●".blue(),
        ModelFamily::Haiku => "●".green(),
    };
    format!(
        "{} {:<width$}  {}  {}",
        dot,
        model.display_name,
        progress_bar(model.width_percent, MODEL_BAR_WIDTH).cyan(),
        format_token_count(model.output_tokens),
        width = name_width
    )
}

fn chart_cell(day: &ChartDay) -> String {
    let initial = &day.label[..1];
    if !day.has_data {
        return format!("{} {}", initial, "·".dimmed());
    }
    let index = ((day.height_percent / 100.0) * (SPARKS.len() - 1) as f64).round() as usize;
    let spark = SPARKS[index.min(SPARKS.len() - 1)];
    format!("{} {}", initial, spark.to_string().cyan())
}

/// `██████▓░░░` filled to `percent` of `width` cells
pub fn progress_bar(percent: f64, width: usize) -> String {
    let pct = percent.clamp(0.0, 100.0);
    if pct >= 100.0 {
        return "█".repeat(width);
    }

    let filled = (width as f64 * pct / 100.0) as usize;
    let empty = width.saturating_sub(filled).saturating_sub(1);
    format!("{}▓{}", "█".repeat(filled), "░".repeat(empty))
}
