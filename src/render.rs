//! Terminal rendering of the timeline, legend and diagnostics.
//!
//! Everything returns a `String`; printing is up to the command.

use agenda_core::diagnostics::{Diagnostics, Outcome};
use agenda_core::{
    AttributeMap, DisplayAttribute, NormalizedEvent, SourceKind, SourceRegistry, Timeline,
};
use owo_colors::{AnsiColors, OwoColorize};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub trait Render {
    fn render(&self) -> String;
}

fn ansi(attribute: DisplayAttribute) -> AnsiColors {
    match attribute {
        DisplayAttribute::Red => AnsiColors::Red,
        DisplayAttribute::Green => AnsiColors::Green,
        DisplayAttribute::Yellow => AnsiColors::Yellow,
        DisplayAttribute::Blue => AnsiColors::Blue,
        DisplayAttribute::Magenta => AnsiColors::Magenta,
        DisplayAttribute::Cyan => AnsiColors::Cyan,
        DisplayAttribute::White => AnsiColors::White,
        DisplayAttribute::BrightRed => AnsiColors::BrightRed,
        DisplayAttribute::BrightGreen => AnsiColors::BrightGreen,
        DisplayAttribute::BrightYellow => AnsiColors::BrightYellow,
        DisplayAttribute::BrightBlue => AnsiColors::BrightBlue,
        DisplayAttribute::BrightMagenta => AnsiColors::BrightMagenta,
        DisplayAttribute::BrightCyan => AnsiColors::BrightCyan,
        DisplayAttribute::BrightWhite => AnsiColors::BrightWhite,
    }
}

fn paint(text: &str, attribute: DisplayAttribute) -> String {
    text.color(ansi(attribute)).to_string()
}

/// Summary (underlined, in the source color), span and location on the first
/// line, description below.
impl Render for NormalizedEvent {
    fn render(&self) -> String {
        let summary = self.summary.color(ansi(self.attribute)).underline().to_string();
        let mut line = format!(
            "{} {} ~ {}",
            summary,
            self.start.format(TIME_FORMAT),
            self.end.format(TIME_FORMAT)
        );
        if !self.location.is_empty() {
            line.push_str(&format!(" @{}", self.location));
        }

        format!("{}\n{}\n", line, self.description)
    }
}

pub fn render_timeline(timeline: &Timeline) -> String {
    if timeline.is_empty() {
        return format!("{}\n", "No events found".dimmed());
    }

    timeline
        .events()
        .iter()
        .map(|event| format!("{}\n", event.render()))
        .collect()
}

/// "Calendar List" followed by every source name in its color.
pub fn render_legend(attributes: &AttributeMap, registry: &SourceRegistry) -> String {
    let names: Vec<String> = attributes
        .legend(registry)
        .map(|(source, attribute)| paint(&source.name, attribute))
        .collect();

    format!("Calendar List\n{}", names.join(" "))
}

/// One line per source, for `agenda sources`.
pub fn render_source_list(attributes: &AttributeMap, registry: &SourceRegistry) -> String {
    attributes
        .legend(registry)
        .map(|(source, attribute)| {
            let kind = match source.kind() {
                SourceKind::ServiceCalendar => "google",
                SourceKind::FeedUrl => "ics",
            };
            format!(
                "{} {} {}",
                paint("●", attribute),
                paint(&source.name, attribute),
                format!("({kind}: {})", source.id).dimmed()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_diagnostics(diagnostics: &Diagnostics, registry: &SourceRegistry) -> String {
    let mut lines = vec!["Diagnostics".bold().to_string()];

    for report in &diagnostics.reports {
        let name = registry
            .get(&report.source)
            .map(|source| source.name.as_str())
            .unwrap_or(report.source.as_str());

        let outcome = match &report.outcome {
            Outcome::Completed => "ok".green().to_string(),
            Outcome::Failed(reason) => format!("failed: {reason}").red().to_string(),
            Outcome::Pending => "timed out".yellow().to_string(),
        };

        let mut line = format!("   {name}: {outcome}, {} events", report.delivered);
        if report.dropped > 0 {
            line.push_str(&format!(", {} dropped", report.dropped).yellow().to_string());
        }
        lines.push(line);
    }

    lines.join("\n")
}
