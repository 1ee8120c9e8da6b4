//! Text summary builder for CLI output.
//!
//! Formats check results, aggregated ranges and VGC lists as human-readable lines.

use crate::aggregate::DaySummary;
use crate::export::vgc_list_rows;
use crate::helpers::date::display_day;
use crate::model::{CheckProgress, DayResult, Slice};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

const HEADERS: [&str; 9] = [
    "From", "To", "#Children", "Required", "#Staff", "BKR", "VGC", "3-UURS", "Details",
];

fn opt_num(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "-".into())
}

fn row(slice: &Slice) -> [String; 9] {
    [
        slice.from.clone(),
        slice.to.clone(),
        opt_num(slice.children),
        opt_num(slice.required_staff),
        opt_num(slice.staff),
        slice.bkr.clone().unwrap_or_default(),
        slice.vgc.clone().unwrap_or_default(),
        slice.three_uurs.clone().unwrap_or_default(),
        slice.details.join("; "),
    ]
}

/// Left-aligned table; the last column is not padded.
fn table<const N: usize>(headers: [&str; N], rows: &[[String; N]]) -> Vec<String> {
    let mut widths = headers.map(|h| h.chars().count());
    for r in rows {
        for (w, cell) in widths.iter_mut().zip(r.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let fmt = |cells: Vec<&str>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i + 1 == N {
                    c.to_string()
                } else {
                    format!("{c:<width$}", width = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    let mut lines = vec![fmt(headers.to_vec())];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for r in rows {
        lines.push(fmt(r.iter().map(String::as_str).collect()));
    }
    lines
}

/// Lines for one day: slice table, per-rule counts, 3-UURS summary and merged ranges.
pub(crate) fn build_day_summary(day: &DayResult, summary: &DaySummary) -> TextSummary {
    let mut lines = vec![format!("Check results for {}", display_day(&day.day))];

    if day.slices.is_empty() {
        lines.push("No slices in result".into());
    } else {
        let rows: Vec<_> = day.slices.iter().map(row).collect();
        lines.extend(table(HEADERS, &rows));
    }

    lines.push(String::new());
    lines.push("Summary".into());
    for rule in &summary.rules {
        lines.push(format!(
            "  {}: Yes ({}), No ({})",
            rule.rule.label(),
            rule.counts.yes,
            rule.counts.no
        ));
    }
    let three = summary.three_uurs.clone().unwrap_or_default();
    lines.push(format!(
        "  3-UURS: {}",
        three.status.as_deref().unwrap_or("N/A")
    ));
    if let Some(reason) = three.reason.as_deref().filter(|r| !r.trim().is_empty()) {
        lines.push(format!("  Reason: {reason}"));
    }
    if !three.deviations.is_empty() {
        lines.push("  Deviations:".into());
        for dev in &three.deviations {
            lines.push(format!("    - {dev}"));
        }
    }

    let ranges: Vec<_> = summary.ranges().collect();
    if !ranges.is_empty() {
        lines.push(String::new());
        lines.push("Non-compliant ranges".into());
        for r in ranges {
            lines.push(format!(
                "  {} {}-{} ({} slice{}): {}",
                r.rule.label(),
                r.from,
                r.to,
                r.slices,
                if r.slices == 1 { "" } else { "s" },
                r.recommendation()
            ));
            for d in &r.details {
                lines.push(format!("      {d}"));
            }
        }
    }

    TextSummary { lines }
}

/// One-line status of a check.
pub(crate) fn progress_line(check_id: &str, progress: &CheckProgress) -> String {
    let message = if progress.status.message.is_empty() {
        "unknown"
    } else {
        progress.status.message.as_str()
    };
    match progress.status.progress {
        Some(p) => format!("Check {check_id}: {message} ({p:.0}%)"),
        None => format!("Check {check_id}: {message}"),
    }
}

/// Staff member / children table of a generated VGC list.
pub(crate) fn build_vgc_list(list: &serde_json::Value) -> TextSummary {
    let rows: Vec<[String; 2]> = vgc_list_rows(list)
        .into_iter()
        .map(|(person, children)| [person, children])
        .collect();
    if rows.is_empty() {
        return TextSummary {
            lines: vec!["Geen data beschikbaar".into()],
        };
    }
    TextSummary {
        lines: table(["Personeel", "Kinderen"], &rows),
    }
}
