//! Post-check processing utilities.
//!
//! Handles aggregation, auto-save and exports after a check or VGC list completes.

use crate::aggregate::{rules_present, summarize, DaySummary};
use crate::export;
use crate::helpers::date::parse_date;
use crate::model::{CheckProgress, DayResult};
use crate::session::{sanitize, Store};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Export and save switches taken from the command line.
#[derive(Debug, Clone, Default)]
pub(crate) struct OutputTargets {
    pub auto_save: bool,
    pub export_json: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
}

/// Result of post-check processing, ready for presentation layers.
pub(crate) struct ProcessedCheck {
    pub days: Vec<(DayResult, DaySummary)>,
    pub export_messages: Vec<String>,
    pub auto_saved_path: Option<PathBuf>,
}

/// Day as it appears in export file names: `YYYY-MM-DD` when it parses, else sanitized.
fn day_label(day: &str) -> String {
    match parse_date(day) {
        Some(d) => format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day()),
        None => sanitize(day),
    }
}

/// `report.csv` for a single day; `report-<day>.csv` when a result spans several days.
fn per_day_path(path: &Path, day: &str, days: usize) -> PathBuf {
    if days <= 1 {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("check");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}-{day}.{ext}"),
        None => format!("{stem}-{day}"),
    };
    path.with_file_name(name)
}

fn auto_save(targets: &OutputTargets, store: &Store, check_id: &str, progress: &CheckProgress) -> Option<PathBuf> {
    if !targets.auto_save {
        return None;
    }
    match serde_json::to_value(progress)
        .map_err(anyhow::Error::from)
        .and_then(|body| store.save_result(check_id, &body))
    {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!("auto-save of {check_id} failed: {e:#}");
            None
        }
    }
}

/// Process a finished check: summarize every day, auto-save, and run requested exports.
pub(crate) fn process_check_completion(
    targets: &OutputTargets,
    store: &Store,
    check_id: &str,
    progress: &CheckProgress,
) -> ProcessedCheck {
    let days: Vec<(DayResult, DaySummary)> = progress
        .day_results()
        .into_iter()
        .map(|day| {
            let rules = rules_present(&day.slices);
            let summary = summarize(&day, &rules);
            (day, summary)
        })
        .collect();

    let auto_saved_path = auto_save(targets, store, check_id, progress);

    let mut export_messages = Vec::new();
    if let Some(path) = targets.export_json.as_deref() {
        let body = progress.result.clone().unwrap_or(serde_json::Value::Null);
        match export::write_json(path, &body) {
            Ok(()) => export_messages.push(format!("Exported JSON: {}", path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }
    if let Some(path) = targets.export_csv.as_deref() {
        if days.is_empty() {
            export_messages.push("Export CSV skipped: no day results".into());
        }
        let mut used = HashSet::new();
        for (i, (day, _)) in days.iter().enumerate() {
            let mut label = day_label(&day.day);
            if !used.insert(label.clone()) {
                label = format!("{label}-{}", i + 1);
                used.insert(label.clone());
            }
            let target = per_day_path(path, &label, days.len());
            match export::write_text(&target, &export::slices_to_csv(&day.slices)) {
                Ok(()) => export_messages.push(format!("Exported CSV: {}", target.display())),
                Err(e) => export_messages.push(format!("Export CSV failed: {e:#}")),
            }
        }
    }

    ProcessedCheck {
        days,
        export_messages,
        auto_saved_path,
    }
}

/// Process a finished VGC-list run: auto-save and export the generated list.
pub(crate) fn process_vgc_completion(
    targets: &OutputTargets,
    store: &Store,
    check_id: &str,
    progress: &CheckProgress,
) -> (Vec<String>, Option<PathBuf>) {
    let auto_saved_path = auto_save(targets, store, check_id, progress);
    let mut messages = Vec::new();
    let Some(list) = progress.result.as_ref() else {
        if targets.export_json.is_some() || targets.export_csv.is_some() {
            messages.push("Export skipped: VGC list has no result yet".into());
        }
        return (messages, auto_saved_path);
    };
    if let Some(path) = targets.export_json.as_deref() {
        match export::write_json(path, list) {
            Ok(()) => messages.push(format!("Exported JSON: {}", path.display())),
            Err(e) => messages.push(format!("Export JSON failed: {e:#}")),
        }
    }
    if let Some(path) = targets.export_csv.as_deref() {
        match export::write_text(path, &export::vgc_list_to_csv(list)) {
            Ok(()) => messages.push(format!("Exported CSV: {}", path.display())),
            Err(e) => messages.push(format!("Export CSV failed: {e:#}")),
        }
    }
    (messages, auto_saved_path)
}
