use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection and polling settings shared by every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_timeout: Duration,
    pub user_agent: String,
}

/// Document categories accepted by `/uploads`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FileKind {
    #[serde(rename = "staff-planning")]
    StaffPlanning,
    #[serde(rename = "child-planning")]
    ChildPlanning,
    #[serde(rename = "child-registration")]
    ChildRegistration,
    #[serde(rename = "fixed-faces")]
    VgcList,
}

impl FileKind {
    pub const ALL: [FileKind; 4] = [
        FileKind::StaffPlanning,
        FileKind::ChildPlanning,
        FileKind::ChildRegistration,
        FileKind::VgcList,
    ];

    /// Value sent as `document_type` and used as key in requirement maps.
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::StaffPlanning => "staff-planning",
            FileKind::ChildPlanning => "child-planning",
            FileKind::ChildRegistration => "child-registration",
            FileKind::VgcList => "fixed-faces",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            FileKind::StaffPlanning => "Staff-Planning",
            FileKind::ChildPlanning => "Child-Planning",
            FileKind::ChildRegistration => "Child-Registration",
            FileKind::VgcList => "VGC List (JSON)",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record returned by the backend after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub object_key: String,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckModule {
    #[serde(rename = "bkr")]
    Bkr,
    #[serde(rename = "vgc")]
    Vgc,
    #[serde(rename = "three_hours")]
    ThreeHours,
}

impl CheckModule {
    pub fn as_check_str(self) -> &'static str {
        match self {
            CheckModule::Bkr => "bkr",
            CheckModule::Vgc => "vgc",
            CheckModule::ThreeHours => "three_hours",
        }
    }

    /// `/requirements` spells the 3-hour module differently from `/checks`.
    pub fn as_requirements_str(self) -> &'static str {
        match self {
            CheckModule::Bkr => "bkr",
            CheckModule::Vgc => "vgc",
            CheckModule::ThreeHours => "threeHours",
        }
    }
}

/// Set of enabled modules. BKR cannot be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleSelection {
    pub vgc: bool,
    pub three_hours: bool,
}

impl ModuleSelection {
    pub fn modules(self) -> Vec<CheckModule> {
        let mut modules = vec![CheckModule::Bkr];
        if self.vgc {
            modules.push(CheckModule::Vgc);
        }
        if self.three_hours {
            modules.push(CheckModule::ThreeHours);
        }
        modules
    }

    pub fn requirements_query(self) -> String {
        self.modules()
            .iter()
            .map(|m| m.as_requirements_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub date: String,
    pub modules: Vec<CheckModule>,
    pub document_keys: Vec<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VgcListRequest {
    pub document_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    Queued,
    Running,
    Completed,
    Failed,
}

impl CheckPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, CheckPhase::Completed | CheckPhase::Failed)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckStatus {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

impl CheckStatus {
    pub fn phase(&self) -> CheckPhase {
        match self.message.trim().to_ascii_lowercase().as_str() {
            "completed" | "done" | "finished" => CheckPhase::Completed,
            "failed" | "error" => CheckPhase::Failed,
            "queued" | "pending" => CheckPhase::Queued,
            _ => CheckPhase::Running,
        }
    }
}

/// Body of `GET /checks/{id}` and `GET /vgc-lists/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckProgress {
    #[serde(default)]
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl CheckProgress {
    pub fn phase(&self) -> CheckPhase {
        self.status.phase()
    }

    /// Day results embedded in `result`; entries without `day` and `slices` are skipped.
    pub fn day_results(&self) -> Vec<DayResult> {
        day_results_from(self.result.as_ref())
    }
}

pub fn day_results_from(result: Option<&serde_json::Value>) -> Vec<DayResult> {
    let Some(serde_json::Value::Array(items)) = result else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|v| v.get("day").is_some() && v.get("slices").is_some())
        .filter_map(|v| match serde_json::from_value::<DayResult>(v.clone()) {
            Ok(day) => Some(day),
            Err(e) => {
                tracing::warn!("skipping malformed day result: {e}");
                None
            }
        })
        .collect()
}

/// Per-slice verdict column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rule {
    Bkr,
    Vgc,
    ThreeUurs,
}

impl Rule {
    pub fn label(self) -> &'static str {
        match self {
            Rule::Bkr => "BKR",
            Rule::Vgc => "VGC",
            Rule::ThreeUurs => "3-UURS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Yes,
    No,
    NotApplicable,
}

impl Flag {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("Yes") => Flag::Yes,
            Some("No") => Flag::No,
            _ => Flag::NotApplicable,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayResult {
    pub day: String,
    #[serde(default)]
    pub slices: Vec<Slice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub three_uurs_summary: Option<ThreeUursSummary>,
}

/// One time slice of a check result. `raw` keeps the backend's column order for exports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>", into = "serde_json::Map<String, serde_json::Value>")]
pub struct Slice {
    pub from: String,
    pub to: String,
    pub children: Option<i64>,
    pub required_staff: Option<i64>,
    pub staff: Option<i64>,
    pub bkr: Option<String>,
    pub vgc: Option<String>,
    pub three_uurs: Option<String>,
    pub details: Vec<String>,
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl Slice {
    pub fn flag(&self, rule: Rule) -> Flag {
        let raw = match rule {
            Rule::Bkr => self.bkr.as_deref(),
            Rule::Vgc => self.vgc.as_deref(),
            Rule::ThreeUurs => self.three_uurs.as_deref(),
        };
        Flag::parse(raw)
    }
}

fn value_as_i64(v: Option<&serde_json::Value>) -> Option<i64> {
    match v? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_string(v: Option<&serde_json::Value>) -> Option<String> {
    match v? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn value_as_lines(v: Option<&serde_json::Value>) -> Vec<String> {
    match v {
        Some(serde_json::Value::String(s)) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|i| value_as_string(Some(i)))
            .filter(|l| !l.trim().is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Slice {
    fn from(raw: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            from: value_as_string(raw.get("From Time")).unwrap_or_default(),
            to: value_as_string(raw.get("To Time")).unwrap_or_default(),
            children: value_as_i64(raw.get("#Children")),
            required_staff: value_as_i64(raw.get("RequiredStaff")),
            staff: value_as_i64(raw.get("#Staff")),
            bkr: value_as_string(raw.get("BKR")),
            vgc: value_as_string(raw.get("VGC")),
            three_uurs: value_as_string(raw.get("3-UURS")),
            details: value_as_lines(raw.get("Details")),
            raw,
        }
    }
}

impl From<Slice> for serde_json::Map<String, serde_json::Value> {
    fn from(slice: Slice) -> Self {
        slice.raw
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreeUursSummary {
    #[serde(rename = "3-UURS", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "Reason", default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "Deviations", default, deserialize_with = "null_as_empty")]
    pub deviations: Vec<String>,
}

fn null_as_empty<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

/// Body of `GET /requirements`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirements {
    #[serde(default)]
    pub required_documents: serde_json::Map<String, serde_json::Value>,
}

impl Requirements {
    /// Stored file names listed for `kind`.
    pub fn documents(&self, kind: FileKind) -> Vec<String> {
        match self.required_documents.get(kind.as_str()) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Events emitted while watching a check, consumed by the CLI output layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PollEvent {
    Progress {
        check_id: String,
        phase: CheckPhase,
        message: String,
        progress: Option<f64>,
    },
    Info(String),
    Finished {
        // Boxed so the enum stays small; results carry every slice of the day.
        progress: Box<CheckProgress>,
    },
}

impl PollEvent {
    pub fn to_message(&self) -> String {
        match self {
            PollEvent::Progress {
                check_id,
                phase,
                message,
                progress,
            } => match progress {
                Some(p) => format!("{check_id}: {phase:?} ({message}, {:.0}%)", p),
                None => format!("{check_id}: {phase:?} ({message})"),
            },
            PollEvent::Info(msg) => msg.clone(),
            PollEvent::Finished { progress } => {
                format!("Finished: {}", progress.status.message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_messages_map_to_phases() {
        let status = |m: &str| CheckStatus {
            message: m.into(),
            progress: None,
        };
        assert_eq!(status("completed").phase(), CheckPhase::Completed);
        assert_eq!(status("Failed").phase(), CheckPhase::Failed);
        assert_eq!(status("queued").phase(), CheckPhase::Queued);
        assert_eq!(status("processing slices").phase(), CheckPhase::Running);
    }

    #[test]
    fn day_results_skip_non_day_entries() {
        let progress: CheckProgress = serde_json::from_value(json!({
            "status": { "message": "completed" },
            "result": [
                { "meta": "ignored" },
                {
                    "day": "2025-01-06",
                    "slices": [{
                        "From Time": "07:00", "To Time": "07:15",
                        "#Children": 9, "RequiredStaff": "2", "#Staff": 1,
                        "BKR": "No", "VGC": "Yes", "3-UURS": "N/A",
                        "Details": "1 more staff needed"
                    }],
                    "three_uurs_summary": { "3-UURS": "OK", "Deviations": null }
                }
            ]
        }))
        .unwrap();
        let days = progress.day_results();
        assert_eq!(days.len(), 1);
        let slice = &days[0].slices[0];
        assert_eq!(slice.from, "07:00");
        assert_eq!(slice.required_staff, Some(2));
        assert_eq!(slice.flag(Rule::Bkr), Flag::No);
        assert_eq!(slice.flag(Rule::ThreeUurs), Flag::NotApplicable);
        assert_eq!(slice.details, vec!["1 more staff needed".to_string()]);
        let summary = days[0].three_uurs_summary.as_ref().unwrap();
        assert!(summary.deviations.is_empty());
    }

    #[test]
    fn slice_serializes_back_in_backend_order() {
        let slice: Slice = serde_json::from_value(json!({
            "To Time": "08:00", "From Time": "07:45", "BKR": "Yes"
        }))
        .unwrap();
        let keys: Vec<_> = slice.raw.keys().cloned().collect();
        assert_eq!(keys, vec!["To Time", "From Time", "BKR"]);
    }

    #[test]
    fn requirements_query_spells_three_hours_for_requirements() {
        let sel = ModuleSelection {
            vgc: true,
            three_hours: true,
        };
        assert_eq!(sel.requirements_query(), "bkr,vgc,threeHours");
        let names: Vec<_> = sel.modules().iter().map(|m| m.as_check_str()).collect();
        assert_eq!(names, vec!["bkr", "vgc", "three_hours"]);
    }
}
