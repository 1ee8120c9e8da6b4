//! Which documents a check needs, and which ones are still missing.

use crate::model::{FileKind, ModuleSelection};
use crate::session::Session;
use serde::Serialize;

/// Kinds that must be uploaded for the selected modules.
pub fn required_kinds(modules: ModuleSelection) -> Vec<FileKind> {
    let mut kinds = vec![FileKind::StaffPlanning, FileKind::ChildPlanning];
    if modules.vgc {
        kinds.push(FileKind::VgcList);
    }
    if modules.three_hours {
        kinds.push(FileKind::ChildRegistration);
    }
    kinds
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub missing: Vec<&'static str>,
    pub can_start: bool,
}

impl Validation {
    pub fn message(&self) -> String {
        format!("Missing required documents: {}", self.missing.join(", "))
    }
}

pub fn validate(session: &Session, modules: ModuleSelection, date: Option<&str>) -> Validation {
    let mut missing = Vec::new();
    if !session.has(FileKind::StaffPlanning) {
        missing.push("staff-planning");
    }
    if !session.has(FileKind::ChildPlanning) {
        missing.push("child-planning");
    }
    if modules.vgc && !session.has(FileKind::VgcList) {
        missing.push("vgc_list");
    }
    if modules.three_hours && !session.has(FileKind::ChildRegistration) {
        missing.push("child-registration");
    }
    if date.map_or(true, |d| d.trim().is_empty()) {
        missing.push("Checking date");
    }
    Validation {
        can_start: missing.is_empty(),
        missing,
    }
}

/// Object keys sent with a check, grouped by kind in a fixed order.
pub fn document_keys(session: &Session, modules: ModuleSelection) -> Vec<String> {
    required_kinds(modules)
        .into_iter()
        .flat_map(|k| session.files(k).iter().map(|f| f.object_key.clone()))
        .collect()
}

/// VGC-list creation needs one staff planning, child planning and child registration.
pub fn validate_vgc_creation(session: &Session) -> Validation {
    let mut missing = Vec::new();
    if !session.has(FileKind::StaffPlanning) {
        missing.push("staff-planning");
    }
    if !session.has(FileKind::ChildPlanning) {
        missing.push("child-planning");
    }
    if !session.has(FileKind::ChildRegistration) {
        missing.push("child-registration");
    }
    Validation {
        can_start: missing.is_empty(),
        missing,
    }
}

/// First key per kind, as sent to `/vgc-lists`.
pub fn vgc_creation_keys(session: &Session) -> Vec<String> {
    [
        FileKind::StaffPlanning,
        FileKind::ChildPlanning,
        FileKind::ChildRegistration,
    ]
    .into_iter()
    .filter_map(|k| session.files(k).first().map(|f| f.object_key.clone()))
    .collect()
}
