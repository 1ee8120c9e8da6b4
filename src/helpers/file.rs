use crate::model::FileKind;
use anyhow::{bail, Result};
use std::path::Path;

/// Stored documents are named `<8-char key>_<original name>`.
const KEY_LEN: usize = 8;

/// Object key embedded in a stored file name, if the name is long enough to carry one.
pub fn key_from_file_name(name: &str) -> Option<&str> {
    if name.chars().count() <= KEY_LEN {
        return None;
    }
    let end = name
        .char_indices()
        .nth(KEY_LEN)
        .map(|(i, _)| i)
        .unwrap_or(name.len());
    Some(&name[..end])
}

/// Original file name of a stored document: last path component without the key prefix.
pub fn display_name(stored: &str) -> String {
    let last = stored.rsplit(['/', '\\']).next().unwrap_or(stored);
    last.chars().skip(KEY_LEN + 1).collect()
}

/// Download path of a stored document as listed by `/requirements`.
pub fn document_path(kind: FileKind, stored: &str) -> String {
    format!("/documents/{}/{}", kind.as_str(), stored)
}

/// MIME type sent with an upload. VGC lists must be JSON; planning documents PDF or images.
pub fn mime_for(kind: FileKind, path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if kind == FileKind::VgcList {
        if ext == "json" {
            return Ok("application/json");
        }
        bail!("{} expects a .json file, got {}", kind.title(), path.display());
    }
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        _ => bail!(
            "{} expects a PDF or image file, got {}",
            kind.title(),
            path.display()
        ),
    };
    Ok(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_first_eight_chars_of_long_names() {
        assert_eq!(key_from_file_name("a1b2c3d4_planning.pdf"), Some("a1b2c3d4"));
        assert_eq!(key_from_file_name("a1b2c3d4"), None);
        assert_eq!(key_from_file_name(""), None);
    }

    #[test]
    fn display_name_strips_dirs_and_key() {
        assert_eq!(
            display_name("uploads/staff/a1b2c3d4_rooster week 2.pdf"),
            "rooster week 2.pdf"
        );
        assert_eq!(display_name("C:\\tmp\\a1b2c3d4_x.png"), "x.png");
        assert_eq!(display_name("short"), "");
    }

    #[test]
    fn vgc_lists_must_be_json() {
        assert_eq!(
            mime_for(FileKind::VgcList, Path::new("vgc.JSON")).unwrap(),
            "application/json"
        );
        assert!(mime_for(FileKind::VgcList, Path::new("vgc.pdf")).is_err());
    }

    #[test]
    fn planning_accepts_pdf_and_images_only() {
        assert_eq!(
            mime_for(FileKind::StaffPlanning, Path::new("a.pdf")).unwrap(),
            "application/pdf"
        );
        assert_eq!(
            mime_for(FileKind::ChildPlanning, Path::new("scan.jpeg")).unwrap(),
            "image/jpeg"
        );
        assert!(mime_for(FileKind::ChildRegistration, Path::new("a.docx")).is_err());
    }
}
