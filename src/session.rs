//! On-disk session: uploaded files per kind and the check ids seen so far.
//!
//! Every CLI invocation loads the session, mutates it, and writes it back. Results of
//! completed checks are saved next to it under `results/`.

use crate::model::{FileKind, UploadedFile};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub files: BTreeMap<FileKind, Vec<UploadedFile>>,
    #[serde(default)]
    pub check_ids: Vec<String>,
}

impl Session {
    pub fn files(&self, kind: FileKind) -> &[UploadedFile] {
        self.files.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, kind: FileKind) -> bool {
        !self.files(kind).is_empty()
    }

    /// Add a file under `kind`. Returns false when the key is already present.
    pub fn add_file(&mut self, kind: FileKind, file: UploadedFile) -> bool {
        let existing = self.files.entry(kind).or_default();
        if existing.iter().any(|f| f.object_key == file.object_key) {
            return false;
        }
        existing.push(file);
        true
    }

    /// Remove `key` from `kind`. Returns false when nothing matched.
    pub fn remove_file(&mut self, kind: FileKind, key: &str) -> bool {
        let Some(existing) = self.files.get_mut(&kind) else {
            return false;
        };
        let before = existing.len();
        existing.retain(|f| f.object_key != key);
        before != existing.len()
    }

    /// Kind that holds `key`, if any.
    pub fn kind_of(&self, key: &str) -> Option<FileKind> {
        FileKind::ALL
            .into_iter()
            .find(|k| self.files(*k).iter().any(|f| f.object_key == key))
    }

    pub fn record_check(&mut self, check_id: &str) {
        if !self.check_ids.iter().any(|c| c == check_id) {
            self.check_ids.push(check_id.to_string());
        }
    }

    pub fn merge_check_ids(&mut self, ids: impl IntoIterator<Item = String>) {
        for id in ids {
            self.record_check(&id);
        }
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

/// Location of session and saved results.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(d) => d,
            None => default_dir()?,
        };
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.dir.join("results")
    }

    pub fn load(&self) -> Result<Session> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(Session::default());
        }
        let data = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_slice(&data).with_context(|| format!("parse {}", path.display()))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir.display()))?;
        let path = self.session_path();
        let data = serde_json::to_vec_pretty(session)?;
        fs::write(&path, data).with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "session saved");
        Ok(())
    }

    /// Save the raw progress body of a finished check as `results/<id>.json`.
    pub fn save_result(&self, check_id: &str, body: &serde_json::Value) -> Result<PathBuf> {
        let dir = self.results_dir();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join(format!("{}.json", sanitize(check_id)));
        crate::export::write_json(&path, body)?;
        Ok(path)
    }
}

fn default_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("cannot determine a data directory; pass --state-dir")?;
    Ok(base.join("kdv-checks"))
}

/// File-name-safe form of an id or label.
pub(crate) fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
