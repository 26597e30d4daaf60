//! On-disk script storage.
//!
//! Each script lives in its own directory named by an 8-char hex id:
//! `<scripts_dir>/<id>/meta.json` holds the metadata, `<scripts_dir>/<id>/script`
//! holds the executable body.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::platform::{NativePlatform, Platform};

pub const SCRIPT_ID_LEN: usize = 8;
pub const DEFAULT_BODY: &str = "#!/bin/bash\n\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScriptStore {
    scripts_dir: PathBuf,
}

impl ScriptStore {
    pub fn new(scripts_dir: PathBuf) -> Self {
        Self { scripts_dir }
    }

    pub fn ensure_layout(&self) -> Result<()> {
        std::fs::create_dir_all(&self.scripts_dir)?;
        Ok(())
    }

    /// All stored scripts sorted by id. Entries without a readable
    /// `meta.json` are skipped rather than failing the whole listing.
    pub fn list(&self) -> Result<Vec<(String, ScriptMeta)>> {
        let mut scripts = Vec::new();
        if !self.scripts_dir.exists() {
            return Ok(scripts);
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.scripts_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                ids.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        ids.sort();
        for id in ids {
            match self.read_meta(&id) {
                Ok(Some(meta)) => scripts.push((id, meta)),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping script {}: {}", id, e),
            }
        }
        Ok(scripts)
    }

    pub fn create(&self, name: &str, description: &str, body: &str) -> Result<(String, ScriptMeta)> {
        let id = short_id(SCRIPT_ID_LEN);
        let meta = ScriptMeta {
            name: name.to_string(),
            description: description.to_string(),
            created: unix_now(),
            schedule: None,
        };
        self.write_meta(&id, &meta)?;
        self.write_body(&id, body)?;
        Ok((id, meta))
    }

    pub fn read_meta(&self, id: &str) -> Result<Option<ScriptMeta>> {
        let path = self.script_dir(id).join("meta.json");
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub fn write_meta(&self, id: &str, meta: &ScriptMeta) -> Result<()> {
        let dir = self.script_dir(id);
        std::fs::create_dir_all(&dir)?;
        let raw = serde_json::to_string_pretty(meta)?;
        std::fs::write(dir.join("meta.json"), raw)?;
        Ok(())
    }

    pub fn read_body(&self, id: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.script_path(id))?)
    }

    pub fn write_body(&self, id: &str, body: &str) -> Result<()> {
        let dir = self.script_dir(id);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("script");
        std::fs::write(&path, body)?;
        NativePlatform::set_executable(&path);
        Ok(())
    }

    /// Update the stored schedule. `None` removes the key from `meta.json`.
    pub fn set_schedule(&self, id: &str, schedule: Option<String>) -> Result<()> {
        let Some(mut meta) = self.read_meta(id)? else {
            anyhow::bail!("script {} does not exist", id);
        };
        meta.schedule = schedule.filter(|s| !s.is_empty());
        self.write_meta(id, &meta)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.script_dir(id).join("meta.json").exists()
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let dir = self.script_dir(id);
        if !dir.exists() {
            return Ok(false);
        }
        std::fs::remove_dir_all(&dir)?;
        Ok(true)
    }

    pub fn script_path(&self, id: &str) -> PathBuf {
        self.script_dir(id).join("script")
    }

    fn script_dir(&self, id: &str) -> PathBuf {
        self.scripts_dir.join(id)
    }
}

/// Guards path traversal: ids are exactly 8 lowercase hex chars.
pub fn valid_id(id: &str) -> bool {
    id.len() == SCRIPT_ID_LEN && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Short random identifier, the leading `len` chars of a v4 uuid.
pub(crate) fn short_id(len: usize) -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(len);
    id
}

fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
