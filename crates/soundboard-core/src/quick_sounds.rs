//! Quick-sound label to clip mapping, persisted as `label:path` lines.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use crate::error::MissingResource;
use crate::queue::Track;

/// Number of quick-sound slots offered by default.
pub const QUICK_SOUND_SLOTS: usize = 12;

/// Default label for slot `index` (1-based).
pub fn slot_label(index: usize) -> String {
    format!("Quick Sound {index}")
}

/// One slot and its assignment, if any.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct QuickSlot {
    pub label: String,
    pub path: Option<PathBuf>,
    /// Clip file name shown on the slot's button.
    pub name: Option<String>,
}

impl QuickSlot {
    fn new(label: String, path: Option<PathBuf>) -> Self {
        let name = path.as_ref().map(|p| Track::new(p.clone()).display_name());
        Self { label, path, name }
    }
}

#[derive(Debug)]
pub struct QuickSoundStore {
    path: PathBuf,
    entries: BTreeMap<String, PathBuf>,
}

impl QuickSoundStore {
    /// Load the mapping file; a missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => parse(&raw),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        tracing::info!(path = ?path, count = entries.len(), "quick sounds loaded");
        Ok(Self { path, entries })
    }

    /// Clip assigned to `label`, or [`MissingResource`] so the caller can prompt for one.
    pub fn resolve(&self, label: &str) -> Result<Track, MissingResource> {
        self.entries
            .get(label)
            .map(|p| Track::new(p.clone()))
            .ok_or_else(|| MissingResource {
                label: label.to_string(),
            })
    }

    /// Assign `path` to `label` and rewrite the file. Last write wins.
    pub fn assign(&mut self, label: &str, path: impl Into<PathBuf>) -> io::Result<()> {
        if label.is_empty() || label.contains(':') || label.contains('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid quick sound label {label:?}"),
            ));
        }
        let path = path.into();
        if path.to_string_lossy().contains('\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "quick sound path contains a newline",
            ));
        }
        let previous = self.entries.insert(label.to_string(), path);
        if let Err(err) = self.persist() {
            match previous {
                Some(old) => self.entries.insert(label.to_string(), old),
                None => self.entries.remove(label),
            };
            return Err(err);
        }
        tracing::info!(label, path = ?self.entries.get(label), "quick sound assigned");
        Ok(())
    }

    /// The default slots followed by any extra labels found in the file.
    pub fn slots(&self) -> Vec<QuickSlot> {
        let mut slots: Vec<QuickSlot> = (1..=QUICK_SOUND_SLOTS)
            .map(|i| {
                let label = slot_label(i);
                let path = self.entries.get(&label).cloned();
                QuickSlot::new(label, path)
            })
            .collect();
        for (label, path) in &self.entries {
            if !slots.iter().any(|slot| &slot.label == label) {
                slots.push(QuickSlot::new(label.clone(), Some(path.clone())));
            }
        }
        slots
    }

    fn persist(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = String::new();
        for (label, path) in &self.entries {
            out.push_str(label);
            out.push(':');
            out.push_str(&path.to_string_lossy());
            out.push('\n');
        }
        std::fs::write(&self.path, out)
    }
}

fn parse(raw: &str) -> BTreeMap<String, PathBuf> {
    let mut entries = BTreeMap::new();
    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((label, path)) if !label.is_empty() && !path.is_empty() => {
                entries.insert(label.to_string(), PathBuf::from(path));
            }
            _ => {
                tracing::warn!(line = lineno + 1, "skipping malformed quick sound entry");
            }
        }
    }
    entries
}
