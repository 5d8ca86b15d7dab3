//! Experiment note storage.
//!
//! | Store             | Backing                         |
//! |-------------------|---------------------------------|
//! | [`FsNoteStore`]   | one `<name>.json` file per note |
//! | [`MemoryNoteStore`] | in-process map (tests, demos) |
//!
//! Both apply the same name check and size limit.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use log::info;
use parking_lot::Mutex;

use crate::app::ports::NoteStore;
use crate::error::NoteError;

/// Largest note body accepted, in bytes.
pub const MAX_NOTE_SIZE: usize = 50 * 1024;

const NOTE_EXTENSION: &str = "json";

/// Check a client-supplied name for use as a file stem.
///
/// Only ASCII letters, digits, `-` and `_` are allowed. Anything else is
/// rejected rather than rewritten, so two names never share a file.
pub fn validate_name(name: &str) -> Result<&str, NoteError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if name.is_empty() || !name.chars().all(allowed) {
        return Err(NoteError::InvalidName);
    }
    Ok(name)
}

fn check_size(text: &str) -> Result<(), NoteError> {
    if text.len() > MAX_NOTE_SIZE {
        return Err(NoteError::TooLarge {
            len: text.len(),
            max: MAX_NOTE_SIZE,
        });
    }
    Ok(())
}

// ── Filesystem ───────────────────────────────────────────────

pub struct FsNoteStore {
    dir: PathBuf,
}

impl FsNoteStore {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, NoteError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(NoteError::Io)?;
        Ok(Self { dir })
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, NoteError> {
        let stem = validate_name(name)?;
        Ok(self.dir.join(format!("{stem}.{NOTE_EXTENSION}")))
    }
}

impl NoteStore for FsNoteStore {
    fn list(&self) -> Result<Vec<String>, NoteError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(NoteError::Io)? {
            let path = entry.map_err(NoteError::Io)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(NOTE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> Result<String, NoteError> {
        let path = self.path_for(name)?;
        Ok(fs::read_to_string(path)?)
    }

    fn save(&self, name: &str, text: &str) -> Result<(), NoteError> {
        check_size(text)?;
        let path = self.path_for(name)?;
        // Readers never observe a partially written note.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text).map_err(NoteError::Io)?;
        fs::rename(&tmp, &path).map_err(NoteError::Io)?;
        info!("[notes] saved {} ({} bytes)", path.display(), text.len());
        Ok(())
    }
}

// ── In-memory ────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryNoteStore {
    notes: Mutex<BTreeMap<String, String>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoteStore for MemoryNoteStore {
    fn list(&self) -> Result<Vec<String>, NoteError> {
        Ok(self.notes.lock().keys().cloned().collect())
    }

    fn load(&self, name: &str) -> Result<String, NoteError> {
        let key = validate_name(name)?;
        self.notes.lock().get(key).cloned().ok_or(NoteError::NotFound)
    }

    fn save(&self, name: &str, text: &str) -> Result<(), NoteError> {
        check_size(text)?;
        let key = validate_name(name)?;
        self.notes.lock().insert(key.to_owned(), text.to_owned());
        Ok(())
    }
}
