use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::wizard::WizardState;

pub const SESSION_FILE: &str = "session.json";

/// The wizard's state between two invocations, kept as one JSON document
/// in the data directory.
#[derive(Debug)]
pub struct SessionStore {
    pub data_dir: PathBuf,
    pub session_path: PathBuf,
}

impl SessionStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let session_path = data_dir.join(SESSION_FILE);

        info!(
            data_dir = %data_dir.display(),
            session = %session_path.display(),
            "opened session store"
        );
        Ok(Self {
            data_dir,
            session_path,
        })
    }

    /// A missing or empty file is a fresh session.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<WizardState> {
        if !self.session_path.exists() {
            debug!("no saved session; starting fresh");
            return Ok(WizardState::default());
        }

        let raw = fs::read_to_string(&self.session_path)
            .with_context(|| format!("failed reading {}", self.session_path.display()))?;
        if raw.trim().is_empty() {
            return Ok(WizardState::default());
        }

        let state: WizardState = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.session_path.display()))?;
        debug!(
            step = ?state.step,
            employees = state.store.employees().len(),
            tasks = state.store.tasks().len(),
            "loaded session"
        );
        Ok(state)
    }

    #[tracing::instrument(skip(self, state), fields(step = ?state.step))]
    pub fn save(&self, state: &WizardState) -> anyhow::Result<()> {
        let serialized = serde_json::to_vec_pretty(state).context("failed to encode session")?;
        write_atomic(&self.session_path, &serialized)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.session_path.display(), err))
    }
}

/// Writes through a temp file in the target's directory, so readers see
/// either the old contents or the new ones.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    debug!(file = %path.display(), size = bytes.len(), "writing atomically");
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::wizard::{Step, WizardState};

    use super::{SESSION_FILE, SessionStore, write_atomic};

    #[test]
    fn missing_session_is_fresh() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(temp.path()).expect("open");
        let state = store.load().expect("load");
        assert_eq!(state.step, Step::CreateProject);
        assert!(!state.store.has_entities());
    }

    #[test]
    fn saved_session_comes_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::open(&temp.path().join("nested")).expect("open");

        let mut state = WizardState::default();
        state.step = Step::ManageTasks;
        state.tracker.mark_entity_mutated();
        state.project_form.name = "Launch".to_string();
        store.save(&state).expect("save");

        assert!(temp.path().join("nested").join(SESSION_FILE).exists());
        assert_eq!(store.load().expect("reload"), state);
    }

    #[test]
    fn empty_file_is_fresh() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join(SESSION_FILE), "  \n").expect("write");
        let store = SessionStore::open(temp.path()).expect("open");
        assert_eq!(store.load().expect("load").step, Step::CreateProject);
    }

    #[test]
    fn atomic_write_replaces_contents() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out.bin");
        write_atomic(&path, b"first").expect("first");
        write_atomic(&path, b"second").expect("second");
        assert_eq!(std::fs::read(&path).expect("read"), b"second");
    }
}
