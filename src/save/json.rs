use std::path::PathBuf;

use crate::core::serialization::{load_state_from_path, save_state_to_path, SaveState};
use crate::save::repository::SaveRepository;

/// Single-slot save file holding the snapshot as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonSaveFile {
    path: PathBuf,
}

impl JsonSaveFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SaveRepository for JsonSaveFile {
    fn load(&mut self) -> Result<Option<SaveState>, Box<dyn std::error::Error>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(load_state_from_path(&self.path)?))
    }

    fn save(&mut self, state: &SaveState) -> Result<(), Box<dyn std::error::Error>> {
        save_state_to_path(state, &self.path)?;
        Ok(())
    }
}
