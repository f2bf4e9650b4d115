use crate::core::serialization::SaveState;

/// Storage seam for game snapshots. A write failure is surfaced to the
/// caller as a warning, never a crash; gameplay continues in memory.
pub trait SaveRepository {
    /// Returns the stored snapshot, or None when no save exists yet.
    fn load(&mut self) -> Result<Option<SaveState>, Box<dyn std::error::Error>>;

    fn save(&mut self, state: &SaveState) -> Result<(), Box<dyn std::error::Error>>;
}
