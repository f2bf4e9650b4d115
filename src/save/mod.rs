pub mod json;
pub mod repository;
pub mod sqlite;

pub use json::JsonSaveFile;
pub use repository::SaveRepository;
pub use sqlite::{SaveDb, SaveDbError};
