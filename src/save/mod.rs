//! Save/load system
//!
//! Handles persisting crafting sessions between runs.

pub mod session_file;

pub use session_file::{
    SaveError, SaveSummary, SessionSave,
    save_session, load_session, delete_save,
    list_saves, save_directory, save_path,
};
