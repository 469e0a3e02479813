/// Corkboard storage: sticky-note boards kept as one folder per board and
/// one markdown file per note, with a header block carrying the note's
/// placement and styling.
pub mod autosave;
pub mod boards;
pub mod cache;
pub mod codec;
pub mod error;
pub mod migrate;
pub mod paths;
pub mod reconcile;
pub mod settings;
pub mod store;
pub mod types;
pub mod vault;
pub mod workspace;

pub use autosave::{AutoSaver, FlushReport, SavedSnapshot, AUTOSAVE_DELAY};
pub use error::{Result, StorageError};
pub use migrate::MigrationReport;
pub use reconcile::{SaveReport, SAVE_BATCH_SIZE};
pub use settings::{JsonSettingsStore, MemorySettingsStore, PluginSettings, Settings};
pub use store::NoteStore;
pub use types::{Board, BoardConfig, Note, WallStyle};
pub use vault::{LocalVault, MemoryVault, Vault};
pub use workspace::{Corkboard, DEFAULT_BOARD_NAME};
