use std::path::PathBuf;

/// All fatal errors produced by the sync engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("collection is locked by another process: {0}")]
    SQLiteLock(String),

    #[error("updates rejected: working tree is stale relative to the collection ({0})")]
    UpdatesRejected(String),

    #[error("collection checksum changed during the operation: {0}")]
    CollectionChecksum(String),

    #[error("target already exists: {0}")]
    TargetExists(PathBuf),

    #[error("notetype not found: {0}")]
    MissingNotetype(String),

    #[error("notetype mismatch: {0}")]
    NotetypeMismatch(String),

    #[error("media directory not found: {0}")]
    MissingMediaDirectory(PathBuf),

    #[error("note {0} is missing required fields: {1}")]
    AnkiDBNoteMissingFields(i64, String),

    #[error("working tree is not empty: {0}")]
    NonEmptyWorkingTree(PathBuf),

    #[error("not a ki repository (no .ki directory found above {0})")]
    NotAKiRepo(PathBuf),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid note file: {0}")]
    InvalidNoteFile(String),

    #[error("unresolved merge conflicts in: {0:?}")]
    MergeConflict(Vec<PathBuf>),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn sqlite_lock(msg: impl Into<String>) -> Self {
        Self::SQLiteLock(msg.into())
    }

    pub fn updates_rejected(msg: impl Into<String>) -> Self {
        Self::UpdatesRejected(msg.into())
    }

    pub fn collection_checksum(msg: impl Into<String>) -> Self {
        Self::CollectionChecksum(msg.into())
    }

    pub fn target_exists(path: impl Into<PathBuf>) -> Self {
        Self::TargetExists(path.into())
    }

    pub fn missing_notetype(name: impl Into<String>) -> Self {
        Self::MissingNotetype(name.into())
    }

    pub fn notetype_mismatch(msg: impl Into<String>) -> Self {
        Self::NotetypeMismatch(msg.into())
    }

    pub fn missing_media_directory(path: impl Into<PathBuf>) -> Self {
        Self::MissingMediaDirectory(path.into())
    }

    pub fn anki_db_note_missing_fields(nid: i64, fields: impl Into<String>) -> Self {
        Self::AnkiDBNoteMissingFields(nid, fields.into())
    }

    pub fn non_empty_working_tree(path: impl Into<PathBuf>) -> Self {
        Self::NonEmptyWorkingTree(path.into())
    }

    pub fn not_a_ki_repo(path: impl Into<PathBuf>) -> Self {
        Self::NotAKiRepo(path.into())
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    pub fn invalid_note_file(msg: impl Into<String>) -> Self {
        Self::InvalidNoteFile(msg.into())
    }

    pub fn merge_conflict(paths: Vec<PathBuf>) -> Self {
        Self::MergeConflict(paths)
    }

    pub fn io_at(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.into().display(), err),
        ))
    }
}

/// Non-fatal conditions that are reported but do not abort the operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Warning {
    #[error("note field validation failed for {guid}: {reason}")]
    NoteFieldValidation { guid: String, reason: String },

    #[error("deleted file not found in snapshot: {0}")]
    DeletedFileNotFound(String),

    #[error("diff target file not found: {0}")]
    DiffTargetFileNotFound(String),

    #[error("notetype {0} already exists with different content; keeping existing")]
    NotetypeCollision(String),

    #[error("note {guid} has {actual} fields, notetype {model} expects {expected}")]
    WrongFieldCount {
        guid: String,
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("note {guid} field names do not match notetype {model}")]
    InconsistentFieldNames { guid: String, model: String },

    #[error("media file renamed due to collision: {from} -> {to}")]
    RenamedMediaFile { from: String, to: String },

    #[error("note {0} failed the health check (empty sort field) and was removed")]
    EmptyNote(String),

    #[error("note {0} failed the health check (duplicate sort field) and was removed")]
    DuplicateNote(String),

    #[error("note {guid} failed health check and was removed: {reason}")]
    UnhealthyNote { guid: String, reason: String },

    #[error("deck name {0} collides with the reserved _media directory; skipped")]
    MediaDirectoryDeckNameCollision(String),
}

impl Warning {
    pub fn print(&self) {
        eprintln!("WARNING: {}", self);
    }
}
