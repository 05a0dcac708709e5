use std::path::{Path, PathBuf};

/// Classification of a filesystem path, used to give typed guarantees to
/// operations that require (for example) "must be an empty directory".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    File,
    Dir,
    EmptyDir,
    NoFile,
    NoPath,
}

impl PathKind {
    pub fn classify(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                    PathKind::NoPath
                }
                _ => PathKind::NoFile,
            });
        }
        let meta = std::fs::metadata(path)?;
        if meta.is_dir() {
            let mut entries = std::fs::read_dir(path)?;
            if entries.next().is_none() {
                Ok(PathKind::EmptyDir)
            } else {
                Ok(PathKind::Dir)
            }
        } else {
            Ok(PathKind::File)
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, PathKind::NoFile | PathKind::NoPath)
    }
}

/// Identity + commit signature used for every ki-authored commit.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            name: "ki-sync".into(),
            email: "ki-sync@localhost".into(),
        }
    }
}

/// A note as parsed directly from (or about to be serialized to) a `.md`
/// file: no knowledge of the collection's internal note id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatNote {
    pub title: String,
    pub guid: String,
    pub model: String,
    pub tags: Vec<String>,
    pub fields: Vec<(String, String)>,
}

impl FlatNote {
    pub fn sort_field(&self) -> Option<&str> {
        self.fields.first().map(|(_, v)| v.as_str())
    }
}

/// A note materialized from the collection, carrying its note id and deck
/// assignment alongside the flat note content.
#[derive(Debug, Clone)]
pub struct ColNote {
    pub nid: i64,
    pub flatnote: FlatNote,
    pub deck: String,
    /// Media filenames referenced by this note's fields or its notetype.
    pub media_files: Vec<String>,
}

/// One entry of the `.ki/hashes` append-only log.
#[derive(Debug, Clone)]
pub struct HashEntry {
    pub md5: String,
    pub filename: String,
}

/// Kind of change detected between two git tree snapshots, at note
/// granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeltaKind {
    Added,
    Deleted,
    Modified,
    Renamed,
    TypeChanged,
}

impl DeltaKind {
    pub fn label(self) -> &'static str {
        match self {
            DeltaKind::Added => "ADD",
            DeltaKind::Deleted => "DELETE",
            DeltaKind::Modified => "MODIFY",
            DeltaKind::Renamed => "RENAME",
            DeltaKind::TypeChanged => "TYPECHANGE",
        }
    }
}

/// A single note-level change derived from a git diff between two commits.
#[derive(Debug, Clone)]
pub struct Delta {
    pub kind: DeltaKind,
    /// Path in the "old" tree (A-side); `None` for pure adds.
    pub old_path: Option<PathBuf>,
    /// Path in the "new" tree (B-side); `None` for pure deletes.
    pub new_path: Option<PathBuf>,
}

/// Tally of delta kinds, printed as a table before a push applies changes.
#[derive(Debug, Clone, Default)]
pub struct DeltaSummary {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub renamed: usize,
    pub type_changed: usize,
}

impl DeltaSummary {
    pub fn from_deltas(deltas: &[Delta]) -> Self {
        let mut s = Self::default();
        for d in deltas {
            match d.kind {
                DeltaKind::Added => s.added += 1,
                DeltaKind::Deleted => s.deleted += 1,
                DeltaKind::Modified => s.modified += 1,
                DeltaKind::Renamed => s.renamed += 1,
                DeltaKind::TypeChanged => s.type_changed += 1,
            }
        }
        s
    }

    pub fn is_empty(&self) -> bool {
        self.added == 0
            && self.deleted == 0
            && self.modified == 0
            && self.renamed == 0
            && self.type_changed == 0
    }

    pub fn total(&self) -> usize {
        self.added + self.deleted + self.modified + self.renamed + self.type_changed
    }

    /// Render the `ADD/DELETE/MODIFY/RENAME/TYPECHANGE` count table printed
    /// before a push applies its changes.
    pub fn render_table(&self) -> String {
        format!(
            "ADD: {}\nDELETE: {}\nMODIFY: {}\nRENAME: {}\nTYPECHANGE: {}",
            self.added, self.deleted, self.modified, self.renamed, self.type_changed
        )
    }
}

/// Outcome of a push operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    UpToDate,
    NonTrivial,
}

/// Outcome of a pull operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    UpToDate,
    Merged,
    ConflictsLeft,
}

/// A notetype ("model") as stored in the collection's JSON blob and mirrored
/// into `models.json` files in the working tree.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Notetype {
    pub id: i64,
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub templates: Vec<String>,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub sort_field_index: usize,
}

/// A node in the deck hierarchy, as reconstructed from `::`-separated deck
/// names.
#[derive(Debug, Clone, Default)]
pub struct DeckNode {
    pub name: String,
    pub did: i64,
    pub children: Vec<DeckNode>,
}

impl DeckNode {
    /// Depth-first preorder traversal of this node and all descendants.
    pub fn preorder(&self) -> Vec<&DeckNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.preorder());
        }
        out
    }
}

pub const RESERVED_MEDIA_DIR: &str = "_media";
pub const KI_DIR: &str = ".ki";
pub const HASHES_FILE: &str = "hashes";
pub const CONFIG_FILE: &str = "config";
pub const BACKUPS_DIR: &str = "backups";
pub const LCA_TAG: &str = "last-successful-ki-push";
pub const MODELS_FILE: &str = "models.json";

/// Location of a collection file, carried in `.ki/config`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KiConfig {
    pub collection: PathBuf,
}
