//! Working-tree layout: the `.ki/` sidecar, deck-directory structure, and
//! the `_media/` symlink chain.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::deck_components;
use crate::types::{KiConfig, BACKUPS_DIR, CONFIG_FILE, HASHES_FILE, KI_DIR, RESERVED_MEDIA_DIR};

pub fn ki_dir(root: &Path) -> PathBuf {
    root.join(KI_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    ki_dir(root).join(CONFIG_FILE)
}

pub fn hashes_path(root: &Path) -> PathBuf {
    ki_dir(root).join(HASHES_FILE)
}

pub fn backups_dir(root: &Path) -> PathBuf {
    ki_dir(root).join(BACKUPS_DIR)
}

pub fn media_dir(root: &Path) -> PathBuf {
    root.join(RESERVED_MEDIA_DIR)
}

/// Deck directory for a `::`-separated deck name, relative to `root`.
pub fn deck_dir(root: &Path, deck: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for comp in deck_components(deck) {
        path.push(comp);
    }
    path
}

pub fn write_initial_layout(root: &Path, collection_path: &Path) -> Result<()> {
    std::fs::create_dir_all(ki_dir(root)).map_err(|e| Error::io_at(root, e))?;
    std::fs::create_dir_all(backups_dir(root)).map_err(|e| Error::io_at(root, e))?;

    let config = KiConfig {
        collection: collection_path.to_path_buf(),
    };
    let config_ini = format!("[remote]\npath={}\n", config.collection.display());
    std::fs::write(config_path(root), config_ini).map_err(|e| Error::io_at(root, e))?;

    std::fs::write(root.join(".gitignore"), format!("{}/{}\n", KI_DIR, BACKUPS_DIR))
        .map_err(|e| Error::io_at(root, e))?;
    std::fs::write(
        root.join(".gitattributes"),
        "*.md linguist-detectable=true\n",
    )
    .map_err(|e| Error::io_at(root, e))?;

    std::fs::create_dir_all(media_dir(root)).map_err(|e| Error::io_at(root, e))?;
    Ok(())
}

pub fn read_config(root: &Path) -> Result<KiConfig> {
    let contents =
        std::fs::read_to_string(config_path(root)).map_err(|e| Error::io_at(root, e))?;
    let path_str = contents
        .lines()
        .find_map(|l| l.strip_prefix("path="))
        .ok_or_else(|| Error::invalid_path("malformed .ki/config"))?;
    Ok(KiConfig {
        collection: PathBuf::from(path_str.trim()),
    })
}

/// A planned symlink: `link_path` (inside a deck's `_media/`) should point
/// at `target` (the nearest ancestor deck's `_media/<file>`, or the root's).
#[derive(Debug, Clone)]
pub struct MediaLink {
    pub link_path: PathBuf,
    pub target: PathBuf,
}

/// Plan the `_media/` symlink chain: for every deck directory (in preorder,
/// parent before child), and for every media filename referenced by that
/// deck's notes (keyed by `::`-joined deck name), plan a symlink from the
/// deck's own `_media/<file>` to its parent's (or root's) `_media/<file>`,
/// unless that deck is itself where the file canonically lives (handled by
/// the caller passing only files used by *descendant* decks).
pub fn plan_media_symlinks(
    root: &Path,
    deck_names_preorder: &[String],
    media_by_deck: &HashMap<String, HashSet<String>>,
) -> Vec<MediaLink> {
    let mut plans = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for deck in deck_names_preorder {
        let Some(files) = media_by_deck.get(deck) else {
            continue;
        };
        let comps = deck_components(deck);
        let parent_dir = if comps.len() <= 1 {
            root.to_path_buf()
        } else {
            deck_dir(root, &comps[..comps.len() - 1].join("::"))
        };
        let this_dir = deck_dir(root, deck);

        for file in files {
            let link_path = this_dir.join(RESERVED_MEDIA_DIR).join(file);
            if seen.contains(&link_path) {
                continue;
            }
            let target = parent_dir.join(RESERVED_MEDIA_DIR).join(file);
            seen.insert(link_path.clone());
            plans.push(MediaLink { link_path, target });
        }
    }

    plans
}

/// Materialize planned symlinks on disk, creating parent directories as
/// needed. Existing links at the same path are left untouched.
pub fn write_media_symlinks(plans: &[MediaLink]) -> Result<()> {
    for plan in plans {
        if plan.link_path.exists() || plan.link_path.symlink_metadata().is_ok() {
            continue;
        }
        if let Some(parent) = plan.link_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }
        symlink(&plan.target, &plan.link_path)
            .map_err(|e| Error::io_at(&plan.link_path, e))?;
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_dir_splits_on_double_colon() {
        let root = Path::new("/repo");
        assert_eq!(
            deck_dir(root, "Languages::French"),
            PathBuf::from("/repo/Languages/French")
        );
    }

    #[test]
    fn plan_media_symlinks_targets_parent() {
        let root = Path::new("/repo");
        let mut media_by_deck = HashMap::new();
        let mut files = HashSet::new();
        files.insert("cat.png".to_string());
        media_by_deck.insert("Languages::French".to_string(), files);

        let plans = plan_media_symlinks(
            root,
            &["Languages".to_string(), "Languages::French".to_string()],
            &media_by_deck,
        );
        assert_eq!(plans.len(), 1);
        assert_eq!(
            plans[0].link_path,
            PathBuf::from("/repo/Languages/French/_media/cat.png")
        );
        assert_eq!(
            plans[0].target,
            PathBuf::from("/repo/Languages/_media/cat.png")
        );
    }

    #[test]
    fn write_initial_layout_creates_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let collection = dir.path().join("collection.anki2");
        std::fs::write(&collection, b"").unwrap();
        write_initial_layout(dir.path(), &collection).unwrap();
        assert!(ki_dir(dir.path()).is_dir());
        assert!(config_path(dir.path()).is_file());
        assert!(media_dir(dir.path()).is_dir());
        let cfg = read_config(dir.path()).unwrap();
        assert_eq!(cfg.collection, collection);
    }
}
