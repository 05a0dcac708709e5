//! Note-level delta extraction between two git commits, and the
//! last-common-ancestor (LCA) three-way merge that lets `pull`/`push` avoid
//! treating the whole collection as new on every round trip.

use std::path::{Path, PathBuf};

use git2::{DiffFindOptions, DiffOptions, Repository};

use crate::error::{Error, Result};
use crate::types::{Delta, DeltaKind, LCA_TAG};

const IGNORABLE_NAMES: &[&str] = &[
    ".git",
    ".ki",
    "_media",
    ".gitignore",
    ".gitattributes",
    ".gitmodules",
    crate::types::MODELS_FILE,
];

/// Returns `true` when `path` should never be treated as a note-level
/// change: sidecar files, media directories, and anything inside a
/// reserved directory.
pub fn is_ignorable(path: &Path) -> bool {
    path.components().any(|c| {
        let s = c.as_os_str().to_string_lossy();
        IGNORABLE_NAMES.contains(&s.as_ref())
    }) || path.extension().map(|e| e != "md").unwrap_or(true)
}

/// Compute note-level deltas between two commits of the same repository.
pub fn compute_deltas(
    repo: &Repository,
    old_commit: git2::Oid,
    new_commit: git2::Oid,
) -> Result<Vec<Delta>> {
    let old_tree = repo.find_commit(old_commit)?.tree()?;
    let new_tree = repo.find_commit(new_commit)?.tree()?;

    let mut diff_opts = DiffOptions::new();
    diff_opts.include_untracked(false);

    let mut diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_opts))?;
    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true).renames_from_rewrites(true);
    diff.find_similar(Some(&mut find_opts))?;

    let mut deltas = Vec::new();
    for entry in diff.deltas() {
        let old_path = entry.old_file().path().map(PathBuf::from);
        let new_path = entry.new_file().path().map(PathBuf::from);

        let relevant_old = old_path.as_deref().map(|p| !is_ignorable(p)).unwrap_or(false);
        let relevant_new = new_path.as_deref().map(|p| !is_ignorable(p)).unwrap_or(false);
        if !relevant_old && !relevant_new {
            continue;
        }

        match entry.status() {
            git2::Delta::Added => {
                deltas.push(Delta {
                    kind: DeltaKind::Added,
                    old_path: None,
                    new_path,
                });
            }
            git2::Delta::Deleted => {
                deltas.push(Delta {
                    kind: DeltaKind::Deleted,
                    old_path,
                    new_path: None,
                });
            }
            git2::Delta::Modified => {
                deltas.push(Delta {
                    kind: DeltaKind::Modified,
                    old_path,
                    new_path,
                });
            }
            git2::Delta::Typechange => {
                deltas.push(Delta {
                    kind: DeltaKind::TypeChanged,
                    old_path,
                    new_path,
                });
            }
            git2::Delta::Renamed => {
                let (old_guid, new_guid) = (
                    read_guid(repo, &old_tree, old_path.as_deref()),
                    read_guid(repo, &new_tree, new_path.as_deref()),
                );
                if old_guid.is_some() && old_guid != new_guid {
                    // GUID changed across the rename: treat as delete + add.
                    deltas.push(Delta {
                        kind: DeltaKind::Deleted,
                        old_path: old_path.clone(),
                        new_path: None,
                    });
                    deltas.push(Delta {
                        kind: DeltaKind::Added,
                        old_path: None,
                        new_path: new_path.clone(),
                    });
                } else {
                    deltas.push(Delta {
                        kind: DeltaKind::Renamed,
                        old_path,
                        new_path,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(deltas)
}

fn read_guid(repo: &Repository, tree: &git2::Tree, path: Option<&Path>) -> Option<String> {
    let path = path?;
    let entry = tree.get_path(path).ok()?;
    let blob = repo.find_blob(entry.id()).ok()?;
    let content = std::str::from_utf8(blob.content()).ok()?;
    crate::notegrammar::parse_note(content, "").ok().map(|n| n.guid)
}

/// Clone `src_repo` into a fresh working directory at `dest`, checking out
/// the given commit.
pub fn clone_repo_at(src: &Path, dest: &Path, commit: git2::Oid) -> Result<Repository> {
    let repo = Repository::clone(&src.to_string_lossy(), dest)?;
    let commit_obj = repo.find_commit(commit)?;
    repo.reset(commit_obj.as_object(), git2::ResetType::Hard, None)?;
    Ok(repo)
}

/// Locate the commit tagged as the last successful push ("LCA").
pub fn lca_commit(repo: &Repository) -> Result<git2::Oid> {
    let reference = repo
        .find_reference(&format!("refs/tags/{}", LCA_TAG))
        .map_err(|_| Error::invalid_path(format!("missing {} tag", LCA_TAG)))?;
    let obj = reference.peel(git2::ObjectType::Commit)?;
    Ok(obj.id())
}

/// Create or move the LCA tag to `commit`, replacing any prior tag.
pub fn set_lca_tag(repo: &Repository, commit: git2::Oid, sig: &git2::Signature) -> Result<()> {
    let _ = repo.tag_delete(LCA_TAG);
    let commit_obj = repo.find_commit(commit)?;
    repo.tag(LCA_TAG, commit_obj.as_object(), sig, "ki push", true)?;
    Ok(())
}

/// Merge `their_commit` into `our_commit` inside `repo`, using `our_commit`'s
/// tree as the checkout base. Returns `Ok(Some(paths))` listing conflicted
/// paths if the merge left conflict markers, or `Ok(None)` on a clean merge
/// (the working tree and index are updated; caller is responsible for
/// committing).
pub fn merge_commits(
    repo: &Repository,
    our_commit: git2::Oid,
    their_commit: git2::Oid,
) -> Result<Option<Vec<PathBuf>>> {
    let our = repo.find_commit(our_commit)?;
    let their = repo.find_commit(their_commit)?;

    let mut index = repo.merge_commits(&our, &their, None)?;

    if index.has_conflicts() {
        let mut conflicts = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            if let Some(our_entry) = conflict.our {
                conflicts.push(PathBuf::from(
                    String::from_utf8_lossy(&our_entry.path).to_string(),
                ));
            }
        }
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.conflict_style_merge(true).force();
        repo.checkout_index(Some(&mut index), Some(&mut checkout))?;
        return Ok(Some(conflicts));
    }

    let tree_oid = index.write_tree_to(repo)?;
    let tree = repo.find_tree(tree_oid)?;
    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(tree.as_object(), Some(&mut checkout))?;
    repo.set_head_detached(our_commit)?;
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_ignorable_flags_sidecar_paths() {
        assert!(is_ignorable(Path::new(".ki/config")));
        assert!(is_ignorable(Path::new("_media/cat.png")));
        assert!(is_ignorable(Path::new("models.json")));
        assert!(is_ignorable(Path::new(".gitignore")));
    }

    #[test]
    fn is_ignorable_allows_note_files() {
        assert!(!is_ignorable(Path::new("Languages/French/bonjour.md")));
    }

    #[test]
    fn is_ignorable_flags_non_md_files() {
        assert!(is_ignorable(Path::new("Languages/French/notes.txt")));
    }
}
