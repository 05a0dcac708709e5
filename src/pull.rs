//! Re-clones the collection and three-way merges it into the working tree,
//! using the last successful push as a synthetic common ancestor so that
//! only genuine edits on either side produce conflicts.

use std::path::{Path, PathBuf};

use git2::Repository;

use crate::clone::commit_all;
use crate::error::{Error, Result};
use crate::progress;
use crate::types::PullOutcome;

pub struct PullReport {
    pub outcome: PullOutcome,
    pub conflicted_paths: Vec<PathBuf>,
}

pub fn pull(root: &Path) -> Result<PullReport> {
    let config = crate::repo::read_config(root)?;
    let collection_path = config.collection.clone();

    // Step 1: already up to date?
    let current_md5 = crate::hashlog::md5_of_file(&collection_path)?;
    if let Some(last) = crate::hashlog::read_last(&crate::repo::hashes_path(root))? {
        if last.md5 == current_md5 {
            println!("up to date");
            return Ok(PullReport {
                outcome: PullOutcome::UpToDate,
                conflicted_paths: Vec::new(),
            });
        }
    }

    let working_repo = Repository::open(root)?;
    let pre_merge_head = working_repo.head()?.peel_to_commit()?.id();
    let pre_merge_hashes =
        std::fs::read_to_string(crate::repo::hashes_path(root)).unwrap_or_default();

    let work_dir = tempfile::tempdir().map_err(|e| Error::io_at(root, e))?;

    // LCA snapshot: the working repo reset to its last-successful-push tag.
    let lca_oid = crate::delta::lca_commit(&working_repo)?;
    let local_snapshot_dir = work_dir.path().join("ki-local");
    let local_snapshot = crate::delta::clone_repo_at(root, &local_snapshot_dir, lca_oid)?;
    let lca_commit_in_snapshot = local_snapshot.head()?.peel_to_commit()?.id();

    // Fresh clone of the collection into an ephemeral remote tree.
    let remote_dir = work_dir.path().join("ki-remote");
    crate::clone::clone(&collection_path, &remote_dir)?;

    overlay_and_remove_deleted(&remote_dir, &local_snapshot_dir)?;
    let snapshot_updated = commit_all(&local_snapshot, "ki pull: collection snapshot")?;

    // Bring the updated snapshot's objects into the working repo and merge.
    let mut remote = working_repo.remote_anonymous(&local_snapshot_dir.to_string_lossy())?;
    remote.fetch(
        &["+refs/heads/*:refs/remotes/ki-pull-snapshot/*"],
        None,
        None,
    )?;
    let _ = lca_commit_in_snapshot;

    let spinner = progress::spinner("merging");
    let merge_result = crate::delta::merge_commits(&working_repo, pre_merge_head, snapshot_updated)?;
    spinner.finish_and_clear();

    // Restore the pre-merge hashes file; it is updated explicitly below only
    // on a clean merge, never by the tree merge itself.
    std::fs::write(crate::repo::hashes_path(root), &pre_merge_hashes)
        .map_err(|e| Error::io_at(root, e))?;

    match merge_result {
        Some(conflicts) => {
            log::warn!("pull left {} unresolved conflict(s)", conflicts.len());
            Ok(PullReport {
                outcome: PullOutcome::ConflictsLeft,
                conflicted_paths: conflicts,
            })
        }
        None => {
            crate::hashlog::append(
                &crate::repo::hashes_path(root),
                &current_md5,
                &collection_path.file_name().unwrap().to_string_lossy(),
            )?;
            commit_all(&working_repo, "ki pull: record checksum")?;

            // Re-verify the collection wasn't mutated concurrently.
            let post_md5 = crate::hashlog::md5_of_file(&collection_path)?;
            if post_md5 != current_md5 {
                return Err(Error::collection_checksum(
                    "collection changed while ki pull was running",
                ));
            }

            Ok(PullReport {
                outcome: PullOutcome::Merged,
                conflicted_paths: Vec::new(),
            })
        }
    }
}

/// Overlay `src`'s working tree onto `dest`, removing files present in
/// `dest` but absent from `src` (i.e. apply remote-side deletions).
fn overlay_and_remove_deleted(src: &Path, dest: &Path) -> Result<()> {
    let is_skippable = |rel: &Path| {
        rel.components()
            .next()
            .map(|c| c.as_os_str() == ".git" || c.as_os_str() == ".ki")
            .unwrap_or(false)
    };

    let mut present = std::collections::HashSet::new();
    for entry in walkdir::WalkDir::new(src)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry.path().strip_prefix(src).unwrap().to_path_buf();
        if is_skippable(&rel) {
            continue;
        }
        let dest_path = dest.join(&rel);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }
        std::fs::copy(entry.path(), &dest_path).map_err(|e| Error::io_at(&dest_path, e))?;
        present.insert(rel);
    }

    for entry in walkdir::WalkDir::new(dest)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry.path().strip_prefix(dest).unwrap().to_path_buf();
        if is_skippable(&rel) {
            continue;
        }
        if !present.contains(&rel) {
            let _ = std::fs::remove_file(entry.path());
        }
    }
    Ok(())
}
