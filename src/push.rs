//! Applies the working tree's note-level changes back into the collection.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use git2::Repository;

use crate::clone::commit_all;
use crate::collection::Collection;
use crate::error::{Error, Result, Warning};
use crate::types::{DeltaKind, DeltaSummary, PushOutcome};

pub struct PushReport {
    pub outcome: PushOutcome,
    pub summary: DeltaSummary,
    pub warnings: Vec<Warning>,
}

/// Push the note-level changes in the working tree at `root` back into its
/// collection.
pub fn push(root: &Path) -> Result<PushReport> {
    let config = crate::repo::read_config(root)?;
    let collection_path = config.collection.clone();

    // Step 1: reject a stale push.
    let current_md5 = crate::hashlog::md5_of_file(&collection_path)?;
    let last = crate::hashlog::read_last(&crate::repo::hashes_path(root))?
        .ok_or_else(|| Error::updates_rejected("no prior checksum recorded in .ki/hashes"))?;
    if last.md5 != current_md5 {
        return Err(Error::updates_rejected(
            "collection has changed since the last clone/pull; run `ki pull` first",
        ));
    }

    let working_repo = Repository::open(root)?;

    // Step 2-3: ephemeral clone of the (pre-push) collection, overlaid with
    // the working tree's current content, committed for diffing.
    let work_dir = tempfile::tempdir().map_err(|e| Error::io_at(root, e))?;
    let ephemeral_root = work_dir.path().join("remote");
    let ephemeral_report = crate::clone::clone(&collection_path, &ephemeral_root)?;
    log::debug!(
        "ephemeral baseline: {} notes, {} media files",
        ephemeral_report.notes_written,
        ephemeral_report.media_copied
    );
    let ephemeral_repo = Repository::open(&ephemeral_root)?;
    let baseline_commit = ephemeral_repo.head()?.peel_to_commit()?.id();

    overlay_working_tree(root, &ephemeral_root)?;
    let updated_commit = commit_all(&ephemeral_repo, "ki push: working tree overlay")?;

    // Step 5: delta stream between the pre-push baseline and the overlay.
    let deltas = crate::delta::compute_deltas(&ephemeral_repo, baseline_commit, updated_commit)?;
    let summary = DeltaSummary::from_deltas(&deltas);
    println!("{}", summary.render_table());

    if summary.is_empty() {
        println!("up to date");
        return Ok(PushReport {
            outcome: PushOutcome::UpToDate,
            summary,
            warnings: Vec::new(),
        });
    }

    // Step 4: work against a temp copy of the collection.
    let temp_collection = work_dir.path().join("collection.anki2");
    std::fs::copy(&collection_path, &temp_collection).map_err(|e| Error::io_at(&collection_path, e))?;
    let col = Collection::open(&temp_collection)?;
    let mut warnings = Vec::new();

    // Step 6: add any notetypes referenced in the new tree that the
    // collection doesn't yet have.
    for delta in &deltas {
        if let Some(path) = &delta.new_path {
            if let Some(flatnote) = read_note_at(&ephemeral_repo, updated_commit, path)? {
                let field_names: Vec<String> = flatnote.fields.iter().map(|(n, _)| n.clone()).collect();
                if !col.add_model_if_absent(&flatnote.model, &field_names)? {
                    // Notetype already existed; only warn if field shape differs.
                    let existing_fields = col
                        .model_id_for_name(&flatnote.model)?
                        .map(|mid| col.model_field_names(mid))
                        .transpose()?
                        .unwrap_or_default();
                    if existing_fields != field_names {
                        warnings.push(Warning::NotetypeCollision(flatnote.model.clone()));
                    }
                }
            }
        }
    }

    // Step 7: deletes.
    let mut delete_guids = Vec::new();
    for delta in deltas.iter().filter(|d| d.kind == DeltaKind::Deleted) {
        if let Some(path) = &delta.old_path {
            match read_note_at(&ephemeral_repo, baseline_commit, path)? {
                Some(flatnote) => delete_guids.push(flatnote.guid),
                None => warnings.push(Warning::DeletedFileNotFound(path.display().to_string())),
            }
        }
    }
    let mut delete_nids = Vec::new();
    for guid in &delete_guids {
        if let Some(row) = col.find_note_by_guid(guid)? {
            delete_nids.push(row.id);
        }
    }
    col.remove_notes(&delete_nids)?;

    // Step 8-9: upserts (added/modified/renamed/typechanged).
    let mut next_nid = now_millis();
    for delta in deltas
        .iter()
        .filter(|d| matches!(d.kind, DeltaKind::Added | DeltaKind::Modified | DeltaKind::Renamed | DeltaKind::TypeChanged))
    {
        let Some(path) = &delta.new_path else { continue };
        let Some(flatnote) = read_note_at(&ephemeral_repo, updated_commit, path)? else {
            warnings.push(Warning::DiffTargetFileNotFound(path.display().to_string()));
            continue;
        };

        let Some(mid) = col.model_id_for_name(&flatnote.model)? else {
            return Err(Error::missing_notetype(flatnote.model.clone()));
        };
        let expected_fields = col.model_field_names(mid)?;
        if expected_fields.len() != flatnote.fields.len() {
            warnings.push(Warning::WrongFieldCount {
                guid: flatnote.guid.clone(),
                model: flatnote.model.clone(),
                expected: expected_fields.len(),
                actual: flatnote.fields.len(),
            });
            continue;
        }
        let names_match = expected_fields
            .iter()
            .zip(flatnote.fields.iter())
            .all(|(a, (b, _))| a == b);
        if !names_match {
            warnings.push(Warning::InconsistentFieldNames {
                guid: flatnote.guid.clone(),
                model: flatnote.model.clone(),
            });
            continue;
        }

        let field_values: Vec<String> = flatnote
            .fields
            .iter()
            .map(|(_, v)| crate::notegrammar::plain_to_html(v))
            .collect();
        let sfld = field_values.first().cloned().unwrap_or_default();

        let nid = match col.find_note_by_guid(&flatnote.guid)? {
            Some(existing) => {
                if existing.mid != mid {
                    let field_map: BTreeMap<usize, Option<usize>> =
                        (0..field_values.len()).map(|i| (i, Some(i))).collect();
                    col.change_model(existing.id, mid, &field_map)?;
                }
                col.update_note_tags_and_fields(existing.id, &flatnote.tags, &field_values, &sfld)?;
                let cids = col.cids_for_nid(existing.id)?;
                let deck_note = note_deck(path);
                let did = col.deck_id(&deck_note, true)?;
                col.set_deck(&cids, did)?;
                existing.id
            }
            None => {
                let nid = next_nid;
                next_nid += 1;
                col.add_note(nid, &flatnote.guid, mid, &flatnote.tags, &field_values, &sfld)?;
                col.after_note_updates(&[nid])?;
                nid
            }
        };

        // Fields health check, run after the note's fields are written. A
        // nonzero result removes the note instead of leaving it corrupt.
        match col.fields_check(mid, nid, &sfld)? {
            0 => {}
            1 => {
                col.remove_notes(&[nid])?;
                warnings.push(Warning::EmptyNote(flatnote.guid.clone()));
            }
            2 => {
                col.remove_notes(&[nid])?;
                warnings.push(Warning::DuplicateNote(flatnote.guid.clone()));
            }
            code => {
                col.remove_notes(&[nid])?;
                warnings.push(Warning::UnhealthyNote {
                    guid: flatnote.guid.clone(),
                    reason: format!("fields check returned code {}", code),
                });
            }
        }
    }

    // Step 10: backup then swap the live collection in. Locked so a
    // concurrent `ki push` can't observe the collection mid-swap.
    col.close(true)?;
    crate::lock::with_repo_lock(root, || -> Result<()> {
        let backups = crate::repo::backups_dir(root);
        std::fs::create_dir_all(&backups).map_err(|e| Error::io_at(&backups, e))?;
        let backup_path = backups.join(format!(
            "{}--{}.anki2",
            chrono::Utc::now().format("%Y%m%dT%H%M%S"),
            current_md5
        ));
        if !backup_path.exists() {
            std::fs::copy(&collection_path, &backup_path).map_err(|e| Error::io_at(&backup_path, e))?;
        }
        std::fs::copy(&temp_collection, &collection_path).map_err(|e| Error::io_at(&collection_path, e))?;
        Ok(())
    })?;

    // Step 11: media.
    let media_source = crate::repo::media_dir(root);
    if media_source.is_dir() {
        let col = Collection::open(&collection_path)?;
        for entry in walkdir::WalkDir::new(&media_source)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            if !col.media_have(&name) {
                let new_name = col.media_add_file(path)?;
                if new_name != name {
                    warnings.push(Warning::RenamedMediaFile {
                        from: name.clone(),
                        to: new_name,
                    });
                }
            }
        }
        col.close(true)?;
    }

    // Step 12: record checksum, commit hashes, move the LCA tag.
    let new_md5 = crate::hashlog::md5_of_file(&collection_path)?;
    crate::hashlog::append(
        &crate::repo::hashes_path(root),
        &new_md5,
        &collection_path.file_name().unwrap().to_string_lossy(),
    )?;
    commit_all(&working_repo, "ki push: record checksum")?;
    let final_head = working_repo.head()?.peel_to_commit()?.id();
    let sig = git2::Signature::now("ki-sync", "ki-sync@localhost")?;
    crate::delta::set_lca_tag(&working_repo, final_head, &sig)?;

    for w in &warnings {
        w.print();
    }

    Ok(PushReport {
        outcome: PushOutcome::NonTrivial,
        summary,
        warnings,
    })
}

fn overlay_working_tree(src_root: &Path, dest_root: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src_root)
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        let rel = entry.path().strip_prefix(src_root).unwrap();
        if rel.as_os_str().is_empty() {
            continue;
        }
        if rel.components().next().map(|c| c.as_os_str() == ".git" || c.as_os_str() == ".ki").unwrap_or(false) {
            continue;
        }
        let dest = dest_root.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| Error::io_at(&dest, e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
            }
            std::fs::copy(entry.path(), &dest).map_err(|e| Error::io_at(&dest, e))?;
        }
    }
    // Remove files present in dest but deleted in src.
    let existing: HashSet<PathBuf> = walkdir::WalkDir::new(src_root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().strip_prefix(src_root).unwrap().to_path_buf())
        .collect();
    for entry in walkdir::WalkDir::new(dest_root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let rel = entry.path().strip_prefix(dest_root).unwrap();
        if rel.components().next().map(|c| c.as_os_str() == ".git" || c.as_os_str() == ".ki").unwrap_or(false) {
            continue;
        }
        if !existing.contains(rel) {
            let _ = std::fs::remove_file(entry.path());
        }
    }
    Ok(())
}

fn read_note_at(
    repo: &Repository,
    commit: git2::Oid,
    path: &Path,
) -> Result<Option<crate::types::FlatNote>> {
    let tree = repo.find_commit(commit)?.tree()?;
    let Ok(entry) = tree.get_path(path) else {
        return Ok(None);
    };
    let blob = repo.find_blob(entry.id())?;
    let content = std::str::from_utf8(blob.content())
        .map_err(|_| Error::invalid_note_file("non-UTF8 note content"))?;
    Ok(Some(crate::notegrammar::parse_note(content, "")?))
}

fn note_deck(path: &Path) -> String {
    let comps: Vec<String> = path
        .parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    if comps.is_empty() {
        "Default".to_string()
    } else {
        comps.join("::")
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
