//! Materializes a collection into an empty working directory.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use git2::{Repository, Signature as GitSignature};

use crate::collection::Collection;
use crate::error::{Error, Result, Warning};
use crate::paths::{self, require_clone_target};
use crate::progress;
use crate::repo;
use crate::types::{ColNote, FlatNote, Notetype, RESERVED_MEDIA_DIR};

/// Synthetic note id used to key notetype-level (CSS/template) media, which
/// belongs to no single note.
///
/// TODO: notetype CSS/template media isn't copied into `_media/` yet — only
/// per-note field references are. Wire this in once templates are parsed.
#[allow(dead_code)]
pub const NOTETYPE_MEDIA_NID: i64 = -57;

pub struct CloneReport {
    pub notes_written: usize,
    pub media_copied: usize,
    pub warnings: Vec<Warning>,
}

/// Clone `collection_path` into `target` (must not yet exist, or be an
/// empty directory).
pub fn clone(collection_path: &Path, target: &Path) -> Result<CloneReport> {
    require_clone_target(target)?;
    let created_dir = !target.exists();

    let result = clone_inner(collection_path, target);
    if result.is_err() {
        if created_dir {
            let _ = std::fs::remove_dir_all(target);
        } else {
            let _ = clear_dir(target);
        }
    }
    result
}

fn clear_dir(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(entry.path())?;
        } else {
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn clone_inner(collection_path: &Path, target: &Path) -> Result<CloneReport> {
    log::info!("opening collection {}", collection_path.display());
    let col = Collection::open(collection_path)?;

    std::fs::create_dir_all(target).map_err(|e| Error::io_at(target, e))?;
    repo::write_initial_layout(target, collection_path)?;

    // Step 2-3: materialize notes and collect media usage.
    let nids = col.find_notes()?;
    let pb = progress::bar(nids.len() as u64, "writing notes");
    let mut col_notes = Vec::with_capacity(nids.len());
    let mut notetypes: HashMap<i64, Notetype> = HashMap::new();

    for nid in &nids {
        let note = col.get_note(*nid)?;
        let field_names = col.model_field_names(note.mid)?;
        if field_names.len() != note.fields.len() {
            return Err(Error::anki_db_note_missing_fields(
                *nid,
                format!("expected {} fields, found {}", field_names.len(), note.fields.len()),
            ));
        }
        let model = notetypes.entry(note.mid).or_insert_with(|| {
            load_notetype(&col, note.mid).unwrap_or(Notetype {
                id: note.mid,
                name: format!("notetype-{}", note.mid),
                fields: field_names.clone(),
                templates: Vec::new(),
                css: String::new(),
                sort_field_index: 0,
            })
        });

        let cids = col.cids_for_nid(*nid)?;
        let did = cids
            .first()
            .map(|c| col.did_for_cid(*c))
            .transpose()?
            .unwrap_or(1);
        let deck = col.deck_name(did).unwrap_or_else(|_| "Default".to_string());

        let fields: Vec<(String, String)> = field_names
            .into_iter()
            .zip(note.fields.iter().cloned())
            .collect();

        let media_files: Vec<String> = fields
            .iter()
            .flat_map(|(_, v)| col.regexps.find_local_filenames(v))
            .collect();

        let flatnote = FlatNote {
            title: String::new(),
            guid: note.guid.clone(),
            model: model.name.clone(),
            tags: note.tags.clone(),
            fields,
        };

        col_notes.push(ColNote {
            nid: *nid,
            flatnote,
            deck,
            media_files,
        });
        pb.inc(1);
    }
    pb.finish_and_clear();

    // Step 3: copy referenced media into the root `_media/` directory.
    let media_dir = col.media_dir();
    let root_media = repo::media_dir(target);
    let mut media_copied = 0usize;
    let mut all_media_names: HashSet<String> = HashSet::new();
    for note in &col_notes {
        for m in &note.media_files {
            all_media_names.insert(m.clone());
        }
    }
    let pbm = progress::bar(all_media_names.len() as u64, "copying media");
    if !all_media_names.is_empty() && !media_dir.is_dir() {
        return Err(Error::missing_media_directory(media_dir.to_path_buf()));
    }
    for name in &all_media_names {
        let src = media_dir.join(name);
        if src.is_file() {
            std::fs::copy(&src, root_media.join(name)).map_err(|e| Error::io_at(&src, e))?;
            media_copied += 1;
        }
        pbm.inc(1);
    }
    pbm.finish_and_clear();

    // Step 4: walk the full deck tree (not just decks with notes of their
    // own), rejecting any deck whose name collides with the reserved
    // `_media` directory.
    let tree = col.deck_tree()?;
    let mut warnings = Vec::new();
    let mut valid_decks: Vec<(i64, String)> = Vec::new();
    for node in tree.preorder() {
        if node.name.is_empty() {
            continue; // root sentinel, not a real deck
        }
        if paths::deck_components(&node.name).contains(&RESERVED_MEDIA_DIR) {
            warnings.push(Warning::MediaDirectoryDeckNameCollision(node.name.clone()));
            continue;
        }
        valid_decks.push((node.did, node.name.clone()));
    }
    let valid_deck_names: HashSet<String> = valid_decks.iter().map(|(_, n)| n.clone()).collect();
    let deck_names: Vec<String> = valid_decks.iter().map(|(_, n)| n.clone()).collect();
    for deck in &deck_names {
        std::fs::create_dir_all(repo::deck_dir(target, deck)).map_err(|e| Error::io_at(target, e))?;
    }

    // Notes keyed by their own (leaf) deck, for file-writing. Notes whose
    // deck was rejected above are dropped entirely.
    let mut decks_seen: HashMap<String, Vec<&ColNote>> = HashMap::new();
    for note in &col_notes {
        if valid_deck_names.contains(&note.deck) {
            decks_seen.entry(note.deck.clone()).or_default().push(note);
        }
    }
    let nid_index: HashMap<i64, &ColNote> = decks_seen
        .values()
        .flatten()
        .map(|n| (n.nid, *n))
        .collect();

    // Notes aggregated transitively over each deck's descendants, mirroring
    // `decks.cids(did, children=true)`. Used for per-deck `models.json` and
    // the media symlink chain so a parent deck picks up notetypes/media that
    // only live in its subdecks.
    let mut aggregated_notes_by_deck: HashMap<String, Vec<&ColNote>> = HashMap::new();
    for (did, name) in &valid_decks {
        let cids = col.cids(*did, true)?;
        let mut seen_nids: HashSet<i64> = HashSet::new();
        let mut notes = Vec::new();
        for cid in cids {
            let nid = col.nid_for_cid(cid)?;
            if seen_nids.insert(nid) {
                if let Some(note) = nid_index.get(&nid) {
                    notes.push(*note);
                }
            }
        }
        aggregated_notes_by_deck.insert(name.clone(), notes);
    }

    // Step 5: write root and per-deck models.json.
    let all_models: Vec<&Notetype> = notetypes.values().collect();
    write_models_json(&target.join(crate::types::MODELS_FILE), &all_models)?;
    for deck in &deck_names {
        let used_mids: HashSet<i64> = aggregated_notes_by_deck[deck]
            .iter()
            .filter_map(|n| notetypes.values().find(|m| m.name == n.flatnote.model).map(|m| m.id))
            .collect();
        let deck_models: Vec<&Notetype> = all_models
            .iter()
            .filter(|m| used_mids.contains(&m.id))
            .copied()
            .collect();
        if !deck_models.is_empty() {
            write_models_json(&repo::deck_dir(target, deck).join(crate::types::MODELS_FILE), &deck_models)?;
        }
    }

    // Step 6: write one `.md` per note, into its own deck only.
    let mut notes_written = 0usize;
    for deck in &deck_names {
        let Some(notes) = decks_seen.get(deck) else {
            continue;
        };
        let dir = repo::deck_dir(target, deck);
        let mut taken = HashSet::new();
        for note in notes {
            let filename = paths::disambiguate(
                &paths::slugify(
                    note.flatnote.sort_field().unwrap_or(""),
                    &note.flatnote.model,
                    &note.flatnote.guid,
                    note.nid,
                ),
                &taken,
            );
            taken.insert(filename.clone());
            let path = dir.join(format!("{}.md", filename));
            std::fs::write(&path, crate::notegrammar::serialize_note(&note.flatnote))
                .map_err(|e| Error::io_at(&path, e))?;
            notes_written += 1;
        }
    }

    // Media symlink chain: every deck's `_media/` is a chain of links back
    // to the root `_media/`, covering files used by any descendant note.
    let mut media_by_deck: HashMap<String, HashSet<String>> = HashMap::new();
    for (deck, notes) in &aggregated_notes_by_deck {
        media_by_deck
            .entry(deck.clone())
            .or_default()
            .extend(notes.iter().flat_map(|n| n.media_files.iter().cloned()));
    }
    let plans = repo::plan_media_symlinks(target, &deck_names, &media_by_deck);
    repo::write_media_symlinks(&plans)?;

    // Step 7: record the collection checksum before the commit, so the
    // tagged tree already contains `.ki/hashes`.
    let md5 = crate::hashlog::md5_of_file(collection_path)?;
    crate::hashlog::append(
        &repo::hashes_path(target),
        &md5,
        &collection_path.file_name().unwrap().to_string_lossy(),
    )?;

    // Step 8: git init, one commit, tag.
    let git_repo = Repository::init(target)?;
    let commit_oid = commit_all(&git_repo, "Initial commit")?;
    let sig = GitSignature::now("ki-sync", "ki-sync@localhost")?;
    crate::delta::set_lca_tag(&git_repo, commit_oid, &sig)?;

    col.close(false)?;

    Ok(CloneReport {
        notes_written,
        media_copied,
        warnings,
    })
}

fn load_notetype(col: &Collection, mid: i64) -> Result<Notetype> {
    let model = col.model_by_id(mid)?;
    let name = model
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let fields = col.model_field_names(mid)?;
    let css = model
        .get("css")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    Ok(Notetype {
        id: mid,
        name,
        fields,
        templates: Vec::new(),
        css,
        sort_field_index: 0,
    })
}

fn write_models_json(path: &Path, models: &[&Notetype]) -> Result<()> {
    let json = serde_json::to_string_pretty(models)?;
    std::fs::write(path, json).map_err(|e| Error::io_at(path, e))
}

/// Stage every file and make a commit with the ki signature.
pub fn commit_all(repo: &Repository, message: &str) -> Result<git2::Oid> {
    let mut index = repo.index()?;
    index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
    index.write()?;
    let tree_oid = index.write_tree()?;
    let tree = repo.find_tree(tree_oid)?;
    let sig = GitSignature::now("ki-sync", "ki-sync@localhost")?;

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    let oid = repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
    Ok(oid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_rejects_non_empty_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();
        let col = dir.path().join("collection.anki2");
        std::fs::write(&col, b"").unwrap();
        let err = clone(&col, dir.path()).unwrap_err();
        assert!(matches!(err, Error::NonEmptyWorkingTree(_)));
    }
}
