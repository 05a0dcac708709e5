//! Direct `rusqlite` adapter over Anki's on-disk collection schema.
//!
//! Anki's legacy schema keeps notetypes, decks, and deck options as single
//! JSON blobs inside the singleton `col` row; cards and notes are ordinary
//! rows. This module talks to that schema directly, the same way
//! `examples/JaviSoto-apple-notes-cli/src/db.rs` talks directly to Apple's
//! Notes schema rather than going through a library.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::types::DeckNode;

/// A single row of the `notes` table.
#[derive(Debug, Clone)]
pub struct NoteRow {
    pub id: i64,
    pub guid: String,
    pub mid: i64,
    pub tags: Vec<String>,
    pub fields: Vec<String>,
    pub sfld: String,
}

pub struct MediaRegexps {
    pub img: regex::Regex,
    pub sound: regex::Regex,
}

impl MediaRegexps {
    fn new() -> Self {
        Self {
            img: regex::Regex::new(r#"<img[^>]+src=["']([^"'>]+)["'][^>]*>"#).unwrap(),
            sound: regex::Regex::new(r"\[sound:([^\]]+)\]").unwrap(),
        }
    }

    /// Extract every locally-referenced media filename from an HTML field.
    pub fn find_local_filenames(&self, html: &str) -> Vec<String> {
        let mut out = Vec::new();
        for cap in self.img.captures_iter(html) {
            let name = &cap[1];
            if !name.contains("://") {
                out.push(name.to_string());
            }
        }
        for cap in self.sound.captures_iter(html) {
            out.push(cap[1].to_string());
        }
        out
    }
}

/// An exclusively-locked handle to an Anki collection file.
pub struct Collection {
    conn: Connection,
    path: PathBuf,
    media_dir: PathBuf,
    pub regexps: MediaRegexps,
}

const LOCK_TIMEOUT_MS: u64 = 100;

impl Collection {
    /// Open `path` with an exclusive transaction held for the lifetime of
    /// this handle.
    ///
    /// # Errors
    /// Returns [`Error::SQLiteLock`] if another process holds the lock past
    /// the acquisition timeout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_millis(LOCK_TIMEOUT_MS))?;

        conn.execute_batch("BEGIN EXCLUSIVE")
            .map_err(|e| Error::sqlite_lock(format!("{}: {}", path.display(), e)))?;

        // On Windows, holding a long-lived SQLite transaction over a file
        // already guarded by an OS-level share lock is redundant and can
        // starve other readers; commit immediately and rely on the file
        // lock instead. Other platforms keep the transaction open so that
        // concurrent ki processes see a consistent SQLiteLockError.
        #[cfg(windows)]
        {
            conn.execute_batch("COMMIT")?;
        }

        let media_dir = media_dir_for(&path);

        Ok(Self {
            conn,
            path,
            media_dir,
            regexps: MediaRegexps::new(),
        })
    }

    /// Close the collection, committing (`save = true`) or rolling back.
    pub fn close(mut self, save: bool) -> Result<()> {
        #[cfg(windows)]
        {
            let _ = save;
            return Ok(());
        }
        #[cfg(not(windows))]
        {
            if save {
                self.conn.execute_batch("COMMIT")?;
            } else {
                self.conn.execute_batch("ROLLBACK")?;
            }
            Ok(())
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    // -- notes -----------------------------------------------------------

    pub fn find_notes(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM notes ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn get_note(&self, nid: i64) -> Result<NoteRow> {
        self.conn
            .query_row(
                "SELECT id, guid, mid, tags, flds, sfld FROM notes WHERE id = ?1",
                params![nid],
                Self::row_to_note,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    Error::missing_notetype(format!("no such note: {}", nid))
                }
                other => Error::Sqlite(other),
            })
    }

    pub fn find_note_by_guid(&self, guid: &str) -> Result<Option<NoteRow>> {
        self.conn
            .query_row(
                "SELECT id, guid, mid, tags, flds, sfld FROM notes WHERE guid = ?1",
                params![guid],
                Self::row_to_note,
            )
            .optional()
            .map_err(Error::from)
    }

    fn row_to_note(row: &rusqlite::Row) -> rusqlite::Result<NoteRow> {
        let tags_raw: String = row.get(3)?;
        let flds_raw: String = row.get(4)?;
        Ok(NoteRow {
            id: row.get(0)?,
            guid: row.get(1)?,
            mid: row.get(2)?,
            tags: tags_raw.split_whitespace().map(String::from).collect(),
            fields: flds_raw.split('\u{1f}').map(String::from).collect(),
            sfld: row.get(5)?,
        })
    }

    /// Insert a new note row directly, bypassing higher-level validation.
    /// Caller is responsible for minting `nid` and calling
    /// [`Collection::after_note_updates`] afterwards.
    pub fn add_note(
        &self,
        nid: i64,
        guid: &str,
        mid: i64,
        tags: &[String],
        fields: &[String],
        sfld: &str,
    ) -> Result<()> {
        let flds = fields.join("\u{1f}");
        let tags_str = if tags.is_empty() {
            String::new()
        } else {
            format!(" {} ", tags.join(" "))
        };
        let csum = crc32_checksum(sfld);
        self.conn.execute(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
             VALUES (?1, ?2, ?3, ?4, -1, ?5, ?6, ?7, ?8, 0, '')",
            params![nid, guid, mid, now_secs(), tags_str, flds, sfld, csum],
        )?;
        Ok(())
    }

    /// Remove notes and their cards.
    pub fn remove_notes(&self, nids: &[i64]) -> Result<()> {
        if nids.is_empty() {
            return Ok(());
        }
        let placeholders = nids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        self.conn.execute(
            &format!("DELETE FROM cards WHERE nid IN ({})", placeholders),
            rusqlite::params_from_iter(nids.iter()),
        )?;
        self.conn.execute(
            &format!("DELETE FROM notes WHERE id IN ({})", placeholders),
            rusqlite::params_from_iter(nids.iter()),
        )?;
        Ok(())
    }

    pub fn update_note_tags_and_fields(
        &self,
        nid: i64,
        tags: &[String],
        fields: &[String],
        sfld: &str,
    ) -> Result<()> {
        let flds = fields.join("\u{1f}");
        let tags_str = if tags.is_empty() {
            String::new()
        } else {
            format!(" {} ", tags.join(" "))
        };
        let csum = crc32_checksum(sfld);
        self.conn.execute(
            "UPDATE notes SET tags = ?1, flds = ?2, sfld = ?3, csum = ?4, mod = ?5 WHERE id = ?6",
            params![tags_str, flds, sfld, csum, now_secs(), nid],
        )?;
        Ok(())
    }

    /// Mark notes modified; in the real collection this bumps `usn` for
    /// sync bookkeeping. No-op placeholder kept for interface parity since
    /// `ki` never talks to AnkiWeb sync.
    pub fn after_note_updates(&self, _nids: &[i64]) -> Result<()> {
        Ok(())
    }

    pub fn cids_for_nid(&self, nid: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM cards WHERE nid = ?1")?;
        let ids = stmt
            .query_map(params![nid], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn set_deck(&self, cids: &[i64], did: i64) -> Result<()> {
        if cids.is_empty() {
            return Ok(());
        }
        let placeholders = cids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let mut query_params: Vec<&dyn rusqlite::ToSql> = vec![&did];
        query_params.extend(cids.iter().map(|c| c as &dyn rusqlite::ToSql));
        self.conn.execute(
            &format!("UPDATE cards SET did = ? WHERE id IN ({})", placeholders),
            query_params.as_slice(),
        )?;
        Ok(())
    }

    pub fn did_for_cid(&self, cid: i64) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT did FROM cards WHERE id = ?1", params![cid], |r| {
                r.get(0)
            })?)
    }

    pub fn nid_for_cid(&self, cid: i64) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT nid FROM cards WHERE id = ?1", params![cid], |r| {
                r.get(0)
            })?)
    }

    /// Card ids belonging to deck `did`. When `children` is set, also
    /// includes every card whose deck's name is `did`'s name followed by
    /// `::`, i.e. every descendant deck's cards too.
    pub fn cids(&self, did: i64, children: bool) -> Result<Vec<i64>> {
        let dids = if children {
            self.descendant_deck_ids(did)?
        } else {
            vec![did]
        };
        if dids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = dids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id FROM cards WHERE did IN ({})", placeholders))?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(dids.iter()), |r| r.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// `did` itself plus the id of every deck whose name is `did`'s name
    /// followed by `::<anything>`.
    fn descendant_deck_ids(&self, did: i64) -> Result<Vec<i64>> {
        let name = self.deck_name(did)?;
        let prefix = format!("{}::", name);
        let decks = self.col_blob("decks")?;
        let mut out = vec![did];
        if let Some(obj) = decks.as_object() {
            for (id, d) in obj {
                if let Some(other) = d.get("name").and_then(Value::as_str) {
                    if other.starts_with(&prefix) {
                        out.push(id.parse().unwrap_or(0));
                    }
                }
            }
        }
        Ok(out)
    }

    /// The full deck hierarchy, reconstructed from `::`-separated deck
    /// names, as a tree rooted at a synthetic empty-named node.
    pub fn deck_tree(&self) -> Result<DeckNode> {
        let decks = self.col_blob("decks")?;
        let mut root = DeckNode {
            name: String::new(),
            did: 0,
            children: Vec::new(),
        };
        if let Some(obj) = decks.as_object() {
            let mut entries: Vec<(i64, String)> = obj
                .iter()
                .filter_map(|(id, d)| {
                    let name = d.get("name").and_then(Value::as_str)?.to_string();
                    Some((id.parse().unwrap_or(0), name))
                })
                .collect();
            entries.sort_by(|a, b| a.1.cmp(&b.1));
            for (did, name) in entries {
                insert_deck_path(&mut root, &name, did);
            }
        }
        Ok(root)
    }

    // -- col blob access ---------------------------------------------------

    fn col_blob(&self, column: &str) -> Result<Value> {
        let raw: String = self
            .conn
            .query_row(&format!("SELECT {} FROM col WHERE id = 1", column), [], |r| {
                r.get(0)
            })?;
        Ok(serde_json::from_str(&raw).unwrap_or_else(|_| json!({})))
    }

    fn set_col_blob(&self, column: &str, value: &Value) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.conn.execute(
            &format!("UPDATE col SET {} = ?1 WHERE id = 1", column),
            params![raw],
        )?;
        Ok(())
    }

    // -- decks --------------------------------------------------------------

    /// Look up (or, if `create`, create) the deck id for a `::`-joined name.
    pub fn deck_id(&self, name: &str, create: bool) -> Result<i64> {
        let decks = self.col_blob("decks")?;
        if let Some(obj) = decks.as_object() {
            for (id, deck) in obj {
                if deck.get("name").and_then(Value::as_str) == Some(name) {
                    return Ok(id.parse().unwrap_or(0));
                }
            }
        }
        if !create {
            return Err(Error::missing_notetype(format!("no such deck: {}", name)));
        }
        let mut decks = decks;
        let new_id = now_millis();
        let entry = json!({ "id": new_id, "name": name });
        decks
            .as_object_mut()
            .expect("decks blob is an object")
            .insert(new_id.to_string(), entry);
        self.set_col_blob("decks", &decks)?;
        Ok(new_id)
    }

    pub fn deck_name(&self, did: i64) -> Result<String> {
        let decks = self.col_blob("decks")?;
        decks
            .get(did.to_string())
            .and_then(|d| d.get("name"))
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| Error::missing_notetype(format!("no such deck id: {}", did)))
    }

    /// All deck names in this collection, in no particular order.
    pub fn all_deck_names(&self) -> Result<Vec<String>> {
        let decks = self.col_blob("decks")?;
        Ok(decks
            .as_object()
            .map(|obj| {
                obj.values()
                    .filter_map(|d| d.get("name").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }

    // -- notetypes / models ---------------------------------------------------

    pub fn all_model_names_and_ids(&self) -> Result<BTreeMap<String, i64>> {
        let models = self.col_blob("models")?;
        let mut out = BTreeMap::new();
        if let Some(obj) = models.as_object() {
            for (id, m) in obj {
                if let Some(name) = m.get("name").and_then(Value::as_str) {
                    out.insert(name.to_string(), id.parse().unwrap_or(0));
                }
            }
        }
        Ok(out)
    }

    pub fn model_id_for_name(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.all_model_names_and_ids()?.get(name).copied())
    }

    pub fn model_by_id(&self, mid: i64) -> Result<Value> {
        let models = self.col_blob("models")?;
        models
            .get(mid.to_string())
            .cloned()
            .ok_or_else(|| Error::missing_notetype(format!("no such notetype id: {}", mid)))
    }

    pub fn model_field_names(&self, mid: i64) -> Result<Vec<String>> {
        let model = self.model_by_id(mid)?;
        Ok(model
            .get("flds")
            .and_then(Value::as_array)
            .map(|flds| {
                flds.iter()
                    .filter_map(|f| f.get("name").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Add a notetype if no notetype of that name exists. Returns `Ok(true)`
    /// if it was added, `Ok(false)` if a same-name notetype already exists
    /// (caller should diff the JSON and emit `NotetypeCollisionWarning` if
    /// it differs).
    pub fn add_model_if_absent(&self, name: &str, field_names: &[String]) -> Result<bool> {
        if self.model_id_for_name(name)?.is_some() {
            return Ok(false);
        }
        let mut models = self.col_blob("models")?;
        let new_id = now_millis();
        let flds: Vec<Value> = field_names
            .iter()
            .enumerate()
            .map(|(ord, n)| json!({ "name": n, "ord": ord }))
            .collect();
        let entry = json!({
            "id": new_id,
            "name": name,
            "flds": flds,
            "tmpls": [],
            "css": "",
            "sortf": 0,
        });
        models
            .as_object_mut()
            .expect("models blob is an object")
            .insert(new_id.to_string(), entry);
        self.set_col_blob("models", &models)?;
        Ok(true)
    }

    /// Remap a note's fields from the old notetype's field order to the
    /// new's, clearing any field absent from `field_map`.
    pub fn change_model(
        &self,
        nid: i64,
        new_mid: i64,
        field_map: &BTreeMap<usize, Option<usize>>,
    ) -> Result<()> {
        let note = self.get_note(nid)?;
        let new_field_count = self.model_field_names(new_mid)?.len();
        let mut new_fields = vec![String::new(); new_field_count];
        for (old_idx, maybe_new_idx) in field_map {
            if let Some(new_idx) = maybe_new_idx {
                if let Some(val) = note.fields.get(*old_idx) {
                    if *new_idx < new_fields.len() {
                        new_fields[*new_idx] = val.clone();
                    }
                }
            }
        }
        let sfld = new_fields.first().cloned().unwrap_or_default();
        self.conn.execute(
            "UPDATE notes SET mid = ?1, flds = ?2, sfld = ?3, csum = ?4 WHERE id = ?5",
            params![
                new_mid,
                new_fields.join("\u{1f}"),
                sfld,
                crc32_checksum(&sfld),
                nid
            ],
        )?;
        Ok(())
    }

    /// Anki's fields-health check, run after a note's fields are written.
    /// Returns `0` (healthy), `1` (sort field empty once HTML is stripped),
    /// `2` (another note of the same notetype has an identical sort field),
    /// or some other nonzero code for any other unhealthy state.
    pub fn fields_check(&self, mid: i64, nid: i64, sfld: &str) -> Result<i32> {
        if crate::paths::strip_html(sfld).trim().is_empty() {
            return Ok(1);
        }
        let csum = crc32_checksum(sfld);
        let mut stmt = self
            .conn
            .prepare("SELECT sfld FROM notes WHERE mid = ?1 AND csum = ?2 AND id != ?3")?;
        let mut rows = stmt.query(params![mid, csum, nid])?;
        while let Some(row) = rows.next()? {
            let other_sfld: String = row.get(0)?;
            if other_sfld.trim() == sfld.trim() {
                return Ok(2);
            }
        }
        Ok(0)
    }

    // -- media ----------------------------------------------------------------

    pub fn media_have(&self, filename: &str) -> bool {
        self.media_dir.join(filename).is_file()
    }

    /// Copy a file into the media directory, renaming on content collision
    /// the way Anki's own media manager does (`name-<hash>.ext`).
    pub fn media_add_file(&self, src: &Path) -> Result<String> {
        let name = src
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::invalid_path(format!("not a file name: {}", src.display())))?;
        let dest = self.media_dir.join(name);
        if dest.is_file() {
            let existing = std::fs::read(&dest).map_err(|e| Error::io_at(&dest, e))?;
            let incoming = std::fs::read(src).map_err(|e| Error::io_at(src, e))?;
            if existing == incoming {
                return Ok(name.to_string());
            }
            let digest = format!("{:x}", md5::compute(&incoming));
            let (stem, ext) = split_ext(name);
            let new_name = format!("{}-{}{}", stem, &digest[..8], ext);
            let new_dest = self.media_dir.join(&new_name);
            std::fs::copy(src, &new_dest).map_err(|e| Error::io_at(&new_dest, e))?;
            return Ok(new_name);
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }
        std::fs::copy(src, &dest).map_err(|e| Error::io_at(&dest, e))?;
        Ok(name.to_string())
    }

    /// Percent-encode (or, with `unescape`, percent-decode) the filename
    /// portion of every `<img src="...">` and `[sound:...]` reference in
    /// `text`, mirroring `MediaManager.escape_media_filenames`.
    pub fn escape_media_filenames(text: &str, unescape: bool) -> String {
        let img_re = regex::Regex::new(r#"(<img[^>]+src=["'])([^"'>]+)(["'][^>]*>)"#).unwrap();
        let sound_re = regex::Regex::new(r"(\[sound:)([^\]]+)(\])").unwrap();

        let transform = |name: &str| -> String {
            if unescape {
                percent_decode(name)
            } else {
                percent_encode(name)
            }
        };

        let out = img_re.replace_all(text, |caps: &regex::Captures| {
            format!("{}{}{}", &caps[1], transform(&caps[2]), &caps[3])
        });
        sound_re
            .replace_all(&out, |caps: &regex::Captures| {
                format!("{}{}{}", &caps[1], transform(&caps[2]), &caps[3])
            })
            .to_string()
    }
}

fn insert_deck_path(root: &mut DeckNode, name: &str, did: i64) {
    let parts: Vec<&str> = name.split("::").collect();
    let mut node = root;
    let mut built = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            built.push_str(part);
        } else {
            built.push_str("::");
            built.push_str(part);
        }
        let is_leaf = i == parts.len() - 1;
        let idx = match node.children.iter().position(|c| c.name == built) {
            Some(p) => p,
            None => {
                node.children.push(DeckNode {
                    name: built.clone(),
                    did: 0,
                    children: Vec::new(),
                });
                node.children.len() - 1
            }
        };
        if is_leaf {
            node.children[idx].did = did;
        }
        node = &mut node.children[idx];
    }
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(
                std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or(""),
                16,
            ) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).to_string()
}

fn split_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx..]),
        None => (name, ""),
    }
}

fn media_dir_for(collection_path: &Path) -> PathBuf {
    let mut dir = collection_path.to_path_buf();
    let stem = collection_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("collection");
    dir.set_file_name(format!("{}.media", stem));
    dir
}

fn crc32_checksum(sfld: &str) -> i64 {
    let stripped: String = sfld.chars().filter(|c| !c.is_whitespace()).collect();
    crc32(stripped.as_bytes()) as i64
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_is_deterministic() {
        assert_eq!(crc32_checksum("Hello"), crc32_checksum("Hello"));
        assert_ne!(crc32_checksum("Hello"), crc32_checksum("World"));
    }

    #[test]
    fn media_regexps_find_img_and_sound() {
        let re = MediaRegexps::new();
        let names = re.find_local_filenames(r#"<img src="cat.png"> [sound:bark.mp3]"#);
        assert_eq!(names, vec!["cat.png".to_string(), "bark.mp3".to_string()]);
    }

    #[test]
    fn media_regexps_ignores_remote_urls() {
        let re = MediaRegexps::new();
        let names = re.find_local_filenames(r#"<img src="https://example.com/cat.png">"#);
        assert!(names.is_empty());
    }

    #[test]
    fn split_ext_basic() {
        assert_eq!(split_ext("cat.png"), ("cat", ".png"));
        assert_eq!(split_ext("noext"), ("noext", ""));
    }

    #[test]
    fn escape_media_filenames_round_trips_through_percent_encoding() {
        let html = r#"<img src="my photo.png">"#;
        let escaped = Collection::escape_media_filenames(html, false);
        assert_eq!(escaped, r#"<img src="my%20photo.png">"#);
        let unescaped = Collection::escape_media_filenames(&escaped, true);
        assert_eq!(unescaped, html);
    }

    #[test]
    fn escape_media_filenames_handles_sound_refs() {
        let field = "[sound:a b.mp3]";
        assert_eq!(
            Collection::escape_media_filenames(field, false),
            "[sound:a%20b.mp3]"
        );
    }

    #[test]
    fn insert_deck_path_builds_nested_tree() {
        let mut root = DeckNode {
            name: String::new(),
            did: 0,
            children: Vec::new(),
        };
        insert_deck_path(&mut root, "Languages", 1);
        insert_deck_path(&mut root, "Languages::French", 2);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].name, "Languages");
        assert_eq!(root.children[0].children.len(), 1);
        assert_eq!(root.children[0].children[0].name, "Languages::French");
        let names: Vec<&str> = root.preorder().iter().skip(1).map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Languages", "Languages::French"]);
    }
}
