use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde_json::json;

/// Build a minimal fixture Anki collection at `<dir>/collection.anki2`,
/// with one "Basic" notetype, one "Default" deck, and the given notes
/// (front, back) pairs. Returns the collection path.
pub fn create_fixture_collection(dir: &Path, notes: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("collection.anki2");
    let conn = Connection::open(&path).unwrap();

    conn.execute_batch(
        "CREATE TABLE col (
            id INTEGER PRIMARY KEY,
            crt INTEGER, mod INTEGER, scm INTEGER, ver INTEGER, dty INTEGER,
            usn INTEGER, ls INTEGER,
            conf TEXT, models TEXT, decks TEXT, dconf TEXT, tags TEXT
        );
        CREATE TABLE notes (
            id INTEGER PRIMARY KEY, guid TEXT, mid INTEGER, mod INTEGER, usn INTEGER,
            tags TEXT, flds TEXT, sfld TEXT, csum INTEGER, flags INTEGER, data TEXT
        );
        CREATE TABLE cards (
            id INTEGER PRIMARY KEY, nid INTEGER, did INTEGER, ord INTEGER,
            mod INTEGER, usn INTEGER, type INTEGER, queue INTEGER, due INTEGER,
            ivl INTEGER, factor INTEGER, reps INTEGER, lapses INTEGER, left INTEGER,
            odue INTEGER, odid INTEGER, flags INTEGER, data TEXT
        );",
    )
    .unwrap();

    let basic_mid = 1_600_000_000_000i64;
    let default_did = 1i64;

    let models = json!({
        basic_mid.to_string(): {
            "id": basic_mid,
            "name": "Basic",
            "flds": [{"name": "Front", "ord": 0}, {"name": "Back", "ord": 1}],
            "tmpls": [],
            "css": "",
            "sortf": 0,
        }
    });
    let decks = json!({
        default_did.to_string(): { "id": default_did, "name": "Default" }
    });

    conn.execute(
        "INSERT INTO col (id, crt, mod, scm, ver, dty, usn, ls, conf, models, decks, dconf, tags)
         VALUES (1, 0, 0, 0, 11, 0, 0, 0, '{}', ?1, ?2, '{}', '{}')",
        params![models.to_string(), decks.to_string()],
    )
    .unwrap();

    for (i, (front, back)) in notes.iter().enumerate() {
        let nid = 1_700_000_000_000i64 + i as i64;
        let guid = format!("g{:x}", nid);
        conn.execute(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
             VALUES (?1, ?2, ?3, 0, -1, '', ?4, ?5, 0, 0, '')",
            params![nid, guid, basic_mid, format!("{}\u{1f}{}", front, back), front],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor,
                                 reps, lapses, left, odue, odid, flags, data)
             VALUES (?1, ?2, ?3, 0, 0, -1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, '')",
            params![nid + 1, nid, default_did],
        )
        .unwrap();
    }

    drop(conn);
    std::fs::create_dir_all(dir.join("collection.media")).unwrap();
    path
}
