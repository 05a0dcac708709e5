mod common;

use common::create_fixture_collection;

#[test]
fn pull_with_no_changes_reports_up_to_date() {
    let dir = tempfile::tempdir().unwrap();
    let collection = create_fixture_collection(dir.path(), &[("Front", "Back")]);
    let target = dir.path().join("repo");
    ki::clone::clone(&collection, &target).unwrap();

    let report = ki::pull::pull(&target).unwrap();
    assert_eq!(report.outcome, ki::types::PullOutcome::UpToDate);
}

#[test]
fn pull_brings_in_a_note_added_directly_to_the_collection() {
    let dir = tempfile::tempdir().unwrap();
    let collection = create_fixture_collection(dir.path(), &[("Front", "Back")]);
    let target = dir.path().join("repo");
    ki::clone::clone(&collection, &target).unwrap();

    // A note added straight to the collection, bypassing ki entirely.
    {
        let conn = rusqlite::Connection::open(&collection).unwrap();
        conn.execute(
            "INSERT INTO notes (id, guid, mid, mod, usn, tags, flds, sfld, csum, flags, data)
             VALUES (1799999999999, 'gnew', 1600000000000, 0, -1, '', 'Bonsoir\u{1f}Good evening', 'Bonsoir', 0, 0, '')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cards (id, nid, did, ord, mod, usn, type, queue, due, ivl, factor,
                                 reps, lapses, left, odue, odid, flags, data)
             VALUES (1799999999998, 1799999999999, 1, 0, 0, -1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, '')",
            [],
        )
        .unwrap();
    }

    let report = ki::pull::pull(&target).unwrap();
    assert_eq!(report.outcome, ki::types::PullOutcome::Merged);

    let deck_dir = target.join("Default");
    let note_count = std::fs::read_dir(&deck_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "md").unwrap_or(false))
        .count();
    assert_eq!(note_count, 2);
}
