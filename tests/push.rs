mod common;

use common::create_fixture_collection;

#[test]
fn push_with_no_changes_reports_up_to_date() {
    let dir = tempfile::tempdir().unwrap();
    let collection = create_fixture_collection(dir.path(), &[("Front", "Back")]);
    let target = dir.path().join("repo");
    ki::clone::clone(&collection, &target).unwrap();

    let report = ki::push::push(&target).unwrap();
    assert_eq!(report.outcome, ki::types::PushOutcome::UpToDate);
}

#[test]
fn push_after_editing_a_note_updates_the_collection() {
    let dir = tempfile::tempdir().unwrap();
    let collection = create_fixture_collection(dir.path(), &[("Bonjour", "Hello")]);
    let target = dir.path().join("repo");
    ki::clone::clone(&collection, &target).unwrap();

    let deck_dir = target.join("Default");
    let note_path = std::fs::read_dir(&deck_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .find(|e| e.path().extension().map(|x| x == "md").unwrap_or(false))
        .unwrap()
        .path();
    let content = std::fs::read_to_string(&note_path).unwrap();
    let updated = content.replace("Hello", "Good day");
    std::fs::write(&note_path, updated).unwrap();

    let report = ki::push::push(&target).unwrap();
    assert_eq!(report.outcome, ki::types::PushOutcome::NonTrivial);
    assert!(report.summary.modified >= 1);

    let col = ki::collection::Collection::open(&collection).unwrap();
    let nids = col.find_notes().unwrap();
    let note = col.get_note(nids[0]).unwrap();
    assert!(note.fields.iter().any(|f| f.contains("Good day")));
}

#[test]
fn push_rejects_when_collection_changed_since_last_sync() {
    let dir = tempfile::tempdir().unwrap();
    let collection = create_fixture_collection(dir.path(), &[("Front", "Back")]);
    let target = dir.path().join("repo");
    ki::clone::clone(&collection, &target).unwrap();

    // Simulate someone else touching the collection after the clone.
    std::fs::write(&collection, b"mutated-out-of-band").unwrap();

    let err = ki::push::push(&target);
    assert!(err.is_err());
}
