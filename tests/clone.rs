mod common;

use common::create_fixture_collection;

#[test]
fn clone_writes_one_note_file_per_note() {
    let dir = tempfile::tempdir().unwrap();
    let collection = create_fixture_collection(
        dir.path(),
        &[("Bonjour", "Hello"), ("Au revoir", "Goodbye")],
    );
    let target = dir.path().join("repo");

    let report = ki::clone::clone(&collection, &target).unwrap();
    assert_eq!(report.notes_written, 2);

    let deck_dir = target.join("Default");
    assert!(deck_dir.is_dir());
    let note_files: Vec<_> = std::fs::read_dir(&deck_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map(|x| x == "md").unwrap_or(false))
        .collect();
    assert_eq!(note_files.len(), 2);
}

#[test]
fn clone_writes_ki_sidecar_and_tags_lca() {
    let dir = tempfile::tempdir().unwrap();
    let collection = create_fixture_collection(dir.path(), &[("Front", "Back")]);
    let target = dir.path().join("repo");

    ki::clone::clone(&collection, &target).unwrap();

    assert!(ki::repo::config_path(&target).is_file());
    assert!(ki::repo::hashes_path(&target).is_file());

    let repo = git2::Repository::open(&target).unwrap();
    let tag = repo.find_reference(&format!("refs/tags/{}", ki::types::LCA_TAG));
    assert!(tag.is_ok());
}

#[test]
fn clone_note_files_round_trip_through_grammar() {
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
    assert!(ki::notegrammar::is_anki_note(&content));
    let parsed = ki::notegrammar::parse_note(&content, "").unwrap();
    assert_eq!(parsed.model, "Basic");
    assert_eq!(parsed.fields[0].1, "Bonjour");
}

#[test]
fn clone_into_non_empty_directory_fails_and_leaves_it_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let collection = create_fixture_collection(dir.path(), &[("Front", "Back")]);
    let target = dir.path().join("repo");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("stray.txt"), b"keep me").unwrap();

    let err = ki::clone::clone(&collection, &target);
    assert!(err.is_err());
    assert!(target.join("stray.txt").is_file());
}
