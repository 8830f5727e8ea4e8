use courier_db::Database;

const NOW: i64 = 1_700_000_000_000;

fn setup_db() -> Database {
    Database::open_in_memory().expect("memory db")
}

#[test]
fn absent_row_means_defaults() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    let settings = db.get_settings(conv.id, 1).unwrap();
    assert!(!settings.archived);
    assert!(!settings.muted);
}

#[test]
fn each_flag_updates_without_clobbering_the_other() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    let s = db.set_muted(conv.id, 1, true).unwrap();
    assert!(s.muted);
    assert!(!s.archived);

    let s = db.set_archived(conv.id, 1, true).unwrap();
    assert!(s.archived);
    assert!(s.muted);

    let s = db.set_muted(conv.id, 1, false).unwrap();
    assert!(!s.muted);
    assert!(s.archived);
}

#[test]
fn settings_are_per_viewer() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    db.set_archived(conv.id, 1, true).unwrap();

    // One participant archiving changes nothing for the other.
    assert!(!db.get_settings(conv.id, 2).unwrap().archived);
    assert!(db.get_settings(conv.id, 1).unwrap().archived);
}
