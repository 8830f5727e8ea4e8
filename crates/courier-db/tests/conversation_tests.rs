use std::sync::Arc;

use courier_db::{CoreError, Database};

const NOW: i64 = 1_700_000_000_000;

fn setup_db() -> Database {
    Database::open_in_memory().expect("memory db")
}

#[test]
fn pair_is_canonicalized_regardless_of_argument_order() {
    let db = setup_db();

    let first = db.get_or_create_conversation(9, 5, NOW).expect("create");
    let second = db.get_or_create_conversation(5, 9, NOW + 1).expect("get");

    assert_eq!(first.id, second.id);
    assert_eq!(first.participant_low, 5);
    assert_eq!(first.participant_high, 9);

    let count: i64 = db
        .with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?)
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn get_or_create_is_idempotent() {
    let db = setup_db();

    let a = db.get_or_create_conversation(1, 2, NOW).unwrap();
    let b = db.get_or_create_conversation(1, 2, NOW + 5000).unwrap();

    assert_eq!(a.id, b.id);
    // The original creation time sticks; a later get does not rewrite it.
    assert_eq!(b.created_at, NOW);
}

#[test]
fn self_conversation_is_rejected() {
    let db = setup_db();

    match db.get_or_create_conversation(7, 7, NOW) {
        Err(CoreError::Validation(_)) => {}
        other => panic!("expected validation error, got {:?}", other.map(|c| c.id)),
    }
}

#[test]
fn creation_makes_no_messages() {
    let db = setup_db();

    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();
    assert_eq!(conv.last_message_id, None);
    assert_eq!(conv.last_message_at, conv.created_at);

    let messages = db.list_messages(conv.id, None, 10).unwrap();
    assert!(messages.is_empty());
}

#[test]
fn concurrent_callers_converge_on_one_row() {
    let db = Arc::new(setup_db());

    let mut handles = Vec::new();
    for i in 0..16 {
        let db = db.clone();
        // Half the callers pass the pair in reverse order.
        let (a, b) = if i % 2 == 0 { (11, 42) } else { (42, 11) };
        handles.push(std::thread::spawn(move || {
            db.get_or_create_conversation(a, b, NOW + i).expect("get or create").id
        }));
    }

    let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let count: i64 = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM conversations WHERE participant_low = 11 AND participant_high = 42",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn participant_lookup_enforces_membership() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    assert!(db.conversation_for_participant(conv.id, 1).is_ok());
    assert!(db.conversation_for_participant(conv.id, 2).is_ok());
    assert!(matches!(
        db.conversation_for_participant(conv.id, 3),
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        db.conversation_for_participant(conv.id + 100, 1),
        Err(CoreError::NotFound(_))
    ));
}
