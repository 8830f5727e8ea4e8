use courier_db::Database;

const NOW: i64 = 1_700_000_000_000;

fn setup_db() -> Database {
    Database::open_in_memory().expect("memory db")
}

#[test]
fn unread_counts_only_the_peers_live_messages() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    for i in 0..3 {
        db.send_message(conv.id, 1, &format!("m{}", i), &[], NOW + i).unwrap();
    }

    // The sender's own messages never count toward their own unread.
    assert_eq!(db.unread_count(conv.id, 2).unwrap(), 3);
    assert_eq!(db.unread_count(conv.id, 1).unwrap(), 0);
}

#[test]
fn marking_read_zeroes_the_count_and_is_idempotent() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    db.send_message(conv.id, 1, "one", &[], NOW + 1).unwrap();
    db.send_message(conv.id, 1, "two", &[], NOW + 2).unwrap();
    assert_eq!(db.unread_count(conv.id, 2).unwrap(), 2);

    db.mark_conversation_read(conv.id, 2, NOW + 3).unwrap();
    assert_eq!(db.unread_count(conv.id, 2).unwrap(), 0);

    db.mark_conversation_read(conv.id, 2, NOW + 4).unwrap();
    assert_eq!(db.unread_count(conv.id, 2).unwrap(), 0);
}

#[test]
fn marking_an_empty_conversation_is_a_no_op() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    db.mark_conversation_read(conv.id, 2, NOW + 1).unwrap();
    assert_eq!(db.read_cursor(conv.id, 2).unwrap(), None);
}

#[test]
fn cursor_never_moves_backward() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    let first = db.send_message(conv.id, 1, "one", &[], NOW + 1).unwrap();
    let second = db.send_message(conv.id, 1, "two", &[], NOW + 2).unwrap();

    db.mark_conversation_read(conv.id, 2, NOW + 3).unwrap();
    assert_eq!(db.read_cursor(conv.id, 2).unwrap(), Some(second.message.id));

    // A stale marker arriving late must lose: same ordinal or older is
    // silently ignored.
    db.advance_read_cursor(conv.id, 2, first.message.id, NOW + 4).unwrap();
    assert_eq!(db.read_cursor(conv.id, 2).unwrap(), Some(second.message.id));
}

#[test]
fn messages_deleted_before_reading_do_not_inflate_unread() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    db.send_message(conv.id, 1, "kept", &[], NOW + 1).unwrap();
    let regret = db.send_message(conv.id, 1, "regret", &[], NOW + 2).unwrap();
    assert_eq!(db.unread_count(conv.id, 2).unwrap(), 2);

    db.soft_delete_message(regret.message.id, 1, NOW + 3).unwrap();
    assert_eq!(db.unread_count(conv.id, 2).unwrap(), 1);
}

#[test]
fn conversation_list_orders_by_latest_activity() {
    let db = setup_db();
    let early = db.get_or_create_conversation(1, 2, NOW).unwrap();
    let late = db.get_or_create_conversation(1, 3, NOW + 1).unwrap();

    db.send_message(late.id, 3, "from three", &[], NOW + 10).unwrap();
    db.send_message(early.id, 2, "from two", &[], NOW + 20).unwrap();

    let list = db.list_conversations_for_user(1).unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].conversation.id, early.id);
    assert_eq!(list[1].conversation.id, late.id);
    assert_eq!(list[0].unread_count, 1);
    assert_eq!(list[0].last_message.as_ref().unwrap().body, "from two");

    // Defaults apply when no settings row exists.
    assert!(!list[0].settings.archived);
    assert!(!list[0].settings.muted);

    // User 4 participates in nothing.
    assert!(db.list_conversations_for_user(4).unwrap().is_empty());
}

#[test]
fn conversation_list_previews_deleted_messages_as_tombstones() {
    let db = setup_db();
    let conv = db.get_or_create_conversation(1, 2, NOW).unwrap();

    let last = db.send_message(conv.id, 2, "sensitive", &[], NOW + 1).unwrap();
    db.soft_delete_message(last.message.id, 2, NOW + 2).unwrap();

    let list = db.list_conversations_for_user(1).unwrap();
    let preview = list[0].last_message.as_ref().unwrap();
    assert!(preview.deleted_at.is_some());
    assert_eq!(preview.body, "");
    // Deleted before being read, so it does not count as unread either.
    assert_eq!(list[0].unread_count, 0);
}
