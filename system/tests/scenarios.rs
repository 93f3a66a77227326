use system::{
    ClientPresence, CursorPosition, ServerRoom, SessionCommand, SharedPayload, SystemEvent,
};

fn payload_x1() -> SharedPayload {
    SharedPayload::from_json(&system::serde_json::json!({ "x": 1 }))
}

#[test]
fn it_reports_own_section_and_cursor() {
    let mut presence = ClientPresence::new("room-1".into(), "u1".into(), "Alice".into(), true);

    presence.report_section("analytics");
    presence.report_cursor(10.0, 20.0, "analytics");

    assert_eq!(presence.me().current_section, "analytics");
    assert_eq!(
        presence.me().cursor,
        Some(CursorPosition::new(10.0, 20.0, "analytics"))
    );
    assert!(presence.list_others().is_empty());
}

#[test]
fn it_hides_peer_without_cursor_from_overlay() {
    let mut room = ServerRoom::new("room-1".into(), "u1".into());
    room.join("u1".into(), "Alice".into()).expect("");
    let mut presence = ClientPresence::new("room-1".into(), "u1".into(), "Alice".into(), true);

    let joined = room.join("u2".into(), "Bob".into()).expect("");
    presence.handle_session_event(joined);
    let section = room
        .apply(
            "u2",
            SessionCommand::Section(system::SectionCommand {
                section: "dashboard".into(),
            }),
        )
        .expect("");
    presence.handle_session_event(section);

    let u2 = presence.participant("u2").expect("");
    assert!(!u2.is_host());
    assert_eq!(u2.current_section, "dashboard");
    assert!(presence.list_in_section("dashboard").is_empty());
}

#[test]
fn it_lets_only_host_update_shared_payload() {
    let mut room = ServerRoom::new("room-1".into(), "u1".into());
    room.join("u1".into(), "Alice".into()).expect("");
    let joined = room.join("u2".into(), "Bob".into()).expect("");
    let snapshot = room.snapshot();

    let mut host = ClientPresence::from_snapshot("u1".into(), snapshot.clone()).expect("");
    let mut guest = ClientPresence::from_snapshot("u2".into(), snapshot).expect("");
    assert!(!host.handle_session_event(joined));

    assert!(guest.update_shared_payload(payload_x1()).is_none());
    assert!(guest.shared_payload().is_none());

    let command = host.update_shared_payload(payload_x1()).expect("");
    assert_eq!(host.shared_payload(), Some(&payload_x1()));

    let event = room.apply("u1", command).expect("");
    assert!(guest.handle_session_event(event.clone()));
    assert_eq!(guest.shared_payload(), Some(&payload_x1()));
    assert_eq!(
        guest.shared_payload().and_then(|p| p.to_json().ok()),
        Some(system::serde_json::json!({ "x": 1 }))
    );

    // redelivery is harmless
    assert!(!guest.handle_session_event(event));
}

#[test]
fn it_relays_cursor_between_clients() {
    let mut room = ServerRoom::new("room-1".into(), "u1".into());
    room.join("u1".into(), "Alice".into()).expect("");
    room.join("u2".into(), "Bob".into()).expect("");
    let mut host = ClientPresence::from_snapshot("u1".into(), room.snapshot()).expect("");
    let mut guest = ClientPresence::from_snapshot("u2".into(), room.snapshot()).expect("");

    for command in vec![
        guest.report_section("analytics"),
        guest.report_cursor(3.0, 4.0, "analytics"),
    ] {
        let event = room.apply("u2", command).expect("");
        host.handle_session_event(event);
    }

    let overlay = host.list_in_section("analytics");
    assert_eq!(overlay.len(), 1);
    assert_eq!(overlay[0].cursor, guest.me().cursor);

    let left = room.leave("u2").expect("");
    assert!(host.handle_session_event(left));
    assert!(host.list_others().is_empty());
}

#[test]
fn it_joins_late_with_current_state() {
    let mut room = ServerRoom::new("room-1".into(), "u1".into());
    room.join("u1".into(), "Alice".into()).expect("");
    room.apply("u1", SessionCommand::SharedPayload(payload_x1()))
        .expect("");
    room.join("u3".into(), "Carol".into()).expect("");

    let reply = SystemEvent::JoinedSession {
        participant_id: "u3".into(),
        session_snapshot: room.snapshot(),
    };
    let presence = match reply {
        SystemEvent::JoinedSession {
            participant_id,
            session_snapshot,
        } => ClientPresence::from_snapshot(participant_id, session_snapshot).expect(""),
        _ => panic!("unexpected event"),
    };
    assert_eq!(presence.shared_payload(), Some(&payload_x1()));
    assert_eq!(presence.list_others().len(), 1);
    assert!(matches!(
        presence.list_others().first(),
        Some(p) if p.is_host()
    ));
}
