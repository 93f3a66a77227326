use std::collections::HashMap;

use crate::message::*;
use crate::participant::{CursorPosition, Participant};
use crate::types::{palette_color, ParticipantId, Seq, SessionId};

/// Last applied `seq` for every independently-written field of a peer.
#[derive(Debug, Default, Clone, Copy)]
struct FieldClock {
    membership: Seq,
    cursor: Seq,
    section: Seq,
}

/// Why a join snapshot was not adopted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    MissingSelf,
    /// The room seats this participant with a different role than the one
    /// it was constructed with.
    RoleMismatch { expected_host: bool },
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::MissingSelf => f.write_str("snapshot does not contain self"),
            SnapshotError::RoleMismatch { expected_host: true } => {
                f.write_str("joined as guest, expected host")
            }
            SnapshotError::RoleMismatch { expected_host: false } => {
                f.write_str("joined as host, expected guest")
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Client-side presence of one call session: who is here, what they look
/// at, where their pointer is, and whether this participant may mutate
/// shared state.
///
/// Local operations never fail. Those that must reach the peers return the
/// `SessionCommand` the transport has to emit.
pub struct ClientPresence {
    session_id: SessionId,
    self_id: ParticipantId,
    participants: HashMap<ParticipantId, Participant>,
    clocks: HashMap<ParticipantId, FieldClock>,
    shared_payload: Option<SharedPayload>,
    shared_payload_seq: Seq,
}

impl ClientPresence {
    pub fn new(
        session_id: SessionId,
        self_id: ParticipantId,
        self_name: String,
        self_is_host: bool,
    ) -> Self {
        let me = Participant::new(self_id.clone(), self_name, self_is_host, palette_color(0));
        let mut participants = HashMap::new();
        participants.insert(self_id.clone(), me);
        Self {
            session_id,
            self_id,
            participants,
            clocks: HashMap::new(),
            shared_payload: None,
            shared_payload_seq: 0,
        }
    }

    /// Builds the container from the snapshot the server hands out on join.
    /// Returns `None` when the snapshot doesn't contain `self_id`.
    pub fn from_snapshot(self_id: ParticipantId, snapshot: SessionSnapshot) -> Option<Self> {
        if !snapshot.participants.iter().any(|p| p.id == self_id) {
            log::warn!("Snapshot of {} misses {}", snapshot.session_id, self_id);
            return None;
        }
        let seq = snapshot.seq;
        let clock = FieldClock {
            membership: seq,
            cursor: seq,
            section: seq,
        };
        let mut participants = HashMap::new();
        let mut clocks = HashMap::new();
        for participant in snapshot.participants {
            if participant.id != self_id {
                clocks.insert(participant.id.clone(), clock);
            }
            participants.insert(participant.id.clone(), participant);
        }
        Some(Self {
            session_id: snapshot.session_id,
            self_id,
            participants,
            clocks,
            shared_payload: snapshot.shared_payload,
            shared_payload_seq: seq,
        })
    }

    /// Takes over the roster and payload of a join snapshot while keeping
    /// what was reported locally before the join. Returns the commands that
    /// bring the peers up to date with that local state.
    ///
    /// The role never changes: a snapshot seating self differently is
    /// refused and the container is left untouched.
    pub fn adopt_snapshot(
        &mut self,
        snapshot: SessionSnapshot,
    ) -> Result<Vec<SessionCommand>, SnapshotError> {
        let expected_host = self.can_interact();
        let mut adopted = ClientPresence::from_snapshot(self.self_id.clone(), snapshot)
            .ok_or(SnapshotError::MissingSelf)?;
        if adopted.can_interact() != expected_host {
            log::warn!(
                "Refusing snapshot of {}: role of {} changed",
                adopted.session_id,
                self.self_id
            );
            return Err(SnapshotError::RoleMismatch { expected_host });
        }

        let local = self.me().clone();
        let mut pending = Vec::new();
        if local.current_section != adopted.me().current_section {
            pending.push(adopted.report_section(&local.current_section));
        }
        if let Some(cursor) = local.cursor {
            if adopted.me().cursor.as_ref() != Some(&cursor) {
                pending.push(adopted.report_cursor(cursor.x, cursor.y, &cursor.section));
            }
        }
        if expected_host {
            if let Some(payload) = self.shared_payload.take() {
                if adopted.shared_payload.as_ref() != Some(&payload) {
                    pending.extend(adopted.update_shared_payload(payload));
                }
            }
        }
        *self = adopted;
        Ok(pending)
    }

    /// Forgets every peer, e.g. after leaving the session.
    pub fn clear_peers(&mut self) {
        let self_id = &self.self_id;
        self.participants.retain(|id, _| id == self_id);
        self.clocks.clear();
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn me(&self) -> &Participant {
        self.participants
            .get(&self.self_id)
            .expect("self is always in the roster")
    }

    fn me_mut(&mut self) -> &mut Participant {
        self.participants
            .get_mut(&self.self_id)
            .expect("self is always in the roster")
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn shared_payload(&self) -> Option<&SharedPayload> {
        self.shared_payload.as_ref()
    }

    pub fn report_cursor(&mut self, x: f32, y: f32, section: &str) -> SessionCommand {
        self.me_mut().cursor = Some(CursorPosition::new(x, y, section));
        SessionCommand::Cursor(CursorCommand {
            x,
            y,
            section: section.to_owned(),
        })
    }

    pub fn report_section(&mut self, section: &str) -> SessionCommand {
        self.me_mut().current_section = section.to_owned();
        SessionCommand::Section(SectionCommand {
            section: section.to_owned(),
        })
    }

    /// Replaces the shared payload. Does nothing for a non-host.
    pub fn update_shared_payload(&mut self, payload: SharedPayload) -> Option<SessionCommand> {
        if !self.can_interact() {
            log::debug!("Ignoring shared payload update from non-host {}", self.self_id);
            return None;
        }
        self.shared_payload = Some(payload.clone());
        Some(SessionCommand::SharedPayload(payload))
    }

    pub fn can_interact(&self) -> bool {
        self.me().is_host()
    }

    pub fn list_others(&self) -> Vec<Participant> {
        let mut others = self
            .participants
            .values()
            .filter(|p| p.id != self.self_id)
            .cloned()
            .collect::<Vec<_>>();
        others.sort_by(|a, b| a.id.cmp(&b.id));
        others
    }

    /// Others looking at `section` with a known pointer: what a cursor
    /// overlay draws.
    pub fn list_in_section(&self, section: &str) -> Vec<Participant> {
        self.list_others()
            .into_iter()
            .filter(|p| p.is_in_section(section) && p.cursor.is_some())
            .collect()
    }

    pub fn list_in_other_sections(&self, section: &str) -> Vec<Participant> {
        self.list_others()
            .into_iter()
            .filter(|p| !p.is_in_section(section))
            .collect()
    }

    /// Applies an event relayed by the server. Returns whether anything
    /// changed; stale, duplicate and self-addressed events are dropped.
    pub fn handle_session_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::ParticipantJoined { seq, participant } => {
                if participant.id == self.self_id {
                    return false;
                }
                let clock = self.clocks.entry(participant.id.clone()).or_default();
                if seq <= clock.membership {
                    return false;
                }
                *clock = FieldClock {
                    membership: seq,
                    cursor: seq,
                    section: seq,
                };
                log::info!("{} joined {}", participant.id, self.session_id);
                self.participants.insert(participant.id.clone(), participant);
                true
            }
            SessionEvent::ParticipantLeft {
                seq,
                participant_id,
            } => {
                if participant_id == self.self_id {
                    return false;
                }
                let clock = self.clocks.entry(participant_id.clone()).or_default();
                if seq <= clock.membership {
                    return false;
                }
                clock.membership = seq;
                log::info!("{} left {}", participant_id, self.session_id);
                self.participants.remove(&participant_id).is_some()
            }
            SessionEvent::Cursor(CursorEvent {
                seq,
                participant_id,
                x,
                y,
                section,
            }) => {
                if let Some(participant) = self.peer_for_update(&participant_id, seq, |c| {
                    &mut c.cursor
                }) {
                    participant.cursor = Some(CursorPosition { x, y, section });
                    true
                } else {
                    false
                }
            }
            SessionEvent::Section(SectionEvent {
                seq,
                participant_id,
                section,
            }) => {
                if let Some(participant) = self.peer_for_update(&participant_id, seq, |c| {
                    &mut c.section
                }) {
                    participant.current_section = section;
                    true
                } else {
                    false
                }
            }
            SessionEvent::SharedPayload(SharedPayloadEvent { seq, payload, .. }) => {
                if seq <= self.shared_payload_seq {
                    return false;
                }
                self.shared_payload_seq = seq;
                self.shared_payload = Some(payload);
                true
            }
        }
    }

    /// Advances the clock selected by `field` and hands out the peer entry,
    /// unless the peer is unknown, is self, or the update is stale.
    fn peer_for_update<F>(&mut self, id: &str, seq: Seq, field: F) -> Option<&mut Participant>
    where
        F: Fn(&mut FieldClock) -> &mut Seq,
    {
        if id == self.self_id {
            return None;
        }
        let participant = self.participants.get_mut(id)?;
        let clock = self.clocks.entry(id.to_owned()).or_default();
        let last = field(clock);
        if seq <= *last {
            log::trace!("Dropping stale update {} for {}", seq, id);
            return None;
        }
        *last = seq;
        Some(participant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PALETTE;

    fn host_session() -> ClientPresence {
        ClientPresence::new("room-1".into(), "u1".into(), "Alice".into(), true)
    }

    fn peer(id: &str, section: &str) -> Participant {
        let mut p = Participant::new(id.into(), id.to_uppercase(), false, PALETTE[1]);
        p.current_section = section.into();
        p
    }

    fn cursor_event(seq: Seq, id: &str, x: f32, section: &str) -> SessionEvent {
        SessionEvent::Cursor(CursorEvent {
            seq,
            participant_id: id.into(),
            x,
            y: 0.0,
            section: section.into(),
        })
    }

    #[test]
    fn it_starts_with_self_only() {
        let presence = host_session();
        assert_eq!(presence.me().id, "u1");
        assert_eq!(presence.me().current_section, "");
        assert!(presence.me().cursor.is_none());
        assert!(presence.list_others().is_empty());
        assert!(presence.shared_payload().is_none());
    }

    #[test]
    fn it_never_lists_self_in_section() {
        let mut presence = host_session();
        presence.report_section("analytics");
        for i in 0..10 {
            presence.report_cursor(i as f32, i as f32, "analytics");
            assert!(presence.list_in_section("analytics").is_empty());
        }
    }

    #[test]
    fn it_ignores_shared_payload_from_non_host() {
        let mut presence = ClientPresence::new("room-1".into(), "u2".into(), "Bob".into(), false);
        let command = presence.update_shared_payload(SharedPayload::from_raw("{\"x\":1}"));
        assert!(command.is_none());
        assert!(presence.shared_payload().is_none());
    }

    #[test]
    fn it_replaces_shared_payload_without_merge() {
        let mut presence = host_session();
        presence.update_shared_payload(SharedPayload::from_raw("{\"a\":1}"));
        let command = presence.update_shared_payload(SharedPayload::from_raw("{\"b\":2}"));
        assert_eq!(
            command,
            Some(SessionCommand::SharedPayload(SharedPayload::from_raw(
                "{\"b\":2}"
            )))
        );
        assert_eq!(presence.shared_payload().map(|p| p.as_str()), Some("{\"b\":2}"));
    }

    #[test]
    fn it_keeps_interaction_flag_fixed() {
        let mut host = host_session();
        let mut guest = ClientPresence::new("room-1".into(), "u2".into(), "Bob".into(), false);
        for presence in [&mut host, &mut guest].iter_mut() {
            let before = presence.can_interact();
            presence.report_section("users");
            presence.report_cursor(1.0, 2.0, "users");
            presence.update_shared_payload(SharedPayload::from_raw("1"));
            presence.handle_session_event(SessionEvent::ParticipantJoined {
                seq: 1,
                participant: peer("u3", "users"),
            });
            assert_eq!(presence.can_interact(), before);
        }
        assert!(host.can_interact());
        assert!(!guest.can_interact());
    }

    #[test]
    fn it_requires_cursor_for_section_listing() {
        let mut presence = host_session();
        presence.handle_session_event(SessionEvent::ParticipantJoined {
            seq: 1,
            participant: peer("u2", "dashboard"),
        });
        assert!(presence.list_in_section("dashboard").is_empty());
        assert_eq!(presence.list_in_other_sections("analytics").len(), 1);

        presence.handle_session_event(cursor_event(2, "u2", 5.0, "dashboard"));
        let listed = presence.list_in_section("dashboard");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "u2");
        assert!(presence.list_in_section("analytics").is_empty());
    }

    #[test]
    fn it_drops_stale_and_duplicate_updates() {
        let mut presence = host_session();
        presence.handle_session_event(SessionEvent::ParticipantJoined {
            seq: 1,
            participant: peer("u2", "dashboard"),
        });
        assert!(presence.handle_session_event(cursor_event(5, "u2", 5.0, "dashboard")));
        assert!(!presence.handle_session_event(cursor_event(5, "u2", 6.0, "dashboard")));
        assert!(!presence.handle_session_event(cursor_event(3, "u2", 7.0, "dashboard")));
        assert_eq!(
            presence.participant("u2").and_then(|p| p.cursor.as_ref()).map(|c| c.x),
            Some(5.0)
        );

        // an older section update still applies: fields are clocked separately
        assert!(presence.handle_session_event(SessionEvent::Section(SectionEvent {
            seq: 4,
            participant_id: "u2".into(),
            section: "calls".into(),
        })));
        assert_eq!(presence.participant("u2").map(|p| p.current_section.as_str()), Some("calls"));
    }

    #[test]
    fn it_ignores_events_about_self_and_unknown_peers() {
        let mut presence = host_session();
        assert!(!presence.handle_session_event(cursor_event(1, "u1", 9.0, "x")));
        assert!(!presence.handle_session_event(cursor_event(2, "ghost", 9.0, "x")));
        assert!(!presence.handle_session_event(SessionEvent::ParticipantLeft {
            seq: 3,
            participant_id: "u1".into(),
        }));
        assert!(presence.me().cursor.is_none());
    }

    #[test]
    fn it_does_not_resurrect_after_late_join() {
        let mut presence = host_session();
        presence.handle_session_event(SessionEvent::ParticipantLeft {
            seq: 4,
            participant_id: "u2".into(),
        });
        let applied = presence.handle_session_event(SessionEvent::ParticipantJoined {
            seq: 2,
            participant: peer("u2", "dashboard"),
        });
        assert!(!applied);
        assert!(presence.list_others().is_empty());
    }

    #[test]
    fn it_orders_shared_payload_by_seq() {
        let mut presence = ClientPresence::new("room-1".into(), "u2".into(), "Bob".into(), false);
        let event = |seq, raw: &str| {
            SessionEvent::SharedPayload(SharedPayloadEvent {
                seq,
                participant_id: "u1".into(),
                payload: SharedPayload::from_raw(raw),
            })
        };
        assert!(presence.handle_session_event(event(3, "3")));
        assert!(!presence.handle_session_event(event(2, "2")));
        assert_eq!(presence.shared_payload().map(|p| p.as_str()), Some("3"));
    }

    #[test]
    fn it_builds_from_snapshot() {
        let mut me = Participant::new("u2".into(), "Bob".into(), false, PALETTE[1]);
        me.current_section = "dashboard".into();
        let mut host = Participant::new("u1".into(), "Alice".into(), true, PALETTE[0]);
        host.cursor = Some(CursorPosition::new(1.0, 1.0, "dashboard"));
        host.current_section = "dashboard".into();
        let snapshot = SessionSnapshot {
            session_id: "room-1".into(),
            seq: 7,
            host_id: "u1".into(),
            participants: vec![host, me],
            shared_payload: Some(SharedPayload::from_raw("{}")),
        };

        let mut presence = ClientPresence::from_snapshot("u2".into(), snapshot.clone()).expect("");
        assert!(!presence.can_interact());
        assert_eq!(presence.list_in_section("dashboard").len(), 1);
        assert!(!presence.handle_session_event(cursor_event(7, "u1", 2.0, "dashboard")));
        assert!(presence.handle_session_event(cursor_event(8, "u1", 2.0, "dashboard")));

        assert!(ClientPresence::from_snapshot("nobody".into(), snapshot).is_none());
    }

    fn snapshot_hosted_by_u1(participants: Vec<Participant>) -> SessionSnapshot {
        SessionSnapshot {
            session_id: "room-1".into(),
            seq: 3,
            host_id: "u1".into(),
            participants,
            shared_payload: None,
        }
    }

    #[test]
    fn it_keeps_local_reports_when_adopting_snapshot() {
        let mut presence = host_session();
        presence.report_section("analytics");
        presence.report_cursor(10.0, 20.0, "analytics");
        presence.update_shared_payload(SharedPayload::from_raw("{\"x\":1}"));

        let snapshot = snapshot_hosted_by_u1(vec![
            Participant::new("u1".into(), "Alice".into(), true, PALETTE[0]),
            peer("u2", "dashboard"),
        ]);
        let pending = presence.adopt_snapshot(snapshot).expect("");

        assert_eq!(presence.me().current_section, "analytics");
        assert_eq!(
            presence.me().cursor,
            Some(CursorPosition::new(10.0, 20.0, "analytics"))
        );
        assert_eq!(presence.shared_payload().map(|p| p.as_str()), Some("{\"x\":1}"));
        assert_eq!(presence.list_others().len(), 1);
        assert_eq!(
            pending,
            vec![
                SessionCommand::Section(SectionCommand {
                    section: "analytics".into()
                }),
                SessionCommand::Cursor(CursorCommand {
                    x: 10.0,
                    y: 20.0,
                    section: "analytics".into()
                }),
                SessionCommand::SharedPayload(SharedPayload::from_raw("{\"x\":1}")),
            ]
        );
    }

    #[test]
    fn it_has_nothing_to_send_without_local_reports() {
        let mut presence = ClientPresence::new("room-1".into(), "u2".into(), "Bob".into(), false);
        let snapshot = snapshot_hosted_by_u1(vec![
            Participant::new("u1".into(), "Alice".into(), true, PALETTE[0]),
            peer("u2", ""),
        ]);
        assert_eq!(presence.adopt_snapshot(snapshot), Ok(vec![]));
        assert!(!presence.can_interact());
    }

    #[test]
    fn it_refuses_snapshot_with_other_role() {
        let mut presence = ClientPresence::new("room-1".into(), "u2".into(), "Bob".into(), true);
        presence.report_section("calls");
        let snapshot = snapshot_hosted_by_u1(vec![
            Participant::new("u1".into(), "Alice".into(), true, PALETTE[0]),
            peer("u2", ""),
        ]);

        assert_eq!(
            presence.adopt_snapshot(snapshot.clone()),
            Err(SnapshotError::RoleMismatch {
                expected_host: true
            })
        );
        assert!(presence.can_interact());
        assert_eq!(presence.me().current_section, "calls");
        assert!(presence.list_others().is_empty());

        let mut stranger = ClientPresence::new("room-1".into(), "u9".into(), "Eve".into(), false);
        assert_eq!(
            stranger.adopt_snapshot(snapshot),
            Err(SnapshotError::MissingSelf)
        );
    }

    #[test]
    fn it_clears_peers_but_keeps_self() {
        let mut presence = host_session();
        presence.handle_session_event(SessionEvent::ParticipantJoined {
            seq: 1,
            participant: peer("u2", "dashboard"),
        });
        presence.clear_peers();
        assert!(presence.list_others().is_empty());
        assert_eq!(presence.me().id, "u1");
    }
}
