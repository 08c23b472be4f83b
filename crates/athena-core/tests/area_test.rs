//! Area state machine: locking, invitations, CMs, characters, evidence.

use athena_core::{
    Area, AreaError, AreaSettings, Bar, Evidence, LockKind, LockState, Status, TestimonyError,
};

fn area(id: usize) -> Area {
    Area::new(id, AreaSettings { name: format!("Courtroom {id}"), ..AreaSettings::default() })
}

fn evidence(name: &str) -> Evidence {
    Evidence { name: name.to_string(), description: String::new(), image: "empty.png".to_string() }
}

#[test]
fn locking_invites_current_occupants() {
    let room = area(1);
    room.lock(LockKind::Locked, &[3, 7]).unwrap();

    assert_eq!(room.lock_state(), LockState::Locked);
    assert_eq!(room.invited(), [3, 7]);
    assert!(room.can_enter(3, false));
    assert!(!room.can_enter(4, false));
    assert!(room.can_enter(4, true));
}

#[test]
fn unlock_clears_invites() {
    let room = area(1);
    room.lock(LockKind::Locked, &[1]).unwrap();
    room.invite(2).unwrap();
    room.unlock().unwrap();

    assert_eq!(room.lock_state(), LockState::Free);
    assert!(room.invited().is_empty());
    assert!(room.can_enter(9, false));
}

#[test]
fn double_lock_is_rejected() {
    let room = area(2);
    room.lock(LockKind::Locked, &[]).unwrap();
    assert_eq!(room.lock(LockKind::Locked, &[]), Err(AreaError::AlreadyLocked));
}

#[test]
fn lobby_cannot_be_locked() {
    let lobby = area(0);
    assert_eq!(lobby.lock(LockKind::Locked, &[0]), Err(AreaError::LobbyLocked));
    assert_eq!(lobby.lock_state(), LockState::Free);
    assert!(lobby.invited().is_empty());
}

#[test]
fn lobby_may_be_spectatable() {
    let lobby = area(0);
    lobby.lock(LockKind::Spectatable, &[5]).unwrap();
    assert_eq!(lobby.lock_state(), LockState::Spectatable);
    assert!(lobby.can_enter(6, false));
    assert!(!lobby.can_play(6, false));
    assert!(lobby.can_play(5, false));
}

#[test]
fn unlocking_a_free_area_fails() {
    assert_eq!(area(1).unlock(), Err(AreaError::NotLocked));
}

#[test]
fn invite_requires_lock() {
    let room = area(1);
    assert_eq!(room.invite(4), Err(AreaError::Unlocked));
    assert_eq!(room.uninvite(4), Err(AreaError::Unlocked));

    room.lock(LockKind::Spectatable, &[]).unwrap();
    assert_eq!(room.invite(4), Ok(true));
    assert_eq!(room.invite(4), Ok(false));
    assert_eq!(room.uninvite(4), Ok(true));
    assert_eq!(room.uninvite(4), Ok(false));
}

#[test]
fn single_cm_unless_forced() {
    let room = area(1);
    assert_eq!(room.add_cm(1, false), Ok(true));
    assert_eq!(room.add_cm(1, false), Ok(false));
    assert_eq!(room.add_cm(2, false), Err(AreaError::CmTaken));
    assert_eq!(room.add_cm(2, true), Ok(true));
    assert_eq!(room.cms(), [1, 2]);

    assert!(room.remove_cm(1));
    assert!(!room.remove_cm(1));
}

#[test]
fn cms_can_be_disallowed() {
    let room = Area::new(3, AreaSettings { allow_cms: false, ..AreaSettings::default() });
    assert_eq!(room.add_cm(1, false), Err(AreaError::CmsDisallowed));
    assert_eq!(room.add_cm(1, true), Ok(true));
}

#[test]
fn cm_enters_locked_area() {
    let room = area(1);
    room.add_cm(8, false).unwrap();
    room.lock(LockKind::Locked, &[]).unwrap();
    assert!(room.can_enter(8, false));
}

#[test]
fn characters_are_exclusive() {
    let room = area(1);
    room.take_character(4, 10).unwrap();
    assert_eq!(room.take_character(4, 11), Err(AreaError::CharacterTaken));
    assert_eq!(room.take_character(4, 10), Ok(()));
    assert_eq!(room.chars_check(6), ["0", "0", "0", "0", "-1", "0"]);

    room.release_character(4, 11);
    assert_eq!(room.character_holder(4), Some(10));
    room.release_character(4, 10);
    assert_eq!(room.character_holder(4), None);
}

#[test]
fn leaving_drops_area_roles() {
    let room = area(1);
    room.add_player();
    room.add_cm(2, false).unwrap();
    room.take_character(0, 2).unwrap();

    room.remove_player(2);
    assert_eq!(room.players(), 0);
    assert!(!room.is_cm(2));
    assert_eq!(room.character_holder(0), None);

    room.remove_player(2);
    assert_eq!(room.players(), 0);
}

#[test]
fn evidence_swaps_by_index() {
    let room = area(1);
    for name in ["knife", "note", "photo"] {
        room.add_evidence(evidence(name));
    }
    room.swap_evidence(0, 2).unwrap();
    let names: Vec<String> = room.evidence().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["photo", "note", "knife"]);

    assert_eq!(room.swap_evidence(1, 3), Err(AreaError::NoSuchEvidence { index: 3 }));
    assert_eq!(room.remove_evidence(5), Err(AreaError::NoSuchEvidence { index: 5 }));
    assert_eq!(room.remove_evidence(1).map(|e| e.name), Ok("note".to_string()));
    assert!(room.edit_evidence(0, evidence("blood")).is_ok());
    assert_eq!(room.evidence()[0].name, "blood");
}

#[test]
fn health_is_bounded() {
    let room = area(1);
    room.set_health(Bar::Defense, 3).unwrap();
    assert_eq!(room.health(Bar::Defense), 3);
    assert_eq!(room.health(Bar::Prosecution), 10);
    assert_eq!(room.set_health(Bar::Prosecution, 11), Err(AreaError::InvalidHealth));
    assert_eq!(room.set_health(Bar::Prosecution, -1), Err(AreaError::InvalidHealth));
    assert_eq!(Bar::from_wire(3), None);
}

#[test]
fn log_buffer_is_bounded() {
    let room = Area::new(1, AreaSettings { buffer_size: 3, ..AreaSettings::default() });
    for i in 0..5 {
        room.log(format!("line {i}"));
    }
    assert_eq!(room.log_lines(), ["line 2", "line 3", "line 4"]);
}

#[test]
fn status_parses_user_input() {
    assert_eq!("Looking-For-Players".parse(), Ok(Status::LookingForPlayers));
    assert_eq!(Status::Rp.to_string(), "RP");
    assert!("napping".parse::<Status>().is_err());
}

#[test]
fn testimony_delete_protects_title() {
    let room = area(1);
    room.with_testimony(|t| {
        t.record().unwrap();
        t.capture("title".to_string());
        t.capture("first".to_string());
        t.stop();
    });

    assert_eq!(room.with_testimony(|t| t.delete()), Err(TestimonyError::NotActive));
    room.with_testimony(|t| t.play().map(str::to_string)).unwrap();
    assert_eq!(room.with_testimony(|t| t.delete()), Err(TestimonyError::TitleProtected));

    room.with_testimony(|t| t.advance().map(str::to_string));
    assert_eq!(room.with_testimony(|t| t.delete()), Ok("first".to_string()));
    assert_eq!(room.with_testimony(|t| t.statements().len()), 1);
}

#[test]
fn testimony_update_and_insert_require_playback() {
    let room = area(1);
    assert_eq!(room.with_testimony(|t| t.update()), Err(TestimonyError::NotActive));
    assert_eq!(room.with_testimony(|t| t.insert()), Err(TestimonyError::NotActive));
    room.with_testimony(|t| t.record()).unwrap();
    assert_eq!(room.with_testimony(|t| t.update()), Err(TestimonyError::NotActive));
}
