//! Punishment pipeline ordering, replacement and lazy expiry.

use std::time::{Duration, Instant};

use athena_core::{PunishmentKind, Punishments, UnknownPunishment};
use rand::{SeedableRng, rngs::StdRng};

const MINUTE: Duration = Duration::from_secs(60);

fn rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

#[test]
fn effects_apply_in_insertion_order() {
    let now = Instant::now();
    let mut list = Punishments::default();
    list.add(PunishmentKind::Uppercase, MINUTE, "", now);
    list.add(PunishmentKind::Backward, MINUTE, "", now);

    assert_eq!(list.apply("hello world", 1, now, &mut rng()), "DLROW OLLEH");
}

#[test]
fn order_matters() {
    let now = Instant::now();
    let mut list = Punishments::default();
    list.add(PunishmentKind::Backward, MINUTE, "", now);
    list.add(PunishmentKind::Spotlight, MINUTE, "", now);

    assert_eq!(list.apply("abc", 1, now, &mut rng()), "📣 EVERYONE LOOK: cba");
}

#[test]
fn same_kind_replaces() {
    let now = Instant::now();
    let mut list = Punishments::default();
    list.add(PunishmentKind::Uppercase, MINUTE, "first", now);
    list.add(PunishmentKind::Uppercase, 2 * MINUTE, "second", now);

    assert_eq!(list.len(), 1);
    let active = list.active(now);
    assert_eq!(active[0].reason, "second");
    assert_eq!(active[0].remaining(now), Some(2 * MINUTE));
}

#[test]
fn different_kinds_coexist() {
    let now = Instant::now();
    let mut list = Punishments::default();
    list.add(PunishmentKind::Uwu, MINUTE, "", now);
    list.add(PunishmentKind::Pirate, MINUTE, "", now);
    assert!(list.contains(PunishmentKind::Uwu, now));
    assert!(list.contains(PunishmentKind::Pirate, now));
    assert_eq!(list.len(), 2);
}

#[test]
fn expiry_is_lazy() {
    let now = Instant::now();
    let mut list = Punishments::default();
    list.add(PunishmentKind::Uppercase, MINUTE, "", now);
    list.add(PunishmentKind::Backward, 3 * MINUTE, "", now);

    let later = now + 2 * MINUTE;
    assert_eq!(list.len(), 2);
    assert!(!list.contains(PunishmentKind::Uppercase, later));
    assert_eq!(list.apply("abc", 1, later, &mut rng()), "cba");
    assert_eq!(list.len(), 1);
}

#[test]
fn zero_duration_is_permanent() {
    let now = Instant::now();
    let mut list = Punishments::default();
    list.add(PunishmentKind::Lowercase, Duration::ZERO, "", now);
    assert!(list.contains(PunishmentKind::Lowercase, now + 1000 * MINUTE));
    assert_eq!(list.active(now)[0].remaining(now), None);
}

#[test]
fn remove_and_clear() {
    let now = Instant::now();
    let mut list = Punishments::default();
    list.add(PunishmentKind::Uwu, MINUTE, "", now);
    list.add(PunishmentKind::Fancy, MINUTE, "", now);

    assert!(list.remove(PunishmentKind::Uwu));
    assert!(!list.remove(PunishmentKind::Uwu));
    assert_eq!(list.clear(), 1);
    assert!(list.is_empty());
}

#[test]
fn torment_advances_per_message() {
    let now = Instant::now();
    let mut list = Punishments::default();
    list.add(PunishmentKind::Torment, MINUTE, "", now);

    let mut rng = rng();
    assert_eq!(list.apply("abc", 1, now, &mut rng), "ABC");
    assert_eq!(list.apply("abc", 1, now, &mut rng), "cba");
}

#[test]
fn names_parse_case_insensitively() {
    assert_eq!("UwU".parse(), Ok(PunishmentKind::Uwu));
    assert_eq!(" torment ".parse(), Ok(PunishmentKind::Torment));
    assert_eq!("slowpoke".parse::<PunishmentKind>(), Err(UnknownPunishment("slowpoke".to_string())));
    for kind in PunishmentKind::ALL {
        assert_eq!(kind.name().parse(), Ok(kind));
    }
}
