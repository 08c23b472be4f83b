//! Moderation bridge tests

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use athena_core::{AreaError, Environment, LockState, MuteState};
use athena_proto::Packet;
use athena_server::{
    BridgeError, Client, Config, MemoryStorage, ModerationBridge, OUTBOUND_CAPACITY, Outbound, Server, handlers,
};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use tokio::sync::mpsc;

#[derive(Clone)]
struct TestEnv {
    rng: Arc<Mutex<StdRng>>,
}

impl Environment for TestEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_clock_secs(&self) -> u64 {
        1_700_000_000
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }
}

const CONFIG: &str = r#"
characters = ["Phoenix", "Edgeworth"]
backgrounds = ["default"]

[server]
name = "Bridge Test"
max_players = 10

[[areas]]
name = "Lobby"

[[areas]]
name = "Courtroom"
"#;

struct Fixture {
    server: Arc<Server<TestEnv>>,
    bridge: ModerationBridge<TestEnv>,
}

impl Fixture {
    fn new() -> Self {
        let env = TestEnv { rng: Arc::new(Mutex::new(StdRng::seed_from_u64(3))) };
        let (server, _fatal) =
            Server::new(Config::from_toml(CONFIG).unwrap(), env, Arc::new(MemoryStorage::new()));
        let bridge = ModerationBridge::new(Arc::clone(&server));
        Self { server, bridge }
    }

    fn join(&self, ipid: &str, ooc: &str) -> (Arc<Client>, mpsc::Receiver<Outbound>) {
        let (tx, mut rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let id = self.server.clients().next_id();
        let client = Arc::new(Client::new(id, ipid.to_string(), Arc::clone(self.server.name()), self.server.limits(), tx));
        self.server.clients().add(Arc::clone(&client));
        handlers::handle(&self.server, &client, &Packet::decode("RD#%").unwrap());
        client.set_ooc_name(ooc);
        while rx.try_recv().is_ok() {}
        (client, rx)
    }
}

fn messages(rx: &mut mpsc::Receiver<Outbound>) -> (Vec<Packet>, bool) {
    let mut packets = Vec::new();
    let mut closed = false;
    while let Ok(msg) = rx.try_recv() {
        match msg {
            Outbound::Packet(text) => packets.push(Packet::decode(&text).unwrap()),
            Outbound::Close => closed = true,
        }
    }
    (packets, closed)
}

fn texts(packets: &[Packet]) -> Vec<String> {
    packets.iter().filter(|p| p.header() == "CT").filter_map(|p| p.text(1)).collect()
}

#[test]
fn lists_players_and_areas() {
    let f = Fixture::new();
    let (a, _rx) = f.join("ipid-a", "Apollo");
    f.server.move_client(&a, 1, true).unwrap();
    f.join("ipid-b", "Trucy");

    let players = f.bridge.players();
    assert_eq!(players.len(), 2);
    assert_eq!(players.iter().find(|p| p.uid == 0).unwrap().area, "Courtroom");

    let areas = f.bridge.areas();
    assert_eq!(areas.len(), 2);
    assert_eq!(areas[1].players, 1);
    assert_eq!(areas[1].lock, LockState::Free.to_string());
    assert_eq!(f.bridge.player_count(), 2);
    assert_eq!(f.bridge.max_players(), 10);
    assert_eq!(f.bridge.server_name(), "Bridge Test");
}

#[test]
fn find_player_by_uid_then_name() {
    let f = Fixture::new();
    f.join("ipid-a", "Apollo");
    f.join("ipid-b", "Trucy");

    assert_eq!(f.bridge.find_player("1").unwrap().ooc_name, "Trucy");
    assert_eq!(f.bridge.find_player("apollo").unwrap().uid, 0);
    assert!(matches!(f.bridge.find_player("Nobody"), Err(BridgeError::PlayerNotFound(_))));
}

#[test]
fn mute_and_unmute() {
    let f = Fixture::new();
    let (a, mut rx) = f.join("ipid-a", "Apollo");

    f.bridge.mute(0, Some(Duration::from_secs(60)), "spam").unwrap();
    assert_eq!(a.mute(f.server.now()), MuteState::IcOoc);
    assert_eq!(texts(&messages(&mut rx).0), ["You have been muted. Reason: spam"]);

    f.bridge.unmute(0).unwrap();
    assert_eq!(a.mute(f.server.now()), MuteState::None);
}

#[test]
fn ungag_leaves_other_mutes() {
    let f = Fixture::new();
    let (a, _rx) = f.join("ipid-a", "Apollo");

    f.bridge.gag(0).unwrap();
    assert_eq!(a.mute(f.server.now()), MuteState::Ic);
    f.bridge.ungag(0).unwrap();
    assert_eq!(a.mute(f.server.now()), MuteState::None);

    a.set_mute(MuteState::Music, None);
    f.bridge.ungag(0).unwrap();
    assert_eq!(a.mute(f.server.now()), MuteState::Music);
}

#[test]
fn kick_closes_with_reason() {
    let f = Fixture::new();
    let (_a, mut rx) = f.join("ipid-a", "Apollo");

    f.bridge.kick(0, "Be nice").unwrap();
    let (packets, closed) = messages(&mut rx);
    assert_eq!(packets[0].header(), "KK");
    assert_eq!(packets[0].text(0).as_deref(), Some("Be nice"));
    assert!(closed);
    assert!(matches!(f.bridge.kick(9, "x"), Err(BridgeError::PlayerNotFound(_))));
}

#[test]
fn ban_disconnects_every_session_on_ipid() {
    let f = Fixture::new();
    let (_a, mut rx_a) = f.join("shared", "One");
    let (_b, mut rx_b) = f.join("shared", "Two");
    let (_c, mut rx_c) = f.join("other", "Three");

    let ban = f.bridge.ban("shared", None, "alts", "discord-mod").unwrap();
    assert_eq!(ban.until_secs, None);
    assert!(messages(&mut rx_a).1);
    assert!(messages(&mut rx_b).1);
    assert!(!messages(&mut rx_c).1);

    let bans = f.bridge.bans(10).unwrap();
    assert_eq!(bans.len(), 1);
    assert!(f.bridge.unban(ban.id).unwrap());
    assert!(!f.bridge.unban(ban.id + 100).unwrap());
}

#[test]
fn warnings_accumulate() {
    let f = Fixture::new();
    let (_a, mut rx) = f.join("ipid-a", "Apollo");

    assert_eq!(f.bridge.warn(0, "first", "mod").unwrap(), 1);
    assert_eq!(f.bridge.warn(0, "second", "mod").unwrap(), 2);
    assert_eq!(f.bridge.warnings("ipid-a").unwrap().len(), 2);
    assert_eq!(texts(&messages(&mut rx).0)[0], "⚠️ Warning from moderator: first");
}

#[test]
fn punishments_by_name() {
    let f = Fixture::new();
    let (a, _rx) = f.join("ipid-a", "Apollo");
    let kind = "uppercase".parse().unwrap();

    f.bridge.apply_punishment(0, "uppercase", Duration::from_secs(60)).unwrap();
    assert!(a.has_punishment(kind, f.server.now()));
    f.bridge.remove_punishment(0, "uppercase").unwrap();
    assert!(!a.has_punishment(kind, f.server.now()));

    assert!(matches!(
        f.bridge.apply_punishment(0, "tickle", Duration::from_secs(1)),
        Err(BridgeError::UnknownPunishment(_))
    ));
}

#[test]
fn force_move_ignores_locks() {
    let f = Fixture::new();
    let (a, mut rx) = f.join("ipid-a", "Apollo");
    f.bridge.lock_area("Courtroom").unwrap();

    f.bridge.force_move(0, "courtroom").unwrap();
    assert_eq!(a.area(), 1);
    assert!(texts(&messages(&mut rx).0).contains(&"You were moved to Courtroom by a moderator.".to_string()));
    assert!(matches!(f.bridge.force_move(0, "Attic"), Err(BridgeError::AreaNotFound(_))));
}

#[test]
fn clear_area_sends_everyone_to_lobby() {
    let f = Fixture::new();
    let (a, _ra) = f.join("ipid-a", "Apollo");
    let (b, _rb) = f.join("ipid-b", "Trucy");
    f.server.move_client(&a, 1, true).unwrap();
    f.server.move_client(&b, 1, true).unwrap();

    assert_eq!(f.bridge.clear_area("Courtroom").unwrap(), 2);
    assert_eq!((a.area(), b.area()), (0, 0));
    assert!(matches!(f.bridge.clear_area("Lobby"), Err(BridgeError::Lobby(_))));
}

#[test]
fn lock_and_unlock_area() {
    let f = Fixture::new();
    let (a, _ra) = f.join("ipid-a", "Apollo");
    f.server.move_client(&a, 1, true).unwrap();

    f.bridge.lock_area("Courtroom").unwrap();
    assert_eq!(f.server.areas()[1].lock_state(), LockState::Locked);
    // Occupants at lock time stay invited
    assert!(f.server.areas()[1].can_enter(0, false));
    assert!(matches!(f.bridge.lock_area("Courtroom"), Err(BridgeError::Area(AreaError::AlreadyLocked))));

    f.bridge.unlock_area("Courtroom").unwrap();
    assert_eq!(f.server.areas()[1].lock_state(), LockState::Free);
    assert!(matches!(f.bridge.unlock_area("Courtroom"), Err(BridgeError::Area(AreaError::NotLocked))));
}

#[test]
fn player_logs_filter_by_ipid() {
    let f = Fixture::new();
    let (a, _ra) = f.join("ipid-a", "Apollo");
    let (b, _rb) = f.join("ipid-b", "Trucy");
    f.server.area_log(&a, "OOC", "hello");
    f.server.area_log(&b, "OOC", "hi");

    let logs = f.bridge.player_logs("ipid-a");
    assert_eq!(logs.len(), 1);
    assert!(logs[0].ends_with("| hello"));
}

#[test]
fn announcements() {
    let f = Fixture::new();
    let (_a, mut ra) = f.join("ipid-a", "Apollo");
    let (_b, mut rb) = f.join("ipid-b", "Trucy");

    f.bridge.announce("Maintenance soon");
    assert_eq!(texts(&messages(&mut ra).0), ["[Announcement] Maintenance soon"]);
    messages(&mut rb);

    f.bridge.private_message(1, "hi").unwrap();
    assert_eq!(texts(&messages(&mut rb).0), ["[Discord Mod] hi"]);
    assert!(texts(&messages(&mut ra).0).is_empty());
}
