//! Timed event tests
//!
//! Run on a paused tokio clock: sleeping in the test lets every event timer
//! due before then fire, in order, without real waiting.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use athena_core::Environment;
use athena_proto::Packet;
use athena_server::{
    Client, Config, MemoryStorage, OUTBOUND_CAPACITY, Outbound, Server,
    events::{giveaway, hot_potato},
    handlers,
};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use tokio::sync::mpsc;

#[derive(Clone)]
struct TestEnv {
    rng: Arc<Mutex<StdRng>>,
}

impl Environment for TestEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
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
name = "Events"

[[areas]]
name = "Lobby"

[[areas]]
name = "Detention Center"
"#;

struct Player {
    client: Arc<Client>,
    rx: mpsc::Receiver<Outbound>,
}

impl Player {
    fn say(&self, server: &Arc<Server<TestEnv>>, line: &str) {
        let packet = Packet::new("CT").push_text(&self.client.ooc_name()).push_text(line);
        handlers::handle(server, &self.client, &packet);
    }

    fn messages(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            if let Outbound::Packet(text) = msg {
                let packet = Packet::decode(&text).unwrap();
                if packet.header() == "CT" {
                    out.extend(packet.text(1));
                }
            }
        }
        out
    }
}

fn server() -> Arc<Server<TestEnv>> {
    let env = TestEnv { rng: Arc::new(Mutex::new(StdRng::seed_from_u64(5))) };
    let (server, _fatal) = Server::new(Config::from_toml(CONFIG).unwrap(), env, Arc::new(MemoryStorage::new()));
    server
}

fn join(server: &Arc<Server<TestEnv>>, name: &str) -> Player {
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let id = server.clients().next_id();
    let client = Arc::new(Client::new(id, format!("ipid-{name}"), Arc::clone(server.name()), server.limits(), tx));
    server.clients().add(Arc::clone(&client));
    handlers::handle(server, &client, &Packet::decode("RD#%").unwrap());
    client.set_ooc_name(name);
    let mut player = Player { client, rx };
    player.messages();
    player
}

#[tokio::test(start_paused = true)]
async fn giveaway_draws_an_entrant() {
    let server = server();
    let mut host = join(&server, "Host");
    let mut a = join(&server, "Athena");
    let mut b = join(&server, "Simon");

    host.say(&server, "/giveaway start Steel Samurai DVD");
    assert!(server.events().giveaway().is_active());
    a.say(&server, "/giveaway enter");
    b.say(&server, "/giveaway enter");
    b.say(&server, "/giveaway enter");
    assert!(b.messages().iter().any(|m| m == "You have already entered the giveaway."));
    assert_eq!(server.events().giveaway().entrants().len(), 2);

    tokio::time::sleep(giveaway::REMINDER + Duration::from_secs(1)).await;
    assert!(host.messages().iter().any(|m| m.starts_with("🎁 GIVEAWAY REMINDER")));

    tokio::time::sleep(giveaway::DURATION - giveaway::REMINDER).await;
    assert!(!server.events().giveaway().is_active());
    let announced = host.messages();
    assert!(announced.iter().any(|m| m.starts_with("🎉 GIVEAWAY WINNER!")), "{announced:?}");

    let won = |msgs: Vec<String>| msgs.iter().any(|m| m.starts_with("🎉 You won the giveaway"));
    assert!(won(a.messages()) ^ won(b.messages()));

    host.say(&server, "/giveaway start Another");
    assert!(host.messages().iter().any(|m| m.starts_with("Giveaway is on cooldown.")));
}

#[tokio::test(start_paused = true)]
async fn giveaway_without_entrants_has_no_winner() {
    let server = server();
    let mut host = join(&server, "Host");

    host.say(&server, "/giveaway start Nothing");
    tokio::time::sleep(giveaway::DURATION + Duration::from_secs(1)).await;
    assert!(host.messages().iter().any(|m| m.contains("Nobody entered")));
}

#[tokio::test(start_paused = true)]
async fn hot_potato_cancels_without_enough_players() {
    let server = server();
    let mut host = join(&server, "Host");

    host.say(&server, "/hotpotato");
    host.say(&server, "/hotpotato accept");
    tokio::time::sleep(hot_potato::OPT_IN + Duration::from_secs(1)).await;

    assert!(!server.events().hot_potato().is_active());
    assert!(host.messages().iter().any(|m| m.starts_with("🥔 Hot Potato cancelled")));

    host.say(&server, "/hotpotato");
    assert!(host.messages().iter().any(|m| m.starts_with("Hot Potato is on cooldown.")));
}

#[tokio::test(start_paused = true)]
async fn hot_potato_punishes_players_near_carrier() {
    let server = server();
    let mut a = join(&server, "Apollo");
    let mut b = join(&server, "Trucy");
    let mut safe = join(&server, "Bystander");

    a.say(&server, "/hotpotato");
    a.say(&server, "/hotpotato accept");
    b.say(&server, "/hotpotato accept");
    tokio::time::sleep(hot_potato::OPT_IN + Duration::from_secs(1)).await;

    let carrier = server.events().hot_potato().carrier().unwrap();
    assert!(server.events().hot_potato().is_active());
    let (carrier, mut victim) = if a.client.uid() == Some(carrier) { (a, b) } else { (b, a) };
    victim.messages();

    tokio::time::sleep(hot_potato::GAME).await;
    assert!(!server.events().hot_potato().is_active());
    assert!(victim.messages().iter().any(|m| m.starts_with("💥 Caught with the Hot Potato carrier!")));
    assert!(!victim.client.punishments(server.now()).is_empty());
    assert!(carrier.client.punishments(server.now()).is_empty());
    assert!(safe.client.punishments(server.now()).is_empty());
    assert!(safe.messages().iter().any(|m| m.starts_with("⏰ HOT POTATO TIMER EXPIRED!")));
}

#[tokio::test(start_paused = true)]
async fn lone_hot_potato_carrier_is_punished() {
    let server = server();
    let a = join(&server, "Apollo");
    let b = join(&server, "Trucy");

    a.say(&server, "/hotpotato");
    a.say(&server, "/hotpotato accept");
    b.say(&server, "/hotpotato accept");
    tokio::time::sleep(hot_potato::OPT_IN + Duration::from_secs(1)).await;

    let carrier_uid = server.events().hot_potato().carrier().unwrap();
    let (carrier, other) = if a.client.uid() == Some(carrier_uid) { (a, b) } else { (b, a) };
    server.move_client(&other.client, 1, true).unwrap();

    tokio::time::sleep(hot_potato::GAME).await;
    assert!(!carrier.client.punishments(server.now()).is_empty());
    assert!(other.client.punishments(server.now()).is_empty());
}
