//! Hot potato.
//!
//! An opt-in window opens for 60 seconds. If at least two participants are
//! still connected when it closes, one is secretly made the carrier and a
//! five minute game runs. When it ends, opted-in players sharing the
//! carrier's area are punished, or kicked if the carrier is a moderator. A
//! carrier left alone punishes itself. A five minute cooldown follows every
//! game, including cancelled ones.

use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{Duration, Instant},
};

use athena_core::{Environment, PunishmentKind, Uid};
use rand::seq::SliceRandom;

use super::cooldown_secs;
use crate::{client::Client, server::Server};

/// Opt-in window.
pub const OPT_IN: Duration = Duration::from_secs(60);
/// Game length once a carrier is chosen.
pub const GAME: Duration = Duration::from_secs(5 * 60);
/// Gap between games.
pub const COOLDOWN: Duration = Duration::from_secs(5 * 60);
/// Participants needed to start.
pub const MIN_PARTICIPANTS: usize = 2;
/// Punishment length for caught players.
pub const PUNISHMENT: Duration = Duration::from_secs(10 * 60);

/// Punishments drawn for caught players.
pub const POOL: [PunishmentKind; 16] = [
    PunishmentKind::Backward,
    PunishmentKind::Stutterstep,
    PunishmentKind::Elongate,
    PunishmentKind::Uppercase,
    PunishmentKind::Lowercase,
    PunishmentKind::Robotic,
    PunishmentKind::Alternating,
    PunishmentKind::Uwu,
    PunishmentKind::Pirate,
    PunishmentKind::Caveman,
    PunishmentKind::Drunk,
    PunishmentKind::Hiccup,
    PunishmentKind::Confused,
    PunishmentKind::Paranoid,
    PunishmentKind::Mumble,
    PunishmentKind::Subtitles,
];

const RULES: &str = "🥔 HOT POTATO EVENT STARTING! 🥔
Type /hotpotato accept within 60 seconds to join.

📋 HOW TO PLAY:
• One random participant is secretly given the \"Hot Potato\".
• The carrier has a 5-minute virtual timer. Find other participants!
• AVOID being in the same area as the carrier when the timer runs out!
• When time's up, opted-in players sharing the carrier's area get a random punishment.
• If the carrier is a MODERATOR, those players are KICKED from the server instead.
• If the carrier ends up alone, THEY receive the punishment themselves.
• Players who did not opt in are completely safe and unaffected.
• Only one game can run at a time (5-minute cooldown between games).

Good luck, and watch who you hang around with! 🔥";

/// Hot potato lifecycle.
#[derive(Debug, Default)]
pub struct HotPotato {
    opt_in: bool,
    active: bool,
    participants: BTreeSet<Uid>,
    carrier: Option<Uid>,
    last_end: Option<Instant>,
}

impl HotPotato {
    /// True during the opt-in window.
    pub fn is_opt_in(&self) -> bool {
        self.opt_in
    }

    /// True while a game is running.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Opted-in UIDs.
    pub fn participants(&self) -> &BTreeSet<Uid> {
        &self.participants
    }

    /// Carrier of the running game.
    pub fn carrier(&self) -> Option<Uid> {
        self.carrier
    }
}

/// `/hotpotato`: open the opt-in window.
pub fn start<E: Environment>(server: &Arc<Server<E>>, client: &Client) {
    let now = server.now();
    {
        let mut state = server.events().hot_potato();
        if state.opt_in || state.active {
            drop(state);
            client.server_message("A Hot Potato game is already in progress.");
            return;
        }
        let wait = cooldown_secs(state.last_end, COOLDOWN, now);
        if wait > 0 {
            drop(state);
            client.server_message(&format!("Hot Potato is on cooldown. Please wait {wait} seconds."));
            return;
        }
        state.opt_in = true;
        state.active = false;
        state.participants.clear();
        state.carrier = None;
    }

    server.global_message(RULES);
    server.area_log(client, "CMD", "Started Hot Potato opt-in");
    tokio::spawn(opt_in_timer(Arc::clone(server)));
}

/// `/hotpotato accept`: join during the opt-in window.
pub fn accept<E: Environment>(server: &Server<E>, client: &Client) {
    let Some(uid) = client.uid() else { return };
    let count = {
        let mut state = server.events().hot_potato();
        if !state.opt_in {
            drop(state);
            client.server_message("There is no active Hot Potato game to join right now.");
            return;
        }
        if !state.participants.insert(uid) {
            drop(state);
            client.server_message("You have already joined the Hot Potato game.");
            return;
        }
        state.participants.len()
    };

    client.server_message(&format!(
        "🥔 You have joined the Hot Potato game! ({count} participant(s) so far)"
    ));
    server.global_message(&format!(
        "🥔 {} joined Hot Potato! ({count} participant(s))",
        client.ooc_name()
    ));
}

async fn opt_in_timer<E: Environment>(server: Arc<Server<E>>) {
    server.env().sleep(OPT_IN).await;
    close_opt_in(&server);
}

/// End the opt-in window and either arm the game or cancel it.
///
/// Returns the chosen carrier. Spawns the game timer when one is chosen.
pub fn close_opt_in<E: Environment>(server: &Arc<Server<E>>) -> Option<Uid> {
    let entrants: Vec<Uid> = {
        let mut state = server.events().hot_potato();
        if !state.opt_in {
            return None;
        }
        state.opt_in = false;
        state.participants.iter().copied().collect()
    };

    let live: Vec<Uid> =
        entrants.into_iter().filter(|&uid| server.client_by_uid(uid).is_some()).collect();

    if live.len() < MIN_PARTICIPANTS {
        server.events().hot_potato().last_end = Some(server.now());
        server.global_message(&format!(
            "🥔 Hot Potato cancelled: not enough participants ({}/{MIN_PARTICIPANTS} required).",
            live.len()
        ));
        return None;
    }

    let carrier = live[server.env().random_index(live.len())];
    {
        let mut state = server.events().hot_potato();
        state.carrier = Some(carrier);
        state.active = true;
    }

    server.global_message(&format!(
        "🔥 THE HOT POTATO GAME HAS BEGUN! {} players are in. One of them is carrying the Hot \
         Potato… Avoid anyone suspicious for the next 5 minutes!",
        live.len()
    ));
    if let Some(holder) = server.client_by_uid(carrier) {
        holder.server_message(
            "🥔🔥 YOU have the Hot Potato! Be in the same area as other participants when the \
             timer expires. You have 5 minutes!",
        );
    }

    tokio::spawn(game_timer(Arc::clone(server), carrier));
    Some(carrier)
}

async fn game_timer<E: Environment>(server: Arc<Server<E>>, carrier: Uid) {
    server.env().sleep(GAME).await;
    finish_game(&server, carrier);
}

/// End a running game and apply the outcome. No-op if it already ended.
pub fn finish_game<E: Environment>(server: &Server<E>, carrier: Uid) {
    let participants: Vec<Uid> = {
        let mut state = server.events().hot_potato();
        if !state.active {
            return;
        }
        state.active = false;
        state.opt_in = false;
        state.last_end = Some(server.now());
        state.participants.iter().copied().collect()
    };
    resolve(server, carrier, &participants);
}

fn resolve<E: Environment>(server: &Server<E>, carrier_uid: Uid, participants: &[Uid]) {
    let Some(carrier) = server.client_by_uid(carrier_uid) else {
        server.global_message(
            "⏰ HOT POTATO TIMER EXPIRED! The carrier left the server, no outcome this round.",
        );
        return;
    };

    let area = carrier.area();
    let caught: Vec<Arc<Client>> = participants
        .iter()
        .filter(|&&uid| uid != carrier_uid)
        .filter_map(|&uid| server.client_by_uid(uid))
        .filter(|c| c.area() == area)
        .collect();

    let now = server.now();
    if caught.is_empty() {
        let kind = random_punishment(server);
        carrier.add_punishment(kind, PUNISHMENT, "Hot Potato: solo carrier penalty", now);
        carrier.server_message(&format!(
            "💀 You had the Hot Potato and nobody was nearby. Punished with '{kind}'!"
        ));
        server.global_message(
            "⏰ HOT POTATO TIMER EXPIRED! The carrier was alone, they get punished! 🥔💀",
        );
        server.audit(&carrier, "HOTPOTATO", &format!("Carrier self-punished with {kind} (no victims)"));
        return;
    }

    if carrier.is_authenticated() {
        let uids: Vec<String> = caught.iter().filter_map(|c| c.uid()).map(|u| u.to_string()).collect();
        for victim in &caught {
            server.kick(
                victim,
                "Hot Potato: caught in the same area as a moderator carrying the Hot Potato!",
            );
        }
        server.global_message(&format!(
            "⏰ HOT POTATO TIMER EXPIRED! The carrier was a MODERATOR. {} participant(s) are being \
             KICKED! 🔨",
            caught.len()
        ));
        server.audit(&carrier, "HOTPOTATO", &format!("Mod carrier kicked UIDs: {}", uids.join(", ")));
        return;
    }

    let mut victims = Vec::with_capacity(caught.len());
    for victim in &caught {
        let kind = random_punishment(server);
        victim.add_punishment(kind, PUNISHMENT, "Hot Potato punishment", now);
        victim.server_message(&format!(
            "💥 Caught with the Hot Potato carrier! Punished with '{kind}' for 10 minutes."
        ));
        victims.push(format!("{}({kind})", victim.uid().unwrap_or_default()));
    }
    server.global_message(&format!(
        "⏰ HOT POTATO TIMER EXPIRED! {} participant(s) were caught and received random \
         punishments! 🥔💥",
        caught.len()
    ));
    server.audit(&carrier, "HOTPOTATO", &format!("Punished UIDs: {}", victims.join(", ")));
}

fn random_punishment<E: Environment>(server: &Server<E>) -> PunishmentKind {
    POOL.choose(&mut server.rng()).copied().unwrap_or(PunishmentKind::Backward)
}
