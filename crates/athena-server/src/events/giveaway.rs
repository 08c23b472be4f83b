//! Giveaway.
//!
//! A player announces an item; for ten minutes anyone may enter. A reminder
//! goes out with one minute left. At the end one still-connected entrant
//! is drawn uniformly and announced. A ten minute cooldown follows.

use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{Duration, Instant},
};

use athena_core::{Environment, Uid};

use super::cooldown_secs;
use crate::{client::Client, server::Server};

/// Entry window.
pub const DURATION: Duration = Duration::from_secs(10 * 60);
/// Reminder offset from the start.
pub const REMINDER: Duration = Duration::from_secs(9 * 60);
/// Gap between giveaways.
pub const COOLDOWN: Duration = Duration::from_secs(10 * 60);

/// Giveaway lifecycle.
#[derive(Debug, Default)]
pub struct Giveaway {
    active: bool,
    item: String,
    host: String,
    entrants: BTreeSet<Uid>,
    last_end: Option<Instant>,
}

impl Giveaway {
    /// True while entries are open.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Item on offer.
    pub fn item(&self) -> &str {
        &self.item
    }

    /// Entered UIDs.
    pub fn entrants(&self) -> &BTreeSet<Uid> {
        &self.entrants
    }
}

/// Name a player is announced under: showname, else OOC name.
fn public_name(client: &Client) -> String {
    let showname = client.showname();
    if showname.is_empty() { client.ooc_name() } else { showname }
}

/// `/giveaway start <item>`.
pub fn start<E: Environment>(server: &Arc<Server<E>>, client: &Client, item: &str) {
    let host = public_name(client);
    let now = server.now();
    {
        let mut state = server.events().giveaway();
        if state.active {
            drop(state);
            client.server_message("A giveaway is already in progress.");
            return;
        }
        let wait = cooldown_secs(state.last_end, COOLDOWN, now);
        if wait > 0 {
            drop(state);
            client.server_message(&format!("Giveaway is on cooldown. Please wait {wait} seconds."));
            return;
        }
        state.active = true;
        state.item = item.to_string();
        state.host.clone_from(&host);
        state.entrants.clear();
    }

    server.global_message(&format!(
        "🎁 GIVEAWAY STARTED by {host}! They are giving away: {item}\nType /giveaway enter to \
         join! You have 10 minutes. Good luck!"
    ));
    server.area_log(client, "CMD", &format!("Started giveaway for: {item}"));
    tokio::spawn(timer(Arc::clone(server)));
}

/// `/giveaway enter`.
pub fn enter<E: Environment>(server: &Server<E>, client: &Client) {
    let Some(uid) = client.uid() else { return };
    let count = {
        let mut state = server.events().giveaway();
        if !state.active {
            drop(state);
            client.server_message("There is no active giveaway to enter right now.");
            return;
        }
        if !state.entrants.insert(uid) {
            drop(state);
            client.server_message("You have already entered the giveaway.");
            return;
        }
        state.entrants.len()
    };

    client.server_message(&format!("🎁 You have entered the giveaway! ({count} entrant(s) so far)"));
    server.global_message(&format!(
        "🎁 {} entered the giveaway! ({count} entrant(s))",
        client.ooc_name()
    ));
}

async fn timer<E: Environment>(server: Arc<Server<E>>) {
    server.env().sleep(REMINDER).await;
    if !remind(&server) {
        return;
    }
    server.env().sleep(DURATION.saturating_sub(REMINDER)).await;
    finish(&server);
}

/// Send the one-minute reminder. Returns `false` if the giveaway is over.
pub fn remind<E: Environment>(server: &Server<E>) -> bool {
    let (host, item, count) = {
        let state = server.events().giveaway();
        if !state.active {
            return false;
        }
        (state.host.clone(), state.item.clone(), state.entrants.len())
    };
    server.global_message(&format!(
        "🎁 GIVEAWAY REMINDER: 1 minute left to enter! {host} is giving away: {item} ({count} \
         entrant(s) so far)\nType /giveaway enter to join!"
    ));
    true
}

/// Close entries and draw the winner. Returns the winning UID.
pub fn finish<E: Environment>(server: &Server<E>) -> Option<Uid> {
    let (host, item, entrants) = {
        let mut state = server.events().giveaway();
        if !state.active {
            return None;
        }
        state.active = false;
        state.last_end = Some(server.now());
        let entrants: Vec<Uid> = std::mem::take(&mut state.entrants).into_iter().collect();
        (state.host.clone(), std::mem::take(&mut state.item), entrants)
    };

    let live: Vec<Uid> =
        entrants.into_iter().filter(|&uid| server.client_by_uid(uid).is_some()).collect();
    if live.is_empty() {
        server.global_message(&format!(
            "🎁 GIVEAWAY ENDED! Nobody entered {host}'s giveaway for: {item}. No winner this time!"
        ));
        return None;
    }

    let winner_uid = live[server.env().random_index(live.len())];
    let Some(winner) = server.client_by_uid(winner_uid) else {
        server.global_message("🎁 GIVEAWAY ENDED! The winner disconnected before they could be announced.");
        return None;
    };

    server.global_message(&format!(
        "🎉 GIVEAWAY WINNER! Congratulations to {} (UID: {winner_uid})! They won: {item} (hosted by \
         {host})",
        public_name(&winner)
    ));
    winner.server_message(&format!("🎉 You won the giveaway for: {item}! Congratulations!"));
    Some(winner_uid)
}
