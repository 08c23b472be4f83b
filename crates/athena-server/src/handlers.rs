//! Inbound packet handlers.
//!
//! [`handle`] routes one decoded packet by header. The handshake packets
//! (`HI`, `ID`, `askchaa`, `RC`, `RM`, `RD`) and the `CH` keepalive are
//! accepted before a client joins; everything else is ignored until `RD`
//! has assigned a UID.
//!
//! Handlers read the state they need, release it, and only then send.
//! Refusals are server messages to the sender and never affect anyone else.

use std::sync::Arc;

use athena_core::{
    Area, Bar, Captured, Environment, Evidence, MuteState, Permissions, PunishmentKind, RecorderState,
};
use athena_proto::{Packet, chunk_packets, escape};

use crate::{
    broadcast::{ArupKind, PlayerField},
    client::{Appearance, Client, PairInfo},
    commands,
    server::{Server, VERSION, ban_notice},
};

/// Feature flags advertised in `FL`.
const FEATURES: [&str; 18] = [
    "noencryption",
    "yellowtext",
    "prezoom",
    "flipping",
    "customobjections",
    "fastloading",
    "deskmod",
    "evidence",
    "cccc_ic_support",
    "arup",
    "casing_alerts",
    "modcall_reason",
    "looping_sfx",
    "additive",
    "effects",
    "y_offset",
    "expanded_desk_mods",
    "auth_packet",
];

/// Fields in an outgoing IC message.
pub const MS_FIELDS: usize = 30;

/// Fields a current client sends in an IC message.
const MS_INBOUND_FIELDS: usize = 26;

/// Fewest fields an inbound IC message may carry; older clients send fewer
/// and the rest are padded empty.
const MS_MIN_FIELDS: usize = 15;

/// Music entry that stops playback.
const STOP_MUSIC: &str = "~stop.mp3";

/// Dispatch one packet from `client`.
pub fn handle<E: Environment>(server: &Arc<Server<E>>, client: &Arc<Client>, packet: &Packet) {
    match packet.header() {
        "HI" => hello(server, client, packet),
        "ID" => tracing::debug!(
            "{} identified as {} {}",
            client.ipid(),
            packet.text(0).unwrap_or_default(),
            packet.text(1).unwrap_or_default()
        ),
        "askchaa" => resource_counts(server, client),
        "RC" => send_characters(server, client),
        "RM" => send_music(server, client),
        "RD" => join(server, client),
        "CH" => client.send(&Packet::new("CHECK")),
        header if !client.is_joined() => {
            tracing::debug!("Ignoring {header} from unjoined client {}", client.ipid());
        },
        "CC" => select_character(server, client, packet),
        "MS" => ic_message(server, client, packet),
        "CT" => ooc_message(server, client, packet),
        "MC" => music_or_area(server, client, packet),
        "HP" => health(server, client, packet),
        "RT" => judge_animation(server, client, packet),
        "PE" => add_evidence(server, client, packet),
        "DE" => remove_evidence(server, client, packet),
        "EE" => edit_evidence(server, client, packet),
        "ZZ" => modcall(server, client, packet),
        header => tracing::debug!("Unhandled packet {header} from {}", client.ipid()),
    }
}

// Handshake

fn hello<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    client.set_hdid(&packet.text(0).unwrap_or_default());
    if refuse_banned(server, client) {
        return;
    }

    let config = &server.config().server;
    client.send(&Packet::new("ID").field("0").field("athena").field(VERSION));
    client.send(
        &Packet::new("PN")
            .field(server.player_count().to_string())
            .field(config.max_players.to_string())
            .push_text(&config.description),
    );
    client.send(&Packet::with_fields("FL", FEATURES));
}

/// Close `client` with `BD` if its IPID or HDID is banned.
///
/// Runs at `HI` and again at `RD`, since nothing forces a client to send
/// `HI` before joining.
fn refuse_banned<E: Environment>(server: &Server<E>, client: &Client) -> bool {
    match server.storage().find_active_ban(client.ipid(), &client.hdid(), server.env().wall_clock_secs()) {
        Ok(Some(ban)) => {
            tracing::info!(target: "audit", "Refused banned client {} (ban {})", client.ipid(), ban.id);
            client.close_with(&Packet::new("BD").push_text(&ban_notice(&ban)));
            true
        },
        Ok(None) => false,
        Err(e) => {
            tracing::warn!("Ban lookup failed for {}: {e}", client.ipid());
            false
        },
    }
}

fn resource_counts<E: Environment>(server: &Server<E>, client: &Client) {
    let config = server.config();
    client.send(
        &Packet::new("SI")
            .field(config.characters.len().to_string())
            .field("0")
            .field((server.areas().len() + config.music.len()).to_string()),
    );
}

fn send_characters<E: Environment>(server: &Server<E>, client: &Client) {
    let config = server.config();
    let items: Vec<String> = config.characters.iter().map(|c| escape(c)).collect();
    for packet in chunk_packets("SC", &items, config.server.max_chunk_size) {
        client.send(&packet);
    }
}

fn send_music<E: Environment>(server: &Server<E>, client: &Client) {
    let config = server.config();
    let items: Vec<String> = server
        .areas()
        .iter()
        .map(|a| escape(a.name()))
        .chain(config.music.iter().map(|m| escape(m)))
        .collect();
    for packet in chunk_packets("SM", &items, config.server.max_chunk_size) {
        client.send(&packet);
    }
}

fn join<E: Environment>(server: &Server<E>, client: &Client) {
    if client.is_joined() || client.is_closing() || refuse_banned(server, client) {
        return;
    }
    let uid = match server.uids().allocate() {
        Ok(uid) => uid,
        Err(e) => {
            tracing::info!("Refused {}: {e}", client.ipid());
            client.close_with(&Packet::new("BD").push_text("Server is full."));
            return;
        },
    };
    let Some(lobby) = server.area(0) else {
        server.uids().release(uid);
        client.close();
        return;
    };

    client.set_uid(uid);
    client.set_area(0);
    lobby.add_player();

    server.send_area_state(client, lobby);
    client.send(&Packet::new("MM").field("1"));
    client.send(&Packet::new("DONE"));

    server.send_arup(ArupKind::Players);
    for kind in [ArupKind::Status, ArupKind::Cm, ArupKind::Lock] {
        client.send(&server.arup_packet(kind));
    }
    server.player_list_add(client);
    server.send_player_list(client);

    let motd = &server.config().server.motd;
    if !motd.is_empty() {
        client.server_message(motd);
    }
    tracing::info!("Client {} joined as UID {uid}", client.ipid());
}

// Characters

fn select_character<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    let (Some(uid), Some(requested)) = (client.uid(), packet.int(1)) else { return };
    let Some(area) = server.area(client.area()) else { return };

    let wanted = match usize::try_from(requested) {
        Ok(id) if id < server.config().characters.len() => Some(id),
        Ok(_) => return,
        Err(_) if requested == -1 => None,
        Err(_) => return,
    };
    if let Some(id) = wanted {
        if !area.can_play(uid, client.has_perm(Permissions::BYPASS_LOCK)) {
            client.server_message("This area is spectatable; you must be invited to play.");
            return;
        }
        if area.take_character(id, uid).is_err() {
            client.send(&server.chars_check(area));
            return;
        }
    }
    if let Some(old) = client.char_id().filter(|&old| Some(old) != wanted) {
        area.release_character(old, uid);
    }

    client.set_char_id(wanted);
    client.send(&Packet::new("PV").field(uid.to_string()).field("CID").field(requested.to_string()));
    server.send_to_area(area.id(), &server.chars_check(area));
    server.player_list_update(client, PlayerField::Character);
    if area.is_cm(uid) {
        server.send_arup(ArupKind::Cm);
    }
    server.area_log(client, "CHAR", &format!("Selected {}", server.character_name(wanted)));
}

// IC

/// Baseline outgoing IC message for `look` saying `message`.
pub fn puppet_message(look: &Appearance, message: &str) -> Packet {
    let mut fields = vec![String::new(); MS_FIELDS];
    fields[0] = "chat".to_string();
    fields[2] = escape(&look.name);
    fields[3] = escape(&look.emote);
    fields[4] = escape(message);
    fields[5] = escape(&look.pos);
    fields[8] = look.char_id.to_string();
    fields[12] = look.flip.clone();
    fields[15] = escape(&look.showname);
    fields[16] = "-1".to_string();
    fields[19] = look.offset.clone();
    for i in [7, 9, 10, 11, 13, 14, 21, 22, 23, 24, 28] {
        fields[i] = "0".to_string();
    }
    Packet::with_fields("MS", fields)
}

/// Map inbound IC fields onto the outgoing layout, leaving the pair
/// fields (16, 17, 18, 20, 21) for the caller.
fn relay_fields(inbound: &[String]) -> Vec<String> {
    let mut out = vec![String::new(); MS_FIELDS];
    out[..=16].clone_from_slice(&inbound[..=16]);
    out[19].clone_from(&inbound[17]);
    out[22..].clone_from_slice(&inbound[18..MS_INBOUND_FIELDS]);
    out
}

/// Character id and optional `^order` suffix of a pair request field.
fn pair_request(field: &str) -> (Option<usize>, &str) {
    let (id, suffix) = field.find('^').map_or((field, ""), |at| field.split_at(at));
    (id.trim().parse().ok(), suffix)
}

/// Partner whose pose is mirrored into this client's message.
///
/// A persistent `/pair` wins; otherwise the classic mutual request: the
/// client wants the partner's character and the partner wants ours.
fn pair_partner<E: Environment>(
    server: &Server<E>,
    client: &Client,
    own_char: usize,
    wanted: Option<usize>,
) -> Option<Arc<Client>> {
    let area = client.area();
    if let Some(partner) = client.paired_with().and_then(|uid| server.client_by_uid(uid)) {
        if partner.area() == area && partner.char_id().is_some() {
            return Some(partner);
        }
    }
    let wanted = wanted?;
    server.clients().in_area(area).into_iter().find(|other| {
        other.id() != client.id() && other.char_id() == Some(wanted) && other.pair_wanted() == Some(own_char)
    })
}

fn ic_message<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    let (Some(uid), Some(own_char)) = (client.uid(), client.char_id()) else { return };
    if packet.len() < MS_MIN_FIELDS {
        tracing::debug!("Short MS ({} fields) from {}", packet.len(), client.ipid());
        return;
    }
    if packet.int(8) != Some(own_char as i64) {
        return;
    }
    let Some(area) = server.area(client.area()) else { return };
    if !area.can_play(uid, client.has_perm(Permissions::BYPASS_LOCK)) {
        client.server_message("You are not invited to speak in this area.");
        return;
    }
    let now = server.now();
    let mute = client.mute(now);
    if !mute.can_speak_ic() {
        client.server_message("You are muted from speaking in IC.");
        return;
    }
    let text = packet.text(4).unwrap_or_default();
    if text.chars().count() > server.config().server.max_message_size {
        client.server_message("Your message exceeds the maximum message length!");
        return;
    }
    if step_testimony(server, area, &text) {
        return;
    }

    let mut inbound = packet.fields().to_vec();
    inbound.resize(inbound.len().max(MS_INBOUND_FIELDS), String::new());

    let showname = packet.text(15).unwrap_or_default();
    if showname != client.showname() {
        client.set_showname(&showname);
        server.player_list_update(client, PlayerField::Showname);
    }
    client.set_pos(&packet.text(5).unwrap_or_default());
    client.set_pair_info(PairInfo {
        name: packet.text(2).unwrap_or_default(),
        emote: packet.text(3).unwrap_or_default(),
        flip: inbound[12].clone(),
        offset: inbound[17].clone(),
    });
    let (wanted, order) = pair_request(&inbound[16]);
    client.set_pair_wanted(wanted);

    let text = if mute == MuteState::Parrot { server.parrot_line() } else { text };
    let text = client.apply_punishments(&text, now, &mut server.rng());
    let whisper = client.has_punishment(PunishmentKind::Whisper, now);

    let mut out = relay_fields(&inbound);
    out[4] = escape(&text);
    possess_fields(server, client, &mut out);

    out[16] = "-1".to_string();
    out[21] = "0".to_string();
    if let Some(partner) = pair_partner(server, client, own_char, wanted) {
        if let Some(look) = server.appearance(&partner) {
            out[16] = format!("{}{order}", look.char_id);
            out[17] = escape(&look.name);
            out[18] = escape(&look.emote);
            out[20] = look.offset;
            out[21] = look.flip;
        }
    }

    let message = Packet::with_fields("MS", out);
    if whisper {
        let encoded = message.encode();
        for other in server.clients().in_area(area.id()) {
            if other.id() == client.id() || other.is_authenticated() {
                other.send_raw(encoded.clone());
            }
        }
        server.area_log(client, "IC", &format!("(whisper) {text}"));
        return;
    }

    match area.with_testimony(|t| t.capture(message.encode())) {
        Captured::Updated => server.area_message(area.id(), "Statement updated."),
        Captured::Inserted => server.area_message(area.id(), "Statement inserted."),
        Captured::Recorded | Captured::Ignored => {},
    }
    server.send_to_area(area.id(), &message);
    server.area_log(client, "IC", &text);
}

/// Swap in the possessed player's look. Drops a link whose target left.
fn possess_fields<E: Environment>(server: &Server<E>, client: &Client, out: &mut [String]) {
    let Some(link) = client.possessing() else { return };
    let Some(target) = server.client_by_uid(link.target) else {
        client.set_possessing(None);
        return;
    };
    let Some(look) = server.appearance(&target) else { return };
    out[2] = escape(&look.name);
    out[3] = escape(&look.emote);
    out[5] = escape(&link.pos);
    out[8] = look.char_id.to_string();
    out[12] = look.flip;
    out[15] = escape(&look.showname);
    out[19] = look.offset;
}

/// `>` and `<` step through a testimony in playback. Returns true if the
/// message was a step and must not be shown.
fn step_testimony<E: Environment>(server: &Server<E>, area: &Area, text: &str) -> bool {
    let step = match text.trim() {
        ">" => true,
        "<" => false,
        _ => return false,
    };
    let statement = area.with_testimony(|t| {
        if t.state() != RecorderState::Playback {
            return None;
        }
        let next = if step { t.advance() } else { t.rewind() };
        next.map(str::to_string)
    });
    match statement {
        Some(statement) => {
            for other in server.clients().in_area(area.id()) {
                other.send_raw(statement.clone());
            }
            true
        },
        None => false,
    }
}

// OOC

fn ooc_message<E: Environment>(server: &Arc<Server<E>>, client: &Arc<Client>, packet: &Packet) {
    let (Some(name), Some(message)) = (packet.text(0), packet.text(1)) else { return };
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case(server.name()) {
        client.server_message("Invalid username.");
        return;
    }
    if message.trim().is_empty() {
        return;
    }
    if message.chars().count() > server.config().server.max_message_size {
        client.server_message("Your message exceeds the maximum message length!");
        return;
    }
    if client.ooc_name() != name {
        client.set_ooc_name(name);
        server.player_list_update(client, PlayerField::OocName);
    }

    if message.starts_with('/') {
        commands::dispatch(server, client, &message);
        return;
    }
    if !client.mute(server.now()).can_speak_ooc() {
        client.server_message("You are muted from sending OOC messages.");
        return;
    }
    server.send_to_area(client.area(), &Packet::new("CT").push_text(name).push_text(&message).field("0"));
    server.area_log(client, "OOC", &message);
}

// Music and area changes

fn is_song<E: Environment>(server: &Server<E>, name: &str) -> bool {
    name == STOP_MUSIC
        || server.config().music.iter().any(|song| song.contains('.') && song.eq_ignore_ascii_case(name))
}

fn music_or_area<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    let Some(name) = packet.text(0) else { return };

    if let Some(target) = server.area_by_name(&name) {
        let target = target.id();
        match server.move_client(client, target, false) {
            Ok(()) => server.area_log(client, "AREA", "Entered area"),
            Err(e) => client.server_message(&e.to_string()),
        }
        return;
    }

    if !client.mute(server.now()).can_change_music() {
        client.server_message("You are muted from changing the music.");
        return;
    }
    let Some(area) = server.area(client.area()) else { return };
    if area.lock_music() && !server.is_cm(client) {
        client.server_message("Music is locked to CMs in this area.");
        return;
    }
    if !is_song(server, &name) {
        return;
    }

    let char_id = client.char_id().map_or_else(|| "-1".to_string(), |id| id.to_string());
    let showname = packet.text(2).filter(|s| !s.trim().is_empty()).unwrap_or_else(|| client.showname());
    server.send_to_area(
        area.id(),
        &Packet::new("MC").push_text(&name).field(char_id).push_text(&showname).field("1").field("0"),
    );
    server.area_log(client, "MUSIC", &format!("Changed music to {name}"));
}

// Judge controls

/// Area has no CMs, or `client` is one.
fn may_judge<E: Environment>(server: &Server<E>, client: &Client, area: &Area) -> bool {
    area.cms().is_empty() || server.is_cm(client)
}

fn health<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    let (Some(bar), Some(value)) = (packet.int(0).and_then(Bar::from_wire), packet.int(1)) else { return };
    if !client.mute(server.now()).can_judge() {
        client.server_message("You are muted from using judge controls.");
        return;
    }
    let Some(area) = server.area(client.area()) else { return };
    if !may_judge(server, client, area) {
        client.server_message("You are not a CM in this area.");
        return;
    }
    if area.set_health(bar, value).is_err() {
        return;
    }
    let wire = if bar == Bar::Defense { "1" } else { "2" };
    server.send_to_area(area.id(), &Packet::new("HP").field(wire).field(value.to_string()));
    server.area_log(client, "JUD", &format!("Set bar {wire} to {value}"));
}

fn judge_animation<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    let Some(kind) = packet.raw(0) else { return };
    if !matches!(kind, "testimony1" | "testimony2" | "judgeruling") {
        return;
    }
    if !client.mute(server.now()).can_judge() {
        client.server_message("You are muted from using judge controls.");
        return;
    }
    let Some(area) = server.area(client.area()) else { return };
    if client.pos() != "jud" && !server.is_cm(client) {
        client.server_message("Only the judge can do that.");
        return;
    }
    if !may_judge(server, client, area) {
        client.server_message("You are not a CM in this area.");
        return;
    }
    server.send_to_area(area.id(), &Packet::with_fields("RT", packet.fields().iter().cloned()));
    server.area_log(client, "JUD", &format!("Played {kind}"));
}

// Evidence

/// The client's area if it may alter evidence there.
fn evidence_area<'a, E: Environment>(server: &'a Server<E>, client: &Client) -> Option<&'a Area> {
    if !server.can_alter_evidence(client) {
        client.server_message("You are not allowed to change evidence in this area.");
        return None;
    }
    server.area(client.area())
}

fn evidence_from(packet: &Packet, first: usize) -> Evidence {
    Evidence {
        name: packet.text(first).unwrap_or_default(),
        description: packet.text(first + 1).unwrap_or_default(),
        image: packet.text(first + 2).unwrap_or_default(),
    }
}

fn add_evidence<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    let Some(area) = evidence_area(server, client) else { return };
    let evidence = evidence_from(packet, 0);
    let name = evidence.name.clone();
    area.add_evidence(evidence);
    server.send_to_area(area.id(), &server.evidence_list(area));
    server.area_log(client, "EVI", &format!("Added evidence: {name}"));
}

fn remove_evidence<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    let Some(index) = packet.int(0).and_then(|i| usize::try_from(i).ok()) else { return };
    let Some(area) = evidence_area(server, client) else { return };
    if let Ok(removed) = area.remove_evidence(index) {
        server.send_to_area(area.id(), &server.evidence_list(area));
        server.area_log(client, "EVI", &format!("Removed evidence: {}", removed.name));
    }
}

fn edit_evidence<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    let Some(index) = packet.int(0).and_then(|i| usize::try_from(i).ok()) else { return };
    let Some(area) = evidence_area(server, client) else { return };
    let evidence = evidence_from(packet, 1);
    let name = evidence.name.clone();
    if area.edit_evidence(index, evidence).is_ok() {
        server.send_to_area(area.id(), &server.evidence_list(area));
        server.area_log(client, "EVI", &format!("Edited evidence: {name}"));
    }
}

// Modcall

fn modcall<E: Environment>(server: &Server<E>, client: &Client, packet: &Packet) {
    if let Err(e) = client.check_modcall(server.now()) {
        client.server_message(&e.to_string());
        return;
    }
    let reason = packet.text(0).unwrap_or_default();
    let area = server.area(client.area()).map_or("?", Area::name);
    let alert = format!(
        "[{area}] {} ({}) called for a moderator: {reason}",
        server.display_name(client),
        client.ipid()
    );
    server.send_to_moderators(Permissions::NONE, &Packet::new("ZZ").push_text(&alert));
    server.audit(client, "MODCALL", &reason);
    client.server_message("Moderators have been alerted.");
}
