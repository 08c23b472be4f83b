//! Area commands: movement, CM roster, locks, settings, evidence and
//! testimony.

use athena_core::{Area, Environment, EvidenceMode, LockKind, Permissions, Status};
use athena_proto::Packet;

use super::{CommandTable, Ctx, Flags, report, uid_list};
use crate::broadcast::ArupKind;

pub(super) fn register<E: Environment>(table: &mut CommandTable<E>) {
    table.add(
        "area",
        move_to,
        0,
        "Usage: /area [area]",
        "Lists areas, or moves to one.",
        Permissions::NONE,
    );
    table.add(
        "move",
        move_to,
        1,
        "Usage: /move [-u <uid1>,<uid2>...] <area>",
        "Moves to an area.",
        Permissions::NONE,
    );
    table.add(
        "summon",
        summon,
        1,
        "Usage: /summon <area>",
        "Summons all users to the specified area.",
        Permissions::MOVE_USERS,
    );
    table.add("bg", bg, 1, "Usage: /bg <background>", "Sets the area's background.", Permissions::CM);
    table.add("cm", cm, 0, "Usage: /cm [uid1],[uid2]...", "Promote to area CM.", Permissions::NONE);
    table.add(
        "uncm",
        uncm,
        0,
        "Usage: /uncm [uid1],[uid2]...",
        "Removes CM(s) from the current area.",
        Permissions::CM,
    );
    table.add(
        "lock",
        lock,
        0,
        "Usage: /lock [-s]\n-s: Sets the area to be spectatable.",
        "Locks the current area or sets it to spectatable.",
        Permissions::CM,
    );
    table.add("unlock", unlock, 0, "Usage: /unlock", "Unlocks the current area.", Permissions::CM);
    table.add(
        "invite",
        invite,
        1,
        "Usage: /invite <uid1>,<uid2>...",
        "Invites user(s) to the current area.",
        Permissions::CM,
    );
    table.add(
        "uninvite",
        uninvite,
        1,
        "Usage: /uninvite <uid1>,<uid2>...",
        "Uninvites user(s) from the current area.",
        Permissions::CM,
    );
    table.add(
        "kickarea",
        kick_area,
        1,
        "Usage: /kickarea <uid1>,<uid2>...",
        "Kicks user(s) from the current area.",
        Permissions::CM,
    );
    table.add(
        "doc",
        doc,
        0,
        "Usage: /doc [-c] [doc]\n-c: Clear the doc.",
        "Prints or sets the area's document.",
        Permissions::NONE,
    );
    table.add("areainfo", area_info, 0, "Usage: /areainfo", "Prints area settings.", Permissions::NONE);
    table.add(
        "lockbg",
        lock_bg,
        1,
        "Usage: /lockbg <true|false>",
        "Toggles locking the BG on or off.",
        Permissions::MODIFY_AREA,
    );
    table.add(
        "lockmusic",
        lock_music,
        1,
        "Usage: /lockmusic <true|false>",
        "Toggles CM only music on or off.",
        Permissions::CM,
    );
    table.add(
        "allowcms",
        allow_cms,
        1,
        "Usage: /allowcms <true|false>",
        "Toggles allowing CMs on or off.",
        Permissions::MODIFY_AREA,
    );
    table.add(
        "forcebglist",
        force_bg_list,
        1,
        "Usage: /forcebglist <true|false>",
        "Toggles enforcing the server BG list on or off.",
        Permissions::MODIFY_AREA,
    );
    table.add("log", show_log, 1, "Usage: /log <area>", "Prints an area's log buffer.", Permissions::LOG);
    table.add("status", status, 1, "Usage: /status <status>", "Sets the current area's status.", Permissions::CM);
    table.add("evimode", evimode, 1, "Usage: /evimode <mode>", "Sets the area's evidence mode.", Permissions::CM);
    table.add("swapevi", swap_evidence, 2, "Usage: /swapevi <id1> <id2>", "Swaps index of evidence.", Permissions::NONE);
    table.add(
        "testimony",
        testimony,
        0,
        "Usage: /testimony <record|stop|play|update|insert|delete>",
        "Updates the current area's testimony recorder, or prints current testimony.",
        Permissions::NONE,
    );
}

/// Area index from a number or a case-insensitive area name.
fn resolve_area<E: Environment>(ctx: &Ctx<'_, E>, arg: &str) -> Option<usize> {
    match arg.parse::<usize>() {
        Ok(id) => ctx.server.area(id).map(|a| a.id()),
        Err(_) => ctx.server.area_by_name(arg).map(|a| a.id()),
    }
}

fn area_list<E: Environment>(ctx: &Ctx<'_, E>) -> String {
    let mut out = String::from("\nAreas\n----------\n");
    for area in ctx.server.areas() {
        out.push_str(&format!(
            "[{}] {}: {} players, {}, {}\n",
            area.id(),
            area.name(),
            area.players(),
            area.status(),
            area.lock_state()
        ));
    }
    out
}

fn move_to<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let flags = Flags::parse(args, &["u"], &[]);
    let Some(target) = flags.rest().first() else {
        if flags.value("u").is_some() {
            ctx.usage_error();
        } else {
            ctx.reply(&area_list(ctx));
        }
        return;
    };
    let Some(id) = resolve_area(ctx, &flags.rest().join(" ")).or_else(|| resolve_area(ctx, target)) else {
        ctx.reply("Invalid area.");
        return;
    };
    let name = ctx.server.area(id).map(|a| a.name().to_string()).unwrap_or_default();

    let Some(list) = flags.value("u") else {
        if let Err(e) = ctx.server.move_client(ctx.client, id, false) {
            ctx.reply(&e.to_string());
        }
        return;
    };
    if !ctx.has_perm(Permissions::MOVE_USERS) {
        ctx.reply("You do not have permission to use that command.");
        return;
    }
    let mut moved = Vec::new();
    for target in uid_list(ctx.server, list) {
        if ctx.server.move_client(&target, id, true).is_ok() {
            target.server_message(&format!("You were moved to {name}."));
            moved.extend(target.uid());
        }
    }
    ctx.reply(&format!("Moved {} users.", moved.len()));
    ctx.log(&format!("Moved {} to {name}.", report(&moved)));
}

fn summon<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(id) = resolve_area(ctx, &args[0]) else {
        ctx.reply("Invalid area.");
        return;
    };
    let name = ctx.server.area(id).map(|a| a.name().to_string()).unwrap_or_default();

    let mut summoned = Vec::new();
    for target in ctx.server.clients().joined() {
        if ctx.server.move_client(&target, id, true).is_err() {
            continue;
        }
        if target.id() == ctx.client.id() {
            target.server_message(&format!("Summoned all users to {name}."));
        } else {
            target.server_message(&format!("You were summoned to {name}."));
        }
        summoned.extend(target.uid());
    }
    if summoned.is_empty() {
        ctx.reply("No users were summoned.");
    } else {
        ctx.audit(&format!("Summoned {} user(s) ({}) to {name}.", summoned.len(), report(&summoned)));
    }
}

fn bg<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    if area.lock_background() && !ctx.has_perm(Permissions::MODIFY_AREA) {
        ctx.reply("You do not have permission to change the background in this area.");
        return;
    }
    let background = args.join(" ");
    if area.force_background_list() && !ctx.server.config().backgrounds.contains(&background) {
        ctx.reply("Invalid background.");
        return;
    }
    area.set_background(background.as_str());
    ctx.server.send_to_area(area.id(), &Packet::new("BN").push_text(&background));
    ctx.server.area_message(
        area.id(),
        &format!("{} set the background to {background}.", ctx.client.ooc_name()),
    );
    ctx.log(&format!("Set BG to {background}."));
}

fn cm<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    let force = ctx.has_perm(Permissions::CM);
    if ctx.client.char_id().is_none() {
        ctx.reply("You are spectating; you cannot become a CM.");
        return;
    }

    if let Some(list) = args.first() {
        if !ctx.is_cm() {
            ctx.reply("You do not have permission to use that command.");
            return;
        }
        let mut promoted = Vec::new();
        for target in uid_list(ctx.server, list) {
            let Some(uid) = target.uid() else { continue };
            if target.area() != area.id() {
                continue;
            }
            if let Ok(true) = area.add_cm(uid, true) {
                target.server_message("You have become a CM in this area.");
                promoted.push(uid);
            }
        }
        ctx.reply(&format!("CMed {} users.", promoted.len()));
        ctx.log(&format!("CMed {}.", report(&promoted)));
    } else {
        match area.add_cm(ctx.uid(), force) {
            Ok(true) => {
                ctx.reply("Successfully became a CM.");
                ctx.log("CMed self.");
            },
            Ok(false) => {
                ctx.reply("You are already a CM in this area.");
                return;
            },
            Err(e) => {
                ctx.reply(&e.to_string());
                return;
            },
        }
    }
    ctx.server.send_arup(ArupKind::Cm);
}

fn uncm<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    if let Some(list) = args.first() {
        let mut demoted = Vec::new();
        for target in uid_list(ctx.server, list) {
            let Some(uid) = target.uid() else { continue };
            if target.area() == area.id() && area.remove_cm(uid) {
                target.server_message("You are no longer a CM in this area.");
                demoted.push(uid);
            }
        }
        ctx.reply(&format!("Un-CMed {} users.", demoted.len()));
        ctx.log(&format!("Un-CMed {}.", report(&demoted)));
    } else {
        if !area.remove_cm(ctx.uid()) {
            ctx.reply("You are not a CM in this area.");
            return;
        }
        ctx.reply("You are no longer a CM in this area.");
        ctx.log("Un-CMed self.");
    }
    ctx.server.send_arup(ArupKind::Cm);
}

fn lock<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    let spectatable = args.iter().any(|a| a == "-s");
    let kind = if spectatable { LockKind::Spectatable } else { LockKind::Locked };
    if let Err(e) = ctx.server.lock_area(area, kind) {
        ctx.reply(&e.to_string());
        return;
    }

    let name = ctx.client.ooc_name();
    if spectatable {
        ctx.server.area_message(area.id(), &format!("{name} set the area to spectatable."));
        ctx.log("Set the area to spectatable.");
    } else {
        ctx.server.area_message(area.id(), &format!("{name} locked the area."));
        ctx.log("Locked the area.");
    }
    ctx.server.send_arup(ArupKind::Lock);
}

fn unlock<E: Environment>(ctx: &Ctx<'_, E>, _args: &[String]) {
    let Some(area) = ctx.area() else { return };
    if let Err(e) = area.unlock() {
        ctx.reply(&e.to_string());
        return;
    }
    ctx.server.send_arup(ArupKind::Lock);
    ctx.server.area_message(area.id(), &format!("{} unlocked the area.", ctx.client.ooc_name()));
    ctx.log("Unlocked the area.");
}

fn invite<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    let mut invited = Vec::new();
    for target in uid_list(ctx.server, &args[0]) {
        let Some(uid) = target.uid() else { continue };
        match area.invite(uid) {
            Ok(true) => {
                target.server_message(&format!("You were invited to area {}.", area.name()));
                invited.push(uid);
            },
            Ok(false) => {},
            Err(e) => {
                ctx.reply(&e.to_string());
                return;
            },
        }
    }
    ctx.reply(&format!("Invited {} users.", invited.len()));
    ctx.log(&format!("Invited {} to the area.", report(&invited)));
}

fn uninvite<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    let mut removed = Vec::new();
    for target in uid_list(ctx.server, &args[0]) {
        let Some(uid) = target.uid() else { continue };
        if target.id() == ctx.client.id() || area.is_cm(uid) {
            continue;
        }
        match area.uninvite(uid) {
            Ok(true) => {},
            Ok(false) => continue,
            Err(e) => {
                ctx.reply(&e.to_string());
                return;
            },
        }
        if target.area() == area.id()
            && !area.can_enter(uid, target.has_perm(Permissions::BYPASS_LOCK))
            && ctx.server.move_client(&target, 0, true).is_ok()
        {
            target.server_message("You were kicked from the area!");
        }
        target.server_message(&format!("You were uninvited from area {}.", area.name()));
        removed.push(uid);
    }
    ctx.reply(&format!("Uninvited {} users.", removed.len()));
    ctx.log(&format!("Uninvited {} to the area.", report(&removed)));
}

fn kick_area<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    if area.is_lobby() {
        ctx.reply("Failed to kick: Cannot kick a user from area 0.");
        return;
    }
    let mut kicked = Vec::new();
    for target in uid_list(ctx.server, &args[0]) {
        if target.area() != area.id() || target.has_perm(Permissions::BYPASS_LOCK) {
            continue;
        }
        if target.id() == ctx.client.id() {
            ctx.reply("You can't kick yourself from the area.");
            continue;
        }
        if ctx.server.move_client(&target, 0, true).is_ok() {
            target.server_message("You were kicked from the area!");
            kicked.extend(target.uid());
        }
    }
    ctx.reply(&format!("Kicked {} clients.", kicked.len()));
    ctx.log(&format!("Kicked {} from area.", report(&kicked)));
}

fn doc<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    if args.is_empty() {
        let doc = area.doc();
        if doc.is_empty() {
            ctx.reply("This area does not have a doc set.");
        } else {
            ctx.reply(&doc);
        }
        return;
    }
    if !ctx.is_cm() {
        ctx.reply("You do not have permission to change the doc.");
        return;
    }
    let name = ctx.client.ooc_name();
    if args[0] == "-c" {
        area.set_doc("");
        ctx.server.area_message(area.id(), &format!("{name} cleared the doc."));
        ctx.log("Cleared the doc.");
    } else {
        let text = args.join(" ");
        ctx.log(&format!("Set the doc to {text}."));
        area.set_doc(text);
        ctx.server.area_message(area.id(), &format!("{name} updated the doc."));
    }
}

fn area_info<E: Environment>(ctx: &Ctx<'_, E>, _args: &[String]) {
    let Some(area) = ctx.area() else { return };
    ctx.reply(&format!(
        "\nBG: {}\nEvi mode: {}\nCMs allowed: {}\nForce BG list: {}\nBG locked: {}\nMusic locked: {}",
        area.background(),
        area.evidence_mode(),
        area.allow_cms(),
        area.force_background_list(),
        area.lock_background(),
        area.lock_music()
    ));
}

/// Shared body of the area setting toggles.
///
/// `verbs` holds the past tense used in the announcement for on and off,
/// `what` names the setting in it.
fn toggle<E: Environment>(
    ctx: &Ctx<'_, E>,
    arg: &str,
    set: fn(&Area, bool),
    verbs: (&str, &str),
    what: &str,
) {
    let Some(area) = ctx.area() else { return };
    let (on, verb) = match arg {
        "true" => (true, verbs.0),
        "false" => (false, verbs.1),
        _ => {
            ctx.reply("Argument not recognized.");
            return;
        },
    };
    set(area, on);
    ctx.server.area_message(area.id(), &format!("{} has {verb} {what} in this area.", ctx.client.ooc_name()));
    ctx.log(&format!("Set {what} to {arg}."));
}

fn lock_bg<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    toggle(ctx, &args[0], Area::set_lock_background, ("locked", "unlocked"), "the background");
}

fn lock_music<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    toggle(ctx, &args[0], Area::set_lock_music, ("enabled", "disabled"), "CM-only music");
}

fn allow_cms<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    toggle(ctx, &args[0], Area::set_allow_cms, ("allowed", "disallowed"), "CMs");
}

fn force_bg_list<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    toggle(ctx, &args[0], Area::set_force_background_list, ("enforced", "unenforced"), "the BG list");
}

fn show_log<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = resolve_area(ctx, &args.join(" ")).and_then(|id| ctx.server.area(id)) else {
        ctx.reply("Invalid area.");
        return;
    };
    let lines = area.log_lines();
    if lines.is_empty() {
        ctx.reply(&format!("The log for {} is empty.", area.name()));
    } else {
        ctx.reply(&lines.join("\n"));
    }
}

fn status<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    let Ok(status) = args[0].parse::<Status>() else {
        ctx.reply(
            "Status not recognized. Recognized statuses: idle, looking-for-players, casing, recess, rp, gaming",
        );
        return;
    };
    area.set_status(status);
    ctx.server.area_message(
        area.id(),
        &format!("{} set the status to {}.", ctx.client.ooc_name(), args[0]),
    );
    ctx.server.send_arup(ArupKind::Status);
    ctx.log(&format!("Set the status to {}.", args[0]));
}

fn evimode<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    if !ctx.server.can_alter_evidence(ctx.client) {
        ctx.reply("You are not allowed to change the evidence mode.");
        return;
    }
    let Ok(mode) = args[0].parse::<EvidenceMode>() else {
        ctx.reply("Invalid evidence mode.");
        return;
    };
    if mode == EvidenceMode::Mods && !ctx.has_perm(Permissions::MOD_EVI) {
        ctx.reply("You do not have permission for this evidence mode.");
        return;
    }
    area.set_evidence_mode(mode);
    ctx.server.area_message(
        area.id(),
        &format!("{} set the evidence mode to {mode}.", ctx.client.ooc_name()),
    );
    ctx.log(&format!("Set the evidence mode to {mode}."));
}

fn swap_evidence<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    if !ctx.server.can_alter_evidence(ctx.client) {
        ctx.reply("You are not allowed to alter evidence in this area.");
        return;
    }
    let (Ok(a), Ok(b)) = (args[0].parse::<usize>(), args[1].parse::<usize>()) else {
        ctx.reply("Invalid arguments.");
        return;
    };
    if area.swap_evidence(a, b).is_err() {
        ctx.reply("Invalid arguments.");
        return;
    }
    ctx.reply("Evidence swapped.");
    ctx.server.send_to_area(area.id(), &ctx.server.evidence_list(area));
    ctx.log(&format!("Swapped positions of evidence {a} and {b}."));
}

/// Statement list for `/testimony` without arguments.
///
/// Statements are stored as encoded IC packets; the listing shows each
/// one's message text.
fn testimony_listing(statements: &[String]) -> String {
    statements
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let text = Packet::decode(raw).ok().and_then(|p| p.text(4)).unwrap_or_default();
            format!("{i}: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn testimony<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(area) = ctx.area() else { return };
    let Some(action) = args.first() else {
        let listing = area.with_testimony(|t| (!t.is_empty()).then(|| testimony_listing(t.statements())));
        match listing {
            Some(text) => ctx.reply(&text),
            None => ctx.reply("This area has no recorded testimony."),
        }
        return;
    };
    if !ctx.is_cm() {
        ctx.reply("You do not have permission to use that command.");
        return;
    }

    match action.to_ascii_lowercase().as_str() {
        "record" => match area.with_testimony(|t| t.record()) {
            Ok(()) => ctx.reply("Recording testimony."),
            Err(e) => ctx.reply(&e.to_string()),
        },
        "stop" => {
            area.with_testimony(|t| t.stop());
            ctx.reply("Recorder stopped.");
            ctx.server.send_to_area(area.id(), &Packet::new("RT").field("testimony1").field("1"));
        },
        "play" => match area.with_testimony(|t| t.play().map(str::to_string)) {
            Ok(statement) => {
                ctx.reply("Playing testimony.");
                ctx.server.send_to_area(area.id(), &Packet::new("RT").field("testimony2"));
                for listener in ctx.server.clients().in_area(area.id()) {
                    listener.send_raw(statement.clone());
                }
            },
            Err(e) => ctx.reply(&e.to_string()),
        },
        "update" => match area.with_testimony(|t| t.update()) {
            Ok(()) => ctx.reply("Your next IC message will replace the current statement."),
            Err(e) => ctx.reply(&e.to_string()),
        },
        "insert" => match area.with_testimony(|t| t.insert()) {
            Ok(()) => ctx.reply("Your next IC message will be inserted after the current statement."),
            Err(e) => ctx.reply(&e.to_string()),
        },
        "delete" => match area.with_testimony(|t| t.delete()) {
            Ok(_) => ctx.reply("Statement deleted."),
            Err(e) => ctx.reply(&e.to_string()),
        },
        _ => ctx.reply(ctx.usage),
    }
    ctx.log(&format!("Testimony {action}."));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_shows_message_text() {
        let statements = vec![
            Packet::new("MS").extend_fields(["chat", "-", "Phoenix", "normal", "Title<num>1"]).encode(),
            "garbage".to_string(),
        ];
        assert_eq!(testimony_listing(&statements), "0: Title#1\n1: ");
    }
}
