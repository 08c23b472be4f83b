//! Moderator commands: removal, mutes, jail, punishments, accounts and
//! possession.

use std::{borrow::Cow, collections::BTreeSet, sync::Arc, time::Duration};

use athena_core::{
    Environment, MuteState, Permissions, PunishmentKind, Uid,
    duration::{format_duration, parse_duration},
};
use athena_proto::Packet;

use super::{CommandTable, Ctx, Flags, ipid_list, report, uid_list};
use crate::{
    client::{Appearance, Client, Possession},
    handlers::puppet_message,
    storage::{UserRecord, Warning},
};

/// Longest punishment a command may apply.
const MAX_PUNISHMENT: Duration = Duration::from_secs(24 * 60 * 60);

/// Punishment length when `-d` is omitted.
const DEFAULT_PUNISHMENT: &str = "10m";

pub(super) fn register<E: Environment>(table: &mut CommandTable<E>) {
    table.add(
        "kick",
        kick,
        3,
        "Usage: /kick -u <uid1>,<uid2>... | -i <ipid1>,<ipid2>... <reason>",
        "Kicks user(s) from the server.",
        Permissions::KICK,
    );
    table.add(
        "ban",
        ban,
        3,
        "Usage: /ban -u <uid1>,<uid2>... | -i <ipid1>,<ipid2>... [-d duration] <reason>",
        "Bans user(s) from the server.",
        Permissions::BAN,
    );
    table.add("unban", unban, 1, "Usage: /unban <id1>,<id2>...", "Nullifies ban(s).", Permissions::BAN);
    table.add(
        "warn",
        warn,
        2,
        "Usage: /warn <uid1>,<uid2>... <reason>",
        "Issues a recorded warning to user(s).",
        Permissions::KICK,
    );
    table.add(
        "mute",
        mute,
        1,
        "Usage: /mute [-ic][-ooc][-m][-j][-d duration][-r reason] <uid1>,<uid2>...\n-ic: Mute IC.\n-ooc: Mute OOC.\n-m: Mute music.\n-j: Mute judge.",
        "Mutes users(s) from IC, OOC, changing music, and/or judge controls.",
        Permissions::MUTE,
    );
    table.add("unmute", unmute, 1, "Usage: /unmute <uid1>,<uid2>...", "Unmutes user(s).", Permissions::MUTE);
    table.add(
        "parrot",
        parrot,
        1,
        "Usage: /parrot [-d duration][-r reason] <uid1>,<uid2>...",
        "Parrots user(s).",
        Permissions::MUTE,
    );
    table.add(
        "jail",
        jail,
        1,
        "Usage: /jail <uid> [-d duration] [-r reason]",
        "Jails a player in their current area.",
        Permissions::BAN,
    );
    table.add("unjail", unjail, 1, "Usage: /unjail <uid1>,<uid2>...", "Releases user(s) from jail.", Permissions::BAN);
    table.add("login", login, 2, "Usage: /login <username> <password>", "Logs in as moderator.", Permissions::NONE);
    table.add("logout", logout, 0, "Usage: /logout", "Logs out as moderator.", Permissions::NONE);
    table.add(
        "mkusr",
        make_user,
        3,
        "Usage: /mkusr <username> <password> <role>",
        "Creates a new moderator user.",
        Permissions::ADMIN,
    );
    table.add("rmusr", remove_user, 1, "Usage: /rmusr <username>", "Removes a moderator user.", Permissions::ADMIN);
    table.add(
        "setrole",
        set_role,
        2,
        "Usage: /setrole <username> <role>",
        "Changes a moderator user's role.",
        Permissions::ADMIN,
    );
    table.add(
        "mod",
        mod_speak,
        1,
        "Usage: /mod [-g] <message>\n-g: Send the message globally.",
        "Sends a message speaking officially as a moderator.",
        Permissions::MOD_SPEAK,
    );
    table.add(
        "modchat",
        mod_chat,
        1,
        "Usage: /modchat <message>",
        "Sends a message to other moderators.",
        Permissions::MOD_CHAT,
    );
    table.add(
        "possess",
        possess,
        2,
        "Usage: /possess <uid> <message>",
        "Makes target say a message once, copying their appearance.",
        Permissions::ADMIN,
    );
    table.add(
        "fullpossess",
        full_possess,
        1,
        "Usage: /fullpossess <uid>",
        "Makes all YOUR IC messages appear as the target until /unpossess.",
        Permissions::ADMIN,
    );
    table.add("unpossess", unpossess, 0, "Usage: /unpossess", "Stops full possession of a player.", Permissions::ADMIN);

    for kind in PunishmentKind::ALL {
        table.add(
            kind.name(),
            punish,
            1,
            Cow::Owned(format!("Usage: /{} [-d duration] [-r reason] <uid1>,<uid2>...", kind.name())),
            kind.description(),
            Permissions::MUTE,
        );
    }
    table.add(
        "unpunish",
        unpunish,
        1,
        "Usage: /unpunish [-t punishment_type] <uid1>,<uid2>...\n-t: Specific punishment type to remove (omit to remove all).",
        "Removes punishment(s) from user(s).",
        Permissions::MUTE,
    );
}

/// Targets named by `-u` or `-i`, or `None` when neither was given.
fn targets<E: Environment>(ctx: &Ctx<'_, E>, flags: &Flags) -> Option<Vec<Arc<Client>>> {
    if let Some(list) = flags.value("u") {
        Some(uid_list(ctx.server, list))
    } else {
        flags.value("i").map(|list| ipid_list(ctx.server, list))
    }
}

fn missing_arguments<E: Environment>(ctx: &Ctx<'_, E>) {
    ctx.reply(&format!("Not enough arguments:\n{}", ctx.usage));
}

// Removal

fn kick<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let flags = Flags::parse(args, &["u", "i"], &[]);
    let (Some(targets), false) = (targets(ctx, &flags), flags.rest().is_empty()) else {
        missing_arguments(ctx);
        return;
    };
    let reason = flags.rest().join(" ");
    let mut kicked = Vec::new();
    for target in &targets {
        ctx.server.kick(target, &reason);
        kicked.push(target.ipid().to_string());
    }
    ctx.reply(&format!("Kicked {} clients.", kicked.len()));
    ctx.audit(&format!("Kicked {} from server for reason: {reason}.", report(&kicked)));
}

fn ban<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let flags = Flags::parse(args, &["u", "i", "d"], &[]);
    if flags.rest().is_empty() {
        missing_arguments(ctx);
        return;
    }

    // Offline IPIDs are banned too; connected clients only lend their HDID.
    let mut bans: Vec<(String, String)> = Vec::new();
    if let Some(list) = flags.value("u") {
        for target in uid_list(ctx.server, list) {
            bans.push((target.ipid().to_string(), target.hdid()));
        }
    } else if let Some(list) = flags.value("i") {
        for ipid in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let hdid = ctx.server.clients().find_by_ipid(ipid).first().map(|c| c.hdid()).unwrap_or_default();
            bans.push((ipid.to_string(), hdid));
        }
    } else {
        missing_arguments(ctx);
        return;
    }

    let duration = match flags.value("d") {
        Some(d) if d.eq_ignore_ascii_case("perma") => None,
        Some(d) => match parse_duration(d) {
            Ok(d) => Some(d),
            Err(_) => {
                ctx.reply("Failed to ban: Cannot parse duration.");
                return;
            },
        },
        None => match ctx.server.config().server.default_ban_duration_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
    };

    let reason = flags.rest().join(" ");
    let moderator = ctx.client.mod_name();
    let mut banned = BTreeSet::new();
    let mut count = 0;
    for (ipid, hdid) in bans {
        if banned.contains(&ipid) {
            continue;
        }
        match ctx.server.ban(&ipid, &hdid, duration, &reason, &moderator) {
            Ok(_) => {
                count += 1;
                banned.insert(ipid);
            },
            Err(e) => tracing::error!("Failed to record ban for {ipid}: {e}"),
        }
    }
    let length = duration.map_or_else(|| "perma".to_string(), format_duration);
    ctx.reply(&format!("Banned {count} clients."));
    ctx.audit(&format!("Banned {} from server for {length}: {reason}.", report(&banned)));
}

fn unban<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let mut lifted = Vec::new();
    for id in args[0].split(',').filter_map(|s| s.trim().parse::<u64>().ok()) {
        match ctx.server.storage().nullify_ban(id) {
            Ok(true) => lifted.push(id),
            Ok(false) => {},
            Err(e) => tracing::error!("Failed to nullify ban {id}: {e}"),
        }
    }
    ctx.reply(&format!("Nullified bans: {}", report(&lifted)));
    ctx.audit(&format!("Nullified bans: {}", report(&lifted)));
}

fn warn<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let reason = args[1..].join(" ");
    let moderator = ctx.client.mod_name();
    let mut warned = Vec::new();
    for target in uid_list(ctx.server, &args[0]) {
        let warning = Warning {
            ipid: target.ipid().to_string(),
            reason: reason.clone(),
            moderator: moderator.clone(),
            issued_at_secs: ctx.server.env().wall_clock_secs(),
        };
        if let Err(e) = ctx.server.storage().add_warning(warning) {
            tracing::error!("Failed to record warning for {}: {e}", target.ipid());
            continue;
        }
        target.server_message(&format!("⚠️ Warning from moderator: {reason}"));
        warned.extend(target.uid());
    }
    ctx.reply(&format!("Warned {} clients.", warned.len()));
    ctx.audit(&format!("Warned {} for reason: {reason}.", report(&warned)));
}

// Mutes and jail

/// Shared suffix for mute and parrot notices.
fn mute_suffix(duration: Option<Duration>, reason: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(d) = duration {
        out.push_str(&format!(" for {} seconds", d.as_secs()));
    }
    if let Some(r) = reason.filter(|r| !r.is_empty()) {
        out.push_str(" for reason: ");
        out.push_str(r);
    }
    out
}

/// Optional `-d` value. `Err` carries nothing; callers word their own error.
fn optional_duration(flags: &Flags) -> Result<Option<Duration>, ()> {
    flags.value("d").map(parse_duration).transpose().map_err(|_| ())
}

fn mute<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let flags = Flags::parse(args, &["d", "r"], &["ic", "ooc", "m", "j"]);
    let state = match (flags.has("ic"), flags.has("ooc")) {
        (true, true) => MuteState::IcOoc,
        (true, false) => MuteState::Ic,
        (false, true) => MuteState::Ooc,
        _ if flags.has("m") => MuteState::Music,
        _ if flags.has("j") => MuteState::Judge,
        _ => MuteState::Ic,
    };
    let Some(list) = flags.rest().first() else {
        missing_arguments(ctx);
        return;
    };
    let Ok(duration) = optional_duration(&flags) else {
        ctx.reply("Failed to mute: Cannot parse duration.");
        return;
    };

    let now = ctx.server.now();
    let notice = format!("You have been muted from {state}{}", mute_suffix(duration, flags.value("r")));
    let mut muted = Vec::new();
    for target in uid_list(ctx.server, list) {
        if target.mute(now) == state {
            continue;
        }
        target.set_mute(state, duration.map(|d| now + d));
        target.server_message(&notice);
        muted.extend(target.uid());
    }
    ctx.reply(&format!("Muted {} clients.", muted.len()));
    ctx.log(&format!("Muted {}.", report(&muted)));
}

fn unmute<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let now = ctx.server.now();
    let mut unmuted = Vec::new();
    for target in uid_list(ctx.server, &args[0]) {
        if target.mute(now) == MuteState::None {
            continue;
        }
        target.unmute();
        target.server_message("You have been unmuted.");
        unmuted.extend(target.uid());
    }
    ctx.reply(&format!("Unmuted {} clients.", unmuted.len()));
    ctx.log(&format!("Unmuted {}.", report(&unmuted)));
}

fn parrot<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let flags = Flags::parse(args, &["d", "r"], &[]);
    let Some(list) = flags.rest().first() else {
        missing_arguments(ctx);
        return;
    };
    let Ok(duration) = optional_duration(&flags) else {
        ctx.reply("Failed to parrot: Cannot parse duration.");
        return;
    };

    let now = ctx.server.now();
    let notice = format!("You have been turned into a parrot{}", mute_suffix(duration, flags.value("r")));
    let mut parroted = Vec::new();
    for target in uid_list(ctx.server, list) {
        if target.mute(now) != MuteState::None {
            continue;
        }
        target.set_mute(MuteState::Parrot, duration.map(|d| now + d));
        target.server_message(&notice);
        parroted.extend(target.uid());
    }
    ctx.reply(&format!("Parroted {} clients.", parroted.len()));
    ctx.log(&format!("Parroted {}.", report(&parroted)));
}

fn jail<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    // Flags are accepted both before and after the UID.
    let leading = Flags::parse(args, &["d", "r"], &[]);
    let Some(uid_arg) = leading.rest().first() else {
        missing_arguments(ctx);
        return;
    };
    let trailing = Flags::parse(&leading.rest()[1..], &["d", "r"], &[]);
    let duration_arg = trailing.value("d").or(leading.value("d")).unwrap_or("perma");
    let reason = trailing.value("r").or(leading.value("r")).unwrap_or_default();

    let Ok(uid) = uid_arg.parse::<Uid>() else {
        ctx.reply("Invalid UID.");
        return;
    };
    let Some(target) = ctx.server.client_by_uid(uid) else {
        ctx.reply("Client not found.");
        return;
    };
    let duration = if duration_arg.eq_ignore_ascii_case("perma") {
        None
    } else {
        match parse_duration(duration_arg) {
            Ok(d) => Some(d),
            Err(_) => {
                ctx.reply("Failed to jail: Cannot parse duration.");
                return;
            },
        }
    };

    target.jail(duration.map(|d| ctx.server.now() + d));
    let area = ctx.server.area(target.area()).map(|a| a.name().to_string()).unwrap_or_default();
    let mut notice = match duration {
        None => format!("You have been jailed in {area}."),
        Some(_) => format!("You have been jailed in {area} for {duration_arg}."),
    };
    if !reason.is_empty() {
        notice.push_str(&format!(" Reason: {reason}"));
    }
    target.server_message(&notice);

    let name = target.ooc_name();
    ctx.reply(&format!("Jailed [{uid}] {name} in {area}."));
    if reason.is_empty() {
        ctx.log(&format!("Jailed [{uid}] {name}"));
    } else {
        ctx.log(&format!("Jailed [{uid}] {name} for reason: {reason}"));
    }
}

fn unjail<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let now = ctx.server.now();
    let mut released = Vec::new();
    for target in uid_list(ctx.server, &args[0]) {
        if !target.is_jailed(now) {
            continue;
        }
        target.unjail();
        target.server_message("You have been released from jail.");
        released.extend(target.uid());
    }
    ctx.reply(&format!("Released {} clients from jail.", released.len()));
    ctx.log(&format!("Released {} from jail.", report(&released)));
}

// Punishments

fn punish<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Ok(kind) = ctx.name.parse::<PunishmentKind>() else {
        ctx.reply("Invalid command.");
        return;
    };
    let flags = Flags::parse(args, &["d", "r"], &[]);
    let Some(list) = flags.rest().first() else {
        missing_arguments(ctx);
        return;
    };
    let Ok(mut duration) = parse_duration(flags.value("d").unwrap_or(DEFAULT_PUNISHMENT)) else {
        ctx.reply("Invalid duration format. Use format like: 10m, 1h, 30s");
        return;
    };
    // Zero would never expire
    if duration.is_zero() || duration > MAX_PUNISHMENT {
        duration = MAX_PUNISHMENT;
        ctx.reply("Duration capped at 24 hours.");
    }
    let reason = flags.value("r").unwrap_or_default();

    let mut notice = format!("You have been punished with '{kind}' effect for {}", format_duration(duration));
    if !reason.is_empty() {
        notice.push_str(&format!(" for reason: {reason}"));
    }

    let now = ctx.server.now();
    let mut punished = Vec::new();
    for target in uid_list(ctx.server, list) {
        target.add_punishment(kind, duration, reason, now);
        target.server_message(&notice);
        punished.extend(target.uid());
    }
    ctx.reply(&format!("Applied '{kind}' punishment to {} clients.", punished.len()));
    ctx.log(&format!("Applied '{kind}' punishment to {}.", report(&punished)));
}

fn unpunish<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let flags = Flags::parse(args, &["t"], &[]);
    let Some(list) = flags.rest().first() else {
        missing_arguments(ctx);
        return;
    };
    let kind = match flags.value("t").map(str::parse::<PunishmentKind>).transpose() {
        Ok(kind) => kind,
        Err(e) => {
            ctx.reply(&e.to_string());
            return;
        },
    };

    let mut cleared = Vec::new();
    for target in uid_list(ctx.server, list) {
        match kind {
            None => {
                if target.clear_punishments() == 0 {
                    continue;
                }
                target.server_message("All punishments have been removed.");
            },
            Some(kind) => {
                if !target.remove_punishment(kind) {
                    continue;
                }
                target.server_message(&format!("Punishment '{kind}' has been removed."));
            },
        }
        cleared.extend(target.uid());
    }
    ctx.reply(&format!("Removed punishments from {} clients.", cleared.len()));
    ctx.log(&format!("Removed punishments from {}.", report(&cleared)));
}

// Accounts

fn login<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    if ctx.client.is_authenticated() {
        ctx.reply("You are already logged in.");
        return;
    }
    let (username, password) = (&args[0], &args[1]);
    ctx.server.audit(ctx.client, "AUTH", &format!("Attempted login as {username}."));

    let user = ctx.server.storage().authenticate(username, password).unwrap_or_else(|e| {
        tracing::error!("Login lookup for {username} failed: {e}");
        None
    });
    let Some(user) = user else {
        ctx.client.send(&Packet::new("AUTH").field("0"));
        ctx.server.audit(ctx.client, "AUTH", &format!("Failed login as {username}."));
        return;
    };

    let perms = ctx.server.role(&user.role).unwrap_or(Permissions::NONE);
    ctx.client.login(username, perms);
    if !perms.is_empty() {
        ctx.reply("Logged in as moderator.");
    }
    ctx.client.send(&Packet::new("AUTH").field("1"));
    ctx.reply(&format!("Welcome, {username}."));
    ctx.server.audit(ctx.client, "AUTH", &format!("Logged in as {username}."));
}

fn logout<E: Environment>(ctx: &Ctx<'_, E>, _args: &[String]) {
    if !ctx.client.is_authenticated() {
        ctx.reply("You are not logged in.");
        return;
    }
    ctx.server.audit(ctx.client, "AUTH", &format!("Logged out as {}.", ctx.client.mod_name()));
    ctx.client.logout();
    ctx.reply("Logged out.");
}

fn make_user<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let (username, password, role) = (&args[0], &args[1], &args[2]);
    match ctx.server.storage().user(username) {
        Ok(Some(_)) => {
            ctx.reply("User already exists.");
            return;
        },
        Ok(None) => {},
        Err(e) => {
            tracing::error!("User lookup for {username} failed: {e}");
            ctx.reply("Invalid username/password.");
            return;
        },
    }
    if ctx.server.role(role).is_none() {
        ctx.reply("Invalid role.");
        return;
    }

    let mut salt = [0u8; 16];
    ctx.server.env().random_bytes(&mut salt);
    if let Err(e) = ctx.server.storage().create_user(UserRecord::new(username, password, role, salt)) {
        tracing::error!("Creating user {username} failed: {e}");
        ctx.reply("Invalid username/password.");
        return;
    }
    ctx.reply("User created.");
    ctx.audit(&format!("Created user {username}."));
}

fn remove_user<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let username = &args[0];
    match ctx.server.storage().remove_user(username) {
        Ok(true) => {},
        Ok(false) => {
            ctx.reply("User does not exist.");
            return;
        },
        Err(e) => {
            tracing::error!("Removing user {username} failed: {e}");
            ctx.reply("Failed to remove user.");
            return;
        },
    }
    ctx.reply("Removed user.");
    for client in ctx.server.clients().joined() {
        if client.is_authenticated() && client.mod_name() == *username {
            client.logout();
        }
    }
    ctx.audit(&format!("Removed user {username}."));
}

fn set_role<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let (username, role) = (&args[0], &args[1]);
    let Some(perms) = ctx.server.role(role) else {
        ctx.reply("Invalid role.");
        return;
    };
    match ctx.server.storage().set_role(username, role) {
        Ok(true) => {},
        Ok(false) => {
            ctx.reply("User does not exist.");
            return;
        },
        Err(e) => {
            tracing::error!("Changing role of {username} failed: {e}");
            ctx.reply("Failed to change permissions.");
            return;
        },
    }
    ctx.reply("Role updated.");
    for client in ctx.server.clients().joined() {
        if client.is_authenticated() && client.mod_name() == *username {
            client.login(username, perms);
        }
    }
    ctx.audit(&format!("Updated role of {username} to {role}."));
}

// Moderator speech

fn mod_speak<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let flags = Flags::parse(args, &[], &["g"]);
    if flags.rest().is_empty() {
        missing_arguments(ctx);
        return;
    }
    let message = flags.rest().join(" ");
    let name = ctx.client.ooc_name();
    if flags.has("g") {
        let packet = Packet::new("CT").push_text(&format!("[MOD] [GLOBAL] {name}")).push_text(&message).field("1");
        ctx.server.send_to_all(&packet);
    } else {
        let packet = Packet::new("CT").push_text(&format!("[MOD] {name}")).push_text(&message).field("1");
        ctx.server.send_to_area(ctx.client.area(), &packet);
    }
    ctx.server.area_log(ctx.client, "OOC", &message);
}

fn mod_chat<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let packet = Packet::new("CT")
        .push_text(&format!("[MODCHAT] {}", ctx.client.ooc_name()))
        .push_text(&args.join(" "))
        .field("1");
    ctx.server.send_to_moderators(Permissions::MOD_CHAT, &packet);
}

// Possession

/// Target of a possession command, with its current look.
fn possession_target<E: Environment>(ctx: &Ctx<'_, E>, arg: &str) -> Option<(Arc<Client>, Appearance)> {
    let Ok(uid) = arg.parse::<Uid>() else {
        ctx.reply("Invalid UID.");
        return None;
    };
    let Some(target) = ctx.server.client_by_uid(uid) else {
        ctx.reply("Client does not exist.");
        return None;
    };
    let Some(look) = ctx.server.appearance(&target) else {
        ctx.reply("Target has an invalid character.");
        return None;
    };
    Some((target, look))
}

fn possess<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some((target, look)) = possession_target(ctx, &args[0]) else { return };
    let message = args[1..].join(" ");
    if message.trim().is_empty() {
        ctx.reply("Message cannot be empty.");
        return;
    }
    ctx.server.send_to_area(target.area(), &puppet_message(&look, &message));
    ctx.audit(&format!("Possessed UID {} to say: \"{message}\"", args[0]));
    ctx.reply(&format!("Possessed UID {} for one message.", args[0]));
}

fn full_possess<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some((target, _)) = possession_target(ctx, &args[0]) else { return };
    let Some(uid) = target.uid() else { return };
    ctx.client.set_possessing(Some(Possession { target: uid, pos: target.pos() }));
    ctx.audit(&format!("Started full possession of UID {uid}."));
    ctx.reply(&format!(
        "Now fully possessing UID {uid}. All YOUR IC messages will appear as them. Use /unpossess to stop."
    ));
}

fn unpossess<E: Environment>(ctx: &Ctx<'_, E>, _args: &[String]) {
    if ctx.client.possessing().is_none() {
        ctx.reply("You are not possessing anyone.");
        return;
    }
    ctx.client.set_possessing(None);
    ctx.audit("Stopped possessing.");
    ctx.reply("Stopped possessing.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mute_suffix_combines_parts() {
        assert_eq!(mute_suffix(None, None), "");
        assert_eq!(mute_suffix(Some(Duration::from_secs(90)), None), " for 90 seconds");
        assert_eq!(
            mute_suffix(Some(Duration::from_secs(5)), Some("spam")),
            " for 5 seconds for reason: spam"
        );
        assert_eq!(mute_suffix(None, Some("")), "");
    }

    #[test]
    fn duration_flag_is_optional() {
        let args: Vec<String> = ["-d", "bogus", "1"].iter().map(|s| s.to_string()).collect();
        assert!(optional_duration(&Flags::parse(&args, &["d"], &[])).is_err());
        assert_eq!(optional_duration(&Flags::parse(&args[2..], &["d"], &[])), Ok(None));
    }
}
