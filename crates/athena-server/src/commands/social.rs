//! Player-facing commands: chat, pairing, dice and minigames.

use athena_core::{Environment, Permissions, Uid};
use athena_proto::Packet;
use rand::Rng;

use super::{CommandTable, Ctx, Flags, uid_list};
use crate::{
    client::Client,
    events::{
        coinflip::{Call, Side},
        giveaway, hot_potato,
    },
    server::VERSION,
};

/// Most dice one `/roll` may throw.
const MAX_DICE: u32 = 100;

/// Most sides a rolled die may have.
const MAX_SIDES: u32 = 10_000;

pub(super) fn register<E: Environment>(table: &mut CommandTable<E>) {
    table.add("about", about, 0, "Usage: /about", "Prints Athena version information.", Permissions::NONE);
    table.add("motd", motd, 0, "Usage: /motd", "Sends the server's message of the day.", Permissions::NONE);
    table.add("global", global, 1, "Usage: /global <message>", "Sends a global message.", Permissions::NONE);
    table.add("pm", pm, 2, "Usage: /pm <uid1>,<uid2>... <message>", "Sends a private message.", Permissions::NONE);
    table.add(
        "players",
        players,
        0,
        "Usage: /players [-a]\n-a: Target all areas.",
        "Shows players in the current or all areas.",
        Permissions::NONE,
    );
    table.add(
        "pair",
        pair,
        1,
        "Usage: /pair <uid>",
        "Sends or accepts a pair request with the specified player.",
        Permissions::NONE,
    );
    table.add(
        "unpair",
        unpair,
        0,
        "Usage: /unpair",
        "Cancels your current pair request or active pairing.",
        Permissions::NONE,
    );
    table.add(
        "roll",
        roll,
        1,
        "Usage: /roll [-p] <dice>d<sides>\n-p: Sets the roll to be private.",
        "Rolls dice.",
        Permissions::NONE,
    );
    table.add(
        "coinflip",
        coinflip,
        1,
        "Usage: /coinflip <heads|tails>",
        "Challenge another player to a coinflip.",
        Permissions::NONE,
    );
    table.add(
        "hotpotato",
        run_hot_potato,
        0,
        "Usage: /hotpotato [accept]",
        "Starts a Hot Potato game, or joins one during opt-in.",
        Permissions::NONE,
    );
    table.add(
        "giveaway",
        run_giveaway,
        1,
        "Usage: /giveaway start <item> | /giveaway enter",
        "Starts or enters a server-wide giveaway.",
        Permissions::NONE,
    );
}

fn about<E: Environment>(ctx: &Ctx<'_, E>, _args: &[String]) {
    ctx.reply(&format!(
        "Running Athena version {VERSION}.\nAthena is open source software; for documentation, bug reports, and source code, see: https://github.com/MangosArentLiterature/Athena."
    ));
}

fn motd<E: Environment>(ctx: &Ctx<'_, E>, _args: &[String]) {
    ctx.reply(&ctx.server.config().server.motd);
}

fn global<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    if !ctx.client.mute(ctx.server.now()).can_speak_ooc() {
        ctx.reply("You are muted from sending OOC messages.");
        return;
    }
    let packet = Packet::new("CT")
        .push_text(&format!("[GLOBAL] {}", ctx.client.ooc_name()))
        .push_text(&args.join(" "))
        .field("1");
    ctx.server.send_to_all(&packet);
}

fn pm<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let packet = Packet::new("CT")
        .push_text(&format!("[PM] {}", ctx.client.ooc_name()))
        .push_text(&args[1..].join(" "))
        .field("1");
    for target in uid_list(ctx.server, &args[0]) {
        target.send(&packet);
    }
}

fn player_entry<E: Environment>(ctx: &Ctx<'_, E>, client: &Client, show_ids: bool) -> String {
    let mut out = format!("[{}] {}\n", client.uid().unwrap_or_default(), ctx.server.display_name(client));
    if show_ids {
        if client.is_authenticated() && !client.perms().is_empty() {
            out.push_str(&format!("Mod: {}\n", client.mod_name()));
        }
        out.push_str(&format!("IPID: {}\n", client.ipid()));
    }
    let ooc = client.ooc_name();
    if !ooc.is_empty() {
        out.push_str(&format!("OOC: {ooc}\n"));
    }
    out
}

fn players<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let all = Flags::parse(args, &[], &["a"]).has("a");
    let show_ids = ctx.has_perm(Permissions::BAN_INFO);
    let mut out = String::from("\nPlayers\n----------\n");
    for area in ctx.server.areas() {
        if !all && area.id() != ctx.client.area() {
            continue;
        }
        out.push_str(&format!("{}:\n{} players online.\n", area.name(), area.players()));
        for client in ctx.server.clients().in_area(area.id()) {
            out.push_str(&player_entry(ctx, &client, show_ids));
        }
        if all {
            out.push_str("----------\n");
        }
    }
    ctx.reply(&out);
}

fn pair<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Some(own_char) = ctx.client.char_id() else {
        ctx.reply("You have not selected a character.");
        return;
    };
    let Ok(uid) = args[0].parse::<Uid>() else {
        ctx.reply("Invalid UID.");
        return;
    };
    let Some(target) = ctx.server.client_by_uid(uid) else {
        ctx.reply("Client does not exist.");
        return;
    };
    if target.id() == ctx.client.id() {
        ctx.reply("You cannot pair with yourself.");
        return;
    }
    if target.area() != ctx.client.area() {
        ctx.reply("That player is not in your area.");
        return;
    }
    let Some(target_char) = target.char_id() else {
        ctx.reply("That player has not selected a character.");
        return;
    };

    ctx.client.set_pair_wanted(Some(target_char));
    let own_name = ctx.client.ooc_name();
    if target.pair_wanted() == Some(own_char) {
        ctx.client.set_paired_with(Some(uid));
        target.set_paired_with(Some(ctx.uid()));
        ctx.reply(&format!("Now pairing with {}.", target.ooc_name()));
        target.server_message(&format!("{own_name} accepted your pair request."));
    } else {
        ctx.reply(&format!("Sent pair request to {}.", target.ooc_name()));
        target.server_message(&format!(
            "{own_name} wants to pair with you. Type /pair {} to accept.",
            ctx.uid()
        ));
    }
}

fn unpair<E: Environment>(ctx: &Ctx<'_, E>, _args: &[String]) {
    if ctx.client.pair_wanted().is_none() && ctx.client.paired_with().is_none() {
        ctx.reply("You do not have an active pair request.");
        return;
    }
    let own_char = ctx.client.char_id();
    let own_name = ctx.client.ooc_name();
    for other in ctx.server.clients().in_area(ctx.client.area()) {
        if other.id() == ctx.client.id() {
            continue;
        }
        let wanted_us = own_char.is_some() && other.pair_wanted() == own_char;
        if other.unpair_from(ctx.uid()) || wanted_us {
            other.server_message(&format!("{own_name} has cancelled the pair."));
        }
    }
    ctx.client.set_pair_wanted(None);
    ctx.client.set_paired_with(None);
    ctx.reply("Pair cancelled.");
}

/// Parse `NdM` into dice count and sides.
fn parse_dice(spec: &str) -> Option<(u32, u32)> {
    let lower = spec.to_ascii_lowercase();
    let (num, sides) = lower.split_once('d')?;
    Some((num.parse().ok()?, sides.parse().ok()?))
}

fn roll<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let flags = Flags::parse(args, &[], &["p"]);
    let Some(spec) = flags.rest().first() else {
        ctx.usage_error();
        return;
    };
    let Some((num, sides)) = parse_dice(spec) else {
        ctx.reply("Argument not recognized.");
        return;
    };
    if num == 0 || num > MAX_DICE || sides == 0 || sides > MAX_SIDES {
        ctx.reply("Invalid num/side.");
        return;
    }

    let mut rng = ctx.server.rng();
    let results: Vec<String> = (0..num).map(|_| rng.gen_range(1..=sides).to_string()).collect();
    let results = results.join(", ");
    if flags.has("p") {
        ctx.reply(&format!("Results: {results}."));
    } else {
        ctx.server.area_message(
            ctx.client.area(),
            &format!("{} rolled {spec}. Results: {results}.", ctx.client.ooc_name()),
        );
    }
    ctx.log(&format!("Rolled {spec}."));
}

fn coinflip<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    let Ok(side) = args[0].parse::<Side>() else {
        ctx.reply("Invalid choice. Use: heads or tails.");
        return;
    };
    let name = ctx.client.ooc_name();
    let area = ctx.client.area();
    let flip = || if ctx.server.env().random_u64() % 2 == 0 { Side::Heads } else { Side::Tails };
    let call = ctx.server.events().coinflips().call(area, &name, side, ctx.server.now(), flip);

    match call {
        Call::Opened { replaced_expired } => {
            let prefix = if replaced_expired { "Previous coinflip expired. " } else { "" };
            ctx.server.area_message(
                area,
                &format!(
                    "{prefix}{name} has chosen {side} and is ready to coinflip! Type /coinflip {} to battle them!",
                    side.opposite()
                ),
            );
            ctx.server.area_log(ctx.client, "GAME", &format!("Started coinflip challenge with {side}"));
        },
        Call::OwnChallenge => ctx.reply("You cannot accept your own coinflip challenge!"),
        Call::SameSide(theirs) => ctx.reply(&format!(
            "You must pick the opposite choice! The challenger picked {theirs}, so you must pick {}.",
            theirs.opposite()
        )),
        Call::Flipped { challenger, challenger_side, result } => {
            let winner = if result == challenger_side { challenger.clone() } else { name.clone() };
            ctx.server.area_message(
                area,
                &format!(
                    "⚔️ COINFLIP BATTLE! {challenger} ({challenger_side}) vs {name} ({side}) - The coin landed on {result}! 🎉 {winner} WINS! 🎉"
                ),
            );
            ctx.server.area_log(
                ctx.client,
                "GAME",
                &format!("Coinflip battle: {challenger_side} vs {side} - Result: {result} - Winner: {winner}"),
            );
        },
    }
}

fn run_hot_potato<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    match args.first().map(|a| a.to_ascii_lowercase()) {
        None => hot_potato::start(ctx.server, ctx.client),
        Some(a) if a == "accept" => hot_potato::accept(ctx.server, ctx.client),
        Some(_) => ctx.reply(ctx.usage),
    }
}

fn run_giveaway<E: Environment>(ctx: &Ctx<'_, E>, args: &[String]) {
    match args[0].to_ascii_lowercase().as_str() {
        "start" => {
            let item = args[1..].join(" ");
            if item.trim().is_empty() {
                ctx.usage_error();
                return;
            }
            giveaway::start(ctx.server, ctx.client, &item);
        },
        "enter" => giveaway::enter(ctx.server, ctx.client),
        _ => ctx.reply(ctx.usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dice_specs() {
        assert_eq!(parse_dice("2d6"), Some((2, 6)));
        assert_eq!(parse_dice("1D20"), Some((1, 20)));
        assert_eq!(parse_dice("d6"), None);
        assert_eq!(parse_dice("2d"), None);
        assert_eq!(parse_dice("two"), None);
    }
}
