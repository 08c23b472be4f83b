//! Slash command table and dispatch.
//!
//! OOC messages starting with `/` are split on whitespace; the first word
//! names the command and the rest are its arguments. Dispatch checks the
//! caller's permission, answers `-h` with the usage line, enforces the
//! minimum argument count and finally runs the handler.
//!
//! A command gated on [`Permissions::CM`] is also open to whoever is CM of
//! the caller's current area.

mod area;
mod moderation;
mod social;

use std::{borrow::Cow, collections::BTreeMap, sync::Arc};

use athena_core::{Area, Environment, Permissions, Uid};

use crate::{client::Client, server::Server};

/// Command handler.
pub type Handler<E> = fn(&Ctx<'_, E>, &[String]);

/// One table entry.
pub struct Command<E: Environment> {
    /// Name without the leading slash
    pub name: &'static str,
    /// Implementation
    pub handler: Handler<E>,
    /// Arguments required before the handler runs
    pub min_args: usize,
    /// Usage line shown for `-h` and missing arguments
    pub usage: Cow<'static, str>,
    /// One-line summary for `/help`
    pub description: &'static str,
    /// Required permission; `NONE` is open to everyone
    pub permission: Permissions,
}

/// Everything a handler gets to work with.
pub struct Ctx<'a, E: Environment> {
    /// Server context
    pub server: &'a Arc<Server<E>>,
    /// Caller
    pub client: &'a Arc<Client>,
    /// Command name as typed, lowercased
    pub name: &'a str,
    /// Usage line of the command
    pub usage: &'a str,
}

impl<E: Environment> Ctx<'_, E> {
    /// Server message to the caller.
    pub fn reply(&self, message: &str) {
        self.client.server_message(message);
    }

    /// "Not enough arguments" with the usage line.
    pub fn usage_error(&self) {
        self.reply(&format!("Not enough arguments.\n{}", self.usage));
    }

    /// Caller's current area.
    pub fn area(&self) -> Option<&Area> {
        self.server.area(self.client.area())
    }

    /// Caller's UID. Commands only reach joined clients.
    pub fn uid(&self) -> Uid {
        self.client.uid().unwrap_or_default()
    }

    /// True if the caller holds `perm`.
    pub fn has_perm(&self, perm: Permissions) -> bool {
        self.client.has_perm(perm)
    }

    /// True if the caller holds the CM permission or is CM of its area.
    pub fn is_cm(&self) -> bool {
        self.has_perm(Permissions::CM) || self.area().is_some_and(|a| a.is_cm(self.uid()))
    }

    /// Area log entry for the caller.
    pub fn log(&self, message: &str) {
        self.server.area_log(self.client, "CMD", message);
    }

    /// Area log entry that is also an audit event.
    pub fn audit(&self, message: &str) {
        self.server.audit(self.client, "CMD", message);
    }
}

/// Registered commands, ordered by name.
pub struct CommandTable<E: Environment> {
    commands: BTreeMap<&'static str, Command<E>>,
}

impl<E: Environment> Default for CommandTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Environment> CommandTable<E> {
    /// Table with every built-in command.
    pub fn new() -> Self {
        let mut table = Self { commands: BTreeMap::new() };
        area::register(&mut table);
        moderation::register(&mut table);
        social::register(&mut table);
        table
    }

    /// Add or replace a command.
    pub fn insert(&mut self, command: Command<E>) {
        self.commands.insert(command.name, command);
    }

    /// Register a command from its parts.
    fn add(
        &mut self,
        name: &'static str,
        handler: Handler<E>,
        min_args: usize,
        usage: impl Into<Cow<'static, str>>,
        description: &'static str,
        permission: Permissions,
    ) {
        self.insert(Command { name, handler, min_args, usage: usage.into(), description, permission });
    }

    /// Look up a command by name.
    pub fn get(&self, name: &str) -> Option<&Command<E>> {
        self.commands.get(name)
    }

    /// Every command in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Command<E>> {
        self.commands.values()
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// True if `client` may run a command requiring `permission`.
fn permitted<E: Environment>(server: &Server<E>, client: &Client, permission: Permissions) -> bool {
    if client.has_perm(permission) {
        return true;
    }
    permission == Permissions::CM
        && client.uid().is_some_and(|uid| server.area(client.area()).is_some_and(|a| a.is_cm(uid)))
}

/// Run the command in `line`, the OOC message with its leading `/`.
pub fn dispatch<E: Environment>(server: &Arc<Server<E>>, client: &Arc<Client>, line: &str) {
    let mut words = line.trim_start_matches('/').split_whitespace();
    let Some(name) = words.next() else {
        client.server_message("Invalid command.");
        return;
    };
    let name = name.to_ascii_lowercase();
    let args: Vec<String> = words.map(str::to_string).collect();

    if name == "help" {
        client.server_message(&help_text(server, client));
        return;
    }

    let Some(command) = server.commands().get(&name) else {
        client.server_message("Invalid command.");
        return;
    };
    if !permitted(server, client, command.permission) {
        client.server_message("You do not have permission to use that command.");
        return;
    }

    let ctx = Ctx { server, client, name: &name, usage: &command.usage };
    if args.iter().any(|a| a == "-h") {
        ctx.reply(&command.usage);
        return;
    }
    if args.len() < command.min_args {
        ctx.usage_error();
        return;
    }
    tracing::debug!("{} ran /{name}", client.ipid());
    (command.handler)(&ctx, &args);
}

fn help_text<E: Environment>(server: &Server<E>, client: &Client) -> String {
    let lines: Vec<String> = server
        .commands()
        .iter()
        .filter(|c| permitted(server, client, c.permission))
        .map(|c| format!("- /{}: {}", c.name, c.description))
        .collect();
    format!(
        "Recognized commands:\n{}\n\nTo view detailed usage on a command, do /<command> -h",
        lines.join("\n")
    )
}

// Argument helpers

/// Parsed leading flags.
///
/// Flags come before positional arguments, as `-x value`, `-x=value` or a
/// bare switch. Parsing stops at the first word that is not a known flag
/// or at `--`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Flags {
    values: BTreeMap<&'static str, String>,
    switches: Vec<&'static str>,
    rest: Vec<String>,
}

impl Flags {
    /// Parse `args`. `valued` flags take an argument; `switches` do not.
    /// Names are given without the dash.
    pub fn parse(args: &[String], valued: &[&'static str], switches: &[&'static str]) -> Self {
        let mut flags = Self::default();
        let mut i = 0;
        while i < args.len() {
            let word = &args[i];
            if word == "--" {
                i += 1;
                break;
            }
            let Some(body) = word.strip_prefix('-') else { break };
            let (key, inline) = match body.split_once('=') {
                Some((k, v)) => (k, Some(v.to_string())),
                None => (body, None),
            };
            if let Some(&name) = valued.iter().find(|&&v| v == key) {
                let value = match inline {
                    Some(v) => v,
                    None => {
                        i += 1;
                        match args.get(i) {
                            Some(v) => v.clone(),
                            None => break,
                        }
                    },
                };
                flags.values.insert(name, value);
            } else if let Some(&name) = switches.iter().find(|&&s| s == key) {
                flags.switches.push(name);
            } else {
                break;
            }
            i += 1;
        }
        flags.rest = args[i.min(args.len())..].to_vec();
        flags
    }

    /// Value of a valued flag.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// True if a switch was given.
    pub fn has(&self, name: &str) -> bool {
        self.switches.contains(&name)
    }

    /// Positional arguments after the flags.
    pub fn rest(&self) -> &[String] {
        &self.rest
    }
}

/// Joined clients named by a comma-separated UID list.
///
/// Unparseable and unknown UIDs are skipped; duplicates collapse.
pub fn uid_list<E: Environment>(server: &Server<E>, list: &str) -> Vec<Arc<Client>> {
    let mut seen = Vec::new();
    list.split(',')
        .filter_map(|s| s.trim().parse::<Uid>().ok())
        .filter(|uid| {
            let fresh = !seen.contains(uid);
            seen.push(*uid);
            fresh
        })
        .filter_map(|uid| server.client_by_uid(uid))
        .collect()
}

/// Joined clients whose IPID is in a comma-separated list.
pub fn ipid_list<E: Environment>(server: &Server<E>, list: &str) -> Vec<Arc<Client>> {
    let wanted: Vec<&str> = list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    server.clients().joined().into_iter().filter(|c| wanted.contains(&c.ipid())).collect()
}

/// `1, 4, 7` style list for logs.
pub fn report<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}
