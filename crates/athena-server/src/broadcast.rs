//! Fan-out of packets to the right audience.
//!
//! Every bulk send iterates a registry snapshot, never the live map, and
//! unjoined clients are never addressed.

use athena_core::{Environment, Permissions, Uid};
use athena_proto::Packet;

use crate::{client::Client, server::Server};

/// Area status update kinds carried by `ARUP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArupKind {
    /// Player count per area
    Players,
    /// Status per area
    Status,
    /// CM roster per area
    Cm,
    /// Lock state per area
    Lock,
}

impl ArupKind {
    fn wire(self) -> &'static str {
        match self {
            Self::Players => "0",
            Self::Status => "1",
            Self::Cm => "2",
            Self::Lock => "3",
        }
    }
}

/// Player list fields carried by `PU`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerField {
    /// OOC name
    OocName,
    /// Character name
    Character,
    /// Showname
    Showname,
    /// Area index
    Area,
}

impl PlayerField {
    const ALL: [Self; 4] = [Self::OocName, Self::Character, Self::Showname, Self::Area];

    fn wire(self) -> &'static str {
        match self {
            Self::OocName => "0",
            Self::Character => "1",
            Self::Showname => "2",
            Self::Area => "3",
        }
    }
}

impl<E: Environment> Server<E> {
    /// Send to every joined client.
    pub fn send_to_all(&self, packet: &Packet) {
        let text = packet.encode();
        for client in self.clients().joined() {
            client.send_raw(text.clone());
        }
    }

    /// Send to every joined client in `area`.
    pub fn send_to_area(&self, area: usize, packet: &Packet) {
        let text = packet.encode();
        for client in self.clients().in_area(area) {
            client.send_raw(text.clone());
        }
    }

    /// Send to joined clients holding `perm`.
    pub fn send_to_moderators(&self, perm: Permissions, packet: &Packet) {
        let text = packet.encode();
        for client in self.clients().joined() {
            if client.is_authenticated() && client.has_perm(perm) {
                client.send_raw(text.clone());
            }
        }
    }

    /// Server OOC message to one area.
    pub fn area_message(&self, area: usize, message: &str) {
        self.send_to_area(area, &self.server_ct(message));
    }

    /// Server OOC message to everyone.
    pub fn global_message(&self, message: &str) {
        self.send_to_all(&self.server_ct(message));
    }

    fn server_ct(&self, message: &str) -> Packet {
        Packet::new("CT").push_text(self.name()).push_text(message).field("1")
    }

    // Area status

    /// Build an `ARUP` packet of `kind`.
    pub fn arup_packet(&self, kind: ArupKind) -> Packet {
        let values = self.areas().iter().map(|area| match kind {
            ArupKind::Players => area.players().to_string(),
            ArupKind::Status => area.status().to_string(),
            ArupKind::Lock => area.lock_state().to_string(),
            ArupKind::Cm => {
                let cms: Vec<String> = area
                    .cms()
                    .into_iter()
                    .filter_map(|uid| {
                        let cm = self.client_by_uid(uid)?;
                        Some(format!("{} ({uid})", self.display_name(&cm)))
                    })
                    .collect();
                if cms.is_empty() { "FREE".to_string() } else { athena_proto::escape(&cms.join(", ")) }
            },
        });
        Packet::new("ARUP").field(kind.wire()).extend_fields(values)
    }

    /// Broadcast one `ARUP` kind to everyone.
    pub fn send_arup(&self, kind: ArupKind) {
        self.send_to_all(&self.arup_packet(kind));
    }

    // Player list

    fn player_field_packet(&self, client: &Client, uid: Uid, field: PlayerField) -> Packet {
        let value = match field {
            PlayerField::OocName => client.ooc_name(),
            PlayerField::Character => self.display_name(client),
            PlayerField::Showname => client.showname(),
            PlayerField::Area => client.area().to_string(),
        };
        Packet::new("PU").field(uid.to_string()).field(field.wire()).push_text(&value)
    }

    /// Announce a newly joined client to everyone, with all its fields.
    pub fn player_list_add(&self, client: &Client) {
        let Some(uid) = client.uid() else { return };
        self.send_to_all(&Packet::new("PR").field(uid.to_string()).field("0"));
        for field in PlayerField::ALL {
            self.send_to_all(&self.player_field_packet(client, uid, field));
        }
    }

    /// Broadcast one changed field of a client.
    pub fn player_list_update(&self, client: &Client, field: PlayerField) {
        if let Some(uid) = client.uid() {
            self.send_to_all(&self.player_field_packet(client, uid, field));
        }
    }

    /// Announce a departure.
    pub fn player_list_remove(&self, uid: Uid) {
        self.send_to_all(&Packet::new("PR").field(uid.to_string()).field("1"));
    }

    /// Send every other joined client's player list entry to `to`.
    pub fn send_player_list(&self, to: &Client) {
        for other in self.clients().joined() {
            if other.id() == to.id() {
                continue;
            }
            let Some(uid) = other.uid() else { continue };
            to.send(&Packet::new("PR").field(uid.to_string()).field("0"));
            for field in PlayerField::ALL {
                to.send(&self.player_field_packet(&other, uid, field));
            }
        }
    }
}
