//! Size-bounded splitting of list payloads.

use crate::packet::Packet;

/// Split `items` into consecutive packets sharing `header`.
///
/// Greedy by arrival: items are appended to the open packet until the next
/// one would push its encoded size past `max_size`, then the packet is
/// sealed and a new one started. Items are never split, so concatenating the
/// fields of the returned packets in order reproduces `items` exactly.
///
/// A list that fits in `max_size` (including the empty list) yields exactly
/// one packet. An item too large to fit even in an otherwise empty packet is
/// emitted alone in its own oversize packet rather than dropped.
pub fn chunk_packets(header: &str, items: &[String], max_size: usize) -> Vec<Packet> {
    let base = Packet::new(header).encoded_len();

    let mut packets = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = base;

    for item in items {
        let cost = item.len() + 1;
        if !current.is_empty() && current_len + cost > max_size {
            packets.push(Packet::with_fields(header, std::mem::take(&mut current)));
            current_len = base;
        }
        current.push(item.clone());
        current_len += cost;
    }

    if !current.is_empty() || packets.is_empty() {
        packets.push(Packet::with_fields(header, current));
    }

    debug_assert!(!packets.is_empty());
    packets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn characters(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("Character_{i:04}")).collect()
    }

    fn music(count: usize) -> Vec<String> {
        let mut list = vec!["Courtroom 1, Courtroom 2, Courtroom 3".to_string()];
        list.extend((1..count).map(|i| format!("Ace Attorney/Music/[AA] Track {i:03}.opus")));
        list
    }

    const LIMIT: usize = 16 * 1024;

    fn item_count(packets: &[Packet]) -> usize {
        packets.iter().map(Packet::len).sum()
    }

    #[test]
    fn small_character_list_fits_in_one_packet() {
        let items = characters(50);
        let packets = chunk_packets("SC", &items, LIMIT);
        assert_eq!(packets.len(), 1);
        assert_eq!(item_count(&packets), 50);
    }

    #[test]
    fn large_character_list_is_chunked() {
        let items = characters(2600);
        let packets = chunk_packets("SC", &items, LIMIT);
        assert!(packets.len() > 1);
        assert_eq!(item_count(&packets), 2600);
        assert!(packets.iter().all(|p| p.encoded_len() <= LIMIT));
        assert!(packets.iter().all(|p| p.header() == "SC"));
    }

    #[test]
    fn typical_music_list_fits() {
        assert_eq!(chunk_packets("SM", &music(165), LIMIT).len(), 1);
    }

    #[test]
    fn very_large_music_list_is_chunked() {
        let items = music(1000);
        let packets = chunk_packets("SM", &items, LIMIT);
        assert!(packets.len() > 1);
        let joined: Vec<String> = packets.into_iter().flat_map(Packet::into_fields).collect();
        assert_eq!(joined, items);
    }

    #[test]
    fn empty_list_yields_one_empty_packet() {
        let packets = chunk_packets("SC", &[], LIMIT);
        assert_eq!(packets.len(), 1);
        assert!(packets[0].is_empty());
    }

    #[test]
    fn oversize_item_gets_its_own_packet() {
        let items = vec!["a".to_string(), "x".repeat(100), "b".to_string()];
        let packets = chunk_packets("SM", &items, 20);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[1].fields(), [items[1].clone()]);
    }
}
