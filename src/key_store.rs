//! Mutable set of link keys and network keys, learned from observed
//! Transport-Key commands (spec §3/§4.J). Duplicates are tolerated: this is
//! an append-only list, not a set.

/// The well-known Zigbee public link key `5A6967426565416C6C69616E636530 39`
/// ("ZigBeeAlliance09"), seeded as index 0.
pub const PUBLIC_LINK_KEY: [u8; 16] = *b"ZigBeeAlliance09";

#[derive(Debug, Clone)]
pub struct KeyStore {
    pub link_keys: Vec<[u8; 16]>,
    pub nwk_keys: Vec<[u8; 16]>,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore {
    pub fn new() -> Self {
        Self {
            link_keys: vec![PUBLIC_LINK_KEY],
            nwk_keys: Vec::new(),
        }
    }

    /// Transport-Key byte[1]: `0x01` selects the network-key store, `0x04`
    /// the link-key store (spec §4.I "Transport-Key extraction").
    pub fn learn(&mut self, store_selector: u8, key: [u8; 16]) {
        match store_selector {
            0x01 => self.nwk_keys.push(key),
            0x04 => self.link_keys.push(key),
            _ => {}
        }
    }

    /// Render as the `{keys_path}.txt` format from spec §6 "Persisted state".
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Link Keys:\n");
        for (i, key) in self.link_keys.iter().enumerate().skip(1) {
            out.push_str(&format!("{} {}\n", i, hex_spaced(key)));
        }
        out.push_str("Network Keys:\n");
        for key in &self.nwk_keys {
            out.push_str(&hex_spaced(key));
            out.push('\n');
        }
        out
    }
}

fn hex_spaced(key: &[u8; 16]) -> String {
    key.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_with_public_link_key() {
        let store = KeyStore::new();
        assert_eq!(store.link_keys.len(), 1);
        assert_eq!(store.link_keys[0], PUBLIC_LINK_KEY);
        assert!(store.nwk_keys.is_empty());
    }

    #[test]
    fn learn_appends_to_the_right_store() {
        let mut store = KeyStore::new();
        store.learn(0x01, [1; 16]);
        store.learn(0x04, [2; 16]);
        store.learn(0x01, [1; 16]); // duplicates tolerated
        assert_eq!(store.nwk_keys, vec![[1; 16], [1; 16]]);
        assert_eq!(store.link_keys, vec![PUBLIC_LINK_KEY, [2; 16]]);
    }
}
