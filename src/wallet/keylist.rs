//! Keylist Matching
//!
//! A keylist is a user file of plain WIF keys, one per line, used to sign
//! inputs that carry no derivation identifier. Each key is recomputed to its
//! address so inputs can be matched by address alone.

use bitcoin::Network;
use secrecy::SecretString;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{SignError, SignResult};
use crate::types::{AddressKind, KeyMaterial, KeySource, WifKey};
use crate::utils::crypto::wif_to_address;
use crate::utils::encryption::decrypt_maybe;
use crate::{log_debug, log_info};

const MODULE: &str = "coldsign::keylist";

/// Address → key index built from a keylist file
#[derive(Debug, Clone, Default)]
pub struct Keylist {
    by_address: HashMap<String, WifKey>,
}

impl Keylist {
    /// Read, decrypt if needed, and parse a keylist file
    pub fn load<F>(
        path: &Path,
        passphrase: F,
        known_keys: &HashSet<WifKey>,
        kind: AddressKind,
        network: Network,
    ) -> SignResult<Self>
    where
        F: FnOnce() -> SignResult<SecretString>,
    {
        let data = zeroize::Zeroizing::new(fs::read(path).map_err(|e| {
            SignError::missing_input(format!("Cannot read keylist '{}': {}", path.display(), e))
        })?);
        let desc = format!("Keylist '{}'", path.display());
        let text = decrypt_maybe(&data, &desc, passphrase)?;
        Self::parse(&text, known_keys, kind, network)
    }

    /// Parse keylist text. Only the first whitespace-delimited token of each
    /// line is read. Keys in `known_keys` are dropped.
    pub fn parse(
        text: &str,
        known_keys: &HashSet<WifKey>,
        kind: AddressKind,
        network: Network,
    ) -> SignResult<Self> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for token in text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_whitespace().next())
        {
            let key = WifKey::new(token);
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }

        let before = keys.len();
        keys.retain(|k| !known_keys.contains(k));
        let dropped = before - keys.len();
        if dropped > 0 {
            log_info!(
                MODULE,
                format!(
                    "Removed {} key{} from keylist (found in key-address file)",
                    dropped,
                    if dropped == 1 { "" } else { "s" }
                )
            );
        }

        let mut by_address = HashMap::with_capacity(keys.len());
        for (line, key) in keys.into_iter().enumerate() {
            let address = wif_to_address(key.as_str(), kind, network)
                .map_err(|e| e.with_details(format!("keylist entry #{}", line + 1)))?;
            by_address.insert(address, key);
        }
        log_debug!(MODULE, "Keylist loaded", keys = by_address.len());

        Ok(Self { by_address })
    }

    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.by_address.contains_key(address)
    }

    /// Split `required` into addresses this keylist has keys for and those
    /// it doesn't. The keylist itself is left intact for later transactions.
    pub fn match_addresses(&self, required: &BTreeSet<String>) -> (Vec<KeyMaterial>, BTreeSet<String>) {
        let mut matched = Vec::new();
        let mut remaining = BTreeSet::new();
        for address in required {
            match self.by_address.get(address) {
                Some(wif) => matched.push(KeyMaterial::new(address.clone(), wif.clone(), KeySource::Keylist)),
                None => {
                    remaining.insert(address.clone());
                }
            }
        }
        (matched, remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const WIF_ONE: &str = "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn";
    const ADDR_ONE: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";

    #[test]
    fn test_parse_skips_comments_and_trailing_tokens() {
        let text = format!("# my keys\n\n  {} some note\n{}\n", WIF_ONE, WIF_ONE);
        let keylist = Keylist::parse(&text, &HashSet::new(), AddressKind::Legacy, Network::Bitcoin).unwrap();
        assert_eq!(keylist.len(), 1);
        assert!(keylist.contains_address(ADDR_ONE));
    }

    #[test]
    fn test_known_keys_are_dropped() {
        let known: HashSet<WifKey> = [WifKey::new(WIF_ONE)].into_iter().collect();
        let keylist = Keylist::parse(WIF_ONE, &known, AddressKind::Legacy, Network::Bitcoin).unwrap();
        assert!(keylist.is_empty());
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let err =
            Keylist::parse("not-a-key", &HashSet::new(), AddressKind::Legacy, Network::Bitcoin).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPrivateKey);
    }

    #[test]
    fn test_match_splits_required_addresses() {
        let keylist = Keylist::parse(WIF_ONE, &HashSet::new(), AddressKind::Legacy, Network::Bitcoin).unwrap();
        let required: BTreeSet<String> = [ADDR_ONE.to_string(), "1OtherAddress".to_string()]
            .into_iter()
            .collect();

        let (matched, remaining) = keylist.match_addresses(&required);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].address, ADDR_ONE);
        assert_eq!(matched[0].source, KeySource::Keylist);
        assert_eq!(remaining.into_iter().collect::<Vec<_>>(), vec!["1OtherAddress"]);

        // Matching does not consume the keylist
        assert!(keylist.contains_address(ADDR_ONE));
    }

    #[test]
    fn test_plaintext_file_never_asks_for_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        fs::write(&path, WIF_ONE).unwrap();
        let keylist = Keylist::load(
            &path,
            || panic!("passphrase requested for plaintext keylist"),
            &HashSet::new(),
            AddressKind::Legacy,
            Network::Bitcoin,
        )
        .unwrap();
        assert_eq!(keylist.len(), 1);
    }

    #[test]
    fn test_encrypted_keylist() {
        use crate::utils::encryption::{encrypt_with_params, KdfParams};

        let params = KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        };
        let container =
            encrypt_with_params(WIF_ONE.as_bytes(), &SecretString::from("pw".to_string()), params).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.enc");
        fs::write(&path, serde_json::to_vec(&container).unwrap()).unwrap();

        let keylist = Keylist::load(
            &path,
            || Ok(SecretString::from("pw".to_string())),
            &HashSet::new(),
            AddressKind::Legacy,
            Network::Bitcoin,
        )
        .unwrap();
        assert!(keylist.contains_address(ADDR_ONE));

        let err = Keylist::load(
            &path,
            || Ok(SecretString::from("nope".to_string())),
            &HashSet::new(),
            AddressKind::Legacy,
            Network::Bitcoin,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DecryptionFailed);
    }
}
