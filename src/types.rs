//! Shared types for coldsign
//!
//! Identifiers, key material and address mappings that flow between the
//! resolver, the reconciler and the signing orchestrator.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::{SignError, SignResult};

// =============================================================================
// Seed ID
// =============================================================================

/// 8-character upper-case hex checksum identifying a seed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SeedId(String);

impl SeedId {
    pub const LEN: usize = 8;

    /// Wrap a freshly computed checksum (already upper-case hex)
    pub(crate) fn from_checksum(checksum: String) -> Self {
        debug_assert_eq!(checksum.len(), Self::LEN);
        SeedId(checksum)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SeedId {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SignError::parse_error(format!("Invalid Seed ID: '{}'", s)));
        }
        Ok(SeedId(s.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for SeedId {
    type Error = SignError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SeedId> for String {
    fn from(id: SeedId) -> String {
        id.0
    }
}

impl fmt::Display for SeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Derivation Identifier
// =============================================================================

/// `<seed-id>:<index>`, naming one deterministic key/address pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DerivationId {
    pub seed_id: SeedId,
    pub index: u32,
}

impl DerivationId {
    pub fn new(seed_id: SeedId, index: u32) -> Self {
        Self { seed_id, index }
    }
}

impl FromStr for DerivationId {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sid, idx) = s
            .split_once(':')
            .ok_or_else(|| SignError::parse_error(format!("Invalid derivation identifier: '{}'", s)))?;
        let index: u32 = idx
            .parse()
            .map_err(|_| SignError::parse_error(format!("Invalid address index in '{}'", s)))?;
        if index == 0 {
            return Err(SignError::parse_error(format!("Address index must be non-zero: '{}'", s)));
        }
        Ok(DerivationId {
            seed_id: sid.parse()?,
            index,
        })
    }
}

impl TryFrom<String> for DerivationId {
    type Error = SignError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DerivationId> for String {
    fn from(id: DerivationId) -> String {
        id.to_string()
    }
}

impl fmt::Display for DerivationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.seed_id, self.index)
    }
}

// =============================================================================
// Private keys
// =============================================================================

/// WIF-encoded private key. Zeroized on drop, never printed.
#[derive(Clone)]
pub struct WifKey(Zeroizing<String>);

impl WifKey {
    pub fn new(wif: impl Into<String>) -> Self {
        WifKey(Zeroizing::new(wif.into()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for WifKey {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for WifKey {}

impl std::hash::Hash for WifKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

impl fmt::Debug for WifKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WifKey([REDACTED])")
    }
}

impl<'de> Deserialize<'de> for WifKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(WifKey::new)
    }
}

/// Address encoding used when turning a key into an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AddressKind {
    /// P2PKH (`1...` / `m...`)
    #[default]
    Legacy,
    /// Native SegWit P2WPKH (`bc1q...`)
    Segwit,
}

// =============================================================================
// Provenance
// =============================================================================

/// Where a piece of key material came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    KeyAddressTable,
    Seed,
    Keylist,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::KeyAddressTable => write!(f, "key-address file"),
            KeySource::Seed => write!(f, "seed"),
            KeySource::Keylist => write!(f, "keylist"),
        }
    }
}

/// Trust level of an address mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingSource {
    /// As stated in the transaction file
    Claimed,
    /// Confirmed through the key-address table
    TableVerified,
    /// Confirmed by re-deriving from a seed
    SeedVerified,
}

impl MappingSource {
    /// Label used in mismatch diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            MappingSource::Claimed => "tx file:",
            MappingSource::TableVerified => "key-address file:",
            MappingSource::SeedVerified => "generated seed:",
        }
    }
}

/// A private key bound to exactly one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub address: String,
    pub wif: WifKey,
    pub source: KeySource,
}

impl KeyMaterial {
    pub fn new(address: impl Into<String>, wif: WifKey, source: KeySource) -> Self {
        Self {
            address: address.into(),
            wif,
            source,
        }
    }
}

// =============================================================================
// Key set
// =============================================================================

/// Keys handed to the signer, at most one per address
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    by_address: BTreeMap<String, KeyMaterial>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key. Returns `false` if the address already had one.
    pub fn insert(&mut self, key: KeyMaterial) -> bool {
        if self.by_address.contains_key(&key.address) {
            return false;
        }
        self.by_address.insert(key.address.clone(), key);
        true
    }

    /// Insert many keys, returning how many were duplicates
    pub fn extend(&mut self, keys: impl IntoIterator<Item = KeyMaterial>) -> usize {
        let mut duplicates = 0;
        for key in keys {
            if !self.insert(key) {
                duplicates += 1;
            }
        }
        duplicates
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

    pub fn iter(&self) -> impl Iterator<Item = &KeyMaterial> {
        self.by_address.values()
    }

    /// WIF keys in address order
    pub fn wifs(&self) -> Vec<WifKey> {
        self.by_address.values().map(|k| k.wif.clone()).collect()
    }

    pub fn count_from(&self, source: KeySource) -> usize {
        self.by_address.values().filter(|k| k.source == source).count()
    }
}

// =============================================================================
// Address maps
// =============================================================================

/// Which side of the transaction a map describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapSide {
    Input,
    Output,
}

impl MapSide {
    /// Only inputs surface private keys; outputs are verification-only
    pub fn yields_keys(&self) -> bool {
        matches!(self, MapSide::Input)
    }
}

impl fmt::Display for MapSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapSide::Input => write!(f, "input"),
            MapSide::Output => write!(f, "output"),
        }
    }
}

/// Claimed derivation-identifier → address mappings still awaiting verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressMap {
    side: MapSide,
    claimed: BTreeMap<DerivationId, String>,
}

impl AddressMap {
    pub fn new(side: MapSide) -> Self {
        Self {
            side,
            claimed: BTreeMap::new(),
        }
    }

    /// Build from (identifier, address) pairs. The same identifier claimed
    /// with two different addresses is an integrity violation.
    pub fn from_pairs<I>(side: MapSide, pairs: I) -> SignResult<Self>
    where
        I: IntoIterator<Item = (DerivationId, String)>,
    {
        let mut map = Self::new(side);
        for (id, address) in pairs {
            if let Some(existing) = map.claimed.get(&id) {
                if *existing != address {
                    return Err(mismatch_error(
                        MappingSource::Claimed,
                        &id,
                        existing,
                        MappingSource::Claimed,
                        &id,
                        &address,
                    ));
                }
                continue;
            }
            map.claimed.insert(id, address);
        }
        Ok(map)
    }

    pub fn side(&self) -> MapSide {
        self.side
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    pub fn get(&self, id: &DerivationId) -> Option<&str> {
        self.claimed.get(id).map(String::as_str)
    }

    pub fn remove(&mut self, id: &DerivationId) -> Option<String> {
        self.claimed.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &DerivationId> {
        self.claimed.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DerivationId, &str)> {
        self.claimed.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn seed_ids(&self) -> std::collections::BTreeSet<SeedId> {
        self.claimed.keys().map(|id| id.seed_id.clone()).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.claimed.clear();
    }
}

/// Build the diagnostic for two sources disagreeing on a mapping
pub fn mismatch_error(
    left: MappingSource,
    left_id: &DerivationId,
    left_addr: &str,
    right: MappingSource,
    right_id: &DerivationId,
    right_addr: &str,
) -> SignError {
    SignError::mapping_mismatch("Seed-derived -> BTC address mappings differ!").with_details(format!(
        "From {:<18} {} -> {}; From {:<18} {} -> {}",
        left.label(),
        left_id,
        left_addr,
        right.label(),
        right_id,
        right_addr
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid() -> SeedId {
        "abcd1234".parse().unwrap()
    }

    #[test]
    fn test_seed_id_normalizes_case() {
        assert_eq!(sid().as_str(), "ABCD1234");
        assert!("ABCD123".parse::<SeedId>().is_err());
        assert!("ABCD123Z".parse::<SeedId>().is_err());
    }

    #[test]
    fn test_derivation_id_parse_and_display() {
        let id: DerivationId = "ABCD1234:17".parse().unwrap();
        assert_eq!(id.index, 17);
        assert_eq!(id.to_string(), "ABCD1234:17");
        assert!("ABCD1234:0".parse::<DerivationId>().is_err());
        assert!("ABCD1234".parse::<DerivationId>().is_err());
        assert!("ABCD1234:x".parse::<DerivationId>().is_err());
    }

    #[test]
    fn test_derivation_id_serde_as_string() {
        let id = DerivationId::new(sid(), 3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"ABCD1234:3\"");
        let back: DerivationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_derivation_ids_sort_by_seed_then_index() {
        let mut ids = vec![
            DerivationId::new("FFFF0000".parse().unwrap(), 1),
            DerivationId::new(sid(), 10),
            DerivationId::new(sid(), 2),
        ];
        ids.sort();
        assert_eq!(ids[0].to_string(), "ABCD1234:2");
        assert_eq!(ids[1].to_string(), "ABCD1234:10");
        assert_eq!(ids[2].to_string(), "FFFF0000:1");
    }

    #[test]
    fn test_wif_debug_is_redacted() {
        let key = WifKey::new("KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn");
        assert_eq!(format!("{:?}", key), "WifKey([REDACTED])");
    }

    #[test]
    fn test_key_set_keeps_one_key_per_address() {
        let mut keys = KeySet::new();
        assert!(keys.insert(KeyMaterial::new("1A", WifKey::new("k1"), KeySource::KeyAddressTable)));
        assert!(!keys.insert(KeyMaterial::new("1A", WifKey::new("k1"), KeySource::Keylist)));
        assert!(keys.insert(KeyMaterial::new("1B", WifKey::new("k2"), KeySource::Keylist)));
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.count_from(KeySource::KeyAddressTable), 1);
    }

    #[test]
    fn test_address_map_rejects_conflicting_claims() {
        let id = DerivationId::new(sid(), 1);
        let err = AddressMap::from_pairs(
            MapSide::Output,
            vec![(id.clone(), "1A".to_string()), (id, "1B".to_string())],
        )
        .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::AddressMappingMismatch);
    }

    #[test]
    fn test_address_map_collapses_repeated_claims() {
        let id = DerivationId::new(sid(), 1);
        let map = AddressMap::from_pairs(
            MapSide::Input,
            vec![(id.clone(), "1A".to_string()), (id, "1A".to_string())],
        )
        .unwrap();
        assert_eq!(map.len(), 1);
    }
}
