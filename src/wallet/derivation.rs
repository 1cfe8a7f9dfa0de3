//! Key Derivation
//!
//! Turns (Seed ID, index) identifiers into address/key pairs. The derivation
//! itself sits behind `AddressGenerator`; `KeyDeriver` groups identifiers by
//! seed, resolves each seed once and reassembles the results.
//!
//! The same (seed, index) must always produce the same (address, key): that
//! is what makes a key-address table audited earlier interchangeable with
//! the live seed.

use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::secp256k1::Secp256k1;
use bitcoin::Network;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::SignResult;
use crate::types::{AddressKind, DerivationId, SeedId, WifKey};
use crate::utils::crypto::address_for_key;
use crate::utils::SigningSession;
use crate::log_debug;

use super::seed::{Seed, SeedResolver};

const MODULE: &str = "coldsign::derivation";

/// One generated key for an index under some seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKey {
    pub index: u32,
    pub address: String,
    pub wif: WifKey,
}

/// One derived key, reassembled with its full identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub id: DerivationId,
    pub address: String,
    pub wif: WifKey,
}

/// Deterministic seed → (address, key) derivation
pub trait AddressGenerator {
    fn generate(&self, seed: &Seed, indices: &BTreeSet<u32>) -> SignResult<Vec<GeneratedKey>>;
}

/// BIP32 derivation at `m/0'/0'/<index>'`
#[derive(Debug, Clone, Copy)]
pub struct Bip32AddressGenerator {
    pub network: Network,
    pub kind: AddressKind,
}

impl Bip32AddressGenerator {
    pub fn new(network: Network, kind: AddressKind) -> Self {
        Self { network, kind }
    }

    fn path_for(index: u32) -> SignResult<DerivationPath> {
        Ok(DerivationPath::from(vec![
            ChildNumber::from_hardened_idx(0)?,
            ChildNumber::from_hardened_idx(0)?,
            ChildNumber::from_hardened_idx(index)?,
        ]))
    }
}

impl Default for Bip32AddressGenerator {
    fn default() -> Self {
        Self::new(Network::Bitcoin, AddressKind::Legacy)
    }
}

impl AddressGenerator for Bip32AddressGenerator {
    fn generate(&self, seed: &Seed, indices: &BTreeSet<u32>) -> SignResult<Vec<GeneratedKey>> {
        let secp = Secp256k1::new();
        let master = Xpriv::new_master(self.network, seed.as_bytes())?;

        indices
            .iter()
            .map(|&index| {
                let child = master.derive_priv(&secp, &Self::path_for(index)?)?;
                let private_key = child.to_priv();
                Ok(GeneratedKey {
                    index,
                    address: address_for_key(&private_key, self.kind, self.network)?,
                    wif: WifKey::new(private_key.to_wif()),
                })
            })
            .collect()
    }
}

/// Derives keys for sets of identifiers, resolving seeds as needed
pub struct KeyDeriver<'a> {
    resolver: SeedResolver<'a>,
    generator: &'a dyn AddressGenerator,
}

impl<'a> KeyDeriver<'a> {
    pub fn new(resolver: SeedResolver<'a>, generator: &'a dyn AddressGenerator) -> Self {
        Self { resolver, generator }
    }

    /// Derive (identifier, address, key) for every identifier in `ids`
    pub fn derive(
        &self,
        ids: &BTreeSet<DerivationId>,
        session: &mut SigningSession,
    ) -> SignResult<Vec<DerivedKey>> {
        let mut by_seed: BTreeMap<&SeedId, BTreeSet<u32>> = BTreeMap::new();
        for id in ids {
            by_seed.entry(&id.seed_id).or_default().insert(id.index);
        }

        if !by_seed.is_empty() {
            let needed = by_seed.keys().map(|s| s.as_str()).collect::<Vec<_>>().join(" ");
            log_debug!(MODULE, format!("Need seed(s): {}", needed));
        }

        let mut derived = Vec::with_capacity(ids.len());
        for (seed_id, indices) in by_seed {
            let seed = self.resolver.resolve(seed_id, session)?;
            let generated = self.generator.generate(seed, &indices)?;
            derived.extend(generated.into_iter().map(|g| DerivedKey {
                id: DerivationId::new(seed_id.clone(), g.index),
                address: g.address,
                wif: g.wif,
            }));
        }
        Ok(derived)
    }
}
