//! Cryptographic helpers shared by the resolver, keylist and table loaders

use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::{Address, Network, NetworkKind, PrivateKey};
use sha2::{Digest, Sha256};

use crate::error::{SignError, SignResult};
use crate::types::{AddressKind, SeedId};

/// First 8 hex digits (upper-case) of double SHA-256
pub fn checksum8(data: &[u8]) -> String {
    let digest = Sha256::digest(Sha256::digest(data));
    hex::encode(&digest[..4]).to_ascii_uppercase()
}

/// Seed ID for raw seed bytes
pub fn seed_id_for(seed: &[u8]) -> SeedId {
    SeedId::from_checksum(checksum8(seed))
}

/// Network whose bech32 prefix a key's SegWit address takes. `configured`
/// is used when it agrees with the key's own network kind.
pub fn segwit_network(key_kind: NetworkKind, configured: Network) -> Network {
    if NetworkKind::from(configured) == key_kind {
        return configured;
    }
    match key_kind {
        NetworkKind::Main => Network::Bitcoin,
        NetworkKind::Test => Network::Testnet,
    }
}

/// Encode the address for a private key
pub fn address_for_key(private_key: &PrivateKey, kind: AddressKind, network: Network) -> SignResult<String> {
    let secp = Secp256k1::signing_only();
    let public_key = private_key.public_key(&secp);
    match kind {
        AddressKind::Legacy => {
            Ok(Address::p2pkh(public_key.pubkey_hash(), private_key.network).to_string())
        }
        AddressKind::Segwit => {
            let compressed = CompressedPublicKey::try_from(public_key).map_err(|e| {
                SignError::invalid_private_key(format!("SegWit needs a compressed key: {}", e))
            })?;
            Ok(Address::p2wpkh(&compressed, segwit_network(private_key.network, network)).to_string())
        }
    }
}

/// Compute the address a WIF key spends from
pub fn wif_to_address(wif: &str, kind: AddressKind, network: Network) -> SignResult<String> {
    let private_key = PrivateKey::from_wif(wif)?;
    address_for_key(&private_key, kind, network)
}
