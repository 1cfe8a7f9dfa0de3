//! Key-Address Tables
//!
//! A key-address table is the companion file produced when keys for one
//! seed were generated earlier: (index, address, comment, key) rows for a
//! single Seed ID. Its checksum is shown to the operator so it can be
//! compared with the one recorded when the table was audited.

use bitcoin::Network;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{SignError, SignResult};
use crate::types::{mismatch_error, AddressKind, DerivationId, MappingSource, SeedId, WifKey};
use crate::utils::crypto::{checksum8, wif_to_address};
use crate::{log_debug, log_info};

const MODULE: &str = "coldsign::key_address";

#[derive(Debug, Deserialize)]
struct TableFile {
    seed_id: SeedId,
    #[serde(default)]
    checksum: Option<String>,
    entries: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    index: u32,
    address: String,
    #[serde(default)]
    comment: String,
    wif: WifKey,
}

/// One row of a key-address table
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub address: String,
    pub comment: String,
    pub wif: WifKey,
}

/// Verified identifier → (address, key) table for one seed
#[derive(Debug, Clone)]
pub struct KeyAddressTable {
    seed_id: SeedId,
    checksum: String,
    entries: BTreeMap<DerivationId, TableEntry>,
}

impl KeyAddressTable {
    /// Load and verify a table file
    pub fn load(path: &Path, kind: AddressKind, network: Network) -> SignResult<Self> {
        let text = zeroize::Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            SignError::missing_input(format!(
                "Cannot read key-address file '{}': {}",
                path.display(),
                e
            ))
        })?);
        let table = Self::parse(&text, kind, network)?;
        log_info!(
            MODULE,
            format!(
                "Found {} key{} for Seed ID {}",
                table.len(),
                if table.len() == 1 { "" } else { "s" },
                table.seed_id
            ),
            checksum = table.checksum
        );
        Ok(table)
    }

    /// Parse table JSON. Every row's key must produce the row's address, and
    /// a checksum carried by the file must match the rows.
    pub fn parse(text: &str, kind: AddressKind, network: Network) -> SignResult<Self> {
        let file: TableFile = serde_json::from_str(text)
            .map_err(|e| SignError::parse_error(format!("Invalid key-address file: {}", e)))?;

        let mut entries = BTreeMap::new();
        for row in file.entries {
            if row.index == 0 {
                return Err(SignError::parse_error("Key-address file contains index 0"));
            }
            let id = DerivationId::new(file.seed_id.clone(), row.index);
            let computed = wif_to_address(row.wif.as_str(), kind, network)?;
            if computed != row.address {
                return Err(mismatch_error(
                    MappingSource::TableVerified,
                    &id,
                    &row.address,
                    MappingSource::SeedVerified,
                    &id,
                    &computed,
                )
                .with_details(format!("key for {} does not produce its listed address", id)));
            }
            let entry = TableEntry {
                address: row.address,
                comment: row.comment,
                wif: row.wif,
            };
            if entries.insert(id.clone(), entry).is_some() {
                return Err(SignError::parse_error(format!(
                    "Duplicate entry {} in key-address file",
                    id
                )));
            }
        }

        let checksum = table_checksum(&entries);
        if let Some(recorded) = file.checksum {
            if !recorded.eq_ignore_ascii_case(&checksum) {
                return Err(SignError::checksum_mismatch("Key-address file checksum mismatch")
                    .with_details(format!("file says {}, rows give {}", recorded, checksum)));
            }
            log_debug!(MODULE, "Key-address file checksum verified", checksum = checksum);
        }

        Ok(Self {
            seed_id: file.seed_id,
            checksum,
            entries,
        })
    }

    pub fn seed_id(&self) -> &SeedId {
        &self.seed_id
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &DerivationId) -> Option<&TableEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DerivationId, &TableEntry)> {
        self.entries.iter()
    }
}

/// Checksum over the `<id> <address>` rows in identifier order
pub fn table_checksum(entries: &BTreeMap<DerivationId, TableEntry>) -> String {
    let rows: String = entries
        .iter()
        .map(|(id, entry)| format!("{} {}\n", id, entry.address))
        .collect();
    checksum8(rows.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::wallet::{AddressGenerator, Bip32AddressGenerator, Seed};
    use std::collections::BTreeSet;

    fn table_json(checksum: Option<&str>, tamper: bool) -> (String, SeedId) {
        let seed = Seed::from_bytes(vec![9u8; 16]).unwrap();
        let indices: BTreeSet<u32> = [1, 2].into_iter().collect();
        let keys = Bip32AddressGenerator::default().generate(&seed, &indices).unwrap();
        let entries: Vec<_> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                let address = if tamper && i == 1 { keys[0].address.clone() } else { k.address.clone() };
                serde_json::json!({
                    "index": k.index,
                    "address": address,
                    "comment": "",
                    "wif": k.wif.as_str(),
                })
            })
            .collect();
        let mut doc = serde_json::json!({ "seed_id": seed.id().as_str(), "entries": entries });
        if let Some(c) = checksum {
            doc["checksum"] = serde_json::json!(c);
        }
        (doc.to_string(), seed.id().clone())
    }

    #[test]
    fn test_parse_valid_table() {
        let (json, seed_id) = table_json(None, false);
        let table = KeyAddressTable::parse(&json, AddressKind::Legacy, Network::Bitcoin).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.seed_id(), &seed_id);
        assert!(table.get(&DerivationId::new(seed_id.clone(), 2)).is_some());
        assert!(table.get(&DerivationId::new(seed_id, 3)).is_none());
        assert_eq!(table.checksum().len(), 8);
    }

    #[test]
    fn test_recorded_checksum_is_verified() {
        let (json, _) = table_json(None, false);
        let checksum = KeyAddressTable::parse(&json, AddressKind::Legacy, Network::Bitcoin)
            .unwrap()
            .checksum()
            .to_string();

        let (good, _) = table_json(Some(&checksum.to_lowercase()), false);
        assert!(KeyAddressTable::parse(&good, AddressKind::Legacy, Network::Bitcoin).is_ok());

        let (bad, _) = table_json(Some("00000000"), false);
        let err = KeyAddressTable::parse(&bad, AddressKind::Legacy, Network::Bitcoin).unwrap_err();
        assert_eq!(err.code, ErrorCode::ChecksumMismatch);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_row_with_foreign_address_is_rejected() {
        let (json, _) = table_json(None, true);
        let err = KeyAddressTable::parse(&json, AddressKind::Legacy, Network::Bitcoin).unwrap_err();
        assert_eq!(err.code, ErrorCode::AddressMappingMismatch);
    }
}
