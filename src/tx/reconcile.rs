//! Address Map Reconciliation
//!
//! Every identifier → address claim in a transaction must be confirmed by
//! an independent source before signing. Claims are checked first against
//! the key-address table and then, for whatever is left, against addresses
//! re-derived from the seeds. Confirmed claims are removed from the map, so
//! an empty map means every claim has been verified.
//!
//! Only the input side yields keys. Output claims are checked the same way
//! but the keys are discarded.

use std::collections::BTreeSet;

use crate::error::{SignError, SignResult};
use crate::types::{mismatch_error, AddressMap, DerivationId, KeyMaterial, KeySource, MappingSource};
use crate::utils::SigningSession;
use crate::wallet::{KeyAddressTable, KeyDeriver};
use crate::{log_debug, log_info};

const MODULE: &str = "coldsign::reconcile";

fn plural(n: usize, one: &'static str, many: &'static str) -> &'static str {
    if n == 1 {
        one
    } else {
        many
    }
}

/// Stage A: confirm claims that the key-address table covers
pub fn check_against_table(
    map: &mut AddressMap,
    table: Option<&KeyAddressTable>,
) -> SignResult<Vec<KeyMaterial>> {
    let table = match table {
        Some(t) => t,
        None => return Ok(Vec::new()),
    };
    log_info!(
        MODULE,
        format!(
            "Checking seed-derived -> BTC address mappings for {}s (from key-address file)",
            map.side()
        )
    );

    let covered: Vec<DerivationId> = map.ids().filter(|id| table.get(id).is_some()).cloned().collect();
    let removed = covered.len();
    let mut keys = Vec::new();
    for id in covered {
        let (Some(entry), Some(claimed)) = (table.get(&id), map.get(&id)) else {
            continue;
        };
        if entry.address != claimed {
            return Err(mismatch_error(
                MappingSource::TableVerified,
                &id,
                &entry.address,
                MappingSource::Claimed,
                &id,
                claimed,
            ));
        }
        map.remove(&id);
        if map.side().yields_keys() {
            keys.push(KeyMaterial::new(
                entry.address.clone(),
                entry.wif.clone(),
                KeySource::KeyAddressTable,
            ));
        }
    }

    if removed > 0 {
        log_debug!(
            MODULE,
            format!(
                "Removed {} address{} from {}s map",
                removed,
                plural(removed, "", "es"),
                map.side()
            )
        );
    }
    if map.side().yields_keys() {
        log_debug!(
            MODULE,
            format!(
                "Added {} wif key{} from key-address file",
                keys.len(),
                plural(keys.len(), "", "s")
            )
        );
    }
    Ok(keys)
}

/// Stage B: confirm every remaining claim against keys derived from seeds
pub fn check_against_seeds(
    map: &mut AddressMap,
    deriver: &KeyDeriver<'_>,
    session: &mut SigningSession,
) -> SignResult<Vec<KeyMaterial>> {
    if map.is_empty() {
        return Ok(Vec::new());
    }
    log_info!(
        MODULE,
        format!(
            "Checking seed-derived -> BTC address mappings for {}s (from seed(s))",
            map.side()
        )
    );

    let wanted: BTreeSet<DerivationId> = map.ids().cloned().collect();
    let derived = deriver.derive(&wanted, session)?;

    let got: BTreeSet<DerivationId> = derived.iter().map(|d| d.id.clone()).collect();
    if got != wanted {
        let missing: Vec<String> = wanted.difference(&got).map(|id| id.to_string()).collect();
        let extra: Vec<String> = got.difference(&wanted).map(|id| id.to_string()).collect();
        return Err(SignError::mapping_mismatch(
            "Seed-derived identifiers do not match the transaction's claimed identifiers",
        )
        .with_details(format!(
            "not generated: [{}]; not claimed: [{}]",
            missing.join(" "),
            extra.join(" ")
        )));
    }

    for key in &derived {
        if let Some(claimed) = map.get(&key.id) {
            if claimed != key.address {
                return Err(mismatch_error(
                    MappingSource::SeedVerified,
                    &key.id,
                    &key.address,
                    MappingSource::Claimed,
                    &key.id,
                    claimed,
                ));
            }
        }
    }

    map.clear();
    if !map.side().yields_keys() {
        return Ok(Vec::new());
    }
    log_debug!(
        MODULE,
        format!(
            "Added {} wif key{} from seeds",
            derived.len(),
            plural(derived.len(), "", "s")
        )
    );
    Ok(derived
        .into_iter()
        .map(|d| KeyMaterial::new(d.address, d.wif, KeySource::Seed))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use bitcoin::Network;
    use crate::types::{AddressKind, MapSide};
    use crate::utils::prompt::NoPrompter;
    use crate::wallet::{AddressGenerator, Bip32AddressGenerator, FileSeedSource, Seed, SeedResolver};
    use std::collections::BTreeSet;

    fn seed() -> Seed {
        Seed::from_bytes(vec![5u8; 16]).unwrap()
    }

    fn generated(indices: &[u32]) -> Vec<(DerivationId, String, String)> {
        let s = seed();
        let set: BTreeSet<u32> = indices.iter().copied().collect();
        Bip32AddressGenerator::default()
            .generate(&s, &set)
            .unwrap()
            .into_iter()
            .map(|g| (DerivationId::new(s.id().clone(), g.index), g.address, g.wif.as_str().to_string()))
            .collect()
    }

    fn table_for(rows: &[(DerivationId, String, String)]) -> KeyAddressTable {
        let entries: Vec<_> = rows
            .iter()
            .map(|(id, addr, wif)| serde_json::json!({ "index": id.index, "address": addr, "wif": wif }))
            .collect();
        let doc = serde_json::json!({ "seed_id": rows[0].0.seed_id.as_str(), "entries": entries });
        KeyAddressTable::parse(&doc.to_string(), AddressKind::Legacy, Network::Bitcoin).unwrap()
    }

    #[test]
    fn test_table_stage_consumes_matching_claims() {
        let rows = generated(&[1, 2]);
        let table = table_for(&rows);
        let mut map = AddressMap::from_pairs(
            MapSide::Input,
            rows.iter().map(|(id, addr, _)| (id.clone(), addr.clone())),
        )
        .unwrap();

        let keys = check_against_table(&mut map, Some(&table)).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(map.is_empty());
        assert!(keys.iter().all(|k| k.source == KeySource::KeyAddressTable));

        // Nothing left to confirm on a second pass
        assert!(check_against_table(&mut map, Some(&table)).unwrap().is_empty());
    }

    #[test]
    fn test_table_stage_leaves_uncovered_claims() {
        let rows = generated(&[1, 2]);
        let table = table_for(&rows[..1]);
        let mut map = AddressMap::from_pairs(
            MapSide::Input,
            rows.iter().map(|(id, addr, _)| (id.clone(), addr.clone())),
        )
        .unwrap();

        let keys = check_against_table(&mut map, Some(&table)).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(map.len(), 1);
        assert!(map.get(&rows[1].0).is_some());
    }

    #[test]
    fn test_table_stage_rejects_disagreeing_claim() {
        let rows = generated(&[1, 2]);
        let table = table_for(&rows);
        let mut map = AddressMap::from_pairs(
            MapSide::Output,
            vec![(rows[0].0.clone(), rows[1].1.clone())],
        )
        .unwrap();

        let err = check_against_table(&mut map, Some(&table)).unwrap_err();
        assert_eq!(err.code, ErrorCode::AddressMappingMismatch);
        let details = err.details.unwrap();
        assert!(details.contains("key-address file:"));
        assert!(details.contains("tx file:"));
        assert!(details.contains(&rows[0].1));
        assert!(details.contains(&rows[1].1));
    }

    #[test]
    fn test_output_side_yields_no_keys() {
        let rows = generated(&[1]);
        let table = table_for(&rows);
        let mut map =
            AddressMap::from_pairs(MapSide::Output, vec![(rows[0].0.clone(), rows[0].1.clone())]).unwrap();
        assert!(check_against_table(&mut map, Some(&table)).unwrap().is_empty());
        assert!(map.is_empty());
    }

    #[test]
    fn test_seed_stage_on_empty_map_reads_nothing() {
        let source = FileSeedSource;
        let prompter = NoPrompter;
        let generator = Bip32AddressGenerator::default();
        let deriver = KeyDeriver::new(SeedResolver::new(&source, &prompter, false), &generator);
        // A seed file that doesn't exist would fail if it were read
        let mut session = SigningSession::new(vec!["/nonexistent/a.seed".into()]);

        let mut map = AddressMap::new(MapSide::Input);
        assert!(check_against_seeds(&mut map, &deriver, &mut session).unwrap().is_empty());
        assert_eq!(session.files_read(), 0);
    }
}
