mod common;

use bitcoin::Network;
use coldsign::tx::check_against_table;
use coldsign::types::{AddressKind, AddressMap, KeyMaterial, KeySet, KeySource, MapSide, WifKey};
use coldsign::wallet::KeyAddressTable;
use common::derive;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn any_source() -> impl Strategy<Value = KeySource> {
    prop_oneof![
        Just(KeySource::KeyAddressTable),
        Just(KeySource::Seed),
        Just(KeySource::Keylist),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn table_stage_is_idempotent(
        table_pick in prop::sample::subsequence(vec![1u32, 2, 3, 4, 5, 6], 1..=6),
        claimed_pick in prop::sample::subsequence(vec![1u32, 2, 3, 4, 5, 6], 0..=6),
    ) {
        let table_idx: BTreeSet<u32> = table_pick.into_iter().collect();
        let claimed_idx: BTreeSet<u32> = claimed_pick.into_iter().collect();
        let all = derive(3, &[1, 2, 3, 4, 5, 6]);
        let table_rows: Vec<_> = all.iter().filter(|r| table_idx.contains(&r.id.index)).collect();
        let entries: Vec<_> = table_rows
            .iter()
            .map(|r| serde_json::json!({ "index": r.id.index, "address": r.address, "wif": r.wif }))
            .collect();
        let doc = serde_json::json!({ "seed_id": all[0].id.seed_id.as_str(), "entries": entries });
        let table = KeyAddressTable::parse(&doc.to_string(), AddressKind::Legacy, Network::Bitcoin).unwrap();

        let mut map = AddressMap::from_pairs(
            MapSide::Input,
            all.iter()
                .filter(|r| claimed_idx.contains(&r.id.index))
                .map(|r| (r.id.clone(), r.address.clone())),
        ).unwrap();

        let keys = check_against_table(&mut map, Some(&table)).unwrap();
        let covered: BTreeSet<u32> = table_idx.intersection(&claimed_idx).copied().collect();
        prop_assert_eq!(keys.len(), covered.len());
        prop_assert_eq!(map.len(), claimed_idx.len() - covered.len());
        prop_assert!(map.ids().all(|id| !table_idx.contains(&id.index)));

        let after_first = map.clone();
        let again = check_against_table(&mut map, Some(&table)).unwrap();
        prop_assert!(again.is_empty());
        prop_assert_eq!(map, after_first);
    }

    #[test]
    fn key_set_holds_one_key_per_address(
        entries in prop::collection::vec((0usize..5, any_source()), 0..20),
    ) {
        let mut keys = KeySet::new();
        let duplicates = keys.extend(entries.iter().map(|(addr, source)| {
            KeyMaterial::new(format!("addr{}", addr), WifKey::new(format!("wif{}", addr)), *source)
        }));

        let distinct: BTreeSet<usize> = entries.iter().map(|(addr, _)| *addr).collect();
        prop_assert_eq!(keys.len(), distinct.len());
        prop_assert_eq!(duplicates, entries.len() - distinct.len());
        prop_assert_eq!(keys.wifs().len(), keys.len());

        // First occurrence wins
        for (addr, source) in &entries {
            let first = entries.iter().find(|(a, _)| a == addr).map(|(_, s)| *s);
            if first == Some(*source) {
                let expected_addr = format!("addr{}", addr);
                prop_assert!(keys.iter().any(|k| k.address == expected_addr && k.source == *source));
            }
        }
    }
}
