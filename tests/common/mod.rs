#![allow(dead_code)]

use coldsign::error::{SignError, SignResult};
use coldsign::tx::{RpcError, SigInput, SignResponse, Transaction, TxInput, TxOutput, WalletSigner};
use coldsign::types::{DerivationId, SeedId, WifKey};
use coldsign::utils::Prompter;
use coldsign::wallet::{AddressGenerator, Bip32AddressGenerator, FileSeedSource, GeneratedKey, Seed, SeedSource};
use secrecy::{ExposeSecret, SecretString};
use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Signer double
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerCall {
    Sign { keys: Option<Vec<String>> },
    Unlock(String),
    Lock,
}

/// Records every call; answers from scripted queues, then succeeds
#[derive(Default)]
pub struct MockSigner {
    pub sign_results: RefCell<VecDeque<Result<SignResponse, RpcError>>>,
    pub unlock_results: RefCell<VecDeque<Result<(), RpcError>>>,
    pub calls: RefCell<Vec<SignerCall>>,
}

impl MockSigner {
    pub fn sign_calls(&self) -> Vec<Option<Vec<String>>> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                SignerCall::Sign { keys } => Some(keys.clone()),
                _ => None,
            })
            .collect()
    }
}

impl WalletSigner for MockSigner {
    fn sign(&self, payload: &str, _inputs: &[SigInput], keys: Option<&[WifKey]>) -> Result<SignResponse, RpcError> {
        self.calls.borrow_mut().push(SignerCall::Sign {
            keys: keys.map(|k| k.iter().map(|w| w.as_str().to_string()).collect()),
        });
        self.sign_results.borrow_mut().pop_front().unwrap_or_else(|| {
            Ok(SignResponse {
                hex: format!("{}ff", payload),
                complete: true,
            })
        })
    }

    fn unlock(&self, passphrase: &SecretString, _duration: Duration) -> Result<(), RpcError> {
        self.calls
            .borrow_mut()
            .push(SignerCall::Unlock(passphrase.expose_secret().to_string()));
        self.unlock_results.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    fn lock(&self) -> Result<(), RpcError> {
        self.calls.borrow_mut().push(SignerCall::Lock);
        Ok(())
    }
}

pub fn invalid_key() -> RpcError {
    RpcError::Rpc {
        code: -5,
        message: "Invalid private key".into(),
    }
}

pub fn wrong_passphrase() -> RpcError {
    RpcError::Rpc {
        code: -14,
        message: "Error: The wallet passphrase entered was incorrect.".into(),
    }
}

// =============================================================================
// Prompter double
// =============================================================================

#[derive(Default)]
pub struct ScriptedPrompter {
    pub passphrases: RefCell<VecDeque<String>>,
    pub seeds: RefCell<VecDeque<String>>,
    pub confirms: RefCell<VecDeque<bool>>,
    pub asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn with_passphrases(list: &[&str]) -> Self {
        let p = Self::default();
        p.passphrases.borrow_mut().extend(list.iter().map(|s| s.to_string()));
        p
    }
}

impl Prompter for ScriptedPrompter {
    fn seed_data(&self, seed_id: &SeedId) -> SignResult<SecretString> {
        self.asked.borrow_mut().push(format!("seed {}", seed_id));
        self.seeds
            .borrow_mut()
            .pop_front()
            .map(SecretString::from)
            .ok_or_else(|| SignError::cancelled("no scripted seed"))
    }

    fn passphrase(&self, prompt: &str) -> SignResult<SecretString> {
        self.asked.borrow_mut().push(prompt.to_string());
        self.passphrases
            .borrow_mut()
            .pop_front()
            .map(SecretString::from)
            .ok_or_else(|| SignError::cancelled("no scripted passphrase"))
    }

    fn confirm(&self, prompt: &str, default: bool) -> SignResult<bool> {
        self.asked.borrow_mut().push(prompt.to_string());
        Ok(self.confirms.borrow_mut().pop_front().unwrap_or(default))
    }
}

// =============================================================================
// Seed source double
// =============================================================================

/// File seed source that counts reads per path
#[derive(Default)]
pub struct CountingSeedSource {
    pub reads: RefCell<Vec<PathBuf>>,
}

impl SeedSource for CountingSeedSource {
    fn read_seeds(&self, path: &Path) -> SignResult<Vec<Seed>> {
        self.reads.borrow_mut().push(path.to_path_buf());
        FileSeedSource.read_seeds(path)
    }
}

// =============================================================================
// Generator double
// =============================================================================

/// BIP32 generator that can leave out one requested index or add one more
#[derive(Default)]
pub struct SkewedGenerator {
    pub drop: Option<u32>,
    pub add: Option<u32>,
}

impl AddressGenerator for SkewedGenerator {
    fn generate(&self, seed: &Seed, indices: &BTreeSet<u32>) -> SignResult<Vec<GeneratedKey>> {
        let mut wanted = indices.clone();
        if let Some(index) = self.drop {
            wanted.remove(&index);
        }
        if let Some(index) = self.add {
            wanted.insert(index);
        }
        Bip32AddressGenerator::default().generate(seed, &wanted)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub struct DerivedRow {
    pub id: DerivationId,
    pub address: String,
    pub wif: String,
}

pub fn seed_bytes(fill: u8) -> Vec<u8> {
    vec![fill; 32]
}

pub fn seed_id(fill: u8) -> SeedId {
    Seed::from_bytes(seed_bytes(fill)).unwrap().id().clone()
}

/// Keys at `indices` for the seed filled with `fill`
pub fn derive(fill: u8, indices: &[u32]) -> Vec<DerivedRow> {
    let seed = Seed::from_bytes(seed_bytes(fill)).unwrap();
    let set: BTreeSet<u32> = indices.iter().copied().collect();
    Bip32AddressGenerator::default()
        .generate(&seed, &set)
        .unwrap()
        .into_iter()
        .map(|g| DerivedRow {
            id: DerivationId::new(seed.id().clone(), g.index),
            address: g.address,
            wif: g.wif.as_str().to_string(),
        })
        .collect()
}

pub fn write_seed_file(dir: &Path, name: &str, fills: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let body: String = fills.iter().map(|f| hex::encode(seed_bytes(*f)) + "\n").collect();
    std::fs::write(&path, body).unwrap();
    path
}

pub fn write_table(dir: &Path, rows: &[DerivedRow]) -> PathBuf {
    let path = dir.join("keys.akeys.json");
    let entries: Vec<_> = rows
        .iter()
        .map(|r| serde_json::json!({ "index": r.id.index, "address": r.address, "comment": "", "wif": r.wif }))
        .collect();
    let doc = serde_json::json!({ "seed_id": rows[0].id.seed_id.as_str(), "entries": entries });
    std::fs::write(&path, doc.to_string()).unwrap();
    path
}

pub fn write_keylist(dir: &Path, wifs: &[&str]) -> PathBuf {
    let path = dir.join("keylist.txt");
    let body: String = wifs.iter().map(|w| format!("{} imported\n", w)).collect();
    std::fs::write(&path, format!("# plain keys\n{}", body)).unwrap();
    path
}

pub fn input(address: &str, id: Option<&DerivationId>, vout: u32) -> TxInput {
    TxInput {
        txid: "ab".repeat(32),
        vout,
        script_pub_key: "76a914".to_string() + &"00".repeat(20) + "88ac",
        address: address.to_string(),
        derivation_id: id.cloned(),
        amount_sats: 10_000,
    }
}

pub fn output(address: &str, id: Option<&DerivationId>) -> TxOutput {
    TxOutput {
        address: address.to_string(),
        amount_sats: 9_000,
        derivation_id: id.cloned(),
    }
}

pub fn transaction(id: &str, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Transaction {
    Transaction {
        id: id.to_string(),
        amount_sats: 9_000,
        timestamp: "2024-01-01T00:00:00+00:00".to_string(),
        raw_tx: "0200".to_string(),
        signed: false,
        inputs,
        outputs,
        comment: None,
    }
}

pub fn write_tx(dir: &Path, tx: &Transaction) -> PathBuf {
    let path = dir.join(format!("{}.rawtx", tx.id));
    tx.save(&path).unwrap();
    path
}
