//! Transaction Files
//!
//! A transaction file carries the unsigned payload produced by the online
//! side plus everything needed to sign it offline: the inputs being spent,
//! the outputs, and the derivation identifiers the creator claims for any
//! addresses that came from a seed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SignError, SignResult};
use crate::types::{AddressMap, DerivationId, MapSide};

/// Extension of unsigned transaction files
pub const RAW_TX_EXT: &str = "rawtx";
/// Extension of signed transaction files
pub const SIGNED_TX_EXT: &str = "sigtx";

/// One input being spent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
    pub script_pub_key: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_id: Option<DerivationId>,
    #[serde(default)]
    pub amount_sats: u64,
}

/// One output of the transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount_sats: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_id: Option<DerivationId>,
}

/// Transaction file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount_sats: u64,
    /// RFC 3339
    pub timestamp: String,
    /// Hex-encoded payload handed to the signer
    pub raw_tx: String,
    #[serde(default)]
    pub signed: bool,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Transaction {
    pub fn load(path: &Path) -> SignResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            SignError::missing_input(format!(
                "Cannot read transaction file '{}': {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            SignError::parse_error(format!("Invalid transaction file '{}'", path.display()))
                .with_details(e.to_string())
        })
    }

    pub fn save(&self, path: &Path) -> SignResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n").map_err(|e| {
            SignError::internal(format!("Failed to write '{}': {}", path.display(), e))
        })
    }

    /// Distinct addresses of inputs that have no derivation identifier
    pub fn plain_input_addresses(&self) -> BTreeSet<String> {
        self.inputs
            .iter()
            .filter(|i| i.derivation_id.is_none())
            .map(|i| i.address.clone())
            .collect()
    }

    /// Claimed identifier → address map for the inputs
    pub fn input_map(&self) -> SignResult<AddressMap> {
        AddressMap::from_pairs(
            MapSide::Input,
            self.inputs
                .iter()
                .filter_map(|i| i.derivation_id.clone().map(|id| (id, i.address.clone()))),
        )
    }

    /// Claimed identifier → address map for the outputs
    pub fn output_map(&self) -> SignResult<AddressMap> {
        AddressMap::from_pairs(
            MapSide::Output,
            self.outputs
                .iter()
                .filter_map(|o| o.derivation_id.clone().map(|id| (id, o.address.clone()))),
        )
    }

    /// The signed version of this transaction
    pub fn into_signed(self, payload: String, comment: Option<String>) -> Self {
        Transaction {
            raw_tx: payload,
            signed: true,
            timestamp: chrono::Utc::now().to_rfc3339(),
            comment: comment.or(self.comment),
            ..self
        }
    }

    /// `<stem>.sigtx`, in `outdir` if given, otherwise beside `source`
    pub fn signed_path(source: &Path, outdir: Option<&Path>) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transaction".to_string());
        let name = format!("{}.{}", stem, SIGNED_TX_EXT);
        match outdir {
            Some(dir) => dir.join(name),
            None => source.with_file_name(name),
        }
    }

    /// Human-readable description. `terse` omits the per-input detail.
    pub fn summary(&self, terse: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Transaction ID: {}", self.id);
        let _ = writeln!(out, "Created:        {}", self.timestamp);
        let _ = writeln!(out, "Amount:         {} BTC", format_btc(self.amount_sats));
        if let Some(comment) = &self.comment {
            let _ = writeln!(out, "Comment:        {}", comment);
        }
        if let Some(decoded) = decode_payload(&self.raw_tx) {
            let _ = writeln!(out, "Payload:        {}", decoded);
        }

        if terse {
            let _ = writeln!(out, "Inputs: {}  Outputs: {}", self.inputs.len(), self.outputs.len());
            return out;
        }

        let _ = writeln!(out, "Inputs:");
        for (n, input) in self.inputs.iter().enumerate() {
            let _ = writeln!(out, "  {:>2}: {}:{}", n + 1, input.txid, input.vout);
            let _ = writeln!(out, "      address: {}{}", input.address, id_suffix(&input.derivation_id));
            if input.amount_sats > 0 {
                let _ = writeln!(out, "      amount:  {} BTC", format_btc(input.amount_sats));
            }
        }
        let _ = writeln!(out, "Outputs:");
        for (n, output) in self.outputs.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {:>2}: {}{}  {} BTC",
                n + 1,
                output.address,
                id_suffix(&output.derivation_id),
                format_btc(output.amount_sats)
            );
        }
        out
    }
}

fn id_suffix(id: &Option<DerivationId>) -> String {
    id.as_ref().map(|id| format!(" ({})", id)).unwrap_or_default()
}

fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / 100_000_000, sats % 100_000_000)
}

/// Decode the payload as a consensus-encoded transaction, if it is one
fn decode_payload(raw_hex: &str) -> Option<String> {
    use bitcoin::consensus::encode::deserialize;

    let bytes = hex::decode(raw_hex).ok()?;
    let tx: bitcoin::Transaction = deserialize(&bytes).ok()?;
    Some(format!(
        "txid {} ({} in, {} out, {} vbytes)",
        tx.compute_txid(),
        tx.input.len(),
        tx.output.len(),
        tx.vsize()
    ))
}
