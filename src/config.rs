//! Run Configuration
//!
//! `SignConfig` is built once from the command line and passed by reference
//! to everything that needs an option. Nothing reads options from global
//! state.

use bitcoin::Network;
use secrecy::SecretString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{SignError, SignResult};
use crate::tx::{DEFAULT_RPC_URL, DEFAULT_UNLOCK_SECS, MAX_UNLOCK_SECS, RAW_TX_EXT};
use crate::types::AddressKind;
use crate::utils::logging::LogLevel;

/// Extensions accepted for seed files
pub const SEED_FILE_EXTS: &[&str] = &["seed", "mnemonic", "bip39"];

/// What the run should do with the transaction files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Sign,
    /// Print the transaction ID and exit
    TxId,
    /// Describe the transaction and exit
    Info { terse: bool },
}

/// Wallet RPC endpoint
#[derive(Debug)]
pub struct RpcConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<SecretString>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            user: None,
            password: None,
        }
    }
}

/// Options for one signing run
#[derive(Debug)]
pub struct SignConfig {
    pub tx_files: Vec<PathBuf>,
    pub seed_files: Vec<PathBuf>,
    pub key_address_file: Option<PathBuf>,
    pub keylist_file: Option<PathBuf>,
    /// Retry with the wallet's own keys when the signer rejects ours
    pub wallet_fallback: bool,
    /// Prompt for seed data once seed files are exhausted
    pub interactive_seed: bool,
    pub passphrase_file: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub quiet: bool,
    pub verbose: bool,
    pub mode: RunMode,
    pub comment: Option<String>,
    pub unlock_duration: Duration,
    pub address_kind: AddressKind,
    pub network: Network,
    pub rpc: RpcConfig,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            tx_files: Vec::new(),
            seed_files: Vec::new(),
            key_address_file: None,
            keylist_file: None,
            wallet_fallback: false,
            interactive_seed: false,
            passphrase_file: None,
            outdir: None,
            quiet: false,
            verbose: false,
            mode: RunMode::Sign,
            comment: None,
            unlock_duration: Duration::from_secs(DEFAULT_UNLOCK_SECS),
            address_kind: AddressKind::Legacy,
            network: Network::Bitcoin,
            rpc: RpcConfig::default(),
        }
    }
}

impl SignConfig {
    /// Check the options that must hold before any file is opened
    pub fn validate(&self) -> SignResult<()> {
        if self.tx_files.is_empty() {
            return Err(SignError::missing_input("You must specify a raw transaction file!"));
        }
        let has_key_source = !self.seed_files.is_empty()
            || self.key_address_file.is_some()
            || self.keylist_file.is_some()
            || self.wallet_fallback
            || self.interactive_seed;
        if !has_key_source {
            return Err(SignError::missing_input("You must specify a seed or key source!"));
        }
        let secs = self.unlock_duration.as_secs();
        if secs == 0 || secs > MAX_UNLOCK_SECS {
            return Err(SignError::invalid_input(format!(
                "Unlock duration must be between 1 and {} seconds, got {}",
                MAX_UNLOCK_SECS, secs
            )));
        }
        if let Some(dir) = &self.outdir {
            if !dir.is_dir() {
                return Err(SignError::missing_input(format!(
                    "Output directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else if self.quiet {
            LogLevel::Warn
        } else {
            LogLevel::Info
        }
    }

    /// First line of the passphrase file, if one was given
    pub fn read_passphrase_file(&self) -> SignResult<Option<SecretString>> {
        let path = match &self.passphrase_file {
            Some(p) => p,
            None => return Ok(None),
        };
        let text = zeroize::Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            SignError::missing_input(format!(
                "Cannot read passphrase file '{}': {}",
                path.display(),
                e
            ))
        })?);
        let line = text.lines().next().unwrap_or("").trim_end_matches('\r');
        Ok(Some(SecretString::from(line.to_string())))
    }
}

/// Split positional arguments into transaction files and seed files by
/// extension. Every file must exist.
pub fn classify_inputs(paths: &[PathBuf]) -> SignResult<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut tx_files = Vec::new();
    let mut seed_files = Vec::new();
    for path in paths {
        if !path.is_file() {
            return Err(SignError::missing_input(format!(
                "File '{}' not found",
                path.display()
            )));
        }
        match extension(path).as_deref() {
            Some(RAW_TX_EXT) => tx_files.push(path.clone()),
            Some(ext) if SEED_FILE_EXTS.contains(&ext) => seed_files.push(path.clone()),
            _ => {
                return Err(SignError::invalid_input(format!(
                    "'{}': unrecognized file extension",
                    path.display()
                ))
                .with_details(format!(
                    "expected .{} or one of: .{}",
                    RAW_TX_EXT,
                    SEED_FILE_EXTS.join(" .")
                )))
            }
        }
    }
    Ok((tx_files, seed_files))
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}
