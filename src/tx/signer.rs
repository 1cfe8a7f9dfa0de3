//! Transaction Signer
//!
//! Drives an external signer through the sign / unlock / lock protocol.
//!
//! ```text
//! Unsigned -> AttemptDirectSign -> Signed -> Done
//!                              \-> SignFailed -> PromptPassphrase <-> Locked
//!                                                     |
//!                                                 Unlocked -> RetrySign -> BestEffortLock -> Done | Failed
//! ```
//!
//! Direct signing uses only the keys gathered for the transaction. When the
//! signer rejects them, or leaves the signature incomplete, and wallet
//! fallback is enabled, the wallet is unlocked and signing is retried with
//! the wallet's own keys on whatever the direct attempt produced. The wallet is
//! always locked again afterwards; failing to lock is only a warning.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::error::{SignError, SignResult};
use crate::types::{KeySet, WifKey};
use crate::utils::Prompter;
use crate::{log_debug, log_info, log_warn};

use super::transaction::TxInput;

const MODULE: &str = "coldsign::signer";

/// Default wallet unlock duration
pub const DEFAULT_UNLOCK_SECS: u64 = 9999;
/// Longest accepted wallet unlock duration
pub const MAX_UNLOCK_SECS: u64 = 24 * 60 * 60;

// =============================================================================
// Signer capability
// =============================================================================

/// What the signer is told about each input. Never carries keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigInput {
    pub txid: String,
    pub vout: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: String,
}

/// Build the per-input data passed to the signer
pub fn build_sig_inputs(inputs: &[TxInput]) -> Vec<SigInput> {
    inputs
        .iter()
        .map(|i| SigInput {
            txid: i.txid.clone(),
            vout: i.vout,
            script_pub_key: i.script_pub_key.clone(),
        })
        .collect()
}

/// Signer reply
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignResponse {
    pub hex: String,
    pub complete: bool,
}

/// How an RPC failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorKind {
    InvalidAddressOrKey,
    IncorrectPassphrase,
    AlreadyUnlocked,
    Other,
}

/// Signer / wallet RPC errors
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Classify by RPC error code, falling back to the message text
    pub fn kind(&self) -> RpcErrorKind {
        let (code, message) = match self {
            RpcError::Rpc { code, message } => (*code, message.to_lowercase()),
            _ => return RpcErrorKind::Other,
        };
        match code {
            -5 => RpcErrorKind::InvalidAddressOrKey,
            -14 => RpcErrorKind::IncorrectPassphrase,
            -15 | -17 => RpcErrorKind::AlreadyUnlocked,
            _ if message.contains("invalid address or key") || message.contains("invalid private key") => {
                RpcErrorKind::InvalidAddressOrKey
            }
            _ if message.contains("passphrase entered was incorrect") => RpcErrorKind::IncorrectPassphrase,
            _ if message.contains("unencrypted wallet") || message.contains("already unlocked") => {
                RpcErrorKind::AlreadyUnlocked
            }
            _ => RpcErrorKind::Other,
        }
    }
}

/// External signer with an optional encrypted key store
pub trait WalletSigner {
    /// Sign `payload`. With `keys`, only those keys are used; without,
    /// the wallet's own keys are used.
    fn sign(
        &self,
        payload: &str,
        inputs: &[SigInput],
        keys: Option<&[WifKey]>,
    ) -> Result<SignResponse, RpcError>;

    fn unlock(&self, passphrase: &SecretString, duration: Duration) -> Result<(), RpcError>;

    fn lock(&self) -> Result<(), RpcError>;
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Signing protocol states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignState {
    Unsigned,
    AttemptDirectSign,
    SignFailed,
    PromptPassphrase,
    Locked,
    Unlocked,
    RetrySign,
    BestEffortLock,
    Signed,
    Failed,
    Done,
}

/// Sequences signing attempts for one run
pub struct SigningOrchestrator<'a> {
    signer: &'a dyn WalletSigner,
    prompter: &'a dyn Prompter,
    wallet_fallback: bool,
    unlock_duration: Duration,
    /// Passphrase read from a file, tried before prompting
    stored_passphrase: Option<SecretString>,
    transitions: Vec<SignState>,
}

impl<'a> SigningOrchestrator<'a> {
    pub fn new(signer: &'a dyn WalletSigner, prompter: &'a dyn Prompter) -> Self {
        Self {
            signer,
            prompter,
            wallet_fallback: false,
            unlock_duration: Duration::from_secs(DEFAULT_UNLOCK_SECS),
            stored_passphrase: None,
            transitions: Vec::new(),
        }
    }

    pub fn with_wallet_fallback(mut self, enabled: bool) -> Self {
        self.wallet_fallback = enabled;
        self
    }

    pub fn with_unlock_duration(mut self, duration: Duration) -> Self {
        self.unlock_duration = duration;
        self
    }

    pub fn with_stored_passphrase(mut self, passphrase: Option<SecretString>) -> Self {
        self.stored_passphrase = passphrase;
        self
    }

    /// States visited by the most recent `sign` call
    pub fn transitions(&self) -> &[SignState] {
        &self.transitions
    }

    fn enter(&mut self, state: SignState) {
        log_debug!(MODULE, format!("-> {:?}", state));
        self.transitions.push(state);
    }

    /// Sign `payload`, returning the fully signed payload
    pub fn sign(&mut self, payload: &str, inputs: &[TxInput], keys: &KeySet, label: &str) -> SignResult<String> {
        self.transitions.clear();
        self.enter(SignState::Unsigned);

        let sig_inputs = build_sig_inputs(inputs);
        let wifs = keys.wifs();

        self.enter(SignState::AttemptDirectSign);
        log_info!(
            MODULE,
            format!("Signing transaction{}...", label),
            keys = wifs.len()
        );
        match self.signer.sign(payload, &sig_inputs, Some(&wifs)) {
            Ok(response) if response.complete || !self.wallet_fallback => self.finish(response, label),
            Ok(partial) => {
                // Inputs without supplied keys come back unsigned rather than rejected
                self.enter(SignState::SignFailed);
                log_info!(MODULE, "Signature incomplete, using keys in wallet as per user request");
                self.sign_via_wallet(&partial.hex, &sig_inputs, label)
            }
            Err(e) if e.kind() == RpcErrorKind::InvalidAddressOrKey => {
                self.enter(SignState::SignFailed);
                if !self.wallet_fallback {
                    self.enter(SignState::Failed);
                    return Err(SignError::signer_rejected(format!(
                        "Transaction{} could not be signed",
                        label
                    ))
                    .with_details(e.to_string()));
                }
                log_info!(MODULE, "Using keys in wallet as per user request");
                self.sign_via_wallet(payload, &sig_inputs, label)
            }
            Err(e) => {
                self.enter(SignState::Failed);
                Err(SignError::signer_rejected(format!("Signer failed on transaction{}", label))
                    .with_details(e.to_string()))
            }
        }
    }

    /// Wallet path: unlock, retry, then lock whatever the outcome
    fn sign_via_wallet(&mut self, payload: &str, inputs: &[SigInput], label: &str) -> SignResult<String> {
        let outcome = self.sign_with_wallet(payload, inputs, label);
        self.enter(SignState::BestEffortLock);
        log_info!(MODULE, "Locking wallet");
        if let Err(e) = self.signer.lock() {
            log_warn!(MODULE, "Failed to lock wallet", error = e);
        }
        outcome.and_then(|response| self.finish(response, label))
    }

    /// Unlock the wallet and retry signing with its keys
    fn sign_with_wallet(&mut self, payload: &str, inputs: &[SigInput], label: &str) -> SignResult<SignResponse> {
        self.enter(SignState::PromptPassphrase);
        self.enter(SignState::Locked);
        let mut stored = self
            .stored_passphrase
            .as_ref()
            .map(|p| SecretString::from(p.expose_secret().to_string()));
        loop {
            let passphrase = match stored.take() {
                Some(p) => p,
                None => self.prompter.passphrase("Enter passphrase for bitcoind wallet")?,
            };
            match self.signer.unlock(&passphrase, self.unlock_duration) {
                Ok(()) => {
                    log_info!(MODULE, "Passphrase OK");
                    break;
                }
                Err(e) => match e.kind() {
                    RpcErrorKind::IncorrectPassphrase => {
                        log_warn!(MODULE, "Incorrect passphrase, try again");
                        self.enter(SignState::PromptPassphrase);
                    }
                    RpcErrorKind::AlreadyUnlocked => {
                        log_info!(MODULE, "Wallet is unencrypted or already unlocked");
                        break;
                    }
                    _ => {
                        self.enter(SignState::Failed);
                        return Err(SignError::wallet_error("Failed to unlock wallet").with_details(e.to_string()));
                    }
                },
            }
        }
        self.enter(SignState::Unlocked);

        self.enter(SignState::RetrySign);
        self.signer.sign(payload, inputs, None).map_err(|e| {
            self.transitions.push(SignState::Failed);
            SignError::signer_rejected(format!("Transaction{} could not be signed with wallet keys", label))
                .with_details(e.to_string())
        })
    }

    fn finish(&mut self, response: SignResponse, label: &str) -> SignResult<String> {
        if !response.complete {
            self.enter(SignState::Failed);
            return Err(SignError::incomplete_signature(format!(
                "Some keys were missing. Transaction{} could not be signed.",
                label
            )));
        }
        self.enter(SignState::Signed);
        self.enter(SignState::Done);
        log_info!(MODULE, format!("Transaction{} successfully signed", label));
        Ok(response.hex)
    }
}
