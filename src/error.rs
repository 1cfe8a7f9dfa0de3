//! Unified error types for coldsign
//!
//! Every fatal condition in the signing pipeline is a `SignError` carrying an
//! `ErrorCode`. Components return errors; only the binary maps them to
//! process exit codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all signing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl SignError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn missing_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingInput, msg)
    }

    pub fn no_seed_source(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::NoSeedSource, msg)
    }

    pub fn already_signed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadySigned, msg)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ParseError, msg)
    }

    pub fn mapping_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::AddressMappingMismatch, msg)
    }

    pub fn checksum_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ChecksumMismatch, msg)
    }

    pub fn missing_key_material(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingKeyMaterial, msg)
    }

    pub fn invalid_private_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPrivateKey, msg)
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, msg)
    }

    pub fn decryption_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DecryptionFailed, msg)
    }

    pub fn signer_rejected(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SignerRejected, msg)
    }

    pub fn incomplete_signature(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::IncompleteSignature, msg)
    }

    pub fn wallet_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::WalletError, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SignError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Missing or unusable input
    InvalidInput,
    MissingInput,
    NoSeedSource,
    AlreadySigned,
    ParseError,
    DecryptionFailed,
    Cancelled,

    // Integrity violations and unmet preconditions
    AddressMappingMismatch,
    ChecksumMismatch,
    MissingKeyMaterial,
    InvalidPrivateKey,
    CryptoError,

    // Signing failures
    SignerRejected,
    IncompleteSignature,
    WalletError,

    // Internal
    Internal,
}

impl ErrorCode {
    /// 1: missing input or seed source, 2: integrity violation or unmet
    /// precondition, 3: signing failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::InvalidInput
            | ErrorCode::MissingInput
            | ErrorCode::NoSeedSource
            | ErrorCode::AlreadySigned
            | ErrorCode::ParseError
            | ErrorCode::DecryptionFailed
            | ErrorCode::Cancelled
            | ErrorCode::Internal => 1,
            ErrorCode::AddressMappingMismatch
            | ErrorCode::ChecksumMismatch
            | ErrorCode::MissingKeyMaterial
            | ErrorCode::InvalidPrivateKey
            | ErrorCode::CryptoError => 2,
            ErrorCode::SignerRejected | ErrorCode::IncompleteSignature | ErrorCode::WalletError => 3,
        }
    }
}

/// Result type alias for signing operations
pub type SignResult<T> = Result<T, SignError>;

// Conversions from common error types

impl From<serde_json::Error> for SignError {
    fn from(e: serde_json::Error) -> Self {
        SignError::new(ErrorCode::ParseError, format!("JSON error: {}", e))
    }
}

impl From<hex::FromHexError> for SignError {
    fn from(e: hex::FromHexError) -> Self {
        SignError::new(ErrorCode::ParseError, format!("Hex error: {}", e))
    }
}

impl From<std::io::Error> for SignError {
    fn from(e: std::io::Error) -> Self {
        SignError::new(ErrorCode::MissingInput, e.to_string())
    }
}

impl From<bitcoin::key::FromWifError> for SignError {
    fn from(e: bitcoin::key::FromWifError) -> Self {
        SignError::new(ErrorCode::InvalidPrivateKey, format!("Invalid WIF key: {}", e))
    }
}

impl From<bitcoin::bip32::Error> for SignError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        SignError::new(ErrorCode::CryptoError, format!("BIP32 error: {}", e))
    }
}

impl From<bip39::Error> for SignError {
    fn from(e: bip39::Error) -> Self {
        SignError::new(ErrorCode::ParseError, format!("BIP39 error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let err = SignError::mapping_mismatch("address mappings differ")
            .with_details("ABCD1234:3");

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("address_mapping_mismatch"));
        assert!(json.contains("ABCD1234:3"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SignError::no_seed_source("x").exit_code(), 1);
        assert_eq!(SignError::missing_input("x").exit_code(), 1);
        assert_eq!(SignError::mapping_mismatch("x").exit_code(), 2);
        assert_eq!(SignError::missing_key_material("x").exit_code(), 2);
        assert_eq!(SignError::signer_rejected("x").exit_code(), 3);
        assert_eq!(SignError::incomplete_signature("x").exit_code(), 3);
    }

    #[test]
    fn test_display_includes_details() {
        let err = SignError::incomplete_signature("Some keys were missing").with_details("transaction #2");
        assert_eq!(
            err.to_string(),
            "[IncompleteSignature] Some keys were missing (transaction #2)"
        );
    }
}
