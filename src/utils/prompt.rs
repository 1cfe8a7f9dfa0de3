//! Operator prompts
//!
//! Seed entry, passphrases and overwrite confirmation all go through the
//! `Prompter` trait so the pipeline can run against a scripted operator in
//! tests.

use dialoguer::{Confirm, Input, Password};
use secrecy::SecretString;

use crate::error::{SignError, SignResult};
use crate::types::SeedId;

/// Interactive operator input
pub trait Prompter {
    /// Ask for seed data (mnemonic phrase or hex) for `seed_id`
    fn seed_data(&self, seed_id: &SeedId) -> SignResult<SecretString>;

    /// Ask for a passphrase
    fn passphrase(&self, prompt: &str) -> SignResult<SecretString>;

    /// Ask a yes/no question
    fn confirm(&self, prompt: &str, default: bool) -> SignResult<bool>;
}

/// Prompter backed by the controlling terminal
#[derive(Debug, Clone, Default)]
pub struct TerminalPrompter {
    /// Show passphrases while they are typed
    pub echo: bool,
}

impl TerminalPrompter {
    pub fn new(echo: bool) -> Self {
        Self { echo }
    }

    fn read_secret(&self, prompt: &str) -> SignResult<SecretString> {
        let value = if self.echo {
            Input::<String>::new()
                .with_prompt(prompt)
                .interact_text()
        } else {
            Password::new().with_prompt(prompt).interact()
        }
        .map_err(|e| SignError::cancelled(format!("Failed to read input: {}", e)))?;
        Ok(SecretString::from(value))
    }
}

impl Prompter for TerminalPrompter {
    fn seed_data(&self, seed_id: &SeedId) -> SignResult<SecretString> {
        self.read_secret(&format!("Enter seed data (mnemonic or hex) for Seed ID {}", seed_id))
    }

    fn passphrase(&self, prompt: &str) -> SignResult<SecretString> {
        self.read_secret(prompt)
    }

    fn confirm(&self, prompt: &str, default: bool) -> SignResult<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(|e| SignError::cancelled(format!("Failed to read confirmation: {}", e)))
    }
}

/// Prompter for non-interactive runs: every prompt is an error
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompter;

impl Prompter for NoPrompter {
    fn seed_data(&self, seed_id: &SeedId) -> SignResult<SecretString> {
        Err(SignError::no_seed_source(format!("No seed source found for Seed ID: {}", seed_id)))
    }

    fn passphrase(&self, prompt: &str) -> SignResult<SecretString> {
        Err(SignError::cancelled(format!("Cannot prompt in non-interactive mode: {}", prompt)))
    }

    fn confirm(&self, _prompt: &str, default: bool) -> SignResult<bool> {
        Ok(default)
    }
}
