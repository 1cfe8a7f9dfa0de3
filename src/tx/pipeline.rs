//! Signing Pipeline
//!
//! One run signs every transaction file on the command line, in order:
//!
//! 1. Load the key-address table and keylist (once per run)
//! 2. For each transaction: refuse it if already signed, match plain inputs
//!    against the keylist, reconcile identifier claims against the table and
//!    then the seeds, sign, and write `<stem>.sigtx`
//!
//! The first fatal error aborts the run. Files already written for earlier
//! transactions are left in place.

use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use crate::config::{RunMode, SignConfig};
use crate::error::{SignError, SignResult};
use crate::types::{KeySet, KeySource, SeedId, WifKey};
use crate::utils::{Prompter, SigningSession};
use crate::wallet::{AddressGenerator, KeyAddressTable, KeyDeriver, Keylist, SeedResolver, SeedSource};
use crate::{log_debug, log_info, log_warn};

use super::reconcile::{check_against_seeds, check_against_table};
use super::signer::{SigningOrchestrator, WalletSigner};
use super::transaction::Transaction;

const MODULE: &str = "coldsign::pipeline";

/// The external capabilities a run talks to
pub struct Collaborators<'a> {
    pub seed_source: &'a dyn SeedSource,
    pub generator: &'a dyn AddressGenerator,
    pub prompter: &'a dyn Prompter,
    pub signer: &'a dyn WalletSigner,
}

/// Key material loaded once per run
#[derive(Debug, Default)]
pub struct KeySources {
    pub table: Option<KeyAddressTable>,
    pub keylist: Keylist,
}

impl KeySources {
    pub fn load(
        config: &SignConfig,
        prompter: &dyn Prompter,
        stored_passphrase: Option<&SecretString>,
    ) -> SignResult<Self> {
        let table = config
            .key_address_file
            .as_deref()
            .map(|path| KeyAddressTable::load(path, config.address_kind, config.network))
            .transpose()?;

        let keylist = match &config.keylist_file {
            Some(path) => {
                let known: HashSet<WifKey> = table
                    .iter()
                    .flat_map(|t| t.iter().map(|(_, entry)| entry.wif.clone()))
                    .collect();
                Keylist::load(
                    path,
                    || match stored_passphrase {
                        Some(p) => Ok(SecretString::from(p.expose_secret().to_string())),
                        None => prompter.passphrase("Enter passphrase for keylist"),
                    },
                    &known,
                    config.address_kind,
                    config.network,
                )?
            }
            None => Keylist::default(),
        };

        Ok(Self { table, keylist })
    }
}

/// What a run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// `--tx-id`: the transaction ID
    TxId(String),
    /// `--info` / `--terse-info`: the transaction summary
    Info(String),
    /// Signed files written, and those the operator chose not to overwrite
    Signed {
        written: Vec<PathBuf>,
        skipped: Vec<PathBuf>,
    },
}

/// Run the whole pipeline for `config`
pub fn run(config: &SignConfig, collab: &Collaborators<'_>) -> SignResult<RunOutcome> {
    config.validate()?;

    if config.mode != RunMode::Sign {
        return describe_first(config);
    }

    let stored_passphrase = config.read_passphrase_file()?;
    let sources = KeySources::load(config, collab.prompter, stored_passphrase.as_ref())?;

    let mut session = SigningSession::new(config.seed_files.iter().cloned());
    let resolver = SeedResolver::new(collab.seed_source, collab.prompter, config.interactive_seed);
    let deriver = KeyDeriver::new(resolver, collab.generator);
    let mut orchestrator = SigningOrchestrator::new(collab.signer, collab.prompter)
        .with_wallet_fallback(config.wallet_fallback)
        .with_unlock_duration(config.unlock_duration)
        .with_stored_passphrase(stored_passphrase);

    let total = config.tx_files.len();
    let mut written = Vec::new();
    let mut skipped = Vec::new();
    for (n, path) in config.tx_files.iter().enumerate() {
        let label = if total > 1 {
            log_info!(MODULE, format!("Transaction #{} of {}:", n + 1, total));
            format!(" #{}", n + 1)
        } else {
            String::new()
        };

        let tx = load_unsigned(path)?;
        log_debug!(MODULE, format!("Successfully opened transaction file '{}'", path.display()));

        let payload = sign_transaction(
            &tx,
            &label,
            &sources,
            &deriver,
            &mut session,
            &mut orchestrator,
            config.wallet_fallback,
        )?;
        let signed = tx.into_signed(payload, config.comment.clone());

        let out = Transaction::signed_path(path, config.outdir.as_deref());
        if out.exists() && !config.quiet {
            let question = format!("Overwrite existing file '{}'?", out.display());
            if !collab.prompter.confirm(&question, true)? {
                log_warn!(MODULE, format!("Signed transaction{} not written", label), file = out.display());
                skipped.push(out);
                continue;
            }
        }
        signed.save(&out)?;
        log_info!(MODULE, format!("Signed transaction{} written to '{}'", label, out.display()));
        written.push(out);
    }

    Ok(RunOutcome::Signed { written, skipped })
}

fn load_unsigned(path: &std::path::Path) -> SignResult<Transaction> {
    let tx = Transaction::load(path)?;
    if tx.signed {
        return Err(SignError::already_signed("Transaction is already signed!")
            .with_details(path.display().to_string()));
    }
    Ok(tx)
}

/// `--tx-id` and `--info` only look at the first transaction
fn describe_first(config: &SignConfig) -> SignResult<RunOutcome> {
    let path = config
        .tx_files
        .first()
        .ok_or_else(|| SignError::missing_input("You must specify a raw transaction file!"))?;
    let tx = load_unsigned(path)?;
    Ok(match config.mode {
        RunMode::TxId => RunOutcome::TxId(tx.id),
        RunMode::Info { terse } => RunOutcome::Info(tx.summary(terse)),
        RunMode::Sign => RunOutcome::Signed {
            written: Vec::new(),
            skipped: Vec::new(),
        },
    })
}

/// Gather and verify every key the transaction needs, then sign it.
/// Returns the signed payload.
pub fn sign_transaction(
    tx: &Transaction,
    label: &str,
    sources: &KeySources,
    deriver: &KeyDeriver<'_>,
    session: &mut SigningSession,
    orchestrator: &mut SigningOrchestrator<'_>,
    wallet_fallback: bool,
) -> SignResult<String> {
    let mut keys = KeySet::new();

    let (matched, remaining) = sources.keylist.match_addresses(&tx.plain_input_addresses());
    if !matched.is_empty() {
        log_debug!(
            MODULE,
            format!("Added {} wif key(s) from user-supplied keylist", matched.len())
        );
    }
    keys.extend(matched);

    if !remaining.is_empty() {
        if !wallet_fallback {
            return Err(SignError::missing_key_material(format!(
                "A keylist must be supplied (or wallet fallback enabled) for the following non-seed address{}",
                if remaining.len() == 1 { "" } else { "es" }
            ))
            .with_details(remaining.into_iter().collect::<Vec<_>>().join(" ")));
        }
        log_info!(
            MODULE,
            format!("{} plain input(s) left to the wallet's own keys", remaining.len())
        );
    }

    let mut imap = tx.input_map()?;
    let mut omap = tx.output_map()?;
    let referenced: BTreeSet<SeedId> = imap.seed_ids().into_iter().chain(omap.seed_ids()).collect();

    let table = sources.table.as_ref();
    let mut duplicates = keys.extend(check_against_table(&mut imap, table)?);
    check_against_table(&mut omap, table)?;
    duplicates += keys.extend(check_against_seeds(&mut imap, deriver, session)?);
    check_against_seeds(&mut omap, deriver, session)?;
    if duplicates > 0 {
        log_debug!(MODULE, format!("Skipped {} duplicate key(s)", duplicates));
    }

    let unused: Vec<String> = session
        .cached_seed_ids()
        .difference(&referenced)
        .map(|s| s.to_string())
        .collect();
    if !unused.is_empty() {
        log_info!(
            MODULE,
            format!(
                "Unused Seed ID{}: {}",
                if unused.len() == 1 { "" } else { "s" },
                unused.join(" ")
            )
        );
    }

    log_debug!(
        MODULE,
        "Key set assembled",
        total = keys.len(),
        from_table = keys.count_from(KeySource::KeyAddressTable),
        from_seed = keys.count_from(KeySource::Seed),
        from_keylist = keys.count_from(KeySource::Keylist)
    );

    orchestrator.sign(&tx.raw_tx, &tx.inputs, &keys, label)
}
