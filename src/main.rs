use bitcoin::Network;
use clap::Parser;
use secrecy::SecretString;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use coldsign::config::{classify_inputs, RpcConfig, RunMode, SignConfig};
use coldsign::tx::{self, BitcoindRpc, Collaborators, RunOutcome, DEFAULT_RPC_URL, DEFAULT_UNLOCK_SECS};
use coldsign::types::AddressKind;
use coldsign::utils::logging;
use coldsign::utils::TerminalPrompter;
use coldsign::wallet::{Bip32AddressGenerator, FileSeedSource};
use coldsign::{log_error, log_warn, SignResult};

/// Sign cold-storage Bitcoin transactions
#[derive(Debug, Parser)]
#[command(name = "coldsign", version, about)]
struct Args {
    /// Transaction files (.rawtx) and seed files (.seed, .mnemonic, .bip39)
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Write signed transactions to this directory
    #[arg(short = 'd', long)]
    outdir: Option<PathBuf>,

    /// Print the transaction ID and exit
    #[arg(short = 'D', long)]
    tx_id: bool,

    /// Show the transaction and exit
    #[arg(short = 'I', long, conflicts_with = "tx_id")]
    info: bool,

    /// Like --info, but more concise
    #[arg(short = 't', long, conflicts_with_all = ["tx_id", "info"])]
    terse_info: bool,

    /// Show passphrases and seed data while typing
    #[arg(short = 'e', long)]
    echo_passphrase: bool,

    /// Prompt for seed data when seed files run out
    #[arg(short = 'i', long)]
    interactive_seed: bool,

    /// Plain WIF keys for inputs without a derivation identifier
    #[arg(short = 'k', long, value_name = "FILE")]
    keys_from_file: Option<PathBuf>,

    /// Key-address file for derived inputs and outputs
    #[arg(short = 'M', long, value_name = "FILE")]
    key_address_file: Option<PathBuf>,

    /// Read the keylist or wallet passphrase from this file
    #[arg(short = 'P', long, value_name = "FILE")]
    passwd_file: Option<PathBuf>,

    /// Fall back to the wallet's own keys when signing with ours fails
    #[arg(short = 'w', long)]
    use_wallet: bool,

    /// Seconds to keep the wallet unlocked
    #[arg(long, default_value_t = DEFAULT_UNLOCK_SECS)]
    unlock_secs: u64,

    /// Replace the transaction comment
    #[arg(short = 'c', long)]
    comment: Option<String>,

    /// Address type derived keys are checked against
    #[arg(long, value_enum, default_value_t = AddressKind::Legacy)]
    address_type: AddressKind,

    /// bitcoin, testnet, signet or regtest
    #[arg(long, default_value_t = Network::Bitcoin)]
    network: Network,

    /// Wallet RPC endpoint
    #[arg(long, env = "COLDSIGN_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    #[arg(long, env = "COLDSIGN_RPC_USER")]
    rpc_user: Option<String>,

    #[arg(long, env = "COLDSIGN_RPC_PASSWORD", hide_env_values = true)]
    rpc_password: Option<String>,

    /// Suppress warnings; overwrite files without prompting
    #[arg(short, long)]
    quiet: bool,

    /// Produce more verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> SignResult<SignConfig> {
        let (tx_files, seed_files) = classify_inputs(&self.files)?;
        let mode = if self.tx_id {
            RunMode::TxId
        } else if self.info || self.terse_info {
            RunMode::Info {
                terse: self.terse_info,
            }
        } else {
            RunMode::Sign
        };
        Ok(SignConfig {
            tx_files,
            seed_files,
            key_address_file: self.key_address_file,
            keylist_file: self.keys_from_file,
            wallet_fallback: self.use_wallet,
            interactive_seed: self.interactive_seed,
            passphrase_file: self.passwd_file,
            outdir: self.outdir,
            quiet: self.quiet,
            verbose: self.verbose,
            mode,
            comment: self.comment,
            unlock_duration: Duration::from_secs(self.unlock_secs),
            address_kind: self.address_type,
            network: self.network,
            rpc: RpcConfig {
                url: self.rpc_url,
                user: self.rpc_user,
                password: self.rpc_password.map(SecretString::from),
            },
        })
    }
}

fn run(args: Args) -> SignResult<RunOutcome> {
    let echo = args.echo_passphrase;
    let mut config = args.into_config()?;
    logging::set_level(config.log_level());

    let prompter = TerminalPrompter::new(echo);
    let generator = Bip32AddressGenerator::new(config.network, config.address_kind);
    let rpc = std::mem::take(&mut config.rpc);
    let signer = BitcoindRpc::new(rpc.url, rpc.user, rpc.password)?;
    let collab = Collaborators {
        seed_source: &FileSeedSource,
        generator: &generator,
        prompter: &prompter,
        signer: &signer,
    };
    tx::run(&config, &collab)
}

fn main() {
    let args = Args::parse();
    match run(args) {
        Ok(RunOutcome::TxId(id)) => println!("{}", id),
        Ok(RunOutcome::Info(summary)) => print!("{}", summary),
        Ok(RunOutcome::Signed { skipped, .. }) => {
            if !skipped.is_empty() {
                log_warn!(
                    "coldsign",
                    format!("{} signed transaction(s) not written", skipped.len())
                );
            }
        }
        Err(e) => {
            log_error!("coldsign", e.to_string());
            process::exit(e.exit_code());
        }
    }
}
