//! Seeds and Seed Resolution
//!
//! A seed is looked up by its Seed ID. Seed files are consumed lazily in the
//! order given, and every seed a file yields is cached, so one ordered list
//! of files can satisfy several Seed IDs referenced by a transaction.
//!
//! SECURITY: Seed bytes are zeroized on drop and never logged.

use bip39::Mnemonic;
use secrecy::ExposeSecret;
use std::fmt;
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

use crate::error::{SignError, SignResult};
use crate::types::SeedId;
use crate::utils::crypto::seed_id_for;
use crate::utils::{Prompter, SigningSession};
use crate::{log_debug, log_info};

const MODULE: &str = "coldsign::seed";

/// Secret seed bytes with their Seed ID
pub struct Seed {
    id: SeedId,
    data: Zeroizing<Vec<u8>>,
}

impl Seed {
    /// 128 bits
    pub const MIN_BYTES: usize = 16;
    /// 512 bits
    pub const MAX_BYTES: usize = 64;

    pub fn from_bytes(bytes: Vec<u8>) -> SignResult<Self> {
        let data = Zeroizing::new(bytes);
        if data.len() < Self::MIN_BYTES || data.len() > Self::MAX_BYTES {
            return Err(SignError::invalid_input(format!(
                "Invalid seed length: {} bits (must be 128-512)",
                data.len() * 8
            )));
        }
        Ok(Self {
            id: seed_id_for(&data),
            data,
        })
    }

    /// Parse seed data: a BIP39 mnemonic phrase or a hex string
    pub fn parse(text: &str) -> SignResult<Self> {
        let text = text.trim();
        if text.split_whitespace().count() > 1 {
            let mnemonic = Mnemonic::parse(text)?;
            Self::from_bytes(mnemonic.to_entropy())
        } else {
            Self::from_bytes(hex::decode(text)?)
        }
    }

    pub fn id(&self) -> &SeedId {
        &self.id
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bits(&self) -> usize {
        self.data.len() * 8
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed")
            .field("id", &self.id)
            .field("bits", &self.bits())
            .finish()
    }
}

/// Something that turns a seed-source file into seeds
pub trait SeedSource {
    fn read_seeds(&self, path: &Path) -> SignResult<Vec<Seed>>;
}

/// Reads seed files, detecting the format of each entry from its content.
/// One seed per non-comment line; hex or mnemonic entries may be mixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSeedSource;

impl SeedSource for FileSeedSource {
    fn read_seeds(&self, path: &Path) -> SignResult<Vec<Seed>> {
        let text = Zeroizing::new(fs::read_to_string(path).map_err(|e| {
            SignError::missing_input(format!("Cannot read seed file '{}': {}", path.display(), e))
        })?);

        let seeds = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(Seed::parse)
            .collect::<SignResult<Vec<_>>>()
            .map_err(|e| e.with_details(format!("seed file '{}'", path.display())))?;

        if seeds.is_empty() {
            return Err(SignError::parse_error(format!(
                "Seed file '{}' contains no seed data",
                path.display()
            )));
        }
        Ok(seeds)
    }
}

/// Finds the seed for a Seed ID, reading seed files or prompting as needed
pub struct SeedResolver<'a> {
    source: &'a dyn SeedSource,
    prompter: &'a dyn Prompter,
    interactive: bool,
}

impl<'a> SeedResolver<'a> {
    pub fn new(source: &'a dyn SeedSource, prompter: &'a dyn Prompter, interactive: bool) -> Self {
        Self {
            source,
            prompter,
            interactive,
        }
    }

    /// Return the cached seed for `seed_id`, loading seed files until it
    /// appears. Every seed read along the way is cached.
    pub fn resolve<'s>(&self, seed_id: &SeedId, session: &'s mut SigningSession) -> SignResult<&'s Seed> {
        while !session.has_seed(seed_id) {
            match session.next_seed_file() {
                Some(path) => {
                    let seeds = self.source.read_seeds(&path)?;
                    log_debug!(MODULE, "Read seed file", file = path.display(), count = seeds.len());
                    for seed in seeds {
                        let id = seed.id().clone();
                        if session.cache_seed(seed) {
                            log_debug!(MODULE, "Cached seed", seed_id = id);
                        }
                    }
                }
                None if self.interactive => {
                    log_info!(MODULE, format!("Need seed data for Seed ID {}", seed_id));
                    let data = self.prompter.seed_data(seed_id)?;
                    let seed = Seed::parse(data.expose_secret())?;
                    let produced = seed.id().clone();
                    log_info!(MODULE, format!("User input produced Seed ID {}", produced));
                    session.cache_seed(seed);
                    if &produced != seed_id {
                        return Err(SignError::no_seed_source(format!(
                            "No seed source found for Seed ID: {}",
                            seed_id
                        ))
                        .with_details(format!("user input produced Seed ID {}", produced)));
                    }
                }
                None => {
                    return Err(SignError::no_seed_source(format!(
                        "No seed source found for Seed ID: {}",
                        seed_id
                    )));
                }
            }
        }

        session
            .seed(seed_id)
            .ok_or_else(|| SignError::internal(format!("Seed {} vanished from cache", seed_id)))
    }
}
