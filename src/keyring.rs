use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use age::x25519::{Identity, Recipient};
use thiserror::Error;

/// Key material for the encrypting cache layer: recipients may encrypt,
/// identities may decrypt. Either side may be empty, in which case the cache
/// refuses the corresponding operation instead of guessing.
///
/// A keyring is loaded once and never mutated; rotating keys means building
/// a new cache around a new keyring.
#[derive(Clone)]
pub struct Keyring {
    recipients: Vec<Recipient>,
    identities: Vec<Identity>,
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("recipients", &self.recipients.len())
            .field("identities", &self.identities.len())
            .finish()
    }
}

impl Keyring {
    pub fn new(recipients: Vec<Recipient>, identities: Vec<Identity>) -> Self {
        Self {
            recipients,
            identities,
        }
    }

    /// Reads the recipients (public) and identities (secret) files named by
    /// the operator. Either path may be `None`, leaving that capability off.
    /// The files are age's text format: one key per line, `#` comments and
    /// blank lines ignored.
    pub fn from_files(
        recipients: Option<&Path>,
        identities: Option<&Path>,
    ) -> Result<Self, KeyringError> {
        let recipients = match recipients {
            Some(path) => parse_key_file(path)?,
            None => Vec::new(),
        };
        let identities = match identities {
            Some(path) => parse_key_file(path)?,
            None => Vec::new(),
        };
        Ok(Self {
            recipients,
            identities,
        })
    }

    /// Fresh single-key keyring, for tests and demos.
    pub fn generate() -> Self {
        let identity = Identity::generate();
        Self {
            recipients: vec![identity.to_public()],
            identities: vec![identity],
        }
    }

    /// Keeps the public half only: the result can encrypt but not decrypt.
    pub fn encrypt_only(self) -> Self {
        Self {
            identities: Vec::new(),
            ..self
        }
    }

    /// Keeps the secret half only: the result can decrypt but not encrypt.
    pub fn decrypt_only(self) -> Self {
        Self {
            recipients: Vec::new(),
            ..self
        }
    }

    pub fn can_encrypt(&self) -> bool {
        !self.recipients.is_empty()
    }

    pub fn can_decrypt(&self) -> bool {
        !self.identities.is_empty()
    }

    pub(crate) fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub(crate) fn identities(&self) -> &[Identity] {
        &self.identities
    }
}

fn parse_key_file<K: FromStr>(path: &Path) -> Result<Vec<K>, KeyringError>
where
    K::Err: Display,
{
    let text = std::fs::read_to_string(path).map_err(|err| KeyringError::Io {
        path: path.to_owned(),
        err,
    })?;
    let mut keys = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let key = K::from_str(line).map_err(|err| KeyringError::Parse {
            path: path.to_owned(),
            line: index + 1,
            reason: err.to_string(),
        })?;
        keys.push(key);
    }
    Ok(keys)
}

#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("reading keyring {path:?}: {err}")]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("keyring {path:?} line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}
