use crate::*;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use std::env::var;
use std::str::FromStr;

/// Number of control component nodes
pub const NODE_COUNT: u8 = 4;

/// Confirmation attempts allowed per verification card
pub const MAX_CONFIRMATION_ATTEMPTS: u32 = 5;

/// Maximum number of selectable voting options, the width of the CCR_j choice return codes key
pub const DEFAULT_PHI: usize = 120;

/// Node configuration
#[derive(Debug)]
pub struct Config {
    pub node_id: u8,
    pub total_nodes: u8,
    pub max_confirmation_attempts: u32,
    pub phi: usize,
    pub secret_key: Option<SecretKey>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_id: 1,
            total_nodes: NODE_COUNT,
            max_confirmation_attempts: MAX_CONFIRMATION_ATTEMPTS,
            phi: DEFAULT_PHI,
            secret_key: None,
        }
    }
}

impl Config {
    /// Default configuration for the given node
    pub fn for_node(node_id: u8) -> Self {
        Config {
            node_id,
            ..Config::default()
        }
    }

    /// Read the configuration from CC_* environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, Error> {
        let defaults = Config::default();

        let secret_key = match var("CC_SECRET_KEY") {
            Ok(val) => {
                let bytes = hex::decode(val)
                    .map_err(|e| Error::Config(format!("CC_SECRET_KEY: {}", e)))?;
                Some(SecretKey::from_bytes(&bytes)?)
            }
            Err(_e) => None,
        };

        let config = Config {
            node_id: parse_var("CC_NODE_ID", defaults.node_id)?,
            total_nodes: parse_var("CC_TOTAL_NODES", defaults.total_nodes)?,
            max_confirmation_attempts: parse_var(
                "CC_MAX_CONFIRMATION_ATTEMPTS",
                defaults.max_confirmation_attempts,
            )?,
            phi: parse_var("CC_PHI", defaults.phi)?,
            secret_key,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn with_secret_key(mut self, secret_key: SecretKey) -> Self {
        self.secret_key = Some(secret_key);
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.total_nodes < 2 {
            return Err(Error::Config(format!(
                "at least 2 nodes are required, found {}",
                self.total_nodes
            )));
        }
        if self.node_id == 0 || self.node_id > self.total_nodes {
            return Err(ValidationError::InvalidNodeId(self.node_id).into());
        }
        if self.max_confirmation_attempts == 0 {
            return Err(Error::Config("max_confirmation_attempts must be positive".to_owned()));
        }
        if self.phi == 0 {
            return Err(Error::Config("phi must be positive".to_owned()));
        }
        Ok(())
    }

    /// The node's signing key, required to answer requests
    pub fn signing_key(&self) -> Result<&SecretKey, Error> {
        self.secret_key
            .as_ref()
            .ok_or(Error::MissingSigningKey(self.node_id))
    }

    pub fn public_key(&self) -> Result<PublicKey, Error> {
        Ok(self.signing_key()?.into())
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, Error>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| Error::Config(format!("{}: {}", name, e))),
        Err(_e) => Ok(default),
    }
}
