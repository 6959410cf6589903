use crate::*;
use ed25519_dalek::Keypair;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use std::collections::HashSet;
use uuid::Uuid;

pub fn generate_keypair() -> (SecretKey, PublicKey) {
    let mut csprng = rand::rngs::OsRng {};
    let Keypair { public, secret } = Keypair::generate(&mut csprng);
    (secret, public)
}

/// A fresh identifier: 32 lowercase hexadecimal characters
pub fn new_id() -> String {
    Uuid::new_v4().to_simple().to_string()
}

/// Identifiers are UUIDs in their 32 character hexadecimal form
pub fn validate_uuid(id: &str) -> Result<(), ValidationError> {
    let well_formed = id.len() == 32
        && id.bytes().all(|b| b.is_ascii_hexdigit())
        && Uuid::parse_str(id).is_ok();

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::InvalidUuid(id.to_owned()))
    }
}

/// Validate a list of identifiers, rejecting duplicates
pub fn validate_unique_uuids(ids: &[String]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        validate_uuid(id)?;
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::DuplicateId(id.clone()));
        }
    }
    Ok(())
}

pub(crate) fn ensure_length(
    name: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), ValidationError> {
    if expected != found {
        return Err(ValidationError::LengthMismatch(name, expected, found));
    }
    Ok(())
}
