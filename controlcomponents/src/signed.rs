use crate::*;
use ed25519_dalek::ExpandedSecretKey;
use ed25519_dalek::PublicKey;
use ed25519_dalek::SecretKey;
use ed25519_dalek::Signature;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Deref;

/// A payload that a node signs before sending it
pub trait Signable: Serialize {
    fn as_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_cbor::to_vec(&self)?)
    }
}

/// A generic signed payload
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Signed<T: Signable> {
    pub payload: T,

    #[serde(with = "EdPublicKeyHex")]
    pub signer: PublicKey,

    #[serde(with = "EdSignatureHex")]
    pub sig: Signature,
}

impl<T: Signable> Signed<T> {
    /// Sign a payload, producing a Signed<T>
    pub fn sign(secret: &SecretKey, payload: T) -> Result<Self, Error> {
        let public_key = PublicKey::from(secret);
        let serialized = payload.as_bytes()?;

        let expanded: ExpandedSecretKey = secret.into();
        let signature = expanded.sign(&serialized, &public_key);

        Ok(Signed {
            payload,
            signer: public_key,
            sig: signature,
        })
    }

    /// Verify the signature against the key we expect the signer to hold
    pub fn verify_signature(&self, expected: &PublicKey) -> Result<(), ValidationError> {
        if &self.signer != expected {
            return Err(ValidationError::UnexpectedSigner);
        }
        let serialized = self
            .payload
            .as_bytes()
            .map_err(|e| ValidationError::InvalidEncoding(e.to_string()))?;
        Ok(expected.verify_strict(&serialized, &self.sig)?)
    }

    /// Get the inner unsigned payload
    pub fn inner(&self) -> &T {
        &self.payload
    }

    pub fn into_inner(self) -> T {
        self.payload
    }
}

impl<T: Signable> AsRef<T> for Signed<T> {
    fn as_ref(&self) -> &T {
        &self.payload
    }
}

impl<T: Signable> Deref for Signed<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.payload
    }
}

/// Signing public keys of every node, standing in for the nodes' certificates
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeDirectory {
    keys: BTreeMap<u8, NodeKey>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
struct NodeKey(#[serde(with = "EdPublicKeyHex")] PublicKey);

impl NodeDirectory {
    pub fn insert(&mut self, node_id: u8, public_key: PublicKey) {
        self.keys.insert(node_id, NodeKey(public_key));
    }

    pub fn get(&self, node_id: u8) -> Result<&PublicKey, ValidationError> {
        self.keys
            .get(&node_id)
            .map(|key| &key.0)
            .ok_or(ValidationError::UnknownNode(node_id))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Greeting {
        text: String,
    }

    impl Signable for Greeting {}

    #[test]
    fn test_sign_and_verify() {
        let (secret, public) = generate_keypair();
        let (_other_secret, other_public) = generate_keypair();

        let signed = Signed::sign(
            &secret,
            Greeting {
                text: "hello".to_owned(),
            },
        )
        .unwrap();
        assert!(signed.verify_signature(&public).is_ok());
        assert!(signed.verify_signature(&other_public).is_err());
        assert_eq!(signed.text, "hello");

        // Tampering breaks the signature
        let mut tampered = signed.clone();
        tampered.payload.text = "goodbye".to_owned();
        assert!(tampered.verify_signature(&public).is_err());

        // Survives a JSON round trip
        let json = serde_json::to_string(&signed).unwrap();
        let decoded: Signed<Greeting> = serde_json::from_str(&json).unwrap();
        assert!(decoded.verify_signature(&public).is_ok());
    }

    #[test]
    fn test_node_directory() {
        let (_secret, public) = generate_keypair();
        let mut directory = NodeDirectory::default();
        directory.insert(1, public);

        assert_eq!(directory.get(1).unwrap(), &public);
        assert!(matches!(directory.get(2), Err(ValidationError::UnknownNode(2))));

        let json = serde_json::to_string(&directory).unwrap();
        assert_eq!(json, format!("{{\"keys\":{{\"1\":\"{}\"}}}}", hex::encode(public.as_bytes())));
        assert_eq!(serde_json::from_str::<NodeDirectory>(&json).unwrap(), directory);
    }
}
