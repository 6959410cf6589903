use crate::*;
use sha2::{Digest, Sha256};

const TAG_BYTES: u8 = 0x00;
const TAG_INTEGER: u8 = 0x01;
const TAG_STRING: u8 = 0x02;
const TAG_LIST: u8 = 0x03;
const TAG_ELEMENT: u8 = 0x04;

/// A value that can be fed to `recursive_hash`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hashable {
    Bytes(Vec<u8>),
    Integer(u64),
    Str(String),
    Element(GqElement),
    List(Vec<Hashable>),
}

impl From<&str> for Hashable {
    fn from(s: &str) -> Self {
        Hashable::Str(s.to_owned())
    }
}

impl From<String> for Hashable {
    fn from(s: String) -> Self {
        Hashable::Str(s)
    }
}

impl From<&String> for Hashable {
    fn from(s: &String) -> Self {
        Hashable::Str(s.clone())
    }
}

impl From<GqElement> for Hashable {
    fn from(e: GqElement) -> Self {
        Hashable::Element(e)
    }
}

impl From<&GqElement> for Hashable {
    fn from(e: &GqElement) -> Self {
        Hashable::Element(*e)
    }
}

impl From<u64> for Hashable {
    fn from(i: u64) -> Self {
        Hashable::Integer(i)
    }
}

impl<T: Into<Hashable>> From<Vec<T>> for Hashable {
    fn from(values: Vec<T>) -> Self {
        Hashable::List(values.into_iter().map(Into::into).collect())
    }
}

impl Hashable {
    fn digest(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        match self {
            Hashable::Bytes(bytes) => {
                hasher.update(&[TAG_BYTES]);
                hasher.update(bytes);
            }
            Hashable::Integer(i) => {
                hasher.update(&[TAG_INTEGER]);
                hasher.update(&i.to_be_bytes());
            }
            Hashable::Str(s) => {
                hasher.update(&[TAG_STRING]);
                hasher.update(s.as_bytes());
            }
            Hashable::Element(e) => {
                hasher.update(&[TAG_ELEMENT]);
                hasher.update(&e.to_bytes());
            }
            Hashable::List(values) => {
                hasher.update(&[TAG_LIST]);
                for value in values {
                    hasher.update(&value.digest());
                }
            }
        }
        hasher.finalize().to_vec()
    }
}

/// Hash a single value, or several values as the list of those values
pub fn recursive_hash(values: &[Hashable]) -> Vec<u8> {
    match values {
        [single] => single.digest(),
        _ => Hashable::List(values.to_vec()).digest(),
    }
}

/// Base64 of `recursive_hash`
pub fn recursive_hash_base64(values: &[Hashable]) -> String {
    base64::encode(&recursive_hash(values))
}

/// Map a group element to a pseudo-random group element
pub fn hash_and_square(element: &GqElement) -> GqElement {
    let digest = recursive_hash(&[Hashable::Element(*element)]);
    element.group().hash_to_element(&digest)
}

/// Hash to an exponent, used for Fiat-Shamir challenges
pub fn hash_to_zq(values: &[Hashable]) -> ZqElement {
    let digest = recursive_hash(values);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    ZqElement::from_bytes_mod_order(bytes)
}
