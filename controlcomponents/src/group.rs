use crate::*;
use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use sha2::Sha512;

/// The prime-order group G_q all return-code and mixnet arithmetic happens in.
///
/// Every group shares the Ristretto255 order q, so a group is identified by its generator.
/// Elements carry their group and operations across groups are rejected.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GqGroup {
    #[serde(with = "RistrettoHex")]
    generator: RistrettoPoint,
}

impl Default for GqGroup {
    fn default() -> Self {
        GqGroup {
            generator: RISTRETTO_BASEPOINT_POINT,
        }
    }
}

impl GqGroup {
    /// Derive an election specific group whose generator has no known discrete log relative to
    /// the basepoint.
    pub fn from_seed(seed: &[u8]) -> Self {
        GqGroup {
            generator: RistrettoPoint::hash_from_bytes::<Sha512>(seed),
        }
    }

    pub fn generator(&self) -> GqElement {
        GqElement {
            value: self.generator,
            group: *self,
        }
    }

    pub fn identity(&self) -> GqElement {
        GqElement {
            value: RistrettoPoint::identity(),
            group: *self,
        }
    }

    /// Raise the generator to the given exponent
    pub fn exponentiate_generator(&self, exponent: &ZqElement) -> GqElement {
        GqElement {
            value: self.generator * exponent.0,
            group: *self,
        }
    }

    /// Deterministically map arbitrary bytes to a group element
    pub fn hash_to_element(&self, bytes: &[u8]) -> GqElement {
        GqElement {
            value: RistrettoPoint::hash_from_bytes::<Sha512>(bytes),
            group: *self,
        }
    }

    pub fn random_element<R: RngCore + CryptoRng>(&self, rng: &mut R) -> GqElement {
        self.exponentiate_generator(&ZqElement::random(rng))
    }

    /// Check that every element belongs to this group
    pub fn ensure_contains<'a, I>(&self, elements: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = &'a GqElement>,
    {
        if elements.into_iter().all(|e| e.group == *self) {
            Ok(())
        } else {
            Err(ValidationError::GroupMismatch)
        }
    }
}

/// An element of G_q
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct GqElement {
    #[serde(with = "RistrettoHex")]
    value: RistrettoPoint,
    group: GqGroup,
}

impl GqElement {
    pub fn group(&self) -> &GqGroup {
        &self.group
    }

    pub fn value(&self) -> &RistrettoPoint {
        &self.value
    }

    pub fn exponentiate(&self, exponent: &ZqElement) -> GqElement {
        GqElement {
            value: self.value * exponent.0,
            group: self.group,
        }
    }

    pub fn multiply(&self, other: &GqElement) -> Result<GqElement, ValidationError> {
        if self.group != other.group {
            return Err(ValidationError::GroupMismatch);
        }
        Ok(GqElement {
            value: self.value + other.value,
            group: self.group,
        })
    }

    pub fn divide(&self, other: &GqElement) -> Result<GqElement, ValidationError> {
        self.multiply(&other.invert())
    }

    pub fn invert(&self) -> GqElement {
        GqElement {
            value: -self.value,
            group: self.group,
        }
    }

    /// Canonical 32-byte encoding
    pub fn to_bytes(&self) -> [u8; 32] {
        self.value.compress().to_bytes()
    }
}

/// An element of Z_q, the exponent field of G_q
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZqElement(#[serde(with = "ScalarHex")] Scalar);

impl ZqElement {
    pub fn new(value: Scalar) -> Self {
        ZqElement(value)
    }

    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        ZqElement(Scalar::random(rng))
    }

    pub fn from_u64(value: u64) -> Self {
        ZqElement(Scalar::from(value))
    }

    /// Reduce 64 uniformly distributed bytes modulo q
    pub fn from_bytes_wide(bytes: &[u8; 64]) -> Self {
        ZqElement(Scalar::from_bytes_mod_order_wide(bytes))
    }

    /// Reduce 32 bytes modulo q
    pub fn from_bytes_mod_order(bytes: [u8; 32]) -> Self {
        ZqElement(Scalar::from_bytes_mod_order(bytes))
    }

    pub fn value(&self) -> &Scalar {
        &self.0
    }

    pub fn add(&self, other: &ZqElement) -> ZqElement {
        ZqElement(self.0 + other.0)
    }

    pub fn multiply(&self, other: &ZqElement) -> ZqElement {
        ZqElement(self.0 * other.0)
    }

    pub fn negate(&self) -> ZqElement {
        ZqElement(-self.0)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }
}
