use crate::*;
use rand::{CryptoRng, RngCore};

/// A multi-recipient ElGamal public key (pk_0, ..., pk_{n-1})
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElGamalPublicKey {
    group: GqGroup,
    elements: Vec<GqElement>,
}

impl ElGamalPublicKey {
    pub fn new(group: GqGroup, elements: Vec<GqElement>) -> Result<Self, ValidationError> {
        if elements.is_empty() {
            return Err(ValidationError::Empty("public key"));
        }
        group.ensure_contains(&elements)?;
        Ok(ElGamalPublicKey { group, elements })
    }

    /// The key whose every element is the identity, encrypting under it does not hide anything.
    pub fn identity(group: GqGroup, size: usize) -> Self {
        ElGamalPublicKey {
            group,
            elements: vec![group.identity(); size],
        }
    }

    /// Element-wise product of public keys
    pub fn combine(keys: &[ElGamalPublicKey]) -> Result<Self, ValidationError> {
        let first = keys.first().ok_or(ValidationError::Empty("public keys"))?;
        let mut combined = ElGamalPublicKey::identity(first.group, first.size());
        for key in keys {
            combined = combined.multiply(key)?;
        }
        Ok(combined)
    }

    pub fn multiply(&self, other: &ElGamalPublicKey) -> Result<Self, ValidationError> {
        ensure_same_size("public key", self.size(), other.size())?;
        let elements = self
            .elements
            .iter()
            .zip(&other.elements)
            .map(|(a, b)| a.multiply(b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ElGamalPublicKey {
            group: self.group,
            elements,
        })
    }

    pub fn divide(&self, other: &ElGamalPublicKey) -> Result<Self, ValidationError> {
        ensure_same_size("public key", self.size(), other.size())?;
        let elements = self
            .elements
            .iter()
            .zip(&other.elements)
            .map(|(a, b)| a.divide(b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ElGamalPublicKey {
            group: self.group,
            elements,
        })
    }

    pub fn group(&self) -> &GqGroup {
        &self.group
    }

    pub fn elements(&self) -> &[GqElement] {
        &self.elements
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }
}

/// A multi-recipient ElGamal private key (sk_0, ..., sk_{n-1})
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElGamalPrivateKey {
    elements: Vec<ZqElement>,
}

impl ElGamalPrivateKey {
    pub fn elements(&self) -> &[ZqElement] {
        &self.elements
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElGamalKeyPair {
    public_key: ElGamalPublicKey,
    private_key: ElGamalPrivateKey,
}

impl ElGamalKeyPair {
    /// Generate a keypair of the given width
    pub fn generate<R: RngCore + CryptoRng>(
        group: &GqGroup,
        size: usize,
        rng: &mut R,
    ) -> Result<Self, ValidationError> {
        if size == 0 {
            return Err(ValidationError::Empty("key pair"));
        }
        let private: Vec<ZqElement> = (0..size).map(|_| ZqElement::random(rng)).collect();
        let public = private
            .iter()
            .map(|sk| group.exponentiate_generator(sk))
            .collect();

        Ok(ElGamalKeyPair {
            public_key: ElGamalPublicKey {
                group: *group,
                elements: public,
            },
            private_key: ElGamalPrivateKey { elements: private },
        })
    }

    pub fn public_key(&self) -> &ElGamalPublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &ElGamalPrivateKey {
        &self.private_key
    }

    pub fn group(&self) -> &GqGroup {
        &self.public_key.group
    }

    pub fn size(&self) -> usize {
        self.public_key.size()
    }
}

/// A multi-recipient ElGamal ciphertext (gamma, phi_0, ..., phi_{l-1})
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ElGamalCiphertext {
    gamma: GqElement,
    phis: Vec<GqElement>,
}

impl ElGamalCiphertext {
    pub fn new(gamma: GqElement, phis: Vec<GqElement>) -> Result<Self, ValidationError> {
        if phis.is_empty() {
            return Err(ValidationError::Empty("ciphertext"));
        }
        gamma.group().ensure_contains(&phis)?;
        Ok(ElGamalCiphertext { gamma, phis })
    }

    /// Encrypt messages under the first messages.len() elements of the public key
    pub fn encrypt<R: RngCore + CryptoRng>(
        messages: &[GqElement],
        public_key: &ElGamalPublicKey,
        rng: &mut R,
    ) -> Result<Self, ValidationError> {
        Self::encrypt_with(messages, &ZqElement::random(rng), public_key)
    }

    pub fn encrypt_with(
        messages: &[GqElement],
        randomness: &ZqElement,
        public_key: &ElGamalPublicKey,
    ) -> Result<Self, ValidationError> {
        if messages.is_empty() {
            return Err(ValidationError::Empty("messages"));
        }
        if messages.len() > public_key.size() {
            return Err(ValidationError::LengthMismatch(
                "messages",
                public_key.size(),
                messages.len(),
            ));
        }
        let group = public_key.group();
        group.ensure_contains(messages)?;

        let gamma = group.exponentiate_generator(randomness);
        let phis = messages
            .iter()
            .zip(public_key.elements())
            .map(|(m, pk)| pk.exponentiate(randomness).multiply(m))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ElGamalCiphertext { gamma, phis })
    }

    pub fn gamma(&self) -> &GqElement {
        &self.gamma
    }

    pub fn phis(&self) -> &[GqElement] {
        &self.phis
    }

    pub fn size(&self) -> usize {
        self.phis.len()
    }

    pub fn group(&self) -> &GqGroup {
        self.gamma.group()
    }

    /// (gamma, phi_0, ..., phi_{l-1})
    pub fn elements(&self) -> Vec<GqElement> {
        let mut elements = Vec::with_capacity(self.phis.len() + 1);
        elements.push(self.gamma);
        elements.extend_from_slice(&self.phis);
        elements
    }

    /// Raise every component to the given exponent
    pub fn exponentiate(&self, exponent: &ZqElement) -> Self {
        ElGamalCiphertext {
            gamma: self.gamma.exponentiate(exponent),
            phis: self.phis.iter().map(|p| p.exponentiate(exponent)).collect(),
        }
    }

    /// Component-wise product, the ciphertext of the product of the plaintexts
    pub fn multiply(&self, other: &ElGamalCiphertext) -> Result<Self, ValidationError> {
        ensure_same_size("ciphertext", self.size(), other.size())?;
        let phis = self
            .phis
            .iter()
            .zip(&other.phis)
            .map(|(a, b)| a.multiply(b))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ElGamalCiphertext {
            gamma: self.gamma.multiply(&other.gamma)?,
            phis,
        })
    }

    /// Re-randomize the ciphertext under the public key it is currently encrypted with
    pub fn re_encrypt<R: RngCore + CryptoRng>(
        &self,
        public_key: &ElGamalPublicKey,
        rng: &mut R,
    ) -> Result<Self, ValidationError> {
        let ones = vec![public_key.group().identity(); self.size()];
        let zero = ElGamalCiphertext::encrypt(&ones, public_key, rng)?;
        self.multiply(&zero)
    }

    /// Decrypt with the first phis.len() elements of the private key
    pub fn decrypt(&self, private_key: &ElGamalPrivateKey) -> Result<Vec<GqElement>, ValidationError> {
        if self.size() > private_key.size() {
            return Err(ValidationError::LengthMismatch(
                "private key",
                self.size(),
                private_key.size(),
            ));
        }
        self.phis
            .iter()
            .zip(private_key.elements())
            .map(|(phi, sk)| phi.divide(&self.gamma.exponentiate(sk)))
            .collect()
    }

    /// Strip one key share: phi_i' = phi_i / gamma^sk_i. Returns the partially decrypted
    /// ciphertext and the exponentiated gammas gamma^sk_i.
    pub fn partial_decrypt(
        &self,
        private_key: &ElGamalPrivateKey,
    ) -> Result<(Self, Vec<GqElement>), ValidationError> {
        if self.size() > private_key.size() {
            return Err(ValidationError::LengthMismatch(
                "private key",
                self.size(),
                private_key.size(),
            ));
        }
        let exponentiated_gammas: Vec<GqElement> = private_key
            .elements()
            .iter()
            .take(self.size())
            .map(|sk| self.gamma.exponentiate(sk))
            .collect();
        let phis = self
            .phis
            .iter()
            .zip(&exponentiated_gammas)
            .map(|(phi, d)| phi.divide(d))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((
            ElGamalCiphertext {
                gamma: self.gamma,
                phis,
            },
            exponentiated_gammas,
        ))
    }
}

fn ensure_same_size(name: &'static str, expected: usize, found: usize) -> Result<(), ValidationError> {
    if expected != found {
        return Err(ValidationError::LengthMismatch(name, expected, found));
    }
    Ok(())
}
