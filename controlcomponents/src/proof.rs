use crate::*;
use rand::{CryptoRng, RngCore};

/// Non-interactive proof that y_i = g_i^x for every (g_i, y_i) with the same secret x,
/// bound to a list of auxiliary strings.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExponentiationProof {
    e: ZqElement,
    z: ZqElement,
}

impl ExponentiationProof {
    pub fn generate<R: RngCore + CryptoRng>(
        bases: &[GqElement],
        exponent: &ZqElement,
        exponentiations: &[GqElement],
        auxiliary_information: &[String],
        rng: &mut R,
    ) -> Result<Self, ValidationError> {
        check_statement(bases, exponentiations)?;

        let b = ZqElement::random(rng);
        let commitments: Vec<GqElement> = bases.iter().map(|g| g.exponentiate(&b)).collect();
        let e = challenge(bases, exponentiations, &commitments, auxiliary_information);
        let z = b.add(&e.multiply(exponent));

        Ok(ExponentiationProof { e, z })
    }

    pub fn verify(
        &self,
        bases: &[GqElement],
        exponentiations: &[GqElement],
        auxiliary_information: &[String],
    ) -> Result<bool, ValidationError> {
        check_statement(bases, exponentiations)?;

        let minus_e = self.e.negate();
        let commitments = bases
            .iter()
            .zip(exponentiations)
            .map(|(g, y)| g.exponentiate(&self.z).multiply(&y.exponentiate(&minus_e)))
            .collect::<Result<Vec<_>, _>>()?;

        let e = challenge(bases, exponentiations, &commitments, auxiliary_information);
        Ok(e == self.e)
    }

    pub fn e(&self) -> &ZqElement {
        &self.e
    }

    pub fn z(&self) -> &ZqElement {
        &self.z
    }
}

fn check_statement(bases: &[GqElement], exponentiations: &[GqElement]) -> Result<(), ValidationError> {
    let first = bases.first().ok_or(ValidationError::Empty("proof bases"))?;
    if bases.len() != exponentiations.len() {
        return Err(ValidationError::LengthMismatch(
            "exponentiations",
            bases.len(),
            exponentiations.len(),
        ));
    }
    let group = first.group();
    group.ensure_contains(bases)?;
    group.ensure_contains(exponentiations)?;
    Ok(())
}

fn challenge(
    bases: &[GqElement],
    exponentiations: &[GqElement],
    commitments: &[GqElement],
    auxiliary_information: &[String],
) -> ZqElement {
    let aux: Vec<Hashable> = auxiliary_information.iter().map(Into::into).collect();
    hash_to_zq(&[
        Hashable::from(bases.to_vec()),
        Hashable::from(exponentiations.to_vec()),
        Hashable::from(commitments.to_vec()),
        Hashable::List(aux),
    ])
}
