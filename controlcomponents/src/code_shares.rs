use crate::*;
use log::{error, info};
use rand::{CryptoRng, RngCore};

/// A batch of verification cards of one verification card set, as prepared by the setup component
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GenEncLongCodeSharesInput {
    pub verification_card_ids: Vec<String>,
    pub verification_card_public_keys: Vec<ElGamalPublicKey>,

    /// Encrypted hashed partial choice return codes, one ciphertext per voter
    pub encrypted_hashed_partial_choice_return_codes: Vec<ElGamalCiphertext>,

    /// Encrypted hashed confirmation keys, one ciphertext per voter
    pub encrypted_hashed_confirmation_keys: Vec<ElGamalCiphertext>,
}

impl GenEncLongCodeSharesInput {
    pub fn new(
        verification_card_ids: Vec<String>,
        verification_card_public_keys: Vec<ElGamalPublicKey>,
        encrypted_hashed_partial_choice_return_codes: Vec<ElGamalCiphertext>,
        encrypted_hashed_confirmation_keys: Vec<ElGamalCiphertext>,
    ) -> Result<Self, ValidationError> {
        let input = GenEncLongCodeSharesInput {
            verification_card_ids,
            verification_card_public_keys,
            encrypted_hashed_partial_choice_return_codes,
            encrypted_hashed_confirmation_keys,
        };
        input.validate()?;
        Ok(input)
    }

    /// Lengths match, identifiers are unique UUIDs and all ciphertexts share a group
    pub fn validate(&self) -> Result<(), ValidationError> {
        let n = self.verification_card_ids.len();
        if n == 0 {
            return Err(ValidationError::Empty("verification card ids"));
        }
        ensure_length("verification card public keys", n, self.verification_card_public_keys.len())?;
        ensure_length(
            "encrypted hashed partial choice return codes",
            n,
            self.encrypted_hashed_partial_choice_return_codes.len(),
        )?;
        ensure_length(
            "encrypted hashed confirmation keys",
            n,
            self.encrypted_hashed_confirmation_keys.len(),
        )?;
        validate_unique_uuids(&self.verification_card_ids)?;

        let group = self.group();
        let same_group = self
            .encrypted_hashed_partial_choice_return_codes
            .iter()
            .chain(&self.encrypted_hashed_confirmation_keys)
            .all(|c| c.group() == group)
            && self.verification_card_public_keys.iter().all(|k| k.group() == group);
        if !same_group {
            return Err(ValidationError::GroupMismatch);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.verification_card_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verification_card_ids.is_empty()
    }

    fn group(&self) -> &GqGroup {
        self.encrypted_hashed_confirmation_keys[0].group()
    }
}

/// The node's exponentiated shares for a batch, with one proof per exponentiation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GenEncLongCodeSharesOutput {
    /// K_j,id
    pub voter_choice_return_code_generation_public_keys: Vec<GqElement>,

    /// Kc_j,id
    pub voter_vote_cast_return_code_generation_public_keys: Vec<GqElement>,

    pub exponentiated_encrypted_partial_choice_return_codes: Vec<ElGamalCiphertext>,
    pub proofs_exponentiated_partial_choice_return_codes: Vec<ExponentiationProof>,

    pub exponentiated_encrypted_confirmation_keys: Vec<ElGamalCiphertext>,
    pub proofs_exponentiated_confirmation_keys: Vec<ExponentiationProof>,
}

impl GenEncLongCodeSharesOutput {
    fn with_capacity(n: usize) -> Self {
        GenEncLongCodeSharesOutput {
            voter_choice_return_code_generation_public_keys: Vec::with_capacity(n),
            voter_vote_cast_return_code_generation_public_keys: Vec::with_capacity(n),
            exponentiated_encrypted_partial_choice_return_codes: Vec::with_capacity(n),
            proofs_exponentiated_partial_choice_return_codes: Vec::with_capacity(n),
            exponentiated_encrypted_confirmation_keys: Vec::with_capacity(n),
            proofs_exponentiated_confirmation_keys: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.voter_choice_return_code_generation_public_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voter_choice_return_code_generation_public_keys.is_empty()
    }
}

/// GenEncLongCodeShares: exponentiate every voter's encrypted partial choice return codes and
/// encrypted confirmation key with the voter specific exponents derived from the node's return
/// codes secret, and register the verification cards.
///
/// A batch containing a verification card that is already registered fails with
/// `AlreadyProcessed`. Nothing is registered unless every voter of the batch succeeds.
pub fn gen_enc_long_code_shares<S: Store, R: RngCore + CryptoRng>(
    store: &mut S,
    context: &ReturnCodesNodeContext,
    return_codes_secret: &ZqElement,
    input: &GenEncLongCodeSharesInput,
    rng: &mut R,
) -> Result<GenEncLongCodeSharesOutput, Error> {
    input.validate()?;
    if input.group() != &context.group {
        return Err(ValidationError::GroupMismatch.into());
    }

    let ee = context.election_event_id.as_str();
    let vcs = context.verification_card_set_id.as_str();

    for id in &input.verification_card_ids {
        if store.get_verification_card(id).is_some() {
            error!(
                "GenEncLongCodeShares: verification card {} of set {} in election event {} already processed by node {}",
                id, vcs, ee, context.node_id
            );
            return Err(Error::AlreadyProcessed(id.clone()));
        }
    }

    let g = context.group.generator();
    let mut output = GenEncLongCodeSharesOutput::with_capacity(input.len());
    let mut cards = Vec::with_capacity(input.len());

    for (i, id) in input.verification_card_ids.iter().enumerate() {
        let k = derive_voter_choice_exponent(return_codes_secret, ee, vcs, id)?;
        let kc = derive_voter_vote_cast_exponent(return_codes_secret, ee, vcs, id)?;

        let k_pub = context.group.exponentiate_generator(&k);
        let kc_pub = context.group.exponentiate_generator(&kc);

        let pcc = &input.encrypted_hashed_partial_choice_return_codes[i];
        let ck = &input.encrypted_hashed_confirmation_keys[i];
        let exponentiated_pcc = pcc.exponentiate(&k);
        let exponentiated_ck = ck.exponentiate(&kc);

        let aux = vec![
            ee.to_owned(),
            id.clone(),
            "GenEncLongCodeShares".to_owned(),
            context.node_id.to_string(),
        ];

        let pcc_proof = ExponentiationProof::generate(
            &proof_statement(&g, pcc),
            &k,
            &proof_statement(&k_pub, &exponentiated_pcc),
            &aux,
            rng,
        )?;
        let ck_proof = ExponentiationProof::generate(
            &proof_statement(&g, ck),
            &kc,
            &proof_statement(&kc_pub, &exponentiated_ck),
            &aux,
            rng,
        )?;

        output.voter_choice_return_code_generation_public_keys.push(k_pub);
        output.voter_vote_cast_return_code_generation_public_keys.push(kc_pub);
        output.exponentiated_encrypted_partial_choice_return_codes.push(exponentiated_pcc);
        output.proofs_exponentiated_partial_choice_return_codes.push(pcc_proof);
        output.exponentiated_encrypted_confirmation_keys.push(exponentiated_ck);
        output.proofs_exponentiated_confirmation_keys.push(ck_proof);

        cards.push(VerificationCard {
            verification_card_id: id.clone(),
            verification_card_set_id: vcs.to_owned(),
            public_key: input.verification_card_public_keys[i].clone(),
        });
    }

    store.save_verification_cards(cards);

    info!(
        "GenEncLongCodeShares: node {} registered {} verification cards of set {} in election event {}",
        context.node_id,
        output.len(),
        vcs,
        ee
    );

    Ok(output)
}

/// (first, gamma, phi_0, ..., phi_{l-1}), the statement of an exponentiated ciphertext proof
pub(crate) fn proof_statement(first: &GqElement, ciphertext: &ElGamalCiphertext) -> Vec<GqElement> {
    let mut statement = Vec::with_capacity(ciphertext.size() + 2);
    statement.push(*first);
    statement.extend(ciphertext.elements());
    statement
}
