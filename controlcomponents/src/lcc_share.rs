use crate::*;
use log::{info, warn};
use rand::{CryptoRng, RngCore};
use std::collections::HashSet;

/// A node's partial decryption of a voter's encrypted partial choice return codes
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PartialDecryptPCCOutput {
    pub verification_card_id: String,

    /// gamma^sk_CCR_j,i for every partial choice return code
    pub exponentiated_gammas: Vec<GqElement>,
    pub proofs: Vec<ExponentiationProof>,
}

/// PartialDecryptPCC: strip this node's choice return codes key share from the encrypted partial
/// choice return codes, proving each exponentiation against the node's public key.
pub fn partial_decrypt_pcc<S: Store, R: RngCore + CryptoRng>(
    store: &mut S,
    context: &ReturnCodesNodeContext,
    ccr_keypair: &ElGamalKeyPair,
    verification_card_id: &str,
    encrypted_partial_choice_return_codes: &ElGamalCiphertext,
    rng: &mut R,
) -> Result<PartialDecryptPCCOutput, Error> {
    validate_uuid(verification_card_id)?;
    if encrypted_partial_choice_return_codes.group() != &context.group
        || ccr_keypair.group() != &context.group
    {
        return Err(ValidationError::GroupMismatch.into());
    }
    if encrypted_partial_choice_return_codes.size() > ccr_keypair.size() {
        return Err(ValidationError::LengthMismatch(
            "choice return codes key",
            encrypted_partial_choice_return_codes.size(),
            ccr_keypair.size(),
        )
        .into());
    }

    let mut state = store.verification_card_state(verification_card_id)?;
    state.ensure_not_partially_decrypted(verification_card_id)?;

    let (_, exponentiated_gammas) =
        encrypted_partial_choice_return_codes.partial_decrypt(ccr_keypair.private_key())?;

    let aux = vec![
        context.election_event_id.clone(),
        verification_card_id.to_owned(),
        "PartialDecryptPCC".to_owned(),
        context.node_id.to_string(),
    ];
    let bases = [context.group.generator(), *encrypted_partial_choice_return_codes.gamma()];

    let mut proofs = Vec::with_capacity(exponentiated_gammas.len());
    for (i, d) in exponentiated_gammas.iter().enumerate() {
        let sk = &ccr_keypair.private_key().elements()[i];
        let pk = ccr_keypair.public_key().elements()[i];
        proofs.push(ExponentiationProof::generate(&bases, sk, &[pk, *d], &aux, rng)?);
    }

    state.partially_decrypted = true;
    store.set_verification_card_state(verification_card_id, state);

    info!(
        "PartialDecryptPCC: node {} partially decrypted verification card {} in election event {}",
        context.node_id, verification_card_id, context.election_event_id
    );

    Ok(PartialDecryptPCCOutput {
        verification_card_id: verification_card_id.to_owned(),
        exponentiated_gammas,
        proofs,
    })
}

/// DecryptPCC: combine every node's exponentiated gammas to recover the partial choice return
/// codes, given the nodes' choice return codes public keys in node order
pub fn decrypt_pcc(
    election_event_id: &str,
    encrypted_partial_choice_return_codes: &ElGamalCiphertext,
    node_public_keys: &[ElGamalPublicKey],
    partial_decryptions: &[PartialDecryptPCCOutput],
) -> Result<Vec<GqElement>, ValidationError> {
    ensure_length("partial decryptions", node_public_keys.len(), partial_decryptions.len())?;

    let ciphertext = encrypted_partial_choice_return_codes;
    let group = ciphertext.group();
    let bases = [group.generator(), *ciphertext.gamma()];
    let mut phis = ciphertext.phis().to_vec();

    for (j, (public_key, decryption)) in node_public_keys.iter().zip(partial_decryptions).enumerate() {
        ensure_length("exponentiated gammas", ciphertext.size(), decryption.exponentiated_gammas.len())?;
        ensure_length("partial decryption proofs", ciphertext.size(), decryption.proofs.len())?;
        let aux = vec![
            election_event_id.to_owned(),
            decryption.verification_card_id.clone(),
            "PartialDecryptPCC".to_owned(),
            (j + 1).to_string(),
        ];
        for (i, phi) in phis.iter_mut().enumerate() {
            let d = decryption.exponentiated_gammas[i];
            let pk = public_key.elements()[i];
            if !decryption.proofs[i].verify(&bases, &[pk, d], &aux)? {
                return Err(ValidationError::InvalidProof("PartialDecryptPCC"));
            }
            *phi = phi.divide(&d)?;
        }
    }

    Ok(phis)
}

/// A node's long choice return code shares
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateLCCShareOutput {
    pub verification_card_id: String,
    pub hashed_partial_choice_return_codes: Vec<GqElement>,
    pub long_choice_return_code_shares: Vec<GqElement>,
    pub voter_choice_return_code_generation_public_key: GqElement,
    pub proof: ExponentiationProof,
}

/// The allow-list entry of one hashed partial choice return code
pub fn hash_partial_choice_return_code(
    hashed_partial_choice_return_code: &GqElement,
    verification_card_id: &str,
    election_event_id: &str,
    correctness_id: &str,
) -> String {
    recursive_hash_base64(&[
        hashed_partial_choice_return_code.into(),
        verification_card_id.into(),
        election_event_id.into(),
        correctness_id.into(),
    ])
}

/// CreateLCCShare: check the voter's partial choice return codes against the allow-list and
/// exponentiate them with the voter choice return code exponent.
pub fn create_lcc_share<S: Store, R: RngCore + CryptoRng>(
    store: &mut S,
    context: &ReturnCodesNodeContext,
    return_codes_secret: &ZqElement,
    verification_card_id: &str,
    partial_choice_return_codes: &[GqElement],
    rng: &mut R,
) -> Result<CreateLCCShareOutput, Error> {
    validate_uuid(verification_card_id)?;
    if partial_choice_return_codes.is_empty() {
        return Err(ValidationError::Empty("partial choice return codes").into());
    }
    context.group.ensure_contains(partial_choice_return_codes)?;

    let mut distinct = HashSet::with_capacity(partial_choice_return_codes.len());
    if !partial_choice_return_codes.iter().all(|p| distinct.insert(p.to_bytes())) {
        return Err(ValidationError::DuplicatePartialChoiceReturnCodes.into());
    }

    let mut state = store.verification_card_state(verification_card_id)?;
    state.ensure_long_choice_share_not_created(verification_card_id)?;

    let set = store.verification_card_set(&context.verification_card_set_id)?;
    ensure_length(
        "partial choice return codes",
        set.psi(),
        partial_choice_return_codes.len(),
    )?;

    let ee = context.election_event_id.as_str();
    let hashed: Vec<GqElement> = partial_choice_return_codes.iter().map(hash_and_square).collect();

    for (i, (hpcc, ci)) in hashed.iter().zip(&set.correctness_ids).enumerate() {
        let entry = hash_partial_choice_return_code(hpcc, verification_card_id, ee, ci);
        if !set.partial_choice_allow_list.contains(&entry) {
            warn!(
                "CreateLCCShare: partial choice return code {} of verification card {} in election event {} is not allowed",
                i, verification_card_id, ee
            );
            return Err(ValidationError::PartialChoiceReturnCodeNotAllowed(
                i,
                verification_card_id.to_owned(),
            )
            .into());
        }
    }

    let k = derive_voter_choice_exponent(
        return_codes_secret,
        ee,
        &context.verification_card_set_id,
        verification_card_id,
    )?;
    let k_pub = context.group.exponentiate_generator(&k);
    let shares: Vec<GqElement> = hashed.iter().map(|h| h.exponentiate(&k)).collect();

    let mut bases = vec![context.group.generator()];
    bases.extend_from_slice(&hashed);
    let mut exponentiations = vec![k_pub];
    exponentiations.extend_from_slice(&shares);
    let aux = vec![
        ee.to_owned(),
        verification_card_id.to_owned(),
        "CreateLCCShare".to_owned(),
        context.node_id.to_string(),
    ];
    let proof = ExponentiationProof::generate(&bases, &k, &exponentiations, &aux, rng)?;

    state.long_choice_share_created = true;
    store.set_verification_card_state(verification_card_id, state);

    info!(
        "CreateLCCShare: node {} created long choice return code shares for verification card {} in election event {}",
        context.node_id, verification_card_id, ee
    );

    Ok(CreateLCCShareOutput {
        verification_card_id: verification_card_id.to_owned(),
        hashed_partial_choice_return_codes: hashed,
        long_choice_return_code_shares: shares,
        voter_choice_return_code_generation_public_key: k_pub,
        proof,
    })
}
