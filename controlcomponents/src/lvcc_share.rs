use crate::*;
use log::{error, info};
use rand::{CryptoRng, RngCore};

/// A node's long vote cast return code share for one confirmation attempt
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CreateLVCCShareOutput {
    pub verification_card_id: String,

    /// Index of the attempt this share consumed, starting at 0
    pub confirmation_attempt: u32,

    /// hCK_id
    pub hashed_squared_confirmation_key: GqElement,

    /// lVCC_j,id
    pub long_vote_cast_return_code_share: GqElement,

    /// hlVCC_j,id
    pub hashed_long_vote_cast_return_code_share: String,

    /// Kc_j,id
    pub voter_vote_cast_return_code_generation_public_key: GqElement,

    pub proof: ExponentiationProof,
}

/// The node specific binding of a long vote cast return code share
pub(crate) fn lvcc_share_aux(
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
    node_id: u8,
) -> Vec<String> {
    vec![
        election_event_id.to_owned(),
        verification_card_set_id.to_owned(),
        verification_card_id.to_owned(),
        "CreateLVCCShare".to_owned(),
        node_id.to_string(),
    ]
}

/// hlVCC_j,id = base64(recursiveHash(aux, lVCC_j,id))
pub fn hash_lvcc_share(
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
    node_id: u8,
    long_vote_cast_return_code_share: &GqElement,
) -> String {
    let aux = lvcc_share_aux(
        election_event_id,
        verification_card_set_id,
        verification_card_id,
        node_id,
    );
    recursive_hash_base64(&[aux.into(), long_vote_cast_return_code_share.into()])
}

/// CreateLVCCShare: compute this node's long vote cast return code share from the voter's
/// confirmation key.
///
/// Consumes one confirmation attempt whenever it succeeds, even if the share is never verified.
pub fn create_lvcc_share<S: Store, R: RngCore + CryptoRng>(
    store: &mut S,
    context: &ReturnCodesNodeContext,
    return_codes_secret: &ZqElement,
    verification_card_id: &str,
    confirmation_key: &GqElement,
    rng: &mut R,
) -> Result<CreateLVCCShareOutput, Error> {
    validate_uuid(verification_card_id)?;
    context.group.ensure_contains(&[*confirmation_key])?;

    let ee = context.election_event_id.as_str();
    let vcs = context.verification_card_set_id.as_str();

    let mut state = store.verification_card_state(verification_card_id)?;
    store.verification_card_in_set(verification_card_id, vcs)?;
    state.ensure_confirmable(verification_card_id)?;
    if let Err(e) = state.ensure_attempts_left(verification_card_id, context.max_confirmation_attempts) {
        error!(
            "CreateLVCCShare: verification card {} of set {} in election event {} has no confirmation attempts left on node {}",
            verification_card_id, vcs, ee, context.node_id
        );
        return Err(e);
    }

    let kc = derive_voter_vote_cast_exponent(return_codes_secret, ee, vcs, verification_card_id)?;
    let kc_pub = context.group.exponentiate_generator(&kc);

    let hck = hash_and_square(confirmation_key);
    let lvcc = hck.exponentiate(&kc);
    let hlvcc = hash_lvcc_share(ee, vcs, verification_card_id, context.node_id, &lvcc);

    let attempt = state.confirmation_attempts;
    let mut aux = lvcc_share_aux(ee, vcs, verification_card_id, context.node_id);
    aux.push(attempt.to_string());
    let proof = ExponentiationProof::generate(
        &[context.group.generator(), hck],
        &kc,
        &[kc_pub, lvcc],
        &aux,
        rng,
    )?;

    state.record_confirmation_attempt();
    store.set_verification_card_state(verification_card_id, state);

    info!(
        "CreateLVCCShare: node {} created long vote cast return code share {} for verification card {} in election event {}",
        context.node_id, attempt, verification_card_id, ee
    );

    Ok(CreateLVCCShareOutput {
        verification_card_id: verification_card_id.to_owned(),
        confirmation_attempt: attempt,
        hashed_squared_confirmation_key: hck,
        long_vote_cast_return_code_share: lvcc,
        hashed_long_vote_cast_return_code_share: hlvcc,
        voter_vote_cast_return_code_generation_public_key: kc_pub,
        proof,
    })
}
