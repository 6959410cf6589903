use crate::*;
use log::{info, warn};

/// Insert this node's hashed share among the other nodes' so that the result is in node order
pub fn assemble_lvcc_hashes(
    node_id: u8,
    total_nodes: u8,
    own_hash: &str,
    other_hashes: &[String],
) -> Result<Vec<String>, ValidationError> {
    if node_id == 0 || node_id > total_nodes {
        return Err(ValidationError::InvalidNodeId(node_id));
    }
    let expected = total_nodes as usize - 1;
    if other_hashes.len() != expected {
        return Err(ValidationError::WrongNumberOfHashes(expected, other_hashes.len()));
    }

    let mut hashes = other_hashes.to_vec();
    hashes.insert(node_id as usize - 1, own_hash.to_owned());
    Ok(hashes)
}

/// hhlVCC_id = base64(recursiveHash(("VerifyLVCCHash", ee, vcs, vc_id), (hlVCC_1, ..., hlVCC_n)))
pub fn combine_lvcc_hashes(
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
    hashes: &[String],
) -> String {
    let aux = Hashable::from(vec![
        "VerifyLVCCHash",
        election_event_id,
        verification_card_set_id,
        verification_card_id,
    ]);
    let mut values = vec![aux];
    values.extend(hashes.iter().map(Hashable::from));
    recursive_hash_base64(&values)
}

/// VerifyLVCCHash: check that the combination of every node's hashed long vote cast return code
/// share is in the verification card set's allow-list and, if it is, confirm the vote.
///
/// Returns `Ok(false)` when the combination is not allowed. The voter may then try again for as
/// long as confirmation attempts are left.
pub fn verify_lvcc_hash<S: Store>(
    store: &mut S,
    context: &ReturnCodesNodeContext,
    verification_card_id: &str,
    own_hash: &str,
    other_hashes: &[String],
) -> Result<bool, Error> {
    validate_uuid(verification_card_id)?;
    let hashes = assemble_lvcc_hashes(context.node_id, context.total_nodes, own_hash, other_hashes)?;

    let ee = context.election_event_id.as_str();
    let vcs = context.verification_card_set_id.as_str();

    let mut state = store.verification_card_state(verification_card_id)?;
    store.verification_card_in_set(verification_card_id, vcs)?;
    state.ensure_confirmable(verification_card_id)?;
    let set = store.verification_card_set(vcs)?;

    let hhlvcc = combine_lvcc_hashes(ee, vcs, verification_card_id, &hashes);
    if !set.long_vote_cast_allow_list.contains(&hhlvcc) {
        warn!(
            "VerifyLVCCHash: node {} could not confirm verification card {} of set {} in election event {}, attempt {} of {}",
            context.node_id,
            verification_card_id,
            vcs,
            ee,
            state.confirmation_attempts,
            context.max_confirmation_attempts
        );
        return Ok(false);
    }

    state.confirm();
    store.set_verification_card_state(verification_card_id, state);

    info!(
        "VerifyLVCCHash: node {} confirmed verification card {} of set {} in election event {}",
        context.node_id, verification_card_id, vcs, ee
    );
    Ok(true)
}
