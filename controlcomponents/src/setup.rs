//! The setup component's side of the return codes protocol: encrypting the voters' hashed
//! partial choice return codes and confirmation keys for the nodes, and computing the
//! allow-lists from the nodes' exponentiated shares.

use crate::*;
use rand::{CryptoRng, RngCore};

/// Encrypt hashAndSquare(pCC_i) for every partial choice return code under the setup key
pub fn encrypt_hashed_partial_choice_return_codes<R: RngCore + CryptoRng>(
    partial_choice_return_codes: &[GqElement],
    setup_public_key: &ElGamalPublicKey,
    rng: &mut R,
) -> Result<ElGamalCiphertext, ValidationError> {
    let hashed: Vec<GqElement> = partial_choice_return_codes.iter().map(hash_and_square).collect();
    ElGamalCiphertext::encrypt(&hashed, setup_public_key, rng)
}

/// Encrypt hashAndSquare(CK) under the setup key
pub fn encrypt_hashed_confirmation_key<R: RngCore + CryptoRng>(
    confirmation_key: &GqElement,
    setup_public_key: &ElGamalPublicKey,
    rng: &mut R,
) -> Result<ElGamalCiphertext, ValidationError> {
    ElGamalCiphertext::encrypt(&[hash_and_square(confirmation_key)], setup_public_key, rng)
}

/// Allow-list entries of every partial choice return code of a voter, paired with the
/// correctness id of the position it may be selected in
pub fn partial_choice_allow_list_entries(
    election_event_id: &str,
    verification_card_id: &str,
    options: &[(GqElement, String)],
) -> Vec<String> {
    options
        .iter()
        .map(|(pcc, correctness_id)| {
            hash_partial_choice_return_code(
                &hash_and_square(pcc),
                verification_card_id,
                election_event_id,
                correctness_id,
            )
        })
        .collect()
}

/// The long vote cast allow-list entry of a voter.
///
/// Decrypts every node's exponentiated encrypted confirmation key, given in node order, to
/// obtain lVCC_j, then hashes and combines the shares exactly like the nodes do.
pub fn long_vote_cast_allow_list_entry(
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
    setup_private_key: &ElGamalPrivateKey,
    exponentiated_encrypted_confirmation_keys: &[ElGamalCiphertext],
) -> Result<String, ValidationError> {
    if exponentiated_encrypted_confirmation_keys.is_empty() {
        return Err(ValidationError::Empty("exponentiated encrypted confirmation keys"));
    }

    let mut hashes = Vec::with_capacity(exponentiated_encrypted_confirmation_keys.len());
    for (j, ciphertext) in exponentiated_encrypted_confirmation_keys.iter().enumerate() {
        ensure_length("exponentiated encrypted confirmation key", 1, ciphertext.size())?;
        let lvcc = ciphertext.decrypt(setup_private_key)?[0];
        hashes.push(hash_lvcc_share(
            election_event_id,
            verification_card_set_id,
            verification_card_id,
            (j + 1) as u8,
            &lvcc,
        ));
    }

    Ok(combine_lvcc_hashes(
        election_event_id,
        verification_card_set_id,
        verification_card_id,
        &hashes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_allow_list_entry_matches_node_computation() {
        let mut rng = ChaCha20Rng::seed_from_u64(60);
        let group = GqGroup::default();
        let setup_key = ElGamalKeyPair::generate(&group, 1, &mut rng).unwrap();
        let (ee, vcs, vc) = (new_id(), new_id(), new_id());

        let ck = group.random_element(&mut rng);
        let encrypted = encrypt_hashed_confirmation_key(&ck, setup_key.public_key(), &mut rng).unwrap();

        // Each node exponentiates with its own kc
        let kcs: Vec<ZqElement> = (0..4).map(|_| ZqElement::random(&mut rng)).collect();
        let exponentiated: Vec<ElGamalCiphertext> = kcs.iter().map(|kc| encrypted.exponentiate(kc)).collect();
        let entry = long_vote_cast_allow_list_entry(&ee, &vcs, &vc, setup_key.private_key(), &exponentiated)
            .unwrap();

        // The voting phase recomputes lVCC_j = hashAndSquare(CK)^kc_j
        let hashes: Vec<String> = kcs
            .iter()
            .enumerate()
            .map(|(j, kc)| {
                let lvcc = hash_and_square(&ck).exponentiate(kc);
                hash_lvcc_share(&ee, &vcs, &vc, (j + 1) as u8, &lvcc)
            })
            .collect();
        assert_eq!(entry, combine_lvcc_hashes(&ee, &vcs, &vc, &hashes));

        // A wrong confirmation key does not match
        let wrong = group.random_element(&mut rng);
        let wrong_hashes: Vec<String> = kcs
            .iter()
            .enumerate()
            .map(|(j, kc)| hash_lvcc_share(&ee, &vcs, &vc, (j + 1) as u8, &hash_and_square(&wrong).exponentiate(kc)))
            .collect();
        assert_ne!(entry, combine_lvcc_hashes(&ee, &vcs, &vc, &wrong_hashes));
    }
}
