use crate::*;
use hkdf::Hkdf;
use sha2::Sha512;

const VOTER_CHOICE_RETURN_CODE_GENERATION: &str = "VoterChoiceReturnCodeGeneration";
const VOTER_VOTE_CAST_RETURN_CODE_GENERATION: &str = "VoterVoteCastReturnCodeGeneration";

/// Derive an exponent in Z_q from a secret and a list of info strings.
///
/// HKDF-SHA512 keyed by the secret, the info strings are length-prefixed so that
/// ["ab", "c"] and ["a", "bc"] derive different exponents.
pub fn kdf_to_zq(secret: &[u8], info: &[&str]) -> Result<ZqElement, Error> {
    let hkdf = Hkdf::<Sha512>::new(None, secret);

    let mut info_bytes = Vec::new();
    for i in info {
        info_bytes.extend_from_slice(&(i.len() as u32).to_be_bytes());
        info_bytes.extend_from_slice(i.as_bytes());
    }

    let mut okm = [0u8; 64];
    hkdf.expand(&info_bytes, &mut okm).map_err(|_| Error::Kdf)?;

    Ok(ZqElement::from_bytes_wide(&okm))
}

/// k_id, the voter choice return code generation exponent
pub fn derive_voter_choice_exponent(
    return_codes_secret: &ZqElement,
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
) -> Result<ZqElement, Error> {
    kdf_to_zq(
        &return_codes_secret.to_bytes(),
        &[
            VOTER_CHOICE_RETURN_CODE_GENERATION,
            election_event_id,
            verification_card_set_id,
            verification_card_id,
        ],
    )
}

/// kc_id, the voter vote cast return code generation exponent
pub fn derive_voter_vote_cast_exponent(
    return_codes_secret: &ZqElement,
    election_event_id: &str,
    verification_card_set_id: &str,
    verification_card_id: &str,
) -> Result<ZqElement, Error> {
    kdf_to_zq(
        &return_codes_secret.to_bytes(),
        &[
            VOTER_VOTE_CAST_RETURN_CODE_GENERATION,
            election_event_id,
            verification_card_set_id,
            verification_card_id,
        ],
    )
}
