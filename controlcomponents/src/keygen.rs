use crate::*;
use rand::{CryptoRng, RngCore};

/// Key material of one node for one election event
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NodeKeyMaterial {
    /// (pk_CCR_j, sk_CCR_j), used to partially decrypt the encrypted partial choice return codes
    pub ccr_choice_return_codes_keypair: ElGamalKeyPair,

    /// k'_j, from which every voter specific return code exponent is derived
    pub return_codes_secret: ZqElement,
}

impl NodeKeyMaterial {
    pub fn group(&self) -> &GqGroup {
        self.ccr_choice_return_codes_keypair.group()
    }
}

/// GenKeysCCR: generate a node's choice return codes keypair of width phi and its return codes
/// secret. Two calls return unrelated key material, callers persist it with
/// `Store::save_node_keys` which refuses to overwrite.
pub fn gen_keys_ccr<R: RngCore + CryptoRng>(
    group: &GqGroup,
    phi: usize,
    rng: &mut R,
) -> Result<NodeKeyMaterial, Error> {
    let ccr_choice_return_codes_keypair = ElGamalKeyPair::generate(group, phi, rng)?;
    let return_codes_secret = ZqElement::random(rng);

    Ok(NodeKeyMaterial {
        ccr_choice_return_codes_keypair,
        return_codes_secret,
    })
}
