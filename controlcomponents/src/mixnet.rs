use crate::*;
use log::info;
use num_enum::TryFromPrimitive;
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};

pub const MIX_DEC_ONLINE_CONTEXT: &str = "MixDecryptOnline";

/// The encrypted votes of a closed ballot box, as held by the first node
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BallotBox {
    pub election_event_id: String,
    pub ballot_box_id: String,
    pub encrypted_votes: Vec<ElGamalCiphertext>,

    /// Election public key share of every node, in node order
    pub node_election_public_keys: Vec<ElGamalPublicKey>,
}

/// The ballot box as it enters the mix-decrypt chain. Created once, by node 1.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MixnetInitialPayload {
    pub election_event_id: String,
    pub ballot_box_id: String,
    pub encrypted_votes: Vec<ElGamalCiphertext>,

    /// Product of every node's election public key share
    pub election_public_key: ElGamalPublicKey,
    pub node_election_public_keys: Vec<ElGamalPublicKey>,
}

impl Signable for MixnetInitialPayload {}

/// One node's step of the mix-decrypt chain
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MixnetShufflePayload {
    pub election_event_id: String,
    pub ballot_box_id: String,
    pub node_id: u8,

    /// The input re-encrypted under `remaining_public_key` and permuted
    pub shuffled_ciphertexts: Vec<ElGamalCiphertext>,

    /// The shuffled ciphertexts with this node's key share stripped
    pub partially_decrypted_ciphertexts: Vec<ElGamalCiphertext>,

    /// One proof per ciphertext and message element
    pub decryption_proofs: Vec<Vec<ExponentiationProof>>,

    /// Key the input is encrypted under, the product of this and every later node's share
    pub remaining_public_key: ElGamalPublicKey,

    /// Key the output is encrypted under, passed on to the next node
    pub next_public_key: ElGamalPublicKey,

    /// This node's election public key share
    pub node_public_key: ElGamalPublicKey,
}

impl Signable for MixnetShufflePayload {}

/// Request sent to node `node_id`, carrying every shuffle payload of the nodes before it
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MixDecryptOnlineRequest {
    pub election_event_id: String,
    pub ballot_box_id: String,
    pub node_id: u8,
    pub shuffle_payloads: Vec<Signed<MixnetShufflePayload>>,

    /// Node 1's initial payload, sent to every node after the first
    pub initial_payload: Option<Signed<MixnetInitialPayload>>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MixDecryptOnlineResponse {
    pub election_event_id: String,
    pub ballot_box_id: String,
    pub node_id: u8,
    pub shuffle_payload: Signed<MixnetShufflePayload>,

    /// Only present in node 1's response
    pub initial_payload: Option<Signed<MixnetInitialPayload>>,
}

/// A node's refusal to mix, answered in place of a shuffle payload
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MixDecryptOnlineRejection {
    pub election_event_id: String,
    pub ballot_box_id: String,
    pub node_id: u8,
    pub request_id: String,
    pub reason: String,
}

impl Signable for MixDecryptOnlineRejection {}

/// Body of a message on a node's mixnet response queue
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum MixnetResponse {
    Mixed(MixDecryptOnlineResponse),
    Rejected(Signed<MixDecryptOnlineRejection>),
}

impl MixnetResponse {
    pub fn election_event_id(&self) -> &str {
        match self {
            MixnetResponse::Mixed(response) => &response.election_event_id,
            MixnetResponse::Rejected(rejection) => &rejection.election_event_id,
        }
    }

    pub fn ballot_box_id(&self) -> &str {
        match self {
            MixnetResponse::Mixed(response) => &response.ballot_box_id,
            MixnetResponse::Rejected(rejection) => &rejection.ballot_box_id,
        }
    }
}

/// Progress of the mix-decrypt chain of a ballot box
#[derive(Serialize, Deserialize, TryFromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum MixDecryptOnlineStatus {
    NotStarted = 0,
    Processing = 1,
    Mixed = 2,
    Error = 3,
}

impl MixDecryptOnlineStatus {
    pub fn from_count(count: usize, total_nodes: u8) -> Self {
        let total = total_nodes as usize;
        match count {
            0 => MixDecryptOnlineStatus::NotStarted,
            c if c < total => MixDecryptOnlineStatus::Processing,
            c if c == total => MixDecryptOnlineStatus::Mixed,
            _ => MixDecryptOnlineStatus::Error,
        }
    }
}

/// The combined result of a completed chain
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MixnetFinalPayload {
    pub initial_payload: Signed<MixnetInitialPayload>,

    /// Exactly one per node, in node order
    pub shuffle_payloads: Vec<Signed<MixnetShufflePayload>>,
}

impl MixnetFinalPayload {
    /// The decrypted votes, in the order the last node left them
    pub fn votes(&self) -> Vec<Vec<GqElement>> {
        match self.shuffle_payloads.last() {
            Some(last) => last
                .partially_decrypted_ciphertexts
                .iter()
                .map(|c| c.phis().to_vec())
                .collect(),
            None => Vec::new(),
        }
    }
}

fn decryption_aux(election_event_id: &str, ballot_box_id: &str, node_id: u8) -> Vec<String> {
    vec![
        election_event_id.to_owned(),
        ballot_box_id.to_owned(),
        "MixDecOnline".to_owned(),
        node_id.to_string(),
    ]
}

/// Build the initial payload of a ballot box
pub fn create_initial_payload(ballot_box: &BallotBox) -> Result<MixnetInitialPayload, ValidationError> {
    if ballot_box.node_election_public_keys.is_empty() {
        return Err(ValidationError::Empty("node election public keys"));
    }
    let election_public_key = ElGamalPublicKey::combine(&ballot_box.node_election_public_keys)?;

    Ok(MixnetInitialPayload {
        election_event_id: ballot_box.election_event_id.clone(),
        ballot_box_id: ballot_box.ballot_box_id.clone(),
        encrypted_votes: ballot_box.encrypted_votes.clone(),
        election_public_key,
        node_election_public_keys: ballot_box.node_election_public_keys.clone(),
    })
}

/// One node's mix-decrypt step: re-encrypt and permute the input, then strip the node's key share
pub fn mix_dec_online<R: RngCore + CryptoRng>(
    election_event_id: &str,
    ballot_box_id: &str,
    node_id: u8,
    input: &[ElGamalCiphertext],
    remaining_public_key: &ElGamalPublicKey,
    election_keypair: &ElGamalKeyPair,
    rng: &mut R,
) -> Result<MixnetShufflePayload, ValidationError> {
    let node_public_key = election_keypair.public_key();
    let group = node_public_key.group();
    let next_public_key = remaining_public_key.divide(node_public_key)?;

    let mut shuffled = input
        .iter()
        .map(|c| c.re_encrypt(remaining_public_key, rng))
        .collect::<Result<Vec<_>, _>>()?;
    shuffled.shuffle(rng);

    let aux = decryption_aux(election_event_id, ballot_box_id, node_id);
    let mut partially_decrypted = Vec::with_capacity(shuffled.len());
    let mut decryption_proofs = Vec::with_capacity(shuffled.len());
    for ciphertext in &shuffled {
        let (decrypted, exponentiated_gammas) = ciphertext.partial_decrypt(election_keypair.private_key())?;
        let bases = [group.generator(), *ciphertext.gamma()];
        let mut proofs = Vec::with_capacity(exponentiated_gammas.len());
        for (i, d) in exponentiated_gammas.iter().enumerate() {
            proofs.push(ExponentiationProof::generate(
                &bases,
                &election_keypair.private_key().elements()[i],
                &[node_public_key.elements()[i], *d],
                &aux,
                rng,
            )?);
        }
        partially_decrypted.push(decrypted);
        decryption_proofs.push(proofs);
    }

    Ok(MixnetShufflePayload {
        election_event_id: election_event_id.to_owned(),
        ballot_box_id: ballot_box_id.to_owned(),
        node_id,
        shuffled_ciphertexts: shuffled,
        partially_decrypted_ciphertexts: partially_decrypted,
        decryption_proofs,
        remaining_public_key: remaining_public_key.clone(),
        next_public_key,
        node_public_key: node_public_key.clone(),
    })
}

/// Check that a shuffle payload continues the chain: it was produced by the expected node, takes
/// over the key and ciphertext count left by the previous step, and every partial decryption is
/// proven against the node's election public key share.
///
/// The shuffle itself carries no argument, only its decryption is verified.
pub fn verify_shuffle_payload(
    initial: &MixnetInitialPayload,
    previous: Option<&MixnetShufflePayload>,
    payload: &MixnetShufflePayload,
) -> Result<(), ValidationError> {
    if payload.election_event_id != initial.election_event_id || payload.ballot_box_id != initial.ballot_box_id {
        return Err(ValidationError::ContextMismatch);
    }

    let (expected_node, input_count, remaining) = match previous {
        Some(previous) => (
            previous.node_id + 1,
            previous.partially_decrypted_ciphertexts.len(),
            &previous.next_public_key,
        ),
        None => (1, initial.encrypted_votes.len(), &initial.election_public_key),
    };
    if payload.node_id != expected_node {
        return Err(ValidationError::UnexpectedNodeId(expected_node, payload.node_id));
    }

    let node_public_key = initial
        .node_election_public_keys
        .get(payload.node_id as usize - 1)
        .ok_or(ValidationError::UnknownNode(payload.node_id))?;
    if &payload.node_public_key != node_public_key || &payload.remaining_public_key != remaining {
        return Err(ValidationError::InvalidProof("MixDecOnline public key"));
    }
    if payload.next_public_key != remaining.divide(node_public_key)? {
        return Err(ValidationError::InvalidProof("MixDecOnline public key"));
    }

    ensure_length("shuffled ciphertexts", input_count, payload.shuffled_ciphertexts.len())?;
    ensure_length(
        "partially decrypted ciphertexts",
        input_count,
        payload.partially_decrypted_ciphertexts.len(),
    )?;
    ensure_length("decryption proofs", input_count, payload.decryption_proofs.len())?;

    let aux = decryption_aux(&payload.election_event_id, &payload.ballot_box_id, payload.node_id);
    let group = node_public_key.group();
    let steps = payload
        .shuffled_ciphertexts
        .iter()
        .zip(&payload.partially_decrypted_ciphertexts)
        .zip(&payload.decryption_proofs);
    for ((shuffled, decrypted), proofs) in steps {
        if shuffled.gamma() != decrypted.gamma() {
            return Err(ValidationError::InvalidProof("MixDecOnline"));
        }
        ensure_length("decrypted ciphertext", shuffled.size(), decrypted.size())?;
        ensure_length("decryption proofs", shuffled.size(), proofs.len())?;

        let bases = [group.generator(), *shuffled.gamma()];
        for (i, proof) in proofs.iter().enumerate() {
            let d = shuffled.phis()[i].divide(&decrypted.phis()[i])?;
            if !proof.verify(&bases, &[node_public_key.elements()[i], d], &aux)? {
                return Err(ValidationError::InvalidProof("MixDecOnline"));
            }
        }
    }

    info!(
        "MixDecOnline: verified shuffle payload of node {} for ballot box {} of election event {}",
        payload.node_id, payload.ballot_box_id, payload.election_event_id
    );
    Ok(())
}

/// Check everything a node receives before mixing: the initial payload is node 1's, and every
/// shuffle payload is signed by its node and continues the chain.
pub fn verify_mixnet_request(
    request: &MixDecryptOnlineRequest,
    node_directory: &NodeDirectory,
) -> Result<(), ValidationError> {
    if request.shuffle_payloads.is_empty() {
        return Ok(());
    }
    let initial = request
        .initial_payload
        .as_ref()
        .ok_or_else(|| ValidationError::MissingInitialPayload(request.ballot_box_id.clone()))?;
    initial.verify_signature(node_directory.get(1)?)?;
    if initial.election_event_id != request.election_event_id || initial.ballot_box_id != request.ballot_box_id {
        return Err(ValidationError::ContextMismatch);
    }

    let mut previous = None;
    for (payload, node_id) in request.shuffle_payloads.iter().zip(1..) {
        payload.verify_signature(node_directory.get(node_id)?)?;
        verify_shuffle_payload(initial.inner(), previous, payload.inner())?;
        previous = Some(payload.inner());
    }
    Ok(())
}
