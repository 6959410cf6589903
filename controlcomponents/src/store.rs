use crate::*;
use std::collections::BTreeMap;

/// Persistent state of a node, or of the mixnet orchestrator.
///
/// Getters return `None` when nothing is recorded. Check-then-act sequences happen while the
/// caller holds `&mut` to the store, wrap it in `Arc<Mutex<_>>` to share it between threads.
pub trait Store {
    fn get_verification_card(&self, verification_card_id: &str) -> Option<VerificationCard>;

    fn set_verification_card(&mut self, card: VerificationCard);

    fn get_verification_card_state(&self, verification_card_id: &str) -> Option<VerificationCardState>;

    fn set_verification_card_state(&mut self, verification_card_id: &str, state: VerificationCardState);

    fn get_verification_card_set(&self, verification_card_set_id: &str) -> Option<VerificationCardSet>;

    fn set_verification_card_set(&mut self, set: VerificationCardSet);

    fn get_node_keys(&self, election_event_id: &str, node_id: u8) -> Option<NodeKeyMaterial>;

    fn set_node_keys(&mut self, election_event_id: &str, node_id: u8, keys: NodeKeyMaterial);

    /// The node's share of the election key, used to mix-decrypt the ballot boxes
    fn get_election_keypair(&self, election_event_id: &str, node_id: u8) -> Option<ElGamalKeyPair>;

    fn set_election_keypair(&mut self, election_event_id: &str, node_id: u8, keypair: ElGamalKeyPair);

    fn get_ballot_box(&self, election_event_id: &str, ballot_box_id: &str) -> Option<BallotBox>;

    fn set_ballot_box(&mut self, ballot_box: BallotBox);

    fn get_processed_message(&self, key: &ExactlyOnceKey) -> Option<ProcessedMessage>;

    fn set_processed_message(&mut self, key: ExactlyOnceKey, processed: ProcessedMessage);

    fn get_initial_payload(
        &self,
        election_event_id: &str,
        ballot_box_id: &str,
    ) -> Option<Signed<MixnetInitialPayload>>;

    fn set_initial_payload(&mut self, payload: Signed<MixnetInitialPayload>);

    /// Every recorded shuffle payload of a ballot box, in node order
    fn get_shuffle_payloads(
        &self,
        election_event_id: &str,
        ballot_box_id: &str,
    ) -> Vec<Signed<MixnetShufflePayload>>;

    fn add_shuffle_payload(&mut self, payload: Signed<MixnetShufflePayload>);

    fn get_pipeline(&self, election_event_id: &str, ballot_box_id: &str) -> Option<PipelineAction>;

    fn set_pipeline(&mut self, election_event_id: &str, ballot_box_id: &str, action: PipelineAction);

    fn verification_card_state(&self, verification_card_id: &str) -> Result<VerificationCardState, Error> {
        self.get_verification_card_state(verification_card_id)
            .ok_or_else(|| Error::VerificationCardStateNotFound(verification_card_id.to_owned()))
    }

    /// The verification card, provided it was registered under the given set
    fn verification_card_in_set(
        &self,
        verification_card_id: &str,
        verification_card_set_id: &str,
    ) -> Result<VerificationCard, Error> {
        let card = self
            .get_verification_card(verification_card_id)
            .ok_or_else(|| Error::VerificationCardNotFound(verification_card_id.to_owned()))?;
        if card.verification_card_set_id != verification_card_set_id {
            return Err(Error::VerificationCardNotInSet(
                verification_card_id.to_owned(),
                verification_card_set_id.to_owned(),
            ));
        }
        Ok(card)
    }

    fn verification_card_set(&self, verification_card_set_id: &str) -> Result<VerificationCardSet, Error> {
        self.get_verification_card_set(verification_card_set_id)
            .ok_or_else(|| Error::VerificationCardSetNotFound(verification_card_set_id.to_owned()))
    }

    fn node_keys(&self, election_event_id: &str, node_id: u8) -> Result<NodeKeyMaterial, Error> {
        self.get_node_keys(election_event_id, node_id)
            .ok_or_else(|| Error::NodeKeysNotFound(election_event_id.to_owned(), node_id))
    }

    fn election_keypair(&self, election_event_id: &str, node_id: u8) -> Result<ElGamalKeyPair, Error> {
        self.get_election_keypair(election_event_id, node_id)
            .ok_or_else(|| Error::NodeKeysNotFound(election_event_id.to_owned(), node_id))
    }

    fn ballot_box(&self, election_event_id: &str, ballot_box_id: &str) -> Result<BallotBox, Error> {
        self.get_ballot_box(election_event_id, ballot_box_id).ok_or_else(|| {
            Error::BallotBoxNotFound(election_event_id.to_owned(), ballot_box_id.to_owned())
        })
    }

    /// Register verification cards, each with a fresh confirmation state
    fn save_verification_cards(&mut self, cards: Vec<VerificationCard>) {
        for card in cards {
            let id = card.verification_card_id.clone();
            self.set_verification_card(card);
            self.set_verification_card_state(&id, VerificationCardState::default());
        }
    }

    /// Persist GenKeysCCR output, refusing to replace key material already generated
    fn save_node_keys(&mut self, election_event_id: &str, node_id: u8, keys: NodeKeyMaterial) -> Result<(), Error> {
        if self.get_node_keys(election_event_id, node_id).is_some() {
            return Err(Error::NodeKeysAlreadyGenerated(election_event_id.to_owned(), node_id));
        }
        self.set_node_keys(election_event_id, node_id, keys);
        Ok(())
    }

    fn save_election_keypair(
        &mut self,
        election_event_id: &str,
        node_id: u8,
        keypair: ElGamalKeyPair,
    ) -> Result<(), Error> {
        if self.get_election_keypair(election_event_id, node_id).is_some() {
            return Err(Error::NodeKeysAlreadyGenerated(election_event_id.to_owned(), node_id));
        }
        self.set_election_keypair(election_event_id, node_id, keypair);
        Ok(())
    }

    /// countMixDecryptOnlinePayloads
    fn count_shuffle_payloads(&self, election_event_id: &str, ballot_box_id: &str) -> usize {
        self.get_shuffle_payloads(election_event_id, ballot_box_id).len()
    }
}

type BallotBoxKey = (String, String);

/// A simple store that uses in-memory BTreeMaps
#[derive(Default, Clone)]
pub struct MemStore {
    verification_cards: BTreeMap<String, VerificationCard>,
    verification_card_states: BTreeMap<String, VerificationCardState>,
    verification_card_sets: BTreeMap<String, VerificationCardSet>,
    node_keys: BTreeMap<(String, u8), NodeKeyMaterial>,
    election_keypairs: BTreeMap<(String, u8), ElGamalKeyPair>,
    ballot_boxes: BTreeMap<BallotBoxKey, BallotBox>,
    processed_messages: BTreeMap<ExactlyOnceKey, ProcessedMessage>,
    initial_payloads: BTreeMap<BallotBoxKey, Signed<MixnetInitialPayload>>,
    shuffle_payloads: BTreeMap<BallotBoxKey, BTreeMap<u8, Signed<MixnetShufflePayload>>>,
    pipelines: BTreeMap<BallotBoxKey, PipelineAction>,
}

fn ballot_box_key(election_event_id: &str, ballot_box_id: &str) -> BallotBoxKey {
    (election_event_id.to_owned(), ballot_box_id.to_owned())
}

impl Store for MemStore {
    fn get_verification_card(&self, verification_card_id: &str) -> Option<VerificationCard> {
        self.verification_cards.get(verification_card_id).cloned()
    }

    fn set_verification_card(&mut self, card: VerificationCard) {
        self.verification_cards
            .insert(card.verification_card_id.clone(), card);
    }

    fn get_verification_card_state(&self, verification_card_id: &str) -> Option<VerificationCardState> {
        self.verification_card_states.get(verification_card_id).copied()
    }

    fn set_verification_card_state(&mut self, verification_card_id: &str, state: VerificationCardState) {
        self.verification_card_states
            .insert(verification_card_id.to_owned(), state);
    }

    fn get_verification_card_set(&self, verification_card_set_id: &str) -> Option<VerificationCardSet> {
        self.verification_card_sets.get(verification_card_set_id).cloned()
    }

    fn set_verification_card_set(&mut self, set: VerificationCardSet) {
        self.verification_card_sets
            .insert(set.verification_card_set_id.clone(), set);
    }

    fn get_node_keys(&self, election_event_id: &str, node_id: u8) -> Option<NodeKeyMaterial> {
        self.node_keys
            .get(&(election_event_id.to_owned(), node_id))
            .cloned()
    }

    fn set_node_keys(&mut self, election_event_id: &str, node_id: u8, keys: NodeKeyMaterial) {
        self.node_keys
            .insert((election_event_id.to_owned(), node_id), keys);
    }

    fn get_election_keypair(&self, election_event_id: &str, node_id: u8) -> Option<ElGamalKeyPair> {
        self.election_keypairs
            .get(&(election_event_id.to_owned(), node_id))
            .cloned()
    }

    fn set_election_keypair(&mut self, election_event_id: &str, node_id: u8, keypair: ElGamalKeyPair) {
        self.election_keypairs
            .insert((election_event_id.to_owned(), node_id), keypair);
    }

    fn get_ballot_box(&self, election_event_id: &str, ballot_box_id: &str) -> Option<BallotBox> {
        self.ballot_boxes
            .get(&ballot_box_key(election_event_id, ballot_box_id))
            .cloned()
    }

    fn set_ballot_box(&mut self, ballot_box: BallotBox) {
        let key = ballot_box_key(&ballot_box.election_event_id, &ballot_box.ballot_box_id);
        self.ballot_boxes.insert(key, ballot_box);
    }

    fn get_processed_message(&self, key: &ExactlyOnceKey) -> Option<ProcessedMessage> {
        self.processed_messages.get(key).cloned()
    }

    fn set_processed_message(&mut self, key: ExactlyOnceKey, processed: ProcessedMessage) {
        self.processed_messages.insert(key, processed);
    }

    fn get_initial_payload(
        &self,
        election_event_id: &str,
        ballot_box_id: &str,
    ) -> Option<Signed<MixnetInitialPayload>> {
        self.initial_payloads
            .get(&ballot_box_key(election_event_id, ballot_box_id))
            .cloned()
    }

    fn set_initial_payload(&mut self, payload: Signed<MixnetInitialPayload>) {
        let key = ballot_box_key(&payload.election_event_id, &payload.ballot_box_id);
        self.initial_payloads.insert(key, payload);
    }

    fn get_shuffle_payloads(
        &self,
        election_event_id: &str,
        ballot_box_id: &str,
    ) -> Vec<Signed<MixnetShufflePayload>> {
        self.shuffle_payloads
            .get(&ballot_box_key(election_event_id, ballot_box_id))
            .map(|payloads| payloads.values().cloned().collect())
            .unwrap_or_default()
    }

    fn add_shuffle_payload(&mut self, payload: Signed<MixnetShufflePayload>) {
        let key = ballot_box_key(&payload.election_event_id, &payload.ballot_box_id);
        self.shuffle_payloads
            .entry(key)
            .or_default()
            .insert(payload.node_id, payload);
    }

    fn get_pipeline(&self, election_event_id: &str, ballot_box_id: &str) -> Option<PipelineAction> {
        self.pipelines
            .get(&ballot_box_key(election_event_id, ballot_box_id))
            .cloned()
    }

    fn set_pipeline(&mut self, election_event_id: &str, ballot_box_id: &str, action: PipelineAction) {
        self.pipelines
            .insert(ballot_box_key(election_event_id, ballot_box_id), action);
    }
}
