use super::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::sync::{Arc, Mutex};
use std::thread;

/// Selections per voter
const PSI: usize = 2;

/// Key width used by the test nodes
const PHI: usize = 4;

struct Voter {
    verification_card_id: String,
    partial_choice_return_codes: Vec<GqElement>,
    confirmation_key: GqElement,
}

/// Four nodes, a setup component and a voting server talking over an in-memory broker
struct Election {
    rng: ChaCha20Rng,
    group: GqGroup,
    election_event_id: String,
    verification_card_set_id: String,
    correctness_ids: Vec<String>,
    setup_key: ElGamalKeyPair,
    nodes: Vec<ControlComponentNode<MemStore>>,
    node_keys: Vec<NodePublicKeys>,
    directory: NodeDirectory,
    broker: MemBroker,
}

impl Election {
    fn new(seed: u64) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let group = GqGroup::default();
        let election_event_id = new_id();

        let mut directory = NodeDirectory::default();
        let mut secrets = Vec::new();
        for node_id in 1..=NODE_COUNT {
            let (secret, public) = generate_keypair();
            directory.insert(node_id, public);
            secrets.push(secret);
        }

        let mut nodes = Vec::new();
        let mut node_keys = Vec::new();
        for (secret, node_id) in secrets.into_iter().zip(1..=NODE_COUNT) {
            let mut config = Config::for_node(node_id).with_secret_key(secret);
            config.phi = PHI;
            let mut node = ControlComponentNode::new(config, group, directory.clone(), MemStore::default()).unwrap();
            node_keys.push(node.generate_keys(&election_event_id, &mut rng).unwrap());
            nodes.push(node);
        }

        let setup_key = ElGamalKeyPair::generate(&group, PSI, &mut rng).unwrap();

        Election {
            rng,
            group,
            election_event_id,
            verification_card_set_id: new_id(),
            correctness_ids: (0..PSI).map(|i| format!("contest-{}", i)).collect(),
            setup_key,
            nodes,
            node_keys,
            directory,
            broker: MemBroker::default(),
        }
    }

    fn message(&self, node_index: usize, correlation_id: &str, request: ReturnCodesRequest) -> Message {
        let payload = ReturnCodesRequestPayload {
            election_event_id: self.election_event_id.clone(),
            verification_card_set_id: self.verification_card_set_id.clone(),
            request,
        };
        Message::new(
            queue_name(RETURN_CODES_REQUEST_PATTERN, node_index as u8 + 1),
            correlation_id.to_owned(),
            serde_json::to_vec(&payload).unwrap(),
        )
    }

    /// Deliver a request and return the node's verified response
    fn deliver(&mut self, message: Message) -> ReturnCodesResponse {
        let (_, node_id) = parse_queue_name(&message.queue).unwrap();
        self.broker.send(message);

        let node = &mut self.nodes[node_id as usize - 1];
        assert_eq!(node.poll(&mut self.broker, &mut self.rng).unwrap(), 1);

        let response = self
            .broker
            .receive(&queue_name(RETURN_CODES_RESPONSE_PATTERN, node_id))
            .unwrap();
        let signed: Signed<ReturnCodesResponsePayload> = serde_json::from_slice(&response.body).unwrap();
        signed.verify_signature(self.directory.get(node_id).unwrap()).unwrap();
        assert_eq!(signed.node_id, node_id);
        assert_eq!(signed.request_id, response.correlation_id);
        signed.into_inner().response
    }

    fn request(&mut self, node_index: usize, request: ReturnCodesRequest) -> ReturnCodesResponse {
        let message = self.message(node_index, &new_id(), request);
        self.deliver(message)
    }

    /// Register a batch of voters on every node and publish the allow-lists
    fn setup(&mut self, n: usize) -> (Vec<Voter>, Vec<GenEncLongCodeSharesOutput>) {
        let mut voters = Vec::new();
        let mut public_keys = Vec::new();
        let mut encrypted_pccs = Vec::new();
        let mut encrypted_cks = Vec::new();
        for _ in 0..n {
            let voter = Voter {
                verification_card_id: new_id(),
                partial_choice_return_codes: (0..PSI).map(|_| self.group.random_element(&mut self.rng)).collect(),
                confirmation_key: self.group.random_element(&mut self.rng),
            };
            public_keys.push(
                ElGamalKeyPair::generate(&self.group, 1, &mut self.rng)
                    .unwrap()
                    .public_key()
                    .clone(),
            );
            encrypted_pccs.push(
                encrypt_hashed_partial_choice_return_codes(
                    &voter.partial_choice_return_codes,
                    self.setup_key.public_key(),
                    &mut self.rng,
                )
                .unwrap(),
            );
            encrypted_cks.push(
                encrypt_hashed_confirmation_key(&voter.confirmation_key, self.setup_key.public_key(), &mut self.rng)
                    .unwrap(),
            );
            voters.push(voter);
        }
        let ids = voters.iter().map(|v| v.verification_card_id.clone()).collect();
        let input = GenEncLongCodeSharesInput::new(ids, public_keys, encrypted_pccs, encrypted_cks).unwrap();

        let mut outputs = Vec::new();
        for j in 0..self.nodes.len() {
            match self.request(j, ReturnCodesRequest::GenEncLongCodeShares(input.clone())) {
                ReturnCodesResponse::GenEncLongCodeShares(output) => outputs.push(output),
                other => panic!("unexpected response {:?}", other),
            }
        }

        let ee = self.election_event_id.clone();
        let vcs = self.verification_card_set_id.clone();
        let mut set = VerificationCardSet::new(&ee, &vcs, self.correctness_ids.clone()).unwrap();
        for (i, voter) in voters.iter().enumerate() {
            let options: Vec<(GqElement, String)> = voter
                .partial_choice_return_codes
                .iter()
                .cloned()
                .zip(self.correctness_ids.iter().cloned())
                .collect();
            set.partial_choice_allow_list
                .extend(partial_choice_allow_list_entries(&ee, &voter.verification_card_id, &options));

            let exponentiated: Vec<ElGamalCiphertext> = outputs
                .iter()
                .map(|o| o.exponentiated_encrypted_confirmation_keys[i].clone())
                .collect();
            let entry = long_vote_cast_allow_list_entry(
                &ee,
                &vcs,
                &voter.verification_card_id,
                self.setup_key.private_key(),
                &exponentiated,
            )
            .unwrap();
            set.long_vote_cast_allow_list.insert(entry);
        }
        for node in self.nodes.iter_mut() {
            node.store_mut().set_verification_card_set(set.clone());
        }

        (voters, outputs)
    }

    fn ccr_public_keys(&self) -> Vec<ElGamalPublicKey> {
        self.node_keys
            .iter()
            .map(|k| k.ccr_choice_return_codes_public_key.clone())
            .collect()
    }

    /// PartialDecryptPCC on every node, DecryptPCC, then CreateLCCShare on every node
    fn send_vote(&mut self, voter: &Voter) -> Vec<CreateLCCShareOutput> {
        let ccr_keys = self.ccr_public_keys();
        let combined = ElGamalPublicKey::combine(&ccr_keys).unwrap();
        let encrypted =
            ElGamalCiphertext::encrypt(&voter.partial_choice_return_codes, &combined, &mut self.rng).unwrap();

        let mut decryptions = Vec::new();
        for j in 0..self.nodes.len() {
            let request = ReturnCodesRequest::PartialDecryptPcc {
                verification_card_id: voter.verification_card_id.clone(),
                encrypted_partial_choice_return_codes: encrypted.clone(),
            };
            match self.request(j, request) {
                ReturnCodesResponse::PartialDecryptPcc(output) => decryptions.push(output),
                other => panic!("unexpected response {:?}", other),
            }
        }
        let pccs = decrypt_pcc(&self.election_event_id, &encrypted, &ccr_keys, &decryptions).unwrap();
        assert_eq!(pccs, voter.partial_choice_return_codes);

        let mut shares = Vec::new();
        for j in 0..self.nodes.len() {
            let request = ReturnCodesRequest::CreateLccShare {
                verification_card_id: voter.verification_card_id.clone(),
                partial_choice_return_codes: pccs.clone(),
            };
            match self.request(j, request) {
                ReturnCodesResponse::CreateLccShare(output) => shares.push(output),
                other => panic!("unexpected response {:?}", other),
            }
        }
        shares
    }

    /// CreateLVCCShare on every node
    fn create_lvcc_shares(&mut self, voter: &Voter, confirmation_key: &GqElement) -> Vec<ReturnCodesResponse> {
        (0..self.nodes.len())
            .map(|j| {
                self.request(
                    j,
                    ReturnCodesRequest::CreateLvccShare {
                        verification_card_id: voter.verification_card_id.clone(),
                        confirmation_key: *confirmation_key,
                    },
                )
            })
            .collect()
    }

    /// VerifyLVCCHash on every node, each given its own hash and the others'
    fn verify_lvcc_hashes(&mut self, voter: &Voter, hashes: &[String]) -> Vec<ReturnCodesResponse> {
        (0..self.nodes.len())
            .map(|j| {
                let mut others = hashes.to_vec();
                let own = others.remove(j);
                self.request(
                    j,
                    ReturnCodesRequest::VerifyLvccHash {
                        verification_card_id: voter.verification_card_id.clone(),
                        hashed_long_vote_cast_return_code_share: own,
                        other_hashed_long_vote_cast_return_code_shares: others,
                    },
                )
            })
            .collect()
    }

    /// One confirmation attempt, returning whether each node confirmed
    fn confirm(&mut self, voter: &Voter, confirmation_key: &GqElement) -> Vec<bool> {
        let hashes: Vec<String> = self
            .create_lvcc_shares(voter, confirmation_key)
            .into_iter()
            .map(|response| match response {
                ReturnCodesResponse::CreateLvccShare(output) => output.hashed_long_vote_cast_return_code_share,
                other => panic!("unexpected response {:?}", other),
            })
            .collect();

        self.verify_lvcc_hashes(voter, &hashes)
            .into_iter()
            .map(|response| match response {
                ReturnCodesResponse::VerifyLvccHash { confirmed, .. } => confirmed,
                other => panic!("unexpected response {:?}", other),
            })
            .collect()
    }

    fn state(&self, node_index: usize, voter: &Voter) -> VerificationCardState {
        self.nodes[node_index]
            .store()
            .verification_card_state(&voter.verification_card_id)
            .unwrap()
    }
}

fn rejection_reason(response: ReturnCodesResponse) -> String {
    match response {
        ReturnCodesResponse::Rejected { reason } => reason,
        other => panic!("expected a rejection, got {:?}", other),
    }
}

#[test]
fn gen_enc_long_code_shares_batch_of_three() {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let group = GqGroup::default();
    let context = ReturnCodesNodeContext::new(
        &Config::for_node(1),
        "0b88257ec32142bb8ee0ed1bb70f362e",
        &new_id(),
        group,
    )
    .unwrap();
    let keys = gen_keys_ccr(&group, PHI, &mut rng).unwrap();
    let setup_key = ElGamalKeyPair::generate(&group, PSI, &mut rng).unwrap();

    let mut ids = Vec::new();
    let mut public_keys = Vec::new();
    let mut pccs = Vec::new();
    let mut cks = Vec::new();
    for _ in 0..3 {
        ids.push(new_id());
        public_keys.push(ElGamalKeyPair::generate(&group, 1, &mut rng).unwrap().public_key().clone());
        let pcc: Vec<GqElement> = (0..PSI).map(|_| group.random_element(&mut rng)).collect();
        pccs.push(encrypt_hashed_partial_choice_return_codes(&pcc, setup_key.public_key(), &mut rng).unwrap());
        let ck = group.random_element(&mut rng);
        cks.push(encrypt_hashed_confirmation_key(&ck, setup_key.public_key(), &mut rng).unwrap());
    }
    let input = GenEncLongCodeSharesInput::new(ids, public_keys, pccs, cks).unwrap();

    let mut store = MemStore::default();
    let output =
        gen_enc_long_code_shares(&mut store, &context, &keys.return_codes_secret, &input, &mut rng).unwrap();
    assert_eq!(output.voter_choice_return_code_generation_public_keys.len(), 3);
    assert_eq!(output.voter_vote_cast_return_code_generation_public_keys.len(), 3);
    assert_eq!(output.exponentiated_encrypted_partial_choice_return_codes.len(), 3);
    assert_eq!(output.proofs_exponentiated_partial_choice_return_codes.len(), 3);
    assert_eq!(output.exponentiated_encrypted_confirmation_keys.len(), 3);
    assert_eq!(output.proofs_exponentiated_confirmation_keys.len(), 3);

    // The same batch again
    assert!(matches!(
        gen_enc_long_code_shares(&mut store, &context, &keys.return_codes_secret, &input, &mut rng),
        Err(Error::AlreadyProcessed(_))
    ));
}

#[test]
fn return_codes_end_to_end() {
    let mut election = Election::new(2);
    let (voters, outputs) = election.setup(2);

    for voter in &voters {
        election.send_vote(voter);
        for j in 0..NODE_COUNT as usize {
            let state = election.state(j, voter);
            assert!(state.partially_decrypted);
            assert!(state.long_choice_share_created);
        }

        let confirmation_key = voter.confirmation_key;
        assert_eq!(election.confirm(voter, &confirmation_key), vec![true; NODE_COUNT as usize]);
        for j in 0..NODE_COUNT as usize {
            let state = election.state(j, voter);
            assert!(state.confirmed);
            assert_eq!(state.confirmation_attempts, 1);
        }
    }

    // Confirmed is terminal
    let voter = &voters[0];
    let confirmation_key = voter.confirmation_key;
    let responses = election.create_lvcc_shares(voter, &confirmation_key);
    for response in responses {
        assert!(rejection_reason(response).contains("already confirmed"));
    }
    let hashes = vec!["h".to_owned(); NODE_COUNT as usize];
    for response in election.verify_lvcc_hashes(voter, &hashes) {
        assert!(rejection_reason(response).contains("already confirmed"));
    }

    // A node never sends a vote twice
    let shares = election.request(
        0,
        ReturnCodesRequest::CreateLccShare {
            verification_card_id: voter.verification_card_id.clone(),
            partial_choice_return_codes: voter.partial_choice_return_codes.clone(),
        },
    );
    assert!(rejection_reason(shares).contains("already created"));
    assert_eq!(outputs.len(), NODE_COUNT as usize);
}

#[test]
fn vote_cast_key_agrees_with_setup() {
    let mut election = Election::new(3);
    let (voters, outputs) = election.setup(3);
    let voter = &voters[1];
    election.send_vote(voter);

    let confirmation_key = voter.confirmation_key;
    for (j, response) in election.create_lvcc_shares(voter, &confirmation_key).into_iter().enumerate() {
        match response {
            ReturnCodesResponse::CreateLvccShare(share) => {
                assert_eq!(
                    share.voter_vote_cast_return_code_generation_public_key,
                    outputs[j].voter_vote_cast_return_code_generation_public_keys[1]
                );
                assert_eq!(share.confirmation_attempt, 0);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }
}

#[test]
fn partial_choice_return_codes_must_be_allowed() {
    let mut election = Election::new(4);
    let (voters, _) = election.setup(1);
    let voter = &voters[0];

    // Codes of another voter, or not in the allow-list at all
    let mut pccs = voter.partial_choice_return_codes.clone();
    pccs[1] = election.group.random_element(&mut election.rng);
    let response = election.request(
        0,
        ReturnCodesRequest::CreateLccShare {
            verification_card_id: voter.verification_card_id.clone(),
            partial_choice_return_codes: pccs,
        },
    );
    assert!(rejection_reason(response).contains("not allowed"));
    assert!(!election.state(0, voter).long_choice_share_created);

    // Confirmation needs the long choice return code share
    let confirmation_key = voter.confirmation_key;
    for response in election.create_lvcc_shares(voter, &confirmation_key) {
        assert!(rejection_reason(response).contains("not created"));
    }
    assert_eq!(election.state(0, voter).confirmation_attempts, 0);
}

#[test]
fn confirmation_attempts_are_bounded() {
    let mut election = Election::new(5);
    let (voters, _) = election.setup(1);
    let voter = &voters[0];
    election.send_vote(voter);

    for attempt in 1..=MAX_CONFIRMATION_ATTEMPTS {
        let wrong = election.group.random_element(&mut election.rng);
        assert_eq!(election.confirm(voter, &wrong), vec![false; NODE_COUNT as usize]);
        for j in 0..NODE_COUNT as usize {
            let state = election.state(j, voter);
            assert_eq!(state.confirmation_attempts, attempt);
            assert!(!state.confirmed);
        }
    }

    // A sixth attempt fails, even with the right confirmation key
    let confirmation_key = voter.confirmation_key;
    for response in election.create_lvcc_shares(voter, &confirmation_key) {
        assert!(rejection_reason(response).contains("exceeded"));
    }
    for j in 0..NODE_COUNT as usize {
        assert_eq!(election.state(j, voter).confirmation_attempts, MAX_CONFIRMATION_ATTEMPTS);
        assert!(!election.state(j, voter).confirmed);
    }
}

#[test]
fn redelivered_requests_do_not_repeat_side_effects() {
    let mut election = Election::new(6);
    let (voters, _) = election.setup(1);
    let voter = &voters[0];
    election.send_vote(voter);

    let correlation_id = new_id();
    let request = ReturnCodesRequest::CreateLvccShare {
        verification_card_id: voter.verification_card_id.clone(),
        confirmation_key: voter.confirmation_key,
    };
    let message = election.message(0, &correlation_id, request);

    let first = election.deliver(message.clone());
    let second = election.deliver(message);
    assert_eq!(first, second);
    assert_eq!(election.state(0, voter).confirmation_attempts, 1);

    // Same correlation id, different request
    let tampered = election.message(
        0,
        &correlation_id,
        ReturnCodesRequest::CreateLvccShare {
            verification_card_id: voter.verification_card_id.clone(),
            confirmation_key: election.group.generator(),
        },
    );
    assert!(rejection_reason(election.deliver(tampered)).contains("does not match"));
    assert_eq!(election.state(0, voter).confirmation_attempts, 1);

    // A vote is partially decrypted once
    let again = election.request(
        0,
        ReturnCodesRequest::PartialDecryptPcc {
            verification_card_id: voter.verification_card_id.clone(),
            encrypted_partial_choice_return_codes: ElGamalCiphertext::encrypt(
                &voter.partial_choice_return_codes,
                &ElGamalPublicKey::combine(&election.ccr_public_keys()).unwrap(),
                &mut ChaCha20Rng::seed_from_u64(60),
            )
            .unwrap(),
        },
    );
    assert!(rejection_reason(again).contains("partially decrypted"));
}

#[test]
fn concurrent_attempts_respect_the_bound() {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let group = GqGroup::default();
    let context =
        ReturnCodesNodeContext::new(&Config::for_node(2), &new_id(), &new_id(), group).unwrap();
    let secret = ZqElement::random(&mut rng);
    let confirmation_key = group.random_element(&mut rng);
    let id = new_id();

    let mut store = MemStore::default();
    store.save_verification_cards(vec![VerificationCard {
        verification_card_id: id.clone(),
        verification_card_set_id: context.verification_card_set_id.clone(),
        public_key: ElGamalKeyPair::generate(&group, 1, &mut rng).unwrap().public_key().clone(),
    }]);
    let mut state = store.get_verification_card_state(&id).unwrap();
    state.long_choice_share_created = true;
    store.set_verification_card_state(&id, state);

    let store = Arc::new(Mutex::new(store));
    let handles: Vec<_> = (0..8u64)
        .map(|i| {
            let store = Arc::clone(&store);
            let context = context.clone();
            let id = id.clone();
            thread::spawn(move || {
                let mut rng = ChaCha20Rng::seed_from_u64(100 + i);
                let mut store = store.lock().unwrap();
                create_lvcc_share(&mut *store, &context, &secret, &id, &confirmation_key, &mut rng)
                    .map(|share| share.confirmation_attempt)
            })
        })
        .collect();

    let mut attempts: Vec<u32> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap().ok())
        .collect();
    attempts.sort();
    assert_eq!(attempts, vec![0, 1, 2, 3, 4]);
    assert_eq!(
        store.lock().unwrap().get_verification_card_state(&id).unwrap().confirmation_attempts,
        MAX_CONFIRMATION_ATTEMPTS
    );
}

fn ballot_box(election: &mut Election, votes: &[GqElement]) -> BallotBox {
    let node_keys: Vec<ElGamalPublicKey> = election
        .node_keys
        .iter()
        .map(|k| k.election_public_key.clone())
        .collect();
    let election_public_key = ElGamalPublicKey::combine(&node_keys).unwrap();
    let ballot_box = BallotBox {
        election_event_id: election.election_event_id.clone(),
        ballot_box_id: new_id(),
        encrypted_votes: votes
            .iter()
            .map(|v| ElGamalCiphertext::encrypt(&[*v], &election_public_key, &mut election.rng).unwrap())
            .collect(),
        node_election_public_keys: node_keys,
    };
    election.nodes[0].store_mut().set_ballot_box(ballot_box.clone());
    ballot_box
}

fn sorted_bytes(elements: &[GqElement]) -> Vec<[u8; 32]> {
    let mut bytes: Vec<[u8; 32]> = elements.iter().map(|e| e.to_bytes()).collect();
    bytes.sort();
    bytes
}

#[test]
fn mixnet_pipeline_end_to_end() {
    let mut election = Election::new(8);
    let votes: Vec<GqElement> = (0..5).map(|_| election.group.random_element(&mut election.rng)).collect();
    let ballot_box = ballot_box(&mut election, &votes);
    let (ee, bb) = (ballot_box.election_event_id.clone(), ballot_box.ballot_box_id.clone());

    let orchestrator = MixnetOrchestrator::new(NODE_COUNT, election.directory.clone()).unwrap();
    let mut store = MemStore::default();
    assert_eq!(orchestrator.status(&store, &ee, &bb), MixDecryptOnlineStatus::NotStarted);

    orchestrator.initiate(&mut store, &mut election.broker, &ee, &bb).unwrap();

    for node_id in 1..=NODE_COUNT {
        assert!(orchestrator.get_final_payload(&store, &ee, &bb).is_none());

        let node = &mut election.nodes[node_id as usize - 1];
        assert_eq!(node.poll(&mut election.broker, &mut election.rng).unwrap(), 1);
        let response = election
            .broker
            .receive(&queue_name(MIXNET_RESPONSE_PATTERN, node_id))
            .unwrap();

        let delivery = orchestrator.on_response(&mut store, &mut election.broker, &response).unwrap();
        assert!(!delivery.is_redelivery());
        assert_eq!(
            orchestrator.count_mix_decrypt_online_payloads(&store, &ee, &bb),
            node_id as usize
        );

        if node_id == 2 {
            // Redelivering node 2's response changes nothing and sends nothing
            let delivery = orchestrator.on_response(&mut store, &mut election.broker, &response).unwrap();
            assert!(delivery.is_redelivery());
            assert_eq!(orchestrator.count_mix_decrypt_online_payloads(&store, &ee, &bb), 2);
            assert_eq!(election.broker.pending(&queue_name(MIXNET_REQUEST_PATTERN, 3)), 1);
        }

        if node_id < NODE_COUNT {
            assert_eq!(orchestrator.status(&store, &ee, &bb), MixDecryptOnlineStatus::Processing);
            let next = election
                .broker
                .peek(&queue_name(MIXNET_REQUEST_PATTERN, node_id + 1))
                .unwrap();
            let request: MixDecryptOnlineRequest = serde_json::from_slice(&next.body).unwrap();
            assert_eq!(request.shuffle_payloads.len(), node_id as usize);
            assert!(request.initial_payload.is_some());
        }
    }

    assert_eq!(orchestrator.status(&store, &ee, &bb), MixDecryptOnlineStatus::Mixed);
    assert_eq!(orchestrator.count_mix_decrypt_online_payloads(&store, &ee, &bb), 4);
    for node_id in 1..=NODE_COUNT {
        assert_eq!(election.broker.pending(&queue_name(MIXNET_REQUEST_PATTERN, node_id)), 0);
    }

    let final_payload = orchestrator.get_final_payload(&store, &ee, &bb).unwrap();
    assert_eq!(final_payload.initial_payload.encrypted_votes, ballot_box.encrypted_votes);
    for (payload, node_id) in final_payload.shuffle_payloads.iter().zip(1..) {
        assert_eq!(payload.node_id, node_id);
        payload.verify_signature(election.directory.get(node_id).unwrap()).unwrap();
    }
    let decrypted: Vec<GqElement> = final_payload.votes().into_iter().flatten().collect();
    assert_eq!(sorted_bytes(&decrypted), sorted_bytes(&votes));

    assert!(matches!(
        orchestrator.initiate(&mut store, &mut election.broker, &ee, &bb),
        Err(Error::PipelineAlreadyComplete(_, _))
    ));
}

#[test]
fn mixnet_pipeline_recovers_from_a_lost_response() {
    let mut election = Election::new(9);
    let votes: Vec<GqElement> = (0..3).map(|_| election.group.random_element(&mut election.rng)).collect();
    let ballot_box = ballot_box(&mut election, &votes);
    let (ee, bb) = (ballot_box.election_event_id.clone(), ballot_box.ballot_box_id.clone());

    let orchestrator = MixnetOrchestrator::new(NODE_COUNT, election.directory.clone()).unwrap();
    let mut store = MemStore::default();
    orchestrator.initiate(&mut store, &mut election.broker, &ee, &bb).unwrap();

    // Node 1 answers but the response never arrives
    election.nodes[0].poll(&mut election.broker, &mut election.rng).unwrap();
    let lost = election
        .broker
        .receive(&queue_name(MIXNET_RESPONSE_PATTERN, 1))
        .unwrap();
    assert_eq!(orchestrator.status(&store, &ee, &bb), MixDecryptOnlineStatus::NotStarted);

    // Retrying resends the same request, node 1 answers from what it recorded
    orchestrator.initiate(&mut store, &mut election.broker, &ee, &bb).unwrap();
    election.nodes[0].poll(&mut election.broker, &mut election.rng).unwrap();
    let response = election
        .broker
        .peek(&queue_name(MIXNET_RESPONSE_PATTERN, 1))
        .unwrap();
    assert_eq!(response, &lost);

    for node_index in 0..NODE_COUNT as usize {
        if node_index > 0 {
            let node = &mut election.nodes[node_index];
            assert_eq!(node.poll(&mut election.broker, &mut election.rng).unwrap(), 1);
        }
        assert_eq!(orchestrator.poll(&mut store, &mut election.broker), 1);
    }
    assert_eq!(orchestrator.status(&store, &ee, &bb), MixDecryptOnlineStatus::Mixed);

    let final_payload = orchestrator.get_final_payload(&store, &ee, &bb).unwrap();
    let decrypted: Vec<GqElement> = final_payload.votes().into_iter().flatten().collect();
    assert_eq!(sorted_bytes(&decrypted), sorted_bytes(&votes));
}

#[test]
fn mixnet_rejects_forged_responses() {
    let mut election = Election::new(10);
    let votes: Vec<GqElement> = (0..2).map(|_| election.group.random_element(&mut election.rng)).collect();
    let ballot_box = ballot_box(&mut election, &votes);
    let (ee, bb) = (ballot_box.election_event_id.clone(), ballot_box.ballot_box_id.clone());

    let orchestrator = MixnetOrchestrator::new(NODE_COUNT, election.directory.clone()).unwrap();
    let mut store = MemStore::default();
    orchestrator.initiate(&mut store, &mut election.broker, &ee, &bb).unwrap();
    election.nodes[0].poll(&mut election.broker, &mut election.rng).unwrap();
    let response = election
        .broker
        .receive(&queue_name(MIXNET_RESPONSE_PATTERN, 1))
        .unwrap();

    // Re-signed by a key that is not node 1's
    let mut forged = match serde_json::from_slice::<MixnetResponse>(&response.body).unwrap() {
        MixnetResponse::Mixed(mixed) => mixed,
        MixnetResponse::Rejected(rejection) => panic!("node 1 rejected: {}", rejection.reason),
    };
    let (other_secret, _) = generate_keypair();
    forged.shuffle_payload = Signed::sign(&other_secret, forged.shuffle_payload.into_inner()).unwrap();
    let forged = Message::new(
        response.queue.clone(),
        response.correlation_id.clone(),
        serde_json::to_vec(&MixnetResponse::Mixed(forged)).unwrap(),
    );
    assert!(orchestrator.on_response(&mut store, &mut election.broker, &forged).is_err());
    assert_eq!(orchestrator.count_mix_decrypt_online_payloads(&store, &ee, &bb), 0);
    assert!(store.get_initial_payload(&ee, &bb).is_none());

    // The genuine response under a correlation id that was never sent
    let unrequested = Message::new(response.queue.clone(), new_id(), response.body.clone());
    assert!(matches!(
        orchestrator.on_response(&mut store, &mut election.broker, &unrequested),
        Err(Error::UnexpectedResponse(_))
    ));

    // The genuine response is still accepted
    orchestrator.on_response(&mut store, &mut election.broker, &response).unwrap();
    assert_eq!(orchestrator.status(&store, &ee, &bb), MixDecryptOnlineStatus::Processing);
}

#[test]
fn mixnet_node_rejects_tampered_chain_and_orchestrator_retries() {
    let mut election = Election::new(11);
    let votes: Vec<GqElement> = (0..2).map(|_| election.group.random_element(&mut election.rng)).collect();
    let ballot_box = ballot_box(&mut election, &votes);
    let (ee, bb) = (ballot_box.election_event_id.clone(), ballot_box.ballot_box_id.clone());

    let orchestrator = MixnetOrchestrator::new(NODE_COUNT, election.directory.clone()).unwrap();
    let mut store = MemStore::default();
    orchestrator.initiate(&mut store, &mut election.broker, &ee, &bb).unwrap();
    election.nodes[0].poll(&mut election.broker, &mut election.rng).unwrap();
    assert_eq!(orchestrator.poll(&mut store, &mut election.broker), 1);

    // Node 1's payload re-signed by a stranger on its way to node 2
    let queue = queue_name(MIXNET_REQUEST_PATTERN, 2);
    let genuine = election.broker.receive(&queue).unwrap();
    let mut request: MixDecryptOnlineRequest = serde_json::from_slice(&genuine.body).unwrap();
    let (other_secret, _) = generate_keypair();
    let previous = request.shuffle_payloads.remove(0).into_inner();
    request.shuffle_payloads.push(Signed::sign(&other_secret, previous).unwrap());
    election.broker.send(Message::new(
        queue.clone(),
        genuine.correlation_id.clone(),
        serde_json::to_vec(&request).unwrap(),
    ));

    assert_eq!(election.nodes[1].poll(&mut election.broker, &mut election.rng).unwrap(), 1);
    assert_eq!(orchestrator.poll(&mut store, &mut election.broker), 1);
    assert_eq!(orchestrator.status(&store, &ee, &bb), MixDecryptOnlineStatus::Error);
    assert_eq!(orchestrator.count_mix_decrypt_online_payloads(&store, &ee, &bb), 1);
    assert_eq!(election.broker.pending(&queue), 0);

    // Initiating again sends the untouched request, which node 2 mixes
    orchestrator.initiate(&mut store, &mut election.broker, &ee, &bb).unwrap();
    let retry = election.broker.peek(&queue).unwrap();
    assert_eq!(retry.body, genuine.body);
    assert_ne!(retry.correlation_id, genuine.correlation_id);

    for node_index in 1..NODE_COUNT as usize {
        let node = &mut election.nodes[node_index];
        assert_eq!(node.poll(&mut election.broker, &mut election.rng).unwrap(), 1);
        assert_eq!(orchestrator.poll(&mut store, &mut election.broker), 1);
    }
    assert_eq!(orchestrator.status(&store, &ee, &bb), MixDecryptOnlineStatus::Mixed);

    let final_payload = orchestrator.get_final_payload(&store, &ee, &bb).unwrap();
    let decrypted: Vec<GqElement> = final_payload.votes().into_iter().flatten().collect();
    assert_eq!(sorted_bytes(&decrypted), sorted_bytes(&votes));
}
