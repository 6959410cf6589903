use crate::Verbosity;
use controlcomponents::*;
use ed25519_dalek::SecretKey;
use rand::rngs::OsRng;

/// Selections per voter in the demo election
const PSI: usize = 2;

pub fn command_e2e(matches: &clap::ArgMatches, verbosity: Verbosity) {
    let voters: usize = match matches.value_of("voters").unwrap_or("3").parse() {
        Ok(voters) if voters > 0 => voters,
        _ => {
            eprintln!("controlcomponents e2e: --voters must be a positive number");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(voters, verbosity) {
        eprintln!("controlcomponents e2e: {}", e);
        std::process::exit(1);
    }
}

struct Voter {
    verification_card_id: String,
    partial_choice_return_codes: Vec<GqElement>,
    confirmation_key: GqElement,
}

/// Every node behind one in-memory broker, seen from the voting server
struct Network {
    election_event_id: String,
    verification_card_set_id: String,
    nodes: Vec<ControlComponentNode<MemStore>>,
    directory: NodeDirectory,
    broker: MemBroker,
}

impl Network {
    fn exchange(&mut self, node_index: usize, request: ReturnCodesRequest) -> Result<ReturnCodesResponse, Error> {
        let node_id = node_index as u8 + 1;
        let payload = ReturnCodesRequestPayload {
            election_event_id: self.election_event_id.clone(),
            verification_card_set_id: self.verification_card_set_id.clone(),
            request,
        };
        self.broker.send(Message::new(
            queue_name(RETURN_CODES_REQUEST_PATTERN, node_id),
            new_id(),
            serde_json::to_vec(&payload)?,
        ));
        self.nodes[node_index].poll(&mut self.broker, &mut OsRng)?;

        let message = self
            .broker
            .receive(&queue_name(RETURN_CODES_RESPONSE_PATTERN, node_id))
            .ok_or_else(|| Error::UnexpectedResponse(format!("node {} did not answer", node_id)))?;
        let signed: Signed<ReturnCodesResponsePayload> = serde_json::from_slice(&message.body)?;
        signed.verify_signature(self.directory.get(node_id)?)?;

        match signed.into_inner().response {
            ReturnCodesResponse::Rejected { reason } => Err(Error::UnexpectedResponse(reason)),
            response => Ok(response),
        }
    }

    fn exchange_all<F>(&mut self, request: F) -> Result<Vec<ReturnCodesResponse>, Error>
    where
        F: Fn(usize) -> ReturnCodesRequest,
    {
        let mut responses = Vec::with_capacity(self.nodes.len());
        for j in 0..self.nodes.len() {
            responses.push(self.exchange(j, request(j))?);
        }
        Ok(responses)
    }
}

fn unexpected(response: ReturnCodesResponse) -> Error {
    Error::UnexpectedResponse(format!("{:?}", response))
}

fn run(num_voters: usize, verbosity: Verbosity) -> Result<(), Error> {
    let base = Config::from_env()?;
    let election_event_id = new_id();
    let group = GqGroup::from_seed(election_event_id.as_bytes());
    let mut rng = OsRng;

    // Nodes and their keys
    let mut directory = NodeDirectory::default();
    let mut secrets = Vec::new();
    for node_id in 1..=base.total_nodes {
        let (secret, public) = generate_keypair();
        directory.insert(node_id, public);
        secrets.push(secret);
    }

    let mut nodes = Vec::new();
    let mut node_keys = Vec::new();
    for (secret, node_id) in secrets.into_iter().zip(1..=base.total_nodes) {
        let config = node_config(&base, node_id, secret);
        let mut node = ControlComponentNode::new(config, group, directory.clone(), MemStore::default())?;
        node_keys.push(node.generate_keys(&election_event_id, &mut rng)?);
        nodes.push(node);
    }
    println!("> Generated keys for {} nodes", nodes.len());

    let mut network = Network {
        election_event_id: election_event_id.clone(),
        verification_card_set_id: new_id(),
        nodes,
        directory,
        broker: MemBroker::default(),
    };
    let ee = election_event_id.as_str();
    let vcs = network.verification_card_set_id.clone();

    // Configuration phase
    let setup_key = ElGamalKeyPair::generate(&group, PSI, &mut rng)?;
    let correctness_ids: Vec<String> = (0..PSI).map(|i| format!("contest-{}", i)).collect();
    let mut voters = Vec::with_capacity(num_voters);
    let mut public_keys = Vec::with_capacity(num_voters);
    let mut encrypted_pccs = Vec::with_capacity(num_voters);
    let mut encrypted_cks = Vec::with_capacity(num_voters);
    for _ in 0..num_voters {
        let voter = Voter {
            verification_card_id: new_id(),
            partial_choice_return_codes: (0..PSI).map(|_| group.random_element(&mut rng)).collect(),
            confirmation_key: group.random_element(&mut rng),
        };
        public_keys.push(ElGamalKeyPair::generate(&group, 1, &mut rng)?.public_key().clone());
        encrypted_pccs.push(encrypt_hashed_partial_choice_return_codes(
            &voter.partial_choice_return_codes,
            setup_key.public_key(),
            &mut rng,
        )?);
        encrypted_cks.push(encrypt_hashed_confirmation_key(
            &voter.confirmation_key,
            setup_key.public_key(),
            &mut rng,
        )?);
        voters.push(voter);
    }
    let ids = voters.iter().map(|v| v.verification_card_id.clone()).collect();
    let input = GenEncLongCodeSharesInput::new(ids, public_keys, encrypted_pccs, encrypted_cks)?;

    let mut outputs = Vec::new();
    for response in network.exchange_all(|_| ReturnCodesRequest::GenEncLongCodeShares(input.clone()))? {
        match response {
            ReturnCodesResponse::GenEncLongCodeShares(output) => outputs.push(output),
            other => return Err(unexpected(other)),
        }
    }

    let mut set = VerificationCardSet::new(ee, &vcs, correctness_ids.clone())?;
    for (i, voter) in voters.iter().enumerate() {
        let options: Vec<(GqElement, String)> = voter
            .partial_choice_return_codes
            .iter()
            .cloned()
            .zip(correctness_ids.iter().cloned())
            .collect();
        set.partial_choice_allow_list
            .extend(partial_choice_allow_list_entries(ee, &voter.verification_card_id, &options));

        let exponentiated: Vec<ElGamalCiphertext> = outputs
            .iter()
            .map(|o| o.exponentiated_encrypted_confirmation_keys[i].clone())
            .collect();
        set.long_vote_cast_allow_list.insert(long_vote_cast_allow_list_entry(
            ee,
            &vcs,
            &voter.verification_card_id,
            setup_key.private_key(),
            &exponentiated,
        )?);
    }
    for node in network.nodes.iter_mut() {
        node.store_mut().set_verification_card_set(set.clone());
    }
    println!("> Registered {} verification cards and published the allow-lists", voters.len());

    // Voting phase
    let ccr_keys: Vec<ElGamalPublicKey> = node_keys
        .iter()
        .map(|k| k.ccr_choice_return_codes_public_key.clone())
        .collect();
    let ccr_key = ElGamalPublicKey::combine(&ccr_keys)?;

    for (i, voter) in voters.iter().enumerate() {
        let vc = voter.verification_card_id.clone();
        let encrypted = ElGamalCiphertext::encrypt(&voter.partial_choice_return_codes, &ccr_key, &mut rng)?;

        let mut decryptions = Vec::new();
        let responses = network.exchange_all(|_| ReturnCodesRequest::PartialDecryptPcc {
            verification_card_id: vc.clone(),
            encrypted_partial_choice_return_codes: encrypted.clone(),
        })?;
        for response in responses {
            match response {
                ReturnCodesResponse::PartialDecryptPcc(output) => decryptions.push(output),
                other => return Err(unexpected(other)),
            }
        }
        let pccs = decrypt_pcc(ee, &encrypted, &ccr_keys, &decryptions)?;
        network.exchange_all(|_| ReturnCodesRequest::CreateLccShare {
            verification_card_id: vc.clone(),
            partial_choice_return_codes: pccs.clone(),
        })?;
        if verbosity as u8 >= Verbosity::Info as u8 {
            println!("  voter {} sent their vote", vc);
        }

        // The first voter mistypes their ballot casting key once
        if i == 0 {
            let wrong = group.random_element(&mut rng);
            let confirmed = confirm(&mut network, &vc, &wrong)?;
            println!("  voter {} confirmed with a wrong key: {}", vc, confirmed);
        }
        let confirmed = confirm(&mut network, &vc, &voter.confirmation_key)?;
        if !confirmed {
            return Err(Error::UnexpectedResponse(format!("voter {} could not confirm", vc)));
        }
    }
    println!("> {} voters sent and confirmed their votes", voters.len());

    // Tally phase
    let node_election_keys: Vec<ElGamalPublicKey> =
        node_keys.iter().map(|k| k.election_public_key.clone()).collect();
    let election_key = ElGamalPublicKey::combine(&node_election_keys)?;
    let votes: Vec<GqElement> = (0..num_voters).map(|_| group.random_element(&mut rng)).collect();
    let ballot_box = BallotBox {
        election_event_id: ee.to_owned(),
        ballot_box_id: new_id(),
        encrypted_votes: votes
            .iter()
            .map(|v| ElGamalCiphertext::encrypt(&[*v], &election_key, &mut rng))
            .collect::<Result<Vec<_>, _>>()?,
        node_election_public_keys: node_election_keys,
    };
    let bb = ballot_box.ballot_box_id.clone();
    network.nodes[0].store_mut().set_ballot_box(ballot_box);

    let orchestrator = MixnetOrchestrator::new(base.total_nodes, network.directory.clone())?;
    let mut store = MemStore::default();
    orchestrator.initiate(&mut store, &mut network.broker, ee, &bb)?;
    for node in network.nodes.iter_mut() {
        node.poll(&mut network.broker, &mut rng)?;
        orchestrator.poll(&mut store, &mut network.broker);
        let status = orchestrator.status(&store, ee, &bb);
        println!(
            "  node {} mixed, status {}",
            node.node_id(),
            serde_json::to_string(&status)?
        );
    }

    let final_payload = orchestrator
        .get_final_payload(&store, ee, &bb)
        .ok_or_else(|| Error::UnexpectedResponse(format!("ballot box {} is not mixed", bb)))?;
    let mut decrypted: Vec<[u8; 32]> = final_payload
        .votes()
        .iter()
        .flatten()
        .map(|v| v.to_bytes())
        .collect();
    let mut expected: Vec<[u8; 32]> = votes.iter().map(|v| v.to_bytes()).collect();
    decrypted.sort();
    expected.sort();
    if decrypted != expected {
        return Err(Error::UnexpectedResponse("decrypted votes do not match".to_owned()));
    }
    println!(
        "> Mixed and decrypted {} votes through {} nodes",
        decrypted.len(),
        orchestrator.count_mix_decrypt_online_payloads(&store, ee, &bb)
    );
    println!("> Election verified OK");

    Ok(())
}

fn node_config(base: &Config, node_id: u8, secret_key: SecretKey) -> Config {
    Config {
        node_id,
        total_nodes: base.total_nodes,
        max_confirmation_attempts: base.max_confirmation_attempts,
        phi: base.phi,
        secret_key: Some(secret_key),
    }
}

/// One confirmation attempt on every node, returning whether all of them confirmed
fn confirm(network: &mut Network, verification_card_id: &str, confirmation_key: &GqElement) -> Result<bool, Error> {
    let mut hashes = Vec::new();
    let responses = network.exchange_all(|_| ReturnCodesRequest::CreateLvccShare {
        verification_card_id: verification_card_id.to_owned(),
        confirmation_key: *confirmation_key,
    })?;
    for response in responses {
        match response {
            ReturnCodesResponse::CreateLvccShare(share) => hashes.push(share.hashed_long_vote_cast_return_code_share),
            other => return Err(unexpected(other)),
        }
    }

    let mut confirmed = true;
    let responses = network.exchange_all(|j| {
        let mut others = hashes.clone();
        let own = others.remove(j);
        ReturnCodesRequest::VerifyLvccHash {
            verification_card_id: verification_card_id.to_owned(),
            hashed_long_vote_cast_return_code_share: own,
            other_hashed_long_vote_cast_return_code_shares: others,
        }
    })?;
    for response in responses {
        match response {
            ReturnCodesResponse::VerifyLvccHash { confirmed: node_confirmed, .. } => confirmed &= node_confirmed,
            other => return Err(unexpected(other)),
        }
    }
    Ok(confirmed)
}
