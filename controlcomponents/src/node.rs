use crate::*;
use log::{error, info};
use rand::{CryptoRng, RngCore};

/// A request of the return codes protocol
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum ReturnCodesRequest {
    GenEncLongCodeShares(GenEncLongCodeSharesInput),
    PartialDecryptPcc {
        verification_card_id: String,
        encrypted_partial_choice_return_codes: ElGamalCiphertext,
    },
    CreateLccShare {
        verification_card_id: String,
        partial_choice_return_codes: Vec<GqElement>,
    },
    CreateLvccShare {
        verification_card_id: String,
        confirmation_key: GqElement,
    },
    VerifyLvccHash {
        verification_card_id: String,
        hashed_long_vote_cast_return_code_share: String,
        other_hashed_long_vote_cast_return_code_shares: Vec<String>,
    },
}

impl ReturnCodesRequest {
    pub fn context(&self) -> &'static str {
        match self {
            ReturnCodesRequest::GenEncLongCodeShares(_) => "GenEncLongCodeShares",
            ReturnCodesRequest::PartialDecryptPcc { .. } => "PartialDecryptPCC",
            ReturnCodesRequest::CreateLccShare { .. } => "CreateLCCShare",
            ReturnCodesRequest::CreateLvccShare { .. } => "CreateLVCCShare",
            ReturnCodesRequest::VerifyLvccHash { .. } => "VerifyLVCCHash",
        }
    }

    /// The verification card a request is about, or None for batch requests
    pub fn verification_card_id(&self) -> Option<&str> {
        match self {
            ReturnCodesRequest::GenEncLongCodeShares(_) => None,
            ReturnCodesRequest::PartialDecryptPcc {
                verification_card_id,
                ..
            }
            | ReturnCodesRequest::CreateLccShare {
                verification_card_id,
                ..
            }
            | ReturnCodesRequest::CreateLvccShare {
                verification_card_id,
                ..
            }
            | ReturnCodesRequest::VerifyLvccHash {
                verification_card_id,
                ..
            } => Some(verification_card_id),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReturnCodesRequestPayload {
    pub election_event_id: String,
    pub verification_card_set_id: String,
    pub request: ReturnCodesRequest,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ReturnCodesResponse {
    GenEncLongCodeShares(GenEncLongCodeSharesOutput),
    PartialDecryptPcc(PartialDecryptPCCOutput),
    CreateLccShare(CreateLCCShareOutput),
    CreateLvccShare(CreateLVCCShareOutput),
    VerifyLvccHash {
        verification_card_id: String,
        confirmed: bool,
    },

    /// The request failed, nothing was changed on the node
    Rejected { reason: String },
}

/// A node's signed answer to a return codes request
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReturnCodesResponsePayload {
    pub election_event_id: String,
    pub verification_card_set_id: String,
    pub request_id: String,
    pub node_id: u8,
    pub response: ReturnCodesResponse,
}

impl Signable for ReturnCodesResponsePayload {}

/// Public keys a node publishes after key generation
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NodePublicKeys {
    pub node_id: u8,
    pub ccr_choice_return_codes_public_key: ElGamalPublicKey,
    pub election_public_key: ElGamalPublicKey,
}

/// A control component node, answering the requests on its own queues
pub struct ControlComponentNode<S: Store> {
    config: Config,
    group: GqGroup,
    node_directory: NodeDirectory,
    store: S,
}

impl<S: Store> ControlComponentNode<S> {
    /// A node needs its signing key and the signing keys of every node, its own included
    pub fn new(config: Config, group: GqGroup, node_directory: NodeDirectory, store: S) -> Result<Self, Error> {
        config.validate()?;
        let public_key = config.public_key()?;
        for node_id in 1..=config.total_nodes {
            node_directory.get(node_id)?;
        }
        if node_directory.get(config.node_id)? != &public_key {
            return Err(ValidationError::UnexpectedSigner.into());
        }

        Ok(ControlComponentNode {
            config,
            group,
            node_directory,
            store,
        })
    }

    pub fn node_id(&self) -> u8 {
        self.config.node_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn group(&self) -> &GqGroup {
        &self.group
    }

    pub fn public_key(&self) -> Result<ed25519_dalek::PublicKey, Error> {
        self.config.public_key()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// GenKeysCCR plus the node's election key share, generated once per election event
    pub fn generate_keys<R: RngCore + CryptoRng>(
        &mut self,
        election_event_id: &str,
        rng: &mut R,
    ) -> Result<NodePublicKeys, Error> {
        validate_uuid(election_event_id)?;
        let node_id = self.node_id();
        if self.store.get_node_keys(election_event_id, node_id).is_some()
            || self.store.get_election_keypair(election_event_id, node_id).is_some()
        {
            error!(
                "GenKeysCCR: node {} already holds keys for election event {}",
                node_id, election_event_id
            );
            return Err(Error::NodeKeysAlreadyGenerated(election_event_id.to_owned(), node_id));
        }

        let keys = gen_keys_ccr(&self.group, self.config.phi, rng)?;
        let election_keypair = ElGamalKeyPair::generate(&self.group, self.config.phi, rng)?;
        let public_keys = NodePublicKeys {
            node_id,
            ccr_choice_return_codes_public_key: keys.ccr_choice_return_codes_keypair.public_key().clone(),
            election_public_key: election_keypair.public_key().clone(),
        };

        self.store.save_node_keys(election_event_id, node_id, keys)?;
        self.store
            .save_election_keypair(election_event_id, node_id, election_keypair)?;

        info!("GenKeysCCR: node {} generated keys for election event {}", node_id, election_event_id);
        Ok(public_keys)
    }

    /// Handle a message from the node's return codes request queue, returning the response to send.
    ///
    /// A redelivered request is answered with the response recorded the first time.
    pub fn handle_return_codes_request<R: RngCore + CryptoRng>(
        &mut self,
        message: &Message,
        rng: &mut R,
    ) -> Result<Message, Error> {
        self.ensure_own_queue(&message.queue, RETURN_CODES_REQUEST_PATTERN)?;
        let payload: ReturnCodesRequestPayload = serde_json::from_slice(&message.body)?;
        let context = ReturnCodesNodeContext::new(
            &self.config,
            &payload.election_event_id,
            &payload.verification_card_set_id,
            self.group,
        )?;

        let key = ExactlyOnceKey {
            correlation_id: message.correlation_id.clone(),
            context_id: payload
                .request
                .verification_card_id()
                .unwrap_or(payload.verification_card_set_id.as_str())
                .to_owned(),
            context: payload.request.context().to_owned(),
            node_id: self.node_id(),
        };

        let config = &self.config;
        let correlation_id = &message.correlation_id;
        let delivery = process_exactly_once(&mut self.store, key, &message.body, |store| {
            let response = run_return_codes_request(store, &context, &payload.request, rng)?;
            let signed = Signed::sign(
                config.signing_key()?,
                ReturnCodesResponsePayload {
                    election_event_id: payload.election_event_id.clone(),
                    verification_card_set_id: payload.verification_card_set_id.clone(),
                    request_id: correlation_id.clone(),
                    node_id: config.node_id,
                    response,
                },
            )?;
            Ok(serde_json::to_vec(&signed)?)
        })?;

        Ok(Message::new(
            queue_name(RETURN_CODES_RESPONSE_PATTERN, self.node_id()),
            message.correlation_id.clone(),
            delivery.into_response(),
        ))
    }

    /// Handle a message from the node's mixnet request queue, returning the response to send
    pub fn handle_mixnet_request<R: RngCore + CryptoRng>(
        &mut self,
        message: &Message,
        rng: &mut R,
    ) -> Result<Message, Error> {
        self.ensure_own_queue(&message.queue, MIXNET_REQUEST_PATTERN)?;
        let request: MixDecryptOnlineRequest = serde_json::from_slice(&message.body)?;
        let node_id = self.node_id();
        if request.node_id != node_id {
            return Err(ValidationError::UnexpectedNodeId(node_id, request.node_id).into());
        }
        let expected = node_id as usize - 1;
        if request.shuffle_payloads.len() != expected {
            return Err(ValidationError::WrongNumberOfShufflePayloads(expected, request.shuffle_payloads.len()).into());
        }

        let key = ExactlyOnceKey {
            correlation_id: message.correlation_id.clone(),
            context_id: format!("{}:{}", request.election_event_id, request.ballot_box_id),
            context: MIX_DEC_ONLINE_CONTEXT.to_owned(),
            node_id,
        };
        let config = &self.config;
        let node_directory = &self.node_directory;
        let delivery = process_exactly_once(&mut self.store, key, &message.body, |store| {
            verify_mixnet_request(&request, node_directory)?;
            let response = run_mixnet_request(store, config, &request, rng)?;
            Ok(serde_json::to_vec(&MixnetResponse::Mixed(response))?)
        })?;

        Ok(Message::new(
            queue_name(MIXNET_RESPONSE_PATTERN, node_id),
            message.correlation_id.clone(),
            delivery.into_response(),
        ))
    }

    /// Answer every request waiting on this node's queues.
    ///
    /// A failed request is answered with a signed rejection.
    pub fn poll<B: Broker, R: RngCore + CryptoRng>(&mut self, broker: &mut B, rng: &mut R) -> Result<usize, Error> {
        let node_id = self.node_id();
        let mut handled = 0;

        let queue = queue_name(RETURN_CODES_REQUEST_PATTERN, node_id);
        while let Some(message) = broker.receive(&queue) {
            let response = match self.handle_return_codes_request(&message, rng) {
                Ok(response) => response,
                Err(e) => {
                    error!(
                        "node {}: return codes request {} failed: {}",
                        node_id, message.correlation_id, e
                    );
                    self.rejection(&message, &e)?
                }
            };
            broker.send(response);
            handled += 1;
        }

        let queue = queue_name(MIXNET_REQUEST_PATTERN, node_id);
        while let Some(message) = broker.receive(&queue) {
            let response = match self.handle_mixnet_request(&message, rng) {
                Ok(response) => response,
                Err(e) => {
                    error!(
                        "node {}: mixnet request {} failed: {}",
                        node_id, message.correlation_id, e
                    );
                    self.mixnet_rejection(&message, &e)?
                }
            };
            broker.send(response);
            handled += 1;
        }

        Ok(handled)
    }

    fn rejection(&self, message: &Message, cause: &Error) -> Result<Message, Error> {
        let (election_event_id, verification_card_set_id) =
            match serde_json::from_slice::<ReturnCodesRequestPayload>(&message.body) {
                Ok(payload) => (payload.election_event_id, payload.verification_card_set_id),
                Err(_) => (String::new(), String::new()),
            };
        let signed = Signed::sign(
            self.config.signing_key()?,
            ReturnCodesResponsePayload {
                election_event_id,
                verification_card_set_id,
                request_id: message.correlation_id.clone(),
                node_id: self.node_id(),
                response: ReturnCodesResponse::Rejected {
                    reason: cause.to_string(),
                },
            },
        )?;
        Ok(Message::new(
            queue_name(RETURN_CODES_RESPONSE_PATTERN, self.node_id()),
            message.correlation_id.clone(),
            serde_json::to_vec(&signed)?,
        ))
    }

    fn mixnet_rejection(&self, message: &Message, cause: &Error) -> Result<Message, Error> {
        let (election_event_id, ballot_box_id) =
            match serde_json::from_slice::<MixDecryptOnlineRequest>(&message.body) {
                Ok(request) => (request.election_event_id, request.ballot_box_id),
                Err(_) => (String::new(), String::new()),
            };
        let signed = Signed::sign(
            self.config.signing_key()?,
            MixDecryptOnlineRejection {
                election_event_id,
                ballot_box_id,
                node_id: self.node_id(),
                request_id: message.correlation_id.clone(),
                reason: cause.to_string(),
            },
        )?;
        Ok(Message::new(
            queue_name(MIXNET_RESPONSE_PATTERN, self.node_id()),
            message.correlation_id.clone(),
            serde_json::to_vec(&MixnetResponse::Rejected(signed))?,
        ))
    }

    fn ensure_own_queue(&self, queue: &str, pattern: &str) -> Result<(), ValidationError> {
        let (found_pattern, node_id) = parse_queue_name(queue)?;
        if found_pattern != pattern {
            return Err(ValidationError::UnknownQueue(queue.to_owned()));
        }
        if node_id != self.node_id() {
            return Err(ValidationError::UnexpectedNodeId(self.node_id(), node_id));
        }
        Ok(())
    }
}

fn run_return_codes_request<S: Store, R: RngCore + CryptoRng>(
    store: &mut S,
    context: &ReturnCodesNodeContext,
    request: &ReturnCodesRequest,
    rng: &mut R,
) -> Result<ReturnCodesResponse, Error> {
    let keys = store.node_keys(&context.election_event_id, context.node_id)?;
    let secret = &keys.return_codes_secret;

    let response = match request {
        ReturnCodesRequest::GenEncLongCodeShares(input) => {
            ReturnCodesResponse::GenEncLongCodeShares(gen_enc_long_code_shares(store, context, secret, input, rng)?)
        }
        ReturnCodesRequest::PartialDecryptPcc {
            verification_card_id,
            encrypted_partial_choice_return_codes,
        } => ReturnCodesResponse::PartialDecryptPcc(partial_decrypt_pcc(
            store,
            context,
            &keys.ccr_choice_return_codes_keypair,
            verification_card_id,
            encrypted_partial_choice_return_codes,
            rng,
        )?),
        ReturnCodesRequest::CreateLccShare {
            verification_card_id,
            partial_choice_return_codes,
        } => ReturnCodesResponse::CreateLccShare(create_lcc_share(
            store,
            context,
            secret,
            verification_card_id,
            partial_choice_return_codes,
            rng,
        )?),
        ReturnCodesRequest::CreateLvccShare {
            verification_card_id,
            confirmation_key,
        } => ReturnCodesResponse::CreateLvccShare(create_lvcc_share(
            store,
            context,
            secret,
            verification_card_id,
            confirmation_key,
            rng,
        )?),
        ReturnCodesRequest::VerifyLvccHash {
            verification_card_id,
            hashed_long_vote_cast_return_code_share,
            other_hashed_long_vote_cast_return_code_shares,
        } => ReturnCodesResponse::VerifyLvccHash {
            verification_card_id: verification_card_id.clone(),
            confirmed: verify_lvcc_hash(
                store,
                context,
                verification_card_id,
                hashed_long_vote_cast_return_code_share,
                other_hashed_long_vote_cast_return_code_shares,
            )?,
        },
    };
    Ok(response)
}

fn run_mixnet_request<S: Store, R: RngCore + CryptoRng>(
    store: &mut S,
    config: &Config,
    request: &MixDecryptOnlineRequest,
    rng: &mut R,
) -> Result<MixDecryptOnlineResponse, Error> {
    let ee = request.election_event_id.as_str();
    let bb = request.ballot_box_id.as_str();
    let node_id = config.node_id;
    let signing_key = config.signing_key()?;
    let keypair = store.election_keypair(ee, node_id)?;

    let (initial_payload, input, remaining) = match request.shuffle_payloads.last() {
        None => {
            let initial = create_initial_payload(&store.ballot_box(ee, bb)?)?;
            let input = initial.encrypted_votes.clone();
            let remaining = initial.election_public_key.clone();
            (Some(Signed::sign(signing_key, initial)?), input, remaining)
        }
        // The chain was verified before mixing
        Some(previous) => (
            None,
            previous.partially_decrypted_ciphertexts.clone(),
            previous.next_public_key.clone(),
        ),
    };

    let shuffle_payload = mix_dec_online(ee, bb, node_id, &input, &remaining, &keypair, rng)?;
    info!(
        "MixDecOnline: node {} mixed {} votes of ballot box {} in election event {}",
        node_id,
        input.len(),
        bb,
        ee
    );

    Ok(MixDecryptOnlineResponse {
        election_event_id: ee.to_owned(),
        ballot_box_id: bb.to_owned(),
        node_id,
        shuffle_payload: Signed::sign(signing_key, shuffle_payload)?,
        initial_payload,
    })
}
