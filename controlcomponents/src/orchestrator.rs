use crate::*;
use log::{error, info, warn};

pub const MIX_DEC_ONLINE_RESPONSE_CONTEXT: &str = "MixDecryptOnlineResponse";

/// The next thing the orchestrator expects for a ballot box
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum PipelineAction {
    /// A request is outstanding with a node. Kept so that it can be sent again unchanged.
    AwaitNode {
        node_id: u8,
        correlation_id: String,
        request: Vec<u8>,
    },

    /// A node refused the request. Initiating again retries it under a new correlation id.
    Rejected {
        node_id: u8,
        request: Vec<u8>,
        reason: String,
    },

    /// Every node has answered
    Complete,
}

fn pipeline_context_id(election_event_id: &str, ballot_box_id: &str) -> String {
    format!("{}:{}", election_event_id, ballot_box_id)
}

/// Drives the mix-decrypt chain of a ballot box through the nodes, one node at a time.
///
/// Every response is processed exactly once per correlation id. Processing verifies and persists
/// the node's payloads and then sends at most one request, to the next node.
pub struct MixnetOrchestrator {
    total_nodes: u8,
    node_directory: NodeDirectory,
}

impl MixnetOrchestrator {
    pub fn new(total_nodes: u8, node_directory: NodeDirectory) -> Result<Self, Error> {
        if total_nodes < 2 {
            return Err(Error::Config(format!(
                "at least 2 nodes are required, found {}",
                total_nodes
            )));
        }
        for node_id in 1..=total_nodes {
            node_directory.get(node_id)?;
        }

        Ok(MixnetOrchestrator {
            total_nodes,
            node_directory,
        })
    }

    pub fn total_nodes(&self) -> u8 {
        self.total_nodes
    }

    /// Start mixing a ballot box, or send the outstanding request again if it is already started
    pub fn initiate<S: Store, B: Broker>(
        &self,
        store: &mut S,
        broker: &mut B,
        election_event_id: &str,
        ballot_box_id: &str,
    ) -> Result<(), Error> {
        validate_uuid(election_event_id)?;
        validate_uuid(ballot_box_id)?;

        match store.get_pipeline(election_event_id, ballot_box_id) {
            None => {
                let request = MixDecryptOnlineRequest {
                    election_event_id: election_event_id.to_owned(),
                    ballot_box_id: ballot_box_id.to_owned(),
                    node_id: 1,
                    shuffle_payloads: Vec::new(),
                    initial_payload: None,
                };
                let action = PipelineAction::AwaitNode {
                    node_id: 1,
                    correlation_id: new_id(),
                    request: serde_json::to_vec(&request)?,
                };
                store.set_pipeline(election_event_id, ballot_box_id, action.clone());
                info!(
                    "MixDecOnline: starting ballot box {} of election event {}",
                    ballot_box_id, election_event_id
                );
                send_pending(broker, &action);
                Ok(())
            }
            Some(PipelineAction::Complete) => Err(Error::PipelineAlreadyComplete(
                election_event_id.to_owned(),
                ballot_box_id.to_owned(),
            )),
            Some(PipelineAction::Rejected { node_id, request, .. }) => {
                let action = PipelineAction::AwaitNode {
                    node_id,
                    correlation_id: new_id(),
                    request,
                };
                store.set_pipeline(election_event_id, ballot_box_id, action.clone());
                warn!(
                    "MixDecOnline: retrying node {} for ballot box {} of election event {}",
                    node_id, ballot_box_id, election_event_id
                );
                send_pending(broker, &action);
                Ok(())
            }
            Some(action) => {
                warn!(
                    "MixDecOnline: ballot box {} of election event {} is stuck, resending the pending request",
                    ballot_box_id, election_event_id
                );
                send_pending(broker, &action);
                Ok(())
            }
        }
    }

    /// Process a response from a node's mixnet response queue
    pub fn on_response<S: Store, B: Broker>(
        &self,
        store: &mut S,
        broker: &mut B,
        message: &Message,
    ) -> Result<Delivery, Error> {
        let node_id = match parse_queue_name(&message.queue)? {
            (MIXNET_RESPONSE_PATTERN, node_id) => node_id,
            _ => return Err(ValidationError::UnknownQueue(message.queue.clone()).into()),
        };
        let response: MixnetResponse = serde_json::from_slice(&message.body)?;
        let ee = response.election_event_id().to_owned();
        let bb = response.ballot_box_id().to_owned();

        let key = ExactlyOnceKey {
            correlation_id: message.correlation_id.clone(),
            context_id: pipeline_context_id(&ee, &bb),
            context: MIX_DEC_ONLINE_RESPONSE_CONTEXT.to_owned(),
            node_id,
        };
        let delivery = process_exactly_once(store, key, &message.body, |store| {
            match response {
                MixnetResponse::Mixed(response) => {
                    self.record_response(store, node_id, &message.correlation_id, response)?
                }
                MixnetResponse::Rejected(rejection) => {
                    self.record_rejection(store, node_id, &message.correlation_id, rejection)?
                }
            }
            Ok(Vec::new())
        });

        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                error!(
                    "MixDecOnline: rejected response {} of node {} for ballot box {} of election event {}: {}",
                    message.correlation_id, node_id, bb, ee, e
                );
                return Err(e);
            }
        };

        if delivery.is_redelivery() {
            info!(
                "MixDecOnline: response {} of node {} already processed",
                message.correlation_id, node_id
            );
            return Ok(delivery);
        }

        match store.get_pipeline(&ee, &bb) {
            Some(action @ PipelineAction::AwaitNode { .. }) => send_pending(broker, &action),
            Some(PipelineAction::Complete) => {
                info!("MixDecOnline: ballot box {} of election event {} is mixed", bb, ee)
            }
            _ => {}
        }
        Ok(delivery)
    }

    /// Record a node's refusal of the pending request, stopping the chain until it is initiated
    /// again
    fn record_rejection<S: Store>(
        &self,
        store: &mut S,
        node_id: u8,
        correlation_id: &str,
        rejection: Signed<MixDecryptOnlineRejection>,
    ) -> Result<(), Error> {
        rejection.verify_signature(self.node_directory.get(node_id)?)?;
        if rejection.node_id != node_id {
            return Err(ValidationError::UnexpectedNodeId(node_id, rejection.node_id).into());
        }

        let ee = rejection.election_event_id.as_str();
        let bb = rejection.ballot_box_id.as_str();
        match store.get_pipeline(ee, bb) {
            Some(PipelineAction::AwaitNode {
                node_id: expected,
                correlation_id: pending,
                request,
            }) if expected == node_id && pending == correlation_id && rejection.request_id == correlation_id => {
                error!(
                    "MixDecOnline: node {} rejected ballot box {} of election event {}: {}",
                    node_id, bb, ee, rejection.reason
                );
                store.set_pipeline(
                    ee,
                    bb,
                    PipelineAction::Rejected {
                        node_id,
                        request,
                        reason: rejection.reason.clone(),
                    },
                );
                Ok(())
            }
            _ => Err(Error::UnexpectedResponse(format!(
                "rejection {} of node {} for ballot box {} was not requested",
                correlation_id, node_id, bb
            ))),
        }
    }

    /// Verify a node's response against the chain so far and persist it. Nothing is written
    /// unless every check passes.
    fn record_response<S: Store>(
        &self,
        store: &mut S,
        node_id: u8,
        correlation_id: &str,
        response: MixDecryptOnlineResponse,
    ) -> Result<(), Error> {
        let ee = response.election_event_id.as_str();
        let bb = response.ballot_box_id.as_str();

        match store.get_pipeline(ee, bb) {
            Some(PipelineAction::AwaitNode {
                node_id: expected,
                correlation_id: pending,
                ..
            }) if expected == node_id && pending == correlation_id => {}
            Some(PipelineAction::Complete) => {
                return Err(Error::PipelineAlreadyComplete(ee.to_owned(), bb.to_owned()))
            }
            _ => {
                return Err(Error::UnexpectedResponse(format!(
                    "response {} of node {} for ballot box {} was not requested",
                    correlation_id, node_id, bb
                )))
            }
        }

        if response.node_id != node_id {
            return Err(ValidationError::UnexpectedNodeId(node_id, response.node_id).into());
        }
        let shuffle_payload = response.shuffle_payload;
        if shuffle_payload.node_id != node_id {
            return Err(ValidationError::UnexpectedNodeId(node_id, shuffle_payload.node_id).into());
        }
        let signer = self.node_directory.get(node_id)?;
        shuffle_payload.verify_signature(signer)?;

        let (initial, new_initial) = match store.get_initial_payload(ee, bb) {
            Some(initial) => (initial, false),
            None if node_id == 1 => {
                let initial = response
                    .initial_payload
                    .ok_or_else(|| ValidationError::MissingInitialPayload(bb.to_owned()))?;
                initial.verify_signature(signer)?;
                if initial.election_event_id != ee || initial.ballot_box_id != bb {
                    return Err(ValidationError::ContextMismatch.into());
                }
                (initial, true)
            }
            None => return Err(ValidationError::MissingInitialPayload(bb.to_owned()).into()),
        };

        let mut shuffle_payloads = store.get_shuffle_payloads(ee, bb);
        if shuffle_payloads.iter().any(|p| p.node_id == node_id) {
            return Err(ValidationError::DuplicateShufflePayload(node_id).into());
        }
        let expected = node_id as usize - 1;
        if shuffle_payloads.len() != expected {
            return Err(ValidationError::WrongNumberOfShufflePayloads(expected, shuffle_payloads.len()).into());
        }
        verify_shuffle_payload(
            initial.inner(),
            shuffle_payloads.last().map(|p| p.inner()),
            shuffle_payload.inner(),
        )?;

        let next = if node_id < self.total_nodes {
            shuffle_payloads.push(shuffle_payload.clone());
            let request = MixDecryptOnlineRequest {
                election_event_id: ee.to_owned(),
                ballot_box_id: bb.to_owned(),
                node_id: node_id + 1,
                shuffle_payloads,
                initial_payload: Some(initial.clone()),
            };
            PipelineAction::AwaitNode {
                node_id: node_id + 1,
                correlation_id: new_id(),
                request: serde_json::to_vec(&request)?,
            }
        } else {
            PipelineAction::Complete
        };

        if new_initial {
            store.set_initial_payload(initial);
        }
        store.add_shuffle_payload(shuffle_payload);
        store.set_pipeline(ee, bb, next);

        info!(
            "MixDecOnline: recorded shuffle payload of node {} for ballot box {} of election event {}",
            node_id, bb, ee
        );
        Ok(())
    }

    /// Process every response waiting on the nodes' mixnet response queues. Responses that fail
    /// verification are logged and dropped.
    pub fn poll<S: Store, B: Broker>(&self, store: &mut S, broker: &mut B) -> usize {
        let mut processed = 0;
        for node_id in 1..=self.total_nodes {
            let queue = queue_name(MIXNET_RESPONSE_PATTERN, node_id);
            while let Some(message) = broker.receive(&queue) {
                if self.on_response(store, broker, &message).is_ok() {
                    processed += 1;
                }
            }
        }
        processed
    }

    /// countMixDecryptOnlinePayloads
    pub fn count_mix_decrypt_online_payloads<S: Store>(
        &self,
        store: &S,
        election_event_id: &str,
        ballot_box_id: &str,
    ) -> usize {
        store.count_shuffle_payloads(election_event_id, ballot_box_id)
    }

    pub fn status<S: Store>(&self, store: &S, election_event_id: &str, ballot_box_id: &str) -> MixDecryptOnlineStatus {
        if let Some(PipelineAction::Rejected { .. }) = store.get_pipeline(election_event_id, ballot_box_id) {
            return MixDecryptOnlineStatus::Error;
        }

        let payloads = store.get_shuffle_payloads(election_event_id, ballot_box_id);
        if payloads.is_empty() {
            return MixDecryptOnlineStatus::NotStarted;
        }

        let in_order = payloads.iter().zip(1..).all(|(p, n)| p.node_id == n);
        if !in_order || store.get_initial_payload(election_event_id, ballot_box_id).is_none() {
            return MixDecryptOnlineStatus::Error;
        }
        MixDecryptOnlineStatus::from_count(payloads.len(), self.total_nodes)
    }

    /// getFinalPayload: the initial payload and every node's shuffle payload, once the chain is
    /// complete
    pub fn get_final_payload<S: Store>(
        &self,
        store: &S,
        election_event_id: &str,
        ballot_box_id: &str,
    ) -> Option<MixnetFinalPayload> {
        if self.status(store, election_event_id, ballot_box_id) != MixDecryptOnlineStatus::Mixed {
            return None;
        }
        let initial_payload = store.get_initial_payload(election_event_id, ballot_box_id)?;
        Some(MixnetFinalPayload {
            initial_payload,
            shuffle_payloads: store.get_shuffle_payloads(election_event_id, ballot_box_id),
        })
    }
}

fn send_pending<B: Broker>(broker: &mut B, action: &PipelineAction) {
    if let PipelineAction::AwaitNode {
        node_id,
        correlation_id,
        request,
    } = action
    {
        broker.send(Message::new(
            queue_name(MIXNET_REQUEST_PATTERN, *node_id),
            correlation_id.clone(),
            request.clone(),
        ));
    }
}
