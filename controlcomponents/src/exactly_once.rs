use crate::*;
use log::{debug, error};
use sha2::{Digest, Sha256};

/// Identifies one unit of work on one node
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExactlyOnceKey {
    pub correlation_id: String,
    pub context_id: String,
    pub context: String,
    pub node_id: u8,
}

/// The outcome of a unit of work, recorded so that redeliveries can be answered from it
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProcessedMessage {
    pub request_hash: Vec<u8>,
    pub response: Vec<u8>,
}

/// How a request was handled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The task ran and produced this response
    First(Vec<u8>),

    /// The request was seen before, this is the response recorded back then
    Redelivery(Vec<u8>),
}

impl Delivery {
    pub fn response(&self) -> &[u8] {
        match self {
            Delivery::First(response) => response,
            Delivery::Redelivery(response) => response,
        }
    }

    pub fn into_response(self) -> Vec<u8> {
        match self {
            Delivery::First(response) => response,
            Delivery::Redelivery(response) => response,
        }
    }

    pub fn is_redelivery(&self) -> bool {
        matches!(self, Delivery::Redelivery(_))
    }
}

/// Run `task` at most once per key.
///
/// The first delivery runs the task and records its response together with a hash of the request.
/// A redelivery of the same request returns the recorded response without running the task. A
/// different request under an already used key is rejected. A failing task records nothing, so
/// the request may be retried.
pub fn process_exactly_once<S, F>(
    store: &mut S,
    key: ExactlyOnceKey,
    request: &[u8],
    task: F,
) -> Result<Delivery, Error>
where
    S: Store,
    F: FnOnce(&mut S) -> Result<Vec<u8>, Error>,
{
    let request_hash = Sha256::digest(request).to_vec();

    if let Some(processed) = store.get_processed_message(&key) {
        if processed.request_hash != request_hash {
            error!(
                "{} {} on node {}: redelivery of {} with a different payload",
                key.context, key.context_id, key.node_id, key.correlation_id
            );
            return Err(Error::ConflictingRedelivery(key.correlation_id));
        }
        debug!(
            "{} {} on node {}: {} already processed",
            key.context, key.context_id, key.node_id, key.correlation_id
        );
        return Ok(Delivery::Redelivery(processed.response));
    }

    let response = task(store)?;
    store.set_processed_message(
        key,
        ProcessedMessage {
            request_hash,
            response: response.clone(),
        },
    );
    Ok(Delivery::First(response))
}
