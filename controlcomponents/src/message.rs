use crate::*;
use std::collections::{BTreeMap, VecDeque};

pub const RETURN_CODES_REQUEST_PATTERN: &str = "return-codes-request-";
pub const RETURN_CODES_RESPONSE_PATTERN: &str = "return-codes-response-";
pub const MIXNET_REQUEST_PATTERN: &str = "mixnet-request-";
pub const MIXNET_RESPONSE_PATTERN: &str = "mixnet-response-";

/// The queue a node listens on, or answers on, for a given pattern
pub fn queue_name(pattern: &str, node_id: u8) -> String {
    format!("{}{}", pattern, node_id)
}

/// Split a queue name into its pattern and node id
pub fn parse_queue_name(queue: &str) -> Result<(&'static str, u8), ValidationError> {
    let patterns = [
        RETURN_CODES_REQUEST_PATTERN,
        RETURN_CODES_RESPONSE_PATTERN,
        MIXNET_REQUEST_PATTERN,
        MIXNET_RESPONSE_PATTERN,
    ];
    for pattern in patterns.iter() {
        if let Some(node) = queue.strip_prefix(pattern) {
            let node_id = node
                .parse()
                .map_err(|_| ValidationError::UnknownQueue(queue.to_owned()))?;
            return Ok((*pattern, node_id));
        }
    }
    Err(ValidationError::UnknownQueue(queue.to_owned()))
}

/// A message on a node queue. The correlation id pairs a response with its request and is
/// the key under which redeliveries are detected.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub queue: String,
    pub correlation_id: String,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(queue: String, correlation_id: String, body: Vec<u8>) -> Self {
        Message {
            queue,
            correlation_id,
            body,
        }
    }
}

/// An asynchronous message channel. Sending never waits for the receiver.
pub trait Broker {
    fn send(&mut self, message: Message);

    fn receive(&mut self, queue: &str) -> Option<Message>;
}

/// A broker that keeps its queues in memory, delivering messages in FIFO order per queue
#[derive(Default, Clone, Debug)]
pub struct MemBroker {
    queues: BTreeMap<String, VecDeque<Message>>,
}

impl MemBroker {
    /// Number of messages waiting on a queue
    pub fn pending(&self, queue: &str) -> usize {
        self.queues.get(queue).map(|q| q.len()).unwrap_or(0)
    }

    /// The next message on a queue, without consuming it
    pub fn peek(&self, queue: &str) -> Option<&Message> {
        self.queues.get(queue).and_then(|q| q.front())
    }
}

impl Broker for MemBroker {
    fn send(&mut self, message: Message) {
        self.queues
            .entry(message.queue.clone())
            .or_default()
            .push_back(message);
    }

    fn receive(&mut self, queue: &str) -> Option<Message> {
        self.queues.get_mut(queue).and_then(|q| q.pop_front())
    }
}
