use thiserror::Error;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("controlcomponents: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),

    #[error("controlcomponents: CBOR error serializing payload: {0}")]
    CBORSerialization(#[from] serde_cbor::Error),

    #[error("controlcomponents: JSON error serializing payload: {0}")]
    JSONSerialization(#[from] serde_json::Error),

    #[error("controlcomponents: key derivation failed")]
    Kdf,

    #[error("controlcomponents: missing signing key for node {0}")]
    MissingSigningKey(u8),

    #[error("controlcomponents: invalid configuration: {0}")]
    Config(String),

    #[error("controlcomponents: verification card {0} has already been processed")]
    AlreadyProcessed(String),

    #[error("controlcomponents: long choice return code share not created for verification card {0}")]
    LongChoiceShareNotCreated(String),

    #[error("controlcomponents: long choice return code share already created for verification card {0}")]
    LongChoiceShareAlreadyCreated(String),

    #[error("controlcomponents: verification card {0} has already been partially decrypted")]
    AlreadyPartiallyDecrypted(String),

    #[error("controlcomponents: verification card {0} is already confirmed")]
    AlreadyConfirmed(String),

    #[error("controlcomponents: verification card {0} exceeded the maximum of {1} confirmation attempts")]
    MaxConfirmationAttemptsExceeded(String, u32),

    #[error("controlcomponents: verification card {0} not found")]
    VerificationCardNotFound(String),

    #[error("controlcomponents: verification card state {0} not found")]
    VerificationCardStateNotFound(String),

    #[error("controlcomponents: verification card set {0} not found")]
    VerificationCardSetNotFound(String),

    #[error("controlcomponents: verification card {0} is not in verification card set {1}")]
    VerificationCardNotInSet(String, String),

    #[error("controlcomponents: ballot box {1} of election event {0} not found")]
    BallotBoxNotFound(String, String),

    #[error("controlcomponents: key material for node {1} of election event {0} not found")]
    NodeKeysNotFound(String, u8),

    #[error("controlcomponents: key material for node {1} of election event {0} already generated")]
    NodeKeysAlreadyGenerated(String, u8),

    #[error("controlcomponents: redelivered message {0} does not match the original request")]
    ConflictingRedelivery(String),

    #[error("controlcomponents: mix-decrypt of ballot box {1} of election event {0} already complete")]
    PipelineAlreadyComplete(String, String),

    #[error("controlcomponents: unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("controlcomponents: validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Input validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("controlcomponents validation: invalid UUID {0}")]
    InvalidUuid(String),

    #[error("controlcomponents validation: {0} must not be empty")]
    Empty(&'static str),

    #[error("controlcomponents validation: {0} has {2} elements, expected {1}")]
    LengthMismatch(&'static str, usize, usize),

    #[error("controlcomponents validation: all values must belong to the same group")]
    GroupMismatch,

    #[error("controlcomponents validation: duplicate identifier {0}")]
    DuplicateId(String),

    #[error("controlcomponents validation: partial choice return codes must be distinct")]
    DuplicatePartialChoiceReturnCodes,

    #[error("controlcomponents validation: partial choice return code {0} of verification card {1} is not allowed")]
    PartialChoiceReturnCodeNotAllowed(usize, String),

    #[error("controlcomponents validation: expected {0} hashed long vote cast return code shares from other nodes, found {1}")]
    WrongNumberOfHashes(usize, usize),

    #[error("controlcomponents validation: invalid node id {0}")]
    InvalidNodeId(u8),

    #[error("controlcomponents validation: expected node {0}, found node {1}")]
    UnexpectedNodeId(u8, u8),

    #[error("controlcomponents validation: expected {0} shuffle payloads, found {1}")]
    WrongNumberOfShufflePayloads(usize, usize),

    #[error("controlcomponents validation: shuffle payload of node {0} already recorded")]
    DuplicateShufflePayload(u8),

    #[error("controlcomponents validation: missing initial payload for ballot box {0}")]
    MissingInitialPayload(String),

    #[error("controlcomponents validation: payload belongs to a different election event or ballot box")]
    ContextMismatch,

    #[error("controlcomponents validation: {0} proof failed to verify")]
    InvalidProof(&'static str),

    #[error("controlcomponents validation: no public key known for node {0}")]
    UnknownNode(u8),

    #[error("controlcomponents validation: payload signed by an unexpected key")]
    UnexpectedSigner,

    #[error("controlcomponents validation: unknown queue {0}")]
    UnknownQueue(String),

    #[error("controlcomponents validation: invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("controlcomponents validation: signature error: {0}")]
    SignatureError(#[from] ed25519_dalek::SignatureError),
}
