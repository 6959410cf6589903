use crate::*;
use indexmap::IndexSet;

/// A registered verification card
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VerificationCard {
    pub verification_card_id: String,
    pub verification_card_set_id: String,
    pub public_key: ElGamalPublicKey,
}

/// The per node confirmation state machine of a verification card.
///
/// `partially_decrypted` and `long_choice_share_created` are set once while sending the vote.
/// Every generated long vote cast return code share consumes one confirmation attempt, whether
/// or not it is later verified. `confirmed` only ever goes from false to true.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VerificationCardState {
    pub partially_decrypted: bool,
    pub long_choice_share_created: bool,
    pub confirmation_attempts: u32,
    pub confirmed: bool,
}

impl VerificationCardState {
    pub fn ensure_not_partially_decrypted(&self, verification_card_id: &str) -> Result<(), Error> {
        if self.partially_decrypted {
            return Err(Error::AlreadyPartiallyDecrypted(verification_card_id.to_owned()));
        }
        Ok(())
    }

    pub fn ensure_long_choice_share_not_created(&self, verification_card_id: &str) -> Result<(), Error> {
        if self.long_choice_share_created {
            return Err(Error::LongChoiceShareAlreadyCreated(verification_card_id.to_owned()));
        }
        Ok(())
    }

    /// Preconditions shared by share creation and hash verification during confirmation
    pub fn ensure_confirmable(&self, verification_card_id: &str) -> Result<(), Error> {
        if !self.long_choice_share_created {
            return Err(Error::LongChoiceShareNotCreated(verification_card_id.to_owned()));
        }
        if self.confirmed {
            return Err(Error::AlreadyConfirmed(verification_card_id.to_owned()));
        }
        Ok(())
    }

    pub fn ensure_attempts_left(&self, verification_card_id: &str, max_attempts: u32) -> Result<(), Error> {
        if self.confirmation_attempts >= max_attempts {
            return Err(Error::MaxConfirmationAttemptsExceeded(
                verification_card_id.to_owned(),
                max_attempts,
            ));
        }
        Ok(())
    }

    /// Consume an attempt, returning its index
    pub fn record_confirmation_attempt(&mut self) -> u32 {
        let attempt = self.confirmation_attempts;
        self.confirmation_attempts += 1;
        attempt
    }

    pub fn confirm(&mut self) {
        self.confirmed = true;
    }
}

/// A verification card set with its published allow-lists
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VerificationCardSet {
    pub election_event_id: String,
    pub verification_card_set_id: String,

    /// Correctness information of each selectable position, one entry per selection a voter makes
    pub correctness_ids: Vec<String>,

    /// base64 hashes of every allowed hashed partial choice return code
    pub partial_choice_allow_list: IndexSet<String>,

    /// base64 hashes of every allowed combination of hashed long vote cast return code shares
    pub long_vote_cast_allow_list: IndexSet<String>,
}

impl VerificationCardSet {
    pub fn new(
        election_event_id: &str,
        verification_card_set_id: &str,
        correctness_ids: Vec<String>,
    ) -> Result<Self, ValidationError> {
        validate_uuid(election_event_id)?;
        validate_uuid(verification_card_set_id)?;
        if correctness_ids.is_empty() {
            return Err(ValidationError::Empty("correctness ids"));
        }

        Ok(VerificationCardSet {
            election_event_id: election_event_id.to_owned(),
            verification_card_set_id: verification_card_set_id.to_owned(),
            correctness_ids,
            partial_choice_allow_list: IndexSet::new(),
            long_vote_cast_allow_list: IndexSet::new(),
        })
    }

    /// Number of selections a voter makes
    pub fn psi(&self) -> usize {
        self.correctness_ids.len()
    }
}
