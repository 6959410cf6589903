use crate::*;

/// A node's view of one verification card set of one election event
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReturnCodesNodeContext {
    pub node_id: u8,
    pub total_nodes: u8,
    pub max_confirmation_attempts: u32,
    pub election_event_id: String,
    pub verification_card_set_id: String,
    pub group: GqGroup,
}

impl ReturnCodesNodeContext {
    pub fn new(
        config: &Config,
        election_event_id: &str,
        verification_card_set_id: &str,
        group: GqGroup,
    ) -> Result<Self, Error> {
        config.validate()?;
        validate_uuid(election_event_id)?;
        validate_uuid(verification_card_set_id)?;

        Ok(ReturnCodesNodeContext {
            node_id: config.node_id,
            total_nodes: config.total_nodes,
            max_confirmation_attempts: config.max_confirmation_attempts,
            election_event_id: election_event_id.to_owned(),
            verification_card_set_id: verification_card_set_id.to_owned(),
            group,
        })
    }
}
