//! Topic names for one team namespace.

use tapbridge_core::{
    Error, Result,
    constants::{
        TOPIC_CARD_BALANCE, TOPIC_CARD_STATUS, TOPIC_CARD_TOPUP, TOPIC_DEVICE_HEALTH,
        TOPIC_DEVICE_STATUS, TOPIC_ROOT,
    },
};

/// Fully qualified topics under `rfid/<team_id>/`.
///
/// Built once at startup so that every publish reuses the same strings.
///
/// # Examples
///
/// ```
/// use tapbridge_protocol::Topics;
///
/// let topics = Topics::new("team_a").unwrap();
/// assert_eq!(topics.card_status(), "rfid/team_a/card/status");
/// assert_eq!(topics.wildcard(), "rfid/team_a/#");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    team_id: String,
    card_status: String,
    card_balance: String,
    card_topup: String,
    device_health: String,
    device_status: String,
    wildcard: String,
}

impl Topics {
    /// Build the topic set for a team.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the team id is blank or contains a topic
    /// separator or wildcard (`/`, `+`, `#`).
    pub fn new(team_id: &str) -> Result<Self> {
        let team_id = team_id.trim();

        if team_id.is_empty() {
            return Err(Error::Config("team id must not be empty".to_string()));
        }
        if team_id.contains(['/', '+', '#']) {
            return Err(Error::Config(format!(
                "team id must not contain '/', '+' or '#': {team_id}"
            )));
        }

        let prefix = format!("{TOPIC_ROOT}/{team_id}");
        Ok(Self {
            team_id: team_id.to_string(),
            card_status: format!("{prefix}/{TOPIC_CARD_STATUS}"),
            card_balance: format!("{prefix}/{TOPIC_CARD_BALANCE}"),
            card_topup: format!("{prefix}/{TOPIC_CARD_TOPUP}"),
            device_health: format!("{prefix}/{TOPIC_DEVICE_HEALTH}"),
            device_status: format!("{prefix}/{TOPIC_DEVICE_STATUS}"),
            wildcard: format!("{prefix}/#"),
        })
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn card_status(&self) -> &str {
        &self.card_status
    }

    pub fn card_balance(&self) -> &str {
        &self.card_balance
    }

    pub fn card_topup(&self) -> &str {
        &self.card_topup
    }

    pub fn device_health(&self) -> &str {
        &self.device_health
    }

    /// Lifecycle topic, also used for the last will.
    pub fn device_status(&self) -> &str {
        &self.device_status
    }

    /// Subscription filter covering every topic of the team.
    pub fn wildcard(&self) -> &str {
        &self.wildcard
    }

    /// Returns `true` if `topic` is this team's top-up topic.
    pub fn is_topup(&self, topic: &str) -> bool {
        topic == self.card_topup
    }
}
