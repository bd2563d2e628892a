use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Log level used when the platform describes no mailbox channel.
///
/// Older platforms routinely ship without one, so there it is only worth a
/// debug line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingNodeSeverity {
    Debug,
    #[default]
    Error,
}

/// Tunables for one mailbox channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MboxConfig {
    /// Delay of the backstop sweep once interrupts are confirmed live.
    pub poll_interval_ms: u64,
    /// Compatible string of the channel in the platform description.
    pub compatible: String,
    pub missing_node_severity: MissingNodeSeverity,
}

impl Default for MboxConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            compatible: "mbox".to_owned(),
            missing_node_severity: MissingNodeSeverity::default(),
        }
    }
}

impl MboxConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
