//! Configuration for a latency measurement run.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        AGENT_ID_PREFIX, DEFAULT_AGENT_COUNT, DEFAULT_INITIAL_MESSAGE_COUNT,
        DEFAULT_INITIAL_MESSAGE_WAIT, DEFAULT_LISTEN_TIME,
    },
    probe::AgentId,
};


/// Configuration for a latency measurement run.
///
/// Doesn't contain the transport credential, so it is safe to log.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunConfig {
    /// The pub/sub channel shared by every agent.
    pub channel_name: String,

    /// How many probes each agent sends.
    pub initial_message_count: usize,

    /// How long each agent waits between sending successive probes.
    #[serde(with = "humantime_serde")]
    pub initial_message_wait: Duration,

    /// How long each agent listens for echoes, starting when it subscribes.
    #[serde(with = "humantime_serde")]
    pub listen_time: Duration,

    /// How many agents take part in the run.
    pub agent_count: usize,
}

impl RunConfig {
    /// Returns the default configuration for `channel_name`.
    pub fn new(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            ..Self::default()
        }
    }

    /// Returns the identities of the agents in this run: `client1` to `clientN`.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        (1..=self.agent_count)
            .map(|index| AgentId::new(format!("{AGENT_ID_PREFIX}{index}")))
            .collect()
    }

    /// Returns the number of round trips each agent records in a fully converged run.
    ///
    /// Each probe is echoed once by every other agent.
    pub fn expected_records(&self) -> usize {
        self.initial_message_count
            .saturating_mul(self.agent_count.saturating_sub(1))
    }

    /// Returns the number of payloads published on the channel in this run.
    ///
    /// Every probe is published once, then echoed by every other agent, so an
    /// in-process channel that buffers this many payloads never drops one.
    pub fn channel_capacity(&self) -> usize {
        self.agent_count
            .saturating_mul(self.agent_count)
            .saturating_mul(self.initial_message_count)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            channel_name: String::new(),
            initial_message_count: DEFAULT_INITIAL_MESSAGE_COUNT,
            initial_message_wait: DEFAULT_INITIAL_MESSAGE_WAIT,
            listen_time: DEFAULT_LISTEN_TIME,
            agent_count: DEFAULT_AGENT_COUNT,
        }
    }
}
