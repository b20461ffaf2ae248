//! Errors for transports, agents, and runs.

use thiserror::Error;

use crate::probe::{AgentId, Probe};

/// An error from the pub/sub transport.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum TransportError {
    /// The transport refused the connection credential.
    #[error("transport connection failed: the API key was rejected")]
    ConnectionFailed,

    /// The connection was closed, so no more payloads can be published.
    #[error("transport connection is closed")]
    Closed,

    /// The transport refused to attach a subscriber to the channel.
    #[error("attaching to channel {channel:?} was rejected")]
    AttachRejected {
        /// The channel name.
        channel: String,
    },
}

/// The error returned when an agent can't subscribe to its channel.
pub type AttachError = TransportError;

/// A probe that can't be produced by correctly behaving agents.
///
/// An agent that observes one of these stops processing its channel.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ProtocolViolation {
    /// Exactly one of `receiverId` and `receivedTimestamp` is present.
    #[error("probe has only one of receiverId and receivedTimestamp")]
    HalfAnswered {
        /// The offending probe.
        probe: Probe,
    },

    /// The probe was answered by the agent that sent it.
    #[error("probe was echoed by its own sender")]
    SelfEcho {
        /// The offending probe.
        probe: Probe,
    },

    /// The echo claims to have been received before the probe was sent.
    #[error("probe was answered before it was sent")]
    NegativeLatency {
        /// The offending probe.
        probe: Probe,
    },
}

impl ProtocolViolation {
    /// Returns the offending probe.
    pub fn probe(&self) -> &Probe {
        match self {
            ProtocolViolation::HalfAnswered { probe }
            | ProtocolViolation::SelfEcho { probe }
            | ProtocolViolation::NegativeLatency { probe } => probe,
        }
    }
}

/// An error that stops a whole run before any results are aggregated.
#[derive(Error, Debug)]
pub enum RunError {
    /// An agent couldn't subscribe to the channel.
    #[error("agent {agent} could not attach to the channel")]
    Attach {
        /// The agent that failed to attach.
        agent: AgentId,

        /// The transport error.
        #[source]
        source: AttachError,
    },

    /// Round trips need at least two agents.
    #[error("a run needs at least 2 agents, but {agent_count} were configured")]
    NotEnoughAgents {
        /// The configured number of agents.
        agent_count: usize,
    },
}
