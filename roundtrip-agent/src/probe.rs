//! Probe messages, as they appear on the wire and to each observing agent.

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ProtocolViolation;

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary;

#[cfg(test)]
mod tests;

/// The identity of an agent, unique among the agents in a run.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Returns a new agent identity.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A monotonic timestamp in nanoseconds.
///
/// Encoded on the wire as a decimal string, so it survives transports that
/// only carry JSON numbers as doubles.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    serde_with::SerializeDisplay,
    serde_with::DeserializeFromStr,
)]
pub struct Timestamp(pub u64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Timestamp {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Timestamp)
    }
}

/// A probe, in its wire shape.
///
/// Unanswered probes carry only the sender fields. Once another agent echoes a
/// probe, it also carries that agent's identity and receive time.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    /// The agent that sent the probe.
    pub sender_id: AgentId,

    /// When the sender published the probe.
    pub sender_timestamp: Timestamp,

    /// The agent that echoed the probe, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<AgentId>,

    /// When the echoing agent received the probe, if it has been echoed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_timestamp: Option<Timestamp>,
}

impl Probe {
    /// Returns a new unanswered probe.
    pub fn new(sender_id: AgentId, sender_timestamp: Timestamp) -> Self {
        Self {
            sender_id,
            sender_timestamp,
            receiver_id: None,
            received_timestamp: None,
        }
    }

    /// Decodes a probe from a channel payload.
    ///
    /// Only checks the structure of the payload. Use [`ProbeState::classify`]
    /// to check the protocol rules.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Encodes this probe as a channel payload.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).expect("probes only contain strings, so they always serialize")
    }
}

/// A probe that nobody has echoed yet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnansweredProbe {
    /// The agent that sent the probe.
    pub sender_id: AgentId,

    /// When the sender published the probe.
    pub sender_timestamp: Timestamp,
}

impl UnansweredProbe {
    /// Answers this probe on behalf of `receiver_id`, which received it at
    /// `received_timestamp`.
    pub fn answer(self, receiver_id: AgentId, received_timestamp: Timestamp) -> AnsweredProbe {
        AnsweredProbe {
            sender_id: self.sender_id,
            sender_timestamp: self.sender_timestamp,
            receiver_id,
            received_timestamp,
        }
    }
}

impl From<UnansweredProbe> for Probe {
    fn from(probe: UnansweredProbe) -> Self {
        Probe::new(probe.sender_id, probe.sender_timestamp)
    }
}

/// A probe that has been echoed by an agent other than its sender.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AnsweredProbe {
    /// The agent that sent the probe.
    pub sender_id: AgentId,

    /// When the sender published the probe.
    pub sender_timestamp: Timestamp,

    /// The agent that echoed the probe.
    pub receiver_id: AgentId,

    /// When the echoing agent received the probe.
    pub received_timestamp: Timestamp,
}

impl AnsweredProbe {
    /// Returns the round trip this probe completes, from its sender's point of view.
    pub fn round_trip(self) -> Result<RoundTripRecord, ProtocolViolation> {
        match self
            .received_timestamp
            .0
            .checked_sub(self.sender_timestamp.0)
        {
            Some(latency_nanos) => Ok(RoundTripRecord {
                peer_id: self.receiver_id,
                latency_nanos,
            }),
            None => Err(ProtocolViolation::NegativeLatency { probe: self.into() }),
        }
    }
}

impl From<AnsweredProbe> for Probe {
    fn from(probe: AnsweredProbe) -> Self {
        Probe {
            sender_id: probe.sender_id,
            sender_timestamp: probe.sender_timestamp,
            receiver_id: Some(probe.receiver_id),
            received_timestamp: Some(probe.received_timestamp),
        }
    }
}

/// A probe, classified from the point of view of one observing agent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeState {
    /// Sent by the observer, and not yet echoed.
    OwnUnanswered(UnansweredProbe),

    /// Sent by another agent, and not yet echoed.
    ForeignUnanswered(UnansweredProbe),

    /// Sent by another agent, and already echoed by a third agent.
    ForeignAnswered(AnsweredProbe),

    /// Sent by the observer, and echoed by another agent: a completed round trip.
    OwnAnswered(AnsweredProbe),
}

impl ProbeState {
    /// Classifies `probe` from the point of view of the agent `observer`.
    ///
    /// Returns an error if the probe breaks the echo protocol rules.
    pub fn classify(observer: &AgentId, probe: Probe) -> Result<Self, ProtocolViolation> {
        let Probe {
            sender_id,
            sender_timestamp,
            receiver_id,
            received_timestamp,
        } = probe;

        let echo = match (receiver_id, received_timestamp) {
            (None, None) => None,
            (Some(receiver_id), Some(received_timestamp)) => {
                Some((receiver_id, received_timestamp))
            }
            (receiver_id, received_timestamp) => {
                return Err(ProtocolViolation::HalfAnswered {
                    probe: Probe {
                        sender_id,
                        sender_timestamp,
                        receiver_id,
                        received_timestamp,
                    },
                })
            }
        };

        let sent_by_us = sender_id == *observer;

        let state = match echo {
            None => {
                let probe = UnansweredProbe {
                    sender_id,
                    sender_timestamp,
                };

                if sent_by_us {
                    ProbeState::OwnUnanswered(probe)
                } else {
                    ProbeState::ForeignUnanswered(probe)
                }
            }
            Some((receiver_id, received_timestamp)) => {
                let probe = AnsweredProbe {
                    sender_id,
                    sender_timestamp,
                    receiver_id,
                    received_timestamp,
                };

                if probe.receiver_id == probe.sender_id {
                    return Err(ProtocolViolation::SelfEcho {
                        probe: probe.into(),
                    });
                }

                if sent_by_us {
                    ProbeState::OwnAnswered(probe)
                } else {
                    ProbeState::ForeignAnswered(probe)
                }
            }
        };

        Ok(state)
    }
}

/// A completed round trip, as recorded by the agent that sent the probe.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RoundTripRecord {
    /// The agent that echoed the probe.
    pub peer_id: AgentId,

    /// The echoing agent's receive time, minus the probe's send time.
    pub latency_nanos: u64,
}
