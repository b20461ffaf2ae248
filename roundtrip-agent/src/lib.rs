//! Round-trip latency measurement between echo agents sharing one pub/sub channel.
//!
//! ## Echo Protocol
//!
//! Every agent publishes timestamped [`Probe`]s onto the same channel, and
//! observes every probe published there, including its own.
//! Each observed probe is in exactly one [`ProbeState`], decided by whether this
//! agent sent it, and whether another agent has already answered it:
//!
//! - a foreign, unanswered probe is echoed: the agent stamps its own identity
//!   and receive time onto it, and publishes it back onto the channel,
//! - an answered probe that this agent sent is a completed round trip, and
//!   becomes a [`RoundTripRecord`],
//! - anything else is ignored.
//!
//! The `receiverId` field is the only deduplication state: an answered probe is
//! never echoed again, so each agent answers each peer probe exactly once,
//! without any per-agent bookkeeping.
//!
//! ## Run Lifecycle
//!
//! The [`Orchestrator`] drives a fixed set of agents through each [`Phase`]:
//! it subscribes every agent, sends a burst of probes from each agent
//! concurrently, then waits until every agent has received an echo from every
//! peer, or its listen window has expired.
//! Finally it unsubscribes the agents, and aggregates their records into
//! per-peer [`LatencyRow`]s.
//!
//! ## Transport
//!
//! The pub/sub transport sits behind the [`Channel`] and [`Subscription`]
//! traits. [`MemoryTransport`] provides an in-process broadcast hub.

#[macro_use]
extern crate tracing;

pub mod agent;
pub mod config;
pub mod constants;
pub mod orchestrator;
pub mod probe;
pub mod stats;
pub mod transport;

mod clock;
mod error;

pub use crate::{
    agent::{Agent, AgentExit, AgentReport, SubscribedAgent},
    clock::Clock,
    config::RunConfig,
    error::{AttachError, ProtocolViolation, RunError, TransportError},
    orchestrator::{Convergence, Orchestrator, Phase, RunReport, Shortfall},
    probe::{AgentId, AnsweredProbe, Probe, ProbeState, RoundTripRecord, Timestamp, UnansweredProbe},
    stats::{aggregate, LatencyRow},
    transport::{
        memory::{MemoryChannel, MemoryConnection, MemorySubscription, MemoryTransport},
        ApiKey, Channel, Subscription,
    },
};
