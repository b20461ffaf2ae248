//! Definitions of constants.

use std::time::Duration;

/// The default number of probes each agent sends.
pub const DEFAULT_INITIAL_MESSAGE_COUNT: usize = 3;

/// The default delay between successive probes from the same agent.
pub const DEFAULT_INITIAL_MESSAGE_WAIT: Duration = Duration::from_secs(5);

/// The default length of each agent's listen window.
///
/// Each agent unsubscribes when its window expires, even if some echoes are
/// still missing. This bounds the run time when peers or the transport fail.
pub const DEFAULT_LISTEN_TIME: Duration = Duration::from_secs(30);

/// The default number of agents in a run.
pub const DEFAULT_AGENT_COUNT: usize = 3;

/// The smallest useful number of agents: one sender and one echoer.
pub const MIN_AGENT_COUNT: usize = 2;

/// The largest number of agents in a run.
///
/// Every payload is delivered to every agent, so delivery work grows with the
/// cube of the agent count.
pub const MAX_AGENT_COUNT: usize = 256;

/// The prefix of generated agent identities, followed by a 1-based index.
pub const AGENT_ID_PREFIX: &str = "client";

/// The smallest number of payloads buffered for each subscriber of an
/// in-process channel.
pub const MIN_CHANNEL_CAPACITY: usize = 1024;

/// The largest number of payloads buffered for each subscriber of an
/// in-process channel.
///
/// Subscribers that fall further behind than the channel capacity skip the
/// oldest payloads, which shows up as missing echoes in the run report.
pub const MAX_CHANNEL_CAPACITY: usize = 1 << 20;
