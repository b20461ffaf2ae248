//! `roundtripd` arguments
//!
//! For usage please refer to the program help: `roundtripd --help`

use std::time::Duration;

use structopt::StructOpt;

use roundtrip_agent::{
    constants::{MAX_AGENT_COUNT, MIN_AGENT_COUNT},
    RunConfig,
};

/// `roundtripd` arguments
#[derive(Clone, Debug, Eq, PartialEq, StructOpt)]
#[structopt(
    name = "roundtripd",
    about = "Measures round-trip latency between agents sharing a pub/sub channel.\n\
             The transport API key is read from the API_KEY env var."
)]
pub struct Args {
    /// Channel name to use.
    #[structopt(short, long)]
    pub channel: String,

    /// How many initial messages each agent sends.
    #[structopt(short, long = "initial-count", default_value = "3")]
    pub initial_count: usize,

    /// How long to wait between sending messages, in seconds.
    #[structopt(short = "w", long = "initial-wait", default_value = "5")]
    pub initial_wait: u64,

    /// How long to listen for responses, in seconds.
    #[structopt(short, long = "listen-time", default_value = "30")]
    pub listen_time: u64,

    /// How many agents to run.
    #[structopt(short, long, default_value = "3", parse(try_from_str = parse_agent_count))]
    pub agents: usize,
}

impl Args {
    /// Returns the run configuration for these arguments.
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            channel_name: self.channel.clone(),
            initial_message_count: self.initial_count,
            initial_message_wait: Duration::from_secs(self.initial_wait),
            listen_time: Duration::from_secs(self.listen_time),
            agent_count: self.agents,
        }
    }
}

/// Parses an agent count, which must allow at least one round trip, and stay
/// within the agent limit.
fn parse_agent_count(count: &str) -> Result<usize, String> {
    let count: usize = count.parse().map_err(|_| "not a number".to_string())?;

    if count < MIN_AGENT_COUNT {
        return Err(format!("at least {MIN_AGENT_COUNT} agents are needed"));
    }

    if count > MAX_AGENT_COUNT {
        return Err(format!("at most {MAX_AGENT_COUNT} agents are supported"));
    }

    Ok(count)
}
