//! Drives a fixed set of agents through a latency measurement run.

use std::time::Duration;

use futures::future::{join_all, try_join_all};
use tokio::sync::watch;

use crate::{
    agent::{Agent, AgentExit, AgentReport, SubscribedAgent},
    clock::Clock,
    config::RunConfig,
    constants::MIN_AGENT_COUNT,
    error::RunError,
    probe::AgentId,
    stats::{aggregate, LatencyRow},
    transport::Channel,
};

#[cfg(test)]
mod tests;

/// The phases of a run, in order. A run never returns to an earlier phase.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Phase {
    /// No agents are attached yet.
    Created,

    /// Every agent is attached, and its listen window is running.
    Subscribed,

    /// Agents are sending their probes.
    Sending,

    /// Every probe has been sent, and agents are waiting for echoes.
    Listening,

    /// Every agent has its expected echoes, or has stopped listening.
    Converged,

    /// The records of every agent have been aggregated.
    Aggregated,

    /// The run is finished.
    Done,
}

/// An agent that stopped with fewer round trips than expected, or halted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Shortfall {
    /// The agent.
    pub agent: AgentId,

    /// The round trips it completed.
    pub received: usize,

    /// The round trips it would have completed in a fully converged run.
    pub expected: usize,

    /// Why it stopped.
    pub exit: AgentExit,
}

/// Whether every agent received every echo.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Convergence {
    /// Every agent completed every expected round trip.
    Complete,

    /// Some agents stopped early. Their results only cover the round trips they completed.
    Partial {
        /// The agents that stopped early.
        shortfalls: Vec<Shortfall>,
    },
}

impl Convergence {
    /// Checks `reports` against the `expected` number of round trips per agent.
    pub fn from_reports(reports: &[AgentReport], expected: usize) -> Self {
        let shortfalls: Vec<Shortfall> = reports
            .iter()
            .filter(|report| {
                report.records.len() < expected || matches!(report.exit, AgentExit::Halted(_))
            })
            .map(|report| Shortfall {
                agent: report.id.clone(),
                received: report.records.len(),
                expected,
                exit: report.exit.clone(),
            })
            .collect();

        if shortfalls.is_empty() {
            Convergence::Complete
        } else {
            Convergence::Partial { shortfalls }
        }
    }

    /// Returns true if every agent completed every expected round trip.
    pub fn is_complete(&self) -> bool {
        matches!(self, Convergence::Complete)
    }
}

/// The results of a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunReport {
    /// Latency statistics for each sender and peer with at least one round trip.
    pub rows: Vec<LatencyRow>,

    /// Whether the run fully converged.
    pub convergence: Convergence,

    /// The final state of each agent.
    pub agents: Vec<AgentReport>,

    /// Every phase the run went through, in order.
    pub phases: Vec<Phase>,
}

/// Runs the agents in a [`RunConfig`] over a shared [`Channel`].
#[derive(Debug)]
pub struct Orchestrator<C> {
    config: RunConfig,
    channel: C,
    phase: watch::Sender<Phase>,
    history: Vec<Phase>,
}

impl<C: Channel> Orchestrator<C> {
    /// Returns a new orchestrator, which will run `config` over `channel`.
    pub fn new(config: RunConfig, channel: C) -> Self {
        let (phase, _) = watch::channel(Phase::Created);

        Self {
            config,
            channel,
            phase,
            history: vec![Phase::Created],
        }
    }

    /// Returns a receiver for the current phase of the run.
    ///
    /// The receiver keeps the last phase after the run finishes.
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Runs every phase, then returns the aggregated results.
    ///
    /// Fails if any agent can't attach. Agents that stop early are not errors:
    /// their partial results are aggregated, and reported in the [`Convergence`].
    pub async fn run(mut self) -> Result<RunReport, RunError> {
        let agent_ids = self.config.agent_ids();
        if agent_ids.len() < MIN_AGENT_COUNT {
            return Err(RunError::NotEnoughAgents {
                agent_count: agent_ids.len(),
            });
        }

        let clock = Clock::start();
        let expected = self.config.expected_records();

        info!(channel = %self.channel.name(), "subscribing to channels");
        let agents = self.subscribe_all(agent_ids, clock).await?;
        self.advance(Phase::Subscribed);

        self.advance(Phase::Sending);
        info!("sending messages");
        join_all(agents.iter().map(|agent| {
            send_burst(
                agent,
                self.config.initial_message_count,
                self.config.initial_message_wait,
            )
        }))
        .await;

        self.advance(Phase::Listening);
        info!("waiting for all messages to be received");
        join_all(
            agents
                .iter()
                .map(|agent| wait_for_records(agent, expected)),
        )
        .await;

        self.advance(Phase::Converged);
        let reports = join_all(agents.into_iter().map(SubscribedAgent::join)).await;

        let convergence = Convergence::from_reports(&reports, expected);
        match &convergence {
            Convergence::Complete => info!("all messages received"),
            Convergence::Partial { shortfalls } => warn!(
                ?shortfalls,
                "some agents stopped before receiving every echo, reporting partial results",
            ),
        }

        let rows = aggregate(&reports);
        self.advance(Phase::Aggregated);

        self.advance(Phase::Done);

        Ok(RunReport {
            rows,
            convergence,
            agents: reports,
            phases: self.history,
        })
    }

    /// Subscribes every agent, failing if any of them can't attach.
    ///
    /// Agents that already attached are unsubscribed when they are dropped.
    async fn subscribe_all(
        &self,
        agent_ids: Vec<AgentId>,
        clock: Clock,
    ) -> Result<Vec<SubscribedAgent<C>>, RunError> {
        let listen_time = self.config.listen_time;

        try_join_all(agent_ids.into_iter().map(|id| async move {
            Agent::new(id.clone(), clock)
                .subscribe(&self.channel, listen_time)
                .await
                .map_err(|source| {
                    error!(agent = %id, %source, "agent could not attach to the channel");
                    RunError::Attach { agent: id, source }
                })
        }))
        .await
    }

    /// Moves the run to `next`.
    fn advance(&mut self, next: Phase) {
        let previous = self.phase.send_replace(next);
        debug_assert!(
            next > previous,
            "runs never go back to an earlier phase: {previous:?} -> {next:?}",
        );

        debug!(from = ?previous, to = ?next, "run phase");
        self.history.push(next);
    }
}

/// Sends `count` probes from `agent`, waiting `wait` between successive probes.
///
/// Stops early if the transport is closed.
async fn send_burst<C: Channel>(agent: &SubscribedAgent<C>, count: usize, wait: Duration) {
    for sent in 0..count {
        if sent > 0 {
            tokio::time::sleep(wait).await;
        }

        let probe = agent.new_probe();
        if let Err(error) = agent.publish_probe(&probe) {
            warn!(agent = %agent.id(), %error, sent, "stopping send burst");
            return;
        }
    }
}

/// Waits until `agent` has `expected` round trips, or stops listening.
async fn wait_for_records<C: Channel>(agent: &SubscribedAgent<C>, expected: usize) {
    let mut progress = agent.progress();

    let received_every_echo = progress
        .wait_for(|&current| {
            trace!(agent = %agent.id(), wanted = expected, current, "waiting for messages");
            current >= expected
        })
        .await
        .is_ok();

    if received_every_echo {
        debug!(agent = %agent.id(), "agent received every echo");
    } else {
        debug!(agent = %agent.id(), "agent stopped listening");
    }
}

