//! Echo agents.
//!
//! An [`Agent`] owns one identity and the round trips it has completed.
//! Subscribing an agent moves it into its own inbound task, which processes
//! the agent's channel one payload at a time, so its records never need a lock.

use std::time::Duration;

use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::Instrument;

use crate::{
    clock::Clock,
    error::{AttachError, ProtocolViolation, TransportError},
    probe::{AgentId, Probe, ProbeState, RoundTripRecord},
    transport::{Channel, Subscription},
};


/// An echo agent, before it subscribes to a channel.
#[derive(Clone, Debug)]
pub struct Agent {
    id: AgentId,
    clock: Clock,
    records: Vec<RoundTripRecord>,
}

impl Agent {
    /// Returns a new agent called `id`, which timestamps probes using `clock`.
    pub fn new(id: AgentId, clock: Clock) -> Self {
        Self {
            id,
            clock,
            records: Vec::new(),
        }
    }

    /// Returns this agent's identity.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Returns the round trips this agent has completed.
    pub fn records(&self) -> &[RoundTripRecord] {
        &self.records
    }

    /// Returns a new unanswered probe from this agent, timestamped now.
    pub fn new_probe(&self) -> Probe {
        Probe::new(self.id.clone(), self.clock.now())
    }

    /// Runs the echo state machine on one observed probe.
    ///
    /// Returns the echo this agent should publish, if any.
    pub fn handle(&mut self, probe: Probe) -> Result<Option<Probe>, ProtocolViolation> {
        match ProbeState::classify(&self.id, probe)? {
            ProbeState::ForeignUnanswered(probe) => {
                let echo = probe.answer(self.id.clone(), self.clock.now());

                Ok(Some(echo.into()))
            }
            ProbeState::OwnUnanswered(probe) => {
                trace!(?probe, "ignoring non replied message from self");

                Ok(None)
            }
            ProbeState::ForeignAnswered(probe) => {
                trace!(?probe, "ignoring replied message not for us");

                Ok(None)
            }
            ProbeState::OwnAnswered(probe) => {
                let record = probe.round_trip()?;
                trace!(?record, "completed round trip");
                self.records.push(record);

                Ok(None)
            }
        }
    }

    /// Decodes a channel payload, then runs the echo state machine on it.
    ///
    /// Payloads that aren't probes are stray messages, and are ignored.
    pub fn handle_payload(&mut self, payload: &str) -> Result<Option<Probe>, ProtocolViolation> {
        match Probe::from_payload(payload) {
            Ok(probe) => self.handle(probe),
            Err(error) => {
                warn!(%error, ?payload, "ignoring payload that is not a probe");

                Ok(None)
            }
        }
    }

    /// Attaches this agent to `channel`, and starts processing its payloads.
    ///
    /// The listen window starts once the agent is attached. When it expires,
    /// the agent unsubscribes, even if some echoes are still missing.
    pub async fn subscribe<C: Channel>(
        self,
        channel: &C,
        listen_time: Duration,
    ) -> Result<SubscribedAgent<C>, AttachError> {
        let span = info_span!("agent", id = %self.id);

        // Attach before returning, so no probes published after this point are missed.
        let subscription = channel.attach().instrument(span.clone()).await?;
        let listen_deadline = Instant::now() + listen_time;

        let (unsubscribe_tx, unsubscribe_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = watch::channel(self.records.len());

        let id = self.id.clone();
        let clock = self.clock;

        let task = tokio::spawn(
            run_inbound(
                self,
                channel.clone(),
                subscription,
                listen_deadline,
                unsubscribe_rx,
                progress_tx,
            )
            .instrument(span),
        );

        Ok(SubscribedAgent {
            id,
            clock,
            channel: channel.clone(),
            progress: progress_rx,
            unsubscribe: Some(unsubscribe_tx),
            task,
        })
    }
}

/// Why an agent stopped processing its channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AgentExit {
    /// The agent was explicitly unsubscribed.
    Unsubscribed,

    /// The agent's listen window expired.
    ListenWindowExpired,

    /// The channel or its connection closed.
    ChannelClosed,

    /// The agent observed a probe that breaks the echo protocol.
    Halted(ProtocolViolation),

    /// The agent's task was cancelled, so its records were lost.
    Cancelled,
}

/// The final state of an agent, after it stopped processing its channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AgentReport {
    /// The agent's identity.
    pub id: AgentId,

    /// The round trips the agent completed.
    pub records: Vec<RoundTripRecord>,

    /// Why the agent stopped.
    pub exit: AgentExit,
}

/// An agent that is attached to a channel, and processing its payloads in a
/// background task.
///
/// Dropping a subscribed agent unsubscribes it.
#[derive(Debug)]
pub struct SubscribedAgent<C> {
    id: AgentId,
    clock: Clock,
    channel: C,
    progress: watch::Receiver<usize>,
    unsubscribe: Option<oneshot::Sender<()>>,
    task: JoinHandle<AgentReport>,
}

impl<C: Channel> SubscribedAgent<C> {
    /// Returns this agent's identity.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Returns a new unanswered probe from this agent, timestamped now.
    pub fn new_probe(&self) -> Probe {
        Probe::new(self.id.clone(), self.clock.now())
    }

    /// Publishes `probe` on this agent's channel, without validating it.
    pub fn publish_probe(&self, probe: &Probe) -> Result<(), TransportError> {
        debug!(agent = %self.id, ?probe, "sending");

        self.channel.publish(probe.to_payload())
    }

    /// Returns a receiver for this agent's completed round trip count.
    ///
    /// The sender is dropped when the agent stops processing its channel.
    pub fn progress(&self) -> watch::Receiver<usize> {
        self.progress.clone()
    }

    /// Stops processing this agent's channel.
    ///
    /// Payloads that are already in flight are dropped.
    pub fn unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            debug!(agent = %self.id, "unsubscribing");

            // The task has already exited if the receiver was dropped.
            let _ = unsubscribe.send(());
        }
    }

    /// Unsubscribes this agent, then waits for its final report.
    pub async fn join(mut self) -> AgentReport {
        self.unsubscribe();

        match (&mut self.task).await {
            Ok(report) => report,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(error) => {
                warn!(agent = %self.id, %error, "agent task was cancelled");

                AgentReport {
                    id: self.id.clone(),
                    records: Vec::new(),
                    exit: AgentExit::Cancelled,
                }
            }
        }
    }
}

/// Processes `subscription` payloads for `agent`, until it is unsubscribed,
/// its listen window expires, the channel closes, or it observes a protocol
/// violation.
async fn run_inbound<C: Channel>(
    mut agent: Agent,
    channel: C,
    mut subscription: C::Subscription,
    listen_deadline: Instant,
    mut unsubscribe: oneshot::Receiver<()>,
    progress: watch::Sender<usize>,
) -> AgentReport {
    let listen_window = sleep_until(listen_deadline);
    tokio::pin!(listen_window);

    let exit = loop {
        let payload = tokio::select! {
            biased;

            // Also fires if the handle was dropped.
            _ = &mut unsubscribe => break AgentExit::Unsubscribed,

            _ = &mut listen_window => {
                debug!(records = agent.records.len(), "listen window expired, unsubscribing");
                break AgentExit::ListenWindowExpired;
            }

            payload = subscription.recv() => match payload {
                Some(payload) => payload,
                None => {
                    debug!("channel closed");
                    break AgentExit::ChannelClosed;
                }
            },
        };

        match agent.handle_payload(&payload) {
            Ok(Some(echo)) => {
                debug!(?echo, "sending");

                if let Err(error) = channel.publish(echo.to_payload()) {
                    warn!(%error, "failed to publish echo");
                }
            }
            Ok(None) => {}
            Err(violation) => {
                error!(%violation, probe = ?violation.probe(), "unknown state, halting agent");
                break AgentExit::Halted(violation);
            }
        }

        let records = agent.records.len();
        progress.send_if_modified(|count| {
            let modified = *count != records;
            *count = records;
            modified
        });
    };

    // Detach from the channel before reporting.
    drop(subscription);

    AgentReport {
        id: agent.id,
        records: agent.records,
        exit,
    }
}
