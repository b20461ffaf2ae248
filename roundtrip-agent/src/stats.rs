//! Per-peer latency statistics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    agent::AgentReport,
    probe::{AgentId, RoundTripRecord},
};


/// Round-trip latency statistics for probes from `sender` echoed by `receiver`.
///
/// Latencies are in nanoseconds.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LatencyRow {
    /// The agent that sent the probes.
    pub sender: AgentId,

    /// The agent that echoed the probes.
    pub receiver: AgentId,

    /// The shortest round trip.
    pub min: u64,

    /// The longest round trip.
    pub max: u64,

    /// The mean round trip, rounded to the nearest nanosecond.
    pub mean: u64,
}

/// Running totals for one peer.
#[derive(Copy, Clone, Debug)]
struct Summary {
    min: u64,
    max: u64,
    sum: u128,
    count: u128,
}

impl Summary {
    fn new(latency: u64) -> Self {
        Self {
            min: latency,
            max: latency,
            sum: latency.into(),
            count: 1,
        }
    }

    fn add(&mut self, latency: u64) {
        self.min = self.min.min(latency);
        self.max = self.max.max(latency);
        self.sum += u128::from(latency);
        self.count += 1;
    }

    /// Returns the mean, rounding halves up.
    fn mean(&self) -> u64 {
        let mean = (self.sum + self.count / 2) / self.count;

        // The mean of u64 values is always between their min and max.
        u64::try_from(mean).unwrap_or(self.max)
    }
}

/// Aggregates the records of every agent in `reports`.
///
/// Returns one row for each sender and peer with at least one completed round
/// trip. Rows are in report order, then in peer order.
pub fn aggregate(reports: &[AgentReport]) -> Vec<LatencyRow> {
    reports
        .iter()
        .flat_map(|report| summarize(&report.id, &report.records))
        .collect()
}

/// Groups `records` completed by `sender` by peer, and summarises each group.
///
/// Returns rows in peer order.
pub fn summarize(sender: &AgentId, records: &[RoundTripRecord]) -> Vec<LatencyRow> {
    let mut peers: BTreeMap<&AgentId, Summary> = BTreeMap::new();

    for record in records {
        peers
            .entry(&record.peer_id)
            .and_modify(|summary| summary.add(record.latency_nanos))
            .or_insert_with(|| Summary::new(record.latency_nanos));
    }

    peers
        .into_iter()
        .map(|(receiver, summary)| LatencyRow {
            sender: sender.clone(),
            receiver: receiver.clone(),
            min: summary.min,
            max: summary.max,
            mean: summary.mean(),
        })
        .collect()
}
