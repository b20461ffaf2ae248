//! Randomised data generation for probes.

use proptest::prelude::*;

use super::{AgentId, Probe, Timestamp};

/// The largest generated timestamp, which leaves room to add latencies.
const MAX_GENERATED_TIMESTAMP: u64 = u64::MAX / 2;

impl Arbitrary for AgentId {
    type Parameters = ();

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (1..=5_usize)
            .prop_map(|index| AgentId::new(format!("client{index}")))
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Timestamp {
    type Parameters = ();

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (0..=MAX_GENERATED_TIMESTAMP).prop_map(Timestamp).boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Probe {
    type Parameters = ();

    /// Generates probes in every shape, including ones that break the protocol.
    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (
            any::<AgentId>(),
            any::<Timestamp>(),
            any::<Option<AgentId>>(),
            any::<Option<Timestamp>>(),
        )
            .prop_map(
                |(sender_id, sender_timestamp, receiver_id, received_timestamp)| Probe {
                    sender_id,
                    sender_timestamp,
                    receiver_id,
                    received_timestamp,
                },
            )
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Probe {
    /// Returns a strategy that only generates unanswered probes.
    pub fn unanswered_strategy() -> BoxedStrategy<Self> {
        (any::<AgentId>(), any::<Timestamp>())
            .prop_map(|(sender_id, sender_timestamp)| Probe::new(sender_id, sender_timestamp))
            .boxed()
    }
}
