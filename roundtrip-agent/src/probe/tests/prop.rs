//! Randomised property tests for probes.

use proptest::prelude::*;

use crate::probe::{AgentId, Probe, ProbeState, Timestamp};

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(roundtrip_test::proptest_cases(256)))]

    /// Classification accepts exactly the probes that follow the protocol rules.
    #[test]
    fn classify_accepts_only_consistent_probes(observer in any::<AgentId>(), probe in any::<Probe>()) {
        let _init_guard = roundtrip_test::init();

        let consistent = match (&probe.receiver_id, &probe.received_timestamp) {
            (None, None) => true,
            (Some(receiver_id), Some(_)) => *receiver_id != probe.sender_id,
            _ => false,
        };

        let state = ProbeState::classify(&observer, probe.clone());
        prop_assert_eq!(state.is_ok(), consistent, "probe: {:?}", probe);
    }

    /// Classification depends only on who sent the probe and whether it was answered.
    #[test]
    fn classify_matches_sender_and_answer(observer in any::<AgentId>(), probe in any::<Probe>()) {
        let _init_guard = roundtrip_test::init();

        let sent_by_us = probe.sender_id == observer;
        let answered = probe.receiver_id.is_some();

        match ProbeState::classify(&observer, probe) {
            Ok(ProbeState::OwnUnanswered(_)) => prop_assert!(sent_by_us && !answered),
            Ok(ProbeState::ForeignUnanswered(_)) => prop_assert!(!sent_by_us && !answered),
            Ok(ProbeState::ForeignAnswered(_)) => prop_assert!(!sent_by_us && answered),
            Ok(ProbeState::OwnAnswered(_)) => prop_assert!(sent_by_us && answered),
            Err(_) => {}
        }
    }

    /// Probes decode to the same value they were encoded from.
    #[test]
    fn payload_encoding_preserves_probes(probe in any::<Probe>()) {
        let _init_guard = roundtrip_test::init();

        let decoded = Probe::from_payload(&probe.to_payload()).expect("encoded probes decode");
        prop_assert_eq!(decoded, probe);
    }

    /// Answering a probe never produces a negative round trip, as long as
    /// the answer comes later on the same clock.
    #[test]
    fn later_answers_have_non_negative_latency(
        probe in Probe::unanswered_strategy(),
        receiver_id in any::<AgentId>(),
        delay in 0..=u64::from(u32::MAX),
    ) {
        let _init_guard = roundtrip_test::init();

        let received = Timestamp(probe.sender_timestamp.0 + delay);
        let observer = probe.sender_id.clone();

        let Ok(ProbeState::OwnUnanswered(probe)) = ProbeState::classify(&observer, probe) else {
            panic!("unanswered probes are unanswered for their sender");
        };

        let record = probe.answer(receiver_id, received).round_trip();
        prop_assert_eq!(record.map(|record| record.latency_nanos), Ok(delay));
    }
}
