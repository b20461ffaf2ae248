//! Tests for run convergence.

use crate::{
    agent::{AgentExit, AgentReport},
    error::ProtocolViolation,
    orchestrator::{Convergence, Shortfall},
    probe::{Probe, RoundTripRecord, Timestamp},
};

fn report(id: &str, received: usize, exit: AgentExit) -> AgentReport {
    AgentReport {
        id: id.into(),
        records: (0..received)
            .map(|latency_nanos| RoundTripRecord {
                peer_id: "peer".into(),
                latency_nanos: latency_nanos as u64,
            })
            .collect(),
        exit,
    }
}

#[test]
fn complete_when_every_agent_has_every_record() {
    let _init_guard = roundtrip_test::init();

    let reports = [
        report("client1", 2, AgentExit::Unsubscribed),
        // Agents may stop listening after they have every record.
        report("client2", 2, AgentExit::ListenWindowExpired),
    ];

    assert_eq!(Convergence::from_reports(&reports, 2), Convergence::Complete);
    assert!(Convergence::from_reports(&reports, 2).is_complete());
}

#[test]
fn partial_when_an_agent_is_missing_records() {
    let _init_guard = roundtrip_test::init();

    let reports = [
        report("client1", 2, AgentExit::Unsubscribed),
        report("client2", 1, AgentExit::ListenWindowExpired),
    ];

    assert_eq!(
        Convergence::from_reports(&reports, 2),
        Convergence::Partial {
            shortfalls: vec![Shortfall {
                agent: "client2".into(),
                received: 1,
                expected: 2,
                exit: AgentExit::ListenWindowExpired,
            }],
        },
    );
}

#[test]
fn halted_agents_are_always_shortfalls() {
    let _init_guard = roundtrip_test::init();

    let violation = ProtocolViolation::SelfEcho {
        probe: Probe {
            sender_id: "client2".into(),
            sender_timestamp: Timestamp(1),
            receiver_id: Some("client2".into()),
            received_timestamp: Some(Timestamp(2)),
        },
    };
    let reports = [report("client1", 2, AgentExit::Halted(violation))];

    let convergence = Convergence::from_reports(&reports, 2);

    assert!(!convergence.is_complete());
    assert!(matches!(
        convergence,
        Convergence::Partial { shortfalls } if shortfalls.len() == 1,
    ));
}
