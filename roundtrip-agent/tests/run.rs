//! Whole-run tests for the orchestrator.

use std::time::Duration;

use tokio::time;

use roundtrip_agent::{
    AgentExit, AgentId, ApiKey, AttachError, Channel, Convergence, LatencyRow, MemoryChannel,
    MemoryConnection, MemoryTransport, Orchestrator, Phase, Probe, RunConfig, RunError,
    TransportError,
};

/// Every phase of a run, in order.
const ALL_PHASES: [Phase; 7] = [
    Phase::Created,
    Phase::Subscribed,
    Phase::Sending,
    Phase::Listening,
    Phase::Converged,
    Phase::Aggregated,
    Phase::Done,
];

/// Connects to a new hub sized for `config`.
async fn connect(config: &RunConfig) -> MemoryConnection {
    let key: ApiKey = "app.key:secret".parse().expect("test key is not empty");

    MemoryTransport::provision(key.clone(), config.channel_capacity())
        .connect(&key)
        .await
        .expect("the hub accepts its own key")
}

fn config(agent_count: usize, initial_message_count: usize) -> RunConfig {
    RunConfig {
        initial_message_count,
        initial_message_wait: Duration::ZERO,
        listen_time: Duration::from_secs(30),
        agent_count,
        ..RunConfig::new("latency")
    }
}

/// A channel that silently drops echoes from one agent.
#[derive(Clone, Debug)]
struct DropEchoesFrom {
    inner: MemoryChannel,
    receiver_id: AgentId,
}

impl Channel for DropEchoesFrom {
    type Subscription = <MemoryChannel as Channel>::Subscription;

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn attach(&self) -> Result<Self::Subscription, AttachError> {
        self.inner.attach().await
    }

    fn publish(&self, payload: String) -> Result<(), TransportError> {
        let probe = Probe::from_payload(&payload).expect("agents only publish probes");

        if probe.receiver_id.as_ref() == Some(&self.receiver_id) {
            return Ok(());
        }

        self.inner.publish(payload)
    }
}

/// Two agents, one probe each, no wait: one row each way, with min = max = mean.
#[tokio::test]
async fn two_agents_one_probe() {
    let _init_guard = roundtrip_test::init();
    time::pause();

    let config = config(2, 1);
    let connection = connect(&config).await;
    let orchestrator = Orchestrator::new(config, connection.channel("latency"));

    let report = orchestrator.run().await.expect("agents attach");

    assert_eq!(report.convergence, Convergence::Complete);
    for agent in &report.agents {
        assert_eq!(agent.records.len(), 1);
        assert_eq!(agent.exit, AgentExit::Unsubscribed);
    }

    assert_eq!(report.rows.len(), 2);
    assert_eq!(
        (
            report.rows[0].sender.as_str(),
            report.rows[0].receiver.as_str()
        ),
        ("client1", "client2"),
    );
    assert_eq!(
        (
            report.rows[1].sender.as_str(),
            report.rows[1].receiver.as_str()
        ),
        ("client2", "client1"),
    );
    for LatencyRow { min, max, mean, .. } in &report.rows {
        assert_eq!(min, max);
        assert_eq!(min, mean);
    }
}

/// The default shape: 3 agents, 3 probes each, with a send delay.
#[tokio::test]
async fn three_agents_converge() {
    let _init_guard = roundtrip_test::init();
    time::pause();

    let config = RunConfig {
        initial_message_wait: Duration::from_secs(5),
        ..config(3, 3)
    };
    let connection = connect(&config).await;
    let expected = config.expected_records();
    assert_eq!(expected, 6);

    let start = time::Instant::now();
    let report = Orchestrator::new(config, connection.channel("latency"))
        .run()
        .await
        .expect("agents attach");

    assert_eq!(report.convergence, Convergence::Complete);
    for agent in &report.agents {
        assert_eq!(agent.records.len(), expected);
    }

    // One row for each ordered pair of distinct agents.
    assert_eq!(report.rows.len(), 6);
    for row in &report.rows {
        assert_ne!(row.sender, row.receiver);
        assert!(row.min <= row.mean && row.mean <= row.max);
    }

    // The run finishes once converged, without waiting for the listen windows.
    assert!(start.elapsed() < Duration::from_secs(30));
    assert_eq!(report.phases, ALL_PHASES);
}

/// Many agents publish many more payloads than the smallest channel buffer,
/// but a hub sized for the run still delivers every one of them.
#[tokio::test]
async fn many_agents_converge() {
    let _init_guard = roundtrip_test::init();
    time::pause();

    let config = config(40, 3);
    let connection = connect(&config).await;

    let report = Orchestrator::new(config.clone(), connection.channel("latency"))
        .run()
        .await
        .expect("agents attach");

    assert_eq!(report.convergence, Convergence::Complete);
    for agent in &report.agents {
        assert_eq!(agent.records.len(), config.expected_records());
        assert_eq!(agent.exit, AgentExit::Unsubscribed);
    }
    assert_eq!(report.rows.len(), 40 * 39);
}

/// The orchestrator waits in the listening phase until the agents converge or
/// stop listening, and only aggregates after that.
#[tokio::test]
async fn phases_are_published_in_order() {
    let _init_guard = roundtrip_test::init();
    time::pause();

    let config = config(2, 1);
    let connection = connect(&config).await;
    let channel = DropEchoesFrom {
        inner: connection.channel("latency"),
        receiver_id: "client2".into(),
    };

    let orchestrator = Orchestrator::new(config, channel);
    let mut phases = orchestrator.phases();
    assert_eq!(*phases.borrow(), Phase::Created);

    let run = tokio::spawn(orchestrator.run());

    phases
        .wait_for(|phase| *phase >= Phase::Listening)
        .await
        .expect("the run is still going");
    assert_eq!(*phases.borrow(), Phase::Listening);

    // client1 never gets its echo, so the run waits for its listen window.
    time::sleep(Duration::from_secs(20)).await;
    assert_eq!(*phases.borrow(), Phase::Listening);

    let report = run
        .await
        .expect("run task doesn't panic")
        .expect("partial convergence is not an error");

    assert_eq!(*phases.borrow(), Phase::Done);
    assert_eq!(report.phases, ALL_PHASES);
    assert!(!report.convergence.is_complete());
}

/// Missing echoes end the run when the listen windows expire, with partial results.
#[tokio::test]
async fn missing_echoes_give_partial_results() {
    let _init_guard = roundtrip_test::init();
    time::pause();

    let config = config(3, 2);
    let connection = connect(&config).await;
    let channel = DropEchoesFrom {
        inner: connection.channel("latency"),
        receiver_id: "client2".into(),
    };

    let start = time::Instant::now();
    let report = Orchestrator::new(config, channel)
        .run()
        .await
        .expect("partial convergence is not an error");

    assert!(start.elapsed() >= Duration::from_secs(30));

    let Convergence::Partial { shortfalls } = &report.convergence else {
        panic!("echoes from client2 were dropped, so the run can't converge");
    };

    let short_agents: Vec<&str> = shortfalls
        .iter()
        .map(|shortfall| shortfall.agent.as_str())
        .collect();
    assert_eq!(short_agents, ["client1", "client3"]);
    for shortfall in shortfalls {
        assert_eq!(shortfall.received, 2);
        assert_eq!(shortfall.expected, 4);
        assert_eq!(shortfall.exit, AgentExit::ListenWindowExpired);
    }

    // Pairs without any round trips are omitted.
    let pairs: Vec<(&str, &str)> = report
        .rows
        .iter()
        .map(|row| (row.sender.as_str(), row.receiver.as_str()))
        .collect();
    assert_eq!(
        pairs,
        [
            ("client1", "client3"),
            ("client2", "client1"),
            ("client2", "client3"),
            ("client3", "client1"),
        ],
    );
}

#[tokio::test]
async fn attach_failures_stop_the_run() {
    let _init_guard = roundtrip_test::init();

    let config = config(2, 1);
    let connection = connect(&config).await;
    let channel = connection.channel("latency");
    connection.close();

    let result = Orchestrator::new(config, channel).run().await;

    assert!(matches!(
        result,
        Err(RunError::Attach {
            source: TransportError::AttachRejected { .. },
            ..
        }),
    ));
}

#[tokio::test]
async fn runs_need_two_agents() {
    let _init_guard = roundtrip_test::init();

    let config = config(1, 1);
    let connection = connect(&config).await;

    let result = Orchestrator::new(config, connection.channel("latency"))
        .run()
        .await;

    assert!(matches!(
        result,
        Err(RunError::NotEnoughAgents { agent_count: 1 }),
    ));
}

/// Closing the connection mid-run ends the run early, with whatever was received.
#[tokio::test]
async fn closing_the_connection_ends_the_run() {
    let _init_guard = roundtrip_test::init();
    time::pause();

    let config = RunConfig {
        initial_message_wait: Duration::from_secs(10),
        listen_time: Duration::from_secs(60 * 60),
        ..config(2, 100)
    };
    let connection = connect(&config).await;

    let closer = connection.clone();
    tokio::spawn(async move {
        time::sleep(Duration::from_secs(15)).await;
        closer.close();
    });

    let start = time::Instant::now();
    let report = Orchestrator::new(config, connection.channel("latency"))
        .run()
        .await
        .expect("agents attach before the close");

    assert!(start.elapsed() < Duration::from_secs(60));
    assert!(!report.convergence.is_complete());
    for agent in &report.agents {
        assert_eq!(agent.exit, AgentExit::ChannelClosed);
        assert_eq!(agent.records.len(), 2);
    }
}
