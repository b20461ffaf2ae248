//! Measures round-trip latency between echo agents sharing one pub/sub channel.
//!
//! For usage please refer to the program help: `roundtripd --help`

use color_eyre::eyre::{Result, WrapErr};
use structopt::StructOpt;
use tracing::{debug, info, warn};

use roundtrip_agent::{Convergence, MemoryTransport, Orchestrator};
use roundtripd::{api_key_from_env, close_on_shutdown_signal, init_tracing, Args, LatencyTable};

/// `roundtripd` entrypoint.
///
/// Runs the configured agents over an in-process transport, then prints a
/// latency table (see [`Args`] for more information).
#[tokio::main]
#[allow(clippy::print_stdout)]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    info!("starting");

    let args = Args::from_args();
    let api_key = api_key_from_env()?;

    let config = args.run_config();
    debug!(?config, "config");

    let transport = MemoryTransport::provision(api_key.clone(), config.channel_capacity());
    let connection = transport
        .connect(&api_key)
        .await
        .wrap_err("initial connection failure")?;

    tokio::spawn(close_on_shutdown_signal(connection.clone()));

    info!("creating clients");
    let orchestrator = Orchestrator::new(config.clone(), connection.channel(&config.channel_name));
    let report = orchestrator.run().await.wrap_err("run failed")?;

    println!("{}", LatencyTable::new(&report.rows));

    if let Convergence::Partial { shortfalls } = &report.convergence {
        println!(
            "partial results: {} of {} agents did not receive every echo",
            shortfalls.len(),
            report.agents.len(),
        );

        for shortfall in shortfalls {
            warn!(
                agent = %shortfall.agent,
                received = shortfall.received,
                expected = shortfall.expected,
                exit = ?shortfall.exit,
                "partial results: agent did not receive every echo",
            );
        }
    }

    connection.close();
    debug!("done");

    Ok(())
}
