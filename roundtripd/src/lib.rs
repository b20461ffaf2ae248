//! Command-line support for `roundtripd`, which measures round-trip latency
//! between echo agents sharing one pub/sub channel.
//!
//! For usage please refer to the program help: `roundtripd --help`

#[macro_use]
extern crate tracing;

pub mod args;
pub mod credential;
pub mod shutdown;
pub mod table;

pub use crate::{
    args::Args,
    credential::{api_key_from_env, CredentialError, API_KEY_ENV},
    shutdown::close_on_shutdown_signal,
    table::LatencyTable,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Initialise tracing, using the `RUST_LOG` env var, or [`DEFAULT_LOG_FILTER`].
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_error::ErrorLayer::default())
        .init();
}
