//! Shared test setup for the round-trip latency crates.
// Standard lints
#![warn(missing_docs)]
#![deny(clippy::await_holding_lock)]
#![forbid(unsafe_code)]

use std::{collections::HashSet, sync::Once};

use color_eyre::config::{Frame, HookBuilder};
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// The env var that overrides the default number of proptest cases.
pub const PROPTEST_CASES: &str = "PROPTEST_CASES";

/// The log filter used when `RUST_LOG` is not set.
///
/// Partial runs and stray payloads log expected warnings in tests, so agent
/// logs are limited to errors.
const DEFAULT_TEST_FILTER: &str = "warn,roundtrip_agent=error";

/// Backtrace frames from the async runtime and the test harness.
/// They are hidden from test failure reports.
const HIDDEN_FRAME_PREFIXES: &[&str] = &[
    "tokio::",
    "<tokio::",
    "<futures_util::",
    "<tracing::instrument::Instrumented",
    "std::panic",
    "std::thread::local",
    "<std::panic::AssertUnwindSafe",
    "core::ops::function::FnOnce::call_once",
    "<core::future::",
    "<core::pin::Pin",
    "<alloc::boxed::Box",
    "test::run_test_in_process",
    "test::assert_test_result",
];

/// Initialize globals for tests: the tracing subscriber, and the color-eyre
/// panic and error report hooks.
///
/// Safe to call from every test: only the first call has any effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_test_writer())
            .with(ErrorLayer::default())
            .init();

        HookBuilder::default()
            .add_frame_filter(Box::new(hide_harness_frames))
            .display_env_section(false)
            .install()
            .expect("color-eyre hooks are only installed once");
    })
}

/// Initialize globals for tests, then build a Tokio runtime for a single test.
///
/// Use this in `proptest!` bodies, which can't be `async`.
/// The runtime has its timer enabled, so tests can call `tokio::time::pause()`.
pub fn init_async() -> tokio::runtime::Runtime {
    init();

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime")
}

/// Returns the number of proptest cases to run,
/// using the `PROPTEST_CASES` env var if it is set, or `default` otherwise.
pub fn proptest_cases(default: u32) -> u32 {
    std::env::var(PROPTEST_CASES)
        .ok()
        .and_then(|cases| cases.parse().ok())
        .unwrap_or(default)
}

/// Removes duplicate frames, and frames in [`HIDDEN_FRAME_PREFIXES`].
///
/// Frames without a symbol name are kept.
fn hide_harness_frames(frames: &mut Vec<&Frame>) {
    let mut seen = HashSet::new();

    frames.retain(|frame| {
        if !seen.insert((frame.lineno, frame.filename.clone())) {
            return false;
        }

        match &frame.name {
            Some(name) => !HIDDEN_FRAME_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix)),
            None => true,
        }
    });
}
