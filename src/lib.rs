//! Benchmark and regression harness for an external placement tool.
//!
//! Cases are directories on disk. Each one is turned into a single shell
//! invocation of the tool whose console output is tee'd into a per-case log,
//! then dispatched directly, under valgrind, or into a detached session.

pub mod case;
pub mod command;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod inputs;
pub mod launcher;
pub mod regression;

pub use case::{Case, CaseResolver, Selection};
pub use command::{CommandBuilder, Invocation};
pub use config::{ExecutionMode, HarnessConfig, RegressionConfig, RunStamp};
pub use dispatch::{BatchReport, Dispatcher, Outcome};
pub use error::{HarnessError, Result};
pub use launcher::{BackgroundLauncher, KillReport, ScreenLauncher};
pub use regression::{RegressionRunner, RunRecord, Suite};

/// Install the stderr tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "placerun=info,regression=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
