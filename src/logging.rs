use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a log filter, e.g. `GIT_LOOM_LOG=git_loom=trace`.
pub const LOG_ENV: &str = "GIT_LOOM_LOG";

/// Install the stderr subscriber for the CLI. Only warnings are shown unless
/// `verbose` is set or the environment says otherwise.
pub fn setup_logger(verbose: bool) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(if verbose {
            LevelFilter::DEBUG.into()
        } else {
            LevelFilter::WARN.into()
        })
        .with_env_var(LOG_ENV)
        .from_env_lossy();

    let fmt = fmt::layer()
        .with_target(verbose)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact();

    // A subscriber installed by an embedding program wins
    let _ = tracing_subscriber::registry()
        .with(fmt)
        .with(env_filter)
        .try_init();
}
