//! Tracing setup. Logs go to stderr so stdout stays reserved for results.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LEVEL: &str = "warn";

/// Pick the filter directive: an explicit `--log-level` wins, then `RUST_LOG`,
/// then `debug` for `--verbose`, otherwise warnings only.
fn filter_directive(log_level: Option<&str>, verbose: bool, rust_log: Option<String>) -> String {
    if let Some(level) = log_level {
        return level.to_string();
    }
    if let Some(env) = rust_log.filter(|s| !s.trim().is_empty()) {
        return env;
    }
    if verbose {
        "debug".to_string()
    } else {
        DEFAULT_LEVEL.to_string()
    }
}

pub fn init_logging(log_level: Option<&str>, verbose: bool, no_color: bool) -> Result<()> {
    let directive = filter_directive(log_level, verbose, std::env::var("RUST_LOG").ok());
    let env_filter = EnvFilter::try_new(&directive)
        .map_err(|e| anyhow!("invalid log filter {directive:?}: {e}"))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(!no_color && std::env::var_os("NO_COLOR").is_none());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_level_beats_environment_and_verbose() {
        assert_eq!(
            filter_directive(Some("trace"), true, Some("info".into())),
            "trace"
        );
    }

    #[test]
    fn rust_log_beats_verbose() {
        assert_eq!(
            filter_directive(None, true, Some("neurasearch=info".into())),
            "neurasearch=info"
        );
    }

    #[test]
    fn verbose_and_default_levels() {
        assert_eq!(filter_directive(None, true, None), "debug");
        assert_eq!(filter_directive(None, false, Some("  ".into())), "warn");
    }
}
