use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Picks the default log level from the command-line switches.
pub fn default_level(quiet: bool, debug: bool) -> LevelFilter {
    match (debug, quiet) {
        (true, _) => LevelFilter::DEBUG,
        (false, true) => LevelFilter::WARN,
        (false, false) => LevelFilter::INFO,
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides `level`.
pub fn init(level: LevelFilter) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // A subscriber may already be installed, e.g. by an embedding program.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        assert_eq!(default_level(false, false), LevelFilter::INFO);
        assert_eq!(default_level(true, false), LevelFilter::WARN);
        assert_eq!(default_level(false, true), LevelFilter::DEBUG);
        assert_eq!(default_level(true, true), LevelFilter::DEBUG);
    }
}
