//! Initialisation du logging à partir de la configuration

use pmoconfig::Config;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Registry, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Installe le subscriber global
///
/// Priorité du niveau : `--log-level`, puis `RUST_LOG`, puis
/// `host.logger.min_level`.
pub fn init_logging(config: &Config, cli_level: Option<&str>) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => {
            let log_level = match config.get_log_min_level() {
                Ok(l) => match string_to_level(&l) {
                    Some(lev) => LevelFilter::from_level(lev),
                    None => LevelFilter::INFO,
                },
                Err(_) => LevelFilter::INFO,
            };
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy()
        }
    };

    let subscriber = Registry::default().with(filter);

    let enable_console = config.get_log_enable_console().unwrap_or(true);
    if enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber.init();
    }
}

fn string_to_level(s: &str) -> Option<Level> {
    match s.to_uppercase().as_str() {
        "ERROR" => Some(Level::ERROR),
        "WARN" => Some(Level::WARN),
        "INFO" => Some(Level::INFO),
        "DEBUG" => Some(Level::DEBUG),
        "TRACE" => Some(Level::TRACE),
        _ => None,
    }
}
