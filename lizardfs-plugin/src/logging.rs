use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Installs the global subscriber at `level`.
///
/// Accepts tracing directives as well as the logrus level names the plugin's
/// configuration has always used. Unparseable levels fall back to info.
pub fn init(level: &str) {
    let (filter, rejected) = match build_filter(level) {
        Some(filter) => (filter, None),
        None => (EnvFilter::new(DEFAULT_LEVEL), Some(level)),
    };
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok();

    if let Some(level) = rejected {
        tracing::warn!("unknown log level {level:?}, using {DEFAULT_LEVEL}");
    }
    if installed {
        tracing::debug!("log level set to {}", normalize(level).unwrap_or(DEFAULT_LEVEL));
    }
}

fn build_filter(level: &str) -> Option<EnvFilter> {
    let level = normalize(level)?;
    EnvFilter::try_new(level).ok()
}

fn normalize(level: &str) -> Option<&str> {
    let level = level.trim();
    match level.to_ascii_lowercase().as_str() {
        "" => None,
        "warning" => Some("warn"),
        "fatal" | "panic" => Some("error"),
        "trace" | "debug" | "info" | "warn" | "error" | "off" => Some(level),
        // allow full directives such as `libvolume=trace,info`
        _ if level.contains('=') => Some(level),
        _ => None,
    }
}
