use std::env;

use chrono::Local;
use log::LevelFilter;

pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level {
        Some("info") => LevelFilter::Info,
        Some("debug") => LevelFilter::Debug,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        _ => LevelFilter::Warn, // Default to Warn if variable is unset or has an unrecognized value
    }
}

pub fn setup_logging() -> Result<(), fern::InitError> {
    let level = parse_level(env::var("LOG_LEVEL").ok().as_deref());

    let stderr_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}] {}: {}",
                Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        // reqwest and hyper are chatty at debug
        .level_for("hyper_util", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stderr());

    fern::Dispatch::new().chain(stderr_config).apply()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(Some("info")), LevelFilter::Info);
        assert_eq!(parse_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("error")), LevelFilter::Error);
        assert_eq!(parse_level(Some("trace")), LevelFilter::Warn);
        assert_eq!(parse_level(None), LevelFilter::Warn);
    }
}
