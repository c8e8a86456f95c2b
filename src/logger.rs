use anyhow::Result;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;

pub fn verbosity_to_level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

pub fn setup_logger(level: LevelFilter, json: bool) -> Result<Box<dyn Subscriber + Send + Sync>> {
    let sub: Box<dyn Subscriber + Send + Sync> = if json {
        Box::new(tracing_subscriber::fmt().json().with_max_level(level).finish())
    } else {
        Box::new(tracing_subscriber::fmt().with_max_level(level).finish())
    };
    Ok(sub)
}
