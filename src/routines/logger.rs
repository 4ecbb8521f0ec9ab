use std::time::Instant;

use crate::routines::settings::Settings;
use anyhow::Result;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Setup logging for the library
///
/// This function sets up logging for the library. It uses the `tracing` crate, and the `tracing-subscriber` crate for formatting.
///
/// The log level is defined in the settings, and defaults to `INFO`.
///
/// If a log file is specified in the settings, messages are additionally
/// written there without ANSI escapes. Otherwise they go to stderr only,
/// keeping stdout free for results.
pub fn setup_log(settings: &Settings) -> Result<()> {
    // Use the log level defined in the settings
    let log_level = settings.log().level.as_str();
    let env_filter = EnvFilter::new(log_level);

    let timestamper = CompactTimestamp {
        start: Instant::now(),
    };

    // Define a registry with that level as an environment filter
    let subscriber = Registry::default().with(env_filter);

    match &settings.log().file {
        Some(path) => {
            let file = std::sync::Arc::new(std::fs::File::create(path)?);
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_timer(timestamper.clone());
            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false)
                .with_timer(timestamper.clone());
            subscriber.with(file_layer).with(stderr_layer).init();
        }
        None => {
            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false)
                .with_timer(timestamper.clone());
            subscriber.with(stderr_layer).init();
        }
    }

    Ok(())
}

#[derive(Clone)]
struct CompactTimestamp {
    start: Instant,
}

impl FormatTime for CompactTimestamp {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        let elapsed = self.start.elapsed();
        let hours = elapsed.as_secs() / 3600;
        let minutes = (elapsed.as_secs() % 3600) / 60;
        let seconds = elapsed.as_secs() % 60;

        write!(w, "{:02}h {:02}m {:02}s", hours, minutes, seconds)
    }
}
