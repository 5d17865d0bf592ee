use std::time::Instant;

use crate::routines::output::OutputFile;
use crate::routines::settings::Settings;
use eyre::Result;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Setup logging for the library
///
/// Log messages are written to stdout, prefixed with the time elapsed since
/// setup. The log level is defined by `log.level` and defaults to `info`.
///
/// If `log.file` is set and output is enabled, the same messages are written
/// to that file inside the output folder, stamped with the wall-clock time.
///
/// Calling this more than once is harmless: later calls leave the first
/// subscriber in place.
pub fn setup_log(settings: &Settings) -> Result<()> {
    let env_filter = EnvFilter::try_new(settings.log.level.as_str())?;

    let timestamper = CompactTimestamp {
        start: Instant::now(),
    };

    let subscriber = Registry::default().with(env_filter);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_timer(timestamper);

    let file_layer = match settings.log.file.as_deref() {
        Some(name) if settings.output.write && !name.is_empty() => {
            let outputfile = OutputFile::new(&settings.output.path, name)?;
            Some(
                fmt::layer()
                    .with_writer(outputfile.file_owned())
                    .with_ansi(false)
                    .with_timer(WallClock),
            )
        }
        _ => None,
    };

    // Another subscriber may already be installed, e.g. by a test harness
    if subscriber.with(stdout_layer).with(file_layer).try_init().is_err() {
        tracing::debug!("A global subscriber was already set, keeping it");
    }

    Ok(())
}

/// Time since [setup_log] was called, as `00h 00m 00s`
#[derive(Clone)]
struct CompactTimestamp {
    start: Instant,
}

impl FormatTime for CompactTimestamp {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        w.write_str(&compact_elapsed(self.start.elapsed().as_secs()))
    }
}

fn compact_elapsed(total_seconds: u64) -> String {
    format!(
        "{:02}h {:02}m {:02}s",
        total_seconds / 3600,
        (total_seconds / 60) % 60,
        total_seconds % 60
    )
}

#[derive(Clone)]
struct WallClock;

impl FormatTime for WallClock {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_elapsed() {
        assert_eq!(compact_elapsed(0), "00h 00m 00s");
        assert_eq!(compact_elapsed(59), "00h 00m 59s");
        assert_eq!(compact_elapsed(3_725), "01h 02m 05s");
        assert_eq!(compact_elapsed(100 * 3600), "100h 00m 00s");
    }
}
