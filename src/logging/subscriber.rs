//! Tracing subscriber: colored console output and a plain per-command log file.
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Level;

/// Target for stage headers.
pub(super) const STAGE_TARGET: &str = "telegraf_conf::stage";
/// Target for dry-run action messages.
pub(super) const DRY_RUN_TARGET: &str = "telegraf_conf::dry_run";
/// Target for per-fragment summary lines. Events carry a `status` field.
pub(super) const SUMMARY_TARGET: &str = "telegraf_conf::summary";

/// `$XDG_CACHE_HOME/telegraf-conf/<command>.log`, falling back to
/// `~/.cache`. `None` when no home directory is set.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    let cache = match std::env::var_os("XDG_CACHE_HOME") {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(
            std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"))?,
        )
        .join(".cache"),
    };
    Some(cache.join("telegraf-conf").join(format!("{command}.log")))
}

/// The `message` and `status` fields of one event.
#[derive(Default)]
struct Fields {
    message: String,
    status: Option<String>,
}

impl Fields {
    fn of(event: &tracing::Event<'_>) -> Self {
        let mut fields = Self::default();
        event.record(&mut fields);
        fields
    }
}

impl tracing::field::Visit for Fields {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "status" => self.status = Some(value.to_string()),
            _ => {}
        }
    }
}

/// Appends every event to the command's log file, one timestamped line each.
///
/// Messages never contain color codes; the console formatter adds them.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate `path`, write a one-line run header and keep the file open.
    pub(super) fn create(path: &Path, command: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        let version = option_env!("TELEGRAF_CONF_VERSION")
            .unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let started = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        writeln!(file, "# telegraf-conf {version} {command} {started}")?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

/// The column after the timestamp in a log file line.
fn file_tag<'a>(level: Level, target: &str, fields: &'a Fields) -> &'a str {
    match (level, target) {
        (_, SUMMARY_TARGET) => fields.status.as_deref().unwrap_or("summary"),
        (_, STAGE_TARGET) => "==>",
        (_, DRY_RUN_TARGET) => "dry-run",
        (Level::ERROR, _) => "error",
        (Level::WARN, _) => "warn",
        (Level::INFO, _) => "info",
        _ => "debug",
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let fields = Fields::of(event);
        let tag = file_tag(*metadata.level(), metadata.target(), &fields);
        let ts = chrono::Utc::now().format("%H:%M:%S%.3f");
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{ts} {tag:<9} {}", fields.message).ok();
        }
    }
}

/// Icon and color for a summary line with the given status label.
fn summary_style(status: Option<&str>) -> (&'static str, &'static str) {
    match status {
        Some("changed") => ("✓", "\x1b[32m"),
        Some("unchanged") => ("·", "\x1b[2m"),
        Some("skipped") => ("○", "\x1b[33m"),
        Some("dry-run") => ("~", "\x1b[37m"),
        Some("failed") => ("✗", "\x1b[31m"),
        _ => ("", ""),
    }
}

/// Console formatter: a colored prefix per level or target, then the message.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let fields = Fields::of(event);
        let msg = &fields.message;

        match (*metadata.level(), metadata.target()) {
            (_, SUMMARY_TARGET) => {
                let (icon, color) = summary_style(fields.status.as_deref());
                writeln!(writer, "  {color}{icon} {msg}\x1b[0m")
            }
            (_, STAGE_TARGET) => writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            (_, DRY_RUN_TARGET) => writeln!(writer, "  \x1b[33m[DRY RUN]\x1b[0m {msg}"),
            (Level::ERROR, _) => writeln!(writer, "\x1b[31mERROR\x1b[0m {msg}"),
            (Level::WARN, _) => writeln!(writer, "\x1b[33mWARN\x1b[0m  {msg}"),
            (Level::INFO, _) => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Console output goes to stderr so that stdout carries only command output
/// (rendered fragments, JSON plans). Every event, `debug` included, is also
/// written to the log file from [`log_file_path`] when it can be created.
/// Must be called once at program startup, before any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(io::stderr)
        .with_filter(console_level);

    let file_layer = log_file_path(command)
        .and_then(|path| FileLayer::create(&path, command).ok())
        .map(|layer| layer.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
