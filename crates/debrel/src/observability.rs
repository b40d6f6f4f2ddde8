//! Observability setup: structured logging.
//!
//! Stdout carries command output (including `--json` reports), so logs only
//! ever go to a JSONL file or, failing that, stderr.

use std::fs::OpenOptions;
use std::io::Write;

use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use tracing::Event;
use tracing::field::{Field, Visit};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "DEBREL_LOG_PATH";
const ENV_LOG_DIR: &str = "DEBREL_LOG_DIR";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Configuration for observability setup.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// The service name used for the log file and in every entry.
    pub service: String,
    /// `log_dir` from the configuration file.
    pub log_dir: Option<Utf8PathBuf>,
}

impl ObservabilityConfig {
    /// Config for this binary with the configured log directory.
    pub fn new(log_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

/// Guard that must be held for the lifetime of the application so buffered
/// log lines are flushed on exit.
pub struct ObservabilityGuard {
    _log_guard: WorkerGuard,
}

/// Initialize logging.
///
/// Returns a guard that must be held for the application lifetime.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (writer, guard) = match file_writer(cfg) {
        Ok(pair) => pair,
        Err(err) => {
            eprintln!("Warning: {err:#}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer::new(writer, &cfg.service))
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::debug!("observability initialized");
    Ok(ObservabilityGuard { _log_guard: guard })
}

/// Build an `EnvFilter` based on CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > `RUST_LOG` > `default_level`.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    match (quiet, verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    }
}

fn file_writer(cfg: &ObservabilityConfig) -> Result<(NonBlocking, WorkerGuard)> {
    let target = LogTarget::resolve(
        &cfg.service,
        env_path(ENV_LOG_PATH),
        env_path(ENV_LOG_DIR),
        cfg.log_dir.clone(),
    )?;
    let appender = tracing_appender::rolling::daily(target.dir.as_std_path(), &target.file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn env_path(name: &str) -> Option<Utf8PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .map(Utf8PathBuf::from)
}

// ──────────────────────────────────────────────
// Log target resolution
// ──────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: Utf8PathBuf,
    file_name: String,
}

impl LogTarget {
    /// First usable location: explicit file, explicit dir, configured dir,
    /// then the platform data dir and the working directory.
    fn resolve(
        service: &str,
        path_override: Option<Utf8PathBuf>,
        dir_override: Option<Utf8PathBuf>,
        config_dir: Option<Utf8PathBuf>,
    ) -> Result<Self> {
        if let Some(path) = path_override {
            return Self::from_path(&path);
        }
        if let Some(dir) = dir_override.or(config_dir) {
            return Self::in_dir(dir, service);
        }

        let fallbacks = [
            debrel_core::config::user_data_local_dir().map(|d| d.join("logs")),
            std::env::current_dir()
                .ok()
                .and_then(|d| Utf8PathBuf::from_path_buf(d).ok()),
        ];
        fallbacks
            .into_iter()
            .flatten()
            .find_map(|dir| Self::in_dir(dir, service).ok())
            .context("no writable log directory found")
    }

    fn in_dir(dir: Utf8PathBuf, service: &str) -> Result<Self> {
        let target = Self {
            dir,
            file_name: format!("{service}{LOG_FILE_SUFFIX}"),
        };
        target.ensure_writable()?;
        Ok(target)
    }

    fn from_path(path: &Utf8Path) -> Result<Self> {
        let Some(file_name) = path.file_name() else {
            bail!("{ENV_LOG_PATH} must include a file name");
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let target = Self {
            dir: dir.to_path_buf(),
            file_name: file_name.to_string(),
        };
        target.ensure_writable()?;
        Ok(target)
    }

    fn path(&self) -> Utf8PathBuf {
        self.dir.join(&self.file_name)
    }

    fn ensure_writable(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create log directory {}", self.dir))?;
        let path = self.path();
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {path}"))?;
        Ok(())
    }
}

// ──────────────────────────────────────────────
// JSON lines layer
// ──────────────────────────────────────────────

struct JsonLogLayer<W> {
    writer: W,
    service: String,
}

impl<W> JsonLogLayer<W> {
    fn new(writer: W, service: &str) -> Self {
        Self {
            writer,
            service: service.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct SpanFields(Map<String, Value>);

impl<S, W> tracing_subscriber::Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut fields = SpanFields::default();
            attrs.record(&mut JsonVisitor(&mut fields.0));
            span.extensions_mut().insert(fields);
        }
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut extensions = span.extensions_mut();
            if let Some(fields) = extensions.get_mut::<SpanFields>() {
                values.record(&mut JsonVisitor(&mut fields.0));
            } else {
                let mut fields = SpanFields::default();
                values.record(&mut JsonVisitor(&mut fields.0));
                extensions.insert(fields);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut entry = Map::new();
        entry.insert("timestamp".into(), Value::String(format_timestamp()));
        entry.insert("level".into(), meta.level().as_str().to_lowercase().into());
        entry.insert("service".into(), self.service.clone().into());
        entry.insert("target".into(), meta.target().into());

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    entry.extend(fields.0.clone());
                }
            }
        }
        event.record(&mut JsonVisitor(&mut entry));

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(entry)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

struct JsonVisitor<'a>(&'a mut Map<String, Value>);

impl JsonVisitor<'_> {
    fn put(&mut self, field: &Field, value: impl Into<Value>) {
        self.0.insert(field.name().to_string(), value.into());
    }
}

impl Visit for JsonVisitor<'_> {
    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, number);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

/// RFC 3339 UTC timestamp with millisecond precision.
fn format_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = now.as_secs();
    let (year, month, day) = civil_from_days(secs / 86_400);
    let secs_of_day = secs % 86_400;

    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{:03}Z",
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60,
        secs_of_day % 60,
        now.subsec_millis(),
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date (Hinnant's algorithm).
const fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}
