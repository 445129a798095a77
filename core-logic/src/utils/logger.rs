use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Targets,
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Installs the console + hourly file logger.
///
/// `task_result` lines always reach the console; everything else shows at
/// WARN, or DEBUG when `verbose`. Files under `logs/<prefix>.*` get INFO and
/// up. The returned guard must be kept alive until shutdown.
pub fn setup_logger(prefix: &str, verbose: bool) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all("logs") {
        eprintln!("Cannot create logs directory, file logging disabled: {}", e);
        init_console_only(verbose);
        return None;
    }

    let file_appender = tracing_appender::rolling::hourly("logs", prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(Targets::new().with_default(Level::INFO));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter(verbose));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    Some(guard)
}

fn init_console_only(verbose: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(TerminalFormatter)
                .with_filter(console_filter(verbose)),
        )
        .init();
}

fn console_filter(verbose: bool) -> Targets {
    Targets::new()
        .with_target("task_result", Level::INFO)
        .with_default(if verbose { Level::DEBUG } else { Level::WARN })
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn event_message(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor {
        message: String::new(),
    };
    event.record(&mut visitor);
    visitor.message
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let msg = event_message(event);
        let timestamp = Local::now().format("%H:%M:%S");

        let colored_msg = if msg.contains("SUCCESS") {
            let green = Style::new().fg(Color::LightGreen).bold();
            msg.replace("SUCCESS", &green.paint("SUCCESS").to_string())
        } else if msg.contains("FAILED") {
            let red = Style::new().fg(Color::LightRed).bold();
            msg.replace("FAILED", &red.paint("FAILED").to_string())
        } else {
            msg
        };

        let level = *event.metadata().level();
        if level <= Level::WARN && event.metadata().target() != "task_result" {
            let tag = Style::new().fg(Color::Yellow).paint(level.as_str());
            write!(writer, "{} {} {}", timestamp, tag, colored_msg)?;
        } else {
            write!(writer, "{} {}", timestamp, colored_msg)?;
        }
        writeln!(writer)
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        write!(writer, "{} [{}] ", timestamp, level)?;
        writeln!(writer, "{}", event_message(event))
    }
}
