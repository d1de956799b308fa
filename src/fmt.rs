//! Compact formatting helpers for trace and log output.

use std::cell::Cell;
use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::types::{Tick, Time};

/// Which engine last published its clock on this thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimClock {
    /// Scheduler engine time.
    Time(Time),
    /// Mutual-exclusion driver step.
    Tick(Tick),
}

thread_local! {
    static SIM_CLOCK: Cell<Option<SimClock>> = const { Cell::new(None) };
}

/// The clock last published by an engine on this thread, if any.
pub fn sim_clock() -> Option<SimClock> {
    SIM_CLOCK.with(|c| c.get())
}

/// Publish the engine clock. Called before `debug!`/`info!` so the
/// formatter can prefix simulated time.
pub fn set_sim_clock(clock: SimClock) {
    SIM_CLOCK.with(|c| c.set(Some(clock)));
}

/// Simulated time with trailing zeros trimmed.
///
/// - `3.0` → `3`
/// - `2.50` → `2.5`
/// - `0.125` → `0.125`
///
/// At most three decimals are shown.
pub struct FmtTime(pub Time);

impl fmt::Display for FmtTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = format!("{:.3}", self.0);
        let s = s.trim_end_matches('0').trim_end_matches('.');
        let s = if s == "-0" { "0" } else { s };
        f.pad(s)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimClock::Time(t) => write!(f, "t={:>8}", FmtTime(*t)),
            SimClock::Tick(n) => write!(f, "tick={n:>6}"),
        }
    }
}

/// Event formatter for simulator logs.
///
/// Lines look like `[tick=     3] DEBUG P1: enter turn=2`: the published
/// simulation clock, the level, the job or participant the event is about,
/// then the message and remaining fields. Floats are printed as [`FmtTime`].
pub struct SimFormat;

fn level_color(level: Level) -> &'static str {
    match level {
        Level::ERROR => "\x1b[31m",
        Level::WARN => "\x1b[33m",
        Level::INFO => "\x1b[32m",
        Level::DEBUG => "\x1b[34m",
        Level::TRACE => "\x1b[35m",
    }
}

impl<S, N> FormatEvent<S, N> for SimFormat
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
        match sim_clock() {
            Some(clock) => write!(writer, "[{clock}] ")?,
            None => write!(writer, "[{:>10}] ", "-")?,
        }
        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            write!(writer, "{}{level:>5}\x1b[0m ", level_color(level))?;
        } else {
            write!(writer, "{level:>5} ")?;
        }

        let mut line = EventLine::default();
        event.record(&mut line);
        if let Some(subject) = &line.subject {
            write!(writer, "{subject}: ")?;
        }
        writeln!(writer, "{}{}", line.message, line.fields)
    }
}

/// One rendered event: the `job`/`who` subject is pulled out front, every
/// other field is appended as ` key=value`.
#[derive(Default)]
struct EventLine {
    subject: Option<String>,
    message: String,
    fields: String,
}

impl EventLine {
    fn push(&mut self, field: &Field, value: impl fmt::Display) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "job" | "who" if self.subject.is_none() => self.subject = Some(value.to_string()),
            name => {
                use std::fmt::Write;
                let _ = write!(self.fields, " {name}={value}");
            }
        }
    }
}

impl Visit for EventLine {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format_args!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, FmtTime(value));
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::types::ParticipantId;

    #[test]
    fn test_fmt_time() {
        assert_eq!(FmtTime(0.0).to_string(), "0");
        assert_eq!(FmtTime(3.0).to_string(), "3");
        assert_eq!(FmtTime(2.5).to_string(), "2.5");
        assert_eq!(FmtTime(0.125).to_string(), "0.125");
        assert_eq!(FmtTime(10.0).to_string(), "10");
        assert_eq!(FmtTime(1.0 / 3.0).to_string(), "0.333");
        assert_eq!(format!("{:>4}", FmtTime(1.0)), "   1");
    }

    #[test]
    fn test_sim_clock_display() {
        assert_eq!(SimClock::Time(9.0).to_string(), "t=       9");
        assert_eq!(SimClock::Tick(12).to_string(), "tick=    12");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(out.clone())
            .with_ansi(false)
            .with_max_level(Level::DEBUG)
            .event_format(SimFormat)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_event_line_puts_subject_first() {
        let line = capture(|| {
            set_sim_clock(SimClock::Tick(3));
            tracing::debug!(who = %ParticipantId(1), turn = 2u64, "enter");
        });
        assert_eq!(line, "[tick=     3] DEBUG P1: enter turn=2\n");

        let line = capture(|| {
            set_sim_clock(SimClock::Time(1.5));
            tracing::debug!(job = "P3", remaining = 0.25, "preempt");
        });
        assert_eq!(line, "[t=     1.5] DEBUG P3: preempt remaining=0.25\n");
    }

    #[test]
    fn test_set_sim_clock() {
        set_sim_clock(SimClock::Tick(3));
        assert_eq!(sim_clock(), Some(SimClock::Tick(3)));
    }
}
