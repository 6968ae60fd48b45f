//! Console sink
//!
//! Synchronous, local-only output. Doubles as the fallback path for the
//! network sinks: their redirect implementations call [`ConsoleSink::write_event`]
//! directly, which cannot reach the dispatcher or any sink queue.

use crate::core::event::LogEvent;
use crate::core::level::LogLevel;
#[cfg(feature = "console")]
use colored::Colorize;

#[derive(Debug, Clone)]
pub struct ConsoleSink {
    use_colors: bool,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Write one event to stdout, or stderr for errors.
    pub fn write_event(&self, event: &LogEvent) {
        let line = self.format(event);
        match event.level {
            LogLevel::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }

    fn format(&self, event: &LogEvent) -> String {
        let mut line = format!(
            "[{}] [{}] {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level_str(event.level),
            event.message
        );

        if !event.attributes.is_empty() {
            line.push_str(" | ");
            line.push_str(&event.attributes.format_fields());
        }

        line
    }

    #[cfg(feature = "console")]
    fn level_str(&self, level: LogLevel) -> String {
        if self.use_colors {
            format!("{:5}", level.to_str())
                .color(level.color_code())
                .to_string()
        } else {
            format!("{:5}", level.to_str())
        }
    }

    #[cfg(not(feature = "console"))]
    fn level_str(&self, level: LogLevel) -> String {
        format!("{:5}", level.to_str())
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}
