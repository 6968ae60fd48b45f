//! File sink
//!
//! Plain synchronous append behind a mutex; one formatted line per event.

use crate::core::error::Result;
use crate::core::event::LogEvent;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct FileSink {
    writer: Mutex<BufWriter<File>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn write_event(&self, event: &LogEvent) -> Result<()> {
        let mut line = format!(
            "{} | {} | {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            event.level.to_str(),
            event.message
        );
        if !event.attributes.is_empty() {
            line.push_str(" | ");
            line.push_str(&event.attributes.format_fields());
        }
        line.push('\n');

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::AttrMap;
    use crate::core::level::LogLevel;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_appends_one_line_per_event() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.log");

        let sink = FileSink::new(&path)?;
        sink.write_event(&LogEvent::new(LogLevel::Info, "first"))?;
        sink.write_event(
            &LogEvent::new(LogLevel::Error, "second")
                .with_attributes(AttrMap::new().with("code", 500)),
        )?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("INFO | first"));
        assert!(lines[1].contains("ERROR | second | code=500"));
        Ok(())
    }

    #[test]
    fn test_reopening_appends() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("append.log");

        {
            let sink = FileSink::new(&path)?;
            sink.write_event(&LogEvent::new(LogLevel::Info, "before"))?;
        }
        {
            let sink = FileSink::new(&path)?;
            sink.write_event(&LogEvent::new(LogLevel::Info, "after"))?;
        }

        let content = fs::read_to_string(&path)?;
        assert_eq!(content.lines().count(), 2);
        Ok(())
    }
}
