//! Display sinks: where rendered text ends up.

use crate::render::ERASE_LINE;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

/// Write-only display surface.
pub trait DisplaySink: Send {
    /// Append rendered text (may contain ANSI sequences).
    fn write(&mut self, text: &str) -> io::Result<()>;

    /// Clear everything and home the cursor.
    fn reset(&mut self) -> io::Result<()>;

    /// Resize the viewport to its container.
    fn fit(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Whether the sink honours [`ERASE_LINE`]. When it does not, the
    /// formatter holds back speculative hex rows.
    fn supports_erase(&self) -> bool {
        true
    }
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn write(&mut self, text: &str) -> io::Result<()> {
        (**self).write(text)
    }

    fn reset(&mut self) -> io::Result<()> {
        (**self).reset()
    }

    fn fit(&mut self) -> io::Result<()> {
        (**self).fit()
    }

    fn supports_erase(&self) -> bool {
        (**self).supports_erase()
    }
}

/// ANSI terminal sink, normally over stdout.
pub struct TerminalSink<W: Write + Send> {
    out: W,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> DisplaySink for TerminalSink<W> {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()
    }

    fn reset(&mut self) -> io::Result<()> {
        // Clear screen and scrollback, cursor home.
        self.out.write_all(b"\x1b[2J\x1b[3J\x1b[H")?;
        self.out.flush()
    }
}

/// In-memory screen model that applies [`ERASE_LINE`] the way a terminal
/// does: the unterminated last line is dropped before the rest is appended.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    text: String,
    writes: usize,
    resets: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of `write` calls since creation.
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    fn erase_current_line(&mut self) {
        let keep = self.text.rfind('\n').map_or(0, |i| i + 1);
        self.text.truncate(keep);
    }
}

impl DisplaySink for Transcript {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.writes += 1;
        let mut parts = text.split(ERASE_LINE);
        if let Some(first) = parts.next() {
            self.text.push_str(first);
        }
        for part in parts {
            self.erase_current_line();
            self.text.push_str(part);
        }
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        self.resets += 1;
        self.text.clear();
        Ok(())
    }
}

/// Plain log file. Cannot erase, so only complete rows reach it.
pub struct LogFileSink {
    file: File,
}

impl LogFileSink {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            file: File::create(path)?,
        })
    }
}

impl DisplaySink for LogFileSink {
    fn write(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes())
    }

    fn reset(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn supports_erase(&self) -> bool {
        false
    }
}

/// Fans output out to several sinks. Erase support is the weakest member's.
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Box<dyn DisplaySink>>,
}

impl TeeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl DisplaySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl DisplaySink for TeeSink {
    fn write(&mut self, text: &str) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.write(text)?;
        }
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.reset()?;
        }
        Ok(())
    }

    fn fit(&mut self) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.fit()?;
        }
        Ok(())
    }

    fn supports_erase(&self) -> bool {
        self.sinks.iter().all(|s| s.supports_erase())
    }
}

/// Style a system message so it stands apart from received data.
pub fn notice(message: &str) -> String {
    format!("\r\n\x1b[1;33m[{message}]\x1b[0m\r\n")
}

/// Style an error message.
pub fn error_notice(message: &str) -> String {
    format!("\r\n\x1b[1;31m[{message}]\x1b[0m\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_applies_erase() {
        let mut t = Transcript::new();
        t.write("row0\r\npartial").unwrap();
        t.write(&format!("{ERASE_LINE}full\r\nnext")).unwrap();
        assert_eq!(t.text(), "row0\r\nfull\r\nnext");
    }

    #[test]
    fn test_transcript_erase_on_first_line() {
        let mut t = Transcript::new();
        t.write("abc").unwrap();
        t.write(&format!("{ERASE_LINE}xyz")).unwrap();
        assert_eq!(t.text(), "xyz");
    }

    #[test]
    fn test_terminal_sink_reset_emits_clear() {
        let mut sink = TerminalSink::new(Vec::new());
        sink.write("hi").unwrap();
        sink.reset().unwrap();
        assert_eq!(sink.into_inner(), b"hi\x1b[2J\x1b[3J\x1b[H".to_vec());
    }

    #[test]
    fn test_log_file_sink_truncates_on_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rx.log");
        let mut sink = LogFileSink::create(&path).unwrap();
        assert!(!sink.supports_erase());
        sink.write("old").unwrap();
        sink.reset().unwrap();
        sink.write("new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_tee_reports_weakest_erase_support() {
        let tee = TeeSink::new().with(Transcript::new());
        assert!(tee.supports_erase());

        let dir = tempfile::tempdir().unwrap();
        let tee = tee.with(LogFileSink::create(dir.path().join("x.log")).unwrap());
        assert!(!tee.supports_erase());
    }
}
