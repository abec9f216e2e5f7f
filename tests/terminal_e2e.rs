//! End-to-end tests: mock port, read loop, display loop and transcript screen.

mod common;

use common::{connected_terminal, fast_options, screen, settings, wait_for};
use pretty_assertions::assert_eq;
use serial_terminal::bytes::hex_dump_row;
use serial_terminal::display::Transcript;
use serial_terminal::{AppError, DisplayMode, PortConfiguration, SerialTerminal, TerminalOptions};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

/// Screen text after the last notice.
fn body(text: &str) -> &str {
    const NOTICE_END: &str = "\x1b[0m\r\n";
    match text.rfind(NOTICE_END) {
        Some(i) => &text[i + NOTICE_END.len()..],
        None => text,
    }
}

/// Whether `line` starts with a `[HH:MM:SS.mmm] ` tag followed by `rest`.
fn tagged(line: &str, rest: &str) -> bool {
    let bytes = line.as_bytes();
    line.len() == 15 + rest.len()
        && bytes[0] == b'['
        && bytes[3] == b':'
        && bytes[6] == b':'
        && bytes[9] == b'.'
        && &line[13..15] == "] "
        && &line[15..] == rest
}

fn options_with(mode: DisplayMode, timestamps: bool) -> TerminalOptions {
    TerminalOptions {
        render: settings(mode, timestamps),
        ..fast_options()
    }
}

#[tokio::test]
async fn test_connect_notice_shows_line_settings() {
    let (_port, terminal) = connected_terminal(fast_options(), PortConfiguration::default());
    assert!(screen(&terminal).contains("Connected to MOCK0 at 115200 8N1"));
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_timestamped_lines_across_chunks() {
    let (port, terminal) =
        connected_terminal(options_with(DisplayMode::Text, true), PortConfiguration::default());

    port.enqueue_read(&[0x41, 0x42]);
    assert!(wait_for(WAIT, || body(&screen(&terminal)).ends_with("AB")).await);
    tokio::time::sleep(Duration::from_millis(5)).await;
    port.enqueue_read(&[0x0A, 0x43]);
    assert!(wait_for(WAIT, || body(&screen(&terminal)).ends_with('C')).await);

    let text = screen(&terminal);
    let lines: Vec<&str> = body(&text).split('\n').collect();
    assert_eq!(lines.len(), 2, "screen: {text:?}");
    assert!(tagged(lines[0], "AB"), "line: {:?}", lines[0]);
    assert!(tagged(lines[1], "C"), "line: {:?}", lines[1]);
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_mode_switch_repaints_history() {
    let (port, terminal) =
        connected_terminal(options_with(DisplayMode::Text, false), PortConfiguration::default());

    port.enqueue_read(b"Hello\n");
    assert!(wait_for(WAIT, || screen(&terminal).ends_with("Hello\n")).await);
    let resets_before = terminal.with_pipeline(|p| p.sink().resets());

    terminal.set_mode(DisplayMode::Hex);
    assert!(wait_for(WAIT, || screen(&terminal).contains("|Hello.|")).await);

    assert_eq!(screen(&terminal), hex_dump_row(0, b"Hello\n"));
    assert!(terminal.with_pipeline(|p| p.sink().resets()) > resets_before);

    // Data arriving after the switch continues the same row.
    port.enqueue_read(b"!");
    assert!(wait_for(WAIT, || screen(&terminal).contains("|Hello.!|")).await);
    assert_eq!(screen(&terminal), hex_dump_row(0, b"Hello\n!"));

    // Switching back restores the text view.
    terminal.set_mode(DisplayMode::Text);
    assert!(wait_for(WAIT, || screen(&terminal) == "Hello\n!").await);
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_unchanged_settings_do_not_repaint() {
    let (port, terminal) =
        connected_terminal(options_with(DisplayMode::Text, false), PortConfiguration::default());
    port.enqueue_read(b"abc");
    assert!(wait_for(WAIT, || screen(&terminal).ends_with("abc")).await);

    let resets = terminal.with_pipeline(|p| p.sink().resets());
    terminal.set_mode(DisplayMode::Text);
    terminal.set_timestamps(false);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(terminal.with_pipeline(|p| p.sink().resets()), resets);
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_end_of_stream_shows_notice() {
    let (port, mut terminal) = connected_terminal(fast_options(), PortConfiguration::default());
    port.enqueue_read(b"bye");
    port.close_input();

    assert!(wait_for(WAIT, || screen(&terminal).contains("Connection closed by device")).await);
    assert!(screen(&terminal).contains("bye"));

    terminal.disconnect().await;
    assert!(screen(&terminal).contains("Disconnected from MOCK0"));
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_export_follows_display_mode() {
    let dir = tempfile::tempdir().unwrap();
    let options = TerminalOptions {
        export_dir: dir.path().to_path_buf(),
        ..options_with(DisplayMode::Text, false)
    };
    let (port, terminal) = connected_terminal(options, PortConfiguration::default());

    port.enqueue_read(b"line 1\n");
    port.enqueue_read(&[0xFF, 0x00]);
    assert!(wait_for(WAIT, || terminal.with_pipeline(|p| p.history().total_bytes()) == 9).await);

    let text = terminal.export();
    assert!(text.file_name.ends_with(".log"));
    assert!(text.contents.starts_with(b"line 1\n"));

    terminal.set_mode(DisplayMode::Hex);
    let raw = terminal.export();
    assert!(raw.file_name.ends_with(".bin"));
    assert_eq!(raw.contents, b"line 1\n\xFF\x00");

    let path = terminal.export_to_dir().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), raw.contents);
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_clear_drops_history_and_screen() {
    let (port, terminal) = connected_terminal(fast_options(), PortConfiguration::default());
    port.enqueue_read(b"noise");
    assert!(wait_for(WAIT, || screen(&terminal).ends_with("noise")).await);

    terminal.clear();
    assert_eq!(screen(&terminal), "");
    assert!(terminal.with_pipeline(|p| p.history().is_empty()));

    port.enqueue_read(b"fresh");
    assert!(wait_for(WAIT, || screen(&terminal) == "fresh").await);
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_open_failure_is_shown_and_leaves_terminal_disconnected() {
    let mut terminal = SerialTerminal::new(Transcript::new(), fast_options());
    let result = terminal.open("/dev/serial-term-no-such-port", &PortConfiguration::default());

    assert!(matches!(result, Err(AppError::Port(_))));
    assert!(!terminal.is_connected());
    assert!(screen(&terminal).contains("Failed to open /dev/serial-term-no-such-port"));
    terminal.shutdown().await;
}
