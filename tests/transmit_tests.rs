//! Integration tests for paced bulk transmit.
//!
//! Covers:
//! - Pacing between chunks and monotonic progress
//! - Cancellation mid-send
//! - Write failure reporting
//! - Busy rejection for a second bulk send and for manual writes

mod common;

use common::{connected_terminal, fast_options, wait_for};
use serial_terminal::{
    AppError, CancelToken, ManualSend, MockSerialPort, PortConfiguration, PortError,
    SerialSession, TransmitError, TransmitEvent, TransmitScheduler,
};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn mock_session() -> (MockSerialPort, SerialSession) {
    let port = MockSerialPort::new("MOCK0");
    let session = SerialSession::from_mock(&port, PortConfiguration::default()).unwrap();
    (port, session)
}

#[tokio::test]
async fn test_paced_send_reports_monotonic_progress() {
    let port = MockSerialPort::new("MOCK0");
    let (_reader, mut writer) = port.split().unwrap();
    let scheduler = TransmitScheduler::new(2048, Duration::from_millis(50));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let data = payload(10_000);

    let started = Instant::now();
    let report = scheduler
        .send(&mut writer, &data, &CancelToken::new(), &tx)
        .await
        .unwrap();
    let elapsed = started.elapsed();
    drop(tx);

    // Five chunks, four pauses between them.
    assert!(elapsed >= Duration::from_millis(200), "took {elapsed:?}");
    assert_eq!(report.sent, 10_000);
    assert!(!report.cancelled);
    assert_eq!(port.written_bytes(), data);
    assert_eq!(port.get_write_log().len(), 5);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    let progress: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            TransmitEvent::Progress { sent, .. } => Some(*sent),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![2048, 4096, 6144, 8192, 10_000]);
    assert_eq!(
        events[events.len() - 2].summary(),
        "Sending 10000/10000 bytes (100%)"
    );
    assert!(matches!(
        events.last(),
        Some(TransmitEvent::Completed { total: 10_000, .. })
    ));
}

#[tokio::test]
async fn test_no_pause_after_last_chunk() {
    let port = MockSerialPort::new("MOCK0");
    let (_reader, mut writer) = port.split().unwrap();
    let scheduler = TransmitScheduler::new(64, Duration::from_millis(500));
    let (tx, _rx) = mpsc::unbounded_channel();

    let started = Instant::now();
    scheduler
        .send(&mut writer, &payload(64), &CancelToken::new(), &tx)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
}

#[tokio::test]
async fn test_cancel_mid_send() {
    let (port, session) = mock_session();
    let scheduler = TransmitScheduler::new(1000, Duration::from_millis(20));
    let mut handle = scheduler.spawn(&session, payload(10_000)).unwrap();

    assert!(matches!(
        handle.next_event().await,
        Some(TransmitEvent::Progress { sent: 1000, .. })
    ));
    handle.cancel();

    let mut last = None;
    while let Some(event) = handle.next_event().await {
        last = Some(event);
    }
    let report = handle.join().await.unwrap();

    assert!(report.cancelled);
    assert!(report.sent < report.total);
    assert!(matches!(
        last,
        Some(TransmitEvent::Cancelled { sent, total: 10_000 }) if sent == report.sent
    ));
    assert_eq!(port.written_bytes().len(), report.sent);
    assert!(!scheduler.is_active());

    // The writer is released once the send ends.
    assert!(session.acquire_writer().is_ok());
}

#[tokio::test]
async fn test_write_failure_is_reported() {
    let (port, session) = mock_session();
    port.set_write_delay(Some(Duration::from_millis(30)));
    let scheduler = TransmitScheduler::new(1000, Duration::ZERO);
    let mut handle = scheduler.spawn(&session, payload(5000)).unwrap();

    assert!(matches!(
        handle.next_event().await,
        Some(TransmitEvent::Progress { sent: 1000, .. })
    ));
    port.set_fail_writes(true);

    let mut last = None;
    while let Some(event) = handle.next_event().await {
        last = Some(event);
    }
    assert!(matches!(
        last,
        Some(TransmitEvent::Failed { sent: 1000, total: 5000, .. })
    ));
    assert!(matches!(
        handle.join().await,
        Err(TransmitError::Write { sent: 1000, total: 5000, .. })
    ));
    assert!(!scheduler.is_active());
}

#[tokio::test]
async fn test_second_bulk_send_is_rejected() {
    let (port, session) = mock_session();
    port.set_write_delay(Some(Duration::from_millis(20)));
    let scheduler = TransmitScheduler::new(100, Duration::ZERO);

    let handle = scheduler.spawn(&session, payload(1000)).unwrap();
    assert!(scheduler.is_active());
    assert!(matches!(
        scheduler.spawn(&session, payload(10)),
        Err(TransmitError::Busy)
    ));

    // Manual writes cannot interleave with the bulk send.
    assert!(matches!(
        session.write(b"AT\r\n").await,
        Err(PortError::WriterBusy)
    ));

    handle.cancel();
    handle.join().await.unwrap();
    assert!(!scheduler.is_active());
    session.write(b"AT\r\n").await.unwrap();
}

#[tokio::test]
async fn test_terminal_rejects_writes_during_bulk_send() {
    let (port, mut terminal) = connected_terminal(fast_options(), PortConfiguration::default());
    port.set_write_delay(Some(Duration::from_millis(20)));

    let handle = terminal.send_bulk(payload(4096)).unwrap();
    assert!(matches!(
        terminal.send_bulk(payload(10)),
        Err(AppError::Transmit(TransmitError::Busy))
    ));
    assert!(matches!(
        terminal.send(&ManualSend::text("hi")).await,
        Err(AppError::Port(PortError::WriterBusy))
    ));

    assert!(terminal.cancel_transmit());
    assert!(!terminal.cancel_transmit());
    let report = handle.join().await.unwrap();
    assert!(report.cancelled);

    assert_eq!(terminal.send(&ManualSend::text("hi")).await.unwrap(), 4);
    terminal.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_cancels_running_transmit() {
    let (port, mut terminal) = connected_terminal(fast_options(), PortConfiguration::default());
    port.set_write_delay(Some(Duration::from_millis(10)));
    let handle = terminal.send_bulk(payload(8 * 2048)).unwrap();

    assert!(wait_for(Duration::from_secs(2), || !port.get_write_log().is_empty()).await);
    terminal.disconnect().await;

    let report = handle.join().await.unwrap();
    assert!(report.cancelled);
    assert!(report.sent < report.total);
    assert!(!terminal.is_connected());
    terminal.shutdown().await;
}
