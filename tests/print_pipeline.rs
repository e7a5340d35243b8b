//! # Print Pipeline Tests
//!
//! Full jobs through `PrinterSession`: rasterize, trim, encode, send, with
//! fake links recording every buffer that reaches the printer.

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use image::{GrayImage, Luma};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

use common::{ADDRESS, FakeConnector, FakeRasterizer, Handshake, LinkBehavior, count};
use etiqueta::connection::ConnectionManager;
use etiqueta::error::PrintError;
use etiqueta::job::{PrintJob, TransmissionPump};
use etiqueta::raster::DocumentRasterizer;
use etiqueta::session::PrinterSession;
use etiqueta::transport::Connector;

const PAGE_DELAY: Duration = Duration::from_millis(500);

async fn connected(
    connector: FakeConnector,
    rasterizer: FakeRasterizer,
) -> (Arc<FakeConnector>, PrinterSession) {
    let connector = Arc::new(connector);
    let session = common::session(&connector, rasterizer);
    session.connect_device(ADDRESS).await.unwrap();
    (connector, session)
}

#[tokio::test(start_paused = true)]
async fn test_three_page_continuous_job() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready),
        FakeRasterizer::default().with_document("receipt.pdf", 3),
    )
    .await;

    let start = Instant::now();
    let summary = session.print_document("receipt.pdf", false).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.trimmed_pages, 2);

    let sent = connector.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(summary.bytes_sent, sent.iter().map(Vec::len).sum::<usize>());

    // One complete format per page
    for buffer in &sent {
        assert_eq!(count(buffer, "^XA"), 1);
        assert_eq!(count(buffer, "^XZ"), 1);
    }

    // Gap directive on the first page only, continuous media
    assert_eq!(count(&sent[0], "^MNN"), 1);
    assert_eq!(sent.iter().map(|b| count(b, "^MN")).sum::<usize>(), 1);

    // Trimmed pages: rows 0..=105 -> 13mm. Last page keeps 400 rows -> 50mm.
    assert_eq!(count(&sent[0], "^LL104"), 1);
    assert_eq!(count(&sent[1], "^LL104"), 1);
    assert_eq!(count(&sent[2], "^LL400"), 1);

    // Two pauses, none after the last page
    assert!(elapsed >= PAGE_DELAY * 2);
    assert!(elapsed < PAGE_DELAY * 3);
}

#[tokio::test(start_paused = true)]
async fn test_gapped_job_is_not_trimmed() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready),
        FakeRasterizer::default().with_document("labels", 2),
    )
    .await;

    let summary = session.print_document("labels", true).await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.trimmed_pages, 0);

    let sent = connector.sent();
    assert_eq!(count(&sent[0], "^MNY"), 1);
    assert_eq!(count(&sent[1], "^MN"), 0);
    assert!(sent.iter().all(|b| count(b, "^LL400") == 1));
}

#[tokio::test(start_paused = true)]
async fn test_single_page_has_no_delay() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready),
        FakeRasterizer::default().with_document("one.png", 1),
    )
    .await;

    let start = Instant::now();
    let summary = session.print_document("one.png", false).await.unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.trimmed_pages, 0);
    assert_eq!(connector.sent().len(), 1);
    assert!(start.elapsed() < PAGE_DELAY);
}

#[tokio::test(start_paused = true)]
async fn test_missing_document_sends_nothing() {
    let connector = Arc::new(FakeConnector::new(Handshake::Ready));
    let session = common::session(&connector, DocumentRasterizer::default());
    session.connect_device(ADDRESS).await.unwrap();

    let err = session
        .print_document("/nonexistent/invoice.pdf", false)
        .await
        .unwrap_err();

    assert!(matches!(err, PrintError::DocumentNotFound(_)));
    assert_eq!(connector.sent().len(), 0);
    assert!(session.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_document_directory_of_images() {
    let dir = tempfile::tempdir().unwrap();
    for (name, luma) in [("01.png", 0u8), ("02.png", 128u8)] {
        GrayImage::from_pixel(288, 100, Luma([luma]))
            .save(dir.path().join(name))
            .unwrap();
    }
    fs::write(dir.path().join("notes.txt"), "not a page").unwrap();

    let connector = Arc::new(FakeConnector::new(Handshake::Ready));
    let session = common::session(&connector, DocumentRasterizer::default());
    session.connect_device(ADDRESS).await.unwrap();

    let summary = session.print_document(dir.path(), true).await.unwrap();

    // 288x100 scaled to 576 wide -> 200 rows -> 25mm
    assert_eq!(summary.pages, 2);
    let sent = connector.sent();
    assert!(sent.iter().all(|b| count(b, "^PW640^LL200") == 1));
}

#[tokio::test(start_paused = true)]
async fn test_drop_before_second_page() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready).with_behavior(LinkBehavior {
            drop_after: Some(1),
            ..Default::default()
        }),
        FakeRasterizer::default().with_document("receipt.pdf", 3),
    )
    .await;

    let err = session.print_document("receipt.pdf", false).await.unwrap_err();

    assert!(matches!(err, PrintError::ConnectionLost { failed_at: 1 }));
    assert_eq!(err.failed_at(), Some(1));
    assert_eq!(connector.sent().len(), 1);
    assert!(!session.is_connected());
    assert_eq!(
        session.last_connection_error().as_deref(),
        Some("Connection interrupted")
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_job() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready),
        FakeRasterizer::default().with_document("receipt.pdf", 3),
    )
    .await;
    let session = Arc::new(session);

    let job = {
        let session = Arc::clone(&session);
        tokio::spawn(async move { session.print_document("receipt.pdf", false).await })
    };

    // Page 0 is out, the pump is in its pause before page 1
    tokio::time::sleep(PAGE_DELAY / 2).await;
    session.disconnect();

    let err = job.await.unwrap().unwrap_err();
    assert!(matches!(err, PrintError::ConnectionLost { failed_at: 1 }));
    assert_eq!(connector.sent().len(), 1);
    assert!(connector.link(0).is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_link_closed_during_send_is_connection_lost() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready).with_behavior(LinkBehavior {
            closed_at: Some(1),
            ..Default::default()
        }),
        FakeRasterizer::default().with_document("receipt.pdf", 3),
    )
    .await;

    let err = session.print_document("receipt.pdf", false).await.unwrap_err();

    assert!(matches!(err, PrintError::ConnectionLost { failed_at: 1 }));
    assert_eq!(connector.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_stops_job() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready).with_behavior(LinkBehavior {
            fail_at: Some(1),
            ..Default::default()
        }),
        FakeRasterizer::default().with_document("receipt.pdf", 3),
    )
    .await;

    let err = session.print_document("receipt.pdf", false).await.unwrap_err();

    match err {
        PrintError::Transmit { failed_at, reason } => {
            assert_eq!(failed_at, 1);
            assert!(reason.contains("broken pipe"));
        }
        other => panic!("expected Transmit, got {:?}", other),
    }
    assert_eq!(connector.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_print_without_connection() {
    let connector = Arc::new(FakeConnector::new(Handshake::Ready));
    let session = common::session(
        &connector,
        FakeRasterizer::default().with_document("receipt.pdf", 1),
    );

    let err = session.print_document("receipt.pdf", false).await.unwrap_err();

    assert!(matches!(err, PrintError::NotConnected));
    assert_eq!(connector.sent().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_print_after_disconnect() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready),
        FakeRasterizer::default().with_document("receipt.pdf", 1),
    )
    .await;
    session.disconnect();

    let err = session.print_document("receipt.pdf", false).await.unwrap_err();

    assert!(matches!(err, PrintError::NotConnected));
    assert_eq!(connector.sent().len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_jobs_run_in_submission_order() {
    let (connector, session) = connected(
        FakeConnector::new(Handshake::Ready),
        FakeRasterizer::default()
            .with_document("first.pdf", 2)
            .with_document("second.pdf", 1),
    )
    .await;

    let (first, second) = tokio::join!(
        session.print_document("first.pdf", false),
        session.print_document("second.pdf", false),
    );
    assert_eq!(first.unwrap().pages, 2);
    assert_eq!(second.unwrap().pages, 1);

    // Each job opens with the media directive; pages of the first job stay together
    let sent = connector.sent();
    let media: Vec<usize> = sent.iter().map(|b| count(b, "^MN")).collect();
    assert_eq!(media, vec![1, 0, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_pump_with_custom_delay() {
    let connector = Arc::new(FakeConnector::new(Handshake::Ready));
    let manager = ConnectionManager::new(
        Arc::clone(&connector) as Arc<dyn Connector>,
        Duration::from_secs(10),
    );
    manager.connect(ADDRESS).await.unwrap();

    let pump = TransmissionPump::new(
        Arc::new(FakeRasterizer::default().with_document("receipt.pdf", 4)),
        common::zpl_encoder(),
        manager.sender(),
    )
    .with_page_delay(Duration::from_millis(100));

    let start = Instant::now();
    let summary = pump.run(&PrintJob::new("receipt.pdf", false)).await.unwrap();

    assert_eq!(summary.pages, 4);
    assert_eq!(summary.trimmed_pages, 3);
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(start.elapsed() < Duration::from_millis(400));
}
