//! Pipeline tests against an in-memory database
//!
//! Covers:
//! - Exactly-once job processing for any job count
//! - Shutdown accounting and archive writer ordering
//! - Archive close on success, worker crash and interrupt
//! - Exit status aggregation from failing workers
//! - Dump/restore round trips and single- vs multi-job equivalence

mod common;

use common::{populate, sample_store, wide_store, MemoryFactory, MemoryStore, RecordingArchiver};
use qizx_api::{MemberKind, PropertyValue};
use qizx_bulk::enumerate;
use qizx_bulk::{
    Archive, ArchiveMode, ArchiveTarget, Archiver, Compression, Direction, ExitStatus,
    PipelineConfig, PipelineController, PipelineReport,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const LIB: &str = "books";

async fn dump(factory: Arc<MemoryFactory>, archive: Arc<dyn Archiver>, config: PipelineConfig) -> PipelineReport {
    PipelineController::new(Direction::Dump, config, factory, archive)
        .run()
        .await
}

async fn restore(factory: Arc<MemoryFactory>, archive: Arc<dyn Archiver>, config: PipelineConfig) -> PipelineReport {
    PipelineController::new(Direction::Restore, config, factory, archive)
        .run()
        .await
}

// ============================================================================
// Exactly-once processing
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_job_processed_exactly_once() {
    let store = sample_store(LIB);
    let expected: BTreeSet<String> = enumerate::dump_jobs(&store, LIB)
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.entry)
        .collect();
    let factory = MemoryFactory::new(store);

    for jobs in [1, 2, 4, 8] {
        let archive = RecordingArchiver::new(true);
        let report = dump(factory.clone(), archive.clone(), PipelineConfig::new(jobs)).await;

        assert_eq!(report.status, ExitStatus::Success, "jobs={}", jobs);
        assert_eq!(report.jobs_queued, expected.len());
        assert_eq!(report.processed(), expected.len());
        assert!(report.failed().is_empty());
        assert!(report.unprocessed.is_empty());

        let written: BTreeSet<String> = archive.entries().into_keys().collect();
        assert_eq!(written, expected, "jobs={}", jobs);
        assert_eq!(
            archive.writes.load(std::sync::atomic::Ordering::SeqCst),
            expected.len(),
            "an entry was written twice with jobs={}",
            jobs
        );
    }
}

#[tokio::test]
async fn test_dump_enumeration_covers_members() {
    let store = sample_store(LIB);
    let jobs = enumerate::dump_jobs(&store, LIB).await.unwrap();

    let entries: Vec<&str> = jobs.iter().map(|job| job.entry.as_str()).collect();
    assert!(entries.contains(&"books/properties/.properties.json"));
    assert!(entries.contains(&"books/documents/books/old/b0.xml"));
    assert!(entries.contains(&"books/nonxml/img/logo.png"));
    assert!(entries.contains(&"books/properties/empty/.properties.json"));
    let documents = jobs.iter().filter(|job| job.kind.is_body()).count();
    assert_eq!(documents, 5);
}

// ============================================================================
// Shutdown accounting and single-writer serialization
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_writer_serializes_and_shuts_down_last() {
    let factory = MemoryFactory::new(wide_store(LIB, 120));
    let archive = RecordingArchiver::with_delay(false, Duration::from_millis(1));

    let controller = PipelineController::new(
        Direction::Dump,
        PipelineConfig::new(9).with_archive_queue_capacity(4),
        factory,
        archive.clone(),
    );
    assert!(controller.needs_writer());
    assert_eq!(controller.worker_count(), 8);

    let report = controller.run().await;
    assert_eq!(report.status, ExitStatus::Success);
    assert_eq!(
        archive.overlaps.load(std::sync::atomic::Ordering::SeqCst),
        0,
        "archive writes overlapped"
    );

    assert_eq!(report.workers.len(), 8);
    assert_eq!(report.shutdowns_sent, 8 + 1);
    assert!(report.workers.iter().all(|w| w.shutdown_received));

    let writer = report.writer.as_ref().unwrap();
    assert!(writer.shutdown_received);
    assert_eq!(writer.writes, report.jobs_queued);
    let last_worker = report.workers.iter().map(|w| w.finished_at).max().unwrap();
    assert!(writer.shutdown_at.unwrap() >= last_worker);

    assert_eq!(archive.close_count(), 1);
}

#[tokio::test]
async fn test_directory_archive_needs_no_writer() {
    let factory = MemoryFactory::new(sample_store(LIB));
    let controller = PipelineController::new(
        Direction::Dump,
        PipelineConfig::new(3),
        factory,
        RecordingArchiver::new(true),
    );
    assert!(!controller.needs_writer());
    assert_eq!(controller.worker_count(), 3);

    let report = controller.run().await;
    assert!(report.writer.is_none());
    assert_eq!(report.shutdowns_sent, 3);
}

// ============================================================================
// Archive close on every exit path
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_once_when_worker_crashes() {
    let store = sample_store(LIB).panicking("/books/b2.xml");
    let archive = RecordingArchiver::new(false);

    let report = dump(MemoryFactory::new(store), archive.clone(), PipelineConfig::new(4)).await;

    assert_eq!(report.status, ExitStatus::Fatal);
    assert_eq!(
        report
            .workers
            .iter()
            .filter(|w| w.status == ExitStatus::Fatal)
            .count(),
        1
    );
    assert_eq!(archive.close_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_crash_keeps_every_job_counted() {
    let store = sample_store(LIB).panicking("/books/b2.xml");
    let archive = RecordingArchiver::new(false);

    let report = dump(MemoryFactory::new(store), archive.clone(), PipelineConfig::new(3)).await;

    assert_eq!(report.status, ExitStatus::Fatal);
    assert_eq!(report.workers.len(), 2);
    assert_eq!(report.failed(), vec!["books/documents/books/b2.xml"]);
    assert_eq!(
        report.processed() + report.failed().len() + report.unprocessed.len(),
        report.jobs_queued
    );
    assert_eq!(archive.entries().len(), report.processed());

    let crashed = report
        .workers
        .iter()
        .find(|w| w.status == ExitStatus::Fatal)
        .unwrap();
    assert_eq!(crashed.failed, vec!["books/documents/books/b2.xml"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_once_when_interrupted() {
    let store = wide_store(LIB, 200).with_delay(Duration::from_millis(10));
    let archive = RecordingArchiver::new(false);
    let controller = PipelineController::new(
        Direction::Dump,
        PipelineConfig::new(4),
        MemoryFactory::new(store),
        archive.clone(),
    );
    let cancel = controller.cancellation_token();

    let run = tokio::spawn(controller.run());
    tokio::time::sleep(Duration::from_millis(60)).await;
    cancel.cancel();
    let report = run.await.unwrap();

    assert_eq!(report.status, ExitStatus::Interrupted);
    assert_eq!(report.workers.len(), 3);
    assert!(report.processed() < 200 * 2);
    assert_eq!(archive.close_count(), 1);
    // Everything handed to the writer before the interrupt still reached the archive.
    let writer = report.writer.unwrap();
    assert_eq!(writer.writes, archive.entries().len());
}

#[tokio::test]
async fn test_interrupt_before_start() {
    let archive = RecordingArchiver::new(true);
    let controller = PipelineController::new(
        Direction::Dump,
        PipelineConfig::new(1),
        MemoryFactory::new(sample_store(LIB)),
        archive.clone(),
    );
    controller.cancellation_token().cancel();

    let report = controller.run().await;
    assert_eq!(report.status, ExitStatus::Interrupted);
    assert_eq!(report.jobs_queued, 0);
    assert_eq!(archive.close_count(), 1);
}

#[tokio::test]
async fn test_no_client_closes_archive() {
    let archive = RecordingArchiver::new(true);
    let report = dump(
        MemoryFactory::refusing_after(sample_store(LIB), 0),
        archive.clone(),
        PipelineConfig::new(4),
    )
    .await;

    assert_eq!(report.status, ExitStatus::NoClient);
    assert!(report.workers.is_empty());
    assert_eq!(archive.close_count(), 1);
}

// ============================================================================
// Status aggregation
// ============================================================================

#[tokio::test]
async fn test_failed_document_is_skipped() {
    let store = sample_store(LIB).failing("/books/b1.xml");
    let archive = RecordingArchiver::new(true);

    let report = dump(MemoryFactory::new(store), archive.clone(), PipelineConfig::new(3)).await;

    assert_eq!(report.status, ExitStatus::DocumentFailed);
    assert_eq!(report.failed(), vec!["books/documents/books/b1.xml"]);
    assert_eq!(report.processed() + 1, report.jobs_queued);
    assert!(!archive.entries().contains_key("books/documents/books/b1.xml"));
}

#[tokio::test]
async fn test_workers_without_client_report_100() {
    // The controller's own connection succeeds, every worker's fails.
    let archive = RecordingArchiver::new(true);
    let report = dump(
        MemoryFactory::refusing_after(sample_store(LIB), 1),
        archive.clone(),
        PipelineConfig::new(3),
    )
    .await;

    assert_eq!(report.status, ExitStatus::NoClient);
    assert!(report.workers.iter().all(|w| w.status == ExitStatus::NoClient));
    assert_eq!(report.unprocessed.len(), report.jobs_queued);
    assert_eq!(archive.close_count(), 1);
}

#[tokio::test]
async fn test_unknown_library_aborts_before_queueing() {
    let archive = RecordingArchiver::new(true);
    let report = dump(
        MemoryFactory::new(sample_store(LIB)),
        archive.clone(),
        PipelineConfig::new(2).with_library(Some("missing".into())),
    )
    .await;

    assert_eq!(report.status, ExitStatus::Fatal);
    assert_eq!(report.jobs_queued, 0);
    assert!(archive.entries().is_empty());
    assert_eq!(archive.close_count(), 1);
}

// ============================================================================
// Round trips
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_directory_round_trip() {
    let dir = TempDir::new().unwrap();
    let target = ArchiveTarget::Directory(dir.path().join("dump"));
    let source = MemoryFactory::new(sample_store(LIB));

    let archive = Arc::new(Archive::open(&target, ArchiveMode::Write).await.unwrap());
    let report = dump(source.clone(), archive, PipelineConfig::new(4)).await;
    assert_eq!(report.status, ExitStatus::Success);

    let destination = MemoryFactory::new(MemoryStore::new());
    let archive = Arc::new(Archive::open(&target, ArchiveMode::Read).await.unwrap());
    let report = restore(destination.clone(), archive, PipelineConfig::new(3)).await;
    assert_eq!(report.status, ExitStatus::Success);
    assert_eq!(report.libraries, vec![LIB]);
    assert_eq!(report.shutdowns_sent, 3 * 2);

    assert_eq!(destination.store.snapshot(LIB), source.store.snapshot(LIB));
    assert_eq!(
        destination.store.snapshot(LIB)["/empty"].kind,
        MemberKind::Collection
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_directory_round_trip_deep_paths() {
    let deep: String = (0..20).map(|i| format!("/level-{:02}-{}", i, "x".repeat(30))).collect();
    let document = format!("{}/deep.xml", deep);
    let source = MemoryFactory::new(MemoryStore::new());
    source.store.add(
        LIB,
        &document,
        MemberKind::Document,
        b"<deep/>",
        &[("rank", PropertyValue::Integer(7))],
    );
    source.store.add(
        LIB,
        &format!("{}/.properties.json", deep),
        MemberKind::Document,
        b"<dot/>",
        &[("owner", PropertyValue::String("bob".into()))],
    );
    assert!(document.len() > 255);

    let dir = TempDir::new().unwrap();
    let target = ArchiveTarget::Directory(dir.path().join("dump"));
    let archive = Arc::new(Archive::open(&target, ArchiveMode::Write).await.unwrap());
    let report = dump(source.clone(), archive, PipelineConfig::new(4)).await;
    assert_eq!(report.status, ExitStatus::Success, "failed: {:?}", report.failed());

    let destination = MemoryFactory::new(MemoryStore::new());
    let archive = Arc::new(Archive::open(&target, ArchiveMode::Read).await.unwrap());
    let report = restore(destination.clone(), archive, PipelineConfig::new(2)).await;
    assert_eq!(report.status, ExitStatus::Success, "failed: {:?}", report.failed());

    let restored = destination.store.snapshot(LIB);
    assert_eq!(restored, source.store.snapshot(LIB));
    assert_eq!(restored[&document].properties["rank"], PropertyValue::Integer(7));
}

#[tokio::test]
async fn test_tar_round_trip_single_job() {
    let dir = TempDir::new().unwrap();
    let target = ArchiveTarget::Tar {
        path: dir.path().join("dump.tar.bz2"),
        compression: Compression::Bzip2,
    };
    let source = MemoryFactory::new(sample_store(LIB));

    let archive = Arc::new(Archive::open(&target, ArchiveMode::Write).await.unwrap());
    let report = dump(source.clone(), archive, PipelineConfig::new(1)).await;
    assert_eq!(report.status, ExitStatus::Success);
    assert_eq!(report.workers.len(), 1);
    assert_eq!(report.shutdowns_sent, 0);

    let destination = MemoryFactory::new(MemoryStore::new());
    let archive = Arc::new(Archive::open(&target, ArchiveMode::Read).await.unwrap());
    let report = restore(destination.clone(), archive, PipelineConfig::new(1)).await;
    assert_eq!(report.status, ExitStatus::Success);
    assert_eq!(destination.store.snapshot(LIB), source.store.snapshot(LIB));
}

#[tokio::test]
async fn test_restore_into_renamed_library() {
    let archive = RecordingArchiver::new(true);
    let source = MemoryFactory::new(sample_store(LIB));
    dump(source.clone(), archive.clone(), PipelineConfig::new(2)).await;

    let destination = MemoryFactory::new(MemoryStore::new());
    let report = restore(
        destination.clone(),
        archive,
        PipelineConfig::new(2).with_library(Some("copy".into())),
    )
    .await;

    assert_eq!(report.status, ExitStatus::Success);
    assert_eq!(destination.store.library_names(), vec!["copy"]);
    assert_eq!(destination.store.snapshot("copy"), source.store.snapshot(LIB));
}

#[tokio::test]
async fn test_restore_ambiguous_library_is_fatal() {
    let store = sample_store(LIB);
    populate(&store, "music");
    let archive = RecordingArchiver::new(true);
    dump(MemoryFactory::new(store), archive.clone(), PipelineConfig::new(2)).await;

    let destination = MemoryFactory::new(MemoryStore::new());
    let report = restore(
        destination.clone(),
        archive.clone(),
        PipelineConfig::new(2).with_library(Some("other".into())),
    )
    .await;

    assert_eq!(report.status, ExitStatus::Fatal);
    assert_eq!(report.jobs_queued, 0);
    assert!(destination.store.library_names().is_empty());
    // once by the dump, once by the restore
    assert_eq!(archive.close_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_and_multi_job_archives_match() {
    let dir = TempDir::new().unwrap();
    let store = sample_store(LIB);
    populate(&store, "music");
    let factory = MemoryFactory::new(store);

    let mut contents = Vec::new();
    for (name, jobs) in [("single.tar.gz", 1), ("multi.tar.gz", 6)] {
        let target = ArchiveTarget::Tar {
            path: dir.path().join(name),
            compression: Compression::Gzip,
        };
        let archive = Arc::new(Archive::open(&target, ArchiveMode::Write).await.unwrap());
        let report = dump(factory.clone(), archive, PipelineConfig::new(jobs)).await;
        assert_eq!(report.status, ExitStatus::Success);
        assert_eq!(report.libraries, vec!["books", "music"]);

        let archive = Archive::open(&target, ArchiveMode::Read).await.unwrap();
        let mut entries = Vec::new();
        for name in archive.list_entries().await.unwrap() {
            let payload = archive.read(&name).await.unwrap();
            entries.push((name, payload));
        }
        contents.push(entries);
    }

    assert!(!contents[0].is_empty());
    assert_eq!(contents[0], contents[1]);
}
