//! Sync integration tests over file-backed stores.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::disallowed_methods)]

use std::{sync::Arc, time::Duration};

use reldir_directory::{Directory, ManifestCompiler};
use reldir_store::PageOptions;
use reldir_sync::{LocalRemote, Mode, Syncer, Watermark};
use reldir_test_utils::{TestDir, fixtures};
use reldir_types::config::{DirectoryConfig, SyncConfig};
use tokio_util::sync::CancellationToken;

fn open(dir: &TestDir, name: &str) -> Arc<Directory> {
    let config = DirectoryConfig::with_db_path(dir.join(name));
    Arc::new(Directory::open(config, Arc::new(ManifestCompiler)).expect("open directory"))
}

fn user_ids(dir: &Directory) -> Vec<String> {
    dir.get_objects("user", &PageOptions::new(100))
        .expect("list")
        .results
        .into_iter()
        .map(|o| o.id)
        .collect()
}

fn syncer(source: &Arc<Directory>, target: &Arc<Directory>) -> Syncer<LocalRemote> {
    Syncer::new(Arc::clone(target), LocalRemote::new(Arc::clone(source)), SyncConfig::default())
        .expect("syncer")
}

#[tokio::test]
async fn test_diff_sync_deletes_missing_objects() {
    let tmp = TestDir::new();
    let source = open(&tmp, "source.db");
    let target = open(&tmp, "target.db");
    for id in ["a", "b"] {
        source.set_object(fixtures::object("user", id)).expect("source");
    }
    for id in ["a", "b", "c"] {
        target.set_object(fixtures::object("user", id)).expect("target");
    }

    let mode: Mode = "manifest,diff".parse().expect("mode");
    let report = syncer(&source, &target).run(mode, &CancellationToken::new()).await.expect("sync");

    assert_eq!(user_ids(&target), ["a", "b"]);
    assert_eq!(report.objects.deleted, 1);
    assert!(!report.manifest_changed);

    let mark = report.watermark.expect("watermark written");
    assert_eq!(mark.obj_count, 2);
    assert_eq!(mark.count, 2);
    let on_disk = Watermark::load(&tmp.sidecar("target.db", "sync")).expect("load").expect("file");
    assert_eq!(on_disk, mark);
}

#[tokio::test]
async fn test_watermark_limits_second_run() {
    let tmp = TestDir::new();
    let source = open(&tmp, "source.db");
    let target = open(&tmp, "target.db");
    for id in ["a", "b"] {
        source.set_object(fixtures::object("user", id)).expect("source");
    }

    let first = syncer(&source, &target)
        .run(Mode::WATERMARK, &CancellationToken::new())
        .await
        .expect("first");
    assert_eq!(first.objects.received, 2);
    let first_mark = first.watermark.expect("watermark");

    tokio::time::sleep(Duration::from_millis(20)).await;
    source.set_object(fixtures::object("user", "c")).expect("new object");

    let second = syncer(&source, &target)
        .run(Mode::WATERMARK, &CancellationToken::new())
        .await
        .expect("second");
    assert!(second.objects.received < 3, "received {}", second.objects.received);
    assert_eq!(second.objects.written, 1);
    assert_eq!(user_ids(&target), ["a", "b", "c"]);

    let second_mark = second.watermark.expect("watermark");
    assert!(
        (second_mark.ts.seconds, second_mark.ts.nanos) > (first_mark.ts.seconds, first_mark.ts.nanos)
    );
    assert_eq!(second_mark.obj_count, 3);
}

#[tokio::test]
async fn test_failed_run_keeps_watermark() {
    let tmp = TestDir::new();
    let source = open(&tmp, "source.db");
    let target = open(&tmp, "target.db");
    source.set_object(fixtures::object("user", "a")).expect("source");
    syncer(&source, &target).run(Mode::FULL, &CancellationToken::new()).await.expect("first");
    let path = tmp.sidecar("target.db", "sync");
    let before = Watermark::load(&path).expect("load").expect("file");

    source.set_object(fixtures::object("user", "b")).expect("source");
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(syncer(&source, &target).run(Mode::FULL, &cancel).await.is_err());

    assert_eq!(Watermark::load(&path).expect("load").expect("file"), before);
    assert_eq!(user_ids(&target), ["a"]);
}
