// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backup::BackupError;
use crate::fake::FakeBackend;
use crate::migrate::MigrationError;
use crate::queue::QueueError;
use crate::schema::CURRENT_VERSION;
use dfd_core::{ContentInfo, FakeClock, StatusInfo};
use serde_json::{json, Value};
use std::io;
use std::time::Duration;
use tempfile::TempDir;

fn fast_retries() -> QueueConfig {
    QueueConfig::default().with_retries(2, Duration::from_millis(1))
}

async fn fresh_store() -> (Store<FakeBackend, FakeClock>, FakeBackend) {
    let backend = FakeBackend::new();
    let (store, _) = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .unwrap();
    (store, backend)
}

fn entry(name: &str, title: &str) -> ContentEntry {
    ContentEntry::new(name).with_content_info(ContentInfo::new(title))
}

fn v1_doc() -> Value {
    json!({
        "version": "1.0.0",
        "contentInfo": {},
        "firstRunComplete": true,
        "lastUpdated": "2023-11-02T08:00:00Z"
    })
}

fn current_doc() -> Value {
    json!({
        "version": CURRENT_VERSION,
        "contentInfo": [{
            "name": "df-direct-weekly-150",
            "contentInfo": { "title": "DF Direct Weekly #150" },
            "statusInfo": { "status": "AVAILABLE" },
            "dataVersion": "2.0.0"
        }],
        "firstRunComplete": true,
        "lastUpdated": "2024-02-01T00:00:00Z"
    })
}

#[tokio::test]
async fn init_without_document_starts_first_run() {
    let backend = FakeBackend::new();
    let (store, info) = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .unwrap();

    assert!(info.first_run);
    assert!(info.migration.is_none());
    assert!(info.backup.is_none());
    assert!(store.get_all_content_entries().is_empty());
    assert!(store.get_user_info().is_none());

    let written = backend.document().unwrap();
    assert_eq!(written["version"], CURRENT_VERSION);
    assert_eq!(written["contentInfo"], json!([]));
    assert_eq!(written["firstRunComplete"], false);
    assert_eq!(backend.write_count(), 1);
    assert!(backend.backups().is_empty());
}

#[tokio::test]
async fn init_with_current_document_loads_it_without_backup() {
    let backend = FakeBackend::with_document(current_doc());
    let (store, info) = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .unwrap();

    assert!(!info.first_run);
    assert!(info.migration.is_none());
    assert!(backend.backups().is_empty());
    let entry = store.get_content_entry("df-direct-weekly-150").unwrap();
    assert_eq!(entry.content_info.title, "DF Direct Weekly #150");
}

#[tokio::test]
async fn init_migrates_legacy_document_after_backing_it_up() {
    let legacy = json!({ "ignored": { "foo": { "reason": "MANUAL" } } });
    let backend = FakeBackend::with_document(legacy.clone());
    let clock = FakeClock::at_millis(1_700_000_000_000);

    let (store, info) = Store::init(backend.clone(), clock, fast_retries())
        .await
        .unwrap();

    let backups = backend.backups();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        backups[0].path,
        PathBuf::from("backups/db-NO_VERSION-1700000000000.json")
    );
    assert_eq!(backups[0].document, legacy);
    assert_eq!(info.backup, Some(backups[0].path.clone()));

    let report = info.migration.unwrap();
    assert_eq!(report.from, None);
    assert_eq!(report.to, CURRENT_VERSION);
    assert!(report.refetch_required);
    // Legacy documents carry the first-run flag forward as complete
    assert!(!info.first_run);

    let foo = store.get_content_entry("foo").unwrap();
    assert_eq!(foo.status_info, StatusInfo::Available);
    assert_eq!(foo.data_version, "1.0.0");
    assert!(store.refetch_required());

    let written = backend.document().unwrap();
    assert_eq!(written["version"], CURRENT_VERSION);
    assert_eq!(written["refetchRequired"], true);
}

#[tokio::test]
async fn init_opens_legacy_catalog_with_paywalled_entries() {
    let backend = FakeBackend::with_document(json!({
        "ignored": { "foo": { "reason": "CONTENT_PAYWALLED" } }
    }));

    let (store, info) = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .unwrap();

    assert!(info.migration.is_some());
    assert_eq!(
        store.get_content_entry("foo").unwrap().status_info,
        StatusInfo::Paywalled
    );
    let written = backend.document().unwrap();
    assert_eq!(written["contentInfo"][0]["statusInfo"]["status"], "CONTENT_PAYWALLED");
}

#[tokio::test]
async fn init_rejects_unsupported_version_without_side_effects() {
    let backend = FakeBackend::with_document(json!({ "version": "9.9.9" }));

    let err = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .err()
        .unwrap();

    assert!(err.is_unsupported_version());
    assert!(matches!(
        err,
        StoreError::Migration(MigrationError::UnsupportedVersion { ref version }) if version == "9.9.9"
    ));
    assert!(backend.backups().is_empty());
    assert_eq!(backend.save_attempts(), 0);
}

#[tokio::test]
async fn init_fails_when_pre_migration_backup_fails() {
    let backend = FakeBackend::with_document(v1_doc());
    backend.fail_backups(true);

    let err = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, StoreError::Backup(BackupError::Io(_))));
    assert_eq!(backend.save_attempts(), 0);
}

#[tokio::test]
async fn init_fails_on_invalid_current_document() {
    let mut doc = current_doc();
    doc["contentInfo"] = json!("not a list");
    let backend = FakeBackend::with_document(doc);

    let err = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .err()
        .unwrap();

    let StoreError::Validation(err) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(err.path, "contentInfo");
    assert_eq!(backend.save_attempts(), 0);
}

#[tokio::test]
async fn init_fails_when_document_cannot_be_written() {
    let backend = FakeBackend::new();
    backend.fail_next_writes(10);

    let err = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        StoreError::WriteFailure(QueueError::Exhausted { attempts: 3, .. })
    ));
    assert_eq!(backend.save_attempts(), 3);
}

#[tokio::test]
async fn added_entries_are_readable_and_persisted() {
    let (store, backend) = fresh_store().await;

    let durability = store
        .add_content_entries(vec![
            entry("df-retro-ps1", "DF Retro: PS1"),
            entry("df-retro-n64", "DF Retro: N64"),
        ])
        .await;

    assert_eq!(durability, Durability::Persisted);
    assert_eq!(
        store.get_content_entry("df-retro-ps1").unwrap().content_info.title,
        "DF Retro: PS1"
    );
    assert_eq!(store.get_all_content_entries().len(), 2);

    let written = backend.document().unwrap();
    let names: Vec<&str> = written["contentInfo"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["df-retro-n64", "df-retro-ps1"]);
}

#[tokio::test]
async fn adding_existing_name_replaces_entry() {
    let (store, _) = fresh_store().await;
    store.add_content_entries(vec![entry("dfdw-1", "old")]).await;

    let downloaded = entry("dfdw-1", "new").with_status(StatusInfo::Downloaded {
        format: "HEVC".to_string(),
        download_location: "/media/dfdw-1.mp4".to_string(),
        download_date: FakeClock::new().now(),
        size: Some(1024),
    });
    store.add_content_entries(vec![downloaded.clone()]).await;

    assert_eq!(store.get_all_content_entries(), vec![downloaded]);
}

#[tokio::test]
async fn empty_add_does_not_write() {
    let (store, backend) = fresh_store().await;
    let before = backend.save_attempts();

    let durability = store.add_content_entries(Vec::new()).await;

    assert_eq!(durability, Durability::Unchanged);
    assert_eq!(backend.save_attempts(), before);
}

#[tokio::test]
async fn lookups_by_name_list_and_map() {
    let (store, _) = fresh_store().await;
    store
        .add_content_entries(vec![entry("a", "A"), entry("b", "B")])
        .await;

    let list = store.get_content_entry_list(&["b", "missing", "a"]);
    let titles: Vec<Option<String>> = list
        .into_iter()
        .map(|e| e.map(|e| e.content_info.title))
        .collect();
    assert_eq!(
        titles,
        vec![Some("B".to_string()), None, Some("A".to_string())]
    );

    let map = store.get_content_entry_map(&["a", "missing"]);
    assert_eq!(map.len(), 1);
    assert_eq!(map["a"].content_info.title, "A");
}

#[tokio::test]
async fn removed_entries_are_gone() {
    let (store, backend) = fresh_store().await;
    store
        .add_content_entries(vec![entry("a", "A"), entry("b", "B")])
        .await;

    let durability = store.remove_content_entries(["a", "never-existed"]).await;

    assert_eq!(durability, Durability::Persisted);
    assert!(store.get_content_entry("a").is_none());
    assert!(store.get_content_entry("b").is_some());
    assert_eq!(backend.document().unwrap()["contentInfo"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn user_info_round_trips() {
    let (store, backend) = fresh_store().await;
    let user = UserInfo::new("richard").with_tier("gold");

    store.set_user_info(user.clone()).await;

    assert_eq!(store.get_user_info(), Some(user));
    assert_eq!(backend.document().unwrap()["user"]["username"], "richard");
}

#[tokio::test]
async fn first_run_complete_writes_every_time() {
    let (store, backend) = fresh_store().await;
    let before = backend.write_count();

    store.set_first_run_complete().await;
    store.set_first_run_complete().await;

    assert_eq!(backend.write_count(), before + 2);
    assert!(store.summary().first_run_complete);
    assert_eq!(backend.document().unwrap()["firstRunComplete"], true);
}

#[tokio::test]
async fn writes_stamp_last_updated_from_clock() {
    let backend = FakeBackend::new();
    let clock = FakeClock::new();
    let (store, _) = Store::init(backend.clone(), clock.clone(), fast_retries())
        .await
        .unwrap();

    clock.advance(chrono::Duration::hours(1));
    store.add_content_entries(vec![entry("a", "A")]).await;

    assert_eq!(store.summary().last_updated, clock.now());
    let written: DateTime<Utc> =
        serde_json::from_value(backend.document().unwrap()["lastUpdated"].clone()).unwrap();
    assert_eq!(written, clock.now());
}

#[tokio::test]
async fn failed_write_keeps_change_in_memory_and_is_reported() {
    let (store, backend) = fresh_store().await;
    backend.fail_next_writes(3);

    let durability = store.add_content_entries(vec![entry("a", "A")]).await;

    assert_eq!(durability, Durability::NotPersisted);
    assert!(!durability.is_durable());
    assert!(store.get_content_entry("a").is_some());
    let health = store.write_health();
    assert_eq!(health.failed_writes, 1);
    assert!(health.last_error.unwrap().contains("injected write failure"));

    // The queue keeps serving later writes, which carry the whole document
    let durability = store.add_content_entries(vec![entry("b", "B")]).await;
    assert_eq!(durability, Durability::Persisted);
    assert_eq!(backend.document().unwrap()["contentInfo"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn transient_write_failure_is_retried() {
    let (store, backend) = fresh_store().await;
    backend.fail_next_writes(1);

    let durability = store.set_first_run_complete().await;

    assert_eq!(durability, Durability::Persisted);
    assert_eq!(store.write_health(), WriteHealth::default());
}

#[tokio::test]
async fn concurrent_mutations_all_land() {
    let (store, backend) = fresh_store().await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .add_content_entries(vec![entry(&format!("entry-{i}"), "T")])
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Durability::Persisted);
    }
    store.flush().await;

    assert_eq!(store.get_all_content_entries().len(), 10);
    assert_eq!(backend.document().unwrap()["contentInfo"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn take_refetch_required_clears_flag_once() {
    let backend = FakeBackend::with_document(v1_doc());
    let (store, _) = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .unwrap();
    assert!(store.refetch_required());
    let writes = backend.write_count();

    assert_eq!(store.take_refetch_required().await, (true, Durability::Persisted));
    assert_eq!(store.take_refetch_required().await, (false, Durability::Unchanged));

    assert!(!store.refetch_required());
    assert_eq!(backend.write_count(), writes + 1);
    assert!(backend.document().unwrap().get("refetchRequired").is_none());
}

#[tokio::test]
async fn take_refetch_reports_failed_write() {
    let backend = FakeBackend::with_document(v1_doc());
    let (store, _) = Store::init(backend.clone(), FakeClock::new(), fast_retries())
        .await
        .unwrap();
    backend.fail_next_writes(3);

    let (was_set, durability) = store.take_refetch_required().await;

    assert!(was_set);
    assert_eq!(durability, Durability::NotPersisted);
    assert!(!store.refetch_required());
    assert_eq!(store.write_health().failed_writes, 1);
}

/// Backend whose saves take a while and record how many overlap
#[derive(Clone, Default)]
struct SlowBackend {
    in_flight: Arc<std::sync::atomic::AtomicUsize>,
    max_in_flight: Arc<std::sync::atomic::AtomicUsize>,
    saves: Arc<std::sync::atomic::AtomicUsize>,
}

#[async_trait::async_trait]
impl Backend for SlowBackend {
    async fn load(&self) -> Result<Option<Value>, BackendError> {
        Ok(None)
    }

    async fn save(&self, _bytes: &[u8]) -> Result<(), BackendError> {
        use std::sync::atomic::Ordering;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn backup(
        &self,
        _version: Option<&str>,
        _timestamp_ms: i64,
    ) -> Result<Option<PathBuf>, BackupError> {
        Ok(None)
    }
}

#[tokio::test]
async fn saves_never_overlap_even_when_config_asks_for_concurrency() {
    use std::sync::atomic::Ordering;
    let backend = SlowBackend::default();
    let (store, _) = Store::init(backend.clone(), FakeClock::new(), QueueConfig::new(4))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .add_content_entries(vec![entry(&format!("entry-{i}"), "T")])
                .await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Durability::Persisted);
    }

    assert_eq!(backend.saves.load(Ordering::SeqCst), 5);
    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn manual_backup_uses_current_version() {
    let backend = FakeBackend::new();
    let clock = FakeClock::at_millis(42);
    let (store, _) = Store::init(backend.clone(), clock, fast_retries())
        .await
        .unwrap();

    let path = store.backup().await.unwrap().unwrap();

    assert_eq!(path, PathBuf::from("backups/db-2.0.0-42.json"));
}

#[tokio::test]
async fn manual_backup_failure_is_returned() {
    let (store, backend) = fresh_store().await;
    backend.fail_backups(true);

    assert!(matches!(
        store.backup().await,
        Err(StoreError::Backup(_))
    ));
}

#[tokio::test]
async fn summary_reflects_document() {
    let (store, _) = fresh_store().await;
    store.add_content_entries(vec![entry("a", "A")]).await;
    store.set_user_info(UserInfo::new("alex")).await;

    let summary = store.summary();

    assert_eq!(summary.version, CURRENT_VERSION);
    assert_eq!(summary.entries, 1);
    assert!(summary.has_user);
    assert!(!summary.first_run_complete);
    assert!(!summary.refetch_required);
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::new(dir.path());

    let (store, info) = Store::<FileBackend>::open(&config).await.unwrap();
    assert!(info.first_run);
    store.add_content_entries(vec![entry("dfdw-200", "DF Direct Weekly #200")]).await;
    store.set_first_run_complete().await;
    drop(store);

    let (store, info) = Store::<FileBackend>::open(&config).await.unwrap();
    assert!(!info.first_run);
    assert!(info.migration.is_none());
    assert_eq!(
        store.get_content_entry("dfdw-200").unwrap().content_info.title,
        "DF Direct Weekly #200"
    );
}

#[tokio::test]
async fn file_store_backs_up_v1_document_before_migrating() {
    let dir = TempDir::new().unwrap();
    let original = json!({
        "version": "1.0.0",
        "firstRunComplete": true,
        "lastUpdated": "2023-11-02T08:00:00Z",
        "contentInfo": {
            "dfdw-120": { "name": "dfdw-120", "meta": { "title": "DF Direct Weekly #120" } }
        }
    });
    std::fs::write(dir.path().join("db.json"), original.to_string()).unwrap();

    let (store, info) = Store::<FileBackend>::open(&StoreConfig::new(dir.path())).await.unwrap();

    let backup = info.backup.unwrap();
    assert!(backup.starts_with(dir.path().join("backups")));
    let copied: Value = serde_json::from_slice(&std::fs::read(&backup).unwrap()).unwrap();
    similar_asserts::assert_eq!(copied, original);

    let listed = store.backend().backups().list_backups().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].version, "1.0.0");

    let on_disk: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("db.json")).unwrap()).unwrap();
    assert_eq!(on_disk["version"], CURRENT_VERSION);
    assert_eq!(on_disk["contentInfo"][0]["contentInfo"]["title"], "DF Direct Weekly #120");
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn writes_are_logged_with_entry_count() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let (store, _) = fresh_store().await;
    store.add_content_entries(vec![entry("a", "A")]).await;

    let output = logs.contents();
    assert!(output.contains("writing document"), "{output}");
    assert!(output.contains("wrote document"), "{output}");
    assert!(output.contains("entries=1"), "{output}");
    assert!(output.contains("elapsed_ms="), "{output}");
}
