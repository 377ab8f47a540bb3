//! End-to-end scenarios over real temporary directories

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::fs;

use crate::config::{FileRuleConfig, MirrorConfig, MirrorRuleConfig};
use crate::engine::MirrorEngine;
use crate::error::MirrorError;
use crate::executor::{backup_path_for, SyncExecutor, SyncOutcome};
use crate::registry::RuleRegistry;
use crate::rules::MirrorRule;
use crate::watcher::{route_event, ChangeEvent, ChangeKind};

struct Harness {
    _temp: TempDir,
    registry: RuleRegistry,
    executor: SyncExecutor,
}

impl Harness {
    async fn new(file_rules: Vec<FileRuleConfig>) -> Self {
        let temp = TempDir::new().unwrap();
        let config = MirrorConfig {
            rules: vec![MirrorRuleConfig {
                name: "test".to_string(),
                source: temp.path().join("src"),
                destination: temp.path().join("dst"),
                recursive: true,
                conflict_resolution: Default::default(),
                file_rules,
            }],
            ..Default::default()
        };

        let registry = RuleRegistry::from_config(&config).await.unwrap();
        Self {
            _temp: temp,
            registry,
            executor: SyncExecutor::new(),
        }
    }

    fn rule(&self) -> &Arc<MirrorRule> {
        self.registry.rules().next().unwrap()
    }

    fn source(&self) -> &Path {
        &self.rule().source
    }

    fn destination(&self) -> &Path {
        &self.rule().destination
    }
}

fn size_rule(pattern: &str, max_size: u64) -> FileRuleConfig {
    FileRuleConfig {
        pattern: pattern.to_string(),
        max_size,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_sync_file_copies_bytes_and_mtime() {
    let h = Harness::new(vec![]).await;
    let source = h.source().join("note.txt");
    let dest = h.destination().join("note.txt");

    fs::write(&source, b"hello").await.unwrap();
    // Backdate the source so mtime preservation is observable
    let old = filetime::FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&source, old).unwrap();

    let outcome = h
        .executor
        .sync_file(&source, &dest, h.rule())
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Copied);

    assert_eq!(fs::read(&dest).await.unwrap(), b"hello");
    let dest_mtime =
        filetime::FileTime::from_last_modification_time(&fs::metadata(&dest).await.unwrap());
    assert_eq!(dest_mtime.unix_seconds(), 1_600_000_000);
}

#[tokio::test]
async fn test_oversized_file_rejected_dest_untouched() {
    let h = Harness::new(vec![size_rule("*", 4)]).await;
    let source = h.source().join("big.txt");
    let dest = h.destination().join("big.txt");

    fs::write(&dest, b"previous").await.unwrap();
    fs::write(&source, b"way too large").await.unwrap();

    let result = h.executor.sync_file(&source, &dest, h.rule()).await;
    assert!(matches!(
        result,
        Err(MirrorError::SizeLimitExceeded { size: 13, limit: 4, .. })
    ));
    assert_eq!(fs::read(&dest).await.unwrap(), b"previous");
}

#[tokio::test]
async fn test_backup_holds_previous_destination_content() {
    let h = Harness::new(vec![]).await;
    let source = h.source().join("doc.txt");
    let dest = h.destination().join("doc.txt");

    fs::write(&dest, b"version one").await.unwrap();
    fs::write(&source, b"version two").await.unwrap();

    h.executor
        .sync_file(&source, &dest, h.rule())
        .await
        .unwrap();

    assert_eq!(fs::read(&dest).await.unwrap(), b"version two");
    assert_eq!(
        fs::read(backup_path_for(&dest)).await.unwrap(),
        b"version one"
    );

    // A second overwrite replaces the backup with the latest prior content
    fs::write(&source, b"version three").await.unwrap();
    h.executor
        .sync_file(&source, &dest, h.rule())
        .await
        .unwrap();
    assert_eq!(
        fs::read(backup_path_for(&dest)).await.unwrap(),
        b"version two"
    );
}

#[tokio::test]
async fn test_backup_failure_blocks_overwrite() {
    let h = Harness::new(vec![]).await;
    let source = h.source().join("doc.txt");
    let dest = h.destination().join("doc.txt");

    fs::write(&dest, b"keep me").await.unwrap();
    fs::write(&source, b"incoming").await.unwrap();
    // A directory squatting on the backup path makes the backup copy fail
    fs::create_dir(backup_path_for(&dest)).await.unwrap();

    let result = h.executor.sync_file(&source, &dest, h.rule()).await;
    assert!(matches!(result, Err(MirrorError::Backup { .. })));
    assert_eq!(fs::read(&dest).await.unwrap(), b"keep me");
}

#[tokio::test]
async fn test_no_backup_when_disabled() {
    let h = Harness::new(vec![FileRuleConfig {
        backup: false,
        ..Default::default()
    }])
    .await;
    let source = h.source().join("doc.txt");
    let dest = h.destination().join("doc.txt");

    fs::write(&dest, b"old").await.unwrap();
    fs::write(&source, b"new").await.unwrap();

    h.executor
        .sync_file(&source, &dest, h.rule())
        .await
        .unwrap();
    assert!(!backup_path_for(&dest).exists());
}

#[tokio::test]
async fn test_missing_source_propagates_deletion() {
    let h = Harness::new(vec![]).await;
    let source = h.source().join("gone.txt");
    let dest = h.destination().join("gone.txt");

    fs::write(&dest, b"stale").await.unwrap();
    let outcome = h
        .executor
        .sync_file(&source, &dest, h.rule())
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::DeletedDest);
    assert!(!dest.exists());

    // No destination either: defined as a no-op success
    let outcome = h
        .executor
        .sync_file(&source, &dest, h.rule())
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::NoOp);
}

#[tokio::test]
async fn test_extension_gating_skips_file() {
    let h = Harness::new(vec![FileRuleConfig {
        allowed_extensions: vec!["txt".to_string()],
        ..Default::default()
    }])
    .await;
    let source = h.source().join("tool.exe");
    let dest = h.destination().join("tool.exe");

    fs::write(&source, b"binary").await.unwrap();
    let outcome = h
        .executor
        .sync_file(&source, &dest, h.rule())
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Skipped);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_sync_directory_mirrors_nested_tree() {
    let h = Harness::new(vec![]).await;

    fs::create_dir_all(h.source().join("a/b")).await.unwrap();
    fs::write(h.source().join("a/x.txt"), b"x").await.unwrap();
    fs::write(h.source().join("a/b/y.txt"), b"y").await.unwrap();

    let stats = h.executor.sync_directory(h.rule()).await;
    assert_eq!(stats.copied, 2);
    assert_eq!(stats.failed, 0);

    assert_eq!(
        fs::read(h.destination().join("a/x.txt")).await.unwrap(),
        b"x"
    );
    assert_eq!(
        fs::read(h.destination().join("a/b/y.txt")).await.unwrap(),
        b"y"
    );
}

#[tokio::test]
async fn test_rule_order_is_significant() {
    let h = Harness::new(vec![size_rule("*.log", 100), size_rule("*", 1_000_000)]).await;
    let payload = vec![b'a'; 150];

    let log_source = h.source().join("app.log");
    let txt_source = h.source().join("app.txt");
    fs::write(&log_source, &payload).await.unwrap();
    fs::write(&txt_source, &payload).await.unwrap();

    let log_result = h
        .executor
        .sync_file(&log_source, &h.destination().join("app.log"), h.rule())
        .await;
    assert!(matches!(
        log_result,
        Err(MirrorError::SizeLimitExceeded { .. })
    ));

    let txt_result = h
        .executor
        .sync_file(&txt_source, &h.destination().join("app.txt"), h.rule())
        .await
        .unwrap();
    assert_eq!(txt_result, SyncOutcome::Copied);
}

#[tokio::test]
async fn test_full_pass_then_deleted_event() {
    // The concrete end-to-end scenario: write, full pass, delete, event.
    let h = Harness::new(vec![]).await;
    let source = h.source().join("note.txt");
    let dest = h.destination().join("note.txt");

    fs::write(&source, b"hello").await.unwrap();
    let stats = h.executor.sync_directory(h.rule()).await;
    assert_eq!(stats.copied, 1);
    assert_eq!(fs::read(&dest).await.unwrap(), b"hello");

    fs::remove_file(&source).await.unwrap();
    route_event(
        &h.registry,
        &h.executor,
        &ChangeEvent {
            kind: ChangeKind::Deleted,
            path: source,
        },
    )
    .await
    .unwrap();

    assert!(!dest.exists());
}

#[tokio::test]
async fn test_created_event_syncs_file() {
    let h = Harness::new(vec![]).await;
    let source = h.source().join("fresh.txt");
    fs::write(&source, b"fresh").await.unwrap();

    route_event(
        &h.registry,
        &h.executor,
        &ChangeEvent {
            kind: ChangeKind::Created,
            path: source,
        },
    )
    .await
    .unwrap();

    assert_eq!(
        fs::read(h.destination().join("fresh.txt")).await.unwrap(),
        b"fresh"
    );
}

#[tokio::test]
async fn test_unowned_event_is_dropped() {
    let h = Harness::new(vec![]).await;

    let result = route_event(
        &h.registry,
        &h.executor,
        &ChangeEvent {
            kind: ChangeKind::Modified,
            path: "/nowhere/at/all.txt".into(),
        },
    )
    .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_directory_event_is_ignored() {
    let h = Harness::new(vec![]).await;
    let subdir = h.source().join("subdir");
    fs::create_dir(&subdir).await.unwrap();

    route_event(
        &h.registry,
        &h.executor,
        &ChangeEvent {
            kind: ChangeKind::Created,
            path: subdir,
        },
    )
    .await
    .unwrap();

    assert!(!h.destination().join("subdir").exists());
}

#[tokio::test]
async fn test_engine_lifecycle() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dst");
    let config = MirrorConfig {
        rules: vec![MirrorRuleConfig {
            name: "lifecycle".to_string(),
            source: source.clone(),
            destination: dest.clone(),
            recursive: true,
            conflict_resolution: Default::default(),
            file_rules: vec![FileRuleConfig::default()],
        }],
        ..Default::default()
    };

    let mut engine = MirrorEngine::new(config).await.unwrap();
    assert_eq!(engine.router_state(), crate::watcher::RouterState::Idle);

    fs::write(source.join("seed.txt"), b"seed").await.unwrap();
    let stats = engine.initial_sync().await;
    assert_eq!(stats.copied, 1);
    assert_eq!(fs::read(dest.join("seed.txt")).await.unwrap(), b"seed");

    engine.start_watching().await.unwrap();
    assert_eq!(engine.router_state(), crate::watcher::RouterState::Watching);

    engine.shutdown().await.unwrap();
    assert_eq!(engine.router_state(), crate::watcher::RouterState::Stopped);
}

#[tokio::test]
async fn test_sync_all_convenience() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("src");
    let dest = temp.path().join("dst");
    tokio::fs::create_dir_all(&source).await.unwrap();
    fs::write(source.join("one.txt"), b"1").await.unwrap();

    let config = MirrorConfig {
        rules: vec![MirrorRuleConfig {
            name: "all".to_string(),
            source,
            destination: dest.clone(),
            recursive: true,
            conflict_resolution: Default::default(),
            file_rules: vec![FileRuleConfig::default()],
        }],
        ..Default::default()
    };

    let stats = crate::sync_all(config).await.unwrap();
    assert_eq!(stats.copied, 1);
    assert_eq!(fs::read(dest.join("one.txt")).await.unwrap(), b"1");
}
