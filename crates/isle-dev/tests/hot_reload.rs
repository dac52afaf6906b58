//! End-to-end change handling: classification, invalidation, rebuilds and
//! the messages browsers receive.

mod common;

use common::{display, drain, settle, FakeBundler, Project, COUNTER, UTILS};
use isle_dev::bundle::IslandExport;
use isle_dev::classifier::{RawEvent, RawEventKind};
use isle_dev::pipeline::RouteTable;
use isle_dev::transform::EntryState;
use isle_dev::{ChangeEvent, DevRuntime, StructuralReason};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct CountingRoutes {
    rebuilt: AtomicUsize,
}

impl RouteTable for CountingRoutes {
    fn on_structural_change(&self) {
        self.rebuilt.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_counter_island_is_discovered_and_registered_once() {
    let project = Project::new();
    let counter = project.write("app/components/Counter.tsx", COUNTER);
    let bundler = Arc::new(FakeBundler::default());
    let state = project.state(bundler.clone());

    let handle = DevRuntime::new(state.clone()).without_watcher().start().unwrap();
    settle(&state, 1).await;

    assert_eq!(
        state.scheduler.builder().islands(),
        vec![IslandExport {
            path: counter,
            export_name: "Counter".to_string(),
            is_default_export: false,
        }]
    );
    let entry = bundler.last_entry().unwrap();
    assert_eq!(entry.matches("__isleRegisterIsland(\"Counter\"").count(), 1);
    assert!(state.scheduler.status().is_success());
    assert_eq!(state.store.version(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_editing_utils_sends_module_update_without_reload() {
    let project = Project::new();
    let counter = project.write("app/components/Counter.tsx", COUNTER);
    let utils = project.write("app/lib/utils.ts", UTILS);
    let bundler = Arc::new(FakeBundler::default());
    let state = project.state(bundler.clone());
    let handle = DevRuntime::new(state.clone()).without_watcher().start().unwrap();
    settle(&state, 1).await;

    state.cache.load(&counter).await.unwrap();
    state.cache.load(&utils).await.unwrap();
    let (_id, mut rx) = state.broadcaster.connect();

    handle
        .changes()
        .send(ChangeEvent::Module {
            path: utils.clone(),
            kind: RawEventKind::Modified,
        })
        .await
        .unwrap();
    settle(&state, 2).await;

    assert_eq!(state.cache.state(&utils), EntryState::Untransformed);
    assert_eq!(state.cache.state(&counter), EntryState::Ready);
    assert_eq!(bundler.calls(), 2);

    let messages = drain(&mut rx);
    assert_eq!(
        messages,
        vec![format!(
            r#"{{"type":"update","path":"{}"}}"#,
            display(&project.root(), &utils)
        )]
    );
    assert!(messages.iter().all(|m| !m.contains("reload")));

    handle.shutdown().await;
}

#[tokio::test]
async fn test_structural_change_invalidates_everything_and_reloads() {
    let project = Project::new();
    let counter = project.write("app/components/Counter.tsx", COUNTER);
    let utils = project.write("app/lib/utils.ts", UTILS);
    let route = project.write("app/routes/index.html", "<h1>home</h1>");
    let routes = Arc::new(CountingRoutes::default());
    let state = project.state(Arc::new(FakeBundler::default()));
    let handle = DevRuntime::new(state.clone())
        .with_route_table(routes.clone())
        .without_watcher()
        .start()
        .unwrap();
    settle(&state, 1).await;

    state.cache.load(&counter).await.unwrap();
    state.cache.load(&utils).await.unwrap();
    assert_eq!(state.cache.len(), 2);
    let (_id, mut rx) = state.broadcaster.connect();

    handle
        .changes()
        .send(ChangeEvent::Structural {
            path: Some(route),
            reason: StructuralReason::Route,
        })
        .await
        .unwrap();
    settle(&state, 2).await;

    assert!(state.cache.is_empty());
    assert_eq!(routes.rebuilt.load(Ordering::SeqCst), 1);
    assert_eq!(drain(&mut rx), vec![r#"{"type":"reload"}"#.to_string()]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_reload_routes_takes_the_structural_path() {
    let project = Project::new();
    let routes = Arc::new(CountingRoutes::default());
    let state = project.state(Arc::new(FakeBundler::default()));
    let handle = DevRuntime::new(state.clone())
        .with_route_table(routes.clone())
        .without_watcher()
        .start()
        .unwrap();
    settle(&state, 1).await;
    let (_id, mut rx) = state.broadcaster.connect();

    handle.reload_routes().await;
    settle(&state, 2).await;

    assert_eq!(routes.rebuilt.load(Ordering::SeqCst), 1);
    assert_eq!(drain(&mut rx), vec![r#"{"type":"reload"}"#.to_string()]);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_failed_rebuild_keeps_serving_previous_artifacts() {
    let project = Project::new();
    let counter = project.write("app/components/Counter.tsx", COUNTER);
    let bundler = Arc::new(FakeBundler::default());
    let state = project.state(bundler.clone());
    let handle = DevRuntime::new(state.clone()).without_watcher().start().unwrap();
    settle(&state, 1).await;

    let before = state.store.snapshot();
    bundler.set_failing(true);
    project.write(
        "app/components/Counter.tsx",
        &COUNTER.replace("return <button", "return <button }"),
    );
    handle
        .changes()
        .send(ChangeEvent::Module {
            path: counter,
            kind: RawEventKind::Modified,
        })
        .await
        .unwrap();
    settle(&state, 2).await;

    let after = state.store.snapshot();
    assert_eq!(state.scheduler.status().label(), "failed");
    assert_eq!(after.version(), before.version());
    for path in before.paths() {
        assert_eq!(after.get(path).unwrap().bytes, before.get(path).unwrap().bytes);
    }

    handle.shutdown().await;
}

#[tokio::test]
async fn test_rapid_edits_produce_one_transform_of_final_content() {
    let project = Project::new();
    let counter = project.write("app/components/Counter.tsx", COUNTER);
    let bundler = Arc::new(FakeBundler::default());
    let state = project.state(bundler.clone());
    let handle = DevRuntime::new(state.clone()).without_watcher().start().unwrap();
    settle(&state, 1).await;
    state.cache.load(&counter).await.unwrap();
    assert_eq!(state.cache.transform_count(), 1);
    let (_id, mut rx) = state.broadcaster.connect();

    let raw = handle.raw_events();
    project.write("app/components/Counter.tsx", &COUNTER.replace("start = 0", "start = 1"));
    raw.send(RawEvent::new(&counter, RawEventKind::Modified)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    project.write("app/components/Counter.tsx", &COUNTER.replace("start = 0", "start = 2"));
    raw.send(RawEvent::new(&counter, RawEventKind::Modified)).await.unwrap();

    settle(&state, 2).await;
    // Well past the quiet window: a second classified event would have
    // started another rebuild by now.
    tokio::time::sleep(Duration::from_millis(400)).await;
    settle(&state, 2).await;
    assert_eq!(state.scheduler.rebuild_count(), 2);

    let (a, b) = tokio::join!(state.cache.load(&counter), state.cache.load(&counter));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.raw_source.contains("start = 2"));
    assert_eq!(state.cache.transform_count(), 2);
    assert_eq!(drain(&mut rx).len(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_removes_raw_copies() {
    let project = Project::new();
    let counter = project.write("app/components/Counter.tsx", COUNTER);
    let state = project.state(Arc::new(FakeBundler::default()));
    let handle = DevRuntime::new(state.clone()).without_watcher().start().unwrap();
    settle(&state, 1).await;

    let raw_copy = state.cache.load(&counter).await.unwrap().raw_copy.clone().unwrap();
    assert!(raw_copy.exists());

    handle.shutdown().await;
    assert!(!raw_copy.exists());
}

#[tokio::test]
async fn test_missing_root_fails_to_start() {
    let project = Project::new();
    let mut options = project.options();
    options.root = project.path("does-not-exist");
    let state = isle_dev::DevState::with_services(
        options,
        Arc::new(isle_dev::SourceScanLoader),
        Arc::new(FakeBundler::default()),
    );

    let result = DevRuntime::new(state).without_watcher().start();
    assert!(matches!(result, Err(isle_dev::DevError::RootNotFound(_))));
}
