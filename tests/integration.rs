//! End-to-end tests over real temp directories: sync diffing, idempotence,
//! store lifecycle, and the answer path — all against the stub embedder.

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::{ScriptedChat, StubEmbedder, TickClock};
use searchgrep::config::Config;
use searchgrep::runtime::Clock;
use searchgrep::store::VectorStore;
use searchgrep::sync::{sync, SyncOptions};
use searchgrep::walker::FileWalker;
use searchgrep::{answer, search};

struct Fixture {
    tree: TempDir,
    _data: TempDir,
    store: Arc<VectorStore>,
    embedder: Arc<StubEmbedder>,
    clock: Arc<TickClock>,
    config: Config,
}

impl Fixture {
    fn new() -> Self {
        let tree = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let embedder = Arc::new(StubEmbedder::new());
        let clock = Arc::new(TickClock::starting_at(1_000));
        let store = Arc::new(
            VectorStore::open(data.path(), "default", embedder.clone(), clock.clone()).unwrap(),
        );
        Self {
            tree,
            _data: data,
            store,
            embedder,
            clock,
            config: Config::default(),
        }
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.tree.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn remove(&self, rel: &str) {
        std::fs::remove_file(self.tree.path().join(rel)).unwrap();
    }

    fn walker(&self) -> FileWalker {
        FileWalker::new(self.tree.path(), &self.config)
    }

    async fn sync(&self) -> searchgrep::sync::SyncReport {
        sync(
            self.store.clone(),
            &self.walker(),
            self.clock.as_ref() as &dyn Clock,
            &SyncOptions::default(),
        )
        .await
        .unwrap()
    }
}

#[tokio::test]
async fn first_sync_uploads_everything() {
    let fx = Fixture::new();
    fx.write("src/auth.rs", "fn login() {\n    check_password()\n}\n");
    fx.write("src/db.rs", "fn connect() {\n    open_pool()\n}\n");
    fx.write("README.md", "How authentication works in this service.\n");

    let report = fx.sync().await;
    assert_eq!(report.uploaded, 3);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.skipped, 0);
    assert!(report.errors.is_empty());
    assert_eq!(fx.store.info().await.file_count, 3);
}

#[tokio::test]
async fn unchanged_tree_resyncs_to_all_skips() {
    let fx = Fixture::new();
    fx.write("a.rs", "fn a() {}\n");
    fx.write("b.rs", "fn b() {}\n");

    fx.sync().await;
    let calls_after_first = fx.embedder.embed_calls();

    let report = fx.sync().await;
    assert_eq!(report.uploaded, 0);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.skipped, 2);
    // Skipped files must not be re-embedded.
    assert_eq!(fx.embedder.embed_calls(), calls_after_first);
}

#[tokio::test]
async fn three_way_diff_uploads_deletes_and_skips() {
    let fx = Fixture::new();
    // Store state: x (current) and z (stale).
    fx.write("x.rs", "fn x() {}\n");
    fx.write("z.rs", "fn z() {}\n");
    fx.sync().await;

    // Local state: x unchanged, y new, z gone.
    fx.remove("z.rs");
    fx.write("y.rs", "fn y() {}\n");

    let report = fx.sync().await;
    assert_eq!(report.uploaded, 1, "y is new");
    assert_eq!(report.deleted, 1, "z vanished");
    assert_eq!(report.skipped, 1, "x unchanged");

    let paths: Vec<String> = fx
        .store
        .list_files()
        .await
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert!(paths.contains(&"x.rs".to_string()));
    assert!(paths.contains(&"y.rs".to_string()));
    assert!(!paths.contains(&"z.rs".to_string()));
}

#[tokio::test]
async fn delete_and_identical_recreate_upserts_once() {
    let fx = Fixture::new();
    let content = "fn stable() {\n    42\n}\n";
    fx.write("stable.rs", content);
    fx.sync().await;

    fx.remove("stable.rs");
    let report = fx.sync().await;
    assert_eq!(report.deleted, 1);

    fx.write("stable.rs", content);
    let report = fx.sync().await;
    // The re-add is the only upsert across both syncs.
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn modified_file_is_reuploaded() {
    let fx = Fixture::new();
    fx.write("evolving.rs", "fn v1() {}\n");
    fx.sync().await;

    fx.write("evolving.rs", "fn v2() { improved() }\n");
    let report = fx.sync().await;
    assert_eq!(report.uploaded, 1);
    assert_eq!(report.skipped, 0);

    let files = fx.store.list_files().await;
    assert_eq!(files.len(), 1, "replacement keeps paths unique");
}

#[tokio::test]
async fn dry_run_reports_counts_without_mutating() {
    let fx = Fixture::new();
    fx.write("planned.rs", "fn planned() {}\n");

    let report = sync(
        fx.store.clone(),
        &fx.walker(),
        fx.clock.as_ref() as &dyn Clock,
        &SyncOptions {
            dry_run: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(report.uploaded, 1);
    assert_eq!(fx.store.info().await.file_count, 0, "nothing was written");
    assert_eq!(fx.embedder.embed_calls(), 0);
}

#[tokio::test]
async fn clear_empties_the_store() {
    let fx = Fixture::new();
    fx.write("a.rs", "fn a() {}\n");
    fx.sync().await;
    assert_eq!(fx.store.info().await.file_count, 1);

    fx.store.clear().await.unwrap();
    assert_eq!(fx.store.info().await.file_count, 0);
    assert!(!fx.store.file_path().exists());
}

#[tokio::test]
async fn empty_file_is_indexed_but_never_retrieved() {
    let fx = Fixture::new();
    fx.write("empty.rs", "");
    fx.write("real.rs", "fn authenticate() { validate_token() }\n");
    fx.sync().await;

    let files = fx.store.list_files().await;
    assert_eq!(files.len(), 2);
    let empty = files.iter().find(|f| f.path == "empty.rs").unwrap();
    assert_eq!(empty.chunk_count, 0);

    let results = search::search(
        &fx.store,
        fx.embedder.as_ref(),
        "authenticate token",
        &Default::default(),
    )
    .await
    .unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.path != "empty.rs"));
}

#[tokio::test]
async fn updated_timestamp_is_monotonic_across_mutations() {
    let fx = Fixture::new();
    fx.write("a.rs", "fn a() {}\n");
    fx.sync().await;
    let first = fx.store.info().await.last_updated;

    fx.write("a.rs", "fn a() { changed() }\n");
    fx.sync().await;
    let second = fx.store.info().await.last_updated;
    assert!(second >= first);
}

#[tokio::test]
async fn ask_without_chat_provider_is_a_configuration_error() {
    let fx = Fixture::new();
    fx.write("a.rs", "fn a() {}\n");
    fx.sync().await;

    let result = answer::ask(&fx.store, fx.embedder.as_ref(), None, "what is a?", 5).await;
    assert!(matches!(
        result,
        Err(searchgrep::error::EmbeddingError::NotConfigured(_))
    ));
}

#[tokio::test]
async fn ask_builds_context_from_search_hits() {
    let fx = Fixture::new();
    fx.write(
        "src/auth.rs",
        "fn login(user: &str, password: &str) -> bool {\n    verify_password(user, password)\n}\n",
    );
    fx.write("src/render.rs", "fn draw_frame() {\n    blit()\n}\n");
    fx.sync().await;

    let chat = ScriptedChat::replying("Authentication happens in src/auth.rs.");
    let reply = answer::ask(
        &fx.store,
        fx.embedder.as_ref(),
        Some(&chat),
        "where is the login password verified?",
        3,
    )
    .await
    .unwrap();

    assert_eq!(reply, "Authentication happens in src/auth.rs.");
    let prompts = chat.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    let (system, user) = &prompts[0];
    assert!(system.contains("concise code assistant"));
    assert!(user.contains("File: src/auth.rs"));
    assert!(user.contains("where is the login password verified?"));
}

#[tokio::test]
async fn store_reload_preserves_index_across_processes() {
    let tree = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    std::fs::write(tree.path().join("kept.rs"), "fn kept() {}\n").unwrap();

    let config = Config::default();
    {
        let embedder = Arc::new(StubEmbedder::new());
        let clock = Arc::new(TickClock::starting_at(10));
        let store = Arc::new(
            VectorStore::open(data.path(), "default", embedder.clone(), clock.clone()).unwrap(),
        );
        let walker = FileWalker::new(tree.path(), &config);
        sync(
            store,
            &walker,
            clock.as_ref() as &dyn Clock,
            &SyncOptions::default(),
        )
        .await
        .unwrap();
    }

    // A fresh open sees the persisted index and skips everything.
    let embedder = Arc::new(StubEmbedder::new());
    let clock = Arc::new(TickClock::starting_at(100));
    let store = Arc::new(
        VectorStore::open(data.path(), "default", embedder.clone(), clock.clone()).unwrap(),
    );
    let walker = FileWalker::new(tree.path(), &config);
    let report = sync(
        store.clone(),
        &walker,
        clock.as_ref() as &dyn Clock,
        &SyncOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.uploaded, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(embedder.embed_calls(), 0);
}

#[tokio::test]
async fn ignored_files_never_reach_the_store() {
    let fx = Fixture::new();
    fx.write("app.rs", "fn app() {}\n");
    fx.write("node_modules/dep/index.js", "module.exports = 1;\n");
    fx.write(".secret", "token\n");
    fx.write("Cargo.lock", "[[package]]\n");
    fx.write(".searchgrepignore", "generated/\n");
    fx.write("generated/out.rs", "pub struct Out;\n");

    fx.sync().await;

    let paths: Vec<String> = fx
        .store
        .list_files()
        .await
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(paths, vec!["app.rs".to_string()]);
}
