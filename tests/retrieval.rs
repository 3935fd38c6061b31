//! Retrieval behavior over a populated store: hybrid ranking, dedup,
//! filters, and result bounds.

mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::{StubEmbedder, TickClock};
use searchgrep::hash::hash_content;
use searchgrep::search::{self, SearchOptions};
use searchgrep::store::VectorStore;

struct Indexed {
    _data: TempDir,
    store: Arc<VectorStore>,
    embedder: Arc<StubEmbedder>,
}

async fn populate(files: &[(&str, &str)]) -> Indexed {
    let data = TempDir::new().unwrap();
    let embedder = Arc::new(StubEmbedder::new());
    let store = Arc::new(
        VectorStore::open(
            data.path(),
            "default",
            embedder.clone(),
            Arc::new(TickClock::starting_at(1)),
        )
        .unwrap(),
    );
    for (path, content) in files {
        let hash = hash_content(content);
        store
            .upsert_file(path, content, &hash, content.len() as u64, 1)
            .await
            .unwrap();
    }
    Indexed {
        _data: data,
        store,
        embedder,
    }
}

#[tokio::test]
async fn query_terms_rank_the_matching_file_first() {
    let fx = populate(&[
        (
            "src/auth.rs",
            "// verify a password against the stored password hash\nfn check(user: &str, password: &str) -> bool {\n    verify(password)\n}\n",
        ),
        (
            "src/render.rs",
            "fn draw_triangles(mesh: &Mesh) {\n    upload_vertex_buffer(mesh)\n}\n",
        ),
        (
            "src/net.rs",
            "fn open_socket(addr: &str) -> Socket {\n    bind_and_listen(addr)\n}\n",
        ),
    ])
    .await;

    let results = search::search(
        &fx.store,
        fx.embedder.as_ref(),
        "verify password",
        &SearchOptions::default(),
    )
    .await
    .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].path, "src/auth.rs");
    assert!(results[0].line_start >= 1);
    assert!(results[0].line_end >= results[0].line_start);
}

#[tokio::test]
async fn one_result_per_file_even_with_many_matching_chunks() {
    // Both functions mention "parser", producing two strong chunks in one file.
    let fx = populate(&[(
        "parser.rs",
        "fn parse_header(parser: &mut Parser) {\n    parser.advance()\n}\n\nfn parse_body(parser: &mut Parser) {\n    parser.consume_all()\n}\n",
    )])
    .await;

    let results = search::search(
        &fx.store,
        fx.embedder.as_ref(),
        "parser",
        &SearchOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1, "per-path dedup keeps one best chunk");
}

#[tokio::test]
async fn top_k_bounds_results_with_unique_paths() {
    let files: Vec<(String, String)> = (0..12)
        .map(|i| {
            (
                format!("mod{}.rs", i),
                format!(
                    "// the shared concern lives here\nfn handler_{}() {{\n    handle(concern)\n}}\n",
                    i
                ),
            )
        })
        .collect();
    let refs: Vec<(&str, &str)> = files
        .iter()
        .map(|(p, c)| (p.as_str(), c.as_str()))
        .collect();
    let fx = populate(&refs).await;

    let options = SearchOptions {
        top_k: 4,
        ..Default::default()
    };
    let results = search::search(&fx.store, fx.embedder.as_ref(), "shared concern", &options)
        .await
        .unwrap();

    assert!(results.len() <= 4);
    let mut paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), results.len());
}

#[tokio::test]
async fn file_type_filter_restricts_results() {
    let fx = populate(&[
        ("config.rs", "fn load_settings() { read_settings_yaml() }\n"),
        ("config.py", "def load_settings():\n    return read_settings_yaml()\n"),
    ])
    .await;

    let options = SearchOptions {
        file_types: vec!["py".to_string()],
        ..Default::default()
    };
    let results = search::search(&fx.store, fx.embedder.as_ref(), "load settings", &options)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.path.ends_with(".py")));
}

#[tokio::test]
async fn hybrid_off_still_ranks_by_dense_similarity() {
    let fx = populate(&[
        (
            "close.rs",
            "fn tokenize(query: &str) -> Tokens {\n    let query = normalize(query);\n    split(query)\n}\n",
        ),
        ("far.rs", "fn paint(canvas: &mut Canvas) {\n    fill(canvas)\n}\n"),
    ])
    .await;

    let options = SearchOptions {
        hybrid: false,
        ..Default::default()
    };
    let results = search::search(&fx.store, fx.embedder.as_ref(), "tokenize query", &options)
        .await
        .unwrap();

    assert!(!results.is_empty());
    assert_eq!(results[0].path, "close.rs");
}

#[tokio::test]
async fn empty_store_returns_no_results() {
    let fx = populate(&[]).await;
    let results = search::search(
        &fx.store,
        fx.embedder.as_ref(),
        "anything at all",
        &SearchOptions::default(),
    )
    .await
    .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn punctuation_only_query_degrades_to_dense_without_error() {
    let fx = populate(&[("a.rs", "fn alpha() { beta() }\n")]).await;
    let results = search::search(
        &fx.store,
        fx.embedder.as_ref(),
        "?? !!",
        &SearchOptions::default(),
    )
    .await
    .unwrap();
    // No tokens for BM25; dense ranking alone still answers.
    assert_eq!(results.len(), 1);
    assert!(results[0].score.is_finite());
}

#[tokio::test]
async fn include_content_attaches_full_document() {
    let content = "fn whole_file() {\n    body()\n}\n";
    let fx = populate(&[("whole.rs", content)]).await;

    let options = SearchOptions {
        include_content: true,
        ..Default::default()
    };
    let results = search::search(&fx.store, fx.embedder.as_ref(), "whole file body", &options)
        .await
        .unwrap();

    assert_eq!(results[0].content.as_deref(), Some(content));
}
