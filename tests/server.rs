//! Integration tests for the local post server.
//!
//! Each test starts `run_server` on a free port over a temporary posts
//! directory and drives it with `reqwest`.

use blog_sync::config::Config;
use blog_sync::models::Post;
use blog_sync::render::render_post;
use blog_sync::server::run_server;
use serde_json::{json, Value};
use tempfile::TempDir;

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

fn post(title: &str, date: &str, tags: &[&str], category: &str, body: &str) -> String {
    render_post(&Post {
        title: title.to_string(),
        author: Some("Test Author".to_string()),
        date: date.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        category: category.to_string(),
        body: body.to_string(),
        excerpt: None,
    })
}

struct TestServer {
    base: String,
    tmp: TempDir,
    posts: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        Self::start_in("posts").await
    }

    async fn start_in(posts: &str) -> Self {
        let tmp = TempDir::new().unwrap();
        let port = find_free_port();

        let mut cfg = Config::default();
        cfg.posts.dir = tmp.path().join(posts);
        cfg.server.bind = format!("127.0.0.1:{}", port);
        let static_dir = tmp.path().join("public");
        std::fs::create_dir_all(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), "<h1>Editor</h1>").unwrap();
        cfg.server.static_dir = Some(static_dir);

        let handle = tokio::spawn(async move {
            run_server(&cfg).await.ok();
        });
        wait_for_server(port).await;

        Self {
            base: format!("http://127.0.0.1:{}", port),
            tmp,
            posts: posts.to_string(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn posts_dir(&self) -> std::path::PathBuf {
        self.tmp.path().join(&self.posts)
    }

    async fn save(&self, filename: &str, content: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(self.url("/api/save-post"))
            .json(&json!({ "filename": filename, "content": content }))
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn test_health_and_empty_listing() {
    let server = TestServer::start().await;

    let body: Value = reqwest::get(server.url("/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    let posts: Vec<Value> = reqwest::get(server.url("/api/posts"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn test_save_then_list_newest_first() {
    let server = TestServer::start().await;

    let older = post("Older Post", "2023-01-10", &["rust"], "Tech", "<p>Old words.</p>");
    let newer = post("Newer Post", "2024-03-02", &["life"], "Personal", "<p>New words.</p>");
    let resp = server.save("older-post.html", &older).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    server.save("newer-post.html", &newer).await;

    assert!(server.posts_dir().join("older-post.html").is_file());

    let posts: Vec<Value> = reqwest::get(server.url("/api/posts"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = posts.iter().map(|p| p["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Newer Post", "Older Post"]);
    assert_eq!(posts[0]["id"], "newer-post");
    assert_eq!(posts[0]["url"], "/posts/newer-post.html");
    assert_eq!(posts[0]["author"], "Test Author");
    assert_eq!(posts[0]["tags"], json!(["life"]));
    assert_eq!(posts[0]["excerpt"], "New words....");
}

#[tokio::test]
async fn test_search_matches_tags_and_builds_preview() {
    let server = TestServer::start().await;

    server
        .save(
            "async-rust.html",
            &post(
                "Async Adventures",
                "2024-02-01",
                &["rust", "tokio"],
                "Tech",
                "<p>Notes about executors and wakers.</p>",
            ),
        )
        .await;
    server
        .save(
            "garden.html",
            &post("Garden Diary", "2024-02-02", &["plants"], "Personal", "<p>Tomatoes.</p>"),
        )
        .await;

    let results: Vec<Value> = reqwest::get(server.url("/api/search?q=TOKIO"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["title"], "Async Adventures");
    // The tag itself is not in the body text, so the preview is the
    // beginning of the content.
    assert!(results[0]["excerpt"]
        .as_str()
        .unwrap()
        .starts_with("Async Adventures"));

    let by_category: Vec<Value> = reqwest::get(server.url("/api/search?q=personal"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0]["id"], "garden");

    let none: Vec<Value> = reqwest::get(server.url("/api/search?q=haskell"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_search_without_query_is_bad_request() {
    let server = TestServer::start().await;
    let resp = reqwest::get(server.url("/api/search")).await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_raw_post_and_delete() {
    let server = TestServer::start().await;
    let html = post("Short", "2024-01-01", &[], "Misc", "<p>Hi.</p>");
    server.save("short.html", &html).await;

    let resp = reqwest::get(server.url("/posts/short.html")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(resp.text().await.unwrap(), html);

    let client = reqwest::Client::new();
    let resp = client
        .delete(server.url("/api/posts/short.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(!server.posts_dir().join("short.html").exists());

    let resp = client
        .delete(server.url("/api/posts/short.html"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let resp = reqwest::get(server.url("/posts/short.html")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_save_rejects_path_traversal() {
    let server = TestServer::start().await;
    let resp = server.save("../escape.html", "<p>x</p>").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(!server.tmp.path().join("escape.html").exists());
}

#[tokio::test]
async fn test_static_ui_is_served() {
    let server = TestServer::start().await;
    let resp = reqwest::get(server.url("/index.html")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "<h1>Editor</h1>");
}

#[tokio::test]
async fn test_storage_failure_is_internal_error() {
    // The path text must not influence the status code.
    let server = TestServer::start_in("invalid-not found").await;
    let dir = server.posts_dir();
    std::fs::remove_dir_all(&dir).unwrap();
    std::fs::write(&dir, "a file where the posts directory should be").unwrap();

    let resp = server.save("fine.html", "<p>x</p>").await;
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Failed to create posts directory"));
}
