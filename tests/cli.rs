use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn blogsync_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("blogsync");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let notes_dir = root.join("notes");
    fs::create_dir_all(&notes_dir).unwrap();
    fs::write(
        notes_dir.join("git-workflow.md"),
        "---\ntitle: Git Workflow Guide\ndate: 2024-01-22\ntags: [git, version control]\ncategory: Development\n---\nA practical guide to branching.\n\nRebase early, merge often.\n",
    )
    .unwrap();
    fs::write(
        notes_dir.join("sourdough.md"),
        "---\ntitle: \"Sourdough Basics\"\ndate: 2023-11-05\ntags: baking, bread\ncategory: Kitchen\n---\nFlour, water, salt and patience.\n",
    )
    .unwrap();
    fs::write(notes_dir.join("ignored.txt"), "not markdown").unwrap();

    let closed_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let config_content = format!(
        r#"[github]
owner = "acme"
repo = "blog"
token_env = "BLOGSYNC_TEST_TOKEN"
api_url = "http://127.0.0.1:{}"
timeout_secs = 2

[posts]
dir = "{}/posts"
remote_dir = "posts"

[server]
bind = "127.0.0.1:0"
"#,
        closed_port,
        root.display()
    );

    let config_path = config_dir.join("blogsync.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_blogsync(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = blogsync_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("BLOGSYNC_TEST_TOKEN", "test-token")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run blogsync binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_import_writes_posts() {
    let (tmp, config_path) = setup_test_env();
    let notes = tmp.path().join("notes");

    let (stdout, stderr, success) =
        run_blogsync(&config_path, &["import", notes.to_str().unwrap()]);
    assert!(success, "import failed: {}", stderr);
    assert!(stdout.contains("2 posts imported."), "stdout: {}", stdout);

    let html = fs::read_to_string(tmp.path().join("posts/git-workflow.html")).unwrap();
    assert!(html.contains("<title>Git Workflow Guide</title>"));
    assert!(html.contains(r#"<meta name="tags" content="git, version control">"#));
    assert!(!tmp.path().join("posts/ignored.html").exists());
}

#[test]
fn test_posts_list_newest_first() {
    let (tmp, config_path) = setup_test_env();
    let notes = tmp.path().join("notes");
    run_blogsync(&config_path, &["import", notes.to_str().unwrap()]);

    let (stdout, stderr, success) = run_blogsync(&config_path, &["posts", "list"]);
    assert!(success, "list failed: {}", stderr);

    let git = stdout.find("Git Workflow Guide").unwrap();
    let bread = stdout.find("Sourdough Basics").unwrap();
    assert!(git < bread, "newest post should come first:\n{}", stdout);
    assert!(stdout.contains("/posts/git-workflow.html"));
}

#[test]
fn test_posts_search_by_tag() {
    let (tmp, config_path) = setup_test_env();
    let notes = tmp.path().join("notes");
    run_blogsync(&config_path, &["import", notes.to_str().unwrap()]);

    let (stdout, _, success) = run_blogsync(&config_path, &["posts", "search", "BREAD"]);
    assert!(success);
    assert!(stdout.contains("Sourdough Basics"));
    assert!(!stdout.contains("Git Workflow Guide"));

    let (stdout, _, success) = run_blogsync(&config_path, &["posts", "search", "kubernetes"]);
    assert!(success);
    assert!(stdout.contains("No posts."));
}

#[test]
fn test_new_renders_post_from_body_file() {
    let (tmp, config_path) = setup_test_env();
    let body = tmp.path().join("body.html");
    fs::write(&body, "<p>Hello from the command line.</p>").unwrap();

    let (stdout, stderr, success) = run_blogsync(
        &config_path,
        &[
            "new",
            "Hello, World!",
            "--body",
            body.to_str().unwrap(),
            "--tags",
            "intro, meta",
            "--date",
            "2024-06-01",
        ],
    );
    assert!(success, "new failed: {}", stderr);
    assert!(stdout.contains("hello-world.html"));

    let html = fs::read_to_string(tmp.path().join("posts/hello-world.html")).unwrap();
    assert!(html.contains(r#"<meta name="date" content="2024-06-01">"#));
    assert!(html.contains(r#"<meta name="category" content="Uncategorized">"#));
    assert!(html.contains("<p>Hello from the command line.</p>"));
}

#[test]
fn test_remote_branch_falls_back_when_api_unreachable() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_blogsync(&config_path, &["remote", "branch"]);
    assert!(success, "remote branch failed: {}", stderr);
    assert!(stdout.starts_with("main (fallback:"), "stdout: {}", stdout);
}

#[test]
fn test_publish_requires_github_section() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("blogsync.toml");
    fs::write(&config_path, "[posts]\ndir = \"posts\"\n").unwrap();
    let file = tmp.path().join("a.html");
    fs::write(&file, "<p>a</p>").unwrap();

    let (_, stderr, success) = run_blogsync(&config_path, &["publish", file.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("[github] section not configured"), "stderr: {}", stderr);
}
