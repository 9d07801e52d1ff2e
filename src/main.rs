//! # blogsync CLI
//!
//! Publishes static blog posts to a GitHub repository and serves a local
//! index of them.
//!
//! ## Usage
//!
//! ```bash
//! blogsync --config ./config/blogsync.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `blogsync serve` | Start the local post server |
//! | `blogsync posts list` | List local posts, newest first |
//! | `blogsync posts search <term>` | Search local posts |
//! | `blogsync new <title>` | Render a new post into the posts directory |
//! | `blogsync import <dir>` | Convert Markdown files into posts |
//! | `blogsync publish <file>` | Create or update a post in the repository |
//! | `blogsync unpublish <path>` | Delete a post from the repository |
//! | `blogsync remote ls\|cat\|put\|rm\|branch` | Raw contents API operations |
//!
//! The GitHub credential is read from the environment variable named by
//! `[github].token_env` (default `GITHUB_TOKEN`). Log verbosity follows
//! `RUST_LOG`.

use anyhow::{Context, Result};
use blog_sync::config::{self, Config};
use blog_sync::github::{ContentStore, GithubClient};
use blog_sync::models::{BranchResolution, Post};
use blog_sync::posts::PostIndex;
use blog_sync::{import, publish, render, server};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// blogsync — publish static blog posts to GitHub and search them locally.
#[derive(Parser)]
#[command(
    name = "blogsync",
    about = "Publish static blog posts to a GitHub repository and search them locally",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Local commands fall back to defaults when the file does not exist;
    /// remote commands need its `[github]` section.
    #[arg(long, global = true, default_value = "./config/blogsync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the local post server.
    ///
    /// Binds to `[server].bind` and serves the post index API plus the
    /// optional static UI directory.
    Serve,

    /// Query the local post index.
    Posts {
        #[command(subcommand)]
        action: PostsAction,
    },

    /// Render a new post into the local posts directory.
    New {
        /// Post title; also determines the file name.
        title: String,
        /// File holding the HTML body. Reads stdin when omitted.
        #[arg(long)]
        body: Option<PathBuf>,
        #[arg(long)]
        author: Option<String>,
        /// Comma-separated tags.
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long, default_value = "Uncategorized")]
        category: String,
        /// Post date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        excerpt: Option<String>,
        /// Also publish the rendered file to the repository.
        #[arg(long)]
        publish: bool,
    },

    /// Convert a directory of Markdown files into posts.
    Import {
        /// Directory containing `*.md` files with front matter.
        src: PathBuf,
    },

    /// Create or update a local post file in the repository.
    Publish {
        /// Local HTML file.
        file: PathBuf,
        /// Commit message.
        #[arg(long, short)]
        message: Option<String>,
    },

    /// Delete a post from the repository.
    Unpublish {
        /// File name under `[posts].remote_dir`, or a full repository path.
        path: String,
        #[arg(long, short)]
        message: Option<String>,
    },

    /// Raw operations against the repository contents.
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },
}

#[derive(Subcommand)]
enum PostsAction {
    /// List posts, newest first.
    List,
    /// Search titles, tags and categories.
    Search { term: String },
}

#[derive(Subcommand)]
enum RemoteAction {
    /// List a directory.
    Ls {
        #[arg(default_value = "posts/")]
        path: String,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Print a file.
    Cat { path: String },
    /// Write a local file to a repository path.
    Put {
        path: String,
        /// Local file to upload.
        #[arg(long)]
        file: PathBuf,
        #[arg(long, short)]
        message: String,
        /// Current token of the file; omit to create.
        #[arg(long)]
        sha: Option<String>,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Delete a repository path.
    Rm {
        path: String,
        #[arg(long)]
        sha: String,
        #[arg(long, short)]
        message: String,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Show which branch operations target.
    Branch,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults when the file is absent; a present but invalid file is an error.
fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn client(cfg: &Config) -> Result<GithubClient> {
    GithubClient::from_config(cfg.github()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = match &cli.command {
        Commands::Serve | Commands::Posts { .. } | Commands::Import { .. } => {
            load_or_default(&cli.config)?
        }
        Commands::New { publish: false, .. } => load_or_default(&cli.config)?,
        _ => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Posts { action } => {
            let index = PostIndex::new(&cfg.posts.dir);
            let posts = match action {
                PostsAction::List => index.list()?,
                PostsAction::Search { term } => index.search(&term)?,
            };
            if posts.is_empty() {
                println!("No posts.");
            }
            for post in posts {
                println!(
                    "{:<12} {:<40} {}",
                    post.date.as_deref().unwrap_or("-"),
                    post.title,
                    post.url
                );
                if !post.excerpt.is_empty() {
                    println!("             {}", post.excerpt);
                }
            }
        }
        Commands::New {
            title,
            body,
            author,
            tags,
            category,
            date,
            excerpt,
            publish: also_publish,
        } => {
            let body = match body {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => std::io::read_to_string(std::io::stdin())?,
            };
            let post = Post {
                tags: tags
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
                date: date.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string()),
                title,
                author,
                category,
                body,
                excerpt,
            };
            let filename = format!("{}.html", render::slugify(&post.title)?);
            let written = PostIndex::new(&cfg.posts.dir).save(&filename, &render::render_post(&post))?;
            println!("wrote {}", written.display());

            if also_publish {
                let store = client(&cfg)?;
                let published =
                    publish::publish_file(&store, &written, &cfg.posts.remote_dir, None).await?;
                println!(
                    "{} {} ({})",
                    if published.created { "created" } else { "updated" },
                    published.path,
                    published.commit.commit.sha
                );
            }
        }
        Commands::Import { src } => {
            let today = chrono::Local::now().date_naive();
            let written = import::import_dir(&src, &cfg.posts.dir, today)?;
            for path in &written {
                println!("imported {}", path.display());
            }
            println!("{} posts imported.", written.len());
        }
        Commands::Publish { file, message } => {
            let store = client(&cfg)?;
            let published =
                publish::publish_file(&store, &file, &cfg.posts.remote_dir, message.as_deref())
                    .await?;
            println!(
                "{} {} ({})",
                if published.created { "created" } else { "updated" },
                published.path,
                published.commit.commit.sha
            );
        }
        Commands::Unpublish { path, message } => {
            let store = client(&cfg)?;
            let path = if path.contains('/') {
                path
            } else {
                publish::remote_path(&cfg.posts.remote_dir, &path)
            };
            let commit = publish::unpublish(&store, &path, message.as_deref()).await?;
            println!("deleted {} ({})", path, commit.commit.sha);
        }
        Commands::Remote { action } => {
            let store = client(&cfg)?;
            run_remote(&store, action).await?;
        }
    }

    Ok(())
}

async fn run_remote(store: &GithubClient, action: RemoteAction) -> Result<()> {
    match action {
        RemoteAction::Ls { path, branch } => {
            let entries = store.list(&path, branch.as_deref()).await?;
            for entry in entries {
                println!("{:<5} {:<40} {}", entry.kind, entry.path, entry.sha);
            }
        }
        RemoteAction::Cat { path } => {
            let (text, handle) = store.read_text(&path).await?;
            eprintln!("sha: {}", handle.sha);
            print!("{}", text);
        }
        RemoteAction::Put {
            path,
            file,
            message,
            sha,
            branch,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let result = store
                .create_or_update(&path, &content, &message, sha.as_deref(), branch.as_deref())
                .await?;
            let new_sha = result.content.map(|c| c.sha).unwrap_or_default();
            println!("committed {} ({}) sha: {}", path, result.commit.sha, new_sha);
        }
        RemoteAction::Rm {
            path,
            sha,
            message,
            branch,
        } => {
            let result = store
                .delete(&path, &sha, &message, branch.as_deref())
                .await?;
            println!("deleted {} ({})", path, result.commit.sha);
        }
        RemoteAction::Branch => match store.resolve_branch().await {
            BranchResolution::Explicit(name) => println!("{} (configured)", name),
            BranchResolution::Remote(name) => println!("{} (repository default)", name),
            BranchResolution::Fallback { name, reason } => {
                println!("{} (fallback: {})", name, reason)
            }
        },
    }
    Ok(())
}
