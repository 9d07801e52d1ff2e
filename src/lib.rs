//! # blog-sync
//!
//! A minimal content-management layer for static blog posts.
//!
//! Posts are rendered to self-describing HTML files, committed to a GitHub
//! repository through the contents API, and indexed from a local directory
//! for listing and search.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐   ┌─────────────────┐
//! │  CLI / UI    │──▶│  GithubClient  │──▶│ GitHub contents │
//! │ (blogsync)   │   │ (ContentStore) │   │       API       │
//! └──────┬───────┘   └────────────────┘   └─────────────────┘
//!        │
//!        ▼
//! ┌──────────────┐   ┌────────────────┐
//! │ HTTP server  │──▶│   PostIndex    │──▶ posts/*.html
//! └──────────────┘   └────────────────┘
//! ```
//!
//! The two paths are independent: the client never reads the local index
//! and the index never talks to GitHub.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Content store error taxonomy |
//! | [`github`] | GitHub contents API client |
//! | [`posts`] | Local post index and search |
//! | [`render`] | Post → HTML rendering, slugs |
//! | [`import`] | Markdown front-matter import |
//! | [`publish`] | Create-or-update publishing workflow |
//! | [`server`] | Local HTTP server |

pub mod config;
pub mod error;
pub mod github;
pub mod import;
pub mod models;
pub mod posts;
pub mod publish;
pub mod render;
pub mod server;
