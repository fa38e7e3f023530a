//! # MedAssist
//!
//! Query client and offline asset cache for the MedAssist health assistant.
//!
//! Two independent halves:
//!
//! - the **dispatcher** sends a `{type, message}` query to the backend's
//!   `/ask` endpoint and renders the Markdown answer into a display region;
//! - the **cache worker** pre-caches the web UI's static assets into a
//!   versioned bucket and serves requests cache-first, falling back to the
//!   network.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  POST /ask   ┌──────────┐
//! │ Dispatcher │────────────▶│ backend  │
//! └─────┬──────┘              └──────────┘
//!       ▼
//! ┌────────────┐
//! │  Display   │  Pending(id) → Success/Failure(id)
//! └────────────┘
//!
//! ┌────────────┐  miss   ┌──────────┐
//! │CacheWorker │───────▶│  origin  │
//! └─────┬──────┘         └──────────┘
//!       ▼ hit
//! ┌────────────┐
//! │  SQLite    │  medassist-v1: /, /index.html, ...
//! └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! medassist init                                  # create cache database
//! medassist ask --type symptom "sore throat"      # one query, rendered HTML
//! medassist cache install                         # pre-cache assets
//! medassist serve                                 # cache-first asset server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Query, response, and cached-response types |
//! | [`render`] | Markdown rendering and display strings |
//! | [`display`] | Display region state with request ids |
//! | [`dispatcher`] | `/ask` client |
//! | [`fetcher`] | Network fetch seam for the cache worker |
//! | [`cache`] | Named cache buckets in SQLite |
//! | [`worker`] | Install / activate / fetch handlers |
//! | [`server`] | Cache-first HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache;
pub mod cache_cmd;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod display;
pub mod fetcher;
pub mod migrate;
pub mod models;
pub mod render;
pub mod server;
pub mod worker;
