//! # Vault Migrate
//!
//! Converts a Markdown vault (YAML front matter, `![[wiki embeds]]`, local
//! attachments) into pages of a Notion database.
//!
//! Every referenced attachment is hashed, uploaded once through the file
//! upload API (in parts above 20 MiB), and linked from the converted blocks.
//! Front matter becomes typed database properties.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌───────────┐
//! │   scan   │──▶│  assets  │──▶│  upload   │──▶│  writer   │
//! │ vault +  │   │ resolve +│   │ dedup +   │   │ blocks +  │
//! │ metadata │   │  hash    │   │ workers   │   │ properties│
//! └──────────┘   └──────────┘   └─────┬─────┘   └─────┬─────┘
//!                                     │               │
//!                                     ▼               ▼
//!                               ┌─────────────────────────┐
//!                               │  RemoteStore (client)   │
//!                               └─────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vmig init vmig.toml            # write a sample config
//! vmig check                     # validate config, reach the database
//! vmig migrate --dry-run         # convert without sending anything
//! vmig migrate --output report.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors for uploads, pages and transport |
//! | [`frontmatter`] | YAML front matter splitting and values |
//! | [`references`] | Embedded file reference extraction |
//! | [`resolve`] | Reference to filesystem path resolution |
//! | [`scan`] | Vault walking and document parsing |
//! | [`assets`] | Asset discovery, hashing and lookup |
//! | [`client`] | Remote store trait and Notion HTTP client |
//! | [`ratelimit`] | Spacing between API calls |
//! | [`upload`] | Deduplicating single/multi-part uploads |
//! | [`inline`] | Inline Markdown tokenization |
//! | [`blocks`] | Markdown body to block tree |
//! | [`render`] | Block tree to Notion JSON |
//! | [`properties`] | Front matter to database properties |
//! | [`writer`] | Page creation with chunked block appends |
//! | [`migrate`] | Phase orchestration |
//! | [`report`] | Migration report |
//! | [`progress`] | Progress events on stderr |
//! | [`logging`] | Tracing setup |

pub mod assets;
pub mod blocks;
pub mod client;
pub mod config;
pub mod error;
pub mod frontmatter;
pub mod inline;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod properties;
pub mod ratelimit;
pub mod references;
pub mod render;
pub mod report;
pub mod resolve;
pub mod scan;
pub mod upload;
pub mod writer;
