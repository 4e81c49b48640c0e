// Lumen - server-rendering core
// Nested-layout routing, concurrent loaders, resumable streaming and server actions

use std::time::Duration;

pub mod action;
pub mod classify;
pub mod client;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod headers;
pub mod loader;
pub mod manifest;
pub mod render;
pub mod response;
pub mod server;
pub mod value;

/// Redirect hops a single client navigation may follow.
pub const MAX_REDIRECTS: usize = 10;

/// Default wall-clock budget of one streamed document.
pub const RENDER_TIMEOUT: Duration = Duration::from_secs(10);

// Re-export core types and response helpers
pub use context::{AppContext, ErrorInfo, LoaderData};
pub use error::{Error, HttpError, Result};
pub use loader::{LoaderArgs, RequestInfo};
pub use manifest::{install, installed, ErrorCatcher, Layout, Manifest, Route, ServerAction};
pub use response::{json, not_found, redirect, redirect_with, TypedResponse};
pub use value::{Deferred, Value};

// Re-export framework types
pub use client::{HttpTransport, MemoryHistory, NavigateOptions, Navigator};
pub use codec::{Codec, NdjsonCodec};
pub use config::Config;
pub use render::{MaudEngine, RenderEngine, ViewProps};
pub use server::App;

// Re-export commonly used types from dependencies
pub use axum;
pub use axum::http::StatusCode;
pub use lumen_router::{Params, Router};
pub use maud::{html, Markup};
