//! HTTP listener service for the lifecycle manager.
//!
//! [`HttpService`] owns one TCP listener and an axum [`Router`](axum::Router). It
//! binds in `init`, serves in `run`, and hands its shutdown to a
//! [`lifecycle::Escalation`]: new connections stop being accepted as soon as the
//! stopping token fires, in-flight requests are drained, and whatever is still
//! running at the policy deadline is aborted.
//!
//! # Examples
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use http_server::HttpService;
//! use lifecycle::{CancellationToken, Manager};
//!
//! # async fn example() {
//! let router = Router::new().route("/", get(|| async { "hello" }));
//!
//! let mut manager = Manager::builder("example").build();
//! manager.register("http", HttpService::new("0.0.0.0:8080", router));
//! let summary = manager.run(CancellationToken::new()).await;
//! # drop(summary);
//! # }
//! ```

pub mod service;

pub use service::{HttpService, READINESS_PATH};
