// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Fluent, SQL-capable queries and operations over Kubernetes resources.
//!
//! kubeq addresses arbitrary cluster resources, built-in and custom,
//! through one chainable API, without hand-written per-type calls:
//!
//! ```no_run
//! use k8s_openapi::api::core::v1::Pod;
//! use kubeq::{Cluster, ClusterOptions};
//!
//! # async fn run() -> kubeq::Result<()> {
//! let cluster = Cluster::connect(ClusterOptions::default()).await?;
//!
//! // typed fluent chain
//! let pods: Vec<Pod> = cluster
//!     .query()
//!     .resource::<Pod>()
//!     .await
//!     .namespace("default")
//!     .where_clause("app = ? AND status.phase = ?", &["nginx", "Running"])
//!     .list()
//!     .await?;
//!
//! // or the SQL path over the same statement machinery
//! let running: Vec<Pod> = cluster
//!     .sql("SELECT * FROM pods WHERE status.phase = 'Running' LIMIT 10", &[])
//!     .await
//!     .list()
//!     .await?;
//!
//! // ownership-graph traversal
//! let latest = cluster
//!     .deployment("default", "web")
//!     .managed_latest_replica_set()
//!     .await?;
//! # let _ = (pods, running, latest);
//! # Ok(())
//! # }
//! ```
//!
//! Each chain owns its statement: setters accumulate intent, a terminal verb
//! executes it exactly once against an abstract resource backend. The backend
//! is a trait: [`backend::KubeBackend`] talks to a real API server,
//! [`backend::MockBackend`] serves tests from memory.

pub mod backend;
mod callbacks;
mod cluster;
pub mod config;
mod error;
pub mod filter;
mod managed;
mod query;
mod resolve;
mod sql;
mod statement;

pub use backend::{ByteStream, CrdSummary, ListQuery, LogStream, PatchKind};
pub use cluster::Cluster;
pub use config::ClusterOptions;
pub use error::{Error, Result};
pub use managed::{Controller, ControllerKind};
pub use query::Query;
pub use resolve::{ResourceIdentity, Resolver};
pub use statement::Statement;

// The toolkit types callers need alongside the fluent surface
pub use kube::api::{DynamicObject, LogParams};
pub use tokio_util::sync::CancellationToken;
