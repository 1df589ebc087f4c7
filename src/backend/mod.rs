// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Abstract resource-API backend.
//!
//! The engine never talks to a cluster directly; every verb is delegated to
//! a [`ResourceBackend`] implementation. [`KubeBackend`] is the real one over
//! a kube client; [`MockBackend`] keeps everything in memory for tests.

mod kube_impl;
mod mock;

pub use kube_impl::KubeBackend;
pub use mock::{MockBackend, OperationCounts};

use async_trait::async_trait;
use kube::api::{DynamicObject, LogParams};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncRead};

use crate::error::Result;
use crate::resolve::ResourceIdentity;

/// Live output stream from an exec call; the caller owns its lifecycle
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Live log stream; the caller owns its lifecycle
pub type LogStream = Box<dyn AsyncBufRead + Send + Unpin>;

/// Patch flavor accepted by the patch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// RFC 7386 merge patch
    Merge,
    /// Kubernetes strategic merge patch
    Strategic,
    /// RFC 6902 JSON patch
    Json,
}

/// Parameters pushed down to the list request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Label selector string (e.g. "app=nginx,version=v1")
    pub label_selector: Option<String>,
    /// Field selector string (e.g. "status.phase=Running")
    pub field_selector: Option<String>,
}

/// Discovery metadata of one custom resource definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrdSummary {
    pub group: String,
    /// Storage version (or first served version when none is marked storage)
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub singular: String,
    pub namespaced: bool,
}

/// One cluster's resource API, namespaced and cluster-scoped.
///
/// `ns` is `None` for cluster-scoped access and for all-namespaces lists.
/// Implementations must pass errors through verbatim; retries and masking are
/// the caller's decision, not the backend's.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    async fn create(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        obj: DynamicObject,
    ) -> Result<DynamicObject>;

    async fn get(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject>;

    async fn list(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        query: &ListQuery,
    ) -> Result<Vec<DynamicObject>>;

    async fn update(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        obj: DynamicObject,
    ) -> Result<DynamicObject>;

    async fn patch(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
        kind: PatchKind,
        body: Value,
    ) -> Result<DynamicObject>;

    async fn delete(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
    ) -> Result<()>;

    /// Stream command execution output from a container
    async fn exec(
        &self,
        ns: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<ByteStream>;

    /// Open a log stream for a single container inside a pod
    async fn open_logs(&self, ns: &str, pod: &str, params: &LogParams) -> Result<LogStream>;

    /// Built-in API resource kinds; answered from static metadata, no I/O
    fn builtin_resources(&self) -> Vec<ResourceIdentity>;

    /// The cluster's custom resource definitions
    async fn custom_resource_definitions(&self) -> Result<Vec<CrdSummary>>;
}
