// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Connection options for a cluster handle.
//!
//! Options are read once at [`crate::Cluster::connect`] time; the resulting
//! client is immutable for the lifetime of the handle.

use std::time::Duration;

/// Namespace used when a namespaced operation does not specify one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Timeout for connecting to the K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Options controlling how a [`crate::Cluster`] connects to the API server
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    /// Kubeconfig context to use; `None` means the kubeconfig's current context
    pub context: Option<String>,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Response read timeout
    pub read_timeout: Duration,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            context: None,
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: READ_TIMEOUT,
        }
    }
}

impl ClusterOptions {
    /// Select a specific kubeconfig context
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}
