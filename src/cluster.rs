// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cluster handle: the entry point for fluent chains.
//!
//! A [`Cluster`] bundles a resource backend with the resolver cache that
//! lives as long as the connection. Handles clone cheaply and can be shared
//! across tasks; each chain started from one gets its own statement.

use std::sync::Arc;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::backend::{KubeBackend, ResourceBackend};
use crate::config::ClusterOptions;
use crate::error::{Error, Result};
use crate::managed::{Controller, ControllerKind};
use crate::query::Query;
use crate::resolve::Resolver;

struct ClusterInner {
    backend: Arc<dyn ResourceBackend>,
    resolver: Resolver,
}

/// A connected cluster
#[derive(Clone)]
pub struct Cluster {
    inner: Arc<ClusterInner>,
}

impl Cluster {
    /// Connect using the local kubeconfig
    pub async fn connect(options: ClusterOptions) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().map_err(|e| Error::Config(e.to_string()))?;

        let context = options
            .context
            .clone()
            .or_else(|| kubeconfig.current_context.clone())
            .ok_or_else(|| {
                Error::Config("no context specified and no current context in kubeconfig".into())
            })?;
        if !kubeconfig.contexts.iter().any(|c| c.name == context) {
            return Err(Error::Config(format!(
                "context '{}' not found in kubeconfig",
                context
            )));
        }

        let mut config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| Error::Config(e.to_string()))?;
        config.connect_timeout = Some(options.connect_timeout);
        config.read_timeout = Some(options.read_timeout);

        let client = Client::try_from(config)?;
        debug!(context = %context, "connected");

        Ok(Self::with_backend(Arc::new(KubeBackend::new(client))))
    }

    /// Wrap an already-built kube client
    pub fn from_client(client: Client) -> Self {
        Self::with_backend(Arc::new(KubeBackend::new(client)))
    }

    /// Use a custom backend (e.g. [`crate::backend::MockBackend`] in tests)
    pub fn with_backend(backend: Arc<dyn ResourceBackend>) -> Self {
        let resolver = Resolver::new(backend.clone());
        Self {
            inner: Arc::new(ClusterInner { backend, resolver }),
        }
    }

    /// Start a fluent chain
    pub fn query(&self) -> Query {
        Query::new(self.clone())
    }

    /// Populate a chain from a restricted SELECT statement
    pub async fn sql(&self, text: &str, values: &[&str]) -> Query {
        self.query().sql(text, values).await
    }

    // ---- managed-resource walkers ----

    pub fn deployment(&self, namespace: impl Into<String>, name: impl Into<String>) -> Controller {
        Controller::new(self.clone(), ControllerKind::Deployment, namespace, name)
    }

    pub fn stateful_set(&self, namespace: impl Into<String>, name: impl Into<String>) -> Controller {
        Controller::new(self.clone(), ControllerKind::StatefulSet, namespace, name)
    }

    pub fn daemon_set(&self, namespace: impl Into<String>, name: impl Into<String>) -> Controller {
        Controller::new(self.clone(), ControllerKind::DaemonSet, namespace, name)
    }

    pub fn replica_set(&self, namespace: impl Into<String>, name: impl Into<String>) -> Controller {
        Controller::new(self.clone(), ControllerKind::ReplicaSet, namespace, name)
    }

    pub(crate) fn backend(&self) -> &dyn ResourceBackend {
        self.inner.backend.as_ref()
    }

    pub(crate) fn resolver(&self) -> &Resolver {
        &self.inner.resolver
    }
}
