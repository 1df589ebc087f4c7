// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Resource-type resolution.
//!
//! Maps a logical name (a SQL table name, a typed object's kind, or an
//! explicit group/version/kind triple) to the canonical
//! [`ResourceIdentity`] the backend requires. Built-in kinds resolve from
//! static metadata with no I/O; everything else is looked up in the cluster's
//! CRD list through the backend. Successful resolutions are cached for the
//! lifetime of the owning cluster handle and never invalidated within a
//! process run; resource schemas rarely change during a session, and a
//! racing double-resolve is benign (last writer wins).

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::backend::{CrdSummary, ResourceBackend};
use crate::error::{Error, Result};

/// Canonical identity of a cluster resource type.
///
/// Immutable once resolved; clones are cheap enough to hand out by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// API group (empty string for core v1)
    pub group: String,
    /// API version
    pub version: String,
    /// Resource kind (e.g. "Pod")
    pub kind: String,
    /// Plural resource name (e.g. "pods")
    pub plural: String,
    /// Whether the resource is namespace-scoped
    pub namespaced: bool,
}

impl ResourceIdentity {
    /// Full apiVersion string (e.g. "v1", "apps/v1", "cert-manager.io/v1")
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Build the kube `ApiResource` handle for dynamic API access
    pub fn to_api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

impl From<&CrdSummary> for ResourceIdentity {
    fn from(crd: &CrdSummary) -> Self {
        Self {
            group: crd.group.clone(),
            version: crd.version.clone(),
            kind: crd.kind.clone(),
            plural: crd.plural.clone(),
            namespaced: crd.namespaced,
        }
    }
}

/// Identities of all built-in kinds, for backends answering discovery
/// queries from static metadata
pub(crate) fn builtin_identities() -> Vec<ResourceIdentity> {
    builtin::BUILTIN_RESOURCES
        .iter()
        .map(|r| r.identity.clone())
        .collect()
}

/// Name-to-identity resolver with a process-lifetime cache
pub struct Resolver {
    backend: Arc<dyn ResourceBackend>,
    cache: RwLock<HashMap<String, ResourceIdentity>>,
}

impl Resolver {
    pub fn new(backend: Arc<dyn ResourceBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a logical table name (plural, singular, kind or short alias).
    ///
    /// Built-in metadata is consulted first, then the cluster's CRD list.
    pub async fn resolve_name(&self, name: &str) -> Result<ResourceIdentity> {
        let needle = name.trim().to_lowercase();
        let key = format!("name:{}", needle);
        if let Some(hit) = self.cache.read().await.get(&key) {
            trace!(name = %name, identity = %hit, "resolver cache hit");
            return Ok(hit.clone());
        }

        // Built-ins: plural or kind from the backend's advertised set, short
        // aliases (po, svc, deploy, ...) from the static table.
        let builtin_hit = self
            .backend
            .builtin_resources()
            .into_iter()
            .find(|id| id.plural == needle || id.kind.to_lowercase() == needle)
            .or_else(|| builtin::find_by_name(name).cloned());
        if let Some(identity) = builtin_hit {
            self.remember(key, &identity).await;
            return Ok(identity);
        }

        let crds = self.backend.custom_resource_definitions().await?;
        let found = crds.iter().find(|crd| {
            crd.plural.to_lowercase() == needle
                || crd.singular.to_lowercase() == needle
                || crd.kind.to_lowercase() == needle
        });

        match found {
            Some(crd) => {
                let identity = ResourceIdentity::from(crd);
                debug!(name = %name, identity = %identity, "resolved via CRD list");
                self.remember(key, &identity).await;
                Ok(identity)
            }
            None => Err(Error::UnknownResource {
                name: name.to_string(),
            }),
        }
    }

    /// Resolve an explicit (group, version, kind) triple.
    ///
    /// Built-in kinds synthesize plural and scope from static metadata; other
    /// kinds are treated as custom resources and looked up by group + kind in
    /// the CRD list. The CRD supplies the version when the caller left it
    /// empty.
    pub async fn resolve_gvk(&self, group: &str, version: &str, kind: &str) -> Result<ResourceIdentity> {
        let key = format!("kind:{}/{}", group, kind.to_lowercase());
        if let Some(hit) = self.cache.read().await.get(&key) {
            trace!(group = %group, kind = %kind, identity = %hit, "resolver cache hit");
            return Ok(hit.clone());
        }

        let builtin_hit = self
            .backend
            .builtin_resources()
            .into_iter()
            .find(|id| id.group == group && id.kind.eq_ignore_ascii_case(kind));
        if let Some(mut identity) = builtin_hit {
            if !version.is_empty() {
                identity.version = version.to_string();
            }
            self.remember(key, &identity).await;
            return Ok(identity);
        }

        let crds = self.backend.custom_resource_definitions().await?;
        let found = crds
            .iter()
            .find(|crd| crd.group == group && crd.kind.eq_ignore_ascii_case(kind));

        match found {
            Some(crd) => {
                let mut identity = ResourceIdentity::from(crd);
                if !version.is_empty() {
                    identity.version = version.to_string();
                }
                debug!(group = %group, kind = %kind, identity = %identity, "resolved via CRD list");
                self.remember(key, &identity).await;
                Ok(identity)
            }
            None => Err(Error::UnknownResource {
                name: format!("{}/{}/{}", group, version, kind),
            }),
        }
    }

    async fn remember(&self, key: String, identity: &ResourceIdentity) {
        self.cache.write().await.insert(key, identity.clone());
    }
}
