// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Managed-resource graph traversal.
//!
//! Walks ownership references to find the replica sets and pods a controller
//! currently manages. Deployments own pods through an intermediate replica
//! set; the live one is identified by the numerically greatest revision
//! annotation, with the deployment's selector as the tie-breaker. Stateful
//! sets, daemon sets and replica sets own their pods directly.
//!
//! Everything here is ordinary typed Get/List traffic through the fluent
//! surface plus client-side selection; nothing is cached. A controller with
//! zero live children yields an empty result, not an error.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::debug;

use crate::cluster::Cluster;
use crate::error::Result;

/// Revision bookkeeping the deployment controller writes on replica sets
const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

/// Controller kinds the walker understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
}

impl ControllerKind {
    fn as_str(&self) -> &'static str {
        match self {
            ControllerKind::Deployment => "Deployment",
            ControllerKind::StatefulSet => "StatefulSet",
            ControllerKind::DaemonSet => "DaemonSet",
            ControllerKind::ReplicaSet => "ReplicaSet",
        }
    }
}

/// A named controller resource whose managed children can be walked
pub struct Controller {
    cluster: Cluster,
    kind: ControllerKind,
    namespace: String,
    name: String,
}

impl Controller {
    pub(crate) fn new(
        cluster: Cluster,
        kind: ControllerKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster,
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The replica set currently serving this deployment: owned by it, with
    /// the numerically greatest revision annotation. Revision ties (or absent
    /// annotations) are broken in favor of the replica set whose labels
    /// satisfy the deployment's selector. Non-deployments have no replica-set
    /// layer and yield `None`.
    pub async fn managed_latest_replica_set(&self) -> Result<Option<ReplicaSet>> {
        if self.kind != ControllerKind::Deployment {
            return Ok(None);
        }
        let deployment = self.fetch_deployment().await?;
        let owned = self.owned_replica_sets(&deployment).await?;
        Ok(select_latest(owned, &deployment))
    }

    /// All replica sets owned by this deployment, in list order
    pub async fn managed_replica_sets(&self) -> Result<Vec<ReplicaSet>> {
        if self.kind != ControllerKind::Deployment {
            return Ok(Vec::new());
        }
        let deployment = self.fetch_deployment().await?;
        self.owned_replica_sets(&deployment).await
    }

    /// Pods this controller currently manages.
    ///
    /// Deployments resolve through their latest replica set; the other kinds
    /// own pods directly via owner references.
    pub async fn managed_pods(&self) -> Result<Vec<Pod>> {
        match self.kind {
            ControllerKind::Deployment => {
                let Some(rs) = self.managed_latest_replica_set().await? else {
                    return Ok(Vec::new());
                };
                let rs_name = rs.metadata.name.clone().unwrap_or_default();
                let rs_uid = rs.metadata.uid.clone().unwrap_or_default();
                self.pods_owned_by("ReplicaSet", &rs_name, &rs_uid).await
            }
            _ => {
                let uid = self.controller_uid().await?;
                self.pods_owned_by(self.kind.as_str(), &self.name, &uid)
                    .await
            }
        }
    }

    /// The single managed pod (first by creation timestamp), or `None` when
    /// the controller has no live pods
    pub async fn managed_pod(&self) -> Result<Option<Pod>> {
        let mut pods = self.managed_pods().await?;
        pods.sort_by(|a, b| {
            a.metadata
                .creation_timestamp
                .cmp(&b.metadata.creation_timestamp)
        });
        Ok(pods.into_iter().next())
    }

    async fn fetch_deployment(&self) -> Result<Deployment> {
        self.cluster
            .query()
            .resource::<Deployment>()
            .await
            .namespace(&self.namespace)
            .name(&self.name)
            .get()
            .await
    }

    /// UID of the controller itself, for owner-reference matching
    async fn controller_uid(&self) -> Result<String> {
        let obj: kube::api::DynamicObject = self
            .cluster
            .query()
            .gvk("apps", "v1", self.kind.as_str())
            .await
            .namespace(&self.namespace)
            .name(&self.name)
            .get()
            .await?;
        Ok(obj.metadata.uid.unwrap_or_default())
    }

    async fn owned_replica_sets(&self, deployment: &Deployment) -> Result<Vec<ReplicaSet>> {
        let uid = deployment.metadata.uid.clone().unwrap_or_default();
        let all: Vec<ReplicaSet> = self
            .cluster
            .query()
            .resource::<ReplicaSet>()
            .await
            .namespace(&self.namespace)
            .list()
            .await?;

        let owned: Vec<ReplicaSet> = all
            .into_iter()
            .filter(|rs| {
                owner_match(
                    rs.metadata.owner_references.as_deref(),
                    "Deployment",
                    &self.name,
                    &uid,
                )
            })
            .collect();
        debug!(
            deployment = %self.name,
            namespace = %self.namespace,
            owned = owned.len(),
            "replica sets owned by deployment"
        );
        Ok(owned)
    }

    async fn pods_owned_by(&self, kind: &str, name: &str, uid: &str) -> Result<Vec<Pod>> {
        let all: Vec<Pod> = self
            .cluster
            .query()
            .resource::<Pod>()
            .await
            .namespace(&self.namespace)
            .list()
            .await?;

        Ok(all
            .into_iter()
            .filter(|pod| owner_match(pod.metadata.owner_references.as_deref(), kind, name, uid))
            .collect())
    }
}

/// Does any owner reference point at the given controller?
///
/// Matches by UID when one is known, by kind + name otherwise (a fetched
/// controller always has a UID on a real cluster; the fallback keeps the walk
/// usable against partial fixtures).
fn owner_match(refs: Option<&[OwnerReference]>, kind: &str, name: &str, uid: &str) -> bool {
    refs.unwrap_or_default().iter().any(|or| {
        or.kind == kind
            && if uid.is_empty() {
                or.name == name
            } else {
                or.uid == uid
            }
    })
}

/// Pick the live replica set: greatest revision wins; on a tie (or missing
/// annotations) prefer the one whose labels satisfy the deployment selector.
fn select_latest(owned: Vec<ReplicaSet>, deployment: &Deployment) -> Option<ReplicaSet> {
    let selector = deployment
        .spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.clone())
        .unwrap_or_default();

    let mut best: Option<(i64, bool, ReplicaSet)> = None;
    for rs in owned {
        let revision = revision_of(&rs);
        let matches = selector_matches(&selector, &rs);
        let better = match &best {
            None => true,
            Some((best_rev, best_match, _)) => {
                revision > *best_rev || (revision == *best_rev && matches && !best_match)
            }
        };
        if better {
            best = Some((revision, matches, rs));
        }
    }
    best.map(|(_, _, rs)| rs)
}

fn revision_of(rs: &ReplicaSet) -> i64 {
    rs.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(REVISION_ANNOTATION))
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(-1)
}

/// All selector entries must be present in the replica set's labels
fn selector_matches(selector: &BTreeMap<String, String>, rs: &ReplicaSet) -> bool {
    if selector.is_empty() {
        return false;
    }
    let labels = rs.metadata.labels.clone().unwrap_or_default();
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}
