// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Static metadata for built-in API resources.
//!
//! Uses compile-time type information from k8s-openapi, so the table
//! automatically stays in sync with the Kubernetes API version we build
//! against. No discovery round-trip is ever needed for these kinds.

use std::sync::LazyLock;

use super::ResourceIdentity;

/// A built-in kind with its kubectl-style short names
pub(crate) struct BuiltinResource {
    pub identity: ResourceIdentity,
    pub aliases: Vec<&'static str>,
}

/// All built-in kinds kubeq can resolve without discovery
pub(crate) static BUILTIN_RESOURCES: LazyLock<Vec<BuiltinResource>> = LazyLock::new(build_table);

fn build_table() -> Vec<BuiltinResource> {
    use k8s_openapi::api::{
        apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
        autoscaling::v2::HorizontalPodAutoscaler,
        batch::v1::{CronJob, Job},
        core::v1::{
            ConfigMap, Endpoints, Event, LimitRange, Namespace, Node, PersistentVolume,
            PersistentVolumeClaim, Pod, ResourceQuota, Secret, Service, ServiceAccount,
        },
        networking::v1::{Ingress, NetworkPolicy},
        policy::v1::PodDisruptionBudget,
        rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding},
        storage::v1::StorageClass,
    };
    use kube::Resource;

    let mut table = Vec::new();

    // Uses compile-time type info from k8s-openapi via the kube::Resource
    // trait. Scope is declared explicitly since the trait carries it as an
    // associated type rather than a value.
    macro_rules! add_builtin {
        ($type:ty, namespaced, [$($alias:expr),* $(,)?]) => {
            add_builtin!(@inner $type, true, [$($alias),*])
        };
        ($type:ty, cluster, [$($alias:expr),* $(,)?]) => {
            add_builtin!(@inner $type, false, [$($alias),*])
        };
        (@inner $type:ty, $namespaced:expr, [$($alias:expr),* $(,)?]) => {
            table.push(BuiltinResource {
                identity: ResourceIdentity {
                    group: <$type>::group(&()).to_string(),
                    version: <$type>::version(&()).to_string(),
                    kind: <$type>::kind(&()).to_string(),
                    plural: <$type>::plural(&()).to_string(),
                    namespaced: $namespaced,
                },
                aliases: vec![$($alias),*],
            });
        };
    }

    // Core API (v1) - namespaced resources
    add_builtin!(Pod, namespaced, ["pod", "po"]);
    add_builtin!(Service, namespaced, ["service", "svc"]);
    add_builtin!(ConfigMap, namespaced, ["configmap", "cm"]);
    add_builtin!(Secret, namespaced, ["secret"]);
    add_builtin!(Event, namespaced, ["event", "ev"]);
    add_builtin!(ServiceAccount, namespaced, ["serviceaccount", "sa"]);
    add_builtin!(Endpoints, namespaced, ["endpoint", "ep"]);
    add_builtin!(PersistentVolumeClaim, namespaced, ["persistentvolumeclaim", "pvc"]);
    add_builtin!(ResourceQuota, namespaced, ["resourcequota", "quota"]);
    add_builtin!(LimitRange, namespaced, ["limitrange", "limits"]);

    // Core API (v1) - cluster-scoped resources
    add_builtin!(Node, cluster, ["node", "no"]);
    add_builtin!(Namespace, cluster, ["namespace", "ns"]);
    add_builtin!(PersistentVolume, cluster, ["persistentvolume", "pv"]);

    // Apps API (apps/v1)
    add_builtin!(Deployment, namespaced, ["deployment", "deploy"]);
    add_builtin!(StatefulSet, namespaced, ["statefulset", "sts"]);
    add_builtin!(DaemonSet, namespaced, ["daemonset", "ds"]);
    add_builtin!(ReplicaSet, namespaced, ["replicaset", "rs"]);

    // Batch API (batch/v1)
    add_builtin!(Job, namespaced, ["job"]);
    add_builtin!(CronJob, namespaced, ["cronjob", "cj"]);

    // Networking API (networking.k8s.io/v1)
    add_builtin!(Ingress, namespaced, ["ingress", "ing"]);
    add_builtin!(NetworkPolicy, namespaced, ["networkpolicy", "netpol"]);

    // Autoscaling API (autoscaling/v2)
    add_builtin!(HorizontalPodAutoscaler, namespaced, ["horizontalpodautoscaler", "hpa"]);

    // Policy API (policy/v1)
    add_builtin!(PodDisruptionBudget, namespaced, ["poddisruptionbudget", "pdb"]);

    // Storage API (storage.k8s.io/v1) - cluster-scoped
    add_builtin!(StorageClass, cluster, ["storageclass", "sc"]);

    // RBAC API (rbac.authorization.k8s.io/v1)
    add_builtin!(Role, namespaced, ["role"]);
    add_builtin!(RoleBinding, namespaced, ["rolebinding"]);
    add_builtin!(ClusterRole, cluster, ["clusterrole"]);
    add_builtin!(ClusterRoleBinding, cluster, ["clusterrolebinding"]);

    table
}

/// Find a built-in by table name: plural, lowercased kind, or short alias
pub(crate) fn find_by_name(name: &str) -> Option<&'static ResourceIdentity> {
    let needle = name.trim().to_lowercase();
    BUILTIN_RESOURCES.iter().find_map(|res| {
        let hit = res.identity.plural == needle
            || res.identity.kind.to_lowercase() == needle
            || res.aliases.contains(&needle.as_str());
        hit.then_some(&res.identity)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_plural() {
        let pod = find_by_name("pods").unwrap();
        assert_eq!(pod.kind, "Pod");
        assert_eq!(pod.group, "");
        assert_eq!(pod.version, "v1");
        assert!(pod.namespaced);
    }

    #[test]
    fn test_find_by_alias() {
        assert_eq!(find_by_name("deploy").unwrap().kind, "Deployment");
        assert_eq!(find_by_name("po").unwrap().kind, "Pod");
        assert_eq!(find_by_name("sc").unwrap().kind, "StorageClass");
    }

    #[test]
    fn test_find_case_insensitive() {
        assert_eq!(find_by_name("Pods").unwrap().kind, "Pod");
        assert_eq!(find_by_name("STATEFULSET").unwrap().kind, "StatefulSet");
    }

    #[test]
    fn test_cluster_scoped() {
        assert!(!find_by_name("nodes").unwrap().namespaced);
        assert!(!find_by_name("namespaces").unwrap().namespaced);
    }
}
