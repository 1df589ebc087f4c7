// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Fluent statement builder.
//!
//! A [`Query`] is one chain: setters consume and return it, resolver entry
//! points record the target resource type eagerly, and exactly one terminal
//! verb executes it. Chains never share state: every call works on the
//! chain's own statement, so concurrent chains cannot interfere.
//!
//! Errors raised while the chain is being built (resolution failures,
//! conflicting re-resolution, bad SQL) are stored on the statement; the
//! terminal verb surfaces the first of them instead of issuing a request.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use kube::api::{DynamicObject, LogParams};

use crate::backend::{ByteStream, LogStream, PatchKind};
use crate::callbacks::{dispatch, streams, Outcome, Verb};
use crate::cluster::Cluster;
use crate::error::{Error, Result};
use crate::filter::merge_selector;
use crate::resolve::ResourceIdentity;
use crate::sql;
use crate::statement::Statement;

/// One fluent chain over a [`Cluster`]
pub struct Query {
    cluster: Cluster,
    stmt: Statement,
}

impl Query {
    pub(crate) fn new(cluster: Cluster) -> Self {
        Self {
            cluster,
            stmt: Statement::new(),
        }
    }

    // ---- scope setters (no I/O) ----

    pub fn namespace(mut self, ns: impl Into<String>) -> Self {
        self.stmt.namespace = Some(ns.into());
        self.stmt.all_namespaces = false;
        self
    }

    /// List across every namespace instead of one
    pub fn all_namespaces(mut self) -> Self {
        self.stmt.all_namespaces = true;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.stmt.name = Some(name.into());
        self
    }

    pub fn container_name(mut self, container: impl Into<String>) -> Self {
        self.stmt.container = Some(container.into());
        self
    }

    /// Command and arguments for [`Query::execute_command`]
    pub fn command(mut self, cmd: impl Into<String>, args: &[&str]) -> Self {
        let mut command = vec![cmd.into()];
        command.extend(args.iter().map(|a| a.to_string()));
        self.stmt.command = command;
        self
    }

    /// Attach a cancellation token; cancelling it aborts the in-flight
    /// backend request and the terminal verb returns [`Error::Cancelled`]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.stmt.cancel = Some(token);
        self
    }

    /// Append a raw label selector (comma-joined `k=v` pairs)
    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.stmt.label_selector =
            merge_selector(self.stmt.label_selector.take(), Some(selector.into()));
        self
    }

    /// Append a raw field selector (comma-joined `path=v` pairs)
    pub fn with_field_selector(mut self, selector: impl Into<String>) -> Self {
        self.stmt.field_selector =
            merge_selector(self.stmt.field_selector.take(), Some(selector.into()));
        self
    }

    /// Client-side ordering, e.g. `"metadata.name"` or `"metadata.name desc"`
    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.stmt.filter.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.stmt.filter.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.stmt.filter.offset = Some(offset);
        self
    }

    /// Alias for [`Query::offset`]
    pub fn skip(self, skip: usize) -> Self {
        self.offset(skip)
    }

    // ---- resource resolution (eager, recorded once) ----

    /// Target a typed resource; group/version/kind come from the type itself
    pub async fn resource<K>(self) -> Self
    where
        K: kube::Resource<DynamicType = ()>,
    {
        let group = K::group(&()).to_string();
        let version = K::version(&()).to_string();
        let kind = K::kind(&()).to_string();
        self.gvk(&group, &version, &kind).await
    }

    /// Target a resource by logical name: plural, singular, kind or alias
    pub async fn table(mut self, name: &str) -> Self {
        match self.cluster.resolver().resolve_name(name).await {
            Ok(identity) => self.stmt.set_identity(identity),
            Err(err) => self.stmt.fail(err),
        }
        self
    }

    /// Target a resource by explicit group/version/kind
    pub async fn gvk(mut self, group: &str, version: &str, kind: &str) -> Self {
        match self.cluster.resolver().resolve_gvk(group, version, kind).await {
            Ok(identity) => self.stmt.set_identity(identity),
            Err(err) => self.stmt.fail(err),
        }
        self
    }

    /// Alias for [`Query::gvk`], reads better for custom resources
    pub async fn crd(self, group: &str, version: &str, kind: &str) -> Self {
        self.gvk(group, version, kind).await
    }

    /// Alias for [`Query::gvk`]
    pub async fn from(self, group: &str, version: &str, kind: &str) -> Self {
        self.gvk(group, version, kind).await
    }

    /// Populate the statement from a restricted SELECT.
    ///
    /// `SELECT * FROM <table> [WHERE <predicate>] [LIMIT <n> [OFFSET <m>]]`,
    /// with `?` placeholders substituted positionally from `values`. The FROM
    /// table resolves through the same path as [`Query::table`]; queries span
    /// all namespaces unless restricted by a `metadata.namespace` predicate.
    pub async fn sql(mut self, text: &str, values: &[&str]) -> Self {
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        let spec = match sql::parse_select(text, &values) {
            Ok(spec) => spec,
            Err(err) => {
                self.stmt.fail(err);
                return self;
            }
        };

        self = self.table(&spec.table).await;
        self.stmt.all_namespaces = true;
        self.stmt.filter.conditions = spec.conditions;
        self.stmt.filter.limit = spec.limit;
        self.stmt.filter.offset = spec.offset;
        self
    }

    /// Textual WHERE helper: an AND-joined list of `key = ?` clauses paired
    /// positionally with `values`. Each clause routes to a field or label
    /// selector via the same allow-list as the SQL path; a count mismatch
    /// aborts before any selector is built.
    pub fn where_clause(mut self, condition: &str, values: &[&str]) -> Self {
        let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
        match sql::split_where_clauses(condition, &values) {
            Ok((labels, fields)) => {
                if !labels.is_empty() {
                    self = self.with_label_selector(labels.join(","));
                }
                if !fields.is_empty() {
                    self = self.with_field_selector(fields.join(","));
                }
            }
            Err(err) => self.stmt.fail(err),
        }
        self
    }

    // ---- terminal verbs ----

    /// Fetch a single object by name
    pub async fn get<K: DeserializeOwned>(mut self) -> Result<K> {
        self.take_chain_error()?;
        let identity = self.stmt.resolved()?.clone();
        match dispatch(self.cluster.backend(), &mut self.stmt, Verb::Get).await? {
            Outcome::Object(obj) => from_dynamic(obj, &identity),
            _ => unreachable!("get dispatch returns a single object"),
        }
    }

    /// List objects in scope, applying selectors, ordering, offset and limit
    pub async fn list<K: DeserializeOwned>(mut self) -> Result<Vec<K>> {
        self.take_chain_error()?;
        let identity = self.stmt.resolved()?.clone();
        match dispatch(self.cluster.backend(), &mut self.stmt, Verb::List).await? {
            Outcome::Objects(items) => items
                .into_iter()
                .map(|obj| from_dynamic(obj, &identity))
                .collect(),
            _ => unreachable!("list dispatch returns objects"),
        }
    }

    /// Create the given object; a namespaced create with no namespace lands
    /// in `"default"`
    pub async fn create<K>(mut self, obj: &K) -> Result<K>
    where
        K: Serialize + DeserializeOwned,
    {
        self.take_chain_error()?;
        let identity = self.stmt.resolved()?.clone();
        let payload = to_dynamic(obj, &identity)?;
        match dispatch(self.cluster.backend(), &mut self.stmt, Verb::Create(payload)).await? {
            Outcome::Object(created) => from_dynamic(created, &identity),
            _ => unreachable!("create dispatch returns a single object"),
        }
    }

    /// Replace the given object
    pub async fn update<K>(mut self, obj: &K) -> Result<K>
    where
        K: Serialize + DeserializeOwned,
    {
        self.take_chain_error()?;
        let identity = self.stmt.resolved()?.clone();
        let payload = to_dynamic(obj, &identity)?;
        match dispatch(self.cluster.backend(), &mut self.stmt, Verb::Update(payload)).await? {
            Outcome::Object(updated) => from_dynamic(updated, &identity),
            _ => unreachable!("update dispatch returns a single object"),
        }
    }

    /// Apply a pre-serialized patch of the given flavor to the named object
    pub async fn patch<K: DeserializeOwned>(mut self, kind: PatchKind, body: &str) -> Result<K> {
        self.take_chain_error()?;
        let identity = self.stmt.resolved()?.clone();
        let body: Value = serde_json::from_str(body).map_err(Error::Conversion)?;
        self.stmt.patch = Some((kind, body));
        match dispatch(self.cluster.backend(), &mut self.stmt, Verb::Patch).await? {
            Outcome::Object(patched) => from_dynamic(patched, &identity),
            _ => unreachable!("patch dispatch returns a single object"),
        }
    }

    /// Delete the named object. The name is required.
    pub async fn delete(mut self) -> Result<()> {
        self.take_chain_error()?;
        dispatch(self.cluster.backend(), &mut self.stmt, Verb::Delete).await?;
        Ok(())
    }

    /// Run the configured command in the named pod; returns a live output
    /// stream the caller owns
    pub async fn execute_command(mut self) -> Result<ByteStream> {
        self.take_chain_error()?;
        streams::exec(self.cluster.backend(), &mut self.stmt).await
    }

    /// Open a log stream for the named pod, binding the chain's container
    /// name into the options; the caller owns the returned handle
    pub async fn get_logs(mut self, params: LogParams) -> Result<LogStream> {
        self.take_chain_error()?;
        self.stmt.log_params = params;
        streams::logs(self.cluster.backend(), &mut self.stmt).await
    }

    fn take_chain_error(&mut self) -> Result<()> {
        match self.stmt.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Typed object -> generic representation, with apiVersion/kind stamped from
/// the resolved identity. Fails before any network call.
fn to_dynamic<K: Serialize>(obj: &K, identity: &ResourceIdentity) -> Result<DynamicObject> {
    let mut value = serde_json::to_value(obj).map_err(Error::Conversion)?;
    inject_type_meta(&mut value, identity);
    serde_json::from_value(value).map_err(Error::Conversion)
}

/// Generic representation -> typed object. The list API does not carry
/// apiVersion/kind per item, so they are re-injected from the identity first.
fn from_dynamic<K: DeserializeOwned>(obj: DynamicObject, identity: &ResourceIdentity) -> Result<K> {
    let mut value = serde_json::to_value(&obj).map_err(Error::Conversion)?;
    inject_type_meta(&mut value, identity);
    serde_json::from_value(value).map_err(Error::Conversion)
}

fn inject_type_meta(value: &mut Value, identity: &ResourceIdentity) {
    if let Value::Object(map) = value {
        map.insert(
            "apiVersion".to_string(),
            Value::String(identity.api_version()),
        );
        map.insert("kind".to_string(), Value::String(identity.kind.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::Pod;
    use serde_json::json;

    use crate::backend::MockBackend;
    use crate::cluster::Cluster;

    fn pod_json(name: &str, ns: &str, phase: &str, app: &str) -> DynamicObject {
        serde_json::from_value(json!({
            "metadata": {
                "name": name,
                "namespace": ns,
                "labels": { "app": app }
            },
            "status": { "phase": phase }
        }))
        .unwrap()
    }

    fn cluster_with(backend: MockBackend) -> (Cluster, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        (Cluster::with_backend(backend.clone()), backend)
    }

    #[tokio::test]
    async fn test_sql_end_to_end() {
        let (cluster, _) = cluster_with(MockBackend::new().with_objects(
            "pods",
            vec![
                pod_json("web-0", "default", "Running", "nginx"),
                pod_json("web-1", "default", "Pending", "nginx"),
                pod_json("db-0", "default", "Running", "postgres"),
            ],
        ));

        let pods: Vec<Pod> = cluster
            .query()
            .sql(
                "SELECT * FROM pods WHERE app = 'nginx' AND status.phase = 'Running'",
                &[],
            )
            .await
            .list()
            .await
            .unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].metadata.name.as_deref(), Some("web-0"));
    }

    #[tokio::test]
    async fn test_sql_unknown_table_leaves_identity_unset() {
        let (cluster, backend) = cluster_with(MockBackend::new());

        let result = cluster
            .query()
            .sql("SELECT * FROM nonesuch", &[])
            .await
            .list::<Pod>()
            .await;
        assert!(matches!(result, Err(Error::UnknownResource { name }) if name == "nonesuch"));
        // nothing was listed
        assert_eq!(backend.counts().lists, 0);
    }

    #[tokio::test]
    async fn test_where_clause_classification() {
        let (cluster, backend) = cluster_with(MockBackend::new().with_objects(
            "pods",
            vec![
                pod_json("x-pod", "default", "Running", "x"),
                pod_json("other", "default", "Running", "y"),
            ],
        ));

        let pods: Vec<Pod> = cluster
            .query()
            .resource::<Pod>()
            .await
            .namespace("default")
            .where_clause("app = ? AND metadata.name = ?", &["x", "x-pod"])
            .list()
            .await
            .unwrap();
        assert_eq!(pods.len(), 1);
        assert_eq!(backend.counts().lists, 1);
    }

    #[tokio::test]
    async fn test_where_clause_count_mismatch_fails_before_backend() {
        let (cluster, backend) = cluster_with(MockBackend::new());

        let result = cluster
            .query()
            .resource::<Pod>()
            .await
            .where_clause("a = ? AND metadata.name = ?", &["x"])
            .list::<Pod>()
            .await;
        assert!(matches!(result, Err(Error::ClauseCountMismatch { .. })));
        assert_eq!(backend.counts().lists, 0);
    }

    #[tokio::test]
    async fn test_identity_conflict_is_an_error() {
        let (cluster, _) = cluster_with(MockBackend::new());

        let result = cluster
            .query()
            .gvk("", "v1", "Pod")
            .await
            .gvk("apps", "v1", "Deployment")
            .await
            .list::<Pod>()
            .await;
        assert!(matches!(result, Err(Error::IdentityConflict { .. })));
    }

    #[tokio::test]
    async fn test_create_and_get_round_trip() {
        let (cluster, _) = cluster_with(MockBackend::new());

        let pod: Pod = serde_json::from_value(json!({
            "metadata": { "name": "web-0" },
            "spec": { "containers": [] }
        }))
        .unwrap();

        let created: Pod = cluster
            .query()
            .resource::<Pod>()
            .await
            .create(&pod)
            .await
            .unwrap();
        assert_eq!(created.metadata.namespace.as_deref(), Some("default"));

        let fetched: Pod = cluster
            .query()
            .resource::<Pod>()
            .await
            .namespace("default")
            .name("web-0")
            .get()
            .await
            .unwrap();
        assert_eq!(fetched.metadata.name.as_deref(), Some("web-0"));
    }

    #[tokio::test]
    async fn test_delete_requires_name() {
        let (cluster, backend) = cluster_with(MockBackend::new());

        let result = cluster.query().resource::<Pod>().await.delete().await;
        assert!(matches!(result, Err(Error::MissingName)));
        assert_eq!(backend.counts().deletes, 0);
    }

    #[tokio::test]
    async fn test_crd_alias_and_skip() {
        use crate::backend::CrdSummary;

        let backend = MockBackend::new()
            .with_crds(vec![CrdSummary {
                group: "example.com".to_string(),
                version: "v1alpha1".to_string(),
                kind: "Widget".to_string(),
                plural: "widgets".to_string(),
                singular: "widget".to_string(),
                namespaced: true,
            }])
            .with_objects(
                "widgets",
                vec![
                    serde_json::from_value(json!({
                        "metadata": { "name": "w1", "namespace": "default" }
                    }))
                    .unwrap(),
                    serde_json::from_value(json!({
                        "metadata": { "name": "w2", "namespace": "default" }
                    }))
                    .unwrap(),
                ],
            );
        let (cluster, _) = cluster_with(backend);

        let widgets: Vec<DynamicObject> = cluster
            .query()
            .crd("example.com", "v1alpha1", "Widget")
            .await
            .namespace("default")
            .order("metadata.name")
            .skip(1)
            .list()
            .await
            .unwrap();
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].metadata.name.as_deref(), Some("w2"));
    }

    #[tokio::test]
    async fn test_execute_command_through_the_chain() {
        use tokio::io::AsyncReadExt;

        let (cluster, backend) = cluster_with(MockBackend::new().with_exec_output("ok\n"));

        let mut stream = cluster
            .query()
            .namespace("default")
            .name("web-0")
            .container_name("app")
            .command("sh", &["-c", "echo ok"])
            .execute_command()
            .await
            .unwrap();

        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "ok\n");
        assert_eq!(backend.counts().execs, 1);
    }

    #[tokio::test]
    async fn test_get_logs_binds_container() {
        let (cluster, backend) = cluster_with(MockBackend::new().with_log_output("l1\n"));

        let _stream = cluster
            .query()
            .namespace("default")
            .name("web-0")
            .container_name("sidecar")
            .get_logs(LogParams {
                tail_lines: Some(100),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(backend.last_log_container().as_deref(), Some("sidecar"));
    }

    #[tokio::test]
    async fn test_sql_limit_offset_and_order() {
        let (cluster, _) = cluster_with(MockBackend::new().with_objects(
            "pods",
            vec![
                pod_json("c", "default", "Running", "a"),
                pod_json("a", "default", "Running", "a"),
                pod_json("b", "default", "Running", "a"),
            ],
        ));

        let pods: Vec<Pod> = cluster
            .query()
            .sql("SELECT * FROM pods LIMIT 2 OFFSET 1", &[])
            .await
            .order("metadata.name")
            .list()
            .await
            .unwrap();
        let names: Vec<_> = pods
            .iter()
            .map(|p| p.metadata.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
