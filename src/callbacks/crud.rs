// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! CRUD operations against the backend.
//!
//! Every operation receives a fully-populated statement, performs its usage
//! checks before touching the network, and passes backend errors through
//! verbatim. Get and List are the only idempotent-by-design operations here.

use kube::api::DynamicObject;
use tracing::debug;

use super::{with_cancel, Outcome};
use crate::backend::{ListQuery, ResourceBackend};
use crate::error::{Error, Result};
use crate::filter::{apply_shaping, merge_selector};
use crate::statement::Statement;

pub(crate) async fn create(
    backend: &dyn ResourceBackend,
    stmt: &mut Statement,
    mut obj: DynamicObject,
) -> Result<Outcome> {
    let identity = stmt.resolved()?.clone();

    let ns = if identity.namespaced {
        // Default the namespace into both the outgoing object and the
        // statement so follow-up calls observe where the object went.
        if stmt.namespace.is_none() {
            stmt.namespace = Some(crate::config::DEFAULT_NAMESPACE.to_string());
        }
        let ns = stmt.effective_namespace().to_string();
        obj.metadata.namespace = Some(ns.clone());
        Some(ns)
    } else {
        None
    };

    debug!(identity = %identity, namespace = ?ns, "create");
    let mut created = with_cancel(
        stmt.cancel.as_ref(),
        backend.create(&identity, ns.as_deref(), obj),
    )
    .await?;
    strip_managed_fields(&mut created);
    Ok(Outcome::Object(created))
}

pub(crate) async fn get(backend: &dyn ResourceBackend, stmt: &mut Statement) -> Result<Outcome> {
    let identity = stmt.resolved()?.clone();
    let ns = identity
        .namespaced
        .then(|| stmt.effective_namespace().to_string());
    let name = stmt.name.clone().unwrap_or_default();

    let obj = with_cancel(
        stmt.cancel.as_ref(),
        backend.get(&identity, ns.as_deref(), &name),
    )
    .await?;
    Ok(Outcome::Object(obj))
}

pub(crate) async fn list(backend: &dyn ResourceBackend, stmt: &mut Statement) -> Result<Outcome> {
    let identity = stmt.resolved()?.clone();

    // Conditions become selectors; explicitly-set selector strings merge in.
    let selectors = stmt.filter.selectors()?;
    let query = ListQuery {
        label_selector: merge_selector(selectors.labels, stmt.label_selector.clone()),
        field_selector: merge_selector(selectors.fields, stmt.field_selector.clone()),
    };
    let ns = stmt.list_scope().map(str::to_string);

    let items = with_cancel(
        stmt.cancel.as_ref(),
        backend.list(&identity, ns.as_deref(), &query),
    )
    .await?;
    let shaped = apply_shaping(items, &stmt.filter);
    Ok(Outcome::Objects(shaped))
}

pub(crate) async fn update(
    backend: &dyn ResourceBackend,
    stmt: &mut Statement,
    obj: DynamicObject,
) -> Result<Outcome> {
    let identity = stmt.resolved()?.clone();
    let ns = identity
        .namespaced
        .then(|| stmt.effective_namespace().to_string());

    let mut updated = with_cancel(
        stmt.cancel.as_ref(),
        backend.update(&identity, ns.as_deref(), obj),
    )
    .await?;
    strip_managed_fields(&mut updated);
    Ok(Outcome::Object(updated))
}

pub(crate) async fn patch(backend: &dyn ResourceBackend, stmt: &mut Statement) -> Result<Outcome> {
    let identity = stmt.resolved()?.clone();
    let name = stmt.require_name()?.to_string();
    let (kind, body) = stmt.patch.take().ok_or(Error::MissingResource)?;
    let ns = identity
        .namespaced
        .then(|| stmt.effective_namespace().to_string());

    let obj = with_cancel(
        stmt.cancel.as_ref(),
        backend.patch(&identity, ns.as_deref(), &name, kind, body),
    )
    .await?;
    Ok(Outcome::Object(obj))
}

pub(crate) async fn delete(backend: &dyn ResourceBackend, stmt: &mut Statement) -> Result<Outcome> {
    let identity = stmt.resolved()?.clone();
    let name = stmt.require_name()?.to_string();
    let ns = identity
        .namespaced
        .then(|| stmt.effective_namespace().to_string());

    debug!(identity = %identity, namespace = ?ns, name = %name, "delete");
    with_cancel(
        stmt.cancel.as_ref(),
        backend.delete(&identity, ns.as_deref(), &name),
    )
    .await?;
    Ok(Outcome::Deleted)
}

/// Drop server-side bookkeeping the caller never wants back
fn strip_managed_fields(obj: &mut DynamicObject) {
    obj.metadata.managed_fields = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use crate::backend::MockBackend;
    use crate::resolve::ResourceIdentity;

    fn pod_identity() -> ResourceIdentity {
        ResourceIdentity {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Pod".to_string(),
            plural: "pods".to_string(),
            namespaced: true,
        }
    }

    fn pod(name: &str, ns: &str) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": name, "namespace": ns }
        }))
        .unwrap()
    }

    fn stmt_for_pods() -> Statement {
        let mut stmt = Statement::new();
        stmt.set_identity(pod_identity());
        stmt
    }

    #[tokio::test]
    async fn test_create_defaults_namespace_into_object_and_statement() {
        let backend = Arc::new(MockBackend::new());
        let mut stmt = stmt_for_pods();

        let obj: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "web-0" }
        }))
        .unwrap();

        let outcome = create(backend.as_ref(), &mut stmt, obj).await.unwrap();
        let Outcome::Object(created) = outcome else {
            panic!("expected object outcome");
        };
        assert_eq!(created.metadata.namespace.as_deref(), Some("default"));
        assert_eq!(stmt.namespace.as_deref(), Some("default"));

        let stored = backend.stored("pods");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].metadata.namespace.as_deref(), Some("default"));
    }

    #[tokio::test]
    async fn test_create_twice_surfaces_already_exists() {
        let backend = Arc::new(MockBackend::new());
        let mut stmt = stmt_for_pods();
        create(backend.as_ref(), &mut stmt, pod("web-0", "default"))
            .await
            .unwrap();

        let mut stmt2 = stmt_for_pods();
        let err = create(backend.as_ref(), &mut stmt2, pod("web-0", "default"))
            .await
            .unwrap_err();
        match err {
            Error::Api(kube::Error::Api(resp)) => assert_eq!(resp.code, 409),
            other => panic!("expected API 409, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_without_name_issues_no_backend_call() {
        let backend = Arc::new(MockBackend::new());
        let mut stmt = stmt_for_pods();

        let err = delete(backend.as_ref(), &mut stmt).await.unwrap_err();
        assert!(matches!(err, Error::MissingName));
        assert_eq!(backend.counts().deletes, 0);
    }

    #[tokio::test]
    async fn test_list_pushes_selectors_and_shapes() {
        let backend = Arc::new(MockBackend::new().with_objects(
            "pods",
            vec![
                serde_json::from_value(json!({
                    "metadata": {
                        "name": "b", "namespace": "default",
                        "labels": { "app": "nginx" }
                    }
                }))
                .unwrap(),
                serde_json::from_value(json!({
                    "metadata": {
                        "name": "a", "namespace": "default",
                        "labels": { "app": "nginx" }
                    }
                }))
                .unwrap(),
                serde_json::from_value(json!({
                    "metadata": {
                        "name": "c", "namespace": "default",
                        "labels": { "app": "redis" }
                    }
                }))
                .unwrap(),
            ],
        ));

        let mut stmt = stmt_for_pods();
        stmt.label_selector = Some("app=nginx".to_string());
        stmt.filter.order = Some("metadata.name".to_string());

        let Outcome::Objects(items) = list(backend.as_ref(), &mut stmt).await.unwrap() else {
            panic!("expected objects outcome");
        };
        let names: Vec<_> = items
            .iter()
            .map(|o| o.metadata.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_before_backend_call() {
        let backend = Arc::new(MockBackend::new());
        let token = CancellationToken::new();
        token.cancel();

        let mut stmt = stmt_for_pods();
        stmt.cancel = Some(token);
        stmt.name = Some("web-0".to_string());

        let err = get(backend.as_ref(), &mut stmt).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(backend.counts().gets, 0);
    }

    #[tokio::test]
    async fn test_get_passes_backend_not_found_verbatim() {
        let backend = Arc::new(MockBackend::new());
        let mut stmt = stmt_for_pods();
        stmt.name = Some("missing".to_string());

        let err = get(backend.as_ref(), &mut stmt).await.unwrap_err();
        match err {
            Error::Api(kube::Error::Api(resp)) => assert_eq!(resp.code, 404),
            other => panic!("expected API 404, got {other:?}"),
        }
    }
}
