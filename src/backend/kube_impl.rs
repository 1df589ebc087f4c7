// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Backend implementation over a kube client.
//!
//! All CRUD verbs go through the dynamic API (`Api<DynamicObject>`) so one
//! code path serves core, extension and custom resources. Exec and logs use
//! the typed Pod subresource API. Lists paginate with continue tokens to
//! bound per-response memory.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{
    Api, AttachParams, AttachedProcess, DeleteParams, DynamicObject, ListParams, LogParams, Patch,
    PatchParams, PostParams,
};
use kube::Client;
use serde_json::Value;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tracing::{debug, trace};

use super::{ByteStream, CrdSummary, ListQuery, LogStream, PatchKind, ResourceBackend};
use crate::error::{Error, Result};
use crate::resolve::ResourceIdentity;

/// Page size for paginated list requests.
/// Smaller pages reduce memory pressure and allow faster initial response.
const PAGE_SIZE: u32 = 500;

/// Resource backend over a connected kube [`Client`]
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
}

impl KubeBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Dynamic API handle scoped per the identity and requested namespace
    fn api(&self, identity: &ResourceIdentity, ns: Option<&str>) -> Api<DynamicObject> {
        let ar = identity.to_api_resource();
        match ns {
            Some(ns) if identity.namespaced => {
                Api::namespaced_with(self.client.clone(), ns, &ar)
            }
            _ => Api::all_with(self.client.clone(), &ar),
        }
    }

    fn pods(&self, ns: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), ns)
    }
}

#[async_trait]
impl ResourceBackend for KubeBackend {
    async fn create(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        obj: DynamicObject,
    ) -> Result<DynamicObject> {
        debug!(identity = %identity, namespace = ?ns, "create");
        let api = self.api(identity, ns);
        Ok(api.create(&PostParams::default(), &obj).await?)
    }

    async fn get(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        debug!(identity = %identity, namespace = ?ns, name = %name, "get");
        let api = self.api(identity, ns);
        Ok(api.get(name).await?)
    }

    async fn list(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        query: &ListQuery,
    ) -> Result<Vec<DynamicObject>> {
        let api = self.api(identity, ns);

        let mut params = ListParams::default();
        if let Some(ref labels) = query.label_selector {
            params = params.labels(labels);
        }
        if let Some(ref fields) = query.field_selector {
            params = params.fields(fields);
        }
        trace!(
            identity = %identity,
            label_selector = ?query.label_selector,
            field_selector = ?query.field_selector,
            "list params"
        );

        // Fetch all pages via continue tokens
        let mut items = Vec::new();
        let mut continue_token: Option<String> = None;
        loop {
            let mut page_params = params.clone().limit(PAGE_SIZE);
            if let Some(ref token) = continue_token {
                page_params = page_params.continue_token(token);
            }
            let page = api.list(&page_params).await?;
            items.extend(page.items);
            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => continue_token = Some(token),
                _ => break,
            }
        }

        debug!(identity = %identity, namespace = ?ns, count = items.len(), "listed");
        Ok(items)
    }

    async fn update(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        obj: DynamicObject,
    ) -> Result<DynamicObject> {
        let name = obj.metadata.name.clone().ok_or(Error::MissingName)?;
        debug!(identity = %identity, namespace = ?ns, name = %name, "update");
        let api = self.api(identity, ns);
        Ok(api.replace(&name, &PostParams::default(), &obj).await?)
    }

    async fn patch(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
        kind: PatchKind,
        body: Value,
    ) -> Result<DynamicObject> {
        debug!(identity = %identity, namespace = ?ns, name = %name, kind = ?kind, "patch");
        let api = self.api(identity, ns);
        let params = PatchParams::default();
        let patched = match kind {
            PatchKind::Merge => api.patch(name, &params, &Patch::Merge(body)).await?,
            PatchKind::Strategic => api.patch(name, &params, &Patch::Strategic(body)).await?,
            PatchKind::Json => {
                let ops: json_patch::Patch =
                    serde_json::from_value(body).map_err(Error::Conversion)?;
                api.patch(name, &params, &Patch::Json::<Value>(ops)).await?
            }
        };
        Ok(patched)
    }

    async fn delete(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
    ) -> Result<()> {
        debug!(identity = %identity, namespace = ?ns, name = %name, "delete");
        let api = self.api(identity, ns);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn exec(
        &self,
        ns: &str,
        pod: &str,
        container: Option<&str>,
        command: &[String],
    ) -> Result<ByteStream> {
        debug!(namespace = %ns, pod = %pod, container = ?container, "exec");
        let mut params = AttachParams::default().stdout(true).stderr(false).stdin(false);
        if let Some(container) = container {
            params = params.container(container);
        }
        let mut process = self.pods(ns).exec(pod, command.to_vec(), &params).await?;
        let stdout = process.stdout().ok_or(Error::MissingStream)?;
        Ok(Box::new(AttachedOutput {
            stdout: Box::new(stdout),
            _process: process,
        }))
    }

    async fn open_logs(&self, ns: &str, pod: &str, params: &LogParams) -> Result<LogStream> {
        debug!(namespace = %ns, pod = %pod, container = ?params.container, "open log stream");
        let stream = self.pods(ns).log_stream(pod, params).await?;
        Ok(Box::new(stream.compat()))
    }

    fn builtin_resources(&self) -> Vec<ResourceIdentity> {
        crate::resolve::builtin_identities()
    }

    async fn custom_resource_definitions(&self) -> Result<Vec<CrdSummary>> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;

        let summaries = list
            .items
            .into_iter()
            .filter_map(|crd| {
                let spec = crd.spec;
                // Prefer the storage version; fall back to the first served one
                let version = spec
                    .versions
                    .iter()
                    .find(|v| v.storage)
                    .or_else(|| spec.versions.iter().find(|v| v.served))
                    .map(|v| v.name.clone())?;
                Some(CrdSummary {
                    group: spec.group,
                    version,
                    kind: spec.names.kind,
                    plural: spec.names.plural,
                    singular: spec.names.singular.unwrap_or_default(),
                    namespaced: spec.scope == "Namespaced",
                })
            })
            .collect();

        Ok(summaries)
    }
}

/// Exec output reader that keeps the attached process (and with it the
/// underlying connection) alive until the caller drops the stream.
struct AttachedOutput {
    stdout: Box<dyn AsyncRead + Send + Unpin>,
    _process: AttachedProcess,
}

impl AsyncRead for AttachedOutput {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}
