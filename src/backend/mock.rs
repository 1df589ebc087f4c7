//! In-memory backend for testing.
//!
//! Stores objects in a plain map keyed by plural resource name, applies
//! label/field selectors the way the API server would, and counts operations
//! so tests can assert how many calls actually left the engine, without a
//! cluster.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use kube::api::{DynamicObject, LogParams};
use kube::core::ErrorResponse;
use serde_json::Value;

use super::{ByteStream, CrdSummary, ListQuery, LogStream, PatchKind, ResourceBackend};
use crate::error::{Error, Result};
use crate::resolve::ResourceIdentity;

/// Counts of operations performed, for test assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub creates: usize,
    pub gets: usize,
    pub lists: usize,
    pub updates: usize,
    pub patches: usize,
    pub deletes: usize,
    pub execs: usize,
    pub log_streams: usize,
    /// CRD discovery calls issued by the resolver
    pub crd_lists: usize,
}

#[derive(Default)]
struct MockState {
    /// plural resource name -> objects
    objects: HashMap<String, Vec<DynamicObject>>,
    counts: OperationCounts,
    /// container the last log stream was opened for
    last_log_container: Option<String>,
}

/// In-memory [`ResourceBackend`]
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<RwLock<MockState>>,
    crds: Vec<CrdSummary>,
    exec_output: Vec<u8>,
    log_output: Vec<u8>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the CRD list answered to discovery queries
    pub fn with_crds(mut self, crds: Vec<CrdSummary>) -> Self {
        self.crds = crds;
        self
    }

    /// Pre-populate stored objects for a plural resource name
    pub fn with_objects(self, plural: &str, objects: Vec<DynamicObject>) -> Self {
        self.state
            .write()
            .unwrap()
            .objects
            .insert(plural.to_string(), objects);
        self
    }

    /// Fix the bytes returned by exec streams
    pub fn with_exec_output(mut self, output: impl Into<Vec<u8>>) -> Self {
        self.exec_output = output.into();
        self
    }

    /// Fix the bytes returned by log streams
    pub fn with_log_output(mut self, output: impl Into<Vec<u8>>) -> Self {
        self.log_output = output.into();
        self
    }

    /// Operation counts so far
    pub fn counts(&self) -> OperationCounts {
        self.state.read().unwrap().counts.clone()
    }

    /// Container bound into the most recent log stream request
    pub fn last_log_container(&self) -> Option<String> {
        self.state.read().unwrap().last_log_container.clone()
    }

    /// Snapshot of the stored objects for a plural resource name
    pub fn stored(&self, plural: &str) -> Vec<DynamicObject> {
        self.state
            .read()
            .unwrap()
            .objects
            .get(plural)
            .cloned()
            .unwrap_or_default()
    }

    fn api_error(code: u16, reason: &str, message: String) -> Error {
        Error::Api(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message,
            reason: reason.to_string(),
            code,
        }))
    }

    fn not_found(identity: &ResourceIdentity, name: &str) -> Error {
        Self::api_error(
            404,
            "NotFound",
            format!("{} {:?} not found", identity.plural, name),
        )
    }
}

fn in_scope(obj: &DynamicObject, ns: Option<&str>) -> bool {
    match ns {
        Some(ns) => obj.metadata.namespace.as_deref() == Some(ns),
        None => true,
    }
}

/// Evaluate a comma-joined `k=v` label selector against object labels
fn matches_labels(obj: &DynamicObject, selector: &str) -> bool {
    let labels = obj.metadata.labels.clone().unwrap_or_default();
    selector.split(',').all(|pair| {
        match pair.split_once('=') {
            Some((k, v)) => labels.get(k.trim()).map(String::as_str) == Some(v.trim()),
            None => false,
        }
    })
}

/// Evaluate a comma-joined `path=v` field selector against the object JSON
fn matches_fields(obj: &DynamicObject, selector: &str) -> bool {
    let value = match serde_json::to_value(obj) {
        Ok(v) => v,
        Err(_) => return false,
    };
    selector.split(',').all(|pair| {
        match pair.split_once('=') {
            Some((path, expected)) => {
                let mut current = &value;
                for part in path.trim().split('.') {
                    match current.get(part) {
                        Some(next) => current = next,
                        None => return false,
                    }
                }
                match current {
                    Value::String(s) => s == expected.trim(),
                    other => other.to_string() == expected.trim(),
                }
            }
            None => false,
        }
    })
}

#[async_trait]
impl ResourceBackend for MockBackend {
    async fn create(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        obj: DynamicObject,
    ) -> Result<DynamicObject> {
        let mut state = self.state.write().unwrap();
        state.counts.creates += 1;

        let name = obj.metadata.name.clone().unwrap_or_default();
        let entries = state.objects.entry(identity.plural.clone()).or_default();
        let exists = entries
            .iter()
            .any(|o| o.metadata.name.as_deref() == Some(name.as_str()) && in_scope(o, ns));
        if exists {
            return Err(Self::api_error(
                409,
                "AlreadyExists",
                format!("{} {:?} already exists", identity.plural, name),
            ));
        }
        entries.push(obj.clone());
        Ok(obj)
    }

    async fn get(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        let mut state = self.state.write().unwrap();
        state.counts.gets += 1;

        state
            .objects
            .get(&identity.plural)
            .and_then(|entries| {
                entries
                    .iter()
                    .find(|o| o.metadata.name.as_deref() == Some(name) && in_scope(o, ns))
                    .cloned()
            })
            .ok_or_else(|| Self::not_found(identity, name))
    }

    async fn list(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        query: &ListQuery,
    ) -> Result<Vec<DynamicObject>> {
        let mut state = self.state.write().unwrap();
        state.counts.lists += 1;

        let items = state
            .objects
            .get(&identity.plural)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|o| in_scope(o, ns))
                    .filter(|o| {
                        query
                            .label_selector
                            .as_deref()
                            .is_none_or(|sel| matches_labels(o, sel))
                    })
                    .filter(|o| {
                        query
                            .field_selector
                            .as_deref()
                            .is_none_or(|sel| matches_fields(o, sel))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }

    async fn update(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        obj: DynamicObject,
    ) -> Result<DynamicObject> {
        let mut state = self.state.write().unwrap();
        state.counts.updates += 1;

        let name = obj.metadata.name.clone().ok_or(Error::MissingName)?;
        let entries = state.objects.entry(identity.plural.clone()).or_default();
        match entries
            .iter_mut()
            .find(|o| o.metadata.name.as_deref() == Some(name.as_str()) && in_scope(o, ns))
        {
            Some(slot) => {
                *slot = obj.clone();
                Ok(obj)
            }
            None => Err(Self::not_found(identity, &name)),
        }
    }

    async fn patch(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
        _kind: PatchKind,
        body: Value,
    ) -> Result<DynamicObject> {
        let mut state = self.state.write().unwrap();
        state.counts.patches += 1;

        let entries = state.objects.entry(identity.plural.clone()).or_default();
        match entries
            .iter_mut()
            .find(|o| o.metadata.name.as_deref() == Some(name) && in_scope(o, ns))
        {
            Some(slot) => {
                // shallow merge is enough for tests
                let mut merged = serde_json::to_value(&*slot).map_err(Error::Conversion)?;
                if let (Value::Object(target), Value::Object(source)) = (&mut merged, &body) {
                    for (k, v) in source {
                        target.insert(k.clone(), v.clone());
                    }
                }
                *slot = serde_json::from_value(merged).map_err(Error::Conversion)?;
                Ok(slot.clone())
            }
            None => Err(Self::not_found(identity, name)),
        }
    }

    async fn delete(
        &self,
        identity: &ResourceIdentity,
        ns: Option<&str>,
        name: &str,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.counts.deletes += 1;

        let entries = state.objects.entry(identity.plural.clone()).or_default();
        let before = entries.len();
        entries.retain(|o| !(o.metadata.name.as_deref() == Some(name) && in_scope(o, ns)));
        if entries.len() == before {
            return Err(Self::not_found(identity, name));
        }
        Ok(())
    }

    async fn exec(
        &self,
        _ns: &str,
        _pod: &str,
        _container: Option<&str>,
        _command: &[String],
    ) -> Result<ByteStream> {
        let mut state = self.state.write().unwrap();
        state.counts.execs += 1;
        Ok(Box::new(Cursor::new(self.exec_output.clone())))
    }

    async fn open_logs(&self, _ns: &str, _pod: &str, params: &LogParams) -> Result<LogStream> {
        let mut state = self.state.write().unwrap();
        state.counts.log_streams += 1;
        state.last_log_container = params.container.clone();
        Ok(Box::new(Cursor::new(self.log_output.clone())))
    }

    fn builtin_resources(&self) -> Vec<ResourceIdentity> {
        crate::resolve::builtin_identities()
    }

    async fn custom_resource_definitions(&self) -> Result<Vec<CrdSummary>> {
        let mut state = self.state.write().unwrap();
        state.counts.crd_lists += 1;
        Ok(self.crds.clone())
    }
}
