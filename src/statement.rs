//! Per-chain statement.
//!
//! A statement accumulates intent across fluent calls and is consumed by
//! exactly one terminal verb. It is never shared between chains; every field
//! is written without synchronization on that assumption.

use kube::api::LogParams;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::backend::PatchKind;
use crate::config::DEFAULT_NAMESPACE;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::resolve::ResourceIdentity;

/// Accumulated query/mutation intent for one fluent chain
#[derive(Default)]
pub struct Statement {
    pub(crate) identity: Option<ResourceIdentity>,
    pub(crate) namespace: Option<String>,
    pub(crate) all_namespaces: bool,
    pub(crate) name: Option<String>,
    pub(crate) container: Option<String>,
    pub(crate) command: Vec<String>,
    pub(crate) filter: Filter,
    /// Explicitly-set selectors, merged with condition-derived ones at list time
    pub(crate) label_selector: Option<String>,
    pub(crate) field_selector: Option<String>,
    pub(crate) patch: Option<(PatchKind, Value)>,
    pub(crate) log_params: LogParams,
    pub(crate) cancel: Option<CancellationToken>,
    /// First error raised while the chain was being built
    pub(crate) error: Option<Error>,
}

impl Statement {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The resolved resource identity, if resolution has happened
    pub fn identity(&self) -> Option<&ResourceIdentity> {
        self.identity.as_ref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Record a chain error; the first one wins and is surfaced by the
    /// terminal verb.
    pub(crate) fn fail(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Record a resolved identity. Re-resolving to a different identity is a
    /// usage error, never a silent overwrite.
    pub(crate) fn set_identity(&mut self, identity: ResourceIdentity) {
        match &self.identity {
            Some(current) if *current != identity => {
                self.fail(Error::IdentityConflict {
                    current: current.to_string(),
                    requested: identity.to_string(),
                });
            }
            _ => self.identity = Some(identity),
        }
    }

    pub(crate) fn resolved(&self) -> Result<&ResourceIdentity> {
        self.identity.as_ref().ok_or(Error::MissingResource)
    }

    /// Namespace for single-object operations, defaulted when unset
    pub(crate) fn effective_namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Namespace scope for list operations: `None` means all namespaces
    /// (explicitly requested, or a cluster-scoped resource)
    pub(crate) fn list_scope(&self) -> Option<&str> {
        let namespaced = self.identity.as_ref().is_some_and(|id| id.namespaced);
        if !namespaced || self.all_namespaces {
            None
        } else {
            Some(self.effective_namespace())
        }
    }

    pub(crate) fn require_name(&self) -> Result<&str> {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(Error::MissingName),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod_identity() -> ResourceIdentity {
        ResourceIdentity {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Pod".to_string(),
            plural: "pods".to_string(),
            namespaced: true,
        }
    }

    fn node_identity() -> ResourceIdentity {
        ResourceIdentity {
            group: String::new(),
            version: "v1".to_string(),
            kind: "Node".to_string(),
            plural: "nodes".to_string(),
            namespaced: false,
        }
    }

    #[test]
    fn test_identity_is_write_once() {
        let mut stmt = Statement::new();
        stmt.set_identity(pod_identity());
        // same identity again is a no-op
        stmt.set_identity(pod_identity());
        assert!(stmt.error.is_none());

        stmt.set_identity(node_identity());
        assert!(matches!(stmt.error, Some(Error::IdentityConflict { .. })));
        // the original resolution is untouched
        assert_eq!(stmt.identity.as_ref().unwrap().kind, "Pod");
    }

    #[test]
    fn test_default_namespace() {
        let stmt = Statement::new();
        assert_eq!(stmt.effective_namespace(), "default");
    }

    #[test]
    fn test_list_scope() {
        let mut stmt = Statement::new();
        stmt.set_identity(pod_identity());
        stmt.namespace = Some("infra".to_string());
        assert_eq!(stmt.list_scope(), Some("infra"));

        stmt.all_namespaces = true;
        assert_eq!(stmt.list_scope(), None);

        let mut cluster_stmt = Statement::new();
        cluster_stmt.set_identity(node_identity());
        assert_eq!(cluster_stmt.list_scope(), None);
    }

    #[test]
    fn test_require_name() {
        let mut stmt = Statement::new();
        assert!(matches!(stmt.require_name(), Err(Error::MissingName)));
        stmt.name = Some(String::new());
        assert!(matches!(stmt.require_name(), Err(Error::MissingName)));
        stmt.name = Some("web-0".to_string());
        assert_eq!(stmt.require_name().unwrap(), "web-0");
    }

    #[test]
    fn test_first_error_wins() {
        let mut stmt = Statement::new();
        stmt.fail(Error::MissingName);
        stmt.fail(Error::MissingResource);
        assert!(matches!(stmt.error, Some(Error::MissingName)));
    }
}
