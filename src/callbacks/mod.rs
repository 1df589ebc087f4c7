// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Verb dispatch.
//!
//! Each terminal verb maps to one operation against the backend. Dispatch is
//! a closed tagged enum matched exhaustively: adding a verb without an
//! operation is a compile error, and write verbs carry their already-converted
//! payload so no operation can run without its inputs. Stream-producing verbs
//! (exec, logs) live in their own module because their return type differs
//! from the CRUD outcomes.

pub(crate) mod crud;
pub(crate) mod streams;

use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;

use crate::backend::ResourceBackend;
use crate::error::{Error, Result};
use crate::statement::Statement;

/// The CRUD verbs a statement can terminate with. Write verbs carry the
/// generic representation of the caller's object.
pub(crate) enum Verb {
    Create(DynamicObject),
    Get,
    List,
    Update(DynamicObject),
    Patch,
    Delete,
}

/// Result of one CRUD dispatch
#[derive(Debug)]
pub(crate) enum Outcome {
    Object(DynamicObject),
    Objects(Vec<DynamicObject>),
    Deleted,
}

/// Execute one verb against the backend with a fully-populated statement
pub(crate) async fn dispatch(
    backend: &dyn ResourceBackend,
    stmt: &mut Statement,
    verb: Verb,
) -> Result<Outcome> {
    match verb {
        Verb::Create(obj) => crud::create(backend, stmt, obj).await,
        Verb::Get => crud::get(backend, stmt).await,
        Verb::List => crud::list(backend, stmt).await,
        Verb::Update(obj) => crud::update(backend, stmt, obj).await,
        Verb::Patch => crud::patch(backend, stmt).await,
        Verb::Delete => crud::delete(backend, stmt).await,
    }
}

/// Race a backend call against the statement's cancellation token.
///
/// A token that is already cancelled short-circuits without issuing the call.
pub(crate) async fn with_cancel<T>(
    cancel: Option<&CancellationToken>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match cancel {
        Some(token) => {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            tokio::select! {
                _ = token.cancelled() => Err(Error::Cancelled),
                result = fut => result,
            }
        }
        None => fut.await,
    }
}
