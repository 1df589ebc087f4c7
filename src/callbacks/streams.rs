//! Stream-producing operations: exec and logs.
//!
//! Both return live handles the caller owns; nothing here buffers output or
//! closes streams on a timer. The handles stay valid until dropped or until
//! the statement's cancellation token fires, whichever comes first.

use tracing::debug;

use super::with_cancel;
use crate::backend::{ByteStream, LogStream, ResourceBackend};
use crate::error::{Error, Result};
use crate::statement::Statement;

/// Stream command execution output from a container in the named pod
pub(crate) async fn exec(
    backend: &dyn ResourceBackend,
    stmt: &mut Statement,
) -> Result<ByteStream> {
    let pod = stmt.require_name()?.to_string();
    if stmt.command.is_empty() {
        return Err(Error::MissingCommand);
    }
    let ns = stmt.effective_namespace().to_string();
    let container = stmt.container.clone();
    let command = stmt.command.clone();

    debug!(namespace = %ns, pod = %pod, command = ?command, "exec");
    with_cancel(
        stmt.cancel.as_ref(),
        backend.exec(&ns, &pod, container.as_deref(), &command),
    )
    .await
}

/// Open a log stream for a single container inside the named pod.
///
/// The statement's container name is bound into the log options before the
/// call goes out.
pub(crate) async fn logs(
    backend: &dyn ResourceBackend,
    stmt: &mut Statement,
) -> Result<LogStream> {
    let pod = stmt.require_name()?.to_string();
    let ns = stmt.effective_namespace().to_string();

    let mut params = stmt.log_params.clone();
    if params.container.is_none() {
        params.container = stmt.container.clone();
    }

    debug!(namespace = %ns, pod = %pod, container = ?params.container, "open logs");
    with_cancel(stmt.cancel.as_ref(), backend.open_logs(&ns, &pod, &params)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::io::{AsyncBufReadExt, AsyncReadExt};

    use crate::backend::MockBackend;
    use crate::statement::Statement;

    fn stmt_for(pod: &str) -> Statement {
        let mut stmt = Statement::new();
        stmt.name = Some(pod.to_string());
        stmt
    }

    #[tokio::test]
    async fn test_exec_streams_output() {
        let backend = Arc::new(MockBackend::new().with_exec_output("hello\n"));
        let mut stmt = stmt_for("web-0");
        stmt.command = vec!["cat".to_string(), "/etc/hostname".to_string()];

        let mut stream = exec(backend.as_ref(), &mut stmt).await.unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "hello\n");
        assert_eq!(backend.counts().execs, 1);
    }

    #[tokio::test]
    async fn test_exec_requires_command() {
        let backend = Arc::new(MockBackend::new());
        let mut stmt = stmt_for("web-0");

        let err = match exec(backend.as_ref(), &mut stmt).await {
            Err(e) => e,
            Ok(_) => panic!("expected exec to fail"),
        };
        assert!(matches!(err, Error::MissingCommand));
        assert_eq!(backend.counts().execs, 0);
    }

    #[tokio::test]
    async fn test_logs_bind_container_and_stream_lines() {
        let backend = Arc::new(MockBackend::new().with_log_output("line1\nline2\n"));
        let mut stmt = stmt_for("web-0");
        stmt.container = Some("app".to_string());

        let stream = logs(backend.as_ref(), &mut stmt).await.unwrap();
        assert_eq!(backend.last_log_container().as_deref(), Some("app"));

        let mut lines = stream.lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("line1"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("line2"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logs_require_pod_name() {
        let backend = Arc::new(MockBackend::new());
        let mut stmt = Statement::new();

        let err = match logs(backend.as_ref(), &mut stmt).await {
            Err(e) => e,
            Ok(_) => panic!("expected logs to fail"),
        };
        assert!(matches!(err, Error::MissingName));
        assert_eq!(backend.counts().log_streams, 0);
    }
}
