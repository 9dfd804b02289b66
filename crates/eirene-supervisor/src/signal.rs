use tokio::signal::unix::{signal, SignalKind};

/// Resolves on the first `SIGINT` or `SIGTERM`.
///
/// Mirrors the process-wide shutdown signal pattern: race `ctrl_c()` against
/// a `SIGTERM` listener, since graceful shutdown should treat either the
/// same way.
pub async fn wait_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
