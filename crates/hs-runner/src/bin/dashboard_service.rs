use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use hs_runner::{init_tracing, read_state, DEFAULT_STATE_PATH};

fn error_body(e: impl std::fmt::Display) -> String {
    serde_json::json!({ "error": e.to_string() }).to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(true);

    let addr = std::env::var("HS_DASHBOARD_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8090".to_string());
    let state_path = std::env::var("HS_DASHBOARD_STATE")
        .unwrap_or_else(|_| DEFAULT_STATE_PATH.to_string());

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, state = %state_path, "dashboard service listening");

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let state_path = state_path.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            let _ = socket.read(&mut buffer).await;

            let (status, body) = match tokio::task::spawn_blocking(move || {
                read_state(&state_path)
                    .and_then(|trials| serde_json::to_string(&trials).map_err(Into::into))
            })
            .await
            {
                Ok(Ok(body)) => ("200 OK", body),
                Ok(Err(e)) => {
                    tracing::warn!(%peer, error = %e, "failed to read dashboard state");
                    ("500 Internal Server Error", error_body(e))
                }
                Err(e) => ("500 Internal Server Error", error_body(e)),
            };

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            );

            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
    }
}
