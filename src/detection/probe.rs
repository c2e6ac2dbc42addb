use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Stopped,
}

impl ServerStatus {
    /// What to tell the user when the server cannot be reached
    pub fn instructions(&self) -> Option<&'static str> {
        match self {
            ServerStatus::Running => None,
            ServerStatus::Stopped => Some(
                "The AI detection server is not running. Start it with `spotwise feed-server` \
                 or point live_feed.server_url at a running analytics service.",
            ),
        }
    }
}

/// Check whether the analytics socket accepts connections.
///
/// The probing socket is closed right away; an attempt still pending after
/// `limit` is dropped and reads as stopped.
pub async fn check_server(url: &str, limit: Duration) -> ServerStatus {
    match timeout(limit, connect_async(url)).await {
        Ok(Ok((mut socket, _))) => {
            let _ = socket.close(None).await;
            info!("Analytics server at {} is running", url);
            ServerStatus::Running
        }
        Ok(Err(e)) => {
            debug!("Analytics server at {} refused: {}", url, e);
            ServerStatus::Stopped
        }
        Err(_) => {
            debug!("Analytics server probe at {} timed out after {:?}", url, limit);
            ServerStatus::Stopped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_port_reads_as_stopped() {
        let status = check_server("ws://127.0.0.1:1", Duration::from_secs(3)).await;
        assert_eq!(status, ServerStatus::Stopped);
        assert!(status.instructions().is_some());
    }

    #[tokio::test]
    async fn bad_url_reads_as_stopped() {
        let status = check_server("not a url", Duration::from_millis(100)).await;
        assert_eq!(status, ServerStatus::Stopped);
    }
}
