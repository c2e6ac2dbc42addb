use crate::session::{Navigator, Route};
use anyhow::Result;
use log::error;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryState {
    Ok,
    Failed { message: String },
}

/// Contains failures of a unit of work so they surface as a fallback state
/// instead of tearing down the caller.
///
/// Once failed, further units are not run until `retry` resets the boundary.
pub struct ErrorBoundary {
    state: watch::Sender<BoundaryState>,
    navigator: Navigator,
}

impl ErrorBoundary {
    pub fn new(navigator: Navigator) -> Self {
        let (state, _) = watch::channel(BoundaryState::Ok);
        Self { state, navigator }
    }

    pub fn state(&self) -> BoundaryState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoundaryState> {
        self.state.subscribe()
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.state.borrow(), BoundaryState::Failed { .. })
    }

    /// Run `unit` on its own task. Errors and panics move the boundary to
    /// `Failed` and yield `None`.
    pub async fn run<T, Fut>(&self, unit: Fut) -> Option<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_failed() {
            return None;
        }

        let message = match tokio::spawn(unit).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e.to_string(),
            Err(e) if e.is_panic() => panic_message(e.into_panic()),
            Err(e) => e.to_string(),
        };

        error!("Error caught by boundary: {}", message);
        self.state.send_replace(BoundaryState::Failed { message });
        None
    }

    /// Clear the failure so the next `run` executes again
    pub fn retry(&self) {
        self.state.send_replace(BoundaryState::Ok);
    }

    /// Leave the failed view for the admin dashboard
    pub fn escape(&self) {
        self.retry();
        self.navigator.navigate(Route::Admin);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    async fn exploding_decoder() -> Result<()> {
        panic!("frame decoder exploded");
    }

    async fn engine_fault() -> Result<()> {
        Err(Error::Internal("engine fault".to_string()).into())
    }

    async fn failing_unit() -> Result<()> {
        anyhow::bail!("boom")
    }

    #[tokio::test]
    async fn passes_values_through() {
        let boundary = ErrorBoundary::new(Navigator::default());
        assert_eq!(boundary.run(async { Ok(7) }).await, Some(7));
        assert_eq!(boundary.state(), BoundaryState::Ok);
    }

    #[tokio::test]
    async fn errors_fail_the_boundary_until_retry() {
        let boundary = ErrorBoundary::new(Navigator::default());
        assert!(boundary.run(engine_fault()).await.is_none());
        assert_eq!(
            boundary.state(),
            BoundaryState::Failed {
                message: "Internal error: engine fault".to_string()
            }
        );

        assert_eq!(boundary.run(async { Ok(1) }).await, None);
        boundary.retry();
        assert_eq!(boundary.run(async { Ok(1) }).await, Some(1));
    }

    #[tokio::test]
    async fn panics_are_contained() {
        let boundary = ErrorBoundary::new(Navigator::default());
        assert!(boundary.run(exploding_decoder()).await.is_none());
        assert_eq!(
            boundary.state(),
            BoundaryState::Failed {
                message: "frame decoder exploded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn escape_goes_to_admin() {
        let navigator = Navigator::default();
        let boundary = ErrorBoundary::new(navigator.clone());
        assert!(boundary.run(failing_unit()).await.is_none());

        boundary.escape();
        assert_eq!(navigator.current(), Route::Admin);
        assert_eq!(boundary.state(), BoundaryState::Ok);
    }
}
