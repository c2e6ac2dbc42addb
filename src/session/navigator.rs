use crate::session::Route;
use log::debug;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Current route plus the trail that led to it. Cloning shares state.
#[derive(Clone)]
pub struct Navigator {
    current: Arc<watch::Sender<Route>>,
    history: Arc<Mutex<Vec<Route>>>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Home)
    }
}

impl Navigator {
    pub fn new(initial: Route) -> Self {
        let (current, _) = watch::channel(initial.clone());
        Self {
            current: Arc::new(current),
            history: Arc::new(Mutex::new(vec![initial])),
        }
    }

    pub fn navigate(&self, route: Route) {
        debug!("Navigating to {}", route);
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(route.clone());
        self.current.send_replace(route);
    }

    /// Go back one step; stays put at the first route
    pub fn back(&self) -> Route {
        let mut history = self
            .history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if history.len() > 1 {
            history.pop();
        }
        let route = history.last().cloned().unwrap_or(Route::Home);
        drop(history);
        self.current.send_replace(route.clone());
        route
    }

    pub fn current(&self) -> Route {
        self.current.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current.subscribe()
    }

    pub fn history(&self) -> Vec<Route> {
        self.history
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
