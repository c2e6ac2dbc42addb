use crate::db::models::{AuthEvent, AuthUser, UserRole};
use crate::messaging::Notifier;
use crate::remote::DataService;
use crate::session::{Navigator, Route};
use anyhow::Result;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Authentication state seen by a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    /// Complete user or nothing; never partial
    pub user: Option<AuthUser>,
    pub loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

impl AuthState {
    fn signed_out() -> Self {
        Self {
            user: None,
            loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_driver(&self) -> bool {
        self.role() == Some(UserRole::Driver)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(UserRole::Admin)
    }

    pub fn role(&self) -> Option<UserRole> {
        self.user.as_ref().map(|u| u.role)
    }
}

/// Where a user with `role` lands after being turned away
pub fn home_for(role: UserRole) -> Route {
    match role {
        UserRole::Admin => Route::Admin,
        UserRole::Driver => Route::Driver,
        UserRole::Unknown => Route::Auth,
    }
}

/// Resolves the current session into a user and gates a page on its role
pub struct SessionResolver {
    remote: Arc<dyn DataService>,
    navigator: Navigator,
    notifier: Notifier,
    required_role: Option<UserRole>,
    state: watch::Sender<AuthState>,
    watcher: Mutex<Option<CancellationToken>>,
}

impl SessionResolver {
    /// Create a new resolver for a page; `required_role` gates it
    pub fn new(
        remote: Arc<dyn DataService>,
        navigator: Navigator,
        notifier: Notifier,
        required_role: Option<UserRole>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::default());
        Arc::new(Self {
            remote,
            navigator,
            notifier,
            required_role,
            state,
            watcher: Mutex::new(None),
        })
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Fetch the session and profile, then apply role gating
    pub async fn resolve(&self) -> AuthState {
        let session = match self.remote.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => return self.sign_out_locally(),
            Err(e) => {
                error!("Auth check error: {}", e);
                return self.sign_out_locally();
            }
        };

        let profile = match self.remote.get_profile(&session.user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                error!("Error fetching profile for {}: {}", session.user.id, e);
                self.notifier.error("Failed to load user profile");
                let state = AuthState::signed_out();
                self.state.send_replace(state.clone());
                return state;
            }
        };

        let user = AuthUser::from_parts(&session, &profile);
        let role = user.role;
        let state = AuthState {
            user: Some(user),
            loading: false,
        };
        self.state.send_replace(state.clone());

        if let Some(required) = self.required_role {
            if role != required {
                self.notifier
                    .error(format!("Access denied. This page is for {}s only.", required));
                self.navigator.navigate(home_for(role));
            }
        }

        state
    }

    fn sign_out_locally(&self) -> AuthState {
        let state = AuthState::signed_out();
        self.state.send_replace(state.clone());
        if self.required_role.is_some() {
            self.navigator.navigate(Route::Auth);
        }
        state
    }

    /// Re-resolve whenever the session changes, until [`unwatch`](Self::unwatch)
    pub fn watch(self: &Arc<Self>) {
        let token = CancellationToken::new();
        if let Some(previous) = self
            .watcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(token.clone())
        {
            previous.cancel();
        }

        let mut events = self.remote.auth_events();
        let resolver: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => event,
                };
                let Some(resolver) = resolver.upgrade() else {
                    break;
                };
                match event {
                    Ok(AuthEvent::SignedOut) => {
                        resolver.sign_out_locally();
                    }
                    Ok(event) => {
                        debug!("Auth event {:?}, resolving session", event);
                        resolver.resolve().await;
                    }
                    Err(RecvError::Lagged(_)) => {
                        resolver.resolve().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Session watcher stopped");
        });
    }

    pub fn unwatch(&self) {
        if let Some(token) = self
            .watcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            token.cancel();
        }
    }

    /// Sign out remotely, then go home. On failure nothing changes.
    pub async fn logout(&self) -> Result<()> {
        match self.remote.sign_out().await {
            Ok(()) => {
                info!("User logged out");
                self.state.send_replace(AuthState::signed_out());
                self.notifier.success("Logged out successfully");
                self.navigator.navigate(Route::Home);
                Ok(())
            }
            Err(e) => {
                warn!("Logout error: {}", e);
                self.notifier.error("Failed to logout");
                Err(e)
            }
        }
    }
}

impl Drop for SessionResolver {
    fn drop(&mut self) {
        self.unwatch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{InMemoryDataService, RemoteOp};

    fn resolver(
        remote: &Arc<InMemoryDataService>,
        role: Option<UserRole>,
    ) -> (Arc<SessionResolver>, Navigator, Notifier) {
        let navigator = Navigator::new(Route::Admin);
        let notifier = Notifier::new();
        let resolver = SessionResolver::new(remote.clone(), navigator.clone(), notifier.clone(), role);
        (resolver, navigator, notifier)
    }

    #[tokio::test]
    async fn no_session_redirects_to_login_when_gated() {
        let remote = Arc::new(InMemoryDataService::new());
        let (resolver, navigator, _) = resolver(&remote, Some(UserRole::Admin));

        let state = resolver.resolve().await;
        assert!(!state.is_authenticated());
        assert!(!state.loading);
        assert_eq!(navigator.current(), Route::Auth);
    }

    #[tokio::test]
    async fn ungated_page_stays_put_without_session() {
        let remote = Arc::new(InMemoryDataService::new());
        let (resolver, navigator, _) = resolver(&remote, None);

        resolver.resolve().await;
        assert_eq!(navigator.current(), Route::Admin);
    }

    #[tokio::test]
    async fn profile_failure_degrades_to_signed_out() {
        let remote = Arc::new(InMemoryDataService::new());
        remote.add_account("a@lot.test", "pw", "Ada", UserRole::Admin);
        remote.sign_in("a@lot.test", "pw").await.unwrap();
        remote.fail_next(RemoteOp::GetProfile);
        let (resolver, _, notifier) = resolver(&remote, Some(UserRole::Admin));

        let state = resolver.resolve().await;
        assert!(state.user.is_none());
        assert_eq!(notifier.messages(), vec!["Failed to load user profile"]);
    }

    #[tokio::test]
    async fn unknown_role_is_sent_to_login() {
        let remote = Arc::new(InMemoryDataService::new());
        remote.add_account_with_role("v@lot.test", "pw", "Val", "valet");
        remote.sign_in("v@lot.test", "pw").await.unwrap();
        let (resolver, navigator, _) = resolver(&remote, Some(UserRole::Driver));

        let state = resolver.resolve().await;
        assert_eq!(state.role(), Some(UserRole::Unknown));
        assert_eq!(navigator.current(), Route::Auth);
    }

    #[tokio::test]
    async fn failed_logout_leaves_state() {
        let remote = Arc::new(InMemoryDataService::new());
        remote.add_account("a@lot.test", "pw", "Ada", UserRole::Admin);
        remote.sign_in("a@lot.test", "pw").await.unwrap();
        let (resolver, navigator, notifier) = resolver(&remote, Some(UserRole::Admin));
        resolver.resolve().await;

        remote.fail_next(RemoteOp::SignOut);
        assert!(resolver.logout().await.is_err());
        assert!(resolver.state().is_admin());
        assert_eq!(navigator.current(), Route::Admin);
        assert_eq!(notifier.messages(), vec!["Failed to logout"]);

        resolver.logout().await.unwrap();
        assert!(!resolver.state().is_authenticated());
        assert_eq!(navigator.current(), Route::Home);
    }
}
