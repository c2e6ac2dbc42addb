use spotwise::db::models::UserRole;
use spotwise::messaging::Notifier;
use spotwise::remote::{DataService, InMemoryDataService, RemoteOp};
use spotwise::session::{Navigator, Route, SessionResolver};
use std::sync::Arc;
use std::time::Duration;

async fn signed_in(role: UserRole) -> Arc<InMemoryDataService> {
    let remote = Arc::new(InMemoryDataService::new());
    remote.add_account("user@lot.test", "secret", "Lot User", role);
    remote.sign_in("user@lot.test", "secret").await.unwrap();
    remote
}

#[tokio::test]
async fn driver_on_admin_page_is_sent_home() {
    let remote = signed_in(UserRole::Driver).await;
    let navigator = Navigator::new(Route::parse("/admin/cameras"));
    let notifier = Notifier::new();
    let resolver = SessionResolver::new(remote, navigator.clone(), notifier.clone(), Some(UserRole::Admin));

    let state = resolver.resolve().await;
    assert!(state.is_driver());
    assert!(!state.loading);
    assert_eq!(navigator.current(), Route::Driver);
    assert_eq!(
        notifier.messages(),
        vec!["Access denied. This page is for admins only."]
    );
}

#[tokio::test]
async fn admin_stays_on_admin_page() {
    let remote = signed_in(UserRole::Admin).await;
    let navigator = Navigator::new(Route::Admin);
    let notifier = Notifier::new();
    let resolver = SessionResolver::new(remote, navigator.clone(), notifier.clone(), Some(UserRole::Admin));

    let state = resolver.resolve().await;
    assert!(state.is_admin());
    assert_eq!(state.user.map(|u| u.full_name), Some("Lot User".to_string()));
    assert_eq!(navigator.current(), Route::Admin);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn sign_out_elsewhere_is_picked_up_by_watch() {
    let remote = signed_in(UserRole::Driver).await;
    let navigator = Navigator::new(Route::Driver);
    let resolver = SessionResolver::new(remote.clone(), navigator.clone(), Notifier::new(), Some(UserRole::Driver));
    resolver.resolve().await;
    resolver.watch();

    let mut states = resolver.subscribe();
    remote.sign_out().await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), states.wait_for(|s| !s.is_authenticated()))
        .await
        .expect("resolver did not observe sign-out")
        .unwrap();
    resolver.unwatch();
}

#[tokio::test]
async fn logout_returns_to_landing_page() {
    let remote = signed_in(UserRole::Admin).await;
    let navigator = Navigator::new(Route::Admin);
    let notifier = Notifier::new();
    let resolver = SessionResolver::new(remote.clone(), navigator.clone(), notifier.clone(), Some(UserRole::Admin));
    resolver.resolve().await;

    resolver.logout().await.unwrap();
    assert_eq!(navigator.current(), Route::Home);
    assert_eq!(notifier.messages(), vec!["Logged out successfully"]);
    assert!(remote.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn driver_sign_in_while_watching_admin_page_redirects() {
    let remote = Arc::new(InMemoryDataService::new());
    remote.add_account("driver@lot.test", "secret", "Lot Driver", UserRole::Driver);
    let navigator = Navigator::new(Route::Admin);
    let notifier = Notifier::new();
    let resolver = SessionResolver::new(remote.clone(), navigator.clone(), notifier.clone(), Some(UserRole::Admin));
    assert!(!resolver.resolve().await.is_authenticated());
    assert_eq!(navigator.current(), Route::Auth);
    resolver.watch();

    let mut states = resolver.subscribe();
    remote.sign_in("driver@lot.test", "secret").await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), states.wait_for(|s| s.is_driver()))
        .await
        .expect("resolver did not observe sign-in")
        .unwrap();
    assert_eq!(navigator.current(), Route::Driver);
    assert_eq!(navigator.current().to_string(), "/driver");
    assert_eq!(
        notifier.messages(),
        vec!["Access denied. This page is for admins only."]
    );
    resolver.unwatch();
}

#[tokio::test]
async fn token_refresh_re_resolves_the_session() {
    let remote = signed_in(UserRole::Driver).await;
    let navigator = Navigator::new(Route::Admin);
    let resolver = SessionResolver::new(remote.clone(), navigator.clone(), Notifier::new(), Some(UserRole::Admin));
    resolver.watch();

    let mut states = resolver.subscribe();
    remote.refresh_session().await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), states.wait_for(|s| s.is_driver()))
        .await
        .expect("resolver did not observe token refresh")
        .unwrap();
    assert_eq!(navigator.current(), Route::Driver);
    resolver.unwatch();
}

#[tokio::test]
async fn missed_auth_events_still_trigger_a_resolve() {
    let remote = signed_in(UserRole::Driver).await;
    let navigator = Navigator::new(Route::Admin);
    let resolver = SessionResolver::new(remote.clone(), navigator.clone(), Notifier::new(), Some(UserRole::Admin));
    resolver.watch();
    remote.reset_calls();

    // Overflow the auth channel before the watcher gets to run
    for _ in 0..20 {
        remote.refresh_session().await.unwrap();
    }

    // One resolve for the gap, then one per retained event
    tokio::time::timeout(Duration::from_secs(2), async {
        while remote.call_count(RemoteOp::GetProfile) < 17 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("watcher did not catch up");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(remote.call_count(RemoteOp::GetProfile), 17);
    assert!(resolver.state().is_driver());
    assert_eq!(navigator.current(), Route::Driver);
    resolver.unwatch();
}
