//! User, role and grant administration end to end

mod common;

use common::{ADMIN_NAME, admin_session, harness, login_local};
use dbweb_auth::constants::{
    CRED_PASSWORD, DEFAULT_USER_ROLE, PERMISSION_ADMIN, PROVIDER_LOCAL, ROLE_ADMIN,
};
use dbweb_auth::store::SecurityController;
use dbweb_auth::{Credentials, ErrorKind, SessionState};

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

#[tokio::test]
async fn created_user_can_log_in_with_granted_role() {
    let h = harness().await;
    let root = admin_session(&h.server).await;
    let admin = h.server.admin();

    admin.create_user(&root, "bob").await.unwrap();
    admin
        .set_user_credentials(
            &root,
            "bob",
            PROVIDER_LOCAL,
            Credentials::new().with(CRED_PASSWORD, "hunter2"),
        )
        .await
        .unwrap();
    admin
        .grant_user_role(&root, "bob", DEFAULT_USER_ROLE)
        .await
        .unwrap();

    let (bob, result) = login_local(&h.server, "bob", "hunter2").await;
    let info = result.unwrap();
    assert!(!info.is_admin());

    let err = admin.list_users(&bob, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessDenied);

    let users = admin.list_users(&root, Some("bo*")).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].granted_roles, vec![DEFAULT_USER_ROLE]);
    assert_eq!(users[0].origin.provider_id, PROVIDER_LOCAL);
}

#[tokio::test]
async fn create_user_validation() {
    let h = harness().await;
    let root = admin_session(&h.server).await;
    let admin = h.server.admin();

    let err = admin.create_user(&root, "").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    admin.create_user(&root, "bob").await.unwrap();
    let err = admin.create_user(&root, "bob").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    // users and roles share one namespace
    let err = admin.create_user(&root, DEFAULT_USER_ROLE).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[tokio::test]
async fn grant_and_revoke_round_trip() {
    let h = harness().await;
    let root = admin_session(&h.server).await;
    let admin = h.server.admin();
    admin.create_user(&root, "bob").await.unwrap();

    admin
        .grant_user_role(&root, "bob", DEFAULT_USER_ROLE)
        .await
        .unwrap();
    assert_eq!(
        admin.get_granted_roles(&root, "bob").await.unwrap(),
        vec![DEFAULT_USER_ROLE]
    );
    let err = admin
        .grant_user_role(&root, "bob", DEFAULT_USER_ROLE)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyGranted);

    admin
        .revoke_user_role(&root, "bob", DEFAULT_USER_ROLE)
        .await
        .unwrap();
    assert!(admin.get_granted_roles(&root, "bob").await.unwrap().is_empty());
    let err = admin
        .revoke_user_role(&root, "bob", DEFAULT_USER_ROLE)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotGranted);
}

#[tokio::test]
async fn self_operations_are_forbidden() {
    let h = harness().await;
    let root = admin_session(&h.server).await;
    let admin = h.server.admin();

    let err = admin.delete_user(&root, ADMIN_NAME).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfOperationForbidden);

    let err = admin
        .revoke_user_role(&root, ADMIN_NAME, ROLE_ADMIN)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfOperationForbidden);

    let err = admin.delete_role(&root, ROLE_ADMIN).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfOperationForbidden);

    let err = admin
        .set_subject_permissions(&root, ADMIN_NAME, &ids(&[]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SelfOperationForbidden);

    let permissions = h.store.get_user_permissions(ADMIN_NAME).await.unwrap();
    assert!(permissions.contains(PERMISSION_ADMIN));
}

#[tokio::test]
async fn missing_connection_fails_before_mutation() {
    let h = harness().await;
    let root = admin_session(&h.server).await;
    let admin = h.server.admin();

    admin
        .set_connection_subject_access(&root, "pg-main", &ids(&[DEFAULT_USER_ROLE]))
        .await
        .unwrap();

    let err = admin
        .set_connection_subject_access(&root, "conn-missing", &ids(&[DEFAULT_USER_ROLE]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = admin
        .set_subject_connection_access(&root, DEFAULT_USER_ROLE, &ids(&["conn-missing"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let grants = admin
        .get_subject_connection_access(&root, DEFAULT_USER_ROLE)
        .await
        .unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].connection_id, "pg-main");
}

#[tokio::test]
async fn connection_grants_reach_users_through_roles() {
    let h = harness().await;
    let root = admin_session(&h.server).await;
    let admin = h.server.admin();
    admin.create_user(&root, "bob").await.unwrap();
    admin
        .grant_user_role(&root, "bob", DEFAULT_USER_ROLE)
        .await
        .unwrap();

    admin
        .set_subject_connection_access(&root, DEFAULT_USER_ROLE, &ids(&["pg-main", "pg-reports"]))
        .await
        .unwrap();
    let grants = admin.get_granted_connections(&root, "bob").await.unwrap();
    assert_eq!(grants.len(), 2);
    assert!(grants.iter().all(|g| g.subject_id == DEFAULT_USER_ROLE));

    h.catalog.remove("pg-reports");
    admin.connection_removed("pg-reports").await;
    let grants = admin.get_granted_connections(&root, "bob").await.unwrap();
    assert_eq!(grants.len(), 1);
}

#[tokio::test]
async fn forced_refresh_drops_deleted_user() {
    let h = harness().await;
    let root = admin_session(&h.server).await;
    let admin = h.server.admin();

    admin.create_user(&root, "bob").await.unwrap();
    admin
        .set_user_credentials(
            &root,
            "bob",
            PROVIDER_LOCAL,
            Credentials::new().with(CRED_PASSWORD, "hunter2"),
        )
        .await
        .unwrap();
    let (bob, result) = login_local(&h.server, "bob", "hunter2").await;
    result.unwrap();

    admin.delete_user(&root, "bob").await.unwrap();
    let state = bob.force_refresh(h.store.as_ref()).await.unwrap();
    assert_eq!(state, SessionState::Anonymous);
    assert!(bob.auth_info().is_none());
}

#[tokio::test]
async fn forced_refresh_picks_up_new_permissions() {
    let h = harness().await;
    let root = admin_session(&h.server).await;
    let admin = h.server.admin();

    admin.create_user(&root, "bob").await.unwrap();
    admin
        .set_user_credentials(
            &root,
            "bob",
            PROVIDER_LOCAL,
            Credentials::new().with(CRED_PASSWORD, "hunter2"),
        )
        .await
        .unwrap();
    let (bob, result) = login_local(&h.server, "bob", "hunter2").await;
    assert!(!result.unwrap().is_admin());

    admin
        .grant_user_role(&root, "bob", ROLE_ADMIN)
        .await
        .unwrap();
    assert!(!bob.has_permission(PERMISSION_ADMIN));

    bob.force_refresh(h.store.as_ref()).await.unwrap();
    assert!(bob.has_permission(PERMISSION_ADMIN));
    let roles = admin.list_roles(&bob, None).await.unwrap();
    assert_eq!(roles.len(), 2);
}
