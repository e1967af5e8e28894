//! Edge Case Testing
//!
//! Boundary conditions for reconciliation against a `SQLite` dictionary:
//! - Messy grant input (quotes, brackets, whitespace, duplicates)
//! - Unicode and statement fragments in names
//! - Very long grant lists
//! - Self grants rejected by the dictionary
//! - Cancellation and time limits

#![cfg(feature = "sqlite")]

use pretty_assertions::assert_eq;
use std::path::PathBuf;

use privsync::engine::sqlite::SYSTEM_PRIVILEGES;
use privsync::{
    CancellationToken, Capabilities, ConnectionConfig, DesiredState, Outcome, Principal,
    PrincipalKind, ReconcileRequest, Reconciler, SqliteSession,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_db() -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};

    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let temp_file = std::env::temp_dir().join(format!("privsync_edge_{timestamp}.db"));
    let _ = std::fs::remove_file(&temp_file);

    let session = SqliteSession::open(&ConnectionConfig::new(temp_file.clone()))
        .expect("Failed to create database");
    session.init_catalog().expect("Failed to create dictionary");
    session.create_user("SCOTT").unwrap();
    session.create_role("APP_ROLE").unwrap();

    temp_file
}

fn cleanup_db(path: &PathBuf) {
    let _ = std::fs::remove_file(path);
}

fn seeded_memory_session() -> SqliteSession {
    let session = SqliteSession::in_memory().unwrap();
    session.init_catalog().unwrap();
    session.create_user("SCOTT").unwrap();
    session.create_role("APP_ROLE").unwrap();
    session
}

fn scott(grants: Vec<String>, state: DesiredState) -> ReconcileRequest {
    ReconcileRequest::new(Principal::new(PrincipalKind::Schema, "scott").unwrap(), Some(grants), state)
}

async fn apply(session: &mut SqliteSession, request: &ReconcileRequest) -> Outcome {
    Reconciler::new(session, Capabilities::with_apply()).run(request).await
}

// ============================================================================
// Input Normalization
// ============================================================================

#[tokio::test]
async fn test_messy_grant_input() {
    let mut session = seeded_memory_session();
    let request = scott(
        vec![
            "['connect', \"Resource\"]".into(),
            "  create    session  ".into(),
            "CONNECT".into(),
            ",,".into(),
        ],
        DesiredState::Present,
    );

    let outcome = apply(&mut session, &request).await;
    assert_eq!(
        outcome,
        Outcome::changed(
            "Updated privileges for schema SCOTT",
            vec!["GRANT CONNECT, CREATE SESSION, RESOURCE TO SCOTT".to_string()]
        )
    );
}

#[tokio::test]
async fn test_quoted_principal_name() {
    let principal = Principal::new(PrincipalKind::Schema, " 'Scott' ").unwrap();
    assert_eq!(principal.name(), "SCOTT");

    let mut session = seeded_memory_session();
    let request = ReconcileRequest::new(principal, Some(vec!["dba".into()]), DesiredState::Present);
    assert!(apply(&mut session, &request).await.is_changed());
}

#[tokio::test]
async fn test_unicode_and_fragments_rejected() {
    assert!(Principal::new(PrincipalKind::Schema, "scött").is_err());
    assert!(Principal::new(PrincipalKind::Role, "app_role; drop user sys").is_err());

    let mut session = seeded_memory_session();
    for bad in ["créate session", "dba; revoke dba from sys", "connect--"] {
        let outcome = apply(&mut session, &scott(vec![bad.into()], DesiredState::Present)).await;
        match outcome {
            Outcome::Failed { code, .. } => assert_eq!(code, "VALIDATION_ERROR"),
            other => panic!("expected validation failure for {bad:?}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_clause_keywords_in_grants_rejected() {
    let mut session = seeded_memory_session();
    let request =
        scott(vec!["dba to public".into(), "connect with admin option".into()], DesiredState::Present);

    match apply(&mut session, &request).await {
        Outcome::Failed { code, message } => {
            assert_eq!(code, "VALIDATION_ERROR");
            assert!(message.contains("statement keyword"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    // Nothing reached the dictionary
    let held = ReconcileRequest::new(
        Principal::new(PrincipalKind::Schema, "scott").unwrap(),
        None,
        DesiredState::RemoveAll,
    );
    assert!(!apply(&mut session, &held).await.is_changed());
}

#[tokio::test]
async fn test_empty_grants_rejected_for_present_and_absent() {
    let mut session = seeded_memory_session();
    for state in [DesiredState::Present, DesiredState::Absent] {
        let request = ReconcileRequest::new(
            Principal::new(PrincipalKind::Schema, "scott").unwrap(),
            None,
            state,
        );
        let outcome = apply(&mut session, &request).await;
        assert!(outcome.is_failed(), "{state} without grants should fail");
        assert!(outcome.message().contains("grants are required"));
    }
}

// ============================================================================
// Large Inputs
// ============================================================================

#[tokio::test]
async fn test_every_system_privilege_in_one_call() {
    let temp_file = create_test_db();
    let mut session = SqliteSession::open(&ConnectionConfig::new(temp_file.clone())).unwrap();

    let grants: Vec<String> = SYSTEM_PRIVILEGES.iter().map(|p| p.to_lowercase()).collect();
    let request = scott(grants, DesiredState::Present);

    match apply(&mut session, &request).await {
        Outcome::Changed { statements_applied, .. } => {
            assert_eq!(statements_applied.len(), 1);
            assert!(statements_applied[0].starts_with("GRANT ALTER ANY TABLE, ALTER SESSION"));
            assert!(statements_applied[0].ends_with("UPDATE ANY TABLE TO SCOTT"));
        }
        other => panic!("expected change, got {other:?}"),
    }
    assert!(!apply(&mut session, &request).await.is_changed());

    // REMOVEALL takes them all back in one statement
    let remove_all = ReconcileRequest::new(
        Principal::new(PrincipalKind::Schema, "scott").unwrap(),
        None,
        DesiredState::RemoveAll,
    );
    match apply(&mut session, &remove_all).await {
        Outcome::Changed { statements_applied, .. } => assert_eq!(statements_applied.len(), 1),
        other => panic!("expected change, got {other:?}"),
    }

    cleanup_db(&temp_file);
}

// ============================================================================
// Dictionary Rejections
// ============================================================================

#[tokio::test]
async fn test_role_granted_to_itself_fails() {
    let mut session = seeded_memory_session();
    let request = ReconcileRequest::new(
        Principal::new(PrincipalKind::Role, "app_role").unwrap(),
        Some(vec!["app_role".into()]),
        DesiredState::Present,
    );

    match apply(&mut session, &request).await {
        Outcome::Failed { code, message } => {
            assert_eq!(code, "EXECUTION_FAILED");
            assert!(message.contains("ORA-01934"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

// ============================================================================
// Cancellation and Time Limits
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_first_statement() {
    let mut session = seeded_memory_session();
    let token = CancellationToken::new();
    token.cancel();

    let outcome = Reconciler::new(&mut session, Capabilities::with_apply())
        .with_cancellation(token)
        .run(&scott(vec!["connect".into()], DesiredState::Present))
        .await;
    match outcome {
        Outcome::Failed { code, .. } => assert_eq!(code, "CANCELLED"),
        other => panic!("expected cancellation, got {other:?}"),
    }

    // Nothing was granted, so a real run still has work to do
    assert!(apply(&mut session, &scott(vec!["connect".into()], DesiredState::Present))
        .await
        .is_changed());
}

#[tokio::test]
async fn test_timeout_capability() {
    let temp_file = create_test_db();
    let config = ConnectionConfig::new(temp_file.clone()).with_timeout_ms(5000);
    let mut session = SqliteSession::open(&config).unwrap();

    // A generous limit does not get in the way
    let caps = Capabilities::with_apply().timeout_ms(config.timeout_ms);
    let outcome = Reconciler::new(&mut session, caps)
        .run(&scott(vec!["create session".into()], DesiredState::Present))
        .await;
    assert!(outcome.is_changed());

    cleanup_db(&temp_file);
}
