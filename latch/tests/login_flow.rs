use std::sync::Arc;

use latch::{Credentials, LatchBuilder, LoginError, LoginSuccess, TokenStorage};
use latch_core::directory::{CredentialRecord, InMemoryDirectory};
use latch_core::storage::{AUTH_TOKEN_KEY, LOCKOUT_KEY};
use latch_core::{KeyValueStore, MemoryStore};
use tokio::net::TcpListener;

const EMAIL: &str = "user@example.com";
const PASSWORD: &str = "correct horse";

async fn spawn_authority() -> String {
    let _ = tracing_subscriber::fmt().try_init();

    let directory = Arc::new(InMemoryDirectory::new());
    directory.add_user(CredentialRecord::new(EMAIL, PASSWORD));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, latch_axum::create_router(directory))
            .await
            .unwrap();
    });

    format!("http://{addr}{}", latch_axum::LOGIN_PATH)
}

#[tokio::test]
async fn test_login_with_remember_persists_token() {
    let endpoint = spawn_authority().await;
    let durable = Arc::new(MemoryStore::new());
    let ephemeral = Arc::new(MemoryStore::new());

    let controller = LatchBuilder::new()
        .with_store(durable.clone())
        .with_ephemeral_store(ephemeral.clone())
        .with_http_authority(endpoint)
        .build()
        .await
        .unwrap();

    let success = controller
        .submit(&Credentials::new(EMAIL, PASSWORD).remember(true))
        .await
        .unwrap();

    assert_eq!(
        success,
        LoginSuccess {
            destination: "/dashboard".to_string(),
            token_storage: TokenStorage::Durable,
        }
    );
    let token = durable.get(AUTH_TOKEN_KEY).await.unwrap().unwrap();
    assert!(token.starts_with("tok_"));
    assert!(ephemeral.get(AUTH_TOKEN_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_repeated_failures_lock_then_refuse_locally() {
    let endpoint = spawn_authority().await;
    let durable = Arc::new(MemoryStore::new());

    let controller = LatchBuilder::new()
        .with_store(durable.clone())
        .with_http_authority(endpoint)
        .build()
        .await
        .unwrap();

    let wrong = Credentials::new(EMAIL, "wrong password");
    for remaining in (1..=4).rev() {
        let err = controller.submit(&wrong).await.unwrap_err();
        assert!(matches!(
            err,
            LoginError::AuthenticationRejected { remaining: r, .. } if r == remaining
        ));
    }

    let err = controller.submit(&wrong).await.unwrap_err();
    assert!(matches!(err, LoginError::LockoutEngaged { attempts: 5, .. }));
    assert!(durable.get(LOCKOUT_KEY).await.unwrap().is_some());

    // even the right password is refused while locked
    let err = controller
        .submit(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Account is locked. Please try again later."
    );

    controller.shutdown().await;
}

#[tokio::test]
async fn test_invalid_input_is_caught_locally() {
    let endpoint = spawn_authority().await;
    let controller = LatchBuilder::new()
        .with_store(Arc::new(MemoryStore::new()))
        .with_http_authority(endpoint)
        .build()
        .await
        .unwrap();

    let err = controller
        .submit(&Credentials::new("bad@x", PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::Validation(_)));
    assert_eq!(controller.lockout_status().await.attempts, 0);
}

#[tokio::test]
async fn test_unreachable_authority_is_system_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let controller = LatchBuilder::new()
        .with_store(Arc::new(MemoryStore::new()))
        .with_http_authority(format!("http://{addr}/api/auth/login"))
        .build()
        .await
        .unwrap();

    let err = controller
        .submit(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::RemoteUnavailable(_)));
    assert_eq!(
        err.general_message().as_deref(),
        Some("System error, please try again later.")
    );
    assert_eq!(controller.lockout_status().await.attempts, 0);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_lock_survives_restart_with_sqlite() {
    let endpoint = spawn_authority().await;
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("latch.db").display());

    {
        let controller = LatchBuilder::new()
            .with_sqlite(&url)
            .await
            .unwrap()
            .apply_migrations(true)
            .with_http_authority(endpoint.clone())
            .build()
            .await
            .unwrap();

        for _ in 0..5 {
            controller
                .submit(&Credentials::new(EMAIL, "wrong password"))
                .await
                .unwrap_err();
        }
        assert!(controller.lockout_status().await.locked);
        controller.shutdown().await;
    }

    let controller = LatchBuilder::new()
        .with_sqlite(&url)
        .await
        .unwrap()
        .apply_migrations(true)
        .with_http_authority(endpoint)
        .build()
        .await
        .unwrap();

    let status = controller.lockout_status().await;
    assert!(status.locked);
    assert_eq!(status.attempts, 5);

    let err = controller
        .submit(&Credentials::new(EMAIL, PASSWORD))
        .await
        .unwrap_err();
    assert!(matches!(err, LoginError::AccountLocked { .. }));
    controller.shutdown().await;
}
