mod common;

use anyhow::Result;
use common::{register_user, test_service};
use tradeledger::application::AppError;
use tradeledger::domain::STARTING_CASH_CENTS;

#[tokio::test]
async fn test_register_grants_starting_cash_and_session() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    let session = register_user(&service, "alice").await?;
    assert_eq!(session.user.username, "alice");
    assert_eq!(session.user.cash_cents, STARTING_CASH_CENTS);

    // The returned token is immediately usable.
    let user = service.authenticate(&session.token).await?;
    assert_eq!(user.id, session.user.id);

    Ok(())
}

#[tokio::test]
async fn test_register_rejects_duplicate_username() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    register_user(&service, "alice").await?;
    let err = service
        .register("alice", "other-password", "other-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UsernameTaken(_)));

    // The first account is unaffected: original credentials still work.
    let session = service.login("alice", "hunter2", None).await?;
    assert_eq!(session.user.cash_cents, STARTING_CASH_CENTS);

    Ok(())
}

#[tokio::test]
async fn test_register_validates_inputs() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    for (username, password, confirmation) in [
        ("", "pw", "pw"),
        ("   ", "pw", "pw"),
        ("alice", "", ""),
        ("alice", "pw", ""),
        ("alice", "pw", "different"),
    ] {
        let err = service
            .register(username, password, confirmation)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::Validation(_)),
            "expected validation error for {:?}",
            (username, password, confirmation)
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_login_rejects_wrong_password() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    let registered = register_user(&service, "alice").await?;

    let err = service.login("alice", "wrong", None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    // The failed attempt did not touch existing session state.
    assert!(service.authenticate(&registered.token).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_login_rejects_unknown_username() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    let err = service.login("nobody", "pw", None).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCredentials));

    Ok(())
}

#[tokio::test]
async fn test_login_clears_prior_session() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    let first = register_user(&service, "alice").await?;
    let second = service
        .login("alice", "hunter2", Some(&first.token))
        .await?;

    assert_ne!(first.token, second.token);
    let err = service.authenticate(&first.token).await.unwrap_err();
    assert!(matches!(err, AppError::NotAuthenticated));
    assert!(service.authenticate(&second.token).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_logout_always_succeeds() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    // Logging out a token that never existed is fine.
    service.logout("no-such-token").await?;

    let session = register_user(&service, "alice").await?;
    service.logout(&session.token).await?;
    let err = service.authenticate(&session.token).await.unwrap_err();
    assert!(matches!(err, AppError::NotAuthenticated));

    // And logging out twice is fine too.
    service.logout(&session.token).await?;

    Ok(())
}

#[tokio::test]
async fn test_deposit_increases_cash_and_is_recorded() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    let session = register_user(&service, "alice").await?;
    let cash_after = service.deposit(session.user.id, "100.00").await?;
    assert_eq!(cash_after, STARTING_CASH_CENTS + 10_000);

    let history = service.history(session.user.id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry.share_delta, 0);
    assert_eq!(history[0].entry.total_cents, 10_000);

    Ok(())
}

#[tokio::test]
async fn test_deposit_rejects_invalid_amounts() -> Result<()> {
    let (service, _quotes, _temp) = test_service().await?;

    let session = register_user(&service, "alice").await?;

    for amount in ["", "   ", "0", "0.00", "-5", "abc", "1.2.3", "0.999"] {
        let err = service.deposit(session.user.id, amount).await.unwrap_err();
        assert!(
            matches!(err, AppError::Validation(_)),
            "expected validation error for {:?}",
            amount
        );
    }

    // Nothing was applied.
    let view = service.portfolio(session.user.id).await?;
    assert_eq!(view.cash_cents, STARTING_CASH_CENTS);
    assert!(service.history(session.user.id).await?.is_empty());

    Ok(())
}
