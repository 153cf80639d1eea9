mod common;

use flock::{
    config::LockoutMode,
    domain::{Actor, CreatePersonRequest, ProcessResetRequest, ResetStatus, Role, SubmitResetRequest},
    error::AppError,
    service::CrudService,
};

#[tokio::test]
async fn test_login_success_issues_a_session() -> anyhow::Result<()> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;
    let pastor = common::create_user(&context, "pastor.ramos", Role::Pastor, "shepherd123").await?;

    let outcome = context.account_service.login("pastor.ramos", "shepherd123").await?;
    assert_eq!(outcome.person.id, pastor.id);

    let session = context.auth_service.validate_session(&outcome.token).await?;
    assert_eq!(session.map(|s| s.person_id), Some(pastor.id));

    context.account_service.logout(&outcome.token).await?;
    assert!(context.auth_service.validate_session(&outcome.token).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_unknown_user_and_wrong_password_look_the_same() -> anyhow::Result<()> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;
    common::create_user(&context, "coord.lim", Role::Coordinator, "cluster123").await?;

    let unknown = context.account_service.login("nobody", "whatever1").await;
    let wrong = context.account_service.login("coord.lim", "wrong-password").await;
    assert!(matches!(unknown, Err(AppError::Unauthorized)));
    assert!(matches!(wrong, Err(AppError::Unauthorized)));

    Ok(())
}

#[tokio::test]
async fn test_timed_lockout_after_repeated_failures() -> anyhow::Result<()> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;
    common::create_user(&context, "coord.tan", Role::Coordinator, "cluster123").await?;

    for _ in 0..2 {
        let err = context.account_service.login("coord.tan", "bad-password").await;
        assert!(matches!(err, Err(AppError::Unauthorized)));
    }
    // Third failure hits the threshold
    let err = context.account_service.login("coord.tan", "bad-password").await;
    assert!(matches!(err, Err(AppError::Locked(ref msg)) if msg.contains("until")));

    // Even the right password is refused while locked
    let err = context.account_service.login("coord.tan", "cluster123").await;
    assert!(matches!(err, Err(AppError::Locked(_))));

    let locks = context.account_service.list_locks().await?;
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].failed_attempts, 3);
    assert!(locks[0].locked_until.is_some());

    Ok(())
}

#[tokio::test]
async fn test_manual_lock_needs_an_admin() -> anyhow::Result<()> {
    let mut settings = common::test_settings();
    settings.auth.lockout_mode = LockoutMode::Manual;
    let context = common::test_context(&settings).await?;
    common::create_user(&context, "coord.sy", Role::Coordinator, "cluster123").await?;

    for _ in 0..3 {
        let _ = context.account_service.login("coord.sy", "bad-password").await;
    }
    let err = context.account_service.login("coord.sy", "cluster123").await;
    assert!(matches!(err, Err(AppError::Locked(ref msg)) if msg.contains("administrator")));

    let lock = context.account_service.list_locks().await?.remove(0);
    assert!(lock.requires_admin());

    let admin = common::create_user(&context, "admin.one", Role::Admin, "admin12345").await?;
    context.account_service.unlock(&Actor::from(&admin), lock.id).await?;

    let outcome = context.account_service.login("coord.sy", "cluster123").await?;
    assert_eq!(outcome.person.username, "coord.sy");

    // Unlocking twice is a conflict, not a silent no-op
    let again = context.account_service.unlock(&Actor::from(&admin), lock.id).await;
    assert!(matches!(again, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_success_resets_the_failure_counter() -> anyhow::Result<()> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;
    common::create_user(&context, "coord.go", Role::Coordinator, "cluster123").await?;

    for _ in 0..2 {
        let _ = context.account_service.login("coord.go", "bad-password").await;
    }
    context.account_service.login("coord.go", "cluster123").await?;
    for _ in 0..2 {
        let _ = context.account_service.login("coord.go", "bad-password").await;
    }

    assert!(context.account_service.list_locks().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_approved_reset_hands_out_a_working_password() -> anyhow::Result<()> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;
    let admin = common::create_user(&context, "admin.two", Role::Admin, "admin12345").await?;
    common::create_user(&context, "coord.uy", Role::Coordinator, "forgotten1").await?;
    let old = context.account_service.login("coord.uy", "forgotten1").await?;

    let request = context
        .account_service
        .request_reset(SubmitResetRequest {
            username: "coord.uy".to_string(),
            reason: Some("Forgot it".to_string()),
        })
        .await?
        .expect("known user gets a request");
    assert_eq!(request.status, ResetStatus::Pending);

    // A second request while one is pending returns the same one
    let again = context
        .account_service
        .request_reset(SubmitResetRequest {
            username: "coord.uy".to_string(),
            reason: None,
        })
        .await?
        .expect("pending request");
    assert_eq!(again.id, request.id);

    let approved = context
        .account_service
        .approve_reset(&Actor::from(&admin), request.id, ProcessResetRequest::default())
        .await?;
    assert_eq!(approved.request.status, ResetStatus::Approved);
    assert_eq!(approved.temporary_password.len(), settings.auth.temp_password_length);

    // Existing sessions are revoked and the old password no longer works
    assert!(context.auth_service.validate_session(&old.token).await?.is_none());
    assert!(context.account_service.login("coord.uy", "forgotten1").await.is_err());
    context
        .account_service
        .login("coord.uy", &approved.temporary_password)
        .await?;

    // Processed requests cannot be processed again
    let reject = context
        .account_service
        .reject_reset(&Actor::from(&admin), request.id, ProcessResetRequest::default())
        .await;
    assert!(matches!(reject, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_reset_for_unknown_user_is_silent() -> anyhow::Result<()> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;

    let outcome = context
        .account_service
        .request_reset(SubmitResetRequest {
            username: "ghost".to_string(),
            reason: None,
        })
        .await?;
    assert!(outcome.is_none());
    assert!(context.account_service.list_resets().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_setup_runs_once() -> anyhow::Result<()> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;
    assert!(context.account_service.needs_setup().await?);

    let mut request = CreatePersonRequest::new("Church", "Admin");
    request.username = Some("admin".to_string());
    request.password = Some("admin12345".to_string());
    // Role in the request is ignored; setup always creates an administrator
    request.role = Role::Visitor;
    let admin = context.account_service.setup_admin(request.clone()).await?;
    assert_eq!(admin.role, Role::Admin);
    assert!(!context.account_service.needs_setup().await?);

    request.username = Some("admin2".to_string());
    let err = context.account_service.setup_admin(request).await;
    assert!(matches!(err, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn test_person_cannot_delete_themselves() -> anyhow::Result<()> {
    let settings = common::test_settings();
    let context = common::test_context(&settings).await?;
    let admin = common::create_user(&context, "admin.three", Role::Admin, "admin12345").await?;

    let err = context
        .person_service
        .delete(&Actor::from(&admin), admin.id)
        .await;
    assert!(err.is_err());
    assert!(context.person_service.get(admin.id).await.is_ok());

    let audit = context.audit_service.list_all().await?;
    assert!(audit.iter().any(|entry| entry.action == "create"));

    Ok(())
}
