mod common;

use std::sync::Arc;

use serial_test::serial;

use events_hub_rs::mailer::{EmailDispatcher, EmailFlow, SendError};
use events_hub_rs::repos::email_log_repo::{self, EmailStatus};

use common::{get_test_pool, unique_email, FailingMailer, RecordingMailer};

fn flow() -> EmailFlow {
    EmailFlow::Generic {
        subject: "Monthly update".to_string(),
        body: "Nothing much happened.".to_string(),
    }
}

#[tokio::test]
#[serial]
async fn tracked_send_logs_one_row_per_recipient_sharing_a_token() {
    let pool = get_test_pool().await;
    let transport = Arc::new(RecordingMailer::default());
    let dispatcher = EmailDispatcher::new(
        pool.clone(),
        transport.clone(),
        "no-reply@testserver".to_string(),
        "http://testserver".to_string(),
    );

    let recipients = vec![unique_email("a"), unique_email("b")];
    let token = dispatcher
        .send(&flow(), &recipients, None, true)
        .await
        .unwrap()
        .expect("tracked sends return a token");

    assert_eq!(transport.sent.lock().unwrap().len(), 1);

    let rows = email_log_repo::find_by_token(&pool, token).await.unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.email_id, token);
        assert_eq!(row.status, EmailStatus::Sent);
        assert_eq!(row.template_name, "generic");
        assert_eq!(row.subject, "Monthly update");
        assert!(row.error_message.is_none());
    }
    let mut logged: Vec<_> = rows.iter().map(|r| r.recipient.clone()).collect();
    logged.sort();
    let mut expected = recipients;
    expected.sort();
    assert_eq!(logged, expected);
}

#[tokio::test]
#[serial]
async fn failed_send_logs_a_single_failed_row() {
    let pool = get_test_pool().await;
    let dispatcher = EmailDispatcher::new(
        pool.clone(),
        Arc::new(FailingMailer),
        "no-reply@testserver".to_string(),
        "http://testserver".to_string(),
    );

    let recipients = vec![unique_email("a"), unique_email("b")];
    let err = dispatcher
        .send(&flow(), &recipients, None, true)
        .await
        .unwrap_err();
    assert!(matches!(err, SendError::Transport(_)));

    let rows: Vec<(String, EmailStatus, Option<String>)> = sqlx::query_as(
        "SELECT recipient, status, error_message FROM email_log WHERE recipient = $1 OR recipient = $2",
    )
    .bind(&recipients[0])
    .bind(&recipients[1])
    .fetch_all(&pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 1);
    let (recipient, status, error_message) = &rows[0];
    assert_eq!(recipient, &recipients[0]);
    assert_eq!(*status, EmailStatus::Failed);
    assert!(error_message.as_deref().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
#[serial]
async fn untracked_send_writes_no_log_rows() {
    let pool = get_test_pool().await;
    let transport = Arc::new(RecordingMailer::default());
    let dispatcher = EmailDispatcher::new(
        pool.clone(),
        transport.clone(),
        "no-reply@testserver".to_string(),
        "http://testserver".to_string(),
    );

    let recipient = unique_email("quiet");
    let token = dispatcher
        .send(&flow(), &[recipient.clone()], None, false)
        .await
        .unwrap();
    assert!(token.is_none());
    assert_eq!(transport.sent.lock().unwrap().len(), 1);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_log WHERE recipient = $1")
        .bind(&recipient)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
#[serial]
async fn send_with_no_recipients_is_an_error() {
    let pool = get_test_pool().await;
    let dispatcher = EmailDispatcher::new(
        pool,
        Arc::new(RecordingMailer::default()),
        "no-reply@testserver".to_string(),
        "http://testserver".to_string(),
    );

    let err = dispatcher.send(&flow(), &[], None, true).await.unwrap_err();
    assert!(matches!(err, SendError::NoRecipients));
}
