mod common;

use common::{drain, text, TestBed};

use carelink_messaging::error::AppError;
use carelink_messaging::middleware::auth::Identity;
use carelink_messaging::models::conversation::UserRole;
use carelink_messaging::models::message::MessageStatus;
use carelink_messaging::services::chat_service::ThreadPage;
use carelink_messaging::websocket::events::ServerEvent;

/// Self-deletion hides the message for the actor only; the other party's
/// view and the stored content stay intact.
#[tokio::test]
async fn delete_for_self_isolates_the_actor() {
    let bed = TestBed::new();
    let m = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("for your eyes"))
        .await
        .unwrap();

    let (_doctor_handle, mut doctor_rx) = bed.connect(bed.doctor).await;
    let (_patient_handle, mut patient_rx) = bed.connect(bed.patient).await;
    drain(&mut doctor_rx);
    drain(&mut patient_rx);

    bed.chat.delete_for_self(bed.doctor, m.id).await.unwrap();

    let doctor_thread = bed
        .chat
        .thread(bed.doctor, bed.patient.user_id, ThreadPage::default())
        .await
        .unwrap();
    assert!(doctor_thread.is_empty());

    let patient_thread = bed
        .chat
        .thread(bed.patient, bed.doctor.user_id, ThreadPage::default())
        .await
        .unwrap();
    assert_eq!(patient_thread.len(), 1);
    assert_eq!(patient_thread[0].text.as_deref(), Some("for your eyes"));

    // Removal signal goes to the actor's own connection, not the counterpart.
    let doctor_events = drain(&mut doctor_rx);
    assert_eq!(
        doctor_events,
        vec![ServerEvent::MessageDeleted { message_id: m.id }]
    );
    assert!(drain(&mut patient_rx).is_empty());
}

#[tokio::test]
async fn delete_for_everyone_redacts_for_both_parties() {
    let bed = TestBed::new();
    let m = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("sent in error"))
        .await
        .unwrap();

    // The doctor had already hidden it locally; tombstoning still clears the
    // content in every remaining view.
    bed.chat.delete_for_self(bed.doctor, m.id).await.unwrap();

    let (_doctor_handle, mut doctor_rx) = bed.connect(bed.doctor).await;
    let (_patient_handle, mut patient_rx) = bed.connect(bed.patient).await;
    drain(&mut doctor_rx);
    drain(&mut patient_rx);

    bed.chat.delete_for_everyone(bed.patient, m.id).await.unwrap();

    let patient_thread = bed
        .chat
        .thread(bed.patient, bed.doctor.user_id, ThreadPage::default())
        .await
        .unwrap();
    assert_eq!(patient_thread.len(), 1);
    assert!(patient_thread[0].tombstoned);
    assert_eq!(patient_thread[0].text, None);
    assert_eq!(patient_thread[0].attachment_url, None);

    // Both active connections hear about the redaction.
    assert_eq!(
        drain(&mut doctor_rx),
        vec![ServerEvent::MessageRedacted { message_id: m.id }]
    );
    assert_eq!(
        drain(&mut patient_rx),
        vec![ServerEvent::MessageRedacted { message_id: m.id }]
    );
}

#[tokio::test]
async fn only_the_author_may_delete_for_everyone() {
    let bed = TestBed::new();
    let m = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("patient's words"))
        .await
        .unwrap();

    let err = bed
        .chat
        .delete_for_everyone(bed.doctor, m.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Self-deletion has no such restriction for participants.
    bed.chat.delete_for_self(bed.doctor, m.id).await.unwrap();
}

#[tokio::test]
async fn outsiders_cannot_delete_for_self() {
    let bed = TestBed::new();
    let m = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("private thread"))
        .await
        .unwrap();

    let outsider = Identity {
        user_id: uuid::Uuid::new_v4(),
        role: UserRole::Doctor,
    };
    let err = bed.chat.delete_for_self(outsider, m.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn deleting_a_missing_message_is_not_found() {
    let bed = TestBed::new();
    let err = bed
        .chat
        .delete_for_self(bed.doctor, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

/// A tombstone is terminal: later acknowledgements no longer move the
/// message's status.
#[tokio::test]
async fn tombstoned_messages_accept_no_status_changes() {
    let bed = TestBed::new();
    let m = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("short-lived"))
        .await
        .unwrap();

    bed.chat.delete_for_everyone(bed.patient, m.id).await.unwrap();

    let seen = bed
        .chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m.id])
        .await
        .unwrap();
    assert!(seen.is_empty());

    let thread = bed
        .chat
        .thread(bed.doctor, bed.patient.user_id, ThreadPage::default())
        .await
        .unwrap();
    assert_eq!(thread[0].status, MessageStatus::Sent);
    assert!(thread[0].tombstoned);
}

/// Repeated self-deletion is idempotent and keeps a single entry.
#[tokio::test]
async fn delete_for_self_twice_is_noop() {
    let bed = TestBed::new();
    let m = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("once"))
        .await
        .unwrap();

    bed.chat.delete_for_self(bed.doctor, m.id).await.unwrap();
    bed.chat.delete_for_self(bed.doctor, m.id).await.unwrap();

    let doctor_thread = bed
        .chat
        .thread(bed.doctor, bed.patient.user_id, ThreadPage::default())
        .await
        .unwrap();
    assert!(doctor_thread.is_empty());
}
