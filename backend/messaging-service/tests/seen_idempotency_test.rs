mod common;

use common::{drain, text, TestBed};

use carelink_messaging::models::message::MessageStatus;
use carelink_messaging::services::chat_service::ThreadPage;
use carelink_messaging::websocket::events::ServerEvent;

/// Re-submitting a seen batch must produce the same final state as the first
/// call and must not re-notify the original sender.
#[tokio::test]
async fn mark_seen_is_idempotent() {
    let bed = TestBed::new();
    let m1 = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("one"))
        .await
        .unwrap();
    let m2 = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("two"))
        .await
        .unwrap();

    let (_handle, mut patient_rx) = bed.connect(bed.patient).await;
    drain(&mut patient_rx);

    let first = bed
        .chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m1.id, m2.id])
        .await
        .unwrap();
    assert_eq!(first.len(), 2);
    assert!(!drain(&mut patient_rx).is_empty());

    let second = bed
        .chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m1.id, m2.id])
        .await
        .unwrap();
    assert!(second.is_empty());
    // No transition, no push.
    assert!(drain(&mut patient_rx).is_empty());

    let thread = bed
        .chat
        .thread(bed.doctor, bed.patient.user_id, ThreadPage::default())
        .await
        .unwrap();
    assert!(thread.iter().all(|m| m.status == MessageStatus::Seen));
}

/// A party cannot mark its own messages seen; the filter silently drops them.
#[tokio::test]
async fn own_messages_are_not_seeable() {
    let bed = TestBed::new();
    let own = bed
        .chat
        .send(bed.doctor, bed.patient.user_id, text("note to patient"))
        .await
        .unwrap();

    let seen = bed
        .chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[own.id])
        .await
        .unwrap();
    assert!(seen.is_empty());

    let thread = bed
        .chat
        .thread(bed.doctor, bed.patient.user_id, ThreadPage::default())
        .await
        .unwrap();
    assert_eq!(thread[0].status, MessageStatus::Sent);
}

/// Overlapping concurrent-style acknowledgements: the second batch only
/// transitions the IDs the first one did not cover.
#[tokio::test]
async fn overlapping_batches_transition_each_message_once() {
    let bed = TestBed::new();
    let m1 = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("a"))
        .await
        .unwrap();
    let m2 = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("b"))
        .await
        .unwrap();
    let m3 = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("c"))
        .await
        .unwrap();

    let first = bed
        .chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m1.id, m2.id])
        .await
        .unwrap();
    assert_eq!(first.len(), 2);

    let second = bed
        .chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m2.id, m3.id])
        .await
        .unwrap();
    assert_eq!(second, vec![m3.id]);
}

#[tokio::test]
async fn seen_resets_viewer_unread_counter() {
    let bed = TestBed::new();
    let m1 = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("ping"))
        .await
        .unwrap();

    let before = bed.chat.conversations(bed.doctor).await.unwrap();
    assert_eq!(before[0].unread_count, 1);
    // The patient's own counter is independent and untouched.
    let patient_side = bed.chat.conversations(bed.patient).await.unwrap();
    assert_eq!(patient_side[0].unread_count, 0);

    bed.chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m1.id])
        .await
        .unwrap();

    let after = bed.chat.conversations(bed.doctor).await.unwrap();
    assert_eq!(after[0].unread_count, 0);
}

/// Acknowledging against a pair with no conversation yet is a quiet no-op.
#[tokio::test]
async fn seen_without_conversation_is_noop() {
    let bed = TestBed::new();
    let seen = bed
        .chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[uuid::Uuid::new_v4()])
        .await
        .unwrap();
    assert!(seen.is_empty());
}

/// Offline counterpart: the transition persists and is visible on the next
/// fetch even though no push went out.
#[tokio::test]
async fn seen_persists_when_sender_offline() {
    let bed = TestBed::new();
    let m = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("hi"))
        .await
        .unwrap();

    let seen = bed
        .chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m.id])
        .await
        .unwrap();
    assert_eq!(seen, vec![m.id]);

    let thread = bed
        .chat
        .thread(bed.patient, bed.doctor.user_id, ThreadPage::default())
        .await
        .unwrap();
    assert_eq!(thread[0].status, MessageStatus::Seen);
}

/// Delivered echoes and seen batches never regress: the event stream for a
/// message is a subsequence of sent -> delivered -> seen.
#[tokio::test]
async fn status_updates_never_regress() {
    let bed = TestBed::new();
    let (_doctor_handle, mut doctor_rx) = bed.connect(bed.doctor).await;
    let (_patient_handle, mut patient_rx) = bed.connect(bed.patient).await;
    drain(&mut doctor_rx);
    drain(&mut patient_rx);

    let m = bed
        .chat
        .send(bed.patient, bed.doctor.user_id, text("tracked"))
        .await
        .unwrap();
    bed.chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m.id])
        .await
        .unwrap();
    bed.chat
        .mark_seen(bed.doctor, bed.patient.user_id, &[m.id])
        .await
        .unwrap();

    let observed: Vec<MessageStatus> = drain(&mut patient_rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::StatusUpdate { status, .. } => Some(status),
            _ => None,
        })
        .collect();
    assert_eq!(observed, vec![MessageStatus::Delivered, MessageStatus::Seen]);
    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
}
