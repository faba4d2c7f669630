use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use campuspass_server::models::{EventSnapshot, TicketStatus};
use campuspass_server::services::{Caller, HmacSigner, PaymentService, WebhookOutcome};
use campuspass_server::store::{InMemoryEventDirectory, InMemoryTicketStore, TicketStore};
use campuspass_server::utils::error::TicketError;

struct Harness {
    service: Arc<PaymentService>,
    store: Arc<InMemoryTicketStore>,
    events: Arc<InMemoryEventDirectory>,
}

fn paid_event(capacity: i32) -> EventSnapshot {
    EventSnapshot {
        id: Uuid::new_v4(),
        is_paid: true,
        price: Decimal::from(100),
        platform_fee: Decimal::from(50),
        capacity,
        start_time: Utc::now() + Duration::days(7),
    }
}

async fn harness(event: &EventSnapshot) -> Harness {
    let store = Arc::new(InMemoryTicketStore::new());
    let events = Arc::new(InMemoryEventDirectory::new());
    events.insert(event.clone()).await;

    let service = PaymentService::new(
        store.clone(),
        events.clone(),
        HmacSigner::new("qr-test-secret").unwrap(),
        HmacSigner::new("webhook-test-secret").unwrap(),
        "https://pay.test",
    );

    Harness {
        service: Arc::new(service),
        store,
        events,
    }
}

const TOTAL: Decimal = Decimal::from_parts(150, 0, 0, false, 0);

#[tokio::test]
async fn capacity_is_never_overbooked_under_concurrent_intents() {
    let event = paid_event(3);
    let h = harness(&event).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = h.service.clone();
        let event_id = event.id;
        handles.push(tokio::spawn(async move {
            service
                .create_payment(event_id, Uuid::new_v4(), TOTAL, "card")
                .await
        }));
    }

    let mut successes = 0;
    let mut capacity_rejections = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(TicketError::CapacityExceeded) => capacity_rejections += 1,
            Err(other) => panic!("unexpected rejection: {other:?}"),
        }
    }

    assert_eq!(successes, 3);
    assert_eq!(capacity_rejections, 1);
    assert_eq!(h.store.count_active_for_event(event.id).await.unwrap(), 3);
}

#[tokio::test]
async fn holder_never_gets_two_live_tickets_under_concurrency() {
    let event = paid_event(100);
    let h = harness(&event).await;
    let holder = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = h.service.clone();
        let event_id = event.id;
        handles.push(tokio::spawn(async move {
            service.create_payment(event_id, holder, TOTAL, "card").await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(TicketError::DuplicateTicket) => {}
            Err(other) => panic!("unexpected rejection: {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert!(h
        .store
        .holder_has_active_ticket(event.id, holder)
        .await
        .unwrap());
}

#[tokio::test]
async fn amount_mismatch_creates_no_ticket() {
    let event = paid_event(10);
    let h = harness(&event).await;

    let err = h
        .service
        .create_payment(event.id, Uuid::new_v4(), Decimal::from(100), "card")
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::AmountMismatch));
    assert_eq!(h.store.count_active_for_event(event.id).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_event_is_rejected_before_any_write() {
    let event = paid_event(10);
    let h = harness(&event).await;

    let err = h
        .service
        .create_payment(Uuid::new_v4(), Uuid::new_v4(), TOTAL, "card")
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::EventNotFound));
}

#[tokio::test]
async fn free_events_are_not_payable() {
    let mut event = paid_event(10);
    event.is_paid = false;
    event.price = Decimal::ZERO;
    event.platform_fee = Decimal::ZERO;
    let h = harness(&event).await;

    let err = h
        .service
        .create_payment(event.id, Uuid::new_v4(), Decimal::ZERO, "card")
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::EventNotPayable));
}

#[tokio::test]
async fn successful_webhook_is_idempotent_and_keeps_the_first_qr() {
    let event = paid_event(10);
    let h = harness(&event).await;
    let holder = Uuid::new_v4();

    let intent = h
        .service
        .create_payment(event.id, holder, TOTAL, "card")
        .await
        .unwrap();
    let signature = h
        .service
        .webhook_attestation(&intent.transaction_id, WebhookOutcome::Success);

    let paid = h
        .service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Success, &signature)
        .await
        .unwrap();
    assert_eq!(paid.status, TicketStatus::Paid);
    let first_qr = paid.qr_code.clone().expect("QR issued on payment");

    let replay = h
        .service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Success, &signature)
        .await
        .unwrap_err();
    assert!(matches!(replay, TicketError::AlreadyProcessed));

    let stored = h
        .store
        .find_by_transaction(&intent.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.qr_code.as_deref(), Some(first_qr.as_str()));
    assert!(stored.paid_at.is_some());
}

#[tokio::test]
async fn webhook_with_bad_signature_mutates_nothing() {
    let event = paid_event(10);
    let h = harness(&event).await;

    let intent = h
        .service
        .create_payment(event.id, Uuid::new_v4(), TOTAL, "card")
        .await
        .unwrap();

    // Signature for a different outcome must not authorize this one.
    let wrong = h
        .service
        .webhook_attestation(&intent.transaction_id, WebhookOutcome::Declined);
    let err = h
        .service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Success, &wrong)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::InvalidSignature));

    let err = h
        .service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Success, "deadbeef")
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::InvalidSignature));

    let stored = h
        .store
        .find_by_transaction(&intent.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TicketStatus::Pending);
    assert!(stored.qr_code.is_none());
}

#[tokio::test]
async fn webhook_for_unknown_transaction_is_not_found() {
    let event = paid_event(10);
    let h = harness(&event).await;

    let signature = h
        .service
        .webhook_attestation("TXN-unknown", WebhookOutcome::Success);
    let err = h
        .service
        .process_webhook("TXN-unknown", WebhookOutcome::Success, &signature)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::TransactionNotFound));
}

#[tokio::test]
async fn declined_payment_is_retained_as_failed_never_deleted() {
    let event = paid_event(10);
    let h = harness(&event).await;
    let holder = Uuid::new_v4();

    let intent = h
        .service
        .create_payment(event.id, holder, TOTAL, "card")
        .await
        .unwrap();
    let signature = h
        .service
        .webhook_attestation(&intent.transaction_id, WebhookOutcome::Declined);

    let err = h
        .service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Declined, &signature)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::PaymentDeclined));

    // The row survives as an audit record and the seat is released.
    let stored = h
        .store
        .find_by_transaction(&intent.transaction_id)
        .await
        .unwrap()
        .expect("declined ticket must not disappear");
    assert_eq!(stored.status, TicketStatus::Failed);
    assert_eq!(h.store.count_active_for_event(event.id).await.unwrap(), 0);

    // And the holder is free to try again.
    h.service
        .create_payment(event.id, holder, TOTAL, "card")
        .await
        .unwrap();
}

async fn paid_ticket(h: &Harness, event: &EventSnapshot, holder: Uuid) -> Uuid {
    let intent = h
        .service
        .create_payment(event.id, holder, TOTAL, "card")
        .await
        .unwrap();
    let signature = h
        .service
        .webhook_attestation(&intent.transaction_id, WebhookOutcome::Success);
    let view = h
        .service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Success, &signature)
        .await
        .unwrap();
    view.id
}

#[tokio::test]
async fn refund_window_closes_exactly_at_event_start() {
    let event = paid_event(10);
    let h = harness(&event).await;
    let holder = Uuid::new_v4();
    let caller = Caller::attendee(holder);

    let ticket_id = paid_ticket(&h, &event, holder).await;

    // At start time (and after) the window is closed.
    let err = h
        .service
        .refund_ticket_at(ticket_id, &caller, None, event.start_time)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::EventAlreadyStarted));

    let err = h
        .service
        .refund_ticket_at(
            ticket_id,
            &caller,
            None,
            event.start_time + Duration::milliseconds(1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::EventAlreadyStarted));

    // One millisecond before the start it still succeeds.
    let refunded = h
        .service
        .refund_ticket_at(
            ticket_id,
            &caller,
            None,
            event.start_time - Duration::milliseconds(1),
        )
        .await
        .unwrap();
    assert_eq!(refunded.status, TicketStatus::Refunded);
    assert!(refunded.refunded_at.is_some());
}

#[tokio::test]
async fn refunds_are_gated_on_ownership_and_status() {
    let event = paid_event(10);
    let h = harness(&event).await;
    let holder = Uuid::new_v4();

    let intent = h
        .service
        .create_payment(event.id, holder, TOTAL, "card")
        .await
        .unwrap();
    let pending_id = h
        .store
        .find_by_transaction(&intent.transaction_id)
        .await
        .unwrap()
        .unwrap()
        .id;

    // A pending ticket was never charged.
    let err = h
        .service
        .refund_ticket(pending_id, &Caller::attendee(holder), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::NotPaid));

    let signature = h
        .service
        .webhook_attestation(&intent.transaction_id, WebhookOutcome::Success);
    h.service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Success, &signature)
        .await
        .unwrap();

    // Strangers cannot refund someone else's ticket; admins can.
    let err = h
        .service
        .refund_ticket(pending_id, &Caller::attendee(Uuid::new_v4()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::Forbidden));

    let refunded = h
        .service
        .refund_ticket(pending_id, &Caller::admin(Uuid::new_v4()), Some("duplicate"))
        .await
        .unwrap();
    assert_eq!(refunded.status, TicketStatus::Refunded);

    let err = h
        .service
        .refund_ticket(pending_id, &Caller::attendee(holder), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::AlreadyRefunded));

    let err = h
        .service
        .refund_ticket(Uuid::new_v4(), &Caller::attendee(holder), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::TicketNotFound));
}

#[tokio::test]
async fn my_tickets_shows_only_usable_tickets_newest_first() {
    let first_event = paid_event(10);
    let h = harness(&first_event).await;
    let second_event = paid_event(10);
    h.events.insert(second_event.clone()).await;
    let holder = Uuid::new_v4();

    let first = paid_ticket(&h, &first_event, holder).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = paid_ticket(&h, &second_event, holder).await;

    // A pending intent elsewhere must not show up.
    let third_event = paid_event(10);
    h.events.insert(third_event.clone()).await;
    h.service
        .create_payment(third_event.id, holder, TOTAL, "card")
        .await
        .unwrap();

    let tickets = h.service.my_tickets(holder).await.unwrap();
    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].id, second);
    assert_eq!(tickets[1].id, first);
    assert!(tickets
        .iter()
        .all(|t| matches!(t.status, TicketStatus::Paid | TicketStatus::Used)));
}

#[tokio::test]
async fn ticket_views_are_restricted_to_holder_and_admin() {
    let event = paid_event(10);
    let h = harness(&event).await;
    let holder = Uuid::new_v4();
    let ticket_id = paid_ticket(&h, &event, holder).await;

    let view = h
        .service
        .get_ticket(ticket_id, &Caller::attendee(holder))
        .await
        .unwrap();
    assert_eq!(view.holder_id, holder);

    h.service
        .get_ticket(ticket_id, &Caller::admin(Uuid::new_v4()))
        .await
        .unwrap();

    let err = h
        .service
        .get_ticket(ticket_id, &Caller::attendee(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::Forbidden));
}

#[tokio::test]
async fn transaction_status_maps_lifecycle_onto_gateway_states() {
    use campuspass_server::models::GatewayStatus;

    let event = paid_event(10);
    let h = harness(&event).await;
    let holder = Uuid::new_v4();

    let intent = h
        .service
        .create_payment(event.id, holder, TOTAL, "card")
        .await
        .unwrap();

    let status = h
        .service
        .transaction_status(&intent.transaction_id)
        .await
        .unwrap();
    assert_eq!(status.status, GatewayStatus::Pending);
    assert_eq!(status.amount, TOTAL);

    let signature = h
        .service
        .webhook_attestation(&intent.transaction_id, WebhookOutcome::Success);
    let view = h
        .service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Success, &signature)
        .await
        .unwrap();

    let status = h
        .service
        .transaction_status(&intent.transaction_id)
        .await
        .unwrap();
    assert_eq!(status.status, GatewayStatus::Completed);

    h.service
        .refund_ticket(view.id, &Caller::attendee(holder), None)
        .await
        .unwrap();
    let status = h
        .service
        .transaction_status(&intent.transaction_id)
        .await
        .unwrap();
    assert_eq!(status.status, GatewayStatus::Refunded);

    let err = h.service.transaction_status("TXN-missing").await.unwrap_err();
    assert!(matches!(err, TicketError::TransactionNotFound));
}

// One seat's whole life: sold out behind user A, paid, QR verified,
// refunded once, refused twice.
#[tokio::test]
async fn single_seat_end_to_end() {
    let event = paid_event(1);
    let h = harness(&event).await;
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();

    let intent = h
        .service
        .create_payment(event.id, user_a, TOTAL, "card")
        .await
        .unwrap();
    assert!(intent.redirect_url.contains(&intent.transaction_id));

    let err = h
        .service
        .create_payment(event.id, user_b, TOTAL, "card")
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::CapacityExceeded));

    let signature = h
        .service
        .webhook_attestation(&intent.transaction_id, WebhookOutcome::Success);
    let paid = h
        .service
        .process_webhook(&intent.transaction_id, WebhookOutcome::Success, &signature)
        .await
        .unwrap();
    assert_eq!(paid.status, TicketStatus::Paid);

    // The issued QR verifies and names this exact ticket.
    let qr = paid.qr_code.clone().unwrap();
    let payload = h.service.qr_issuer().decode(&qr).unwrap();
    assert_eq!(payload.ticket_id, paid.id);
    assert_eq!(payload.event_id, event.id);
    assert_eq!(payload.holder_id, user_a);

    let refunded = h
        .service
        .refund_ticket(paid.id, &Caller::attendee(user_a), Some("can't attend"))
        .await
        .unwrap();
    assert_eq!(refunded.status, TicketStatus::Refunded);

    let err = h
        .service
        .refund_ticket(paid.id, &Caller::attendee(user_a), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TicketError::AlreadyRefunded));
}
