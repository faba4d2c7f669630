use rust_decimal::Decimal;

use crate::models::EventSnapshot;
use crate::utils::error::TicketError;

/// Admission-control validation over a point-in-time read: the event must
/// be payable, the holder must not already hold a live ticket, a seat must
/// be free, and the proposed amount must match the confirmed price.
///
/// Pure and side-effect free. The store's `create_pending` re-enforces the
/// uniqueness and capacity rules atomically; this check exists to reject
/// early, before any write is attempted.
pub fn check_eligibility(
    event: &EventSnapshot,
    active_count: i64,
    holder_has_active: bool,
    proposed_amount: Decimal,
) -> Result<(), TicketError> {
    if !event.is_paid {
        return Err(TicketError::EventNotPayable);
    }

    if holder_has_active {
        return Err(TicketError::DuplicateTicket);
    }

    if active_count >= event.capacity as i64 {
        return Err(TicketError::CapacityExceeded);
    }

    if proposed_amount != event.total_amount() {
        return Err(TicketError::AmountMismatch);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

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

    #[test]
    fn accepts_a_valid_proposal() {
        let event = paid_event(10);
        assert!(check_eligibility(&event, 3, false, Decimal::from(150)).is_ok());
    }

    #[test]
    fn rejects_free_events() {
        let mut event = paid_event(10);
        event.is_paid = false;
        let err = check_eligibility(&event, 0, false, Decimal::from(150)).unwrap_err();
        assert!(matches!(err, TicketError::EventNotPayable));
    }

    #[test]
    fn rejects_holders_with_a_live_ticket() {
        let event = paid_event(10);
        let err = check_eligibility(&event, 0, true, Decimal::from(150)).unwrap_err();
        assert!(matches!(err, TicketError::DuplicateTicket));
    }

    #[test]
    fn rejects_when_at_capacity() {
        let event = paid_event(5);
        let err = check_eligibility(&event, 5, false, Decimal::from(150)).unwrap_err();
        assert!(matches!(err, TicketError::CapacityExceeded));
    }

    #[test]
    fn rejects_amounts_that_ignore_the_platform_fee() {
        let event = paid_event(10);
        let err = check_eligibility(&event, 0, false, Decimal::from(100)).unwrap_err();
        assert!(matches!(err, TicketError::AmountMismatch));
    }
}
