use uuid::Uuid;

pub mod eligibility;
pub mod payments;
pub mod qr;
pub mod refunds;
pub mod signing;
pub mod webhook;

pub use payments::{PaymentIntent, PaymentService};
pub use qr::{QrIssuer, QrPayload};
pub use signing::HmacSigner;
pub use webhook::WebhookOutcome;

/// Identity of the authenticated request, handed to us by the upstream
/// auth layer. Authentication itself is out of scope here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: CallerRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Attendee,
    Admin,
}

impl Caller {
    pub fn attendee(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: CallerRole::Attendee,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: CallerRole::Admin,
        }
    }
}
