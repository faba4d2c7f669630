use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::signing::HmacSigner;
use crate::utils::error::TicketError;

/// Admission payload embedded in the rendered QR code. Field set and order
/// are part of the external contract: changing either invalidates every
/// already-issued ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrPayload {
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub holder_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

/// Builds the signed admission string stored in `ticket.qr_code`. The
/// format is `base64url(payload_json) "." hex(hmac(payload_json))`; the
/// signature covers the exact serialized bytes, so any edit to any field
/// fails verification. Rendering the string as an actual 2D barcode is a
/// presentation concern left to clients.
#[derive(Clone)]
pub struct QrIssuer {
    signer: HmacSigner,
}

impl QrIssuer {
    pub fn new(signer: HmacSigner) -> Self {
        Self { signer }
    }

    pub fn issue(&self, payload: &QrPayload) -> Result<String, TicketError> {
        let json = serde_json::to_string(payload)
            .map_err(|e| TicketError::Internal(format!("QR payload serialization: {e}")))?;
        let signature = self.signer.sign(&json);
        Ok(format!("{}.{}", URL_SAFE_NO_PAD.encode(&json), signature))
    }

    /// Verifies and parses an admission string. Check-in desks call this;
    /// they never compare signatures themselves.
    pub fn decode(&self, code: &str) -> Result<QrPayload, TicketError> {
        let (encoded, signature) = code.split_once('.').ok_or(TicketError::InvalidSignature)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TicketError::InvalidSignature)?;
        let json = std::str::from_utf8(&bytes).map_err(|_| TicketError::InvalidSignature)?;

        if !self.signer.verify(json, signature) {
            return Err(TicketError::InvalidSignature);
        }

        serde_json::from_str(json).map_err(|_| TicketError::InvalidSignature)
    }
}
