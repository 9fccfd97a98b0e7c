//! Request fingerprinting for idempotent submission.
//!
//! Two submissions under the same idempotency key are "the same request"
//! only when their business payloads match. The fingerprint is a SHA-256
//! over the canonical payload fields, so comparison is a constant-size
//! string equality regardless of payload shape.

use sha2::{Digest, Sha256};

use cashgrid_types::{CreatePaymentRequest, Iban};

/// Unit separator keeps `("ab", "c")` and `("a", "bc")` distinct.
const FIELD_SEP: u8 = 0x1f;

/// Computes the canonical fingerprint of a payment submission.
///
/// The IBANs come in already parsed so their normalized form is hashed;
/// a replay that only reformats an IBAN still matches. The idempotency
/// key itself is excluded: the key identifies the request, the
/// fingerprint decides whether a replay carries the same payload.
pub fn request_fingerprint(source: &Iban, target: &Iban, req: &CreatePaymentRequest) -> String {
    let mut hasher = Sha256::new();

    hasher.update(source.as_str().as_bytes());
    hasher.update([FIELD_SEP]);
    hasher.update(target.as_str().as_bytes());
    hasher.update([FIELD_SEP]);
    hasher.update(req.amount.to_le_bytes());
    hasher.update([FIELD_SEP]);
    hasher.update(req.currency.to_string().as_bytes());
    hasher.update([FIELD_SEP]);
    hasher.update(req.description.as_deref().unwrap_or("").as_bytes());

    hex::encode(hasher.finalize())
}
