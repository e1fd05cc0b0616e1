use checkout_engine::db_types::InvoiceId;
use hmac::{digest::InvalidLength, Hmac, Mac};
use log::trace;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Base64-encoded HMAC-SHA256 of `data` under `secret`.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(data);
    Ok(base64::encode(mac.finalize().into_bytes()))
}

/// The capability token that lets a client join the room of `invoice_id`.
pub fn room_token(secret: &str, invoice_id: &InvoiceId) -> Result<String, InvalidLength> {
    calculate_hmac(secret, invoice_id.as_str().as_bytes())
}

/// Checks a base64 `signature` over `data` in constant time. A signature that is not base64 never matches.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> Result<bool, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(data);
    let Ok(decoded) = base64::decode(signature.trim()) else {
        trace!("🔐️ Signature is not valid base64");
        return Ok(false);
    };
    Ok(mac.verify_slice(&decoded).is_ok())
}

/// Checks a room token in constant time.
pub fn verify_room_token(secret: &str, invoice_id: &InvoiceId, token: &str) -> bool {
    verify_hmac(secret, invoice_id.as_str().as_bytes(), token).unwrap_or(false)
}
