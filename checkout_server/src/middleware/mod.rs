mod hmac;

pub use hmac::{HmacMiddlewareFactory, HmacMiddlewareService, WEBHOOK_HMAC_HEADER};
