//! HMAC middleware for Actix Web.
//!
//! The payment provider signs every webhook call with HMAC-SHA256 over the raw request body, keyed with
//! `CPG_WEBHOOK_HMAC_SECRET`. The base64 signature travels in the [`WEBHOOK_HMAC_HEADER`] header.
//!
//! Wrap the webhook scope with [`HmacMiddlewareFactory`] to reject unsigned or tampered calls with `403 Forbidden`
//! before they reach the handler. The body is buffered for the check and handed on to the handler untouched.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorBadRequest, ErrorForbidden},
    http::header::HeaderValue,
    web,
    Error,
};
use cpg_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};

use crate::helpers::verify_hmac;

pub const WEBHOOK_HMAC_HEADER: &str = "X-Cpg-Hmac-Sha256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    UnusableSecret,
    MissingSignature,
    BadSignature,
}

impl Rejection {
    fn message(self) -> &'static str {
        match self {
            Self::UnusableSecret => "HMAC signature cannot be checked.",
            Self::MissingSignature => "No HMAC signature found.",
            Self::BadSignature => "Invalid HMAC signature.",
        }
    }
}

/// Checks the signature a caller sent against `body`. The comparison runs in constant time.
fn check_signature(secret: &str, signature: Option<&HeaderValue>, body: &[u8]) -> Result<(), Rejection> {
    let signature = signature.ok_or(Rejection::MissingSignature)?;
    let signature = signature.to_str().map_err(|_| Rejection::BadSignature)?;
    match verify_hmac(secret, body, signature) {
        Ok(true) => Ok(()),
        Ok(false) => Err(Rejection::BadSignature),
        Err(_) => Err(Rejection::UnusableSecret),
    }
}

pub struct HmacMiddlewareFactory {
    header: String,
    secret: Secret<String>,
    // When false every call passes unchecked
    checks_enabled: bool,
}

impl HmacMiddlewareFactory {
    pub fn new(header: &str, secret: Secret<String>, checks_enabled: bool) -> Self {
        Self { header: header.into(), secret, checks_enabled }
    }
}

impl<S, B> Transform<S, ServiceRequest> for HmacMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = HmacMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(HmacMiddlewareService {
            header: Rc::from(self.header.as_str()),
            secret: self.secret.clone(),
            checks_enabled: self.checks_enabled,
            service: Rc::new(service),
        }))
    }
}

pub struct HmacMiddlewareService<S> {
    header: Rc<str>,
    secret: Secret<String>,
    checks_enabled: bool,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for HmacMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        if !self.checks_enabled {
            trace!("🔐️ Webhook HMAC checks are disabled. Letting {} through.", req.path());
            return Box::pin(async move { service.call(req).await });
        }
        let secret = self.secret.reveal().clone();
        let header = Rc::clone(&self.header);
        Box::pin(async move {
            let body = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Could not buffer the webhook body. {e}");
                ErrorBadRequest("Failed to extract request data.")
            })?;
            if let Err(rejection) = check_signature(&secret, req.headers().get(header.as_ref()), &body) {
                warn!("🔐️ Webhook call to {} rejected: {rejection:?}", req.path());
                return Err(ErrorForbidden(rejection.message()));
            }
            trace!("🔐️ Webhook signature ✅️");
            req.set_payload(bytes_to_payload(body));
            service.call(req).await
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
