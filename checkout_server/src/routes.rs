//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests:
//! ```nocompile
//!     fn my_handler() -> impl Responder {
//!         std::thread::sleep(Duration::from_secs(5)); // <-- Bad practice! Will cause the current worker thread to
//! hang!
//!     }
//! ```
//! For this reason, any long, non-cpu-bound operation (e.g. I/O, database operations, etc.) should be expressed as
//! futures or asynchronous functions. Async handlers get executed concurrently by worker threads and thus don’t block
//! execution:
//!
//! ```nocompile
//!     async fn my_handler() -> impl Responder {
//!         tokio::time::sleep(Duration::from_secs(5)).await; // <-- Ok. Worker thread will handle other requests here
//!     }
//! ```
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use checkout_engine::{
    db_types::{AddOns, InvoiceId, NewInvoice},
    gateway::SimulatedGateway,
    notifications::NotificationHub,
    CheckoutApi,
    InvoiceError,
    InvoiceEvent,
    InvoiceFlowApi,
    InvoiceStore,
    PaymentGateway,
    SessionId,
};
use log::*;

use crate::{
    config::ServerOptions,
    data_objects::{
        CheckoutSessionRequest,
        CheckoutSessionResponse,
        InvoiceCreated,
        SessionReference,
        SettleSessionRequest,
    },
    errors::ServerError,
    helpers::room_token,
    ws::start_session,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Invoices  ----------------------------------------------------
route!(create_invoice => Post "/invoices" impl InvoiceStore);
/// Creates a new `pending` invoice.
///
/// Responds with `201 Created` and the stored invoice. When room tokens are enabled, the response also carries the
/// `roomToken` the customer needs to join the invoice's notification room.
pub async fn create_invoice<B: InvoiceStore>(
    body: web::Json<NewInvoice>,
    api: web::Data<InvoiceFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received new invoice request");
    let invoice = api.create_invoice(body.into_inner()).await?;
    let room_token = match &options.room_token_secret {
        Some(secret) => Some(
            room_token(secret.reveal(), &invoice.id)
                .map_err(|e| ServerError::ConfigurationError(format!("Could not issue a room token. {e}")))?,
        ),
        None => None,
    };
    let poll_interval_ms = options.poll_interval.as_millis() as u64;
    Ok(HttpResponse::Created().json(InvoiceCreated { invoice, room_token, poll_interval_ms }))
}

route!(invoice_by_id => Get "/invoices/{id}" impl InvoiceStore);
pub async fn invoice_by_id<B: InvoiceStore>(
    path: web::Path<InvoiceId>,
    api: web::Data<InvoiceFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    trace!("💻️ Fetching invoice [{id}]");
    let invoice = api.fetch_invoice(&id).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

route!(update_invoice_status => Patch "/invoices/{id}" impl InvoiceStore);
/// Applies a state machine event to an invoice.
///
/// The body is either `{"event": "paymentConfirmed", "paymentRef": "..."}` or `{"event": "cancel"}`. Repeating an
/// event that was already applied returns the stored invoice unchanged. Moving a paid invoice to cancelled, or vice
/// versa, is a `409 Conflict`.
pub async fn update_invoice_status<B: InvoiceStore>(
    path: web::Path<InvoiceId>,
    body: web::Json<InvoiceEvent>,
    api: web::Data<InvoiceFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let event = body.into_inner();
    debug!("💻️ Received {event:?} for invoice [{id}]");
    let invoice = api.transition(&id, event).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

route!(set_add_ons => Patch "/invoices/{id}/add-ons" impl InvoiceStore);
pub async fn set_add_ons<B: InvoiceStore>(
    path: web::Path<InvoiceId>,
    body: web::Json<AddOns>,
    api: web::Data<InvoiceFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ Received add-ons for invoice [{id}]");
    let invoice = api.set_add_ons(&id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout_session => Post "/checkout-session" impl InvoiceStore, PaymentGateway);
/// Opens a payment session for an invoice, recording the add-on quantity first if one is given.
pub async fn checkout_session<B: InvoiceStore, G: PaymentGateway>(
    body: web::Json<CheckoutSessionRequest>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let CheckoutSessionRequest { invoice_id, add_on_quantity } = body.into_inner();
    debug!("💻️ Received checkout request for invoice [{invoice_id}] with {add_on_quantity} add-ons");
    let session = api.begin_checkout(&invoice_id, add_on_quantity).await?;
    Ok(HttpResponse::Ok().json(CheckoutSessionResponse { session_id: session.session_id }))
}

route!(verify_payment => Post "/verify-payment" impl InvoiceStore, PaymentGateway);
/// Asks the payment provider how a session ended and applies the outcome to the session's invoice.
pub async fn verify_payment<B: InvoiceStore, G: PaymentGateway>(
    body: web::Json<SessionReference>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let session_id = body.into_inner().session_id;
    debug!("💻️ Verifying payment session {session_id}");
    let invoice = api.settle_session(&session_id).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

route!(payment_webhook => Post "/payment" impl InvoiceStore, PaymentGateway);
/// The provider's out-of-band callback. The HMAC middleware on the webhook scope has already checked the signature.
pub async fn payment_webhook<B: InvoiceStore, G: PaymentGateway>(
    body: web::Json<SessionReference>,
    api: web::Data<CheckoutApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let session_id = body.into_inner().session_id;
    info!("💻️ Payment webhook received for session {session_id}");
    let invoice = api.settle_session(&session_id).await?;
    Ok(HttpResponse::Ok().json(invoice))
}

/// Settles a session at the simulated provider, standing in for the customer completing or abandoning payment.
#[post("/simulator/sessions/{id}/settle")]
pub async fn settle_simulated_session(
    path: web::Path<SessionId>,
    body: web::Json<SettleSessionRequest>,
    gateway: web::Data<SimulatedGateway>,
) -> Result<HttpResponse, ServerError> {
    let session_id = path.into_inner();
    let paid = body.into_inner().paid;
    debug!("💻️ Simulating the end of payment session {session_id}. Paid: {paid}");
    let outcome = gateway.settle(&session_id, paid).await.map_err(InvoiceError::from)?;
    Ok(HttpResponse::Ok().json(outcome))
}

//----------------------------------------------   WebSocket  ----------------------------------------------------
route!(ws_connect => Get "/ws" impl InvoiceStore);
pub async fn ws_connect<B: InvoiceStore + 'static>(
    req: HttpRequest,
    body: web::Payload,
    hub: web::Data<NotificationHub>,
    api: web::Data<InvoiceFlowApi<B>>,
    options: web::Data<ServerOptions>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received WebSocket upgrade request");
    start_session(&req, body, hub.get_ref().clone(), api.get_ref().clone(), options.get_ref().clone()).await
}
