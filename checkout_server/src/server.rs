use std::{future::Future, net::SocketAddr, pin::Pin, time::Duration};

use actix_web::{
    dev::Server,
    error::{JsonPayloadError, PathError},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpRequest,
    HttpServer,
};
use checkout_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    gateway::SimulatedGateway,
    notifications::{NotificationHub, ServerMessage},
    CheckoutApi,
    InvoiceFlowApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, ServerOptions},
    errors::ServerError,
    middleware::{HmacMiddlewareFactory, WEBHOOK_HMAC_HEADER},
    routes::{
        health,
        settle_simulated_session,
        CheckoutSessionRoute,
        CreateInvoiceRoute,
        InvoiceByIdRoute,
        PaymentWebhookRoute,
        SetAddOnsRoute,
        UpdateInvoiceStatusRoute,
        VerifyPaymentRoute,
        WsConnectRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let hub = NotificationHub::new(config.subscriber_buffer);
    let handlers = EventHandlers::new(config.event_buffer, notification_hooks(hub.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let (srv, addr) = create_server_instance(config, db, SimulatedGateway::new(), hub.clone(), producers)?;
    info!("🚀️ Listening on {addr}");
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    let closed = hub.shutdown().await;
    info!("📢️ Notification hub shut down. {closed} connections closed.");
    result
}

/// Status hooks that log every terminal transition and announce it in the invoice's room.
pub fn notification_hooks(hub: NotificationHub) -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_status_changed(|ev| {
        Box::pin(async move {
            info!("🧾️ Invoice [{}] is now {}", ev.invoice_id, ev.status);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_status_changed(move |ev| {
        let hub = hub.clone();
        Box::pin(async move {
            let Some(message) = ServerMessage::for_event(&ev) else {
                return;
            };
            let report = hub.publish(&ev.invoice_id, message).await;
            debug!("📢️ Announced invoice [{}] as {}. {report:?}", ev.invoice_id, ev.status);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

/// Binds the server without starting it. The returned address is the one actually bound, which matters when the
/// configured port is 0.
pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: SimulatedGateway,
    hub: NotificationHub,
    producers: EventProducers,
) -> Result<(Server, SocketAddr), ServerError> {
    let options = ServerOptions::from_config(&config);
    let webhook = config.webhook.clone();
    let gateway_timeout = config.gateway_timeout;
    let add_on_unit_price = config.add_on_unit_price;
    let http = HttpServer::new(move || {
        let invoice_api = InvoiceFlowApi::new(db.clone(), producers.clone());
        let checkout_api = CheckoutApi::new(invoice_api.clone(), gateway.clone(), gateway_timeout, add_on_unit_price);
        let api_scope = web::scope("/api")
            .service(CreateInvoiceRoute::<SqliteDatabase>::new())
            .service(InvoiceByIdRoute::<SqliteDatabase>::new())
            .service(UpdateInvoiceStatusRoute::<SqliteDatabase>::new())
            .service(SetAddOnsRoute::<SqliteDatabase>::new())
            .service(CheckoutSessionRoute::<SqliteDatabase, SimulatedGateway>::new())
            .service(VerifyPaymentRoute::<SqliteDatabase, SimulatedGateway>::new())
            .service(settle_simulated_session);
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(WEBHOOK_HMAC_HEADER, webhook.hmac_secret.clone(), webhook.hmac_checks))
            .service(PaymentWebhookRoute::<SqliteDatabase, SimulatedGateway>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("cpg::access_log"))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(web::Data::new(invoice_api))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(hub.clone()))
            .app_data(web::Data::new(options.clone()))
            .service(health)
            .service(WsConnectRoute::<SqliteDatabase>::new())
            .service(api_scope)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?;
    let addr = http
        .addrs()
        .first()
        .copied()
        .ok_or_else(|| ServerError::InitializeError("The server did not bind to any address".into()))?;
    Ok((http.run(), addr))
}

/// Malformed bodies get the same `{"error": ...}` treatment as every other failure.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
        debug!("💻️ Rejected request body. {err}");
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: PathError, _req: &HttpRequest| {
        ServerError::InvalidRequestPath(err.to_string()).into()
    })
}
