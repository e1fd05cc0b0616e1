use checkout_engine::{
    db_types::{AddOns, Invoice, InvoiceId, InvoiceStatus, NewInvoice},
    GatewayError,
    InvoiceError,
    InvoiceStore,
    PaymentGateway,
    PaymentOutcome,
    SessionId,
};
use mockall::mock;

mock! {
    pub Store {}
    impl Clone for Store {
        fn clone(&self) -> Self;
    }
    impl InvoiceStore for Store {
        fn url(&self) -> &str;
        async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, InvoiceError>;
        async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, InvoiceError>;
        async fn set_add_ons_if_pending(&self, id: &InvoiceId, add_ons: AddOns) -> Result<Option<Invoice>, InvoiceError>;
        async fn update_status_if_pending(&self, id: &InvoiceId, status: InvoiceStatus, payment_ref: Option<String>) -> Result<Option<Invoice>, InvoiceError>;
        async fn close(&mut self) -> Result<(), InvoiceError>;
    }
}

mock! {
    pub Gateway {}
    impl Clone for Gateway {
        fn clone(&self) -> Self;
    }
    impl PaymentGateway for Gateway {
        async fn create_session(&self, invoice: &Invoice) -> Result<SessionId, GatewayError>;
        async fn retrieve_outcome(&self, session_id: &SessionId) -> Result<PaymentOutcome, GatewayError>;
    }
}
