use std::{collections::HashMap, time::Duration};

use checkout_engine::{
    db_types::{Invoice, InvoiceId},
    events::EventProducers,
    gateway::SimulatedGateway,
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    CheckoutApi,
    InvoiceError,
    InvoiceFlowApi,
    SqliteDatabase,
};
use cpg_common::Money;
use cucumber::World;
use log::*;

#[derive(Default, Debug, World)]
pub struct CheckoutWorld {
    pub system: Option<CheckoutSystem>,
    /// Invoices by the name the scenario gave them
    pub invoices: HashMap<String, InvoiceId>,
    pub last_result: Option<Result<Invoice, InvoiceError>>,
}

#[derive(Debug)]
pub struct CheckoutSystem {
    pub db_path: String,
    pub checkout: CheckoutApi<SqliteDatabase, SimulatedGateway>,
}

impl CheckoutWorld {
    pub fn api(&self) -> &InvoiceFlowApi<SqliteDatabase> {
        self.system.as_ref().expect("System not initialised").checkout.invoices()
    }

    pub fn checkout(&self) -> &CheckoutApi<SqliteDatabase, SimulatedGateway> {
        &self.system.as_ref().expect("System not initialised").checkout
    }

    pub fn invoice_id(&self, name: &str) -> InvoiceId {
        self.invoices.get(name).cloned().unwrap_or_else(|| panic!("No invoice called {name}"))
    }
}

impl CheckoutSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        run_migrations(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 2).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let invoices = InvoiceFlowApi::new(db, EventProducers::default());
        let checkout = CheckoutApi::new(invoices, SimulatedGateway::new(), Duration::from_secs(1), Money::from(100));
        Self { db_path: url, checkout }
    }
}
