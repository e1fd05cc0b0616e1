//! `SqliteDatabase` is the concrete SQLite implementation of [`InvoiceStore`].
use std::fmt::Debug;

use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{db_url, invoices, new_pool};
use crate::{
    db_types::{AddOns, Invoice, InvoiceId, InvoiceStatus, NewInvoice},
    traits::{InvoiceError, InvoiceStore},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl InvoiceStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, InvoiceError> {
        let total = invoice
            .total()
            .ok_or_else(|| InvoiceError::Validation("The invoice total does not fit in an amount".into()))?;
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::insert_invoice(invoice, total.value(), &mut conn).await?;
        Ok(invoice)
    }

    async fn fetch_invoice(&self, id: &InvoiceId) -> Result<Option<Invoice>, InvoiceError> {
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::fetch_invoice(id, &mut conn).await?;
        Ok(invoice)
    }

    async fn set_add_ons_if_pending(&self, id: &InvoiceId, add_ons: AddOns) -> Result<Option<Invoice>, InvoiceError> {
        let amount = add_ons
            .amount()
            .ok_or_else(|| InvoiceError::Validation("The add-on amount does not fit in an amount".into()))?;
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::set_add_ons_if_pending(id, add_ons, amount.value(), &mut conn).await?;
        Ok(invoice)
    }

    async fn update_status_if_pending(
        &self,
        id: &InvoiceId,
        status: InvoiceStatus,
        payment_ref: Option<String>,
    ) -> Result<Option<Invoice>, InvoiceError> {
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::update_status_if_pending(id, status, payment_ref, &mut conn).await?;
        Ok(invoice)
    }

    async fn close(&mut self) -> Result<(), InvoiceError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `CPG_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    /// Creates a new database API object. The database file is created if it does not exist.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), InvoiceError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| InvoiceError::TransientIo(format!("Could not run migrations. {e}")))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
