use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cpg_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, types::Json, FromRow, Row, Type};
use thiserror::Error;

//--------------------------------------       InvoiceId       ---------------------------------------------------------
/// Opaque invoice identifier. Assigned once at creation and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct InvoiceId(pub String);

impl InvoiceId {
    /// Generates a fresh 24-character hex identifier.
    pub fn random() -> Self {
        Self(format!("{:016x}{:08x}", rand::random::<u64>(), rand::random::<u32>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for InvoiceId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("Invoice id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for InvoiceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InvoiceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------     InvoiceStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    /// The invoice has been created and is waiting for payment.
    Pending,
    /// Payment has been confirmed. Terminal.
    Paid,
    /// The invoice was cancelled or the payment failed. Terminal.
    Cancelled,
}

impl InvoiceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Paid => write!(f, "paid"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(pub String);

impl FromStr for InvoiceStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid invoice status: {s}"))),
        }
    }
}

//--------------------------------------       Customer        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
}

impl Customer {
    pub fn new<S1: Into<String>, S2: Into<String>>(name: S1, email: S2) -> Self {
        Self { name: name.into(), email: email.into() }
    }
}

//--------------------------------------       LineItem        ---------------------------------------------------------
/// A product line, priced when the order was placed. Later catalog changes do not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_ref: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl LineItem {
    pub fn new<S: Into<String>>(product_ref: S, quantity: u32, unit_price: Money) -> Self {
        Self { product_ref: product_ref.into(), quantity, unit_price }
    }

    pub fn amount(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------        AddOns         ---------------------------------------------------------
/// The optional accessory line chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOns {
    pub quantity: u32,
    pub unit_price: Money,
}

impl AddOns {
    pub fn new(quantity: u32, unit_price: Money) -> Self {
        Self { quantity, unit_price }
    }

    pub fn amount(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------      NewInvoice       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    pub customer: Customer,
    pub line_items: Vec<LineItem>,
}

impl NewInvoice {
    pub fn new(customer: Customer, line_items: Vec<LineItem>) -> Self {
        Self { customer, line_items }
    }

    /// The sum of all line amounts, or `None` if it overflows.
    pub fn total(&self) -> Option<Money> {
        self.line_items.iter().try_fold(Money::default(), |acc, item| acc.checked_add(item.amount()?))
    }
}

//--------------------------------------        Invoice        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub customer: Customer,
    pub line_items: Vec<LineItem>,
    pub add_ons: Option<AddOns>,
    /// Kept in step with the lines while pending. Never recomputed once the invoice is settled.
    pub total_amount: Money,
    pub status: InvoiceStatus,
    pub payment_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Sums the persisted lines. Used to check the stored total, not to replace it.
    pub fn computed_total(&self) -> Option<Money> {
        let items = self.line_items.iter().try_fold(Money::default(), |acc, item| acc.checked_add(item.amount()?))?;
        match self.add_ons {
            Some(add_ons) => items.checked_add(add_ons.amount()?),
            None => Some(items),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }
}

impl FromRow<'_, SqliteRow> for Invoice {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let Json(line_items) = row.try_get::<Json<Vec<LineItem>>, _>("line_items")?;
        let add_on_quantity: Option<i64> = row.try_get("add_on_quantity")?;
        let add_on_unit_price: Option<Money> = row.try_get("add_on_unit_price")?;
        let add_ons = match (add_on_quantity, add_on_unit_price) {
            (Some(q), Some(unit_price)) => {
                let quantity = u32::try_from(q).map_err(|e| sqlx::Error::ColumnDecode {
                    index: "add_on_quantity".into(),
                    source: Box::new(e),
                })?;
                Some(AddOns { quantity, unit_price })
            },
            _ => None,
        };
        Ok(Self {
            id: row.try_get("id")?,
            customer: Customer { name: row.try_get("customer_name")?, email: row.try_get("customer_email")? },
            line_items,
            add_ons,
            total_amount: row.try_get("total_amount")?,
            status: row.try_get("status")?,
            payment_ref: row.try_get("payment_ref")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
