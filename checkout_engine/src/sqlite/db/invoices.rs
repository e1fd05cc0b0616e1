use chrono::Utc;
use log::{debug, trace};
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{AddOns, Invoice, InvoiceId, InvoiceStatus, NewInvoice};

/// Inserts a new `pending` invoice with a freshly generated id.
///
/// The caller is responsible for checking that `total` is the sum of the line amounts.
pub async fn insert_invoice(
    invoice: NewInvoice,
    total: i64,
    conn: &mut SqliteConnection,
) -> Result<Invoice, sqlx::Error> {
    let id = InvoiceId::random();
    let now = Utc::now();
    let invoice: Invoice = sqlx::query_as::<_, Invoice>(
        r#"
            INSERT INTO invoices (
                id,
                customer_name,
                customer_email,
                line_items,
                total_amount,
                status,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
            RETURNING *;
        "#,
    )
    .bind(id)
    .bind(invoice.customer.name)
    .bind(invoice.customer.email)
    .bind(Json(invoice.line_items))
    .bind(total)
    .bind(now)
    .bind(now)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next()
    .ok_or(sqlx::Error::RowNotFound)?;
    debug!("🗃️ Invoice [{}] inserted for {}", invoice.id, invoice.total_amount);
    Ok(invoice)
}

pub async fn fetch_invoice(id: &InvoiceId, conn: &mut SqliteConnection) -> Result<Option<Invoice>, sqlx::Error> {
    let invoice = sqlx::query_as("SELECT * FROM invoices WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(invoice)
}

/// Sets the add-on line and bumps the total in one statement. Matches nothing unless the invoice is `pending`, has no
/// add-ons yet and the new total still fits in an INTEGER.
pub async fn set_add_ons_if_pending(
    id: &InvoiceId,
    add_ons: AddOns,
    amount: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    let invoice: Option<Invoice> = sqlx::query_as(
        r#"
            UPDATE invoices SET
                add_on_quantity = $1,
                add_on_unit_price = $2,
                total_amount = total_amount + $3,
                updated_at = $4
            WHERE id = $5 AND status = 'pending' AND add_on_quantity IS NULL
                AND total_amount <= 9223372036854775807 - $3
            RETURNING *;
        "#,
    )
    .bind(i64::from(add_ons.quantity))
    .bind(add_ons.unit_price)
    .bind(amount)
    .bind(Utc::now())
    .bind(id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    trace!("🗃️ Add-on update for invoice [{id}] matched: {}", invoice.is_some());
    Ok(invoice)
}

/// The compare-and-swap on `status = 'pending'`. Exactly one concurrent caller can get a row back.
///
/// `UPDATE .. RETURNING` statements are always run to completion. The implicit transaction only commits once the
/// statement has finished, and a reader on another connection would otherwise still see the old row.
pub async fn update_status_if_pending(
    id: &InvoiceId,
    status: InvoiceStatus,
    payment_ref: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<Invoice>, sqlx::Error> {
    let invoice: Option<Invoice> = sqlx::query_as(
        r#"
            UPDATE invoices SET
                status = $1,
                payment_ref = $2,
                updated_at = $3
            WHERE id = $4 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(payment_ref)
    .bind(Utc::now())
    .bind(id.as_str())
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    trace!("🗃️ Status update of invoice [{id}] to {status} matched: {}", invoice.is_some());
    Ok(invoice)
}
