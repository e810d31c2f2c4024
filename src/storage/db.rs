//! Durable stores for members and payment records.
//!
//! SQLite behind an r2d2 pool. All status transitions on payments go
//! through [`decide_payment`], which runs the guard and the mutation in a
//! single immediate transaction so duplicate callbacks and racing admins
//! collapse to one effective decision.

use std::str::FromStr;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Result, Row, TransactionBehavior, params};
use strum::{Display, EnumString};

use crate::payments::PaymentStatus;
use crate::payments::report::Gateway;
use crate::payments::tier::{ApprovedHistory, Tier, TierThresholds, tier_for};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Member vetting status. Independent of any individual payment's
/// status; an approved payment does not vet the member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum MemberStatus {
    #[strum(serialize = "PENDING")]
    Pending,
    #[strum(serialize = "APPROVED")]
    Approved,
}

/// Durable record per Telegram user.
#[derive(Debug, Clone)]
pub struct Member {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub approval_status: MemberStatus,
    /// Sum of all APPROVED payment totals ever credited to this member.
    /// Only [`decide_payment`] writes it.
    pub savings: f64,
    pub tier: Tier,
    pub joined_at: String,
}

impl Member {
    /// Best-effort display name: username, then first name, then the id.
    pub fn display_name(&self) -> String {
        if let Some(username) = &self.username {
            format!("@{username}")
        } else if let Some(first_name) = &self.first_name {
            first_name.clone()
        } else {
            self.user_id.to_string()
        }
    }
}

/// Durable record per submitted payment report.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub id: i64,
    pub tx_ref: String,
    pub user_id: i64,
    pub gateway: Gateway,
    pub purpose: String,
    pub period: Option<String>,
    pub amount: f64,
    pub penalty: f64,
    pub total_amount: f64,
    pub pay_for: Option<String>,
    pub guarantors: Vec<String>,
    pub file_id: Option<String>,
    pub status: PaymentStatus,
    pub decided_by: Option<i64>,
    pub decided_at: Option<String>,
    pub group_msg_id: Option<i64>,
    pub created_at: String,
}

/// Fields needed to insert a payment record.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub tx_ref: String,
    pub user_id: i64,
    pub gateway: Gateway,
    pub purpose: String,
    pub period: Option<String>,
    pub amount: f64,
    pub penalty: f64,
    pub total_amount: f64,
    pub pay_for: Option<String>,
    pub guarantors: Vec<String>,
    pub file_id: Option<String>,
    pub status: PaymentStatus,
}

/// Create the connection pool and bring the schema up to date.
pub fn create_pool(database_path: &str) -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    crate::storage::migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool; returned to the pool on drop.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

// Guarantor names are stored as a single comma-joined column; names come
// from the mini-app form, which strips commas.
fn join_names(names: &[String]) -> Option<String> {
    if names.is_empty() { None } else { Some(names.join(",")) }
}

fn split_names(raw: Option<String>) -> Vec<String> {
    raw.map(|s| s.split(',').map(str::to_string).collect()).unwrap_or_default()
}

fn parse_enum<T>(idx: usize, raw: &str) -> Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    T::from_str(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Idempotent upsert on first contact. Identity fields refresh on every
/// call; savings and tier are never touched here.
pub fn upsert_member(conn: &DbConnection, user_id: i64, username: Option<&str>, first_name: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO members (user_id, username, first_name, joined_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET username = excluded.username, first_name = excluded.first_name",
        params![user_id, username, first_name, now()],
    )?;
    Ok(())
}

pub fn get_member(conn: &DbConnection, user_id: i64) -> Result<Option<Member>> {
    conn.query_row(
        "SELECT user_id, username, first_name, approval_status, savings, tier, joined_at
         FROM members WHERE user_id = ?1",
        params![user_id],
        map_member,
    )
    .optional()
}

fn map_member(row: &Row<'_>) -> Result<Member> {
    Ok(Member {
        user_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        approval_status: parse_enum(3, &row.get::<_, String>(3)?)?,
        savings: row.get(4)?,
        tier: parse_enum(5, &row.get::<_, String>(5)?)?,
        joined_at: row.get(6)?,
    })
}

/// Mark a member as vetted. Admin-driven; nothing in the payment
/// workflow calls this implicitly.
pub fn set_member_status(conn: &DbConnection, user_id: i64, status: MemberStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE members SET approval_status = ?1 WHERE user_id = ?2",
        params![status.to_string(), user_id],
    )?;
    Ok(changed > 0)
}

/// A member's approved-payment history, the tier calculator's input.
pub fn approved_history(conn: &rusqlite::Connection, user_id: i64) -> Result<ApprovedHistory> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(total_amount), 0) FROM payments WHERE user_id = ?1 AND status = 'APPROVED'",
        params![user_id],
        |row| {
            Ok(ApprovedHistory {
                count: row.get::<_, i64>(0)? as u32,
                total: row.get(1)?,
            })
        },
    )
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

pub fn insert_payment(conn: &DbConnection, payment: &NewPayment) -> Result<i64> {
    conn.execute(
        "INSERT INTO payments (tx_ref, user_id, gateway, purpose, period, amount, penalty, total_amount,
                               pay_for, guarantors, file_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            payment.tx_ref,
            payment.user_id,
            payment.gateway.to_string(),
            payment.purpose,
            payment.period,
            payment.amount,
            payment.penalty,
            payment.total_amount,
            payment.pay_for,
            join_names(&payment.guarantors),
            payment.file_id,
            payment.status.to_string(),
            now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_payment(conn: &DbConnection, id: i64) -> Result<Option<PaymentRecord>> {
    conn.query_row(
        &format!("{PAYMENT_COLUMNS} WHERE id = ?1"),
        params![id],
        map_payment,
    )
    .optional()
}

const PAYMENT_COLUMNS: &str = "SELECT id, tx_ref, user_id, gateway, purpose, period, amount, penalty, total_amount,
                               pay_for, guarantors, file_id, status, decided_by, decided_at, group_msg_id, created_at
                               FROM payments";

fn map_payment(row: &Row<'_>) -> Result<PaymentRecord> {
    Ok(PaymentRecord {
        id: row.get(0)?,
        tx_ref: row.get(1)?,
        user_id: row.get(2)?,
        gateway: parse_enum(3, &row.get::<_, String>(3)?)?,
        purpose: row.get(4)?,
        period: row.get(5)?,
        amount: row.get(6)?,
        penalty: row.get(7)?,
        total_amount: row.get(8)?,
        pay_for: row.get(9)?,
        guarantors: split_names(row.get(10)?),
        file_id: row.get(11)?,
        status: parse_enum(12, &row.get::<_, String>(12)?)?,
        decided_by: row.get(13)?,
        decided_at: row.get(14)?,
        group_msg_id: row.get(15)?,
        created_at: row.get(16)?,
    })
}

/// Remember the group announcement message so decisions can edit it in
/// place instead of posting a duplicate.
pub fn set_group_message(conn: &DbConnection, payment_id: i64, group_msg_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE payments SET group_msg_id = ?1 WHERE id = ?2",
        params![group_msg_id, payment_id],
    )?;
    Ok(())
}

/// Outcome of a successfully applied decision.
#[derive(Debug, Clone)]
pub struct DecisionRow {
    /// The record as it stands after the transition.
    pub payment: PaymentRecord,
    /// Recomputed tier after crediting (approve only).
    pub new_tier: Option<Tier>,
    /// Whether the approval raised the member's tier.
    pub tier_raised: bool,
}

/// Apply a terminal decision to a payment in one atomic unit.
///
/// The UPDATE is conditional on `status = 'AWAIT_APPROVAL'`, so a record
/// that is missing or already terminal yields `Ok(None)` with no state
/// change; the caller reports "already processed". On approval the
/// member's savings are credited and the tier recomputed inside the same
/// transaction, so a crash cannot leave an approved payment uncredited.
pub fn decide_payment(
    conn: &mut DbConnection,
    payment_id: i64,
    verdict: PaymentStatus,
    decided_by: i64,
    thresholds: &TierThresholds,
) -> Result<Option<DecisionRow>> {
    debug_assert!(verdict.is_terminal());

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let changed = tx.execute(
        "UPDATE payments SET status = ?1, decided_by = ?2, decided_at = ?3
         WHERE id = ?4 AND status = 'AWAIT_APPROVAL'",
        params![verdict.to_string(), decided_by, now(), payment_id],
    )?;
    if changed == 0 {
        // Already terminal (or unknown id): idempotent no-op, no credit.
        tx.rollback()?;
        return Ok(None);
    }

    let payment = tx.query_row(&format!("{PAYMENT_COLUMNS} WHERE id = ?1"), params![payment_id], map_payment)?;

    let mut new_tier = None;
    let mut tier_raised = false;
    if verdict == PaymentStatus::Approved {
        let previous: Tier = tx.query_row(
            "SELECT tier FROM members WHERE user_id = ?1",
            params![payment.user_id],
            |row| parse_enum(0, &row.get::<_, String>(0)?),
        )?;

        tx.execute(
            "UPDATE members SET savings = savings + ?1 WHERE user_id = ?2",
            params![payment.total_amount, payment.user_id],
        )?;

        let history = approved_history(&tx, payment.user_id)?;
        let tier = tier_for(history, thresholds);
        tx.execute(
            "UPDATE members SET tier = ?1 WHERE user_id = ?2",
            params![tier.to_string(), payment.user_id],
        )?;

        tier_raised = tier != previous;
        new_tier = Some(tier);
    }

    tx.commit()?;
    Ok(Some(DecisionRow {
        payment,
        new_tier,
        tier_raised,
    }))
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Overall totals for the admin summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub member_count: i64,
    pub approved_count: i64,
    pub approved_total: f64,
}

pub fn summary(conn: &DbConnection) -> Result<Summary> {
    let (approved_count, approved_total) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(total_amount), 0) FROM payments WHERE status = 'APPROVED'",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let member_count = conn.query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?;
    Ok(Summary {
        member_count,
        approved_count,
        approved_total,
    })
}

/// One line of an admin report, with the submitter's display name joined
/// in.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: i64,
    pub tx_ref: String,
    pub username: Option<String>,
    pub purpose: String,
    pub total_amount: f64,
}

/// Most recent approved payments, newest first.
pub fn approved_payments(conn: &DbConnection, limit: u32) -> Result<Vec<ReportRow>> {
    report_rows(conn, "APPROVED", limit)
}

/// Payments still waiting for a decision, newest first.
pub fn pending_payments(conn: &DbConnection, limit: u32) -> Result<Vec<ReportRow>> {
    report_rows(conn, "AWAIT_APPROVAL", limit)
}

fn report_rows(conn: &DbConnection, status: &str, limit: u32) -> Result<Vec<ReportRow>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.tx_ref, m.username, p.purpose, p.total_amount
         FROM payments p LEFT JOIN members m ON m.user_id = p.user_id
         WHERE p.status = ?1 ORDER BY p.id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![status, limit], |row| {
        Ok(ReportRow {
            id: row.get(0)?,
            tx_ref: row.get(1)?,
            username: row.get(2)?,
            purpose: row.get(3)?,
            total_amount: row.get(4)?,
        })
    })?;
    rows.collect()
}
