//! Accounting reports over loans, payments and shareholder capital.

use crate::{db::DbPool, error::AppError, models::shareholder::PortfolioSummary, tables};

/// Portfolio totals computed in a single query.
///
/// Only disbursed loans count toward principal, interest and outstanding
/// balance; payments count regardless of loan status.
pub async fn portfolio_summary(pool: &DbPool) -> Result<PortfolioSummary, AppError> {
    let sql = format!(
        r#"
        SELECT
            (SELECT COUNT(*) FROM {loans} WHERE status = 'pending') AS pending_loans,
            (SELECT COUNT(*) FROM {loans} WHERE status = 'approved') AS approved_loans,
            (SELECT COUNT(*) FROM {loans} WHERE status = 'rejected') AS rejected_loans,
            (SELECT COUNT(*) FROM {loans} WHERE status = 'disbursed') AS disbursed_loans,
            COALESCE(
                (SELECT SUM(principal_cents) FROM {loans} WHERE status = 'disbursed'), 0
            )::BIGINT AS disbursed_principal_cents,
            COALESCE(
                (SELECT SUM(interest_cents) FROM {loans} WHERE status = 'disbursed'), 0
            )::BIGINT AS expected_interest_cents,
            COALESCE((SELECT SUM(amount_cents) FROM {payments}), 0)::BIGINT AS repaid_cents,
            COALESCE(
                (SELECT SUM(GREATEST(l.total_payable_cents - COALESCE(p.paid, 0), 0))
                 FROM {loans} l
                 LEFT JOIN (
                     SELECT loan_id, SUM(amount_cents) AS paid
                     FROM {payments}
                     GROUP BY loan_id
                 ) p ON p.loan_id = l.id
                 WHERE l.status = 'disbursed'),
                0
            )::BIGINT AS outstanding_cents,
            COALESCE(
                (SELECT SUM(contribution_cents) FROM {shareholders}), 0
            )::BIGINT AS shareholder_capital_cents
        "#,
        loans = tables::LOANS,
        payments = tables::PAYMENTS,
        shareholders = tables::SHAREHOLDERS,
    );

    let summary = sqlx::query_as::<_, PortfolioSummary>(&sql)
        .fetch_one(pool)
        .await?;

    Ok(summary)
}
