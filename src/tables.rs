//! Static mapping from domain entities to database table names.
//!
//! Every query in the service names its table through these constants,
//! so a rename only touches this file and the migrations.

/// Hashed staff bearer tokens
pub const STAFF_TOKENS: &str = "staff_tokens";

/// Borrowers
pub const CLIENTS: &str = "clients";

/// Loan applications and their lifecycle state
pub const LOANS: &str = "loans";

/// Repayments recorded against loans
pub const PAYMENTS: &str = "loan_payments";

/// M-Pesa STK push transactions awaiting or holding a callback outcome
pub const MPESA_TRANSACTIONS: &str = "mpesa_transactions";

/// In-app notifications for staff
pub const NOTIFICATIONS: &str = "notifications";

/// Shareholder capital register
pub const SHAREHOLDERS: &str = "shareholders";

/// Entity name to table name, in migration order.
///
/// The health check walks this list to confirm the schema is in place.
pub const TABLES: &[(&str, &str)] = &[
    ("staff_token", STAFF_TOKENS),
    ("client", CLIENTS),
    ("loan", LOANS),
    ("payment", PAYMENTS),
    ("mpesa_transaction", MPESA_TRANSACTIONS),
    ("notification", NOTIFICATIONS),
    ("shareholder", SHAREHOLDERS),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_entity_is_mapped() {
        let entities: Vec<_> = TABLES.iter().map(|(entity, _)| *entity).collect();
        assert!(entities.contains(&"loan"));
        assert!(entities.contains(&"payment"));
        assert!(entities.contains(&"mpesa_transaction"));
    }

    #[test]
    fn test_table_names_are_unique() {
        let names: HashSet<_> = TABLES.iter().map(|(_, table)| *table).collect();
        assert_eq!(names.len(), TABLES.len());
    }
}
