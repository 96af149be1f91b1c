//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Performs business logic (database queries, validation)
//! 3. Returns HTTP response (JSON, status code)

/// Client management endpoints
pub mod clients;
pub mod health;
/// Loan origination and lifecycle endpoints
pub mod loans;
/// M-Pesa transaction and callback endpoints
pub mod mpesa;
pub mod notifications;
pub mod payments;
/// Shareholder register and accounting reports
pub mod shareholders;
pub mod tokens;
