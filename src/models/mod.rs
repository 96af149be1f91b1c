//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request and response bodies of the HTTP API.

/// Borrower records
pub mod client;
/// Loan lifecycle and terms
pub mod loan;
/// M-Pesa STK transactions and callback payloads
pub mod mpesa;
pub mod notification;
pub mod payment;
/// Shareholder register and portfolio summary
pub mod shareholder;
/// Staff bearer token authentication model
pub mod staff_token;
