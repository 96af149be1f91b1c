//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and lifecycle rules.

pub mod loan_service;
pub mod mpesa_service;
pub mod notification_service;
pub mod payment_service;
pub mod report_service;
