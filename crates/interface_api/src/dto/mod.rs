//! Request and response bodies

pub mod accounts;
pub mod operations;
pub mod reports;
