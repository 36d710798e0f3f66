/// workdesk - employee worksheet and work-report tracking portal
///
/// A role-gated JSON REST service: authenticated principals log daily work,
/// submit worksheets and reports, and managers approve or reject them,
/// scoped by department and role. Every mutation leaves an audit record.

pub mod account;
pub mod api;
pub mod audit;
pub mod authz;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod reports;
pub mod server;
pub mod users;
pub mod worksheets;

#[cfg(test)]
pub mod testutil;
