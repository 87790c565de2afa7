//! # Reconciliation server
//! This crate hosts the HTTP front end of the payment reconciliation engine. It is responsible for:
//! * Receiving webhook deliveries from the payment processor, authenticating them (IP whitelist and HMAC signature)
//!   and handing them to the [`reconciliation_engine::ReconciliationApi`].
//! * Acknowledging every authenticated delivery with `200 {"received": true}`, whatever the engine made of it.
//! * Serving the ledger and the audit log to internal collaborators, behind an API key.
//! * Relaying payment notifications to downstream messaging.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/webhook/payments`: The processor webhook.
//! * `/api/payments`, `/api/payments/{id}`: Ledger search and lookup.
//! * `/api/audit`: The audit log of reconciliation decisions.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
