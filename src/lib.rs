//! Namedrop - fixed-price domain marketplace escrow core
//!
//! Purchase-to-payout lifecycle for domain sales: the buyer's money is
//! held from payment capture until the domain transfer is confirmed (or
//! a deadline/dispute resolves it), then routed to the seller over the
//! configured payout rail.
//!
//! # Modules
//!
//! - [`escrow`] - Transfer state machine, deadline sweepers, dispute
//!   resolution, payout router
//! - [`listing`] - Listing status model
//! - [`seller`] - Seller payout profile
//! - [`notify`] - Outbound email notifications
//! - [`gateway`] - Axum HTTP surface
//! - [`auth`] - JWT and internal-secret middleware
//! - [`config`] - YAML application config
//! - [`db`] - PostgreSQL pool setup
//! - [`logging`] - tracing subscriber setup

pub mod auth;
pub mod config;
pub mod db;
pub mod escrow;
pub mod gateway;
pub mod listing;
pub mod logging;
pub mod notify;
pub mod seller;
