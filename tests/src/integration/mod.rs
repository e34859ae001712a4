//! Integration flows between independent clients.

mod actions;
mod collections;
mod failures;
mod methods;
