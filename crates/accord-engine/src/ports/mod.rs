//! Ports: the engine's driving API and its driven collaborators.

pub mod inbound;
pub mod outbound;

pub use inbound::ItemApi;
pub use outbound::{Ledger, Network, NotificationHandler};
