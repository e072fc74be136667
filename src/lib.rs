pub mod api_router;
pub mod config;
pub mod notifications;
pub mod shared;
pub mod sla;
pub mod tickets;
