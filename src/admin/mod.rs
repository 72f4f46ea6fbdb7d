//! Administrative surface: authentication service, protection layer and the
//! operator endpoints it guards.

pub mod auth;
pub mod handlers;
