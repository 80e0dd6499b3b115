//! Session store and credential refresh
//!
//! A session binds an opaque [`SessionId`](crate::models::SessionId) to the
//! Google credential obtained at login. The store is trait-based so the
//! volatile in-memory map can be swapped for a durable backend.

mod memory;
mod refresh;
mod traits;

pub use memory::InMemorySessionStore;
pub use refresh::CredentialRefresher;
pub use traits::SessionStore;
