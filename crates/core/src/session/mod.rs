//! Session state shared by the portal login variants

mod auth_session;
mod events;

pub use auth_session::AuthSession;
pub use events::{SessionEvents, Subscription};
