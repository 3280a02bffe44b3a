//! Backend calls (password reset, sign-up, single logout)

mod transport;

pub use transport::JsonRpcTransport;
