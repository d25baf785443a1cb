//! Token secrets and the published token state.

pub mod secret;
pub mod state;
