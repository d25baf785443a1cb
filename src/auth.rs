//! Session credentials: redacted token secrets, the current token state, and key handles.

pub mod key;
pub mod token;

pub use key::*;
pub use token::{secret::*, state::*};
