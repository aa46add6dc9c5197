//! CLI commands implementation

pub mod email;
pub mod health;
pub mod office;
pub mod pmo;

pub use email::*;
pub use health::*;
pub use office::*;
pub use pmo::*;
