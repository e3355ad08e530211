//! API Routes
//!
//! Route handlers organized by functionality.

pub mod autocomplete;
pub mod health;
pub mod rooms;
