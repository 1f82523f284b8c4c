//! Router Module Index
//!
//! Routes are split by who may call them. Access is enforced with layers at
//! the module boundary and role checks in the handlers.

/// Routes reachable without a token.
pub mod public;

/// Routes behind the auth gate.
pub mod authenticated;

/// Routes behind the auth gate that also require the ADMIN role.
pub mod admin;
