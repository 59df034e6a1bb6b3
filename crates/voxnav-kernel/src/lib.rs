//! `voxnav-kernel` – actuation safety.
//!
//! The kernel does not plan or steer.  It decides who may drive the agent
//! and lets anyone holding a handle stop them.
//!
//! # Modules
//!
//! - [`authority`] – [`ActuationAuthority`][authority::ActuationAuthority]:
//!   hands out at most one [`ActuationToken`][authority::ActuationToken] per
//!   agent.  The token is passed into every traversal and carries the
//!   out-of-band cancellation flag the control loop polls each tick.

pub mod authority;

pub use authority::{ActuationAuthority, ActuationToken};
