//! Request middleware.

pub mod gate;

pub use gate::{authorization_gate, GateState};
