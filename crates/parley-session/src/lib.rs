pub mod controller;

pub use controller::{ChatController, SendOutcome, SessionConfig};
