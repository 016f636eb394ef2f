//! Domain events and the envelope they travel in.
//!
//! The registry is event-sourced: every state change is an `Event`, appended to
//! a log and replayed on startup. Envelopes add the stream metadata.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
