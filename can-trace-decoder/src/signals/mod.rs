//! Signal dictionary boundary and the DBC-backed implementation
//!
//! The pipeline only sees the [`SignalDictionary`] trait. [`SignalDatabase`]
//! is the implementation shipped with the crate, loaded from DBC files; tests
//! and embedders can inject any other type that implements the trait.

pub mod database;
pub mod dbc;
pub mod dictionary;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, MessageDefinition, MultiplexerInfo, SignalDatabase,
    SignalDefinition, SignalMatch, ValueType,
};
pub use dictionary::{DecodeError, MessageDescriptor, SignalDictionary};
