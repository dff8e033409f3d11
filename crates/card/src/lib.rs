//! Card transport boundary for the cardsmith personalization engine.
//!
//! This crate owns the pieces the engine and a card reader implementation
//! have to agree on: logical file paths, file descriptors with their access
//! control lists, and the [`CardSession`] capability through which every
//! select/create/update/verify round-trip flows. It also ships [`MockCard`],
//! an in-memory card with an event log, used by the engine's tests and by
//! the CLI's demo mode.

mod acl;
mod file;
mod mock;
mod path;
mod session;

pub use acl::{AccessCondition, Acl, Operation, SecretMethod};
pub use file::{FileDescriptor, FileKind};
pub use mock::{Event, MockCard};
pub use path::{CardPath, MF_ID};
pub use session::{CardSession, TransportError};
