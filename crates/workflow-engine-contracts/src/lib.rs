// Public contracts for the configurable workflow engine.
// This crate defines the data-model DTOs from spec §3 and the inbound
// event payloads from spec §6. It has no I/O of its own.

pub mod enums;
pub mod events;
pub mod inputs;
pub mod model;

pub use enums::*;
pub use events::*;
pub use inputs::*;
pub use model::*;
