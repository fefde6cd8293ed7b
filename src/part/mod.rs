//! Part/memory model: a purely declarative description of one target
//! device. Parsing part descriptions from a configuration file is an
//! external collaborator's job; the core only consumes the fully
//! resolved [`Part`].

mod memory;
mod part;

pub use memory::{Memory, MemoryClass, MemoryOpcodes};
pub use part::{MemoryAlias, Part, PartOpNum, ProgModes, PART_OPCODE_SLOTS};
