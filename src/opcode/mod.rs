//! Bit-pattern engine: encodes and decodes 32-bit ISP command words from
//! declarative per-part bit descriptors.

mod cmdbit;
mod engine;

pub use cmdbit::CmdBit;
pub use engine::{
    addr_bit_range, get_output, intlog2, set_addr, set_addr_mem, set_bits, set_input,
    AddrRangeKind, Opcode, OPCODE_BITS,
};
