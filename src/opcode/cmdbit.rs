//! The command-bit datum.

/// One position in a 32-bit ISP command word.
///
/// A command bit is a pure datum: it says nothing about how a wire word
/// is built, only what the bit at this position *means*. The engine in
/// [`super::engine`] walks a whole [`super::Opcode`] and interprets each
/// position according to its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdBit {
    /// Position carries no information; treated as constant 0 wherever a
    /// constant value is required, but never accepts `addr`/`data` bits.
    Ignore,
    /// A fixed bit value baked into the opcode itself.
    Value(bool),
    /// Bit `k` of the address word belongs at this position.
    Address(u8),
    /// Bit `k` of the input data byte belongs at this position.
    Input(u8),
    /// Bit `k` of the output (result) byte is read from this position.
    Output(u8),
}
