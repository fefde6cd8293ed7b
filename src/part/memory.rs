//! A named memory region of a part.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::opcode::Opcode;

/// How a memory's address space is consumed by the four classes the
/// write-back cache understands, plus a catch-all for everything else
/// (fuses, lock bits, signature, calibration, ...) that the cache never
/// touches directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryClass {
    /// Flash, including XMEGA sub-memories (`application`, `apptable`,
    /// `boot`).
    Flash,
    /// EEPROM.
    Eeprom,
    /// The UPDI boot row.
    Bootrow,
    /// User signature row (aliased as `userrow` on some parts).
    UserSig,
    /// Anything else: fuses, lock bits, signature, calibration, ...
    Other,
}

impl MemoryClass {
    /// Classifies a memory by its declared name: `flash` and its XMEGA
    /// sub-memories (`application`, `apptable`, `boot`) all become
    /// [`MemoryClass::Flash`]; `eeprom`, `bootrow`, and `usersig` (or its
    /// `userrow` alias) become their matching class; anything else is
    /// [`MemoryClass::Other`]. Matched case-insensitively.
    pub fn classify(desc: &str) -> MemoryClass {
        match desc.to_ascii_lowercase().as_str() {
            "flash" | "application" | "apptable" | "boot" => MemoryClass::Flash,
            "eeprom" => MemoryClass::Eeprom,
            "bootrow" => MemoryClass::Bootrow,
            "usersig" | "userrow" => MemoryClass::UserSig,
            _ => MemoryClass::Other,
        }
    }

    /// True for the four classes the write-back cache understands.
    pub fn is_paged_type(self) -> bool {
        !matches!(self, MemoryClass::Other)
    }

    /// The canonical memory name this class is looked up under when the
    /// flush engine needs to drive a programmer directly.
    pub fn canonical_name(self) -> Option<&'static str> {
        match self {
            MemoryClass::Flash => Some("flash"),
            MemoryClass::Eeprom => Some("eeprom"),
            MemoryClass::Bootrow => Some("bootrow"),
            MemoryClass::UserSig => Some("usersig"),
            MemoryClass::Other => None,
        }
    }
}

/// Per-opcode pointers a memory may declare (not every memory declares
/// every one; absence is represented by `None`, not a null pointer).
#[derive(Debug, Clone, Default)]
pub struct MemoryOpcodes {
    /// Read a single byte.
    pub read: Option<Opcode>,
    /// Write a single byte.
    pub write: Option<Opcode>,
    /// Load a byte into the low half of the page buffer.
    pub load_page_lo: Option<Opcode>,
    /// Load a byte into the high half of the page buffer.
    pub load_page_hi: Option<Opcode>,
    /// Commit the page buffer to the device.
    pub write_page: Option<Opcode>,
}

/// A named region of a part: flash, eeprom, fuses, lock bits, signature,
/// calibration bytes, and so on.
#[derive(Debug, Clone)]
pub struct Memory {
    /// Stable string identifier, e.g. `"flash"`, `"eeprom"`, `"fuse"`.
    pub desc: String,
    /// Which of the cache's four classes (if any) this memory belongs to.
    pub class: MemoryClass,
    /// Size in bytes.
    pub size: u32,
    /// Page size in bytes. Must be a power of two and divide `size`.
    /// `1` means byte-granular (no real paging).
    pub page_size: u32,
    /// Offset within the part's address space.
    pub offset: u32,
    /// Whether this memory's ISP addresses count 16-bit words rather
    /// than bytes (true for flash on classic AVR parts).
    pub word_addressed: bool,
    /// Minimum write-delay, milliseconds.
    pub min_write_delay: u32,
    /// Maximum write-delay, milliseconds.
    pub max_write_delay: u32,
    /// Per-opcode pointers for ISP drivers.
    pub opcodes: MemoryOpcodes,
    /// Host-side image of this memory's contents.
    pub buf: Vec<u8>,
    /// Per-byte tag recording which bytes the user has explicitly
    /// written (as opposed to bytes left at their default/erased value).
    pub tags: Vec<bool>,
}

impl Memory {
    /// Creates a memory with a zeroed buffer and no opcodes set.
    ///
    /// `class` is derived from `desc` via [`MemoryClass::classify`], not
    /// supplied by the caller: which of the cache's four classes (if
    /// any) a memory belongs to is this crate's classification to make,
    /// the same way a part description's memory name drives it upstream.
    pub fn new(desc: impl Into<String>, size: u32, page_size: u32, offset: u32) -> Self {
        let desc = desc.into();
        let class = MemoryClass::classify(&desc);
        Self {
            desc,
            class,
            size,
            page_size,
            offset,
            word_addressed: false,
            min_write_delay: 0,
            max_write_delay: 0,
            opcodes: MemoryOpcodes::default(),
            buf: vec![0xFFu8; size as usize],
            tags: vec![false; size as usize],
        }
    }

    /// Marks this memory as word-addressed (classic-AVR flash).
    pub fn word_addressed(mut self) -> Self {
        self.word_addressed = true;
        self
    }

    /// `true` iff this memory is one of the four cacheable classes.
    pub fn is_paged_type(&self) -> bool {
        self.class.is_paged_type()
    }

    /// `page_size > 0 ∧ page_size & (page_size - 1) == 0 ∧ size > 0 ∧
    /// size mod page_size == 0` - the geometry invariant every cache
    /// operation assumes holds.
    pub fn geometry_is_valid(&self) -> bool {
        self.page_size > 0
            && (self.page_size & (self.page_size - 1)) == 0
            && self.size > 0
            && self.size % self.page_size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_recognises_flash_and_its_xmega_sub_memories() {
        for name in ["flash", "Flash", "application", "apptable", "boot"] {
            assert_eq!(MemoryClass::classify(name), MemoryClass::Flash);
        }
    }

    #[test]
    fn classify_recognises_the_other_three_cacheable_classes() {
        assert_eq!(MemoryClass::classify("eeprom"), MemoryClass::Eeprom);
        assert_eq!(MemoryClass::classify("bootrow"), MemoryClass::Bootrow);
        assert_eq!(MemoryClass::classify("usersig"), MemoryClass::UserSig);
        assert_eq!(MemoryClass::classify("userrow"), MemoryClass::UserSig);
    }

    #[test]
    fn classify_falls_back_to_other() {
        for name in ["fuse", "lock", "signature", "calibration"] {
            assert_eq!(MemoryClass::classify(name), MemoryClass::Other);
        }
    }

    #[test]
    fn memory_new_derives_class_from_desc() {
        let mem = Memory::new("eeprom", 32, 8, 0);
        assert_eq!(mem.class, MemoryClass::Eeprom);
        assert!(mem.is_paged_type());

        let mem = Memory::new("fuse", 1, 1, 0);
        assert_eq!(mem.class, MemoryClass::Other);
        assert!(!mem.is_paged_type());
    }
}
