//! Static description of one target device.

use alloc::string::String;
use alloc::vec::Vec;
use bitflags::bitflags;

use crate::opcode::Opcode;
use crate::part::memory::Memory;

bitflags! {
    /// Programming modes a part supports, and (for a programmer handle)
    /// which one is active. `SPM` marks an in-MCU bootloader programmer:
    /// one that cannot overwrite its own code region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProgModes: u32 {
        /// In-system programming over SPI.
        const ISP          = 1 << 0;
        /// Tiny Programming Interface (ATtiny).
        const TPI          = 1 << 1;
        /// Program/Debug Interface (XMEGA).
        const PDI          = 1 << 2;
        /// Unified Program/Debug Interface (UPDI parts).
        const UPDI         = 1 << 3;
        /// JTAG.
        const JTAG         = 1 << 4;
        /// High-voltage serial programming.
        const HVSP         = 1 << 5;
        /// High-voltage parallel programming.
        const HVPP         = 1 << 6;
        /// debugWIRE.
        const DEBUG_WIRE   = 1 << 7;
        /// Self-programming from an in-MCU bootloader.
        const SPM          = 1 << 8;
    }
}

/// An alternate name for a memory, e.g. `usersig` ↔ `userrow`.
#[derive(Debug, Clone)]
pub struct MemoryAlias {
    /// The alias name.
    pub name: String,
    /// The canonical memory name (`desc` on [`Memory`]) it resolves to.
    pub target: String,
}

/// The 32-slot opcode table a part declares for ISP actions that are not
/// tied to any one memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum PartOpNum {
    /// Enable programming mode.
    PgmEnable = 0,
    /// Erase the whole chip.
    ChipErase = 1,
    /// Read the device signature.
    ReadSig = 2,
    /// Poll for write completion.
    PollReady = 3,
}

/// Number of slots in a part's opcode table. Most slots go unused on any
/// given part; a missing entry is absence, not a null pointer.
pub const PART_OPCODE_SLOTS: usize = 32;

/// Static description of one target: its memories, aliases, programming
/// modes, signature, bootloader layout, and part-level opcode table.
#[derive(Debug, Clone)]
pub struct Part {
    /// Short part id, e.g. `"m328p"`.
    pub id: String,
    /// Human-readable description.
    pub desc: String,
    /// Programming modes this part supports.
    pub prog_modes: ProgModes,
    /// 3-byte device signature.
    pub signature: [u8; 3],
    /// Number of bootloader sections (0 if the part has no bootloader
    /// support or boot parameters aren't known).
    pub n_boot_sections: u8,
    /// Size in bytes of one bootloader section.
    pub boot_section_size: u32,
    /// Ordered list of memories.
    pub memories: Vec<Memory>,
    /// Ordered list of memory aliases.
    pub mem_aliases: Vec<MemoryAlias>,
    /// Part-level opcode table, indexed by [`PartOpNum`].
    pub opcodes: [Option<Opcode>; PART_OPCODE_SLOTS],
}

impl Part {
    /// Creates a part with no memories, aliases or opcodes.
    pub fn new(id: impl Into<String>, desc: impl Into<String>, prog_modes: ProgModes) -> Self {
        Self {
            id: id.into(),
            desc: desc.into(),
            prog_modes,
            signature: [0, 0, 0],
            n_boot_sections: 0,
            boot_section_size: 0,
            memories: Vec::new(),
            mem_aliases: Vec::new(),
            opcodes: [None; PART_OPCODE_SLOTS],
        }
    }

    /// Appends a memory.
    pub fn add_memory(&mut self, mem: Memory) {
        self.memories.push(mem);
    }

    /// Appends a memory alias.
    pub fn add_alias(&mut self, name: impl Into<String>, target: impl Into<String>) {
        self.mem_aliases.push(MemoryAlias {
            name: name.into(),
            target: target.into(),
        });
    }

    /// Sets the opcode for a part-level slot.
    pub fn set_opcode(&mut self, slot: PartOpNum, op: Opcode) {
        self.opcodes[slot as usize] = Some(op);
    }

    /// Looks up the opcode for a part-level slot.
    pub fn opcode(&self, slot: PartOpNum) -> Option<&Opcode> {
        self.opcodes[slot as usize].as_ref()
    }

    /// Exact-name lookup only; does not consult the alias table.
    pub fn locate_mem_noalias(&self, name: &str) -> Option<&Memory> {
        self.memories.iter().find(|m| m.desc.eq_ignore_ascii_case(name))
    }

    /// Mutable exact-name lookup.
    pub fn locate_mem_noalias_mut(&mut self, name: &str) -> Option<&mut Memory> {
        self.memories
            .iter_mut()
            .find(|m| m.desc.eq_ignore_ascii_case(name))
    }

    /// Alias-table lookup only: resolves `name` through `mem_aliases`,
    /// then looks up the target by exact name.
    pub fn locate_memalias(&self, name: &str) -> Option<&Memory> {
        self.mem_aliases
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .and_then(|a| self.locate_mem_noalias(&a.target))
    }

    /// Exact-name lookup, falling back to the alias table. Deliberately
    /// not a prefix/abbreviation match: upstream avrdude's own
    /// `avr_locate_mem` is a plain exact-match scan over the memory
    /// list, with no "longest match wins" behaviour.
    pub fn locate_mem(&self, name: &str) -> Option<&Memory> {
        self.locate_mem_noalias(name)
            .or_else(|| self.locate_memalias(name))
    }

    /// `0x1000000` for PDI/UPDI parts (their data address space sits
    /// above the 16 MiB mark in avrdude's unified addressing scheme),
    /// else 0.
    pub fn data_offset(&self) -> u32 {
        if self.prog_modes.intersects(ProgModes::PDI | ProgModes::UPDI) {
            0x1000000
        } else {
            0
        }
    }
}
