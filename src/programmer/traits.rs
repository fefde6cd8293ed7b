//! The capability contract a driver offers the core.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::part::{Memory, Part};

bitflags! {
    /// Which of the optional byte/page operations a [`Programmer`]
    /// implements. Rust can't ask "was this default method overridden?",
    /// so capability is an explicit, queryable flag set rather than an
    /// implicit property of which methods return `Ok`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProgCaps: u32 {
        /// Implements `paged_load`.
        const HAS_PAGED_LOAD  = 1 << 0;
        /// Implements `paged_write`.
        const HAS_PAGED_WRITE = 1 << 1;
        /// Implements `page_erase`.
        const HAS_PAGE_ERASE  = 1 << 2;
        /// Implements the raw ISP `cmd` passthrough.
        const HAS_CMD         = 1 << 3;
    }
}

/// The contract a driver (SPI, JTAG, UPDI, USBasp, serprog, ...) offers
/// the core. Every method is synchronous: a negative/`Err` return means
/// failure, and the core never retries on its own outside of the
/// byte-fallback in [`crate::page::read_page_default`] and the flush
/// engine's probe phase.
pub trait Programmer {
    /// Which optional operations this programmer implements.
    fn caps(&self) -> ProgCaps;

    /// Whether this programmer is itself firmware running on the target
    /// (an in-MCU bootloader, `SPM`) as opposed to an external adapter.
    /// Bootloader programmers cannot overwrite their own code region.
    fn prog_modes(&self) -> crate::part::ProgModes;

    /// Reads one byte.
    fn read_byte(&mut self, part: &Part, mem: &Memory, addr: u32) -> Result<u8>;

    /// Writes one byte.
    fn write_byte(&mut self, part: &Part, mem: &Memory, addr: u32, data: u8) -> Result<()>;

    /// Reads a whole page starting at `base` into `buf`. `base` is always
    /// page-aligned; `buf.len()` is the number of bytes to read (usually
    /// one page). Returns the number of bytes actually read.
    #[allow(unused_variables)]
    fn paged_load(
        &mut self,
        part: &Part,
        mem: &Memory,
        page_size: u32,
        base: u32,
        buf: &mut [u8],
    ) -> Result<u32> {
        Err(Error::NotSupported)
    }

    /// Writes a whole page starting at `base` from `data`. Returns the
    /// number of bytes actually written.
    #[allow(unused_variables)]
    fn paged_write(
        &mut self,
        part: &Part,
        mem: &Memory,
        page_size: u32,
        base: u32,
        data: &[u8],
    ) -> Result<u32> {
        Err(Error::NotSupported)
    }

    /// Erases a single page containing `addr`.
    #[allow(unused_variables)]
    fn page_erase(&mut self, part: &Part, mem: &Memory, addr: u32) -> Result<()> {
        Err(Error::NotSupported)
    }

    /// Erases the whole chip.
    fn chip_erase(&mut self, part: &Part) -> Result<()>;

    /// Optional veto: `true` if a write to this address should be
    /// refused without touching the device.
    #[allow(unused_variables)]
    fn readonly(&self, part: &Part, mem: &Memory, addr: u32) -> bool {
        false
    }

    /// Puts the device into programming mode. Most ISP-style programmers
    /// need this once before any byte/page operation; drivers that don't
    /// (bootloaders already running, debugWIRE, ...) can leave the
    /// default no-op.
    #[allow(unused_variables)]
    fn program_enable(&mut self, part: &Part) -> Result<()> {
        Ok(())
    }

    /// Raw ISP command passthrough (ISP programmers only).
    #[allow(unused_variables)]
    fn cmd(&mut self, part: &Part, cmd_in: &[u8; 4], cmd_out: &mut [u8; 4]) -> Result<()> {
        Err(Error::NotSupported)
    }
}

/// `true` iff `mem`'s geometry is valid, it's one of the four cacheable
/// classes, and `pgm` implements both `paged_load` and `paged_write`.
pub fn has_paged_access<P: Programmer + ?Sized>(pgm: &P, mem: &Memory) -> bool {
    mem.geometry_is_valid()
        && mem.is_paged_type()
        && pgm
            .caps()
            .contains(ProgCaps::HAS_PAGED_LOAD | ProgCaps::HAS_PAGED_WRITE)
}
