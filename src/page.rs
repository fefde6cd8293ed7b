//! Default page read/write, falling back to byte loops for geometries
//! that have no real paging.
//!
//! This crate passes explicit staging buffers rather than sharing
//! `mem.buf` between a driver and the cache: a shared buffer would need a
//! snapshot/restore dance to stay semantically read-only across a
//! `paged_*` call, whereas an explicit buffer makes that borrow
//! checker-visible instead of a runtime discipline.

use crate::error::Result;
use crate::part::{Memory, Part};
use crate::programmer::{has_paged_access, Programmer};
use crate::Error;

/// Reads `buf.len()` bytes starting at `addr` from `mem`.
///
/// Fails if paged access isn't available or `addr` is out of range. For
/// `page_size == 1` memories this is just a byte loop. Otherwise it calls
/// `paged_load` once per page-aligned base; if that fails and the
/// programmer exposes `read_byte` (always true - it's a required trait
/// method), retries byte-wise, failing the whole read on the first byte
/// that fails.
pub fn read_page_default<P: Programmer + ?Sized>(
    pgm: &mut P,
    part: &Part,
    mem: &Memory,
    addr: u32,
    buf: &mut [u8],
) -> Result<u32> {
    if !has_paged_access(pgm, mem) || addr >= mem.size {
        return Err(Error::Configuration);
    }

    if mem.page_size == 1 {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = pgm.read_byte(part, mem, addr + i as u32)?;
        }
        return Ok(buf.len() as u32);
    }

    let base = (addr / mem.page_size) * mem.page_size;
    match pgm.paged_load(part, mem, mem.page_size, base, buf) {
        Ok(n) => Ok(n),
        Err(e) => {
            log::trace!("paged_load failed at base {base}, falling back to byte reads");
            for (i, b) in buf.iter_mut().enumerate() {
                *b = pgm.read_byte(part, mem, addr + i as u32).map_err(|_| e)?;
            }
            Ok(buf.len() as u32)
        }
    }
}

/// Writes `data` starting at `addr` into `mem`. Symmetric with
/// [`read_page_default`] but with no byte-wise fallback: a page-write
/// failure is reported as-is.
pub fn write_page_default<P: Programmer + ?Sized>(
    pgm: &mut P,
    part: &Part,
    mem: &Memory,
    addr: u32,
    data: &[u8],
) -> Result<u32> {
    if !has_paged_access(pgm, mem) || addr >= mem.size {
        return Err(Error::Configuration);
    }

    if mem.page_size == 1 {
        for (i, &b) in data.iter().enumerate() {
            pgm.write_byte(part, mem, addr + i as u32, b)?;
        }
        return Ok(data.len() as u32);
    }

    let base = (addr / mem.page_size) * mem.page_size;
    pgm.paged_write(part, mem, mem.page_size, base, data)
}
