//! Flush engine: decides page-erase vs. chip-erase strategy per memory
//! class and reconciles the write-back caches to the device.

use alloc::vec;
use alloc::vec::Vec;

use crate::cache::memcache::{is_and, CacheSet, MemCache};
use crate::error::Result;
use crate::page::{read_page_default, write_page_default};
use crate::part::{Memory, MemoryClass, Part, ProgModes};
use crate::programmer::{ProgCaps, Programmer};
use crate::Error;

const CACHE_CLASSES: [MemoryClass; 4] = [
    MemoryClass::Flash,
    MemoryClass::Eeprom,
    MemoryClass::Bootrow,
    MemoryClass::UserSig,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discipline {
    Normal,
    PageErase,
    NeedsChipErase,
}

/// Pages whose `cont` differs from `copy`, plus the first page (if any)
/// where the difference cannot be reached by an AND-only write.
fn dirty_pages(mc: &MemCache) -> (Vec<usize>, Option<usize>) {
    let mut dirty = Vec::new();
    let mut problem = None;
    for p in 0..mc.iscached.len() {
        if !mc.iscached[p] {
            continue;
        }
        let range = p * mc.page_size as usize..(p + 1) * mc.page_size as usize;
        if mc.cont[range.clone()] == mc.copy[range.clone()] {
            continue;
        }
        dirty.push(p);
        if problem.is_none() {
            let cont = &mc.cont[range.clone()];
            let copy = &mc.copy[range.clone()];
            // Achievable by AND-ing `copy` with `cont` iff the result is
            // exactly `cont` again - i.e. no bit needs to go 0 -> 1.
            if !is_and(copy, cont, cont, cont.len()) {
                problem = Some(p);
            }
        }
    }
    (dirty, problem)
}

fn probe_discipline<P: Programmer + ?Sized>(
    mc: &mut MemCache,
    pgm: &mut P,
    part: &Part,
    mem: &Memory,
    page: usize,
) -> Result<Discipline> {
    let range = page * mc.page_size as usize..(page + 1) * mc.page_size as usize;
    let base = range.start as u32;
    let data = mc.cont[range.clone()].to_vec();
    let mut readback = vec![0u8; mc.page_size as usize];

    write_page_default(pgm, part, mem, base, &data)?;
    read_page_default(pgm, part, mem, base, &mut readback)?;
    if readback == data {
        mc.copy[range].copy_from_slice(&data);
        return Ok(Discipline::Normal);
    }

    if pgm.caps().contains(ProgCaps::HAS_PAGE_ERASE) {
        log::debug!("page {page} did not verify, probing page-erase discipline");
        let _ = pgm.page_erase(part, mem, base);
        write_page_default(pgm, part, mem, base, &data)?;
        read_page_default(pgm, part, mem, base, &mut readback)?;
        if readback == data {
            mc.copy[range].copy_from_slice(&data);
            return Ok(Discipline::PageErase);
        }
    }

    log::warn!("page {page} requires chip-erase escalation");
    Ok(Discipline::NeedsChipErase)
}

fn materialise_all<P: Programmer + ?Sized>(
    mc: &mut MemCache,
    pgm: &mut P,
    part: &Part,
    mem: &Memory,
) -> Result<()> {
    for p in 0..mc.iscached.len() {
        if mc.iscached[p] {
            continue;
        }
        let range = p * mc.page_size as usize..(p + 1) * mc.page_size as usize;
        let base = range.start as u32;
        let mut buf = vec![0u8; mc.page_size as usize];
        read_page_default(pgm, part, mem, base, &mut buf)?;
        mc.cont[range.clone()].copy_from_slice(&buf);
        mc.copy[range].copy_from_slice(&buf);
        mc.iscached[p] = true;
    }
    Ok(())
}

/// Estimate of the bootloader region's start offset within flash.
///
/// Derived from `n_boot_sections`/`boot_section_size` when known;
/// otherwise `size - 16384` when `size > 32768`, else `size * 3/4`,
/// rounded down to a page boundary. Known-loose: a part that declares
/// its own boot layout should always prefer that over the fallback.
pub fn bootloader_region_estimate(part: &Part, mem: &Memory) -> u32 {
    let estimate = if part.n_boot_sections > 0 && part.boot_section_size > 0 {
        let total_boot = part.n_boot_sections as u32 * part.boot_section_size;
        mem.size.saturating_sub(total_boot)
    } else if mem.size > 32768 {
        mem.size.saturating_sub(16384)
    } else {
        (mem.size as u64 * 3 / 4) as u32
    };
    let page = mem.page_size.max(1);
    (estimate / page) * page
}

fn perform_chip_erase<P: Programmer + ?Sized>(
    cache: &mut CacheSet,
    pgm: &mut P,
    part: &Part,
) -> Result<()> {
    for class in [MemoryClass::Flash, MemoryClass::Eeprom] {
        let name = class.canonical_name().ok_or(Error::Configuration)?;
        if let Some(mem) = part.locate_mem_noalias(name) {
            if let Some(mc) = cache.slot_mut(class) {
                materialise_all(mc, pgm, part, mem)?;
            }
        }
    }

    log::warn!("flush: escalating to chip_erase");
    pgm.chip_erase(part)?;

    if let Some(mc) = cache.slot_mut(MemoryClass::Flash) {
        mc.copy.iter_mut().for_each(|b| *b = 0xFF);

        if pgm.prog_modes().contains(ProgModes::SPM) {
            if let Some(mem) = part.locate_mem_noalias("flash") {
                let region = bootloader_region_estimate(part, mem);
                if region < mem.size {
                    let mut buf = vec![0u8; (mem.size - region) as usize];
                    if read_page_default(pgm, part, mem, region, &mut buf).is_ok() {
                        mc.copy[region as usize..].copy_from_slice(&buf);
                    }
                }
            }
        }
    }

    if let Some(mc) = cache.slot_mut(MemoryClass::Eeprom) {
        // The first cached page is not necessarily informative: if it
        // already read as erased before we ever touched the device, a
        // later page that actually held data is the one that tells us
        // whether this device preserves EEPROM across a chip erase.
        let probe_page = (0..mc.iscached.len()).find(|&p| {
            if !mc.iscached[p] {
                return false;
            }
            let range = p * mc.page_size as usize..(p + 1) * mc.page_size as usize;
            !mc.copy[range].iter().all(|&b| b == 0xFF)
        });
        if let Some(probe_page) = probe_page {
            let range = probe_page * mc.page_size as usize..(probe_page + 1) * mc.page_size as usize;
            if let Some(mem) = part.locate_mem_noalias("eeprom") {
                let base = range.start as u32;
                let mut buf = vec![0u8; mc.page_size as usize];
                read_page_default(pgm, part, mem, base, &mut buf)?;
                if buf.iter().all(|&b| b == 0xFF) {
                    mc.copy.iter_mut().for_each(|b| *b = 0xFF);
                }
                // else: EEPROM survived the chip-erase; `copy` keeps
                // its pre-erase values.
            }
        }
    }

    Ok(())
}

/// Reconciles all four caches against the device.
///
/// For each cacheable class with at least one dirty page: probes the
/// first page that needs a 0->1 bit transition (if any) to decide
/// whether plain writes, page-erase, or chip-erase is required; if any
/// class demands chip-erase, performs it once (with flash/EEPROM
/// preservation per the design); then writes back every dirty page,
/// erasing first where the chosen discipline calls for it, and verifies
/// each page by reading it back.
pub fn flush_cache<P: Programmer + ?Sized>(cache: &mut CacheSet, pgm: &mut P, part: &Part) -> Result<()> {
    struct Plan {
        class: MemoryClass,
        name: &'static str,
        dirty: Vec<usize>,
        discipline: Discipline,
    }

    let mut plans = Vec::new();
    let mut chip_erase_needed = false;

    for class in CACHE_CLASSES {
        let Some(mc) = cache.slot_mut(class) else {
            continue;
        };
        let (dirty, problem) = dirty_pages(mc);
        if dirty.is_empty() {
            continue;
        }
        let name = class.canonical_name().ok_or(Error::Configuration)?;
        log::debug!("flush: {name} has {} dirty page(s)", dirty.len());

        let mem = part.locate_mem_noalias(name).ok_or(Error::Configuration)?;
        let mut dirty = dirty;
        let discipline = match problem {
            Some(p) => {
                let d = probe_discipline(mc, pgm, part, mem, p)?;
                // The probe already wrote and verified this page directly
                // (normal or page-erase discipline); only when it still
                // demands a chip-erase does the page remain unresolved
                // and need a real write-back pass below.
                if d != Discipline::NeedsChipErase {
                    dirty.retain(|&p2| p2 != p);
                }
                d
            }
            None => Discipline::Normal,
        };

        if discipline == Discipline::NeedsChipErase {
            if !matches!(class, MemoryClass::Flash | MemoryClass::Eeprom) {
                return Err(Error::Verify);
            }
            chip_erase_needed = true;
        }

        if dirty.is_empty() {
            continue;
        }

        plans.push(Plan {
            class,
            name,
            dirty,
            discipline,
        });
    }

    if plans.is_empty() {
        return Ok(());
    }

    if chip_erase_needed {
        perform_chip_erase(cache, pgm, part)?;
    }

    for plan in &plans {
        let mem = part.locate_mem_noalias(plan.name).ok_or(Error::Configuration)?;
        let mc = cache.slot_mut(plan.class).ok_or(Error::Configuration)?;
        for &p in &plan.dirty {
            let range = p * mc.page_size as usize..(p + 1) * mc.page_size as usize;
            let base = range.start as u32;

            if plan.discipline == Discipline::PageErase && !chip_erase_needed {
                pgm.page_erase(part, mem, base)?;
            }

            let data = mc.cont[range.clone()].to_vec();
            write_page_default(pgm, part, mem, base, &data)?;

            let mut readback = vec![0u8; mc.page_size as usize];
            read_page_default(pgm, part, mem, base, &mut readback)?;
            if readback != data {
                log::warn!("flush: page {p} of {} failed to verify", plan.name);
                return Err(Error::Verify);
            }
            mc.copy[range].copy_from_slice(&data);
        }
    }

    Ok(())
}

/// User-initiated chip erase, distinct from a flush.
///
/// Discards pending flash/EEPROM writes; presets flash to all-`0xFF`
/// (unless the programmer is a bootloader, in which case flash is simply
/// marked uncached so the next access re-fetches). For EEPROM, probes one
/// previously-dirty page: if it now reads back erased, presets the whole
/// EEPROM cache to `0xFF`; otherwise discards pending EEPROM writes but
/// keeps the prior `copy`. Bootrow and usersig are untouched.
pub fn chip_erase_cached<P: Programmer + ?Sized>(
    cache: &mut CacheSet,
    pgm: &mut P,
    part: &Part,
) -> Result<()> {
    pgm.chip_erase(part)?;

    if let Some(mc) = cache.slot_mut(MemoryClass::Flash) {
        if pgm.prog_modes().contains(ProgModes::SPM) {
            mc.iscached.iter_mut().for_each(|c| *c = false);
        } else {
            mc.cont.iter_mut().for_each(|b| *b = 0xFF);
            mc.copy.iter_mut().for_each(|b| *b = 0xFF);
            mc.iscached.iter_mut().for_each(|c| *c = true);
        }
    }

    if let Some(mc) = cache.slot_mut(MemoryClass::Eeprom) {
        let dirty_page = (0..mc.iscached.len()).find(|&p| {
            if !mc.iscached[p] {
                return false;
            }
            let range = p * mc.page_size as usize..(p + 1) * mc.page_size as usize;
            mc.cont[range.clone()] != mc.copy[range]
        });

        if let Some(p) = dirty_page {
            let mem = part.locate_mem_noalias("eeprom").ok_or(Error::Configuration)?;
            let range = p * mc.page_size as usize..(p + 1) * mc.page_size as usize;
            let base = range.start as u32;
            let mut buf = vec![0u8; mc.page_size as usize];
            read_page_default(pgm, part, mem, base, &mut buf)?;

            if buf.iter().all(|&b| b == 0xFF) {
                mc.cont.iter_mut().for_each(|b| *b = 0xFF);
                mc.copy.iter_mut().for_each(|b| *b = 0xFF);
                mc.iscached.iter_mut().for_each(|c| *c = true);
            } else {
                let copy = mc.copy.clone();
                mc.cont.copy_from_slice(&copy);
            }
        }
    }

    Ok(())
}

/// Erases a single page (or, for `page_size == 1` memories, writes
/// `0xFF` byte-wise), invalidates it in the cache, re-materialises it,
/// and fails if the page doesn't come back all-`0xFF`.
pub fn page_erase_cached<P: Programmer + ?Sized>(
    cache: &mut CacheSet,
    pgm: &mut P,
    part: &Part,
    mem_name: &str,
    addr: u32,
) -> Result<()> {
    let mem = part.locate_mem(mem_name).ok_or(Error::Configuration)?;
    if !mem.is_paged_type() {
        return Err(Error::Configuration);
    }
    let class = mem.class;
    if addr >= mem.size {
        return Err(Error::Configuration);
    }

    // Ensure a cache exists for this class (mirrors the lazily-created
    // cache used by the byte read/write path) and that the target page
    // is materialised before we invalidate it.
    crate::cache::memcache::read_byte_cached(cache, pgm, part, mem_name, addr)?;

    let mem = part.locate_mem(mem_name).ok_or(Error::Configuration)?;
    let mc = cache.slot_mut(class).ok_or(Error::Configuration)?;
    let page = ((addr + mem.offset - mc.offset) / mc.page_size) as usize;
    let range = page * mc.page_size as usize..(page + 1) * mc.page_size as usize;
    let base = range.start as u32;

    if mc.page_size == 1 {
        pgm.write_byte(part, mem, base, 0xFF)?;
    } else if pgm.caps().contains(ProgCaps::HAS_PAGE_ERASE) {
        pgm.page_erase(part, mem, base)?;
    } else {
        return Err(Error::NotSupported);
    }

    mc.iscached[page] = false;
    let mut buf = vec![0u8; mc.page_size as usize];
    read_page_default(pgm, part, mem, base, &mut buf)?;
    mc.cont[range.clone()].copy_from_slice(&buf);
    mc.copy[range].copy_from_slice(&buf);
    mc.iscached[page] = true;

    if buf.iter().any(|&b| b != 0xFF) {
        return Err(Error::Verify);
    }
    Ok(())
}
