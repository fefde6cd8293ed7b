//! Per-memory write-back cache and flush engine.

mod flush;
mod memcache;

pub use flush::{
    bootloader_region_estimate, chip_erase_cached, flush_cache, page_erase_cached,
};
pub use memcache::{
    is_and, read_byte_cached, reset_cache, write_byte_cached, CacheSet, MemCache, WriteOutcome,
};
