//! avrdude-core - paged-memory write-back cache and ISP opcode
//! bit-assembly engine for AVR device programmers.
//!
//! This crate implements the two hardest subsystems of a device-programmer
//! core: a write-back cache that emulates byte-level random access over
//! programmers that only speak page-granular I/O (including NOR-like
//! memories where writes can only clear bits), and a bit-assembly engine
//! that builds and decodes 4-byte ISP command words from declarative
//! per-part bit descriptors.
//!
//! Everything else a real programming tool needs - argument parsing,
//! configuration-file loading, USB/serial transport, a disassembler - is
//! an external collaborator and lives outside this crate. This crate
//! never drives a wire, never parses user configuration, and never picks
//! a programmer; it only consumes the [`programmer::Programmer`] trait
//! and the [`part::Part`]/[`part::Memory`] model a caller hands it.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod error;
pub mod opcode;

#[cfg(feature = "alloc")]
pub mod part;

#[cfg(feature = "alloc")]
pub mod programmer;

#[cfg(feature = "alloc")]
pub mod page;

#[cfg(feature = "alloc")]
pub mod cache;

#[cfg(feature = "alloc")]
pub mod config;

pub use error::{Error, Result};

#[cfg(feature = "alloc")]
pub use cache::{
    bootloader_region_estimate, chip_erase_cached, flush_cache, is_and, page_erase_cached,
    read_byte_cached, reset_cache, write_byte_cached, CacheSet, MemCache, WriteOutcome,
};
#[cfg(feature = "alloc")]
pub use page::{read_page_default, write_page_default};
#[cfg(feature = "alloc")]
pub use programmer::has_paged_access;
