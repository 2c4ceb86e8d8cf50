//! Host/container prefix mapping carried through the process environment.
//!
//! A launcher serializes `(host, container)` pairs into
//! `PATHBRIDGE_PATH_MAPPINGS` as `host1:container1;host2:container2`. Each
//! process re-parses the table from its own environment; it is never
//! mutated after construction and never persisted.
//!
//! Matching is first-match in declaration order, with a mandatory boundary
//! check: an entry for `/d/proj` never matches `/d/proj2`.

mod entry;
mod table;

pub use entry::MappingEntry;
pub use table::MappingTable;
