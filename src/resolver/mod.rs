//! Name resolver (spec.md §4.4, "C4" in the system overview).
//!
//! A library of pure algorithms rather than a single pass: table
//! resolution, column qualification/GetField resolution, star expansion,
//! function resolution, and ORDER BY ordinal resolution. The `rules`
//! module's once-before/default batches are what actually wire these into
//! the fixed-point pipeline over a real plan tree; this module only needs
//! to get each individual algorithm right in isolation.

pub mod columns;
pub mod errors;
pub mod functions;
pub mod order_by;
pub mod stars;
pub mod tables;

pub use errors::ResolverError;
