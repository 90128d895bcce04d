//! Result-set to model mapping.

pub mod coerce;
pub mod handler;

pub use coerce::coerce;
pub use handler::{FirstRow, ResultHandler, ResultMapper, map_rows};
pub(crate) use handler::populate_column;

/// Outcome of resolving one column against a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The value reached a setter.
    Applied,
    /// No property, no setter, or an unset read-only relation: nothing to do.
    Skipped,
}
