//! Conversion of parsed GraphQL operations into the gateway's own model.

mod selection;

pub use selection::Selection;
pub(crate) use selection::variables_with_defaults;
