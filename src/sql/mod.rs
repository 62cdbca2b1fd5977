//! SQL builder: values always bind as parameters. Record keys are checked against the table's
//! columns by [`check_record`] before they reach a statement.

mod builder;
pub mod params;
pub mod values;
pub use builder::*;
pub use params::*;
pub use values::*;

/// One row or mutation payload: column name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;
