//! Output sinks.
//!
//! Discovery and detection results are both written as header-first CSV
//! through `ResultWriter`.

mod csv;

pub use self::csv::ResultWriter;
