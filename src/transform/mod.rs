//! Record transformers
//!
//! Each transformer reads one source file and reshapes its raw JSON records
//! into normalized rows, in the order they must be inserted.

pub mod event;
pub mod song;

pub use event::{decompose_timestamp, EventRows, EventTransformer};
pub use song::SongTransformer;

use crate::catalog::StatementCatalog;
use crate::error::Result;
use crate::sink::Sink;
use crate::types::Row;
use std::path::Path;

/// Turns one source file into rows ready to insert.
///
/// The sink is available for lookups against already loaded data; transformers
/// never write to it.
pub trait FileTransform {
    /// Short name used in progress logs
    fn name(&self) -> &'static str;

    fn transform(
        &self,
        path: &Path,
        sink: &mut dyn Sink,
        catalog: &StatementCatalog,
    ) -> Result<Vec<Row>>;
}
