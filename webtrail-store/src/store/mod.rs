//! Triple store backends
//!
//! The data layer assumes only this contract from the engine underneath:
//! pattern reads, atomic batch writes, pattern deletes, and a push-style
//! stream with early termination. Everything above (schema, indexing,
//! repositories) is built on these five operations.

mod memory;
mod rocks;

pub use memory::MemTripleStore;
pub use rocks::RocksTripleStore;

use crate::error::Result;
use crate::triple::{Triple, TriplePattern};

/// Control flow for a streaming scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    /// Keep emitting triples
    Continue,
    /// Stop the stream early
    Stop,
}

/// The contract assumed from the underlying engine
pub trait TripleStore: Send + Sync {
    /// Write a batch of triples; the batch is all-or-nothing
    fn put(&self, triples: &[Triple]) -> Result<()>;

    /// All triples matching a pattern
    fn get(&self, pattern: &TriplePattern) -> Result<Vec<Triple>> {
        let mut out = Vec::new();
        self.scan(pattern, &mut |triple| {
            out.push(triple);
            ScanControl::Continue
        })?;
        Ok(out)
    }

    /// Delete all triples matching a pattern, returning how many went away
    fn del(&self, pattern: &TriplePattern) -> Result<usize>;

    /// Push every matching triple through `visitor` until it stops or the
    /// stream ends. A storage error aborts the whole scan.
    fn scan(
        &self,
        pattern: &TriplePattern,
        visitor: &mut dyn FnMut(Triple) -> ScanControl,
    ) -> Result<()>;

    /// Remove every triple in the store
    fn clear(&self) -> Result<()>;

    /// Total triple count
    fn len(&self) -> Result<usize>;

    /// Whether the store holds no triples
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
