//! In-memory triple store
//!
//! A `BTreeSet` under a `parking_lot::RwLock`, ordered the same way as the
//! RocksDB backend's primary keyspace so scans are deterministic. Used by
//! tests and by embedders that don't want an on-disk database.

use std::collections::BTreeSet;

use parking_lot::RwLock;

use crate::error::Result;
use crate::store::{ScanControl, TripleStore};
use crate::triple::{Triple, TriplePattern};

/// Ephemeral, process-local backend
#[derive(Default)]
pub struct MemTripleStore {
    triples: RwLock<BTreeSet<(String, String, String)>>,
}

impl MemTripleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TripleStore for MemTripleStore {
    fn put(&self, triples: &[Triple]) -> Result<()> {
        let mut guard = self.triples.write();
        for triple in triples {
            guard.insert((
                triple.subject.clone(),
                triple.predicate.clone(),
                triple.object.clone(),
            ));
        }
        Ok(())
    }

    fn del(&self, pattern: &TriplePattern) -> Result<usize> {
        let mut guard = self.triples.write();
        let before = guard.len();
        guard.retain(|(s, p, o)| {
            !pattern.matches(&Triple {
                subject: s.clone(),
                predicate: p.clone(),
                object: o.clone(),
            })
        });
        Ok(before - guard.len())
    }

    fn scan(
        &self,
        pattern: &TriplePattern,
        visitor: &mut dyn FnMut(Triple) -> ScanControl,
    ) -> Result<()> {
        // Clone matches out under the read lock so the visitor can issue
        // further store calls without deadlocking.
        let matches: Vec<Triple> = {
            let guard = self.triples.read();
            guard
                .iter()
                .map(|(s, p, o)| Triple::new(s.clone(), p.clone(), o.clone()))
                .filter(|t| pattern.matches(t))
                .collect()
        };

        for triple in matches {
            if visitor(triple) == ScanControl::Stop {
                break;
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.triples.write().clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.triples.read().len())
    }
}
