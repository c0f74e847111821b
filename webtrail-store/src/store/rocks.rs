//! RocksDB triple store
//!
//! Each triple is written under three key orderings — SPO, POS, and OSP —
//! so that every pattern with at least one bound slot resolves to a prefix
//! scan. Key components are escaped (0x00 is the separator) and the value
//! under every key is the bincode-encoded triple, so reads never need to
//! unescape the key.

use std::path::Path;

use rocksdb::{IteratorMode, Options, WriteBatch, DB};

use crate::error::Result;
use crate::store::{ScanControl, TripleStore};
use crate::triple::{Triple, TriplePattern};

const KS_SPO: u8 = b's';
const KS_POS: u8 = b'p';
const KS_OSP: u8 = b'o';

/// Persistent backend over a single RocksDB handle
pub struct RocksTripleStore {
    db: DB,
}

impl RocksTripleStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(2);
        opts.set_bytes_per_sync(1048576); // 1MB
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;
        log::info!("RocksTripleStore opened at: {}", path.display());

        Ok(Self { db })
    }

    fn keys_for(triple: &Triple) -> [Vec<u8>; 3] {
        [
            make_key(
                KS_SPO,
                &[&triple.subject, &triple.predicate, &triple.object],
            ),
            make_key(
                KS_POS,
                &[&triple.predicate, &triple.object, &triple.subject],
            ),
            make_key(
                KS_OSP,
                &[&triple.object, &triple.subject, &triple.predicate],
            ),
        ]
    }

    /// Pick the keyspace and prefix that cover the most bound slots
    fn plan(pattern: &TriplePattern) -> (u8, Vec<u8>) {
        match (&pattern.subject, &pattern.predicate, &pattern.object) {
            (Some(s), Some(p), _) => (KS_SPO, make_prefix(KS_SPO, &[s, p])),
            (Some(s), None, _) => (KS_SPO, make_prefix(KS_SPO, &[s])),
            (None, Some(p), Some(o)) => (KS_POS, make_prefix(KS_POS, &[p, o])),
            (None, Some(p), None) => (KS_POS, make_prefix(KS_POS, &[p])),
            (None, None, Some(o)) => (KS_OSP, make_prefix(KS_OSP, &[o])),
            (None, None, None) => (KS_SPO, vec![KS_SPO]),
        }
    }
}

impl TripleStore for RocksTripleStore {
    fn put(&self, triples: &[Triple]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for triple in triples {
            let value = bincode::serialize(triple)?;
            for key in Self::keys_for(triple) {
                batch.put(key, &value);
            }
        }
        self.db.write(batch)?;
        self.db.flush()?;
        Ok(())
    }

    fn del(&self, pattern: &TriplePattern) -> Result<usize> {
        let matches = self.get(pattern)?;
        let mut batch = WriteBatch::default();
        for triple in &matches {
            for key in Self::keys_for(triple) {
                batch.delete(key);
            }
        }
        self.db.write(batch)?;
        self.db.flush()?;
        Ok(matches.len())
    }

    fn scan(
        &self,
        pattern: &TriplePattern,
        visitor: &mut dyn FnMut(Triple) -> ScanControl,
    ) -> Result<()> {
        let (_, prefix) = Self::plan(pattern);
        let iter = self.db.iterator(IteratorMode::From(
            &prefix,
            rocksdb::Direction::Forward,
        ));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            let triple: Triple = bincode::deserialize(&value)?;
            // The prefix covers the leading bound slots; any remaining
            // bound slot still has to be checked per triple.
            if !pattern.matches(&triple) {
                continue;
            }
            if visitor(triple) == ScanControl::Stop {
                break;
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut batch = WriteBatch::default();
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete(key);
        }
        self.db.write(batch)?;
        self.db.flush()?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let mut count = 0;
        let prefix = [KS_SPO];
        let iter = self
            .db
            .iterator(IteratorMode::From(&prefix, rocksdb::Direction::Forward));
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

/// Escape a component so 0x00 can act as the separator
fn escape_into(component: &str, out: &mut Vec<u8>) {
    for &byte in component.as_bytes() {
        match byte {
            0x00 => out.extend_from_slice(&[0x01, 0x01]),
            0x01 => out.extend_from_slice(&[0x01, 0x02]),
            other => out.push(other),
        }
    }
}

/// Full key: tag + all three components, each terminated by the separator
fn make_key(tag: u8, components: &[&str; 3]) -> Vec<u8> {
    let mut key = Vec::with_capacity(
        1 + components.iter().map(|c| c.len() + 1).sum::<usize>(),
    );
    key.push(tag);
    for component in components {
        escape_into(component, &mut key);
        key.push(0x00);
    }
    key
}

/// Prefix covering complete leading components only
fn make_prefix(tag: u8, components: &[&str]) -> Vec<u8> {
    let mut prefix = vec![tag];
    for component in components {
        escape_into(component, &mut prefix);
        prefix.push(0x00);
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, RocksTripleStore) {
        let dir = TempDir::new().unwrap();
        let store = RocksTripleStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn seed(store: &RocksTripleStore) {
        store
            .put(&[
                Triple::new("page:1-a", "type", "page"),
                Triple::new("page:1-a", "url", "https://example.com"),
                Triple::new("page:2-b", "type", "page"),
                Triple::new("page:2-b", "url", "https://other.com"),
                Triple::new("session:1-c", "type", "session"),
            ])
            .unwrap();
    }

    #[test]
    fn test_subject_prefix_scan() {
        let (_dir, store) = open_temp();
        seed(&store);
        let got = store.get(&TriplePattern::subject("page:1-a")).unwrap();
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn test_subject_prefix_does_not_bleed() {
        let (_dir, store) = open_temp();
        store
            .put(&[
                Triple::new("page:1", "type", "page"),
                Triple::new("page:10", "type", "page"),
            ])
            .unwrap();
        // "page:1" must not match "page:10" — components are terminated
        let got = store.get(&TriplePattern::subject("page:1")).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].subject, "page:1");
    }

    #[test]
    fn test_predicate_object_scan() {
        let (_dir, store) = open_temp();
        seed(&store);
        let pattern = TriplePattern::predicate("type").with_object("page");
        let got = store.get(&pattern).unwrap();
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn test_object_scan() {
        let (_dir, store) = open_temp();
        seed(&store);
        let pattern = TriplePattern::default().with_object("https://example.com");
        let got = store.get(&pattern).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].subject, "page:1-a");
    }

    #[test]
    fn test_del_by_subject() {
        let (_dir, store) = open_temp();
        seed(&store);
        let removed = store.del(&TriplePattern::subject("page:1-a")).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len().unwrap(), 3);
    }

    #[test]
    fn test_len_counts_triples_not_keys() {
        let (_dir, store) = open_temp();
        seed(&store);
        assert_eq!(store.len().unwrap(), 5);
    }

    #[test]
    fn test_clear_then_empty() {
        let (_dir, store) = open_temp();
        seed(&store);
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_reopen_persists() {
        let dir = TempDir::new().unwrap();
        {
            let store = RocksTripleStore::open(dir.path()).unwrap();
            store
                .put(&[Triple::new("page:1-a", "type", "page")])
                .unwrap();
        }
        let store = RocksTripleStore::open(dir.path()).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }
}
