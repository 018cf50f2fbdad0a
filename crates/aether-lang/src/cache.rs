use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::ast::Program;
use crate::optimizer::Optimization;

/// Cache key for a compiled program.
///
/// Derived from the source bytes and the optimization flags, so the
/// same source compiled under different flags occupies distinct slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub(crate) fn compute(source: &str, options: &Optimization) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update([options.cache_key_byte()]);
        Self(hasher.finalize().into())
    }
}

/// Counters reported to the host. `hits` and `misses` are cumulative
/// across `clear` calls; `size` is the current number of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Compiled-program cache keyed by source fingerprint.
#[derive(Debug, Default)]
pub(crate) struct Cache {
    entries: FxHashMap<Fingerprint, Arc<Program>>,
    hits: u64,
    misses: u64,
}

impl Cache {
    pub(crate) fn lookup(&mut self, fingerprint: &Fingerprint) -> Option<Arc<Program>> {
        match self.entries.get(fingerprint) {
            Some(program) => {
                self.hits += 1;
                Some(Arc::clone(program))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub(crate) fn insert(&mut self, fingerprint: Fingerprint, program: Arc<Program>) {
        self.entries.insert(fingerprint, program);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
        }
    }
}
