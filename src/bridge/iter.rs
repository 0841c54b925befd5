//! Iterator bridge.
//!
//! Exposes a native pull-based cursor as a host-visible object with
//! `next`/`done` semantics. Exhaustion is reported through an explicit
//! sentinel so hosts can tell "no more data" apart from an empty batch.

use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::engine::{Engine, IterScope, RawIterator};
use crate::error::{BridgeError, BridgeResult};

use super::Disposable;

/// One step of iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterStep {
    /// The next batch of entity ids. May be empty when the engine yields an
    /// empty table; emptiness does not mean exhaustion.
    Batch(Vec<u64>),
    /// The underlying iterator has no more data.
    Done,
}

/// Host-visible iterator over batches of opaque entity ids.
///
/// Lifecycle: while live, [`EntityIter::next`] pulls batches until the
/// engine reports the end, after which it keeps returning
/// [`IterStep::Done`]. [`EntityIter::done`] releases the native iterator;
/// any later `next` fails with a lifecycle error. Dropping the handle
/// releases the iterator if `done` never ran.
#[derive(Debug)]
pub struct EntityIter<E: Engine> {
    engine: Arc<Mutex<E>>,
    raw: Option<RawIterator>,
    exhausted: bool,
}

impl<E: Engine> EntityIter<E> {
    pub(crate) fn create(engine: Arc<Mutex<E>>, scope: IterScope) -> BridgeResult<Self> {
        let raw = engine.lock().unwrap().create_iterator(scope)?;
        debug!(target: "bridge", ?scope, "iterator opened");
        Ok(Self {
            engine,
            raw: Some(raw),
            exhausted: false,
        })
    }

    /// Pulls the next batch, or the exhaustion sentinel once the underlying
    /// iterator reports the end.
    pub fn next(&mut self) -> BridgeResult<IterStep> {
        let raw = self
            .raw
            .as_ref()
            .ok_or(BridgeError::Disposed { handle: "iterator" })?;
        if self.exhausted {
            // the engine already reported the end, do not touch it again
            return Ok(IterStep::Done);
        }
        match self.engine.lock().unwrap().iterator_advance(raw)? {
            Some(batch) => Ok(IterStep::Batch(batch)),
            None => {
                self.exhausted = true;
                Ok(IterStep::Done)
            }
        }
    }

    /// Releases the native iterator. Valid while live or exhausted; calling
    /// it again is a no-op.
    pub fn done(&mut self) -> BridgeResult<()> {
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(raw) = self.raw.take() {
            if let Ok(mut engine) = self.engine.lock() {
                engine.iterator_release(raw);
                trace!(target: "bridge", "iterator released");
            }
        }
    }
}

impl<E: Engine> Disposable for EntityIter<E> {
    fn dispose(&mut self) -> BridgeResult<()> {
        self.done()
    }

    fn is_disposed(&self) -> bool {
        self.raw.is_none()
    }
}

impl<E: Engine> Drop for EntityIter<E> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockEngine;

    fn seeded(children: usize) -> (Arc<Mutex<MockEngine>>, u64) {
        let mut engine = MockEngine::new();
        let parent = engine.add_entity("parent");
        for i in 0..children {
            engine.add_child(parent, &format!("child{i}"));
        }
        (Arc::new(Mutex::new(engine)), parent)
    }

    #[test]
    fn test_single_batch_then_sentinel() {
        let (engine, parent) = seeded(3);
        let mut iter = EntityIter::create(engine, IterScope::ChildrenOf(parent)).unwrap();

        match iter.next().unwrap() {
            IterStep::Batch(batch) => assert_eq!(batch.len(), 3),
            IterStep::Done => panic!("expected a batch"),
        }
        assert_eq!(iter.next().unwrap(), IterStep::Done);
        // the sentinel repeats, it is not an error
        assert_eq!(iter.next().unwrap(), IterStep::Done);
    }

    #[test]
    fn test_engine_defined_batching() {
        let (engine, parent) = seeded(5);
        engine.lock().unwrap().batch_size = 2;
        let mut iter = EntityIter::create(engine, IterScope::ChildrenOf(parent)).unwrap();

        let mut seen = Vec::new();
        while let IterStep::Batch(batch) = iter.next().unwrap() {
            seen.push(batch.len());
        }
        assert_eq!(seen, vec![2, 2, 1]);
    }

    #[test]
    fn test_empty_scope_is_exhausted_immediately() {
        let (engine, parent) = seeded(0);
        let mut iter = EntityIter::create(engine, IterScope::ChildrenOf(parent)).unwrap();
        assert_eq!(iter.next().unwrap(), IterStep::Done);
    }

    #[test]
    fn test_done_releases_and_is_idempotent() {
        let (engine, parent) = seeded(2);
        let mut iter = EntityIter::create(engine.clone(), IterScope::ChildrenOf(parent)).unwrap();

        iter.done().unwrap();
        assert!(iter.is_disposed());
        assert_eq!(engine.lock().unwrap().iterators_released, 1);

        // second done is a no-op, not a crash
        iter.done().unwrap();
        assert_eq!(engine.lock().unwrap().iterators_released, 1);

        // but stepping a disposed iterator is a lifecycle error
        assert!(matches!(
            iter.next(),
            Err(BridgeError::Disposed { handle: "iterator" })
        ));
    }

    #[test]
    fn test_drop_releases_abandoned_iterator() {
        let (engine, parent) = seeded(2);
        {
            let mut iter =
                EntityIter::create(engine.clone(), IterScope::ChildrenOf(parent)).unwrap();
            let _ = iter.next();
        }
        let engine = engine.lock().unwrap();
        assert_eq!(engine.iterators_released, 1);
        assert_eq!(engine.live_handles(), 0);
    }

    #[test]
    fn test_done_then_drop_releases_once() {
        let (engine, parent) = seeded(1);
        {
            let mut iter =
                EntityIter::create(engine.clone(), IterScope::ChildrenOf(parent)).unwrap();
            iter.done().unwrap();
        }
        assert_eq!(engine.lock().unwrap().iterators_released, 1);
    }

    #[test]
    fn test_dispose_trait_delegates_to_done() {
        let (engine, parent) = seeded(1);
        let mut iter = EntityIter::create(engine.clone(), IterScope::ChildrenOf(parent)).unwrap();
        assert!(!iter.is_disposed());
        iter.dispose().unwrap();
        assert!(iter.is_disposed());
        assert_eq!(engine.lock().unwrap().iterators_released, 1);
    }
}
