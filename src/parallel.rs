// Copyright (c) the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use crate::error::Result;

/// Data-parallel execution over an index range with per-thread state.
///
/// Guarantees required of an implementation:
/// - `init(num_threads)` runs to completion before any task, and returns one
///   state per thread;
/// - every task index in `begin..end` runs exactly once, receiving the state
///   of the thread it runs on;
/// - tasks sharing a state never run concurrently, so the state can hold
///   reusable scratch buffers.
///
/// Tasks report failures out of band (a shared atomic flag); the runner
/// itself only fails if `init` does.
pub trait ParallelRunner {
    fn run<S, I, T>(&self, begin: usize, end: usize, init: I, task: T) -> Result<()>
    where
        S: Send,
        I: FnOnce(usize) -> Result<Vec<S>>,
        T: Fn(usize, &mut S) + Sync;
}

/// Runs everything on the calling thread. Must produce the same results as
/// any parallel runner.
pub struct SequentialRunner;

impl ParallelRunner for SequentialRunner {
    fn run<S, I, T>(&self, begin: usize, end: usize, init: I, task: T) -> Result<()>
    where
        S: Send,
        I: FnOnce(usize) -> Result<Vec<S>>,
        T: Fn(usize, &mut S) + Sync,
    {
        let mut states = init(1)?;
        assert_eq!(states.len(), 1);
        for index in begin..end {
            task(index, &mut states[0]);
        }
        Ok(())
    }
}

/// Distributes contiguous chunks of the range over the rayon pool, one chunk
/// per worker, so each per-thread state is touched by exactly one task at a
/// time.
#[cfg(feature = "parallel")]
pub struct RayonRunner;

#[cfg(feature = "parallel")]
impl ParallelRunner for RayonRunner {
    fn run<S, I, T>(&self, begin: usize, end: usize, init: I, task: T) -> Result<()>
    where
        S: Send,
        I: FnOnce(usize) -> Result<Vec<S>>,
        T: Fn(usize, &mut S) + Sync,
    {
        let num_threads = rayon::current_num_threads().max(1);
        let mut states = init(num_threads)?;
        assert_eq!(states.len(), num_threads);
        if begin >= end {
            return Ok(());
        }
        let chunk = (end - begin).div_ceil(num_threads);
        rayon::scope(|scope| {
            for (tid, state) in states.iter_mut().enumerate() {
                let task = &task;
                let lo = begin + tid * chunk;
                let hi = (lo + chunk).min(end);
                if lo >= hi {
                    break;
                }
                scope.spawn(move |_| {
                    for index in lo..hi {
                        task(index, state);
                    }
                });
            }
        });
        Ok(())
    }
}

/// Shared mutable access for writers whose write sets are provably disjoint.
///
/// The tile scheduler hands every task a reference to the whole output image
/// even though each task only writes its own rectangle. Rust cannot express
/// that split through `&mut`, so accesses go through a raw pointer; every
/// `get` call site states the disjointness argument.
#[allow(unsafe_code)]
pub(crate) mod disjoint {
    use std::marker::PhantomData;

    pub(crate) struct DisjointMut<'a, T> {
        ptr: *mut T,
        _marker: PhantomData<&'a mut T>,
    }

    // SAFETY: sharing the pointer across threads is sound because every
    // dereference is restricted, by the caller's contract, to a write set
    // disjoint from all concurrent ones.
    unsafe impl<T: Send> Sync for DisjointMut<'_, T> {}

    impl<'a, T> DisjointMut<'a, T> {
        pub(crate) fn new(value: &'a mut T) -> Self {
            DisjointMut {
                ptr: value,
                _marker: PhantomData,
            }
        }

        /// # Safety
        /// The caller must ensure that the region of `T` it touches through
        /// the returned reference is not accessed by any other holder of this
        /// cell for the lifetime of the borrow.
        #[allow(clippy::mut_from_ref)]
        pub(crate) unsafe fn get(&self) -> &mut T {
            unsafe { &mut *self.ptr }
        }
    }
}

pub(crate) use disjoint::DisjointMut;

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn exercise_runner<P: ParallelRunner>(pool: &P) {
        let visited = AtomicUsize::new(0);
        pool.run(
            3,
            100,
            |threads| {
                assert!(threads >= 1);
                Ok(vec![0usize; threads])
            },
            |index, state| {
                *state += index;
                visited.fetch_add(1, Ordering::Relaxed);
            },
        )
        .unwrap();
        assert_eq!(visited.load(Ordering::Relaxed), 97);
    }

    #[test]
    fn sequential_runner() {
        exercise_runner(&SequentialRunner);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn rayon_runner() {
        exercise_runner(&RayonRunner);
    }

    #[test]
    fn empty_range() {
        SequentialRunner
            .run(5, 5, |_| Ok(vec![(); 1]), |_, _| panic!("no tasks expected"))
            .unwrap();
    }
}
