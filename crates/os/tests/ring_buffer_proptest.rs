//! Property-based tests for the ring buffer length invariant.
//! A random push/pop script is replayed against a `VecDeque` model.

use std::collections::VecDeque;

use os::{OverflowPolicy, RingBuffer, RingBufferError};
use proptest::prelude::*;

const CAP: usize = 5;

#[derive(Debug, Clone, Copy)]
enum Op {
    Push(u8),
    Pop,
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![any::<u8>().prop_map(Op::Push), Just(Op::Pop)],
        0..200,
    )
}

proptest::proptest! {
    /// Reject policy: len == accepted pushes - successful pops, contents FIFO.
    #[test]
    fn reject_matches_model(script in ops()) {
        let rb: RingBuffer<u8, CAP> = RingBuffer::new(OverflowPolicy::Reject);
        let mut model = VecDeque::new();
        for op in script {
            match op {
                Op::Push(v) => {
                    let result = rb.push(v);
                    if model.len() == CAP {
                        prop_assert_eq!(result, Err(RingBufferError::Full));
                    } else {
                        prop_assert_eq!(result, Ok(()));
                        model.push_back(v);
                    }
                }
                Op::Pop => prop_assert_eq!(rb.pop(), model.pop_front()),
            }
            prop_assert_eq!(rb.len(), model.len());
            prop_assert!(rb.len() <= CAP);
            prop_assert_eq!(rb.is_full(), model.len() == CAP);
            prop_assert_eq!(rb.is_empty(), model.is_empty());
        }
    }

    /// Overwrite policy: push always succeeds and the oldest item is discarded.
    #[test]
    fn overwrite_matches_model(script in ops()) {
        let rb: RingBuffer<u8, CAP> = RingBuffer::new(OverflowPolicy::Overwrite);
        let mut model = VecDeque::new();
        for op in script {
            match op {
                Op::Push(v) => {
                    prop_assert_eq!(rb.push(v), Ok(()));
                    if model.len() == CAP {
                        model.pop_front();
                    }
                    model.push_back(v);
                }
                Op::Pop => prop_assert_eq!(rb.pop(), model.pop_front()),
            }
            prop_assert_eq!(rb.len(), model.len());
        }
    }
}
