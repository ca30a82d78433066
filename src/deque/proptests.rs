//! Property-based tests for the linked deque using proptest
//!
//! Each property drives the deque and a `VecDeque` model with the same operation
//! sequence and checks they never disagree.

use crate::deque::LinkedDeque;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Op {
    PushHead(i32),
    PopTail,
    DropTail,
    PeekHead,
    PeekTail,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<i32>().prop_map(Op::PushHead),
        2 => Just(Op::PopTail),
        1 => Just(Op::DropTail),
        1 => Just(Op::PeekHead),
        1 => Just(Op::PeekTail),
    ]
}

proptest! {
    #[test]
    fn test_pop_order_matches_push_order(values in prop::collection::vec(any::<i32>(), 0..200)) {
        let deque = LinkedDeque::new();
        for &value in &values {
            deque.push_head(value);
            prop_assert_eq!(deque.peek_head(), Some(value));
            prop_assert_eq!(deque.peek_tail(), values.first().copied());
        }

        for &expected in &values {
            prop_assert_eq!(deque.pop_tail(), Some(expected));
        }
        prop_assert!(deque.is_empty());
    }

    #[test]
    fn test_matches_model(ops in prop::collection::vec(op_strategy(), 1..300)) {
        let disposed = Arc::new(Mutex::new(Vec::new()));
        let deque = LinkedDeque::with_disposer({
            let disposed = Arc::clone(&disposed);
            move |value: i32| disposed.lock().unwrap().push(value)
        });
        let mut model = VecDeque::new();
        let mut model_disposed = Vec::new();

        for op in ops {
            match op {
                Op::PushHead(value) => {
                    deque.push_head(value);
                    model.push_front(value);
                }
                Op::PopTail => prop_assert_eq!(deque.pop_tail(), model.pop_back()),
                Op::DropTail => match model.pop_back() {
                    Some(value) => {
                        prop_assert!(deque.drop_tail().is_ok());
                        model_disposed.push(value);
                    }
                    None => prop_assert!(deque.drop_tail().is_err()),
                },
                Op::PeekHead => prop_assert_eq!(deque.peek_head(), model.front().copied()),
                Op::PeekTail => prop_assert_eq!(deque.peek_tail(), model.back().copied()),
            }

            prop_assert_eq!(deque.len(), model.len());
            prop_assert_eq!(deque.is_empty(), model.is_empty());
            prop_assert!(deque.is_consistent());
        }

        prop_assert_eq!(&*disposed.lock().unwrap(), &model_disposed);

        let remaining = model.len();
        prop_assert_eq!(deque.free(), remaining);
        model_disposed.extend(model.into_iter());
        prop_assert_eq!(&*disposed.lock().unwrap(), &model_disposed);
    }
}
