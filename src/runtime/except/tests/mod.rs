//! 异常帧栈测试
//!
//! 覆盖 push/pop 嵌套、throw 控制转移以及上下文边界行为

use proptest::prelude::*;

use crate::runtime::context::{run_in_context, ExecContext};
use crate::runtime::error::RuntimeError;
use crate::runtime::except::{
    exception_active, exception_payload, pop, push, throw, try_catch, try_depth, ExceptError,
    FrameStack,
};

#[cfg(test)]
mod frame_stack_tests {
    use super::*;

    #[test]
    fn test_push_pop_lifo() {
        let mut frames = FrameStack::new();
        let a = frames.push();
        let b = frames.push();
        assert_eq!(frames.depth(), 2);
        assert!(frames.pop(b).is_ok());
        assert!(frames.pop(a).is_ok());
        assert_eq!(frames.depth(), 0);
    }

    #[test]
    fn test_pop_out_of_order_is_rejected() {
        let mut frames = FrameStack::new();
        let a = frames.push();
        let b = frames.push();
        assert_eq!(
            frames.pop(a),
            Err(ExceptError::OutOfOrder { popped: a, top: b })
        );
        // Nothing was removed by the failed pop.
        assert_eq!(frames.depth(), 2);
    }

    #[test]
    fn test_pop_empty() {
        let mut frames = FrameStack::new();
        let a = frames.push();
        frames.pop(a).unwrap();
        assert_eq!(frames.pop(a), Err(ExceptError::Empty(a)));
    }

    #[test]
    fn test_frame_ids_are_unique() {
        let mut frames = FrameStack::new();
        let a = frames.push();
        frames.pop(a).unwrap();
        let b = frames.push();
        assert_ne!(a, b);
    }
}

#[cfg(test)]
mod throw_tests {
    use super::*;

    #[test]
    fn test_try_catch_receives_payload() {
        let result = run_in_context(ExecContext::root(), || {
            try_catch(|| -> i64 { throw(42) }, |payload| payload + 1)
        });
        assert_eq!(result, Ok(43));
    }

    #[test]
    fn test_state_visible_in_handler_and_cleared_after() {
        let result = run_in_context(ExecContext::root(), || {
            let seen = try_catch(
                || -> (bool, i64, usize) { throw(-9) },
                |_| (exception_active(), exception_payload(), try_depth()),
            );
            (seen, exception_active(), try_depth())
        });
        assert_eq!(result, Ok(((true, -9, 1), false, 0)));
    }

    #[test]
    fn test_normal_exit_leaves_state_untouched() {
        let result = run_in_context(ExecContext::root(), || {
            let v = try_catch(|| 5, |_| -1);
            (v, exception_active(), try_depth())
        });
        assert_eq!(result, Ok((5, false, 0)));
    }

    #[test]
    fn test_inner_frames_are_unwound() {
        let result = run_in_context(ExecContext::root(), || {
            try_catch(
                || -> usize {
                    // Raw frames with no restore point of their own.
                    push();
                    push();
                    throw(1)
                },
                |_| try_depth(),
            )
        });
        // Only the restore point's own frame survives the transfer.
        assert_eq!(result, Ok(1));
    }

    #[test]
    fn test_nested_try_inside_handler_keeps_outer_state() {
        let result = run_in_context(ExecContext::root(), || {
            try_catch(
                || -> i64 { throw(7) },
                |_| {
                    let inner = try_catch(|| 1, |_| 0);
                    inner + exception_payload()
                },
            )
        });
        assert_eq!(result, Ok(8));
    }

    #[test]
    fn test_rethrow_from_handler_reaches_outer_frame() {
        let result = run_in_context(ExecContext::root(), || {
            try_catch(
                || try_catch(|| -> i64 { throw(1) }, |p| throw(p * 10)),
                |p| p + try_depth() as i64,
            )
        });
        assert_eq!(result, Ok(11));
    }

    #[test]
    fn test_throw_without_frame_is_fatal() {
        let result = run_in_context(ExecContext::root(), || -> i64 { throw(99) });
        assert_eq!(
            result,
            Err(RuntimeError::UnhandledException { payload: 99 })
        );
    }

    #[test]
    fn test_host_panic_is_not_caught_by_restore_point() {
        let result = run_in_context(ExecContext::root(), || {
            try_catch(|| -> i64 { panic!("boom") }, |_| 0)
        });
        assert_eq!(result, Err(RuntimeError::Panicked("boom".to_string())));
    }

    #[test]
    fn test_contexts_do_not_share_frames() {
        let result = run_in_context(ExecContext::root(), || {
            let outer = push();
            let inner_depth = run_in_context(ExecContext::root(), try_depth);
            let depth = try_depth();
            pop(outer).unwrap();
            (inner_depth, depth)
        });
        assert_eq!(result, Ok((Ok(0), 1)));
    }
}

proptest! {
    #[test]
    fn prop_balanced_push_pop_restores_depth(
        ops in proptest::collection::vec(any::<bool>(), 0..64),
        prefix in 0usize..4,
    ) {
        let mut frames = FrameStack::new();
        for _ in 0..prefix {
            frames.push();
        }
        let before = frames.depth();

        // `true` pushes, `false` pops the most recent frame when one of ours is open.
        let mut open = Vec::new();
        for op in ops {
            if op {
                open.push(frames.push());
            } else if let Some(id) = open.pop() {
                prop_assert!(frames.pop(id).is_ok());
            }
        }
        while let Some(id) = open.pop() {
            prop_assert!(frames.pop(id).is_ok());
        }

        prop_assert_eq!(frames.depth(), before);
        prop_assert!(!frames.state().active);
    }
}
