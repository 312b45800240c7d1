//! REPL 引擎测试

use std::sync::Arc;

use crate::backends::dev::repl::backend_trait::{EvalResult, REPLBackend};
use crate::backends::dev::repl::engine::{bracket_depth, Evaluator, InputBuffer, InputLine, ReplState};
use crate::runtime::output::CaptureSink;
use crate::runtime::scheduler::SchedulerConfig;
use crate::runtime::{Runtime, RuntimeConfig};

fn evaluator() -> (Evaluator, CaptureSink) {
    let output = CaptureSink::new();
    let config = RuntimeConfig {
        scheduler: SchedulerConfig {
            cpus: 1,
            default_stack_size: 256 * 1024,
            worker_stack_size: 256 * 1024,
        },
        ..RuntimeConfig::default()
    };
    let runtime = Runtime::with_output(config, Arc::new(output.clone())).unwrap();
    (Evaluator::new(Arc::new(runtime)), output)
}

#[cfg(test)]
mod depth_tests {
    use super::*;

    #[test]
    fn test_counts_all_bracket_kinds() {
        assert_eq!(bracket_depth("F(a[1], {"), 2);
        assert_eq!(bracket_depth("})]"), -3);
        assert_eq!(bracket_depth("{ ( ) }"), 0);
    }

    #[test]
    fn test_ignores_literals_and_comments() {
        assert_eq!(bracket_depth(r#""{(" '[' '\'' "\"{""#), 0);
        assert_eq!(bracket_depth("{ // }\n"), 1);
        assert_eq!(bracket_depth("/* { */ {"), 1);
        assert_eq!(bracket_depth("{ /* } */ }"), 0);
    }
}

#[cfg(test)]
mod buffer_tests {
    use super::*;

    #[test]
    fn test_lines_accumulate_until_balanced() {
        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.push("I64 F() {"), InputLine::Open);
        assert!(buffer.is_pending());
        assert_eq!(buffer.push("  return 3;"), InputLine::Open);
        assert_eq!(buffer.push("}"), InputLine::Balanced);
        assert_eq!(buffer.take(), "I64 F() {\n  return 3;\n}\n");
        assert!(!buffer.is_pending());
    }

    #[test]
    fn test_explicit_block_is_verbatim() {
        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.push(":{"), InputLine::Open);
        assert_eq!(buffer.push("I64 a = 1;"), InputLine::Open);
        assert_eq!(buffer.push(":quit"), InputLine::Open);
        assert_eq!(buffer.push("}"), InputLine::Open);
        assert_eq!(
            buffer.push(" :} "),
            InputLine::Block("I64 a = 1;\n:quit\n}\n".to_string())
        );
        assert!(!buffer.is_pending());
    }

    #[test]
    fn test_commands_and_blanks() {
        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.push("   "), InputLine::Blank);
        assert_eq!(buffer.push(" :help"), InputLine::Command(":help".to_string()));
        assert_eq!(buffer.push(":reset"), InputLine::Command(":reset".to_string()));
        assert!(!buffer.is_pending());
    }

    #[test]
    fn test_colon_continues_a_pending_unit() {
        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.push("I64 r = c ?"), InputLine::Balanced);
        assert_eq!(buffer.push("  10"), InputLine::Balanced);
        assert_eq!(buffer.push("  : 20;"), InputLine::Balanced);
        assert_eq!(buffer.text(), "I64 r = c ?\n  10\n  : 20;\n");

        let mut buffer = InputBuffer::new();
        assert_eq!(buffer.push("if (1) {"), InputLine::Open);
        assert_eq!(buffer.push(":{"), InputLine::Open);
        assert_eq!(buffer.text(), "if (1) {\n:{\n");
    }
}

#[cfg(test)]
mod evaluator_tests {
    use super::*;

    #[test]
    fn test_state_walks_back_to_idle() {
        let (mut repl, output) = evaluator();
        assert_eq!(repl.state(), ReplState::Idle);
        assert_eq!(repl.feed_line("I64 x = 4"), EvalResult::Incomplete);
        assert_eq!(repl.state(), ReplState::Accumulating);
        assert_eq!(repl.feed_line(";"), EvalResult::Ok);
        assert_eq!(repl.state(), ReplState::Idle);
        assert_eq!(repl.feed_line("x * 2;"), EvalResult::Value(8));
        assert_eq!(output.take(), "8\n");
    }

    #[test]
    fn test_front_end_error_discards_unit() {
        let (mut repl, output) = evaluator();
        match repl.feed_line("1 + ;") {
            EvalResult::Error(message) => assert!(message.contains("syntax error")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(repl.state(), ReplState::Idle);
        assert!(!repl.is_pending());
        assert_eq!(repl.feed_line("2;"), EvalResult::Value(2));
        assert_eq!(output.take(), "2\n");
        assert_eq!(repl.history(), vec!["2;".to_string()]);

        let stats = repl.stats();
        assert_eq!(stats.eval_count, 2);
        assert_eq!(stats.error_count, 1);
    }

    #[test]
    fn test_ternary_split_over_lines() {
        let (mut repl, output) = evaluator();
        assert_eq!(repl.feed_line("I64 c = 1;"), EvalResult::Ok);
        assert_eq!(repl.feed_line("c ?"), EvalResult::Incomplete);
        assert_eq!(repl.feed_line("  10"), EvalResult::Incomplete);
        assert_eq!(repl.feed_line("  : 20;"), EvalResult::Value(10));
        assert_eq!(output.take(), "10\n");
        assert!(!repl.is_pending());
    }

    #[test]
    fn test_reset_drops_pending_input() {
        let (mut repl, _) = evaluator();
        assert_eq!(repl.feed_line("I64 F() {"), EvalResult::Incomplete);
        REPLBackend::reset(&mut repl);
        assert!(!repl.is_pending());
        assert_eq!(repl.state(), ReplState::Idle);
        assert_eq!(repl.feed_line("5;"), EvalResult::Value(5));
    }
}
