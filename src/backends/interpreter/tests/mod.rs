//! 解释器测试

use std::sync::Arc;

use crate::backends::interpreter::Interpreter;
use crate::backends::Executor;
use crate::frontend::{Frontend, HolyCFrontend};
use crate::runtime::output::CaptureSink;
use crate::runtime::scheduler::{SchedulerConfig, TaskOutcome};
use crate::runtime::{AbiVersion, Runtime, RuntimeConfig, RuntimeError, RuntimeResult};

struct Session {
    interpreter: Interpreter,
    output: CaptureSink,
}

impl Session {
    fn new() -> Self {
        let output = CaptureSink::new();
        let config = RuntimeConfig {
            scheduler: SchedulerConfig {
                cpus: 2,
                default_stack_size: 512 * 1024,
                worker_stack_size: 512 * 1024,
            },
            ..RuntimeConfig::default()
        };
        let runtime = Runtime::with_output(config, Arc::new(output.clone())).unwrap();
        Self {
            interpreter: Interpreter::new(Arc::new(runtime)),
            output,
        }
    }

    /// Compile and execute one unit, then settle background work.
    fn run(
        &self,
        source: &str,
    ) -> RuntimeResult<Option<i64>> {
        let unit = HolyCFrontend::new().compile(source).unwrap();
        let result = self.interpreter.execute(&unit);
        self.interpreter.runtime().spawn_wait_all().unwrap();
        result
    }

    fn value(
        &self,
        source: &str,
    ) -> i64 {
        match self.run(source) {
            Ok(Some(value)) => value,
            other => panic!("{}: unexpected {:?}", source, other),
        }
    }
}

#[cfg(test)]
mod eval_tests {
    use super::*;

    #[test]
    fn test_arithmetic_and_echo() {
        let s = Session::new();
        assert_eq!(s.value("1 + 2 * 3;"), 7);
        assert_eq!(s.value("-7 / 2;"), -3);
        assert_eq!(s.value("-7 % 2;"), -1);
        assert_eq!(s.value("1 << 4 | 1;"), 17);
        assert_eq!(s.value("3 > 2 && 0 || 5;"), 1);
        assert_eq!(s.value("'AB';"), 0x4241);
    }

    #[test]
    fn test_global_persistence() {
        let s = Session::new();
        assert_eq!(s.run("I64 g = 3;").unwrap(), None);
        assert_eq!(s.value("g = g + 4;"), 7);
        assert_eq!(s.value("g;"), 7);
        assert_eq!(s.interpreter.global("g"), Some(7));
    }

    #[test]
    fn test_narrowing_on_store() {
        let s = Session::new();
        s.run("U8 b = 300; I8 c = 200; Bool t = 42;").unwrap();
        assert_eq!(s.value("b;"), 44);
        assert_eq!(s.value("c;"), -56);
        assert_eq!(s.value("t;"), 1);
        assert_eq!(s.value("b += 250;"), 38);
    }

    #[test]
    fn test_void_calls_do_not_echo() {
        let s = Session::new();
        s.run("U0 Hello() { \"Hello\\n\"; }").unwrap();
        assert_eq!(s.run("Hello();").unwrap(), None);
        assert_eq!(s.run("PutChars('ok');").unwrap(), None);
        assert_eq!(s.output.take(), "Hello\nok");
    }

    #[test]
    fn test_control_flow() {
        let s = Session::new();
        s.run(
            "I64 Sum(I64 n) {
                I64 total = 0, i;
                for (i = 1; i <= n; i++) {
                    if (i % 2) continue;
                    total += i;
                }
                while (1) { total++; break; }
                do { total--; } while (0);
                return total;
            }",
        )
        .unwrap();
        assert_eq!(s.value("Sum(10);"), 30);
    }

    #[test]
    fn test_scopes_shadow_and_end() {
        let s = Session::new();
        s.run("I64 x = 1;").unwrap();
        assert_eq!(s.value("I64 F() { I64 x = 5; { I64 x = 9; } return x; } F();"), 5);
        assert_eq!(s.value("x;"), 1);
    }

    #[test]
    fn test_default_arguments() {
        let s = Session::new();
        s.run("I64 F(I64 x, I64 y = 10) { return x + y; } I64 G(I64 a = 1, I64 b = 2) { return a * 10 + b; }")
            .unwrap();
        assert_eq!(s.value("F(1);"), 11);
        assert_eq!(s.value("F(1, 2);"), 3);
        assert_eq!(s.value("G(, 5);"), 15);
        assert_eq!(s.value("G();"), 12);
        assert!(matches!(s.run("F();"), Err(RuntimeError::Eval(_))));
        assert!(matches!(s.run("F(1, 2, 3);"), Err(RuntimeError::Eval(_))));
    }

    #[test]
    fn test_deep_recursion_grows_the_stack() {
        let s = Session::new();
        s.run("I64 Depth(I64 n) { if (n == 0) return 0; return 1 + Depth(n - 1); }")
            .unwrap();
        assert_eq!(s.value("Depth(5000);"), 5000);
        let stats = s.interpreter.runtime().trampoline().stats();
        assert!(stats.switches.load(std::sync::atomic::Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_faults() {
        let s = Session::new();
        assert_eq!(
            s.run("1 / 0;"),
            Err(RuntimeError::eval("division by zero"))
        );
        assert!(matches!(s.run("missing;"), Err(RuntimeError::Eval(_))));
        assert!(matches!(s.run("Missing();"), Err(RuntimeError::Eval(_))));
    }

    #[test]
    fn test_abi_mismatch_rejects_unit() {
        let s = Session::new();
        let unit = HolyCFrontend::targeting(AbiVersion { major: 2, minor: 0 })
            .compile("I64 never = 1;")
            .unwrap();
        assert!(matches!(
            s.interpreter.execute(&unit),
            Err(RuntimeError::AbiVersionMismatch { .. })
        ));
        assert_eq!(s.interpreter.global("never"), None);
    }
}

#[cfg(test)]
mod redefinition_tests {
    use super::*;

    #[test]
    fn test_redefinition_is_late_bound() {
        let s = Session::new();
        s.run("I64 Add(I64 x) { return x + 1; }").unwrap();
        s.run("I64 Twice(I64 x) { return Add(Add(x)); }").unwrap();
        assert_eq!(s.value("Add(41);"), 42);
        assert_eq!(s.value("Twice(0);"), 2);

        s.run("I64 Add(I64 x) { return x + 2; }").unwrap();
        assert_eq!(s.value("Add(41);"), 43);
        assert_eq!(s.value("Twice(0);"), 4);
    }

    #[test]
    fn test_global_redeclaration_replaces_binding() {
        let s = Session::new();
        s.run("I64 v = 5;").unwrap();
        s.run("U8 v = 511;").unwrap();
        assert_eq!(s.value("v;"), 255);
        assert!(s.interpreter.symbols().contains(&"v".to_string()));
    }
}

#[cfg(test)]
mod exception_tests {
    use super::*;

    #[test]
    fn test_try_catch_sees_payload() {
        let s = Session::new();
        s.run("I64 r = 0, depth = 0;").unwrap();
        s.run("try { throw(5); r = 1; } catch { r = ExceptPayload(); depth = TryDepth(); }")
            .unwrap();
        assert_eq!(s.value("r;"), 5);
        assert_eq!(s.value("depth;"), 1);
        assert_eq!(s.value("TryDepth();"), 0);
    }

    #[test]
    fn test_throw_crosses_function_calls() {
        let s = Session::new();
        s.run("U0 Inner(I64 v) { throw(v); } I64 Outer() { try { Inner(3); } catch { return ExceptPayload() * 10; } return 0; }")
            .unwrap();
        assert_eq!(s.value("Outer();"), 30);
    }

    #[test]
    fn test_rethrow_from_handler_reaches_outer_frame() {
        let s = Session::new();
        s.run("I64 seen = 0;").unwrap();
        s.run("try { try { throw(1); } catch { throw(2); } } catch { seen = ExceptPayload(); }")
            .unwrap();
        assert_eq!(s.value("seen;"), 2);
    }

    #[test]
    fn test_break_out_of_try_pops_frame() {
        let s = Session::new();
        s.run("I64 d = -1; while (1) { try { break; } catch { } } d = TryDepth();")
            .unwrap();
        assert_eq!(s.value("d;"), 0);
    }

    #[test]
    fn test_unhandled_throw_keeps_earlier_assignments() {
        let s = Session::new();
        s.run("I64 g = 0;").unwrap();
        assert_eq!(
            s.run("g = 1; throw(2); g = 3;"),
            Err(RuntimeError::UnhandledException { payload: 2 })
        );
        assert_eq!(s.value("g;"), 1);
        assert_eq!(s.value("ExceptActive();"), 0);
    }
}

#[cfg(test)]
mod builtin_tests {
    use super::*;

    #[test]
    fn test_print_and_strings() {
        let s = Session::new();
        s.run("Print(\"%d-%s|%3d|%-3d|\\n\", 5, \"x\", 7, 8);").unwrap();
        s.run("\"%x %c\\n\", 255, 'A';").unwrap();
        assert_eq!(s.output.take(), "5-x|  7|8  |\nff A\n");
    }

    #[test]
    fn test_memory_builtins() {
        let s = Session::new();
        s.run("U8 *p = MAlloc(16); U8 *q = MAlloc(16);").unwrap();
        s.run("MemSet(p, 'A', 3); MemCpy(q, p, 4); Print(\"%s\\n\", q);")
            .unwrap();
        assert_eq!(s.output.take(), "AAA\n");
        assert_eq!(s.run("Free(p);").unwrap(), None);
        assert!(matches!(s.run("Free(p);"), Err(RuntimeError::Memory(_))));
        assert_eq!(s.run("Free(0);").unwrap(), None);
    }

    #[test]
    fn test_class_publishes_reflection_table() {
        let s = Session::new();
        let before = s.value("ReflFieldCount();");
        s.run("class CPoint { I64 x format \"%d\"; I64 y; };").unwrap();
        assert_eq!(s.value("ReflFieldCount();"), before + 2);
        s.run("class CPoint { I64 x; };").unwrap();
        assert_eq!(s.value("ReflFieldCount();"), before + 3);
        assert_eq!(s.value("AbiMajor();"), AbiVersion::CURRENT.major as i64);
    }

    #[test]
    fn test_reflection_lookups_from_holyc() {
        let s = Session::new();
        s.run("class CPoint { I64 x format \"%d\" data 5; I64 y; };").unwrap();
        s.run("I64 c = HashFind(\"CPoint\");").unwrap();
        assert_ne!(s.value("c;"), 0);
        assert_eq!(s.value("HashFind(\"CPoint\", , HTT_FUNCTION);"), 0);
        assert_eq!(s.value("HashFind(\"Missing\");"), 0);

        assert_eq!(s.value("MemberCount(c);"), 2);
        assert_eq!(s.value("MemberCount(0);"), 0);
        assert_eq!(s.value("MemberName(c, 2);"), 0);
        s.run(
            "Print(\"%s %s|%s|%s\", MemberName(c, 0), MemberName(c, 1),
                   MemberMetaData(\"format\", c, \"x\"), MemberMetaData(\"data\", c, \"x\"));",
        )
        .unwrap();
        assert_eq!(s.output.take(), "x y|%d|5");

        assert_eq!(s.value("MemberMetaData(\"format\", c, \"y\");"), 0);
        assert_eq!(s.value("MemberMetaData(\"format\", c, \"z\");"), 0);
        assert_ne!(s.value("MemberMetaFind(\"data\", c, \"x\");"), 0);
        assert_eq!(s.value("MemberMetaFind(\"size\", c, \"x\");"), 0);

        s.run("class CPoint { I64 z; };").unwrap();
        assert_eq!(s.value("MemberCount(c);"), 1);
    }

    #[test]
    fn test_hash_find_yields_function_pointer() {
        let s = Session::new();
        s.run("I64 Twice(I64 a) { return a * 2; }").unwrap();
        assert_eq!(
            s.value("JobResGet(JobQue(HashFind(\"Twice\", \"global\", HTT_FUNCTION), 4));"),
            8
        );
        assert!(matches!(
            s.run("HashFind(\"Twice\", , 7);"),
            Err(RuntimeError::Eval(_))
        ));
    }

    #[test]
    fn test_call_stack_grow() {
        let s = Session::new();
        s.run("I64 Sum3(I64 a, I64 b, I64 c) { return a + b + c; }").unwrap();
        assert_eq!(s.value("CallStkGrow(65536, 1048576, &Sum3, 1, 2, 3);"), 6);
        assert!(matches!(
            s.run("CallStkGrow(2048, 1024, &Sum3);"),
            Err(RuntimeError::ResourceExhaustion { .. })
        ));
    }
}

#[cfg(test)]
mod scheduling_tests {
    use super::*;

    #[test]
    fn test_spawn_runs_before_barrier_returns() {
        let s = Session::new();
        s.run("I64 hits = 0; U0 Worker(I64 n) { hits += n; }").unwrap();
        assert!(s.value("Spawn(&Worker, 5);") > 0);
        assert_eq!(s.value("hits;"), 5);
    }

    #[test]
    fn test_spawn_rejects_bad_cpu() {
        let s = Session::new();
        s.run("U0 Worker(I64 n) { }").unwrap();
        assert_eq!(s.value("Spawn(&Worker, 1, 0, 99);"), 0);
    }

    #[test]
    fn test_job_result_is_idempotent() {
        let s = Session::new();
        s.run("I64 runs = 0; I64 Once(I64 x) { runs++; return x * x; }").unwrap();
        s.run("I64 j = JobQue(&Once, 7);").unwrap();
        assert_eq!(s.interpreter.unread_jobs(), 1);
        assert_eq!(s.value("JobResGet(j) + JobResGet(j);"), 98);
        assert_eq!(s.value("runs;"), 1);
        assert_eq!(s.interpreter.unread_jobs(), 0);
        assert_eq!(s.value("JobResGet(j);"), 49);
    }

    #[test]
    fn test_job_awaiting_a_job_on_its_own_cpu() {
        let s = Session::new();
        s.run(
            "I64 Inc(I64 y) { return y + 1; }
             I64 Outer(I64 y) { I64 j = JobQue(&Inc, y, 0); return JobResGet(j) * 2; }",
        )
        .unwrap();
        assert_eq!(s.value("JobResGet(JobQue(&Outer, 20, 0));"), 42);
    }

    #[test]
    fn test_failed_job_fails_the_caller() {
        let s = Session::new();
        s.run("I64 Boom(I64 x) { throw(x); return 0; } I64 j = JobQue(&Boom, 9);")
            .unwrap();
        assert_eq!(
            s.run("JobResGet(j);"),
            Err(RuntimeError::UnhandledException { payload: 9 })
        );
    }

    #[test]
    fn test_nested_work_settles() {
        let s = Session::new();
        s.run(
            "I64 done = 0;
             U0 Leaf(I64 n) { done += 0; }
             I64 Branch(I64 n) { I64 i; for (i = 0; i < n; i++) Spawn(&Leaf); return n; }",
        )
        .unwrap();
        s.run("I64 a = JobQue(&Branch, 3), b = JobQue(&Branch, 4);").unwrap();
        assert_eq!(s.interpreter.runtime().scheduler().stats().in_flight(), 0);
        assert_eq!(s.value("JobResGet(a) + JobResGet(b);"), 7);
    }

    #[test]
    fn test_functions_are_published_for_task_spawn() {
        let s = Session::new();
        s.run("I64 marked = -1; U0 Mark(I64 d) { marked = d; }").unwrap();
        let handle = s.interpreter.runtime().hc_task_spawn("Mark").unwrap();
        assert_eq!(handle.join(), TaskOutcome::Completed(0));
        assert_eq!(s.value("marked;"), 0);
        assert!(s.interpreter.runtime().hc_task_spawn("NoSuchFunction").is_none());
    }
}
