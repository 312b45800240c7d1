//! 运行时与批处理集成测试

use std::io::Write;
use std::sync::Arc;

use holyc::frontend::{Frontend, HolyCFrontend};
use holyc::runtime::output::CaptureSink;
use holyc::runtime::scheduler::SchedulerConfig;
use holyc::runtime::{Runtime, RuntimeConfig, RuntimeError};
use holyc::{check, run_file, run_on};

fn runtime() -> (Arc<Runtime>, CaptureSink) {
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
    (Arc::new(runtime), output)
}

#[test]
fn test_root_throw_without_frame_is_fatal() {
    let (rt, output) = runtime();
    let err = run_on(&rt, "\"before\\n\"; throw(13); \"after\\n\";").unwrap_err();
    assert_eq!(
        err.downcast_ref::<RuntimeError>(),
        Some(&RuntimeError::UnhandledException { payload: 13 })
    );
    assert_eq!(output.take(), "before\n");
}

#[test]
fn test_reflection_registry_only_grows() {
    let (rt, _) = runtime();
    let before = rt.reflection().field_count();
    run_on(&rt, "class A { I64 x; I64 y; };").unwrap();
    assert_eq!(rt.reflection().field_count(), before + 2);
    run_on(&rt, "class A { I64 z; };").unwrap();
    assert_eq!(rt.reflection().field_count(), before + 3);
    assert_eq!(run_on(&rt, "ReflFieldCount();").unwrap(), Some(before as i64 + 3));
}

#[test]
fn test_job_result_runs_once() {
    let (rt, _) = runtime();
    let value = run_on(
        &rt,
        "I64 runs = 0;
         I64 Square(I64 x) { runs++; return x * x; }
         I64 j = JobQue(&Square, 6);
         JobResGet(j) + JobResGet(j) + runs;",
    )
    .unwrap();
    assert_eq!(value, Some(73));
}

#[test]
fn test_wait_all_covers_nested_work() {
    let (rt, _) = runtime();
    let value = run_on(
        &rt,
        "I64 leaves = 0;
         U0 Leaf(I64 n) { leaves += n; }
         U0 Branch(I64 n) { I64 i; for (i = 0; i < n; i++) JobQue(&Leaf, 1, 0); }
         Spawn(&Branch, 5);
         Spawn(&Branch, 3);",
    )
    .unwrap();
    assert!(value.is_some());
    assert_eq!(rt.scheduler().stats().in_flight(), 0);
    assert_eq!(run_on(&rt, "leaves;").unwrap(), Some(8));
}

#[test]
fn test_deep_recursion_grows_the_stack() {
    let (rt, _) = runtime();
    let value = run_on(
        &rt,
        "I64 Depth(I64 n) { if (n == 0) return 0; return 1 + Depth(n - 1); }
         Depth(5000);",
    )
    .unwrap();
    assert_eq!(value, Some(5000));
    assert!(rt.trampoline().stats().switches.load(std::sync::atomic::Ordering::SeqCst) > 0);
}

#[test]
fn test_abi_mismatch_rejects_unit() {
    let (rt, _) = runtime();
    let unit = HolyCFrontend::targeting(holyc::runtime::AbiVersion { major: 2, minor: 0 })
        .compile("class B { I64 q; };")
        .unwrap();
    assert!(matches!(
        rt.load_unit(&unit),
        Err(RuntimeError::AbiVersionMismatch { .. })
    ));
}

#[test]
fn test_check_and_run_file() {
    assert!(check("I64 F( { }").is_err());
    assert_eq!(check("I64 F() { return 1; }").unwrap().functions().count(), 1);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"I64 x = 2; x * 21;\n").unwrap();
    run_file(file.path(), RuntimeConfig::default()).unwrap();

    let missing = file.path().with_extension("missing");
    let err = run_file(&missing, RuntimeConfig::default()).unwrap_err();
    assert!(err.to_string().starts_with("Failed to read file"));
}
