//! 运行时上下文对象测试

use std::sync::Arc;

use crate::frontend::{Frontend, HolyCFrontend};
use crate::runtime::output::CaptureSink;
use crate::runtime::reflect::{member_meta_data, HashEntry, HashKind, HashTables, FunctionEntry};
use crate::runtime::scheduler::{SchedulerConfig, SpawnRequest, TaskOutcome};
use crate::runtime::{AbiVersion, Runtime, RuntimeConfig, RuntimeError};

fn runtime() -> (Runtime, CaptureSink) {
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
    (runtime, output)
}

#[cfg(test)]
mod abi_tests {
    use super::*;

    #[test]
    fn test_same_major_is_accepted() {
        let (rt, _) = runtime();
        assert_eq!(rt.abi_version(), AbiVersion::CURRENT);
        assert!(rt
            .check_abi(AbiVersion {
                major: AbiVersion::CURRENT.major,
                minor: 0,
            })
            .is_ok());
        assert_eq!(AbiVersion::CURRENT.to_string(), "1.2");
    }

    #[test]
    fn test_load_unit_rejects_other_major() {
        let (rt, _) = runtime();
        let expected = AbiVersion { major: 9, minor: 0 };
        let unit = HolyCFrontend::new()
            .compile("class C { I64 a; };")
            .unwrap()
            .with_expected_abi(expected);
        assert_eq!(
            rt.load_unit(&unit),
            Err(RuntimeError::AbiVersionMismatch {
                runtime: AbiVersion::CURRENT,
                expected,
            })
        );
        assert_eq!(rt.reflection().field_count(), 0);
    }
}

#[cfg(test)]
mod load_tests {
    use super::*;

    #[test]
    fn test_classes_register_tables_and_hash_entries() {
        let (rt, _) = runtime();
        let unit = HolyCFrontend::new()
            .compile("class CPoint { I64 x format \"%d\" data 5; U8 *name; };")
            .unwrap();
        rt.load_unit(&unit).unwrap();

        assert_eq!(rt.reflection().field_count(), 2);
        let entry = rt
            .hash_find("CPoint", HashTables::GLOBAL, HashKind::Class)
            .unwrap();
        let class = entry.as_class().unwrap();
        assert_eq!(class.members.len(), 2);
        assert_eq!(class.members[0].field(), "x");
        assert_eq!(member_meta_data("format", &class.members[0]), Some("%d"));
        assert_eq!(member_meta_data("data", &class.members[0]), Some("5"));
        assert_eq!(class.members[1].ty(), "U8 *");
        assert!(rt.hash_find("CPoint", HashTables::GLOBAL, HashKind::Function).is_none());
    }
}

#[cfg(test)]
mod output_tests {
    use super::*;

    #[test]
    fn test_print_formatted_reads_heap_strings() {
        let (rt, output) = runtime();
        let name = rt.alloc_string("world").unwrap() as i64;
        rt.print_formatted("hello %s, %d%%\n", &[name, 100]);
        rt.put_chars('!' as i64);
        rt.print_string("\n");
        assert_eq!(output.take(), "hello world, 100%\n!\n");
    }

    #[test]
    fn test_read_c_string_stops_at_nul() {
        let (rt, _) = runtime();
        let addr = rt.allocate(8).unwrap();
        rt.memory().write(addr, b"ab\0cd").unwrap();
        assert_eq!(rt.read_c_string(addr as i64).as_deref(), Some("ab"));
        assert_eq!(rt.read_c_string(-1), None);
        assert_eq!(rt.read_c_string(0x10), None);
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;

    #[test]
    fn test_exhausted_heap_is_resource_exhaustion() {
        let config = RuntimeConfig {
            scheduler: SchedulerConfig {
                cpus: 1,
                default_stack_size: 256 * 1024,
                worker_stack_size: 256 * 1024,
            },
            heap_limit: 64,
            ..RuntimeConfig::default()
        };
        let rt = Runtime::with_output(config, Arc::new(CaptureSink::new())).unwrap();
        let addr = rt.allocate(60).unwrap();
        assert!(matches!(
            rt.allocate(16),
            Err(RuntimeError::ResourceExhaustion { .. })
        ));
        rt.release(addr).unwrap();
        assert!(matches!(rt.release(addr), Err(RuntimeError::Memory(_))));
        assert!(rt.allocate(16).is_ok());
    }
}

#[cfg(test)]
mod spawn_tests {
    use super::*;

    #[test]
    fn test_invalid_spawn_is_a_null_handle() {
        let (rt, _) = runtime();
        assert!(rt.spawn(SpawnRequest::from_fn(|x| x).cpu(7)).is_none());
        assert!(rt
            .job_que(Arc::new(|x| x), 0, Some(3), Default::default())
            .is_none());
    }

    #[test]
    fn test_hc_task_spawn_by_name() {
        let (rt, _) = runtime();
        assert!(rt.hc_task_spawn("Nobody").is_none());

        rt.hash().add(
            HashTables::GLOBAL,
            HashEntry::Function(FunctionEntry {
                name: Arc::from("Seven"),
                arity: 1,
                call: Arc::new(|args: &[i64]| args[0] + 7),
            }),
        );
        let handle = rt.hc_task_spawn("Seven").unwrap();
        assert_eq!(handle.task().name(), "Seven");
        assert_eq!(handle.join(), TaskOutcome::Completed(7));
        rt.spawn_wait_all().unwrap();
    }

    #[test]
    fn test_shutdown_refuses_new_work() {
        let (rt, _) = runtime();
        rt.shutdown();
        assert!(rt.spawn(SpawnRequest::from_fn(|x| x)).is_none());
        assert!(rt.job_que(Arc::new(|x| x), 0, None, Default::default()).is_none());
    }
}
