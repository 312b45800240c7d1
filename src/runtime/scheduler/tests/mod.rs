//! Scheduler 单元测试
//!
//! 测试任务派生、作业队列、结果获取和 SpawnWaitAll 屏障


use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::runtime::error::RuntimeError;
use crate::runtime::except::{throw, try_catch};
use crate::runtime::scheduler::{
    EntryFn, JobFlags, Scheduler, SchedulerConfig, SchedulerError, SpawnRequest, TaskFlags,
    TaskId, TaskOutcome, TaskState,
};

fn scheduler(cpus: usize) -> Arc<Scheduler> {
    Arc::new(
        Scheduler::new(SchedulerConfig {
            cpus,
            default_stack_size: 256 * 1024,
            worker_stack_size: 256 * 1024,
        })
        .unwrap(),
    )
}

fn entry(f: impl Fn(i64) -> i64 + Send + Sync + 'static) -> EntryFn {
    Arc::new(f)
}

#[cfg(test)]
mod task_state_tests {
    use super::*;

    #[test]
    fn test_task_state_round_trips_through_u8() {
        for state in [
            TaskState::Ready,
            TaskState::Running,
            TaskState::Finished,
            TaskState::Failed,
        ] {
            assert_eq!(TaskState::from_u8(state.as_u8()), state);
        }
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Running.is_terminal());
    }

    #[test]
    fn test_task_flags_contains() {
        let flags = TaskFlags::DAEMON | TaskFlags(1 << 4);
        assert!(flags.contains(TaskFlags::DAEMON));
        assert!(!TaskFlags::NONE.contains(TaskFlags::DAEMON));
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(7).to_string(), "Task(7)");
    }
}

#[cfg(test)]
mod spawn_tests {
    use super::*;

    #[test]
    fn test_spawn_and_join() {
        let scheduler = scheduler(2);
        let handle = scheduler
            .spawn(SpawnRequest::from_fn(|data| data * 2).data(21))
            .unwrap();
        assert_eq!(handle.join(), TaskOutcome::Completed(42));
        assert!(scheduler.tasks().is_empty());
    }

    #[test]
    fn test_task_runs_on_named_thread() {
        let scheduler = scheduler(1);
        let handle = scheduler
            .spawn(
                SpawnRequest::from_fn(|_| {
                    (thread::current().name() == Some("worker-a")) as i64
                })
                .name("worker-a"),
            )
            .unwrap();
        assert_eq!(handle.task().name(), "worker-a");
        assert_eq!(handle.join(), TaskOutcome::Completed(1));
    }

    #[test]
    fn test_invalid_cpu_is_rejected() {
        let scheduler = scheduler(2);
        let err = scheduler
            .spawn(SpawnRequest::from_fn(|_| 0).cpu(2))
            .unwrap_err();
        assert_eq!(err, SchedulerError::InvalidCpu { cpu: 2, cpus: 2 });
        assert_eq!(scheduler.stats().tasks_spawned.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tiny_stack_is_rejected() {
        let scheduler = scheduler(1);
        let err = scheduler
            .spawn(SpawnRequest::from_fn(|_| 0).stack_size(512))
            .unwrap_err();
        assert_eq!(err, SchedulerError::InvalidStackSize(512));
    }

    #[test]
    fn test_uncaught_throw_fails_only_that_task() {
        let scheduler = scheduler(1);
        let failing = scheduler
            .spawn(SpawnRequest::from_fn(|_| throw(0x55)))
            .unwrap();
        let healthy = scheduler.spawn(SpawnRequest::from_fn(|_| 3)).unwrap();

        assert_eq!(
            failing.join(),
            TaskOutcome::Failed(RuntimeError::UnhandledException { payload: 0x55 })
        );
        assert_eq!(healthy.join(), TaskOutcome::Completed(3));
        assert_eq!(scheduler.stats().tasks_failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_caught_throw_inside_task() {
        let scheduler = scheduler(1);
        let handle = scheduler
            .spawn(SpawnRequest::from_fn(|_| try_catch(|| -> i64 { throw(9) }, |payload| payload + 1)))
            .unwrap();
        assert_eq!(handle.join(), TaskOutcome::Completed(10));
    }

    #[test]
    fn test_parent_defaults_to_spawning_task() {
        let scheduler = scheduler(1);
        let inner = scheduler.clone();
        let parent = scheduler
            .spawn(SpawnRequest::from_fn(move |_| {
                let child = inner
                    .spawn(SpawnRequest::from_fn(|_| 0).flags(TaskFlags::DAEMON))
                    .unwrap();
                child.task().parent().map(|id| id.0 as i64).unwrap_or(-1)
            }))
            .unwrap();
        let parent_id = parent.id();
        assert_eq!(parent.join(), TaskOutcome::Completed(parent_id.0 as i64));
    }

    #[test]
    fn test_root_spawn_has_no_parent_unless_given() {
        let scheduler = scheduler(1);
        let orphan = scheduler.spawn(SpawnRequest::from_fn(|_| 0)).unwrap();
        assert_eq!(orphan.task().parent(), None);
        let adopted = scheduler
            .spawn(SpawnRequest::from_fn(|_| 0).parent(orphan.id()))
            .unwrap();
        assert_eq!(adopted.task().parent(), Some(orphan.id()));
        assert_eq!(scheduler.tasks().children(orphan.id()), vec![adopted.id()]);
        adopted.join();
        orphan.join();
    }

    #[test]
    fn test_daemon_task_is_reaped_on_exit() {
        let scheduler = scheduler(1);
        let handle = scheduler
            .spawn(SpawnRequest::from_fn(|_| 1).flags(TaskFlags::DAEMON))
            .unwrap();
        let id = handle.id();
        assert_eq!(handle.task().wait(), TaskOutcome::Completed(1));
        scheduler.spawn_wait_all().unwrap();
        assert!(scheduler.tasks().get(id).is_none());
    }
}

#[cfg(test)]
mod job_tests {
    use super::*;

    #[test]
    fn test_job_result_is_idempotent_and_runs_once() {
        let scheduler = scheduler(2);
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = scheduler
            .job_que(
                entry(move |arg| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    arg + 1
                }),
                41,
                Some(1),
                JobFlags::default(),
            )
            .unwrap();

        assert_eq!(scheduler.job_res_get(&handle), Ok(42));
        assert_eq!(scheduler.job_res_get(&handle), Ok(42));
        assert_eq!(handle.try_result(), Some(Ok(42)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(handle.cpu(), 1);
    }

    #[test]
    fn test_many_waiters_all_unblock() {
        let scheduler = scheduler(1);
        let handle = scheduler
            .job_que(
                entry(|_| {
                    thread::sleep(Duration::from_millis(20));
                    7
                }),
                0,
                None,
                JobFlags::default(),
            )
            .unwrap();

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || handle.result())
            })
            .collect();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Ok(7));
        }
    }

    #[test]
    fn test_nested_job_on_single_cpu_does_not_deadlock() {
        let scheduler = scheduler(1);
        let inner = scheduler.clone();
        let handle = scheduler
            .job_que(
                entry(move |arg| {
                    let nested = inner
                        .job_que(entry(|y| y + 1), arg, None, JobFlags::default())
                        .unwrap();
                    inner.job_res_get(&nested).unwrap() * 2
                }),
                20,
                None,
                JobFlags::default(),
            )
            .unwrap();

        assert_eq!(scheduler.job_res_get(&handle), Ok(42));
        scheduler.spawn_wait_all().unwrap();
        assert_eq!(scheduler.stats().jobs_completed.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.stats().in_flight(), 0);
    }

    #[test]
    fn test_nested_job_failure_reaches_the_waiting_job() {
        let scheduler = scheduler(1);
        let inner = scheduler.clone();
        let handle = scheduler
            .job_que(
                entry(move |_| {
                    let nested = inner
                        .job_que(entry(|_| throw(9)), 0, Some(0), JobFlags::default())
                        .unwrap();
                    match inner.job_res_get(&nested) {
                        Err(RuntimeError::UnhandledException { payload }) => payload,
                        _ => -1,
                    }
                }),
                0,
                Some(0),
                JobFlags::default(),
            )
            .unwrap();

        assert_eq!(handle.result(), Ok(9));
        scheduler.spawn_wait_all().unwrap();
        assert_eq!(scheduler.stats().jobs_failed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_job_throw_is_recorded() {
        let scheduler = scheduler(1);
        let handle = scheduler
            .job_que(entry(|_| throw(3)), 0, None, JobFlags::default())
            .unwrap();
        assert_eq!(
            handle.result(),
            Err(RuntimeError::UnhandledException { payload: 3 })
        );
        // The worker survives the failed job.
        let next = scheduler
            .job_que(entry(|arg| arg), 5, Some(0), JobFlags::default())
            .unwrap();
        assert_eq!(next.result(), Ok(5));
    }

    #[test]
    fn test_job_invalid_cpu() {
        let scheduler = scheduler(1);
        let err = scheduler
            .job_que(entry(|_| 0), 0, Some(4), JobFlags::default())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidCpu { cpu: 4, .. }));
    }

    #[test]
    fn test_job_after_shutdown() {
        let scheduler = scheduler(1);
        scheduler.shutdown();
        let err = scheduler
            .job_que(entry(|_| 0), 0, None, JobFlags::default())
            .unwrap_err();
        assert_eq!(err, SchedulerError::ShutDown);
        assert!(!scheduler.is_running());
    }
}

#[cfg(test)]
mod wait_all_tests {
    use super::*;

    #[test]
    fn test_wait_all_covers_nested_work() {
        let scheduler = scheduler(2);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let inner = scheduler.clone();
            let done = done.clone();
            scheduler
                .spawn(SpawnRequest::from_fn(move |_| {
                    for cpu in 0..2 {
                        let done = done.clone();
                        inner
                            .job_que(
                                entry(move |_| {
                                    thread::sleep(Duration::from_millis(5));
                                    done.fetch_add(1, Ordering::SeqCst);
                                    0
                                }),
                                0,
                                Some(cpu),
                                JobFlags::default(),
                            )
                            .unwrap();
                    }
                    let done = done.clone();
                    inner
                        .spawn(
                            SpawnRequest::from_fn(move |_| {
                                thread::sleep(Duration::from_millis(10));
                                done.fetch_add(1, Ordering::SeqCst);
                                0
                            })
                            .flags(TaskFlags::DAEMON),
                        )
                        .unwrap();
                    0
                }).flags(TaskFlags::DAEMON))
                .unwrap();
        }

        scheduler.spawn_wait_all().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 4 * 3);
    }

    #[test]
    fn test_wait_all_inside_task_is_an_error() {
        let scheduler = scheduler(1);
        let inner = scheduler.clone();
        let handle = scheduler
            .spawn(SpawnRequest::from_fn(move |_| {
                (inner.spawn_wait_all() == Err(SchedulerError::BarrierInsideWorker)) as i64
            }))
            .unwrap();
        assert_eq!(handle.join(), TaskOutcome::Completed(1));
    }

    #[test]
    fn test_wait_all_with_nothing_outstanding() {
        let scheduler = scheduler(1);
        scheduler.spawn_wait_all().unwrap();
        assert_eq!(scheduler.stats().in_flight(), 0);
    }
}
