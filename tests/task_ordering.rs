// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Ordering and waiting guarantees of the GPU task.

use imagine_gpu::Error;
use imagine_gpu::capabilities::Capabilities;
use imagine_gpu::imp::{Journal, SoftwareDevice};
use imagine_gpu::task::{DrawAsyncMode, GpuTask, TaskConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn task() -> GpuTask {
    GpuTask::new(TaskConfig::default().with_label("ordering"), || {
        Ok(SoftwareDevice::new(Capabilities::full()))
    })
    .unwrap()
}

#[test]
fn commands_run_in_submission_order() {
    let task = task();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for i in 0..100 {
        let seen = seen.clone();
        task.run(move |_| seen.lock().unwrap().push(i), false)
            .unwrap();
    }
    task.run(|_| {}, true).unwrap();
    assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
}

#[test]
fn commands_from_many_threads_run_on_one_thread() {
    let task = task();
    let threads = Arc::new(Mutex::new(Vec::new()));
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let task = task.clone();
            let threads = threads.clone();
            std::thread::spawn(move || {
                for _ in 0..10 {
                    let threads = threads.clone();
                    task.run(
                        move |_| threads.lock().unwrap().push(std::thread::current().id()),
                        false,
                    )
                    .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    task.run(|_| {}, true).unwrap();
    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 40);
    assert!(threads.iter().all(|id| *id == threads[0]));
    assert_ne!(threads[0], std::thread::current().id());
}

#[test]
fn run_sync_returns_at_notify() {
    let task = task();
    let (release, gate) = mpsc::channel::<()>();
    let finished = Arc::new(AtomicBool::new(false));
    let move_finished = finished.clone();
    task.run_sync(move |ctx| {
        ctx.notify();
        //held until the caller has observed the early return
        gate.recv().unwrap();
        move_finished.store(true, Ordering::SeqCst);
    })
    .unwrap();
    assert!(!finished.load(Ordering::SeqCst));
    release.send(()).unwrap();
    task.run(|_| {}, true).unwrap();
    assert!(finished.load(Ordering::SeqCst));
}

#[test]
fn run_sync_without_notify_waits_for_completion() {
    let task = task();
    let finished = Arc::new(AtomicBool::new(false));
    let move_finished = finished.clone();
    task.run_sync(move |_| {
        std::thread::sleep(Duration::from_millis(20));
        move_finished.store(true, Ordering::SeqCst);
    })
    .unwrap();
    assert!(finished.load(Ordering::SeqCst));
}

#[test]
fn awaited_run_observes_side_effects() {
    let task = task();
    let value = Arc::new(Mutex::new(0));
    let move_value = value.clone();
    task.run(
        move |_| {
            std::thread::sleep(Duration::from_millis(20));
            *move_value.lock().unwrap() = 7;
        },
        true,
    )
    .unwrap();
    assert_eq!(*value.lock().unwrap(), 7);
}

#[test]
fn present_draw_returns_before_presenting() {
    let task = task();
    let (release, gate) = mpsc::channel::<()>();
    let presented = Arc::new(AtomicBool::new(false));
    let move_presented = presented.clone();
    task.draw(DrawAsyncMode::Present, move |ctx| {
        ctx.notify();
        gate.recv().unwrap();
        move_presented.store(true, Ordering::SeqCst);
    })
    .unwrap();
    assert!(!presented.load(Ordering::SeqCst));
    release.send(()).unwrap();
    task.draw(DrawAsyncMode::None, |_| {}).unwrap();
    assert!(presented.load(Ordering::SeqCst));
}

#[test]
fn async_submissions_resolve_in_order() {
    let task = task();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let first_seen = seen.clone();
    let second_seen = seen.clone();
    let first = task.run_async(move |_| first_seen.lock().unwrap().push(1));
    let second = task.run_sync_async(move |ctx| {
        ctx.notify();
        second_seen.lock().unwrap().push(2);
    });
    let (first, second) = test_executors::sleep_on(futures::future::join(first, second));
    first.unwrap();
    second.unwrap();
    task.run(|_| {}, true).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}

#[test]
fn shutdown_drains_queue_then_refuses() {
    let task = task();
    let ran = Arc::new(AtomicBool::new(false));
    let move_ran = ran.clone();
    task.run(
        move |_| {
            std::thread::sleep(Duration::from_millis(20));
            move_ran.store(true, Ordering::SeqCst);
        },
        false,
    )
    .unwrap();
    task.shutdown();
    assert!(ran.load(Ordering::SeqCst));
    assert!(matches!(task.run(|_| {}, false), Err(Error::TaskClosed)));
    assert!(matches!(task.run_sync(|_| {}), Err(Error::TaskClosed)));
    let future = task.run_async(|_| {});
    assert!(matches!(
        test_executors::sleep_on(future),
        Err(Error::TaskClosed)
    ));
}

#[test]
fn device_calls_stay_on_task_thread() {
    let journal = Journal::new();
    let device_journal = journal.clone();
    let task = GpuTask::new(TaskConfig::default().with_stream_buffers(0), move || {
        Ok(SoftwareDevice::with_journal(
            Capabilities::full(),
            device_journal,
        ))
    })
    .unwrap();
    let task_thread = Arc::new(Mutex::new(None));
    let move_thread = task_thread.clone();
    task.run(
        move |ctx| {
            *move_thread.lock().unwrap() = Some(std::thread::current().id());
            if let Some(texture) = ctx.call(|device| device.create_texture()) {
                ctx.device().delete_texture(texture);
            }
        },
        true,
    )
    .unwrap();
    let task_thread = task_thread.lock().unwrap().unwrap();
    let entries = journal.entries();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|entry| entry.thread == task_thread));
}

#[test]
fn failing_device_call_is_reported_without_poisoning_task() {
    let journal = Journal::new();
    let device_journal = journal.clone();
    let task = GpuTask::new(
        TaskConfig::default()
            .with_stream_buffers(0)
            .with_fatal_device_errors(false),
        move || {
            Ok(SoftwareDevice::with_journal(
                Capabilities::full(),
                device_journal,
            ))
        },
    )
    .unwrap();
    journal.fail_next("create_texture");
    let results = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let results = results.clone();
        task.run(
            move |ctx| {
                let name = ctx.call(|device| device.create_texture());
                results.lock().unwrap().push(name.is_some());
            },
            true,
        )
        .unwrap();
    }
    assert_eq!(*results.lock().unwrap(), vec![false, true]);
}
