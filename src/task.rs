// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The GPU task and its command channel.

Graphics contexts are thread-affine on most platforms. A [`GpuTask`] owns a [`Device`] on one
dedicated thread and executes commands sent to it from any other thread, strictly in submission
order. Producers never touch the device; they submit closures which receive a [`TaskContext`].

# Submission modes

| Method | Returns |
|---|---|
| [`GpuTask::run`] with `await_reply = false` | immediately |
| [`GpuTask::run`] with `await_reply = true` | after the command finished |
| [`GpuTask::run_sync`] | after the command called [`TaskContext::notify`], or finished |
| [`GpuTask::run_scoped`] | after the command finished; may borrow from the caller |

The blocking methods have futures-returning counterparts, [`GpuTask::run_async`] and
[`GpuTask::run_sync_async`].

The early notify point exists for commands that allocate a device name: the caller only needs
the name to queue further work, and every later command is ordered after this one anyway.

# Examples

```
use imagine_gpu::capabilities::Capabilities;
use imagine_gpu::imp::SoftwareDevice;
use imagine_gpu::task::{GpuTask, TaskConfig};
use std::sync::{Arc, Mutex};

let task = GpuTask::new(TaskConfig::default(), || {
    Ok(SoftwareDevice::new(Capabilities::full()))
})
.unwrap();
let name = Arc::new(Mutex::new(None));
let move_name = name.clone();
task.run_sync(move |ctx| {
    let texture = ctx.device().create_texture().unwrap();
    *move_name.lock().unwrap() = Some(texture);
    ctx.notify();
    //slow work the caller doesn't wait for
})
.unwrap();
assert!(name.lock().unwrap().is_some());
```
*/

use crate::Error;
use crate::Priority;
use crate::capabilities::Capabilities;
use crate::device::{BufferName, Device, DeviceError, FramebufferName};
use std::panic::AssertUnwindSafe;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{JoinHandle, ThreadId};

/// Work executed on the GPU task.
pub type Command = Box<dyn FnOnce(&mut TaskContext<'_>) + Send + 'static>;

/**
Configuration for a [`GpuTask`].

```
use imagine_gpu::task::TaskConfig;
let config = TaskConfig::default()
    .with_label("renderer")
    .with_queue_capacity(16)
    .with_fatal_device_errors(false);
assert_eq!(config.label(), "renderer");
```
*/
#[derive(Debug, Clone)]
pub struct TaskConfig {
    label: String,
    priority: Priority,
    queue_capacity: usize,
    stream_buffers: usize,
    fatal_device_errors: bool,
}

impl TaskConfig {
    /// Name of the task's thread, also used in logs.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /**
    Scheduling hint for the task's thread.

    Advisory: it is recorded and logged, and reported by [`GpuTask::priority`], but std threads
    have no portable priority so the thread is not reprioritized.
    */
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /**
    Number of commands that can be pending before producers block.

    # Panics
    If `capacity` is 0.
    */
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be nonzero");
        self.queue_capacity = capacity;
        self
    }

    /// Number of reusable buffers handed out by [`TaskContext::stream_buffer`].
    pub fn with_stream_buffers(mut self, count: usize) -> Self {
        self.stream_buffers = count;
        self
    }

    /// Whether a failing device call aborts the command that made it.
    pub fn with_fatal_device_errors(mut self, fatal: bool) -> Self {
        self.fatal_device_errors = fatal;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn stream_buffers(&self) -> usize {
        self.stream_buffers
    }

    pub fn fatal_device_errors(&self) -> bool {
        self.fatal_device_errors
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        TaskConfig {
            label: "gpu_task".to_string(),
            priority: Priority::UserInitiated,
            queue_capacity: 64,
            stream_buffers: 4,
            fatal_device_errors: cfg!(debug_assertions),
        }
    }
}

/// How long [`GpuTask::draw`] waits for a draw command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawAsyncMode {
    /// Wait until the command finished, including presentation.
    #[default]
    None,
    /// Wait until the command calls [`TaskContext::notify`], typically right before presenting.
    Present,
    /// Don't wait.
    Full,
}

/// What the task owes the submitter once a command ran.
enum Reply {
    Completion(r#continue::Sender<()>),
    Notify(r#continue::Sender<()>),
}

impl Reply {
    fn send(self) {
        match self {
            Reply::Completion(sender) | Reply::Notify(sender) => sender.send(()),
        }
    }
}

struct Message {
    //dropped before the reply, so a borrowed command is gone by the time its submitter wakes
    command: Command,
    reply: Option<Reply>,
}

impl Message {
    /// Discards a message that will never run, releasing its submitter.
    fn abandon(self) {
        let Message { command, reply } = self;
        drop(command);
        if let Some(reply) = reply {
            reply.send();
        }
    }
}

/**
Access to the device from inside a command.
*/
pub struct TaskContext<'a> {
    device: &'a mut dyn Device,
    capabilities: &'a Capabilities,
    notify: Option<r#continue::Sender<()>>,
    default_framebuffer: FramebufferName,
    stream_buffers: &'a [BufferName],
    next_stream_buffer: &'a mut usize,
    fatal_device_errors: bool,
}

impl<'a> TaskContext<'a> {
    pub fn device(&mut self) -> &mut dyn Device {
        self.device
    }

    pub fn capabilities(&self) -> &Capabilities {
        self.capabilities
    }

    /**
    Releases a caller waiting in [`GpuTask::run_sync`].

    Call this once the caller has what it needs, such as a freshly allocated name. Later calls,
    and calls from commands submitted without a notify point, do nothing.
    */
    pub fn notify(&mut self) {
        if let Some(sender) = self.notify.take() {
            logwise::trace_sync!("GpuTask notify");
            sender.send(());
        }
    }

    pub fn default_framebuffer(&self) -> FramebufferName {
        self.default_framebuffer
    }

    /// Next buffer of the stream ring, for transient vertex data.
    pub fn stream_buffer(&mut self) -> Option<BufferName> {
        if self.stream_buffers.is_empty() {
            return None;
        }
        let buffer = self.stream_buffers[*self.next_stream_buffer % self.stream_buffers.len()];
        *self.next_stream_buffer = (*self.next_stream_buffer + 1) % self.stream_buffers.len();
        Some(buffer)
    }

    /**
    Runs `call` on the device, logging a failure like [`TaskContext::check`].

    ```
    # use imagine_gpu::task::TaskContext;
    fn make_name(ctx: &mut TaskContext<'_>) {
        if let Some(texture) = ctx.call(|device| device.create_texture()) {
            ctx.device().delete_texture(texture);
        }
    }
    ```
    */
    pub fn call<T>(
        &mut self,
        call: impl FnOnce(&mut dyn Device) -> Result<T, DeviceError>,
    ) -> Option<T> {
        let result = call(&mut *self.device);
        self.check(result)
    }

    /**
    Logs a failing device call.

    # Panics
    If the task was configured with fatal device errors. The panic aborts the current command
    and is caught at the command boundary.
    */
    pub fn check<T>(&self, result: Result<T, DeviceError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                logwise::error_sync!(
                    "device call {call} failed with {code}",
                    call = err.call,
                    code = err.code
                );
                if self.fatal_device_errors {
                    panic!("{err}");
                }
                None
            }
        }
    }
}

/// State living on the task's thread.
struct Executor {
    label: String,
    device: Box<dyn Device>,
    capabilities: Arc<Capabilities>,
    default_framebuffer: FramebufferName,
    stream_buffers: Vec<BufferName>,
    next_stream_buffer: usize,
    fatal_device_errors: bool,
}

impl Executor {
    fn execute(&mut self, message: Message) {
        let Message { command, reply } = message;
        let (notify, completion) = match reply {
            Some(Reply::Notify(sender)) => (Some(sender), None),
            Some(Reply::Completion(sender)) => (None, Some(sender)),
            None => (None, None),
        };
        let mut context = TaskContext {
            device: self.device.as_mut(),
            capabilities: &self.capabilities,
            notify,
            default_framebuffer: self.default_framebuffer,
            stream_buffers: &self.stream_buffers,
            next_stream_buffer: &mut self.next_stream_buffer,
            fatal_device_errors: self.fatal_device_errors,
        };
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| command(&mut context)));
        if result.is_err() {
            logwise::error_sync!(
                "command on {label} panicked",
                label = logwise::privacy::LogIt(&self.label)
            );
        }
        //a command may return (or unwind) without reaching its notify point
        context.notify();
        if let Some(sender) = completion {
            sender.send(());
        }
    }

    fn run(mut self, receiver: Receiver<Message>) {
        //returns once every producer handle is gone and the queue has drained
        while let Ok(message) = receiver.recv() {
            self.execute(message);
        }
        for buffer in self.stream_buffers.drain(..) {
            self.device.delete_buffer(buffer);
        }
        logwise::info_sync!(
            "GpuTask {label} stopped",
            label = logwise::privacy::LogIt(&self.label)
        );
    }
}

struct Startup {
    capabilities: Arc<Capabilities>,
}

fn start_device<D, F>(config: &TaskConfig, make_device: F) -> Result<(Executor, Startup), DeviceError>
where
    D: Device,
    F: FnOnce() -> Result<D, DeviceError>,
{
    let mut device = make_device()?;
    device.make_current()?;
    let capabilities = Arc::new(device.capabilities());
    let default_framebuffer = device.default_framebuffer();
    let mut stream_buffers = Vec::with_capacity(config.stream_buffers);
    for _ in 0..config.stream_buffers {
        stream_buffers.push(device.create_buffer()?);
    }
    let executor = Executor {
        label: config.label.clone(),
        device: Box::new(device),
        capabilities: capabilities.clone(),
        default_framebuffer,
        stream_buffers,
        next_stream_buffer: 0,
        fatal_device_errors: config.fatal_device_errors,
    };
    Ok((executor, Startup { capabilities }))
}

pub(crate) struct Inner {
    sender: Mutex<Option<SyncSender<Message>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    capabilities: Arc<Capabilities>,
    label: String,
    priority: Priority,
}

impl Inner {
    fn on_task_thread(&self) -> bool {
        std::thread::current().id() == self.thread_id
    }

    fn send(&self, message: Message) -> Result<(), Error> {
        let sender = match self.sender.lock().unwrap().clone() {
            Some(sender) => sender,
            None => {
                message.abandon();
                return Err(Error::TaskClosed);
            }
        };
        if self.on_task_thread() {
            //the task can't wait on its own queue
            match sender.try_send(message) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(message)) => {
                    logwise::warn_sync!(
                        "GpuTask {label} queue is full; refusing a command submitted from the task",
                        label = logwise::privacy::LogIt(&self.label)
                    );
                    message.abandon();
                    Err(Error::QueueFull)
                }
                Err(TrySendError::Disconnected(message)) => {
                    message.abandon();
                    Err(Error::TaskClosed)
                }
            }
        } else {
            sender.send(message).map_err(|err| {
                err.0.abandon();
                Error::TaskClosed
            })
        }
    }

    fn shutdown(&self) {
        let sender = self.sender.lock().unwrap().take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        if self.on_task_thread() {
            //the loop exits by itself once the current command returns
            return;
        }
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                logwise::error_sync!(
                    "GpuTask {label} thread panicked",
                    label = logwise::privacy::LogIt(&self.label)
                );
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/**
A handle to a thread that owns a [`Device`].

Handles are cheap to clone. The task shuts down once [`GpuTask::shutdown`] is called or the last
handle is dropped; pending commands run first.
*/
#[derive(Clone)]
pub struct GpuTask {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for GpuTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTask")
            .field("label", &self.inner.label)
            .field("priority", &self.inner.priority)
            .finish()
    }
}

impl GpuTask {
    /**
    Spawns the task's thread and creates the device on it.

    `make_device` runs on the new thread, so the device never crosses threads. Returns once the
    device is current and its capabilities are known.
    */
    pub fn new<D, F>(config: TaskConfig, make_device: F) -> Result<GpuTask, Error>
    where
        D: Device,
        F: FnOnce() -> Result<D, DeviceError> + Send + 'static,
    {
        let (sender, receiver) = std::sync::mpsc::sync_channel::<Message>(config.queue_capacity);
        let (startup_sender, startup_receiver) =
            std::sync::mpsc::sync_channel::<Result<Startup, DeviceError>>(1);
        let thread_config = config.clone();
        let handle = std::thread::Builder::new()
            .name(config.label.clone())
            .spawn(move || {
                let context = logwise::context::Context::new_task(None, "GpuTask".to_string());
                context.set_current();
                logwise::info_sync!(
                    "GpuTask {label} starting with priority {priority}",
                    label = logwise::privacy::LogIt(&thread_config.label),
                    priority = logwise::privacy::LogIt(&thread_config.priority)
                );
                match start_device(&thread_config, make_device) {
                    Ok((executor, startup)) => {
                        if startup_sender.send(Ok(startup)).is_ok() {
                            executor.run(receiver);
                        }
                    }
                    Err(err) => {
                        logwise::error_sync!(
                            "GpuTask device setup failed: {err}",
                            err = logwise::privacy::LogIt(&err)
                        );
                        let _ = startup_sender.send(Err(err));
                    }
                }
            })?;
        let thread_id = handle.thread().id();
        let startup = match startup_receiver.recv() {
            Ok(Ok(startup)) => startup,
            Ok(Err(err)) => {
                let _ = handle.join();
                return Err(Error::Device(err));
            }
            Err(_) => {
                //thread died before reporting
                let _ = handle.join();
                return Err(Error::TaskClosed);
            }
        };
        Ok(GpuTask {
            inner: Arc::new(Inner {
                sender: Mutex::new(Some(sender)),
                thread: Mutex::new(Some(handle)),
                thread_id,
                capabilities: startup.capabilities,
                label: config.label,
                priority: config.priority,
            }),
        })
    }

    /// Capabilities of the device, queried on the task's thread at startup.
    pub fn capabilities(&self) -> &Capabilities {
        &self.inner.capabilities
    }

    pub(crate) fn shared_capabilities(&self) -> Arc<Capabilities> {
        self.inner.capabilities.clone()
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    /// Whether the caller is running on the task's thread, i.e. inside a command.
    pub fn is_task_thread(&self) -> bool {
        self.inner.on_task_thread()
    }

    pub(crate) fn downgrade(&self) -> WeakTask {
        WeakTask {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn submit(
        &self,
        command: Command,
        notify: bool,
    ) -> Result<impl Future<Output = ()> + use<>, Error> {
        if self.inner.on_task_thread() {
            return Err(Error::WouldDeadlock);
        }
        let (sender, future) = r#continue::continuation();
        let reply = if notify {
            Reply::Notify(sender)
        } else {
            Reply::Completion(sender)
        };
        self.inner.send(Message {
            command,
            reply: Some(reply),
        })?;
        Ok(future)
    }

    fn wait(&self, future: impl Future<Output = ()>) {
        let interval = logwise::perfwarn_begin!("GpuTask wait");
        test_executors::sleep_on(future);
        drop(interval);
    }

    /**
    Enqueues `command`.

    With `await_reply`, blocks until the command finished. Otherwise returns right away, and
    anything the command needs must be moved into it.

    # Errors
    [`Error::TaskClosed`] after shutdown. [`Error::WouldDeadlock`] when awaiting from the task's
    own thread. [`Error::QueueFull`] when the task's own thread submits to a full queue.
    */
    pub fn run<F>(&self, command: F, await_reply: bool) -> Result<(), Error>
    where
        F: FnOnce(&mut TaskContext<'_>) + Send + 'static,
    {
        if await_reply {
            let future = self.submit(Box::new(command), false)?;
            self.wait(future);
            Ok(())
        } else {
            self.inner.send(Message {
                command: Box::new(command),
                reply: None,
            })
        }
    }

    /**
    Enqueues `command` and blocks until it calls [`TaskContext::notify`] or finishes.
    */
    pub fn run_sync<F>(&self, command: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TaskContext<'_>) + Send + 'static,
    {
        let future = self.submit(Box::new(command), true)?;
        self.wait(future);
        Ok(())
    }

    /**
    Enqueues a command that borrows from the caller, and blocks until it finished.
    */
    pub fn run_scoped<'s, F>(&self, command: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TaskContext<'_>) + Send + 's,
    {
        let command: Box<dyn FnOnce(&mut TaskContext<'_>) + Send + 's> = Box::new(command);
        //the command runs (or is dropped) before its completion is sent, and we wait for that
        //completion before returning, so its borrows outlive it.
        let command: Command = unsafe {
            std::mem::transmute::<Box<dyn FnOnce(&mut TaskContext<'_>) + Send + 's>, Command>(
                command,
            )
        };
        let future = self.submit(command, false)?;
        self.wait(future);
        Ok(())
    }

    /// Enqueues `command`; the future resolves when it finished.
    pub fn run_async<F>(&self, command: F) -> impl Future<Output = Result<(), Error>> + use<F>
    where
        F: FnOnce(&mut TaskContext<'_>) + Send + 'static,
    {
        let submitted = self.submit(Box::new(command), false);
        async move {
            submitted?.await;
            Ok(())
        }
    }

    /// Enqueues `command`; the future resolves at its notify point.
    pub fn run_sync_async<F>(
        &self,
        command: F,
    ) -> impl Future<Output = Result<(), Error>> + use<F>
    where
        F: FnOnce(&mut TaskContext<'_>) + Send + 'static,
    {
        let submitted = self.submit(Box::new(command), true);
        async move {
            submitted?.await;
            Ok(())
        }
    }

    /// Enqueues a draw command, waiting according to `mode`.
    pub fn draw<F>(&self, mode: DrawAsyncMode, command: F) -> Result<(), Error>
    where
        F: FnOnce(&mut TaskContext<'_>) + Send + 'static,
    {
        match mode {
            DrawAsyncMode::None => self.run(command, true),
            DrawAsyncMode::Present => self.run_sync(command),
            DrawAsyncMode::Full => self.run(command, false),
        }
    }

    /**
    Stops accepting commands, lets the queue drain and joins the thread.

    From the task's own thread this only stops accepting commands; the thread exits after the
    current command.
    */
    pub fn shutdown(&self) {
        logwise::info_sync!(
            "GpuTask {label} shutting down",
            label = logwise::privacy::LogIt(&self.inner.label)
        );
        self.inner.shutdown();
    }
}

/// A handle that doesn't keep the task alive.
#[derive(Clone, Debug)]
pub(crate) struct WeakTask {
    inner: Weak<Inner>,
}

impl WeakTask {
    pub(crate) fn upgrade(&self) -> Option<GpuTask> {
        self.inner.upgrade().map(|inner| GpuTask { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::SoftwareDevice;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn task(config: TaskConfig) -> GpuTask {
        GpuTask::new(config, || Ok(SoftwareDevice::new(Capabilities::full()))).unwrap()
    }

    #[test]
    fn stream_buffers_rotate() {
        let task = task(TaskConfig::default().with_stream_buffers(2));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let move_seen = seen.clone();
        task.run(
            move |ctx| {
                for _ in 0..3 {
                    move_seen.lock().unwrap().push(ctx.stream_buffer());
                }
            },
            true,
        )
        .unwrap();
        let seen = seen.lock().unwrap();
        assert!(seen[0].is_some());
        assert_ne!(seen[0], seen[1]);
        assert_eq!(seen[0], seen[2]);
    }

    #[test]
    fn panicking_command_still_completes() {
        let task = task(TaskConfig::default());
        task.run(|_| panic!("boom"), true).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let move_ran = ran.clone();
        task.run(
            move |_| {
                move_ran.fetch_add(1, Ordering::Relaxed);
            },
            true,
        )
        .unwrap();
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn blocking_from_task_thread_is_refused() {
        let task = task(TaskConfig::default());
        let result = Arc::new(Mutex::new(None));
        let move_result = result.clone();
        let move_task = task.clone();
        task.run(
            move |_| {
                *move_result.lock().unwrap() = Some(move_task.run(|_| {}, true));
            },
            true,
        )
        .unwrap();
        assert!(matches!(
            result.lock().unwrap().take(),
            Some(Err(Error::WouldDeadlock))
        ));
    }

    #[test]
    fn full_queue_refuses_submissions_from_task_thread() {
        let task = task(TaskConfig::default().with_queue_capacity(1));
        let ran = Arc::new(AtomicUsize::new(0));
        let results = Arc::new(Mutex::new(Vec::new()));
        let move_ran = ran.clone();
        let move_results = results.clone();
        let move_task = task.clone();
        task.run(
            move |_| {
                for _ in 0..3 {
                    let ran = move_ran.clone();
                    let result = move_task.run(
                        move |_| {
                            ran.fetch_add(1, Ordering::Relaxed);
                        },
                        false,
                    );
                    move_results.lock().unwrap().push(result);
                }
            },
            true,
        )
        .unwrap();
        //ordered after the command that was queued
        task.run(|_| {}, true).unwrap();
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::QueueFull)));
        assert!(matches!(results[2], Err(Error::QueueFull)));
        assert_eq!(ran.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn scoped_command_borrows() {
        let task = task(TaskConfig::default());
        let mut local = 0;
        task.run_scoped(|_| local += 1).unwrap();
        assert_eq!(local, 1);
    }

    #[test]
    fn failed_setup_reports_device_error() {
        let result = GpuTask::new(TaskConfig::default(), || {
            Err::<SoftwareDevice, _>(DeviceError::new("create_context", 0x3000))
        });
        assert!(matches!(
            result,
            Err(Error::Device(DeviceError {
                call: "create_context",
                ..
            }))
        ));
    }
}
