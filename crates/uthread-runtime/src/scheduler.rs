//! Scheduler implementation
//!
//! One scheduler per OS thread, created lazily by the first [`create`] or
//! explicitly by [`init`]. Every thread record lives in exactly one queue:
//!
//! - `ready`: runnable threads; the front is the thread currently running
//! - `blocked`: threads suspended in [`join`]
//! - `zombie`: exited threads whose return value nobody has collected yet
//!
//! Queue mutations happen with the preemption tick masked. A switch always
//! happens masked as well; the resumed side unmasks once it is back on its
//! own stack.
//!
//! # Caveat
//!
//! A tick may switch away from a thread that is inside the allocator or
//! holds the stdout lock. Threads share one OS thread, so the next thread
//! touching the same non-reentrant resource deadlocks or panics. Runtime
//! bookkeeping and `kprint` output are masked; user code that allocates in
//! hot loops should run with preemption disabled or hold a
//! [`PreemptGuard`](crate::preempt::PreemptGuard).

use crate::config::RuntimeConfig;
use crate::context::{self, Context};
use crate::memory::Stack;
use crate::preempt::{self, PreemptError, PreemptGuard};
use crate::tls;

use uthread_core::error::{QueueError, SchedError, SchedResult};
use uthread_core::id::Tid;
use uthread_core::kprint::{self, LogLevel, OutputGuard};
use uthread_core::queue::{AllocError, Queue};
use uthread_core::state::ThreadState;
use uthread_core::{kdebug, kerror, ktrace, kwarn};

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::process;

/// Body of a created thread
type Entry = Box<dyn FnOnce() -> i32>;

/// Per-thread bookkeeping
#[derive(Debug)]
pub struct ThreadRecord {
    tid: Tid,
    state: ThreadState,
    context: Context,
    /// None for the initial thread, which runs on the OS thread's own stack
    stack: Option<Stack>,
    /// Target of a pending join
    joining: Option<Tid>,
    /// Value delivered to this thread by the thread it joined
    join_result: Option<i32>,
    retval: Option<i32>,
}

impl ThreadRecord {
    fn new(tid: Tid, context: Context, stack: Option<Stack>) -> Self {
        Self {
            tid,
            state: ThreadState::Ready,
            context,
            stack,
            joining: None,
            join_result: None,
            retval: None,
        }
    }

    #[inline]
    pub fn tid(&self) -> Tid {
        self.tid
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Stack owned by this thread; `None` for the initial thread
    #[inline]
    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }

    fn set_state(&mut self, next: ThreadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "thread {}: illegal transition {} -> {}",
            self.tid,
            self.state,
            next
        );
        self.state = next;
    }
}

/// Snapshot of scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Runnable threads, the running one included
    pub ready: usize,
    pub blocked: usize,
    pub zombie: usize,
    /// Threads created since init
    pub created: u64,
    /// Context switches performed
    pub switches: u64,
    /// Preemption ticks delivered, process-wide
    pub ticks: u64,
}

/// Outcome of the bookkeeping half of a join
enum JoinStep {
    /// Target had already exited
    Collected(i32),
    /// Caller is now blocked; switch to `resume`
    Wait {
        save: *mut Context,
        resume: *const Context,
    },
}

/// Per-OS-thread scheduler
pub struct Scheduler {
    config: RuntimeConfig,
    ready: Queue<Box<ThreadRecord>>,
    blocked: Queue<Box<ThreadRecord>>,
    zombie: Queue<Box<ThreadRecord>>,
    /// Collected thread whose stack was in use at the switch away from it.
    /// Freed by the next thread that resumes outside a tick.
    graveyard: Option<Box<ThreadRecord>>,
    /// The switch in flight was forced by a tick; cleared by the resumed side
    tick_switch: bool,
    created: u64,
    switches: u64,
}

impl Scheduler {
    /// Create a scheduler whose only thread is the caller, as [`Tid::ROOT`]
    pub fn new(config: RuntimeConfig) -> SchedResult<Self> {
        let mut ready = Queue::create()?;
        ready.enqueue(Box::new(ThreadRecord::new(Tid::ROOT, Context::empty(), None)))?;

        Ok(Self {
            config,
            ready,
            blocked: Queue::create()?,
            zombie: Queue::create()?,
            graveyard: None,
            tick_switch: false,
            created: 0,
            switches: 0,
        })
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// TID of the thread at the front of the ready queue
    fn running_tid(&self) -> Tid {
        self.ready.front().map_or(Tid::ROOT, |r| r.tid)
    }

    /// One more than the largest TID in any queue
    fn next_tid(&self) -> Option<Tid> {
        self.ready
            .iter()
            .chain(self.blocked.iter())
            .chain(self.zombie.iter())
            .map(|r| r.tid)
            .max()
            .unwrap_or(Tid::ROOT)
            .next()
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            ready: self.ready.len(),
            blocked: self.blocked.len(),
            zombie: self.zombie.len(),
            created: self.created,
            switches: self.switches,
            ticks: preempt::ticks(),
        }
    }

    /// Free the record left behind by an exited thread
    fn reap(&mut self) {
        if let Some(rec) = self.graveyard.take() {
            ktrace!("releasing stack of thread {}", rec.tid);
        }
    }

    fn collect(mut rec: Box<ThreadRecord>) -> i32 {
        rec.set_state(ThreadState::Collected);
        let value = rec.retval.unwrap_or(0);
        kdebug!("collected thread {} (value {})", rec.tid, value);
        value
    }

    /// Move the running thread to the tail and pick the new front
    ///
    /// Returns `None` when the caller is the only runnable thread.
    fn begin_yield(&mut self) -> Option<(*mut Context, *const Context)> {
        if self.ready.len() <= 1 {
            return None;
        }
        self.ready.rotate().ok()?;

        let save = self.ready.back_mut().map(|r| &mut r.context as *mut Context)?;
        let resume = self.ready.front().map(|r| &r.context as *const Context)?;
        self.switches += 1;
        Some((save, resume))
    }

    fn begin_join(&mut self, target: Tid) -> SchedResult<JoinStep> {
        if target.is_root() {
            return Err(SchedError::InvalidArgument("cannot join the initial thread"));
        }
        if target == self.running_tid() {
            return Err(SchedError::InvalidArgument("cannot join self"));
        }
        if self.blocked.iter().any(|r| r.joining == Some(target)) {
            return Err(SchedError::AlreadyJoining(target));
        }

        if let Ok(rec) = self.zombie.delete_where(|r| r.tid == target) {
            return Ok(JoinStep::Collected(Self::collect(rec)));
        }

        if !self.ready.iter().any(|r| r.tid == target) {
            return Err(SchedError::NotFound(target));
        }

        // Reserve first: once dequeued, the caller must land in blocked
        self.blocked.reserve(1)?;
        let mut me = self.ready.dequeue()?;
        me.joining = Some(target);
        me.join_result = None;
        me.set_state(ThreadState::Blocked);
        let save: *mut Context = &mut me.context;
        let tid = me.tid;

        if let Err(AllocError(me)) = self.blocked.enqueue(me) {
            kerror!("thread {}: blocked queue rejected a reserved insert", tid);
            mem::forget(me);
            process::abort();
        }

        let Some(resume) = self.ready.front().map(|r| &r.context as *const Context) else {
            kerror!("thread {}: join target vanished from the ready queue", tid);
            process::abort();
        };

        ktrace!("thread {} blocked on {}", tid, target);
        self.switches += 1;
        Ok(JoinStep::Wait { save, resume })
    }

    /// Turn the running thread into a zombie and pick the next thread
    ///
    /// Terminates the process when no thread is left to run.
    fn retire(&mut self, retval: i32) -> (*mut Context, *const Context) {
        if self.zombie.reserve(1).is_err() {
            kerror!("out of memory while retiring a thread");
            process::abort();
        }
        let Ok(mut me) = self.ready.dequeue() else {
            kerror!("exit with an empty ready queue");
            process::abort();
        };

        let tid = me.tid;
        me.retval = Some(retval);
        me.set_state(ThreadState::Zombie);
        let save: *mut Context = &mut me.context;

        if let Err(AllocError(me)) = self.zombie.enqueue(me) {
            // Still running on this record's stack
            kerror!("thread {}: zombie queue rejected a reserved insert", tid);
            mem::forget(me);
            process::abort();
        }
        kdebug!("thread {} exited with {}", tid, retval);

        if let Ok(mut joiner) = self.blocked.delete_where(|r| r.joining == Some(tid)) {
            joiner.joining = None;
            joiner.join_result = Some(retval);
            joiner.set_state(ThreadState::Ready);
            let joiner_tid = joiner.tid;

            // The dequeue above left a free node behind
            if self.ready.enqueue(joiner).is_err() {
                kerror!("thread {}: could not wake joiner {}", tid, joiner_tid);
                process::abort();
            }
            ktrace!("thread {} woke joiner {}", tid, joiner_tid);

            if let Ok(mut rec) = self.zombie.delete_where(|r| r.tid == tid) {
                rec.set_state(ThreadState::Collected);
                // Not in a tick: an older record can go now
                self.reap();
                self.graveyard = Some(rec);
            }
        }

        let Some(resume) = self.ready.front().map(|r| &r.context as *const Context) else {
            let blocked = self.blocked.len();
            preempt::enable();
            if blocked > 0 {
                kwarn!(
                    "thread {} exited leaving {} blocked thread(s) and none ready; terminating",
                    tid,
                    blocked
                );
            } else {
                kdebug!("last thread {} exited; terminating with {}", tid, retval);
            }
            process::exit(retval);
        };

        self.switches += 1;
        (save, resume)
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Initialize the runtime on the calling OS thread
///
/// The caller becomes thread 0. Starts the preemption timer if the config
/// asks for it; a timer that cannot be armed only costs preemption and is
/// reported as a warning. Calling this is optional: [`create`] initializes
/// with [`RuntimeConfig::from_env`] on first use.
pub fn init(config: RuntimeConfig) -> SchedResult<()> {
    if tls::has_runtime() {
        return Err(SchedError::AlreadyInitialized);
    }
    config.validate()?;

    if config.debug_logging {
        kprint::set_log_level(LogLevel::Debug);
        config.print();
    }
    kprint::set_output_guard(OutputGuard {
        enter: preempt::mask,
        exit: preempt::restore,
    });

    let enable_preempt = config.enable_preempt;
    let hz = config.preempt_hz;
    let sched = Box::new(Scheduler::new(config)?);
    tls::set_runtime(Box::into_raw(sched));
    kdebug!("runtime initialized");

    if enable_preempt {
        match preempt::start(hz) {
            Ok(()) => kdebug!("preemption armed at {} Hz", hz),
            Err(PreemptError::AlreadyStarted) => ktrace!("preemption timer already running"),
            Err(e) => kwarn!("preemption unavailable, continuing cooperatively: {}", e),
        }
    }

    Ok(())
}

fn runtime_or_init() -> SchedResult<*mut Scheduler> {
    if !tls::has_runtime() {
        init(RuntimeConfig::from_env())?;
    }
    Ok(tls::runtime())
}

/// Runs first on the resuming side of every switch
///
/// `in_tick` is set when the resumed thread was itself parked by a tick. In
/// that case, or when a tick forced the switch into it, a handler is still
/// live and the graveyard stays put.
fn resumed(in_tick: bool) {
    if let Some(sched) = unsafe { tls::runtime().as_mut() } {
        let forced = mem::take(&mut sched.tick_switch);
        if !in_tick && !forced {
            sched.reap();
        }
    }
}

/// Create a thread running `f` and append it to the ready queue
///
/// The thread's return value becomes its exit value, as if it had called
/// [`exit`]. The caller keeps running.
pub fn create<F>(f: F) -> SchedResult<Tid>
where
    F: FnOnce() -> i32 + 'static,
{
    let sched = runtime_or_init()?;
    let _guard = PreemptGuard::new();
    let sched = unsafe { &mut *sched };

    let tid = sched.next_tid().ok_or(SchedError::TidExhausted)?;
    let stack = Stack::allocate(sched.config.stack_size)?;
    let entry: Box<Entry> = Box::new(Box::new(f));
    let arg = Box::into_raw(entry) as usize;
    let context = Context::new(&stack, thread_start, arg);

    let record = Box::new(ThreadRecord::new(tid, context, Some(stack)));
    if let Err(AllocError(record)) = sched.ready.enqueue(record) {
        drop(record);
        // Never started, so the closure is still ours
        drop(unsafe { Box::from_raw(arg as *mut Entry) });
        return Err(QueueError::AllocationFailed.into());
    }

    sched.created += 1;
    kdebug!("created thread {}", tid);
    Ok(tid)
}

/// TID of the calling thread; 0 before the runtime exists
pub fn self_tid() -> Tid {
    let _guard = PreemptGuard::new();
    unsafe { tls::runtime().as_ref() }.map_or(Tid::ROOT, Scheduler::running_tid)
}

/// Move the calling thread to the tail of the ready queue and run the next one
///
/// Returns immediately when no other thread is ready.
pub fn yield_now() {
    switch_to_next(false);
}

/// Yield forced by a preemption tick
///
/// The interrupted thread may hold the allocator lock, so neither it nor the
/// thread resumed by this switch frees parked records.
pub(crate) fn preempt_tick() {
    switch_to_next(true);
}

fn switch_to_next(in_tick: bool) {
    let sched = tls::runtime();
    if sched.is_null() {
        return;
    }

    let was_masked = preempt::mask();
    if let Some((save, resume)) = unsafe { (*sched).begin_yield() } {
        unsafe {
            (*sched).tick_switch = in_tick;
            context::switch(save, resume);
        }
        resumed(in_tick);
    }
    preempt::restore(was_masked);
}

/// Terminate the calling thread with `retval`
///
/// A thread blocked joining the caller is woken with the value. When no
/// runnable thread remains the whole process exits with `retval` as its
/// status.
pub fn exit(retval: i32) -> ! {
    let sched = tls::runtime();
    if sched.is_null() {
        kdebug!("exit({}) without a runtime; terminating process", retval);
        process::exit(retval);
    }

    preempt::disable();
    unsafe {
        let (save, resume) = (*sched).retire(retval);
        (*sched).tick_switch = false;
        context::switch(save, resume);
    }

    kerror!("exited thread resumed");
    process::abort();
}

/// Wait for thread `tid` to exit and return its exit value
///
/// Fails for thread 0, for the caller itself, for a target that already has
/// a joiner and for a TID that is neither running nor exited.
pub fn join(tid: Tid) -> SchedResult<i32> {
    if tid.is_root() {
        return Err(SchedError::InvalidArgument("cannot join the initial thread"));
    }
    let sched = tls::runtime();
    if sched.is_null() {
        return Err(SchedError::NotFound(tid));
    }

    let was_masked = preempt::mask();
    let result = match unsafe { (*sched).begin_join(tid) } {
        Ok(JoinStep::Collected(value)) => Ok(value),
        Ok(JoinStep::Wait { save, resume }) => {
            unsafe { context::switch(save, resume) };
            resumed(false);
            unsafe { tls::runtime().as_mut() }
                .and_then(|s| s.ready.front_mut())
                .and_then(|me| me.join_result.take())
                .ok_or(SchedError::NotFound(tid))
        }
        Err(e) => Err(e),
    };
    preempt::restore(was_masked);
    result
}

/// Counters of the calling OS thread's runtime, if it has one
pub fn stats() -> Option<RuntimeStats> {
    let _guard = PreemptGuard::new();
    unsafe { tls::runtime().as_ref() }.map(Scheduler::stats)
}

/// Entry point of every created thread
extern "C" fn thread_start(arg: usize) -> ! {
    resumed(false);
    preempt::enable();

    let entry = unsafe { Box::from_raw(arg as *mut Entry) };
    let retval = match panic::catch_unwind(AssertUnwindSafe(move || (*entry)())) {
        Ok(value) => value,
        Err(_) => {
            kerror!("thread {} panicked; aborting", self_tid());
            process::abort();
        }
    };

    exit(retval)
}
