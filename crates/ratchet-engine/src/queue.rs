use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Instant;

use chrono::Utc;
use ratchet_log::{CallbackOutcome, CommandLog, LogEntry, PhaseOutcome, TimingRegistry, TimingStats};
use ratchet_types::{
    CommandId, DependencyAction, ExecuteVerdict, LifecyclePhase, Reason, ResponseStatus,
};

use crate::command::{Command, CommandCell, CommandHandle, CommandRef};
use crate::dependency;
use crate::error::QueueError;

/// Timing window capacity used by [`CommandQueue::new`].
pub const DEFAULT_TIMING_QUEUE_LENGTH: usize = 16;

/// Iteration bound applied when [`CommandQueue::process_all`] is called
/// without one. Keeps a perpetually deferring command from spinning the
/// loop forever; callers that want a different ceiling pass their own.
pub const DEFAULT_MAX_TOTAL_ITERATIONS: usize = 1000;

/// Aggregate outcome of one `process_once`/`process_all` call.
///
/// The `num_*` counters classify each distinct command processed during
/// the call by its latest outcome, so they always sum to
/// `num_commands_processed`: a command that deferred twice and then
/// completed counts once, as a success.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueueProcessResponse {
    pub num_commands_processed: usize,
    /// Commands processed for the first time ever during this call.
    pub num_ingested: usize,
    pub num_deferrals: usize,
    pub num_cancellations: usize,
    pub num_successes: usize,
    pub num_failures: usize,
    /// True when the iteration bound was hit while work remained queued.
    pub reached_max_iterations: bool,
    /// Log entries produced during this call, in evaluation order.
    pub command_log: Vec<LogEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CommandOutcome {
    Deferred,
    Canceled,
    Succeeded,
    Failed,
}

enum ProcessMode {
    /// Drain the queue as it was at call entry; deferrals are appended
    /// past the snapshot and not re-polled.
    Snapshot,
    /// Poll until the queue is empty or the bound is reached; deferrals
    /// are re-polled.
    Drain,
}

struct QueueState {
    commands: VecDeque<CommandCell>,
    /// Ids currently in `commands`; a command is queued at most once.
    queued: HashSet<CommandId>,
    /// Ids ever popped by this queue, for `num_ingested`.
    seen: HashSet<CommandId>,
    log: CommandLog,
    timings: TimingRegistry,
    processing: bool,
}

impl QueueState {
    fn pop_front(&mut self) -> Option<CommandCell> {
        let cell = self.commands.pop_front()?;
        let id = cell.borrow().id();
        self.queued.remove(&id);
        Some(cell)
    }
}

/// Single-threaded FIFO command queue.
///
/// The queue is a cheap handle over shared state: cloning it yields
/// another view of the same queue, which is how commands submit follow-up
/// work from inside their own hooks. It is not thread-safe and makes no
/// attempt to be; all suspension is logical (deferral re-appends to the
/// tail).
///
/// Hooks and callbacks may `submit` while a process call is running, but
/// must not call `process_*` re-entrantly; that returns
/// [`QueueError::AlreadyProcessing`].
#[derive(Clone)]
pub struct CommandQueue {
    state: Rc<RefCell<QueueState>>,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::with_timing_queue_length(DEFAULT_TIMING_QUEUE_LENGTH)
    }

    /// A queue keeping the given number of timing samples per
    /// `(command type, phase)` pair. Zero disables timing.
    pub fn with_timing_queue_length(timing_queue_length: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(QueueState {
                commands: VecDeque::new(),
                queued: HashSet::new(),
                seen: HashSet::new(),
                log: CommandLog::new(),
                timings: TimingRegistry::new(timing_queue_length),
                processing: false,
            })),
        }
    }

    /// Append a command to the tail and return its response reference.
    ///
    /// Submitting a command that is already queued, or whose status is
    /// terminal, is a no-op for queueing; the response is still returned.
    pub fn submit<C: Command>(&self, handle: &CommandHandle<C>) -> Rc<RefCell<C::Response>> {
        self.enqueue(handle.erased_cell());
        handle.response()
    }

    /// Submit several commands of mixed types in order.
    pub fn submit_many(&self, commands: impl IntoIterator<Item = CommandRef>) {
        for command in commands {
            self.enqueue(command.cell);
        }
    }

    fn enqueue(&self, cell: CommandCell) {
        let (id, kind, status) = {
            let command = cell.borrow();
            (command.id(), command.kind(), command.status())
        };
        if status.is_terminal() {
            tracing::debug!(command = kind, %id, %status, "ignoring submission of terminal command");
            return;
        }
        let mut state = self.state.borrow_mut();
        if !state.queued.insert(id) {
            tracing::debug!(command = kind, %id, "ignoring submission of already-queued command");
            return;
        }
        state.commands.push_back(cell);
        tracing::trace!(command = kind, %id, queue_len = state.commands.len(), "command submitted");
    }

    pub fn len(&self) -> usize {
        self.state.borrow().commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().commands.is_empty()
    }

    /// Per-command-type statistics over the current timing windows.
    /// Empty when the queue was built with a timing length of zero.
    pub fn get_timing_data(&self) -> HashMap<&'static str, TimingStats> {
        self.state.borrow().timings.snapshot()
    }

    /// Snapshot of the full command log accumulated over the queue's
    /// lifetime (every `process_*` call appends to it).
    pub fn command_log(&self) -> CommandLog {
        self.state.borrow().log.clone()
    }

    /// Process the queue as it was at call entry, polling each queued
    /// command once. Deferrals re-append past the snapshot and are not
    /// re-polled in this call. Stops early after `max_iterations` pops.
    pub fn process_once(
        &self,
        max_iterations: Option<usize>,
    ) -> Result<QueueProcessResponse, QueueError> {
        self.process(ProcessMode::Snapshot, max_iterations)
    }

    /// Poll until the queue is empty or the bound is reached; deferred
    /// commands are re-polled in later rounds of the same call. Without an
    /// explicit bound, [`DEFAULT_MAX_TOTAL_ITERATIONS`] applies.
    pub fn process_all(
        &self,
        max_total_iterations: Option<usize>,
    ) -> Result<QueueProcessResponse, QueueError> {
        self.process(ProcessMode::Drain, max_total_iterations)
    }

    fn process(
        &self,
        mode: ProcessMode,
        max_iterations: Option<usize>,
    ) -> Result<QueueProcessResponse, QueueError> {
        let log_start = {
            let mut state = self.state.borrow_mut();
            if state.processing {
                return Err(QueueError::AlreadyProcessing);
            }
            state.processing = true;
            state.log.len()
        };

        let effective_max = match mode {
            ProcessMode::Snapshot => max_iterations,
            ProcessMode::Drain => Some(max_iterations.unwrap_or(DEFAULT_MAX_TOTAL_ITERATIONS)),
        };

        let mut tally: HashMap<CommandId, CommandOutcome> = HashMap::new();
        let mut ingested = 0usize;
        let mut pops = 0usize;

        match mode {
            ProcessMode::Snapshot => {
                let snapshot = self.len();
                let mut taken = 0usize;
                while taken < snapshot && !effective_max.is_some_and(|max| pops >= max) {
                    if self.step(&mut tally, &mut ingested).is_none() {
                        break;
                    }
                    pops += 1;
                    taken += 1;
                }
            }
            ProcessMode::Drain => {
                while !effective_max.is_some_and(|max| pops >= max) {
                    if self.step(&mut tally, &mut ingested).is_none() {
                        break;
                    }
                    pops += 1;
                }
            }
        }

        let reached_max_iterations =
            effective_max.is_some_and(|max| pops >= max) && !self.is_empty();

        let command_log = {
            let mut state = self.state.borrow_mut();
            state.processing = false;
            state.log.entries_from(log_start).to_vec()
        };

        let mut response = QueueProcessResponse {
            num_commands_processed: tally.len(),
            num_ingested: ingested,
            reached_max_iterations,
            command_log,
            ..Default::default()
        };
        for outcome in tally.values() {
            match outcome {
                CommandOutcome::Deferred => response.num_deferrals += 1,
                CommandOutcome::Canceled => response.num_cancellations += 1,
                CommandOutcome::Succeeded => response.num_successes += 1,
                CommandOutcome::Failed => response.num_failures += 1,
            }
        }
        tracing::debug!(
            processed = response.num_commands_processed,
            deferred = response.num_deferrals,
            canceled = response.num_cancellations,
            succeeded = response.num_successes,
            failed = response.num_failures,
            remaining = self.len(),
            "process call finished"
        );
        Ok(response)
    }

    /// Pop and run one command; `None` when the queue is empty.
    fn step(
        &self,
        tally: &mut HashMap<CommandId, CommandOutcome>,
        ingested: &mut usize,
    ) -> Option<CommandOutcome> {
        let cell = self.state.borrow_mut().pop_front()?;
        let id = cell.borrow().id();
        if self.state.borrow_mut().seen.insert(id) {
            *ingested += 1;
        }
        let outcome = self.run_lifecycle(&cell);
        tally.insert(id, outcome);
        Some(outcome)
    }

    fn run_lifecycle(&self, cell: &CommandCell) -> CommandOutcome {
        let (id, kind) = {
            let command = cell.borrow();
            (command.id(), command.kind())
        };
        tracing::trace!(command = kind, %id, "processing command");

        // Phase 1: dependency check, only when the command has entries.
        let check = {
            let command = cell.borrow();
            if command.dependencies().is_empty() {
                None
            } else {
                Some(dependency::evaluate(command.dependencies()))
            }
        };
        if let Some(check) = check {
            let reason = check.reason.map(Reason::ByDependencyCheck);
            let outcome = PhaseOutcome::Dependency {
                action: check.action,
            };
            match check.action {
                DependencyAction::Cancel => {
                    cell.borrow_mut().set_status(ResponseStatus::Canceled);
                    self.append_log(id, kind, LifecyclePhase::DependencyCheck, outcome, reason, Vec::new());
                    return CommandOutcome::Canceled;
                }
                DependencyAction::Defer => {
                    cell.borrow_mut().set_status(ResponseStatus::Pending);
                    self.append_log(id, kind, LifecyclePhase::DependencyCheck, outcome, reason, Vec::new());
                    self.requeue(cell);
                    return CommandOutcome::Deferred;
                }
                DependencyAction::Proceed => {
                    self.append_log(id, kind, LifecyclePhase::DependencyCheck, outcome, reason, Vec::new());
                }
            }
        }

        // Phase 2: should_defer.
        let started = Instant::now();
        let hook = cell.borrow_mut().hook_should_defer();
        self.record_timing(kind, LifecyclePhase::ShouldDefer, started);
        let verdict = match hook {
            Ok(verdict) => verdict,
            Err(message) => {
                return self.cancel_after_hook_panic(
                    cell,
                    id,
                    kind,
                    LifecyclePhase::ShouldDefer,
                    message,
                );
            }
        };
        if !verdict.proceeds() {
            cell.borrow_mut().set_status(ResponseStatus::Pending);
            let callbacks = cell.borrow_mut().fire_on_defer(&verdict);
            self.append_log(
                id,
                kind,
                LifecyclePhase::ShouldDefer,
                PhaseOutcome::Verdict { proceeded: false },
                verdict.reason().map(|r| Reason::ByCommandMethod(r.to_string())),
                callbacks,
            );
            self.requeue(cell);
            return CommandOutcome::Deferred;
        }
        self.append_log(
            id,
            kind,
            LifecyclePhase::ShouldDefer,
            PhaseOutcome::Verdict { proceeded: true },
            verdict.reason().map(|r| Reason::ByCommandMethod(r.to_string())),
            Vec::new(),
        );

        // Phase 3: should_cancel.
        let started = Instant::now();
        let hook = cell.borrow_mut().hook_should_cancel();
        self.record_timing(kind, LifecyclePhase::ShouldCancel, started);
        let verdict = match hook {
            Ok(verdict) => verdict,
            Err(message) => {
                return self.cancel_after_hook_panic(
                    cell,
                    id,
                    kind,
                    LifecyclePhase::ShouldCancel,
                    message,
                );
            }
        };
        if !verdict.proceeds() {
            cell.borrow_mut().set_status(ResponseStatus::Canceled);
            let callbacks = cell.borrow_mut().fire_on_cancel(&verdict);
            self.append_log(
                id,
                kind,
                LifecyclePhase::ShouldCancel,
                PhaseOutcome::Verdict { proceeded: false },
                verdict.reason().map(|r| Reason::ByCommandMethod(r.to_string())),
                callbacks,
            );
            return CommandOutcome::Canceled;
        }
        self.append_log(
            id,
            kind,
            LifecyclePhase::ShouldCancel,
            PhaseOutcome::Verdict { proceeded: true },
            verdict.reason().map(|r| Reason::ByCommandMethod(r.to_string())),
            Vec::new(),
        );

        // Phase 4: execute. A panic converts to a failure verdict carrying
        // the panic message.
        let started = Instant::now();
        let hook = cell.borrow_mut().hook_execute();
        self.record_timing(kind, LifecyclePhase::Execute, started);
        let (verdict, reason) = match hook {
            Ok(verdict) => {
                let reason = verdict.reason().map(|r| Reason::ByCommandMethod(r.to_string()));
                (verdict, reason)
            }
            Err(message) => {
                tracing::warn!(command = kind, %id, "execute panicked: {message}");
                let verdict = ExecuteVerdict::failure().with_reason(message.clone());
                (verdict, Some(Reason::Plain(message)))
            }
        };
        let status = if verdict.proceeds() {
            ResponseStatus::Completed
        } else {
            ResponseStatus::Failed
        };
        cell.borrow_mut().set_status(status);
        let callbacks = cell.borrow_mut().fire_on_execute(&verdict);
        self.append_log(
            id,
            kind,
            LifecyclePhase::Execute,
            PhaseOutcome::Verdict {
                proceeded: verdict.proceeds(),
            },
            reason,
            callbacks,
        );
        if verdict.proceeds() {
            CommandOutcome::Succeeded
        } else {
            CommandOutcome::Failed
        }
    }

    /// A panic in `should_defer`/`should_cancel` terminates the command as
    /// canceled, with the panic message as the recorded reason.
    fn cancel_after_hook_panic(
        &self,
        cell: &CommandCell,
        id: CommandId,
        kind: &'static str,
        phase: LifecyclePhase,
        message: String,
    ) -> CommandOutcome {
        tracing::warn!(command = kind, %id, phase = %phase, "lifecycle hook panicked: {message}");
        cell.borrow_mut().set_status(ResponseStatus::Canceled);
        self.append_log(
            id,
            kind,
            phase,
            PhaseOutcome::Verdict { proceeded: false },
            Some(Reason::Plain(message)),
            Vec::new(),
        );
        CommandOutcome::Canceled
    }

    /// Re-append a deferred command unless a callback already resubmitted it.
    fn requeue(&self, cell: &CommandCell) {
        let id = cell.borrow().id();
        let mut state = self.state.borrow_mut();
        if state.queued.insert(id) {
            state.commands.push_back(Rc::clone(cell));
        }
    }

    fn append_log(
        &self,
        command_id: CommandId,
        command_kind: &'static str,
        phase: LifecyclePhase,
        outcome: PhaseOutcome,
        reason: Option<Reason>,
        executed_callbacks: Vec<CallbackOutcome>,
    ) {
        self.state.borrow_mut().log.append(LogEntry {
            command_id,
            command_kind: command_kind.to_string(),
            phase,
            outcome,
            reason,
            executed_callbacks,
            timestamp: Utc::now(),
        });
    }

    fn record_timing(&self, kind: &'static str, phase: LifecyclePhase, started: Instant) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.state.borrow_mut().timings.record(kind, phase, elapsed_ms);
    }
}
