use std::any::type_name;
use std::cell::RefCell;
use std::rc::Rc;

use ratchet_log::CallbackOutcome;
use ratchet_types::{
    CancelVerdict, CommandId, DeferVerdict, ExecuteVerdict, Response, ResponseStatus,
};

use crate::dependency::{self, DependencyCheck, DependencyEntry};
use crate::shield;

/// A unit of work with a fixed three-phase lifecycle.
///
/// The engine polls each queued command through `should_defer`,
/// `should_cancel`, and `execute`, in that order, after its dependencies
/// have been evaluated. The two optional hooks default to proceeding, so
/// most commands only implement `execute`.
///
/// Payloads never travel in verdicts: `execute` writes its results to the
/// command's own response, which the submitter observes through the shared
/// reference returned by [`CommandQueue::submit`](crate::CommandQueue::submit).
///
/// # Example
///
/// ```
/// use ratchet_engine::{Command, CommandHandle, CommandQueue};
/// use ratchet_types::{ExecuteVerdict, Response, ResponseStatus};
///
/// struct SayHelloArgs {
///     name: Option<String>,
/// }
///
/// #[derive(Default)]
/// struct SayHelloResponse {
///     status: ResponseStatus,
///     message: String,
/// }
///
/// impl Response for SayHelloResponse {
///     fn status(&self) -> ResponseStatus {
///         self.status
///     }
///     fn set_status(&mut self, status: ResponseStatus) {
///         self.status = status;
///     }
/// }
///
/// struct SayHello {
///     args: SayHelloArgs,
/// }
///
/// impl Command for SayHello {
///     type Args = SayHelloArgs;
///     type Response = SayHelloResponse;
///
///     fn from_args(args: SayHelloArgs) -> Self {
///         Self { args }
///     }
///
///     fn execute(&mut self, response: &mut SayHelloResponse) -> ExecuteVerdict {
///         let Some(name) = &self.args.name else {
///             return ExecuteVerdict::failure().with_reason("Cannot say hello to no one.");
///         };
///         response.message = format!("Hello, {name}!");
///         ExecuteVerdict::success()
///     }
/// }
///
/// let queue = CommandQueue::new();
/// let command = CommandHandle::new(SayHello::from_args(SayHelloArgs {
///     name: Some("Alice".to_string()),
/// }));
/// let response = queue.submit(&command);
/// queue.process_once(None).unwrap();
/// assert_eq!(response.borrow().message, "Hello, Alice!");
/// ```
pub trait Command: 'static {
    /// Arguments the command is constructed from.
    type Args;

    /// The response record this command owns. Starts out `Default`
    /// (status `Created`).
    type Response: Response + Default;

    /// Bind arguments to a fresh command instance.
    fn from_args(args: Self::Args) -> Self
    where
        Self: Sized;

    /// Whether to put the command back on the queue for a later poll.
    ///
    /// Commands that never defer keep the default.
    fn should_defer(&mut self) -> DeferVerdict {
        DeferVerdict::proceed()
    }

    /// Whether to terminate the command as `Canceled` instead of running it.
    ///
    /// Commands that never cancel keep the default.
    fn should_cancel(&mut self) -> CancelVerdict {
        CancelVerdict::proceed()
    }

    /// Perform the command's work.
    fn execute(&mut self, response: &mut Self::Response) -> ExecuteVerdict;

    /// Short name used in log entries, timing keys, and dependency
    /// summaries. Defaults to the unqualified type name.
    fn kind() -> &'static str {
        short_type_name::<Self>()
    }
}

/// Unqualified name of `T`, with module path and generic arguments stripped.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

struct NamedCallback<V> {
    name: String,
    callback: Box<dyn FnMut(&V)>,
}

fn run_callbacks<V>(callbacks: &mut [NamedCallback<V>], verdict: &V) -> Vec<CallbackOutcome> {
    callbacks
        .iter_mut()
        .map(|cb| {
            let errored = shield::run(|| (cb.callback)(verdict)).is_err();
            if errored {
                tracing::warn!(callback = %cb.name, "callback panicked; continuing with the next one");
            }
            CallbackOutcome {
                name: cb.name.clone(),
                errored,
            }
        })
        .collect()
}

/// Everything the queue needs from a command, with the concrete types
/// erased. Implemented once, for the handle's shared state.
pub(crate) trait RunnableCommand {
    fn id(&self) -> CommandId;
    fn kind(&self) -> &'static str;
    fn status(&self) -> ResponseStatus;
    fn set_status(&mut self, status: ResponseStatus);
    fn dependencies(&self) -> &[DependencyEntry];
    /// `Err` carries the panic message when the hook panicked.
    fn hook_should_defer(&mut self) -> Result<DeferVerdict, String>;
    fn hook_should_cancel(&mut self) -> Result<CancelVerdict, String>;
    fn hook_execute(&mut self) -> Result<ExecuteVerdict, String>;
    fn fire_on_defer(&mut self, verdict: &DeferVerdict) -> Vec<CallbackOutcome>;
    fn fire_on_cancel(&mut self, verdict: &CancelVerdict) -> Vec<CallbackOutcome>;
    fn fire_on_execute(&mut self, verdict: &ExecuteVerdict) -> Vec<CallbackOutcome>;
}

pub(crate) type CommandCell = Rc<RefCell<dyn RunnableCommand>>;

struct HandleState<C: Command> {
    id: CommandId,
    command: C,
    response: Rc<RefCell<C::Response>>,
    dependencies: Vec<DependencyEntry>,
    on_defer: Vec<NamedCallback<DeferVerdict>>,
    on_cancel: Vec<NamedCallback<CancelVerdict>>,
    on_execute: Vec<NamedCallback<ExecuteVerdict>>,
}

impl<C: Command> RunnableCommand for HandleState<C> {
    fn id(&self) -> CommandId {
        self.id
    }

    fn kind(&self) -> &'static str {
        C::kind()
    }

    fn status(&self) -> ResponseStatus {
        self.response.borrow().status()
    }

    fn set_status(&mut self, status: ResponseStatus) {
        let mut response = self.response.borrow_mut();
        // Terminal statuses are monotonic; a late write is dropped.
        if response.status().is_terminal() {
            return;
        }
        response.set_status(status);
    }

    fn dependencies(&self) -> &[DependencyEntry] {
        &self.dependencies
    }

    fn hook_should_defer(&mut self) -> Result<DeferVerdict, String> {
        shield::run(|| self.command.should_defer())
    }

    fn hook_should_cancel(&mut self) -> Result<CancelVerdict, String> {
        shield::run(|| self.command.should_cancel())
    }

    fn hook_execute(&mut self) -> Result<ExecuteVerdict, String> {
        let response = Rc::clone(&self.response);
        let command = &mut self.command;
        shield::run(move || command.execute(&mut response.borrow_mut()))
    }

    fn fire_on_defer(&mut self, verdict: &DeferVerdict) -> Vec<CallbackOutcome> {
        run_callbacks(&mut self.on_defer, verdict)
    }

    fn fire_on_cancel(&mut self, verdict: &CancelVerdict) -> Vec<CallbackOutcome> {
        run_callbacks(&mut self.on_cancel, verdict)
    }

    fn fire_on_execute(&mut self, verdict: &ExecuteVerdict) -> Vec<CallbackOutcome> {
        run_callbacks(&mut self.on_execute, verdict)
    }
}

/// Shareable cell for one command instance: the command itself, its
/// response, its dependency entries, and its callback lists.
///
/// Cloning a handle shares the same instance; identity, and therefore
/// queue membership, follows the cell, not the clone. The handle is what
/// gets submitted, referenced as a dependency target, and queried for the
/// response afterwards.
pub struct CommandHandle<C: Command> {
    state: Rc<RefCell<HandleState<C>>>,
}

impl<C: Command> Clone for CommandHandle<C> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<C: Command> CommandHandle<C> {
    pub fn new(command: C) -> Self {
        Self::with_dependencies(command, Vec::new())
    }

    /// Build the command from its args and wrap it in one step.
    pub fn from_args(args: C::Args) -> Self {
        Self::new(C::from_args(args))
    }

    /// Wrap a command together with its ordered dependency entries.
    pub fn with_dependencies(command: C, dependencies: Vec<DependencyEntry>) -> Self {
        let state = Rc::new(RefCell::new(HandleState {
            id: CommandId::new(0),
            command,
            response: Rc::new(RefCell::new(C::Response::default())),
            dependencies,
            on_defer: Vec::new(),
            on_cancel: Vec::new(),
            on_execute: Vec::new(),
        }));
        // Identity is the cell's address: stable across clones, unique
        // across live instances.
        let id = CommandId::new(Rc::as_ptr(&state) as *const () as usize);
        state.borrow_mut().id = id;
        Self { state }
    }

    pub fn id(&self) -> CommandId {
        self.state.borrow().id
    }

    pub fn kind(&self) -> &'static str {
        C::kind()
    }

    /// The shared response record. Stays valid (and keeps updating) across
    /// submission and processing.
    pub fn response(&self) -> Rc<RefCell<C::Response>> {
        Rc::clone(&self.state.borrow().response)
    }

    pub fn status(&self) -> ResponseStatus {
        self.state.borrow().status()
    }

    pub fn add_dependency(&self, entry: DependencyEntry) {
        self.state.borrow_mut().dependencies.push(entry);
    }

    /// Evaluate this command's dependency entries against the current
    /// statuses of their targets.
    pub fn check_dependencies(&self) -> DependencyCheck {
        dependency::evaluate(self.state.borrow().dependencies())
    }

    pub fn add_on_defer_callback<F>(&self, callback: F)
    where
        F: FnMut(&DeferVerdict) + 'static,
    {
        self.add_named_on_defer_callback(type_name::<F>(), callback);
    }

    pub fn add_named_on_defer_callback<F>(&self, name: impl Into<String>, callback: F)
    where
        F: FnMut(&DeferVerdict) + 'static,
    {
        self.state.borrow_mut().on_defer.push(NamedCallback {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    pub fn add_on_cancel_callback<F>(&self, callback: F)
    where
        F: FnMut(&CancelVerdict) + 'static,
    {
        self.add_named_on_cancel_callback(type_name::<F>(), callback);
    }

    pub fn add_named_on_cancel_callback<F>(&self, name: impl Into<String>, callback: F)
    where
        F: FnMut(&CancelVerdict) + 'static,
    {
        self.state.borrow_mut().on_cancel.push(NamedCallback {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    pub fn add_on_execute_callback<F>(&self, callback: F)
    where
        F: FnMut(&ExecuteVerdict) + 'static,
    {
        self.add_named_on_execute_callback(type_name::<F>(), callback);
    }

    pub fn add_named_on_execute_callback<F>(&self, name: impl Into<String>, callback: F)
    where
        F: FnMut(&ExecuteVerdict) + 'static,
    {
        self.state.borrow_mut().on_execute.push(NamedCallback {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    /// Type-erased view of the same cell, for
    /// [`CommandQueue::submit_many`](crate::CommandQueue::submit_many) and
    /// other heterogeneous fan-in.
    pub fn as_command_ref(&self) -> CommandRef {
        CommandRef {
            cell: self.erased_cell(),
        }
    }

    pub(crate) fn erased_cell(&self) -> CommandCell {
        let cell: Rc<RefCell<HandleState<C>>> = Rc::clone(&self.state);
        cell
    }
}

/// A command handle with its concrete type erased. Identity is preserved:
/// a `CommandRef` and the handle it came from refer to the same cell.
pub struct CommandRef {
    pub(crate) cell: CommandCell,
}

impl<C: Command> From<&CommandHandle<C>> for CommandRef {
    fn from(handle: &CommandHandle<C>) -> Self {
        handle.as_command_ref()
    }
}
