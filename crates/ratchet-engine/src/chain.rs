//! Command chains: a composite command that threads a typed value through
//! an ordered sequence of child commands.
//!
//! Each step builds its child's args from the previous step's extracted
//! value, submits the child to the chain's queue, and waits (by deferring)
//! until the child reaches a terminal status. A failed or canceled child
//! fails the whole chain and leaves `output_data` empty.

use std::any::Any;
use std::marker::PhantomData;

use ratchet_types::{DeferVerdict, ExecuteVerdict, Response, ResponseStatus};

use crate::command::{Command, CommandHandle};
use crate::queue::CommandQueue;

/// Response owned by a chain command: the final extracted value, present
/// only after every step completed.
pub struct ChainResponse<Out: 'static> {
    pub status: ResponseStatus,
    pub output_data: Option<Out>,
}

impl<Out: 'static> Default for ChainResponse<Out> {
    fn default() -> Self {
        Self {
            status: ResponseStatus::default(),
            output_data: None,
        }
    }
}

impl<Out: 'static> Response for ChainResponse<Out> {
    fn status(&self) -> ResponseStatus {
        self.status
    }

    fn set_status(&mut self, status: ResponseStatus) {
        self.status = status;
    }
}

/// One step with its value types erased. The typed builder guarantees the
/// `Box<dyn Any>` passed to `dispatch` is the previous step's output type.
trait ChainStep {
    fn dispatch(&mut self, value: Box<dyn Any>, queue: &CommandQueue);
    fn child_status(&self) -> Option<ResponseStatus>;
    fn harvest(&mut self) -> Box<dyn Any>;
    fn command_kind(&self) -> &'static str;
}

struct Step<C: Command, StepIn: 'static, StepOut: 'static> {
    build_args: Option<Box<dyn FnOnce(StepIn) -> C::Args>>,
    extract: Box<dyn Fn(&C::Response) -> StepOut>,
    child: Option<CommandHandle<C>>,
}

impl<C: Command, StepIn: 'static, StepOut: 'static> ChainStep for Step<C, StepIn, StepOut> {
    fn dispatch(&mut self, value: Box<dyn Any>, queue: &CommandQueue) {
        let value = value
            .downcast::<StepIn>()
            .expect("chain steps thread matching value types by construction");
        let build_args = self
            .build_args
            .take()
            .expect("each chain step dispatches exactly once");
        let child = CommandHandle::new(C::from_args(build_args(*value)));
        queue.submit(&child);
        self.child = Some(child);
    }

    fn child_status(&self) -> Option<ResponseStatus> {
        self.child.as_ref().map(CommandHandle::status)
    }

    fn harvest(&mut self) -> Box<dyn Any> {
        let child = self
            .child
            .as_ref()
            .expect("harvest only runs after the child completed");
        let response = child.response();
        let extracted = (self.extract)(&response.borrow());
        Box::new(extracted)
    }

    fn command_kind(&self) -> &'static str {
        C::kind()
    }
}

/// Assembled configuration a [`ChainCommand`] is built from. Produced by
/// [`CommandChainBuilder::build`]; not constructed directly.
pub struct ChainSpec<In: 'static, Out: 'static> {
    seed: In,
    steps: Vec<Box<dyn ChainStep>>,
    queue: CommandQueue,
    _marker: PhantomData<fn() -> Out>,
}

/// Composite command that runs its steps one child at a time.
///
/// While a child is in flight the chain defers; when a child completes,
/// its extracted value feeds the next step's args builder. The chain
/// completes with the final value as `output_data`, or fails as soon as a
/// child ends `Canceled` or `Failed`.
pub struct ChainCommand<In: 'static, Out: 'static> {
    steps: Vec<Box<dyn ChainStep>>,
    next_step: usize,
    in_flight: Option<usize>,
    value: Option<Box<dyn Any>>,
    queue: CommandQueue,
    failed_step: Option<(usize, &'static str, ResponseStatus)>,
    _marker: PhantomData<fn(In) -> Out>,
}

impl<In: 'static, Out: 'static> Command for ChainCommand<In, Out> {
    type Args = ChainSpec<In, Out>;
    type Response = ChainResponse<Out>;

    fn from_args(spec: ChainSpec<In, Out>) -> Self {
        Self {
            steps: spec.steps,
            next_step: 0,
            in_flight: None,
            value: Some(Box::new(spec.seed)),
            queue: spec.queue,
            failed_step: None,
            _marker: PhantomData,
        }
    }

    fn kind() -> &'static str {
        "CommandChain"
    }

    fn should_defer(&mut self) -> DeferVerdict {
        if let Some(index) = self.in_flight {
            let step = &mut self.steps[index];
            let status = step
                .child_status()
                .expect("an in-flight step always has a dispatched child");
            if !status.is_terminal() {
                return DeferVerdict::defer().with_reason(format!(
                    "Waiting on step {} ({})",
                    index + 1,
                    step.command_kind()
                ));
            }
            if status == ResponseStatus::Completed {
                self.value = Some(step.harvest());
                self.in_flight = None;
            } else {
                self.failed_step = Some((index + 1, step.command_kind(), status));
                self.in_flight = None;
                // Proceed into execute, which reports the failure.
                return DeferVerdict::proceed();
            }
        }
        if self.next_step < self.steps.len() {
            let index = self.next_step;
            let total = self.steps.len();
            let value = self
                .value
                .take()
                .expect("the chain value is present whenever a step is ready to dispatch");
            let step = &mut self.steps[index];
            step.dispatch(value, &self.queue);
            self.in_flight = Some(index);
            self.next_step += 1;
            return DeferVerdict::defer().with_reason(format!(
                "Dispatched step {}/{} ({})",
                index + 1,
                total,
                step.command_kind()
            ));
        }
        DeferVerdict::proceed()
    }

    fn execute(&mut self, response: &mut ChainResponse<Out>) -> ExecuteVerdict {
        if let Some((step, kind, status)) = self.failed_step.take() {
            return ExecuteVerdict::failure()
                .with_reason(format!("Chain step {step} ({kind}) ended with status {status}"));
        }
        let value = self
            .value
            .take()
            .expect("the chain value is present once every step has completed");
        let value = value
            .downcast::<Out>()
            .expect("chain steps thread matching value types by construction");
        response.output_data = Some(*value);
        ExecuteVerdict::success()
    }
}

/// Fluent, typed builder for command chains.
///
/// `start` seeds the chain and adds the first step; each `then` appends a
/// step whose input type is the previous extractor's output type, so a
/// mis-typed chain fails to compile instead of failing at runtime.
/// `build` binds the chain to the queue its children will be submitted to.
///
/// The step's command type is passed explicitly:
/// `CommandChainBuilder::<i32, i32>::start::<AddOne>(0, args, extract)`.
pub struct CommandChainBuilder<In: 'static, Out: 'static> {
    seed: In,
    steps: Vec<Box<dyn ChainStep>>,
    _marker: PhantomData<fn() -> Out>,
}

impl<In: 'static, Out: 'static> CommandChainBuilder<In, Out> {
    /// Record the seed value and the first step.
    pub fn start<C>(
        seed: In,
        args_builder: impl FnOnce(In) -> C::Args + 'static,
        extractor: impl Fn(&C::Response) -> Out + 'static,
    ) -> Self
    where
        C: Command,
    {
        Self {
            seed,
            steps: vec![Box::new(Step::<C, In, Out> {
                build_args: Some(Box::new(args_builder)),
                extract: Box::new(extractor),
                child: None,
            })],
            _marker: PhantomData,
        }
    }

    /// Append a step fed by the previous step's extracted value.
    pub fn then<C, Next>(
        mut self,
        args_builder: impl FnOnce(Out) -> C::Args + 'static,
        extractor: impl Fn(&C::Response) -> Next + 'static,
    ) -> CommandChainBuilder<In, Next>
    where
        C: Command,
        Next: 'static,
    {
        self.steps.push(Box::new(Step::<C, Out, Next> {
            build_args: Some(Box::new(args_builder)),
            extract: Box::new(extractor),
            child: None,
        }));
        CommandChainBuilder {
            seed: self.seed,
            steps: self.steps,
            _marker: PhantomData,
        }
    }

    /// Bind the chain to the queue its children will be submitted to.
    pub fn build(self, queue: &CommandQueue) -> CommandHandle<ChainCommand<In, Out>> {
        CommandHandle::new(ChainCommand::from_args(ChainSpec {
            seed: self.seed,
            steps: self.steps,
            queue: queue.clone(),
            _marker: PhantomData,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_types::CancelVerdict;

    #[derive(Default)]
    struct AddOneArgs {
        number: i32,
        should_cancel: bool,
        should_fail: bool,
    }

    #[derive(Default)]
    struct AddOneResponse {
        status: ResponseStatus,
        result: i32,
    }

    impl Response for AddOneResponse {
        fn status(&self) -> ResponseStatus {
            self.status
        }
        fn set_status(&mut self, status: ResponseStatus) {
            self.status = status;
        }
    }

    struct AddOneCommand {
        args: AddOneArgs,
    }

    impl Command for AddOneCommand {
        type Args = AddOneArgs;
        type Response = AddOneResponse;

        fn from_args(args: AddOneArgs) -> Self {
            Self { args }
        }

        fn should_cancel(&mut self) -> CancelVerdict {
            if self.args.should_cancel {
                return CancelVerdict::cancel().with_reason("Command was cancelled");
            }
            CancelVerdict::proceed()
        }

        fn execute(&mut self, response: &mut AddOneResponse) -> ExecuteVerdict {
            if self.args.should_fail {
                return ExecuteVerdict::failure().with_reason("Command failed");
            }
            response.result = self.args.number + 1;
            ExecuteVerdict::success()
        }
    }

    struct StringifyArgs {
        number: i32,
    }

    #[derive(Default)]
    struct StringifyResponse {
        status: ResponseStatus,
        text: String,
    }

    impl Response for StringifyResponse {
        fn status(&self) -> ResponseStatus {
            self.status
        }
        fn set_status(&mut self, status: ResponseStatus) {
            self.status = status;
        }
    }

    struct Stringify {
        args: StringifyArgs,
    }

    impl Command for Stringify {
        type Args = StringifyArgs;
        type Response = StringifyResponse;

        fn from_args(args: StringifyArgs) -> Self {
            Self { args }
        }

        fn execute(&mut self, response: &mut StringifyResponse) -> ExecuteVerdict {
            response.text = self.args.number.to_string();
            ExecuteVerdict::success()
        }
    }

    #[test]
    fn three_step_add_one_chain_threads_the_value() {
        let queue = CommandQueue::new();
        let chain = CommandChainBuilder::<i32, i32>::start::<AddOneCommand>(
            0,
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .then::<AddOneCommand, i32>(
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .then::<AddOneCommand, i32>(
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .build(&queue);
        queue.submit(&chain);

        let queue_response = queue.process_all(None).unwrap();
        assert_eq!(chain.status(), ResponseStatus::Completed);
        // Chain plus its three children.
        assert_eq!(queue_response.num_commands_processed, 4);
        assert_eq!(queue_response.num_successes, 4);
        assert_eq!(chain.response().borrow().output_data, Some(3));
    }

    #[test]
    fn failure_in_the_middle_fails_the_chain_and_skips_the_rest() {
        let queue = CommandQueue::new();
        let chain = CommandChainBuilder::<i32, i32>::start::<AddOneCommand>(
            0,
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .then::<AddOneCommand, i32>(
            |number| AddOneArgs {
                number,
                should_fail: true,
                ..Default::default()
            },
            |response| response.result,
        )
        .then::<AddOneCommand, i32>(
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .build(&queue);
        queue.submit(&chain);

        let queue_response = queue.process_all(None).unwrap();
        assert_eq!(chain.status(), ResponseStatus::Failed);
        // Chain, the successful first step, and the failed second step.
        assert_eq!(queue_response.num_commands_processed, 3);
        assert!(chain.response().borrow().output_data.is_none());

        let failure_entry = queue_response
            .command_log
            .iter()
            .rev()
            .find(|entry| entry.command_kind == "CommandChain")
            .unwrap();
        assert_eq!(
            failure_entry.reason_text(),
            Some("Chain step 2 (AddOneCommand) ended with status Failed")
        );
    }

    #[test]
    fn canceled_first_step_fails_the_chain() {
        let queue = CommandQueue::new();
        let chain = CommandChainBuilder::<i32, i32>::start::<AddOneCommand>(
            0,
            |number| AddOneArgs {
                number,
                should_cancel: true,
                ..Default::default()
            },
            |response| response.result,
        )
        .then::<AddOneCommand, i32>(
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .then::<AddOneCommand, i32>(
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .build(&queue);
        queue.submit(&chain);

        let queue_response = queue.process_all(None).unwrap();
        assert_eq!(chain.status(), ResponseStatus::Failed);
        // Chain plus the canceled first step; steps two and three never ran.
        assert_eq!(queue_response.num_commands_processed, 2);
        assert_eq!(queue_response.num_cancellations, 1);
        assert!(chain.response().borrow().output_data.is_none());
    }

    #[test]
    fn single_step_chain_completes_with_the_extracted_value() {
        let queue = CommandQueue::new();
        let chain = CommandChainBuilder::<i32, i32>::start::<AddOneCommand>(
            41,
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .build(&queue);
        queue.submit(&chain);

        let queue_response = queue.process_all(None).unwrap();
        assert_eq!(queue_response.num_commands_processed, 2);
        assert_eq!(chain.response().borrow().output_data, Some(42));
    }

    #[test]
    fn then_narrows_the_value_type() {
        let queue = CommandQueue::new();
        let chain = CommandChainBuilder::<i32, i32>::start::<AddOneCommand>(
            41,
            |number| AddOneArgs {
                number,
                ..Default::default()
            },
            |response| response.result,
        )
        .then::<Stringify, String>(
            |number| StringifyArgs { number },
            |response| response.text.clone(),
        )
        .build(&queue);
        queue.submit(&chain);

        queue.process_all(None).unwrap();
        assert_eq!(chain.status(), ResponseStatus::Completed);
        assert_eq!(
            chain.response().borrow().output_data,
            Some("42".to_string())
        );
    }
}
