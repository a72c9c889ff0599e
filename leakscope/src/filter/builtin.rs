//! Goroutines every Go program may have that are never leaks.

use crate::domain::TaskStack;

/// Ignore rules installed after any caller filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinRule {
    /// Background goroutines of the `testing` package blocked on a channel.
    TestRunner,
    /// CGo callback threads parked in a syscall.
    Syscall,
    /// The `os/signal` delivery loop.
    SignalLoop,
    /// The execution tracer reader.
    Tracer,
}

pub const BUILTIN_RULES: [BuiltinRule; 4] =
    [BuiltinRule::TestRunner, BuiltinRule::Syscall, BuiltinRule::SignalLoop, BuiltinRule::Tracer];

/// Top functions of goroutines the test runner parks while tests execute.
const TEST_RUNNER_FUNCTIONS: [&str; 5] = [
    "testing.RunTests",
    "testing.(*T).Run",
    "testing.(*T).Parallel",
    "testing.runFuzzing",
    "testing.runFuzzTests",
];

impl BuiltinRule {
    pub fn ignores(self, stack: &TaskStack) -> bool {
        match self {
            BuiltinRule::TestRunner => {
                TEST_RUNNER_FUNCTIONS.contains(&stack.first_function())
                    && stack.state().starts_with("chan receive")
            }
            BuiltinRule::Syscall => {
                stack.has_function("runtime.goexit") && stack.state().starts_with("syscall")
            }
            BuiltinRule::SignalLoop => {
                // The top function was renamed between Go releases.
                matches!(stack.first_function(), "os/signal.signal_recv" | "os/signal.loop")
                    || stack.has_function("runtime.ensureSigM")
            }
            BuiltinRule::Tracer => stack.has_function("runtime.ReadTrace"),
        }
    }
}
