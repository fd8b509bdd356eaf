#![allow(dead_code)]

pub use procgate_test_utils::{init_tracing, with_timeout};

use procgate::exec::Invocation;

/// `sh -c <script>` with the given stdin.
pub fn sh(script: &str, stdin: &str) -> Invocation {
    Invocation::new("sh").args(["-c", script]).stdin(stdin)
}

/// `cat`, which echoes its stdin to stdout.
pub fn cat(stdin: &str) -> Invocation {
    Invocation::new("cat").stdin(stdin)
}
