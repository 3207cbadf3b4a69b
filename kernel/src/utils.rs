//! Small helpers shared across the crate.

/// Convenience macro for checking invariants: returns the second argument as
/// an `Err` if the boolean expression is false.
macro_rules! require {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}

pub(crate) use require;
