//! Small helper macros shared across the reconcilers.

/// Logs an error that would otherwise be lost by an iterator filter, then
/// yields `None` so the caller can keep going — used wherever a tick must
/// continue past one scanner's or one task's failure (e.g. §4.5.2 step 5).
#[doc(hidden)]
#[macro_export]
macro_rules! log_err {
    ($result:expr) => {
        match $result {
            Ok(val) => Some(val),
            Err(error) => {
                tracing::event!(tracing::Level::ERROR, error = %error);
                None
            }
        }
    };
}
