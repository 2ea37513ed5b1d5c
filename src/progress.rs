//! Progress reporting for long-running operations.
//!
//! Loading a whole BAM file, loading its index, and walking the chunks of a
//! region query can each take a while on large datasets. The caller supplies a
//! [`ProgressFn`]; the library invokes it synchronously, on the calling
//! thread, at interior progress points (per block, per reference, per chunk)
//! with a percentage in `0.0..=100.0`, and once with the sentinel `-1.0` when
//! the operation finishes.

use std::io::Write;

/// Callback reporting progress of an operation as a percentage (0.0-100.0).
///
/// The sentinel value `-1.0` signals the end of processing.
pub type ProgressFn = Box<dyn Fn(f64)>;

/// A progress callback that does nothing.
pub fn null_progress() -> ProgressFn {
    Box::new(|_percent| {})
}

/// A progress callback that reports to standard error.
///
/// Prints a carriage-return-updated percentage line, and `Done` on the
/// completion sentinel.
pub fn stderr_progress() -> ProgressFn {
    Box::new(|percent| {
        let mut stderr = std::io::stderr();
        if percent < 0.0 {
            let _ = writeln!(stderr, "\r Done   ");
            return;
        }
        let _ = write!(stderr, "\r{:7.2}%", percent);
        let _ = stderr.flush();
    })
}
