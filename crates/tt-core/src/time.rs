//! Time utilities for the testbed

use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is set before the Unix epoch; pin records
/// only use the value for display.
///
/// # Examples
/// ```
/// use tt_core::time::current_time_millis;
///
/// let now = current_time_millis();
/// assert!(now > 0);
/// ```
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_millis_advances() {
        let a = current_time_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = current_time_millis();
        assert!(b >= a);
    }
}
