//! Helper functions that don't belong elsewhere
//!
//! Small functions and data structures shared by the services and libraries of this crate.

mod backoff;
mod pacing;

use std::{num::ParseIntError, time::Duration};

pub use backoff::Backoff;
pub use pacing::{Pacing, PacingError};

/// Parses a Duration from a string containing seconds.
/// Useful for command line parsing
pub fn parse_seconds(src: &str) -> Result<Duration, ParseIntError> {
    let seconds = src.parse::<u64>()?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_are_parsed() {
        assert_eq!(parse_seconds("42"), Ok(Duration::from_secs(42)));
        assert!(parse_seconds("1.5").is_err());
        assert!(parse_seconds("-3").is_err());
    }
}
