use crate::error::{self, Result};
use snafu::{ensure, OptionExt, ResultExt};
use std::time::Duration;

/// Duration units, largest first, with their length in seconds.
const UNITS: [(char, u64); 4] = [('d', 86400), ('h', 3600), ('m', 60), ('s', 1)];

/// How long to wait before creating an object that `observe` did not find. Gives the backend time
/// to make a just-created object visible.
pub(crate) const CREATE_DELAY: Duration = Duration::from_secs(3);

/// Per-item retry backoff.
pub(crate) const RETRY_BASE_DELAY: Duration = Duration::from_secs(3);
pub(crate) const RETRY_MAX_DELAY: Duration = Duration::from_secs(180);

/// Overall retry throughput.
pub(crate) const RETRY_QPS: f64 = 10.0;
pub(crate) const RETRY_BURST: u32 = 100;

/// Pause before resuming a failed watch.
pub(crate) const WATCH_ERROR_DELAY: Duration = Duration::from_secs(1);

/// Parses durations like `1d2h3m4s`. Units must appear largest first and at most once; a
/// trailing number without a unit counts as seconds.
pub(crate) fn parse_duration(input: &str) -> Result<Duration> {
    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut remaining_units = &UNITS[..];
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let index = remaining_units
            .iter()
            .position(|(unit, _)| *unit == c)
            .context(error::DurationSnafu { input })?;
        ensure!(!digits.is_empty(), error::DurationSnafu { input });
        let count: u64 = digits.parse().context(error::DurationNumberSnafu { input })?;
        total = count
            .checked_mul(remaining_units[index].1)
            .and_then(|seconds| total.checked_add(seconds))
            .context(error::DurationSnafu { input })?;
        remaining_units = &remaining_units[index + 1..];
        digits.clear();
    }
    if !digits.is_empty() {
        ensure!(
            remaining_units.iter().any(|(unit, _)| *unit == 's'),
            error::DurationSnafu { input }
        );
        let seconds: u64 = digits.parse().context(error::DurationNumberSnafu { input })?;
        total = total
            .checked_add(seconds)
            .context(error::DurationSnafu { input })?;
    }
    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn units_add_up() {
        assert_eq!(parse_duration("1d2h3m4s").unwrap(), Duration::from_secs(93784));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert_eq!(parse_duration("1h5m").unwrap(), Duration::from_secs(3900));
        assert_eq!(parse_duration("1h30s").unwrap(), Duration::from_secs(3630));
    }

    #[test]
    fn bare_numbers_are_seconds() {
        assert_eq!(parse_duration("5123").unwrap(), Duration::from_secs(5123));
        assert_eq!(parse_duration("2m5").unwrap(), Duration::from_secs(125));
        assert!(parse_duration("4s5").is_err());
    }

    #[test]
    fn malformed_durations() {
        assert!(parse_duration("10d5m3h2s").is_err());
        assert!(parse_duration("5y40s").is_err());
        assert!(parse_duration("5hm4s").is_err());
        assert!(parse_duration("3m3m").is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert!(parse_duration("213503982334602d").is_err());
        assert!(parse_duration("18446744073709551615d").is_err());
        assert!(parse_duration("1d18446744073709551615").is_err());
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }
}
