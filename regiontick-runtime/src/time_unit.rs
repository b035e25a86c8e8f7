use std::time::Duration;

/// Wall-clock length of one host tick.
pub const MILLIS_PER_TICK: u64 = 50;

/// Convert ticks to milliseconds at the fixed host ratio.
///
/// Saturates instead of overflowing; zero stays zero.
pub fn ticks_to_millis(ticks: u64) -> u64 {
    ticks.saturating_mul(MILLIS_PER_TICK)
}

pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::from_millis(ticks_to_millis(ticks))
}

/// Time unit used by hosts that express delays in wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl std::str::FromStr for TimeUnit {
    type Err = String;

    /// Accepts the full unit names in any case, e.g. "seconds" or "Seconds".
    /// For shorthand like "5s" or "50ms", use `parse_duration` instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "milliseconds" => Ok(TimeUnit::Milliseconds),
            "seconds" => Ok(TimeUnit::Seconds),
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            "days" => Ok(TimeUnit::Days),
            _ => Err(format!("Invalid time unit: {}", s)),
        }
    }
}

impl TimeUnit {
    pub fn to_millis(&self, value: u64) -> u64 {
        match self {
            TimeUnit::Milliseconds => value,
            TimeUnit::Seconds => value.saturating_mul(1000),
            TimeUnit::Minutes => value.saturating_mul(60_000),
            TimeUnit::Hours => value.saturating_mul(3_600_000),
            TimeUnit::Days => value.saturating_mul(86_400_000),
        }
    }

    pub fn to_duration(&self, value: u64) -> Duration {
        Duration::from_millis(self.to_millis(value))
    }

    /// Parse a duration string like "50ms", "5s", "10m", "2h"
    ///
    /// Strict rules:
    /// - Only lowercase suffixes are accepted: "ms", "s", "m", "h", "d"
    /// - Format must be `<number><suffix>` with no space in between
    pub fn parse_duration(s: &str) -> Option<(u64, TimeUnit)> {
        let s = s.trim();

        let split_pos = s.find(|c: char| !c.is_ascii_digit())?;
        if split_pos == 0 {
            return None;
        }

        let (num_str, unit_str) = s.split_at(split_pos);
        let value = num_str.parse::<u64>().ok()?;

        let time_unit = match unit_str {
            "ms" => TimeUnit::Milliseconds,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            _ => return None,
        };

        Some((value, time_unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_convert_at_fifty_millis() {
        assert_eq!(ticks_to_millis(0), 0);
        assert_eq!(ticks_to_millis(1), 50);
        assert_eq!(ticks_to_millis(20), 1000);
        assert_eq!(ticks_to_millis(20 * 60 * 60 * 4), 4 * 60 * 60 * 1000);
        assert_eq!(ticks_to_duration(40), Duration::from_secs(2));
    }

    #[test]
    fn huge_tick_counts_saturate() {
        assert_eq!(ticks_to_millis(u64::MAX), u64::MAX);
    }

    #[test]
    fn parses_shorthand_durations() {
        assert_eq!(
            TimeUnit::parse_duration("50ms"),
            Some((50, TimeUnit::Milliseconds))
        );
        assert_eq!(TimeUnit::parse_duration(" 2s "), Some((2, TimeUnit::Seconds)));
        assert_eq!(TimeUnit::parse_duration("3m"), Some((3, TimeUnit::Minutes)));
        assert_eq!(TimeUnit::parse_duration("50"), None);
        assert_eq!(TimeUnit::parse_duration("ms"), None);
        assert_eq!(TimeUnit::parse_duration("5S"), None);
    }

    #[test]
    fn parses_full_unit_names() {
        assert_eq!("Seconds".parse::<TimeUnit>(), Ok(TimeUnit::Seconds));
        assert!("fortnights".parse::<TimeUnit>().is_err());
        assert_eq!(TimeUnit::Hours.to_millis(2), 7_200_000);
    }
}
