use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Rotation schedule and file naming for the writer loop.
///
/// The writer asks for [`Switcher::first_delay`] once at startup and uses
/// [`Switcher::next_interval`] for every later rotation, so wall-clock time
/// is only consulted for the first boundary and for naming files.
pub trait Switcher: Send + Sync + fmt::Debug {
    /// Time from now until the first rotation boundary.
    fn first_delay(&self) -> Duration;

    /// Fixed period between subsequent rotations.
    fn next_interval(&self) -> Duration;

    /// Target directory and file stem (no extension) for the current time.
    fn target_path(&self, base_dir: &Path) -> (PathBuf, String);
}

/// Rotate at local midnight.
///
/// Layout: `{base}/{YYYY-MM}/{YYYY-MM-DD}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByDay;

impl ByDay {
    pub fn first_delay_at(&self, now: DateTime<Local>) -> Duration {
        let midnight = now
            .date_naive()
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0));
        until(now, midnight, DAY)
    }

    pub fn target_path_at(&self, base_dir: &Path, now: DateTime<Local>) -> (PathBuf, String) {
        let dir = base_dir.join(now.format("%Y-%m").to_string());
        (dir, now.format("%Y-%m-%d").to_string())
    }
}

impl Switcher for ByDay {
    fn first_delay(&self) -> Duration {
        self.first_delay_at(Local::now())
    }

    fn next_interval(&self) -> Duration {
        DAY
    }

    fn target_path(&self, base_dir: &Path) -> (PathBuf, String) {
        self.target_path_at(base_dir, Local::now())
    }
}

/// Rotate at every local top-of-hour.
///
/// Layout: `{base}/{YYYY-MM}/{YYYY-MM-DD}/{YYYY-MM-DD}_{HH}` with a 24-hour `HH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByHour;

impl ByHour {
    pub fn first_delay_at(&self, now: DateTime<Local>) -> Duration {
        let next_hour = now
            .naive_local()
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .and_then(|t| t.checked_add_signed(ChronoDuration::hours(1)));
        until(now, next_hour, HOUR)
    }

    pub fn target_path_at(&self, base_dir: &Path, now: DateTime<Local>) -> (PathBuf, String) {
        let dir = base_dir
            .join(now.format("%Y-%m").to_string())
            .join(now.format("%Y-%m-%d").to_string());
        (dir, now.format("%Y-%m-%d_%H").to_string())
    }
}

impl Switcher for ByHour {
    fn first_delay(&self) -> Duration {
        self.first_delay_at(Local::now())
    }

    fn next_interval(&self) -> Duration {
        HOUR
    }

    fn target_path(&self, base_dir: &Path) -> (PathBuf, String) {
        self.target_path_at(base_dir, Local::now())
    }
}

/// Resolve a local wall-clock boundary and return the time left until it.
///
/// A boundary that falls into a DST gap resolves to the earliest valid
/// instant; when nothing resolves, `fallback` is used.
fn until(now: DateTime<Local>, boundary: Option<NaiveDateTime>, fallback: Duration) -> Duration {
    let Some(boundary) = boundary else {
        return fallback;
    };
    let resolved = Local
        .from_local_datetime(&boundary)
        .earliest()
        .or_else(|| {
            // Gap: the wall-clock time does not exist, step past it.
            Local
                .from_local_datetime(&(boundary + ChronoDuration::hours(1)))
                .earliest()
        });
    match resolved {
        Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO),
        None => fallback,
    }
}

/// Built-in switching modes, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    #[default]
    Day,
    Hour,
}

impl SwitchMode {
    pub fn switcher(self) -> Arc<dyn Switcher> {
        match self {
            SwitchMode::Day => Arc::new(ByDay),
            SwitchMode::Hour => Arc::new(ByHour),
        }
    }
}

impl fmt::Display for SwitchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchMode::Day => f.write_str("day"),
            SwitchMode::Hour => f.write_str("hour"),
        }
    }
}

/// Error returned when parsing an unknown [`SwitchMode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown switch mode {0:?}, expected \"day\" or \"hour\"")]
pub struct UnknownSwitchMode(pub String);

impl FromStr for SwitchMode {
    type Err = UnknownSwitchMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(SwitchMode::Day),
            "hour" | "hourly" | "hours" => Ok(SwitchMode::Hour),
            other => Err(UnknownSwitchMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .earliest()
            .expect("valid local time")
    }

    #[test]
    fn by_day_paths() {
        let now = local(2024, 3, 7, 15, 30, 0);
        let (dir, stem) = ByDay.target_path_at(Path::new("/logs"), now);
        assert_eq!(dir, PathBuf::from("/logs/2024-03"));
        assert_eq!(stem, "2024-03-07");
    }

    #[test]
    fn by_hour_paths_use_24_hour_clock() {
        let now = local(2024, 3, 7, 15, 30, 0);
        let (dir, stem) = ByHour.target_path_at(Path::new("/logs"), now);
        assert_eq!(dir, PathBuf::from("/logs/2024-03/2024-03-07"));
        assert_eq!(stem, "2024-03-07_15");
    }

    #[test]
    fn by_day_first_delay_reaches_midnight() {
        // Mid-month, far from DST transitions in common zones.
        let now = local(2024, 6, 12, 23, 0, 0);
        let delay = ByDay.first_delay_at(now);
        assert_eq!(delay, Duration::from_secs(60 * 60));
    }

    #[test]
    fn by_hour_first_delay_reaches_top_of_hour() {
        let now = local(2024, 6, 12, 10, 45, 30);
        let delay = ByHour.first_delay_at(now);
        assert_eq!(delay, Duration::from_secs(14 * 60 + 30));
    }

    #[test]
    fn first_delay_never_exceeds_interval() {
        let now = Local::now();
        assert!(ByDay.first_delay_at(now) <= ByDay.next_interval() + HOUR);
        assert!(ByHour.first_delay_at(now) <= ByHour.next_interval() + HOUR);
    }

    #[test]
    fn fixed_intervals() {
        assert_eq!(ByDay.next_interval(), DAY);
        assert_eq!(ByHour.next_interval(), HOUR);
    }

    #[test]
    fn switch_mode_parses() {
        assert_eq!("day".parse::<SwitchMode>().unwrap(), SwitchMode::Day);
        assert_eq!("Hour".parse::<SwitchMode>().unwrap(), SwitchMode::Hour);
        assert!("weekly".parse::<SwitchMode>().is_err());
    }

    #[test]
    fn switch_mode_serde_is_lowercase() {
        let json = serde_json::to_string(&SwitchMode::Hour).unwrap();
        assert_eq!(json, "\"hour\"");
        let mode: SwitchMode = serde_json::from_str("\"day\"").unwrap();
        assert_eq!(mode, SwitchMode::Day);
    }
}
