//! Timestamp normalization for written entries.
//!
//! ZIP headers store modification times as MS-DOS date/time fields: local
//! wall-clock time with two-second resolution, no zone, and a representable
//! range of 1980 through 2107. Every [`NaiveDateTime`] in this crate that
//! describes an entry follows the same convention (local wall clock).
//!
//! The writer does not carry original timestamps over. It stamps every
//! entry according to a [`TimestampPolicy`], evaluated against a single
//! [`RunClock`] captured when the writer is created, so all entries written
//! in one run agree with each other.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use ziprepack::timestamp::{RunClock, TimestampPolicy};
//!
//! let now = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
//! let clock = RunClock::new(now, 9 * 3600);
//!
//! let stamped = TimestampPolicy::RunClock.resolve(None, &clock);
//! assert_eq!(stamped.hour(), 21);
//! ```

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike,
};

/// Earliest instant representable in a DOS timestamp.
fn dos_min() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1980, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Latest instant representable in a DOS timestamp.
fn dos_max() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2107, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 58))
        .unwrap_or_default()
}

/// The wall clock and zone offset observed once at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    now_local: NaiveDateTime,
    offset_secs: i32,
}

impl RunClock {
    /// Creates a clock from an explicit local time and UTC offset.
    pub fn new(now_local: NaiveDateTime, offset_secs: i32) -> Self {
        Self {
            now_local,
            offset_secs,
        }
    }

    /// Captures the current local time and the local zone's UTC offset.
    pub fn capture() -> Self {
        let now = Local::now();
        Self::new(now.naive_local(), now.offset().local_minus_utc())
    }

    /// Returns the captured local wall-clock time.
    pub fn now_local(&self) -> NaiveDateTime {
        self.now_local
    }

    /// Returns the captured UTC offset in seconds (east positive).
    pub fn offset_secs(&self) -> i32 {
        self.offset_secs
    }

    /// Adds the captured UTC offset to a wall-clock time.
    pub fn shift(&self, time: NaiveDateTime) -> NaiveDateTime {
        time.checked_add_signed(Duration::seconds(i64::from(self.offset_secs)))
            .unwrap_or(time)
    }
}

/// How modification times are chosen for written entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
    /// The run's local wall-clock time plus the local UTC offset.
    ///
    /// Every entry in one archive gets the same stamp.
    #[default]
    RunClock,
    /// The entry's own modification time plus the local UTC offset.
    ///
    /// Falls back to [`TimestampPolicy::RunClock`] for entries without a
    /// recorded time.
    ShiftedMtime,
    /// A fixed time, for byte-reproducible archives.
    Fixed(NaiveDateTime),
}

impl TimestampPolicy {
    /// Computes the timestamp to store for an entry.
    pub fn resolve(&self, entry_mtime: Option<NaiveDateTime>, clock: &RunClock) -> zip::DateTime {
        let time = match self {
            Self::RunClock => clock.shift(clock.now_local()),
            Self::ShiftedMtime => clock.shift(entry_mtime.unwrap_or(clock.now_local())),
            Self::Fixed(time) => *time,
        };
        to_zip_datetime(time)
    }
}

/// Converts a wall-clock time to a ZIP timestamp, clamping to the DOS range.
pub fn to_zip_datetime(time: NaiveDateTime) -> zip::DateTime {
    let clamped = if time < dos_min() {
        log::warn!("timestamp {} predates 1980, clamping", time);
        dos_min()
    } else if time > dos_max() {
        log::warn!("timestamp {} is after 2107, clamping", time);
        dos_max()
    } else {
        time
    };

    // The clamp keeps every field inside the ranges zip accepts.
    zip::DateTime::from_date_and_time(
        clamped.year() as u16,
        clamped.month() as u8,
        clamped.day() as u8,
        clamped.hour() as u8,
        clamped.minute() as u8,
        clamped.second() as u8,
    )
    .unwrap_or_default()
}

/// Converts a ZIP timestamp to a wall-clock time.
///
/// Returns `None` for field combinations that do not name a real date.
pub fn from_zip_datetime(time: zip::DateTime) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(
        i32::from(time.year()),
        u32::from(time.month()),
        u32::from(time.day()),
    )?
    .and_hms_opt(
        u32::from(time.hour()),
        u32::from(time.minute()),
        u32::from(time.second()),
    )
}

/// Converts a Unix timestamp to local wall-clock time.
pub fn local_from_unix(secs: i64, nanos: u32) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, nanos).map(|utc| utc.with_timezone(&Local).naive_local())
}

/// Converts local wall-clock time to a Unix timestamp in seconds.
///
/// Ambiguous times (around DST transitions) resolve to the earlier instant.
pub fn unix_from_local(time: NaiveDateTime) -> Option<i64> {
    Local
        .from_local_datetime(&time)
        .earliest()
        .map(|dt| dt.timestamp())
}
