// Copyright 2026 The opal developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Timestamp codecs for the two on-disk clock formats: DOS date-time words
//! (2-second resolution, 1980 epoch, local wall time) and NTFS 100-ns ticks
//! since 1601-01-01 UTC.

use std::time::{SystemTime, UNIX_EPOCH};

/// A UTC instant, seconds and nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// 1980-01-01T00:00:00Z, the DOS epoch and the stand-in for timestamps
    /// outside the representable DOS range.
    pub const DOS_EPOCH: Timestamp = Timestamp {
        secs: 315_532_800,
        nanos: 0,
    };

    pub const fn from_unix(secs: i64) -> Self {
        Self { secs, nanos: 0 }
    }

    /// Shift into the wall time of the given zone. The result is still a
    /// `Timestamp`, reinterpreted as local wall clock.
    pub fn to_local(self, zone: TimeZone) -> Self {
        Self {
            secs: self.secs + zone.offset_minutes() as i64 * 60,
            nanos: self.nanos,
        }
    }

    /// Inverse of [`Timestamp::to_local`].
    pub fn to_utc(self, zone: TimeZone) -> Self {
        Self {
            secs: self.secs - zone.offset_minutes() as i64 * 60,
            nanos: self.nanos,
        }
    }
}

/// The zone used to render "local" forms of the timestamp accessors.
///
/// `Fixed` carries minutes east of UTC. There is no host-zone lookup; callers
/// that want local rendering configure an explicit offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeZone {
    #[default]
    Utc,
    Fixed(i32),
}

impl TimeZone {
    pub fn offset_minutes(self) -> i32 {
        match self {
            TimeZone::Utc => 0,
            TimeZone::Fixed(minutes) => minutes,
        }
    }
}

/// UTC time source for stamping created/written times on mutations.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(elapsed) => Timestamp {
                secs: elapsed.as_secs() as i64,
                nanos: elapsed.subsec_nanos(),
            },
            Err(_) => Timestamp::default(),
        }
    }
}

/// Fixed instant, for deterministic stamping in tests.
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

const SECS_PER_DAY: i64 = 86_400;

/// Seconds between 1601-01-01 and 1970-01-01.
const NTFS_TO_UNIX_SECS: i64 = 11_644_473_600;

// Civil-date conversions after Howard Hinnant's algorithms; both directions
// operate on days relative to 1970-01-01.

fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = (if year >= 0 { year } else { year - 399 }) / 400;
    let year_of_era = year - era * 400;
    let month_shifted = (if month > 2 { month - 3 } else { month + 9 }) as i64;
    let day_of_year = (153 * month_shifted + 2) / 5 + day as i64 - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let days = days + 719_468;
    let era = if days >= 0 { days } else { days - 146_096 } / 146_097;
    let day_of_era = days - era * 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let year = year_of_era + era * 400;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_shifted = (5 * day_of_year + 2) / 153;
    let day = (day_of_year - (153 * month_shifted + 2) / 5 + 1) as u32;
    let month = (if month_shifted < 10 {
        month_shifted + 3
    } else {
        month_shifted - 9
    }) as u32;
    (if month <= 2 { year + 1 } else { year }, month, day)
}

/// Decode a DOS date/time word pair plus the tenths-of-a-second refinement
/// byte. Year is 1980 + bits 15..9 of the date; the time word has 2-second
/// resolution.
pub fn from_dos(date: u16, time: u16, tenths: u8) -> Timestamp {
    let year = 1980 + (date >> 9) as i64;
    let month = ((date >> 5) & 0x0F).clamp(1, 12) as u32;
    let day = (date & 0x1F).max(1) as u32;
    let hour = ((time >> 11) & 0x1F) as i64;
    let minute = ((time >> 5) & 0x3F) as i64;
    let second = 2 * (time & 0x1F) as i64;
    let extra = tenths.min(199) as u64 * 10_000_000;
    Timestamp {
        secs: days_from_civil(year, month, day) * SECS_PER_DAY
            + hour * 3600
            + minute * 60
            + second
            + (extra / 1_000_000_000) as i64,
        nanos: (extra % 1_000_000_000) as u32,
    }
}

/// Encode into `(date, time, tenths)`. Instants outside 1980..=2107 collapse
/// to the respective bound.
pub fn to_dos(timestamp: Timestamp) -> (u16, u16, u8) {
    let secs = timestamp.secs.clamp(
        Timestamp::DOS_EPOCH.secs,
        days_from_civil(2107, 12, 31) * SECS_PER_DAY + SECS_PER_DAY - 1,
    );
    let days = secs.div_euclid(SECS_PER_DAY);
    let mut rest = secs.rem_euclid(SECS_PER_DAY);
    let (year, month, day) = civil_from_days(days);
    let hour = rest / 3600;
    rest %= 3600;
    let minute = rest / 60;
    let second = rest % 60;
    let date = (((year - 1980) as u16) << 9) | ((month as u16) << 5) | day as u16;
    let time = ((hour as u16) << 11) | ((minute as u16) << 5) | (second / 2) as u16;
    let tenths = (second % 2) * 100 + (timestamp.nanos / 10_000_000) as i64;
    (date, time, tenths as u8)
}

/// Decode NTFS 100-ns ticks since 1601-01-01 UTC.
pub fn from_ntfs(ticks: u64) -> Timestamp {
    let secs = (ticks / 10_000_000) as i64 - NTFS_TO_UNIX_SECS;
    let nanos = (ticks % 10_000_000) as u32 * 100;
    Timestamp { secs, nanos }
}

/// Encode into NTFS ticks; instants before 1601 clamp to zero.
pub fn to_ntfs(timestamp: Timestamp) -> u64 {
    let secs = timestamp.secs + NTFS_TO_UNIX_SECS;
    if secs < 0 {
        return 0;
    }
    secs as u64 * 10_000_000 + (timestamp.nanos / 100) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_epoch_roundtrip() {
        let (date, time, tenths) = to_dos(Timestamp::DOS_EPOCH);
        assert_eq!(date, 1 << 5 | 1);
        assert_eq!(time, 0);
        assert_eq!(tenths, 0);
        assert_eq!(from_dos(date, time, tenths), Timestamp::DOS_EPOCH);
    }

    #[test]
    fn dos_known_instant() {
        // 2004-06-15 20:15:30 UTC
        let timestamp = Timestamp::from_unix(1_087_330_530);
        let (date, time, tenths) = to_dos(timestamp);
        assert_eq!(date >> 9, 24);
        assert_eq!((date >> 5) & 0x0F, 6);
        assert_eq!(date & 0x1F, 15);
        assert_eq!(time >> 11, 20);
        assert_eq!((time >> 5) & 0x3F, 15);
        assert_eq!(time & 0x1F, 15);
        assert_eq!(tenths, 0);
        assert_eq!(from_dos(date, time, tenths), timestamp);
    }

    #[test]
    fn dos_clamps_pre_epoch() {
        let (date, time, _) = to_dos(Timestamp::from_unix(0));
        assert_eq!(from_dos(date, time, 0), Timestamp::DOS_EPOCH);
    }

    #[test]
    fn dos_odd_second_in_tenths() {
        let timestamp = Timestamp {
            secs: Timestamp::DOS_EPOCH.secs + 3,
            nanos: 250_000_000,
        };
        let (date, time, tenths) = to_dos(timestamp);
        assert_eq!(time & 0x1F, 1);
        assert_eq!(tenths, 125);
        assert_eq!(from_dos(date, time, tenths), timestamp);
    }

    #[test]
    fn ntfs_unix_epoch() {
        assert_eq!(to_ntfs(Timestamp::from_unix(0)), 116_444_736_000_000_000);
        assert_eq!(from_ntfs(116_444_736_000_000_000), Timestamp::from_unix(0));
    }

    #[test]
    fn ntfs_roundtrip_with_nanos() {
        let timestamp = Timestamp {
            secs: 1_700_000_000,
            nanos: 123_456_700,
        };
        assert_eq!(from_ntfs(to_ntfs(timestamp)), timestamp);
    }

    #[test]
    fn local_shift() {
        let zone = TimeZone::Fixed(-90);
        let timestamp = Timestamp::from_unix(10_000);
        assert_eq!(timestamp.to_local(zone).secs, 10_000 - 5400);
        assert_eq!(timestamp.to_local(zone).to_utc(zone), timestamp);
    }
}
