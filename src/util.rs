/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use chrono::{Datelike, Timelike, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix epoch in whole seconds.
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// The SRP `TIMESTAMP` parameter: `Www MMM D HH:MM:SS UTC YYYY`, POSIX C
/// locale, UTC, with no leading zero on the day-of-month.
pub fn srp_timestamp_now() -> String {
    srp_timestamp(Utc::now())
}

fn srp_timestamp(now: chrono::DateTime<Utc>) -> String {
    format!(
        "{} {} {} {:02}:{:02}:{:02} UTC {}",
        WEEKDAYS[now.weekday().num_days_from_monday() as usize],
        MONTHS[now.month0() as usize],
        now.day(),
        now.hour(),
        now.minute(),
        now.second(),
        now.year()
    )
}

/// Default device name used during device confirmation when the host
/// application does not supply one.
pub fn default_device_name() -> String {
    "default-device".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn srp_timestamp_has_no_leading_zero_on_day() {
        let dt = Utc.with_ymd_and_hms(2023, 3, 2, 4, 5, 6).unwrap();
        assert_eq!(srp_timestamp(dt), "Thu Mar 2 04:05:06 UTC 2023");
    }

    #[test]
    fn srp_timestamp_double_digit_day() {
        let dt = Utc.with_ymd_and_hms(2023, 11, 23, 4, 5, 6).unwrap();
        assert_eq!(srp_timestamp(dt), "Thu Nov 23 04:05:06 UTC 2023");
    }

    #[test]
    fn now_secs_is_a_plausible_unix_timestamp() {
        // Sanity bound: any time after 2020-01-01.
        assert!(now_secs() > 1_577_836_800);
    }
}
