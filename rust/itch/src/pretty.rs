//! Formatting of the fixed-point prices and time-of-day timestamps found in ITCH
//! messages.

use std::fmt;

use time::format_description::BorrowedFormatItem;

use crate::{Error, Price4, Price8, Result, NANOS_PER_DAY, PRICE4_SCALE, PRICE8_SCALE};

const NANOS_PER_SEC: u64 = 1_000_000_000;
const CLOCK_FORMAT: &[BorrowedFormatItem<'static>] =
    time::macros::format_description!("[hour]:[minute]:[second].[subsecond digits:9]");
const CLOCK_PARSE_FORMAT: &[BorrowedFormatItem<'static>] =
    time::macros::format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]");

/// A [new type](https://doc.rust-lang.org/rust-by-example/generics/new_types.html)
/// for formatting ITCH timestamps, which count nanoseconds since midnight, as
/// `HH:MM:SS.nnnnnnnnn`.
///
/// Supports width, fill and alignment. Values of a day or more fall back to
/// integer formatting.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Ts(pub u64);

impl From<u64> for Ts {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match clock_time(self.0).and_then(|t| t.format(CLOCK_FORMAT).ok()) {
            Some(clock) => f.pad(&clock),
            None => fmt::Display::fmt(&self.0, f),
        }
    }
}

fn clock_time(ts: u64) -> Option<time::Time> {
    if ts >= NANOS_PER_DAY {
        return None;
    }
    let secs = ts / NANOS_PER_SEC;
    time::Time::from_hms_nano(
        (secs / 3600) as u8,
        (secs / 60 % 60) as u8,
        (secs % 60) as u8,
        (ts % NANOS_PER_SEC) as u32,
    )
    .ok()
}

/// Converts a timestamp in nanoseconds since midnight to `HH:MM:SS.nnnnnnnnn`.
pub fn fmt_ts(ts: u64) -> String {
    Ts(ts).to_string()
}

/// Parses a time of day given either as an integer count of nanoseconds since
/// midnight or as `HH:MM:SS` with an optional fraction of a second.
///
/// # Errors
/// This function returns an [`Error::BadArgument`] if `s` is in neither format or
/// falls outside of a day.
pub fn parse_ts(s: &str) -> Result<u64> {
    let s = s.trim();
    if let Ok(ts) = s.parse::<u64>() {
        if ts >= NANOS_PER_DAY {
            return Err(Error::bad_argument(
                "s",
                format!("{ts} is past the end of the day"),
            ));
        }
        return Ok(ts);
    }
    let time = time::Time::parse(s, CLOCK_PARSE_FORMAT).map_err(|e| {
        Error::bad_argument(
            "s",
            format!("'{s}' is neither nanoseconds nor HH:MM:SS[.fraction]: {e}"),
        )
    })?;
    let secs = u64::from(time.hour()) * 3600
        + u64::from(time.minute()) * 60
        + u64::from(time.second());
    Ok(secs * NANOS_PER_SEC + u64::from(time.nanosecond()))
}

/// Formats a non-negative fixed-point value. By default all `decimals` places are
/// printed; precision `{:.N}` truncates to `N` places.
fn fmt_fixed(f: &mut fmt::Formatter<'_>, raw: u64, scale: u64, decimals: usize) -> fmt::Result {
    let integer = raw / scale;
    let fraction = raw % scale;
    match f.precision() {
        Some(0) => f.pad_integral(true, "", itoa::Buffer::new().format(integer)),
        Some(precision) if precision < decimals => {
            let divisor = 10u64.pow((decimals - precision) as u32);
            f.pad_integral(
                true,
                "",
                &format!("{integer}.{:0precision$}", fraction / divisor),
            )
        }
        Some(_) | None => {
            f.pad_integral(true, "", &format!("{integer}.{fraction:0decimals$}"))
        }
    }
}

impl fmt::Display for Price4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_fixed(
            f,
            u64::from(self.0),
            u64::from(PRICE4_SCALE),
            usize::from(Price4::DECIMALS),
        )
    }
}

impl fmt::Debug for Price4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

impl fmt::Display for Price8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_fixed(f, self.0, PRICE8_SCALE, usize::from(Price8::DECIMALS))
    }
}

impl fmt::Debug for Price8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::whole(1_500_000, "150.0000")]
    #[case::fraction(1_234_567, "123.4567")]
    #[case::sub_unit(25, "0.0025")]
    #[case::zero(0, "0.0000")]
    #[case::max(u32::MAX, "429496.7295")]
    fn test_fmt_price4(#[case] raw: u32, #[case] exp: &str) {
        assert_eq!(Price4(raw).to_string(), exp);
        assert_eq!(format!("{:?}", Price4(raw)), exp);
    }

    #[rstest]
    #[case::truncate(1_234_567, 2, "123.45")]
    #[case::integer(1_234_567, 0, "123")]
    #[case::extra(1_234_567, 6, "123.4567")]
    fn test_price4_precision(#[case] raw: u32, #[case] precision: usize, #[case] exp: &str) {
        assert_eq!(format!("{:.precision$}", Price4(raw)), exp);
    }

    #[test]
    fn test_price_alignment() {
        assert_eq!(format!("{:>10}", Price4(1_500_000)), "  150.0000");
        assert_eq!(format!("{:<10}", Price4(1_500_000)), "150.0000  ");
        assert_eq!(format!("{:010}", Price4(1_500_000)), "00150.0000");
    }

    #[test]
    fn test_fmt_price8() {
        assert_eq!(Price8(123_456_789_012).to_string(), "1234.56789012");
        assert_eq!(format!("{:.2}", Price8(123_456_789_012)), "1234.56");
    }

    #[rstest]
    #[case::midnight(0, "00:00:00.000000000")]
    #[case::open(34_200_000_000_000, "09:30:00.000000000")]
    #[case::nanos(34_200_000_000_001, "09:30:00.000000001")]
    #[case::last(NANOS_PER_DAY - 1, "23:59:59.999999999")]
    #[case::out_of_day(NANOS_PER_DAY, "86400000000000")]
    fn test_fmt_ts(#[case] ts: u64, #[case] exp: &str) {
        assert_eq!(fmt_ts(ts), exp);
    }

    #[test]
    fn test_ts_alignment() {
        assert_eq!(format!("{:>20}", Ts(0)), "  00:00:00.000000000");
        assert_eq!(format!("{:?}", Ts(5)), "5");
    }

    #[rstest]
    #[case::nanos("34200000000000", 34_200_000_000_000)]
    #[case::clock("09:30:00", 34_200_000_000_000)]
    #[case::millis("09:30:00.5", 34_200_500_000_000)]
    #[case::full("09:30:00.000000001", 34_200_000_000_001)]
    #[case::padded(" 16:00:00 ", 57_600_000_000_000)]
    fn test_parse_ts(#[case] s: &str, #[case] exp: u64) {
        assert_eq!(parse_ts(s).unwrap(), exp);
        if !s.contains(':') {
            return;
        }
        assert_eq!(parse_ts(&fmt_ts(exp)).unwrap(), exp);
    }

    #[rstest]
    #[case::garbage("noon")]
    #[case::hour_range("25:00:00")]
    #[case::past_day("86400000000000")]
    fn test_parse_ts_errors(#[case] s: &str) {
        assert!(matches!(parse_ts(s), Err(Error::BadArgument { .. })));
    }
}
