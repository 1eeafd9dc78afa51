use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// Julian date of 1970-01-01T00:00:00.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Accepted layouts of the reference date after `since`.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const NO_LEAP: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const ALL_LEAP: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const DAY_360: [u32; 12] = [30; 12];

/// Calendar a time axis is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Calendar {
    /// Proleptic Gregorian.
    Standard,
    /// Every year has the same month lengths.
    Fixed(&'static [u32; 12]),
}

impl Calendar {
    fn parse(name: Option<&str>) -> Result<Self> {
        let Some(name) = name else {
            return Ok(Calendar::Standard);
        };
        Ok(match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => Calendar::Standard,
            "noleap" | "365_day" => Calendar::Fixed(&NO_LEAP),
            "all_leap" | "366_day" => Calendar::Fixed(&ALL_LEAP),
            "360_day" => Calendar::Fixed(&DAY_360),
            other => bail!("unsupported calendar \"{other}\""),
        })
    }
}

/// Convert a CF-style time axis (`"<unit> since <date>"`) to Julian dates.
///
/// Standard calendars convert exactly. Fixed-length-year calendars (`noleap`,
/// `all_leap`, `360_day` and their aliases) are decoded to a year and month
/// in their own calendar, then the position inside that month is scaled onto
/// the real Gregorian month.
pub fn to_julian_date(values: &[f64], units: &str, calendar: Option<&str>) -> Result<Vec<f64>> {
    let calendar = Calendar::parse(calendar)?;

    let (unit, reference) = units
        .split_once(" since ")
        .with_context(|| format!("time units \"{units}\" lack \"since\""))?;

    let scale = match unit.trim().to_ascii_lowercase().as_str() {
        "days" | "day" | "d" => 1.0,
        "hours" | "hour" | "h" => 1.0 / 24.0,
        "minutes" | "minute" | "min" => 1.0 / 1440.0,
        "seconds" | "second" | "s" => 1.0 / SECONDS_PER_DAY,
        other => bail!("unsupported time unit \"{other}\""),
    };

    let reference = parse_reference(reference.trim())
        .with_context(|| format!("invalid reference date in \"{units}\""))?;

    match calendar {
        Calendar::Standard => {
            let origin = gregorian_julian_date(reference);
            Ok(values.iter().map(|v| origin + v * scale).collect())
        }
        Calendar::Fixed(months) => {
            let origin = fixed_day_count(months, reference)
                .with_context(|| format!("invalid reference date in \"{units}\""))?;
            values
                .iter()
                .map(|v| fixed_to_julian_date(months, origin + v * scale))
                .collect()
        }
    }
}

/// Parse `YYYY-MM-DD[( |T)hh:mm[:ss[.fff]]][Z]`.
fn parse_reference(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim_end_matches('Z');
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("\"{s}\" is not a valid date"))?;
    midnight(date)
}

fn midnight(date: NaiveDate) -> Result<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0)
        .with_context(|| format!("no midnight on {date}"))
}

fn gregorian_julian_date(dt: NaiveDateTime) -> f64 {
    // NaiveDateTime::default() is 1970-01-01T00:00:00.
    let elapsed = dt.signed_duration_since(NaiveDateTime::default());
    UNIX_EPOCH_JD + elapsed.num_milliseconds() as f64 / (SECONDS_PER_DAY * 1000.0)
}

/// Days since year 0 of `dt`, counted with fixed month lengths.
fn fixed_day_count(months: &[u32; 12], dt: NaiveDateTime) -> Result<f64> {
    let month = dt.month0() as usize;
    if dt.day() > months[month] {
        bail!("{} does not exist in this calendar", dt.date());
    }
    let year_len: u32 = months.iter().sum();
    let before: u32 = months[..month].iter().sum();
    let seconds = dt.num_seconds_from_midnight() as f64 + dt.nanosecond() as f64 * 1e-9;
    Ok(dt.year() as f64 * year_len as f64
        + (before + dt.day() - 1) as f64
        + seconds / SECONDS_PER_DAY)
}

fn fixed_to_julian_date(months: &[u32; 12], days: f64) -> Result<f64> {
    if !days.is_finite() {
        return Ok(f64::NAN);
    }
    let year_len = months.iter().sum::<u32>() as f64;
    let whole_years = (days / year_len).floor();
    let mut rem = days - whole_years * year_len;
    let year = i32::try_from(whole_years as i64)
        .ok()
        .with_context(|| format!("day {days} is out of range"))?;

    let mut month = 0;
    while month < 11 && rem >= months[month] as f64 {
        rem -= months[month] as f64;
        month += 1;
    }

    let first = NaiveDate::from_ymd_opt(year, month as u32 + 1, 1)
        .with_context(|| format!("year {year} is out of range"))?;
    let next = match month {
        11 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        _ => NaiveDate::from_ymd_opt(year, month as u32 + 2, 1),
    }
    .with_context(|| format!("year {year} is out of range"))?;
    let real_len = next.signed_duration_since(first).num_days() as f64;

    Ok(gregorian_julian_date(midnight(first)?) + rem * real_len / months[month] as f64)
}
