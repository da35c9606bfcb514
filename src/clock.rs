use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Current civil date in the given time zone
pub fn today_in(tz: Tz) -> NaiveDate {
    date_in(Utc::now(), tz)
}

/// Civil date of an instant in the given time zone
pub fn date_in(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}
