use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// `{iso_year}-W{week:02}` using ISO-8601 week numbering
pub fn iso_week_label(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

/// Parse a `YYYY-Www` label back into (iso_year, week)
pub fn parse_week_label(label: &str) -> Option<(i32, u32)> {
    let (year, week) = label.split_once("-W")?;
    if year.len() != 4 || week.len() != 2 {
        return None;
    }
    if !year.bytes().all(|b| b.is_ascii_digit()) || !week.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let week: u32 = week.parse().ok()?;
    // rejects week 53 in years that only have 52
    NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    Some((year, week))
}

pub fn is_week_label(label: &str) -> bool {
    parse_week_label(label).is_some()
}

/// Label of the ISO week immediately before `label`
pub fn previous_week_label(label: &str) -> Option<String> {
    let (year, week) = parse_week_label(label)?;
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    Some(iso_week_label(monday - Duration::days(7)))
}
