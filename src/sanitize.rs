use chrono::NaiveDate;

/// Normalize noisy numeric text ("$5,000", "120 applicants") into a
/// non-negative float. Everything that is not an ASCII digit or a decimal
/// point is stripped before parsing; note this drops any sign, which is what
/// keeps the result ≥ 0. An empty residue or an unparseable one (e.g.
/// "1.2.3") yields None.
pub fn clean_numeric(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    match digits.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => None,
    }
}

/// Parse an application count. Only integral values are accepted; a count
/// that comes back fractional after cleaning is treated as unrecoverable
/// rather than rounded.
pub fn parse_count(raw: &str) -> Option<u64> {
    let v = clean_numeric(raw)?;
    if v.fract() == 0.0 && v <= u64::MAX as f64 {
        Some(v as u64)
    } else {
        None
    }
}

/// Date shapes observed in the source feed. Datetime strings are handled by
/// retrying the formats against the leading 10 characters.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Coerce date-like text to a calendar date, or None if nothing parses.
pub fn parse_posting_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    // "2021-07-09T00:00:00" and friends: take the date prefix.
    if s.len() > 10 && s.is_char_boundary(10) {
        let head = &s[..10];
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(head, fmt) {
                return Some(d);
            }
        }
    }

    None
}

/// Salary-average imputation: keep the reported average when present,
/// otherwise the midpoint of min/max when both survived cleaning.
pub fn impute_salary_avg(
    avg: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
) -> Option<f64> {
    avg.or(match (min, max) {
        (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_currency_and_separators() {
        assert_eq!(clean_numeric("$5,000"), Some(5000.0));
        assert_eq!(clean_numeric("SGD 7,500.50"), Some(7500.5));
        assert_eq!(clean_numeric("120 applicants"), Some(120.0));
    }

    #[test]
    fn clean_numeric_is_idempotent() {
        let once = clean_numeric("$4,200.75").unwrap();
        assert_eq!(clean_numeric(&once.to_string()), Some(once));
        assert_eq!(clean_numeric("5000"), Some(5000.0));
    }

    #[test]
    fn garbage_numeric_is_none() {
        assert_eq!(clean_numeric(""), None);
        assert_eq!(clean_numeric("negotiable"), None);
        assert_eq!(clean_numeric("1.2.3"), None);
        assert_eq!(clean_numeric("..."), None);
    }

    #[test]
    fn sign_is_stripped_not_preserved() {
        // "-50" cleans to "50"; the invariant is non-negativity.
        assert_eq!(clean_numeric("-50"), Some(50.0));
    }

    #[test]
    fn counts_must_be_integral() {
        assert_eq!(parse_count("120 applicants"), Some(120));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count("12.5"), None);
        assert_eq!(parse_count("n/a"), None);
    }

    #[test]
    fn parses_common_date_shapes() {
        let expect = NaiveDate::from_ymd_opt(2021, 7, 9).unwrap();
        assert_eq!(parse_posting_date("2021-07-09"), Some(expect));
        assert_eq!(parse_posting_date("2021/07/09"), Some(expect));
        assert_eq!(parse_posting_date("09/07/2021"), Some(expect));
        assert_eq!(parse_posting_date("2021-07-09T12:30:00"), Some(expect));
    }

    #[test]
    fn unparseable_dates_are_none() {
        assert_eq!(parse_posting_date(""), None);
        assert_eq!(parse_posting_date("soon"), None);
        assert_eq!(parse_posting_date("2021-13-40"), None);
    }

    #[test]
    fn imputes_midpoint_when_avg_missing() {
        assert_eq!(
            impute_salary_avg(None, Some(4000.0), Some(6000.0)),
            Some(5000.0)
        );
    }

    #[test]
    fn reported_average_wins_over_midpoint() {
        assert_eq!(
            impute_salary_avg(Some(5500.0), Some(4000.0), Some(6000.0)),
            Some(5500.0)
        );
    }

    #[test]
    fn partial_bounds_impute_nothing() {
        assert_eq!(impute_salary_avg(None, Some(4000.0), None), None);
        assert_eq!(impute_salary_avg(None, None, None), None);
    }
}
