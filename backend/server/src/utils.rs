use std::{collections::HashSet, sync::LazyLock};

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};

use crate::error::AppError::{self, MalformedPayload};

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 130;
pub const CONTENT_MIN: usize = 20;
pub const TAGS_MAX: usize = 3;
pub const TAG_MAX: usize = 15;

static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_]").expect("valid regex"));
static SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9+#. \-]").expect("valid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("valid regex"));

/// Normalizes a tag name. Keeps `+`, `#` and `.` so `c++`, `c#` and `node.js` survive.
pub fn sanitize(input: &str) -> String {
    let s = UNDERSCORES.replace_all(input, " ");
    let s = SYMBOLS.replace_all(&s, "");

    SPACES.replace_all(s.trim(), " ").to_lowercase()
}

pub fn validate_question(title: &str, content: &str) -> Result<(), AppError> {
    let title_len = title.trim().chars().count();

    if !(TITLE_MIN..=TITLE_MAX).contains(&title_len) {
        return Err(MalformedPayload(format!(
            "Title must be between {TITLE_MIN} and {TITLE_MAX} characters"
        )));
    }

    validate_content(content)
}

pub fn validate_content(content: &str) -> Result<(), AppError> {
    if content.trim().chars().count() < CONTENT_MIN {
        return Err(MalformedPayload(format!(
            "Content must be at least {CONTENT_MIN} characters"
        )));
    }

    Ok(())
}

/// Sanitizes tags and rejects empty, oversized or duplicate entries.
pub fn validate_tags(tags: &[String]) -> Result<Vec<String>, AppError> {
    if tags.is_empty() || tags.len() > TAGS_MAX {
        return Err(MalformedPayload(format!(
            "Questions need between 1 and {TAGS_MAX} tags"
        )));
    }

    let mut seen = HashSet::new();
    let mut sanitized = Vec::with_capacity(tags.len());

    for tag in tags {
        let clean = sanitize(tag);

        if clean.is_empty() || clean.chars().count() > TAG_MAX {
            return Err(MalformedPayload(format!(
                "Tag must be between 1 and {TAG_MAX} characters"
            )));
        }

        if !seen.insert(clean.clone()) {
            return Err(MalformedPayload(format!("Duplicate tag {clean}")));
        }

        sanitized.push(clean);
    }

    Ok(sanitized)
}

/// Case-insensitive literal matcher, `None` for a blank query.
pub fn search_matcher(query: Option<&str>) -> Result<Option<Regex>, AppError> {
    let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
        return Ok(None);
    };

    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| MalformedPayload(e.to_string()))
}

pub fn matches_any(matcher: &Option<Regex>, fields: &[&str]) -> bool {
    match matcher {
        Some(regex) => fields.iter().any(|field| regex.is_match(field)),
        None => true,
    }
}

/// 1500 -> `1.5K`, 2500000 -> `2.5M`.
pub fn format_and_divide_number(num: u64) -> String {
    if num >= 1_000_000 {
        format!("{:.1}M", num as f64 / 1_000_000.0)
    } else if num >= 1_000 {
        format!("{:.1}K", num as f64 / 1_000.0)
    } else {
        num.to_string()
    }
}

pub fn relative_time(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const SECOND: i64 = 1000;
    const MINUTE: i64 = 60 * SECOND;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const WEEK: i64 = 7 * DAY;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let elapsed = (now - created_at).num_milliseconds().max(0);

    let (amount, unit) = match elapsed {
        e if e < MINUTE => (e / SECOND, "second"),
        e if e < HOUR => (e / MINUTE, "minute"),
        e if e < DAY => (e / HOUR, "hour"),
        e if e < WEEK => (e / DAY, "day"),
        e if e < MONTH => (e / WEEK, "week"),
        e if e < YEAR => (e / MONTH, "month"),
        e => (e / YEAR, "year"),
    };

    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural} ago")
}

/// `September 2023`
pub fn joined_date(date: DateTime<Utc>) -> String {
    date.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize("next_js"), "next js");
        assert_eq!(sanitize("Rust-lang"), "rust-lang");
        assert_eq!(sanitize("clean-this_text!"), "clean-this text");
        assert_eq!(sanitize("C++"), "c++");
        assert_eq!(sanitize("Node.JS"), "node.js");
    }

    #[test]
    fn test_sanitize_spaces() {
        assert_eq!(sanitize("   react   "), "react");
        assert_eq!(sanitize("  multiple   spaces  "), "multiple spaces");
        assert_eq!(sanitize("_start_end_"), "start end");
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("!@$%^&*()"), "");
    }

    #[test]
    fn test_validate_tags() {
        let tags = vec!["Rust".to_string(), "tokio_rs".to_string()];
        assert_eq!(validate_tags(&tags).unwrap(), vec!["rust", "tokio rs"]);
    }

    #[test]
    fn test_validate_tags_rejects() {
        assert!(validate_tags(&[]).is_err());
        assert!(validate_tags(&["a", "b", "c", "d"].map(String::from)).is_err());
        assert!(validate_tags(&["Rust", "rust"].map(String::from)).is_err());
        assert!(validate_tags(&["a-very-long-tag-name".to_string()]).is_err());
        assert!(validate_tags(&["!!!".to_string()]).is_err());
    }

    #[test]
    fn test_validate_question() {
        let content = "How do I borrow twice mutably?";

        assert!(validate_question("Borrowing", content).is_ok());
        assert!(validate_question("Hi", content).is_err());
        assert!(validate_question(&"x".repeat(131), content).is_err());
        assert!(validate_question("Borrowing", "too short").is_err());
    }

    #[test]
    fn test_search_matcher() {
        let matcher = search_matcher(Some("C++")).unwrap();

        assert!(matches_any(&matcher, &["Learning c++ today"]));
        assert!(!matches_any(&matcher, &["Learning c today"]));
        assert!(matches_any(&search_matcher(Some("   ")).unwrap(), &["anything"]));
        assert!(matches_any(&search_matcher(None).unwrap(), &[]));
    }

    #[test]
    fn test_format_and_divide_number() {
        assert_eq!(format_and_divide_number(0), "0");
        assert_eq!(format_and_divide_number(999), "999");
        assert_eq!(format_and_divide_number(1000), "1.0K");
        assert_eq!(format_and_divide_number(1500), "1.5K");
        assert_eq!(format_and_divide_number(2_500_000), "2.5M");
    }

    #[test]
    fn test_relative_time() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        assert_eq!(relative_time(now, now), "0 seconds ago");
        assert_eq!(relative_time(now - Duration::seconds(1), now), "1 second ago");
        assert_eq!(relative_time(now - Duration::minutes(3), now), "3 minutes ago");
        assert_eq!(relative_time(now - Duration::hours(1), now), "1 hour ago");
        assert_eq!(relative_time(now - Duration::days(2), now), "2 days ago");
        assert_eq!(relative_time(now - Duration::days(14), now), "2 weeks ago");
        assert_eq!(relative_time(now - Duration::days(60), now), "2 months ago");
        assert_eq!(relative_time(now - Duration::days(400), now), "1 year ago");
        assert_eq!(relative_time(now + Duration::hours(1), now), "0 seconds ago");
    }

    #[test]
    fn test_joined_date() {
        let date = Utc.with_ymd_and_hms(2023, 9, 14, 8, 30, 0).unwrap();
        assert_eq!(joined_date(date), "September 2023");
    }
}
