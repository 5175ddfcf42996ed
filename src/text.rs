//! Presentation helpers for categorical values.
//!
//! [`title_case`] renders free-form enum-like strings (task statuses, categories,
//! profile fields) the way clients display them. It runs three passes in a fixed
//! order, and later passes override earlier ones for the words they target:
//!
//! 1. every word gets an upper-case first letter and a lower-case remainder;
//! 2. minor words that are not sentence-initial go back to lower case;
//! 3. initialisms from a closed list are forced to upper case.
//!
//! [`relative_time`] renders a timestamp relative to now ("in 3 days").

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Words kept lower case unless they open a sentence.
const MINOR_WORDS: &[&str] = &[
    "A", "An", "The", "And", "But", "Or", "For", "Nor", "As", "At", "By", "From", "In", "Into",
    "Near", "Of", "On", "Onto", "To", "With",
];

lazy_static! {
    /// A word starts at an ASCII alphanumeric and runs up to the next whitespace or hyphen.
    static ref WORD: Regex = Regex::new(r"[A-Za-z0-9][^\s-]*").unwrap();
    /// Initialisms always rendered in upper case, on ASCII word boundaries.
    static ref INITIALISM: Regex = Regex::new(r"(?-u:\b)(?:Id)(?-u:\b)").unwrap();
}

/// Title-cases `value` for display.
///
/// ```
/// use taskdesk::text::title_case;
///
/// assert_eq!(title_case("in progress"), "In Progress");
/// assert_eq!(title_case("Where is my id"), "Where Is My ID");
/// ```
pub fn title_case(value: &str) -> String {
    let capitalized = WORD.replace_all(value, |caps: &Captures| capitalize(&caps[0]));
    let chars: Vec<char> = capitalized.chars().collect();
    let lowered: String = lowercase_minor_words(chars).into_iter().collect();

    INITIALISM
        .replace_all(&lowered, |caps: &Captures| caps[0].to_ascii_uppercase())
        .into_owned()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut out = first.to_ascii_uppercase().to_string();
            out.push_str(&chars.as_str().to_lowercase());
            out
        }
        None => String::new(),
    }
}

// The preceding "<not a period><whitespace>" needs lookbehind, which regex lacks.
fn lowercase_minor_words(mut chars: Vec<char>) -> Vec<char> {
    for start in 2..chars.len() {
        if !chars[start - 1].is_whitespace() || chars[start - 2] == '.' {
            continue;
        }

        let matched = MINOR_WORDS.iter().find(|word| {
            let end = start + word.len();
            end < chars.len()
                && chars[end].is_whitespace()
                && word.chars().eq(chars[start..end].iter().copied())
        });

        if let Some(word) = matched {
            for c in &mut chars[start..start + word.len()] {
                *c = c.to_ascii_lowercase();
            }
        }
    }

    chars
}

/// Describes `at` relative to `now`, e.g. `"in 2 hours"` or `"5 days ago"`.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (at - now).num_seconds();
    let span = describe_span(seconds.unsigned_abs());

    if seconds >= 0 {
        format!("in {}", span)
    } else {
        format!("{} ago", span)
    }
}

fn describe_span(seconds: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;

    // Rounded thresholds, coarsest unit that reads naturally.
    let rounded = |unit: u64| (seconds + unit / 2) / unit;
    match seconds {
        s if s < 45 => "a few seconds".to_string(),
        s if s < 90 => "a minute".to_string(),
        s if s < 45 * MINUTE => format!("{} minutes", rounded(MINUTE)),
        s if s < 90 * MINUTE => "an hour".to_string(),
        s if s < 22 * HOUR => format!("{} hours", rounded(HOUR)),
        s if s < 36 * HOUR => "a day".to_string(),
        s if s < 26 * DAY => format!("{} days", rounded(DAY)),
        s if s < 45 * DAY => "a month".to_string(),
        s if s < 320 * DAY => format!("{} months", rounded(30 * DAY)),
        s if s < 548 * DAY => "a year".to_string(),
        _ => format!("{} years", rounded(365 * DAY)),
    }
}
