//! Text normalization rules for listing and detail page values
//!
//! Every function here is pure and total: malformed input yields `None`,
//! never an error.

use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(\d+\)\s*$").expect("valid trailing count regex"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static RATING_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s+Ratings?.*?([\d.]+)\s+Average").expect("valid rating regex")
});
static PACK_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)[-\s]?Pack").expect("valid pack regex"));
static DIMENSION_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^(.*\d)\s*(?:mm|cm|in|")$"#).expect("valid dimension regex")
});

/// Parsed "(N Ratings, F Average)" summary
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingSummary {
    pub num_ratings: Option<i64>,
    pub avg_rating: Option<f64>,
}

/// Strip a trailing "(55)" review count and collapse whitespace runs
pub fn normalize_product_name(name: &str) -> Option<String> {
    let without_count = TRAILING_COUNT.replace(name, "");
    let collapsed = WHITESPACE_RUN.replace_all(without_count.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Keep only digits and the decimal point: "$1,299.00" -> "1299.00"
pub fn normalize_price(price: &str) -> Option<String> {
    let digits: String = price
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() { None } else { Some(digits) }
}

pub fn parse_user_rating(text: &str) -> RatingSummary {
    let Some(captures) = RATING_SUMMARY.captures(text) else {
        return RatingSummary::default();
    };

    let num_ratings = captures.get(1).and_then(|m| m.as_str().parse::<i64>().ok());
    let avg_rating = captures.get(2).and_then(|m| m.as_str().parse::<f64>().ok());

    // A half-parsed summary is as useless as none at all.
    match (num_ratings, avg_rating) {
        (Some(n), Some(avg)) => RatingSummary {
            num_ratings: Some(n),
            avg_rating: Some(avg),
        },
        _ => RatingSummary::default(),
    }
}

/// "3-Pack" / "3 Pack" / "3Pack" -> 3
pub fn parse_pack_count(name: &str) -> Option<i64> {
    PACK_COUNT
        .captures(name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Strip a leading `+`, surrounding whitespace and a trailing length unit.
///
/// The unit is only removed when it directly follows a number, so words that
/// happen to end in "in" or "cm" survive untouched.
pub fn normalize_dimension(value: &str) -> Option<String> {
    let trimmed = value.trim();
    let unsigned = trimmed.trim_start_matches(|c: char| c == '+' || c.is_whitespace());
    let stripped = DIMENSION_UNIT
        .captures(unsigned)
        .and_then(|c| c.get(1))
        .map_or(unsigned, |m| m.as_str())
        .trim();

    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Keep digits, the decimal point and a leading minus sign, then parse
pub fn parse_number(value: &str) -> Option<f64> {
    let mut cleaned = String::with_capacity(value.len());
    for c in value.trim().chars() {
        if c.is_ascii_digit() || c == '.' {
            cleaned.push(c);
        } else if c == '-' && cleaned.is_empty() {
            cleaned.push(c);
        }
    }
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Catalog names become file-friendly keys: "CPU Coolers" -> "cpu_coolers"
pub fn normalize_category_name(text: &str) -> String {
    WHITESPACE_RUN
        .replace_all(text.trim(), "_")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Widget (12)", "Widget")]
    #[case("Noctua   NH-D15 \n chromax.black (1204)", "Noctua NH-D15 chromax.black")]
    #[case("  AMD Ryzen 7 7800X3D ", "AMD Ryzen 7 7800X3D")]
    #[case("Fan (3-Pack)", "Fan (3-Pack)")]
    fn product_name_normalization(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_product_name(input).as_deref(), Some(expected));
    }

    #[test]
    fn blank_product_name_is_none() {
        assert_eq!(normalize_product_name("   (3) "), None);
    }

    #[rstest]
    #[case("$1,299.00", Some("1299.00"))]
    #[case("  $37.90 ", Some("37.90"))]
    #[case("€ 89", Some("89"))]
    #[case("Out of stock", None)]
    #[case("", None)]
    fn price_normalization(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_price(input).as_deref(), expected);
    }

    #[test]
    fn rating_summary_parses_count_and_average() {
        let summary = parse_user_rating("(168 Ratings, 4.5 Average)");
        assert_eq!(summary.num_ratings, Some(168));
        assert_eq!(summary.avg_rating, Some(4.5));

        let single = parse_user_rating("(1 rating, 3.0 average)");
        assert_eq!(single.num_ratings, Some(1));
        assert_eq!(single.avg_rating, Some(3.0));
    }

    #[test]
    fn unmatched_rating_summary_is_all_none() {
        assert_eq!(parse_user_rating("No ratings yet"), RatingSummary::default());
        assert_eq!(parse_user_rating(""), RatingSummary::default());
    }

    #[rstest]
    #[case("Arctic P12 PWM PST 3-Pack", Some(3))]
    #[case("Arctic P12 5 Pack", Some(5))]
    #[case("Lian Li UNI FAN SL120 (3pack)", Some(3))]
    #[case("be quiet! Pure Wings 2", None)]
    fn pack_count_parsing(#[case] input: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_pack_count(input), expected);
    }

    #[rstest]
    #[case("120 mm", Some("120"))]
    #[case("+5.5 in", Some("5.5"))]
    #[case("27\"", Some("27"))]
    #[case(" 158.5cm ", Some("158.5"))]
    #[case("Intel", Some("Intel"))]
    #[case("Cabin", Some("Cabin"))]
    #[case("  ", None)]
    #[case("+", None)]
    #[case("+ +5", Some("5"))]
    #[case("++ 12 mm", Some("12"))]
    fn dimension_normalization(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(normalize_dimension(input).as_deref(), expected);
    }

    #[rstest]
    #[case("3.7 GHz", Some(3.7))]
    #[case("1,000 W", Some(1000.0))]
    #[case("-12 dB", Some(-12.0))]
    #[case("n/a", None)]
    fn number_parsing(#[case] input: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_number(input), expected);
    }

    #[test]
    fn category_names_are_snake_lowercase() {
        assert_eq!(normalize_category_name(" CPU  Coolers "), "cpu_coolers");
        assert_eq!(normalize_category_name("Video Cards"), "video_cards");
    }

    proptest! {
        #[test]
        fn dimension_normalization_is_idempotent(input in "[+ ]{0,5}[0-9]{1,4}(\\.[0-9]{1,2})?( ?(mm|cm|in|\"))?") {
            if let Some(once) = normalize_dimension(&input) {
                prop_assert_eq!(normalize_dimension(&once), Some(once.clone()));
            }
        }

        #[test]
        fn normalized_price_contains_only_digits_and_dots(input in "\\PC{0,24}") {
            if let Some(price) = normalize_price(&input) {
                prop_assert!(price.chars().all(|c| c.is_ascii_digit() || c == '.'));
            }
        }
    }
}
