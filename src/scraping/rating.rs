//! Rating parsing.

/// Highest rating the site hands out.
pub const MAX_RATING: f64 = 5.0;

/// Parse the number at the start of a badge title such as `"4.50 star(s)"`.
///
/// The prefix before the first space is parsed with `.` as the decimal
/// separator. Returns `None` when there is no space or the prefix is not a
/// number.
#[must_use]
pub fn parse_leading_rating(text: &str) -> Option<f64> {
    let (number, _) = text.split_once(' ')?;
    parse_rating(number)
}

/// Parse a bare rating value, rejecting non-finite numbers.
#[must_use]
pub fn parse_rating(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|rating| rating.is_finite())
}

/// Whether `rating` lies in the range the site uses.
#[must_use]
pub fn in_range(rating: f64) -> bool {
    (0.0..=MAX_RATING).contains(&rating)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leading_rating() {
        assert_eq!(parse_leading_rating("4.50 star(s)"), Some(4.5));
        assert_eq!(parse_leading_rating("3 stars"), Some(3.0));
    }

    #[test]
    fn test_parse_leading_rating_invalid() {
        assert_eq!(parse_leading_rating("bad"), None);
        assert_eq!(parse_leading_rating("4.50"), None);
        assert_eq!(parse_leading_rating("four stars"), None);
        assert_eq!(parse_leading_rating("4,50 stars"), None);
    }

    #[test]
    fn test_parse_rating_rejects_nan() {
        assert_eq!(parse_rating("NaN"), None);
        assert_eq!(parse_rating("inf"), None);
        assert_eq!(parse_rating(" 2.25 "), Some(2.25));
    }

    #[test]
    fn test_in_range() {
        assert!(in_range(0.0));
        assert!(in_range(5.0));
        assert!(!in_range(5.5));
        assert!(!in_range(-1.0));
        assert!(!in_range(f64::NAN));
    }
}
