use std::collections::HashMap;
use std::time::Duration;

/// Reads a numeric `Retry-After` header, matched case-insensitively.
///
/// HTTP-date values are ignored; the vendors covered here only send seconds.
pub(crate) fn retry_after_from_headers(headers: &HashMap<String, String>) -> Option<Duration> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_in_any_case() {
        let headers = HashMap::from([("Retry-After".to_string(), " 12 ".to_string())]);
        assert_eq!(retry_after_from_headers(&headers), Some(Duration::from_secs(12)));
    }

    #[test]
    fn ignores_dates_and_absent_headers() {
        let headers = HashMap::from([(
            "retry-after".to_string(),
            "Wed, 21 Oct 2015 07:28:00 GMT".to_string(),
        )]);
        assert_eq!(retry_after_from_headers(&headers), None);
        assert_eq!(retry_after_from_headers(&HashMap::new()), None);
    }
}
