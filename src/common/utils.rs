use std::time::Duration;

/// Format a duration as e.g. "1h 02m 03s", "4m 05s" or "6.7s"
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Split a list field, trimming entries and dropping empty ones
pub fn split_list(value: &str, separator: char) -> Vec<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(6700)), "6.7s");
        assert_eq!(format_elapsed(Duration::from_secs(245)), "4m 05s");
        assert_eq!(format_elapsed(Duration::from_secs(3723)), "1h 02m 03s");
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a1, b2,,c3 ", ','), vec!["a1", "b2", "c3"]);
        assert!(split_list("", ',').is_empty());
    }
}
