/// Render a duration in seconds as `MM:SS`, or `HH:MM:SS` once at least one
/// hour remains.
///
/// Callers clamp to `>= 0` before formatting; non-finite input renders as zero.
pub fn format_eta(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_hours_when_zero() {
        assert_eq!(format_eta(0.0), "00:00");
        assert_eq!(format_eta(65.0), "01:05");
        assert_eq!(format_eta(59.999), "00:59");
        assert_eq!(format_eta(3599.0), "59:59");
    }

    #[test]
    fn includes_hours_segment() {
        assert_eq!(format_eta(3600.0), "01:00:00");
        assert_eq!(format_eta(3661.0), "01:01:01");
        assert_eq!(format_eta(36_000.0 + 7.9), "10:00:07");
    }

    #[test]
    fn components_match_floor_division() {
        for d in [0.4f64, 12.0, 61.5, 3725.2, 86_399.0, 90_061.0] {
            let floor = d.floor() as u64;
            let parts: Vec<u64> = format_eta(d)
                .split(':')
                .map(|p| p.parse().unwrap())
                .collect();
            let (h, m, s) = (floor / 3600, (floor % 3600) / 60, floor % 60);
            if h == 0 {
                assert_eq!(parts, vec![m, s]);
            } else {
                assert_eq!(parts, vec![h, m, s]);
            }
        }
    }

    #[test]
    fn degenerate_input_renders_zero() {
        assert_eq!(format_eta(f64::NAN), "00:00");
        assert_eq!(format_eta(f64::INFINITY), "00:00");
    }
}
