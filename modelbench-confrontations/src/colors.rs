//! Display colors for model result sets.

/// Generate `n` visually distinct colors as hex strings by walking the hue
/// wheel at fixed saturation and value.
pub fn distinct_colors(n: usize) -> Vec<String> {
    const SATURATION: f64 = 0.67;
    const VALUE: f64 = 0.67;
    (0..n)
        .map(|i| {
            let hue = if n > 1 {
                i as f64 / (n - 1) as f64
            } else {
                0.0
            };
            let (r, g, b) = hsv_to_rgb(hue, SATURATION, VALUE);
            format!(
                "#{:02x}{:02x}{:02x}",
                (r * 255.0).round() as u8,
                (g * 255.0).round() as u8,
                (b * 255.0).round() as u8
            )
        })
        .collect()
}

fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    let h = (h.rem_euclid(1.0)) * 6.0;
    let i = h.floor() as i64 % 6;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_distinct_hex_strings() {
        let colors = distinct_colors(6);
        assert_eq!(colors.len(), 6);
        for c in &colors {
            assert_eq!(c.len(), 7);
            assert!(c.starts_with('#'));
        }
        let unique: std::collections::HashSet<&String> = colors.iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn single_color_request_is_handled() {
        assert_eq!(distinct_colors(1).len(), 1);
    }
}
