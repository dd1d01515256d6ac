//! Text formatting shared by presentation layers.

use crate::{Attribute, Category, Stats};

/// `#001`-style catalog number.
pub fn format_number(id: u32) -> String {
    format!("#{id:03}")
}

pub fn display_name(name: &str) -> String {
    name.to_uppercase()
}

/// Category names joined for a one-line listing, primary first.
pub fn category_list(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|c| c.label())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Attribute value with its unit, as shown beside a stat bar. Height is
/// stored in decimetres and weight in hectograms.
pub fn format_attribute(stats: &Stats, attribute: Attribute) -> String {
    let value = stats.get(attribute);
    match attribute {
        Attribute::Height => format!("{:.1} m", f64::from(value) / 10.0),
        Attribute::Weight => format!("{:.1} kg", f64::from(value) / 10.0),
        _ => value.to_string(),
    }
}

/// A fixed-width bar of `width` cells, filled per [`Stats::ratio`].
pub fn stat_bar(stats: &Stats, attribute: Attribute, width: usize) -> String {
    let filled = (stats.ratio(attribute) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(format_number(1), "#001");
        assert_eq!(format_number(25), "#025");
        assert_eq!(format_number(1025), "#1025");
    }

    #[test]
    fn names_are_upper_cased() {
        assert_eq!(display_name("mr-mime"), "MR-MIME");
    }

    #[test]
    fn category_list_keeps_slot_order() {
        assert_eq!(
            category_list(&[Category::Fire, Category::Flying]),
            "Fire / Flying"
        );
    }

    #[test]
    fn attributes_with_units() {
        let stats = Stats {
            height: 17,
            weight: 905,
            speed: 100,
            ..Stats::default()
        };
        assert_eq!(format_attribute(&stats, Attribute::Height), "1.7 m");
        assert_eq!(format_attribute(&stats, Attribute::Weight), "90.5 kg");
        assert_eq!(format_attribute(&stats, Attribute::Speed), "100");
    }

    #[test]
    fn bar_fill_tracks_ratio() {
        let stats = Stats {
            attack: 100,
            health: 900,
            ..Stats::default()
        };
        assert_eq!(stat_bar(&stats, Attribute::Attack, 10), "█████░░░░░");
        assert_eq!(stat_bar(&stats, Attribute::Health, 4), "████");
        assert_eq!(stat_bar(&stats, Attribute::Speed, 3), "░░░");
    }
}
