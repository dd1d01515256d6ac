use std::io::Write;

use dexplorer_core::category::{theme_color, to_hex};
use dexplorer_core::display::{
    category_list, display_name, format_attribute, format_number, stat_bar,
};
use dexplorer_core::view::ViewPhase;
use dexplorer_core::{Attribute, Category, ListSnapshot, SelectionSnapshot};
use owo_colors::OwoColorize;

const BAR_WIDTH: usize = 24;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn chip(category: Category, color: ColorMode) -> String {
    let label = format!(" {} ", category.label());
    if color.enabled() {
        let (r, g, b) = category.color();
        label.black().on_truecolor(r, g, b).to_string()
    } else {
        format!("[{}]", category.label())
    }
}

fn chips(categories: &[Category], color: ColorMode) -> String {
    if categories.is_empty() {
        return "none".to_string();
    }
    categories
        .iter()
        .map(|c| chip(*c, color))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Print the visible list and a one-line footer.
pub fn print_list(w: &mut dyn Write, list: &ListSnapshot, color: ColorMode) -> std::io::Result<()> {
    for entry in &list.entries {
        let number = format_number(entry.id);
        let name = display_name(&entry.name);
        if color.enabled() {
            writeln!(
                w,
                "{:>6}  {:<24} {}",
                number.dimmed(),
                name.bold(),
                chips(&entry.categories, color)
            )?;
        } else {
            writeln!(
                w,
                "{:>6}  {:<24} {}",
                number,
                name,
                category_list(&entry.categories)
            )?;
        }
    }

    let footer = match list.phase {
        ViewPhase::FilterApplied => format!("{} matching entries", list.entries.len()),
        ViewPhase::Exhausted => format!("{} entries (end of list)", list.entries.len()),
        phase => format!("{} entries shown ({})", list.entries.len(), phase.label()),
    };
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", footer.dimmed())?;
    } else {
        writeln!(w, "{}", footer)?;
    }
    Ok(())
}

/// Print the detail panel of the focused entry.
pub fn print_detail(
    w: &mut dyn Write,
    selection: &SelectionSnapshot,
    color: ColorMode,
) -> std::io::Result<()> {
    let Some(entry) = &selection.selection else {
        writeln!(w, "Nothing selected.")?;
        return Ok(());
    };

    let heading = format!("{}  {}", format_number(entry.id), display_name(&entry.name));
    if color.enabled() {
        let (r, g, b) = theme_color(&entry.categories);
        writeln!(w, "{}", heading.bold().truecolor(r, g, b))?;
    } else {
        writeln!(w, "{}", heading)?;
        writeln!(w, "Theme: {}", to_hex(theme_color(&entry.categories)))?;
    }
    writeln!(w, "{}", chips(&entry.categories, color))?;
    writeln!(w, "Image: {}", entry.image_ref)?;
    writeln!(w)?;

    match selection.description() {
        Some(description) => writeln!(w, "{}", description.as_str())?,
        None if selection.is_description_loading => writeln!(w, "Loading description...")?,
        None => writeln!(w, "(description could not be loaded)")?,
    }
    writeln!(w)?;

    match selection.stats() {
        Some(stats) => {
            for attribute in Attribute::ALL {
                let bar = stat_bar(stats, attribute, BAR_WIDTH);
                let value = format_attribute(stats, attribute);
                if color.enabled() {
                    let (r, g, b) = theme_color(&entry.categories);
                    writeln!(
                        w,
                        "{:<16} {} {}",
                        attribute.label(),
                        bar.truecolor(r, g, b),
                        value
                    )?;
                } else {
                    writeln!(w, "{:<16} {} {}", attribute.label(), bar, value)?;
                }
            }
        }
        None if selection.is_stats_loading => writeln!(w, "Loading stats...")?,
        None => writeln!(w, "(stats could not be loaded)")?,
    }
    writeln!(w)?;

    writeln!(w, "Weak to:         {}", chips(&selection.weaknesses(), color))?;
    writeln!(w, "Strong against:  {}", chips(&selection.strengths(), color))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dexplorer_core::{Description, Detail, Entry, Stats};

    fn plain(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn list_without_color() {
        let list = ListSnapshot {
            entries: vec![Entry::new(
                6,
                "charizard",
                vec![Category::Fire, Category::Flying],
                "https://a.test",
            )],
            is_loading: false,
            is_exhausted: false,
            phase: ViewPhase::Idle,
        };
        let out = plain(|w| print_list(w, &list, ColorMode(false)));
        assert!(out.contains("#006"));
        assert!(out.contains("CHARIZARD"));
        assert!(out.contains("Fire / Flying"));
        assert!(out.contains("1 entries shown (idle)"));
    }

    #[test]
    fn detail_without_color() {
        let mut entry = Entry::new(4, "charmander", vec![Category::Fire], "https://a.test");
        entry.detail = Some(Detail {
            description: Some(Description::Unavailable),
            stats: Some(Stats {
                health: 39,
                ..Stats::default()
            }),
        });
        let selection = SelectionSnapshot {
            selection: Some(entry),
            is_description_loading: false,
            is_stats_loading: false,
            is_navigating: false,
        };
        let out = plain(|w| print_detail(w, &selection, ColorMode(false)));
        assert!(out.contains("#004  CHARMANDER"));
        assert!(out.contains("Description not available"));
        assert!(out.contains("Health"));
        assert!(out.contains("Weak to:         [Rock] [Ground] [Water]"));
    }
}
