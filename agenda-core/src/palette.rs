//! Display attributes assigned to sources.
//!
//! Every source gets the palette entry at `registration index mod 14`. Two
//! sources whose indices differ by a multiple of the palette size share a
//! color; that is accepted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::source::{CalendarSource, SourceId, SourceRegistry};

/// Terminal foreground colors, in palette order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayAttribute {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

pub const PALETTE: [DisplayAttribute; 14] = [
    DisplayAttribute::Red,
    DisplayAttribute::Green,
    DisplayAttribute::Yellow,
    DisplayAttribute::Blue,
    DisplayAttribute::Magenta,
    DisplayAttribute::Cyan,
    DisplayAttribute::White,
    DisplayAttribute::BrightRed,
    DisplayAttribute::BrightGreen,
    DisplayAttribute::BrightYellow,
    DisplayAttribute::BrightBlue,
    DisplayAttribute::BrightMagenta,
    DisplayAttribute::BrightCyan,
    DisplayAttribute::BrightWhite,
];

impl DisplayAttribute {
    pub fn for_index(index: usize) -> Self {
        PALETTE[index % PALETTE.len()]
    }
}

/// Source → display attribute, built once before any fetch begins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: Vec<(SourceId, DisplayAttribute)>,
    lookup: HashMap<SourceId, DisplayAttribute>,
}

impl AttributeMap {
    pub fn assign(registry: &SourceRegistry) -> Self {
        let entries: Vec<(SourceId, DisplayAttribute)> = registry
            .sources()
            .iter()
            .enumerate()
            .map(|(index, source)| (source.id.clone(), DisplayAttribute::for_index(index)))
            .collect();
        let lookup = entries.iter().cloned().collect();

        AttributeMap { entries, lookup }
    }

    pub fn get(&self, id: &SourceId) -> Option<DisplayAttribute> {
        self.lookup.get(id).copied()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, DisplayAttribute)> {
        self.entries.iter().map(|(id, attr)| (id, *attr))
    }

    /// Legend rows (source, attribute) in registration order.
    pub fn legend<'a>(
        &'a self,
        registry: &'a SourceRegistry,
    ) -> impl Iterator<Item = (&'a CalendarSource, DisplayAttribute)> + 'a {
        self.entries
            .iter()
            .filter_map(move |(id, attr)| registry.get(id).map(|source| (source, *attr)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(count: usize) -> SourceRegistry {
        (0..count)
            .map(|i| {
                if i % 2 == 0 {
                    CalendarSource::service(&format!("cal-{i}"), &format!("Calendar {i}"))
                } else {
                    CalendarSource::feed(&format!("https://feeds.test/{i}.ics"), &format!("Feed {i}"))
                }
            })
            .collect()
    }

    #[test]
    fn test_palette_wraps_after_fourteen_sources() {
        let registry = registry_of(16);
        let attributes = AttributeMap::assign(&registry);

        let first = attributes.get(&registry.sources()[0].id).unwrap();
        let fifteenth = attributes.get(&registry.sources()[14].id).unwrap();
        assert_eq!(first, DisplayAttribute::Red);
        assert_eq!(first, fifteenth);
        assert_eq!(
            attributes.get(&registry.sources()[15].id),
            Some(DisplayAttribute::Green)
        );
    }

    #[test]
    fn test_assignment_depends_only_on_registration_order() {
        let registry = registry_of(5);
        assert_eq!(AttributeMap::assign(&registry), AttributeMap::assign(&registry));

        let attrs: Vec<DisplayAttribute> =
            AttributeMap::assign(&registry).iter().map(|(_, a)| a).collect();
        assert_eq!(attrs, PALETTE[..5].to_vec());
    }

    #[test]
    fn test_services_are_colored_before_feeds() {
        let registry: SourceRegistry = [
            CalendarSource::service("primary", "Me"),
            CalendarSource::feed("https://feeds.test/a.ics", "A"),
        ]
        .into_iter()
        .collect();
        let attributes = AttributeMap::assign(&registry);

        let legend: Vec<(&str, DisplayAttribute)> = attributes
            .legend(&registry)
            .map(|(source, attr)| (source.name.as_str(), attr))
            .collect();
        assert_eq!(
            legend,
            vec![("Me", DisplayAttribute::Red), ("A", DisplayAttribute::Green)]
        );
    }
}
