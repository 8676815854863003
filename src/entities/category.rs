// 🏷️ Category - fixed set of expense categories with display icons
//
// Expenses store the category as a plain string so that data written by
// other clients (or older versions) survives untouched. This enum is what the
// application offers when creating an expense and what drives icon lookup;
// anything it does not recognize renders with the default icon.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Icon shown for categories outside the enumerated set.
pub const DEFAULT_ICON: &str = "💵";

/// Expense category. Fifteen named categories plus `Other`, the catch-all
/// sixteenth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Food,
    Transport,
    Health,
    Education,
    Home,
    Utilities,
    Communication,
    Clothing,
    Pets,
    Travel,
    Gifts,
    Taxes,
    Savings,
    Work,
    Leisure,
    /// Catch-all bucket
    Other,
}

impl Category {
    pub const ALL: [Category; 16] = [
        Category::Food,
        Category::Transport,
        Category::Health,
        Category::Education,
        Category::Home,
        Category::Utilities,
        Category::Communication,
        Category::Clothing,
        Category::Pets,
        Category::Travel,
        Category::Gifts,
        Category::Taxes,
        Category::Savings,
        Category::Work,
        Category::Leisure,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::Home => "Home",
            Category::Utilities => "Utilities",
            Category::Communication => "Communication",
            Category::Clothing => "Clothing",
            Category::Pets => "Pets",
            Category::Travel => "Travel",
            Category::Gifts => "Gifts",
            Category::Taxes => "Taxes",
            Category::Savings => "Savings",
            Category::Work => "Work",
            Category::Leisure => "Leisure",
            Category::Other => "Other",
        }
    }

    /// Spanish label used by the first version of the app's data.
    pub fn legacy_label(&self) -> &'static str {
        match self {
            Category::Food => "Alimentación",
            Category::Transport => "Transporte",
            Category::Health => "Salud",
            Category::Education => "Educación",
            Category::Home => "Hogar",
            Category::Utilities => "Servicios",
            Category::Communication => "Comunicación",
            Category::Clothing => "Ropa",
            Category::Pets => "Mascotas",
            Category::Travel => "Viajes",
            Category::Gifts => "Regalos",
            Category::Taxes => "Impuestos",
            Category::Savings => "Ahorro",
            Category::Work => "Trabajo",
            Category::Leisure => "Ocio",
            Category::Other => "Otros",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Food => "🍔",
            Category::Transport => "🚗",
            Category::Health => "🩺",
            Category::Education => "📚",
            Category::Home => "🏠",
            Category::Utilities => "💡",
            Category::Communication => "📱",
            Category::Clothing => "👗",
            Category::Pets => "🐶",
            Category::Travel => "✈️",
            Category::Gifts => "🎁",
            Category::Taxes => "🧾",
            Category::Savings => "💰",
            Category::Work => "💼",
            Category::Leisure => "🎉",
            Category::Other => "🛒",
        }
    }

    /// Exact lookup by English or legacy label, case-insensitive.
    pub fn from_label(label: &str) -> Option<Category> {
        let label = label.trim();
        Category::ALL.iter().copied().find(|c| {
            c.as_str().eq_ignore_ascii_case(label)
                || c.legacy_label().to_lowercase() == label.to_lowercase()
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_label(s).ok_or_else(|| AppError::UnknownCategory(s.to_string()))
    }
}

/// Icon for a stored category string; unknown strings get [`DEFAULT_ICON`].
pub fn category_icon(label: &str) -> &'static str {
    Category::from_label(label)
        .map(|c| c.icon())
        .unwrap_or(DEFAULT_ICON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_distinct_icon() {
        let mut icons: Vec<&str> = Category::ALL.iter().map(|c| c.icon()).collect();
        icons.sort();
        icons.dedup();
        assert_eq!(icons.len(), Category::ALL.len());
        assert!(!icons.contains(&DEFAULT_ICON));
    }

    #[test]
    fn test_other_is_the_sixteenth_category() {
        assert_eq!(Category::ALL.len(), 16);
        assert_eq!(Category::ALL[15], Category::Other);
        assert_eq!(Category::ALL.iter().filter(|c| **c == Category::Other).count(), 1);
    }

    #[test]
    fn test_from_label_accepts_english_and_legacy() {
        assert_eq!(Category::from_label("Food"), Some(Category::Food));
        assert_eq!(Category::from_label("food"), Some(Category::Food));
        assert_eq!(Category::from_label("Alimentación"), Some(Category::Food));
        assert_eq!(Category::from_label("  Transporte "), Some(Category::Transport));
        assert_eq!(Category::from_label("Crypto"), None);
    }

    #[test]
    fn test_parse_unknown_category_is_validation_error() {
        let err = "Yachts".parse::<Category>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_category_icon_fallback() {
        assert_eq!(category_icon("Pets"), "🐶");
        assert_eq!(category_icon("Mascotas"), "🐶");
        assert_eq!(category_icon("Something New"), DEFAULT_ICON);
        assert_eq!(category_icon(""), DEFAULT_ICON);
    }
}
