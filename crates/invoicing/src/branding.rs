//! Brand color themes applied to invoice PDFs, previews and emails.

use database::User;
use serde::Serialize;

/// A selectable color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BrandTheme {
    pub id: &'static str,
    pub name: &'static str,
    /// Accent color as `#rrggbb`.
    pub primary: &'static str,
    pub secondary: &'static str,
    pub description: &'static str,
}

/// Theme used when the user has not picked one.
pub const DEFAULT_THEME_ID: &str = "modern-orange";

pub const THEMES: [BrandTheme; 6] = [
    BrandTheme {
        id: "professional-blue",
        name: "Professional Blue",
        primary: "#2563eb",
        secondary: "#1e40af",
        description: "Classic blue for corporate environments",
    },
    BrandTheme {
        id: "modern-orange",
        name: "Modern Orange",
        primary: "#f97316",
        secondary: "#ea580c",
        description: "Vibrant orange for creative businesses",
    },
    BrandTheme {
        id: "elegant-purple",
        name: "Elegant Purple",
        primary: "#7c3aed",
        secondary: "#6d28d9",
        description: "Sophisticated purple for luxury brands",
    },
    BrandTheme {
        id: "nature-green",
        name: "Nature Green",
        primary: "#16a34a",
        secondary: "#15803d",
        description: "Fresh green for eco-friendly businesses",
    },
    BrandTheme {
        id: "bold-red",
        name: "Bold Red",
        primary: "#dc2626",
        secondary: "#b91c1c",
        description: "Powerful red for high-impact brands",
    },
    BrandTheme {
        id: "minimal-gray",
        name: "Minimal Gray",
        primary: "#6b7280",
        secondary: "#4b5563",
        description: "Clean gray for minimalist designs",
    },
];

/// Look up a theme by id.
pub fn find_theme(id: &str) -> Option<&'static BrandTheme> {
    THEMES.iter().find(|theme| theme.id == id)
}

/// The theme for an optional id, falling back to the default.
pub fn theme_or_default(id: Option<&str>) -> &'static BrandTheme {
    id.and_then(find_theme)
        .or_else(|| find_theme(DEFAULT_THEME_ID))
        .unwrap_or(&THEMES[1])
}

/// Parse `#rrggbb` into RGB components in `0.0..=1.0`.
pub fn hex_to_rgb(color: &str) -> Option<(f32, f32, f32)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| {
        u8::from_str_radix(hex.get(i..i + 2)?, 16)
            .ok()
            .map(|v| f32::from(v) / 255.0)
    };
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Branding resolved for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branding {
    pub theme: &'static BrandTheme,
    pub logo_url: Option<String>,
}

impl Branding {
    pub fn for_user(user: &User) -> Self {
        Self {
            theme: theme_or_default(user.brand_theme.as_deref()),
            logo_url: user
                .company_logo_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
        }
    }
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            theme: theme_or_default(None),
            logo_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_theme() {
        assert_eq!(theme_or_default(None).primary, "#f97316");
        assert_eq!(theme_or_default(Some("no-such-theme")).id, "modern-orange");
        assert_eq!(theme_or_default(Some("bold-red")).secondary, "#b91c1c");
    }

    #[test]
    fn test_every_theme_color_parses() {
        for theme in &THEMES {
            assert!(hex_to_rgb(theme.primary).is_some(), "{}", theme.id);
            assert!(hex_to_rgb(theme.secondary).is_some(), "{}", theme.id);
        }
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#ffffff"), Some((1.0, 1.0, 1.0)));
        assert_eq!(hex_to_rgb("#000000"), Some((0.0, 0.0, 0.0)));
        assert_eq!(hex_to_rgb("ffffff"), None);
        assert_eq!(hex_to_rgb("#fff"), None);
        assert_eq!(hex_to_rgb("#gg0000"), None);
    }
}
