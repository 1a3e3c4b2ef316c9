use crossterm::style::Color;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Persisted under the `theme` preference key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ThemeName {
    #[default]
    Light,
    Dark,
}

impl ThemeName {
    pub fn toggled(self) -> Self {
        match self {
            ThemeName::Light => ThemeName::Dark,
            ThemeName::Dark => ThemeName::Light,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            ThemeName::Light => Palette {
                date: Color::DarkBlue,
                time: Color::DarkCyan,
                text: Color::Black,
                muted: Color::DarkGrey,
                highlight: Color::DarkYellow,
                busy: Color::DarkMagenta,
                error: Color::DarkRed,
            },
            ThemeName::Dark => Palette {
                date: Color::Cyan,
                time: Color::Yellow,
                text: Color::White,
                muted: Color::Grey,
                highlight: Color::Magenta,
                busy: Color::Blue,
                error: Color::Red,
            },
        }
    }
}

/// Terminal colours for one theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub date: Color,
    pub time: Color,
    pub text: Color,
    pub muted: Color,
    pub highlight: Color,
    pub busy: Color,
    pub error: Color,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_toggles() {
        assert_eq!("Dark".parse::<ThemeName>().ok(), Some(ThemeName::Dark));
        assert_eq!(ThemeName::Light.toggled(), ThemeName::Dark);
        assert_eq!(ThemeName::Dark.to_string(), "dark");
        assert_eq!(serde_json::to_string(&ThemeName::Light).ok().as_deref(), Some("\"light\""));
    }
}
