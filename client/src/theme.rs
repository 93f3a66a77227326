use std::str::FromStr;

/// Key under which the chosen theme is persisted.
pub const THEME_STORAGE_KEY: &str = "fargo-theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
    Cyberpunk,
    Matrix,
}

const ORDER: [Theme; 4] = [Theme::Dark, Theme::Light, Theme::Cyberpunk, Theme::Matrix];

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
            Theme::Cyberpunk => "cyberpunk",
            Theme::Matrix => "matrix",
        }
    }

    pub fn next(&self) -> Theme {
        let index = ORDER.iter().position(|t| t == self).unwrap_or(0);
        ORDER[(index + 1) % ORDER.len()]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Dark
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTheme(pub String);

impl FromStr for Theme {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ORDER
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownTheme(s.to_owned()))
    }
}

/// Where a theme becomes visible and where the choice is remembered
/// between runs.
pub trait ThemeSurface {
    fn apply(&mut self, theme: Theme);
    fn persist(&mut self, key: &str, value: &str);
}

/// Single owner of the theme preference. Every change goes through here,
/// is pushed to the surface and persisted under [`THEME_STORAGE_KEY`].
pub struct ThemeContext<S: ThemeSurface> {
    theme: Theme,
    surface: S,
}

impl<S: ThemeSurface> ThemeContext<S> {
    /// Starts from a persisted value; unknown or missing falls back to dark.
    pub fn new(saved: Option<&str>, mut surface: S) -> Self {
        let theme = saved
            .and_then(|s| s.parse::<Theme>().ok())
            .unwrap_or_default();
        surface.apply(theme);
        Self { theme, surface }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn set_theme(&mut self, theme: Theme) {
        if self.theme != theme {
            log::debug!("Theme {} -> {}", self.theme, theme);
        }
        self.theme = theme;
        self.surface.apply(theme);
        self.surface.persist(THEME_STORAGE_KEY, theme.as_str());
    }

    pub fn toggle(&mut self) -> Theme {
        let next = self.theme.next();
        self.set_theme(next);
        next
    }
}
