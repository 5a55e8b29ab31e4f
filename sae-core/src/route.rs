//! Wizard screens
//!
//! The store never needs to know the current route; views call into the store.

use std::fmt;

/// One of the three wizard screens, in navigation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Project,
    Building,
    Solution,
}

impl Route {
    pub const ALL: [Route; 3] = [Route::Project, Route::Building, Route::Solution];

    /// Parses a route name (a leading `#` is ignored). Unknown names map to `Project`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().trim_start_matches('#').to_lowercase().as_str() {
            "building" => Route::Building,
            "solution" => Route::Solution,
            _ => Route::Project,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Route::Project => 0,
            Route::Building => 1,
            Route::Solution => 2,
        }
    }

    pub fn next(&self) -> Option<Route> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn previous(&self) -> Option<Route> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Project => "Project details",
            Route::Building => "Building details",
            Route::Solution => "Solution",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Project => write!(f, "project"),
            Route::Building => write!(f, "building"),
            Route::Solution => write!(f, "solution"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_falls_back_to_project() {
        assert_eq!(Route::parse("#building"), Route::Building);
        assert_eq!(Route::parse("solution"), Route::Solution);
        assert_eq!(Route::parse(""), Route::Project);
        assert_eq!(Route::parse("#settings"), Route::Project);
    }

    #[test]
    fn test_navigation_order() {
        assert_eq!(Route::Project.next(), Some(Route::Building));
        assert_eq!(Route::Solution.next(), None);
        assert_eq!(Route::Building.previous(), Some(Route::Project));
        assert_eq!(Route::Project.previous(), None);
    }
}
