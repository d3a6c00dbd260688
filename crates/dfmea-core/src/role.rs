use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Engineer,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Engineer => "engineer",
            Self::Admin => "admin",
        }
    }

    /// Page a signed-in user lands on.
    pub fn home_page(self) -> Page {
        match self {
            Self::Viewer => Page::Viewer,
            Self::Engineer => Page::Engineer,
            Self::Admin => Page::Admin,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "viewer" => Ok(Self::Viewer),
            "engineer" => Ok(Self::Engineer),
            "admin" => Ok(Self::Admin),
            other => Err(format!(
                "invalid role '{other}', expected one of: viewer, engineer, admin"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    Login,
    Viewer,
    Engineer,
    Admin,
}

impl Page {
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Viewer => "/viewer",
            Self::Engineer => "/engineer",
            Self::Admin => "/admin",
        }
    }

    /// Unknown paths fall back to the login page.
    pub fn from_path(path: &str) -> Self {
        match path.trim().trim_end_matches('/') {
            "/viewer" => Self::Viewer,
            "/engineer" => Self::Engineer,
            "/admin" => Self::Admin,
            _ => Self::Login,
        }
    }

    pub fn allows(self, role: Role) -> bool {
        match self {
            Self::Login | Self::Viewer => true,
            Self::Engineer => matches!(role, Role::Engineer | Role::Admin),
            Self::Admin => matches!(role, Role::Admin),
        }
    }
}

/// Page actually shown for `requested`: anonymous users go to login, signed-in users
/// are sent to their home page when the role may not open the requested one or when
/// they ask for the login page again.
pub fn resolve_route(role: Option<Role>, requested: Page) -> Page {
    match role {
        None => Page::Login,
        Some(role) if requested == Page::Login => role.home_page(),
        Some(role) if requested.allows(role) => requested,
        Some(role) => role.home_page(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    /// Up to two uppercase initials for avatar fallbacks.
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|part| part.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!(
                "invalid theme '{other}', expected one of: light, dark"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_users_always_land_on_login() {
        for page in [Page::Login, Page::Viewer, Page::Engineer, Page::Admin] {
            assert_eq!(resolve_route(None, page), Page::Login);
        }
    }

    #[test]
    fn roles_are_redirected_to_their_home_when_not_allowed() {
        assert_eq!(resolve_route(Some(Role::Viewer), Page::Admin), Page::Viewer);
        assert_eq!(
            resolve_route(Some(Role::Viewer), Page::Engineer),
            Page::Viewer
        );
        assert_eq!(
            resolve_route(Some(Role::Engineer), Page::Admin),
            Page::Engineer
        );
        assert_eq!(
            resolve_route(Some(Role::Engineer), Page::Viewer),
            Page::Viewer
        );
        assert_eq!(resolve_route(Some(Role::Admin), Page::Engineer), Page::Engineer);
        assert_eq!(resolve_route(Some(Role::Admin), Page::Login), Page::Admin);
    }

    #[test]
    fn unknown_paths_map_to_login() {
        assert_eq!(Page::from_path("/admin/"), Page::Admin);
        assert_eq!(Page::from_path("/"), Page::Login);
        assert_eq!(Page::from_path("/reports"), Page::Login);
        assert_eq!(Role::Engineer.home_page().path(), "/engineer");
    }

    #[test]
    fn initials_use_first_two_words() {
        let user = User {
            id: "2".to_owned(),
            name: "bob the engineer".to_owned(),
            email: "engineer@dfmea.com".to_owned(),
            role: Role::Engineer,
        };
        assert_eq!(user.initials(), "BT");
    }

    #[test]
    fn theme_toggles_and_parses() {
        assert_eq!(Theme::default().toggled(), Theme::Dark);
        assert_eq!("dark".parse::<Theme>(), Ok(Theme::Dark));
        assert!("blue".parse::<Theme>().is_err());
    }
}
