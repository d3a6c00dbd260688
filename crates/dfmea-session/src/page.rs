use dfmea_core::{Page, Role};
use serde::{Deserialize, Serialize};

/// The three role pages. Viewer selects several values per level and fabricates
/// rows as soon as a product is picked; Engineer and Admin select one value per
/// level and generate explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageVariant {
    Viewer,
    Engineer,
    Admin,
}

impl PageVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Engineer => "engineer",
            Self::Admin => "admin",
        }
    }

    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Viewer => Self::Viewer,
            Role::Engineer => Self::Engineer,
            Role::Admin => Self::Admin,
        }
    }

    pub fn from_page(page: Page) -> Option<Self> {
        match page {
            Page::Login => None,
            Page::Viewer => Some(Self::Viewer),
            Page::Engineer => Some(Self::Engineer),
            Page::Admin => Some(Self::Admin),
        }
    }

    pub fn page(self) -> Page {
        match self {
            Self::Viewer => Page::Viewer,
            Self::Engineer => Page::Engineer,
            Self::Admin => Page::Admin,
        }
    }

    pub fn multi_select(self) -> bool {
        matches!(self, Self::Viewer)
    }

    pub fn can_generate(self) -> bool {
        !matches!(self, Self::Viewer)
    }

    pub fn can_feedback(self) -> bool {
        !matches!(self, Self::Viewer)
    }

    pub fn can_save(self) -> bool {
        !matches!(self, Self::Viewer)
    }

    pub fn can_upload(self) -> bool {
        matches!(self, Self::Admin)
    }

    pub fn can_export(self) -> bool {
        true
    }

    /// Viewer-only "Generated by" filter.
    pub fn has_generated_by(self) -> bool {
        matches!(self, Self::Viewer)
    }
}
