use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct ParseSectionError {
    pub kind: &'static str,
    pub value: String,
}

/// Top-level area of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Section {
    Home,
    CvBuilder,
    IdCardPrint,
    Marketplace,
    Admin,
    Shopkeeper,
}

impl Section {
    pub const fn as_str(self) -> &'static str {
        match self {
            Section::Home => "home",
            Section::CvBuilder => "cv-builder",
            Section::IdCardPrint => "id-card-print",
            Section::Marketplace => "marketplace",
            Section::Admin => "admin",
            Section::Shopkeeper => "shopkeeper",
        }
    }

    /// Sections that may be restored from the durable `selectedSection` value.
    /// Admin and shopkeeper areas are only ever reached through their routes.
    pub const fn is_restorable(self) -> bool {
        matches!(
            self,
            Section::Home | Section::CvBuilder | Section::IdCardPrint | Section::Marketplace
        )
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Section {
    type Err = ParseSectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "home" => Ok(Section::Home),
            "cv-builder" => Ok(Section::CvBuilder),
            "id-card-print" => Ok(Section::IdCardPrint),
            "marketplace" => Ok(Section::Marketplace),
            "admin" => Ok(Section::Admin),
            "shopkeeper" => Ok(Section::Shopkeeper),
            other => Err(ParseSectionError {
                kind: "section",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubView {
    #[default]
    Dashboard,
    Editor,
    Print,
}

impl SubView {
    pub const fn as_str(self) -> &'static str {
        match self {
            SubView::Dashboard => "dashboard",
            SubView::Editor => "editor",
            SubView::Print => "print",
        }
    }
}

impl fmt::Display for SubView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubView {
    type Err = ParseSectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dashboard" => Ok(SubView::Dashboard),
            // Older builds stored the editor view under the section name.
            "editor" | "cv-builder" => Ok(SubView::Editor),
            "print" => Ok(SubView::Print),
            other => Err(ParseSectionError {
                kind: "view mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Full-document routes that take precedence over any section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "route", rename_all = "kebab-case")]
pub enum SpecialRoute {
    Cart,
    Checkout,
    OrderDetails { order_id: Option<String> },
    OrderHistory,
    Profile,
    ProductDetail { product_id: String },
    PasswordReset,
}

impl SpecialRoute {
    /// Whether rendering the route needs an authenticated session.
    pub const fn requires_session(&self) -> bool {
        match self {
            SpecialRoute::Cart | SpecialRoute::ProductDetail { .. } | SpecialRoute::PasswordReset => {
                false
            }
            SpecialRoute::Checkout
            | SpecialRoute::OrderDetails { .. }
            | SpecialRoute::OrderHistory
            | SpecialRoute::Profile => true,
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            SpecialRoute::Cart => "cart",
            SpecialRoute::Checkout => "checkout",
            SpecialRoute::OrderDetails { .. } => "order-details",
            SpecialRoute::OrderHistory => "order-history",
            SpecialRoute::Profile => "profile",
            SpecialRoute::ProductDetail { .. } => "product-detail",
            SpecialRoute::PasswordReset => "password-reset",
        }
    }
}

/// How the renderer must gate the resolved screen on authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Access {
    #[default]
    Granted,
    LoginRequired,
    AwaitingIdentity,
}

impl Access {
    pub const fn gate(requires_session: bool, authenticated: bool, loading: bool) -> Self {
        if !requires_session || authenticated {
            Access::Granted
        } else if loading {
            Access::AwaitingIdentity
        } else {
            Access::LoginRequired
        }
    }
}

/// The screen the UI must render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewState {
    pub section: Section,
    pub sub_view: SubView,
    pub special_route: Option<SpecialRoute>,
    pub access: Access,
}

impl ViewState {
    pub fn home() -> Self {
        Self::section(Section::Home, SubView::Dashboard)
    }

    pub fn section(section: Section, sub_view: SubView) -> Self {
        Self {
            section,
            sub_view,
            special_route: None,
            access: Access::Granted,
        }
    }

    pub fn special(route: SpecialRoute, access: Access) -> Self {
        Self {
            section: Section::Home,
            sub_view: SubView::Dashboard,
            special_route: Some(route),
            access,
        }
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn is_special(&self) -> bool {
        self.special_route.is_some()
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::home()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_strings_round_trip_through_serde_and_from_str() {
        for section in [
            Section::Home,
            Section::CvBuilder,
            Section::IdCardPrint,
            Section::Marketplace,
            Section::Admin,
            Section::Shopkeeper,
        ] {
            let json = serde_json::to_string(&section).unwrap();
            assert_eq!(json, format!("\"{}\"", section.as_str()));
            assert_eq!(section.as_str().parse::<Section>().unwrap(), section);
        }
    }

    #[test]
    fn legacy_editor_value_still_parses() {
        assert_eq!("cv-builder".parse::<SubView>().unwrap(), SubView::Editor);
        assert!("preview-ish".parse::<SubView>().is_err());
    }

    #[test]
    fn access_gate_branches_on_auth_and_loading() {
        assert_eq!(Access::gate(false, false, false), Access::Granted);
        assert_eq!(Access::gate(true, true, false), Access::Granted);
        assert_eq!(Access::gate(true, false, true), Access::AwaitingIdentity);
        assert_eq!(Access::gate(true, false, false), Access::LoginRequired);
    }
}
