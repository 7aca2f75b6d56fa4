// Core domain types shared across all containersync crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::keys::{ContainerId, KeyError, KeySpace, LocalContainerId};

/// Container color as understood by the browser.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Blue,
    Turquoise,
    Green,
    Yellow,
    Orange,
    Red,
    Pink,
    Purple,
    Toolbar,
}

/// Container icon as understood by the browser.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Icon {
    Fingerprint,
    Briefcase,
    Dollar,
    Cart,
    Circle,
    Gift,
    Vacation,
    Food,
    Fruit,
    Pet,
    Tree,
    Chill,
    Fence,
}

/// The user-visible attributes of an identity. This is what sync copies between replicas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityInfo {
    pub name: String,
    pub color: Color,
    pub icon: Icon,
}

impl IdentityInfo {
    pub fn new(name: impl Into<String>, color: Color, icon: Icon) -> Self {
        Self { name: name.into(), color, icon }
    }

    /// True when color or icon differ. Name is the pairing key on first sync.
    pub fn style_differs(&self, other: &IdentityInfo) -> bool {
        self.color != other.color || self.icon != other.icon
    }
}

impl fmt::Display for IdentityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}/{:?})", self.name, self.color, self.icon)
    }
}

/// A local identity container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub cookie_store_id: LocalContainerId,
    #[serde(flatten)]
    pub info: IdentityInfo,
}

impl Identity {
    pub fn name(&self) -> &str {
        &self.info.name
    }
}

/// A site-to-container assignment.
///
/// `user_context_id` is the suffix of the container id in whichever space the record
/// lives in. Any other fields the assignment manager keeps are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssignedSite {
    #[serde(deserialize_with = "string_or_number")]
    pub user_context_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssignedSite {
    pub fn new(user_context_id: impl Into<String>) -> Self {
        Self { user_context_id: user_context_id.into(), extra: Map::new() }
    }

    /// Container this assignment points at, read in the caller's key space.
    pub fn container<S: KeySpace>(&self) -> Result<ContainerId<S>, KeyError> {
        ContainerId::from_user_context_id(&self.user_context_id)
    }

    /// Same assignment re-pointed at another container.
    pub fn reassigned_to<S: KeySpace>(&self, container: &ContainerId<S>) -> Self {
        Self { user_context_id: container.user_context_id().to_string(), extra: self.extra.clone() }
    }
}

// Older assignment records stored the context id as a bare number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SyncContainerKey;

    #[test]
    fn identity_serializes_like_the_browser_api() {
        let identity = Identity {
            cookie_store_id: LocalContainerId::parse("firefox-container-1").unwrap(),
            info: IdentityInfo::new("Work", Color::Orange, Icon::Briefcase),
        };
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "cookieStoreId": "firefox-container-1",
                "name": "Work",
                "color": "orange",
                "icon": "briefcase",
            })
        );
    }

    #[test]
    fn unknown_color_is_rejected() {
        let result: Result<IdentityInfo, _> =
            serde_json::from_str(r#"{"name":"x","color":"magenta","icon":"tree"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn style_difference_ignores_name() {
        let a = IdentityInfo::new("A", Color::Blue, Icon::Tree);
        let b = IdentityInfo::new("B", Color::Blue, Icon::Tree);
        assert!(!a.style_differs(&b));
        let c = IdentityInfo::new("A", Color::Red, Icon::Tree);
        assert!(a.style_differs(&c));
    }

    #[test]
    fn assigned_site_keeps_extra_fields_when_reassigned() {
        let site: AssignedSite = serde_json::from_str(
            r#"{"userContextId":"4","neverAsk":true,"hostname":"example.com"}"#,
        )
        .unwrap();
        let target = LocalContainerId::from_user_context_id("9").unwrap();
        let moved = site.reassigned_to(&target);
        assert_eq!(moved.user_context_id, "9");
        assert_eq!(moved.extra.get("neverAsk"), Some(&Value::Bool(true)));

        let sync: SyncContainerKey = site.container().unwrap();
        assert_eq!(sync.to_string(), "firefox-container-4");
    }

    #[test]
    fn numeric_user_context_id_is_accepted() {
        let site: AssignedSite = serde_json::from_str(r#"{"userContextId":12}"#).unwrap();
        assert_eq!(site.user_context_id, "12");
    }
}
