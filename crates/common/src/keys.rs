// Typed key spaces: container ids and site keys tagged with the replica they belong to.
//
// A container id is `firefox-container-<suffix>` in both spaces, but a local id is only
// meaningful to the local identity store and a sync key only to the remote snapshot that
// carried it. Site keys differ by prefix: `https://<origin>` locally and
// `siteContainerMap@@_<origin>` in sync storage. Conversions are explicit.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Prefix shared by every container id, local or sync.
pub const CONTAINER_PREFIX: &str = "firefox-container-";
/// Prefix of site keys as stored in sync storage.
pub const SYNC_SITE_PREFIX: &str = "siteContainerMap@@_";
/// Prefix of site keys as used by the local assignment manager.
pub const LOCAL_SITE_PREFIX: &str = "https://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("container id `{0}` does not start with `{CONTAINER_PREFIX}`")]
    ContainerPrefix(String),

    #[error("container id has an empty suffix")]
    EmptyContainerSuffix,

    #[error("site key `{key}` does not start with `{expected}`")]
    SitePrefix { key: String, expected: &'static str },

    #[error("site key has an empty origin")]
    EmptyOrigin,

    #[error("invalid site url `{0}`")]
    InvalidUrl(String),
}

/// Marker for the replica a key belongs to.
pub trait KeySpace: Copy + Default + fmt::Debug + Send + Sync + 'static {
    /// Short label used in diagnostics.
    const NAME: &'static str;
    /// Prefix used for site keys in this space.
    const SITE_PREFIX: &'static str;
}

/// Keys owned by the local stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSpace;

/// Keys carried by the remote sync snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncSpace;

impl KeySpace for LocalSpace {
    const NAME: &'static str = "local";
    const SITE_PREFIX: &'static str = LOCAL_SITE_PREFIX;
}

impl KeySpace for SyncSpace {
    const NAME: &'static str = "sync";
    const SITE_PREFIX: &'static str = SYNC_SITE_PREFIX;
}

// ── Container ids ──────────────────────────────────────────────────

/// A container id (`cookieStoreId`) tagged with its key space.
pub struct ContainerId<S: KeySpace> {
    suffix: String,
    _space: PhantomData<S>,
}

/// Container id of a local identity.
pub type LocalContainerId = ContainerId<LocalSpace>;
/// Container key as it appears in the remote `cookieStoreIDmap` and `identities`.
pub type SyncContainerKey = ContainerId<SyncSpace>;

impl<S: KeySpace> ContainerId<S> {
    /// Build from the numeric suffix a site assignment stores as `userContextId`.
    pub fn from_user_context_id(user_context_id: &str) -> Result<Self, KeyError> {
        if user_context_id.is_empty() {
            return Err(KeyError::EmptyContainerSuffix);
        }
        Ok(Self { suffix: user_context_id.to_string(), _space: PhantomData })
    }

    /// Parse a full `firefox-container-<suffix>` id.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let suffix = raw
            .strip_prefix(CONTAINER_PREFIX)
            .ok_or_else(|| KeyError::ContainerPrefix(raw.to_string()))?;
        Self::from_user_context_id(suffix)
    }

    /// The suffix after `firefox-container-`, i.e. the `userContextId`.
    pub fn user_context_id(&self) -> &str {
        &self.suffix
    }

    pub fn as_string(&self) -> String {
        format!("{CONTAINER_PREFIX}{}", self.suffix)
    }

    fn retag<T: KeySpace>(self) -> ContainerId<T> {
        ContainerId { suffix: self.suffix, _space: PhantomData }
    }
}

impl LocalContainerId {
    /// Publish a local id into sync space. Backup is the only writer of sync keys.
    pub fn into_sync(self) -> SyncContainerKey {
        self.retag()
    }
}

impl<S: KeySpace> Clone for ContainerId<S> {
    fn clone(&self) -> Self {
        Self { suffix: self.suffix.clone(), _space: PhantomData }
    }
}

impl<S: KeySpace> PartialEq for ContainerId<S> {
    fn eq(&self, other: &Self) -> bool {
        self.suffix == other.suffix
    }
}

impl<S: KeySpace> Eq for ContainerId<S> {}

impl<S: KeySpace> Hash for ContainerId<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.suffix.hash(state);
    }
}

impl<S: KeySpace> PartialOrd for ContainerId<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: KeySpace> Ord for ContainerId<S> {
    // Numeric suffixes sort numerically so `-10` follows `-9`, ahead of any
    // non-numeric suffix. Ties fall back to the text so `9` and `09` stay distinct.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.suffix.parse::<u64>(), other.suffix.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.suffix.cmp(&other.suffix)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.suffix.cmp(&other.suffix),
        }
    }
}

impl<S: KeySpace> fmt::Debug for ContainerId<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({CONTAINER_PREFIX}{})", S::NAME, self.suffix)
    }
}

impl<S: KeySpace> fmt::Display for ContainerId<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{CONTAINER_PREFIX}{}", self.suffix)
    }
}

impl<S: KeySpace> FromStr for ContainerId<S> {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<S: KeySpace> Serialize for ContainerId<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, S: KeySpace> Deserialize<'de> for ContainerId<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ── Site keys ──────────────────────────────────────────────────────

/// A normalized site key (the origin of an assigned site) tagged with its key space.
pub struct SiteKey<S: KeySpace> {
    origin: String,
    _space: PhantomData<S>,
}

/// Site key in the local assignment manager's space (`https://<origin>`).
pub type LocalSiteKey = SiteKey<LocalSpace>;
/// Site key in sync storage (`siteContainerMap@@_<origin>`).
pub type SyncSiteKey = SiteKey<SyncSpace>;

impl<S: KeySpace> SiteKey<S> {
    pub fn from_origin(origin: &str) -> Result<Self, KeyError> {
        if origin.is_empty() {
            return Err(KeyError::EmptyOrigin);
        }
        Ok(Self { origin: origin.to_string(), _space: PhantomData })
    }

    /// Parse a prefixed key of this space.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let origin = raw.strip_prefix(S::SITE_PREFIX).ok_or_else(|| KeyError::SitePrefix {
            key: raw.to_string(),
            expected: S::SITE_PREFIX,
        })?;
        Self::from_origin(origin)
    }

    /// Derive the site key from any URL on the site (`host[:port]`).
    pub fn from_url(raw: &str) -> Result<Self, KeyError> {
        let parsed = url::Url::parse(raw).map_err(|_| KeyError::InvalidUrl(raw.to_string()))?;
        let host = parsed.host_str().ok_or_else(|| KeyError::InvalidUrl(raw.to_string()))?;
        match parsed.port() {
            Some(port) => Self::from_origin(&format!("{host}:{port}")),
            None => Self::from_origin(host),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn retag<T: KeySpace>(&self) -> SiteKey<T> {
        SiteKey { origin: self.origin.clone(), _space: PhantomData }
    }
}

impl LocalSiteKey {
    pub fn to_sync(&self) -> SyncSiteKey {
        self.retag()
    }
}

impl SyncSiteKey {
    pub fn to_local(&self) -> LocalSiteKey {
        self.retag()
    }
}

impl<S: KeySpace> Clone for SiteKey<S> {
    fn clone(&self) -> Self {
        self.retag()
    }
}

impl<S: KeySpace> PartialEq for SiteKey<S> {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
    }
}

impl<S: KeySpace> Eq for SiteKey<S> {}

impl<S: KeySpace> Hash for SiteKey<S> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
    }
}

impl<S: KeySpace> PartialOrd for SiteKey<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: KeySpace> Ord for SiteKey<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.origin.cmp(&other.origin)
    }
}

impl<S: KeySpace> fmt::Debug for SiteKey<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}{})", S::NAME, S::SITE_PREFIX, self.origin)
    }
}

impl<S: KeySpace> fmt::Display for SiteKey<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", S::SITE_PREFIX, self.origin)
    }
}

impl<S: KeySpace> FromStr for SiteKey<S> {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<S: KeySpace> Serialize for SiteKey<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, S: KeySpace> Deserialize<'de> for SiteKey<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
