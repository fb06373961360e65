//! Identifiers and share records shared by every component.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, KeyResult};

/// A user id, also used for the recovery and link-share pseudo-users.
///
/// Restricted to ASCII alphanumerics and `_ - @`. The dot is excluded so
/// that `<file>.<uid>.shareKey` names split unambiguously.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> KeyResult<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '@'));
        if valid {
            Ok(Self(id))
        } else {
            Err(KeyError::InvalidUserId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = KeyError;

    fn try_from(value: String) -> KeyResult<Self> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric file identifier assigned by the file catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u64);

/// Numeric share identifier assigned by the sharing subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShareId(pub u64);

impl fmt::Display for ShareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Folder,
}

/// Who a share grants access to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "with", rename_all = "lowercase")]
pub enum ShareGrant {
    User(UserId),
    Group(GroupId),
    /// Anonymous public link.
    Link,
}

/// One share as recorded by the sharing subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub id: ShareId,
    /// Set when this share is a re-share of something shared with `shared_by`.
    pub parent: Option<ShareId>,
    pub item_type: ItemType,
    pub item_source: FileId,
    /// Name of the item in the recipient's `/Shared` folder, e.g. `/b`.
    pub file_target: String,
    pub grant: ShareGrant,
    pub shared_by: UserId,
}

impl ShareRecord {
    /// The file target without its leading slash.
    pub fn target_name(&self) -> &str {
        self.file_target.trim_start_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_dots_and_separators() {
        assert!(UserId::new("alice").is_ok());
        assert!(UserId::new("bob_2-x@corp").is_ok());
        for bad in ["", "a.b", "a/b", "a b", "ü"] {
            assert!(
                matches!(UserId::new(bad), Err(KeyError::InvalidUserId(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn user_id_serde_validates() {
        let ok: UserId = serde_json::from_str("\"carol\"").unwrap();
        assert_eq!(ok.as_str(), "carol");
        assert!(serde_json::from_str::<UserId>("\"ca.rol\"").is_err());
    }

    #[test]
    fn grant_serializes_tagged() {
        let grant = ShareGrant::Group(GroupId("staff".into()));
        assert_eq!(
            serde_json::to_string(&grant).unwrap(),
            r#"{"type":"group","with":"staff"}"#
        );
    }
}
