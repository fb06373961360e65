//! Who must hold a share-key for a file.

use std::collections::BTreeSet;
use std::sync::Arc;

use keyshare_storage::path::dirname;

use crate::directory::{GroupDirectory, ShareRegistry};
use crate::error::KeyResult;
use crate::types::{ShareGrant, UserId};

/// Computes recipient sets from the share registry and group directory.
#[derive(Clone)]
pub struct RecipientSetCalculator {
    shares: Arc<dyn ShareRegistry>,
    groups: Arc<dyn GroupDirectory>,
    public_share_user: UserId,
}

impl RecipientSetCalculator {
    pub fn new(
        shares: Arc<dyn ShareRegistry>,
        groups: Arc<dyn GroupDirectory>,
        public_share_user: UserId,
    ) -> Self {
        Self {
            shares,
            groups,
            public_share_user,
        }
    }

    /// Users reached by one grant: a user, every current member of a group,
    /// or the link pseudo-user.
    pub fn expand_grant(&self, grant: &ShareGrant) -> KeyResult<Vec<UserId>> {
        match grant {
            ShareGrant::User(u) => Ok(vec![u.clone()]),
            ShareGrant::Group(g) => self.groups.group_members(g),
            ShareGrant::Link => Ok(vec![self.public_share_user.clone()]),
        }
    }

    /// Recipients for `path` in `owner`'s tree.
    ///
    /// The owner always comes first; everyone else follows sorted and
    /// deduplicated. Shares on any ancestor folder count. `recovery` is
    /// appended when the recovery escrow covers this owner.
    pub fn recipients(
        &self,
        owner: &UserId,
        path: &str,
        sharing_enabled: bool,
        recovery: Option<&UserId>,
    ) -> KeyResult<Vec<UserId>> {
        let mut others = BTreeSet::new();
        if sharing_enabled {
            let mut current = path;
            loop {
                for share in self.shares.shares_for_path(owner, current)? {
                    others.extend(self.expand_grant(&share.grant)?);
                }
                if current == "/" {
                    break;
                }
                current = dirname(current);
            }
        }
        if let Some(recovery) = recovery {
            others.insert(recovery.clone());
        }
        others.remove(owner);

        let mut recipients = Vec::with_capacity(others.len() + 1);
        recipients.push(owner.clone());
        recipients.extend(others);
        Ok(recipients)
    }
}
