//! Translates share events into the paths their keys live under.
//!
//! A share event names a file id and, for re-shares, the parent share. The
//! sharer sees the item either in their own tree or below `/Shared`; the
//! keys always live in the owner's tree. Resolution therefore runs in two
//! steps: rebuild the sharer's view path, then map it to the owner.

use std::sync::Arc;

use keyshare_storage::path::{basename, is_within, normalize_path, relative_to, segments};
use tracing::warn;

use crate::directory::{FileCatalog, ShareRegistry};
use crate::error::{KeyError, KeyResult};
use crate::events::{ShareEvent, UnshareEvent};
use crate::types::{FileId, ItemType, ShareId, ShareRecord, UserId};

const SHARED_ROOT: &str = "/Shared";

/// A path in its owner's tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    pub owner: UserId,
    pub path: String,
}

#[derive(Clone)]
pub struct PathResolver {
    catalog: Arc<dyn FileCatalog>,
    shares: Arc<dyn ShareRegistry>,
}

impl PathResolver {
    pub fn new(catalog: Arc<dyn FileCatalog>, shares: Arc<dyn ShareRegistry>) -> Self {
        Self { catalog, shares }
    }

    /// Path of a new share's item as the sharing user sees it.
    pub fn share_view_path(&self, event: &ShareEvent) -> KeyResult<String> {
        let target = (!event.file_target.is_empty()).then_some(event.file_target.as_str());
        self.view_path(event.item_source, event.item_type, event.parent, target)
    }

    /// Path of an unshared item as the unsharing user sees it.
    pub fn unshare_view_path(&self, event: &UnshareEvent) -> KeyResult<String> {
        self.view_path(event.item_source, event.item_type, event.item_parent, None)
    }

    pub fn resolve_share(&self, event: &ShareEvent) -> KeyResult<ResolvedPath> {
        let view = self.share_view_path(event)?;
        self.resolve_view(&event.uid_owner, &view)
    }

    pub fn resolve_unshare(&self, event: &UnshareEvent) -> KeyResult<ResolvedPath> {
        let view = self.unshare_view_path(event)?;
        self.resolve_view(&event.uid_owner, &view)
    }

    /// Maps any path in `actor`'s view to its owner.
    pub fn resolve_view(&self, actor: &UserId, path: &str) -> KeyResult<ResolvedPath> {
        let (owner, path) = self.shares.resolve_owner(actor, &normalize_path(path)?)?;
        Ok(ResolvedPath { owner, path })
    }

    fn view_path(
        &self,
        item: FileId,
        item_type: ItemType,
        parent: Option<ShareId>,
        file_target: Option<&str>,
    ) -> KeyResult<String> {
        let (_, real) = self
            .catalog
            .file_id_to_path(item)?
            .ok_or_else(|| KeyError::FileNotFound(format!("file id {}", item.0)))?;

        let path = match parent {
            None => real,
            Some(parent_id) => {
                let parent = self
                    .shares
                    .share_by_id(parent_id)?
                    .ok_or_else(|| KeyError::ShareNotFound(parent_id.to_string()))?;
                let base = format!("{SHARED_ROOT}/{}", parent.target_name());
                match (parent.item_type, item_type, file_target) {
                    (ItemType::File, _, _) => base,
                    (ItemType::Folder, ItemType::Folder, Some(target)) => {
                        normalize_path(&format!("{base}/{target}"))?
                    }
                    (ItemType::Folder, _, _) => self.inside_folder(&parent, &real, &base)?,
                }
            }
        };

        if is_within(&path, SHARED_ROOT) {
            Ok(path)
        } else {
            Ok(self.catalog.path_with_mount_point(item)?.unwrap_or(path))
        }
    }

    /// Rebuilds `<base>/<sub-path>` for an item inside a shared folder.
    fn inside_folder(&self, parent: &ShareRecord, real: &str, base: &str) -> KeyResult<String> {
        if let Some((_, folder)) = self.catalog.file_id_to_path(parent.item_source)? {
            if let Some(rel) = relative_to(real, &folder) {
                return Ok(normalize_path(&format!("{base}/{rel}"))?);
            }
        }

        // The folder is not an ancestor of the item (stale catalog or
        // cross-mount share). Fall back to matching the folder's name.
        let path = by_folder_name(real, basename(&parent.file_target), base)?;
        warn!(
            "{}; using {path}",
            KeyError::PathResolutionAmbiguity {
                path: real.to_string()
            }
        );
        Ok(path)
    }
}

/// Walks `real` from the leaf towards the root until a segment equals
/// `folder_name`, keeping the segments below it. The innermost match wins.
fn by_folder_name(real: &str, folder_name: &str, base: &str) -> KeyResult<String> {
    let parts: Vec<&str> = segments(real).collect();
    let start = parts
        .iter()
        .rposition(|s| *s == folder_name)
        .map(|i| i + 1)
        .unwrap_or(parts.len().saturating_sub(1));
    Ok(normalize_path(&format!("{base}/{}", parts[start..].join("/")))?)
}
