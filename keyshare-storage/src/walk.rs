//! Lazy depth-first traversal of a subtree.

use crate::error::StorageResult;
use crate::path::join;
use crate::view::FileView;

/// Iterator over every file below a root, computed lazily.
///
/// Directories are listed only when the walk reaches them, so files added
/// concurrently may or may not be seen. A directory that vanishes before it
/// is listed is skipped silently. Other listing failures are yielded as
/// errors and the walk continues with the remaining directories.
pub struct FileWalker<'a> {
    view: &'a dyn FileView,
    pending_dirs: Vec<String>,
    ready: Vec<String>,
}

impl<'a> FileWalker<'a> {
    fn new(view: &'a dyn FileView, root: &str) -> Self {
        let mut walker = Self {
            view,
            pending_dirs: Vec::new(),
            ready: Vec::new(),
        };
        if view.is_dir(root) {
            walker.pending_dirs.push(root.to_string());
        } else if view.exists(root) {
            walker.ready.push(root.to_string());
        }
        walker
    }

    fn expand(&mut self, dir: &str) -> StorageResult<()> {
        let entries = match self.view.list_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        // Reverse so that popping yields entries in name order.
        for entry in entries.into_iter().rev() {
            let child = join(dir, &entry.name)?;
            if entry.is_dir {
                self.pending_dirs.push(child);
            } else {
                self.ready.push(child);
            }
        }
        Ok(())
    }
}

impl Iterator for FileWalker<'_> {
    type Item = StorageResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(file) = self.ready.pop() {
                return Some(Ok(file));
            }
            let dir = self.pending_dirs.pop()?;
            if let Err(e) = self.expand(&dir) {
                return Some(Err(e));
            }
        }
    }
}

/// Walks every file at or below `root`. A file root yields itself.
pub fn all_files<'a>(view: &'a dyn FileView, root: &str) -> FileWalker<'a> {
    FileWalker::new(view, root)
}
