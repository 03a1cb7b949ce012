//! In-memory reference volume.
//!
//! `MemoryFs` models the contract the probes check: creation dispositions,
//! hard and symbolic links, attribute bits, byte-range locks, sparse and
//! compressed allocation, and free-cluster accounting. The harness runs its
//! self-tests against it, and the CLI exposes it as the `memory` back end.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::config::{CaseSensitivity, FsConfig};
use crate::error::{FsError, FsResult};
use crate::oracle::FsOracle;
use crate::pattern::NamePattern;
use crate::storage::{ContentId, InMemoryBackend, StorageBackend, StorageLayout};
use crate::types::{
    Access, DirEntry, Disposition, EntityId, FileAttributes, FileTimes, FreeSpace, HandleId,
    OpenRequest, RenameTarget,
};

static NEXT_VOLUME_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Characters a name may not contain.
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\', '/'];

/// Internal node ID for filesystem nodes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct NodeId(u64);

/// Filesystem node types
#[derive(Clone, Debug)]
enum NodeKind {
    File {
        content_id: ContentId,
        layout: StorageLayout,
    },
    Directory {
        children: BTreeMap<String, DirSlot>,
    },
    Symlink {
        target: PathBuf,
        is_dir: bool,
    },
}

/// A named entry in a directory. The map key is the case-folded name.
#[derive(Clone, Debug)]
struct DirSlot {
    name: String,
    node: NodeId,
}

/// Filesystem node
#[derive(Clone, Debug)]
struct Node {
    kind: NodeKind,
    times: FileTimes,
    /// Only the settable bits are stored; the rest derive from `kind`.
    attributes: FileAttributes,
    links: u32,
}

/// Open file handle
#[derive(Debug)]
struct Handle {
    node_id: NodeId,
    /// Resolved path the handle was opened through.
    path: Vec<String>,
    position: u64,
    access: Access,
    delete_on_close: bool,
}

#[derive(Clone, Copy, Debug)]
struct ByteRangeLock {
    node_id: NodeId,
    handle: HandleId,
    offset: u64,
    len: u64,
}

impl ByteRangeLock {
    fn overlaps(&self, offset: u64, len: u64) -> bool {
        len > 0 && self.offset < offset.saturating_add(len) && offset < self.offset + self.len
    }
}

/// Result of walking a path
#[derive(Clone, Debug)]
struct Resolved {
    node: NodeId,
    /// Parent directory and the case-folded key of the entry in it.
    parent: Option<(NodeId, String)>,
    path: Vec<String>,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn fresh_times() -> FileTimes {
    let now = current_timestamp();
    FileTimes {
        created: now,
        accessed: now,
        modified: now,
        changed: now,
    }
}

fn round_up(len: u64, cluster_size: u64) -> u64 {
    len.div_ceil(cluster_size.max(1)) * cluster_size.max(1)
}

/// Apply `path` to `out` lexically: a root resets, `..` pops, `.` is skipped.
fn push_components(out: &mut Vec<String>, path: &Path) -> FsResult<()> {
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.clear(),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => {
                let name = name.to_str().ok_or(FsError::InvalidName)?;
                out.push(name.to_string());
            }
        }
    }
    Ok(())
}

fn components(path: &Path) -> FsResult<Vec<String>> {
    let mut out = Vec::new();
    push_components(&mut out, path)?;
    Ok(out)
}

fn validate_name(name: &str) -> FsResult<()> {
    if name.is_empty()
        || name.contains(RESERVED_CHARS)
        || name.chars().any(|c| (c as u32) < 0x20)
    {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

struct VolumeState {
    config: FsConfig,
    storage: Arc<dyn StorageBackend>,
    nodes: HashMap<NodeId, Node>,
    handles: HashMap<HandleId, Handle>,
    locks: Vec<ByteRangeLock>,
    root_id: NodeId,
    next_node_id: u64,
    next_handle_id: u64,
}

impl VolumeState {
    fn new(config: FsConfig, storage: Arc<dyn StorageBackend>) -> Self {
        let root_id = NodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            root_id,
            Node {
                kind: NodeKind::Directory {
                    children: BTreeMap::new(),
                },
                times: fresh_times(),
                attributes: FileAttributes::empty(),
                links: 1,
            },
        );

        Self {
            config,
            storage,
            nodes,
            handles: HashMap::new(),
            locks: Vec::new(),
            root_id,
            next_node_id: 2,
            next_handle_id: 1,
        }
    }

    fn key(&self, name: &str) -> String {
        match self.config.case_sensitivity {
            CaseSensitivity::Sensitive => name.to_string(),
            CaseSensitivity::InsensitivePreserving => name.to_lowercase(),
        }
    }

    fn cluster_size(&self) -> u64 {
        self.config.volume.cluster_size()
    }

    fn node(&self, id: NodeId) -> FsResult<&Node> {
        self.nodes.get(&id).ok_or(FsError::NotFound)
    }

    fn node_mut(&mut self, id: NodeId) -> FsResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(FsError::NotFound)
    }

    fn handle(&self, id: HandleId) -> FsResult<&Handle> {
        self.handles.get(&id).ok_or(FsError::InvalidHandle)
    }

    fn handle_mut(&mut self, id: HandleId) -> FsResult<&mut Handle> {
        self.handles.get_mut(&id).ok_or(FsError::InvalidHandle)
    }

    fn allocate_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn allocate_handle_id(&mut self) -> HandleId {
        let id = HandleId::new(self.next_handle_id);
        self.next_handle_id += 1;
        id
    }

    fn child(&self, dir: NodeId, key: &str) -> FsResult<Option<DirSlot>> {
        match &self.node(dir)?.kind {
            NodeKind::Directory { children } => Ok(children.get(key).cloned()),
            _ => Err(FsError::NotADirectory),
        }
    }

    fn is_directory(&self, id: NodeId) -> FsResult<bool> {
        Ok(matches!(self.node(id)?.kind, NodeKind::Directory { .. }))
    }

    /// Walk `comps` from the root. Intermediate symbolic links are always
    /// followed; the final one only when `follow_final` is set.
    fn resolve(&self, comps: &[String], follow_final: bool) -> FsResult<Resolved> {
        let mut pending: VecDeque<String> = comps.iter().cloned().collect();
        let mut current = self.root_id;
        let mut path: Vec<String> = Vec::new();
        let mut parent = None;
        let mut hops = 0u32;

        while let Some(name) = pending.pop_front() {
            let key = self.key(&name);
            let slot = self.child(current, &key)?.ok_or(FsError::NotFound)?;
            let is_last = pending.is_empty();

            if let NodeKind::Symlink { target, .. } = &self.node(slot.node)?.kind {
                if !is_last || follow_final {
                    hops += 1;
                    if hops > self.config.limits.max_symlink_depth {
                        return Err(FsError::InvalidArgument);
                    }
                    let mut expanded = path.clone();
                    push_components(&mut expanded, target)?;
                    expanded.extend(pending.drain(..));
                    pending = expanded.into();
                    current = self.root_id;
                    path.clear();
                    parent = None;
                    continue;
                }
            }

            parent = Some((current, key));
            current = slot.node;
            path.push(slot.name);
        }

        Ok(Resolved {
            node: current,
            parent,
            path,
        })
    }

    fn resolve_path(&self, path: &Path, follow_final: bool) -> FsResult<Resolved> {
        self.resolve(&components(path)?, follow_final)
    }

    /// Resolve the directory that would hold the final component.
    fn resolve_parent(&self, comps: &[String]) -> FsResult<(NodeId, Vec<String>, String)> {
        let (name, parent_comps) = comps.split_last().ok_or(FsError::InvalidArgument)?;
        let parent = self.resolve(parent_comps, true)?;
        if !self.is_directory(parent.node)? {
            return Err(FsError::NotADirectory);
        }
        Ok((parent.node, parent.path, name.clone()))
    }

    fn ensure_vacant(&self, dir: NodeId, name: &str) -> FsResult<()> {
        validate_name(name)?;
        match self.child(dir, &self.key(name))? {
            Some(_) => Err(FsError::AlreadyExists),
            None => Ok(()),
        }
    }

    fn insert_child(&mut self, dir: NodeId, name: &str, node: NodeId) -> FsResult<()> {
        let key = self.key(name);
        let now = current_timestamp();
        let dir_node = self.node_mut(dir)?;
        match &mut dir_node.kind {
            NodeKind::Directory { children } => {
                if children.contains_key(&key) {
                    return Err(FsError::AlreadyExists);
                }
                children.insert(
                    key,
                    DirSlot {
                        name: name.to_string(),
                        node,
                    },
                );
            }
            _ => return Err(FsError::NotADirectory),
        }
        dir_node.times.modified = now;
        dir_node.times.changed = now;
        Ok(())
    }

    fn remove_child(&mut self, dir: NodeId, key: &str) -> FsResult<DirSlot> {
        let now = current_timestamp();
        let dir_node = self.node_mut(dir)?;
        let slot = match &mut dir_node.kind {
            NodeKind::Directory { children } => children.remove(key).ok_or(FsError::NotFound)?,
            _ => return Err(FsError::NotADirectory),
        };
        dir_node.times.modified = now;
        dir_node.times.changed = now;
        Ok(slot)
    }

    /// Create a node and link it under `dir`. The caller checked the name.
    fn attach(
        &mut self,
        dir: NodeId,
        name: &str,
        kind: NodeKind,
        attributes: FileAttributes,
    ) -> FsResult<NodeId> {
        let id = self.allocate_node_id();
        self.nodes.insert(
            id,
            Node {
                kind,
                times: fresh_times(),
                attributes: attributes.intersection(FileAttributes::SETTABLE),
                links: 1,
            },
        );
        if let Err(err) = self.insert_child(dir, name, id) {
            self.nodes.remove(&id);
            return Err(err);
        }
        Ok(id)
    }

    /// Drop a name; the node goes away once no name or handle refers to it.
    fn unlink(&mut self, dir: NodeId, key: &str) -> FsResult<()> {
        let slot = self.remove_child(dir, key)?;
        let now = current_timestamp();
        let node = self.node_mut(slot.node)?;
        node.links = node.links.saturating_sub(1);
        node.times.changed = now;
        self.reclaim_if_orphaned(slot.node)
    }

    fn reclaim_if_orphaned(&mut self, id: NodeId) -> FsResult<()> {
        let orphaned = self.nodes.get(&id).is_some_and(|n| n.links == 0)
            && !self.handles.values().any(|h| h.node_id == id);
        if orphaned {
            if let Some(node) = self.nodes.remove(&id) {
                if let NodeKind::File { content_id, .. } = node.kind {
                    self.storage.release(content_id)?;
                }
            }
        }
        Ok(())
    }

    fn node_attributes(&self, node: &Node) -> FileAttributes {
        match &node.kind {
            NodeKind::File { layout, .. } => {
                let mut attrs = node.attributes;
                match layout {
                    StorageLayout::Dense => {}
                    StorageLayout::Sparse => attrs |= FileAttributes::SPARSE,
                    StorageLayout::Compressed => attrs |= FileAttributes::COMPRESSED,
                }
                if attrs.is_empty() {
                    FileAttributes::NORMAL
                } else {
                    attrs
                }
            }
            NodeKind::Directory { .. } => FileAttributes::DIRECTORY | node.attributes,
            NodeKind::Symlink { is_dir, .. } => {
                let mut attrs = FileAttributes::REPARSE_POINT | node.attributes;
                if *is_dir {
                    attrs |= FileAttributes::DIRECTORY;
                }
                attrs
            }
        }
    }

    fn node_len(&self, node: &Node) -> FsResult<u64> {
        match &node.kind {
            NodeKind::File { content_id, .. } => self.storage.len(*content_id),
            NodeKind::Symlink { target, .. } => Ok(target.as_os_str().len() as u64),
            NodeKind::Directory { .. } => Ok(0),
        }
    }

    fn dir_entry(&self, slot: &DirSlot) -> FsResult<DirEntry> {
        let node = self.node(slot.node)?;
        Ok(DirEntry {
            name: slot.name.clone(),
            attributes: self.node_attributes(node),
            len: self.node_len(node)?,
        })
    }

    fn file_content(&self, id: NodeId) -> FsResult<(ContentId, StorageLayout)> {
        match &self.node(id)?.kind {
            NodeKind::File { content_id, layout } => Ok((*content_id, *layout)),
            NodeKind::Directory { .. } => Err(FsError::IsADirectory),
            NodeKind::Symlink { .. } => Err(FsError::InvalidArgument),
        }
    }

    fn used_bytes(&self) -> FsResult<u64> {
        let cluster = self.cluster_size();
        let mut used = 0u64;
        for node in self.nodes.values() {
            if let NodeKind::File { content_id, layout } = &node.kind {
                used += self.storage.allocated(*content_id, *layout, cluster)?;
            }
        }
        Ok(used)
    }

    /// Refuse growth the volume cannot hold.
    fn reserve(&self, content_id: ContentId, new_end: u64) -> FsResult<()> {
        let cluster = self.cluster_size();
        let current = self.storage.len(content_id)?;
        if new_end <= current {
            return Ok(());
        }
        let growth = round_up(new_end, cluster) - round_up(current, cluster);
        let capacity = self.config.volume.total_clusters * cluster;
        if self.used_bytes()? + growth > capacity {
            return Err(FsError::NoSpace);
        }
        Ok(())
    }

    fn conflicting_lock(&self, node_id: NodeId, handle: HandleId, offset: u64, len: u64) -> bool {
        self.locks
            .iter()
            .any(|l| l.node_id == node_id && l.handle != handle && l.overlaps(offset, len))
    }

    fn touch_modified(&mut self, id: NodeId) -> FsResult<()> {
        let now = current_timestamp();
        let node = self.node_mut(id)?;
        node.times.modified = now;
        node.times.changed = now;
        Ok(())
    }

    fn issue_handle(&mut self, node_id: NodeId, path: Vec<String>, access: Access) -> HandleId {
        let id = self.allocate_handle_id();
        self.handles.insert(
            id,
            Handle {
                node_id,
                path,
                position: 0,
                access,
                delete_on_close: false,
            },
        );
        id
    }

    fn keys_start_with(&self, path: &[String], prefix: &[String]) -> bool {
        path.len() >= prefix.len()
            && path
                .iter()
                .zip(prefix)
                .all(|(a, b)| self.key(a) == self.key(b))
    }

    // Existence and identity

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path, false).is_ok()
    }

    fn size(&self, path: &Path) -> FsResult<u64> {
        let found = self.resolve_path(path, true)?;
        let node = self.node(found.node)?;
        self.node_len(node)
    }

    // Creation

    fn create(&mut self, path: &Path, request: &OpenRequest) -> FsResult<HandleId> {
        if self.handles.len() >= self.config.limits.max_open_handles as usize {
            return Err(FsError::TooManyOpenFiles);
        }
        let comps = components(path)?;

        match self.resolve(&comps, true) {
            Ok(found) => self.open_existing(found, request),
            Err(FsError::NotFound) => {
                // A dangling link still occupies its name.
                if self.resolve(&comps, false).is_ok() {
                    return Err(match request.disposition {
                        Disposition::CreateNew => FsError::AlreadyExists,
                        _ => FsError::NotFound,
                    });
                }
                match request.disposition {
                    Disposition::OpenExisting | Disposition::TruncateExisting => {
                        Err(FsError::NotFound)
                    }
                    Disposition::CreateNew
                    | Disposition::CreateAlways
                    | Disposition::OpenAlways => {
                        self.create_new_file(&comps, request)
                    }
                }
            }
            Err(err) => Err(err),
        }
    }

    fn open_existing(&mut self, found: Resolved, request: &OpenRequest) -> FsResult<HandleId> {
        let disposition = request.disposition;
        let access = request.access;
        let node = self.node(found.node)?;
        let read_only = node.attributes.contains(FileAttributes::READ_ONLY);

        match &node.kind {
            NodeKind::Directory { .. } => {
                if disposition == Disposition::CreateNew {
                    return Err(FsError::AlreadyExists);
                }
                if access.can_write()
                    || matches!(
                        disposition,
                        Disposition::CreateAlways | Disposition::TruncateExisting
                    )
                {
                    return Err(FsError::AccessDenied);
                }
            }
            NodeKind::File { content_id, .. } => {
                let content_id = *content_id;
                match disposition {
                    Disposition::CreateNew => return Err(FsError::AlreadyExists),
                    Disposition::CreateAlways | Disposition::TruncateExisting => {
                        if read_only {
                            return Err(FsError::AccessDenied);
                        }
                        if disposition == Disposition::TruncateExisting && !access.can_write() {
                            return Err(FsError::AccessDenied);
                        }
                        self.storage.truncate(content_id, 0)?;
                        self.touch_modified(found.node)?;
                        if disposition == Disposition::CreateAlways {
                            let node = self.node_mut(found.node)?;
                            node.attributes =
                                request.attributes.intersection(FileAttributes::SETTABLE);
                        }
                    }
                    Disposition::OpenExisting | Disposition::OpenAlways => {
                        if access.can_write() && read_only {
                            return Err(FsError::AccessDenied);
                        }
                    }
                }
            }
            NodeKind::Symlink { .. } => return Err(FsError::NotFound),
        }

        debug!(path = ?found.path, ?disposition, "opened existing entry");
        Ok(self.issue_handle(found.node, found.path, access))
    }

    fn create_new_file(&mut self, comps: &[String], request: &OpenRequest) -> FsResult<HandleId> {
        let (parent, mut path, name) = self.resolve_parent(comps)?;
        self.ensure_vacant(parent, &name)?;

        let content_id = self.storage.allocate(&[])?;
        let kind = NodeKind::File {
            content_id,
            layout: StorageLayout::Dense,
        };
        let node_id = match self.attach(parent, &name, kind, request.attributes) {
            Ok(id) => id,
            Err(err) => {
                self.storage.release(content_id)?;
                return Err(err);
            }
        };

        path.push(name);
        debug!(?path, "created file");
        Ok(self.issue_handle(node_id, path, request.access))
    }

    fn close(&mut self, id: HandleId) -> FsResult<()> {
        let handle = self.handles.remove(&id).ok_or(FsError::InvalidHandle)?;
        self.locks.retain(|l| l.handle != id);

        if handle.delete_on_close {
            if let Ok(found) = self.resolve(&handle.path, false) {
                if found.node == handle.node_id {
                    let removable = match &self.node(found.node)?.kind {
                        NodeKind::Directory { children } => children.is_empty(),
                        _ => true,
                    };
                    if let (true, Some((parent, key))) = (removable, found.parent) {
                        self.unlink(parent, &key)?;
                        debug!(path = ?handle.path, "deleted on close");
                    }
                }
            }
        }

        self.reclaim_if_orphaned(handle.node_id)
    }

    // Links

    fn create_hard_link(&mut self, link: &Path, target: &Path) -> FsResult<()> {
        let found = self.resolve_path(target, false)?;
        if self.is_directory(found.node)? {
            return Err(FsError::AccessDenied);
        }

        let (parent, _, name) = self.resolve_parent(&components(link)?)?;
        self.ensure_vacant(parent, &name)?;
        self.insert_child(parent, &name, found.node)?;

        let now = current_timestamp();
        let node = self.node_mut(found.node)?;
        node.links += 1;
        node.times.changed = now;
        Ok(())
    }

    fn create_symbolic_link(&mut self, link: &Path, target: &Path, is_dir: bool) -> FsResult<()> {
        let (parent, _, name) = self.resolve_parent(&components(link)?)?;
        self.ensure_vacant(parent, &name)?;
        let kind = NodeKind::Symlink {
            target: target.to_path_buf(),
            is_dir,
        };
        self.attach(parent, &name, kind, FileAttributes::empty())?;
        Ok(())
    }

    // Directories

    fn create_directory(&mut self, path: &Path) -> FsResult<()> {
        let comps = components(path)?;
        if self.resolve(&comps, false).is_ok() {
            return Err(FsError::AlreadyExists);
        }
        let (parent, _, name) = self.resolve_parent(&comps)?;
        self.ensure_vacant(parent, &name)?;
        let kind = NodeKind::Directory {
            children: BTreeMap::new(),
        };
        self.attach(parent, &name, kind, FileAttributes::empty())?;
        Ok(())
    }

    fn remove_directory(&mut self, path: &Path) -> FsResult<()> {
        let found = self.resolve_path(path, false)?;
        let (parent, key) = found.parent.clone().ok_or(FsError::AccessDenied)?;
        let node = self.node(found.node)?;

        match &node.kind {
            NodeKind::Directory { children } => {
                if !children.is_empty() {
                    return Err(FsError::NotEmpty);
                }
                if node.attributes.contains(FileAttributes::READ_ONLY) {
                    return Err(FsError::AccessDenied);
                }
            }
            NodeKind::Symlink { is_dir: true, .. } => {}
            _ => return Err(FsError::NotADirectory),
        }

        self.unlink(parent, &key)
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<DirEntry>> {
        let found = self.resolve_path(path, true)?;
        match &self.node(found.node)?.kind {
            NodeKind::Directory { children } => {
                children.values().map(|slot| self.dir_entry(slot)).collect()
            }
            _ => Err(FsError::NotADirectory),
        }
    }

    // Copy, move, delete

    fn copy(&mut self, src: &Path, dst: &Path, fail_if_exists: bool) -> FsResult<()> {
        let source = self.resolve_path(src, true)?;
        let source_node = self.node(source.node)?;
        let (content_id, layout) = self.file_content(source.node).map_err(|err| match err {
            FsError::IsADirectory => FsError::AccessDenied,
            other => other,
        })?;
        let attributes = source_node.attributes;

        let dst_comps = components(dst)?;
        match self.resolve(&dst_comps, true) {
            Ok(existing) => {
                if existing.node == source.node {
                    return Err(FsError::AccessDenied);
                }
                if fail_if_exists {
                    return Err(FsError::AlreadyExists);
                }
                let existing_node = self.node(existing.node)?;
                if existing_node.attributes.contains(FileAttributes::READ_ONLY) {
                    return Err(FsError::AccessDenied);
                }
                let (old_content, _) = self.file_content(existing.node).map_err(|err| match err {
                    FsError::IsADirectory => FsError::AccessDenied,
                    other => other,
                })?;

                let new_content = self.storage.duplicate(content_id)?;
                let node = self.node_mut(existing.node)?;
                node.kind = NodeKind::File {
                    content_id: new_content,
                    layout,
                };
                node.attributes = attributes;
                self.touch_modified(existing.node)?;
                self.storage.release(old_content)?;
            }
            Err(FsError::NotFound) => {
                if self.resolve(&dst_comps, false).is_ok() {
                    return Err(if fail_if_exists {
                        FsError::AlreadyExists
                    } else {
                        FsError::NotFound
                    });
                }
                let (parent, _, name) = self.resolve_parent(&dst_comps)?;
                self.ensure_vacant(parent, &name)?;
                let new_content = self.storage.duplicate(content_id)?;
                let kind = NodeKind::File {
                    content_id: new_content,
                    layout,
                };
                if let Err(err) = self.attach(parent, &name, kind, attributes) {
                    self.storage.release(new_content)?;
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }

        debug!(src = %src.display(), dst = %dst.display(), "copied file");
        Ok(())
    }

    fn move_entry(
        &mut self,
        source: Resolved,
        dst_comps: &[String],
        replace: bool,
    ) -> FsResult<()> {
        let (src_parent, src_key) = source.parent.clone().ok_or(FsError::AccessDenied)?;
        let (dst_parent, mut dst_path, dst_name) = self.resolve_parent(dst_comps)?;
        validate_name(&dst_name)?;
        dst_path.push(dst_name.clone());

        let same_entry = dst_path.len() == source.path.len()
            && self.keys_start_with(&dst_path, &source.path);
        if self.is_directory(source.node)?
            && !same_entry
            && self.keys_start_with(&dst_path, &source.path)
        {
            return Err(FsError::InvalidArgument);
        }

        let dst_key = self.key(&dst_name);
        if let Some(existing) = self.child(dst_parent, &dst_key)? {
            if !same_entry {
                if !replace {
                    return Err(FsError::AlreadyExists);
                }
                let existing_node = self.node(existing.node)?;
                if matches!(existing_node.kind, NodeKind::Directory { .. })
                    || existing_node.attributes.contains(FileAttributes::READ_ONLY)
                {
                    return Err(FsError::AccessDenied);
                }
                self.unlink(dst_parent, &dst_key)?;
            }
        }

        let slot = self.remove_child(src_parent, &src_key)?;
        self.insert_child(dst_parent, &dst_name, slot.node)?;
        let now = current_timestamp();
        self.node_mut(slot.node)?.times.changed = now;

        // Handles opened below the old path follow the entry.
        let moved: Vec<HandleId> = self
            .handles
            .iter()
            .filter(|(_, h)| self.keys_start_with(&h.path, &source.path))
            .map(|(id, _)| *id)
            .collect();
        for id in moved {
            let handle = self.handle_mut(id)?;
            let tail = handle.path.split_off(source.path.len());
            handle.path = dst_path.iter().cloned().chain(tail).collect();
        }

        debug!(from = ?source.path, to = ?dst_path, "moved entry");
        Ok(())
    }

    fn rename(&mut self, src: &Path, dst: &Path) -> FsResult<()> {
        let source = self.resolve_path(src, false)?;
        let dst_comps = components(dst)?;
        self.move_entry(source, &dst_comps, false)
    }

    fn delete_file(&mut self, path: &Path) -> FsResult<()> {
        let found = self.resolve_path(path, false)?;
        let node = self.node(found.node)?;
        match &node.kind {
            NodeKind::Directory { .. } | NodeKind::Symlink { is_dir: true, .. } => {
                return Err(FsError::IsADirectory)
            }
            _ => {}
        }
        if node.attributes.contains(FileAttributes::READ_ONLY) {
            return Err(FsError::AccessDenied);
        }
        let (parent, key) = found.parent.ok_or(FsError::AccessDenied)?;
        self.unlink(parent, &key)?;
        debug!(path = %path.display(), "deleted file");
        Ok(())
    }

    // Attributes

    fn attributes(&self, path: &Path) -> FsResult<FileAttributes> {
        let found = self.resolve_path(path, false)?;
        Ok(self.node_attributes(self.node(found.node)?))
    }

    fn set_attributes(&mut self, path: &Path, attributes: FileAttributes) -> FsResult<()> {
        let found = self.resolve_path(path, false)?;
        let now = current_timestamp();
        let node = self.node_mut(found.node)?;
        node.attributes = attributes.intersection(FileAttributes::SETTABLE);
        node.times.changed = now;
        Ok(())
    }

    // Size and allocation

    fn set_end_of_file(&mut self, id: HandleId, len: u64) -> FsResult<()> {
        let handle = self.handle(id)?;
        if !handle.access.can_write() {
            return Err(FsError::AccessDenied);
        }
        let node_id = handle.node_id;
        let (content_id, _) = self.file_content(node_id).map_err(|err| match err {
            FsError::IsADirectory => FsError::AccessDenied,
            other => other,
        })?;
        self.reserve(content_id, len)?;
        self.storage.truncate(content_id, len)?;
        self.touch_modified(node_id)
    }

    fn handle_size(&self, id: HandleId) -> FsResult<u64> {
        let handle = self.handle(id)?;
        let node = self.node(handle.node_id)?;
        self.node_len(node)
    }

    fn allocated_size(&self, path: &Path) -> FsResult<u64> {
        let found = self.resolve_path(path, true)?;
        match &self.node(found.node)?.kind {
            NodeKind::File { content_id, layout } => {
                self.storage
                    .allocated(*content_id, *layout, self.cluster_size())
            }
            _ => Ok(0),
        }
    }

    fn set_layout(&mut self, id: HandleId, layout: StorageLayout) -> FsResult<()> {
        let handle = self.handle(id)?;
        if !handle.access.can_write() {
            return Err(FsError::AccessDenied);
        }
        let node_id = handle.node_id;
        let node = self.node_mut(node_id)?;
        match &mut node.kind {
            NodeKind::File { layout: current, .. } => {
                *current = layout;
                Ok(())
            }
            _ => Err(FsError::Unsupported),
        }
    }

    // Locking

    fn lock(&mut self, id: HandleId, offset: u64, len: u64) -> FsResult<()> {
        let node_id = self.handle(id)?.node_id;
        self.file_content(node_id).map_err(|err| match err {
            FsError::IsADirectory => FsError::AccessDenied,
            other => other,
        })?;
        if len == 0 || offset.checked_add(len).is_none() {
            return Err(FsError::InvalidArgument);
        }
        // Exclusive locks may not overlap any existing lock, even one held by the same handle.
        if self
            .locks
            .iter()
            .any(|l| l.node_id == node_id && l.overlaps(offset, len))
        {
            return Err(FsError::LockViolation);
        }
        self.locks.push(ByteRangeLock {
            node_id,
            handle: id,
            offset,
            len,
        });
        Ok(())
    }

    fn unlock(&mut self, id: HandleId, offset: u64, len: u64) -> FsResult<()> {
        self.handle(id)?;
        let position = self
            .locks
            .iter()
            .position(|l| l.handle == id && l.offset == offset && l.len == len)
            .ok_or(FsError::NotLocked)?;
        self.locks.remove(position);
        Ok(())
    }

    // Data

    fn read(&mut self, id: HandleId, offset: Option<u64>, len: usize) -> FsResult<Vec<u8>> {
        let handle = self.handle(id)?;
        if !handle.access.read {
            return Err(FsError::AccessDenied);
        }
        let node_id = handle.node_id;
        let start = offset.unwrap_or(handle.position);
        let (content_id, _) = self.file_content(node_id)?;

        if self.conflicting_lock(node_id, id, start, len as u64) {
            return Err(FsError::LockViolation);
        }

        let mut buf = vec![0u8; len];
        let n = self.storage.read(content_id, start, &mut buf)?;
        buf.truncate(n);

        if offset.is_none() {
            self.handle_mut(id)?.position = start + n as u64;
        }
        Ok(buf)
    }

    fn write(&mut self, id: HandleId, offset: Option<u64>, data: &[u8]) -> FsResult<usize> {
        let handle = self.handle(id)?;
        let access = handle.access;
        if !access.can_write() {
            return Err(FsError::AccessDenied);
        }
        let node_id = handle.node_id;
        let position = handle.position;
        let (content_id, _) = self.file_content(node_id)?;

        let start = if access.append {
            self.storage.len(content_id)?
        } else {
            offset.unwrap_or(position)
        };
        let end = start
            .checked_add(data.len() as u64)
            .ok_or(FsError::InvalidArgument)?;

        if self.conflicting_lock(node_id, id, start, data.len() as u64) {
            return Err(FsError::LockViolation);
        }
        self.reserve(content_id, end)?;

        let written = self.storage.write(content_id, start, data)?;
        if offset.is_none() || access.append {
            self.handle_mut(id)?.position = start + written as u64;
        }
        self.touch_modified(node_id)?;
        Ok(written)
    }

    // Enumeration and volume

    fn enumerate(&self, pattern: &Path) -> FsResult<Vec<DirEntry>> {
        let comps = components(pattern)?;
        let (dir, _, name) = self.resolve_parent(&comps).map_err(|err| match err {
            FsError::NotADirectory => FsError::NotFound,
            other => other,
        })?;
        let matcher = NamePattern::new(&name, self.config.case_sensitivity)?;

        let mut entries = Vec::new();
        if matcher.is_wildcard() {
            let dir_node = self.node(dir)?;
            for dot in [".", ".."] {
                if matcher.matches(dot) {
                    entries.push(DirEntry {
                        name: dot.to_string(),
                        attributes: FileAttributes::DIRECTORY | dir_node.attributes,
                        len: 0,
                    });
                }
            }
            if let NodeKind::Directory { children } = &dir_node.kind {
                for slot in children.values() {
                    if !matcher.matches(&slot.name) {
                        continue;
                    }
                    let entry = self.dir_entry(slot)?;
                    if !entry.attributes.contains(FileAttributes::HIDDEN) {
                        entries.push(entry);
                    }
                }
            }
        } else if let Some(slot) = self.child(dir, &self.key(&name))? {
            entries.push(self.dir_entry(&slot)?);
        }

        if entries.is_empty() {
            return Err(FsError::NotFound);
        }
        Ok(entries)
    }

    fn free_space(&self, volume_root: &Path) -> FsResult<FreeSpace> {
        self.resolve_path(volume_root, true)?;
        let cluster_size = self.cluster_size();
        let total_clusters = self.config.volume.total_clusters;
        let used_clusters = self.used_bytes()? / cluster_size.max(1);
        Ok(FreeSpace {
            cluster_size,
            bytes_per_sector: u64::from(self.config.volume.bytes_per_sector),
            free_clusters: total_clusters.saturating_sub(used_clusters),
            total_clusters,
        })
    }

    // Handle information

    fn set_delete_on_close(&mut self, id: HandleId, delete: bool) -> FsResult<()> {
        let node_id = self.handle(id)?.node_id;
        if delete {
            let node = self.node(node_id)?;
            if node.attributes.contains(FileAttributes::READ_ONLY) {
                return Err(FsError::AccessDenied);
            }
            if let NodeKind::Directory { children } = &node.kind {
                if !children.is_empty() {
                    return Err(FsError::NotEmpty);
                }
            }
        }
        self.handle_mut(id)?.delete_on_close = delete;
        Ok(())
    }

    fn rename_by_handle(&mut self, id: HandleId, target: &RenameTarget) -> FsResult<()> {
        let handle = self.handle(id)?;
        let node_id = handle.node_id;
        let src_path = handle.path.clone();

        let dst_comps = match target.root {
            Some(root) => {
                if target.name.has_root() {
                    return Err(FsError::InvalidArgument);
                }
                let root_handle = self.handle(root)?;
                if !self.is_directory(root_handle.node_id)? {
                    return Err(FsError::InvalidArgument);
                }
                let mut base = root_handle.path.clone();
                push_components(&mut base, &target.name)?;
                base
            }
            None => components(&target.name)?,
        };

        let source = self.resolve(&src_path, false)?;
        if source.node != node_id {
            return Err(FsError::NotFound);
        }
        self.move_entry(source, &dst_comps, target.replace_if_exists)
    }

    fn file_times(&self, id: HandleId) -> FsResult<FileTimes> {
        let handle = self.handle(id)?;
        Ok(self.node(handle.node_id)?.times)
    }

    fn set_file_times(&mut self, id: HandleId, times: FileTimes) -> FsResult<()> {
        let node_id = self.handle(id)?.node_id;
        self.node_mut(node_id)?.times = times;
        Ok(())
    }
}

/// The in-memory reference volume
pub struct MemoryFs {
    serial: u64,
    state: Mutex<VolumeState>,
}

impl MemoryFs {
    pub fn new(config: FsConfig) -> Self {
        Self::with_storage(config, Arc::new(InMemoryBackend::new()))
    }

    pub fn with_storage(config: FsConfig, storage: Arc<dyn StorageBackend>) -> Self {
        let serial = NEXT_VOLUME_SERIAL.fetch_add(1, Ordering::Relaxed);
        debug!(serial, ?config, "creating memory volume");
        Self {
            serial,
            state: Mutex::new(VolumeState::new(config, storage)),
        }
    }

    fn state(&self) -> MutexGuard<'_, VolumeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of handles currently open.
    pub fn open_handle_count(&self) -> usize {
        self.state().handles.len()
    }

    /// Number of byte-range locks currently held.
    pub fn lock_count(&self) -> usize {
        self.state().locks.len()
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new(FsConfig::default())
    }
}

impl FsOracle for MemoryFs {
    fn name(&self) -> &str {
        "memory"
    }

    fn exists(&self, path: &Path) -> bool {
        self.state().exists(path)
    }

    fn size(&self, path: &Path) -> FsResult<u64> {
        self.state().size(path)
    }

    fn identity(&self, path: &Path) -> FsResult<EntityId> {
        let found = self.state().resolve_path(path, true)?;
        Ok(EntityId {
            volume: self.serial,
            index: found.node.0,
        })
    }

    fn create(&self, path: &Path, request: &OpenRequest) -> FsResult<HandleId> {
        self.state().create(path, request)
    }

    fn close(&self, handle: HandleId) -> FsResult<()> {
        self.state().close(handle)
    }

    fn create_hard_link(&self, link: &Path, target: &Path) -> FsResult<()> {
        self.state().create_hard_link(link, target)
    }

    fn create_symbolic_link(&self, link: &Path, target: &Path, is_directory: bool) -> FsResult<()> {
        self.state().create_symbolic_link(link, target, is_directory)
    }

    fn create_directory(&self, path: &Path) -> FsResult<()> {
        self.state().create_directory(path)
    }

    fn remove_directory(&self, path: &Path) -> FsResult<()> {
        self.state().remove_directory(path)
    }

    fn read_dir(&self, path: &Path) -> FsResult<Vec<DirEntry>> {
        self.state().read_dir(path)
    }

    fn copy(&self, src: &Path, dst: &Path, fail_if_exists: bool) -> FsResult<()> {
        self.state().copy(src, dst, fail_if_exists)
    }

    fn rename(&self, src: &Path, dst: &Path) -> FsResult<()> {
        self.state().rename(src, dst)
    }

    fn delete_file(&self, path: &Path) -> FsResult<()> {
        self.state().delete_file(path)
    }

    fn attributes(&self, path: &Path) -> FsResult<FileAttributes> {
        self.state().attributes(path)
    }

    fn set_attributes(&self, path: &Path, attributes: FileAttributes) -> FsResult<()> {
        self.state().set_attributes(path, attributes)
    }

    fn set_end_of_file(&self, handle: HandleId, len: u64) -> FsResult<()> {
        self.state().set_end_of_file(handle, len)
    }

    fn handle_size(&self, handle: HandleId) -> FsResult<u64> {
        self.state().handle_size(handle)
    }

    fn allocated_size(&self, path: &Path) -> FsResult<u64> {
        self.state().allocated_size(path)
    }

    fn set_sparse(&self, handle: HandleId) -> FsResult<()> {
        self.state().set_layout(handle, StorageLayout::Sparse)
    }

    fn set_compressed(&self, handle: HandleId) -> FsResult<()> {
        self.state().set_layout(handle, StorageLayout::Compressed)
    }

    fn lock(&self, handle: HandleId, offset: u64, len: u64) -> FsResult<()> {
        self.state().lock(handle, offset, len)
    }

    fn unlock(&self, handle: HandleId, offset: u64, len: u64) -> FsResult<()> {
        self.state().unlock(handle, offset, len)
    }

    fn read(&self, handle: HandleId, offset: Option<u64>, len: usize) -> FsResult<Vec<u8>> {
        self.state().read(handle, offset, len)
    }

    fn write(&self, handle: HandleId, offset: Option<u64>, data: &[u8]) -> FsResult<usize> {
        self.state().write(handle, offset, data)
    }

    fn flush(&self, handle: HandleId) -> FsResult<()> {
        self.state().handle(handle).map(|_| ())
    }

    fn enumerate(&self, pattern: &Path) -> FsResult<Vec<DirEntry>> {
        self.state().enumerate(pattern)
    }

    fn free_space(&self, volume_root: &Path) -> FsResult<FreeSpace> {
        self.state().free_space(volume_root)
    }

    fn set_delete_on_close(&self, handle: HandleId, delete: bool) -> FsResult<()> {
        self.state().set_delete_on_close(handle, delete)
    }

    fn rename_by_handle(&self, handle: HandleId, target: &RenameTarget) -> FsResult<()> {
        self.state().rename_by_handle(handle, target)
    }

    fn file_times(&self, handle: HandleId) -> FsResult<FileTimes> {
        self.state().file_times(handle)
    }

    fn set_file_times(&self, handle: HandleId, times: FileTimes) -> FsResult<()> {
        self.state().set_file_times(handle, times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn rw(disposition: Disposition) -> OpenRequest {
        OpenRequest::new(disposition, Access::READ_WRITE)
    }

    fn write_file(fs: &MemoryFs, path: &str, data: &[u8]) {
        let h = fs.create(Path::new(path), &rw(Disposition::CreateAlways)).unwrap();
        fs.write(h, Some(0), data).unwrap();
        fs.close(h).unwrap();
    }

    fn read_file(fs: &MemoryFs, path: &str) -> Vec<u8> {
        let h = fs
            .create(Path::new(path), &OpenRequest::new(Disposition::OpenExisting, Access::READ))
            .unwrap();
        let data = fs.read(h, Some(0), 1 << 21).unwrap();
        fs.close(h).unwrap();
        data
    }

    #[test]
    fn test_create_new_then_already_exists() {
        let fs = MemoryFs::default();
        let h = fs.create(Path::new("/a.txt"), &rw(Disposition::CreateNew)).unwrap();
        fs.close(h).unwrap();
        assert_eq!(fs.size(Path::new("/a.txt")).unwrap(), 0);

        let err = fs.create(Path::new("/a.txt"), &rw(Disposition::CreateNew)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_create_always_truncates() {
        let fs = MemoryFs::default();
        write_file(&fs, "/a.txt", b"1234");
        let h = fs.create(Path::new("/a.txt"), &rw(Disposition::CreateAlways)).unwrap();
        fs.close(h).unwrap();
        assert_eq!(fs.size(Path::new("/a.txt")).unwrap(), 0);
    }

    #[test]
    fn test_open_always_keeps_content() {
        let fs = MemoryFs::default();
        write_file(&fs, "/a.txt", b"data");
        let h = fs.create(Path::new("/a.txt"), &rw(Disposition::OpenAlways)).unwrap();
        fs.close(h).unwrap();
        assert_eq!(read_file(&fs, "/a.txt"), b"data");
    }

    #[test]
    fn test_case_insensitive_lookup_preserves_name() {
        let fs = MemoryFs::default();
        write_file(&fs, "/Report.TXT", b"x");
        assert!(fs.exists(Path::new("/report.txt")));
        let entries = fs.enumerate(Path::new("/*.txt")).unwrap();
        assert!(entries.iter().any(|e| e.name == "Report.TXT"));
    }

    #[test]
    fn test_hard_link_shares_identity_and_content() {
        let fs = MemoryFs::default();
        write_file(&fs, "/orig", b"start");
        fs.create_hard_link(Path::new("/link"), Path::new("/orig")).unwrap();
        assert_eq!(
            fs.identity(Path::new("/orig")).unwrap(),
            fs.identity(Path::new("/link")).unwrap()
        );

        let h = fs.create(Path::new("/link"), &rw(Disposition::OpenExisting)).unwrap();
        fs.write(h, Some(0), b"sync").unwrap();
        fs.close(h).unwrap();
        assert_eq!(read_file(&fs, "/orig"), b"synct");

        fs.delete_file(Path::new("/orig")).unwrap();
        assert_eq!(read_file(&fs, "/link"), b"synct");
    }

    #[test]
    fn test_symlink_follows_for_data_not_attributes() {
        let fs = MemoryFs::default();
        fs.create_directory(Path::new("/d")).unwrap();
        write_file(&fs, "/d/target", b"payload");
        fs.create_symbolic_link(Path::new("/d/link"), Path::new("target"), false)
            .unwrap();

        let attrs = fs.attributes(Path::new("/d/link")).unwrap();
        assert!(attrs.contains(FileAttributes::REPARSE_POINT));
        assert_eq!(read_file(&fs, "/d/link"), b"payload");

        fs.copy(Path::new("/d/link"), Path::new("/d/copy"), true).unwrap();
        let copied = fs.attributes(Path::new("/d/copy")).unwrap();
        assert!(!copied.contains(FileAttributes::REPARSE_POINT));
    }

    #[test]
    fn test_lock_blocks_other_handles_only() {
        let fs = MemoryFs::default();
        write_file(&fs, "/f", b"0123456789");
        let h1 = fs.create(Path::new("/f"), &rw(Disposition::OpenExisting)).unwrap();
        let h2 = fs.create(Path::new("/f"), &rw(Disposition::OpenExisting)).unwrap();

        fs.lock(h1, 0, 5).unwrap();
        let err = fs.write(h2, Some(0), b"xx").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockViolation);
        fs.write(h2, Some(5), b"yy").unwrap();
        fs.write(h1, Some(0), b"zz").unwrap();

        assert_eq!(fs.lock(h2, 2, 4).unwrap_err().kind(), ErrorKind::LockViolation);
        assert_eq!(fs.unlock(h1, 0, 4).unwrap_err().kind(), ErrorKind::NotLocked);
        assert_eq!(fs.unlock(h2, 0, 5).unwrap_err().kind(), ErrorKind::NotLocked);

        fs.close(h1).unwrap();
        assert_eq!(fs.lock_count(), 0);
        fs.write(h2, Some(0), b"ok").unwrap();
        fs.close(h2).unwrap();
        assert_eq!(fs.open_handle_count(), 0);
    }

    #[test]
    fn test_hidden_excluded_from_wildcard_only() {
        let fs = MemoryFs::default();
        fs.create_directory(Path::new("/d")).unwrap();
        write_file(&fs, "/d/secret.txt", b"");
        fs.set_attributes(Path::new("/d/secret.txt"), FileAttributes::HIDDEN)
            .unwrap();

        let listed = fs.enumerate(Path::new("/d/*")).unwrap();
        let names: Vec<_> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", ".."]);

        let exact = fs.enumerate(Path::new("/d/secret.txt")).unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(fs.read_dir(Path::new("/d")).unwrap().len(), 1);
    }

    #[test]
    fn test_write_past_end_extends() {
        let fs = MemoryFs::default();
        let h = fs.create(Path::new("/big"), &rw(Disposition::CreateNew)).unwrap();
        fs.write(h, Some(1_048_576), &[7]).unwrap();
        assert_eq!(fs.handle_size(h).unwrap(), 1_048_577);
        assert_eq!(fs.read(h, Some(1000), 4).unwrap(), vec![0, 0, 0, 0]);
        fs.close(h).unwrap();
    }

    #[test]
    fn test_append_ignores_offset() {
        let fs = MemoryFs::default();
        write_file(&fs, "/log", b"123");
        let h = fs
            .create(Path::new("/log"), &OpenRequest::new(Disposition::OpenExisting, Access::APPEND))
            .unwrap();
        fs.write(h, Some(0), b"456").unwrap();
        fs.close(h).unwrap();
        assert_eq!(read_file(&fs, "/log"), b"123456");
    }

    #[test]
    fn test_move_directory_into_descendant_fails() {
        let fs = MemoryFs::default();
        fs.create_directory(Path::new("/a")).unwrap();
        fs.create_directory(Path::new("/a/b")).unwrap();

        let err = fs.rename(Path::new("/a"), Path::new("/a/b/c")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(fs.exists(Path::new("/a/b")));

        fs.rename(Path::new("/a"), Path::new("/z")).unwrap();
        assert!(fs.exists(Path::new("/z/b")));
    }

    #[test]
    fn test_delete_on_close_follows_rename() {
        let fs = MemoryFs::default();
        let h = fs.create(Path::new("/tmp1"), &rw(Disposition::CreateNew)).unwrap();
        fs.rename(Path::new("/tmp1"), Path::new("/tmp2")).unwrap();
        fs.set_delete_on_close(h, true).unwrap();
        fs.close(h).unwrap();
        assert!(!fs.exists(Path::new("/tmp2")));
    }

    #[test]
    fn test_free_space_tracks_allocation() {
        let fs = MemoryFs::default();
        let before = fs.free_space(Path::new("/")).unwrap();
        write_file(&fs, "/blob", &vec![1u8; 10 * before.cluster_size as usize]);
        let during = fs.free_space(Path::new("/")).unwrap();
        assert_eq!(before.free_clusters - during.free_clusters, 10);

        fs.delete_file(Path::new("/blob")).unwrap();
        let after = fs.free_space(Path::new("/")).unwrap();
        assert_eq!(after.free_clusters, before.free_clusters);
    }

    #[test]
    fn test_invalid_handle_is_classified() {
        let fs = MemoryFs::default();
        let err = fs.read(HandleId::INVALID, None, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidHandle);
        assert_eq!(
            fs.close(HandleId::INVALID).unwrap_err().kind(),
            ErrorKind::InvalidHandle
        );
    }

    #[test]
    fn test_reserved_characters_rejected() {
        let fs = MemoryFs::default();
        let err = fs.create_directory(Path::new("/bad?name")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName);
    }
}
