//! File-backed mmap region storing subtree nodes off-heap.
//!
//! The region is sized `capacity * NODE_SIZE` bytes and reinterpreted as a
//! `[SubtreeNode]`. `SubtreeNode` is a pointer-free `#[repr(C)]` record, so
//! the view never aliases heap pointers and the allocator never sees the leaf
//! memory. The backing file is created with a unique `subtree-nodes-*` name
//! in a caller-supplied directory and mapped shared read-write, letting the
//! OS page cold leaves to disk under memory pressure. The file descriptor is
//! dropped right after mapping (the kernel keeps the mapping alive via the
//! inode), so a live store holds zero file descriptors.

use std::fs;
use std::path::{Path, PathBuf};
use std::slice;

use memmap2::MmapMut;

use crate::def::MMAP_FILE_PREFIX;
use crate::error::SubtreeError;
use crate::store::{SubtreeNode, NODE_SIZE};

/// Mmap-backed bounded node array. `close` unmaps the region and removes the
/// backing file exactly once; drop is a backstop for callers that forget.
#[derive(Debug)]
pub(crate) struct MmapNodeStore {
    map: Option<MmapMut>,
    path: PathBuf,
    len: usize,
    capacity: usize,
}

impl MmapNodeStore {
    /// Creates the backing file in `dir`, sizes it to `capacity` nodes and
    /// maps it shared read-write.
    pub(crate) fn new(capacity: usize, dir: &Path) -> Result<Self, SubtreeError> {
        if capacity == 0 {
            return Err(SubtreeError::InvalidCapacity(0));
        }
        let byte_len = capacity
            .checked_mul(NODE_SIZE)
            .ok_or(SubtreeError::InvalidCapacity(i64::MAX))?;

        let file = tempfile::Builder::new()
            .prefix(MMAP_FILE_PREFIX)
            .tempfile_in(dir)
            .map_err(SubtreeError::MmapCreate)?;
        file.as_file()
            .set_len(byte_len as u64)
            .map_err(SubtreeError::MmapCreate)?;

        // Safety: the file was just created and sized; nothing else maps it.
        let map = unsafe { MmapMut::map_mut(file.as_file()) }.map_err(SubtreeError::MmapCreate)?;

        // Drop the fd now; the kernel keeps the mapping alive through the
        // inode. Disable tempfile's drop-time unlink so close() controls the
        // file lifetime.
        let (file, temp_path) = file.into_parts();
        drop(file);
        let path = temp_path.keep().map_err(|e| SubtreeError::MmapCreate(e.error))?;

        Ok(MmapNodeStore {
            map: Some(map),
            path,
            len: 0,
            capacity,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn region(&self) -> &MmapMut {
        self.map.as_ref().expect("mmap node store used after close")
    }

    pub(crate) fn as_slice(&self) -> &[SubtreeNode] {
        let map = self.region();
        // Safety: the region holds at least `capacity * NODE_SIZE` bytes,
        // is page-aligned, and SubtreeNode is a pointer-free POD.
        unsafe { slice::from_raw_parts(map.as_ptr() as *const SubtreeNode, self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [SubtreeNode] {
        let len = self.len;
        let map = self.map.as_mut().expect("mmap node store used after close");
        // Safety: as in as_slice; the mutable borrow of self guarantees
        // exclusivity.
        unsafe { slice::from_raw_parts_mut(map.as_mut_ptr() as *mut SubtreeNode, len) }
    }

    pub(crate) fn push(&mut self, node: SubtreeNode) {
        assert!(self.len < self.capacity, "mmap node store overflow");
        let len = self.len;
        let map = self.map.as_mut().expect("mmap node store used after close");
        // Safety: len < capacity, so the write stays inside the region.
        unsafe {
            (map.as_mut_ptr() as *mut SubtreeNode).add(len).write(node);
        }
        self.len += 1;
    }

    pub(crate) fn set(&mut self, index: usize, node: SubtreeNode) {
        self.as_mut_slice()[index] = node;
    }

    /// Splices out the node at `index`; later nodes shift down one slot.
    pub(crate) fn remove(&mut self, index: usize) -> SubtreeNode {
        let len = self.len;
        let slice = self.as_mut_slice();
        let removed = slice[index];
        slice.copy_within(index + 1..len, index);
        self.len -= 1;
        removed
    }

    /// Unmaps the region and deletes the backing file. Subsequent calls are
    /// no-ops; subsequent node access is a contract violation and panics.
    pub(crate) fn close(&mut self) {
        if let Some(map) = self.map.take() {
            drop(map);
            if let Err(e) = fs::remove_file(&self.path) {
                log::warn!("failed to remove mmap backing file {:?}: {}", self.path, e);
            }
        }
    }
}

impl Drop for MmapNodeStore {
    fn drop(&mut self) {
        self.close();
    }
}
