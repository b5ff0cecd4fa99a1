//! Call-stack tracking and AFL-style edge coverage.
//!
//! Basic-block notifications update a 64 KiB hit-count map indexed by the
//! XOR of the current and (shifted) previous location, the scheme AFL uses.
//! The map can be loaded from and persisted to a file so that coverage
//! accumulates across executions.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::warn;

use crate::consts::COVERAGE_MAP_SIZE;

pub struct CallStackTracker {
    map: Vec<u8>,
    prev_loc: usize,
    call_stack: Vec<usize>,
    map_path: Option<PathBuf>,
}

impl CallStackTracker {
    /// Create a tracker, loading the coverage map from `map_path` when the
    /// file exists.
    pub fn new(map_path: Option<PathBuf>) -> io::Result<Self> {
        let mut map = vec![0u8; COVERAGE_MAP_SIZE];

        if let Some(path) = &map_path {
            match fs::read(path) {
                Ok(contents) if contents.len() == COVERAGE_MAP_SIZE => map = contents,
                Ok(contents) => warn!(
                    "coverage map {} has size {}, expected {COVERAGE_MAP_SIZE}; starting empty",
                    path.display(),
                    contents.len()
                ),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            map,
            prev_loc: 0,
            call_stack: Vec::new(),
            map_path,
        })
    }

    pub fn visit_call(&mut self, site_id: usize) {
        self.call_stack.push(site_id);
    }

    pub fn visit_ret(&mut self, site_id: usize) {
        // Returns can skip frames when the callee longjmps; unwind to the
        // matching call if it is on the stack.
        if let Some(position) = self.call_stack.iter().rposition(|&s| s == site_id) {
            self.call_stack.truncate(position);
        }
    }

    /// Record an edge into `site_id`. Returns true when the edge was new.
    pub fn visit_basic_block(&mut self, site_id: usize) -> bool {
        let current = hash_site(site_id) % COVERAGE_MAP_SIZE;
        let edge = current ^ self.prev_loc;
        self.prev_loc = current >> 1;

        let fresh = self.map[edge] == 0;
        self.map[edge] = self.map[edge].saturating_add(1);
        fresh
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn covered_edges(&self) -> usize {
        self.map.iter().filter(|&&hits| hits > 0).count()
    }

    /// Persist the map for the next execution.
    pub fn save(&self) -> io::Result<()> {
        match &self.map_path {
            Some(path) => fs::write(path, &self.map),
            None => Ok(()),
        }
    }
}

impl Drop for CallStackTracker {
    fn drop(&mut self) {
        if let Err(e) = self.save() {
            warn!("failed to save coverage map: {e}");
        }
    }
}

fn hash_site(site_id: usize) -> usize {
    // splitmix-style scrambling so that nearby site ids spread over the map.
    let mut x = site_id as u64;
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (x ^ (x >> 31)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_direction_sensitive() {
        let mut tracker = CallStackTracker::new(None).unwrap();

        assert!(tracker.visit_basic_block(1));
        assert!(tracker.visit_basic_block(2));
        // Same blocks, opposite order: different edges.
        assert!(tracker.visit_basic_block(1));
        assert!(!tracker.visit_basic_block(2));

        assert_eq!(tracker.covered_edges(), 3);
    }

    #[test]
    fn returns_unwind_to_matching_call() {
        let mut tracker = CallStackTracker::new(None).unwrap();
        tracker.visit_call(10);
        tracker.visit_call(20);
        tracker.visit_call(30);

        tracker.visit_ret(20);
        assert_eq!(tracker.call_depth(), 1);

        // A return without a matching call leaves the stack alone.
        tracker.visit_ret(99);
        assert_eq!(tracker.call_depth(), 1);
    }
}
