//! Shadow memory: a sparse per-byte map from target addresses to symbolic
//! expressions.
//!
//! Shadows are managed at page granularity. A missing page or a null slot
//! means the byte is concrete and its value lives in real memory at that
//! address. Pages are created lazily on first symbolic write and never
//! destroyed during a run; only the expressions they hold may be collected.
//!
//! Every non-null slot holds an expression of width 8.

use std::collections::HashMap;

use itertools::Itertools;

use crate::consts::{page_offset, page_start, PAGE_SIZE};
use crate::expr::ExprRef;

type Page = Vec<Option<ExprRef>>;

#[derive(Default)]
pub struct Shadow {
    pages: HashMap<usize, Page>,
}

impl Shadow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The expression shadowing one byte, if any.
    pub fn get(&self, addr: usize) -> Option<&ExprRef> {
        self.pages
            .get(&page_start(addr))?
            .get(page_offset(addr))?
            .as_ref()
    }

    /// Shadow one byte, materializing its page. `None` marks the byte
    /// concrete again.
    pub fn set(&mut self, addr: usize, expr: Option<ExprRef>) {
        if let Some(expr) = &expr {
            debug_assert_eq!(expr.bits(), 8, "shadow memory always represents bytes");
        }
        let page = self
            .pages
            .entry(page_start(addr))
            .or_insert_with(|| vec![None; PAGE_SIZE]);
        page[page_offset(addr)] = expr;
    }

    /// Check whether the memory range holds no symbolic byte.
    pub fn is_concrete(&self, addr: usize, length: usize) -> bool {
        // Fast path for ranges within a single unshadowed page.
        if page_start(addr) == page_start(addr + length)
            && !self.pages.contains_key(&page_start(addr))
        {
            return true;
        }

        self.iter(addr, length).all(|slot| slot.is_none())
    }

    /// Read-only view over the shadow of a memory range, byte by byte.
    pub fn iter(&self, addr: usize, length: usize) -> ReadShadowIter<'_> {
        ReadShadowIter {
            shadow: self,
            addr,
            end: addr + length,
            page: None,
        }
    }

    /// Run `f` over every shadow slot of a range, materializing pages. The
    /// callback receives the byte's address alongside the slot.
    pub fn for_each_slot(
        &mut self,
        addr: usize,
        length: usize,
        mut f: impl FnMut(usize, &mut Option<ExprRef>),
    ) {
        for byte_addr in addr..addr + length {
            let page = self
                .pages
                .entry(page_start(byte_addr))
                .or_insert_with(|| vec![None; PAGE_SIZE]);
            f(byte_addr, &mut page[page_offset(byte_addr)]);
        }
    }

    /// Broadcast one expression (or concreteness) over a range.
    pub fn fill(&mut self, addr: usize, length: usize, expr: Option<ExprRef>) {
        if let Some(expr) = &expr {
            debug_assert_eq!(expr.bits(), 8, "shadow memory always represents bytes");
        }
        self.for_each_slot(addr, length, |_, slot| *slot = expr.clone());
    }

    /// Copy the shadow of one range over another. The per-byte shadows are
    /// buffered first, so overlapping ranges behave like `memmove` in either
    /// direction.
    pub fn copy(&mut self, dest: usize, src: usize, length: usize) {
        if self.is_concrete(src, length) && self.is_concrete(dest, length) {
            return;
        }

        let src_shadow = self.iter(src, length).map(cloned).collect_vec();
        let mut bytes = src_shadow.into_iter();
        self.for_each_slot(dest, length, |_, slot| {
            *slot = bytes.next().expect("source length matches destination");
        });
    }

    /// Every live expression held by a shadow page; the GC root set
    /// contributed by memory.
    pub fn expressions(&self) -> impl Iterator<Item = &ExprRef> {
        self.pages
            .values()
            .flat_map(|page| page.iter().filter_map(Option::as_ref))
    }
}

fn cloned(slot: Option<&ExprRef>) -> Option<ExprRef> {
    slot.cloned()
}

/// Iterator over the shadow of a memory range. Caches the current page and
/// re-fetches it whenever the walk crosses a page boundary.
pub struct ReadShadowIter<'a> {
    shadow: &'a Shadow,
    addr: usize,
    end: usize,
    page: Option<Option<&'a Page>>,
}

impl<'a> Iterator for ReadShadowIter<'a> {
    type Item = Option<&'a ExprRef>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.addr >= self.end {
            return None;
        }

        if self.page.is_none() || page_offset(self.addr) == 0 {
            self.page = Some(self.shadow.pages.get(&page_start(self.addr)));
        }

        let slot = self
            .page
            .expect("just fetched")
            .and_then(|page| page[page_offset(self.addr)].as_ref());

        if let Some(expr) = slot {
            debug_assert_eq!(expr.bits(), 8, "shadow memory always represents bytes");
        }

        self.addr += 1;
        Some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprBuilder;

    #[test]
    fn missing_pages_read_as_concrete() {
        let shadow = Shadow::new();
        assert!(shadow.is_concrete(0x1000, 64));
        assert!(shadow.get(0x1000).is_none());
    }

    #[test]
    fn set_and_get_round_trip() {
        let mut builder = ExprBuilder::new();
        let mut shadow = Shadow::new();

        let byte = builder.input_byte(0);
        shadow.set(0x2004, Some(byte.clone()));

        assert!(!shadow.is_concrete(0x2000, 16));
        assert!(shadow.is_concrete(0x2005, 16));
        assert!(std::rc::Rc::ptr_eq(shadow.get(0x2004).unwrap(), &byte));
    }

    #[test]
    fn iteration_crosses_page_boundaries() {
        let mut builder = ExprBuilder::new();
        let mut shadow = Shadow::new();

        // One byte on each side of a page boundary.
        let a = builder.input_byte(0);
        let b = builder.input_byte(1);
        shadow.set(0x1fff, Some(a));
        shadow.set(0x2000, Some(b));

        let slots: Vec<bool> = shadow.iter(0x1ffe, 4).map(|s| s.is_some()).collect();
        assert_eq!(slots, vec![false, true, true, false]);
        assert_eq!(shadow.page_count(), 2);
    }

    #[test]
    fn copy_handles_overlap_both_directions() {
        let mut builder = ExprBuilder::new();
        let mut shadow = Shadow::new();

        for i in 0..4 {
            let byte = builder.input_byte(i);
            shadow.set(0x3000 + i, Some(byte));
        }

        // Forward overlap.
        shadow.copy(0x3002, 0x3000, 4);
        let offsets: Vec<Option<usize>> = shadow
            .iter(0x3002, 4)
            .map(|s| s.map(|e| e.input_dependencies()[0]))
            .collect();
        assert_eq!(
            offsets,
            vec![Some(0), Some(1), Some(2), Some(3)],
            "forward copy must not read already-overwritten bytes"
        );

        // Backward overlap.
        shadow.copy(0x3000, 0x3002, 4);
        let offsets: Vec<Option<usize>> = shadow
            .iter(0x3000, 4)
            .map(|s| s.map(|e| e.input_dependencies()[0]))
            .collect();
        assert_eq!(offsets, vec![Some(0), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn fill_broadcasts_and_clears() {
        let mut builder = ExprBuilder::new();
        let mut shadow = Shadow::new();

        let byte = builder.input_byte(9);
        shadow.fill(0x4000, 8, Some(byte));
        assert!(!shadow.is_concrete(0x4000, 8));

        shadow.fill(0x4000, 8, None);
        assert!(shadow.is_concrete(0x4000, 8));
        // Pages persist even when their contents become concrete.
        assert_eq!(shadow.page_count(), 1);
    }
}
