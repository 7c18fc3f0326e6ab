//! Stop-the-world mark/sweep collection
//!
//! Roots are the caller-supplied handles plus every immortal object. Marking
//! is a gray worklist over [`GcTraceable::trace`]; sweeping walks the
//! liveness list and frees white, non-immortal objects. All surviving marks
//! are reset to white before returning.

use crate::heap::GcHeap;
use crate::object::{GcRef, GcTraceable, MarkColor};

impl<T: GcTraceable> GcHeap<T> {
    /// Run a full collection and return the number of objects reclaimed
    pub fn collect(&mut self, roots: &[GcRef]) -> usize {
        let live = self.handles();

        let immortal: Vec<GcRef> = live
            .iter()
            .copied()
            .filter(|r| self.header(*r).is_some_and(|h| h.is_immortal()))
            .collect();

        let mut worklist: Vec<GcRef> = Vec::with_capacity(roots.len() + immortal.len());
        for r in roots.iter().copied().chain(immortal) {
            self.shade(r, &mut worklist);
        }

        let mut children = Vec::new();
        while let Some(r) = worklist.pop() {
            children.clear();
            if let Some(value) = self.get(r) {
                value.trace(&mut |child| children.push(child));
            }
            for child in children.drain(..) {
                self.shade(child, &mut worklist);
            }
            if let Some(header) = self.header_mut(r) {
                header.set_mark(MarkColor::Black);
            }
        }

        let mut reclaimed = 0;
        for r in live {
            let white = self
                .header(r)
                .is_some_and(|h| !h.is_immortal() && h.mark() == MarkColor::White);
            if white {
                self.remove(r.index);
                reclaimed += 1;
            } else if let Some(header) = self.header_mut(r) {
                header.set_mark(MarkColor::White);
            }
        }

        self.stats.collections += 1;
        self.stats.last_reclaimed = reclaimed;

        #[cfg(feature = "gc_logging")]
        tracing::debug!(
            reclaimed,
            alive = self.stats.alive_objects,
            "gc: collection finished"
        );

        reclaimed
    }

    fn shade(&mut self, r: GcRef, worklist: &mut Vec<GcRef>) {
        if let Some(header) = self.header_mut(r)
            && header.mark() == MarkColor::White
        {
            header.set_mark(MarkColor::Gray);
            worklist.push(r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node(Vec<GcRef>);

    impl GcTraceable for Node {
        fn trace(&self, tracer: &mut dyn FnMut(GcRef)) {
            self.0.iter().for_each(|r| tracer(*r));
        }
    }

    #[test]
    fn marks_are_reset_after_collection() {
        let mut heap = GcHeap::new();
        let a = heap.allocate(Node(vec![]), 8).unwrap();
        heap.collect(&[a]);
        assert_eq!(heap.header(a).unwrap().mark(), MarkColor::White);
    }

    #[test]
    fn cycles_are_reclaimed() {
        let mut heap = GcHeap::new();
        let a = heap.allocate(Node(vec![]), 8).unwrap();
        let b = heap.allocate(Node(vec![a]), 8).unwrap();
        heap.get_mut(a).unwrap().0.push(b);
        assert_eq!(heap.collect(&[]), 2);
        assert!(!heap.contains(a));
        assert!(!heap.contains(b));
    }
}
