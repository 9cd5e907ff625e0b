//! Multi-select model: toggle, range and exact selection.
//!
//! The model never checks ids against the entity store. Consumers filter
//! stale ids when they read the selection.

use std::collections::HashSet;

use hireboard_types::ApplicationId;

#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    selected: HashSet<ApplicationId>,
    anchor: Option<ApplicationId>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id` and make it the range anchor. Returns whether
    /// `id` is selected afterwards.
    pub fn toggle(&mut self, id: ApplicationId) -> bool {
        let now_selected = if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id.clone());
            true
        };
        self.anchor = Some(id);
        now_selected
    }

    /// Select every id between the anchor and `id`, inclusive, in `order`.
    ///
    /// Without an anchor, or when either end is missing from `order`, this
    /// degrades to [`toggle`](Self::toggle). The anchor does not move, so
    /// repeated range selections pivot around the same item.
    pub fn range_select(&mut self, id: ApplicationId, order: &[ApplicationId]) {
        let Some(anchor) = self.anchor.as_ref() else {
            self.toggle(id);
            return;
        };
        let anchor_pos = order.iter().position(|x| x == anchor);
        let target_pos = order.iter().position(|x| *x == id);
        match (anchor_pos, target_pos) {
            (Some(a), Some(t)) => {
                let (lo, hi) = if a <= t { (a, t) } else { (t, a) };
                self.selected.extend(order[lo..=hi].iter().cloned());
            }
            _ => {
                self.toggle(id);
            }
        }
    }

    /// Replace the whole selection. The last id becomes the anchor.
    pub fn select_exactly(&mut self, ids: impl IntoIterator<Item = ApplicationId>) {
        self.selected.clear();
        self.anchor = None;
        for id in ids {
            self.selected.insert(id.clone());
            self.anchor = Some(id);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    pub fn remove(&mut self, ids: &[ApplicationId]) {
        for id in ids {
            self.selected.remove(id);
            if self.anchor.as_ref() == Some(id) {
                self.anchor = None;
            }
        }
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&ApplicationId) -> bool) {
        self.selected.retain(|id| keep(id));
        if self.anchor.as_ref().is_some_and(|a| !keep(a)) {
            self.anchor = None;
        }
    }

    pub fn contains(&self, id: &ApplicationId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn anchor(&self) -> Option<&ApplicationId> {
        self.anchor.as_ref()
    }

    /// Selected ids that appear in `order`, in that order.
    pub fn ordered(&self, order: &[ApplicationId]) -> Vec<ApplicationId> {
        order
            .iter()
            .filter(|id| self.selected.contains(*id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ApplicationId> {
        names.iter().map(|n| ApplicationId::new(*n)).collect()
    }

    fn sorted(sel: &SelectionModel, order: &[ApplicationId]) -> Vec<String> {
        sel.ordered(order).iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn toggle_flips_membership() {
        let mut sel = SelectionModel::new();
        assert!(sel.toggle(ApplicationId::new("a")));
        assert!(sel.contains(&ApplicationId::new("a")));
        assert!(!sel.toggle(ApplicationId::new("a")));
        assert!(sel.is_empty());
        assert_eq!(sel.anchor(), Some(&ApplicationId::new("a")));
    }

    #[test]
    fn range_from_c_back_to_a() {
        let order = ids(&["a", "b", "c", "d", "e"]);
        let mut sel = SelectionModel::new();
        sel.toggle(ApplicationId::new("c"));
        sel.range_select(ApplicationId::new("a"), &order);
        assert_eq!(sorted(&sel, &order), vec!["a", "b", "c"]);
    }

    #[test]
    fn range_forward_unions_with_existing() {
        let order = ids(&["a", "b", "c", "d", "e"]);
        let mut sel = SelectionModel::new();
        sel.toggle(ApplicationId::new("a"));
        sel.toggle(ApplicationId::new("c"));
        sel.range_select(ApplicationId::new("e"), &order);
        assert_eq!(sorted(&sel, &order), vec!["a", "c", "d", "e"]);
        assert_eq!(sel.anchor(), Some(&ApplicationId::new("c")));
    }

    #[test]
    fn range_without_anchor_degrades_to_toggle() {
        let order = ids(&["a", "b", "c"]);
        let mut sel = SelectionModel::new();
        sel.range_select(ApplicationId::new("b"), &order);
        assert_eq!(sorted(&sel, &order), vec!["b"]);
    }

    #[test]
    fn range_with_anchor_outside_order_degrades_to_toggle() {
        let mut sel = SelectionModel::new();
        sel.toggle(ApplicationId::new("gone"));
        sel.range_select(ApplicationId::new("b"), &ids(&["a", "b", "c"]));
        assert!(sel.contains(&ApplicationId::new("b")));
        assert!(!sel.contains(&ApplicationId::new("a")));
        assert_eq!(sel.len(), 2);
    }

    #[test]
    fn select_exactly_replaces() {
        let mut sel = SelectionModel::new();
        sel.toggle(ApplicationId::new("a"));
        sel.select_exactly(ids(&["x"]));
        assert_eq!(sel.len(), 1);
        assert!(sel.contains(&ApplicationId::new("x")));
        assert_eq!(sel.anchor(), Some(&ApplicationId::new("x")));
    }

    #[test]
    fn clear_resets_anchor() {
        let mut sel = SelectionModel::new();
        sel.toggle(ApplicationId::new("a"));
        sel.clear();
        assert!(sel.is_empty());
        assert!(sel.anchor().is_none());
    }

    #[test]
    fn retain_drops_anchor_when_filtered_out() {
        let mut sel = SelectionModel::new();
        sel.select_exactly(ids(&["a", "b"]));
        sel.retain(|id| id.as_str() == "a");
        assert_eq!(sel.len(), 1);
        assert!(sel.anchor().is_none());
    }
}
