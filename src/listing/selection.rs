use std::collections::BTreeSet;

use uuid::Uuid;

/// Selected record IDs, kept within the rows currently on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<Uuid>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &Uuid> {
        self.ids.iter()
    }

    pub fn to_vec(&self) -> Vec<Uuid> {
        self.ids.iter().copied().collect()
    }

    /// Flip one row. Returns whether it is now selected.
    pub fn toggle(&mut self, id: Uuid) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_all_selected(&self, visible: &[Uuid]) -> bool {
        !visible.is_empty()
            && self.ids.len() == visible.len()
            && visible.iter().all(|id| self.ids.contains(id))
    }

    /// "Select all": empty ↔ every visible row.
    pub fn toggle_all(&mut self, visible: &[Uuid]) {
        if self.is_all_selected(visible) {
            self.ids.clear();
        } else {
            self.ids = visible.iter().copied().collect();
        }
    }

    /// Drop IDs that are no longer visible. Returns the dropped IDs.
    pub fn retain_visible(&mut self, visible: &[Uuid]) -> Vec<Uuid> {
        let visible: BTreeSet<&Uuid> = visible.iter().collect();
        let dropped: Vec<Uuid> = self
            .ids
            .iter()
            .filter(|id| !visible.contains(id))
            .copied()
            .collect();
        for id in &dropped {
            self.ids.remove(id);
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_toggle_all_twice_returns_to_empty() {
        let visible = ids(4);
        let mut selection = Selection::new();
        selection.toggle_all(&visible);
        assert_eq!(selection.len(), 4);
        assert!(selection.is_all_selected(&visible));
        selection.toggle_all(&visible);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_toggle_all_from_partial_selects_everything() {
        let visible = ids(3);
        let mut selection = Selection::from_ids([visible[1]]);
        selection.toggle_all(&visible);
        assert!(selection.is_all_selected(&visible));
    }

    #[test]
    fn test_toggle_all_on_empty_page_keeps_empty() {
        let mut selection = Selection::new();
        selection.toggle_all(&[]);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_retain_visible_keeps_subset() {
        let first_page = ids(3);
        let mut selection = Selection::from_ids(first_page.clone());
        let second_page = vec![first_page[2], Uuid::new_v4()];
        let dropped = selection.retain_visible(&second_page);
        assert_eq!(dropped.len(), 2);
        assert_eq!(selection.to_vec(), vec![first_page[2]]);
        assert!(selection.ids().all(|id| second_page.contains(id)));
    }

    #[test]
    fn test_toggle_single() {
        let id = Uuid::new_v4();
        let mut selection = Selection::new();
        assert!(selection.toggle(id));
        assert!(selection.contains(&id));
        assert!(!selection.toggle(id));
        assert!(selection.is_empty());
    }
}
