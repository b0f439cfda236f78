//! Modèle d'ordre : séquence ordonnée d'éléments indexée par identifiant

mod item;

pub use item::{Item, ItemMetadata};

use crate::plan::MoveOperation;
use crate::{Error, Result};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Déplacement validé par [`Order::prepare`]
///
/// Les indices ne valent que pour l'état de l'ordre qui l'a produit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Relocation {
    from: usize,
    /// Position finale de l'élément
    pub(crate) to: usize,
}

/// Ordre courant d'une playlist
///
/// Les identifiants sont uniques. La position de chaque élément est
/// maintenue égale à son index dans la séquence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Order {
    items: Vec<Item>,
    index: HashMap<String, usize>,
}

impl Order {
    /// Construit un ordre à partir d'éléments, dans l'ordre fourni
    pub fn new(items: Vec<Item>) -> Result<Self> {
        let mut index = HashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            if index.insert(item.id.clone(), position).is_some() {
                return Err(Error::DuplicateId(item.id.clone()));
            }
        }

        let mut order = Self { items, index };
        order.renumber(0..=order.items.len().saturating_sub(1));
        Ok(order)
    }

    /// Construit un ordre d'éléments sans handle
    pub fn from_ids<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ids.into_iter().map(Item::new).collect())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Identifiants dans l'ordre courant
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|&position| &self.items[position])
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Handle distant de `id`, requis pour le déplacer côté service
    pub fn handle_of(&self, id: &str) -> Result<&str> {
        let position = self.require(id)?;
        self.items[position]
            .handle
            .as_deref()
            .ok_or_else(|| Error::MissingHandle(id.to_string()))
    }

    /// Élément qui précède `id` (None s'il est en tête)
    pub fn predecessor_of(&self, id: &str) -> Result<Option<&str>> {
        let position = self.require(id)?;
        Ok(position
            .checked_sub(1)
            .map(|previous| self.items[previous].id.as_str()))
    }

    /// Position finale (0-based) qu'occupera `id` une fois placé après `after`
    ///
    /// C'est la valeur attendue par l'appel distant de déplacement.
    pub fn target_position(&self, id: &str, after: Option<&str>) -> Result<usize> {
        let from = self.require(id)?;
        match after {
            None => Ok(0),
            Some(after_id) if after_id == id => Err(Error::SelfReference(id.to_string())),
            Some(after_id) => {
                let anchor = self.require(after_id)?;
                Ok(if anchor < from { anchor + 1 } else { anchor })
            }
        }
    }

    /// Déplace `id` juste après `after`, ou en tête si `after` vaut None
    pub fn relocate(&mut self, id: &str, after: Option<&str>) -> Result<()> {
        let relocation = self.prepare(id, after)?;
        self.commit(relocation);
        Ok(())
    }

    /// Valide un déplacement sans modifier l'ordre
    pub(crate) fn prepare(&self, id: &str, after: Option<&str>) -> Result<Relocation> {
        Ok(Relocation {
            from: self.require(id)?,
            to: self.target_position(id, after)?,
        })
    }

    /// Applique un déplacement préparé sur ce même ordre
    pub(crate) fn commit(&mut self, relocation: Relocation) {
        let Relocation { from, to } = relocation;
        if from == to {
            return;
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.renumber(from.min(to)..=from.max(to));
    }

    /// Applique une opération de déplacement
    pub fn apply(&mut self, op: &MoveOperation) -> Result<()> {
        self.relocate(&op.id, op.after.as_deref())
    }

    fn require(&self, id: &str) -> Result<usize> {
        self.position_of(id)
            .ok_or_else(|| Error::ReferenceNotFound(id.to_string()))
    }

    fn renumber(&mut self, range: RangeInclusive<usize>) {
        for position in range {
            if let Some(item) = self.items.get_mut(position) {
                item.position = position;
                self.index.insert(item.id.clone(), position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(ids: &[&str]) -> Order {
        Order::from_ids(ids.iter().copied()).unwrap()
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let result = Order::from_ids(["A", "B", "A"]);
        assert!(matches!(result, Err(Error::DuplicateId(id)) if id == "A"));
    }

    #[test]
    fn test_positions_are_numbered() {
        let o = order(&["A", "B", "C"]);
        let positions: Vec<usize> = o.items().iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(o.position_of("C"), Some(2));
    }

    #[test]
    fn test_relocate_to_front() {
        let mut o = order(&["A", "B", "C", "D"]);
        o.relocate("C", None).unwrap();
        assert_eq!(o.ids(), vec!["C", "A", "B", "D"]);
        assert_eq!(o.position_of("A"), Some(1));
        assert_eq!(o.get("D").unwrap().position, 3);
    }

    #[test]
    fn test_relocate_forward_and_backward() {
        let mut o = order(&["D", "A", "B", "C"]);
        o.relocate("D", Some("C")).unwrap();
        assert_eq!(o.ids(), vec!["A", "B", "C", "D"]);

        o.relocate("C", Some("A")).unwrap();
        assert_eq!(o.ids(), vec!["A", "C", "B", "D"]);
        for (position, item) in o.items().iter().enumerate() {
            assert_eq!(item.position, position);
            assert_eq!(o.position_of(&item.id), Some(position));
        }
    }

    #[test]
    fn test_relocate_noop_when_already_after() {
        let mut o = order(&["A", "B", "C"]);
        o.relocate("B", Some("A")).unwrap();
        assert_eq!(o.ids(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_relocate_unknown_references() {
        let mut o = order(&["A", "B"]);
        assert!(matches!(o.relocate("Z", None), Err(Error::ReferenceNotFound(id)) if id == "Z"));
        assert!(matches!(
            o.relocate("A", Some("Z")),
            Err(Error::ReferenceNotFound(id)) if id == "Z"
        ));
        assert!(matches!(o.relocate("A", Some("A")), Err(Error::SelfReference(_))));
        assert_eq!(o.ids(), vec!["A", "B"]);
    }

    #[test]
    fn test_target_position_matches_relocation() {
        let base = order(&["A", "B", "C", "D", "E"]);
        for id in base.ids() {
            let mut anchors: Vec<Option<String>> = vec![None];
            anchors.extend(base.ids().into_iter().filter(|a| *a != id).map(Some));
            for after in anchors {
                let expected = base.target_position(&id, after.as_deref()).unwrap();
                let mut moved = base.clone();
                moved.relocate(&id, after.as_deref()).unwrap();
                assert_eq!(moved.position_of(&id), Some(expected));
            }
        }
    }

    #[test]
    fn test_prepare_leaves_order_untouched() {
        let mut o = order(&["A", "B", "C"]);
        let relocation = o.prepare("A", Some("C")).unwrap();
        assert_eq!(relocation.to, 2);
        assert_eq!(o.ids(), vec!["A", "B", "C"]);

        o.commit(relocation);
        assert_eq!(o.ids(), vec!["B", "C", "A"]);
        assert!(matches!(o.prepare("B", Some("B")), Err(Error::SelfReference(_))));
    }

    #[test]
    fn test_handle_of() {
        let o = Order::new(vec![Item::with_handle("A", "hA"), Item::new("B")]).unwrap();
        assert_eq!(o.handle_of("A").unwrap(), "hA");
        assert!(matches!(o.handle_of("B"), Err(Error::MissingHandle(id)) if id == "B"));
        assert!(matches!(o.handle_of("Z"), Err(Error::ReferenceNotFound(_))));
    }

    #[test]
    fn test_predecessor_of() {
        let o = order(&["A", "B"]);
        assert_eq!(o.predecessor_of("A").unwrap(), None);
        assert_eq!(o.predecessor_of("B").unwrap(), Some("A"));
        assert!(o.predecessor_of("Z").is_err());
    }
}
