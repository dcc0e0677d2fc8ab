//! Ordered, id-unique row collection and its change reducer.

use crate::models::{Record, RowChange};

/// Rows of one table in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<R: Record> {
    rows: Vec<R>,
}

impl<R: Record> Default for Collection<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: Record> Collection<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a bulk read. Repeated ids keep the last row seen.
    #[must_use]
    pub fn from_rows(rows: Vec<R>) -> Self {
        let mut collection = Self::new();
        for row in rows {
            collection.apply(RowChange::Update(row));
        }
        collection
    }

    #[must_use]
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &R::Id) -> Option<&R> {
        self.rows.iter().find(|row| row.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: &R::Id) -> bool {
        self.position(id).is_some()
    }

    fn position(&self, id: &R::Id) -> Option<usize> {
        self.rows.iter().position(|row| row.id() == id)
    }

    /// Fold one change in. Returns whether the rows changed.
    ///
    /// Inserting a known id and deleting an unknown id are no-ops; updating
    /// an unknown id appends the row.
    pub fn apply(&mut self, change: RowChange<R>) -> bool {
        match change {
            RowChange::Insert(row) => {
                if self.contains(row.id()) {
                    return false;
                }
                self.rows.push(row);
                true
            }
            RowChange::Update(row) => match self.position(row.id()) {
                Some(index) if self.rows[index] == row => false,
                Some(index) => {
                    self.rows[index] = row;
                    true
                }
                None => {
                    self.rows.push(row);
                    true
                }
            },
            RowChange::Delete(id) => match self.position(&id) {
                Some(index) => {
                    self.rows.remove(index);
                    true
                }
                None => false,
            },
        }
    }

    /// Whether the collection already shows the outcome of `change`.
    #[must_use]
    pub fn reflects(&self, change: &RowChange<R>) -> bool {
        match change {
            RowChange::Insert(row) | RowChange::Update(row) => self.get(row.id()) == Some(row),
            RowChange::Delete(id) => !self.contains(id),
        }
    }

    /// Remove every row matching `predicate`, returning the removed rows.
    pub fn remove_where(&mut self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        let (removed, kept): (Vec<R>, Vec<R>) = std::mem::take(&mut self.rows)
            .into_iter()
            .partition(|row| predicate(row));
        self.rows = kept;
        removed
    }

    pub fn replace_all(&mut self, rows: Vec<R>) {
        *self = Self::from_rows(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Service, ServiceId};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn service(seed: u128, name: &str) -> Service {
        Service {
            id: ServiceId::from_uuid(Uuid::from_u128(seed)),
            name: name.to_string(),
            duration: 30,
            price: Decimal::new(50, 0),
        }
    }

    fn names(collection: &Collection<Service>) -> Vec<&str> {
        collection.iter().map(|row| row.name.as_str()).collect()
    }

    #[test]
    fn duplicate_insert_is_a_noop() {
        let mut collection = Collection::new();
        assert!(collection.apply(RowChange::Insert(service(1, "Cut"))));
        assert!(!collection.apply(RowChange::Insert(service(1, "Cut"))));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn delete_of_unknown_id_is_a_noop() {
        let mut collection = Collection::from_rows(vec![service(1, "Cut")]);
        let unknown = ServiceId::from_uuid(Uuid::from_u128(9));
        assert!(!collection.apply(RowChange::Delete(unknown)));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn update_replaces_in_place_and_self_heals() {
        let mut collection = Collection::from_rows(vec![service(1, "Cut"), service(2, "Colour")]);

        assert!(collection.apply(RowChange::Update(service(1, "Short cut"))));
        assert_eq!(names(&collection), vec!["Short cut", "Colour"]);

        assert!(collection.apply(RowChange::Update(service(3, "Perm"))));
        assert_eq!(names(&collection), vec!["Short cut", "Colour", "Perm"]);

        assert!(!collection.apply(RowChange::Update(service(3, "Perm"))));
    }

    #[test]
    fn applying_a_change_twice_equals_applying_it_once() {
        let changes = vec![
            RowChange::Insert(service(1, "Cut")),
            RowChange::Update(service(2, "Colour")),
            RowChange::Delete(ServiceId::from_uuid(Uuid::from_u128(1))),
        ];

        for change in changes {
            let mut once = Collection::from_rows(vec![service(1, "Cut"), service(4, "Wash")]);
            once.apply(change.clone());
            let mut twice = once.clone();
            twice.apply(change);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn independent_changes_converge_in_any_order() {
        let first = RowChange::Insert(service(1, "Cut"));
        let second = RowChange::Delete(ServiceId::from_uuid(Uuid::from_u128(2)));

        let mut forward = Collection::from_rows(vec![service(2, "Colour")]);
        forward.apply(first.clone());
        forward.apply(second.clone());

        let mut backward = Collection::from_rows(vec![service(2, "Colour")]);
        backward.apply(second);
        backward.apply(first);

        assert_eq!(forward, backward);
    }

    #[test]
    fn reflects_matches_row_content() {
        let collection = Collection::from_rows(vec![service(1, "Cut")]);
        assert!(collection.reflects(&RowChange::Insert(service(1, "Cut"))));
        assert!(!collection.reflects(&RowChange::Update(service(1, "Trim"))));
        assert!(collection.reflects(&RowChange::Delete(ServiceId::from_uuid(Uuid::from_u128(5)))));
    }

    #[test]
    fn remove_where_keeps_order_of_survivors() {
        let mut collection = Collection::from_rows(vec![
            service(1, "Cut"),
            service(2, "Colour"),
            service(3, "Curl"),
        ]);
        let removed = collection.remove_where(|row| row.name.starts_with("Co"));
        assert_eq!(removed.len(), 1);
        assert_eq!(names(&collection), vec!["Cut", "Curl"]);
    }
}
