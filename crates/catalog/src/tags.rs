use crate::model::Book;
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Books carrying a tag, partitioned by whether they are searched by default.
///
/// A book id is in at most one of the two sets.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEntry {
    pub default: BTreeSet<Uuid>,
    pub optional: BTreeSet<Uuid>,
}

impl TagEntry {
    pub fn is_empty(&self) -> bool {
        self.default.is_empty() && self.optional.is_empty()
    }

    pub fn len(&self) -> usize {
        self.default.len() + self.optional.len()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.default.contains(id) || self.optional.contains(id)
    }

    /// Every tagged book, default partition first.
    pub fn books(&self) -> impl Iterator<Item = &Uuid> {
        self.default.iter().chain(&self.optional)
    }

    /// Files `book` under the partition matching its flag, leaving the
    /// other one.
    pub(crate) fn insert(&mut self, book: &Book) {
        let (into, from) = if book.searched_by_default {
            (&mut self.default, &mut self.optional)
        } else {
            (&mut self.optional, &mut self.default)
        };
        from.remove(&book.id);
        into.insert(book.id);
    }

    pub(crate) fn remove(&mut self, id: &Uuid) {
        self.default.remove(id);
        self.optional.remove(id);
    }
}
