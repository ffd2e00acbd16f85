//! Document Object Store
//!
//! Holds parsed indirect objects on behalf of the parser, tracks the
//! resolved document catalog, and carries the page count computed after an
//! index load. Downstream document models build on top of this store.

use std::collections::HashMap;

use super::objects::{PdfDictionary, PdfObject};

/// Cache of parsed indirect objects plus the resolved catalog state
#[derive(Debug, Default)]
pub struct DocumentStore {
    objects: HashMap<u32, (u16, PdfObject)>,
    root: Option<PdfDictionary>,
    root_objnum: Option<u32>,
    page_count: u32,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything; used when the index is rebuilt
    pub fn reset(&mut self) {
        self.objects.clear();
        self.root = None;
        self.root_objnum = None;
        self.page_count = 0;
    }

    /// Previously parsed object, if any
    pub fn get_cached(&self, objnum: u32) -> Option<&PdfObject> {
        self.objects.get(&objnum).map(|(_, object)| object)
    }

    /// Remember a parsed object
    pub fn store(&mut self, objnum: u32, gen: u16, object: PdfObject) {
        if objnum != 0 {
            self.objects.insert(objnum, (gen, object));
        }
    }

    /// Store `object` unless a later generation of the same object number
    /// is already cached. Returns false only for the invalid object
    /// number zero.
    pub fn replace_if_higher_generation(&mut self, objnum: u32, gen: u16, object: PdfObject) -> bool {
        if objnum == 0 {
            return false;
        }
        match self.objects.get(&objnum) {
            Some((old_gen, _)) if *old_gen > gen => {}
            _ => {
                self.objects.insert(objnum, (gen, object));
            }
        }
        true
    }

    /// Resolved document catalog
    pub fn root(&self) -> Option<&PdfDictionary> {
        self.root.as_ref()
    }

    /// Object number of the resolved catalog
    pub fn root_objnum(&self) -> Option<u32> {
        self.root_objnum
    }

    pub fn set_root(&mut self, objnum: u32, dict: PdfDictionary) {
        self.root = Some(dict);
        self.root_objnum = Some(objnum);
    }

    /// Page count from the catalog's page tree (0 before a document load)
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn set_page_count(&mut self, count: u32) {
        self.page_count = count;
    }

    /// Number of cached objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_fetch() {
        let mut doc = DocumentStore::new();
        assert!(doc.get_cached(1).is_none());

        doc.store(1, 0, PdfObject::Integer(42));
        assert_eq!(doc.get_cached(1).unwrap().as_integer(), Some(42));

        // Object number zero is never stored
        doc.store(0, 0, PdfObject::Integer(1));
        assert!(doc.get_cached(0).is_none());
    }

    #[test]
    fn test_replace_respects_generation() {
        let mut doc = DocumentStore::new();
        assert!(doc.replace_if_higher_generation(5, 1, PdfObject::Integer(10)));
        // An older generation does not displace the cached object
        assert!(doc.replace_if_higher_generation(5, 0, PdfObject::Integer(20)));
        assert_eq!(doc.get_cached(5).unwrap().as_integer(), Some(10));

        // Same or newer generation replaces
        assert!(doc.replace_if_higher_generation(5, 1, PdfObject::Integer(30)));
        assert_eq!(doc.get_cached(5).unwrap().as_integer(), Some(30));

        assert!(!doc.replace_if_higher_generation(0, 0, PdfObject::Null));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut doc = DocumentStore::new();
        doc.store(1, 0, PdfObject::Null);
        doc.set_root(1, PdfDictionary::new());
        doc.set_page_count(4);

        doc.reset();
        assert!(doc.is_empty());
        assert!(doc.root().is_none());
        assert!(doc.root_objnum().is_none());
        assert_eq!(doc.page_count(), 0);
    }
}
