//! Id sets for the `in (...)` operator and the complete-ways pass.
//!
//! Ids are dense within a page but the page table is sparse, so the whole
//! u64 range is addressable without committing memory for unused regions.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::expr::FilterError;

// 65536 bits per page.
const PAGE_WORDS: usize = 1024;
const PAGE_SHIFT: u64 = 16;

/// A set of unsigned 64-bit ids backed by bitmap pages.
#[derive(Clone, Default)]
pub struct IdSet {
    pages: HashMap<u64, Box<[u64; PAGE_WORDS]>>,
    len: u64,
}

impl IdSet {
    pub fn new() -> IdSet {
        IdSet::default()
    }

    /// Insert an id. Returns true if it was not already present.
    pub fn set(&mut self, id: u64) -> bool {
        let page = self
            .pages
            .entry(id >> PAGE_SHIFT)
            .or_insert_with(|| Box::new([0u64; PAGE_WORDS]));
        let word = (id as usize >> 6) & (PAGE_WORDS - 1);
        let bit = 1u64 << (id & 63);
        let fresh = page[word] & bit == 0;
        page[word] |= bit;
        if fresh {
            self.len += 1;
        }
        fresh
    }

    pub fn get(&self, id: u64) -> bool {
        match self.pages.get(&(id >> PAGE_SHIFT)) {
            Some(page) => {
                let word = (id as usize >> 6) & (PAGE_WORDS - 1);
                page[word] & (1u64 << (id & 63)) != 0
            }
            None => false,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for IdSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdSet")
            .field("len", &self.len)
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl FromIterator<u64> for IdSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> IdSet {
        let mut set = IdSet::new();
        for id in iter {
            set.set(id);
        }
        set
    }
}

/// Read whitespace-separated decimal ids from a file into a set.
pub fn load_id_file(path: &str) -> Result<IdSet, FilterError> {
    let io_err = |source| FilterError::IdListIo {
        path: path.to_string(),
        source,
    };

    let file = File::open(Path::new(path)).map_err(io_err)?;
    let mut set = IdSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io_err)?;
        for token in line.split_whitespace() {
            let id: u64 = token.parse().map_err(|_| FilterError::IdListValue {
                path: path.to_string(),
                token: token.to_string(),
            })?;
            set.set(id);
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn set_and_get() {
        let mut set = IdSet::new();
        assert!(set.is_empty());
        assert!(set.set(0));
        assert!(set.set(63));
        assert!(set.set(64));
        assert!(set.set(123_456_789));
        assert!(!set.set(63), "inserting twice reports not-fresh");
        assert_eq!(set.len(), 4);

        assert!(set.get(0));
        assert!(set.get(63));
        assert!(set.get(64));
        assert!(set.get(123_456_789));
        assert!(!set.get(1));
        assert!(!set.get(123_456_790));
    }

    #[test]
    fn ids_far_apart_use_separate_pages() {
        let mut set = IdSet::new();
        set.set(1);
        set.set(u64::MAX);
        set.set(1u64 << 40);
        assert!(set.get(1));
        assert!(set.get(u64::MAX));
        assert!(set.get(1u64 << 40));
        assert!(!set.get(u64::MAX - 1));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn negative_ids_reinterpreted_as_unsigned() {
        let mut set = IdSet::new();
        set.set(-5i64 as u64);
        assert!(set.get(-5i64 as u64));
        assert!(!set.get(5));
    }

    fn temp_file(contents: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        path.push(format!("ofilter_ids_{}_{nanos}", std::process::id()));
        let mut file = File::create(&path).expect("create id list file");
        file.write_all(contents.as_bytes()).expect("write id list");
        path
    }

    #[test]
    fn load_whitespace_separated_ids() {
        let path = temp_file("1 2 3\n\n  42\t99\n");
        let set = load_id_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(set.len(), 5);
        assert!(set.get(1));
        assert!(set.get(42));
        assert!(set.get(99));
        assert!(!set.get(4));
    }

    #[test]
    fn load_rejects_non_numeric_content() {
        let path = temp_file("1 2 foo\n");
        let err = load_id_file(path.to_str().unwrap()).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.to_string().contains("foo"));
    }

    #[test]
    fn load_missing_file_fails() {
        assert!(load_id_file("/nonexistent/ofilter-ids").is_err());
    }
}
