//! Filter expression language for OSM objects.
//!
//! Syntax overview:
//!   true, false                  - boolean constants
//!   node, way, relation          - object type checks (also @type == way)
//!   @node, @way, @relation       - object type as boolean attribute
//!   @visible                     - object visibility
//!   @closed_way, @open_way       - way shape (also bare closed_way/open_way)
//!   @id, @version, @uid,
//!   @changeset                   - integer attributes, compared with
//!                                  ==  !=  <  <=  >  >=
//!   @user                        - user name, compared with
//!                                  ==  !=  =^  !^  =~  !~
//!   key                          - tag exists ('key' and "key" also work)
//!   key == value                 - tag comparison (all string operators)
//!   key =~ 'regex'i              - tag regex match, optional ignore-case
//!   @tags[ ... ]                 - count of tags matching a sub-expression
//!                                  over @key/@value
//!   @nodes[ ... ]                - count of way nodes matching @ref
//!   @members[ ... ]              - count of members matching @ref/@role
//!   @id in (1, 2, 3)             - id list membership (also not in)
//!   @id in (<'file')             - ids loaded from a file
//!   and, or, not, ( )            - boolean logic; # starts a comment

mod ast;
mod entities;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::{BoolAttr, CtxKind, Expr, IdListSource, IntAttr, IntOp, ListOp, StrAttr, StrOp};
pub use error::{render_caret, FilterError};
pub use eval::Ctx;
pub use parser::parse;

use crate::model::{EntitySet, OsmObject};

/// A parsed filter: the expression tree plus its precomputed entity mask.
///
/// Built once, prepared once (loads external id lists), then evaluated
/// against any number of objects.
pub struct ObjectFilter {
    root: Expr,
    entities: EntitySet,
}

impl ObjectFilter {
    pub fn new(input: &str) -> Result<ObjectFilter, FilterError> {
        let root = parse(input)?;
        let entities = root.entities().0;
        Ok(ObjectFilter { root, entities })
    }

    /// Kinds of objects this filter can possibly match.
    pub fn entities(&self) -> EntitySet {
        self.entities
    }

    /// Load external id lists referenced by the expression.
    pub fn prepare(&mut self) -> Result<(), FilterError> {
        self.root.prepare()
    }

    pub fn matches(&self, object: &OsmObject) -> bool {
        self.root.eval_bool(&Ctx::Object(object))
    }

    /// Verbose one-node-per-line rendering of the tree.
    pub fn tree(&self) -> String {
        self.root.tree()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Kind;
    use std::io::Write;

    #[test]
    fn filter_lifecycle() {
        let mut filter = ObjectFilter::new("@id == 7 or @id == 8").unwrap();
        assert_eq!(filter.entities(), EntitySet::ALL);
        filter.prepare().unwrap();
        assert!(filter.matches(&OsmObject::new(Kind::Node, 7)));
        assert!(filter.matches(&OsmObject::new(Kind::Way, 8)));
        assert!(!filter.matches(&OsmObject::new(Kind::Node, 9)));
    }

    #[test]
    fn prepare_loads_id_file() {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        path.push(format!("ofilter_expr_{}_{nanos}.ids", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "100 200\n300").unwrap();

        let input = format!("@id in (<'{}')", path.display());
        let mut filter = ObjectFilter::new(&input).unwrap();

        // Before prepare the set is empty.
        assert!(!filter.matches(&OsmObject::new(Kind::Node, 100)));

        filter.prepare().unwrap();
        assert!(filter.matches(&OsmObject::new(Kind::Node, 100)));
        assert!(filter.matches(&OsmObject::new(Kind::Node, 300)));
        assert!(!filter.matches(&OsmObject::new(Kind::Node, 400)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn prepare_fails_on_missing_file() {
        let mut filter = ObjectFilter::new("@id in (<'/nonexistent/ofilter.ids')").unwrap();
        let err = filter.prepare().unwrap_err();
        assert!(matches!(err, FilterError::IdListIo { .. }));
    }

    #[test]
    fn prepare_fails_on_bad_content() {
        let mut path = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        path.push(format!("ofilter_bad_{}_{nanos}.ids", std::process::id()));
        std::fs::write(&path, "1 2 three").unwrap();

        let input = format!("@id in (<'{}')", path.display());
        let mut filter = ObjectFilter::new(&input).unwrap();
        let err = filter.prepare().unwrap_err();
        assert!(matches!(err, FilterError::IdListValue { .. }));

        std::fs::remove_file(&path).ok();
    }
}
