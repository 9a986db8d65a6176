//! Typed expression tree for the filter language.
//!
//! Every node has a fixed result type (bool, integer, string, or regex) and
//! is evaluated against one of four host contexts. The parser guarantees at
//! construction time that children are well-typed and that attributes only
//! appear in contexts that define them.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::idset::IdSet;
use crate::model::Kind;

use super::error::FilterError;

/// Integer comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl IntOp {
    pub fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            IntOp::Equal => lhs == rhs,
            IntOp::NotEqual => lhs != rhs,
            IntOp::LessThan => lhs < rhs,
            IntOp::LessOrEqual => lhs <= rhs,
            IntOp::GreaterThan => lhs > rhs,
            IntOp::GreaterOrEqual => lhs >= rhs,
        }
    }
}

impl fmt::Display for IntOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntOp::Equal => "equal",
            IntOp::NotEqual => "not_equal",
            IntOp::LessThan => "less_than",
            IntOp::LessOrEqual => "less_or_equal",
            IntOp::GreaterThan => "greater_than",
            IntOp::GreaterOrEqual => "greater_or_equal",
        })
    }
}

/// String comparison operators. The first four compare against a string
/// value, the last two against a compiled regex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOp {
    Equal,
    NotEqual,
    PrefixEqual,
    PrefixNotEqual,
    Match,
    NotMatch,
}

impl StrOp {
    pub fn is_regex(self) -> bool {
        matches!(self, StrOp::Match | StrOp::NotMatch)
    }
}

impl fmt::Display for StrOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrOp::Equal => "equal",
            StrOp::NotEqual => "not_equal",
            StrOp::PrefixEqual => "prefix_equal",
            StrOp::PrefixNotEqual => "prefix_not_equal",
            StrOp::Match => "match",
            StrOp::NotMatch => "not_match",
        })
    }
}

/// Membership operators for integer lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOp {
    In,
    NotIn,
}

impl fmt::Display for ListOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListOp::In => "in",
            ListOp::NotIn => "not_in",
        })
    }
}

/// Integer-valued attributes. `Ref` is defined on node-ref and member
/// contexts, the others on the object context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntAttr {
    Id,
    Version,
    Changeset,
    Uid,
    Ref,
}

impl fmt::Display for IntAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntAttr::Id => "id",
            IntAttr::Version => "version",
            IntAttr::Changeset => "changeset",
            IntAttr::Uid => "uid",
            IntAttr::Ref => "ref",
        })
    }
}

/// String-valued attributes. `User` is defined on objects, `Key`/`Value` on
/// tags, `Role` on relation members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrAttr {
    User,
    Key,
    Value,
    Role,
}

impl fmt::Display for StrAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrAttr::User => "user",
            StrAttr::Key => "key",
            StrAttr::Value => "value",
            StrAttr::Role => "role",
        })
    }
}

/// Boolean attributes of the object context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolAttr {
    Node,
    Way,
    Relation,
    Visible,
    ClosedWay,
    OpenWay,
}

impl fmt::Display for BoolAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoolAttr::Node => "node",
            BoolAttr::Way => "way",
            BoolAttr::Relation => "relation",
            BoolAttr::Visible => "visible",
            BoolAttr::ClosedWay => "closed_way",
            BoolAttr::OpenWay => "open_way",
        })
    }
}

/// The four host contexts an expression node can be evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtxKind {
    Object,
    Tag,
    NodeRef,
    Member,
}

impl CtxKind {
    /// Phrase used in context-error messages.
    pub fn describe(self) -> &'static str {
        match self {
            CtxKind::Object => "on objects",
            CtxKind::Tag => "inside @tags[...]",
            CtxKind::NodeRef => "inside @nodes[...]",
            CtxKind::Member => "inside @members[...]",
        }
    }
}

/// A regex pattern compiled at tree-construction time.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    pub pattern: String,
    pub case_insensitive: bool,
    re: Regex,
}

impl RegexPattern {
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<RegexPattern, FilterError> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|source| FilterError::Regex {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(RegexPattern {
            pattern: pattern.to_string(),
            case_insensitive,
            re,
        })
    }

    /// Unanchored search.
    pub fn is_match(&self, haystack: &str) -> bool {
        self.re.is_match(haystack)
    }
}

/// Where the ids of an `in (...)` expression come from.
#[derive(Debug, Clone)]
pub enum IdListSource {
    Values(Vec<i64>),
    File(String),
}

/// One node of the expression tree. Children are owned by their parent.
#[derive(Debug)]
pub enum Expr {
    BoolValue(bool),
    IntValue(i64),
    StrValue(String),
    RegexValue(RegexPattern),
    IntAttr(IntAttr),
    StrAttr(StrAttr),
    BoolAttr(BoolAttr),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    BinaryInt {
        lhs: Box<Expr>,
        op: IntOp,
        rhs: Box<Expr>,
    },
    BinaryStr {
        lhs: Box<Expr>,
        op: StrOp,
        rhs: Box<Expr>,
    },
    HasKey(String),
    CheckTagStr {
        key: String,
        op: StrOp,
        value: String,
    },
    CheckTagRegex {
        key: String,
        op: StrOp,
        pattern: RegexPattern,
    },
    CheckObjectType(Kind),
    CountTags(Box<Expr>),
    CountNodes(Box<Expr>),
    CountMembers(Box<Expr>),
    InIntList {
        attr: IntAttr,
        op: ListOp,
        source: IdListSource,
        set: IdSet,
    },
}

impl Expr {
    /// Load file-sourced id lists. Must run once before evaluation; a tree
    /// without file sources is a no-op.
    pub fn prepare(&mut self) -> Result<(), FilterError> {
        match self {
            Expr::And(children) | Expr::Or(children) => {
                for child in children {
                    child.prepare()?;
                }
            }
            Expr::Not(child) => child.prepare()?,
            Expr::BinaryInt { lhs, rhs, .. } | Expr::BinaryStr { lhs, rhs, .. } => {
                lhs.prepare()?;
                rhs.prepare()?;
            }
            Expr::CountTags(sub) | Expr::CountNodes(sub) | Expr::CountMembers(sub) => {
                sub.prepare()?;
            }
            Expr::InIntList { source, set, .. } => {
                if let IdListSource::File(path) = source {
                    *set = crate::idset::load_id_file(path)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Render the tree in the one-node-per-line verbose format.
    pub fn tree(&self) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, 0);
        out
    }

    fn write_tree(&self, out: &mut String, depth: usize) {
        for _ in 0..depth {
            out.push(' ');
        }
        match self {
            Expr::BoolValue(true) => out.push_str("TRUE\n"),
            Expr::BoolValue(false) => out.push_str("FALSE\n"),
            Expr::IntValue(value) => {
                out.push_str(&format!("INT_VALUE[{value}]\n"));
            }
            Expr::StrValue(value) => {
                out.push_str(&format!("STR_VALUE[{value}]\n"));
            }
            Expr::RegexValue(pattern) => {
                out.push_str(&format!(
                    "REGEX_VALUE[{}]{}\n",
                    pattern.pattern,
                    if pattern.case_insensitive {
                        "[IGNORE_CASE]"
                    } else {
                        ""
                    }
                ));
            }
            Expr::IntAttr(attr) => {
                out.push_str(&format!("INT_ATTR[{attr}]\n"));
            }
            Expr::StrAttr(attr) => {
                out.push_str(&format!("STR_ATTR[{attr}]\n"));
            }
            Expr::BoolAttr(attr) => {
                out.push_str(&format!("BOOL_ATTR[{attr}]\n"));
            }
            Expr::And(children) => {
                out.push_str("BOOL_AND\n");
                for child in children {
                    child.write_tree(out, depth + 1);
                }
            }
            Expr::Or(children) => {
                out.push_str("BOOL_OR\n");
                for child in children {
                    child.write_tree(out, depth + 1);
                }
            }
            Expr::Not(child) => {
                out.push_str("BOOL_NOT\n");
                child.write_tree(out, depth + 1);
            }
            Expr::BinaryInt { lhs, op, rhs } => {
                out.push_str(&format!("INT_BIN_OP[{op}]\n"));
                lhs.write_tree(out, depth + 1);
                rhs.write_tree(out, depth + 1);
            }
            Expr::BinaryStr { lhs, op, rhs } => {
                out.push_str(&format!("BIN_STR_OP[{op}]\n"));
                lhs.write_tree(out, depth + 1);
                rhs.write_tree(out, depth + 1);
            }
            Expr::HasKey(key) => {
                out.push_str(&format!("HAS_KEY[{key}]\n"));
            }
            Expr::CheckTagStr { key, op, value } => {
                out.push_str(&format!("CHECK_TAG[{key}][{op}][{value}]\n"));
            }
            Expr::CheckTagRegex { key, op, pattern } => {
                out.push_str(&format!(
                    "CHECK_TAG[{key}][{op}][{}][{}]\n",
                    pattern.pattern,
                    if pattern.case_insensitive {
                        "IGNORE_CASE"
                    } else {
                        ""
                    }
                ));
            }
            Expr::CheckObjectType(kind) => {
                out.push_str(&format!("CHECK_OBJECT_TYPE[{kind}]\n"));
            }
            Expr::CountTags(sub) => {
                out.push_str("COUNT_TAGS\n");
                sub.write_tree(out, depth + 1);
            }
            Expr::CountNodes(sub) => {
                out.push_str("COUNT_NODES\n");
                sub.write_tree(out, depth + 1);
            }
            Expr::CountMembers(sub) => {
                out.push_str("COUNT_MEMBERS\n");
                sub.write_tree(out, depth + 1);
            }
            Expr::InIntList {
                attr, op, source, ..
            } => {
                out.push_str(&format!("IN_INT_LIST[{op}]\n"));
                for _ in 0..=depth {
                    out.push(' ');
                }
                out.push_str(&format!("INT_ATTR[{attr}]\n"));
                for _ in 0..=depth {
                    out.push(' ');
                }
                match source {
                    IdListSource::Values(values) => {
                        let shown: Vec<String> =
                            values.iter().take(5).map(|v| v.to_string()).collect();
                        let ellipsis = if values.len() > 5 { ", ..." } else { "" };
                        out.push_str(&format!("VALUES[{}{}]\n", shown.join(", "), ellipsis));
                    }
                    IdListSource::File(path) => {
                        out.push_str(&format!("FROM_FILE[{path}]\n"));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_pattern_matching() {
        let re = RegexPattern::new("prim", false).unwrap();
        assert!(re.is_match("primary"), "search is unanchored");
        assert!(!re.is_match("PRIMARY"));

        let ci = RegexPattern::new("prim", true).unwrap();
        assert!(ci.is_match("PRIMARY"));
    }

    #[test]
    fn invalid_regex_is_an_error() {
        let err = RegexPattern::new("(unclosed", false).unwrap_err();
        assert!(err.to_string().contains("invalid regex"));
    }

    #[test]
    fn value_list_rendering_truncates_after_five() {
        let expr = Expr::InIntList {
            attr: IntAttr::Id,
            op: ListOp::In,
            source: IdListSource::Values(vec![1, 2, 3, 4, 5, 6, 7]),
            set: IdSet::new(),
        };
        assert_eq!(
            expr.tree(),
            "IN_INT_LIST[in]\n INT_ATTR[id]\n VALUES[1, 2, 3, 4, 5, ...]\n"
        );
    }

    #[test]
    fn prepare_is_a_no_op_without_file_sources() {
        let mut expr = Expr::And(vec![
            Expr::BoolValue(true),
            Expr::Not(Box::new(Expr::BoolValue(false))),
        ]);
        assert!(expr.prepare().is_ok());
    }
}
