//! Evaluation of expression trees against OSM objects and their
//! sub-elements.
//!
//! Each node naturally produces a bool, integer, or string result; asking a
//! node for a different mode goes through a fixed set of coercions:
//! bool -> int is 0/1, int -> bool is `> 0`, str -> bool is non-empty, and
//! str -> int is a leading-integer parse yielding 0 on failure. The parser
//! guarantees attribute/context pairs are valid, so evaluation is total.

use crate::model::{Member, NodeRef, OsmObject, Tag};

use super::ast::{BoolAttr, Expr, IntAttr, ListOp, RegexPattern, StrAttr, StrOp};

/// The value an expression is currently evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum Ctx<'a> {
    Object(&'a OsmObject),
    Tag(&'a Tag),
    NodeRef(&'a NodeRef),
    Member(&'a Member),
}

impl<'a> Ctx<'a> {
    fn object(&self) -> &'a OsmObject {
        match *self {
            Ctx::Object(object) => object,
            _ => unreachable!("object context required"),
        }
    }
}

impl Expr {
    pub fn eval_bool(&self, ctx: &Ctx<'_>) -> bool {
        match self {
            Expr::BoolValue(value) => *value,
            Expr::BoolAttr(attr) => eval_bool_attr(*attr, ctx.object()),
            Expr::And(children) => children.iter().all(|c| c.eval_bool(ctx)),
            Expr::Or(children) => children.iter().any(|c| c.eval_bool(ctx)),
            Expr::Not(child) => !child.eval_bool(ctx),
            Expr::BinaryInt { lhs, op, rhs } => op.apply(lhs.eval_int(ctx), rhs.eval_int(ctx)),
            Expr::BinaryStr { lhs, op, rhs } => {
                eval_str_op(*op, lhs.eval_str(ctx), rhs.as_ref(), ctx)
            }
            Expr::HasKey(key) => ctx.object().tag(key).is_some(),
            Expr::CheckTagStr { key, op, value } => match ctx.object().tag(key) {
                // A missing key is false for both operator polarities.
                None => false,
                Some(actual) => apply_plain_str_op(*op, actual, value),
            },
            Expr::CheckTagRegex { key, op, pattern } => match ctx.object().tag(key) {
                None => false,
                Some(actual) => apply_regex_op(*op, actual, pattern),
            },
            Expr::CheckObjectType(kind) => ctx.object().kind == *kind,
            Expr::InIntList { attr, op, set, .. } => {
                let value = Expr::IntAttr(*attr).eval_int(ctx);
                let found = set.get(value as u64);
                match op {
                    ListOp::In => found,
                    ListOp::NotIn => !found,
                }
            }
            // int -> bool: strictly positive
            Expr::IntValue(_)
            | Expr::IntAttr(_)
            | Expr::CountTags(_)
            | Expr::CountNodes(_)
            | Expr::CountMembers(_) => self.eval_int(ctx) > 0,
            // str -> bool: non-empty
            Expr::StrValue(_) | Expr::StrAttr(_) => !self.eval_str(ctx).is_empty(),
            Expr::RegexValue(_) => unreachable!("regex values only appear under regex operators"),
        }
    }

    pub fn eval_int(&self, ctx: &Ctx<'_>) -> i64 {
        match self {
            Expr::IntValue(value) => *value,
            Expr::IntAttr(attr) => eval_int_attr(*attr, ctx),
            Expr::CountTags(sub) => {
                let object = ctx.object();
                object
                    .tags
                    .iter()
                    .filter(|tag| sub.eval_bool(&Ctx::Tag(tag)))
                    .count() as i64
            }
            Expr::CountNodes(sub) => {
                let object = ctx.object();
                object
                    .nodes
                    .iter()
                    .filter(|node_ref| sub.eval_bool(&Ctx::NodeRef(node_ref)))
                    .count() as i64
            }
            Expr::CountMembers(sub) => {
                let object = ctx.object();
                object
                    .members
                    .iter()
                    .filter(|member| sub.eval_bool(&Ctx::Member(member)))
                    .count() as i64
            }
            // str -> int: leading-integer parse
            Expr::StrValue(_) | Expr::StrAttr(_) => leading_int(self.eval_str(ctx)),
            Expr::RegexValue(_) => unreachable!("regex values only appear under regex operators"),
            // bool -> int: true is 1, false is 0
            _ => self.eval_bool(ctx) as i64,
        }
    }

    /// String view into the node or the context; valid until the next
    /// object replaces the context.
    pub fn eval_str<'a>(&'a self, ctx: &Ctx<'a>) -> &'a str {
        match self {
            Expr::StrValue(value) => value,
            Expr::StrAttr(attr) => match (attr, ctx) {
                (StrAttr::User, Ctx::Object(object)) => &object.user,
                (StrAttr::Key, Ctx::Tag(tag)) => &tag.key,
                (StrAttr::Value, Ctx::Tag(tag)) => &tag.value,
                (StrAttr::Role, Ctx::Member(member)) => &member.role,
                _ => unreachable!("attribute/context mismatch"),
            },
            _ => unreachable!("only string-typed nodes are evaluated as strings"),
        }
    }
}

fn eval_bool_attr(attr: BoolAttr, object: &OsmObject) -> bool {
    use crate::model::Kind;
    match attr {
        BoolAttr::Node => object.kind == Kind::Node,
        BoolAttr::Way => object.kind == Kind::Way,
        BoolAttr::Relation => object.kind == Kind::Relation,
        BoolAttr::Visible => object.visible,
        BoolAttr::ClosedWay => object.is_closed_way(),
        BoolAttr::OpenWay => object.kind == Kind::Way && !object.is_closed_way(),
    }
}

fn eval_int_attr(attr: IntAttr, ctx: &Ctx<'_>) -> i64 {
    match (attr, ctx) {
        (IntAttr::Id, Ctx::Object(object)) => object.id,
        (IntAttr::Version, Ctx::Object(object)) => object.version,
        (IntAttr::Changeset, Ctx::Object(object)) => object.changeset,
        (IntAttr::Uid, Ctx::Object(object)) => object.uid,
        (IntAttr::Ref, Ctx::NodeRef(node_ref)) => node_ref.id,
        (IntAttr::Ref, Ctx::Member(member)) => member.id,
        _ => unreachable!("attribute/context mismatch"),
    }
}

fn eval_str_op(op: StrOp, lhs: &str, rhs: &Expr, ctx: &Ctx<'_>) -> bool {
    if op.is_regex() {
        match rhs {
            Expr::RegexValue(pattern) => apply_regex_op(op, lhs, pattern),
            _ => unreachable!("regex operator without regex value"),
        }
    } else {
        apply_plain_str_op(op, lhs, rhs.eval_str(ctx))
    }
}

fn apply_plain_str_op(op: StrOp, lhs: &str, rhs: &str) -> bool {
    match op {
        StrOp::Equal => lhs == rhs,
        StrOp::NotEqual => lhs != rhs,
        StrOp::PrefixEqual => lhs.starts_with(rhs),
        StrOp::PrefixNotEqual => !lhs.starts_with(rhs),
        StrOp::Match | StrOp::NotMatch => unreachable!("regex operator used on plain strings"),
    }
}

fn apply_regex_op(op: StrOp, haystack: &str, pattern: &RegexPattern) -> bool {
    match op {
        StrOp::Match => pattern.is_match(haystack),
        StrOp::NotMatch => !pattern.is_match(haystack),
        _ => unreachable!("plain operator used with regex value"),
    }
}

/// C-style atoi: optional leading whitespace and sign, then digits; 0 when
/// no leading integer is found.
fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|v| sign * v).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;
    use crate::model::{Kind, Member, NodeRef, OsmObject, Tag};

    fn tagged(kind: Kind, id: i64, tags: &[(&str, &str)]) -> OsmObject {
        let mut object = OsmObject::new(kind, id);
        object.tags = tags
            .iter()
            .map(|(k, v)| Tag {
                key: k.to_string(),
                value: v.to_string(),
            })
            .collect();
        object
    }

    fn eval(input: &str, object: &OsmObject) -> bool {
        parse(input).unwrap().eval_bool(&Ctx::Object(object))
    }

    #[test]
    fn constants_and_connectives() {
        let node = OsmObject::new(Kind::Node, 1);
        assert!(eval("true", &node));
        assert!(!eval("false", &node));
        assert!(eval("true and true", &node));
        assert!(!eval("true and false", &node));
        assert!(eval("true or false", &node));
        assert!(!eval("false or false", &node));
        assert!(eval("not false", &node));
        assert!(eval("true and not false and true", &node));
    }

    #[test]
    fn integer_attributes_and_comparison() {
        let mut node = OsmObject::new(Kind::Node, 17);
        node.version = 3;
        node.changeset = 1234;
        node.uid = 42;
        assert!(eval("@id == 17", &node));
        assert!(eval("@id != 18", &node));
        assert!(eval("@version < 4", &node));
        assert!(eval("@version >= 3", &node));
        assert!(eval("@changeset > 1000", &node));
        assert!(eval("@uid <= 42", &node));
        assert!(!eval("@uid < 42", &node));
        assert!(eval("17 == @id", &node));
        assert!(eval("@version == @version", &node));
    }

    #[test]
    fn string_attribute_comparison() {
        let mut node = OsmObject::new(Kind::Node, 1);
        node.user = "JohnDoe".to_string();
        assert!(eval("@user == 'JohnDoe'", &node));
        assert!(eval("@user != 'JaneDoe'", &node));
        assert!(eval("@user =^ 'John'", &node));
        assert!(eval("@user !^ 'Jane'", &node));
        assert!(!eval("@user =^ 'ohn'", &node));
        assert!(eval("@user =~ 'ohn'", &node), "regex search is unanchored");
        assert!(eval("@user !~ 'jane'", &node));
        assert!(eval("@user =~ 'JOHN'i", &node));
        assert!(!eval("@user =~ 'JOHN'", &node));
    }

    #[test]
    fn object_type_checks() {
        let node = OsmObject::new(Kind::Node, 1);
        let way = OsmObject::new(Kind::Way, 1);
        let relation = OsmObject::new(Kind::Relation, 1);
        for expr in ["node", "@node", "@type == node"] {
            assert!(eval(expr, &node), "{expr}");
            assert!(!eval(expr, &way), "{expr}");
            assert!(!eval(expr, &relation), "{expr}");
        }
        assert!(eval("way", &way));
        assert!(eval("relation", &relation));
    }

    #[test]
    fn visible_attribute() {
        let mut node = OsmObject::new(Kind::Node, 1);
        assert!(eval("@visible", &node));
        node.visible = false;
        assert!(!eval("@visible", &node));
        assert!(eval("not @visible", &node));
    }

    #[test]
    fn closed_and_open_way() {
        let mut way = OsmObject::new(Kind::Way, 1);
        way.nodes = vec![NodeRef { id: 1 }, NodeRef { id: 2 }, NodeRef { id: 1 }];
        assert!(eval("closed_way", &way));
        assert!(!eval("open_way", &way));

        way.nodes.pop();
        assert!(!eval("closed_way", &way));
        assert!(eval("open_way", &way));

        // Degenerate ways count as closed.
        way.nodes.clear();
        assert!(eval("closed_way", &way));
        way.nodes.push(NodeRef { id: 9 });
        assert!(eval("closed_way", &way));

        // Nodes and relations are neither closed nor open ways.
        let node = OsmObject::new(Kind::Node, 1);
        assert!(!eval("closed_way", &node));
        assert!(!eval("open_way", &node));
    }

    #[test]
    fn has_key_and_tag_checks() {
        let object = tagged(Kind::Way, 1, &[("highway", "primary"), ("name", "High St")]);
        assert!(eval("'highway'", &object));
        assert!(eval("highway", &object));
        assert!(!eval("'surface'", &object));
        assert!(eval("'highway' == 'primary'", &object));
        assert!(!eval("'highway' == 'secondary'", &object));
        assert!(eval("'highway' != 'secondary'", &object));
        assert!(eval("'highway' =^ 'prim'", &object));
        assert!(eval("'highway' !^ 'sec'", &object));
        assert!(eval("'highway' =~ 'prim'", &object));
        assert!(eval("'highway' =~ 'PRIMARY'i", &object));
        assert!(eval("'highway' !~ 'second'", &object));
    }

    #[test]
    fn missing_key_is_false_for_both_polarities() {
        let object = tagged(Kind::Node, 1, &[("amenity", "cafe")]);
        assert!(!eval("'highway' == 'primary'", &object));
        assert!(!eval("'highway' != 'primary'", &object));
        assert!(!eval("'highway' =^ 'prim'", &object));
        assert!(!eval("'highway' !^ 'prim'", &object));
        assert!(!eval("'highway' =~ 'p'", &object));
        assert!(!eval("'highway' !~ 'p'", &object));
    }

    #[test]
    fn tag_counts() {
        let object = tagged(
            Kind::Node,
            1,
            &[("highway", "crossing"), ("crossing", "zebra"), ("lit", "yes")],
        );
        assert!(eval("@tags == 3", &object));
        assert!(eval("@tags[ @key == 'highway' ] == 1", &object));
        assert!(eval("@tags[ @value == 'zebra' ] > 0", &object));
        assert!(eval("@tags[ @key =^ 'cross' ] == 1", &object));
        assert!(!eval("@tags[ @key == 'name' ] > 0", &object));
        // Bare counts coerce through `> 0`.
        assert!(eval("@tags", &object));
        assert!(!eval("@tags", &OsmObject::new(Kind::Node, 1)));
    }

    #[test]
    fn node_and_member_counts() {
        let mut way = OsmObject::new(Kind::Way, 1);
        way.nodes = vec![NodeRef { id: 100 }, NodeRef { id: 200 }, NodeRef { id: 300 }];
        assert!(eval("@nodes == 3", &way));
        assert!(eval("@nodes[ @ref > 150 ] == 2", &way));
        assert!(eval("@nodes[ @ref in (100, 300) ] == 2", &way));

        let mut relation = OsmObject::new(Kind::Relation, 1);
        relation.members = vec![
            Member {
                kind: Kind::Way,
                id: 10,
                role: "outer".to_string(),
            },
            Member {
                kind: Kind::Way,
                id: 11,
                role: "inner".to_string(),
            },
            Member {
                kind: Kind::Node,
                id: 12,
                role: String::new(),
            },
        ];
        assert!(eval("@members == 3", &relation));
        assert!(eval("@members[ @role == 'outer' ] == 1", &relation));
        assert!(eval("@members[ @role == '' ] == 1", &relation));
        assert!(eval("@members[ @ref >= 11 ] == 2", &relation));
    }

    #[test]
    fn counts_are_zero_for_other_kinds() {
        let node = OsmObject::new(Kind::Node, 1);
        let relation = OsmObject::new(Kind::Relation, 1);
        assert!(eval("@nodes == 0", &node));
        assert!(eval("@nodes == 0", &relation));
        assert!(eval("@members == 0", &node));
        let way = OsmObject::new(Kind::Way, 1);
        assert!(eval("@members == 0", &way));
    }

    #[test]
    fn in_int_list_membership() {
        let node = OsmObject::new(Kind::Node, 71);
        assert!(eval("@id in (71, 28)", &node));
        assert!(!eval("@id not in (71, 28)", &node));
        assert!(eval("not @id in (8, 9)", &node));
        let other = OsmObject::new(Kind::Node, 30);
        assert!(!eval("@id in (71, 28)", &other));
        assert!(eval("@id not in (71, 28)", &other));
    }

    #[test]
    fn negative_ids_in_list_are_reinterpreted_as_unsigned() {
        let object = OsmObject::new(Kind::Node, -3);
        assert!(eval("@id in (-3)", &object));
        assert!(!eval("@id in (3)", &object));
    }

    #[test]
    fn short_circuit_in_source_order() {
        // The right operand dereferences a tag value as an integer; if the
        // left operand did not short-circuit, the result would differ.
        let object = tagged(Kind::Node, 1, &[("lanes", "2")]);
        assert!(!eval("false and 'lanes' == '3'", &object));
        assert!(eval("true or 'lanes' == '3'", &object));
        // Evaluation reaches the second operand when the first does not
        // decide the result.
        assert!(eval("true and 'lanes' == '2'", &object));
        assert!(eval("false or 'lanes' == '2'", &object));
    }

    #[test]
    fn not_negates_on_every_context() {
        let object = tagged(Kind::Node, 5, &[("name", "x")]);
        for expr in ["@id == 5", "'name'", "@visible", "node"] {
            let plain = eval(expr, &object);
            let negated = eval(&format!("not ({expr})"), &object);
            assert_eq!(plain, !negated, "{expr}");
        }
        // Inside sub-element contexts too.
        let mut way = OsmObject::new(Kind::Way, 1);
        way.nodes = vec![NodeRef { id: 1 }, NodeRef { id: 2 }];
        assert!(eval("@nodes[ not @ref == 1 ] == 1", &way));
    }

    #[test]
    fn leading_int_parse() {
        assert_eq!(leading_int("50 mph"), 50);
        assert_eq!(leading_int("  42"), 42);
        assert_eq!(leading_int("-7; 8"), -7);
        assert_eq!(leading_int("+3"), 3);
        assert_eq!(leading_int("abc"), 0);
        assert_eq!(leading_int(""), 0);
        assert_eq!(leading_int("12.5"), 12);
    }

    #[test]
    fn str_to_int_coercion_in_comparisons() {
        // A @tags[...] count compared against a string-typed side never
        // parses, but string attributes coerce when compared as integers
        // via the tag shortcut path, e.g. maxspeed as text.
        let object = tagged(Kind::Node, 1, &[("maxspeed", "50 mph")]);
        // No direct int comparison on tag values exists in the grammar;
        // exercise the coercion through eval_int directly.
        let expr = parse("@tags[ @value == '50 mph' ]").unwrap();
        assert_eq!(expr.eval_int(&Ctx::Object(&object)), 1);
    }

    #[test]
    fn bool_to_int_coercion() {
        let node = OsmObject::new(Kind::Node, 1);
        let t = parse("true").unwrap();
        let f = parse("false").unwrap();
        assert_eq!(t.eval_int(&Ctx::Object(&node)), 1);
        assert_eq!(f.eval_int(&Ctx::Object(&node)), 0);
    }

    #[test]
    fn realistic_area_filter() {
        let filter = "closed_way or (@relation and 'type' == 'multipolygon')";

        let mut ring = OsmObject::new(Kind::Way, 1);
        ring.nodes = vec![NodeRef { id: 1 }, NodeRef { id: 2 }, NodeRef { id: 1 }];
        assert!(eval(filter, &ring));

        let mut open = OsmObject::new(Kind::Way, 2);
        open.nodes = vec![NodeRef { id: 1 }, NodeRef { id: 2 }];
        assert!(!eval(filter, &open));

        let multipolygon = tagged(Kind::Relation, 3, &[("type", "multipolygon")]);
        assert!(eval(filter, &multipolygon));

        let route = tagged(Kind::Relation, 4, &[("type", "route")]);
        assert!(!eval(filter, &route));

        assert!(!eval(filter, &tagged(Kind::Node, 5, &[("type", "multipolygon")])));
    }

    #[test]
    fn empty_user_compares_as_empty_string() {
        let node = OsmObject::new(Kind::Node, 1);
        assert!(eval("@user == ''", &node));
        assert!(!eval("@user != ''", &node));
        assert!(eval("@user =^ ''", &node), "every string starts with the empty prefix");
    }

    #[test]
    fn evaluation_is_deterministic() {
        let object = tagged(Kind::Way, 9, &[("highway", "primary"), ("lanes", "2")]);
        let expr = parse("'highway' =~ 'prim' and @tags > 1").unwrap();
        let first = expr.eval_bool(&Ctx::Object(&object));
        for _ in 0..10 {
            assert_eq!(expr.eval_bool(&Ctx::Object(&object)), first);
        }
    }
}
