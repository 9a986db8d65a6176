//! Static analysis of which object kinds a filter can possibly match.
//!
//! Every node yields a pair `(sat, forced)`: the kinds for which the node
//! could evaluate to true, and the kinds for which its negation could. The
//! pair makes `not` a simple swap. The top-level `sat` is the entity mask
//! the driver uses to skip whole object kinds; it is an over-approximation,
//! never an under-approximation.

use crate::model::EntitySet;

use super::ast::{BoolAttr, Expr};

impl Expr {
    pub fn entities(&self) -> (EntitySet, EntitySet) {
        match self {
            Expr::And(children) => children.iter().fold(
                (EntitySet::ALL, EntitySet::ALL),
                |(sat, forced), child| {
                    let (child_sat, child_forced) = child.entities();
                    (sat & child_sat, forced & child_forced)
                },
            ),
            Expr::Or(children) => children.iter().fold(
                (EntitySet::NOTHING, EntitySet::NOTHING),
                |(sat, forced), child| {
                    let (child_sat, child_forced) = child.entities();
                    (sat | child_sat, forced | child_forced)
                },
            ),
            Expr::Not(child) => {
                let (sat, forced) = child.entities();
                (forced, sat)
            }
            Expr::BoolAttr(BoolAttr::Node) => (EntitySet::NODE, !EntitySet::NODE),
            Expr::BoolAttr(BoolAttr::Way) => (EntitySet::WAY, !EntitySet::WAY),
            Expr::BoolAttr(BoolAttr::Relation) => (EntitySet::RELATION, !EntitySet::RELATION),
            Expr::BoolAttr(BoolAttr::ClosedWay) | Expr::BoolAttr(BoolAttr::OpenWay) => {
                (EntitySet::WAY, !EntitySet::WAY)
            }
            Expr::CheckObjectType(kind) => {
                let sat = EntitySet::of(*kind);
                (sat, !sat)
            }
            // As a boolean, a count is `count > 0`, which only ways or
            // relations can satisfy. Note this does NOT propagate through
            // a surrounding comparison: `@nodes == 0` is true for nodes.
            Expr::CountNodes(_) => (EntitySet::WAY, !EntitySet::WAY),
            Expr::CountMembers(_) => (EntitySet::RELATION, !EntitySet::RELATION),
            // Everything else can be true or false for any kind.
            _ => (EntitySet::ALL, EntitySet::ALL),
        }
    }
}
