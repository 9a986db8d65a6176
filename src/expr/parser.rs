//! Recursive-descent parser for the filter expression language.
//!
//! Grammar (precedence low to high):
//!
//! expression  = term { "or" term }
//! term        = factor { "and" factor }
//! factor      = "not" factor | "(" expression ")" | primitive
//! primitive   = bool literal | object type | bool attr | tag condition
//!             | binary int comparison | binary string comparison
//!             | integer list membership
//!
//! Type and context checks happen here: every operator gets well-typed
//! children, and attributes are rejected outside the contexts that define
//! them, so evaluation can never fail.

use crate::idset::IdSet;
use crate::model::Kind;

use super::ast::{
    BoolAttr, CtxKind, Expr, IdListSource, IntAttr, IntOp, ListOp, RegexPattern, StrAttr, StrOp,
};
use super::error::FilterError;
use super::lexer::{tokenize, Token};

/// Parse a complete expression. Trailing input is an error.
pub fn parse(input: &str) -> Result<Expr, FilterError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expression(CtxKind::Object)?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parser state over the token stream.
struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map(|(t, _)| t).unwrap_or(&Token::Eof)
    }

    fn peek2(&self) -> &Token {
        self.tokens
            .get(self.pos + 1)
            .map(|(t, _)| t)
            .unwrap_or(&Token::Eof)
    }

    /// Byte offset of the current token.
    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(_, o)| *o).unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .unwrap_or(Token::Eof);
        self.pos += 1;
        token
    }

    fn error(&self, expected: &str) -> FilterError {
        FilterError::Parse {
            offset: self.offset(),
            expected: expected.to_string(),
        }
    }

    fn context_error(&self, offset: usize, message: String) -> FilterError {
        FilterError::Context { offset, message }
    }

    fn expect(&mut self, token: Token, expected: &str) -> Result<(), FilterError> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_eof(&self) -> Result<(), FilterError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(self.error("end of input")),
        }
    }

    /// expression = term { "or" term }
    fn expression(&mut self, ctx: CtxKind) -> Result<Expr, FilterError> {
        let first = self.term(ctx)?;
        if !matches!(self.peek(), Token::Ident(word) if word == "or") {
            return Ok(first);
        }
        let mut children = vec![first];
        while matches!(self.peek(), Token::Ident(word) if word == "or") {
            self.advance();
            children.push(self.term(ctx)?);
        }
        Ok(Expr::Or(children))
    }

    /// term = factor { "and" factor }
    fn term(&mut self, ctx: CtxKind) -> Result<Expr, FilterError> {
        let first = self.factor(ctx)?;
        if !matches!(self.peek(), Token::Ident(word) if word == "and") {
            return Ok(first);
        }
        let mut children = vec![first];
        while matches!(self.peek(), Token::Ident(word) if word == "and") {
            self.advance();
            children.push(self.factor(ctx)?);
        }
        Ok(Expr::And(children))
    }

    /// factor = "not" factor | "(" expression ")" | primitive
    fn factor(&mut self, ctx: CtxKind) -> Result<Expr, FilterError> {
        match self.peek() {
            Token::Ident(word) if word == "not" => {
                self.advance();
                Ok(Expr::Not(Box::new(self.factor(ctx)?)))
            }
            Token::LParen => {
                self.advance();
                let inner = self.expression(ctx)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            _ => self.primitive(ctx),
        }
    }

    fn primitive(&mut self, ctx: CtxKind) -> Result<Expr, FilterError> {
        match self.peek().clone() {
            Token::Ident(word) => match word.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::BoolValue(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::BoolValue(false))
                }
                "node" | "way" | "relation" => {
                    let offset = self.offset();
                    self.require_object_ctx(ctx, offset, "object type conditions")?;
                    self.advance();
                    Ok(Expr::CheckObjectType(kind_of(&word)))
                }
                "closed_way" | "open_way" => {
                    let offset = self.offset();
                    self.require_object_ctx(ctx, offset, "way attributes")?;
                    self.advance();
                    Ok(Expr::BoolAttr(if word == "closed_way" {
                        BoolAttr::ClosedWay
                    } else {
                        BoolAttr::OpenWay
                    }))
                }
                "and" | "or" | "not" | "in" => Err(self.error("an expression")),
                _ => self.tag_condition(word, ctx),
            },
            Token::Str(key) => self.tag_condition(key, ctx),
            Token::Int(_) => {
                let lhs = self.int_side(ctx)?;
                self.binary_int_tail(lhs, ctx)
            }
            Token::Attr(name) => self.attr_primitive(&name, ctx),
            _ => Err(self.error("an expression")),
        }
    }

    /// A string at primitive position: `key`, `key OP value`, or
    /// `key REGEX_OP pattern [i]`.
    fn tag_condition(&mut self, key: String, ctx: CtxKind) -> Result<Expr, FilterError> {
        let offset = self.offset();
        self.require_object_ctx(ctx, offset, "tag conditions")?;
        self.advance();
        match self.peek() {
            Token::EqEq | Token::NotEq | Token::PrefixEq | Token::PrefixNotEq => {
                let op = str_op_of(&self.advance());
                let value = self.string_value()?;
                Ok(Expr::CheckTagStr { key, op, value })
            }
            Token::Match | Token::NotMatch => {
                let op = str_op_of(&self.advance());
                let pattern = self.string_value()?;
                let case_insensitive = self.eat_regex_flag();
                Ok(Expr::CheckTagRegex {
                    key,
                    op,
                    pattern: RegexPattern::new(&pattern, case_insensitive)?,
                })
            }
            _ => Ok(Expr::HasKey(key)),
        }
    }

    fn attr_primitive(&mut self, name: &str, ctx: CtxKind) -> Result<Expr, FilterError> {
        let offset = self.offset();
        match name {
            "id" | "version" | "changeset" | "uid" | "ref" => {
                let attr = int_attr_of(name);
                self.check_int_attr_ctx(attr, ctx, offset)?;
                self.advance();
                let next_is_in = matches!(self.peek(), Token::Ident(w) if w == "in")
                    || (matches!(self.peek(), Token::Ident(w) if w == "not")
                        && matches!(self.peek2(), Token::Ident(w) if w == "in"));
                if next_is_in {
                    self.in_int_list(attr)
                } else {
                    self.binary_int_tail(Expr::IntAttr(attr), ctx)
                }
            }
            "user" | "key" | "value" | "role" => {
                let attr = str_attr_of(name);
                self.check_str_attr_ctx(attr, ctx, offset)?;
                self.advance();
                self.binary_str_tail(Expr::StrAttr(attr))
            }
            "node" | "way" | "relation" | "visible" | "closed_way" | "open_way" => {
                self.require_object_ctx(ctx, offset, "object attributes")?;
                self.advance();
                Ok(Expr::BoolAttr(bool_attr_of(name)))
            }
            "type" => {
                self.require_object_ctx(ctx, offset, "object type conditions")?;
                self.advance();
                self.expect(Token::EqEq, "'=='")?;
                match self.peek().clone() {
                    Token::Ident(word)
                        if matches!(word.as_str(), "node" | "way" | "relation") =>
                    {
                        self.advance();
                        Ok(Expr::CheckObjectType(kind_of(&word)))
                    }
                    _ => Err(self.error("an object type (node, way, or relation)")),
                }
            }
            "tags" | "nodes" | "members" => {
                self.require_object_ctx(ctx, offset, "count attributes")?;
                let count = self.count_expr(name)?;
                if is_int_op(self.peek()) {
                    self.binary_int_tail(count, ctx)
                } else {
                    Ok(count)
                }
            }
            _ => Err(self.context_error(offset, format!("unknown attribute '@{name}'"))),
        }
    }

    /// `@tags`, `@nodes` or `@members`, with an optional bracketed
    /// sub-expression over the respective sub-element context. Without
    /// brackets the sub-expression is constant true, so the count is the
    /// number of sub-elements.
    fn count_expr(&mut self, name: &str) -> Result<Expr, FilterError> {
        self.advance();
        let sub_ctx = match name {
            "tags" => CtxKind::Tag,
            "nodes" => CtxKind::NodeRef,
            _ => CtxKind::Member,
        };
        let sub = if *self.peek() == Token::LBracket {
            self.advance();
            let sub = self.expression(sub_ctx)?;
            self.expect(Token::RBracket, "']'")?;
            sub
        } else {
            Expr::BoolValue(true)
        };
        Ok(match name {
            "tags" => Expr::CountTags(Box::new(sub)),
            "nodes" => Expr::CountNodes(Box::new(sub)),
            _ => Expr::CountMembers(Box::new(sub)),
        })
    }

    /// The right half of an integer comparison.
    fn binary_int_tail(&mut self, lhs: Expr, ctx: CtxKind) -> Result<Expr, FilterError> {
        if !is_int_op(self.peek()) {
            return Err(self.error("an integer comparison operator"));
        }
        let op = int_op_of(&self.advance());
        let rhs = self.int_side(ctx)?;
        Ok(Expr::BinaryInt {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        })
    }

    /// One side of an integer comparison: literal, integer attribute, or
    /// a count over sub-elements.
    fn int_side(&mut self, ctx: CtxKind) -> Result<Expr, FilterError> {
        match self.peek().clone() {
            Token::Int(value) => {
                self.advance();
                Ok(Expr::IntValue(value))
            }
            Token::Attr(name) => {
                let offset = self.offset();
                match name.as_str() {
                    "id" | "version" | "changeset" | "uid" | "ref" => {
                        let attr = int_attr_of(&name);
                        self.check_int_attr_ctx(attr, ctx, offset)?;
                        self.advance();
                        Ok(Expr::IntAttr(attr))
                    }
                    "tags" | "nodes" | "members" => {
                        self.require_object_ctx(ctx, offset, "count attributes")?;
                        self.count_expr(&name)
                    }
                    _ => Err(self.error("an integer value or attribute")),
                }
            }
            _ => Err(self.error("an integer value or attribute")),
        }
    }

    /// The right half of a string comparison: a string value for the plain
    /// operators, a regex value (with optional `i` flag) for the regex ones.
    fn binary_str_tail(&mut self, lhs: Expr) -> Result<Expr, FilterError> {
        match self.peek() {
            Token::EqEq | Token::NotEq | Token::PrefixEq | Token::PrefixNotEq => {
                let op = str_op_of(&self.advance());
                let value = self.string_value()?;
                Ok(Expr::BinaryStr {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(Expr::StrValue(value)),
                })
            }
            Token::Match | Token::NotMatch => {
                let op = str_op_of(&self.advance());
                let pattern = self.string_value()?;
                let case_insensitive = self.eat_regex_flag();
                Ok(Expr::BinaryStr {
                    lhs: Box::new(lhs),
                    op,
                    rhs: Box::new(Expr::RegexValue(RegexPattern::new(
                        &pattern,
                        case_insensitive,
                    )?)),
                })
            }
            _ => Err(self.error("a string comparison operator")),
        }
    }

    /// `in (v, ...)`, `not in (v, ...)`, or `in (<'file')`.
    fn in_int_list(&mut self, attr: IntAttr) -> Result<Expr, FilterError> {
        let op = if matches!(self.peek(), Token::Ident(w) if w == "not") {
            self.advance();
            self.expect(Token::Ident("in".to_string()), "'in'")?;
            ListOp::NotIn
        } else {
            self.advance();
            ListOp::In
        };
        self.expect(Token::LParen, "'('")?;

        if *self.peek() == Token::Lt {
            self.advance();
            let path = self.string_value()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(Expr::InIntList {
                attr,
                op,
                source: IdListSource::File(path),
                set: IdSet::new(),
            });
        }

        let mut values = vec![self.integer_value()?];
        while *self.peek() == Token::Comma {
            self.advance();
            values.push(self.integer_value()?);
        }
        self.expect(Token::RParen, "')' or ','")?;
        let set: IdSet = values.iter().map(|v| *v as u64).collect();
        Ok(Expr::InIntList {
            attr,
            op,
            source: IdListSource::Values(values),
            set,
        })
    }

    fn integer_value(&mut self) -> Result<i64, FilterError> {
        match self.peek() {
            Token::Int(value) => {
                let value = *value;
                self.advance();
                Ok(value)
            }
            _ => Err(self.error("an integer value")),
        }
    }

    /// A string value: plain identifier or quoted string.
    fn string_value(&mut self) -> Result<String, FilterError> {
        match self.peek().clone() {
            Token::Ident(word) | Token::Str(word) => {
                self.advance();
                Ok(word)
            }
            _ => Err(self.error("a string value")),
        }
    }

    /// Optional `i` flag after a regex value.
    fn eat_regex_flag(&mut self) -> bool {
        if matches!(self.peek(), Token::Ident(word) if word == "i") {
            self.advance();
            true
        } else {
            false
        }
    }

    fn require_object_ctx(
        &self,
        ctx: CtxKind,
        offset: usize,
        what: &str,
    ) -> Result<(), FilterError> {
        if ctx == CtxKind::Object {
            Ok(())
        } else {
            Err(self.context_error(
                offset,
                format!("{what} are only allowed on objects, not {}", ctx.describe()),
            ))
        }
    }

    fn check_int_attr_ctx(
        &self,
        attr: IntAttr,
        ctx: CtxKind,
        offset: usize,
    ) -> Result<(), FilterError> {
        let ok = match attr {
            IntAttr::Ref => matches!(ctx, CtxKind::NodeRef | CtxKind::Member),
            _ => ctx == CtxKind::Object,
        };
        if ok {
            Ok(())
        } else {
            let allowed = match attr {
                IntAttr::Ref => "inside @nodes[...] or @members[...]",
                _ => "on objects",
            };
            Err(self.context_error(
                offset,
                format!(
                    "attribute '@{attr}' is only allowed {allowed}, not {}",
                    ctx.describe()
                ),
            ))
        }
    }

    fn check_str_attr_ctx(
        &self,
        attr: StrAttr,
        ctx: CtxKind,
        offset: usize,
    ) -> Result<(), FilterError> {
        let ok = match attr {
            StrAttr::User => ctx == CtxKind::Object,
            StrAttr::Key | StrAttr::Value => ctx == CtxKind::Tag,
            StrAttr::Role => ctx == CtxKind::Member,
        };
        if ok {
            Ok(())
        } else {
            let allowed = match attr {
                StrAttr::User => "on objects",
                StrAttr::Key | StrAttr::Value => "inside @tags[...]",
                StrAttr::Role => "inside @members[...]",
            };
            Err(self.context_error(
                offset,
                format!(
                    "attribute '@{attr}' is only allowed {allowed}, not {}",
                    ctx.describe()
                ),
            ))
        }
    }
}

fn kind_of(word: &str) -> Kind {
    match word {
        "node" => Kind::Node,
        "way" => Kind::Way,
        _ => Kind::Relation,
    }
}

fn int_attr_of(name: &str) -> IntAttr {
    match name {
        "id" => IntAttr::Id,
        "version" => IntAttr::Version,
        "changeset" => IntAttr::Changeset,
        "uid" => IntAttr::Uid,
        _ => IntAttr::Ref,
    }
}

fn str_attr_of(name: &str) -> StrAttr {
    match name {
        "user" => StrAttr::User,
        "key" => StrAttr::Key,
        "value" => StrAttr::Value,
        _ => StrAttr::Role,
    }
}

fn bool_attr_of(name: &str) -> BoolAttr {
    match name {
        "node" => BoolAttr::Node,
        "way" => BoolAttr::Way,
        "relation" => BoolAttr::Relation,
        "visible" => BoolAttr::Visible,
        "closed_way" => BoolAttr::ClosedWay,
        _ => BoolAttr::OpenWay,
    }
}

fn is_int_op(token: &Token) -> bool {
    matches!(
        token,
        Token::EqEq | Token::NotEq | Token::Lt | Token::LtEq | Token::Gt | Token::GtEq
    )
}

fn int_op_of(token: &Token) -> IntOp {
    match token {
        Token::EqEq => IntOp::Equal,
        Token::NotEq => IntOp::NotEqual,
        Token::Lt => IntOp::LessThan,
        Token::LtEq => IntOp::LessOrEqual,
        Token::Gt => IntOp::GreaterThan,
        _ => IntOp::GreaterOrEqual,
    }
}

fn str_op_of(token: &Token) -> StrOp {
    match token {
        Token::EqEq => StrOp::Equal,
        Token::NotEq => StrOp::NotEqual,
        Token::PrefixEq => StrOp::PrefixEqual,
        Token::PrefixNotEq => StrOp::PrefixNotEqual,
        Token::Match => StrOp::Match,
        _ => StrOp::NotMatch,
    }
}
