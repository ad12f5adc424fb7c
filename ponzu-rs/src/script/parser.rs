//! Recursive-descent parser.
//!
//! Operator precedence (lowest → highest):
//!   comma  →  assignment / arrow  →  conditional  →  `||` `??`  →  `&&`  →
//!   `|`  →  `^`  →  `&`  →  equality  →  relational  →  shift  →
//!   additive  →  multiplicative  →  `**`  →  unary  →  postfix  →
//!   call / member  →  primary
//!
//! Statements end at `;`, at a line break, before `}` or at end of input.

use std::rc::Rc;

use super::ast::*;
use super::error::ParseError;
use super::lexer::{tokenize, Spanned, Token};
use super::stack::ensure_sufficient_stack;
use super::value::JsRegex;

/// Words that can never be used as a plain identifier.
const RESERVED: &[&str] = &[
    "if", "else", "return", "let", "const", "var", "function", "new", "typeof", "void", "delete",
    "in", "instanceof", "this", "true", "false", "null",
];

/// Deepest nesting of expressions, blocks and templates a script may use.
pub(super) const MAX_NESTING: usize = 1000;

/// Parse a whole script into its statement list.
pub fn parse(src: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.parse_statement()?);
    }
    Ok(body)
}

/// Parse a single expression (used for condition strings).
pub fn parse_expression(src: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(tokenize(src)?);
    let expr = parser.parse_expression()?;
    parser.eat_punct(";");
    if !parser.at_eof() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // ── Nesting ───────────────────────────────────────────────────────────────

    fn too_deep(&self) -> ParseError {
        self.error_here("Expression nested too deeply")
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.too_deep());
        }
        self.depth += 1;
        let out = ensure_sufficient_stack(|| f(self));
        self.depth -= 1;
        out
    }

    /// Count one more link of a left-nested chain (`a.b.c`, `1 + 2 + 3`).
    /// The caller gives the links back with [`unwind`](Self::unwind).
    fn deepen(&mut self, links: &mut usize) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.too_deep());
        }
        self.depth += 1;
        *links += 1;
        Ok(())
    }

    fn unwind(&mut self, links: usize) {
        self.depth -= links;
    }

    // ── Token helpers ─────────────────────────────────────────────────────────

    fn peek(&self) -> &Spanned {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Spanned {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn advance(&mut self) -> Spanned {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().token == Token::Eof
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.peek().token, Token::Punct(q) if *q == p)
    }

    fn is_punct_at(&self, offset: usize, p: &str) -> bool {
        matches!(&self.peek_at(offset).token, Token::Punct(q) if *q == p)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.peek().token, Token::Ident(w) if w == word)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), ParseError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        let tok = self.peek();
        ParseError::new(message, tok.line, tok.column)
    }

    fn unexpected(&self) -> ParseError {
        self.error_here("Unexpected token")
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match &self.peek().token {
            Token::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// `;`, or an implied one before a line break, `}` or end of input.
    fn consume_semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat_punct(";") || self.is_punct("}") || self.at_eof() || self.peek().newline_before
        {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        self.nested(Self::statement)
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.eat_punct(";") {
            return Ok(Stmt::Empty);
        }
        if self.is_punct("{") {
            return Ok(Stmt::Block(self.parse_block()?));
        }
        let keyword = match &self.peek().token {
            Token::Ident(word) => Some(word.clone()),
            _ => None,
        };
        if let Some(word) = keyword {
            match word.as_str() {
                "let" | "var" | "const" => return self.parse_var_decl(),
                "if" => return self.parse_if(),
                "return" => return self.parse_return(),
                "function" => return self.parse_function_decl(),
                "async" if matches!(&self.peek_at(1).token, Token::Ident(w) if w == "function") => {
                    self.pos += 1;
                    return self.parse_function_decl();
                }
                _ => {}
            }
        }
        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.eat_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.parse_statement()?);
        }
        Ok(body)
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, ParseError> {
        let kind = match &self.advance().token {
            Token::Ident(w) if w == "const" => DeclKind::Const,
            Token::Ident(w) if w == "var" => DeclKind::Var,
            _ => DeclKind::Let,
        };
        let mut declarators = Vec::new();
        loop {
            let target = if self.is_punct("[") {
                Pattern::Array(self.parse_array_pattern()?)
            } else {
                Pattern::Ident(self.expect_ident()?)
            };
            let init = if self.eat_punct("=") {
                Some(self.parse_assignment()?)
            } else if kind == DeclKind::Const {
                return Err(self.error_here("Missing initializer in const declaration"));
            } else if matches!(target, Pattern::Array(_)) {
                return Err(self.error_here("Missing initializer in destructuring declaration"));
            } else {
                None
            };
            declarators.push(Declarator { target, init });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.consume_semicolon()?;
        Ok(Stmt::VarDecl { kind, declarators })
    }

    /// `[a, , ...rest]` in binding position.
    fn parse_array_pattern(&mut self) -> Result<Vec<Option<PatternElem>>, ParseError> {
        self.expect_punct("[")?;
        let mut elems = Vec::new();
        loop {
            if self.eat_punct("]") {
                break;
            }
            if self.eat_punct(",") {
                elems.push(None);
                continue;
            }
            if self.eat_punct("...") {
                elems.push(Some(PatternElem::Rest(self.expect_ident()?)));
                self.expect_punct("]")?;
                break;
            }
            elems.push(Some(PatternElem::Ident(self.expect_ident()?)));
            if !self.eat_punct(",") {
                self.expect_punct("]")?;
                break;
            }
        }
        Ok(elems)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        self.expect_punct("(")?;
        let test = self.parse_expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.is_keyword("else") {
            self.pos += 1;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        if self.eat_punct(";") {
            return Ok(Stmt::Return(None));
        }
        if self.is_punct("}") || self.at_eof() || self.peek().newline_before {
            return Ok(Stmt::Return(None));
        }
        let arg = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Stmt::Return(Some(arg)))
    }

    fn parse_function_decl(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        let name = self.expect_ident()?;
        let def = self.parse_function_rest(Some(name))?;
        Ok(Stmt::Function(Rc::new(def)))
    }

    /// Parameter list and block body of a `function`.
    fn parse_function_rest(&mut self, name: Option<String>) -> Result<FunctionDef, ParseError> {
        let params = self.parse_params()?;
        let body = FunctionBody::Block(self.parse_block()?);
        Ok(FunctionDef {
            name,
            params,
            body,
            is_arrow: false,
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.eat_punct(")") {
            let rest = self.eat_punct("...");
            let name = self.expect_ident()?;
            let default = if !rest && self.eat_punct("=") {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param {
                name,
                default,
                rest,
            });
            if rest {
                self.expect_punct(")")?;
                break;
            }
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(params)
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            items.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(items))
    }

    /// Whether an arrow function starts at the current token.
    fn at_arrow(&self) -> bool {
        match &self.peek().token {
            Token::Ident(name) if !RESERVED.contains(&name.as_str()) => {
                self.is_punct_at(1, "=>")
            }
            Token::Punct("(") => {
                let mut depth = 0usize;
                let mut offset = 0;
                loop {
                    match &self.peek_at(offset).token {
                        Token::Punct("(") => depth += 1,
                        Token::Punct(")") => {
                            depth -= 1;
                            if depth == 0 {
                                return self.is_punct_at(offset + 1, "=>");
                            }
                        }
                        Token::Eof => return false,
                        _ => {}
                    }
                    offset += 1;
                }
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Expr, ParseError> {
        let params = if self.is_punct("(") {
            self.parse_params()?
        } else {
            vec![Param {
                name: self.expect_ident()?,
                default: None,
                rest: false,
            }]
        };
        self.expect_punct("=>")?;
        let body = if self.is_punct("{") {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
            is_arrow: true,
        })))
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        if self.is_keyword("async") && !self.peek_at(1).newline_before {
            let next_is_arrow = {
                self.pos += 1;
                let ok = self.at_arrow();
                self.pos -= 1;
                ok
            };
            if next_is_arrow {
                self.pos += 1;
            }
        }
        if self.at_arrow() {
            return self.parse_arrow();
        }

        let start = self.pos;
        let left = self.parse_conditional()?;
        let op = match &self.peek().token {
            Token::Punct(p) => AssignOp::from_punct(p),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(left);
        };
        let op_tok = self.advance();
        let Some(target) = to_target(left) else {
            let tok = &self.tokens[start];
            return Err(ParseError::new(
                "Invalid left-hand side in assignment",
                tok.line,
                tok.column,
            ));
        };
        if matches!(target, AssignTarget::Pattern(_)) && op != AssignOp::Assign {
            return Err(ParseError::new(
                "Invalid left-hand side in assignment",
                op_tok.line,
                op_tok.column,
            ));
        }
        let value = Box::new(self.parse_assignment()?);
        Ok(Expr::Assign { op, target, value })
    }

    fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let test = self.parse_binary(1)?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// The binary operator at the current token, with its precedence.
    fn binary_operator(&self) -> Option<(BinOrLogical, u8)> {
        let p = match &self.peek().token {
            Token::Punct(p) => *p,
            Token::Ident(w) if w == "in" => "in",
            Token::Ident(w) if w == "instanceof" => "instanceof",
            _ => return None,
        };
        let entry = match p {
            "||" => (BinOrLogical::Logical(LogicalOp::Or), 1),
            "??" => (BinOrLogical::Logical(LogicalOp::Nullish), 1),
            "&&" => (BinOrLogical::Logical(LogicalOp::And), 2),
            _ => {
                let op = BinaryOp::from_punct(p)?;
                let prec = match op {
                    BinaryOp::BitOr => 3,
                    BinaryOp::BitXor => 4,
                    BinaryOp::BitAnd => 5,
                    BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::StrictEq | BinaryOp::StrictNotEq => 6,
                    BinaryOp::Lt
                    | BinaryOp::Le
                    | BinaryOp::Gt
                    | BinaryOp::Ge
                    | BinaryOp::In
                    | BinaryOp::Instanceof => 7,
                    BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => 8,
                    BinaryOp::Add | BinaryOp::Sub => 9,
                    BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 10,
                    BinaryOp::Pow => 11,
                };
                (BinOrLogical::Binary(op), prec)
            }
        };
        Some(entry)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        let mut links = 0;
        while let Some((op, prec)) = self.binary_operator() {
            if prec < min_prec {
                break;
            }
            self.deepen(&mut links)?;
            self.pos += 1;
            // `**` is right-associative
            let next_min = if op == BinOrLogical::Binary(BinaryOp::Pow) {
                prec
            } else {
                prec + 1
            };
            let right = Box::new(self.nested(|p| p.parse_binary(next_min))?);
            let lhs = Box::new(left);
            left = match op {
                BinOrLogical::Binary(op) => Expr::Binary {
                    op,
                    left: lhs,
                    right,
                },
                BinOrLogical::Logical(op) => Expr::Logical {
                    op,
                    left: lhs,
                    right,
                },
            };
        }
        self.unwind(links);
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match &self.peek().token {
            Token::Punct("!") => Some(UnaryOp::Not),
            Token::Punct("-") => Some(UnaryOp::Minus),
            Token::Punct("+") => Some(UnaryOp::Plus),
            Token::Punct("~") => Some(UnaryOp::BitNot),
            Token::Ident(w) if w == "typeof" => Some(UnaryOp::Typeof),
            Token::Ident(w) if w == "void" => Some(UnaryOp::Void),
            Token::Ident(w) if w == "delete" => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let arg = Box::new(self.nested(Self::parse_unary)?);
            return Ok(Expr::Unary { op, arg });
        }
        if self.is_keyword("await") {
            self.pos += 1;
            return Ok(Expr::Await(Box::new(self.nested(Self::parse_unary)?)));
        }
        if self.is_punct("++") || self.is_punct("--") {
            let increment = self.is_punct("++");
            self.pos += 1;
            let target = self.parse_update_target()?;
            return Ok(Expr::Update {
                increment,
                prefix: true,
                target,
            });
        }
        self.parse_postfix()
    }

    fn parse_update_target(&mut self) -> Result<AssignTarget, ParseError> {
        let (line, column) = (self.peek().line, self.peek().column);
        match to_target(self.nested(Self::parse_unary)?) {
            Some(t @ (AssignTarget::Ident(_) | AssignTarget::Member { .. })) => Ok(t),
            _ => Err(ParseError::new(
                "Invalid left-hand side expression in prefix operation",
                line,
                column,
            )),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let (line, column) = (self.peek().line, self.peek().column);
        let expr = self.parse_call_member()?;
        if (self.is_punct("++") || self.is_punct("--")) && !self.peek().newline_before {
            let increment = self.is_punct("++");
            self.pos += 1;
            return match to_target(expr) {
                Some(target @ (AssignTarget::Ident(_) | AssignTarget::Member { .. })) => {
                    Ok(Expr::Update {
                        increment,
                        prefix: false,
                        target,
                    })
                }
                _ => Err(ParseError::new(
                    "Invalid left-hand side expression in postfix operation",
                    line,
                    column,
                )),
            };
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        self.expect_punct("(")?;
        let mut args = Vec::new();
        while !self.eat_punct(")") {
            if self.eat_punct("...") {
                args.push(Argument::Spread(self.parse_assignment()?));
            } else {
                args.push(Argument::Expr(self.parse_assignment()?));
            }
            if !self.eat_punct(",") {
                self.expect_punct(")")?;
                break;
            }
        }
        Ok(args)
    }

    /// Property name after `.` or `?.`; keywords are allowed here.
    fn parse_property_name(&mut self) -> Result<String, ParseError> {
        match &self.peek().token {
            Token::Ident(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        self.pos += 1;
        let mut callee = if self.is_keyword("new") {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };
        let mut links = 0;
        loop {
            self.deepen(&mut links)?;
            if self.eat_punct(".") {
                let name = self.parse_property_name()?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberProp::Name(name),
                    optional: false,
                };
            } else if self.eat_punct("[") {
                let prop = self.parse_expression()?;
                self.expect_punct("]")?;
                callee = Expr::Member {
                    object: Box::new(callee),
                    property: MemberProp::Computed(Box::new(prop)),
                    optional: false,
                };
            } else {
                break;
            }
        }
        self.unwind(links);
        let args = if self.is_punct("(") {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::New {
            callee: Box::new(callee),
            args,
        })
    }

    fn parse_call_member(&mut self) -> Result<Expr, ParseError> {
        let mut expr = if self.is_keyword("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        let mut chained = false;
        let mut links = 0;
        loop {
            self.deepen(&mut links)?;
            if self.eat_punct(".") {
                let name = self.parse_property_name()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Name(name),
                    optional: false,
                };
            } else if self.eat_punct("?.") {
                chained = true;
                expr = if self.is_punct("(") {
                    Expr::Call {
                        callee: Box::new(expr),
                        args: self.parse_arguments()?,
                        optional: true,
                    }
                } else if self.eat_punct("[") {
                    let prop = self.parse_expression()?;
                    self.expect_punct("]")?;
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Computed(Box::new(prop)),
                        optional: true,
                    }
                } else {
                    Expr::Member {
                        object: Box::new(expr),
                        property: MemberProp::Name(self.parse_property_name()?),
                        optional: true,
                    }
                };
            } else if self.eat_punct("[") {
                let prop = self.parse_expression()?;
                self.expect_punct("]")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property: MemberProp::Computed(Box::new(prop)),
                    optional: false,
                };
            } else if self.is_punct("(") {
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args: self.parse_arguments()?,
                    optional: false,
                };
            } else if matches!(self.peek().token, Token::Template { .. }) {
                let Token::Template { quasis, exprs } = self.advance().token else {
                    return Err(self.unexpected());
                };
                expr = Expr::TaggedTemplate {
                    tag: Box::new(expr),
                    quasis,
                    exprs: self.parse_interpolations(exprs)?,
                };
            } else {
                break;
            }
        }
        self.unwind(links);
        Ok(if chained {
            Expr::Chain(Box::new(expr))
        } else {
            expr
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.token {
            Token::Num(n) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::Num(n)))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::Str(s)))
            }
            Token::Template { quasis, exprs } => {
                self.pos += 1;
                Ok(Expr::Template {
                    quasis,
                    exprs: self.parse_interpolations(exprs)?,
                })
            }
            Token::Regex { pattern, flags } => {
                if let Err(e) = JsRegex::new(&pattern, &flags) {
                    return Err(ParseError::new(
                        format!("Invalid regular expression: /{pattern}/: {e}"),
                        tok.line,
                        tok.column,
                    ));
                }
                self.pos += 1;
                Ok(Expr::Regex { pattern, flags })
            }
            Token::Punct("(") => {
                self.pos += 1;
                let expr = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Token::Punct("[") => self.parse_array_literal(),
            Token::Punct("{") => self.parse_object_literal(),
            Token::Ident(word) => {
                let lit = match word.as_str() {
                    "true" => Some(Expr::Literal(Literal::Bool(true))),
                    "false" => Some(Expr::Literal(Literal::Bool(false))),
                    "null" => Some(Expr::Literal(Literal::Null)),
                    "undefined" => Some(Expr::Literal(Literal::Undefined)),
                    "NaN" => Some(Expr::Literal(Literal::Num(f64::NAN))),
                    "Infinity" => Some(Expr::Literal(Literal::Num(f64::INFINITY))),
                    "this" => Some(Expr::This),
                    _ => None,
                };
                if let Some(lit) = lit {
                    self.pos += 1;
                    return Ok(lit);
                }
                if word == "function" || (word == "async" && self.is_function_at(1)) {
                    if word == "async" {
                        self.pos += 1;
                    }
                    self.pos += 1;
                    let name = match &self.peek().token {
                        Token::Ident(_) => Some(self.expect_ident()?),
                        _ => None,
                    };
                    let def = self.parse_function_rest(name)?;
                    return Ok(Expr::Function(Rc::new(def)));
                }
                Ok(Expr::Ident(self.expect_ident()?))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn is_function_at(&self, offset: usize) -> bool {
        matches!(&self.peek_at(offset).token, Token::Ident(w) if w == "function")
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect_punct("[")?;
        let mut items = Vec::new();
        loop {
            if self.eat_punct("]") {
                break;
            }
            if self.eat_punct(",") {
                items.push(ArrayItem::Hole);
                continue;
            }
            if self.eat_punct("...") {
                items.push(ArrayItem::Spread(self.parse_assignment()?));
            } else {
                items.push(ArrayItem::Expr(self.parse_assignment()?));
            }
            if !self.eat_punct(",") {
                self.expect_punct("]")?;
                break;
            }
        }
        Ok(Expr::Array(items))
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        self.expect_punct("{")?;
        let mut props = Vec::new();
        loop {
            if self.eat_punct("}") {
                break;
            }
            if self.eat_punct("...") {
                props.push(Property::Spread(self.parse_assignment()?));
            } else {
                let tok = self.advance();
                let key = match tok.token {
                    Token::Ident(name) => PropKey::Static(name),
                    Token::Str(s) => PropKey::Static(s),
                    Token::Num(n) => PropKey::Static(super::value::format_number(n)),
                    Token::Punct("[") => {
                        let key = self.parse_assignment()?;
                        self.expect_punct("]")?;
                        PropKey::Computed(key)
                    }
                    _ => return Err(ParseError::new("Unexpected token", tok.line, tok.column)),
                };
                let value = if self.eat_punct(":") {
                    self.parse_assignment()?
                } else if self.is_punct("(") {
                    let name = match &key {
                        PropKey::Static(name) => Some(name.clone()),
                        PropKey::Computed(_) => None,
                    };
                    Expr::Function(Rc::new(self.parse_function_rest(name)?))
                } else {
                    match &key {
                        PropKey::Static(name) if !RESERVED.contains(&name.as_str()) => {
                            Expr::Ident(name.clone())
                        }
                        _ => return Err(self.unexpected()),
                    }
                };
                props.push(Property::KeyValue { key, value });
            }
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Expr::Object(props))
    }

    /// Parse the token list of every `${…}` in a template, at the current
    /// nesting depth.
    fn parse_interpolations(&mut self, lists: Vec<Vec<Spanned>>) -> Result<Vec<Expr>, ParseError> {
        lists
            .into_iter()
            .map(|tokens| {
                let mut parser = Parser::new(tokens);
                parser.depth = self.depth;
                let expr = parser.nested(Self::parse_expression)?;
                if !parser.at_eof() {
                    return Err(parser.unexpected());
                }
                Ok(expr)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOrLogical {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Reinterpret an already-parsed expression as an assignment target.
fn to_target(expr: Expr) -> Option<AssignTarget> {
    match expr {
        Expr::Ident(name) => Some(AssignTarget::Ident(name)),
        Expr::Member {
            object,
            property,
            optional: false,
        } => Some(AssignTarget::Member { object, property }),
        Expr::Array(items) => {
            let last = items.len().saturating_sub(1);
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    ArrayItem::Hole => Some(None),
                    ArrayItem::Expr(Expr::Ident(name)) => Some(Some(PatternElem::Ident(name))),
                    ArrayItem::Spread(Expr::Ident(name)) if i == last => {
                        Some(Some(PatternElem::Rest(name)))
                    }
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(AssignTarget::Pattern)
        }
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
