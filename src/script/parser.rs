//! Recursive descent parser for the shell's script language.

use std::sync::Arc;

use super::ast::{
    BinaryOp, Expr, ExprKind, FunctionBody, FunctionDef, LogicalOp, Program, Stmt, UnaryOp,
};
use super::lexer::{tokenize, Token, TokenKind, KEYWORDS};
use super::source::{SourceId, Span};
use crate::error::{EvalError, EvalResult};

/// Parse source text into a [`Program`] with a fresh [`SourceId`].
pub fn parse(input: &str) -> EvalResult<Program> {
    let tokens = tokenize(input)?;
    let source = SourceId::new();
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
        source,
        function_depth: 0,
    };
    let body = parser.parse_statements(false)?;
    Ok(Program { source, body })
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    source: SourceId,
    function_depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    /// End offset of the most recently consumed token.
    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].end
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(self.source, start, self.prev_end())
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.peek().is_punct(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> EvalResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", punct)))
        }
    }

    fn unexpected(&self, expected: &str) -> EvalError {
        let token = self.peek();
        EvalError::syntax(
            format!("expected {} but found {}", expected, token.describe()),
            token.start,
        )
    }

    fn expect_binding_name(&mut self) -> EvalResult<String> {
        match &self.peek().kind {
            TokenKind::Ident(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statements(&mut self, until_brace: bool) -> EvalResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            while self.eat_punct(";") {}
            let token = self.peek();
            if token.kind == TokenKind::Eof {
                if until_brace {
                    return Err(self.unexpected("'}'"));
                }
                return Ok(body);
            }
            if until_brace && token.is_punct("}") {
                self.advance();
                return Ok(body);
            }
            body.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> EvalResult<Stmt> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Ident(word) if matches!(word.as_str(), "var" | "let" | "const") => {
                self.advance();
                let name = self.expect_binding_name()?;
                let init = if self.eat_punct("=") {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                Ok(Stmt::Declare { name, init })
            }
            TokenKind::Ident(word)
                if word == "function" && matches!(self.peek_at(1).kind, TokenKind::Ident(_)) =>
            {
                let def = self.parse_function()?;
                Ok(Stmt::Function(def))
            }
            TokenKind::Ident(word) if word == "if" => {
                self.advance();
                self.expect_punct("(")?;
                let cond = self.parse_expr()?;
                self.expect_punct(")")?;
                let then = Box::new(self.parse_statement()?);
                let otherwise = if self.peek().is_word("else") {
                    self.advance();
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then,
                    otherwise,
                })
            }
            TokenKind::Ident(word) if word == "return" => {
                if self.function_depth == 0 {
                    return Err(EvalError::syntax("Illegal return statement", token.start));
                }
                self.advance();
                let next = self.peek();
                if next.kind == TokenKind::Eof || next.is_punct(";") || next.is_punct("}") {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.parse_expr()?)))
                }
            }
            TokenKind::Ident(word) if word == "class" => Err(EvalError::syntax(
                "class declarations are not supported",
                token.start,
            )),
            TokenKind::Punct("{") => {
                self.advance();
                Ok(Stmt::Block(self.parse_statements(true)?))
            }
            _ => Ok(Stmt::Expr(self.parse_expr()?)),
        }
    }

    fn parse_function(&mut self) -> EvalResult<Arc<FunctionDef>> {
        let start = self.advance().start; // `function`
        let name = if matches!(self.peek().kind, TokenKind::Ident(_)) {
            Some(self.expect_binding_name()?)
        } else {
            None
        };
        self.expect_punct("(")?;
        let params = self.parse_params()?;
        if !self.peek().is_punct("{") {
            return Err(self.unexpected("'{'"));
        }
        self.advance();
        self.function_depth += 1;
        let body = self.parse_statements(true);
        self.function_depth -= 1;
        let body = FunctionBody::Block(body?);
        Ok(self.finish_function(name, params, body, start))
    }

    /// Parameters after the opening parenthesis, through the closing one.
    fn parse_params(&mut self) -> EvalResult<Vec<String>> {
        let mut params = Vec::new();
        if self.eat_punct(")") {
            return Ok(params);
        }
        loop {
            params.push(self.expect_binding_name()?);
            if self.eat_punct(")") {
                return Ok(params);
            }
            self.expect_punct(",")?;
        }
    }

    fn finish_function(
        &self,
        name: Option<String>,
        params: Vec<String>,
        body: FunctionBody,
        start: usize,
    ) -> Arc<FunctionDef> {
        let span = self.span_from(start);
        Arc::new(FunctionDef {
            name,
            params,
            body,
            source_text: self.input[span.start..span.end].to_string(),
            span,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn parse_expr(&mut self) -> EvalResult<Expr> {
        self.parse_assignment()
    }

    fn arrow_ahead(&self) -> bool {
        let first = self.peek();
        if let TokenKind::Ident(name) = &first.kind {
            return !KEYWORDS.contains(&name.as_str()) && self.peek_at(1).is_punct("=>");
        }
        if !first.is_punct("(") {
            return false;
        }
        let mut depth = 0usize;
        let mut offset = 0;
        loop {
            let token = self.peek_at(offset);
            match token.kind {
                TokenKind::Eof => return false,
                TokenKind::Punct("(") => depth += 1,
                TokenKind::Punct(")") => {
                    depth -= 1;
                    if depth == 0 {
                        return self.peek_at(offset + 1).is_punct("=>");
                    }
                }
                _ => {}
            }
            offset += 1;
        }
    }

    fn parse_arrow(&mut self) -> EvalResult<Expr> {
        let start = self.peek().start;
        let params = if self.eat_punct("(") {
            self.parse_params()?
        } else {
            vec![self.expect_binding_name()?]
        };
        self.expect_punct("=>")?;
        self.function_depth += 1;
        let body = if self.eat_punct("{") {
            self.parse_statements(true).map(FunctionBody::Block)
        } else {
            self.parse_assignment().map(|e| FunctionBody::Expr(Box::new(e)))
        };
        self.function_depth -= 1;
        let def = self.finish_function(None, params, body?, start);
        Ok(Expr {
            span: def.span,
            kind: ExprKind::Function(def),
        })
    }

    fn parse_assignment(&mut self) -> EvalResult<Expr> {
        if self.arrow_ahead() {
            return self.parse_arrow();
        }
        let target = self.parse_conditional()?;
        if !self.peek().is_punct("=") {
            return Ok(target);
        }
        if !matches!(
            target.kind,
            ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            return Err(EvalError::syntax(
                "invalid assignment target",
                target.span.start,
            ));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr {
            span: target.span.to(value.span),
            kind: ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
        })
    }

    fn parse_conditional(&mut self) -> EvalResult<Expr> {
        let cond = self.parse_logical(LogicalOp::Or)?;
        if !self.eat_punct("?") {
            return Ok(cond);
        }
        let then = self.parse_assignment()?;
        self.expect_punct(":")?;
        let otherwise = self.parse_assignment()?;
        Ok(Expr {
            span: cond.span.to(otherwise.span),
            kind: ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        })
    }

    fn parse_logical(&mut self, op: LogicalOp) -> EvalResult<Expr> {
        let (punct, next) = match op {
            LogicalOp::Or => ("||", Some(LogicalOp::And)),
            LogicalOp::And => ("&&", None),
        };
        let operand = |p: &mut Self| match next {
            Some(inner) => p.parse_logical(inner),
            None => p.parse_binary(0),
        };
        let mut left = operand(self)?;
        while self.eat_punct(punct) {
            let right = operand(self)?;
            left = Expr {
                span: left.span.to(right.span),
                kind: ExprKind::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    /// Binary operators by precedence level, loosest first.
    fn binary_op(&self, level: usize) -> Option<BinaryOp> {
        const LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[
                ("===", BinaryOp::Eq),
                ("==", BinaryOp::Eq),
                ("!==", BinaryOp::Ne),
                ("!=", BinaryOp::Ne),
            ],
            &[
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::Le),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::Ge),
            ],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
        ];
        let token = self.peek();
        LEVELS[level]
            .iter()
            .find(|(punct, _)| token.is_punct(punct))
            .map(|(_, op)| *op)
    }

    fn parse_binary(&mut self, level: usize) -> EvalResult<Expr> {
        const DEPTH: usize = 4;
        if level == DEPTH {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        while let Some(op) = self.binary_op(level) {
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = Expr {
                span: left.span.to(right.span),
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> EvalResult<Expr> {
        let token = self.peek().clone();
        let kind = if token.is_punct("!") {
            self.advance();
            let operand = self.parse_unary()?;
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            }
        } else if token.is_punct("-") {
            self.advance();
            let operand = self.parse_unary()?;
            ExprKind::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            }
        } else if token.is_punct("+") {
            self.advance();
            return self.parse_unary();
        } else if token.is_word("await") {
            self.advance();
            ExprKind::Await(Box::new(self.parse_unary()?))
        } else {
            return self.parse_postfix();
        };
        Ok(Expr {
            kind,
            span: self.span_from(token.start),
        })
    }

    fn parse_postfix(&mut self) -> EvalResult<Expr> {
        let mut expr = self.parse_primary()?;
        let start = expr.span.start;
        loop {
            let kind = if self.eat_punct(".") {
                let property = match &self.peek().kind {
                    TokenKind::Ident(name) => name.clone(),
                    _ => return Err(self.unexpected("property name")),
                };
                self.advance();
                ExprKind::Member {
                    object: Box::new(expr),
                    property,
                }
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                ExprKind::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                }
            } else if self.eat_punct("(") {
                let args = self.parse_list(")")?;
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                }
            } else {
                return Ok(expr);
            };
            expr = Expr {
                kind,
                span: self.span_from(start),
            };
        }
    }

    /// Comma separated expressions through the closing punctuator.
    fn parse_list(&mut self, close: &str) -> EvalResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct(close) {
                return Ok(items);
            }
            items.push(self.parse_expr()?);
            if !self.eat_punct(",") {
                self.expect_punct(close)?;
                return Ok(items);
            }
        }
    }

    fn parse_primary(&mut self) -> EvalResult<Expr> {
        let token = self.peek().clone();
        let kind = match &token.kind {
            TokenKind::Number(n) => {
                self.advance();
                ExprKind::Number(*n)
            }
            TokenKind::Str(s) => {
                self.advance();
                ExprKind::Str(s.clone())
            }
            TokenKind::Ident(word) => match word.as_str() {
                "true" | "false" => {
                    self.advance();
                    ExprKind::Bool(word == "true")
                }
                "null" => {
                    self.advance();
                    ExprKind::Null
                }
                "undefined" => {
                    self.advance();
                    ExprKind::Undefined
                }
                "function" => {
                    let def = self.parse_function()?;
                    return Ok(Expr {
                        span: def.span,
                        kind: ExprKind::Function(def),
                    });
                }
                _ => ExprKind::Ident(self.expect_binding_name()?),
            },
            TokenKind::Punct("(") => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_punct(")")?;
                return Ok(inner);
            }
            TokenKind::Punct("[") => {
                self.advance();
                ExprKind::Array(self.parse_list("]")?)
            }
            TokenKind::Punct("{") => {
                self.advance();
                ExprKind::Object(self.parse_properties()?)
            }
            _ => return Err(self.unexpected("expression")),
        };
        Ok(Expr {
            kind,
            span: self.span_from(token.start),
        })
    }

    fn parse_properties(&mut self) -> EvalResult<Vec<(String, Expr)>> {
        let mut props = Vec::new();
        loop {
            if self.eat_punct("}") {
                return Ok(props);
            }
            let key_token = self.advance();
            let key = match &key_token.kind {
                TokenKind::Ident(name) => name.clone(),
                TokenKind::Str(s) => s.clone(),
                TokenKind::Number(n) => super::value::format_number(*n),
                _ => {
                    return Err(EvalError::syntax(
                        format!("expected property name but found {}", key_token.describe()),
                        key_token.start,
                    ))
                }
            };
            let value = if self.eat_punct(":") {
                self.parse_expr()?
            } else if matches!(key_token.kind, TokenKind::Ident(_)) {
                // `{ a }` shorthand
                Expr {
                    kind: ExprKind::Ident(key.clone()),
                    span: Span::new(self.source, key_token.start, key_token.end),
                }
            } else {
                return Err(self.unexpected("':'"));
            };
            props.push((key, value));
            if !self.eat_punct(",") {
                self.expect_punct("}")?;
                return Ok(props);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_expr(input: &str) -> Expr {
        let mut program = parse(input).unwrap();
        assert_eq!(program.body.len(), 1, "expected one statement");
        match program.body.remove(0) {
            Stmt::Expr(e) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn test_call_span_covers_chain() {
        let expr = single_expr("  db.test.find({ a: 1 })");
        assert!(matches!(expr.kind, ExprKind::Call { .. }));
        assert_eq!((expr.span.start, expr.span.end), (2, 24));
    }

    #[test]
    fn test_member_precedence_over_await() {
        let expr = single_expr("await db.test.find()");
        match expr.kind {
            ExprKind::Await(inner) => assert!(matches!(inner.kind, ExprKind::Call { .. })),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_binary_precedence() {
        let expr = single_expr("1 + 2 * 3");
        match expr.kind {
            ExprKind::Binary { op, right, .. } => {
                assert_eq!(op, BinaryOp::Add);
                assert!(matches!(
                    right.kind,
                    ExprKind::Binary {
                        op: BinaryOp::Mul,
                        ..
                    }
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_function_source_text() {
        let program = parse("function add(a, b) { return a + b }").unwrap();
        match &program.body[0] {
            Stmt::Function(def) => {
                assert_eq!(def.name.as_deref(), Some("add"));
                assert_eq!(def.params, vec!["a", "b"]);
                assert_eq!(def.source_text, "function add(a, b) { return a + b }");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_arrow_functions() {
        let expr = single_expr("(a, b) => a * b");
        match expr.kind {
            ExprKind::Function(def) => {
                assert_eq!(def.params.len(), 2);
                assert_eq!(def.source_text, "(a, b) => a * b");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            single_expr("x => x").kind,
            ExprKind::Function(_)
        ));
    }

    #[test]
    fn test_assignment_targets() {
        assert!(matches!(
            single_expr("a.b[0] = 1").kind,
            ExprKind::Assign { .. }
        ));
        assert!(parse("f() = 1").is_err());
    }

    #[test]
    fn test_object_literal_keys() {
        let expr = single_expr("x = { a: 1, 'b c': 2, $set: { d }, }");
        match expr.kind {
            ExprKind::Assign { value, .. } => match value.kind {
                ExprKind::Object(props) => {
                    let keys: Vec<_> = props.iter().map(|(k, _)| k.as_str()).collect();
                    assert_eq!(keys, vec!["a", "b c", "$set"]);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_statements_without_semicolons() {
        let program = parse("var a = 1\na = a + 1\nprint(a)").unwrap();
        assert_eq!(program.body.len(), 3);
        assert!(matches!(program.body[0], Stmt::Declare { .. }));
    }

    #[test]
    fn test_if_else() {
        let program = parse("if (a) { b } else c").unwrap();
        assert!(matches!(
            program.body[0],
            Stmt::If {
                otherwise: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_top_level_return_rejected() {
        assert!(parse("return 1").is_err());
        assert!(parse("function f() { return 1 }").is_ok());
    }

    #[test]
    fn test_unbalanced_input() {
        assert!(parse("db.test.find(").is_err());
        assert!(parse("{ a").is_err());
    }

    #[test]
    fn test_each_parse_has_new_source() {
        let a = parse("1").unwrap();
        let b = parse("1").unwrap();
        assert_ne!(a.source, b.source);
    }
}
