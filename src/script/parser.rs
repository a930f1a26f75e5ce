//! Recursive-descent parser for the challenge language
//!
//! Covers the grammar the bundled challenges and their usual beginner
//! solutions need. Anything else is a syntax error with a line number.

use std::rc::Rc;

use super::ast::{BinOp, CmpOp, Expr, FunctionDef, Stmt, StmtKind, Target, UnaryOp};
use super::lexer::{Tok, Token, tokenize};
use crate::error::{ScriptError, ScriptResult};

/// Deepest nesting of blocks and subexpressions a submission may use
const MAX_NESTING: usize = 48;

/// Parse a whole module
pub fn parse(source: &str) -> ScriptResult<Vec<Stmt>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Run a recursive production one level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("too many nested blocks or expressions"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> ScriptResult<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn expect_name(&mut self, what: &str) -> ScriptResult<String> {
        match self.peek().clone() {
            Tok::Name(name) => {
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ScriptError {
        let mut message = message.into();
        match self.peek() {
            Tok::Eof => message.push_str(" at end of input"),
            Tok::Newline => message.push_str(" at end of line"),
            Tok::Indent => message = format!("unexpected indent ({message})"),
            other => message.push_str(&format!(", found {}", describe(other))),
        }
        ScriptError::syntax(self.line(), message)
    }

    fn module(&mut self) -> ScriptResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                Tok::Eof => break,
                Tok::Newline => {
                    self.pos += 1;
                }
                Tok::Indent => return Err(self.error("unexpected indent")),
                _ => stmts.extend(self.statement()?),
            }
        }
        Ok(stmts)
    }

    /// One logical statement. Simple statements joined by `;` come back together.
    fn statement(&mut self) -> ScriptResult<Vec<Stmt>> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Def => self.def()?,
            Tok::If => self.if_stmt()?,
            Tok::While => {
                self.pos += 1;
                let cond = self.expr()?;
                self.expect(&Tok::Colon, "':' after while condition")?;
                let body = self.block()?;
                StmtKind::While { cond, body }
            }
            Tok::For => {
                self.pos += 1;
                let var = self.expect_name("loop variable")?;
                self.expect(&Tok::In, "'in'")?;
                let iter = self.expr()?;
                self.expect(&Tok::Colon, "':' after for clause")?;
                let body = self.block()?;
                StmtKind::For { var, iter, body }
            }
            _ => return self.simple_line(),
        };
        Ok(vec![Stmt { kind, line }])
    }

    fn def(&mut self) -> ScriptResult<StmtKind> {
        let line = self.line();
        self.pos += 1;
        let name = self.expect_name("function name")?;
        self.expect(&Tok::LParen, "'(' after function name")?;
        let mut params = Vec::new();
        if !self.eat(&Tok::RParen) {
            loop {
                let param = self.expect_name("parameter name")?;
                if params.contains(&param) {
                    return Err(ScriptError::syntax(
                        line,
                        format!("duplicate argument '{param}' in function definition"),
                    ));
                }
                params.push(param);
                if self.eat(&Tok::RParen) {
                    break;
                }
                self.expect(&Tok::Comma, "',' or ')' in parameter list")?;
                if self.eat(&Tok::RParen) {
                    break;
                }
            }
        }
        self.expect(&Tok::Colon, "':' after function signature")?;
        let body = self.block()?;
        Ok(StmtKind::Def(Rc::new(FunctionDef {
            name,
            params,
            body,
            line,
        })))
    }

    fn if_stmt(&mut self) -> ScriptResult<StmtKind> {
        self.pos += 1;
        let mut branches = Vec::new();
        let cond = self.expr()?;
        self.expect(&Tok::Colon, "':' after if condition")?;
        branches.push((cond, self.block()?));

        let mut otherwise = Vec::new();
        loop {
            if self.eat(&Tok::Elif) {
                let cond = self.expr()?;
                self.expect(&Tok::Colon, "':' after elif condition")?;
                branches.push((cond, self.block()?));
            } else if self.eat(&Tok::Else) {
                self.expect(&Tok::Colon, "':' after else")?;
                otherwise = self.block()?;
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    /// Body after a `:`, either an indented suite or statements on the same line
    fn block(&mut self) -> ScriptResult<Vec<Stmt>> {
        if !self.eat(&Tok::Newline) {
            return self.simple_line();
        }
        if !self.eat(&Tok::Indent) {
            return Err(self.error("expected an indented block"));
        }
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Dedent => {
                    self.pos += 1;
                    break;
                }
                Tok::Eof => break,
                Tok::Newline => {
                    self.pos += 1;
                }
                _ => body.extend(self.nested(Self::statement)?),
            }
        }
        Ok(body)
    }

    fn simple_line(&mut self) -> ScriptResult<Vec<Stmt>> {
        let mut stmts = vec![self.simple()?];
        while self.eat(&Tok::Semicolon) {
            if matches!(self.peek(), Tok::Newline | Tok::Eof) {
                break;
            }
            stmts.push(self.simple()?);
        }
        if !self.eat(&Tok::Newline) && *self.peek() != Tok::Eof {
            return Err(self.error("expected end of statement"));
        }
        Ok(stmts)
    }

    fn simple(&mut self) -> ScriptResult<Stmt> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Pass => {
                self.pos += 1;
                StmtKind::Pass
            }
            Tok::Break => {
                self.pos += 1;
                StmtKind::Break
            }
            Tok::Continue => {
                self.pos += 1;
                StmtKind::Continue
            }
            Tok::Return => {
                self.pos += 1;
                if matches!(self.peek(), Tok::Newline | Tok::Semicolon | Tok::Eof) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.expr()?))
                }
            }
            Tok::Def | Tok::If | Tok::While | Tok::For => {
                return Err(self.error("compound statement not allowed here"));
            }
            _ => self.expr_statement()?,
        };
        Ok(Stmt { kind, line })
    }

    fn expr_statement(&mut self) -> ScriptResult<StmtKind> {
        let expr = self.expr()?;
        let aug = match self.peek() {
            Tok::Assign => None,
            Tok::PlusAssign => Some(BinOp::Add),
            Tok::MinusAssign => Some(BinOp::Sub),
            Tok::StarAssign => Some(BinOp::Mul),
            Tok::SlashAssign => Some(BinOp::Div),
            Tok::DoubleSlashAssign => Some(BinOp::FloorDiv),
            Tok::PercentAssign => Some(BinOp::Mod),
            Tok::Comma => return Err(self.error("tuple expressions are not supported")),
            _ => return Ok(StmtKind::Expr(expr)),
        };
        self.pos += 1;
        let target = self.target(expr)?;
        let value = self.expr()?;
        if *self.peek() == Tok::Assign {
            return Err(self.error("chained assignment is not supported"));
        }
        Ok(match aug {
            None => StmtKind::Assign { target, value },
            Some(op) => StmtKind::AugAssign { target, op, value },
        })
    }

    fn target(&self, expr: Expr) -> ScriptResult<Target> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Index { target, index } => match *target {
                Expr::Name(name) => Ok(Target::Index {
                    name,
                    index: *index,
                }),
                _ => Err(ScriptError::syntax(
                    self.line(),
                    "can only assign to an index of a named list",
                )),
            },
            _ => Err(ScriptError::syntax(self.line(), "cannot assign to expression")),
        }
    }

    fn expr(&mut self) -> ScriptResult<Expr> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> ScriptResult<Expr> {
        let then = self.or_expr()?;
        if *self.peek() == Tok::If && self.conditional_follows() {
            self.pos += 1;
            let cond = self.or_expr()?;
            self.expect(&Tok::Else, "'else' in conditional expression")?;
            let otherwise = self.expr()?;
            return Ok(Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(then)
    }

    /// `x if c else y` needs an `else` before the end of the line; a bare
    /// trailing `if` belongs to an enclosing comprehension instead
    fn conditional_follows(&self) -> bool {
        let mut depth = 0usize;
        let mut offset = 1;
        loop {
            match self.peek_at(offset) {
                Tok::Eof => return false,
                Tok::LParen | Tok::LBracket => depth += 1,
                Tok::RParen | Tok::RBracket if depth == 0 => return false,
                Tok::RParen | Tok::RBracket => depth -= 1,
                Tok::Else if depth == 0 => return true,
                Tok::For if depth == 0 => return false,
                Tok::Newline | Tok::Colon | Tok::Comma if depth == 0 => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    fn or_expr(&mut self) -> ScriptResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat(&Tok::Or) {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ScriptResult<Expr> {
        let mut left = self.not_expr()?;
        while self.eat(&Tok::And) {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> ScriptResult<Expr> {
        if self.eat(&Tok::Not) {
            let operand = self.nested(Self::not_expr)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> ScriptResult<Expr> {
        let first = self.arith()?;
        let mut rest = Vec::new();
        loop {
            let op = match (self.peek(), self.peek_at(1)) {
                (Tok::EqEq, _) => CmpOp::Eq,
                (Tok::NotEq, _) => CmpOp::NotEq,
                (Tok::Lt, _) => CmpOp::Lt,
                (Tok::Le, _) => CmpOp::Le,
                (Tok::Gt, _) => CmpOp::Gt,
                (Tok::Ge, _) => CmpOp::Ge,
                (Tok::In, _) => CmpOp::In,
                (Tok::Not, Tok::In) => {
                    self.pos += 1;
                    CmpOp::NotIn
                }
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.arith()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn arith(&mut self) -> ScriptResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BinOp::Add,
                Tok::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> ScriptResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BinOp::Mul,
                Tok::Slash => BinOp::Div,
                Tok::DoubleSlash => BinOp::FloorDiv,
                Tok::Percent => BinOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let right = self.factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn factor(&mut self) -> ScriptResult<Expr> {
        self.nested(Self::unary)
    }

    fn unary(&mut self) -> ScriptResult<Expr> {
        let op = match self.peek() {
            Tok::Minus => UnaryOp::Neg,
            Tok::Plus => UnaryOp::Pos,
            _ => return self.power(),
        };
        self.pos += 1;
        let operand = self.factor()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn power(&mut self) -> ScriptResult<Expr> {
        let base = self.postfix()?;
        if self.eat(&Tok::DoubleStar) {
            // Right-associative and binds tighter than unary minus on the left
            let exponent = self.factor()?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            match self.peek() {
                Tok::LParen => {
                    self.pos += 1;
                    let args = self.arguments()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                Tok::LBracket => {
                    self.pos += 1;
                    expr = self.subscript(expr)?;
                }
                Tok::Dot => {
                    self.pos += 1;
                    let name = self.expect_name("attribute name")?;
                    self.expect(&Tok::LParen, "'(' (only method calls are supported)")?;
                    let args = self.arguments()?;
                    expr = Expr::Method {
                        receiver: Box::new(expr),
                        name,
                        args,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// After `(`; consumes through `)`
    fn arguments(&mut self) -> ScriptResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&Tok::RParen) {
            return Ok(args);
        }
        loop {
            if matches!(self.peek(), Tok::Name(_)) && *self.peek_at(1) == Tok::Assign {
                return Err(self.error("keyword arguments are not supported"));
            }
            args.push(self.expr()?);
            if self.eat(&Tok::RParen) {
                break;
            }
            self.expect(&Tok::Comma, "',' or ')' in argument list")?;
            if self.eat(&Tok::RParen) {
                break;
            }
        }
        Ok(args)
    }

    /// After `[`; index or slice, consumes through `]`
    fn subscript(&mut self, target: Expr) -> ScriptResult<Expr> {
        let start = if *self.peek() == Tok::Colon {
            None
        } else {
            Some(Box::new(self.expr()?))
        };
        if self.eat(&Tok::Colon) {
            let end = if *self.peek() == Tok::RBracket {
                None
            } else {
                Some(Box::new(self.expr()?))
            };
            self.expect(&Tok::RBracket, "']'")?;
            return Ok(Expr::Slice {
                target: Box::new(target),
                start,
                end,
            });
        }
        self.expect(&Tok::RBracket, "']'")?;
        match start {
            Some(index) => Ok(Expr::Index {
                target: Box::new(target),
                index,
            }),
            None => Err(self.error("expected index")),
        }
    }

    fn atom(&mut self) -> ScriptResult<Expr> {
        let expr = match self.advance() {
            Tok::Int(value) => Expr::Int(value),
            Tok::Float(value) => Expr::Float(value),
            Tok::Str(mut text) => {
                // Adjacent literals concatenate
                while let Tok::Str(more) = self.peek() {
                    text.push_str(more);
                    self.pos += 1;
                }
                Expr::Str(text)
            }
            Tok::True => Expr::Bool(true),
            Tok::False => Expr::Bool(false),
            Tok::None => Expr::None,
            Tok::Name(name) => Expr::Name(name),
            Tok::LParen => {
                let inner = self.expr()?;
                if *self.peek() == Tok::Comma {
                    return Err(self.error("tuples are not supported"));
                }
                self.expect(&Tok::RParen, "')'")?;
                inner
            }
            Tok::LBracket => self.list()?,
            _ => {
                self.pos = self.pos.saturating_sub(1);
                return Err(self.error("expected an expression"));
            }
        };
        Ok(expr)
    }

    /// After `[`: a list display or a comprehension
    fn list(&mut self) -> ScriptResult<Expr> {
        if self.eat(&Tok::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.expr()?;
        if self.eat(&Tok::For) {
            let var = self.expect_name("comprehension variable")?;
            self.expect(&Tok::In, "'in'")?;
            let iter = self.or_expr()?;
            let cond = if self.eat(&Tok::If) {
                Some(Box::new(self.or_expr()?))
            } else {
                None
            };
            if *self.peek() == Tok::For {
                return Err(self.error("nested comprehensions are not supported"));
            }
            self.expect(&Tok::RBracket, "']' to close the comprehension")?;
            return Ok(Expr::Comprehension {
                element: Box::new(first),
                var,
                iter: Box::new(iter),
                cond,
            });
        }

        let mut items = vec![first];
        while self.eat(&Tok::Comma) {
            if *self.peek() == Tok::RBracket {
                break;
            }
            items.push(self.expr()?);
        }
        self.expect(&Tok::RBracket, "']'")?;
        Ok(Expr::List(items))
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Name(name) => format!("'{name}'"),
        Tok::Int(value) => format!("'{value}'"),
        Tok::Float(value) => format!("'{value}'"),
        Tok::Str(_) => "string literal".to_string(),
        Tok::Dedent => "dedent".to_string(),
        other => format!("{other:?}").to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(source: &str) -> StmtKind {
        let mut stmts = parse(source).unwrap();
        assert_eq!(stmts.len(), 1, "{stmts:?}");
        stmts.remove(0).kind
    }

    #[test]
    fn test_inline_def() {
        let StmtKind::Def(def) = single("def array_sum(numbers): return sum(numbers)") else {
            panic!("expected def");
        };
        assert_eq!(def.name, "array_sum");
        assert_eq!(def.params, vec!["numbers".to_string()]);
        assert!(matches!(def.body[0].kind, StmtKind::Return(Some(Expr::Call { .. }))));
    }

    #[test]
    fn test_if_elif_else() {
        let source = "if x > 1:\n    y = 1\nelif x == 1:\n    y = 2\nelse:\n    y = 3\n";
        let StmtKind::If {
            branches,
            otherwise,
        } = single(source)
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(otherwise.len(), 1);
    }

    #[test]
    fn test_comprehension_with_filter() {
        let StmtKind::Expr(Expr::Comprehension { var, cond, .. }) =
            single("[x**2 for x in range(n+1) if x % 2 == 0]")
        else {
            panic!("expected comprehension");
        };
        assert_eq!(var, "x");
        assert!(cond.is_some());
    }

    #[test]
    fn test_power_binds_tighter_than_negation() {
        let StmtKind::Expr(expr) = single("-2 ** 2") else {
            panic!("expected expression");
        };
        assert!(matches!(
            expr,
            Expr::Unary {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }

    #[test]
    fn test_augmented_assignment() {
        let kind = single("n -= 1");
        assert_eq!(
            kind,
            StmtKind::AugAssign {
                target: Target::Name("n".into()),
                op: BinOp::Sub,
                value: Expr::Int(1),
            }
        );
    }

    #[test]
    fn test_conditional_expression() {
        let StmtKind::Assign { value, .. } = single("y = 1 if x else 2") else {
            panic!("expected assignment");
        };
        assert!(matches!(value, Expr::Conditional { .. }));
    }

    #[test]
    fn test_not_in() {
        let StmtKind::Expr(Expr::Compare { rest, .. }) = single("a not in b") else {
            panic!("expected comparison");
        };
        assert_eq!(rest[0].0, CmpOp::NotIn);
    }

    #[test]
    fn test_docstring_and_comments() {
        let source = "def f(n):\n  \"\"\"Doc.\"\"\"\n  # comment\n  return n\n";
        let StmtKind::Def(def) = single(source) else {
            panic!("expected def");
        };
        assert_eq!(def.body.len(), 2);
    }

    #[test]
    fn test_missing_colon_reports_line() {
        let err = parse("def f(n):\n    if n > 0\n        return 1\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 2, .. }), "{err:?}");
    }

    #[test]
    fn test_missing_block() {
        assert!(parse("def f():\nreturn 1\n").is_err());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = format!("def f():\n    return {}1{}\n", "(".repeat(500), ")".repeat(500));
        assert!(matches!(parse(&source), Err(ScriptError::Syntax { .. })));
        assert!(parse(&format!("x = {}1\n", "-".repeat(500))).is_err());
        assert!(parse("x = ((((1))))\n").is_ok());
    }

    #[test]
    fn test_slice() {
        let StmtKind::Expr(expr) = single("xs[1:]") else {
            panic!("expected expression");
        };
        assert!(matches!(expr, Expr::Slice { end: None, .. }));
    }
}
