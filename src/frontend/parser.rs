//! Parser for the async C++ dialect
//!
//! Recursive descent parser with Pratt parsing for expressions. Parsing is
//! purely syntactic: callees and types are never resolved.

use crate::frontend::ast::*;
use crate::frontend::lexer::Lexer;
use crate::frontend::token::{Token, TokenKind};
use crate::utils::{Error, Result, Span};

/// The parser
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Half of a `>>` has been consumed as a template closer
    split_shr: bool,
}

impl Parser {
    /// Tokenize `source` and create a parser over it
    pub fn new(source: &str) -> Result<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self::from_tokens(tokens))
    }

    /// Create a parser from pre-tokenized input. An `Eof` is appended when
    /// the input does not end with one.
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map_or(true, |t| t.kind != TokenKind::Eof) {
            let span = tokens.last().map_or_else(Span::dummy, |t| t.span);
            tokens.push(Token::new(TokenKind::Eof, span));
        }
        Self { tokens, pos: 0, split_shr: false }
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + offset).min(last)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Span of the last consumed token
    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: impl std::fmt::Display) -> Error {
        Error::unexpected(expected, self.current_kind(), self.current().span)
    }

    // ==================== Parsing Methods ====================

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut items = Vec::new();

        while !self.is_at_end() {
            items.push(self.parse_item()?);
        }

        Ok(Program { items })
    }

    /// Parse a top-level item
    fn parse_item(&mut self) -> Result<Item> {
        let start = self.current().span;
        match self.current_kind().clone() {
            TokenKind::Directive(text) => {
                self.advance();
                Ok(Item::Directive { text, span: start })
            }
            TokenKind::Using => self.parse_using(),
            TokenKind::Async if !matches!(self.peek_kind(1), TokenKind::LBracket) => {
                self.advance();
                let ret_type = self.parse_type()?;
                let (name, _) = self.parse_ident()?;
                self.parse_function_rest(true, ret_type, name, start)
            }
            TokenKind::Ident(_) | TokenKind::Const if self.starts_declaration() => {
                let ty = self.parse_type()?;
                let (name, _) = self.parse_ident()?;
                if self.check(&TokenKind::LParen) {
                    self.parse_function_rest(false, ty, name, start)
                } else {
                    Ok(Item::Variable(self.parse_var_decl_rest(ty, name, start)?))
                }
            }
            // Anything else is a statement outside of any function
            _ => Ok(Item::Statement(self.parse_stmt()?)),
        }
    }

    /// `using namespace std;` or `using std::string;`
    fn parse_using(&mut self) -> Result<Item> {
        let start = self.current().span;
        self.expect(TokenKind::Using)?;

        let path = match self.current_kind() {
            TokenKind::Ident(word) if word == "namespace" => {
                self.advance();
                let (path, _) = self.parse_path()?;
                format!("namespace {}", path)
            }
            _ => self.parse_path()?.0,
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(Item::Using {
            path,
            span: start.merge(&self.prev_span()),
        })
    }

    /// Parse the parameter list and then a body or a `;` once `Type name`
    /// is consumed
    fn parse_function_rest(&mut self, is_async: bool, ret_type: Type, name: String, start: Span) -> Result<Item> {
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;

        if self.consume(&TokenKind::Semicolon) {
            return Ok(Item::Prototype(Prototype {
                name,
                ret_type,
                params,
                is_async,
                span: start.merge(&self.prev_span()),
            }));
        }

        let body = self.parse_block()?;

        Ok(Item::Function(FunctionDecl {
            name,
            ret_type,
            params,
            body,
            is_async,
            span: start.merge(&self.prev_span()),
        }))
    }

    /// Parameters up to (not including) the closing paren
    fn parse_params(&mut self) -> Result<Vec<Param>> {
        let mut params = Vec::new();

        // `(void)`
        if matches!(self.current_kind(), TokenKind::Ident(s) if s == "void")
            && matches!(self.peek_kind(1), TokenKind::RParen)
        {
            self.advance();
            return Ok(params);
        }

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            params.push(self.parse_param()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param> {
        let start = self.current().span;
        let ty = self.parse_type()?;
        let (name, _) = self.parse_ident()?;
        Ok(Param {
            ty,
            name,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_ident(&mut self) -> Result<(String, Span)> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, token.span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// Scope-qualified name: `a::b::c`
    fn parse_path(&mut self) -> Result<(String, Span)> {
        let (mut path, start) = self.parse_ident()?;
        while self.check(&TokenKind::ColonColon) {
            self.advance();
            let (segment, _) = self.parse_ident()?;
            path.push_str("::");
            path.push_str(&segment);
        }
        Ok((path, start.merge(&self.prev_span())))
    }

    /// Parse a type: `const`? path template-args? declarators
    fn parse_type(&mut self) -> Result<Type> {
        let is_const = self.consume(&TokenKind::Const);
        let (name, _) = self.parse_path()?;

        let mut args = Vec::new();
        if self.consume(&TokenKind::Lt) {
            while !self.is_closing_angle() && !self.is_at_end() {
                args.push(self.parse_type()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_closing_angle()?;
        }

        let mut declarators = Vec::new();
        loop {
            match self.current_kind() {
                TokenKind::Star => declarators.push(Declarator::Pointer),
                TokenKind::And => declarators.push(Declarator::Reference),
                TokenKind::AndAnd => {
                    declarators.push(Declarator::Reference);
                    declarators.push(Declarator::Reference);
                }
                _ => break,
            }
            self.advance();
        }

        Ok(Type { is_const, name, args, declarators })
    }

    fn is_closing_angle(&self) -> bool {
        self.split_shr || matches!(self.current_kind(), TokenKind::Gt | TokenKind::Shr)
    }

    /// Consume a template closer, splitting `>>` into two
    fn expect_closing_angle(&mut self) -> Result<()> {
        if self.split_shr {
            self.split_shr = false;
            self.advance();
            return Ok(());
        }
        match self.current_kind() {
            TokenKind::Gt => {
                self.advance();
                Ok(())
            }
            TokenKind::Shr => {
                self.split_shr = true;
                Ok(())
            }
            _ => Err(self.unexpected(TokenKind::Gt)),
        }
    }

    /// Speculatively parse a type, test what follows it, then rewind
    fn type_followed_by(&mut self, follows: impl FnOnce(&Self) -> bool) -> bool {
        let saved = self.pos;
        let matched = self.parse_type().is_ok() && !self.split_shr && follows(self);
        self.pos = saved;
        self.split_shr = false;
        matched
    }

    /// `Type name =` or `Type name;`
    fn looks_like_declaration(&mut self) -> bool {
        self.type_followed_by(|p| {
            matches!(p.current_kind(), TokenKind::Ident(_))
                && matches!(p.peek_kind(1), TokenKind::Eq | TokenKind::Semicolon)
        })
    }

    /// `Type name` at the top level: a function, prototype or global
    fn starts_declaration(&mut self) -> bool {
        self.type_followed_by(|p| matches!(p.current_kind(), TokenKind::Ident(_)))
    }

    fn parse_block(&mut self) -> Result<Block> {
        let start = self.current().span;
        self.expect(TokenKind::LBrace)?;

        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_stmt()?);
        }

        self.expect(TokenKind::RBrace)?;

        Ok(Block {
            stmts,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.current_kind().clone() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::Do => self.parse_do_while_stmt(),
            TokenKind::Break | TokenKind::Continue => {
                let token = self.advance();
                self.expect(TokenKind::Semicolon)?;
                let span = token.span.merge(&self.prev_span());
                Ok(if token.kind == TokenKind::Break {
                    Stmt::Break { span }
                } else {
                    Stmt::Continue { span }
                })
            }
            TokenKind::Semicolon => {
                let span = self.current().span;
                self.advance();
                Ok(Stmt::Empty { span })
            }
            TokenKind::Const => Ok(Stmt::VarDecl(self.parse_var_decl()?)),
            TokenKind::Ident(_) if self.looks_like_declaration() => {
                Ok(Stmt::VarDecl(self.parse_var_decl()?))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        let start = self.current().span;
        let ty = self.parse_type()?;
        let (name, _) = self.parse_ident()?;
        self.parse_var_decl_rest(ty, name, start)
    }

    fn parse_var_decl_rest(&mut self, ty: Type, name: String, start: Span) -> Result<VarDecl> {
        let init = if self.consume(&TokenKind::Eq) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(VarDecl {
            ty,
            name,
            init,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_return_stmt(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::Return)?;

        let value = if !self.check(&TokenKind::Semicolon) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;

        Ok(Stmt::Return {
            value,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::If)?;

        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;

        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.consume(&TokenKind::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::While)?;

        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);

        Ok(Stmt::While {
            cond,
            body,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        let init = match self.current_kind().clone() {
            TokenKind::Semicolon => {
                self.advance();
                None
            }
            TokenKind::Const => Some(Box::new(Stmt::VarDecl(self.parse_var_decl()?))),
            TokenKind::Ident(_) if self.looks_like_declaration() => {
                Some(Box::new(Stmt::VarDecl(self.parse_var_decl()?)))
            }
            _ => {
                let expr = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                Some(Box::new(Stmt::Expr(expr)))
            }
        };

        let cond = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(TokenKind::RParen)?;

        let body = Box::new(self.parse_stmt()?);

        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
            span: start.merge(&self.prev_span()),
        })
    }

    fn parse_do_while_stmt(&mut self) -> Result<Stmt> {
        let start = self.current().span;
        self.expect(TokenKind::Do)?;

        let body = Box::new(self.parse_stmt()?);

        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;

        Ok(Stmt::DoWhile {
            body,
            cond,
            span: start.merge(&self.prev_span()),
        })
    }

    // ==================== Expression Parsing (Pratt) ====================

    pub fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    /// Parse expression with binding power (Pratt parsing)
    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op_token = self.current().clone();

            // Conditional binds between assignment and `||`
            if op_token.kind == TokenKind::Question {
                if min_bp > 2 {
                    break;
                }
                self.advance();
                let then_expr = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let else_expr = self.parse_expr_bp(2)?;
                left = Expr::Conditional {
                    span: left.span().merge(&else_expr.span()),
                    cond: Box::new(left),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                };
                continue;
            }

            let Some(bp) = op_token.kind.binary_precedence() else {
                break;
            };

            if bp < min_bp {
                break;
            }

            self.advance();
            let op = Self::token_to_binop(&op_token)?;

            // Right-associative for assignment
            let next_bp = if op.is_assignment() { bp } else { bp + 1 };

            let right = self.parse_expr_bp(next_bp)?;
            let span = left.span().merge(&right.span());

            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    /// Prefix operators, `await` included
    fn parse_unary(&mut self) -> Result<Expr> {
        let start = self.current().span;

        let op = match self.current_kind() {
            TokenKind::Await => {
                self.advance();
                let expr = self.parse_unary()?;
                return Ok(Expr::Await {
                    span: start.merge(&expr.span()),
                    expr: Box::new(expr),
                });
            }
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Star => UnaryOp::Deref,
            TokenKind::And => UnaryOp::AddrOf,
            TokenKind::PlusPlus => UnaryOp::PreInc,
            TokenKind::MinusMinus => UnaryOp::PreDec,
            _ => {
                let primary = self.parse_primary()?;
                return self.parse_postfix(primary);
            }
        };

        self.advance();
        let expr = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            span: start.merge(&expr.span()),
            expr: Box::new(expr),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();

        let literal = match &token.kind {
            TokenKind::Number(n) => Literal::Number(n.clone()),
            TokenKind::StringLit(s) => Literal::String(s.clone()),
            TokenKind::CharLit(c) => Literal::Char(c.clone()),
            TokenKind::True => Literal::Bool(true),
            TokenKind::False => Literal::Bool(false),

            TokenKind::Ident(_) => {
                let (name, span) = self.parse_path()?;
                return Ok(Expr::Ident { name, span });
            }

            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                return Ok(Expr::Paren {
                    expr: Box::new(expr),
                    span: token.span.merge(&self.prev_span()),
                });
            }

            TokenKind::LBracket => return self.parse_lambda(false, token.span),

            TokenKind::Async => {
                self.advance();
                return if self.check(&TokenKind::LBracket) {
                    self.parse_lambda(true, token.span)
                } else {
                    self.parse_typed_async_lambda(token.span)
                };
            }

            _ => return Err(self.unexpected("expression")),
        };

        self.advance();
        Ok(Expr::Literal { value: literal, span: token.span })
    }

    /// `[captures](params) -> T { body }`
    fn parse_lambda(&mut self, is_async: bool, start: Span) -> Result<Expr> {
        self.expect(TokenKind::LBracket)?;
        let captures = self.parse_captures()?;
        self.expect(TokenKind::RBracket)?;

        let params = if self.consume(&TokenKind::LParen) {
            let params = self.parse_params()?;
            self.expect(TokenKind::RParen)?;
            params
        } else {
            Vec::new()
        };

        let ret_type = if self.consume(&TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(Expr::Lambda(Box::new(Lambda {
            captures: Some(captures),
            params,
            ret_type,
            body,
            is_async,
            span: start.merge(&self.prev_span()),
        })))
    }

    /// `async T (params) { body }`, with `async` already consumed
    fn parse_typed_async_lambda(&mut self, start: Span) -> Result<Expr> {
        let ret_type = self.parse_type()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_block()?;

        Ok(Expr::Lambda(Box::new(Lambda {
            captures: None,
            params,
            ret_type: Some(ret_type),
            body,
            is_async: true,
            span: start.merge(&self.prev_span()),
        })))
    }

    /// Capture items up to the closing bracket: `=`, `&`, `&x`, `x`, `this`
    fn parse_captures(&mut self) -> Result<Vec<String>> {
        let mut captures = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            let item = match self.current_kind() {
                TokenKind::Eq => {
                    self.advance();
                    "=".to_string()
                }
                TokenKind::And => {
                    self.advance();
                    match self.current_kind() {
                        TokenKind::Ident(_) => format!("&{}", self.parse_ident()?.0),
                        _ => "&".to_string(),
                    }
                }
                TokenKind::Ident(_) => self.parse_ident()?.0,
                _ => return Err(self.unexpected("lambda capture")),
            };
            captures.push(item);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Ok(captures)
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            if self.consume(&TokenKind::LParen) {
                let mut args = Vec::new();
                while !self.check(&TokenKind::RParen) && !self.is_at_end() {
                    args.push(self.parse_expr()?);
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                expr = Expr::Call {
                    span: expr.span().merge(&self.prev_span()),
                    callee: Box::new(expr),
                    args,
                };
            } else if self.check(&TokenKind::Dot) || self.check(&TokenKind::Arrow) {
                let arrow = self.advance().kind == TokenKind::Arrow;
                let (member, member_span) = self.parse_ident()?;
                expr = Expr::Member {
                    span: expr.span().merge(&member_span),
                    object: Box::new(expr),
                    member,
                    arrow,
                };
            } else if self.consume(&TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::Index {
                    span: expr.span().merge(&self.prev_span()),
                    object: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.check(&TokenKind::PlusPlus) || self.check(&TokenKind::MinusMinus) {
                let op = if self.advance().kind == TokenKind::PlusPlus {
                    PostfixOp::Inc
                } else {
                    PostfixOp::Dec
                };
                expr = Expr::Postfix {
                    op,
                    span: expr.span().merge(&self.prev_span()),
                    expr: Box::new(expr),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn token_to_binop(token: &Token) -> Result<BinOp> {
        match token.kind {
            TokenKind::Eq => Ok(BinOp::Assign),
            TokenKind::PlusEq => Ok(BinOp::AddAssign),
            TokenKind::MinusEq => Ok(BinOp::SubAssign),
            TokenKind::StarEq => Ok(BinOp::MulAssign),
            TokenKind::SlashEq => Ok(BinOp::DivAssign),
            TokenKind::OrOr => Ok(BinOp::Or),
            TokenKind::AndAnd => Ok(BinOp::And),
            TokenKind::Or => Ok(BinOp::BitOr),
            TokenKind::Caret => Ok(BinOp::BitXor),
            TokenKind::And => Ok(BinOp::BitAnd),
            TokenKind::EqEq => Ok(BinOp::Eq),
            TokenKind::Ne => Ok(BinOp::Ne),
            TokenKind::Lt => Ok(BinOp::Lt),
            TokenKind::Gt => Ok(BinOp::Gt),
            TokenKind::Le => Ok(BinOp::Le),
            TokenKind::Ge => Ok(BinOp::Ge),
            TokenKind::Shl => Ok(BinOp::Shl),
            TokenKind::Shr => Ok(BinOp::Shr),
            TokenKind::Plus => Ok(BinOp::Add),
            TokenKind::Minus => Ok(BinOp::Sub),
            TokenKind::Star => Ok(BinOp::Mul),
            TokenKind::Slash => Ok(BinOp::Div),
            TokenKind::Percent => Ok(BinOp::Rem),
            _ => Err(Error::parse(format!("invalid binary operator {}", token.kind), token.span)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Program> {
        Parser::new(source)?.parse_program()
    }

    fn only_function(program: &Program) -> &FunctionDecl {
        program.functions().next().expect("no function parsed")
    }

    #[test]
    fn test_async_function() {
        let program = parse("async Data fetchData(string url) { Data data = await download(url); return data; }").unwrap();
        let f = only_function(&program);
        assert!(f.is_async);
        assert_eq!(f.name, "fetchData");
        assert_eq!(f.ret_type, Type::named("Data"));
        assert_eq!(f.params.len(), 1);
        assert_eq!(f.params[0].name, "url");
        assert_eq!(f.body.stmts.len(), 2);

        match &f.body.stmts[0] {
            Stmt::VarDecl(VarDecl { name, init: Some(Expr::Await { expr, .. }), .. }) => {
                assert_eq!(name, "data");
                assert!(matches!(**expr, Expr::Call { .. }));
            }
            other => panic!("expected awaited declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_function_is_not_async() {
        let program = parse("int main() { return 0; }").unwrap();
        assert!(!only_function(&program).is_async);
    }

    #[test]
    fn test_top_level_items() {
        let program = parse("#include <iostream>\nusing namespace std;\nint counter = 0;\nvoid f() {}").unwrap();
        assert_eq!(program.items.len(), 4);
        assert!(matches!(&program.items[0], Item::Directive { text, .. } if text == "#include <iostream>"));
        assert!(matches!(&program.items[1], Item::Using { path, .. } if path == "namespace std"));
        assert!(matches!(&program.items[2], Item::Variable(v) if v.name == "counter"));
        assert!(matches!(&program.items[3], Item::Function(f) if f.name == "f"));
    }

    #[test]
    fn test_immediately_invoked_async_lambda() {
        let source = r#"
int main()
{
    Data processed_data = await async Data(string url) {
        return fetchData(url);
    } ("google.com");
}
"#;
        let program = parse(source).unwrap();
        let f = only_function(&program);
        let Stmt::VarDecl(decl) = &f.body.stmts[0] else {
            panic!("expected declaration");
        };
        let Some(Expr::Await { expr, .. }) = &decl.init else {
            panic!("expected await");
        };
        let Expr::Call { callee, args, .. } = expr.as_ref() else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 1);
        let Expr::Lambda(lambda) = callee.as_ref() else {
            panic!("expected lambda callee");
        };
        assert!(lambda.is_async);
        assert!(lambda.captures.is_none());
        assert_eq!(lambda.ret_type, Some(Type::named("Data")));
        assert_eq!(lambda.params[0].name, "url");
    }

    #[test]
    fn test_bracketed_lambda() {
        let program = parse("void f() { auto g = async [=, &out](int n) -> int { return n; }; auto h = [] { return 1; }; }").unwrap();
        let f = only_function(&program);
        let Stmt::VarDecl(VarDecl { init: Some(Expr::Lambda(g)), .. }) = &f.body.stmts[0] else {
            panic!("expected lambda");
        };
        assert!(g.is_async);
        assert_eq!(g.captures, Some(vec!["=".to_string(), "&out".to_string()]));
        assert_eq!(g.ret_type, Some(Type::named("int")));

        let Stmt::VarDecl(VarDecl { init: Some(Expr::Lambda(h)), .. }) = &f.body.stmts[1] else {
            panic!("expected lambda");
        };
        assert!(!h.is_async);
        assert!(h.params.is_empty());
    }

    #[test]
    fn test_if_else_without_braces() {
        let source = r#"int main() {
    if (await pushData(d, "my_serv.com"))
        std::cout << "pushed";
    else std::cout << "not pushed";
}"#;
        let program = parse(source).unwrap();
        let f = only_function(&program);
        let Stmt::If { cond, then_branch, else_branch, .. } = &f.body.stmts[0] else {
            panic!("expected if");
        };
        assert!(matches!(cond, Expr::Await { .. }));
        assert!(matches!(
            then_branch.as_ref(),
            Stmt::Expr(Expr::Binary { op: BinOp::Shl, .. })
        ));
        assert!(else_branch.is_some());
    }

    #[test]
    fn test_nested_template_types() {
        let program = parse("std::future<std::vector<int>> f(const std::string& s) { std::map<int, std::vector<Data*>> m; }").unwrap();
        let f = only_function(&program);
        assert_eq!(
            f.ret_type,
            Type::generic("std::future", vec![Type::generic("std::vector", vec![Type::named("int")])])
        );
        assert!(f.params[0].ty.is_const);
        assert_eq!(f.params[0].ty.declarators, vec![Declarator::Reference]);
        let Stmt::VarDecl(m) = &f.body.stmts[0] else {
            panic!("expected declaration");
        };
        assert_eq!(m.ty.args.len(), 2);
        assert!(m.init.is_none());
    }

    #[test]
    fn test_expression_statements_are_not_declarations() {
        let program = parse("void f() { x = a < b; a >> b; foo(x); std::cout << x; }").unwrap();
        let f = only_function(&program);
        assert_eq!(f.body.stmts.len(), 4);
        assert!(f.body.stmts.iter().all(|s| matches!(s, Stmt::Expr(_))));
    }

    #[test]
    fn test_precedence() {
        let program = parse("void f() { x = a + b * c ? d : e; }").unwrap();
        let f = only_function(&program);
        let Stmt::Expr(Expr::Binary { op: BinOp::Assign, right, .. }) = &f.body.stmts[0] else {
            panic!("expected assignment");
        };
        let Expr::Conditional { cond, .. } = right.as_ref() else {
            panic!("expected conditional");
        };
        let Expr::Binary { op: BinOp::Add, right: product, .. } = cond.as_ref() else {
            panic!("expected addition");
        };
        assert!(matches!(product.as_ref(), Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_await_binds_tighter_than_binary() {
        let program = parse("async int f() { return await a() + await b(); }").unwrap();
        let f = only_function(&program);
        let Stmt::Return { value: Some(Expr::Binary { left, right, .. }), .. } = &f.body.stmts[0] else {
            panic!("expected binary return");
        };
        assert!(matches!(left.as_ref(), Expr::Await { .. }));
        assert!(matches!(right.as_ref(), Expr::Await { .. }));
    }

    #[test]
    fn test_unresolved_callees_are_accepted() {
        assert!(parse("void f() { this_function_does_not_exist(1, 2); }").is_ok());
    }

    #[test]
    fn test_unterminated_block() {
        let err = parse("int main() {\n    foo();\n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        assert_eq!(err.to_string(), "expected '}', found end of input");
    }

    #[test]
    fn test_missing_semicolon_position() {
        let err = parse("int main() {\n    foo()\n}").unwrap_err();
        assert_eq!(err.line(), 3);
        assert_eq!(err.column(), 1);
    }

    #[test]
    fn test_prototypes() {
        let program = parse("async Data fetch(string url);\nvoid log(const string& msg);").unwrap();
        assert_eq!(program.items.len(), 2);
        let Item::Prototype(fetch) = &program.items[0] else {
            panic!("expected prototype, got {:?}", program.items[0]);
        };
        assert!(fetch.is_async);
        assert_eq!(fetch.name, "fetch");
        assert_eq!(fetch.ret_type, Type::named("Data"));
        assert_eq!(fetch.params.len(), 1);
        assert!(matches!(&program.items[1], Item::Prototype(Prototype { is_async: false, .. })));
        assert_eq!(program.functions().count(), 0);
    }

    #[test]
    fn test_for_loops() {
        let program = parse("void f() { for (int i = 0; i < n; i++) g(i); for (;;) { break; } for (i = 0; ; ) continue; }").unwrap();
        let f = only_function(&program);
        assert_eq!(f.body.stmts.len(), 3);

        let Stmt::For { init: Some(init), cond: Some(_), step: Some(Expr::Postfix { .. }), body, .. } = &f.body.stmts[0] else {
            panic!("expected counted loop, got {:?}", f.body.stmts[0]);
        };
        assert!(matches!(init.as_ref(), Stmt::VarDecl(VarDecl { name, .. }) if name == "i"));
        assert!(matches!(body.as_ref(), Stmt::Expr(Expr::Call { .. })));

        let Stmt::For { init: None, cond: None, step: None, body, .. } = &f.body.stmts[1] else {
            panic!("expected endless loop, got {:?}", f.body.stmts[1]);
        };
        let Stmt::Block(block) = body.as_ref() else {
            panic!("expected block body");
        };
        assert!(matches!(block.stmts[0], Stmt::Break { .. }));

        let Stmt::For { init: Some(init), cond: None, body, .. } = &f.body.stmts[2] else {
            panic!("expected loop with expression init");
        };
        assert!(matches!(init.as_ref(), Stmt::Expr(Expr::Binary { op: BinOp::Assign, .. })));
        assert!(matches!(body.as_ref(), Stmt::Continue { .. }));
    }

    #[test]
    fn test_do_while() {
        let program = parse("async void f() { do { x = await next(); } while (x > 0); }").unwrap();
        let f = only_function(&program);
        let Stmt::DoWhile { body, cond, .. } = &f.body.stmts[0] else {
            panic!("expected do-while, got {:?}", f.body.stmts[0]);
        };
        assert!(matches!(body.as_ref(), Stmt::Block(_)));
        assert!(matches!(cond, Expr::Binary { op: BinOp::Gt, .. }));

        let err = parse("void f() { do g(); while (x) }").unwrap_err();
        assert_eq!(err.to_string(), "expected ';', found '}'");
    }

    #[test]
    fn test_top_level_statement() {
        let program = parse("await foo();\n").unwrap();
        let Item::Statement(Stmt::Expr(Expr::Await { span, .. })) = &program.items[0] else {
            panic!("expected top-level await, got {:?}", program.items);
        };
        assert_eq!((span.line, span.column), (1, 1));
    }

    #[test]
    fn test_from_tokens_without_eof() {
        let program = Parser::from_tokens(Vec::new()).parse_program().unwrap();
        assert!(program.items.is_empty());

        let tokens = vec![Token::new(TokenKind::Semicolon, Span::new(0, 1, 1, 1))];
        let program = Parser::from_tokens(tokens).parse_program().unwrap();
        assert!(matches!(program.items[..], [Item::Statement(Stmt::Empty { .. })]));
    }
}
