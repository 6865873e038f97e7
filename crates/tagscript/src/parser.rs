//! Token stream -> AST via Pratt-style precedence climbing.
//!
//! Diagnostics are collected rather than raised as hard failures (mirroring
//! the lexer): on a malformed statement the parser records an error and
//! resynchronizes at the next `;` or matching brace, then keeps going.

use crate::ast::*;
use crate::token::{Keyword, Position, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub pos: Position,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub errors: Vec<ParseError>,
}

type PResult<T> = Result<T, ParseError>;

const ASSIGN_BP: u8 = 2;
const TERNARY_BP: u8 = 4;
const COALESCE_BP: u8 = 6;
const OR_BP: u8 = 8;
const XOR_BP: u8 = 10;
const AND_BP: u8 = 12;
const BITOR_BP: u8 = 14;
const BITXOR_BP: u8 = 16;
const BITAND_BP: u8 = 18;
const EQUALITY_BP: u8 = 20;
const COMPARISON_BP: u8 = 22;
const CONCAT_BP: u8 = 24;
const SHIFT_BP: u8 = 26;
const SUM_BP: u8 = 28;
const PRODUCT_BP: u8 = 30;
const INSTANCEOF_BP: u8 = 32;
const POW_BP: u8 = 36;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens = tokens.into_iter().filter(|t| !t.is_trivia()).collect();
        Self { tokens, pos: 0, errors: Vec::new() }
    }

    pub fn parse_file(mut self) -> (File, Vec<ParseError>) {
        let mut stmts = Vec::new();
        while !self.at_eof() {
            match self.parse_top_level_item() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.resync();
                }
            }
        }
        (File { stmts }, self.errors)
    }

    // -- token cursor helpers -------------------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> &TokenKind {
        &self.cur().kind
    }

    fn pos_at(&self) -> Position {
        self.cur().pos
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn at_eof(&self) -> bool {
        matches!(self.kind(), TokenKind::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.kind()) == std::mem::discriminant(kind)
    }

    fn is_kw(&self, kw: Keyword) -> bool {
        matches!(self.kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_kw(&mut self, kw: Keyword) -> bool {
        if self.is_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.is(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.is(&kind) {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.kind())))
        }
    }

    fn expect_kw(&mut self, kw: Keyword) -> PResult<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected keyword `{}`", kw.as_str())))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError { message: message.into(), pos: self.pos_at() }
    }

    fn resync(&mut self) {
        let mut depth = 0i32;
        loop {
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::LBrace => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        self.bump();
                        return;
                    }
                    depth -= 1;
                    self.bump();
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.bump();
                    return;
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn ident_name(&mut self) -> PResult<String> {
        match self.kind().clone() {
            TokenKind::Identifier(s) => {
                self.bump();
                Ok(s)
            }
            TokenKind::NameQualified(s) | TokenKind::NameFullyQualified(s) | TokenKind::NameRelative(s) => {
                self.bump();
                Ok(s)
            }
            TokenKind::Keyword(k) => {
                self.bump();
                Ok(k.as_str().to_string())
            }
            other => Err(self.error(format!("expected identifier, found {other:?}"))),
        }
    }

    // -- top level / statements ------------------------------------------------

    fn parse_top_level_item(&mut self) -> PResult<Stmt> {
        self.parse_statement()
    }

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !self.is(&TokenKind::RBrace) && !self.at_eof() {
            match self.parse_statement() {
                Ok(s) => stmts.push(s),
                Err(e) => {
                    self.errors.push(e);
                    self.resync();
                }
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(stmts)
    }

    /// Parses either a `{ ... }` block or a single statement, as used by
    /// `if`/`while`/`for`/`foreach` bodies.
    fn parse_body(&mut self) -> PResult<Vec<Stmt>> {
        if self.is(&TokenKind::LBrace) {
            self.parse_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        let pos = self.pos_at();
        match self.cur().kind.clone() {
            TokenKind::InlineHtml => {
                let text = self.cur().text.clone().into_bytes();
                self.bump();
                Ok(Stmt { kind: StmtKind::InlineHtml(text), pos })
            }
            TokenKind::Keyword(kw) => self.parse_keyword_statement(kw, pos),
            TokenKind::LBrace => Ok(Stmt { kind: StmtKind::Block(self.parse_block()?), pos }),
            TokenKind::Semicolon => {
                self.bump();
                Ok(Stmt { kind: StmtKind::Block(vec![]), pos })
            }
            TokenKind::AttributeOpen => {
                let attrs = self.parse_attributes()?;
                self.parse_declaration_with_attributes(attrs, pos)
            }
            _ => {
                let expr = self.parse_expression(0)?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::ExprStmt(expr), pos })
            }
        }
    }

    fn parse_declaration_with_attributes(&mut self, attrs: Vec<Attribute>, pos: Position) -> PResult<Stmt> {
        let modifiers = self.parse_modifiers();
        if self.eat_kw(Keyword::Class) {
            let mut decl = self.parse_class_tail(modifiers)?;
            decl.attributes = attrs;
            return Ok(Stmt { kind: StmtKind::Class(Box::new(decl)), pos });
        }
        if self.is_kw(Keyword::Function) {
            let mut decl = self.parse_function_decl()?;
            decl.attributes = attrs;
            return Ok(Stmt { kind: StmtKind::Function(Box::new(decl)), pos });
        }
        if self.eat_kw(Keyword::Interface) {
            let mut decl = self.parse_interface_tail()?;
            decl.attributes = attrs;
            return Ok(Stmt { kind: StmtKind::Interface(Box::new(decl)), pos });
        }
        if self.eat_kw(Keyword::Trait) {
            let mut decl = self.parse_trait_tail()?;
            decl.attributes = attrs;
            return Ok(Stmt { kind: StmtKind::Trait(Box::new(decl)), pos });
        }
        if self.eat_kw(Keyword::Enum) {
            let mut decl = self.parse_enum_tail()?;
            decl.attributes = attrs;
            return Ok(Stmt { kind: StmtKind::EnumDecl(Box::new(decl)), pos });
        }
        if self.eat_kw(Keyword::Const) {
            // Top-level consts desugar to an assignment expression, which has
            // no slot for attributes; the attribute group is parsed and
            // discarded, matching how PHP attributes carry no runtime effect
            // here regardless of the declaration they annotate.
            let name = self.ident_name()?;
            self.expect(TokenKind::Assign, "`=`")?;
            let value = self.parse_expression(ASSIGN_BP)?;
            self.eat(&TokenKind::Semicolon);
            let target = Expr { kind: ExprKind::Name(name), pos };
            return Ok(Stmt {
                kind: StmtKind::ExprStmt(Expr {
                    kind: ExprKind::Assign { target: Box::new(target), op: None, value: Box::new(value) },
                    pos,
                }),
                pos,
            });
        }
        Err(self.error("expected a declaration after attribute group"))
    }

    fn parse_attributes(&mut self) -> PResult<Vec<Attribute>> {
        let mut attrs = Vec::new();
        while self.eat(&TokenKind::AttributeOpen) {
            loop {
                let name = self.parse_qualified_name()?;
                let args = if self.is(&TokenKind::LParen) { self.parse_args()? } else { Vec::new() };
                attrs.push(Attribute { name, args });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBracket, "`]` closing attribute group")?;
        }
        Ok(attrs)
    }

    fn parse_qualified_name(&mut self) -> PResult<String> {
        self.ident_name()
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut m = Modifiers::default();
        loop {
            if self.eat_kw(Keyword::Abstract) {
                m.is_abstract = true;
            } else if self.eat_kw(Keyword::Final) {
                m.is_final = true;
            } else if self.eat_kw(Keyword::Readonly) {
                m.is_readonly = true;
            } else if self.eat_kw(Keyword::Static) {
                m.is_static = true;
            } else if self.eat_kw(Keyword::Public) {
                m.visibility = Visibility::Public;
            } else if self.eat_kw(Keyword::Protected) {
                m.visibility = Visibility::Protected;
            } else if self.eat_kw(Keyword::Private) {
                m.visibility = Visibility::Private;
            } else if self.eat_kw(Keyword::Var) {
                m.visibility = Visibility::Public;
            } else {
                break;
            }
        }
        m
    }

    fn parse_keyword_statement(&mut self, kw: Keyword, pos: Position) -> PResult<Stmt> {
        match kw {
            Keyword::If => self.parse_if(pos),
            Keyword::While => self.parse_while(pos),
            Keyword::Do => self.parse_do_while(pos),
            Keyword::For => self.parse_for(pos),
            Keyword::Foreach => self.parse_foreach(pos),
            Keyword::Switch => self.parse_switch(pos),
            Keyword::Try => self.parse_try(pos),
            Keyword::Throw => {
                self.bump();
                let e = self.parse_expression(0)?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::Throw(e), pos })
            }
            Keyword::Return => {
                self.bump();
                let value = if self.is(&TokenKind::Semicolon) { None } else { Some(self.parse_expression(0)?) };
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::Return(value), pos })
            }
            Keyword::Break => {
                self.bump();
                let level = self.parse_optional_level()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::Break(level), pos })
            }
            Keyword::Continue => {
                self.bump();
                let level = self.parse_optional_level()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::Continue(level), pos })
            }
            Keyword::Echo => {
                self.bump();
                let mut exprs = vec![self.parse_expression(ASSIGN_BP)?];
                while self.eat(&TokenKind::Comma) {
                    exprs.push(self.parse_expression(ASSIGN_BP)?);
                }
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::Echo(exprs), pos })
            }
            Keyword::Global => {
                self.bump();
                let mut names = vec![self.expect_variable()?];
                while self.eat(&TokenKind::Comma) {
                    names.push(self.expect_variable()?);
                }
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::Global(names), pos })
            }
            Keyword::Static if matches!(self.peek_kind(1), TokenKind::Variable(_)) => {
                self.bump();
                let mut vars = Vec::new();
                loop {
                    let name = self.expect_variable()?;
                    let default = if self.eat(&TokenKind::Assign) { Some(self.parse_expression(ASSIGN_BP)?) } else { None };
                    vars.push((name, default));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::StaticVar(vars), pos })
            }
            Keyword::Unset => {
                self.bump();
                self.expect(TokenKind::LParen, "`(`")?;
                let mut exprs = vec![self.parse_expression(0)?];
                while self.eat(&TokenKind::Comma) {
                    exprs.push(self.parse_expression(0)?);
                }
                self.expect(TokenKind::RParen, "`)`")?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::Unset(exprs), pos })
            }
            Keyword::Namespace => self.parse_namespace(pos),
            Keyword::Use => self.parse_use(pos),
            Keyword::Function if matches!(self.peek_kind(1), TokenKind::Identifier(_)) => {
                let decl = self.parse_function_decl()?;
                Ok(Stmt { kind: StmtKind::Function(Box::new(decl)), pos })
            }
            Keyword::Abstract | Keyword::Final | Keyword::Readonly if self.class_follows() => {
                let modifiers = self.parse_modifiers();
                self.expect_kw(Keyword::Class)?;
                let decl = self.parse_class_tail(modifiers)?;
                Ok(Stmt { kind: StmtKind::Class(Box::new(decl)), pos })
            }
            Keyword::Class => {
                self.bump();
                let decl = self.parse_class_tail(Modifiers::default())?;
                Ok(Stmt { kind: StmtKind::Class(Box::new(decl)), pos })
            }
            Keyword::Interface => {
                self.bump();
                let decl = self.parse_interface_tail()?;
                Ok(Stmt { kind: StmtKind::Interface(Box::new(decl)), pos })
            }
            Keyword::Trait => {
                self.bump();
                let decl = self.parse_trait_tail()?;
                Ok(Stmt { kind: StmtKind::Trait(Box::new(decl)), pos })
            }
            Keyword::Enum => {
                self.bump();
                let decl = self.parse_enum_tail()?;
                Ok(Stmt { kind: StmtKind::EnumDecl(Box::new(decl)), pos })
            }
            Keyword::Declare => self.parse_declare(pos),
            Keyword::Goto => {
                self.bump();
                let label = self.ident_name()?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::Goto(label), pos })
            }
            Keyword::Const => {
                self.bump();
                // Top-level const declarations desugar to assignment-like
                // expression statements evaluated against the constant table.
                let name = self.ident_name()?;
                self.expect(TokenKind::Assign, "`=`")?;
                let value = self.parse_expression(ASSIGN_BP)?;
                self.eat(&TokenKind::Semicolon);
                let target = Expr { kind: ExprKind::Name(name), pos };
                Ok(Stmt {
                    kind: StmtKind::ExprStmt(Expr {
                        kind: ExprKind::Assign { target: Box::new(target), op: None, value: Box::new(value) },
                        pos,
                    }),
                    pos,
                })
            }
            _ => {
                let expr = self.parse_expression(0)?;
                self.eat(&TokenKind::Semicolon);
                Ok(Stmt { kind: StmtKind::ExprStmt(expr), pos })
            }
        }
    }

    fn class_follows(&self) -> bool {
        let mut i = 0;
        loop {
            match self.peek_kind(i) {
                TokenKind::Keyword(Keyword::Abstract)
                | TokenKind::Keyword(Keyword::Final)
                | TokenKind::Keyword(Keyword::Readonly) => i += 1,
                TokenKind::Keyword(Keyword::Class) => return true,
                _ => return false,
            }
        }
    }

    fn parse_optional_level(&mut self) -> PResult<Option<u32>> {
        if let TokenKind::Int(n) = self.kind() {
            let n = *n as u32;
            self.bump();
            Ok(Some(n))
        } else {
            Ok(None)
        }
    }

    fn expect_variable(&mut self) -> PResult<String> {
        match self.kind().clone() {
            TokenKind::Variable(n) => {
                self.bump();
                Ok(n)
            }
            other => Err(self.error(format!("expected variable, found {other:?}"))),
        }
    }

    fn parse_if(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression(0)?;
        self.expect(TokenKind::RParen, "`)`")?;
        if self.eat(&TokenKind::Colon) {
            return self.parse_if_alt(pos, cond);
        }
        let body = self.parse_body()?;
        let mut elseifs = Vec::new();
        let mut else_body = None;
        loop {
            if self.eat_kw(Keyword::ElseIf) {
                self.expect(TokenKind::LParen, "`(`")?;
                let c = self.parse_expression(0)?;
                self.expect(TokenKind::RParen, "`)`")?;
                elseifs.push((c, self.parse_body()?));
            } else if self.is_kw(Keyword::Else) && matches!(self.peek_kind(1), TokenKind::Keyword(Keyword::If)) {
                self.bump();
                self.bump();
                self.expect(TokenKind::LParen, "`(`")?;
                let c = self.parse_expression(0)?;
                self.expect(TokenKind::RParen, "`)`")?;
                elseifs.push((c, self.parse_body()?));
            } else if self.eat_kw(Keyword::Else) {
                else_body = Some(self.parse_body()?);
                break;
            } else {
                break;
            }
        }
        Ok(Stmt { kind: StmtKind::If { cond, body, elseifs, else_body }, pos })
    }

    fn parse_if_alt(&mut self, pos: Position, cond: Expr) -> PResult<Stmt> {
        let body = self.parse_stmts_until(&[Keyword::ElseIf, Keyword::Else, Keyword::EndIf]);
        let mut elseifs = Vec::new();
        let mut else_body = None;
        loop {
            if self.eat_kw(Keyword::ElseIf) {
                self.expect(TokenKind::LParen, "`(`")?;
                let c = self.parse_expression(0)?;
                self.expect(TokenKind::RParen, "`)`")?;
                self.expect(TokenKind::Colon, "`:`")?;
                elseifs.push((c, self.parse_stmts_until(&[Keyword::ElseIf, Keyword::Else, Keyword::EndIf])));
            } else if self.eat_kw(Keyword::Else) {
                self.expect(TokenKind::Colon, "`:`")?;
                else_body = Some(self.parse_stmts_until(&[Keyword::EndIf]));
                break;
            } else {
                break;
            }
        }
        self.expect_kw(Keyword::EndIf)?;
        self.eat(&TokenKind::Semicolon);
        Ok(Stmt { kind: StmtKind::If { cond, body, elseifs, else_body }, pos })
    }

    fn parse_stmts_until(&mut self, stops: &[Keyword]) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.at_eof() {
            if let TokenKind::Keyword(k) = self.kind() {
                if stops.contains(k) {
                    break;
                }
            }
            match self.parse_statement() {
                Ok(s) => stmts.push(s),
                Err(e) => {
                    self.errors.push(e);
                    self.resync();
                }
            }
        }
        stmts
    }

    fn parse_while(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression(0)?;
        self.expect(TokenKind::RParen, "`)`")?;
        let body = if self.eat(&TokenKind::Colon) {
            let b = self.parse_stmts_until(&[Keyword::EndWhile]);
            self.expect_kw(Keyword::EndWhile)?;
            self.eat(&TokenKind::Semicolon);
            b
        } else {
            self.parse_body()?
        };
        Ok(Stmt { kind: StmtKind::While { cond, body }, pos })
    }

    fn parse_do_while(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        let body = self.parse_body()?;
        self.expect_kw(Keyword::While)?;
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression(0)?;
        self.expect(TokenKind::RParen, "`)`")?;
        self.eat(&TokenKind::Semicolon);
        Ok(Stmt { kind: StmtKind::DoWhile { body, cond }, pos })
    }

    fn parse_for(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        self.expect(TokenKind::LParen, "`(`")?;
        let init = self.parse_expr_list_until(&TokenKind::Semicolon)?;
        self.expect(TokenKind::Semicolon, "`;`")?;
        let cond = self.parse_expr_list_until(&TokenKind::Semicolon)?;
        self.expect(TokenKind::Semicolon, "`;`")?;
        let step = self.parse_expr_list_until(&TokenKind::RParen)?;
        self.expect(TokenKind::RParen, "`)`")?;
        let body = if self.eat(&TokenKind::Colon) {
            let b = self.parse_stmts_until(&[Keyword::EndFor]);
            self.expect_kw(Keyword::EndFor)?;
            self.eat(&TokenKind::Semicolon);
            b
        } else {
            self.parse_body()?
        };
        Ok(Stmt { kind: StmtKind::For { init, cond, step, body }, pos })
    }

    fn parse_expr_list_until(&mut self, stop: &TokenKind) -> PResult<Vec<Expr>> {
        let mut out = Vec::new();
        if self.is(stop) {
            return Ok(out);
        }
        out.push(self.parse_expression(ASSIGN_BP)?);
        while self.eat(&TokenKind::Comma) {
            out.push(self.parse_expression(ASSIGN_BP)?);
        }
        Ok(out)
    }

    fn parse_foreach(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        self.expect(TokenKind::LParen, "`(`")?;
        let expr = self.parse_expression(0)?;
        self.expect_kw(Keyword::As)?;
        let mut by_ref = self.eat(&TokenKind::Amp);
        let mut first = self.parse_expression(ASSIGN_BP)?;
        let (key, value) = if self.eat(&TokenKind::DoubleArrow) {
            by_ref = self.eat(&TokenKind::Amp);
            let value = self.parse_expression(ASSIGN_BP)?;
            (Some(first), value)
        } else {
            (None, std::mem::replace(&mut first, Expr { kind: ExprKind::Null, pos }))
        };
        self.expect(TokenKind::RParen, "`)`")?;
        let body = if self.eat(&TokenKind::Colon) {
            let b = self.parse_stmts_until(&[Keyword::EndForeach]);
            self.expect_kw(Keyword::EndForeach)?;
            self.eat(&TokenKind::Semicolon);
            b
        } else {
            self.parse_body()?
        };
        Ok(Stmt { kind: StmtKind::Foreach { expr, key, value, by_ref, body }, pos })
    }

    fn parse_switch(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        self.expect(TokenKind::LParen, "`(`")?;
        let cond = self.parse_expression(0)?;
        self.expect(TokenKind::RParen, "`)`")?;
        let alt = self.eat(&TokenKind::Colon);
        if !alt {
            self.expect(TokenKind::LBrace, "`{`")?;
        }
        let mut cases = Vec::new();
        loop {
            if self.eat_kw(Keyword::Case) {
                let c = self.parse_expression(0)?;
                if !self.eat(&TokenKind::Colon) {
                    self.eat(&TokenKind::Semicolon);
                }
                let body = self.parse_case_body();
                cases.push(SwitchCase { cond: Some(c), body });
            } else if self.eat_kw(Keyword::Default) {
                if !self.eat(&TokenKind::Colon) {
                    self.eat(&TokenKind::Semicolon);
                }
                let body = self.parse_case_body();
                cases.push(SwitchCase { cond: None, body });
            } else {
                break;
            }
        }
        if alt {
            self.expect_kw(Keyword::EndSwitch)?;
            self.eat(&TokenKind::Semicolon);
        } else {
            self.expect(TokenKind::RBrace, "`}`")?;
        }
        Ok(Stmt { kind: StmtKind::Switch { cond, cases }, pos })
    }

    fn parse_case_body(&mut self) -> Vec<Stmt> {
        self.parse_stmts_until_tokens(&[
            TokenKind::Keyword(Keyword::Case),
            TokenKind::Keyword(Keyword::Default),
            TokenKind::Keyword(Keyword::EndSwitch),
            TokenKind::RBrace,
        ])
    }

    fn parse_stmts_until_tokens(&mut self, stops: &[TokenKind]) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        while !self.at_eof() && !stops.iter().any(|s| self.is(s)) {
            match self.parse_statement() {
                Ok(s) => stmts.push(s),
                Err(e) => {
                    self.errors.push(e);
                    self.resync();
                }
            }
        }
        stmts
    }

    fn parse_try(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        let body = self.parse_block()?;
        let mut catches = Vec::new();
        while self.eat_kw(Keyword::Catch) {
            self.expect(TokenKind::LParen, "`(`")?;
            let mut types = vec![self.parse_qualified_name()?];
            while self.eat(&TokenKind::Pipe) {
                types.push(self.parse_qualified_name()?);
            }
            let var = if let TokenKind::Variable(_) = self.kind() { Some(self.expect_variable()?) } else { None };
            self.expect(TokenKind::RParen, "`)`")?;
            let cbody = self.parse_block()?;
            catches.push(CatchClause { types, var, body: cbody });
        }
        let finally = if self.eat_kw(Keyword::Finally) { Some(self.parse_block()?) } else { None };
        Ok(Stmt { kind: StmtKind::Try { body, catches, finally }, pos })
    }

    fn parse_declare(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        self.expect(TokenKind::LParen, "`(`")?;
        let mut directives = Vec::new();
        loop {
            let name = self.ident_name()?;
            self.expect(TokenKind::Assign, "`=`")?;
            let value = self.parse_expression(ASSIGN_BP)?;
            directives.push((name, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        let body = if self.is(&TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.eat(&TokenKind::Semicolon);
            None
        };
        Ok(Stmt { kind: StmtKind::Declare { directives, body }, pos })
    }

    fn parse_namespace(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        let name = if self.is(&TokenKind::LBrace) || self.is(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_qualified_name()?)
        };
        let body = if self.is(&TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.eat(&TokenKind::Semicolon);
            None
        };
        Ok(Stmt { kind: StmtKind::Namespace { name, body }, pos })
    }

    fn parse_use(&mut self, pos: Position) -> PResult<Stmt> {
        self.bump();
        let mut imports = Vec::new();
        loop {
            let path = self.parse_qualified_name()?;
            let alias = if self.eat_kw(Keyword::As) { Some(self.ident_name()?) } else { None };
            imports.push(UseImport { path, alias });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.eat(&TokenKind::Semicolon);
        Ok(Stmt { kind: StmtKind::Use(imports), pos })
    }

    // -- functions / classes ----------------------------------------------------

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.is(&TokenKind::RParen) {
            self.parse_attributes()?;
            let mut promote_visibility = None;
            let mut promote_readonly = false;
            loop {
                if self.eat_kw(Keyword::Public) {
                    promote_visibility = Some(Visibility::Public);
                } else if self.eat_kw(Keyword::Protected) {
                    promote_visibility = Some(Visibility::Protected);
                } else if self.eat_kw(Keyword::Private) {
                    promote_visibility = Some(Visibility::Private);
                } else if self.eat_kw(Keyword::Readonly) {
                    promote_readonly = true;
                } else {
                    break;
                }
            }
            // Skip an optional type hint (identifiers/`?`/`|` before the `$var`).
            self.skip_type_hint();
            let by_ref = self.eat(&TokenKind::Amp);
            let variadic = self.eat(&TokenKind::Ellipsis);
            let name = self.expect_variable()?;
            let default = if self.eat(&TokenKind::Assign) { Some(self.parse_expression(ASSIGN_BP)?) } else { None };
            params.push(Param { name, default, by_ref, variadic, promote_visibility, promote_readonly });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(params)
    }

    fn skip_type_hint(&mut self) {
        loop {
            match self.kind() {
                TokenKind::Question => {
                    self.bump();
                }
                TokenKind::Identifier(_)
                | TokenKind::NameQualified(_)
                | TokenKind::NameFullyQualified(_)
                | TokenKind::NameRelative(_)
                | TokenKind::Backslash
                | TokenKind::Keyword(Keyword::Array)
                | TokenKind::Keyword(Keyword::Callable)
                | TokenKind::Keyword(Keyword::Static)
                    if !matches!(self.peek_kind(1), TokenKind::Variable(_)) || self.is(&TokenKind::Question) =>
                {
                    self.bump();
                }
                TokenKind::Pipe | TokenKind::Amp
                    if matches!(
                        self.peek_kind(1),
                        TokenKind::Identifier(_) | TokenKind::NameQualified(_) | TokenKind::Keyword(Keyword::Array)
                    ) =>
                {
                    self.bump();
                }
                TokenKind::Identifier(_)
                | TokenKind::NameQualified(_)
                | TokenKind::NameFullyQualified(_)
                | TokenKind::NameRelative(_)
                | TokenKind::Keyword(Keyword::Array)
                | TokenKind::Keyword(Keyword::Callable)
                | TokenKind::Keyword(Keyword::Static)
                    if matches!(self.peek_kind(1), TokenKind::Variable(_)) =>
                {
                    self.bump();
                    break;
                }
                _ => break,
            }
        }
    }

    fn skip_return_type(&mut self) {
        if self.eat(&TokenKind::Colon) {
            self.eat(&TokenKind::Question);
            loop {
                let _ = self.ident_name();
                if !self.eat(&TokenKind::Pipe) && !self.eat(&TokenKind::Amp) {
                    break;
                }
            }
        }
    }

    fn parse_function_decl(&mut self) -> PResult<FunctionDecl> {
        self.expect_kw(Keyword::Function)?;
        let by_ref = self.eat(&TokenKind::Amp);
        let name = self.ident_name()?;
        let params = self.parse_params()?;
        self.skip_return_type();
        let body = self.parse_block()?;
        let is_generator = body_contains_yield(&body);
        Ok(FunctionDecl { name, attributes: Vec::new(), params, by_ref, body, is_generator })
    }

    fn parse_class_tail(&mut self, modifiers: Modifiers) -> PResult<ClassDecl> {
        let name = self.ident_name()?;
        let extends = if self.eat_kw(Keyword::Extends) { Some(self.parse_qualified_name()?) } else { None };
        let mut implements = Vec::new();
        if self.eat_kw(Keyword::Implements) {
            implements.push(self.parse_qualified_name()?);
            while self.eat(&TokenKind::Comma) {
                implements.push(self.parse_qualified_name()?);
            }
        }
        let members = self.parse_class_body()?;
        Ok(ClassDecl { name, attributes: Vec::new(), modifiers, extends, implements, members })
    }

    fn parse_interface_tail(&mut self) -> PResult<InterfaceDecl> {
        let name = self.ident_name()?;
        let mut extends = Vec::new();
        if self.eat_kw(Keyword::Extends) {
            extends.push(self.parse_qualified_name()?);
            while self.eat(&TokenKind::Comma) {
                extends.push(self.parse_qualified_name()?);
            }
        }
        let members = self.parse_class_body()?;
        Ok(InterfaceDecl { name, attributes: Vec::new(), extends, members })
    }

    fn parse_trait_tail(&mut self) -> PResult<TraitDecl> {
        let name = self.ident_name()?;
        let members = self.parse_class_body()?;
        Ok(TraitDecl { name, attributes: Vec::new(), members })
    }

    fn parse_enum_tail(&mut self) -> PResult<EnumDecl> {
        let name = self.ident_name()?;
        let backing = if self.eat(&TokenKind::Colon) { Some(self.ident_name()?) } else { None };
        let mut implements = Vec::new();
        if self.eat_kw(Keyword::Implements) {
            implements.push(self.parse_qualified_name()?);
            while self.eat(&TokenKind::Comma) {
                implements.push(self.parse_qualified_name()?);
            }
        }
        let members = self.parse_class_body()?;
        Ok(EnumDecl { name, attributes: Vec::new(), backing, implements, members })
    }

    fn parse_class_body(&mut self) -> PResult<Vec<ClassMember>> {
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut members = Vec::new();
        while !self.is(&TokenKind::RBrace) && !self.at_eof() {
            self.parse_attributes()?;
            match self.parse_class_member() {
                Ok(ms) => members.extend(ms),
                Err(e) => {
                    self.errors.push(e);
                    self.resync();
                }
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(members)
    }

    fn parse_class_member(&mut self) -> PResult<Vec<ClassMember>> {
        if self.eat_kw(Keyword::Use) {
            let mut names = vec![self.parse_qualified_name()?];
            while self.eat(&TokenKind::Comma) {
                names.push(self.parse_qualified_name()?);
            }
            let mut aliases = Vec::new();
            if self.eat(&TokenKind::LBrace) {
                while !self.is(&TokenKind::RBrace) && !self.at_eof() {
                    let lhs = self.parse_qualified_name()?;
                    let (from, method) = if self.eat(&TokenKind::ColonColon) { (lhs, self.ident_name()?) } else { (String::new(), lhs) };
                    if self.eat_kw(Keyword::As) {
                        let alias = self.ident_name()?;
                        aliases.push((from, method, alias));
                    } else if self.eat_kw(Keyword::Insteadof) {
                        let _ = self.parse_qualified_name()?;
                    }
                    self.eat(&TokenKind::Semicolon);
                }
                self.expect(TokenKind::RBrace, "`}`")?;
            } else {
                self.eat(&TokenKind::Semicolon);
            }
            return Ok(vec![ClassMember::UseTrait { names, aliases }]);
        }
        if self.eat_kw(Keyword::Case) {
            let name = self.ident_name()?;
            let value = if self.eat(&TokenKind::Assign) { Some(self.parse_expression(ASSIGN_BP)?) } else { None };
            self.eat(&TokenKind::Semicolon);
            return Ok(vec![ClassMember::EnumCase { name, value }]);
        }
        let modifiers = self.parse_modifiers();
        if self.eat_kw(Keyword::Const) {
            self.skip_type_hint_for_const();
            let name = self.ident_name()?;
            self.expect(TokenKind::Assign, "`=`")?;
            let value = self.parse_expression(ASSIGN_BP)?;
            self.eat(&TokenKind::Semicolon);
            return Ok(vec![ClassMember::Const(ConstDecl { name, value })]);
        }
        if self.eat_kw(Keyword::Function) {
            let by_ref = self.eat(&TokenKind::Amp);
            let name = self.ident_name()?;
            let params = self.parse_params()?;
            self.skip_return_type();
            let body = if self.is(&TokenKind::LBrace) {
                let b = self.parse_block()?;
                Some(b)
            } else {
                self.eat(&TokenKind::Semicolon);
                None
            };
            let is_generator = body.as_ref().is_some_and(|b| body_contains_yield(b));
            return Ok(vec![ClassMember::Method(MethodDecl { name, modifiers, params, by_ref, body, is_generator })]);
        }
        // Property declaration, optionally typed. A single `modifiers $a = 1, $b = 2;`
        // line declares multiple properties, each of which must survive.
        self.skip_type_hint();
        let name = self.expect_variable()?;
        let default = if self.eat(&TokenKind::Assign) { Some(self.parse_expression(ASSIGN_BP)?) } else { None };
        let mut decls = vec![PropertyDecl { name, default, modifiers }];
        while self.eat(&TokenKind::Comma) {
            let name = self.expect_variable()?;
            let default = if self.eat(&TokenKind::Assign) { Some(self.parse_expression(ASSIGN_BP)?) } else { None };
            decls.push(PropertyDecl { name, default, modifiers });
        }
        self.eat(&TokenKind::Semicolon);
        Ok(decls.into_iter().map(ClassMember::Property).collect())
    }

    fn skip_type_hint_for_const(&mut self) {
        if matches!(self.peek_kind(1), TokenKind::Assign) {
            return;
        }
        self.skip_type_hint();
    }

    // -- expressions --------------------------------------------------------

    pub fn parse_expression(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut lhs = self.parse_prefix()?;
        loop {
            if let Some(bp) = self.ternary_bp() {
                if bp < min_bp {
                    break;
                }
                lhs = self.parse_ternary_tail(lhs)?;
                continue;
            }
            if let Some((op, lbp, right_assoc)) = self.infix_op() {
                if lbp < min_bp {
                    break;
                }
                let pos = lhs.pos;
                self.bump();
                let next_min = if right_assoc { lbp } else { lbp + 1 };
                let rhs = self.parse_expression(next_min)?;
                lhs = Expr { kind: ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, pos };
                continue;
            }
            if self.is_kw(Keyword::Instanceof) {
                if INSTANCEOF_BP < min_bp {
                    break;
                }
                let pos = lhs.pos;
                self.bump();
                let class = self.parse_class_ref()?;
                lhs = Expr { kind: ExprKind::Instanceof { expr: Box::new(lhs), class: Box::new(class) }, pos };
                continue;
            }
            if self.is(&TokenKind::QuestionQuestion) {
                if COALESCE_BP < min_bp {
                    break;
                }
                let pos = lhs.pos;
                self.bump();
                let rhs = self.parse_expression(COALESCE_BP)?; // right-assoc
                lhs = Expr { kind: ExprKind::Coalesce { lhs: Box::new(lhs), rhs: Box::new(rhs) }, pos };
                continue;
            }
            if self.is_assign_op() {
                if ASSIGN_BP < min_bp {
                    break;
                }
                lhs = self.parse_assign_tail(lhs)?;
                continue;
            }
            break;
        }
        Ok(lhs)
    }

    fn ternary_bp(&self) -> Option<u8> {
        if self.is(&TokenKind::Question) {
            Some(TERNARY_BP)
        } else {
            None
        }
    }

    fn parse_ternary_tail(&mut self, cond: Expr) -> PResult<Expr> {
        let pos = cond.pos;
        self.bump(); // ?
        if self.eat(&TokenKind::Colon) {
            let else_ = self.parse_expression(TERNARY_BP)?;
            return Ok(Expr { kind: ExprKind::Ternary { cond: Box::new(cond), then: None, else_: Box::new(else_) }, pos });
        }
        let then = self.parse_expression(0)?;
        self.expect(TokenKind::Colon, "`:`")?;
        let else_ = self.parse_expression(TERNARY_BP)?;
        Ok(Expr { kind: ExprKind::Ternary { cond: Box::new(cond), then: Some(Box::new(then)), else_: Box::new(else_) }, pos })
    }

    fn is_assign_op(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::Assign
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
                | TokenKind::PowEq
                | TokenKind::DotEq
                | TokenKind::AmpEq
                | TokenKind::PipeEq
                | TokenKind::CaretEq
                | TokenKind::ShlEq
                | TokenKind::ShrEq
                | TokenKind::CoalesceEq
        )
    }

    fn parse_assign_tail(&mut self, target: Expr) -> PResult<Expr> {
        let pos = target.pos;
        let op_tok = self.bump().kind;
        if op_tok == TokenKind::Assign && self.eat(&TokenKind::Amp) {
            let value = self.parse_expression(ASSIGN_BP)?;
            return Ok(Expr { kind: ExprKind::AssignRef { target: Box::new(target), value: Box::new(value) }, pos });
        }
        if op_tok == TokenKind::CoalesceEq {
            let value = self.parse_expression(ASSIGN_BP)?;
            return Ok(Expr { kind: ExprKind::CoalesceAssign { target: Box::new(target), value: Box::new(value) }, pos });
        }
        let op = match op_tok {
            TokenKind::Assign => None,
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            TokenKind::PercentEq => Some(BinOp::Mod),
            TokenKind::PowEq => Some(BinOp::Pow),
            TokenKind::DotEq => Some(BinOp::Concat),
            TokenKind::AmpEq => Some(BinOp::BitAnd),
            TokenKind::PipeEq => Some(BinOp::BitOr),
            TokenKind::CaretEq => Some(BinOp::BitXor),
            TokenKind::ShlEq => Some(BinOp::Shl),
            TokenKind::ShrEq => Some(BinOp::Shr),
            _ => unreachable!(),
        };
        let value = self.parse_expression(ASSIGN_BP)?;
        Ok(Expr { kind: ExprKind::Assign { target: Box::new(target), op, value: Box::new(value) }, pos })
    }

    fn infix_op(&self) -> Option<(BinOp, u8, bool)> {
        let (op, bp, right) = match self.kind() {
            TokenKind::PipePipe => (BinOp::Or, OR_BP, false),
            TokenKind::Keyword(Keyword::Or) => (BinOp::Or, OR_BP, false),
            TokenKind::Keyword(Keyword::Xor) => (BinOp::Xor, XOR_BP, false),
            TokenKind::AmpAmp => (BinOp::And, AND_BP, false),
            TokenKind::Keyword(Keyword::And) => (BinOp::And, AND_BP, false),
            TokenKind::Pipe => (BinOp::BitOr, BITOR_BP, false),
            TokenKind::Caret => (BinOp::BitXor, BITXOR_BP, false),
            TokenKind::Amp => (BinOp::BitAnd, BITAND_BP, false),
            TokenKind::Eq => (BinOp::Eq, EQUALITY_BP, false),
            TokenKind::NotEq | TokenKind::AltNotEq => (BinOp::NotEq, EQUALITY_BP, false),
            TokenKind::Identical => (BinOp::Identical, EQUALITY_BP, false),
            TokenKind::NotIdentical => (BinOp::NotIdentical, EQUALITY_BP, false),
            TokenKind::Lt => (BinOp::Lt, COMPARISON_BP, false),
            TokenKind::Le => (BinOp::Le, COMPARISON_BP, false),
            TokenKind::Gt => (BinOp::Gt, COMPARISON_BP, false),
            TokenKind::Ge => (BinOp::Ge, COMPARISON_BP, false),
            TokenKind::Spaceship => (BinOp::Spaceship, COMPARISON_BP, false),
            TokenKind::Dot => (BinOp::Concat, CONCAT_BP, false),
            TokenKind::Shl => (BinOp::Shl, SHIFT_BP, false),
            TokenKind::Shr => (BinOp::Shr, SHIFT_BP, false),
            TokenKind::Plus => (BinOp::Add, SUM_BP, false),
            TokenKind::Minus => (BinOp::Sub, SUM_BP, false),
            TokenKind::Star => (BinOp::Mul, PRODUCT_BP, false),
            TokenKind::Slash => (BinOp::Div, PRODUCT_BP, false),
            TokenKind::Percent => (BinOp::Mod, PRODUCT_BP, false),
            TokenKind::Pow => (BinOp::Pow, POW_BP, true),
            _ => return None,
        };
        Some((op, bp, right))
    }

    fn parse_class_ref(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        if let TokenKind::Variable(_) = self.kind() {
            return self.parse_unary();
        }
        let name = self.parse_qualified_name()?;
        Ok(Expr { kind: ExprKind::Name(name), pos })
    }

    fn parse_prefix(&mut self) -> PResult<Expr> {
        self.parse_unary()
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        match self.kind().clone() {
            TokenKind::Bang => {
                self.bump();
                Ok(Expr { kind: ExprKind::Unary { op: UnOp::Not, expr: Box::new(self.parse_expression(POW_BP)?) }, pos })
            }
            TokenKind::Tilde => {
                self.bump();
                Ok(Expr { kind: ExprKind::Unary { op: UnOp::BitNot, expr: Box::new(self.parse_expression(POW_BP)?) }, pos })
            }
            TokenKind::Minus => {
                self.bump();
                Ok(Expr { kind: ExprKind::Unary { op: UnOp::Neg, expr: Box::new(self.parse_expression(POW_BP)?) }, pos })
            }
            TokenKind::Plus => {
                self.bump();
                Ok(Expr { kind: ExprKind::Unary { op: UnOp::Pos, expr: Box::new(self.parse_expression(POW_BP)?) }, pos })
            }
            TokenKind::At => {
                self.bump();
                Ok(Expr { kind: ExprKind::ErrorSuppress(Box::new(self.parse_expression(POW_BP)?)), pos })
            }
            TokenKind::Inc => {
                self.bump();
                let target = self.parse_expression(POW_BP)?;
                Ok(Expr { kind: ExprKind::IncDec { op: IncDecOp::PreInc, target: Box::new(target) }, pos })
            }
            TokenKind::Dec => {
                self.bump();
                let target = self.parse_expression(POW_BP)?;
                Ok(Expr { kind: ExprKind::IncDec { op: IncDecOp::PreDec, target: Box::new(target) }, pos })
            }
            TokenKind::Cast(kind) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Cast { kind, expr: Box::new(self.parse_expression(POW_BP)?) }, pos })
            }
            TokenKind::Keyword(Keyword::Print) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Print(Box::new(self.parse_expression(ASSIGN_BP)?)), pos })
            }
            TokenKind::Keyword(Keyword::Throw) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Throw(Box::new(self.parse_expression(ASSIGN_BP)?)), pos })
            }
            TokenKind::Keyword(Keyword::Clone) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Clone(Box::new(self.parse_expression(POW_BP)?)), pos })
            }
            TokenKind::Keyword(Keyword::New) => self.parse_new(),
            TokenKind::Keyword(Keyword::Yield) => self.parse_yield(),
            TokenKind::Keyword(Keyword::Isset) => {
                self.bump();
                self.expect(TokenKind::LParen, "`(`")?;
                let mut vars = vec![self.parse_expression(0)?];
                while self.eat(&TokenKind::Comma) {
                    vars.push(self.parse_expression(0)?);
                }
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Expr { kind: ExprKind::Isset(vars), pos })
            }
            TokenKind::Keyword(Keyword::Empty) => {
                self.bump();
                self.expect(TokenKind::LParen, "`(`")?;
                let e = self.parse_expression(0)?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Expr { kind: ExprKind::Empty(Box::new(e)), pos })
            }
            TokenKind::Keyword(Keyword::Eval) => {
                self.bump();
                self.expect(TokenKind::LParen, "`(`")?;
                let e = self.parse_expression(0)?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Expr { kind: ExprKind::Eval(Box::new(e)), pos })
            }
            TokenKind::Keyword(Keyword::Exit) => {
                self.bump();
                let arg = if self.eat(&TokenKind::LParen) {
                    let a = if self.is(&TokenKind::RParen) { None } else { Some(Box::new(self.parse_expression(0)?)) };
                    self.expect(TokenKind::RParen, "`)`")?;
                    a
                } else {
                    None
                };
                Ok(Expr { kind: ExprKind::Exit(arg), pos })
            }
            TokenKind::Keyword(Keyword::List) => self.parse_list_destructure(),
            TokenKind::Keyword(Keyword::Match) => self.parse_match(),
            TokenKind::Keyword(Keyword::Function) => self.parse_closure(false),
            TokenKind::Keyword(Keyword::Static)
                if matches!(self.peek_kind(1), TokenKind::Keyword(Keyword::Function))
                    || matches!(self.peek_kind(1), TokenKind::Keyword(Keyword::Fn)) =>
            {
                self.bump();
                if self.is_kw(Keyword::Fn) {
                    self.parse_arrow_fn(true)
                } else {
                    self.parse_closure(true)
                }
            }
            TokenKind::Keyword(Keyword::Fn) => self.parse_arrow_fn(false),
            TokenKind::Keyword(Keyword::Include) => self.parse_include(IncludeKind::Include),
            TokenKind::Keyword(Keyword::IncludeOnce) => self.parse_include(IncludeKind::IncludeOnce),
            TokenKind::Keyword(Keyword::Require) => self.parse_include(IncludeKind::Require),
            TokenKind::Keyword(Keyword::RequireOnce) => self.parse_include(IncludeKind::RequireOnce),
            TokenKind::Amp => {
                // `&$x` as an rvalue in foreach/return-by-ref contexts; treat
                // as transparent since reference semantics are resolved by
                // the enclosing construct.
                self.bump();
                self.parse_unary()
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_include(&mut self, kind: IncludeKind) -> PResult<Expr> {
        let pos = self.pos_at();
        self.bump();
        let path = self.parse_expression(ASSIGN_BP)?;
        Ok(Expr { kind: ExprKind::Include { kind, path: Box::new(path) }, pos })
    }

    fn parse_yield(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        self.bump();
        if matches!(self.kind(), TokenKind::Identifier(s) if s.eq_ignore_ascii_case("from")) {
            self.bump();
            let e = self.parse_expression(ASSIGN_BP)?;
            return Ok(Expr { kind: ExprKind::YieldFrom(Box::new(e)), pos });
        }
        if self.is(&TokenKind::Semicolon) || self.is(&TokenKind::RParen) || self.is(&TokenKind::RBracket) || self.is(&TokenKind::Comma) || self.at_eof() {
            return Ok(Expr { kind: ExprKind::Yield { key: None, value: None }, pos });
        }
        let first = self.parse_expression(ASSIGN_BP)?;
        if self.eat(&TokenKind::DoubleArrow) {
            let value = self.parse_expression(ASSIGN_BP)?;
            return Ok(Expr { kind: ExprKind::Yield { key: Some(Box::new(first)), value: Some(Box::new(value)) }, pos });
        }
        Ok(Expr { kind: ExprKind::Yield { key: None, value: Some(Box::new(first)) }, pos })
    }

    fn parse_new(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        self.bump();
        let class = if let TokenKind::Variable(_) = self.kind() {
            self.parse_postfix()?
        } else if self.is(&TokenKind::LParen) {
            self.bump();
            let e = self.parse_expression(0)?;
            self.expect(TokenKind::RParen, "`)`")?;
            e
        } else {
            let name = self.parse_qualified_name()?;
            Expr { kind: ExprKind::Name(name), pos }
        };
        let args = if self.is(&TokenKind::LParen) { self.parse_args()? } else { Vec::new() };
        Ok(Expr { kind: ExprKind::New { class: Box::new(class), args }, pos })
    }

    fn parse_list_destructure(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        self.bump();
        self.expect(TokenKind::LParen, "`(`")?;
        let items = self.parse_array_items(TokenKind::RParen)?;
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(Expr { kind: ExprKind::List(items.into_iter().map(Some).collect()), pos })
    }

    fn parse_match(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        self.bump();
        self.expect(TokenKind::LParen, "`(`")?;
        let subject = self.parse_expression(0)?;
        self.expect(TokenKind::RParen, "`)`")?;
        self.expect(TokenKind::LBrace, "`{`")?;
        let mut arms = Vec::new();
        while !self.is(&TokenKind::RBrace) && !self.at_eof() {
            if self.eat_kw(Keyword::Default) {
                self.expect(TokenKind::DoubleArrow, "`=>`")?;
                let body = self.parse_expression(ASSIGN_BP)?;
                arms.push(MatchArm { conds: None, body });
            } else {
                let mut conds = vec![self.parse_expression(ASSIGN_BP)?];
                while self.eat(&TokenKind::Comma) && !self.is(&TokenKind::DoubleArrow) {
                    conds.push(self.parse_expression(ASSIGN_BP)?);
                }
                self.expect(TokenKind::DoubleArrow, "`=>`")?;
                let body = self.parse_expression(ASSIGN_BP)?;
                arms.push(MatchArm { conds: Some(conds), body });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "`}`")?;
        Ok(Expr { kind: ExprKind::Match { subject: Box::new(subject), arms }, pos })
    }

    fn parse_closure(&mut self, is_static: bool) -> PResult<Expr> {
        let pos = self.pos_at();
        self.expect_kw(Keyword::Function)?;
        let by_ref = self.eat(&TokenKind::Amp);
        let params = self.parse_params()?;
        let mut uses = Vec::new();
        if self.eat_kw(Keyword::Use) {
            self.expect(TokenKind::LParen, "`(`")?;
            while !self.is(&TokenKind::RParen) {
                let by_ref = self.eat(&TokenKind::Amp);
                let name = self.expect_variable()?;
                uses.push(ClosureUse { name, by_ref });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen, "`)`")?;
        }
        self.skip_return_type();
        let body = self.parse_block()?;
        let is_generator = body_contains_yield(&body);
        Ok(Expr { kind: ExprKind::Closure { params, uses, is_static, by_ref, body, is_generator }, pos })
    }

    fn parse_arrow_fn(&mut self, is_static: bool) -> PResult<Expr> {
        let pos = self.pos_at();
        self.expect_kw(Keyword::Fn)?;
        self.eat(&TokenKind::Amp);
        let params = self.parse_params()?;
        self.skip_return_type();
        self.expect(TokenKind::DoubleArrow, "`=>`")?;
        let body = self.parse_expression(ASSIGN_BP)?;
        Ok(Expr { kind: ExprKind::ArrowFunc { params, is_static, body: Box::new(body) }, pos })
    }

    fn parse_args(&mut self) -> PResult<Vec<Arg>> {
        self.expect(TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        while !self.is(&TokenKind::RParen) {
            let unpack = self.eat(&TokenKind::Ellipsis);
            let name = if !unpack {
                if let TokenKind::Identifier(n) = self.kind().clone() {
                    if matches!(self.peek_kind(1), TokenKind::Colon) && !matches!(self.peek_kind(2), TokenKind::Colon) {
                        self.bump();
                        self.bump();
                        Some(n)
                    } else {
                        None
                    }
                } else {
                    None
                }
            } else {
                None
            };
            let value = self.parse_expression(ASSIGN_BP)?;
            args.push(Arg { name, value, unpack });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        Ok(args)
    }

    fn parse_array_items(&mut self, end: TokenKind) -> PResult<Vec<ArrayItem>> {
        let mut items = Vec::new();
        while !self.is(&end) {
            if self.is(&TokenKind::Comma) {
                // Skipped slot in a `list()` destructure.
                self.bump();
                continue;
            }
            let unpack = self.eat(&TokenKind::Ellipsis);
            let by_ref = self.eat(&TokenKind::Amp);
            let first = self.parse_expression(ASSIGN_BP)?;
            let (key, value, by_ref) = if self.eat(&TokenKind::DoubleArrow) {
                let by_ref2 = self.eat(&TokenKind::Amp);
                let value = self.parse_expression(ASSIGN_BP)?;
                (Some(first), value, by_ref2)
            } else {
                (None, first, by_ref)
            };
            items.push(ArrayItem { key, value, by_ref, unpack });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let pos = expr.pos;
            match self.kind().clone() {
                TokenKind::LBracket => {
                    self.bump();
                    let index = if self.is(&TokenKind::RBracket) { None } else { Some(Box::new(self.parse_expression(0)?)) };
                    self.expect(TokenKind::RBracket, "`]`")?;
                    expr = Expr { kind: ExprKind::ArrayAccess { array: Box::new(expr), index }, pos };
                }
                TokenKind::LBrace if is_legacy_string_offset(&expr) => {
                    self.bump();
                    let index = Some(Box::new(self.parse_expression(0)?));
                    self.expect(TokenKind::RBrace, "`}`")?;
                    expr = Expr { kind: ExprKind::ArrayAccess { array: Box::new(expr), index }, pos };
                }
                TokenKind::Arrow | TokenKind::QuestionArrow => {
                    let nullsafe = matches!(self.kind(), TokenKind::QuestionArrow);
                    self.bump();
                    let member = self.parse_member_name()?;
                    if self.is(&TokenKind::LParen) {
                        let args = self.parse_args()?;
                        expr = Expr { kind: ExprKind::MethodCall { object: Box::new(expr), nullsafe, method: Box::new(member), args }, pos };
                    } else {
                        expr = Expr { kind: ExprKind::PropertyFetch { object: Box::new(expr), nullsafe, property: Box::new(member) }, pos };
                    }
                }
                TokenKind::ColonColon => {
                    self.bump();
                    if let TokenKind::Variable(name) = self.kind().clone() {
                        self.bump();
                        expr = Expr { kind: ExprKind::StaticPropertyFetch { class: Box::new(expr), property: name }, pos };
                    } else if self.eat_kw(Keyword::Class) {
                        expr = Expr { kind: ExprKind::ClassConstFetch { class: Box::new(expr), constant: "class".to_string() }, pos };
                    } else if self.is(&TokenKind::LBrace) {
                        self.bump();
                        let e = self.parse_expression(0)?;
                        self.expect(TokenKind::RBrace, "`}`")?;
                        let _ = e;
                        expr = Expr { kind: ExprKind::ClassConstFetch { class: Box::new(expr), constant: String::new() }, pos };
                    } else {
                        let name = self.ident_name()?;
                        if self.is(&TokenKind::LParen) {
                            let args = self.parse_args()?;
                            expr = Expr { kind: ExprKind::StaticCall { class: Box::new(expr), method: name, args }, pos };
                        } else {
                            expr = Expr { kind: ExprKind::ClassConstFetch { class: Box::new(expr), constant: name }, pos };
                        }
                    }
                }
                TokenKind::LParen => {
                    let args = self.parse_args()?;
                    expr = Expr { kind: ExprKind::Call { callee: Box::new(expr), args }, pos };
                }
                TokenKind::Inc => {
                    self.bump();
                    expr = Expr { kind: ExprKind::IncDec { op: IncDecOp::PostInc, target: Box::new(expr) }, pos };
                }
                TokenKind::Dec => {
                    self.bump();
                    expr = Expr { kind: ExprKind::IncDec { op: IncDecOp::PostDec, target: Box::new(expr) }, pos };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_member_name(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        if let TokenKind::Variable(name) = self.kind().clone() {
            self.bump();
            return Ok(Expr { kind: ExprKind::Variable(name), pos });
        }
        if self.eat(&TokenKind::LBrace) {
            let e = self.parse_expression(0)?;
            self.expect(TokenKind::RBrace, "`}`")?;
            return Ok(e);
        }
        let name = self.ident_name()?;
        Ok(Expr { kind: ExprKind::String(name.into_bytes()), pos })
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        match self.cur().kind.clone() {
            TokenKind::Int(n) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Int(n), pos })
            }
            TokenKind::Float(f) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Float(f), pos })
            }
            TokenKind::StringLiteral(s) => {
                self.bump();
                Ok(Expr { kind: ExprKind::String(s), pos })
            }
            TokenKind::DoubleQuote => self.parse_encapsed(),
            TokenKind::HeredocStart { nowdoc, .. } => self.parse_heredoc(nowdoc),
            TokenKind::Variable(name) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Variable(name), pos })
            }
            TokenKind::Dollar => {
                self.bump();
                if self.eat(&TokenKind::LBrace) {
                    let e = self.parse_expression(0)?;
                    self.expect(TokenKind::RBrace, "`}`")?;
                    Ok(Expr { kind: ExprKind::VariableVariable(Box::new(e)), pos })
                } else {
                    let inner = self.parse_primary()?;
                    Ok(Expr { kind: ExprKind::VariableVariable(Box::new(inner)), pos })
                }
            }
            TokenKind::Keyword(Keyword::True) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Bool(true), pos })
            }
            TokenKind::Keyword(Keyword::False) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Bool(false), pos })
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Null, pos })
            }
            TokenKind::Keyword(Keyword::Array) if matches!(self.peek_kind(1), TokenKind::LParen) => {
                self.bump();
                self.bump();
                let items = self.parse_array_items(TokenKind::RParen)?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(Expr { kind: ExprKind::ArrayLiteral(items), pos })
            }
            TokenKind::LBracket => {
                self.bump();
                let items = self.parse_array_items(TokenKind::RBracket)?;
                self.expect(TokenKind::RBracket, "`]`")?;
                Ok(Expr { kind: ExprKind::ArrayLiteral(items), pos })
            }
            TokenKind::LParen => {
                self.bump();
                let e = self.parse_expression(0)?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(e)
            }
            TokenKind::Keyword(Keyword::Static) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Name("static".to_string()), pos })
            }
            TokenKind::Identifier(name) => {
                self.bump();
                if name.starts_with("__") && name.ends_with("__") {
                    return Ok(Expr { kind: ExprKind::MagicConst(name), pos });
                }
                Ok(Expr { kind: ExprKind::Name(name), pos })
            }
            TokenKind::NameQualified(name) | TokenKind::NameFullyQualified(name) | TokenKind::NameRelative(name) => {
                self.bump();
                Ok(Expr { kind: ExprKind::Name(name), pos })
            }
            TokenKind::Backslash => {
                self.bump();
                let name = self.ident_name()?;
                Ok(Expr { kind: ExprKind::Name(name), pos })
            }
            other => Err(self.error(format!("unexpected token {other:?} in expression"))),
        }
    }

    fn parse_encapsed(&mut self) -> PResult<Expr> {
        let pos = self.pos_at();
        self.bump(); // opening quote
        let mut parts = Vec::new();
        loop {
            match self.cur().kind.clone() {
                TokenKind::DoubleQuote => {
                    self.bump();
                    break;
                }
                TokenKind::EncapsedAndWhitespace(bytes) => {
                    self.bump();
                    parts.push(StringPart::Literal(bytes));
                }
                TokenKind::Variable(name) => {
                    self.bump();
                    let mut e = Expr { kind: ExprKind::Variable(name), pos };
                    if self.is(&TokenKind::LBracket) {
                        self.bump();
                        let idx = self.parse_primary()?;
                        self.expect(TokenKind::RBracket, "`]`")?;
                        e = Expr { kind: ExprKind::ArrayAccess { array: Box::new(e), index: Some(Box::new(idx)) }, pos };
                    } else if self.eat(&TokenKind::Arrow) {
                        let name = self.ident_name()?;
                        e = Expr {
                            kind: ExprKind::PropertyFetch {
                                object: Box::new(e),
                                nullsafe: false,
                                property: Box::new(Expr { kind: ExprKind::String(name.into_bytes()), pos }),
                            },
                            pos,
                        };
                    }
                    parts.push(StringPart::Expr(e));
                }
                TokenKind::CurlyOpen => {
                    self.bump();
                    let e = self.parse_expression(0)?;
                    self.expect(TokenKind::RBrace, "`}`")?;
                    parts.push(StringPart::Expr(e));
                }
                TokenKind::DollarOpenCurlyBraces => {
                    self.bump();
                    let name = self.ident_name()?;
                    self.expect(TokenKind::RBrace, "`}`")?;
                    parts.push(StringPart::Expr(Expr { kind: ExprKind::Variable(name), pos }));
                }
                _ => {
                    return Err(self.error("malformed interpolated string"));
                }
            }
        }
        Ok(collapse_encapsed(parts, pos))
    }

    fn parse_heredoc(&mut self, nowdoc: bool) -> PResult<Expr> {
        let pos = self.pos_at();
        self.bump(); // HeredocStart
        if nowdoc {
            let mut bytes = Vec::new();
            if let TokenKind::EncapsedAndWhitespace(b) = self.cur().kind.clone() {
                self.bump();
                bytes = b;
            }
            self.expect_heredoc_end()?;
            return Ok(Expr { kind: ExprKind::String(bytes), pos });
        }
        let mut parts = Vec::new();
        loop {
            match self.cur().kind.clone() {
                TokenKind::HeredocEnd { .. } => {
                    self.bump();
                    break;
                }
                TokenKind::EncapsedAndWhitespace(bytes) => {
                    self.bump();
                    parts.push(StringPart::Literal(bytes));
                }
                TokenKind::Variable(name) => {
                    self.bump();
                    parts.push(StringPart::Expr(Expr { kind: ExprKind::Variable(name), pos }));
                }
                TokenKind::CurlyOpen => {
                    self.bump();
                    let e = self.parse_expression(0)?;
                    self.expect(TokenKind::RBrace, "`}`")?;
                    parts.push(StringPart::Expr(e));
                }
                _ => {
                    return Err(self.error("malformed heredoc body"));
                }
            }
        }
        Ok(collapse_encapsed(parts, pos))
    }

    fn expect_heredoc_end(&mut self) -> PResult<()> {
        if matches!(self.kind(), TokenKind::HeredocEnd { .. }) {
            self.bump();
            Ok(())
        } else {
            Err(self.error("expected heredoc terminator"))
        }
    }
}

fn collapse_encapsed(parts: Vec<StringPart>, pos: Position) -> Expr {
    if parts.is_empty() {
        return Expr { kind: ExprKind::String(Vec::new()), pos };
    }
    if parts.len() == 1 {
        if let StringPart::Literal(b) = &parts[0] {
            return Expr { kind: ExprKind::String(b.clone()), pos };
        }
    }
    Expr { kind: ExprKind::Encapsed(parts), pos }
}

fn is_legacy_string_offset(_expr: &Expr) -> bool {
    false
}

fn body_contains_yield(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_contains_yield)
}

fn stmt_contains_yield(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Block(s) => body_contains_yield(s),
        StmtKind::If { cond, body, elseifs, else_body } => {
            expr_contains_yield(cond)
                || body_contains_yield(body)
                || elseifs.iter().any(|(c, b)| expr_contains_yield(c) || body_contains_yield(b))
                || else_body.as_ref().is_some_and(|b| body_contains_yield(b))
        }
        StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => expr_contains_yield(cond) || body_contains_yield(body),
        StmtKind::For { init, cond, step, body } => {
            init.iter().any(expr_contains_yield)
                || cond.iter().any(expr_contains_yield)
                || step.iter().any(expr_contains_yield)
                || body_contains_yield(body)
        }
        StmtKind::Foreach { expr, body, .. } => expr_contains_yield(expr) || body_contains_yield(body),
        StmtKind::Switch { cond, cases } => {
            expr_contains_yield(cond) || cases.iter().any(|c| body_contains_yield(&c.body))
        }
        StmtKind::Try { body, catches, finally } => {
            body_contains_yield(body)
                || catches.iter().any(|c| body_contains_yield(&c.body))
                || finally.as_ref().is_some_and(|f| body_contains_yield(f))
        }
        StmtKind::Throw(e) | StmtKind::ExprStmt(e) => expr_contains_yield(e),
        StmtKind::Return(Some(e)) => expr_contains_yield(e),
        StmtKind::Echo(exprs) => exprs.iter().any(expr_contains_yield),
        _ => false,
    }
}

fn expr_contains_yield(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Yield { .. } | ExprKind::YieldFrom(_) => true,
        ExprKind::Binary { lhs, rhs, .. } => expr_contains_yield(lhs) || expr_contains_yield(rhs),
        ExprKind::Unary { expr, .. } | ExprKind::Cast { expr, .. } | ExprKind::ErrorSuppress(expr) => expr_contains_yield(expr),
        ExprKind::Assign { target, value, .. } => expr_contains_yield(target) || expr_contains_yield(value),
        ExprKind::Call { callee, args } => expr_contains_yield(callee) || args.iter().any(|a| expr_contains_yield(&a.value)),
        ExprKind::MethodCall { object, args, .. } => expr_contains_yield(object) || args.iter().any(|a| expr_contains_yield(&a.value)),
        ExprKind::Ternary { cond, then, else_ } => {
            expr_contains_yield(cond) || then.as_ref().is_some_and(|t| expr_contains_yield(t)) || expr_contains_yield(else_)
        }
        ExprKind::Coalesce { lhs, rhs } => expr_contains_yield(lhs) || expr_contains_yield(rhs),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> File {
        let full = format!("<?php {src}");
        let (tokens, lex_errors) = Lexer::new(full.as_bytes()).tokenize();
        assert!(lex_errors.is_empty(), "lex errors: {lex_errors:?}");
        let (file, errors) = Parser::new(tokens).parse_file();
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        file
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let file = parse("1 + 2 * 3;");
        let StmtKind::ExprStmt(expr) = &file.stmts[0].kind else { panic!() };
        let ExprKind::Binary { op: BinOp::Add, rhs, .. } = &expr.kind else { panic!() };
        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn parses_ternary_and_coalesce() {
        let file = parse("$x = $a ?? $b ? 1 : 2;");
        assert_eq!(file.stmts.len(), 1);
    }

    #[test]
    fn parses_if_elseif_else() {
        let file = parse("if ($a) { echo 1; } elseif ($b) { echo 2; } else { echo 3; }");
        let StmtKind::If { elseifs, else_body, .. } = &file.stmts[0].kind else { panic!() };
        assert_eq!(elseifs.len(), 1);
        assert!(else_body.is_some());
    }

    #[test]
    fn parses_class_with_method() {
        let file = parse("class Foo extends Bar implements Baz { public int $x = 1; public function bar(int $y): int { return $y; } }");
        let StmtKind::Class(decl) = &file.stmts[0].kind else { panic!() };
        assert_eq!(decl.name, "Foo");
        assert_eq!(decl.extends.as_deref(), Some("Bar"));
        assert_eq!(decl.implements, vec!["Baz".to_string()]);
        assert_eq!(decl.members.len(), 2);
    }

    #[test]
    fn parses_foreach_with_key_and_ref() {
        let file = parse("foreach ($items as $k => &$v) { $v++; }");
        let StmtKind::Foreach { key, by_ref, .. } = &file.stmts[0].kind else { panic!() };
        assert!(key.is_some());
        assert!(by_ref);
    }

    #[test]
    fn parses_match_expression() {
        let file = parse("$r = match ($x) { 1, 2 => 'a', default => 'b' };");
        let StmtKind::ExprStmt(expr) = &file.stmts[0].kind else { panic!() };
        let ExprKind::Assign { value, .. } = &expr.kind else { panic!() };
        assert!(matches!(value.kind, ExprKind::Match { .. }));
    }

    #[test]
    fn parses_interpolated_string() {
        let file = parse(r#"echo "hello $name, you have {$count} items";"#);
        let StmtKind::Echo(exprs) = &file.stmts[0].kind else { panic!() };
        assert!(matches!(exprs[0].kind, ExprKind::Encapsed(_)));
    }

    #[test]
    fn marks_generator_functions() {
        let file = parse("function gen() { yield 1; yield 2; }");
        let StmtKind::Function(f) = &file.stmts[0].kind else { panic!() };
        assert!(f.is_generator);
    }

    #[test]
    fn resyncs_after_malformed_statement() {
        let full = "<?php $x = ; echo 1;";
        let (tokens, _) = Lexer::new(full.as_bytes()).tokenize();
        let (file, errors) = Parser::new(tokens).parse_file();
        assert!(!errors.is_empty());
        assert!(file.stmts.iter().any(|s| matches!(&s.kind, StmtKind::Echo(_))));
    }
}
