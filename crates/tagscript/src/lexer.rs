//! Source bytes -> token stream.
//!
//! Mirrors the teacher's error-tolerant philosophy (`examples/parcadei-ouros`
//! collects diagnostics rather than aborting): unrecognized bytes become an
//! `Error` token and scanning continues, so the parser can still produce a
//! best-effort tree and multiple diagnostics in one pass.

use crate::token::{CastKind, Keyword, Position, Token, TokenKind};

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub pos: Position,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Html,
    Code,
}

pub struct Lexer<'a> {
    src: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
    mode: Mode,
    pub errors: Vec<LexError>,
    /// Stack of pending heredoc/nowdoc labels awaiting their closing line,
    /// carried across calls so interpolated heredocs can be scanned
    /// statement-by-statement like the rest of code mode.
    heredoc_stack: Vec<(String, bool)>,
}

const CASTS: &[(&str, CastKind)] = &[
    ("int", CastKind::Int),
    ("integer", CastKind::Int),
    ("bool", CastKind::Bool),
    ("boolean", CastKind::Bool),
    ("float", CastKind::Float),
    ("double", CastKind::Float),
    ("real", CastKind::Float),
    ("string", CastKind::String),
    ("array", CastKind::Array),
    ("object", CastKind::Object),
    ("unset", CastKind::Unset),
];

impl<'a> Lexer<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            offset: 0,
            line: 1,
            column: 1,
            mode: Mode::Html,
            errors: Vec::new(),
            heredoc_stack: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.kind == TokenKind::Eof;
            let is_double_quote = matches!(tok.kind, TokenKind::DoubleQuote);
            let heredoc = match &tok.kind {
                TokenKind::HeredocStart { label, nowdoc } => Some((label.clone(), *nowdoc)),
                _ => None,
            };
            tokens.push(tok);
            if is_eof {
                break;
            }
            if is_double_quote {
                self.lex_double_quoted_body(&mut tokens);
            } else if let Some((label, nowdoc)) = heredoc {
                self.lex_heredoc_tokens(&label, nowdoc, &mut tokens);
            }
        }
        (tokens, self.errors)
    }

    fn lex_double_quoted_body(&mut self, tokens: &mut Vec<Token>) {
        let pos = self.pos();
        let parts = self.scan_double_quoted_parts();
        self.emit_interpolated_parts(parts, pos, tokens);
        let close_pos = self.pos();
        self.bump(); // closing quote
        tokens.push(Token::new(TokenKind::DoubleQuote, "\"", close_pos));
    }

    fn lex_heredoc_tokens(&mut self, label: &str, nowdoc: bool, tokens: &mut Vec<Token>) {
        let pos = self.pos();
        let (stripped, _) = self.scan_heredoc_body(label, nowdoc);
        if nowdoc {
            if !stripped.is_empty() {
                tokens.push(Token::new(TokenKind::EncapsedAndWhitespace(stripped), "", pos));
            }
        } else {
            let parts = self.scan_heredoc_parts(&stripped);
            self.emit_interpolated_parts(parts, pos, tokens);
        }
        tokens.push(Token::new(TokenKind::HeredocEnd { label: label.to_string() }, label, self.pos()));
    }

    fn emit_interpolated_parts(&mut self, parts: Vec<DoubleQuotedPart>, pos: Position, tokens: &mut Vec<Token>) {
        for part in parts {
            match part {
                DoubleQuotedPart::Literal(bytes) => {
                    tokens.push(Token::new(TokenKind::EncapsedAndWhitespace(bytes), "", pos));
                }
                DoubleQuotedPart::SimpleVar(name, accessor) => {
                    tokens.push(Token::new(TokenKind::Variable(name), "", pos));
                    match accessor {
                        SimpleAccessor::None => {}
                        SimpleAccessor::Index(idx) => {
                            tokens.push(Token::new(TokenKind::LBracket, "[", pos));
                            let trimmed = idx.trim();
                            if let Some(stripped) = trimmed.strip_prefix('$') {
                                tokens.push(Token::new(TokenKind::Variable(stripped.to_string()), "", pos));
                            } else if let Ok(n) = trimmed.parse::<i64>() {
                                tokens.push(Token::new(TokenKind::Int(n), trimmed, pos));
                            } else {
                                tokens.push(Token::new(
                                    TokenKind::StringLiteral(trimmed.as_bytes().to_vec()),
                                    trimmed,
                                    pos,
                                ));
                            }
                            tokens.push(Token::new(TokenKind::RBracket, "]", pos));
                        }
                        SimpleAccessor::Prop(prop) => {
                            tokens.push(Token::new(TokenKind::Arrow, "->", pos));
                            tokens.push(Token::new(TokenKind::Identifier(prop.clone()), prop, pos));
                        }
                    }
                }
                DoubleQuotedPart::ComplexExpr(code) => {
                    tokens.push(Token::new(TokenKind::CurlyOpen, "{", pos));
                    let nested = Lexer::new(&code);
                    let (mut inner, errs) = {
                        let mut l = nested;
                        l.mode = Mode::Code;
                        let mut out = Vec::new();
                        loop {
                            let t = l.next_token();
                            if t.kind == TokenKind::Eof {
                                break;
                            }
                            out.push(t);
                        }
                        (out, l.errors)
                    };
                    self.errors.extend(errs);
                    tokens.append(&mut inner);
                    tokens.push(Token::new(TokenKind::RBrace, "}", pos));
                }
                DoubleQuotedPart::DollarBrace(name) => {
                    tokens.push(Token::new(TokenKind::DollarOpenCurlyBraces, "${", pos));
                    tokens.push(Token::new(TokenKind::Identifier(name.clone()), name, pos));
                    tokens.push(Token::new(TokenKind::RBrace, "}", pos));
                }
            }
        }
    }

    fn pos(&self) -> Position {
        Position { offset: self.offset, line: self.line, column: self.column }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.offset).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.src.get(self.offset + n).copied()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.offset..].starts_with(s.as_bytes())
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.offset += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn emit(&self, kind: TokenKind, start: Position) -> Token {
        let text = String::from_utf8_lossy(&self.src[start.offset..self.offset]).into_owned();
        Token::new(kind, text, start)
    }

    pub fn next_token(&mut self) -> Token {
        match self.mode {
            Mode::Html => self.lex_html(),
            Mode::Code => self.lex_code(),
        }
    }

    fn lex_html(&mut self) -> Token {
        let start = self.pos();
        if self.offset >= self.src.len() {
            return Token::new(TokenKind::Eof, "", start);
        }
        // Scan for the next open tag.
        while self.offset < self.src.len() {
            if self.starts_with("<?php") {
                if self.offset == start.offset {
                    let open_start = self.pos();
                    for _ in 0..5 {
                        self.bump();
                    }
                    self.mode = Mode::Code;
                    return self.emit(TokenKind::OpenTag, open_start);
                }
                break;
            }
            if self.starts_with("<?=") {
                if self.offset == start.offset {
                    let open_start = self.pos();
                    for _ in 0..3 {
                        self.bump();
                    }
                    self.mode = Mode::Code;
                    return self.emit(TokenKind::OpenTagWithEcho, open_start);
                }
                break;
            }
            self.bump();
        }
        if self.offset == start.offset {
            // Immediately at an open tag but not consumed above means EOF guard.
            return Token::new(TokenKind::Eof, "", start);
        }
        let text = self.src[start.offset..self.offset].to_vec();
        Token::new(TokenKind::InlineHtml, String::from_utf8_lossy(&text).into_owned(), start)
    }

    fn lex_code(&mut self) -> Token {
        let start = self.pos();
        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, "", start);
        };

        if c == b'?' && self.peek_at(1) == Some(b'>') {
            self.bump();
            self.bump();
            // Consume a single trailing newline, matching the language's rule
            // that the close tag implies the statement terminator.
            if self.peek() == Some(b'\n') {
                self.bump();
            }
            self.mode = Mode::Html;
            return self.emit(TokenKind::CloseTag, start);
        }

        if c.is_ascii_whitespace() {
            while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                self.bump();
            }
            return self.emit(TokenKind::Whitespace, start);
        }

        if c == b'/' && self.peek_at(1) == Some(b'/') {
            while self.peek().is_some_and(|c| c != b'\n') && !self.starts_with("?>") {
                self.bump();
            }
            return self.emit(TokenKind::LineComment, start);
        }
        if c == b'#' && self.peek_at(1) != Some(b'[') {
            while self.peek().is_some_and(|c| c != b'\n') && !self.starts_with("?>") {
                self.bump();
            }
            return self.emit(TokenKind::LineComment, start);
        }
        if c == b'/' && self.peek_at(1) == Some(b'*') {
            let doc = self.peek_at(2) == Some(b'*') && self.peek_at(3) != Some(b'/');
            self.bump();
            self.bump();
            while self.offset < self.src.len() && !self.starts_with("*/") {
                self.bump();
            }
            self.bump();
            self.bump();
            return self.emit(if doc { TokenKind::DocComment } else { TokenKind::BlockComment }, start);
        }

        if c == b'#' && self.peek_at(1) == Some(b'[') {
            self.bump();
            self.bump();
            return self.emit(TokenKind::AttributeOpen, start);
        }

        if c == b'$' {
            if self.peek_at(1).is_some_and(is_ident_start) {
                self.bump();
                let name_start = self.offset;
                while self.peek().is_some_and(is_ident_continue) {
                    self.bump();
                }
                let name = String::from_utf8_lossy(&self.src[name_start..self.offset]).into_owned();
                return self.emit(TokenKind::Variable(name), start);
            }
            self.bump();
            return self.emit(TokenKind::Dollar, start);
        }

        if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit())) {
            return self.lex_number(start);
        }

        if is_ident_start(c) || c == b'\\' {
            return self.lex_name(start);
        }

        if c == b'\'' {
            return self.lex_single_quoted(start);
        }
        if c == b'"' {
            self.bump();
            return self.emit(TokenKind::DoubleQuote, start);
        }
        if self.starts_with("<<<") {
            return self.lex_heredoc_start(start);
        }
        if c == b'(' {
            if let Some(tok) = self.try_lex_cast(start) {
                return tok;
            }
        }

        self.lex_operator(start)
    }

    fn try_lex_cast(&mut self, start: Position) -> Option<Token> {
        let rest = &self.src[self.offset..];
        let mut idx = 1; // skip '('
        while rest.get(idx).is_some_and(|c| c.is_ascii_whitespace()) {
            idx += 1;
        }
        let ident_start = idx;
        while rest.get(idx).is_some_and(|c| c.is_ascii_alphabetic()) {
            idx += 1;
        }
        if ident_start == idx {
            return None;
        }
        let ident = std::str::from_utf8(&rest[ident_start..idx]).ok()?.to_ascii_lowercase();
        let mut end = idx;
        while rest.get(end).is_some_and(|c| c.is_ascii_whitespace()) {
            end += 1;
        }
        if rest.get(end) != Some(&b')') {
            return None;
        }
        let kind = CASTS.iter().find(|(name, _)| *name == ident).map(|(_, k)| *k)?;
        for _ in 0..=end {
            self.bump();
        }
        Some(self.emit(TokenKind::Cast(kind), start))
    }

    fn lex_number(&mut self, start: Position) -> Token {
        let mut is_float = false;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit() || c == b'_') {
                self.bump();
            }
            return self.finish_number(start, false, 16);
        }
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'b') | Some(b'B')) {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|c| c == b'0' || c == b'1' || c == b'_') {
                self.bump();
            }
            return self.finish_number(start, false, 2);
        }
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'o') | Some(b'O')) {
            self.bump();
            self.bump();
            while self.peek().is_some_and(|c| (b'0'..=b'7').contains(&c) || c == b'_') {
                self.bump();
            }
            return self.finish_number(start, false, 8);
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'_') {
            self.bump();
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'_') {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(lookahead), Some(b'+') | Some(b'-')) {
                lookahead += 1;
            }
            if self.peek_at(lookahead).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.bump();
                if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                    self.bump();
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        // Legacy leading-zero octal, e.g. 0755.
        let text = &self.src[start.offset..self.offset];
        if !is_float && text.len() > 1 && text[0] == b'0' && text[1..].iter().all(u8::is_ascii_digit) {
            return self.finish_number(start, false, 8);
        }
        self.finish_number(start, is_float, 10)
    }

    fn finish_number(&mut self, start: Position, is_float: bool, radix: u32) -> Token {
        let raw = String::from_utf8_lossy(&self.src[start.offset..self.offset]).into_owned();
        let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
        if is_float {
            let value: f64 = cleaned.parse().unwrap_or(0.0);
            return Token::new(TokenKind::Float(value), raw, start);
        }
        let digits = match radix {
            16 => cleaned.trim_start_matches("0x").trim_start_matches("0X").to_string(),
            2 => cleaned.trim_start_matches("0b").trim_start_matches("0B").to_string(),
            8 if cleaned.starts_with("0o") || cleaned.starts_with("0O") => {
                cleaned[2..].to_string()
            }
            8 => cleaned.trim_start_matches('0').to_string(),
            _ => cleaned,
        };
        let digits = if digits.is_empty() { "0".to_string() } else { digits };
        match i64::from_str_radix(&digits, radix) {
            Ok(v) => Token::new(TokenKind::Int(v), raw, start),
            Err(_) => {
                // Overflow: fall back to float, matching the evaluator's
                // silent-promotion rule for arithmetic overflow.
                let as_float = digits.parse::<f64>().unwrap_or(0.0);
                Token::new(TokenKind::Float(as_float), raw, start)
            }
        }
    }

    fn lex_name(&mut self, start: Position) -> Token {
        let mut qualified = false;
        let fully_qualified = self.peek() == Some(b'\\');
        if fully_qualified {
            self.bump();
        }
        loop {
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            if self.peek() == Some(b'\\') && self.peek_at(1).is_some_and(is_ident_start) {
                qualified = true;
                self.bump();
                continue;
            }
            break;
        }
        let text = String::from_utf8_lossy(&self.src[start.offset..self.offset]).into_owned();
        if fully_qualified {
            return Token::new(TokenKind::NameFullyQualified(text.clone()), text, start);
        }
        if text.eq_ignore_ascii_case("namespace") && self.peek() == Some(b'\\') {
            // `namespace\Foo` relative name: consume as part of the same token.
            self.bump();
            while self.peek().is_some_and(|c| is_ident_continue(c) || c == b'\\') {
                self.bump();
            }
            let full = String::from_utf8_lossy(&self.src[start.offset..self.offset]).into_owned();
            return Token::new(TokenKind::NameRelative(full.clone()), full, start);
        }
        if qualified {
            return Token::new(TokenKind::NameQualified(text.clone()), text, start);
        }
        if let Some(kw) = Keyword::from_str(&text) {
            return Token::new(TokenKind::Keyword(kw), text, start);
        }
        Token::new(TokenKind::Identifier(text.clone()), text, start)
    }

    fn lex_single_quoted(&mut self, start: Position) -> Token {
        self.bump(); // opening quote
        let mut out = Vec::new();
        loop {
            match self.peek() {
                None => {
                    self.errors.push(LexError { message: "unterminated string literal".into(), pos: start });
                    break;
                }
                Some(b'\'') => {
                    self.bump();
                    break;
                }
                Some(b'\\') if matches!(self.peek_at(1), Some(b'\\') | Some(b'\'')) => {
                    self.bump();
                    if let Some(c) = self.bump() {
                        out.push(c);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
        self.emit(TokenKind::StringLiteral(out), start)
    }

    fn lex_heredoc_start(&mut self, start: Position) -> Token {
        self.bump();
        self.bump();
        self.bump(); // <<<
        while self.peek().is_some_and(|c| c == b' ' || c == b'\t') {
            self.bump();
        }
        let nowdoc = self.peek() == Some(b'\'');
        let quoted = nowdoc || self.peek() == Some(b'"');
        if quoted {
            self.bump();
        }
        let label_start = self.offset;
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        let label = String::from_utf8_lossy(&self.src[label_start..self.offset]).into_owned();
        if quoted {
            self.bump();
        }
        while self.peek().is_some_and(|c| c == b'\r') {
            self.bump();
        }
        if self.peek() == Some(b'\n') {
            self.bump();
        }
        self.heredoc_stack.push((label.clone(), nowdoc));
        self.emit(TokenKind::HeredocStart { label, nowdoc }, start)
    }

    /// Scans heredoc/nowdoc body text up to (and consuming) the closing
    /// label, applying the shared-indentation stripping rule. Returns the
    /// body as encapsed parts plus the closing-label token text.
    pub fn scan_heredoc_body(&mut self, label: &str, nowdoc: bool) -> (Vec<u8>, Vec<(usize, crate::token::TokenKind)>) {
        let body_start = self.offset;
        let mut line_starts = vec![self.offset];
        loop {
            if self.offset >= self.src.len() {
                break;
            }
            // Check for a closing label at the start of a line.
            let line_begin = *line_starts.last().unwrap();
            if self.offset == line_begin || self.just_after_newline() {
                let mut probe = self.offset;
                while self.src.get(probe).is_some_and(|c| *c == b' ' || *c == b'\t') {
                    probe += 1;
                }
                if self.src[probe..].starts_with(label.as_bytes()) {
                    let after = probe + label.len();
                    let ok_boundary = self.src.get(after).map_or(true, |c| !is_ident_continue(*c));
                    if ok_boundary {
                        let indent = probe - self.offset;
                        let raw_body = self.src[body_start..self.offset].to_vec();
                        let stripped = match strip_heredoc_indent(&raw_body, indent) {
                            Ok(body) => body,
                            Err(message) => {
                                self.errors.push(LexError { message, pos: self.pos() });
                                raw_body
                            }
                        };
                        while self.offset < probe + indent + label.len() {
                            self.bump();
                        }
                        self.heredoc_stack.pop();
                        let _ = nowdoc;
                        return (stripped, Vec::new());
                    }
                }
            }
            if self.bump() == Some(b'\n') {
                line_starts.push(self.offset);
            }
        }
        self.errors.push(LexError {
            message: format!("unterminated heredoc, expected closing label `{label}`"),
            pos: self.pos(),
        });
        (self.src[body_start..self.offset].to_vec(), Vec::new())
    }

    fn just_after_newline(&self) -> bool {
        self.offset > 0 && self.src.get(self.offset - 1) == Some(&b'\n')
    }

    fn lex_operator(&mut self, start: Position) -> Token {
        // Maximal munch: longest operators matched first.
        const THREE: &[(&str, TokenKind)] = &[
            ("===", TokenKind::Identical),
            ("!==", TokenKind::NotIdentical),
            ("<=>", TokenKind::Spaceship),
            ("**=", TokenKind::PowEq),
            ("??=", TokenKind::CoalesceEq),
            ("<<=", TokenKind::ShlEq),
            (">>=", TokenKind::ShrEq),
            ("...", TokenKind::Ellipsis),
        ];
        const TWO: &[(&str, TokenKind)] = &[
            ("==", TokenKind::Eq),
            ("!=", TokenKind::NotEq),
            ("<>", TokenKind::AltNotEq),
            ("<=", TokenKind::Le),
            (">=", TokenKind::Ge),
            ("&&", TokenKind::AmpAmp),
            ("||", TokenKind::PipePipe),
            ("??", TokenKind::QuestionQuestion),
            ("?->", TokenKind::QuestionArrow),
            ("::", TokenKind::ColonColon),
            ("->", TokenKind::Arrow),
            ("=>", TokenKind::DoubleArrow),
            ("++", TokenKind::Inc),
            ("--", TokenKind::Dec),
            ("+=", TokenKind::PlusEq),
            ("-=", TokenKind::MinusEq),
            ("*=", TokenKind::StarEq),
            ("/=", TokenKind::SlashEq),
            ("%=", TokenKind::PercentEq),
            (".=", TokenKind::DotEq),
            ("&=", TokenKind::AmpEq),
            ("|=", TokenKind::PipeEq),
            ("^=", TokenKind::CaretEq),
            ("**", TokenKind::Pow),
            ("<<", TokenKind::Shl),
            (">>", TokenKind::Shr),
        ];
        if self.starts_with("?->") {
            for _ in 0..3 {
                self.bump();
            }
            return self.emit(TokenKind::QuestionArrow, start);
        }
        for (s, kind) in THREE {
            if self.starts_with(s) {
                for _ in 0..s.len() {
                    self.bump();
                }
                return self.emit(kind.clone(), start);
            }
        }
        for (s, kind) in TWO {
            if self.starts_with(s) {
                for _ in 0..s.len() {
                    self.bump();
                }
                return self.emit(kind.clone(), start);
            }
        }
        let c = self.bump().unwrap();
        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'.' => TokenKind::Dot,
            b'=' => TokenKind::Assign,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            b'&' => TokenKind::Amp,
            b'|' => TokenKind::Pipe,
            b'^' => TokenKind::Caret,
            b'~' => TokenKind::Tilde,
            b'!' => TokenKind::Bang,
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b'@' => TokenKind::At,
            b'\\' => TokenKind::Backslash,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            other => {
                let msg = format!("unexpected byte 0x{other:02x}");
                self.errors.push(LexError { message: msg.clone(), pos: start });
                TokenKind::Error(msg)
            }
        };
        self.emit(kind, start)
    }

    /// Scans a double-quoted string body, alternating literal runs with
    /// embedded `$var`, `$var[...]`, `$var->prop`, `{$expr}` and `${name}`
    /// sub-expressions, terminating at the closing quote (not consumed).
    pub fn scan_double_quoted_parts(&mut self) -> Vec<DoubleQuotedPart> {
        self.scan_interpolated(b'"')
    }

    pub fn scan_heredoc_parts(&mut self, stripped: &[u8]) -> Vec<DoubleQuotedPart> {
        // Re-lex the already-dedented body through a nested lexer so
        // interpolation rules are shared between heredoc and double-quoted
        // strings.
        let mut nested = Lexer::new(stripped);
        nested.mode = Mode::Code;
        nested.scan_interpolated_to_end()
    }

    fn scan_interpolated_to_end(&mut self) -> Vec<DoubleQuotedPart> {
        let mut parts = Vec::new();
        let mut literal = Vec::new();
        while self.offset < self.src.len() {
            if self.try_scan_interpolation_boundary(&mut parts, &mut literal) {
                continue;
            }
            literal.push(self.bump().unwrap());
        }
        if !literal.is_empty() {
            parts.push(DoubleQuotedPart::Literal(literal));
        }
        parts
    }

    fn scan_interpolated(&mut self, terminator: u8) -> Vec<DoubleQuotedPart> {
        let mut parts = Vec::new();
        let mut literal = Vec::new();
        while self.peek().is_some() && self.peek() != Some(terminator) {
            if self.try_scan_interpolation_boundary(&mut parts, &mut literal) {
                continue;
            }
            if self.peek() == Some(b'\\') {
                literal.push(b'\\');
                self.bump();
                if let Some(c) = self.bump() {
                    resolve_escape(c, self, &mut literal);
                }
                continue;
            }
            literal.push(self.bump().unwrap());
        }
        if !literal.is_empty() {
            parts.push(DoubleQuotedPart::Literal(literal));
        }
        parts
    }

    fn try_scan_interpolation_boundary(&mut self, parts: &mut Vec<DoubleQuotedPart>, literal: &mut Vec<u8>) -> bool {
        if self.peek() == Some(b'$') && self.peek_at(1).is_some_and(is_ident_start) {
            if !literal.is_empty() {
                parts.push(DoubleQuotedPart::Literal(std::mem::take(literal)));
            }
            self.bump();
            let name_start = self.offset;
            while self.peek().is_some_and(is_ident_continue) {
                self.bump();
            }
            let name = String::from_utf8_lossy(&self.src[name_start..self.offset]).into_owned();
            let mut accessor = SimpleAccessor::None;
            if self.peek() == Some(b'[') {
                self.bump();
                let idx_start = self.offset;
                while self.peek().is_some_and(|c| c != b']') {
                    self.bump();
                }
                let idx = String::from_utf8_lossy(&self.src[idx_start..self.offset]).into_owned();
                self.bump();
                accessor = SimpleAccessor::Index(idx);
            } else if self.starts_with("->") && self.peek_at(2).is_some_and(is_ident_start) {
                self.bump();
                self.bump();
                let prop_start = self.offset;
                while self.peek().is_some_and(is_ident_continue) {
                    self.bump();
                }
                let prop = String::from_utf8_lossy(&self.src[prop_start..self.offset]).into_owned();
                accessor = SimpleAccessor::Prop(prop);
            }
            parts.push(DoubleQuotedPart::SimpleVar(name, accessor));
            return true;
        }
        if self.starts_with("{$") {
            if !literal.is_empty() {
                parts.push(DoubleQuotedPart::Literal(std::mem::take(literal)));
            }
            self.bump(); // {
            let expr_start = self.offset;
            let mut depth = 1;
            while depth > 0 && self.peek().is_some() {
                match self.peek() {
                    Some(b'{') => depth += 1,
                    Some(b'}') => depth -= 1,
                    _ => {}
                }
                if depth == 0 {
                    break;
                }
                self.bump();
            }
            let code = self.src[expr_start..self.offset].to_vec();
            self.bump(); // }
            parts.push(DoubleQuotedPart::ComplexExpr(code));
            return true;
        }
        if self.starts_with("${") {
            if !literal.is_empty() {
                parts.push(DoubleQuotedPart::Literal(std::mem::take(literal)));
            }
            self.bump();
            self.bump();
            let name_start = self.offset;
            while self.peek().is_some_and(|c| c != b'}') {
                self.bump();
            }
            let name = String::from_utf8_lossy(&self.src[name_start..self.offset]).into_owned();
            self.bump();
            parts.push(DoubleQuotedPart::DollarBrace(name));
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimpleAccessor {
    None,
    Index(String),
    Prop(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DoubleQuotedPart {
    Literal(Vec<u8>),
    SimpleVar(String, SimpleAccessor),
    ComplexExpr(Vec<u8>),
    DollarBrace(String),
}

fn resolve_escape(c: u8, lexer: &mut Lexer, out: &mut Vec<u8>) {
    // Pop the backslash placeholder we pushed before dispatching here.
    out.pop();
    match c {
        b'n' => out.push(b'\n'),
        b't' => out.push(b'\t'),
        b'r' => out.push(b'\r'),
        b'v' => out.push(0x0b),
        b'f' => out.push(0x0c),
        b'e' => out.push(0x1b),
        b'\\' => out.push(b'\\'),
        b'$' => out.push(b'$'),
        b'"' => out.push(b'"'),
        b'x' => {
            let mut hex = String::new();
            for _ in 0..2 {
                if lexer.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    hex.push(lexer.bump().unwrap() as char);
                }
            }
            if let Ok(v) = u8::from_str_radix(&hex, 16) {
                out.push(v);
            }
        }
        b'u' if lexer.peek() == Some(b'{') => {
            lexer.bump();
            let mut hex = String::new();
            while lexer.peek().is_some_and(|c| c != b'}') {
                hex.push(lexer.bump().unwrap() as char);
            }
            lexer.bump();
            if let Ok(code) = u32::from_str_radix(&hex, 16) {
                if let Some(ch) = char::from_u32(code) {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        other => {
            out.push(b'\\');
            out.push(other);
        }
    }
}

fn strip_heredoc_indent(body: &[u8], indent: usize) -> Result<Vec<u8>, String> {
    if indent == 0 {
        // Trim a single trailing newline before the closing label line.
        return Ok(trim_trailing_newline(body));
    }
    let mut out = Vec::with_capacity(body.len());
    for line in split_keep_newline(body) {
        let strip_len = line.iter().take(indent).take_while(|c| **c == b' ' || **c == b'\t').count();
        let rest = &line[strip_len..];
        let content_is_empty = rest.iter().all(|c| *c == b'\n' || *c == b'\r');
        if strip_len < indent && !content_is_empty {
            return Err("heredoc closing label must not be indented further than any body line".to_string());
        }
        out.extend_from_slice(rest);
    }
    Ok(trim_trailing_newline(&out))
}

fn trim_trailing_newline(body: &[u8]) -> Vec<u8> {
    let mut v = body.to_vec();
    if v.last() == Some(&b'\n') {
        v.pop();
        if v.last() == Some(&b'\r') {
            v.pop();
        }
    }
    v
}

fn split_keep_newline(body: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, b) in body.iter().enumerate() {
        if *b == b'\n' {
            lines.push(&body[start..=i]);
            start = i + 1;
        }
    }
    if start < body.len() {
        lines.push(&body[start..]);
    }
    lines
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80
}
