//! Single-pass tokenizer over a byte slice with a known source file (§4.3).
//!
//! The lexer is restartable: [`Lexer::next_token`] can be called repeatedly
//! and carries all state in `self`, so a caller may tee off a checkpoint and
//! resume (used by the parser's lookahead buffer).

use trill_base::{Diagnostic, DiagnosticEngine, Interner, SourceId, Span, Symbol};

use crate::token::{Keyword, PoundDirective, Punct, Token, TokenKind};

pub struct Lexer<'a> {
    file: SourceId,
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(file: SourceId, source: &'a str) -> Self {
        Self { file, source, bytes: source.as_bytes(), pos: 0 }
    }

    /// Tokenizes the whole source, interning text into `interner` and
    /// routing lexical errors into `diags`. Always terminates with exactly
    /// one [`TokenKind::Eof`].
    pub fn tokenize(mut self, interner: &mut Interner, diags: &mut DiagnosticEngine) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token(interner, diags);
            let done = tok.is_eof();
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn span(&self, start: usize) -> Span {
        Span::new(self.file, start, self.pos)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                    self.pos += 1;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.pos += 2;
                    while self.peek().is_some() && !(self.peek() == Some(b'*') && self.peek_at(1) == Some(b'/')) {
                        self.pos += 1;
                    }
                    if self.peek().is_some() {
                        self.pos += 2;
                    }
                }
                _ => break,
            }
        }
    }

    /// Advances past the current token (or whitespace/punctuation if the
    /// cursor is mid-garbage) to resynchronize after a lexical error
    /// (§4.3: "resynchronizes at the next whitespace or punctuation").
    fn resync(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || is_punct_start(b) {
                break;
            }
            self.pos += 1;
        }
    }

    pub fn next_token(&mut self, interner: &mut Interner, diags: &mut DiagnosticEngine) -> Token {
        self.skip_trivia();
        let start = self.pos;
        let Some(b) = self.peek() else {
            let sym = interner.intern("");
            return Token::new(TokenKind::Eof, sym, self.span(start));
        };

        if b.is_ascii_alphabetic() || b == b'_' {
            return self.lex_identifier(start, interner);
        }
        if b.is_ascii_digit() {
            return self.lex_number(start, interner);
        }
        match b {
            b'\'' => self.lex_char(start, interner, diags),
            b'"' => self.lex_string(start, interner, diags),
            b'#' => self.lex_pound(start, interner, diags),
            _ => self.lex_punct(start, interner, diags),
        }
    }

    fn lex_identifier(&mut self, start: usize, interner: &mut Interner) -> Token {
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let sym = interner.intern(text);
        let kind = match Keyword::lookup(text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier,
        };
        Token::new(kind, sym, self.span(start))
    }

    fn lex_number(&mut self, start: usize, interner: &mut Interner) -> Token {
        // Radix prefixes: 0x, 0o, 0b.
        if self.peek() == Some(b'0') {
            match self.peek_at(1) {
                Some(b'x') | Some(b'X') => return self.lex_radix_int(start, 2, interner, |c| c.is_ascii_hexdigit()),
                Some(b'o') | Some(b'O') => return self.lex_radix_int(start, 2, interner, |c| (b'0'..=b'7').contains(&c)),
                Some(b'b') | Some(b'B') => return self.lex_radix_int(start, 2, interner, |c| c == b'0' || c == b'1'),
                _ => {}
            }
        }

        while matches!(self.peek(), Some(b) if b.is_ascii_digit() || b == b'_') {
            self.pos += 1;
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit()) {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(b) if b.is_ascii_digit() || b == b'_') {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            if matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                is_float = true;
                while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                    self.pos += 1;
                }
            } else {
                self.pos = save;
            }
        }

        let text = &self.source[start..self.pos];
        let sym = interner.intern(text);
        let kind = if is_float { TokenKind::FloatLiteral } else { TokenKind::IntLiteral };
        Token::new(kind, sym, self.span(start))
    }

    fn lex_radix_int(
        &mut self,
        start: usize,
        prefix_len: usize,
        interner: &mut Interner,
        is_digit: impl Fn(u8) -> bool,
    ) -> Token {
        self.pos += prefix_len;
        while matches!(self.peek(), Some(b) if is_digit(b) || b == b'_') {
            self.pos += 1;
        }
        let text = &self.source[start..self.pos];
        let sym = interner.intern(text);
        Token::new(TokenKind::IntLiteral, sym, self.span(start))
    }

    fn lex_escape(&mut self, diags: &mut DiagnosticEngine, out: &mut String) {
        // Called with the cursor positioned just past the backslash.
        match self.bump() {
            Some(b'n') => out.push('\n'),
            Some(b't') => out.push('\t'),
            Some(b'r') => out.push('\r'),
            Some(b'0') => out.push('\0'),
            Some(b'\\') => out.push('\\'),
            Some(b'\'') => out.push('\''),
            Some(b'"') => out.push('"'),
            Some(b'x') => {
                let digits = self.take_hex_digits(2);
                if let Ok(value) = u8::from_str_radix(&digits, 16) {
                    out.push(value as char);
                } else {
                    diags.emit(Diagnostic::error("invalid \\x escape").at(self.span(self.pos)));
                }
            }
            Some(b'u') => {
                if self.peek() == Some(b'{') {
                    self.pos += 1;
                    let start = self.pos;
                    while matches!(self.peek(), Some(b) if b.is_ascii_hexdigit()) {
                        self.pos += 1;
                    }
                    let digits = &self.source[start..self.pos];
                    let value = u32::from_str_radix(digits, 16).ok().and_then(char::from_u32);
                    if self.peek() == Some(b'}') {
                        self.pos += 1;
                    }
                    match value {
                        Some(c) => out.push(c),
                        None => {
                            diags.emit(Diagnostic::error("invalid \\u{...} escape").at(self.span(self.pos)));
                        }
                    }
                } else {
                    diags.emit(Diagnostic::error("expected '{' after \\u").at(self.span(self.pos)));
                }
            }
            _ => {
                diags.emit(Diagnostic::error("unknown escape sequence").at(self.span(self.pos)));
            }
        }
    }

    fn take_hex_digits(&mut self, n: usize) -> String {
        let mut s = String::new();
        for _ in 0..n {
            match self.peek() {
                Some(b) if b.is_ascii_hexdigit() => {
                    s.push(b as char);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        s
    }

    fn lex_char(&mut self, start: usize, interner: &mut Interner, diags: &mut DiagnosticEngine) -> Token {
        self.pos += 1; // opening quote
        let mut decoded = String::new();
        match self.peek() {
            Some(b'\\') => {
                self.pos += 1;
                self.lex_escape(diags, &mut decoded);
            }
            Some(_) => {
                let ch_start = self.pos;
                // Advance one full UTF-8 scalar.
                let rest = &self.source[ch_start..];
                if let Some(c) = rest.chars().next() {
                    decoded.push(c);
                    self.pos += c.len_utf8();
                }
            }
            None => {
                diags.emit(Diagnostic::error("unterminated character literal").at(self.span(start)));
                let sym = interner.intern(&decoded);
                return Token::new(TokenKind::CharLiteral, sym, self.span(start));
            }
        }
        if self.peek() == Some(b'\'') {
            self.pos += 1;
        } else {
            diags.emit(Diagnostic::error("unterminated character literal").at(self.span(start)));
            self.resync();
        }
        let sym = interner.intern(&decoded);
        Token::new(TokenKind::CharLiteral, sym, self.span(start))
    }

    fn lex_string(&mut self, start: usize, interner: &mut Interner, diags: &mut DiagnosticEngine) -> Token {
        self.pos += 1; // opening quote
        let mut decoded = String::new();
        loop {
            match self.peek() {
                None | Some(b'\n') => {
                    diags.emit(Diagnostic::error("unterminated string literal").at(self.span(start)));
                    break;
                }
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.lex_escape(diags, &mut decoded);
                }
                Some(_) => {
                    let rest = &self.source[self.pos..];
                    if let Some(c) = rest.chars().next() {
                        decoded.push(c);
                        self.pos += c.len_utf8();
                    } else {
                        self.pos += 1;
                    }
                }
            }
        }
        let sym = interner.intern(&decoded);
        Token::new(TokenKind::StringLiteral, sym, self.span(start))
    }

    fn lex_pound(&mut self, start: usize, interner: &mut Interner, diags: &mut DiagnosticEngine) -> Token {
        self.pos += 1; // '#'
        let word_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        let word = &self.source[word_start..self.pos];
        match PoundDirective::lookup(word) {
            Some(directive) => {
                let sym = interner.intern(word);
                Token::new(TokenKind::Pound(directive), sym, self.span(start))
            }
            None => {
                diags.emit(Diagnostic::error(format!("unknown pound directive '#{word}'")).at(self.span(start)));
                let sym = interner.intern(word);
                Token::new(TokenKind::Pound(PoundDirective::Error), sym, self.span(start))
            }
        }
    }

    fn lex_punct(&mut self, start: usize, interner: &mut Interner, diags: &mut DiagnosticEngine) -> Token {
        // Longest-match over the closed operator set (§4.3).
        let three = self.bytes.get(self.pos..self.pos + 3);
        let two = self.bytes.get(self.pos..self.pos + 2);

        if let Some(b"<<=") = three {
            self.pos += 3;
            return self.punct_token(Punct::ShlEq, start, interner);
        }
        if let Some(b">>=") = three {
            self.pos += 3;
            return self.punct_token(Punct::ShrEq, start, interner);
        }
        if let Some(b"...") = three {
            self.pos += 3;
            return self.punct_token(Punct::Ellipsis, start, interner);
        }

        if let Some(two) = two {
            let p = match two {
                b"==" => Some(Punct::EqEq),
                b"!=" => Some(Punct::BangEq),
                b"<=" => Some(Punct::LtEq),
                b">=" => Some(Punct::GtEq),
                b"&&" => Some(Punct::AmpAmp),
                b"||" => Some(Punct::PipePipe),
                b"<<" => Some(Punct::Shl),
                b">>" => Some(Punct::Shr),
                b"+=" => Some(Punct::PlusEq),
                b"-=" => Some(Punct::MinusEq),
                b"*=" => Some(Punct::StarEq),
                b"/=" => Some(Punct::SlashEq),
                b"%=" => Some(Punct::PercentEq),
                b"&=" => Some(Punct::AmpEq),
                b"|=" => Some(Punct::PipeEq),
                b"^=" => Some(Punct::CaretEq),
                b"->" => Some(Punct::Arrow),
                b"=>" => Some(Punct::FatArrow),
                _ => None,
            };
            if let Some(p) = p {
                self.pos += 2;
                return self.punct_token(p, start, interner);
            }
        }

        let b = self.bump().unwrap();
        let p = match b {
            b'(' => Punct::LParen,
            b')' => Punct::RParen,
            b'{' => Punct::LBrace,
            b'}' => Punct::RBrace,
            b'[' => Punct::LBracket,
            b']' => Punct::RBracket,
            b',' => Punct::Comma,
            b':' => Punct::Colon,
            b';' => Punct::Semi,
            b'.' => Punct::Dot,
            b'?' => Punct::Question,
            b'&' => Punct::Amp,
            b'|' => Punct::Pipe,
            b'^' => Punct::Caret,
            b'~' => Punct::Tilde,
            b'!' => Punct::Bang,
            b'+' => Punct::Plus,
            b'-' => Punct::Minus,
            b'*' => Punct::Star,
            b'/' => Punct::Slash,
            b'%' => Punct::Percent,
            b'<' => Punct::Lt,
            b'>' => Punct::Gt,
            b'=' => Punct::Eq,
            other => {
                diags.emit(Diagnostic::error(format!("unexpected character '{}'", other as char)).at(self.span(start)));
                self.resync();
                let sym = interner.intern(&self.source[start..self.pos]);
                return Token::new(TokenKind::Punct(Punct::Tilde), sym, self.span(start));
            }
        };
        self.punct_token(p, start, interner)
    }

    fn punct_token(&self, p: Punct, start: usize, interner: &mut Interner) -> Token {
        let sym = interner.intern(&self.source[start..self.pos]);
        Token::new(TokenKind::Punct(p), sym, self.span(start))
    }
}

fn is_punct_start(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'{' | b'}' | b'[' | b']' | b',' | b':' | b';' | b'.' | b'?' | b'&' | b'|' | b'^' | b'~' | b'!'
            | b'+' | b'-' | b'*' | b'/' | b'%' | b'<' | b'>' | b'='
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use trill_base::SourceId;

    fn lex(source: &str) -> (Vec<Token>, Interner, DiagnosticEngine) {
        let mut interner = Interner::new();
        let mut diags = DiagnosticEngine::new();
        let lexer = Lexer::new(SourceId::new(0), source);
        let tokens = lexer.tokenize(&mut interner, &mut diags);
        (tokens, interner, diags)
    }

    #[test]
    fn lexes_keyword_and_identifier() {
        let (tokens, interner, _) = lex("func fib");
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Func));
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(interner.resolve(tokens[1].text), "fib");
    }

    #[test]
    fn lexes_integer_with_radix_prefixes() {
        let (tokens, _, diags) = lex("0x1F 0o17 0b101 42 1_000");
        assert!(!diags.has_errors());
        for t in &tokens[..5] {
            assert_eq!(t.kind, TokenKind::IntLiteral);
        }
    }

    #[test]
    fn lexes_float_with_exponent() {
        let (tokens, _, _) = lex("3.14 2e10 1.5e-3");
        assert_eq!(tokens[0].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[1].kind, TokenKind::FloatLiteral);
        assert_eq!(tokens[2].kind, TokenKind::FloatLiteral);
    }

    #[test]
    fn lexes_string_with_escapes() {
        let (tokens, interner, diags) = lex(r#""hi\n\t\"there\"""#);
        assert!(!diags.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(interner.resolve(tokens[0].text), "hi\n\t\"there\"");
    }

    #[test]
    fn lexes_char_with_unicode_escape() {
        let (tokens, interner, diags) = lex(r"'\u{41}'");
        assert!(!diags.has_errors());
        assert_eq!(interner.resolve(tokens[0].text), "A");
    }

    #[test]
    fn lexes_greedy_longest_operators() {
        let (tokens, _, _) = lex("<<= -> => == !=");
        assert_eq!(tokens[0].kind, TokenKind::Punct(Punct::ShlEq));
        assert_eq!(tokens[1].kind, TokenKind::Punct(Punct::Arrow));
        assert_eq!(tokens[2].kind, TokenKind::Punct(Punct::FatArrow));
        assert_eq!(tokens[3].kind, TokenKind::Punct(Punct::EqEq));
        assert_eq!(tokens[4].kind, TokenKind::Punct(Punct::BangEq));
    }

    #[test]
    fn skips_line_and_block_comments() {
        let (tokens, _, _) = lex("let // trailing\nx /* mid */ = 1");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::Keyword(Keyword::Let)));
        assert!(kinds.contains(&TokenKind::Identifier));
    }

    #[test]
    fn pound_directives_are_recognized() {
        let (tokens, _, diags) = lex(r#"#error "broken""#);
        assert!(!diags.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::Pound(PoundDirective::Error));
    }

    #[test]
    fn unknown_character_emits_diagnostic_and_resyncs() {
        let (tokens, _, diags) = lex("let x = @ 1");
        assert!(diags.has_errors());
        // Lexing continues past the bad byte: the trailing `1` is still produced.
        assert!(tokens.iter().any(|t| t.kind == TokenKind::IntLiteral));
    }

    #[test]
    fn always_terminates_with_eof() {
        let (tokens, _, _) = lex("func");
        assert!(tokens.last().unwrap().is_eof());
    }

    #[test]
    fn empty_source_yields_only_eof() {
        let (tokens, _, _) = lex("");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_eof());
    }
}
