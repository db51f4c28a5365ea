//! Declaration-level parser over the C token stream (§4.5).
//!
//! Grammar covered: `typedef`, function prototypes (with variadic `...`
//! tails), `enum`, and `struct`. Anything else at top level is skipped up
//! to the next `;` or matching `}` with a diagnostic, the same
//! discard-and-resync strategy `trill_syntax`'s parser uses.

use trill_base::{Diagnostic, DiagnosticEngine};

use crate::lexer::{CToken, CTokenKind};
use crate::types::{CType, ForeignDecl, ForeignField, ForeignParam};

pub struct Parser<'d> {
    tokens: Vec<CToken>,
    pos: usize,
    diags: &'d mut DiagnosticEngine,
}

impl<'d> Parser<'d> {
    pub fn new(tokens: Vec<CToken>, diags: &'d mut DiagnosticEngine) -> Self {
        Self { tokens, pos: 0, diags }
    }

    pub fn parse_translation_unit(mut self) -> Vec<ForeignDecl> {
        let mut decls = Vec::new();
        while !self.at_eof() {
            match self.parse_top_level_decl() {
                Some(mut parsed) => decls.append(&mut parsed),
                None => self.resync(),
            }
        }
        decls
    }

    fn at_eof(&self) -> bool {
        matches!(self.current().kind, CTokenKind::Eof)
    }

    fn current(&self) -> &CToken {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> CToken {
        let tok = self.tokens[self.pos].clone();
        if !self.at_eof() {
            self.pos += 1;
        }
        tok
    }

    fn is_ident(&self, text: &str) -> bool {
        matches!(&self.current().kind, CTokenKind::Ident) && self.current().text == text
    }

    fn is_punct(&self, c: char) -> bool {
        matches!(&self.current().kind, CTokenKind::Punct(p) if *p == c)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.is_punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn resync(&mut self) {
        let span = self.current().span;
        self.diags.emit(Diagnostic::warning("importer: skipping malformed declaration").at(span));
        loop {
            if self.at_eof() || self.is_punct(';') {
                self.advance();
                return;
            }
            if self.is_punct('}') {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn parse_top_level_decl(&mut self) -> Option<Vec<ForeignDecl>> {
        if self.is_ident("typedef") {
            return self.parse_typedef().map(|d| vec![d]);
        }
        if self.is_ident("enum") {
            return self.parse_enum();
        }
        if self.is_ident("struct") {
            return self.parse_struct().map(|d| vec![d]);
        }
        self.parse_function().map(|d| vec![d])
    }

    /// `typedef <type> <name>;`
    fn parse_typedef(&mut self) -> Option<ForeignDecl> {
        self.advance(); // `typedef`
        let target = self.parse_type()?;
        let name = self.parse_ident()?;
        self.eat_punct(';');
        Some(ForeignDecl::TypeAlias { name, target })
    }

    /// `enum <name> { A, B, C };` — each enumerator becomes a sequential
    /// constant; explicit `= N` initializers are not modeled (§4.5 covers
    /// the common sequential case only).
    fn parse_enum(&mut self) -> Option<Vec<ForeignDecl>> {
        self.advance(); // `enum`
        let _name = self.parse_ident();
        if !self.eat_punct('{') {
            return None;
        }
        let mut decls = Vec::new();
        let mut value = 0i64;
        while !self.is_punct('}') && !self.at_eof() {
            let name = self.parse_ident()?;
            decls.push(ForeignDecl::Constant { name, value });
            value += 1;
            if !self.eat_punct(',') {
                break;
            }
        }
        self.eat_punct('}');
        self.eat_punct(';');
        Some(decls)
    }

    /// `struct <name> { <type> <field>; ... };`
    fn parse_struct(&mut self) -> Option<ForeignDecl> {
        self.advance(); // `struct`
        let name = self.parse_ident()?;
        if !self.eat_punct('{') {
            self.eat_punct(';');
            return None;
        }
        let mut fields = Vec::new();
        while !self.is_punct('}') && !self.at_eof() {
            let ty = self.parse_type()?;
            let field_name = self.parse_ident()?;
            fields.push(ForeignField { name: field_name, ty });
            self.eat_punct(';');
        }
        self.eat_punct('}');
        self.eat_punct(';');
        Some(ForeignDecl::Record { name, fields })
    }

    /// `<rettype> <name>(<params>);`
    fn parse_function(&mut self) -> Option<ForeignDecl> {
        let ret = self.parse_type()?;
        let name = self.parse_ident()?;
        if !self.eat_punct('(') {
            return None;
        }
        let mut params = Vec::new();
        let mut variadic = false;
        if !self.is_punct(')') {
            loop {
                if matches!(self.current().kind, CTokenKind::Ellipsis) {
                    self.advance();
                    variadic = true;
                    break;
                }
                let ty = self.parse_type()?;
                let name = self.parse_optional_ident();
                params.push(ForeignParam { name, ty });
                if !self.eat_punct(',') {
                    break;
                }
            }
        }
        if !self.eat_punct(')') {
            return None;
        }
        self.eat_punct(';');
        Some(ForeignDecl::Function { name, params, ret, variadic, noreturn: false })
    }

    /// Parses a type: `const`/`unsigned`/`signed` qualifiers, a base type
    /// name, then zero or more `*` pointer levels. An unknown base name
    /// (not `int`/`char`/`void`/etc.) becomes [`CType::Named`], which the
    /// caller degrades to `*Void` when it appears behind a pointer (§4.5,
    /// "unknown pointee types import as `*Void`").
    fn parse_type(&mut self) -> Option<CType> {
        let mut signed: Option<bool> = None;
        let mut words = Vec::new();
        loop {
            if self.is_ident("const") {
                self.advance();
                continue;
            }
            if self.is_ident("unsigned") {
                signed = Some(false);
                self.advance();
                continue;
            }
            if self.is_ident("signed") {
                signed = Some(true);
                self.advance();
                continue;
            }
            if matches!(self.current().kind, CTokenKind::Ident) && is_base_type_word(&self.current().text) {
                words.push(self.advance().text);
                continue;
            }
            break;
        }

        let mut base = if words.is_empty() {
            let name = self.parse_ident()?;
            CType::Named(name)
        } else {
            resolve_base_type(&words, signed)
        };

        while self.eat_punct('*') {
            base = CType::Pointer(Box::new(degrade_unknown_pointee(base)));
        }
        Some(base)
    }

    fn parse_ident(&mut self) -> Option<String> {
        if matches!(self.current().kind, CTokenKind::Ident) {
            Some(self.advance().text)
        } else {
            None
        }
    }

    fn parse_optional_ident(&mut self) -> Option<String> {
        if matches!(self.current().kind, CTokenKind::Ident) && !is_base_type_word(&self.current().text) {
            Some(self.advance().text)
        } else {
            None
        }
    }
}

fn is_base_type_word(word: &str) -> bool {
    matches!(word, "int" | "char" | "short" | "long" | "float" | "double" | "void" | "_Bool")
}

fn resolve_base_type(words: &[String], signed: Option<bool>) -> CType {
    let joined: Vec<&str> = words.iter().map(String::as_str).collect();
    match joined.as_slice() {
        ["void"] => CType::Void,
        ["float"] => CType::Float,
        ["double"] => CType::Double,
        ["_Bool"] => CType::Bool,
        ["char"] => CType::Int { signed: signed.unwrap_or(true), bits: 8 },
        ["short"] | ["short", "int"] => CType::Int { signed: signed.unwrap_or(true), bits: 16 },
        ["int"] => CType::Int { signed: signed.unwrap_or(true), bits: 32 },
        ["long"] | ["long", "int"] => CType::Int { signed: signed.unwrap_or(true), bits: 64 },
        ["long", "long"] | ["long", "long", "int"] => CType::Int { signed: signed.unwrap_or(true), bits: 64 },
        [] => CType::Int { signed: signed.unwrap_or(true), bits: 32 },
        _ => CType::Int { signed: signed.unwrap_or(true), bits: 32 },
    }
}

fn degrade_unknown_pointee(ty: CType) -> CType {
    match ty {
        CType::Named(_) => CType::Void,
        other => other,
    }
}
