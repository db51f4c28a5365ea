//! A bare-bones tokenizer over C declaration syntax: identifiers, integer
//! literals, string literals (discarded, only their presence matters for
//! skipping attribute arguments), and single-character punctuation.

use trill_base::{Diagnostic, DiagnosticEngine, SourceId, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum CTokenKind {
    Ident,
    IntLit(i64),
    /// `(`, `)`, `{`, `}`, `;`, `,`, `*`, `[`, `]`
    Punct(char),
    Ellipsis,
    Eof,
}

#[derive(Debug, Clone)]
pub struct CToken {
    pub kind: CTokenKind,
    pub text: String,
    pub span: Span,
}

pub fn tokenize(file: SourceId, source: &str, diags: &mut DiagnosticEngine) -> Vec<CToken> {
    let bytes = source.as_bytes();
    let mut pos = 0;
    let mut tokens = Vec::new();

    while pos < bytes.len() {
        let b = bytes[pos];

        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if b == b'/' && bytes.get(pos + 1) == Some(&b'/') {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        if b == b'/' && bytes.get(pos + 1) == Some(&b'*') {
            pos += 2;
            while pos < bytes.len() && !(bytes[pos] == b'*' && bytes.get(pos + 1) == Some(&b'/')) {
                pos += 1;
            }
            pos = (pos + 2).min(bytes.len());
            continue;
        }

        let start = pos;

        if b.is_ascii_alphabetic() || b == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push(CToken { kind: CTokenKind::Ident, text: source[start..pos].to_string(), span: Span::new(file, start, pos) });
            continue;
        }

        if b.is_ascii_digit() {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            let text = source[start..pos].to_string();
            let value = parse_c_integer(&text);
            tokens.push(CToken { kind: CTokenKind::IntLit(value), text, span: Span::new(file, start, pos) });
            continue;
        }

        if b == b'"' {
            pos += 1;
            while pos < bytes.len() && bytes[pos] != b'"' {
                if bytes[pos] == b'\\' {
                    pos += 1;
                }
                pos += 1;
            }
            pos = (pos + 1).min(bytes.len());
            tokens.push(CToken {
                kind: CTokenKind::Punct('"'),
                text: source[start..pos].to_string(),
                span: Span::new(file, start, pos),
            });
            continue;
        }

        if b == b'.' && bytes.get(pos + 1) == Some(&b'.') && bytes.get(pos + 2) == Some(&b'.') {
            pos += 3;
            tokens.push(CToken { kind: CTokenKind::Ellipsis, text: "...".to_string(), span: Span::new(file, start, pos) });
            continue;
        }

        if matches!(b, b'(' | b')' | b'{' | b'}' | b';' | b',' | b'*' | b'[' | b']') {
            pos += 1;
            tokens.push(CToken {
                kind: CTokenKind::Punct(b as char),
                text: (b as char).to_string(),
                span: Span::new(file, start, pos),
            });
            continue;
        }

        // Unknown byte (e.g. preprocessor directives, attribute syntax we
        // don't model): skip it rather than failing the whole header.
        pos += 1;
        diags.emit(Diagnostic::warning(format!("importer: skipping unrecognized byte '{}'", b as char)).at(Span::new(file, start, pos)));
    }

    tokens.push(CToken { kind: CTokenKind::Eof, text: String::new(), span: Span::point(file, pos) });
    tokens
}

fn parse_c_integer(text: &str) -> i64 {
    let trimmed = text.trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'));
    if let Some(rest) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        i64::from_str_radix(rest, 16).unwrap_or(0)
    } else {
        trimmed.parse().unwrap_or(0)
    }
}
