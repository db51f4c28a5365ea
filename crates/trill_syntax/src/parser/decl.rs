//! Declaration parsing (§3, §4.4): functions, types, extensions, protocols,
//! type aliases, operators, and the members nested inside a type body.

use trill_base::Symbol;

use crate::ast::{
    Attributes, DeclId, DeclKind, ExtensionDecl, FieldDecl, FunctionDecl, InitializerDecl, DeinitializerDecl, Param,
    ProtocolDecl, TypeAliasDecl, TypeDecl, VarDecl, OperatorDecl,
};
use crate::token::{Keyword, Punct, TokenKind};

use super::Parser;

pub(super) fn starts_top_level_decl(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Keyword(Keyword::Func)
            | TokenKind::Keyword(Keyword::Type)
            | TokenKind::Keyword(Keyword::Indirect)
            | TokenKind::Keyword(Keyword::Extension)
            | TokenKind::Keyword(Keyword::Protocol)
            | TokenKind::Keyword(Keyword::Var)
            | TokenKind::Keyword(Keyword::Let)
            | TokenKind::Keyword(Keyword::Operator)
            | TokenKind::Keyword(Keyword::Foreign)
    )
}

pub(super) fn parse_top_level_decl(p: &mut Parser) -> Option<DeclId> {
    let mut attrs = Attributes::none();
    if p.check(TokenKind::Keyword(Keyword::Foreign)) {
        p.advance();
        attrs = attrs.with(Attributes::FOREIGN);
    }
    let indirect = p.check(TokenKind::Keyword(Keyword::Indirect));
    if indirect {
        attrs = attrs.with(Attributes::INDIRECT);
        p.advance();
    }
    let is_static = p.check(TokenKind::Keyword(Keyword::Static));
    if is_static {
        attrs = attrs.with(Attributes::STATIC);
        p.advance();
    }

    match p.current().kind {
        TokenKind::Keyword(Keyword::Func) => parse_function_decl(p, attrs),
        TokenKind::Keyword(Keyword::Type) => parse_type_decl(p, attrs),
        TokenKind::Keyword(Keyword::Extension) => parse_extension_decl(p, attrs),
        TokenKind::Keyword(Keyword::Protocol) => parse_protocol_decl(p, attrs),
        TokenKind::Keyword(Keyword::Var) | TokenKind::Keyword(Keyword::Let) => {
            let id = parse_var_decl_attrs(p, attrs)?;
            p.eat_punct(Punct::Semi);
            Some(id)
        }
        TokenKind::Keyword(Keyword::Operator) => parse_operator_decl(p, attrs),
        _ => {
            p.error_here("expected a top-level declaration");
            None
        }
    }
}

pub(super) fn parse_var_decl(p: &mut Parser) -> Option<DeclId> {
    parse_var_decl_attrs(p, Attributes::none())
}

fn parse_var_decl_attrs(p: &mut Parser, attrs: Attributes) -> Option<DeclId> {
    let start = p.current().span;
    let mutable = p.check(TokenKind::Keyword(Keyword::Var));
    p.advance(); // 'var' or 'let'

    let name = expect_identifier(p, "variable name")?;
    let ty = if p.eat_punct(Punct::Colon) { super::ty::parse_type_expr(p) } else { None };
    let initializer = if p.eat_punct(Punct::Eq) { super::expr::parse_expr(p) } else { None };

    if !mutable && initializer.is_none() {
        p.error_here("'let' declaration requires an initializer");
    }

    let span = p.span_from(start);
    Some(p.ctx.alloc_decl(DeclKind::Var(VarDecl { name, mutable, ty, initializer }), Some(span), attrs))
}

fn expect_identifier(p: &mut Parser, what: &str) -> Option<Symbol> {
    if p.check(TokenKind::Identifier) {
        Some(p.advance().text)
    } else {
        p.error_here(format!("expected {what}"));
        None
    }
}

/// Parses one parameter: `extLabel intName: T` or `_ intName: T` (no
/// external label) or `intName: T` (external label same as internal).
fn parse_param(p: &mut Parser) -> Option<Param> {
    let start = p.current().span;
    let first = expect_identifier_or_underscore(p)?;

    let (external_label, internal_name) = if p.check(TokenKind::Identifier) {
        let second = p.advance().text;
        (first, second)
    } else {
        (first, first)
    };

    p.expect_punct(Punct::Colon, "':' before parameter type");
    let ty = super::ty::parse_type_expr(p)?;
    let span = p.span_from(start);
    Some(Param {
        external_label: if p.interner.resolve(external_label) == "_" { None } else { Some(external_label) },
        internal_name,
        ty,
        span: Some(span),
    })
}

fn expect_identifier_or_underscore(p: &mut Parser) -> Option<Symbol> {
    if p.check(TokenKind::Identifier) {
        Some(p.advance().text)
    } else {
        p.error_here("expected a parameter label or name");
        None
    }
}

fn parse_param_list(p: &mut Parser) -> (Vec<Param>, bool) {
    let mut params = Vec::new();
    let mut variadic = false;
    p.expect_punct(Punct::LParen, "'(' to start parameter list");
    if !p.check_punct(Punct::RParen) {
        loop {
            if p.check_punct(Punct::Ellipsis) {
                p.advance();
                variadic = true;
                break;
            }
            match parse_param(p) {
                Some(param) => params.push(param),
                None => break,
            }
            if !p.eat_punct(Punct::Comma) {
                break;
            }
        }
    }
    p.expect_punct(Punct::RParen, "')' to close parameter list");
    (params, variadic)
}

fn parse_function_decl(p: &mut Parser, attrs: Attributes) -> Option<DeclId> {
    let start = p.current().span;
    p.advance(); // 'func'
    let name = expect_identifier(p, "function name")?;
    let (params, variadic) = parse_param_list(p);
    let ret = if p.eat_punct(Punct::Arrow) { super::ty::parse_type_expr(p) } else { None };

    let body = if attrs.contains(Attributes::FOREIGN) {
        p.eat_punct(Punct::Semi);
        None
    } else {
        super::stmt::parse_stmt(p)
    };

    let span = p.span_from(start);
    Some(p.ctx.alloc_decl(
        DeclKind::Function(FunctionDecl { name, params, variadic, ret, body }),
        Some(span),
        attrs,
    ))
}

fn parse_operator_decl(p: &mut Parser, attrs: Attributes) -> Option<DeclId> {
    let start = p.current().span;
    p.advance(); // 'operator'
    let symbol = expect_identifier(p, "operator symbol")?;
    p.eat_punct(Punct::Semi);
    let span = p.span_from(start);
    Some(p.ctx.alloc_decl(DeclKind::Operator(OperatorDecl { symbol }), Some(span), attrs))
}

fn parse_type_alias_decl(p: &mut Parser, attrs: Attributes) -> Option<DeclId> {
    let start = p.current().span;
    let name = expect_identifier(p, "type alias name")?;
    p.expect_punct(Punct::Eq, "'=' in type alias");
    let target = super::ty::parse_type_expr(p)?;
    p.eat_punct(Punct::Semi);
    let span = p.span_from(start);
    Some(p.ctx.alloc_decl(DeclKind::TypeAlias(TypeAliasDecl { name, target }), Some(span), attrs))
}

fn parse_type_decl(p: &mut Parser, attrs: Attributes) -> Option<DeclId> {
    let start = p.current().span;
    p.advance(); // 'type'
    let name = expect_identifier(p, "type name")?;

    if p.check_punct(Punct::Eq) {
        p.advance();
        let target = super::ty::parse_type_expr(p)?;
        p.eat_punct(Punct::Semi);
        let span = p.span_from(start);
        return Some(p.ctx.alloc_decl(DeclKind::TypeAlias(TypeAliasDecl { name, target }), Some(span), attrs));
    }

    let mut conforms_to = Vec::new();
    if p.eat_punct(Punct::Colon) {
        loop {
            if let Some(proto) = expect_identifier(p, "protocol name") {
                conforms_to.push(proto);
            }
            if !p.eat_punct(Punct::Comma) {
                break;
            }
        }
    }

    p.expect_punct(Punct::LBrace, "'{' to start type body");
    let mut fields = Vec::new();
    let mut members = Vec::new();
    while !p.check_punct(Punct::RBrace) && !p.at_eof() {
        match parse_member_decl(p) {
            Some((id, is_field)) => {
                if is_field {
                    fields.push(id);
                } else {
                    members.push(id);
                }
            }
            None => p.synchronize_stmt(),
        }
    }
    p.expect_punct(Punct::RBrace, "'}' to close type body");

    let span = p.span_from(start);
    Some(p.ctx.alloc_decl(DeclKind::Type(TypeDecl { name, fields, members, conforms_to }), Some(span), attrs))
}

fn parse_extension_decl(p: &mut Parser, attrs: Attributes) -> Option<DeclId> {
    let start = p.current().span;
    p.advance(); // 'extension'
    let target = expect_identifier(p, "extended type name")?;
    p.expect_punct(Punct::LBrace, "'{' to start extension body");
    let mut members = Vec::new();
    while !p.check_punct(Punct::RBrace) && !p.at_eof() {
        match parse_member_decl(p) {
            Some((id, _)) => members.push(id),
            None => p.synchronize_stmt(),
        }
    }
    p.expect_punct(Punct::RBrace, "'}' to close extension body");
    let span = p.span_from(start);
    Some(p.ctx.alloc_decl(DeclKind::Extension(ExtensionDecl { target, members }), Some(span), attrs))
}

fn parse_protocol_decl(p: &mut Parser, attrs: Attributes) -> Option<DeclId> {
    let start = p.current().span;
    p.advance(); // 'protocol'
    let name = expect_identifier(p, "protocol name")?;
    p.expect_punct(Punct::LBrace, "'{' to start protocol body");
    let mut methods = Vec::new();
    while !p.check_punct(Punct::RBrace) && !p.at_eof() {
        if p.check(TokenKind::Keyword(Keyword::Func)) {
            let sig_start = p.current().span;
            p.advance();
            let Some(name) = expect_identifier(p, "method name") else {
                p.synchronize_stmt();
                continue;
            };
            let (params, variadic) = parse_param_list(p);
            let ret = if p.eat_punct(Punct::Arrow) { super::ty::parse_type_expr(p) } else { None };
            p.eat_punct(Punct::Semi);
            let span = p.span_from(sig_start);
            let id = p.ctx.alloc_decl(
                DeclKind::Function(FunctionDecl { name, params, variadic, ret, body: None }),
                Some(span),
                Attributes::none(),
            );
            methods.push(id);
        } else {
            p.error_here("expected a method signature in protocol body");
            p.synchronize_stmt();
        }
    }
    p.expect_punct(Punct::RBrace, "'}' to close protocol body");
    let span = p.span_from(start);
    Some(p.ctx.alloc_decl(DeclKind::Protocol(ProtocolDecl { name, methods }), Some(span), attrs))
}

/// Returns the allocated member id and whether it is a stored field (so
/// the caller can split fields from methods for layout purposes, §4.6.4).
fn parse_member_decl(p: &mut Parser) -> Option<(DeclId, bool)> {
    let mut attrs = Attributes::none();
    if p.check(TokenKind::Keyword(Keyword::Static)) {
        attrs = attrs.with(Attributes::STATIC);
        p.advance();
    }
    if p.check(TokenKind::Keyword(Keyword::Mutating)) {
        attrs = attrs.with(Attributes::MUTATING);
        p.advance();
    }

    match p.current().kind {
        TokenKind::Keyword(Keyword::Var) | TokenKind::Keyword(Keyword::Let) => {
            let start = p.current().span;
            p.advance();
            let name = expect_identifier(p, "field name")?;
            p.expect_punct(Punct::Colon, "':' before field type");
            let ty = super::ty::parse_type_expr(p)?;
            p.eat_punct(Punct::Semi);
            let span = p.span_from(start);
            Some((p.ctx.alloc_decl(DeclKind::Field(FieldDecl { name, ty }), Some(span), attrs), true))
        }
        TokenKind::Keyword(Keyword::Func) => Some((parse_function_decl(p, attrs)?, false)),
        TokenKind::Keyword(Keyword::Init) => {
            let start = p.current().span;
            p.advance();
            let (params, _) = parse_param_list(p);
            let body = super::stmt::parse_stmt(p)?;
            let span = p.span_from(start);
            Some((p.ctx.alloc_decl(DeclKind::Initializer(InitializerDecl { params, body }), Some(span), attrs), false))
        }
        TokenKind::Keyword(Keyword::Deinit) => {
            let start = p.current().span;
            p.advance();
            let body = super::stmt::parse_stmt(p)?;
            let span = p.span_from(start);
            Some((p.ctx.alloc_decl(DeclKind::Deinitializer(DeinitializerDecl { body }), Some(span), attrs), false))
        }
        TokenKind::Keyword(Keyword::Type) => Some((parse_type_alias_member(p, attrs)?, false)),
        _ => {
            p.error_here("expected a member declaration");
            None
        }
    }
}

fn parse_type_alias_member(p: &mut Parser, attrs: Attributes) -> Option<DeclId> {
    p.advance(); // 'type'
    parse_type_alias_decl(p, attrs)
}
