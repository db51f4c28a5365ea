//! Statement parsing (§3, §4.4).

use trill_base::Symbol;

use crate::ast::{StmtId, StmtKind, SwitchCase};
use crate::token::{Keyword, Punct, PoundDirective, TokenKind};

use super::Parser;

pub(super) fn parse_stmt(p: &mut Parser) -> Option<StmtId> {
    let start = p.current().span;
    match p.current().kind {
        TokenKind::Punct(Punct::LBrace) => parse_compound(p),
        TokenKind::Keyword(Keyword::If) => parse_if(p),
        TokenKind::Keyword(Keyword::While) => parse_while(p),
        TokenKind::Keyword(Keyword::For) => parse_for(p),
        TokenKind::Keyword(Keyword::Switch) => parse_switch(p),
        TokenKind::Keyword(Keyword::Return) => {
            p.advance();
            let value = if p.check_punct(Punct::Semi) || p.check_punct(Punct::RBrace) {
                None
            } else {
                super::expr::parse_expr(p)
            };
            eat_terminator(p);
            let span = p.span_from(start);
            Some(p.ctx.alloc_stmt(StmtKind::Return(value), Some(span)))
        }
        TokenKind::Keyword(Keyword::Break) => {
            p.advance();
            eat_terminator(p);
            Some(p.ctx.alloc_stmt(StmtKind::Break, Some(p.span_from(start))))
        }
        TokenKind::Keyword(Keyword::Continue) => {
            p.advance();
            eat_terminator(p);
            Some(p.ctx.alloc_stmt(StmtKind::Continue, Some(p.span_from(start))))
        }
        TokenKind::Pound(PoundDirective::Error) | TokenKind::Pound(PoundDirective::Warning) => {
            let is_error = p.current().kind == TokenKind::Pound(PoundDirective::Error);
            p.advance();
            let message = if p.check(TokenKind::StringLiteral) {
                p.advance().text
            } else {
                p.error_here("expected a string literal after pound diagnostic");
                Symbol::EMPTY
            };
            eat_terminator(p);
            let span = p.span_from(start);
            Some(p.ctx.alloc_stmt(StmtKind::PoundDiagnostic { is_error, message }, Some(span)))
        }
        TokenKind::Keyword(Keyword::Var) | TokenKind::Keyword(Keyword::Let) => {
            let decl = super::decl::parse_var_decl(p)?;
            eat_terminator(p);
            let span = p.span_from(start);
            Some(p.ctx.alloc_stmt(StmtKind::DeclStmt(decl), Some(span)))
        }
        _ => {
            let expr = super::expr::parse_expr(p)?;
            eat_terminator(p);
            let span = p.span_from(start);
            Some(p.ctx.alloc_stmt(StmtKind::ExprStmt(expr), Some(span)))
        }
    }
}

fn eat_terminator(p: &mut Parser) {
    p.eat_punct(Punct::Semi);
}

fn parse_compound(p: &mut Parser) -> Option<StmtId> {
    let start = p.current().span;
    p.advance(); // '{'
    let mut stmts = Vec::new();
    while !p.check_punct(Punct::RBrace) && !p.at_eof() {
        match parse_stmt(p) {
            Some(s) => stmts.push(s),
            None => p.synchronize_stmt(),
        }
    }
    p.expect_punct(Punct::RBrace, "'}' to close block");
    let span = p.span_from(start);
    Some(p.ctx.alloc_stmt(StmtKind::Compound(stmts), Some(span)))
}

fn parse_if(p: &mut Parser) -> Option<StmtId> {
    let start = p.current().span;
    p.advance(); // 'if'
    let cond = super::expr::parse_expr(p)?;
    let then_branch = parse_compound(p)?;
    let else_branch = if p.check(TokenKind::Keyword(Keyword::Else)) {
        p.advance();
        if p.check(TokenKind::Keyword(Keyword::If)) {
            parse_if(p)
        } else {
            parse_compound(p)
        }
    } else {
        None
    };
    let span = p.span_from(start);
    Some(p.ctx.alloc_stmt(StmtKind::If { cond, then_branch, else_branch }, Some(span)))
}

fn parse_while(p: &mut Parser) -> Option<StmtId> {
    let start = p.current().span;
    p.advance(); // 'while'
    let cond = super::expr::parse_expr(p)?;
    let body = parse_compound(p)?;
    let span = p.span_from(start);
    Some(p.ctx.alloc_stmt(StmtKind::While { cond, body }, Some(span)))
}

fn parse_for(p: &mut Parser) -> Option<StmtId> {
    let start = p.current().span;
    p.advance(); // 'for'
    let init = if p.check_punct(Punct::Semi) {
        None
    } else if p.check(TokenKind::Keyword(Keyword::Var)) || p.check(TokenKind::Keyword(Keyword::Let)) {
        let decl = super::decl::parse_var_decl(p)?;
        Some(p.ctx.alloc_stmt(StmtKind::DeclStmt(decl), None))
    } else {
        let e = super::expr::parse_expr(p)?;
        Some(p.ctx.alloc_stmt(StmtKind::ExprStmt(e), None))
    };
    p.expect_punct(Punct::Semi, "';' after for-loop initializer");

    let cond = if p.check_punct(Punct::Semi) { None } else { super::expr::parse_expr(p) };
    p.expect_punct(Punct::Semi, "';' after for-loop condition");

    let increment = if p.check_punct(Punct::LBrace) { None } else { super::expr::parse_expr(p) };
    let body = parse_compound(p)?;
    let span = p.span_from(start);
    Some(p.ctx.alloc_stmt(StmtKind::For { init, cond, increment, body }, Some(span)))
}

fn parse_switch(p: &mut Parser) -> Option<StmtId> {
    let start = p.current().span;
    p.advance(); // 'switch'
    let scrutinee = super::expr::parse_expr(p)?;
    p.expect_punct(Punct::LBrace, "'{' to start switch body");
    let mut cases = Vec::new();
    let mut seen_default = false;
    while !p.check_punct(Punct::RBrace) && !p.at_eof() {
        if p.check(TokenKind::Keyword(Keyword::Case)) {
            p.advance();
            let pattern = super::expr::parse_expr(p);
            p.expect_punct(Punct::Colon, "':' after case pattern");
            let body = parse_case_body(p);
            cases.push(SwitchCase { pattern, body });
        } else if p.check(TokenKind::Keyword(Keyword::Default)) {
            p.advance();
            p.expect_punct(Punct::Colon, "':' after default");
            if seen_default {
                p.error_here("duplicate default case");
            }
            seen_default = true;
            let body = parse_case_body(p);
            cases.push(SwitchCase { pattern: None, body });
        } else {
            p.error_here("expected 'case' or 'default'");
            p.synchronize_stmt();
        }
    }
    p.expect_punct(Punct::RBrace, "'}' to close switch body");
    let span = p.span_from(start);
    Some(p.ctx.alloc_stmt(StmtKind::Switch { scrutinee, cases }, Some(span)))
}

fn parse_case_body(p: &mut Parser) -> Vec<StmtId> {
    let mut body = Vec::new();
    while !p.check(TokenKind::Keyword(Keyword::Case))
        && !p.check(TokenKind::Keyword(Keyword::Default))
        && !p.check_punct(Punct::RBrace)
        && !p.at_eof()
    {
        match parse_stmt(p) {
            Some(s) => body.push(s),
            None => p.synchronize_stmt(),
        }
    }
    body
}
