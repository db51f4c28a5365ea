//! Parses syntactic type expressions (§4.4): `Int`, `*T`, `[T]`,
//! `(T,U,…)`, `(T,…)->R`, user names.

use crate::ast::{TypeExprId, TypeExprKind};
use crate::token::{Punct, TokenKind};

use super::Parser;

pub(super) fn parse_type_expr(p: &mut Parser) -> Option<TypeExprId> {
    let start = p.current().span;

    if p.eat_punct(Punct::Star) {
        let inner = parse_type_expr(p)?;
        return Some(p.ctx.alloc_type_expr(TypeExprKind::Pointer(inner), Some(p.span_from(start))));
    }

    if p.eat_punct(Punct::LBracket) {
        let inner = parse_type_expr(p)?;
        p.expect_punct(Punct::RBracket, "']' to close array type");
        return Some(p.ctx.alloc_type_expr(TypeExprKind::Array(inner), Some(p.span_from(start))));
    }

    if p.check_punct(Punct::LParen) {
        p.advance();
        let mut elems = Vec::new();
        let mut varargs = false;
        if !p.check_punct(Punct::RParen) {
            loop {
                if p.check_punct(Punct::Ellipsis) {
                    p.advance();
                    varargs = true;
                    break;
                }
                elems.push(parse_type_expr(p)?);
                if !p.eat_punct(Punct::Comma) {
                    break;
                }
            }
        }
        p.expect_punct(Punct::RParen, "')' to close type list");

        if p.eat_punct(Punct::Arrow) {
            let ret = parse_type_expr(p)?;
            return Some(p.ctx.alloc_type_expr(
                TypeExprKind::Function { params: elems, varargs, ret },
                Some(p.span_from(start)),
            ));
        }
        return Some(p.ctx.alloc_type_expr(TypeExprKind::Tuple(elems), Some(p.span_from(start))));
    }

    if p.check(TokenKind::Identifier) {
        let tok = p.advance();
        return Some(p.ctx.alloc_type_expr(TypeExprKind::Named(tok.text), Some(p.span_from(start))));
    }

    p.error_here("expected a type");
    None
}
