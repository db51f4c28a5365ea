//! Expression parsing via a precedence ladder (§4.4):
//!
//! assignment (right-assoc) < ternary < logical-or < logical-and < equality
//! < comparison < bitwise-or < bitwise-xor < bitwise-and < shift < additive
//! < multiplicative < cast (`as`, `is`) < prefix < call/subscript/field.

use trill_base::Span;

use crate::ast::{CallArg, ExprId, ExprKind, InfixOp, PrefixOp};
use crate::token::{Keyword, Punct, TokenKind};

use super::Parser;

pub(super) fn parse_expr(p: &mut Parser) -> Option<ExprId> {
    parse_assignment(p)
}

fn assignment_op(punct: Punct) -> Option<InfixOp> {
    Some(match punct {
        Punct::Eq => InfixOp::Assign,
        Punct::PlusEq => InfixOp::AddAssign,
        Punct::MinusEq => InfixOp::SubAssign,
        Punct::StarEq => InfixOp::MulAssign,
        Punct::SlashEq => InfixOp::DivAssign,
        Punct::PercentEq => InfixOp::ModAssign,
        Punct::AmpEq => InfixOp::AndAssign,
        Punct::PipeEq => InfixOp::OrAssign,
        Punct::CaretEq => InfixOp::XorAssign,
        Punct::ShlEq => InfixOp::ShlAssign,
        Punct::ShrEq => InfixOp::ShrAssign,
        _ => return None,
    })
}

fn parse_assignment(p: &mut Parser) -> Option<ExprId> {
    let start = p.current().span;
    let lhs = parse_ternary(p)?;
    if let TokenKind::Punct(punct) = p.current().kind {
        if let Some(op) = assignment_op(punct) {
            p.advance();
            // Right-associative: recurse into parse_assignment, not parse_ternary.
            let rhs = parse_assignment(p)?;
            let span = p.span_from(start);
            return Some(p.ctx.alloc_expr(ExprKind::Infix { op, lhs, rhs }, Some(span)));
        }
    }
    Some(lhs)
}

fn parse_ternary(p: &mut Parser) -> Option<ExprId> {
    let start = p.current().span;
    let cond = parse_logical_or(p)?;
    if p.eat_punct(Punct::Question) {
        let then_branch = parse_expr(p)?;
        p.expect_punct(Punct::Colon, "':' in ternary expression");
        let else_branch = parse_assignment(p)?;
        let span = p.span_from(start);
        return Some(p.ctx.alloc_expr(ExprKind::Ternary { cond, then_branch, else_branch }, Some(span)));
    }
    Some(cond)
}

macro_rules! left_assoc_level {
    ($name:ident, $next:ident, [$(($punct:pat, $op:expr)),+ $(,)?]) => {
        fn $name(p: &mut Parser) -> Option<ExprId> {
            let start = p.current().span;
            let mut lhs = $next(p)?;
            loop {
                let op = match p.current().kind {
                    $(TokenKind::Punct($punct) => $op,)+
                    _ => break,
                };
                p.advance();
                let rhs = $next(p)?;
                let span = p.span_from(start);
                lhs = p.ctx.alloc_expr(ExprKind::Infix { op, lhs, rhs }, Some(span));
            }
            Some(lhs)
        }
    };
}

left_assoc_level!(parse_logical_or, parse_logical_and, [(Punct::PipePipe, InfixOp::Or)]);
left_assoc_level!(parse_logical_and, parse_equality, [(Punct::AmpAmp, InfixOp::And)]);
left_assoc_level!(
    parse_equality,
    parse_comparison,
    [(Punct::EqEq, InfixOp::Eq), (Punct::BangEq, InfixOp::Ne)]
);
left_assoc_level!(
    parse_comparison,
    parse_bitor,
    [
        (Punct::Lt, InfixOp::Lt),
        (Punct::Gt, InfixOp::Gt),
        (Punct::LtEq, InfixOp::Le),
        (Punct::GtEq, InfixOp::Ge),
    ]
);
left_assoc_level!(parse_bitor, parse_bitxor, [(Punct::Pipe, InfixOp::BitOr)]);
left_assoc_level!(parse_bitxor, parse_bitand, [(Punct::Caret, InfixOp::BitXor)]);
left_assoc_level!(parse_bitand, parse_shift, [(Punct::Amp, InfixOp::BitAnd)]);
left_assoc_level!(parse_shift, parse_additive, [(Punct::Shl, InfixOp::Shl), (Punct::Shr, InfixOp::Shr)]);
left_assoc_level!(parse_additive, parse_multiplicative, [(Punct::Plus, InfixOp::Add), (Punct::Minus, InfixOp::Sub)]);
left_assoc_level!(
    parse_multiplicative,
    parse_cast,
    [(Punct::Star, InfixOp::Mul), (Punct::Slash, InfixOp::Div), (Punct::Percent, InfixOp::Mod)]
);

fn parse_cast(p: &mut Parser) -> Option<ExprId> {
    let start = p.current().span;
    let mut operand = parse_prefix(p)?;
    loop {
        if p.check(TokenKind::Keyword(Keyword::As)) {
            p.advance();
            let target = super::ty::parse_type_expr(p)?;
            let span = p.span_from(start);
            operand = p.ctx.alloc_expr(ExprKind::Cast { operand, target }, Some(span));
        } else if p.check(TokenKind::Keyword(Keyword::Is)) {
            p.advance();
            let target = super::ty::parse_type_expr(p)?;
            let span = p.span_from(start);
            operand = p.ctx.alloc_expr(ExprKind::TypeCheck { operand, target }, Some(span));
        } else {
            break;
        }
    }
    Some(operand)
}

fn parse_prefix(p: &mut Parser) -> Option<ExprId> {
    let start = p.current().span;
    let op = match p.current().kind {
        TokenKind::Punct(Punct::Minus) => Some(PrefixOp::Neg),
        TokenKind::Punct(Punct::Bang) => Some(PrefixOp::Not),
        TokenKind::Punct(Punct::Tilde) => Some(PrefixOp::BitNot),
        TokenKind::Punct(Punct::Amp) => Some(PrefixOp::AddressOf),
        TokenKind::Punct(Punct::Star) => Some(PrefixOp::Deref),
        _ => None,
    };
    if let Some(op) = op {
        p.advance();
        let operand = parse_prefix(p)?;
        let span = p.span_from(start);
        return Some(p.ctx.alloc_expr(ExprKind::Prefix { op, operand }, Some(span)));
    }
    parse_postfix(p)
}

fn parse_postfix(p: &mut Parser) -> Option<ExprId> {
    let start = p.current().span;
    let mut expr = parse_primary(p)?;
    loop {
        if p.eat_punct(Punct::Dot) {
            if p.check(TokenKind::IntLiteral) {
                let tok = p.advance();
                let text = p.interner.resolve(tok.text);
                let index: u32 = text.parse().unwrap_or(0);
                let span = p.span_from(start);
                expr = p.ctx.alloc_expr(ExprKind::TupleFieldLookup { base: expr, index }, Some(span));
                continue;
            }
            if p.check(TokenKind::Identifier) {
                let tok = p.advance();
                let span = p.span_from(start);
                expr = p.ctx.alloc_expr(ExprKind::PropertyRef { base: expr, name: tok.text }, Some(span));
                continue;
            }
            p.error_here("expected a field or property name after '.'");
            break;
        } else if p.check_punct(Punct::LParen) {
            expr = parse_call(p, expr, start)?;
        } else if p.eat_punct(Punct::LBracket) {
            let index = parse_expr(p)?;
            p.expect_punct(Punct::RBracket, "']' to close subscript");
            let span = p.span_from(start);
            expr = p.ctx.alloc_expr(ExprKind::Subscript { base: expr, index }, Some(span));
        } else {
            break;
        }
    }
    Some(expr)
}

fn parse_call(p: &mut Parser, callee: ExprId, start: Span) -> Option<ExprId> {
    p.advance(); // '('
    let mut args = Vec::new();
    if !p.check_punct(Punct::RParen) {
        loop {
            let label = if p.check(TokenKind::Identifier) && p.peek_colon_follows() {
                let tok = p.advance();
                p.advance(); // ':'
                Some(tok.text)
            } else {
                None
            };
            let value = parse_expr(p)?;
            args.push(CallArg { label, value });
            if !p.eat_punct(Punct::Comma) {
                break;
            }
        }
    }
    p.expect_punct(Punct::RParen, "')' to close call arguments");
    let span = p.span_from(start);
    Some(p.ctx.alloc_expr(ExprKind::Call { callee, args }, Some(span)))
}

fn parse_primary(p: &mut Parser) -> Option<ExprId> {
    let start = p.current().span;
    let tok = *p.current();

    match tok.kind {
        TokenKind::IntLiteral => {
            p.advance();
            let text = p.interner.resolve(tok.text).to_string();
            let value = parse_int_literal(&text);
            Some(p.ctx.alloc_expr(ExprKind::IntLiteral(value), Some(start)))
        }
        TokenKind::FloatLiteral => {
            p.advance();
            let text = p.interner.resolve(tok.text).to_string();
            let value: f64 = text.replace('_', "").parse().unwrap_or(0.0);
            Some(p.ctx.alloc_expr(ExprKind::FloatLiteral(value), Some(start)))
        }
        TokenKind::CharLiteral => {
            p.advance();
            let text = p.interner.resolve(tok.text);
            let value = text.chars().next().unwrap_or('\0');
            Some(p.ctx.alloc_expr(ExprKind::CharLiteral(value), Some(start)))
        }
        TokenKind::StringLiteral => {
            p.advance();
            Some(p.ctx.alloc_expr(ExprKind::StringLiteral(tok.text), Some(start)))
        }
        TokenKind::Keyword(Keyword::True) => {
            p.advance();
            Some(p.ctx.alloc_expr(ExprKind::BoolLiteral(true), Some(start)))
        }
        TokenKind::Keyword(Keyword::False) => {
            p.advance();
            Some(p.ctx.alloc_expr(ExprKind::BoolLiteral(false), Some(start)))
        }
        TokenKind::Keyword(Keyword::Nil) => {
            p.advance();
            Some(p.ctx.alloc_expr(ExprKind::NilLiteral, Some(start)))
        }
        TokenKind::Keyword(Keyword::Sizeof) => {
            p.advance();
            p.expect_punct(Punct::LParen, "'(' after sizeof");
            let ty = super::ty::parse_type_expr(p)?;
            p.expect_punct(Punct::RParen, "')' to close sizeof");
            let span = p.span_from(start);
            Some(p.ctx.alloc_expr(ExprKind::Sizeof(ty), Some(span)))
        }
        TokenKind::Identifier => {
            p.advance();
            Some(p.ctx.alloc_expr(ExprKind::VarRef(tok.text), Some(start)))
        }
        TokenKind::Punct(Punct::LParen) => {
            p.advance();
            let mut elems = Vec::new();
            if !p.check_punct(Punct::RParen) {
                loop {
                    elems.push(parse_expr(p)?);
                    if !p.eat_punct(Punct::Comma) {
                        break;
                    }
                }
            }
            p.expect_punct(Punct::RParen, "')' to close parenthesized expression");
            let span = p.span_from(start);
            if elems.len() == 1 {
                Some(p.ctx.alloc_expr(ExprKind::Paren(elems[0]), Some(span)))
            } else {
                Some(p.ctx.alloc_expr(ExprKind::Tuple(elems), Some(span)))
            }
        }
        _ => {
            p.error_here("expected an expression");
            None
        }
    }
}

fn parse_int_literal(text: &str) -> i64 {
    let text = text.replace('_', "");
    if let Some(rest) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(rest, 16).unwrap_or(0)
    } else if let Some(rest) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        i64::from_str_radix(rest, 8).unwrap_or(0)
    } else if let Some(rest) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        i64::from_str_radix(rest, 2).unwrap_or(0)
    } else {
        text.parse().unwrap_or(0)
    }
}
