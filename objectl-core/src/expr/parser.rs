//! Builds the syntax tree from the `pest` parse. Operator precedence, from lowest to highest:
//! `?:`, `||`, `&&`, relations (`==`, `!=`, `<`, `<=`, `>`, `>=`, `in`), `+ -`, `* / %`, unary
//! `! -`, and member selection and indexing.
use super::ast::{BinaryOp, Expr, UnaryOp};
use super::value::Value;
use pest::Parser;
use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use std::fmt::Display;
use std::sync::LazyLock;

#[derive(pest_derive::Parser)]
#[grammar = "expr/cel.pest"]
struct CelParser;

static PRATT_PARSER: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or, Assoc::Left))
        .op(Op::infix(Rule::and, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left)
            | Op::infix(Rule::ne, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left)
            | Op::infix(Rule::in_op, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::rem, Assoc::Left))
        .op(Op::prefix(Rule::not) | Op::prefix(Rule::neg))
        .op(Op::postfix(Rule::member) | Op::postfix(Rule::index))
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ParseError {
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("invalid literal '{text}' at {line}:{column}: {message}")]
    Literal {
        text: String,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("argument of has() at {line}:{column} must be a field selection")]
    HasArgument { line: usize, column: usize },
    #[error("malformed syntax tree near {0:?}")]
    Malformed(Rule),
}

pub(crate) fn parse(source: &str) -> Result<Expr, ParseError> {
    let mut pairs = CelParser::parse(Rule::program, source).map_err(syntax_error)?;
    let program = next(&mut pairs, Rule::program)?;
    build_expr(next(&mut program.into_inner(), Rule::program)?)
}

fn next<'i>(pairs: &mut Pairs<'i, Rule>, parent: Rule) -> Result<Pair<'i, Rule>, ParseError> {
    pairs.next().ok_or(ParseError::Malformed(parent))
}

fn build_expr(pair: Pair<'_, Rule>) -> Result<Expr, ParseError> {
    let mut inner = pair.into_inner();
    let condition = build_logical(next(&mut inner, Rule::expr)?)?;
    let Some(then) = inner.next() else {
        return Ok(condition);
    };
    let otherwise = next(&mut inner, Rule::expr)?;
    Ok(Expr::Conditional {
        condition: Box::new(condition),
        then: Box::new(build_expr(then)?),
        otherwise: Box::new(build_expr(otherwise)?),
    })
}

fn build_logical(pair: Pair<'_, Rule>) -> Result<Expr, ParseError> {
    PRATT_PARSER
        .map_primary(build_primary)
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::not => UnaryOp::Not,
                Rule::neg => UnaryOp::Neg,
                rule => return Err(ParseError::Malformed(rule)),
            };
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand?),
            })
        })
        .map_postfix(|operand, op| build_postfix(operand?, op))
        .map_infix(|lhs, op, rhs| {
            Ok(Expr::Binary {
                op: binary_op(op.as_rule())?,
                lhs: Box::new(lhs?),
                rhs: Box::new(rhs?),
            })
        })
        .parse(pair.into_inner())
}

fn binary_op(rule: Rule) -> Result<BinaryOp, ParseError> {
    let op = match rule {
        Rule::or => BinaryOp::Or,
        Rule::and => BinaryOp::And,
        Rule::eq => BinaryOp::Eq,
        Rule::ne => BinaryOp::Ne,
        Rule::lt => BinaryOp::Lt,
        Rule::le => BinaryOp::Le,
        Rule::gt => BinaryOp::Gt,
        Rule::ge => BinaryOp::Ge,
        Rule::in_op => BinaryOp::In,
        Rule::add => BinaryOp::Add,
        Rule::sub => BinaryOp::Sub,
        Rule::mul => BinaryOp::Mul,
        Rule::div => BinaryOp::Div,
        Rule::rem => BinaryOp::Rem,
        rule => return Err(ParseError::Malformed(rule)),
    };
    Ok(op)
}

fn build_primary(pair: Pair<'_, Rule>) -> Result<Expr, ParseError> {
    let literal = |value: Value| Ok(Expr::Literal(value));
    match pair.as_rule() {
        Rule::expr => build_expr(pair),
        Rule::ident => Ok(Expr::Ident(pair.as_str().to_string())),
        Rule::int => match pair.as_str().parse::<i64>() {
            Ok(value) => literal(Value::Int(value)),
            Err(e) => Err(literal_error(&pair, e)),
        },
        Rule::uint => match pair.as_str().trim_end_matches(['u', 'U']).parse::<u64>() {
            Ok(value) => literal(Value::Uint(value)),
            Err(e) => Err(literal_error(&pair, e)),
        },
        Rule::float => match pair.as_str().parse::<f64>() {
            Ok(value) => literal(Value::Double(value)),
            Err(e) => Err(literal_error(&pair, e)),
        },
        Rule::string => {
            let chars = next(&mut pair.clone().into_inner(), Rule::string)?;
            match unescape(chars.as_str()) {
                Ok(value) => literal(Value::String(value)),
                Err(message) => Err(literal_error(&pair, message)),
            }
        }
        Rule::boolean => literal(Value::Bool(pair.as_str() == "true")),
        Rule::null => literal(Value::Null),
        Rule::list => pair
            .into_inner()
            .map(build_expr)
            .collect::<Result<Vec<_>, _>>()
            .map(Expr::List),
        Rule::has_macro => build_has(pair),
        Rule::global_call => {
            let mut inner = pair.into_inner();
            let function = next(&mut inner, Rule::global_call)?.as_str().to_string();
            let args = build_args(next(&mut inner, Rule::global_call)?)?;
            Ok(Expr::Call {
                target: None,
                function,
                args,
            })
        }
        rule => Err(ParseError::Malformed(rule)),
    }
}

fn build_has(pair: Pair<'_, Rule>) -> Result<Expr, ParseError> {
    let (line, column) = pair.line_col();
    let argument = build_expr(next(&mut pair.into_inner(), Rule::has_macro)?)?;
    match argument {
        Expr::Select { operand, field } => Ok(Expr::Has { operand, field }),
        _ => Err(ParseError::HasArgument { line, column }),
    }
}

fn build_postfix(operand: Expr, op: Pair<'_, Rule>) -> Result<Expr, ParseError> {
    let rule = op.as_rule();
    let mut inner = op.into_inner();
    match rule {
        Rule::member => {
            let field = next(&mut inner, rule)?.as_str().to_string();
            match inner.next() {
                Some(args) => Ok(Expr::Call {
                    target: Some(Box::new(operand)),
                    function: field,
                    args: build_args(args)?,
                }),
                None => Ok(Expr::Select {
                    operand: Box::new(operand),
                    field,
                }),
            }
        }
        Rule::index => Ok(Expr::Index {
            operand: Box::new(operand),
            index: Box::new(build_expr(next(&mut inner, rule)?)?),
        }),
        rule => Err(ParseError::Malformed(rule)),
    }
}

fn build_args(pair: Pair<'_, Rule>) -> Result<Vec<Expr>, ParseError> {
    pair.into_inner().map(build_expr).collect()
}

fn literal_error(pair: &Pair<'_, Rule>, message: impl Display) -> ParseError {
    let (line, column) = pair.line_col();
    ParseError::Literal {
        text: pair.as_str().to_string(),
        line,
        column,
        message: message.to_string(),
    }
}

fn syntax_error(error: pest::error::Error<Rule>) -> ParseError {
    let error = error.renamed_rules(describe_rule);
    let (line, column) = match error.line_col {
        LineColLocation::Pos(position) => position,
        LineColLocation::Span(start, _) => start,
    };
    ParseError::Syntax {
        line,
        column,
        message: error.variant.message().into_owned(),
    }
}

fn describe_rule(rule: &Rule) -> String {
    let description = match rule {
        Rule::EOI => "end of expression",
        Rule::expr | Rule::logical => "expression",
        Rule::or => "'||'",
        Rule::and => "'&&'",
        Rule::eq => "'=='",
        Rule::ne => "'!='",
        Rule::lt => "'<'",
        Rule::le => "'<='",
        Rule::gt => "'>'",
        Rule::ge => "'>='",
        Rule::in_op => "'in'",
        Rule::add => "'+'",
        Rule::sub => "'-'",
        Rule::mul => "'*'",
        Rule::div => "'/'",
        Rule::rem => "'%'",
        Rule::not => "'!'",
        Rule::neg => "'-'",
        Rule::member => "'.'",
        Rule::index | Rule::list => "'['",
        Rule::call_args => "'('",
        Rule::ident => "identifier",
        Rule::int | Rule::uint | Rule::float => "number",
        Rule::string => "string",
        Rule::boolean | Rule::null => "literal",
        Rule::has_macro => "has()",
        Rule::global_call => "function call",
        other => return format!("{other:?}"),
    };
    description.to_string()
}

/// Resolves the escape sequences of a string literal body.
fn unescape(raw: &str) -> Result<String, String> {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('a') => '\u{07}',
            Some('b') => '\u{08}',
            Some('f') => '\u{0c}',
            Some('v') => '\u{0b}',
            Some(c @ ('\\' | '\'' | '"' | '`' | '?')) => c,
            Some('x') => hex_char(&mut chars, 2)?,
            Some('u') => hex_char(&mut chars, 4)?,
            Some('U') => hex_char(&mut chars, 8)?,
            Some(other) => return Err(format!("unknown escape sequence '\\{other}'")),
            None => return Err("unterminated escape sequence".to_string()),
        };
        result.push(escaped);
    }
    Ok(result)
}

fn hex_char(chars: &mut std::str::Chars<'_>, digits: usize) -> Result<char, String> {
    let hex: String = chars.take(digits).collect();
    if hex.len() != digits {
        return Err(format!("expected {digits} hex digits in escape sequence"));
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("invalid code point '{hex}' in escape sequence"))
}
