//! Builds [`Expr`] trees from the pest parse of `expr.pest`

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use super::ast::{ArgList, BinaryOp, BoolOp, CmpOp, ComprehensionKind, Expr, UnaryOp};

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "eval/expr.pest"]
struct ExprParser;

type BuildResult<T> = Result<T, String>;

/* ===================== Public API ===================== */

/// Parse a single expression
pub(crate) fn parse_expression(source: &str) -> BuildResult<Expr> {
    let mut pairs = ExprParser::parse(Rule::expression, source).map_err(syntax_message)?;
    let root = pairs.next().ok_or_else(|| "empty expression".to_string())?;

    // expression = { SOI ~ (import_stmt | expr) ~ EOI }
    let content = root
        .into_inner()
        .find(|p| p.as_rule() != Rule::EOI)
        .ok_or_else(|| "empty expression".to_string())?;
    build_expr(content)
}

/// Parse a bare argument list such as `"k", content=v`
pub(crate) fn parse_arguments(source: &str) -> BuildResult<ArgList> {
    let mut pairs = ExprParser::parse(Rule::arguments, source).map_err(syntax_message)?;
    let root = pairs.next().ok_or_else(|| "empty argument list".to_string())?;
    build_arg_list(root.into_inner().filter(|p| p.as_rule() != Rule::EOI))
}

fn syntax_message(err: pest::error::Error<Rule>) -> String {
    let column = match err.line_col {
        pest::error::LineColLocation::Pos((_, col)) => col,
        pest::error::LineColLocation::Span((_, col), _) => col,
    };
    format!("invalid syntax at column {}: {}", column, err.variant.message())
}

/* ===================== Expression Builder ===================== */

fn build_expr(pair: Pair<Rule>) -> BuildResult<Expr> {
    match pair.as_rule() {
        Rule::import_stmt => Ok(Expr::Import {
            statement: pair.as_str().trim().to_string(),
        }),
        Rule::lambda => {
            // lambda = { kw_lambda ~ lambda_params? ~ ":" ~ expr }
            let mut params = Vec::new();
            let mut body = None;
            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::kw_lambda => {}
                    Rule::lambda_params => {
                        params = inner.into_inner().map(|p| p.as_str().to_string()).collect();
                    }
                    _ => body = Some(build_expr(inner)?),
                }
            }
            let body = body.ok_or_else(|| "lambda without body".to_string())?;
            Ok(Expr::Lambda {
                params,
                body: Box::new(body),
            })
        }
        Rule::conditional => {
            // conditional = { or_test ~ (kw_if ~ or_test ~ kw_else ~ expr)? }
            let mut parts = without_keywords(pair);
            if parts.len() == 1 {
                return build_expr(parts.remove(0));
            }
            let mut built = parts.into_iter().map(build_expr);
            let body = next_operand(&mut built)?;
            let test = next_operand(&mut built)?;
            let orelse = next_operand(&mut built)?;
            Ok(Expr::IfElse {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            })
        }
        Rule::or_test | Rule::and_test => {
            let op = if pair.as_rule() == Rule::or_test {
                BoolOp::Or
            } else {
                BoolOp::And
            };
            let mut values = without_keywords(pair)
                .into_iter()
                .map(build_expr)
                .collect::<BuildResult<Vec<_>>>()?;
            if values.len() == 1 {
                return Ok(values.remove(0));
            }
            Ok(Expr::Logical { op, values })
        }
        Rule::negation => {
            let operand = without_keywords(pair)
                .into_iter()
                .next()
                .ok_or_else(|| "'not' without operand".to_string())?;
            Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(build_expr(operand)?),
            })
        }
        Rule::comparison => {
            // comparison = { arith ~ (comp_op ~ arith)* }
            let mut inner = pair.into_inner();
            let left = build_expr(required(inner.next())?)?;
            let mut rest = Vec::new();
            while let Some(op_pair) = inner.next() {
                let op = comparison_op(op_pair)?;
                let right = build_expr(required(inner.next())?)?;
                rest.push((op, right));
            }
            if rest.is_empty() {
                return Ok(left);
            }
            Ok(Expr::Compare {
                left: Box::new(left),
                rest,
            })
        }
        Rule::arith | Rule::term => {
            let mut inner = pair.into_inner();
            let mut expr = build_expr(required(inner.next())?)?;
            while let Some(op_pair) = inner.next() {
                let op = binary_op(op_pair)?;
                let right = build_expr(required(inner.next())?)?;
                expr = Expr::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                };
            }
            Ok(expr)
        }
        Rule::unary => {
            // unary = { unary_op ~ factor }
            let mut inner = pair.into_inner();
            let op_pair = required(inner.next())?;
            let op = match required(op_pair.into_inner().next())?.as_rule() {
                Rule::op_sub => UnaryOp::Neg,
                _ => UnaryOp::Pos,
            };
            let operand = build_expr(required(inner.next())?)?;
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            })
        }
        Rule::power => {
            // power = { postfix ~ (op_pow ~ factor)? }
            let mut inner = pair.into_inner();
            let base = build_expr(required(inner.next())?)?;
            match inner.next() {
                None => Ok(base),
                Some(_) => {
                    let exponent = build_expr(required(inner.next())?)?;
                    Ok(Expr::Binary {
                        op: BinaryOp::Pow,
                        left: Box::new(base),
                        right: Box::new(exponent),
                    })
                }
            }
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let mut expr = build_expr(required(inner.next())?)?;
            for trailer in inner {
                expr = apply_trailer(expr, trailer)?;
            }
            Ok(expr)
        }
        Rule::paren => build_expr(required(pair.into_inner().next())?),
        Rule::integer => pair
            .as_str()
            .parse::<i64>()
            .map(|v| Expr::Int { v })
            .map_err(|_| format!("integer literal '{}' is too large", pair.as_str())),
        Rule::float => pair
            .as_str()
            .parse::<f64>()
            .map(|v| Expr::Float { v })
            .map_err(|e| format!("invalid float literal '{}': {}", pair.as_str(), e)),
        Rule::string => {
            let content = required(pair.into_inner().next())?;
            Ok(Expr::Str {
                v: unescape(content.as_str()),
            })
        }
        Rule::true_lit => Ok(Expr::Bool { v: true }),
        Rule::false_lit => Ok(Expr::Bool { v: false }),
        Rule::none_lit => Ok(Expr::None),
        Rule::identifier => Ok(Expr::Name {
            name: pair.as_str().to_string(),
        }),
        Rule::list_display | Rule::tuple_display => {
            let items = pair
                .into_inner()
                .map(build_expr)
                .collect::<BuildResult<Vec<_>>>()?;
            Ok(Expr::List { items })
        }
        Rule::dict_display => {
            let mut entries = Vec::new();
            for entry in pair.into_inner() {
                // dict_entry = { expr ~ ":" ~ expr }
                let mut kv = entry.into_inner();
                let key = build_expr(required(kv.next())?)?;
                let value = build_expr(required(kv.next())?)?;
                entries.push((key, value));
            }
            Ok(Expr::Dict { entries })
        }
        Rule::list_comp => Ok(Expr::Comprehension {
            kind: ComprehensionKind::List,
        }),
        Rule::set_comp => Ok(Expr::Comprehension {
            kind: ComprehensionKind::Set,
        }),
        Rule::dict_comp => Ok(Expr::Comprehension {
            kind: ComprehensionKind::Dict,
        }),
        Rule::generator => Ok(Expr::Comprehension {
            kind: ComprehensionKind::Generator,
        }),
        rule => Err(format!("unexpected expression rule: {:?}", rule)),
    }
}

fn apply_trailer(target: Expr, trailer: Pair<Rule>) -> BuildResult<Expr> {
    match trailer.as_rule() {
        Rule::call => {
            let ArgList {
                positional,
                keyword,
            } = build_arg_list(trailer.into_inner())?;
            Ok(Expr::Call {
                func: Box::new(target),
                args: positional,
                kwargs: keyword,
            })
        }
        Rule::subscript => {
            let index = build_expr(required(trailer.into_inner().next())?)?;
            Ok(Expr::Subscript {
                value: Box::new(target),
                index: Box::new(index),
            })
        }
        Rule::attribute => {
            let attr = required(trailer.into_inner().next())?.as_str().to_string();
            Ok(Expr::Attribute {
                value: Box::new(target),
                attr,
            })
        }
        rule => Err(format!("unexpected trailer rule: {:?}", rule)),
    }
}

fn build_arg_list<'i>(pairs: impl Iterator<Item = Pair<'i, Rule>>) -> BuildResult<ArgList> {
    let mut args = ArgList::default();
    for pair in pairs {
        if pair.as_rule() == Rule::keyword_arg {
            // keyword_arg = { identifier ~ "=" ~ !"=" ~ expr }
            let mut inner = pair.into_inner();
            let name = required(inner.next())?.as_str().to_string();
            if args.keyword.iter().any(|(k, _)| *k == name) {
                return Err(format!("keyword argument repeated: {}", name));
            }
            let value = build_expr(required(inner.next())?)?;
            args.keyword.push((name, value));
        } else {
            if !args.keyword.is_empty() {
                return Err("positional argument follows keyword argument".to_string());
            }
            args.positional.push(build_expr(pair)?);
        }
    }
    Ok(args)
}

/* ===================== Helpers ===================== */

fn required(pair: Option<Pair<Rule>>) -> BuildResult<Pair<Rule>> {
    pair.ok_or_else(|| "incomplete expression".to_string())
}

fn next_operand(built: &mut impl Iterator<Item = BuildResult<Expr>>) -> BuildResult<Expr> {
    built
        .next()
        .unwrap_or_else(|| Err("incomplete conditional expression".to_string()))
}

/// Children of a pair minus the keyword tokens
fn without_keywords(pair: Pair<Rule>) -> Vec<Pair<Rule>> {
    pair.into_inner()
        .filter(|p| {
            !matches!(
                p.as_rule(),
                Rule::kw_and | Rule::kw_or | Rule::kw_not | Rule::kw_if | Rule::kw_else
            )
        })
        .collect()
}

fn comparison_op(pair: Pair<Rule>) -> BuildResult<CmpOp> {
    let op = required(pair.into_inner().next())?;
    Ok(match op.as_rule() {
        Rule::op_eq => CmpOp::Eq,
        Rule::op_ne => CmpOp::Ne,
        Rule::op_lt => CmpOp::Lt,
        Rule::op_le => CmpOp::Le,
        Rule::op_gt => CmpOp::Gt,
        Rule::op_ge => CmpOp::Ge,
        Rule::op_in => CmpOp::In,
        Rule::op_not_in => CmpOp::NotIn,
        Rule::op_is => CmpOp::Is,
        Rule::op_is_not => CmpOp::IsNot,
        rule => return Err(format!("unexpected comparison operator: {:?}", rule)),
    })
}

fn binary_op(pair: Pair<Rule>) -> BuildResult<BinaryOp> {
    let op = required(pair.into_inner().next())?;
    Ok(match op.as_rule() {
        Rule::op_add => BinaryOp::Add,
        Rule::op_sub => BinaryOp::Sub,
        Rule::op_mul => BinaryOp::Mul,
        Rule::op_div => BinaryOp::Div,
        Rule::op_floordiv => BinaryOp::FloorDiv,
        Rule::op_mod => BinaryOp::Mod,
        rule => return Err(format!("unexpected arithmetic operator: {:?}", rule)),
    })
}

/// Resolve backslash escapes of a string literal body
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(escaped @ ('\\' | '"' | '\'')) => out.push(escaped),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
