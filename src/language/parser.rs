use crate::language::{
    ast::*,
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    span::Span,
    token::{Token, TokenKind},
};
use std::mem;

pub fn parse_program(source: &str) -> Result<Phrase, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => {
            let errs = errors
                .into_iter()
                .map(|err| SyntaxError::new(err.message, err.span))
                .collect();
            return Err(SyntaxErrors::new(errs));
        }
    };
    Parser::new(tokens)
        .parse()
        .map_err(|err| SyntaxErrors::new(vec![err]))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

struct ItemList {
    items: Vec<Phrase>,
    saw_comma: bool,
    saw_semi: bool,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn parse(mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        if self.check(&TokenKind::Eof) {
            return Err(self.error_here("Expected a program, found end of input"));
        }
        let list = self.parse_items(&TokenKind::Eof)?;
        self.expect(&TokenKind::Eof)?;
        let span = Span::new(start, self.prev_end());
        if list.saw_semi || list.items.len() > 1 {
            if list.saw_comma {
                return Err(SyntaxError::new(
                    "A program cannot mix `,` and `;` separators",
                    span,
                ));
            }
            Ok(Phrase::new(
                PhraseKind::Paren {
                    items: list.items,
                    separator: Separator::Semicolon,
                },
                span,
            ))
        } else {
            let mut items = list.items;
            Ok(items.remove(0))
        }
    }

    // ---- token helpers ----

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        mem::discriminant(self.peek()) == mem::discriminant(kind)
    }

    fn matches(&mut self, kind: &TokenKind) -> Option<Span> {
        if self.check(kind) {
            Some(self.advance().span)
        } else {
            None
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Span, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance().span)
        } else {
            Err(self.error_here(format!(
                "Expected {}, found {}",
                kind.describe(),
                self.peek().describe()
            )))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current_span())
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end().max(start))
    }

    // ---- grammar ----

    fn parse_items(&mut self, terminator: &TokenKind) -> Result<ItemList, SyntaxError> {
        let mut list = ItemList {
            items: Vec::new(),
            saw_comma: false,
            saw_semi: false,
        };
        while !self.check(terminator) && !self.check(&TokenKind::Eof) {
            list.items.push(self.parse_item()?);
            if self.matches(&TokenKind::Comma).is_some() {
                list.saw_comma = true;
            } else if self.matches(&TokenKind::Semi).is_some() {
                list.saw_semi = true;
            } else {
                break;
            }
        }
        Ok(list)
    }

    fn parse_item(&mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        match self.peek() {
            TokenKind::Local => {
                self.advance();
                let def = self.parse_item()?;
                return Ok(Phrase::new(
                    PhraseKind::Local(Box::new(def)),
                    self.span_from(start),
                ));
            }
            TokenKind::Ellipsis => {
                self.advance();
                let expr = self.parse_pipeline()?;
                return Ok(Phrase::new(
                    PhraseKind::Spread(Box::new(expr)),
                    self.span_from(start),
                ));
            }
            TokenKind::Print | TokenKind::Warning | TokenKind::Assert => {
                let kind = match self.advance().kind {
                    TokenKind::Print => ActionKind::Print,
                    TokenKind::Warning => ActionKind::Warning,
                    _ => ActionKind::Assert,
                };
                let argument = self.parse_pipeline()?;
                return Ok(Phrase::new(
                    PhraseKind::Action {
                        kind,
                        argument: Box::new(argument),
                    },
                    self.span_from(start),
                ));
            }
            _ => {}
        }

        let left = self.parse_pipeline()?;
        if self.matches(&TokenKind::Eq).is_some() {
            let right = self.parse_item()?;
            return Ok(Phrase::new(
                PhraseKind::Definition {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(start),
            ));
        }
        if self.matches(&TokenKind::ColonEq).is_some() {
            let right = self.parse_item()?;
            return Ok(Phrase::new(
                PhraseKind::Assignment {
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(start),
            ));
        }
        if self.matches(&TokenKind::Colon).is_some() {
            let value = self.parse_item()?;
            return Ok(Phrase::new(
                PhraseKind::Colon {
                    key: Box::new(left),
                    value: Box::new(value),
                },
                self.span_from(start),
            ));
        }
        if self.matches(&TokenKind::Where).is_some() {
            let defs = self.parse_primary()?;
            let items = match defs.kind {
                PhraseKind::Paren {
                    items,
                    separator: Separator::Semicolon | Separator::None,
                } => items,
                _ => vec![defs],
            };
            return Ok(Phrase::new(
                PhraseKind::Where {
                    body: Box::new(left),
                    items,
                },
                self.span_from(start),
            ));
        }
        Ok(left)
    }

    fn parse_pipeline(&mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        let is_let = self.check(&TokenKind::Let);
        if is_let || self.check(&TokenKind::Do) {
            self.advance();
            let list = self.parse_items(&TokenKind::In)?;
            self.expect(&TokenKind::In)?;
            let body = Box::new(self.parse_item()?);
            let kind = if is_let {
                PhraseKind::Let {
                    items: list.items,
                    body,
                }
            } else {
                PhraseKind::Do {
                    items: list.items,
                    body,
                }
            };
            return Ok(Phrase::new(kind, self.span_from(start)));
        }
        self.parse_lambda()
    }

    fn parse_lambda(&mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        let param = self.parse_guard()?;
        if self.matches(&TokenKind::Arrow).is_some() {
            let body = self.parse_pipeline()?;
            return Ok(Phrase::new(
                PhraseKind::Lambda {
                    param: Box::new(param),
                    body: Box::new(body),
                },
                self.span_from(start),
            ));
        }
        Ok(param)
    }

    fn parse_guard(&mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        let pattern = self.parse_range()?;
        if self.matches(&TokenKind::ColonColon).is_some() {
            let predicate = self.parse_range()?;
            return Ok(Phrase::new(
                PhraseKind::Predicate {
                    pattern: Box::new(pattern),
                    predicate: Box::new(predicate),
                },
                self.span_from(start),
            ));
        }
        Ok(pattern)
    }

    fn parse_range(&mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        let first = self.parse_or()?;
        let half_open = if self.matches(&TokenKind::DotDot).is_some() {
            false
        } else if self.matches(&TokenKind::DotDotLt).is_some() {
            true
        } else {
            return Ok(first);
        };
        let last = self.parse_or()?;
        let step = if self.matches(&TokenKind::By).is_some() {
            Some(Box::new(self.parse_or()?))
        } else {
            None
        };
        Ok(Phrase::new(
            PhraseKind::Range {
                first: Box::new(first),
                last: Box::new(last),
                step,
                half_open,
            },
            self.span_from(start),
        ))
    }

    fn binary(&self, op: BinaryOp, op_span: Span, left: Phrase, right: Phrase) -> Phrase {
        let span = left.span.merge(right.span);
        Phrase::new(
            PhraseKind::Binary {
                op,
                op_span,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }

    fn parse_or(&mut self) -> Result<Phrase, SyntaxError> {
        let mut left = self.parse_and()?;
        while let Some(op_span) = self.matches(&TokenKind::PipePipe) {
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, op_span, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Phrase, SyntaxError> {
        let mut left = self.parse_relation()?;
        while let Some(op_span) = self.matches(&TokenKind::AmpersandAmpersand) {
            let right = self.parse_relation()?;
            left = self.binary(BinaryOp::And, op_span, left, right);
        }
        Ok(left)
    }

    fn parse_relation(&mut self) -> Result<Phrase, SyntaxError> {
        let left = self.parse_additive()?;
        let op = match self.peek() {
            TokenKind::EqEq => BinaryOp::Equal,
            TokenKind::BangEq => BinaryOp::NotEqual,
            TokenKind::Lt => BinaryOp::Less,
            TokenKind::LtEq => BinaryOp::LessEq,
            TokenKind::Gt => BinaryOp::Greater,
            TokenKind::GtEq => BinaryOp::GreaterEq,
            _ => return Ok(left),
        };
        let op_span = self.advance().span;
        let right = self.parse_additive()?;
        Ok(self.binary(op, op_span, left, right))
    }

    fn parse_additive(&mut self) -> Result<Phrase, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            let op_span = self.advance().span;
            let right = self.parse_multiplicative()?;
            left = self.binary(op, op_span, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Phrase, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            let op_span = self.advance().span;
            let right = self.parse_unary()?;
            left = self.binary(op, op_span, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Phrase::new(
            PhraseKind::Unary {
                op,
                operand: Box::new(operand),
            },
            self.span_from(start),
        ))
    }

    fn parse_power(&mut self) -> Result<Phrase, SyntaxError> {
        let base = self.parse_postfix()?;
        if let Some(op_span) = self.matches(&TokenKind::Caret) {
            let exponent = self.parse_unary()?;
            return Ok(self.binary(BinaryOp::Pow, op_span, base, exponent));
        }
        Ok(base)
    }

    fn starts_argument(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Identifier(_)
                | TokenKind::Numeral(_)
                | TokenKind::String(_)
                | TokenKind::Symbol(_)
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::LBrace
        )
    }

    fn parse_postfix(&mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(&TokenKind::Dot).is_some() {
                if self.matches(&TokenKind::LBracket).is_some() {
                    let list = self.parse_items(&TokenKind::RBracket)?;
                    self.expect(&TokenKind::RBracket)?;
                    if list.items.is_empty() {
                        return Err(SyntaxError::new(
                            "An index expression needs at least one index",
                            self.span_from(start),
                        ));
                    }
                    expr = Phrase::new(
                        PhraseKind::Index {
                            base: Box::new(expr),
                            indices: list.items,
                        },
                        self.span_from(start),
                    );
                    continue;
                }
                let token = self.advance();
                let field = match token.kind {
                    TokenKind::Identifier(name) => name,
                    other => {
                        return Err(SyntaxError::new(
                            format!("Expected a field name after `.`, found {}", other.describe()),
                            token.span,
                        )
                        .with_help("use `a.[i]` to index a list"))
                    }
                };
                expr = Phrase::new(
                    PhraseKind::Dot {
                        base: Box::new(expr),
                        field,
                        field_span: token.span,
                    },
                    self.span_from(start),
                );
            } else if self.starts_argument() {
                let argument = self.parse_primary()?;
                expr = Phrase::new(
                    PhraseKind::Call {
                        function: Box::new(expr),
                        argument: Box::new(argument),
                    },
                    self.span_from(start),
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Phrase, SyntaxError> {
        let start = self.current_span().start;
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::Identifier(name) => PhraseKind::Identifier(name),
            TokenKind::Numeral(value) => PhraseKind::Numeral(value),
            TokenKind::String(text) => PhraseKind::String(text),
            TokenKind::Symbol(name) => PhraseKind::Symbol(name),
            TokenKind::Underscore => PhraseKind::Underscore,
            TokenKind::LParen => {
                let list = self.parse_items(&TokenKind::RParen)?;
                self.expect(&TokenKind::RParen)?;
                if list.saw_comma && list.saw_semi {
                    return Err(SyntaxError::new(
                        "Parentheses cannot mix `,` and `;` separators",
                        self.span_from(start),
                    ));
                }
                let separator = if list.saw_semi {
                    Separator::Semicolon
                } else if list.saw_comma || list.items.is_empty() {
                    Separator::Comma
                } else {
                    Separator::None
                };
                PhraseKind::Paren {
                    items: list.items,
                    separator,
                }
            }
            TokenKind::LBracket => {
                let list = self.parse_items(&TokenKind::RBracket)?;
                self.expect(&TokenKind::RBracket)?;
                PhraseKind::Bracket(list.items)
            }
            TokenKind::LBrace => {
                let list = self.parse_items(&TokenKind::RBrace)?;
                self.expect(&TokenKind::RBrace)?;
                PhraseKind::Brace(list.items)
            }
            TokenKind::If => {
                self.expect(&TokenKind::LParen)?;
                let condition = self.parse_item()?;
                self.expect(&TokenKind::RParen)?;
                let then_branch = self.parse_item()?;
                let else_branch = if self.matches(&TokenKind::Else).is_some() {
                    Some(Box::new(self.parse_item()?))
                } else {
                    None
                };
                PhraseKind::If {
                    condition: Box::new(condition),
                    then_branch: Box::new(then_branch),
                    else_branch,
                }
            }
            TokenKind::For => {
                self.expect(&TokenKind::LParen)?;
                let pattern = self.parse_guard()?;
                self.expect(&TokenKind::In)?;
                let list = self.parse_pipeline()?;
                let until = if self.matches(&TokenKind::Until).is_some() {
                    Some(Box::new(self.parse_pipeline()?))
                } else {
                    None
                };
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_item()?;
                PhraseKind::For {
                    pattern: Box::new(pattern),
                    list: Box::new(list),
                    until,
                    body: Box::new(body),
                }
            }
            TokenKind::While => {
                self.expect(&TokenKind::LParen)?;
                let condition = self.parse_item()?;
                self.expect(&TokenKind::RParen)?;
                let body = self.parse_item()?;
                PhraseKind::While {
                    condition: Box::new(condition),
                    body: Box::new(body),
                }
            }
            other => {
                return Err(SyntaxError::new(
                    format!("Expected an expression, found {}", other.describe()),
                    token.span,
                ))
            }
        };
        Ok(Phrase::new(kind, self.span_from(start)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Phrase {
        parse_program(source).expect("parse")
    }

    #[test]
    fn juxtaposition_binds_tighter_than_dot() {
        let phrase = parse("f a.b");
        match phrase.kind {
            PhraseKind::Dot { base, field, .. } => {
                assert_eq!(field, "b");
                assert!(matches!(base.kind, PhraseKind::Call { .. }));
            }
            other => panic!("unexpected phrase {other:?}"),
        }
    }

    #[test]
    fn minus_after_call_is_subtraction() {
        let phrase = parse("f -1");
        assert!(matches!(
            phrase.kind,
            PhraseKind::Binary {
                op: BinaryOp::Sub,
                ..
            }
        ));
    }

    #[test]
    fn let_collects_definitions() {
        let phrase = parse("let f(x) = x*x; a = 2 in f(a)");
        match phrase.kind {
            PhraseKind::Let { items, body } => {
                assert_eq!(items.len(), 2);
                assert!(items.iter().all(Phrase::is_definition));
                assert!(matches!(body.kind, PhraseKind::Call { .. }));
            }
            other => panic!("unexpected phrase {other:?}"),
        }
    }

    #[test]
    fn parentheses_distinguish_lists_and_statements() {
        assert!(matches!(
            parse("(1, 2)").kind,
            PhraseKind::Paren {
                separator: Separator::Comma,
                ..
            }
        ));
        assert!(matches!(
            parse("(x := 1; x := 2)").kind,
            PhraseKind::Paren {
                separator: Separator::Semicolon,
                ..
            }
        ));
        assert!(matches!(
            parse("(1)").kind,
            PhraseKind::Paren {
                separator: Separator::None,
                ..
            }
        ));
    }

    #[test]
    fn parses_loops_and_ranges() {
        let phrase = parse("for (i in 1..10 by 2 until i > 5) print i");
        match phrase.kind {
            PhraseKind::For { list, until, .. } => {
                assert!(matches!(list.kind, PhraseKind::Range { step: Some(_), .. }));
                assert!(until.is_some());
            }
            other => panic!("unexpected phrase {other:?}"),
        }
    }

    #[test]
    fn power_is_right_associative_under_negation() {
        match parse("-x^2").kind {
            PhraseKind::Unary { op, operand } => {
                assert_eq!(op, UnaryOp::Neg);
                assert!(matches!(
                    operand.kind,
                    PhraseKind::Binary {
                        op: BinaryOp::Pow,
                        ..
                    }
                ));
            }
            other => panic!("unexpected phrase {other:?}"),
        }
    }

    #[test]
    fn reports_unexpected_tokens() {
        let errors = parse_program("[1, 2").expect_err("should fail");
        assert!(errors.errors[0].message.contains("Expected `]`"));
        assert!(parse_program("").is_err());
    }
}
