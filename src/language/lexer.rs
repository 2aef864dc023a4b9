use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};

#[derive(Debug)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut remaining = source;

    loop {
        remaining = match skip_trivia(remaining) {
            Ok(rest) => rest,
            Err(offset_in_rest) => {
                let start = source.len() - remaining.len() + offset_in_rest;
                errors.push(LexError {
                    message: "Unterminated block comment".into(),
                    span: Span::new(start, source.len()),
                });
                ""
            }
        };
        let offset = source.len() - remaining.len();
        if remaining.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                span: Span::new(offset, offset),
            });
            break;
        }

        let result = lex_numeral(remaining)
            .or_else(|_| lex_word(remaining))
            .or_else(|_| lex_symbol_literal(remaining))
            .or_else(|_| lex_punctuation(remaining));

        match result {
            Ok((rest, kind)) => {
                let end = source.len() - rest.len();
                tokens.push(Token {
                    kind,
                    span: Span::new(offset, end),
                });
                remaining = rest;
            }
            Err(_) if remaining.starts_with('"') => match lex_string(remaining) {
                Ok((rest, text)) => {
                    let end = source.len() - rest.len();
                    tokens.push(Token {
                        kind: TokenKind::String(text),
                        span: Span::new(offset, end),
                    });
                    remaining = rest;
                }
                Err(message) => {
                    errors.push(LexError {
                        message,
                        span: Span::new(offset, source.len()),
                    });
                    remaining = "";
                }
            },
            Err(_) => {
                let ch = remaining.chars().next().unwrap_or(' ');
                errors.push(LexError {
                    message: format!("Unexpected character `{ch}`"),
                    span: Span::new(offset, offset + ch.len_utf8()),
                });
                remaining = &remaining[ch.len_utf8()..];
            }
        }
    }

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

/// Skips whitespace and comments. On an unterminated block comment, returns the
/// offset (relative to `input`) where the comment started.
fn skip_trivia(mut input: &str) -> Result<&str, usize> {
    let base = input.len();
    loop {
        let trimmed = input.trim_start();
        if let Some(rest) = trimmed.strip_prefix("//") {
            input = rest.find('\n').map_or("", |idx| &rest[idx..]);
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            match rest.find("*/") {
                Some(idx) => input = &rest[idx + 2..],
                None => return Err(base - trimmed.len()),
            }
        } else {
            return Ok(trimmed);
        }
    }
}

fn lex_numeral(input: &str) -> IResult<&str, TokenKind> {
    let (rest, text) = recognize(tuple((
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    // digit sequences always parse as f64
    let value = text.parse::<f64>().unwrap_or(f64::NAN);
    Ok((rest, TokenKind::Numeral(value)))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn lex_word(input: &str) -> IResult<&str, TokenKind> {
    map(identifier, |word| match word {
        "let" => TokenKind::Let,
        "in" => TokenKind::In,
        "do" => TokenKind::Do,
        "local" => TokenKind::Local,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "until" => TokenKind::Until,
        "while" => TokenKind::While,
        "where" => TokenKind::Where,
        "by" => TokenKind::By,
        "print" => TokenKind::Print,
        "warning" => TokenKind::Warning,
        "assert" => TokenKind::Assert,
        "_" => TokenKind::Underscore,
        _ => TokenKind::Identifier(word.to_string()),
    })(input)
}

fn lex_symbol_literal(input: &str) -> IResult<&str, TokenKind> {
    map(preceded(char('#'), identifier), |name| {
        TokenKind::Symbol(name.to_string())
    })(input)
}

fn lex_punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        alt((
            map(tag("..."), |_| TokenKind::Ellipsis),
            map(tag("..<"), |_| TokenKind::DotDotLt),
            map(tag(".."), |_| TokenKind::DotDot),
            map(tag(":="), |_| TokenKind::ColonEq),
            map(tag("::"), |_| TokenKind::ColonColon),
            map(tag("=="), |_| TokenKind::EqEq),
            map(tag("!="), |_| TokenKind::BangEq),
            map(tag("<="), |_| TokenKind::LtEq),
            map(tag(">="), |_| TokenKind::GtEq),
            map(tag("&&"), |_| TokenKind::AmpersandAmpersand),
            map(tag("||"), |_| TokenKind::PipePipe),
            map(tag("->"), |_| TokenKind::Arrow),
        )),
        alt((
            map(char('+'), |_| TokenKind::Plus),
            map(char('-'), |_| TokenKind::Minus),
            map(char('*'), |_| TokenKind::Star),
            map(char('/'), |_| TokenKind::Slash),
            map(char('^'), |_| TokenKind::Caret),
            map(char('!'), |_| TokenKind::Bang),
            map(char('='), |_| TokenKind::Eq),
            map(char('<'), |_| TokenKind::Lt),
            map(char('>'), |_| TokenKind::Gt),
            map(char('.'), |_| TokenKind::Dot),
            map(char(','), |_| TokenKind::Comma),
            map(char(';'), |_| TokenKind::Semi),
            map(char(':'), |_| TokenKind::Colon),
            map(char('('), |_| TokenKind::LParen),
            map(char(')'), |_| TokenKind::RParen),
            map(char('{'), |_| TokenKind::LBrace),
            map(char('}'), |_| TokenKind::RBrace),
            map(char('['), |_| TokenKind::LBracket),
            map(char(']'), |_| TokenKind::RBracket),
        )),
    ))(input)
}

fn lex_string(input: &str) -> Result<(&str, String), String> {
    let mut text = String::new();
    let mut chars = input.char_indices().skip(1);
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => return Ok((&input[idx + 1..], text)),
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, '"')) => text.push('"'),
                Some((_, '\\')) => text.push('\\'),
                Some((_, other)) => return Err(format!("Unknown escape sequence `\\{other}`")),
                None => break,
            },
            other => text.push(other),
        }
    }
    Err("Unterminated string literal".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_ranges_without_eating_the_dot() {
        assert_eq!(
            kinds("1..3"),
            vec![
                TokenKind::Numeral(1.0),
                TokenKind::DotDot,
                TokenKind::Numeral(3.0),
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("1.5e2")[0], TokenKind::Numeral(150.0));
    }

    #[test]
    fn skips_comments_and_keeps_spans() {
        let tokens = lex("// hi\nlet /* x */ a").expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::Let);
        assert_eq!(tokens[1].kind, TokenKind::Identifier("a".into()));
        assert_eq!(tokens[1].span, Span::new(18, 19));
    }

    #[test]
    fn lexes_strings_and_symbols() {
        assert_eq!(
            kinds(r#""a\"b" #foo"#),
            vec![
                TokenKind::String("a\"b".into()),
                TokenKind::Symbol("foo".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn reports_bad_characters() {
        let errors = lex("a $ b").expect_err("should fail");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span, Span::new(2, 3));
        assert!(lex("/* open").is_err());
        assert!(lex("\"open").is_err());
    }
}
