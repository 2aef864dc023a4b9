use crate::language::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Numeral(f64),
    String(String),
    Symbol(String),

    Let,
    In,
    Do,
    Local,
    If,
    Else,
    For,
    Until,
    While,
    Where,
    By,
    Print,
    Warning,
    Assert,
    Underscore,

    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Bang,
    BangEq,
    Eq,
    EqEq,
    ColonEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AmpersandAmpersand,
    PipePipe,
    Dot,
    DotDot,
    DotDotLt,
    Ellipsis,
    Comma,
    Semi,
    Colon,
    ColonColon,
    Arrow,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Identifier(name) => format!("identifier `{name}`"),
            TokenKind::Numeral(value) => format!("number `{value}`"),
            TokenKind::String(_) => "string literal".into(),
            TokenKind::Symbol(name) => format!("symbol `#{name}`"),
            TokenKind::Eof => "end of input".into(),
            other => format!("`{}`", other.spelling()),
        }
    }

    pub fn spelling(&self) -> &'static str {
        match self {
            TokenKind::Let => "let",
            TokenKind::In => "in",
            TokenKind::Do => "do",
            TokenKind::Local => "local",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::Until => "until",
            TokenKind::While => "while",
            TokenKind::Where => "where",
            TokenKind::By => "by",
            TokenKind::Print => "print",
            TokenKind::Warning => "warning",
            TokenKind::Assert => "assert",
            TokenKind::Underscore => "_",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Caret => "^",
            TokenKind::Bang => "!",
            TokenKind::BangEq => "!=",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::ColonEq => ":=",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::AmpersandAmpersand => "&&",
            TokenKind::PipePipe => "||",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::DotDotLt => "..<",
            TokenKind::Ellipsis => "...",
            TokenKind::Comma => ",",
            TokenKind::Semi => ";",
            TokenKind::Colon => ":",
            TokenKind::ColonColon => "::",
            TokenKind::Arrow => "->",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Identifier(_)
            | TokenKind::Numeral(_)
            | TokenKind::String(_)
            | TokenKind::Symbol(_)
            | TokenKind::Eof => "",
        }
    }
}
