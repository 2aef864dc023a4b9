use crate::language::span::{Span, Spanned};

/// A node of the syntax tree. Phrases are interpreted by the analyser; the parser
/// does not decide whether a phrase is an expression, a statement, a definition or a
/// pattern.
#[derive(Clone, Debug)]
pub struct Phrase {
    pub kind: PhraseKind,
    pub span: Span,
}

impl Spanned for Phrase {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Separator {
    /// `(a)`: plain grouping.
    None,
    /// `(a, b)` or `()`: a list.
    Comma,
    /// `(a; b)`: a compound statement.
    Semicolon,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Equal,
    NotEqual,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "^",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq
        )
    }
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Pos => "+",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Print,
    Warning,
    Assert,
}

#[derive(Clone, Debug)]
pub enum PhraseKind {
    Identifier(String),
    Numeral(f64),
    String(String),
    Symbol(String),
    Underscore,
    Paren {
        items: Vec<Phrase>,
        separator: Separator,
    },
    Bracket(Vec<Phrase>),
    Brace(Vec<Phrase>),
    Unary {
        op: UnaryOp,
        operand: Box<Phrase>,
    },
    Binary {
        op: BinaryOp,
        op_span: Span,
        left: Box<Phrase>,
        right: Box<Phrase>,
    },
    Call {
        function: Box<Phrase>,
        argument: Box<Phrase>,
    },
    Dot {
        base: Box<Phrase>,
        field: String,
        field_span: Span,
    },
    Index {
        base: Box<Phrase>,
        indices: Vec<Phrase>,
    },
    Range {
        first: Box<Phrase>,
        last: Box<Phrase>,
        step: Option<Box<Phrase>>,
        half_open: bool,
    },
    Lambda {
        param: Box<Phrase>,
        body: Box<Phrase>,
    },
    Predicate {
        pattern: Box<Phrase>,
        predicate: Box<Phrase>,
    },
    Definition {
        left: Box<Phrase>,
        right: Box<Phrase>,
    },
    Assignment {
        left: Box<Phrase>,
        right: Box<Phrase>,
    },
    Colon {
        key: Box<Phrase>,
        value: Box<Phrase>,
    },
    Local(Box<Phrase>),
    Spread(Box<Phrase>),
    Action {
        kind: ActionKind,
        argument: Box<Phrase>,
    },
    If {
        condition: Box<Phrase>,
        then_branch: Box<Phrase>,
        else_branch: Option<Box<Phrase>>,
    },
    For {
        pattern: Box<Phrase>,
        list: Box<Phrase>,
        until: Option<Box<Phrase>>,
        body: Box<Phrase>,
    },
    While {
        condition: Box<Phrase>,
        body: Box<Phrase>,
    },
    Let {
        items: Vec<Phrase>,
        body: Box<Phrase>,
    },
    Do {
        items: Vec<Phrase>,
        body: Box<Phrase>,
    },
    Where {
        body: Box<Phrase>,
        items: Vec<Phrase>,
    },
}

impl Phrase {
    pub fn new(kind: PhraseKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn boxed(kind: PhraseKind, span: Span) -> Box<Self> {
        Box::new(Self::new(kind, span))
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            PhraseKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Strips redundant grouping parentheses.
    pub fn ungrouped(&self) -> &Phrase {
        match &self.kind {
            PhraseKind::Paren {
                items,
                separator: Separator::None,
            } if items.len() == 1 => items[0].ungrouped(),
            _ => self,
        }
    }

    /// True for phrases that introduce bindings in a definition list.
    pub fn is_definition(&self) -> bool {
        match &self.kind {
            PhraseKind::Definition { .. } => true,
            PhraseKind::Paren {
                items,
                separator: Separator::Semicolon,
            } => !items.is_empty() && items.iter().all(Phrase::is_definition),
            _ => false,
        }
    }

    /// A short human readable name for the kind of phrase, used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            PhraseKind::Identifier(_) => "identifier",
            PhraseKind::Numeral(_) => "number",
            PhraseKind::String(_) => "string",
            PhraseKind::Symbol(_) => "symbol",
            PhraseKind::Underscore => "`_`",
            PhraseKind::Paren { .. } => "parenthesized phrase",
            PhraseKind::Bracket(_) => "list",
            PhraseKind::Brace(_) => "record",
            PhraseKind::Unary { .. } => "unary expression",
            PhraseKind::Binary { .. } => "binary expression",
            PhraseKind::Call { .. } => "function call",
            PhraseKind::Dot { .. } => "field reference",
            PhraseKind::Index { .. } => "index expression",
            PhraseKind::Range { .. } => "range",
            PhraseKind::Lambda { .. } => "lambda expression",
            PhraseKind::Predicate { .. } => "predicate pattern",
            PhraseKind::Definition { .. } => "definition",
            PhraseKind::Assignment { .. } => "assignment",
            PhraseKind::Colon { .. } => "field specifier",
            PhraseKind::Local(_) => "local definition",
            PhraseKind::Spread(_) => "spread",
            PhraseKind::Action { .. } => "action",
            PhraseKind::If { .. } => "if phrase",
            PhraseKind::For { .. } => "for loop",
            PhraseKind::While { .. } => "while loop",
            PhraseKind::Let { .. } => "let phrase",
            PhraseKind::Do { .. } => "do phrase",
            PhraseKind::Where { .. } => "where phrase",
        }
    }
}
