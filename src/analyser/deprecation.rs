/// Language features that still work but are scheduled for removal. How they
/// are reported depends on the configured deprecation level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Deprecation {
    /// `body where (defs)`
    WhereClause,
    /// `list(i)` in place of `list.[i]`
    IndexByCall,
}

impl Deprecation {
    pub fn feature(&self) -> &'static str {
        match self {
            Deprecation::WhereClause => "`where`",
            Deprecation::IndexByCall => "indexing a list by calling it",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Deprecation::WhereClause => "use `let (defs) in body` instead",
            Deprecation::IndexByCall => "use `list.[index]` instead",
        }
    }
}
