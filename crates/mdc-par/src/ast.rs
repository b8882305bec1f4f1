//! AST node definitions.
//!
//! Two root kinds: [`Expr`] and [`Stmt`]. Every node keeps its originating
//! token (or first token) so later phases can point diagnostics and runtime
//! errors back at the source. Nodes are plain data; passes walk them with
//! exhaustive matches.

use mdc_lex::Token;
use mdc_util::{Span, Symbol};
use std::fmt;

/// A parsed program: an ordered list of top-level statements.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// An identifier occurrence.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ident {
    pub token: Token,
    pub name: Symbol,
}

impl Ident {
    pub fn span(&self) -> Span {
        self.token.span
    }
}

/// Statements.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// `Set `x` to EXPR.`
    Set(SetStmt),
    /// `Give back EXPR.`
    Return(ReturnStmt),
    /// `Call `f` with ARGS.`
    Call(CallStmt),
    /// `If EXPR then: BLOCK [else BLOCK]`
    If(IfStmt),
    /// `Say EXPR.`
    Say(SayStmt),
    /// A private method definition (`### **Action**: `name``).
    Action(MethodDef),
    /// A public method definition (`### **Interaction**: `name``).
    Interaction(MethodDef),
    /// A bare expression terminated by `.`.
    Expr(ExprStmt),
    /// Tokens skipped during panic-mode recovery.
    Error(ErrorStmt),
}

impl Stmt {
    /// The statement's originating token.
    pub fn token(&self) -> &Token {
        match self {
            Stmt::Set(s) => &s.token,
            Stmt::Return(s) => &s.token,
            Stmt::Call(s) => &s.token,
            Stmt::If(s) => &s.token,
            Stmt::Say(s) => &s.token,
            Stmt::Action(m) | Stmt::Interaction(m) => &m.token,
            Stmt::Expr(s) => &s.token,
            Stmt::Error(s) => &s.token,
        }
    }

    pub fn span(&self) -> Span {
        self.token().span
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SetStmt {
    pub token: Token,
    pub name: Ident,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReturnStmt {
    pub token: Token,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallStmt {
    pub token: Token,
    pub callee: Ident,
    pub args: CallArgs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IfStmt {
    pub token: Token,
    pub condition: Expr,
    pub consequence: Block,
    pub alternative: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SayStmt {
    pub token: Token,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExprStmt {
    pub token: Token,
    pub expr: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ErrorStmt {
    pub token: Token,
    /// The tokens consumed while resynchronising.
    pub skipped: Vec<Token>,
}

/// A `>`-marked block. Depth is the marker count of its lines, always at
/// least one more than the enclosing block's depth.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub token: Token,
    pub depth: u8,
    pub statements: Vec<Stmt>,
}

/// Method visibility: `Action` is same-scope, `Interaction` is public.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Public,
}

/// An `Action` or `Interaction` definition.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDef {
    pub token: Token,
    pub name: Ident,
    pub visibility: Visibility,
    /// Doc text from a leading `<summary>` comment, if any.
    pub doc: Option<Symbol>,
    /// Declared inputs from a `#### Inputs` section.
    pub params: Vec<Param>,
    /// Declared output type from a `#### Outputs` section.
    pub output: Option<TypeName>,
    pub body: Block,
}

/// A declared parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<TypeName>,
}

/// Surface type names used in Inputs/Outputs declarations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeName {
    WholeNumber,
    Float,
    Text,
    YesNo,
    Url,
}

impl TypeName {
    /// Map a declaration's words (already lowercased) to a type name.
    pub fn from_words(words: &[&str]) -> Option<TypeName> {
        match words {
            ["whole", "number"] | ["number"] => Some(TypeName::WholeNumber),
            ["float"] => Some(TypeName::Float),
            ["text"] => Some(TypeName::Text),
            ["yes", "no"] | ["yes/no"] => Some(TypeName::YesNo),
            ["url"] => Some(TypeName::Url),
            _ => None,
        }
    }
}

/// Call arguments: positional expressions first, then `name: value` pairs.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct CallArgs {
    pub positional: Vec<Expr>,
    pub named: Vec<(Ident, Expr)>,
}

impl CallArgs {
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

/// Expressions.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(IntLit),
    Float(FloatLit),
    Str(StrLit),
    Url(UrlLit),
    Bool(BoolLit),
    Empty(EmptyLit),
    Ident(Ident),
    Prefix(PrefixExpr),
    Infix(InfixExpr),
    /// `THEN if COND else ELSE` — the condition sits in the middle.
    Conditional(Box<ConditionalExpr>),
    /// A call in expression position: `call `f` with ARGS`.
    Call(Box<CallExpr>),
    /// A parenthesised expression.
    Group(Box<GroupExpr>),
    /// A hole left by error recovery.
    Error(ErrorExpr),
}

impl Expr {
    /// The expression's originating token.
    pub fn token(&self) -> &Token {
        match self {
            Expr::Int(e) => &e.token,
            Expr::Float(e) => &e.token,
            Expr::Str(e) => &e.token,
            Expr::Url(e) => &e.token,
            Expr::Bool(e) => &e.token,
            Expr::Empty(e) => &e.token,
            Expr::Ident(e) => &e.token,
            Expr::Prefix(e) => &e.token,
            Expr::Infix(e) => &e.token,
            Expr::Conditional(e) => &e.token,
            Expr::Call(e) => &e.token,
            Expr::Group(e) => &e.token,
            Expr::Error(e) => &e.token,
        }
    }

    pub fn span(&self) -> Span {
        self.token().span
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntLit {
    pub token: Token,
    pub value: i64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FloatLit {
    pub token: Token,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrLit {
    pub token: Token,
    pub value: Symbol,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UrlLit {
    pub token: Token,
    pub value: Symbol,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoolLit {
    pub token: Token,
    pub value: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmptyLit {
    pub token: Token,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrefixOp {
    Neg,
    Not,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrefixExpr {
    pub token: Token,
    pub op: PrefixOp,
    pub operand: Box<Expr>,
}

/// Binary operators, already canonical: phrasal comparators map onto these
/// one-to-one during parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    And,
    Or,
}

impl BinOp {
    /// The canonical surface spelling, used by the printer.
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
            BinOp::Eq => "equals",
            BinOp::NotEq => "is not equal to",
            BinOp::StrictEq => "is strictly equal to",
            BinOp::StrictNotEq => "is not strictly equal to",
            BinOp::Lt => "is less than",
            BinOp::Gt => "is greater than",
            BinOp::LtEq => "is less than or equal to",
            BinOp::GtEq => "is greater than or equal to",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InfixExpr {
    pub token: Token,
    pub op: BinOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConditionalExpr {
    pub token: Token,
    /// The value when the condition holds; written first.
    pub then_value: Expr,
    pub condition: Expr,
    pub else_value: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CallExpr {
    pub token: Token,
    pub callee: Ident,
    pub args: CallArgs,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupExpr {
    pub token: Token,
    pub inner: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ErrorExpr {
    pub token: Token,
}

// Canonical printing. `parse` then `Display` round-trips token content,
// which the tests rely on for backtick identifiers.

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.name)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(e) => write!(f, "_{}_", e.value),
            // `{:?}` keeps the decimal point on round floats.
            Expr::Float(e) => write!(f, "_{:?}_", e.value),
            Expr::Str(e) => write!(f, "_\"{}\"_", e.value),
            Expr::Url(e) => write!(f, "_\"{}\"_", e.value),
            Expr::Bool(e) => write!(f, "_{}_", if e.value { "Yes" } else { "No" }),
            Expr::Empty(_) => write!(f, "_empty_"),
            Expr::Ident(e) => write!(f, "{e}"),
            Expr::Prefix(e) => match e.op {
                PrefixOp::Neg => write!(f, "-{}", e.operand),
                PrefixOp::Not => write!(f, "not {}", e.operand),
            },
            Expr::Infix(e) => write!(f, "{} {} {}", e.left, e.op.as_str(), e.right),
            Expr::Conditional(e) => {
                write!(f, "{} if {} else {}", e.then_value, e.condition, e.else_value)
            }
            Expr::Call(e) => {
                write!(f, "call {}", e.callee)?;
                fmt_args(f, &e.args)
            }
            Expr::Group(e) => write!(f, "({})", e.inner),
            Expr::Error(_) => write!(f, "<error>"),
        }
    }
}

impl Stmt {
    fn fmt_at_depth(&self, f: &mut fmt::Formatter<'_>, depth: u8) -> fmt::Result {
        let marker = "> ".repeat(depth as usize);
        match self {
            Stmt::Set(s) => writeln!(f, "{marker}Set {} to {}.", s.name, s.value),
            Stmt::Return(s) => match &s.value {
                Some(value) => writeln!(f, "{marker}give back {value}."),
                None => writeln!(f, "{marker}give back."),
            },
            Stmt::Call(s) => {
                write!(f, "{marker}call {}", s.callee)?;
                fmt_args(f, &s.args)?;
                writeln!(f, ".")
            }
            Stmt::If(s) => {
                writeln!(f, "{marker}If {} then:", s.condition)?;
                s.consequence.fmt_at_depth(f)?;
                if let Some(alt) = &s.alternative {
                    writeln!(f, "{marker}else:")?;
                    alt.fmt_at_depth(f)?;
                }
                Ok(())
            }
            Stmt::Say(s) => writeln!(f, "{marker}Say {}.", s.value),
            Stmt::Action(m) | Stmt::Interaction(m) => {
                let kind = match m.visibility {
                    Visibility::Private => "Action",
                    Visibility::Public => "Interaction",
                };
                writeln!(f, "### **{kind}**: {}", m.name)?;
                writeln!(f, "<details>")?;
                if let Some(doc) = m.doc {
                    writeln!(f, "<summary>{doc}</summary>")?;
                }
                if !m.params.is_empty() {
                    writeln!(f, "#### Inputs")?;
                    for param in &m.params {
                        write!(f, "- {}", param.name)?;
                        if let Some(ty) = param.ty {
                            write!(f, " as {}", type_name_str(ty))?;
                        }
                        writeln!(f)?;
                    }
                }
                if let Some(output) = m.output {
                    writeln!(f, "#### Outputs")?;
                    writeln!(f, "- {}", type_name_str(output))?;
                }
                for stmt in &m.body.statements {
                    stmt.fmt_at_depth(f, 0)?;
                }
                writeln!(f, "</details>")
            }
            Stmt::Expr(s) => writeln!(f, "{marker}{}.", s.expr),
            Stmt::Error(s) => {
                write!(f, "{marker}")?;
                for token in &s.skipped {
                    write!(f, "{} ", token.lexeme)?;
                }
                writeln!(f)
            }
        }
    }
}

impl Block {
    fn fmt_at_depth(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            stmt.fmt_at_depth(f, self.depth)?;
        }
        Ok(())
    }
}

fn fmt_args(f: &mut fmt::Formatter<'_>, args: &CallArgs) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    write!(f, " with ")?;
    let mut first = true;
    for arg in &args.positional {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{arg}")?;
    }
    for (name, value) in &args.named {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{}: {}", name.name, value)?;
    }
    Ok(())
}

fn type_name_str(ty: TypeName) -> &'static str {
    match ty {
        TypeName::WholeNumber => "Whole Number",
        TypeName::Float => "Float",
        TypeName::Text => "Text",
        TypeName::YesNo => "Yes/No",
        TypeName::Url => "URL",
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at_depth(f, 0)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            stmt.fmt_at_depth(f, 0)?;
        }
        Ok(())
    }
}
