//! AST model: two tagged variants, `Stmt` and `Expr`, each node carrying a
//! source position so the evaluator and diagnostics can always point back at
//! the source that produced it.

use crate::token::Position;

pub type P<T> = Box<T>;

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    InlineHtml(Vec<u8>),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        body: Vec<Stmt>,
        elseifs: Vec<(Expr, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Expr>,
        cond: Vec<Expr>,
        step: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Foreach {
        expr: Expr,
        key: Option<Expr>,
        value: Expr,
        by_ref: bool,
        body: Vec<Stmt>,
    },
    Switch {
        cond: Expr,
        cases: Vec<SwitchCase>,
    },
    Try {
        body: Vec<Stmt>,
        catches: Vec<CatchClause>,
        finally: Option<Vec<Stmt>>,
    },
    Throw(Expr),
    Return(Option<Expr>),
    Break(Option<u32>),
    Continue(Option<u32>),
    Echo(Vec<Expr>),
    Global(Vec<String>),
    StaticVar(Vec<(String, Option<Expr>)>),
    Unset(Vec<Expr>),
    Declare {
        directives: Vec<(String, Expr)>,
        body: Option<Vec<Stmt>>,
    },
    Namespace {
        name: Option<String>,
        body: Option<Vec<Stmt>>,
    },
    Use(Vec<UseImport>),
    Function(P<FunctionDecl>),
    Class(P<ClassDecl>),
    Interface(P<InterfaceDecl>),
    Trait(P<TraitDecl>),
    EnumDecl(P<EnumDecl>),
    Goto(String),
    Label(String),
    ExprStmt(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseImport {
    pub path: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub cond: Option<Expr>, // None == default
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub types: Vec<String>,
    pub var: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
    pub by_ref: bool,
    pub variadic: bool,
    pub promote_visibility: Option<Visibility>,
    pub promote_readonly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionDecl {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub params: Vec<Param>,
    pub by_ref: bool,
    pub body: Vec<Stmt>,
    pub is_generator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_readonly: bool,
    pub is_static: bool,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub modifiers: Modifiers,
    pub params: Vec<Param>,
    pub by_ref: bool,
    pub body: Option<Vec<Stmt>>, // None for abstract/interface methods
    pub is_generator: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: String,
    pub default: Option<Expr>,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Property(PropertyDecl),
    Method(MethodDecl),
    Const(ConstDecl),
    UseTrait { names: Vec<String>, aliases: Vec<(String, String, String)> },
    EnumCase { name: String, value: Option<Expr> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassDecl {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceDecl {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub extends: Vec<String>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraitDecl {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumDecl {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub backing: Option<String>,
    pub implements: Vec<String>,
    pub members: Vec<ClassMember>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
    pub unpack: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
    pub by_ref: bool,
    pub unpack: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub conds: Option<Vec<Expr>>, // None == default
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosureUse {
    pub name: String,
    pub by_ref: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Le,
    Gt,
    Ge,
    Spaceship,
    And,
    Or,
    Xor,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Pos,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Literal(Vec<u8>),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Vec<u8>),
    Encapsed(Vec<StringPart>),
    Variable(String),
    VariableVariable(P<Expr>),
    ArrayLiteral(Vec<ArrayItem>),
    Binary { op: BinOp, lhs: P<Expr>, rhs: P<Expr> },
    Unary { op: UnOp, expr: P<Expr> },
    IncDec { op: IncDecOp, target: P<Expr> },
    Assign { target: P<Expr>, op: Option<BinOp>, value: P<Expr> },
    AssignRef { target: P<Expr>, value: P<Expr> },
    Coalesce { lhs: P<Expr>, rhs: P<Expr> },
    CoalesceAssign { target: P<Expr>, value: P<Expr> },
    Ternary { cond: P<Expr>, then: Option<P<Expr>>, else_: P<Expr> },
    Call { callee: P<Expr>, args: Vec<Arg> },
    MethodCall { object: P<Expr>, nullsafe: bool, method: P<Expr>, args: Vec<Arg> },
    StaticCall { class: P<Expr>, method: String, args: Vec<Arg> },
    PropertyFetch { object: P<Expr>, nullsafe: bool, property: P<Expr> },
    StaticPropertyFetch { class: P<Expr>, property: String },
    ClassConstFetch { class: P<Expr>, constant: String },
    ArrayAccess { array: P<Expr>, index: Option<P<Expr>> },
    New { class: P<Expr>, args: Vec<Arg> },
    Clone(P<Expr>),
    Instanceof { expr: P<Expr>, class: P<Expr> },
    Closure {
        params: Vec<Param>,
        uses: Vec<ClosureUse>,
        is_static: bool,
        by_ref: bool,
        body: Vec<Stmt>,
        is_generator: bool,
    },
    ArrowFunc {
        params: Vec<Param>,
        is_static: bool,
        body: P<Expr>,
    },
    Match { subject: P<Expr>, arms: Vec<MatchArm> },
    Yield { key: Option<P<Expr>>, value: Option<P<Expr>> },
    YieldFrom(P<Expr>),
    Throw(P<Expr>),
    Include { kind: IncludeKind, path: P<Expr> },
    Isset(Vec<Expr>),
    Empty(P<Expr>),
    Eval(P<Expr>),
    Exit(Option<P<Expr>>),
    List(Vec<Option<ArrayItem>>),
    Name(String),
    MagicConst(String),
    ErrorSuppress(P<Expr>),
    Cast { kind: crate::token::CastKind, expr: P<Expr> },
    Print(P<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeKind {
    Include,
    IncludeOnce,
    Require,
    RequireOnce,
}
