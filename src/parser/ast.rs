// AST (Abstract Syntax Tree) definitions for the C subset

use rustc_hash::FxHashSet;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Base types supported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Void,
    Char,
    Short,
    Int,
    Long,
    LongLong,
}

/// Type representation with signedness, const qualifier and pointers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub base: BaseType,
    pub signed: bool,
    pub is_const: bool,
    pub pointer_depth: usize, // 0 = not pointer, 1 = *, 2 = **, etc.
}

impl Type {
    pub fn new(base: BaseType) -> Self {
        Type {
            base,
            signed: true,
            is_const: false,
            pointer_depth: 0,
        }
    }

    pub fn with_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn with_pointer(mut self) -> Self {
        self.pointer_depth += 1;
        self
    }

    pub fn with_unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    /// Width in bits of a value of this type (pointers are 64-bit).
    pub fn bit_width(&self) -> u32 {
        if self.is_pointer() {
            return 64;
        }
        match self.base {
            BaseType::Void => 64,
            BaseType::Char => 8,
            BaseType::Short => 16,
            BaseType::Int => 32,
            BaseType::Long | BaseType::LongLong => 64,
        }
    }

    /// Truncates `value` to this type's width, sign-extending signed types.
    pub fn wrap(&self, value: i64) -> i64 {
        let width = self.bit_width();
        if width >= 64 {
            return value;
        }
        let mask = (1i64 << width) - 1;
        let truncated = value & mask;
        if self.signed && truncated & (1i64 << (width - 1)) != 0 {
            truncated - (1i64 << width)
        } else {
            truncated
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitShl,
    BitShr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::BitShl => "<<",
            BinOp::BitShr => ">>",
        }
    }

    /// Binding strength, higher binds tighter. Mirrors the parser's levels.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::BitOr => 3,
            BinOp::BitXor => 4,
            BinOp::BitAnd => 5,
            BinOp::Eq | BinOp::Ne => 6,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 7,
            BinOp::BitShl | BinOp::BitShr => 8,
            BinOp::Add | BinOp::Sub => 9,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 10,
        }
    }

    /// Operators whose operands may be swapped without changing the result.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Mul | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Eq | BinOp::Ne
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,     // -x
    Plus,    // +x
    Not,     // !x
    BitNot,  // ~x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
    Deref,   // *x
    AddrOf,  // &x
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Plus => "+",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
            UnOp::PreInc | UnOp::PostInc => "++",
            UnOp::PreDec | UnOp::PostDec => "--",
            UnOp::Deref => "*",
            UnOp::AddrOf => "&",
        }
    }

    pub fn is_increment(self) -> bool {
        matches!(
            self,
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec
        )
    }
}

/// Literal payloads. Integer literals keep only their value, never the spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    Str(String),
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub param_type: Type,
}

/// AST nodes representing statements and expressions
///
/// Statements live directly inside a [`AstNode::Block`]; an expression in
/// statement position is an expression statement.
#[derive(Debug, Clone)]
pub enum AstNode {
    FunctionDecl {
        name: String,
        return_type: Type,
        params: Vec<Param>,
        body: Box<AstNode>,
        location: SourceLocation,
    },
    VarDecl {
        name: String,
        var_type: Type,
        init: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    Assign {
        target: String,
        value: Box<AstNode>,
        location: SourceLocation,
    },
    BinaryOp {
        op: BinOp,
        left: Box<AstNode>,
        right: Box<AstNode>,
        location: SourceLocation,
    },
    UnaryOp {
        op: UnOp,
        operand: Box<AstNode>,
        location: SourceLocation,
    },
    Literal(Literal, SourceLocation),
    Identifier(String, SourceLocation),
    ForLoop {
        init: Option<Box<AstNode>>,
        condition: Option<Box<AstNode>>,
        step: Option<Box<AstNode>>,
        body: Box<AstNode>,
        location: SourceLocation,
    },
    If {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    Return {
        value: Option<Box<AstNode>>,
        location: SourceLocation,
    },
    Block {
        statements: Vec<AstNode>,
        location: SourceLocation,
    },
    Call {
        name: String,
        args: Vec<AstNode>,
        location: SourceLocation,
    },
}

impl AstNode {
    /// Get the source location of this node
    pub fn location(&self) -> SourceLocation {
        match self {
            AstNode::FunctionDecl { location, .. }
            | AstNode::VarDecl { location, .. }
            | AstNode::Assign { location, .. }
            | AstNode::BinaryOp { location, .. }
            | AstNode::UnaryOp { location, .. }
            | AstNode::ForLoop { location, .. }
            | AstNode::If { location, .. }
            | AstNode::Return { location, .. }
            | AstNode::Block { location, .. }
            | AstNode::Call { location, .. } => *location,
            AstNode::Literal(_, loc) | AstNode::Identifier(_, loc) => *loc,
        }
    }

    pub fn int(value: i64, location: SourceLocation) -> Self {
        AstNode::Literal(Literal::Int(value), location)
    }

    pub fn ident(name: impl Into<String>, location: SourceLocation) -> Self {
        AstNode::Identifier(name.into(), location)
    }

    pub fn binary(op: BinOp, left: AstNode, right: AstNode, location: SourceLocation) -> Self {
        AstNode::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            location,
        }
    }

    pub fn assign(target: impl Into<String>, value: AstNode, location: SourceLocation) -> Self {
        AstNode::Assign {
            target: target.into(),
            value: Box::new(value),
            location,
        }
    }

    pub fn block(statements: Vec<AstNode>, location: SourceLocation) -> Self {
        AstNode::Block {
            statements,
            location,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AstNode::Literal(Literal::Int(n), _) => Some(*n),
            _ => None,
        }
    }

    /// Statements of a block; any other node is its own single statement.
    pub fn statements(&self) -> &[AstNode] {
        match self {
            AstNode::Block { statements, .. } => statements,
            other => std::slice::from_ref(other),
        }
    }

    /// True when evaluating the node has no side effects: no call,
    /// no assignment, no increment or decrement anywhere inside it.
    pub fn is_pure(&self) -> bool {
        match self {
            AstNode::Literal(..) | AstNode::Identifier(..) => true,
            AstNode::BinaryOp { left, right, .. } => left.is_pure() && right.is_pure(),
            AstNode::UnaryOp { op, operand, .. } => !op.is_increment() && operand.is_pure(),
            AstNode::Call { .. } | AstNode::Assign { .. } => false,
            AstNode::VarDecl { init, .. } => init.as_ref().map_or(true, |i| i.is_pure()),
            AstNode::Block { statements, .. } => statements.iter().all(AstNode::is_pure),
            AstNode::FunctionDecl { .. }
            | AstNode::ForLoop { .. }
            | AstNode::If { .. }
            | AstNode::Return { .. } => false,
        }
    }

    /// Collects every variable whose value the node reads.
    ///
    /// An assignment reads its right-hand side only; `++x` reads `x`.
    pub fn collect_reads(&self, out: &mut FxHashSet<String>) {
        match self {
            AstNode::Identifier(name, _) => {
                out.insert(name.clone());
            }
            AstNode::Literal(..) => {}
            AstNode::Assign { value, .. } => value.collect_reads(out),
            AstNode::BinaryOp { left, right, .. } => {
                left.collect_reads(out);
                right.collect_reads(out);
            }
            AstNode::UnaryOp { operand, .. } => operand.collect_reads(out),
            AstNode::Call { args, .. } => args.iter().for_each(|a| a.collect_reads(out)),
            AstNode::VarDecl { init, .. } => {
                if let Some(init) = init {
                    init.collect_reads(out);
                }
            }
            AstNode::Return { value, .. } => {
                if let Some(value) = value {
                    value.collect_reads(out);
                }
            }
            AstNode::Block { statements, .. } => {
                statements.iter().for_each(|s| s.collect_reads(out));
            }
            AstNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                condition.collect_reads(out);
                then_branch.collect_reads(out);
                if let Some(else_branch) = else_branch {
                    else_branch.collect_reads(out);
                }
            }
            AstNode::ForLoop {
                init,
                condition,
                step,
                body,
                ..
            } => {
                for part in [init, condition, step].into_iter().flatten() {
                    part.collect_reads(out);
                }
                body.collect_reads(out);
            }
            AstNode::FunctionDecl { body, .. } => body.collect_reads(out),
        }
    }

    pub fn reads(&self) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        self.collect_reads(&mut out);
        out
    }

    /// Collects every variable the node assigns (including `++x`).
    pub fn collect_writes(&self, out: &mut FxHashSet<String>) {
        match self {
            AstNode::Assign { target, value, .. } => {
                out.insert(target.clone());
                value.collect_writes(out);
            }
            AstNode::UnaryOp { op, operand, .. } => {
                if op.is_increment() {
                    if let AstNode::Identifier(name, _) = operand.as_ref() {
                        out.insert(name.clone());
                    }
                }
                operand.collect_writes(out);
            }
            AstNode::VarDecl { name, init, .. } => {
                if let Some(init) = init {
                    out.insert(name.clone());
                    init.collect_writes(out);
                }
            }
            AstNode::Identifier(..) | AstNode::Literal(..) => {}
            AstNode::BinaryOp { left, right, .. } => {
                left.collect_writes(out);
                right.collect_writes(out);
            }
            AstNode::Call { args, .. } => args.iter().for_each(|a| a.collect_writes(out)),
            AstNode::Return { value, .. } => {
                if let Some(value) = value {
                    value.collect_writes(out);
                }
            }
            AstNode::Block { statements, .. } => {
                statements.iter().for_each(|s| s.collect_writes(out));
            }
            AstNode::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                condition.collect_writes(out);
                then_branch.collect_writes(out);
                if let Some(else_branch) = else_branch {
                    else_branch.collect_writes(out);
                }
            }
            AstNode::ForLoop {
                init,
                condition,
                step,
                body,
                ..
            } => {
                for part in [init, condition, step].into_iter().flatten() {
                    part.collect_writes(out);
                }
                body.collect_writes(out);
            }
            AstNode::FunctionDecl { body, .. } => body.collect_writes(out),
        }
    }

    pub fn writes(&self) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        self.collect_writes(&mut out);
        out
    }

    /// True when `name` appears anywhere in the node, read or written.
    pub fn mentions(&self, name: &str) -> bool {
        self.reads().contains(name) || self.writes().contains(name)
    }

    /// Structural equality ignoring source locations.
    pub fn same_as(&self, other: &AstNode) -> bool {
        fn opt(a: &Option<Box<AstNode>>, b: &Option<Box<AstNode>>) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => a.same_as(b),
                _ => false,
            }
        }
        fn list(a: &[AstNode], b: &[AstNode]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
        }

        match (self, other) {
            (
                AstNode::FunctionDecl {
                    name: n1,
                    return_type: r1,
                    params: p1,
                    body: b1,
                    ..
                },
                AstNode::FunctionDecl {
                    name: n2,
                    return_type: r2,
                    params: p2,
                    body: b2,
                    ..
                },
            ) => n1 == n2 && r1 == r2 && p1 == p2 && b1.same_as(b2),
            (
                AstNode::VarDecl {
                    name: n1,
                    var_type: t1,
                    init: i1,
                    ..
                },
                AstNode::VarDecl {
                    name: n2,
                    var_type: t2,
                    init: i2,
                    ..
                },
            ) => n1 == n2 && t1 == t2 && opt(i1, i2),
            (
                AstNode::Assign {
                    target: t1,
                    value: v1,
                    ..
                },
                AstNode::Assign {
                    target: t2,
                    value: v2,
                    ..
                },
            ) => t1 == t2 && v1.same_as(v2),
            (
                AstNode::BinaryOp {
                    op: o1,
                    left: l1,
                    right: r1,
                    ..
                },
                AstNode::BinaryOp {
                    op: o2,
                    left: l2,
                    right: r2,
                    ..
                },
            ) => o1 == o2 && l1.same_as(l2) && r1.same_as(r2),
            (
                AstNode::UnaryOp {
                    op: o1,
                    operand: a1,
                    ..
                },
                AstNode::UnaryOp {
                    op: o2,
                    operand: a2,
                    ..
                },
            ) => o1 == o2 && a1.same_as(a2),
            (AstNode::Literal(a, _), AstNode::Literal(b, _)) => a == b,
            (AstNode::Identifier(a, _), AstNode::Identifier(b, _)) => a == b,
            (
                AstNode::ForLoop {
                    init: i1,
                    condition: c1,
                    step: s1,
                    body: b1,
                    ..
                },
                AstNode::ForLoop {
                    init: i2,
                    condition: c2,
                    step: s2,
                    body: b2,
                    ..
                },
            ) => opt(i1, i2) && opt(c1, c2) && opt(s1, s2) && b1.same_as(b2),
            (
                AstNode::If {
                    condition: c1,
                    then_branch: t1,
                    else_branch: e1,
                    ..
                },
                AstNode::If {
                    condition: c2,
                    then_branch: t2,
                    else_branch: e2,
                    ..
                },
            ) => c1.same_as(c2) && t1.same_as(t2) && opt(e1, e2),
            (AstNode::Return { value: v1, .. }, AstNode::Return { value: v2, .. }) => opt(v1, v2),
            (
                AstNode::Block { statements: s1, .. },
                AstNode::Block { statements: s2, .. },
            ) => list(s1, s2),
            (
                AstNode::Call {
                    name: n1, args: a1, ..
                },
                AstNode::Call {
                    name: n2, args: a2, ..
                },
            ) => n1 == n2 && list(a1, a2),
            _ => false,
        }
    }
}

/// Top-level program structure
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub nodes: Vec<AstNode>, // All top-level declarations (FunctionDecl)
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn same_as(&self, other: &Program) -> bool {
        self.nodes.len() == other.nodes.len()
            && self.nodes.iter().zip(&other.nodes).all(|(a, b)| a.same_as(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_wrap() {
        let int = Type::new(BaseType::Int);
        assert_eq!(int.wrap(i64::from(i32::MAX) + 1), i64::from(i32::MIN));
        let uchar = Type::new(BaseType::Char).with_unsigned();
        assert_eq!(uchar.wrap(-1), 255);
        let long = Type::new(BaseType::Long);
        assert_eq!(long.wrap(-5), -5);
    }

    #[test]
    fn test_reads_and_writes() {
        let loc = SourceLocation::default();
        let stmt = AstNode::assign(
            "c",
            AstNode::binary(BinOp::Add, AstNode::ident("a", loc), AstNode::ident("b", loc), loc),
            loc,
        );
        let reads = stmt.reads();
        assert!(reads.contains("a") && reads.contains("b"));
        assert!(!reads.contains("c"));
        assert!(stmt.writes().contains("c"));
        assert!(stmt.mentions("c"));
        assert!(!stmt.is_pure());
    }

    #[test]
    fn test_same_as_ignores_locations() {
        let a = AstNode::binary(
            BinOp::Sub,
            AstNode::ident("x", SourceLocation::new(1, 1)),
            AstNode::int(3, SourceLocation::new(1, 5)),
            SourceLocation::new(1, 3),
        );
        let b = AstNode::binary(
            BinOp::Sub,
            AstNode::ident("x", SourceLocation::new(7, 2)),
            AstNode::int(3, SourceLocation::new(7, 9)),
            SourceLocation::new(7, 4),
        );
        assert!(a.same_as(&b));
        let c = AstNode::binary(
            BinOp::Add,
            AstNode::ident("x", SourceLocation::new(7, 2)),
            AstNode::int(3, SourceLocation::new(7, 9)),
            SourceLocation::new(7, 4),
        );
        assert!(!a.same_as(&c));
    }
}
