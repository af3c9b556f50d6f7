use crate::ir::function::{Block, Value};
use crate::ir::module::FuncId;
use crate::ir::types::Type;

/// Two-operand arithmetic and bitwise operations. The result type equals
/// the operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    And,
    Or,
    Xor,
    Shl,
    AShr,
    LShr,
    Rotl,
    Rotr,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FMin,
    FMax,
    FCopysign,
}

/// One-operand operations; result type equals the operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Clz,
    Ctz,
    Popcnt,
    FNeg,
    FAbs,
    Sqrt,
    Ceil,
    Floor,
    /// Round toward zero.
    Trunc,
    /// Round to nearest, ties to even.
    Nearest,
}

/// Integer comparison condition codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntCC {
    Equal,
    NotEqual,
    SignedLessThan,
    SignedLessThanOrEqual,
    SignedGreaterThan,
    SignedGreaterThanOrEqual,
    UnsignedLessThan,
    UnsignedLessThanOrEqual,
    UnsignedGreaterThan,
    UnsignedGreaterThanOrEqual,
}

/// Floating point comparison condition codes. `Equal` and the ordering
/// predicates are ordered comparisons; `NotEqual` is unordered-or-unequal,
/// matching WebAssembly `ne`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatCC {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Value-to-value conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToSi,
    FpToUi,
    SiToFp,
    UiToFp,
    /// Saturating float-to-signed-integer conversion.
    FpToSiSat,
    /// Saturating float-to-unsigned-integer conversion.
    FpToUiSat,
    PtrToInt,
    IntToPtr,
    Bitcast,
}

/// An instruction. Result types, where not implied by the operands, are
/// carried inline.
#[derive(Debug, Clone, PartialEq)]
pub enum InstData {
    /// Reserve a stack slot holding one `ty`; produces a pointer.
    Alloca { ty: Type, name: String },
    Load { ty: Type, ptr: Value },
    Store { value: Value, ptr: Value },
    Binary { op: BinaryOp, lhs: Value, rhs: Value },
    Unary { op: UnaryOp, arg: Value },
    /// Produces `i1`.
    Icmp { cond: IntCC, lhs: Value, rhs: Value },
    /// Produces `i1`.
    Fcmp { cond: FloatCC, lhs: Value, rhs: Value },
    Cast { op: CastOp, arg: Value, ty: Type },
    Select {
        cond: Value,
        then_value: Value,
        else_value: Value,
    },
    /// Element-pointer computation; `base` must be a pointer and the
    /// indices address into its pointee, LLVM style.
    GetElementPtr { base: Value, indices: Vec<Value> },
    Call { func: FuncId, args: Vec<Value> },
    /// Call through a function pointer of function type `sig`.
    CallIndirect {
        sig: Type,
        callee: Value,
        args: Vec<Value>,
    },
    /// SSA merge node; one incoming value per predecessor edge.
    Phi {
        ty: Type,
        incoming: Vec<(Value, Block)>,
    },
    Br { dest: Block },
    CondBr {
        cond: Value,
        then_dest: Block,
        else_dest: Block,
    },
    /// Multi-way branch on an integer index; `targets[k]` is taken for
    /// index `k`, everything else goes to `default`.
    Switch {
        index: Value,
        default: Block,
        targets: Vec<Block>,
    },
    Ret { value: Option<Value> },
    Unreachable,
}

impl InstData {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstData::Br { .. }
                | InstData::CondBr { .. }
                | InstData::Switch { .. }
                | InstData::Ret { .. }
                | InstData::Unreachable
        )
    }
}
