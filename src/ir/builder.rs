use crate::ir::constant::Constant;
use crate::ir::function::{Block, BlockData, Body, Inst, Value, ValueData, ValueDef};
use crate::ir::instructions::{BinaryOp, CastOp, FloatCC, InstData, IntCC, UnaryOp};
use crate::ir::module::FuncId;
use crate::ir::types::Type;

/// A positioned instruction builder over one function [`Body`].
///
/// Blocks are created eagerly and appended in creation order; instructions
/// go to the current block. Phi nodes are created on their owning block up
/// front and receive incoming edges as branches to that block are emitted.
pub struct FunctionBuilder<'a> {
    body: &'a mut Body,
    current: Option<Block>,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(body: &'a mut Body) -> Self {
        debug_assert!(body.blocks.is_empty(), "body must be empty");
        Self {
            body,
            current: None,
        }
    }

    pub fn create_block(&mut self, name: impl Into<String>) -> Block {
        let block = self.body.blocks.push(BlockData {
            name: name.into(),
            phis: Vec::new(),
            insts: Vec::new(),
        });
        self.body.block_order.push(block);
        block
    }

    pub fn switch_to_block(&mut self, block: Block) {
        self.current = Some(block);
    }

    pub fn current_block(&self) -> Block {
        self.current.expect("builder is not positioned at a block")
    }

    pub fn value_type(&self, value: Value) -> Type {
        self.body.values[value].ty
    }

    /// Whether the current block already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        let block = &self.body.blocks[self.current_block()];
        block
            .insts
            .last()
            .is_some_and(|inst| self.body.insts[*inst].is_terminator())
    }

    fn make_value(&mut self, ty: Type, def: ValueDef) -> Value {
        self.body.values.push(ValueData { ty, def })
    }

    fn emit(&mut self, data: InstData, result_ty: Option<Type>) -> (Inst, Option<Value>) {
        let block = self.current_block();
        debug_assert!(!self.is_terminated(), "emitting into a terminated block");
        let inst = self.body.insts.push(data);
        self.body.blocks[block].insts.push(inst);
        let result = result_ty.map(|ty| {
            let value = self.make_value(ty, ValueDef::Inst(inst));
            self.body.inst_results[inst] = value.into();
            value
        });
        (inst, result)
    }

    /// Materializes the n-th function parameter as a value.
    pub fn func_param(&mut self, index: u32, ty: Type) -> Value {
        self.make_value(ty, ValueDef::Param(index))
    }

    /// Materializes a constant as a value.
    pub fn constant(&mut self, constant: Constant) -> Value {
        let ty = constant.ty();
        self.make_value(ty, ValueDef::Const(constant))
    }

    pub fn iconst(&mut self, ty: Type, bits: u64) -> Value {
        self.constant(Constant::Int { ty, bits })
    }

    pub fn alloca(&mut self, ptr_ty: Type, pointee: Type, name: impl Into<String>) -> Value {
        self.emit(
            InstData::Alloca {
                ty: pointee,
                name: name.into(),
            },
            Some(ptr_ty),
        )
        .1
        .expect("alloca produces a value")
    }

    pub fn load(&mut self, ty: Type, ptr: Value) -> Value {
        self.emit(InstData::Load { ty, ptr }, Some(ty))
            .1
            .expect("load produces a value")
    }

    pub fn store(&mut self, value: Value, ptr: Value) {
        self.emit(InstData::Store { value, ptr }, None);
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        let ty = self.value_type(lhs);
        self.emit(InstData::Binary { op, lhs, rhs }, Some(ty))
            .1
            .expect("binary op produces a value")
    }

    pub fn unary(&mut self, op: UnaryOp, arg: Value) -> Value {
        let ty = self.value_type(arg);
        self.emit(InstData::Unary { op, arg }, Some(ty))
            .1
            .expect("unary op produces a value")
    }

    /// Integer comparison; `result_ty` is the i1 type.
    pub fn icmp(&mut self, cond: IntCC, lhs: Value, rhs: Value, result_ty: Type) -> Value {
        self.emit(InstData::Icmp { cond, lhs, rhs }, Some(result_ty))
            .1
            .expect("icmp produces a value")
    }

    pub fn fcmp(&mut self, cond: FloatCC, lhs: Value, rhs: Value, result_ty: Type) -> Value {
        self.emit(InstData::Fcmp { cond, lhs, rhs }, Some(result_ty))
            .1
            .expect("fcmp produces a value")
    }

    pub fn cast(&mut self, op: CastOp, arg: Value, ty: Type) -> Value {
        self.emit(InstData::Cast { op, arg, ty }, Some(ty))
            .1
            .expect("cast produces a value")
    }

    pub fn select(&mut self, cond: Value, then_value: Value, else_value: Value) -> Value {
        let ty = self.value_type(then_value);
        self.emit(
            InstData::Select {
                cond,
                then_value,
                else_value,
            },
            Some(ty),
        )
        .1
        .expect("select produces a value")
    }

    pub fn getelementptr(&mut self, result_ty: Type, base: Value, indices: Vec<Value>) -> Value {
        self.emit(InstData::GetElementPtr { base, indices }, Some(result_ty))
            .1
            .expect("getelementptr produces a value")
    }

    /// Emits a direct call; `result_ty` is `None` for void callees.
    pub fn call(&mut self, func: FuncId, result_ty: Option<Type>, args: Vec<Value>) -> Option<Value> {
        self.emit(InstData::Call { func, args }, result_ty).1
    }

    pub fn call_indirect(
        &mut self,
        sig: Type,
        callee: Value,
        result_ty: Option<Type>,
        args: Vec<Value>,
    ) -> Option<Value> {
        self.emit(InstData::CallIndirect { sig, callee, args }, result_ty)
            .1
    }

    /// Creates a phi node at the head of `block` (which need not be the
    /// current block).
    pub fn create_phi(&mut self, block: Block, ty: Type) -> Value {
        let inst = self.body.insts.push(InstData::Phi {
            ty,
            incoming: Vec::new(),
        });
        self.body.blocks[block].phis.push(inst);
        let value = self.make_value(ty, ValueDef::Inst(inst));
        self.body.inst_results[inst] = value.into();
        value
    }

    /// Adds an incoming edge to a phi created with [`Self::create_phi`].
    pub fn add_phi_incoming(&mut self, phi: Value, value: Value, pred: Block) {
        let inst = match &self.body.values[phi].def {
            ValueDef::Inst(inst) => *inst,
            _ => panic!("phi value does not name an instruction"),
        };
        match &mut self.body.insts[inst] {
            InstData::Phi { incoming, .. } => incoming.push((value, pred)),
            _ => panic!("value is not a phi"),
        }
    }

    pub fn br(&mut self, dest: Block) {
        self.emit(InstData::Br { dest }, None);
    }

    /// Emits a conditional branch and returns its instruction so the false
    /// edge can be repointed later (used when an `else` arm materializes).
    pub fn cond_br(&mut self, cond: Value, then_dest: Block, else_dest: Block) -> Inst {
        self.emit(
            InstData::CondBr {
                cond,
                then_dest,
                else_dest,
            },
            None,
        )
        .0
    }

    /// Repoints the false edge of a conditional branch.
    pub fn set_cond_br_else(&mut self, inst: Inst, dest: Block) {
        match &mut self.body.insts[inst] {
            InstData::CondBr { else_dest, .. } => *else_dest = dest,
            _ => panic!("instruction is not a conditional branch"),
        }
    }

    pub fn switch(&mut self, index: Value, default: Block, targets: Vec<Block>) {
        self.emit(
            InstData::Switch {
                index,
                default,
                targets,
            },
            None,
        );
    }

    pub fn ret(&mut self, value: Option<Value>) {
        self.emit(InstData::Ret { value }, None);
    }

    pub fn unreachable(&mut self) {
        self.emit(InstData::Unreachable, None);
    }
}
