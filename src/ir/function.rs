use crate::ir::constant::Constant;
use crate::ir::instructions::InstData;
use crate::ir::module::Linkage;
use crate::ir::types::Type;
use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(u32);
entity_impl!(Block);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Inst(u32);
entity_impl!(Inst);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(u32);
entity_impl!(Value);

/// A function signature; `ret` is the void type for result-less functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

/// Where an SSA value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueDef {
    /// The n-th function parameter.
    Param(u32),
    /// The result of an instruction.
    Inst(Inst),
    /// A constant materialized as a value.
    Const(Constant),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueData {
    pub ty: Type,
    pub def: ValueDef,
}

/// A basic block: phi nodes first, then ordinary instructions, the last of
/// which is the terminator.
#[derive(Debug, Default)]
pub struct BlockData {
    pub name: String,
    pub phis: Vec<Inst>,
    pub insts: Vec<Inst>,
}

/// The body of a defined function: a CFG of basic blocks over one shared
/// instruction and value arena, in creation order.
#[derive(Debug, Default)]
pub struct Body {
    pub(crate) blocks: PrimaryMap<Block, BlockData>,
    pub(crate) insts: PrimaryMap<Inst, InstData>,
    pub(crate) values: PrimaryMap<Value, ValueData>,
    pub(crate) inst_results: SecondaryMap<Inst, PackedOption<Value>>,
    pub(crate) block_order: Vec<Block>,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks in layout (creation) order.
    pub fn blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.block_order.iter().copied()
    }

    pub fn num_blocks(&self) -> usize {
        self.block_order.len()
    }

    pub fn entry_block(&self) -> Option<Block> {
        self.block_order.first().copied()
    }

    pub fn block(&self, block: Block) -> &BlockData {
        &self.blocks[block]
    }

    pub fn inst(&self, inst: Inst) -> &InstData {
        &self.insts[inst]
    }

    pub fn value(&self, value: Value) -> &ValueData {
        &self.values[value]
    }

    pub fn value_type(&self, value: Value) -> Type {
        self.values[value].ty
    }

    pub fn inst_result(&self, inst: Inst) -> Option<Value> {
        self.inst_results[inst].expand()
    }
}

/// An IR function: prototype plus, for defined functions, a [`Body`].
#[derive(Debug)]
pub struct FunctionData {
    pub(crate) name: String,
    pub(crate) signature: Signature,
    pub(crate) linkage: Linkage,
    pub(crate) dso_local: bool,
    pub(crate) param_names: Vec<String>,
    pub(crate) null_pointer_is_valid: bool,
    pub(crate) body: Option<Body>,
}

impl FunctionData {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn set_linkage(&mut self, linkage: Linkage) {
        self.linkage = linkage;
    }

    pub fn is_dso_local(&self) -> bool {
        self.dso_local
    }

    pub fn set_dso_local(&mut self, dso_local: bool) {
        self.dso_local = dso_local;
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    pub fn set_param_names(&mut self, names: Vec<String>) {
        debug_assert_eq!(names.len(), self.signature.params.len());
        self.param_names = names;
    }

    /// Whether address 0 is considered a valid pointer inside this
    /// function. Set for lowered Wasm bodies, where linear-memory address 0
    /// is legitimate.
    pub fn null_pointer_is_valid(&self) -> bool {
        self.null_pointer_is_valid
    }

    pub fn set_null_pointer_is_valid(&mut self, value: bool) {
        self.null_pointer_is_valid = value;
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = Some(body);
    }

    /// True for prototypes without a body (imports, or not yet lowered).
    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }
}
