//! The lowering core: drives declaration and definition of all module
//! entities in a fixed phase order, then hands each function body to the
//! body translator.

mod code;
mod env;
mod func;
mod memory;
mod module;
mod names;
mod state;
mod table;
mod types;

use crate::const_eval::ConstExprEvaluator;
use crate::indices::{FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex};
use crate::ir;
use crate::options::Options;
use crate::parse::{ModuleParser, ParsedModule};
use cranelift_entity::PrimaryMap;
use wasmparser::Validator;

pub(crate) use env::FuncEnv;
pub(crate) use func::FuncTranslator;

/// Lowers a binary WebAssembly module into `module`.
///
/// The destination module must be freshly created. On success the
/// index-space mappings of all lowered entities are returned.
pub fn lower_wasm(
    module: &mut ir::Module,
    options: Options,
    bytes: &[u8],
) -> crate::Result<LoweredModule> {
    let mut validator = Validator::new();
    let parsed = ModuleParser::new(&mut validator).parse(bytes)?;
    LoweringContext::new(module, options).lower(parsed)
}

/// Lowers a module in text format; see [`lower_wasm`].
pub fn lower_wat(
    module: &mut ir::Module,
    options: Options,
    text: &str,
) -> crate::Result<LoweredModule> {
    let bytes = wat::parse_str(text)?;
    lower_wasm(module, options, &bytes)
}

/// The index-space mappings produced by one lowering run, ordered by Wasm
/// index-space ordinal.
#[derive(Debug, Default)]
pub struct LoweredModule {
    pub funcs: PrimaryMap<FuncIndex, ir::FuncId>,
    pub globals: PrimaryMap<GlobalIndex, ir::GlobalId>,
    pub memories: PrimaryMap<MemoryIndex, ir::GlobalId>,
    pub tables: PrimaryMap<TableIndex, ir::GlobalId>,
}

/// Frequently used type handles, interned once per lowering run.
pub(crate) struct CommonTypes {
    pub void: ir::Type,
    pub int1: ir::Type,
    pub int8: ir::Type,
    pub int16: ir::Type,
    pub int32: ir::Type,
    pub int64: ir::Type,
    pub int128: ir::Type,
    pub float: ir::Type,
    pub double: ir::Type,
    pub ptr_int8: ir::Type,
    pub ptr_int16: ir::Type,
    pub ptr_int32: ir::Type,
    pub ptr_int64: ir::Type,
    pub ptr_int128: ir::Type,
    pub ptr_float: ir::Type,
    pub ptr_double: ir::Type,
    /// The opaque function-pointer type used for table elements: a pointer
    /// to `void ()`. Actual signatures are recovered downstream.
    pub func_ptr: ir::Type,
    pub ptr_func_ptr: ir::Type,
}

impl CommonTypes {
    fn new(types: &mut ir::TypeStore) -> Self {
        let void = types.void();
        let int1 = types.int1();
        let int8 = types.int8();
        let int16 = types.int16();
        let int32 = types.int32();
        let int64 = types.int64();
        let int128 = types.int128();
        let float = types.float();
        let double = types.double();
        let nullary = types.function(&[], void);
        let func_ptr = types.pointer_to(nullary);
        Self {
            void,
            int1,
            int8,
            int16,
            int32,
            int64,
            int128,
            float,
            double,
            ptr_int8: types.pointer_to(int8),
            ptr_int16: types.pointer_to(int16),
            ptr_int32: types.pointer_to(int32),
            ptr_int64: types.pointer_to(int64),
            ptr_int128: types.pointer_to(int128),
            ptr_float: types.pointer_to(float),
            ptr_double: types.pointer_to(double),
            func_ptr,
            ptr_func_ptr: types.pointer_to(func_ptr),
        }
    }

    /// The cached pointer type to a scalar value type.
    pub fn pointer_to(&self, ty: ir::Type) -> Option<ir::Type> {
        if ty == self.int8 {
            Some(self.ptr_int8)
        } else if ty == self.int16 {
            Some(self.ptr_int16)
        } else if ty == self.int32 {
            Some(self.ptr_int32)
        } else if ty == self.int64 {
            Some(self.ptr_int64)
        } else if ty == self.int128 {
            Some(self.ptr_int128)
        } else if ty == self.float {
            Some(self.ptr_float)
        } else if ty == self.double {
            Some(self.ptr_double)
        } else if ty == self.func_ptr {
            Some(self.ptr_func_ptr)
        } else {
            None
        }
    }
}

/// Per-type-section function types, pre-interned for `call_indirect`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SigTypes {
    /// The IR function type.
    pub func: ir::Type,
    /// A pointer to it.
    pub func_ptr: ir::Type,
}

/// The lowering context: destination module, configuration, and the four
/// parallel index-space mappings built up phase by phase.
pub struct LoweringContext<'a> {
    pub(crate) module: &'a mut ir::Module,
    pub(crate) opts: Options,
    pub(crate) funcs: PrimaryMap<FuncIndex, ir::FuncId>,
    pub(crate) globs: PrimaryMap<GlobalIndex, ir::GlobalId>,
    pub(crate) mems: PrimaryMap<MemoryIndex, ir::GlobalId>,
    pub(crate) tables: PrimaryMap<TableIndex, ir::GlobalId>,
    pub(crate) common: CommonTypes,
    pub(crate) sig_types: PrimaryMap<TypeIndex, Option<SigTypes>>,
    /// Pointer-to-memory-array types, parallel to `mems`.
    pub(crate) mem_ptr_types: PrimaryMap<MemoryIndex, ir::Type>,
    /// Pointer-to-table-array types, parallel to `tables`.
    pub(crate) table_ptr_types: PrimaryMap<TableIndex, ir::Type>,
    pub(crate) const_eval: ConstExprEvaluator,
}

impl<'a> LoweringContext<'a> {
    pub fn new(module: &'a mut ir::Module, opts: Options) -> Self {
        let common = CommonTypes::new(&mut module.types);
        Self {
            module,
            opts,
            funcs: PrimaryMap::new(),
            globs: PrimaryMap::new(),
            mems: PrimaryMap::new(),
            tables: PrimaryMap::new(),
            common,
            sig_types: PrimaryMap::new(),
            mem_ptr_types: PrimaryMap::new(),
            table_ptr_types: PrimaryMap::new(),
            const_eval: ConstExprEvaluator::default(),
        }
    }

    pub(crate) fn func_signature_of(
        &self,
        parsed: &ParsedModule<'_>,
        index: TypeIndex,
    ) -> crate::Result<ir::Signature> {
        types::func_signature(&self.module.types, &parsed.types[index])
    }
}
