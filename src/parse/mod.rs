//! Parsing of WebAssembly binaries into the in-memory module structure
//! consumed by the lowering.
//!
//! [`ModuleParser`] walks the wasmparser payload stream (validating as it
//! goes) and accumulates a [`ParsedModule`]: ordered entity tables, the
//! name section, constant expressions and the raw function bodies. Nothing
//! here touches the destination IR.

mod const_expr;
mod module_parser;

use crate::indices::{
    DataIndex, DefinedFuncIndex, DefinedGlobalIndex, FuncIndex, GlobalIndex, LocalIndex,
    MemoryIndex, TableIndex, TypeIndex,
};
use crate::{EntityIndex, WASM_PAGE_SIZE};
use crate::errors::Error;
use cranelift_entity::PrimaryMap;
use hashbrown::HashMap;
use wasmparser::{
    FuncToValidate, FuncType, FunctionBody, GlobalType, MemoryType, RefType, TableType,
    ValidatorResources,
};

pub use const_expr::{ConstExpr, ConstOp};
pub use module_parser::ModuleParser;

/// A parsed, validated WebAssembly module.
///
/// Index spaces include imported entities first, then defined ones, in
/// declaration order.
#[derive(Default)]
pub struct ParsedModule<'wasm> {
    pub types: PrimaryMap<TypeIndex, FuncType>,

    pub functions: PrimaryMap<FuncIndex, TypeIndex>,
    pub tables: PrimaryMap<TableIndex, TablePlan>,
    pub memories: PrimaryMap<MemoryIndex, MemoryPlan>,
    pub globals: PrimaryMap<GlobalIndex, GlobalType>,
    pub global_initializers: PrimaryMap<DefinedGlobalIndex, ConstExpr>,

    pub imports: Vec<Import<'wasm>>,
    pub exports: Vec<Export<'wasm>>,
    pub element_segments: Vec<ElementSegment>,
    pub data_segments: Vec<DataSegment<'wasm>>,
    pub start: Option<FuncIndex>,

    pub names: Names<'wasm>,
    pub function_bodies: PrimaryMap<DefinedFuncIndex, FunctionBodyData<'wasm>>,

    pub num_imported_functions: u32,
    pub num_imported_tables: u32,
    pub num_imported_memories: u32,
    pub num_imported_globals: u32,
}

impl ParsedModule<'_> {
    #[inline]
    pub fn func_index(&self, index: DefinedFuncIndex) -> FuncIndex {
        FuncIndex::from_u32(self.num_imported_functions + index.as_u32())
    }

    #[inline]
    pub fn is_imported_func(&self, index: FuncIndex) -> bool {
        index.as_u32() < self.num_imported_functions
    }

    #[inline]
    pub fn defined_global_index(&self, index: GlobalIndex) -> Option<DefinedGlobalIndex> {
        if self.is_imported_global(index) {
            None
        } else {
            Some(DefinedGlobalIndex::from_u32(
                index.as_u32() - self.num_imported_globals,
            ))
        }
    }

    #[inline]
    pub fn is_imported_global(&self, index: GlobalIndex) -> bool {
        index.as_u32() < self.num_imported_globals
    }

    #[inline]
    pub fn is_imported_memory(&self, index: MemoryIndex) -> bool {
        index.as_u32() < self.num_imported_memories
    }

    #[inline]
    pub fn is_imported_table(&self, index: TableIndex) -> bool {
        index.as_u32() < self.num_imported_tables
    }

    /// The signature of any function, imported or defined.
    pub fn func_type(&self, index: FuncIndex) -> &FuncType {
        &self.types[self.functions[index]]
    }
}

/// The type of an imported entity, pointing into the respective index
/// space entry created for it.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    /// A function with the given signature.
    Function(TypeIndex),
    Table(TableIndex),
    Memory(MemoryIndex),
    Global(GlobalIndex),
}

#[derive(Debug)]
pub struct Import<'wasm> {
    pub module: &'wasm str,
    pub field: &'wasm str,
    pub ty: EntityType,
}

#[derive(Debug)]
pub struct Export<'wasm> {
    pub name: &'wasm str,
    pub index: EntityIndex,
}

/// A pre-processed version of `wasmparser::MemoryType`.
#[derive(Debug, Clone)]
pub struct MemoryPlan {
    /// The minimum number of pages in the memory.
    pub minimum: u64,
    /// The maximum number of pages in the memory.
    pub maximum: Option<u64>,
    pub shared: bool,
    pub memory64: bool,
}

impl MemoryPlan {
    pub fn for_memory(ty: MemoryType) -> Self {
        Self {
            minimum: ty.initial,
            maximum: ty.maximum,
            shared: ty.shared,
            memory64: ty.memory64,
        }
    }

    /// The modelled size in bytes: the maximum page count when present,
    /// the initial one otherwise.
    pub fn byte_size(&self) -> crate::Result<u64> {
        let pages = self.maximum.unwrap_or(self.minimum);
        pages.checked_mul(WASM_PAGE_SIZE).ok_or(Error::SizeOverflow)
    }
}

#[derive(Debug, Clone)]
pub struct TablePlan {
    pub element: RefType,
    pub minimum: u64,
    pub maximum: Option<u64>,
}

impl TablePlan {
    pub fn for_table(ty: TableType) -> Self {
        Self {
            element: ty.element_type,
            minimum: ty.initial,
            maximum: ty.maximum,
        }
    }
}

#[derive(Debug)]
pub struct ElementSegment {
    pub kind: ElementSegmentKind,
    pub items: ElementItems,
}

#[derive(Debug)]
pub enum ElementSegmentKind {
    Active {
        /// `None` when the segment used the implicit-table-0 encoding.
        table_index: Option<u32>,
        offset: ConstExpr,
    },
    Passive,
    Declared,
}

#[derive(Debug)]
pub enum ElementItems {
    Functions(Box<[FuncIndex]>),
    /// Expression-encoded elements; only the count is kept, the lowering
    /// rejects these.
    Expressions(usize),
}

#[derive(Debug)]
pub struct DataSegment<'wasm> {
    pub kind: DataSegmentKind,
    pub data: &'wasm [u8],
}

#[derive(Debug)]
pub enum DataSegmentKind {
    Active {
        memory_index: MemoryIndex,
        offset: ConstExpr,
    },
    Passive,
}

pub struct FunctionBodyData<'wasm> {
    pub body: FunctionBody<'wasm>,
    pub validator: FuncToValidate<ValidatorResources>,
}

/// Symbol names harvested from the custom `name` section.
#[derive(Debug, Default)]
pub struct Names<'wasm> {
    pub module_name: Option<&'wasm str>,
    pub func_names: HashMap<FuncIndex, &'wasm str>,
    pub locals_names: HashMap<FuncIndex, HashMap<LocalIndex, &'wasm str>>,
    pub global_names: HashMap<GlobalIndex, &'wasm str>,
    pub table_names: HashMap<TableIndex, &'wasm str>,
    pub memory_names: HashMap<MemoryIndex, &'wasm str>,
    pub data_names: HashMap<DataIndex, &'wasm str>,
}

impl<'wasm> Names<'wasm> {
    pub fn module_name(&self) -> Option<&'wasm str> {
        self.module_name
    }
    pub fn func_name(&self, index: FuncIndex) -> Option<&'wasm str> {
        self.func_names.get(&index).copied()
    }
    pub fn local_name(&self, func: FuncIndex, local: LocalIndex) -> Option<&'wasm str> {
        self.locals_names.get(&func)?.get(&local).copied()
    }
    pub fn global_name(&self, index: GlobalIndex) -> Option<&'wasm str> {
        self.global_names.get(&index).copied()
    }
    pub fn table_name(&self, index: TableIndex) -> Option<&'wasm str> {
        self.table_names.get(&index).copied()
    }
    pub fn memory_name(&self, index: MemoryIndex) -> Option<&'wasm str> {
        self.memory_names.get(&index).copied()
    }
    pub fn data_name(&self, index: DataIndex) -> Option<&'wasm str> {
        self.data_names.get(&index).copied()
    }
}
