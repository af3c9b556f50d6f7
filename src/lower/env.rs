use crate::errors::Error;
use crate::indices::{FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex};
use crate::ir;
use crate::lower::types::value_type;
use crate::lower::{CommonTypes, LoweringContext, SigTypes};
use crate::options::Options;
use crate::parse::ParsedModule;
use crate::wasm_unsupported;
use cranelift_entity::PrimaryMap;

/// Read-only environment for translating one function body.
///
/// Snapshots the module skeleton built by the declaration phases so the
/// body translator can resolve functions, globals, memories and tables
/// without touching the destination module.
pub(crate) struct FuncEnv<'a> {
    pub module: &'a ir::Module,
    pub parsed: &'a ParsedModule<'a>,
    pub funcs: &'a PrimaryMap<FuncIndex, ir::FuncId>,
    pub globs: &'a PrimaryMap<GlobalIndex, ir::GlobalId>,
    pub mems: &'a PrimaryMap<MemoryIndex, ir::GlobalId>,
    pub tables: &'a PrimaryMap<TableIndex, ir::GlobalId>,
    pub common: &'a CommonTypes,
    pub sig_types: &'a PrimaryMap<TypeIndex, Option<SigTypes>>,
    pub mem_ptr_types: &'a PrimaryMap<MemoryIndex, ir::Type>,
    pub table_ptr_types: &'a PrimaryMap<TableIndex, ir::Type>,
    pub opts: &'a Options,
}

impl<'a> FuncEnv<'a> {
    pub fn new(ctx: &'a LoweringContext<'_>, parsed: &'a ParsedModule<'a>) -> Self {
        Self {
            module: &*ctx.module,
            parsed,
            funcs: &ctx.funcs,
            globs: &ctx.globs,
            mems: &ctx.mems,
            tables: &ctx.tables,
            common: &ctx.common,
            sig_types: &ctx.sig_types,
            mem_ptr_types: &ctx.mem_ptr_types,
            table_ptr_types: &ctx.table_ptr_types,
            opts: &ctx.opts,
        }
    }

    /// The cached pointer type to a scalar value type.
    pub fn pointer_to(&self, ty: ir::Type) -> crate::Result<ir::Type> {
        self.common.pointer_to(ty).ok_or_else(|| {
            Error::UnsupportedType(format!("{}", self.module.types.display(ty)))
        })
    }

    pub fn func_id(&self, index: FuncIndex) -> crate::Result<ir::FuncId> {
        self.funcs
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                kind: "function",
                index: index.as_u32(),
            })
    }

    pub fn global_id(&self, index: GlobalIndex) -> crate::Result<ir::GlobalId> {
        self.globs
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                kind: "global",
                index: index.as_u32(),
            })
    }

    /// Resolves a memory to its IR global and pointer-to-array type.
    pub fn memory(&self, index: MemoryIndex) -> crate::Result<(ir::GlobalId, ir::Type)> {
        let id = self
            .mems
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                kind: "memory",
                index: index.as_u32(),
            })?;
        Ok((id, self.mem_ptr_types[index]))
    }

    /// Resolves a table to its IR global and pointer-to-array type.
    pub fn table(&self, index: TableIndex) -> crate::Result<(ir::GlobalId, ir::Type)> {
        let id = self
            .tables
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                kind: "table",
                index: index.as_u32(),
            })?;
        Ok((id, self.table_ptr_types[index]))
    }

    pub fn indirect_sig(&self, index: TypeIndex) -> crate::Result<SigTypes> {
        self.sig_types
            .get(index)
            .copied()
            .flatten()
            .ok_or(Error::MultiValueUnsupported(2))
    }

    /// Resolves a block type to its (zero or one) result type. Block
    /// parameters and multiple results are outside the supported subset.
    pub fn block_type_result(
        &self,
        block_ty: wasmparser::BlockType,
    ) -> crate::Result<Option<ir::Type>> {
        match block_ty {
            wasmparser::BlockType::Empty => Ok(None),
            wasmparser::BlockType::Type(ty) => {
                Ok(Some(value_type(&self.module.types, ty)?))
            }
            wasmparser::BlockType::FuncType(index) => {
                let func_type = &self.parsed.types[TypeIndex::from_u32(index)];
                if !func_type.params().is_empty() {
                    return Err(wasm_unsupported!("block parameters"));
                }
                match func_type.results().len() {
                    0 => Ok(None),
                    1 => Ok(Some(value_type(&self.module.types, func_type.results()[0])?)),
                    n => Err(Error::MultiValueUnsupported(n)),
                }
            }
        }
    }
}
