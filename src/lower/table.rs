//! The table/element layer: function-pointer array globals filled in from
//! element segments.

use crate::errors::Error;
use crate::indices::TableIndex;
use crate::ir::{Constant, Linkage};
use crate::lower::names::{self, DEFAULT_TABLE_PREFIX};
use crate::lower::LoweringContext;
use crate::parse::{ElementItems, ElementSegment, ElementSegmentKind, TablePlan};

/// Declares one table as a `[len x void ()*]` array global. Only funcref
/// tables are supported; the element entries arrive in a later phase.
pub(crate) fn declare_table(
    ctx: &mut LoweringContext<'_>,
    plan: &TablePlan,
    table_index: TableIndex,
    name: Option<&str>,
) -> crate::Result<()> {
    if !plan.element.is_func_ref() {
        return Err(Error::UnsupportedTableType(format!("{}", plan.element)));
    }

    if let Some(max) = plan.maximum {
        if max != plan.minimum && ctx.opts.warnings_enabled() {
            tracing::warn!("table element limits have a maximum");
        }
    }

    let func_ptr = ctx.common.func_ptr;
    let ty = ctx.module.types.array_of(func_ptr, plan.minimum);
    let ptr_ty = ctx.module.types.pointer_to(ty);
    let name = match name {
        Some(name) => names::declared_name(name, &ctx.opts).to_string(),
        None => format!("{DEFAULT_TABLE_PREFIX}{}", table_index.as_u32()),
    };

    let id = ctx.module.declare_global(name, ty, Linkage::External, false);
    ctx.tables.push(id);
    ctx.table_ptr_types.push(ptr_ty);
    Ok(())
}

/// Fills one element segment into its table: a dense constant array with
/// function pointers in `[offset, offset + len)` and null everywhere else.
pub(crate) fn apply_element_segment(
    ctx: &mut LoweringContext<'_>,
    segment: &ElementSegment,
) -> crate::Result<()> {
    let (table_index, offset) = match &segment.kind {
        ElementSegmentKind::Active {
            table_index,
            offset,
        } => (TableIndex::from_u32(table_index.unwrap_or(0)), offset),
        ElementSegmentKind::Passive => {
            return Err(Error::UnsupportedElemFlags("passive element segment".into()));
        }
        ElementSegmentKind::Declared => {
            return Err(Error::UnsupportedElemFlags(
                "declared element segment".into(),
            ));
        }
    };

    let funcs = match &segment.items {
        ElementItems::Functions(funcs) => funcs,
        ElementItems::Expressions(_) => {
            return Err(Error::UnsupportedElemFlags("element expressions".into()));
        }
    };

    let table_id = *ctx.tables.get(table_index).ok_or(Error::IndexOutOfRange {
        kind: "table",
        index: table_index.as_u32(),
    })?;

    let offset = ctx.const_eval.eval_offset(&ctx.module.types, offset)?;
    if offset != 0 && ctx.opts.warnings_enabled() {
        tracing::warn!("element segment offset is not zero");
    }

    let table_ty = ctx.module.global(table_id).value_type();
    let (elem_ty, table_len) = ctx
        .module
        .types
        .array_info(table_ty)
        .expect("table global has array type");

    let mut elems = Vec::with_capacity(table_len as usize);
    for i in 0..table_len {
        let entry = i
            .checked_sub(offset)
            .and_then(|n| funcs.get(n as usize))
            .copied();
        match entry {
            Some(func_index) => {
                let func_id = *ctx.funcs.get(func_index).ok_or(Error::IndexOutOfRange {
                    kind: "function",
                    index: func_index.as_u32(),
                })?;
                elems.push(Constant::Function {
                    ty: elem_ty,
                    func: func_id,
                });
            }
            None => elems.push(Constant::Null { ty: elem_ty }),
        }
    }

    // Replaces any previous initializer outright.
    ctx.module.global_mut(table_id).set_initializer(Constant::Array {
        ty: table_ty,
        elems,
    });
    Ok(())
}
