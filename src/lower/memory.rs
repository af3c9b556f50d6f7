//! The memory/data layer: linear-memory array globals and their byte-level
//! initializers.

use crate::errors::Error;
use crate::indices::DataIndex;
use crate::ir::{Constant, Linkage};
use crate::lower::names::{self, DEFAULT_MEM_NAME};
use crate::lower::LoweringContext;
use crate::parse::{DataSegment, DataSegmentKind, MemoryPlan, ParsedModule};
use crate::wasm_unsupported;

/// Declares one memory as a zero-initialized `[size x i8]` array global.
/// The modelled size is the maximum page count when present, the initial
/// one otherwise.
pub(crate) fn declare_memory(
    ctx: &mut LoweringContext<'_>,
    plan: &MemoryPlan,
    name: Option<&str>,
    imported: bool,
) -> crate::Result<()> {
    if plan.memory64 {
        return Err(wasm_unsupported!("memory64"));
    }
    if plan.shared {
        return Err(wasm_unsupported!("shared memory"));
    }

    if let Some(max) = plan.maximum {
        if max != plan.minimum && ctx.opts.notice_enabled() {
            tracing::info!("memory min {} max {}", plan.minimum, max);
        }
    }

    let size = plan.byte_size()?;
    let int8 = ctx.module.types.int8();
    let ty = ctx.module.types.array_of(int8, size);
    let ptr_ty = ctx.module.types.pointer_to(ty);

    let name = match name {
        Some(name) => names::declared_name(name, &ctx.opts).to_string(),
        None => DEFAULT_MEM_NAME.to_string(),
    };
    let linkage = if imported {
        Linkage::External
    } else {
        Linkage::Internal
    };

    let id = ctx.module.declare_global(name, ty, linkage, false);
    if !imported {
        ctx.module
            .global_mut(id)
            .set_initializer(Constant::AggregateZero { ty });
    }
    ctx.mems.push(id);
    ctx.mem_ptr_types.push(ptr_ty);
    Ok(())
}

/// Applies one data segment to its target memory.
pub(crate) fn apply_data_segment(
    ctx: &mut LoweringContext<'_>,
    parsed: &ParsedModule<'_>,
    segment_index: usize,
    segment: &DataSegment<'_>,
) -> crate::Result<()> {
    let (memory_index, offset) = match &segment.kind {
        DataSegmentKind::Active {
            memory_index,
            offset,
        } => (*memory_index, offset),
        DataSegmentKind::Passive => {
            return Err(wasm_unsupported!("passive data segment"));
        }
    };

    if memory_index.as_u32() >= ctx.mems.len() as u32 {
        return Err(Error::IndexOutOfRange {
            kind: "memory",
            index: memory_index.as_u32(),
        });
    }
    let offset = ctx
        .const_eval
        .eval_offset(&ctx.module.types, offset)?;

    let mem_id = ctx.mems[memory_index];
    let mem_ty = ctx.module.global(mem_id).value_type();
    let (_, size) = ctx
        .module
        .types
        .array_info(mem_ty)
        .expect("memory global has array type");

    let len = segment.data.len() as u64;
    match offset.checked_add(len) {
        Some(end) if end <= size => {}
        _ => return Err(Error::DataSegmentOutOfBounds { offset, len, size }),
    }

    if ctx.opts.split_mem {
        let seg_name = parsed
            .names
            .data_name(DataIndex::from_u32(segment_index as u32))
            .unwrap_or("");
        let mut constant = false;
        if names::remove_dollar(seg_name) == ".rodata" {
            if ctx.opts.warnings_enabled() {
                tracing::warn!(
                    "setting data segment {seg_name:?} constant because of its name"
                );
            }
            constant = true;
        }

        let int8 = ctx.module.types.int8();
        let ty = ctx.module.types.array_of(int8, len);
        let mem_name = ctx.module.global(mem_id).name();
        let name = format!("{mem_name}_0x{offset:x}");

        let id = ctx
            .module
            .declare_global(name, ty, Linkage::Internal, constant);
        let global = ctx.module.global_mut(id);
        global.set_initializer(Constant::Bytes {
            ty,
            bytes: segment.data.to_vec(),
        });
        // A special section so later tooling can reassemble the memory.
        global.set_section(format!(".addr_0x{offset:x}"));
        global.set_align(1);
    } else if ctx.opts.no_mem_initializer {
        return Ok(());
    } else {
        let offset = offset as usize;
        match ctx.module.global_mut(mem_id).initializer_mut() {
            // Already flattened: patch the backing buffer in place.
            Some(Constant::Bytes { bytes, .. }) => {
                bytes[offset..offset + segment.data.len()].copy_from_slice(segment.data);
            }
            _ => {
                let mut bytes = vec![0u8; size as usize];
                bytes[offset..offset + segment.data.len()].copy_from_slice(segment.data);
                ctx.module
                    .global_mut(mem_id)
                    .set_initializer(Constant::Bytes { ty: mem_ty, bytes });
            }
        }
    }

    Ok(())
}
