use crate::indices::FuncIndex;
use crate::ir::{Body, FunctionBuilder, Type, Value};
use crate::lower::code::translate_operator;
use crate::lower::names::{LOCAL_PREFIX, PARAM_PREFIX};
use crate::lower::state::FuncLoweringState;
use crate::lower::types::{value_type, zero_value};
use crate::lower::FuncEnv;
use wasmparser::{BinaryReader, FuncValidator, FunctionBody, WasmModuleResources};

/// One stack slot backing a Wasm local (parameters first).
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalSlot {
    /// Pointer produced by the slot's alloca.
    pub ptr: Value,
    /// The value type stored in the slot.
    pub ty: Type,
}

/// Translates function bodies into IR CFGs.
///
/// The translation walks the operator stream once, mirroring the Wasm
/// operand stack as SSA values and the structured nesting as an explicit
/// control stack; branch operands merge through phi nodes at the target
/// blocks.
pub(crate) struct FuncTranslator {
    state: FuncLoweringState,
}

impl FuncTranslator {
    pub fn new() -> Self {
        Self {
            state: FuncLoweringState::new(),
        }
    }

    pub fn translate_body(
        &mut self,
        env: &FuncEnv<'_>,
        func_index: FuncIndex,
        body: &FunctionBody<'_>,
        validator: &mut FuncValidator<impl WasmModuleResources>,
    ) -> crate::Result<Body> {
        let mut reader = body.get_binary_reader();
        let func_id = env.func_id(func_index)?;
        let signature = env.module.function(func_id).signature().clone();
        tracing::trace!(
            "translating body ({} bytes, {:?})",
            reader.bytes_remaining(),
            env.module.function(func_id).name(),
        );

        let mut body_ir = Body::new();
        let mut builder = FunctionBuilder::new(&mut body_ir);

        // The entry block holds one stack slot per parameter and local;
        // straight-line body code continues in it.
        let entry_block = builder.create_block("allocator");
        builder.switch_to_block(entry_block);

        let mut locals = Vec::with_capacity(signature.params.len());
        for (i, &param_ty) in signature.params.iter().enumerate() {
            let ptr_ty = env.pointer_to(param_ty)?;
            let slot = builder.alloca(ptr_ty, param_ty, format!("{PARAM_PREFIX}{i}"));
            let arg = builder.func_param(i as u32, param_ty);
            builder.store(arg, slot);
            locals.push(LocalSlot { ptr: slot, ty: param_ty });
        }

        // The sole ret site; `return` and the implicit function end branch
        // here, merging the result through a phi.
        let return_block = builder.create_block("return");
        let ret_phi = if env.module.types.is_void(signature.ret) {
            None
        } else {
            Some(builder.create_phi(return_block, signature.ret))
        };
        self.state
            .initialize(return_block, ret_phi, usize::from(ret_phi.is_some()));

        parse_local_decls(&mut reader, &mut builder, env, &mut locals, validator)?;
        parse_function_body(validator, reader, &mut builder, &mut self.state, env, &locals)?;

        // All paths have been funneled into the return block.
        builder.switch_to_block(return_block);
        builder.ret(ret_phi);
        self.state.stack.clear();

        tracing::trace!("translated body into {} blocks", body_ir.num_blocks());
        Ok(body_ir)
    }
}

/// Parses the local-variable declarations preceding the body and gives
/// each local a zero-initialized stack slot.
fn parse_local_decls(
    reader: &mut BinaryReader<'_>,
    builder: &mut FunctionBuilder<'_>,
    env: &FuncEnv<'_>,
    locals: &mut Vec<LocalSlot>,
    validator: &mut FuncValidator<impl WasmModuleResources>,
) -> crate::Result<()> {
    let local_count = reader.read_var_u32()?;

    for _ in 0..local_count {
        let pos = reader.original_position();
        let count = reader.read_var_u32()?;
        let ty = reader.read()?;
        validator.define_locals(pos, count, ty)?;

        let value_ty = value_type(&env.module.types, ty)?;
        let ptr_ty = env.pointer_to(value_ty)?;
        let zero = zero_value(&env.module.types, value_ty)?;
        for _ in 0..count {
            let index = locals.len();
            let slot = builder.alloca(ptr_ty, value_ty, format!("{LOCAL_PREFIX}{index}"));
            let init = builder.constant(zero.clone());
            builder.store(init, slot);
            locals.push(LocalSlot {
                ptr: slot,
                ty: value_ty,
            });
        }
    }

    Ok(())
}

/// Walks the operator stream, translating each operator as it is
/// validated.
fn parse_function_body(
    validator: &mut FuncValidator<impl WasmModuleResources>,
    mut reader: BinaryReader<'_>,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
    env: &FuncEnv<'_>,
    locals: &[LocalSlot],
) -> crate::Result<()> {
    debug_assert_eq!(state.control_stack.len(), 1, "state not initialized");

    while !reader.eof() {
        let pos = reader.original_position();
        let op = reader.read_operator()?;
        validator.op(pos, &op)?;
        translate_operator(&op, builder, state, env, locals)?;
    }
    validator.finish(reader.original_position())?;

    debug_assert!(state.control_stack.is_empty(), "unbalanced control stack");
    Ok(())
}
