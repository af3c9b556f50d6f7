//! Translation of individual Wasm operators into IR instructions.
//!
//! The translation is done in one pass, opcode by opcode, over the operand
//! stack and the control stack held in [`FuncLoweringState`]. Each operator
//! pops its arguments off the mirrored stack and pushes its results; control
//! operators create blocks and frames, and branches bind their operands into
//! the phi nodes of the target frame.

use crate::errors::Error;
use crate::indices::{FuncIndex, GlobalIndex, MemoryIndex, TableIndex, TypeIndex};
use crate::ir::{
    BinaryOp, Block, CastOp, Constant, FloatCC, FunctionBuilder, Inst, IntCC, Type, TypeData,
    UnaryOp, Value,
};
use crate::lower::func::LocalSlot;
use crate::lower::state::{FrameKind, FuncLoweringState};
use crate::lower::FuncEnv;
use crate::wasm_unsupported;
use cranelift_entity::packed_option::ReservedValue;
use hashbrown::HashMap;
use wasmparser::{MemArg, Operator};

pub(crate) fn translate_operator(
    op: &Operator<'_>,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
    env: &FuncEnv<'_>,
    locals: &[LocalSlot],
) -> crate::Result<()> {
    if !state.reachable {
        translate_unreachable_operator(op, builder, state);
        return Ok(());
    }

    match op {
        /****************************** Locals ******************************
         * Locals live in stack slots allocated in the entry block; reads
         * and writes go through them.
         ********************************************************************/
        Operator::LocalGet { local_index } => {
            let slot = local(locals, *local_index)?;
            state.push1(builder.load(slot.ty, slot.ptr));
        }
        Operator::LocalSet { local_index } => {
            let slot = local(locals, *local_index)?;
            let value = state.pop1();
            builder.store(value, slot.ptr);
        }
        Operator::LocalTee { local_index } => {
            let slot = local(locals, *local_index)?;
            let value = state.peek1();
            builder.store(value, slot.ptr);
        }
        /****************************** Globals *****************************/
        Operator::GlobalGet { global_index } => {
            let id = env.global_id(GlobalIndex::from_u32(*global_index))?;
            let ty = env.module.global(id).value_type();
            let ptr_ty = env.pointer_to(ty)?;
            let addr = builder.constant(Constant::Global { ty: ptr_ty, global: id });
            state.push1(builder.load(ty, addr));
        }
        Operator::GlobalSet { global_index } => {
            let id = env.global_id(GlobalIndex::from_u32(*global_index))?;
            let ty = env.module.global(id).value_type();
            let ptr_ty = env.pointer_to(ty)?;
            let addr = builder.constant(Constant::Global { ty: ptr_ty, global: id });
            let value = state.pop1();
            builder.store(value, addr);
        }
        /*************************** Stack misc *****************************/
        Operator::Drop => {
            state.pop1();
        }
        Operator::Select | Operator::TypedSelect { .. } => {
            let (arg1, arg2, cond) = state.pop3();
            let cond = int_to_bool(builder, env, cond);
            state.push1(builder.select(cond, arg1, arg2));
        }
        Operator::Nop => {}
        Operator::Unreachable => {
            builder.unreachable();
            state.reachable = false;
        }
        /************************ Control flow blocks ***********************
         * A new continuation block (with a result phi when the construct
         * has a result) is created for every structured construct; the
         * frame records it as the branch target. Loops additionally get a
         * header block that backward branches target.
         ********************************************************************/
        Operator::Block { blockty } => {
            let result = env.block_type_result(*blockty)?;
            let next = builder.create_block("block.end");
            let phi = result.map(|ty| builder.create_phi(next, ty));
            state.push_block(next, phi, usize::from(result.is_some()));
        }
        Operator::Loop { blockty } => {
            let result = env.block_type_result(*blockty)?;
            let header = builder.create_block("loop");
            let next = builder.create_block("loop.end");
            let phi = result.map(|ty| builder.create_phi(next, ty));
            builder.br(header);
            state.push_loop(header, next, phi, usize::from(result.is_some()));
            builder.switch_to_block(header);
        }
        Operator::If { blockty } => {
            let result = env.block_type_result(*blockty)?;
            let cond = state.pop1();
            let cond = int_to_bool(builder, env, cond);
            let then_block = builder.create_block("if.then");
            let next = builder.create_block("if.end");
            let phi = result.map(|ty| builder.create_phi(next, ty));
            // The false edge targets the continuation for now; translating
            // an `else` repoints it.
            let head_branch = builder.cond_br(cond, then_block, next);
            builder.switch_to_block(then_block);
            state.push_if(head_branch, next, phi, usize::from(result.is_some()), true);
        }
        Operator::Else => {
            let (head_branch, following, phi, num_results, original_stack_size) = {
                let frame = state
                    .control_stack
                    .last_mut()
                    .expect("control stack underflow");
                let FrameKind::If { head_branch, .. } = frame.kind else {
                    panic!("else outside of an if");
                };
                frame.kind = FrameKind::Else;
                (
                    head_branch,
                    frame.following,
                    frame.phi,
                    frame.num_results,
                    frame.original_stack_size,
                )
            };
            // Seal the consequent: its result flows into the merge phi.
            let current = builder.current_block();
            if num_results == 1 {
                if let Some(phi) = phi {
                    builder.add_phi_incoming(phi, state.peek1(), current);
                }
            }
            builder.br(following);
            state.stack.truncate(original_stack_size);
            let else_block = builder.create_block("if.else");
            builder.set_cond_br_else(head_branch, else_block);
            builder.switch_to_block(else_block);
        }
        Operator::End => {
            let frame = state
                .control_stack
                .pop()
                .expect("control stack underflow");
            let current = builder.current_block();
            if frame.num_results == 1 {
                if let Some(phi) = frame.phi {
                    builder.add_phi_incoming(phi, state.peek1(), current);
                }
            }
            builder.br(frame.following);
            state.stack.truncate(frame.original_stack_size);
            builder.switch_to_block(frame.following);
            if let Some(phi) = frame.phi {
                state.push1(phi);
            }
        }
        /*************************** Branches *******************************
         * Branch operators resolve their target frame by nesting depth,
         * bind the carried operands into the target's phi and mark the
         * code that follows as unreachable (except `br_if`, which falls
         * through into a fresh block).
         ********************************************************************/
        Operator::Br { relative_depth } => {
            let (dest, phi, arity) = {
                let frame = state.frame_at(*relative_depth);
                frame.set_branched_to_exit();
                (frame.br_destination(), frame.phi, frame.br_arity())
            };
            let current = builder.current_block();
            if arity == 1 {
                if let Some(phi) = phi {
                    builder.add_phi_incoming(phi, state.peek1(), current);
                }
            }
            builder.br(dest);
            state.popn(arity);
            state.reachable = false;
        }
        Operator::BrIf { relative_depth } => {
            let cond = state.pop1();
            let cond = int_to_bool(builder, env, cond);
            let (dest, phi, arity) = {
                let frame = state.frame_at(*relative_depth);
                frame.set_branched_to_exit();
                (frame.br_destination(), frame.phi, frame.br_arity())
            };
            let current = builder.current_block();
            if arity == 1 {
                if let Some(phi) = phi {
                    // The branch operands stay on the stack for the
                    // fallthrough path.
                    builder.add_phi_incoming(phi, state.peek1(), current);
                }
            }
            let next = builder.create_block("br_if.next");
            builder.cond_br(cond, dest, next);
            builder.switch_to_block(next);
        }
        Operator::BrTable { targets } => {
            let index = state.pop1();
            let default_depth = targets.default();
            let arity = state.frame_at(default_depth).br_arity();
            let current = builder.current_block();
            let carried = if arity == 1 { Some(state.peek1()) } else { None };

            let mut bound: HashMap<u32, Block> = HashMap::new();
            let mut resolve = |depth: u32,
                               state: &mut FuncLoweringState,
                               builder: &mut FunctionBuilder<'_>| {
                if let Some(block) = bound.get(&depth) {
                    return *block;
                }
                let (dest, phi) = {
                    let frame = state.frame_at(depth);
                    frame.set_branched_to_exit();
                    (frame.br_destination(), frame.phi)
                };
                if let (Some(value), Some(phi)) = (carried, phi) {
                    builder.add_phi_incoming(phi, value, current);
                }
                bound.insert(depth, dest);
                dest
            };

            let mut blocks = Vec::new();
            for depth in targets.targets() {
                let depth = depth?;
                blocks.push(resolve(depth, state, builder));
            }
            let default_block = resolve(default_depth, state, builder);

            builder.switch(index, default_block, blocks);
            state.popn(arity);
            state.reachable = false;
        }
        Operator::Return => {
            let (dest, phi, arity) = {
                let frame = &mut state.control_stack[0];
                frame.set_branched_to_exit();
                (frame.br_destination(), frame.phi, frame.num_results)
            };
            let current = builder.current_block();
            if arity == 1 {
                if let Some(phi) = phi {
                    builder.add_phi_incoming(phi, state.peek1(), current);
                }
            }
            builder.br(dest);
            state.popn(arity);
            state.reachable = false;
        }
        /***************************** Calls ********************************/
        Operator::Call { function_index } => {
            let func_id = env.func_id(FuncIndex::from_u32(*function_index))?;
            let callee = env.module.function(func_id);
            let num_args = callee.signature().params.len();
            let ret = callee.signature().ret;
            let result_ty = (!env.module.types.is_void(ret)).then_some(ret);
            let args = state.peekn(num_args).to_vec();
            let result = builder.call(func_id, result_ty, args);
            state.popn(num_args);
            if let Some(result) = result {
                state.push1(result);
            }
        }
        Operator::CallIndirect {
            type_index,
            table_index,
        } => {
            let type_index = TypeIndex::from_u32(*type_index);
            let sig = env.indirect_sig(type_index)?;
            let (table_id, table_ptr_ty) = env.table(TableIndex::from_u32(*table_index))?;
            let callee_index = state.pop1();

            // Load the function pointer out of the table, then cast it to
            // the expected signature.
            let base = builder.constant(Constant::Global {
                ty: table_ptr_ty,
                global: table_id,
            });
            let zero = builder.iconst(env.common.int32, 0);
            let slot = builder.getelementptr(
                env.common.ptr_func_ptr,
                base,
                vec![zero, callee_index],
            );
            let func_ptr = builder.load(env.common.func_ptr, slot);
            let callee = builder.cast(CastOp::Bitcast, func_ptr, sig.func_ptr);

            let func_type = &env.parsed.types[type_index];
            let num_args = func_type.params().len();
            let ret = sig_return(env, sig.func);
            let result_ty = (!env.module.types.is_void(ret)).then_some(ret);
            let args = state.peekn(num_args).to_vec();
            let result = builder.call_indirect(sig.func, callee, result_ty, args);
            state.popn(num_args);
            if let Some(result) = result {
                state.push1(result);
            }
        }
        /************************** Memory access ***************************
         * Accesses resolve to an element pointer into the linear-memory
         * global at the immediate offset plus the dynamic address, or to a
         * plain int-to-ptr cast in `gen_int_to_ptr` mode.
         ********************************************************************/
        Operator::I32Load { memarg } => {
            translate_load(memarg, env.common.int32, env.common.int32, None, builder, state, env)?;
        }
        Operator::I64Load { memarg } => {
            translate_load(memarg, env.common.int64, env.common.int64, None, builder, state, env)?;
        }
        Operator::F32Load { memarg } => {
            translate_load(memarg, env.common.float, env.common.float, None, builder, state, env)?;
        }
        Operator::F64Load { memarg } => {
            translate_load(memarg, env.common.double, env.common.double, None, builder, state, env)?;
        }
        Operator::I32Load8S { memarg } => {
            translate_load(memarg, env.common.int8, env.common.int32, Some(CastOp::SExt), builder, state, env)?;
        }
        Operator::I32Load8U { memarg } => {
            translate_load(memarg, env.common.int8, env.common.int32, Some(CastOp::ZExt), builder, state, env)?;
        }
        Operator::I32Load16S { memarg } => {
            translate_load(memarg, env.common.int16, env.common.int32, Some(CastOp::SExt), builder, state, env)?;
        }
        Operator::I32Load16U { memarg } => {
            translate_load(memarg, env.common.int16, env.common.int32, Some(CastOp::ZExt), builder, state, env)?;
        }
        Operator::I64Load8S { memarg } => {
            translate_load(memarg, env.common.int8, env.common.int64, Some(CastOp::SExt), builder, state, env)?;
        }
        Operator::I64Load8U { memarg } => {
            translate_load(memarg, env.common.int8, env.common.int64, Some(CastOp::ZExt), builder, state, env)?;
        }
        Operator::I64Load16S { memarg } => {
            translate_load(memarg, env.common.int16, env.common.int64, Some(CastOp::SExt), builder, state, env)?;
        }
        Operator::I64Load16U { memarg } => {
            translate_load(memarg, env.common.int16, env.common.int64, Some(CastOp::ZExt), builder, state, env)?;
        }
        Operator::I64Load32S { memarg } => {
            translate_load(memarg, env.common.int32, env.common.int64, Some(CastOp::SExt), builder, state, env)?;
        }
        Operator::I64Load32U { memarg } => {
            translate_load(memarg, env.common.int32, env.common.int64, Some(CastOp::ZExt), builder, state, env)?;
        }
        Operator::I32Store { memarg } => {
            translate_store(memarg, env.common.int32, builder, state, env)?;
        }
        Operator::I64Store { memarg } => {
            translate_store(memarg, env.common.int64, builder, state, env)?;
        }
        Operator::F32Store { memarg } => {
            translate_store(memarg, env.common.float, builder, state, env)?;
        }
        Operator::F64Store { memarg } => {
            translate_store(memarg, env.common.double, builder, state, env)?;
        }
        Operator::I32Store8 { memarg } | Operator::I64Store8 { memarg } => {
            translate_store(memarg, env.common.int8, builder, state, env)?;
        }
        Operator::I32Store16 { memarg } | Operator::I64Store16 { memarg } => {
            translate_store(memarg, env.common.int16, builder, state, env)?;
        }
        Operator::I64Store32 { memarg } => {
            translate_store(memarg, env.common.int32, builder, state, env)?;
        }
        Operator::MemorySize { .. } | Operator::MemoryGrow { .. } => {
            return Err(wasm_unsupported!("operator {op:?}"));
        }
        /************************ Constant operators ************************/
        Operator::I32Const { value } => {
            state.push1(builder.iconst(env.common.int32, u64::from(*value as u32)));
        }
        Operator::I64Const { value } => {
            state.push1(builder.iconst(env.common.int64, *value as u64));
        }
        Operator::F32Const { value } => {
            state.push1(builder.constant(Constant::Float {
                ty: env.common.float,
                bits: value.bits(),
            }));
        }
        Operator::F64Const { value } => {
            state.push1(builder.constant(Constant::Double {
                ty: env.common.double,
                bits: value.bits(),
            }));
        }
        /************************* Unary operators **************************/
        Operator::I32Clz | Operator::I64Clz => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::Clz, arg));
        }
        Operator::I32Ctz | Operator::I64Ctz => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::Ctz, arg));
        }
        Operator::I32Popcnt | Operator::I64Popcnt => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::Popcnt, arg));
        }
        Operator::F32Sqrt | Operator::F64Sqrt => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::Sqrt, arg));
        }
        Operator::F32Ceil | Operator::F64Ceil => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::Ceil, arg));
        }
        Operator::F32Floor | Operator::F64Floor => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::Floor, arg));
        }
        Operator::F32Trunc | Operator::F64Trunc => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::Trunc, arg));
        }
        Operator::F32Nearest | Operator::F64Nearest => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::Nearest, arg));
        }
        Operator::F32Abs | Operator::F64Abs => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::FAbs, arg));
        }
        Operator::F32Neg | Operator::F64Neg => {
            let arg = state.pop1();
            state.push1(builder.unary(UnaryOp::FNeg, arg));
        }
        /*************************** Conversions ****************************/
        Operator::I32WrapI64 => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::Trunc, arg, env.common.int32));
        }
        Operator::I64ExtendI32S => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::SExt, arg, env.common.int64));
        }
        Operator::I64ExtendI32U => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::ZExt, arg, env.common.int64));
        }
        Operator::I32Extend8S => {
            translate_sign_extension(env.common.int8, env.common.int32, builder, state);
        }
        Operator::I32Extend16S => {
            translate_sign_extension(env.common.int16, env.common.int32, builder, state);
        }
        Operator::I64Extend8S => {
            translate_sign_extension(env.common.int8, env.common.int64, builder, state);
        }
        Operator::I64Extend16S => {
            translate_sign_extension(env.common.int16, env.common.int64, builder, state);
        }
        Operator::I64Extend32S => {
            translate_sign_extension(env.common.int32, env.common.int64, builder, state);
        }
        Operator::I32TruncF32S | Operator::I32TruncF64S => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpToSi, arg, env.common.int32));
        }
        Operator::I32TruncF32U | Operator::I32TruncF64U => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpToUi, arg, env.common.int32));
        }
        Operator::I64TruncF32S | Operator::I64TruncF64S => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpToSi, arg, env.common.int64));
        }
        Operator::I64TruncF32U | Operator::I64TruncF64U => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpToUi, arg, env.common.int64));
        }
        Operator::I32TruncSatF32S | Operator::I32TruncSatF64S => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpToSiSat, arg, env.common.int32));
        }
        Operator::I32TruncSatF32U | Operator::I32TruncSatF64U => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpToUiSat, arg, env.common.int32));
        }
        Operator::I64TruncSatF32S | Operator::I64TruncSatF64S => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpToSiSat, arg, env.common.int64));
        }
        Operator::I64TruncSatF32U | Operator::I64TruncSatF64U => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpToUiSat, arg, env.common.int64));
        }
        Operator::F32ConvertI32S | Operator::F32ConvertI64S => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::SiToFp, arg, env.common.float));
        }
        Operator::F32ConvertI32U | Operator::F32ConvertI64U => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::UiToFp, arg, env.common.float));
        }
        Operator::F64ConvertI32S | Operator::F64ConvertI64S => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::SiToFp, arg, env.common.double));
        }
        Operator::F64ConvertI32U | Operator::F64ConvertI64U => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::UiToFp, arg, env.common.double));
        }
        Operator::F64PromoteF32 => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpExt, arg, env.common.double));
        }
        Operator::F32DemoteF64 => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::FpTrunc, arg, env.common.float));
        }
        Operator::F32ReinterpretI32 => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::Bitcast, arg, env.common.float));
        }
        Operator::F64ReinterpretI64 => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::Bitcast, arg, env.common.double));
        }
        Operator::I32ReinterpretF32 => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::Bitcast, arg, env.common.int32));
        }
        Operator::I64ReinterpretF64 => {
            let arg = state.pop1();
            state.push1(builder.cast(CastOp::Bitcast, arg, env.common.int64));
        }
        /************************* Binary operators *************************/
        Operator::I32Add | Operator::I64Add => translate_binary(BinaryOp::Add, builder, state),
        Operator::I32Sub | Operator::I64Sub => translate_binary(BinaryOp::Sub, builder, state),
        Operator::I32Mul | Operator::I64Mul => translate_binary(BinaryOp::Mul, builder, state),
        Operator::I32DivS | Operator::I64DivS => translate_binary(BinaryOp::SDiv, builder, state),
        Operator::I32DivU | Operator::I64DivU => translate_binary(BinaryOp::UDiv, builder, state),
        Operator::I32RemS | Operator::I64RemS => translate_binary(BinaryOp::SRem, builder, state),
        Operator::I32RemU | Operator::I64RemU => translate_binary(BinaryOp::URem, builder, state),
        Operator::I32And | Operator::I64And => translate_binary(BinaryOp::And, builder, state),
        Operator::I32Or | Operator::I64Or => translate_binary(BinaryOp::Or, builder, state),
        Operator::I32Xor | Operator::I64Xor => translate_binary(BinaryOp::Xor, builder, state),
        Operator::I32Shl | Operator::I64Shl => translate_binary(BinaryOp::Shl, builder, state),
        Operator::I32ShrS | Operator::I64ShrS => translate_binary(BinaryOp::AShr, builder, state),
        Operator::I32ShrU | Operator::I64ShrU => translate_binary(BinaryOp::LShr, builder, state),
        Operator::I32Rotl | Operator::I64Rotl => translate_binary(BinaryOp::Rotl, builder, state),
        Operator::I32Rotr | Operator::I64Rotr => translate_binary(BinaryOp::Rotr, builder, state),
        Operator::F32Add | Operator::F64Add => translate_binary(BinaryOp::FAdd, builder, state),
        Operator::F32Sub | Operator::F64Sub => translate_binary(BinaryOp::FSub, builder, state),
        Operator::F32Mul | Operator::F64Mul => translate_binary(BinaryOp::FMul, builder, state),
        Operator::F32Div | Operator::F64Div => translate_binary(BinaryOp::FDiv, builder, state),
        Operator::F32Min | Operator::F64Min => translate_binary(BinaryOp::FMin, builder, state),
        Operator::F32Max | Operator::F64Max => translate_binary(BinaryOp::FMax, builder, state),
        Operator::F32Copysign | Operator::F64Copysign => {
            translate_binary(BinaryOp::FCopysign, builder, state);
        }
        /************************ Comparison operators **********************/
        Operator::I32Eqz | Operator::I64Eqz => {
            let arg = state.pop1();
            let zero = builder.iconst(builder.value_type(arg), 0);
            let cmp = builder.icmp(IntCC::Equal, arg, zero, env.common.int1);
            state.push1(builder.cast(CastOp::ZExt, cmp, env.common.int32));
        }
        Operator::I32Eq | Operator::I64Eq => translate_icmp(IntCC::Equal, builder, state, env),
        Operator::I32Ne | Operator::I64Ne => translate_icmp(IntCC::NotEqual, builder, state, env),
        Operator::I32LtS | Operator::I64LtS => {
            translate_icmp(IntCC::SignedLessThan, builder, state, env);
        }
        Operator::I32LtU | Operator::I64LtU => {
            translate_icmp(IntCC::UnsignedLessThan, builder, state, env);
        }
        Operator::I32GtS | Operator::I64GtS => {
            translate_icmp(IntCC::SignedGreaterThan, builder, state, env);
        }
        Operator::I32GtU | Operator::I64GtU => {
            translate_icmp(IntCC::UnsignedGreaterThan, builder, state, env);
        }
        Operator::I32LeS | Operator::I64LeS => {
            translate_icmp(IntCC::SignedLessThanOrEqual, builder, state, env);
        }
        Operator::I32LeU | Operator::I64LeU => {
            translate_icmp(IntCC::UnsignedLessThanOrEqual, builder, state, env);
        }
        Operator::I32GeS | Operator::I64GeS => {
            translate_icmp(IntCC::SignedGreaterThanOrEqual, builder, state, env);
        }
        Operator::I32GeU | Operator::I64GeU => {
            translate_icmp(IntCC::UnsignedGreaterThanOrEqual, builder, state, env);
        }
        Operator::F32Eq | Operator::F64Eq => translate_fcmp(FloatCC::Equal, builder, state, env),
        Operator::F32Ne | Operator::F64Ne => translate_fcmp(FloatCC::NotEqual, builder, state, env),
        Operator::F32Lt | Operator::F64Lt => translate_fcmp(FloatCC::LessThan, builder, state, env),
        Operator::F32Gt | Operator::F64Gt => {
            translate_fcmp(FloatCC::GreaterThan, builder, state, env);
        }
        Operator::F32Le | Operator::F64Le => {
            translate_fcmp(FloatCC::LessThanOrEqual, builder, state, env);
        }
        Operator::F32Ge | Operator::F64Ge => {
            translate_fcmp(FloatCC::GreaterThanOrEqual, builder, state, env);
        }
        op => return Err(wasm_unsupported!("operator {op:?}")),
    };
    Ok(())
}

/// Deals with an operator in an unreachable portion of the code. Most are
/// dropped, but `else` and `end` may terminate the unreachable portion, so
/// frame bookkeeping continues.
fn translate_unreachable_operator(
    op: &Operator<'_>,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
) {
    match op {
        Operator::If { .. } => {
            // Placeholder frame: the whole construct is dead, so no blocks
            // or branches exist for it.
            state.push_if(Inst::reserved_value(), Block::reserved_value(), None, 0, false);
        }
        Operator::Block { .. } | Operator::Loop { .. } => {
            state.push_block(Block::reserved_value(), None, 0);
        }
        Operator::Else => {
            let frame = state
                .control_stack
                .last_mut()
                .expect("control stack underflow");
            if let FrameKind::If {
                head_branch,
                reachable_from_top,
            } = frame.kind
            {
                frame.kind = FrameKind::Else;
                if reachable_from_top {
                    // The consequent became unreachable, but the false
                    // edge of the head branch still reaches the alternate.
                    let original_stack_size = frame.original_stack_size;
                    let else_block = builder.create_block("if.else");
                    builder.set_cond_br_else(head_branch, else_block);
                    builder.switch_to_block(else_block);
                    state.stack.truncate(original_stack_size);
                    state.reachable = true;
                }
            }
        }
        Operator::End => {
            let frame = state
                .control_stack
                .pop()
                .expect("control stack underflow");
            state.stack.truncate(frame.original_stack_size);

            let reachable_anyway = match frame.kind {
                // A reachable if without an else branches from its head
                // directly to the continuation.
                FrameKind::If {
                    reachable_from_top, ..
                } => reachable_from_top,
                _ => false,
            };

            if frame.exit_branched_to || reachable_anyway {
                builder.switch_to_block(frame.following);
                if let Some(phi) = frame.phi {
                    state.push1(phi);
                }
                state.reachable = true;
            }
        }
        _ => {
            // Dead code is not translated.
        }
    }
}

fn local(locals: &[LocalSlot], index: u32) -> crate::Result<LocalSlot> {
    locals
        .get(index as usize)
        .copied()
        .ok_or(Error::IndexOutOfRange {
            kind: "local",
            index,
        })
}

/// Converts a Wasm i32 condition to an i1 by comparing against zero.
fn int_to_bool(builder: &mut FunctionBuilder<'_>, env: &FuncEnv<'_>, value: Value) -> Value {
    let zero = builder.iconst(builder.value_type(value), 0);
    builder.icmp(IntCC::NotEqual, value, zero, env.common.int1)
}

fn translate_binary(op: BinaryOp, builder: &mut FunctionBuilder<'_>, state: &mut FuncLoweringState) {
    let (arg1, arg2) = state.pop2();
    state.push1(builder.binary(op, arg1, arg2));
}

fn translate_icmp(
    cond: IntCC,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
    env: &FuncEnv<'_>,
) {
    let (arg1, arg2) = state.pop2();
    let cmp = builder.icmp(cond, arg1, arg2, env.common.int1);
    state.push1(builder.cast(CastOp::ZExt, cmp, env.common.int32));
}

fn translate_fcmp(
    cond: FloatCC,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
    env: &FuncEnv<'_>,
) {
    let (arg1, arg2) = state.pop2();
    let cmp = builder.fcmp(cond, arg1, arg2, env.common.int1);
    state.push1(builder.cast(CastOp::ZExt, cmp, env.common.int32));
}

/// Truncate then sign-extend, for the sign-extension operator family.
fn translate_sign_extension(
    narrow: Type,
    wide: Type,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
) {
    let arg = state.pop1();
    let reduced = builder.cast(CastOp::Trunc, arg, narrow);
    state.push1(builder.cast(CastOp::SExt, reduced, wide));
}

/// Computes the typed pointer for a memory access: the immediate offset
/// plus the dynamic address, either as an element pointer into the memory
/// global or as a raw int-to-ptr cast.
fn prepare_addr(
    memarg: &MemArg,
    access_ty: Type,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
    env: &FuncEnv<'_>,
) -> crate::Result<Value> {
    let addr = state.pop1();
    let effective = if memarg.offset != 0 {
        let offset = builder.iconst(builder.value_type(addr), memarg.offset);
        builder.binary(BinaryOp::Add, addr, offset)
    } else {
        addr
    };

    let ptr_ty = env.pointer_to(access_ty)?;
    if env.opts.gen_int_to_ptr {
        return Ok(builder.cast(CastOp::IntToPtr, effective, ptr_ty));
    }

    let (mem_id, mem_ptr_ty) = env.memory(MemoryIndex::from_u32(memarg.memory))?;
    let base = builder.constant(Constant::Global {
        ty: mem_ptr_ty,
        global: mem_id,
    });
    let zero = builder.iconst(env.common.int32, 0);
    let byte_ptr = builder.getelementptr(env.common.ptr_int8, base, vec![zero, effective]);
    if access_ty == env.common.int8 {
        Ok(byte_ptr)
    } else {
        Ok(builder.cast(CastOp::Bitcast, byte_ptr, ptr_ty))
    }
}

fn translate_load(
    memarg: &MemArg,
    loaded_ty: Type,
    result_ty: Type,
    extend: Option<CastOp>,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
    env: &FuncEnv<'_>,
) -> crate::Result<()> {
    let ptr = prepare_addr(memarg, loaded_ty, builder, state, env)?;
    let mut value = builder.load(loaded_ty, ptr);
    if let Some(op) = extend {
        value = builder.cast(op, value, result_ty);
    }
    state.push1(value);
    Ok(())
}

fn translate_store(
    memarg: &MemArg,
    stored_ty: Type,
    builder: &mut FunctionBuilder<'_>,
    state: &mut FuncLoweringState,
    env: &FuncEnv<'_>,
) -> crate::Result<()> {
    let value = state.pop1();
    let value = if builder.value_type(value) != stored_ty {
        builder.cast(CastOp::Trunc, value, stored_ty)
    } else {
        value
    };
    let ptr = prepare_addr(memarg, stored_ty, builder, state, env)?;
    builder.store(value, ptr);
    Ok(())
}

fn sig_return(env: &FuncEnv<'_>, func_ty: Type) -> Type {
    match env.module.types.data(func_ty) {
        TypeData::Function { ret, .. } => *ret,
        _ => env.common.void,
    }
}
