use anyhow::Result;
use wasm2ir::{ir, lower_wat, Error, LoweredModule, Options};

fn lower(wat: &str, options: Options) -> Result<(ir::Module, LoweredModule)> {
    let mut module = ir::Module::new();
    let lowered = lower_wat(&mut module, options, wat)?;
    Ok((module, lowered))
}

fn block_by_name<'a>(body: &'a ir::Body, name: &str) -> Option<(ir::Block, &'a ir::BlockData)> {
    body.blocks()
        .map(|b| (b, body.block(b)))
        .find(|(_, data)| data.name == name)
}

#[test_log::test]
fn empty_module() -> Result<()> {
    let (module, lowered) = lower("(module)", Options::default())?;

    assert_eq!(module.data_layout(), "e-m:e-p:32:32-i64:64-n32:64-S128");
    assert_eq!(module.target_triple().to_string(), "wasm32-unknown-wasi");
    assert_eq!(module.num_functions(), 0);
    assert_eq!(module.num_globals(), 0);
    assert!(lowered.funcs.is_empty());
    assert!(lowered.memories.is_empty());
    Ok(())
}

#[test_log::test]
fn module_name_becomes_module_identifier() -> Result<()> {
    let (module, _) = lower("(module $fib)", Options::default())?;
    assert_eq!(module.name(), "fib");
    Ok(())
}

#[test_log::test]
fn single_function_gets_slot_per_param() -> Result<()> {
    let (module, lowered) = lower(
        "(module (func (param i32) (result i32) local.get 0))",
        Options::default(),
    )?;

    assert_eq!(module.num_functions(), 1);
    assert_eq!(lowered.funcs.len(), 1);

    let (_, func) = module.functions().next().unwrap();
    assert_eq!(func.name(), "func_0");
    assert_eq!(func.signature().params, vec![module.types.int32()]);
    assert_eq!(func.signature().ret, module.types.int32());
    assert_eq!(func.param_names(), ["_arg_0"]);
    assert!(func.null_pointer_is_valid());

    let body = func.body().unwrap();
    let entry = body.entry_block().unwrap();
    let entry_data = body.block(entry);
    assert_eq!(entry_data.name, "allocator");

    // One slot per parameter: alloca, store of the incoming argument,
    // then the body's reload and the branch to the return block.
    let insts: Vec<_> = entry_data.insts.iter().map(|i| body.inst(*i)).collect();
    assert!(matches!(insts[0], ir::InstData::Alloca { name, .. } if name == "_param_0"));
    assert!(matches!(insts[1], ir::InstData::Store { .. }));
    assert!(matches!(insts[2], ir::InstData::Load { .. }));
    assert!(matches!(insts[3], ir::InstData::Br { .. }));

    let (_, return_block) = block_by_name(body, "return").unwrap();
    assert_eq!(return_block.phis.len(), 1);
    let ret = body.inst(*return_block.insts.last().unwrap());
    assert!(matches!(ret, ir::InstData::Ret { value: Some(_) }));
    Ok(())
}

#[test_log::test]
fn locals_are_zero_initialized() -> Result<()> {
    let (module, _) = lower(
        "(module (func (local i64) (local f64)))",
        Options::default(),
    )?;

    let (_, func) = module.functions().next().unwrap();
    let body = func.body().unwrap();
    let entry = body.block(body.entry_block().unwrap());

    let allocas: Vec<_> = entry
        .insts
        .iter()
        .filter_map(|i| match body.inst(*i) {
            ir::InstData::Alloca { name, ty } => Some((name.clone(), *ty)),
            _ => None,
        })
        .collect();
    assert_eq!(
        allocas,
        vec![
            ("_local_0".to_string(), module.types.int64()),
            ("_local_1".to_string(), module.types.double()),
        ]
    );
    Ok(())
}

#[test_log::test]
fn memory_with_data_segment() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module (memory 1) (data (i32.const 16) "\01\02\03"))"#,
        Options::default(),
    )?;

    assert_eq!(lowered.memories.len(), 1);
    let mem = module.global(*lowered.memories.values().next().unwrap());
    assert_eq!(mem.name(), "__notdec_mem0");
    assert_eq!(mem.linkage(), ir::Linkage::Internal);
    assert_eq!(
        module.types.display(mem.value_type()).to_string(),
        "[65536 x i8]"
    );

    match mem.initializer().unwrap() {
        ir::Constant::Bytes { bytes, .. } => {
            assert_eq!(bytes.len(), 65536);
            assert_eq!(&bytes[15..20], &[0, 1, 2, 3, 0]);
        }
        other => panic!("expected a byte-array initializer, got {other:?}"),
    }
    Ok(())
}

#[test_log::test]
fn data_segments_merge_into_one_initializer() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module (memory 1) (data (i32.const 0) "\aa") (data (i32.const 8) "\bb"))"#,
        Options::default(),
    )?;

    let mem = module.global(*lowered.memories.values().next().unwrap());
    match mem.initializer().unwrap() {
        ir::Constant::Bytes { bytes, .. } => {
            assert_eq!(bytes[0], 0xaa);
            assert_eq!(bytes[8], 0xbb);
        }
        other => panic!("expected a byte-array initializer, got {other:?}"),
    }
    Ok(())
}

#[test_log::test]
fn data_segment_out_of_bounds_is_rejected() {
    let err = lower(
        r#"(module (memory 1) (data (i32.const 65534) "\01\02\03\04"))"#,
        Options::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::DataSegmentOutOfBounds { .. })
    ));
}

#[test_log::test]
fn memory_size_uses_maximum_when_present() -> Result<()> {
    let (module, lowered) = lower("(module (memory 1 2))", Options::default())?;
    let mem = module.global(*lowered.memories.values().next().unwrap());
    assert_eq!(
        module.types.display(mem.value_type()).to_string(),
        "[131072 x i8]"
    );
    Ok(())
}

#[test_log::test]
fn split_mem_emits_one_global_per_segment() -> Result<()> {
    let options = Options {
        split_mem: true,
        ..Options::default()
    };
    let (module, lowered) = lower(
        r#"(module (memory 1) (data (i32.const 16) "abc"))"#,
        options,
    )?;

    // The memory itself stays zero-initialized.
    let mem = module.global(*lowered.memories.values().next().unwrap());
    assert!(matches!(
        mem.initializer(),
        Some(ir::Constant::AggregateZero { .. })
    ));

    let split = module
        .global_by_name("__notdec_mem0_0x10")
        .expect("per-segment global");
    let split = module.global(split);
    assert_eq!(split.linkage(), ir::Linkage::Internal);
    assert_eq!(split.section(), Some(".addr_0x10"));
    assert_eq!(split.align(), Some(1));
    match split.initializer().unwrap() {
        ir::Constant::Bytes { bytes, .. } => assert_eq!(bytes, b"abc"),
        other => panic!("expected a byte-array initializer, got {other:?}"),
    }
    Ok(())
}

#[test_log::test]
fn no_mem_initializer_skips_installation() -> Result<()> {
    let options = Options {
        no_mem_initializer: true,
        ..Options::default()
    };
    let (module, lowered) = lower(
        r#"(module (memory 1) (data (i32.const 16) "abc"))"#,
        options,
    )?;
    let mem = module.global(*lowered.memories.values().next().unwrap());
    assert!(matches!(
        mem.initializer(),
        Some(ir::Constant::AggregateZero { .. })
    ));
    Ok(())
}

#[test_log::test]
fn table_and_element_segment() -> Result<()> {
    let (module, lowered) = lower(
        "(module (table 4 funcref) (elem (i32.const 1) $a $b) (func $a) (func $b))",
        Options::default(),
    )?;

    assert_eq!(lowered.tables.len(), 1);
    let table = module.global(*lowered.tables.values().next().unwrap());
    assert_eq!(table.name(), "table_0");
    assert_eq!(
        module.types.display(table.value_type()).to_string(),
        "[4 x void ()*]"
    );

    let func_ids: Vec<_> = lowered.funcs.values().copied().collect();
    match table.initializer().unwrap() {
        ir::Constant::Array { elems, .. } => {
            assert_eq!(elems.len(), 4);
            assert!(matches!(elems[0], ir::Constant::Null { .. }));
            assert!(matches!(elems[1], ir::Constant::Function { func, .. } if func == func_ids[0]));
            assert!(matches!(elems[2], ir::Constant::Function { func, .. } if func == func_ids[1]));
            assert!(matches!(elems[3], ir::Constant::Null { .. }));
        }
        other => panic!("expected an array initializer, got {other:?}"),
    }
    Ok(())
}

#[test_log::test]
fn export_keeps_original_name_by_default() -> Result<()> {
    let wat = r#"(module (func $foo) (export "bar" (func $foo)))"#;

    let (module, lowered) = lower(wat, Options::default())?;
    let func = module.function(*lowered.funcs.values().next().unwrap());
    assert_eq!(func.name(), "foo");
    assert_eq!(func.linkage(), ir::Linkage::External);
    assert!(!func.is_dso_local());

    let options = Options {
        force_export_name: true,
        ..Options::default()
    };
    let (module, lowered) = lower(wat, options)?;
    let func = module.function(*lowered.funcs.values().next().unwrap());
    assert_eq!(func.name(), "bar");
    assert_eq!(func.linkage(), ir::Linkage::External);
    Ok(())
}

#[test_log::test]
fn unnamed_export_adopts_export_name() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module (func) (export "bar" (func 0)))"#,
        Options::default(),
    )?;
    let func = module.function(*lowered.funcs.values().next().unwrap());
    assert_eq!(func.name(), "bar");
    Ok(())
}

#[test_log::test]
fn fix_names_promotes_original_main() -> Result<()> {
    let options = Options {
        fix_names: true,
        ..Options::default()
    };
    let (module, lowered) = lower(
        "(module (func $main) (func $__original_main))",
        options,
    )?;

    let ids: Vec<_> = lowered.funcs.values().copied().collect();
    // The pre-existing `main` was evicted and fell back to its default
    // name; the entry point took over.
    assert_eq!(module.function(ids[0]).name(), "func_0");
    assert_eq!(module.function(ids[1]).name(), "main");
    assert_eq!(module.function(ids[1]).linkage(), ir::Linkage::External);
    Ok(())
}

#[test_log::test]
fn fix_names_renames_libc_collisions() -> Result<()> {
    let options = Options {
        fix_names: true,
        ..Options::default()
    };
    let (module, _) = lower("(module (func $memset) (func $memcpy))", options)?;
    assert!(module.function_by_name("memset_1").is_some());
    assert!(module.function_by_name("memcpy_1").is_some());
    Ok(())
}

#[test_log::test]
fn plain_main_is_promoted_to_external() -> Result<()> {
    let (module, lowered) = lower("(module (func $main))", Options::default())?;
    let func = module.function(*lowered.funcs.values().next().unwrap());
    assert_eq!(func.name(), "main");
    assert_eq!(func.linkage(), ir::Linkage::External);
    Ok(())
}

#[test_log::test]
fn no_two_globals_share_a_final_name() -> Result<()> {
    let options = Options {
        fix_names: true,
        ..Options::default()
    };
    let (module, _) = lower(
        r#"(module
            (global $g (mut i32) (i32.const 1))
            (memory 1)
            (table 2 funcref)
            (func $main)
            (func $__original_main)
            (export "e" (func $main)))"#,
        options,
    )?;

    let mut names: Vec<&str> = module
        .functions()
        .map(|(_, f)| f.name())
        .chain(module.globals().map(|(_, g)| g.name()))
        .filter(|name| !name.is_empty())
        .collect();
    names.sort_unstable();
    let len = names.len();
    names.dedup();
    assert_eq!(names.len(), len, "duplicate final names");
    Ok(())
}

#[test_log::test]
fn imported_function_uses_module_and_field_name() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module
            (import "env" "ext" (func (param i32)))
            (func (call 0 (i32.const 1))))"#,
        Options::default(),
    )?;

    assert_eq!(module.num_functions(), 2);
    let ids: Vec<_> = lowered.funcs.values().copied().collect();
    let import = module.function(ids[0]);
    assert_eq!(import.name(), "env.ext");
    assert_eq!(import.linkage(), ir::Linkage::External);
    assert!(import.is_declaration());

    // The defined function calls the import by index.
    let body = module.function(ids[1]).body().unwrap();
    let called = body.blocks().flat_map(|b| body.block(b).insts.clone()).any(
        |inst| matches!(body.inst(inst), ir::InstData::Call { func, .. } if *func == ids[0]),
    );
    assert!(called);
    Ok(())
}

#[test_log::test]
fn imported_memory_is_external_without_initializer() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module (import "env" "memory" (memory 1)))"#,
        Options::default(),
    )?;
    let mem = module.global(*lowered.memories.values().next().unwrap());
    assert_eq!(mem.name(), "env.memory");
    assert_eq!(mem.linkage(), ir::Linkage::External);
    assert!(mem.initializer().is_none());
    Ok(())
}

#[test_log::test]
fn globals_keep_declaration_order_and_values() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module
            (global $g (mut i32) (i32.const 5))
            (global f64 (f64.const 2.5)))"#,
        Options::default(),
    )?;

    let ids: Vec<_> = lowered.globals.values().copied().collect();
    let g0 = module.global(ids[0]);
    assert_eq!(g0.name(), "g");
    assert!(!g0.is_constant());
    assert_eq!(
        g0.initializer(),
        Some(&ir::Constant::Int {
            ty: module.types.int32(),
            bits: 5
        })
    );

    let g1 = module.global(ids[1]);
    assert_eq!(g1.name(), "__notdec_global_1");
    assert!(g1.is_constant());
    assert_eq!(
        g1.initializer(),
        Some(&ir::Constant::Double {
            ty: module.types.double(),
            bits: 2.5f64.to_bits()
        })
    );
    Ok(())
}

#[test_log::test]
fn global_accesses_load_and_store_through_the_global() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module
            (global $g (mut i32) (i32.const 0))
            (func (result i32) (global.set $g (i32.const 1)) (global.get $g)))"#,
        Options::default(),
    )?;

    let func_id = *lowered.funcs.values().next().unwrap();
    let body = module.function(func_id).body().unwrap();
    let insts: Vec<_> = body
        .blocks()
        .flat_map(|b| body.block(b).insts.clone())
        .map(|i| body.inst(i).clone())
        .collect();
    let stores = insts
        .iter()
        .filter(|i| matches!(i, ir::InstData::Store { .. }))
        .count();
    let loads = insts
        .iter()
        .filter(|i| matches!(i, ir::InstData::Load { .. }))
        .count();
    assert_eq!(stores, 1);
    assert_eq!(loads, 1);
    Ok(())
}

#[test_log::test]
fn memory_access_goes_through_element_pointer() -> Result<()> {
    let (module, lowered) = lower(
        "(module (memory 1) (func (param i32) (result i32) (i32.load offset=4 (local.get 0))))",
        Options::default(),
    )?;

    let body = module
        .function(*lowered.funcs.values().next().unwrap())
        .body()
        .unwrap();
    let insts: Vec<_> = body
        .blocks()
        .flat_map(|b| body.block(b).insts.clone())
        .map(|i| body.inst(i).clone())
        .collect();

    // addr + 4, then gep into the memory global, bitcast to i32*, load.
    assert!(insts
        .iter()
        .any(|i| matches!(i, ir::InstData::Binary { op: ir::BinaryOp::Add, .. })));
    assert!(insts
        .iter()
        .any(|i| matches!(i, ir::InstData::GetElementPtr { .. })));
    assert!(insts
        .iter()
        .any(|i| matches!(i, ir::InstData::Cast { op: ir::CastOp::Bitcast, .. })));
    Ok(())
}

#[test_log::test]
fn gen_int_to_ptr_skips_the_memory_global() -> Result<()> {
    let options = Options {
        gen_int_to_ptr: true,
        ..Options::default()
    };
    let (module, lowered) = lower(
        "(module (memory 1) (func (param i32) (result i32) (i32.load (local.get 0))))",
        options,
    )?;

    let body = module
        .function(*lowered.funcs.values().next().unwrap())
        .body()
        .unwrap();
    let insts: Vec<_> = body
        .blocks()
        .flat_map(|b| body.block(b).insts.clone())
        .map(|i| body.inst(i).clone())
        .collect();
    assert!(insts
        .iter()
        .any(|i| matches!(i, ir::InstData::Cast { op: ir::CastOp::IntToPtr, .. })));
    assert!(!insts
        .iter()
        .any(|i| matches!(i, ir::InstData::GetElementPtr { .. })));
    Ok(())
}

#[test_log::test]
fn if_else_merges_through_phi() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module (func (param i32) (result i32)
            (if (result i32) (local.get 0)
                (then (i32.const 1))
                (else (i32.const 2)))))"#,
        Options::default(),
    )?;

    let body = module
        .function(*lowered.funcs.values().next().unwrap())
        .body()
        .unwrap();
    let (_, merge) = block_by_name(body, "if.end").unwrap();
    assert_eq!(merge.phis.len(), 1);
    match body.inst(merge.phis[0]) {
        ir::InstData::Phi { incoming, .. } => assert_eq!(incoming.len(), 2),
        other => panic!("expected a phi, got {other:?}"),
    }
    assert!(block_by_name(body, "if.then").is_some());
    assert!(block_by_name(body, "if.else").is_some());
    Ok(())
}

#[test_log::test]
fn loop_branches_back_to_the_header() -> Result<()> {
    let (module, lowered) = lower(
        "(module (func (local i32) (loop (local.get 0) (br_if 0))))",
        Options::default(),
    )?;

    let body = module
        .function(*lowered.funcs.values().next().unwrap())
        .body()
        .unwrap();
    let (header, _) = block_by_name(body, "loop").unwrap();
    let branches_back = body.blocks().flat_map(|b| body.block(b).insts.clone()).any(
        |inst| matches!(body.inst(inst), ir::InstData::CondBr { then_dest, .. } if *then_dest == header),
    );
    assert!(branches_back);
    Ok(())
}

#[test_log::test]
fn br_table_becomes_a_switch() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module (func (param i32)
            (block
                (block
                    (br_table 0 1 (local.get 0))))))"#,
        Options::default(),
    )?;

    let body = module
        .function(*lowered.funcs.values().next().unwrap())
        .body()
        .unwrap();
    let switch = body
        .blocks()
        .flat_map(|b| body.block(b).insts.clone())
        .find_map(|inst| match body.inst(inst) {
            ir::InstData::Switch {
                default, targets, ..
            } => Some((*default, targets.clone())),
            _ => None,
        })
        .expect("a switch instruction");
    let (default, targets) = switch;
    assert_eq!(targets.len(), 1);
    assert_ne!(targets[0], default);
    Ok(())
}

#[test_log::test]
fn branches_out_of_a_block_bind_the_result_phi() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module (func (param i32) (result i32)
            (block (result i32)
                (local.get 0)
                (br 0))))"#,
        Options::default(),
    )?;

    let body = module
        .function(*lowered.funcs.values().next().unwrap())
        .body()
        .unwrap();
    let (_, merge) = block_by_name(body, "block.end").unwrap();
    assert_eq!(merge.phis.len(), 1);
    match body.inst(merge.phis[0]) {
        ir::InstData::Phi { incoming, .. } => assert_eq!(incoming.len(), 1),
        other => panic!("expected a phi, got {other:?}"),
    }
    Ok(())
}

#[test_log::test]
fn call_indirect_loads_from_the_table() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module
            (type $t (func (result i32)))
            (table 1 funcref)
            (elem (i32.const 0) $f)
            (func $f (result i32) (i32.const 7))
            (func (result i32) (call_indirect (type $t) (i32.const 0))))"#,
        Options::default(),
    )?;

    let ids: Vec<_> = lowered.funcs.values().copied().collect();
    let body = module.function(ids[1]).body().unwrap();
    let insts: Vec<_> = body
        .blocks()
        .flat_map(|b| body.block(b).insts.clone())
        .map(|i| body.inst(i).clone())
        .collect();

    assert!(insts
        .iter()
        .any(|i| matches!(i, ir::InstData::GetElementPtr { .. })));
    assert!(insts
        .iter()
        .any(|i| matches!(i, ir::InstData::Cast { op: ir::CastOp::Bitcast, .. })));
    assert!(insts
        .iter()
        .any(|i| matches!(i, ir::InstData::CallIndirect { .. })));
    Ok(())
}

#[test_log::test]
fn unreachable_terminates_the_block() -> Result<()> {
    let (module, lowered) = lower(
        "(module (func (result i32) (unreachable)))",
        Options::default(),
    )?;

    let body = module
        .function(*lowered.funcs.values().next().unwrap())
        .body()
        .unwrap();
    let entry = body.block(body.entry_block().unwrap());
    assert!(matches!(
        body.inst(*entry.insts.last().unwrap()),
        ir::InstData::Unreachable
    ));
    // Dead code after a branch is skipped without disturbing the CFG.
    let (module, lowered) = lower(
        "(module (func (block (br 0) (i32.const 1) (drop))))",
        Options::default(),
    )?;
    assert!(module
        .function(*lowered.funcs.values().next().unwrap())
        .body()
        .is_some());
    assert_eq!(lowered.funcs.len(), 1);
    Ok(())
}

#[test_log::test]
fn multi_value_results_are_rejected() {
    let err = lower(
        "(module (func (result i32 i64) (i32.const 1) (i64.const 2)))",
        Options::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::MultiValueUnsupported(2))
    ));
}

#[test_log::test]
fn non_funcref_tables_are_rejected() {
    let err = lower("(module (table 1 externref))", Options::default()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::UnsupportedTableType(_))
    ));
}

#[test_log::test]
fn lowering_into_a_used_module_is_rejected() {
    let mut module = ir::Module::new();
    lower_wat(&mut module, Options::default(), "(module (func))").unwrap();
    let err = lower_wat(&mut module, Options::default(), "(module)").unwrap_err();
    assert!(matches!(err, Error::ModuleNotEmpty));
}

#[test_log::test]
fn function_count_matches_the_input() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module
            (import "env" "a" (func))
            (import "env" "b" (func (param i32)))
            (func)
            (func (param f64) (result f64) (local.get 0)))"#,
        Options::default(),
    )?;
    assert_eq!(module.num_functions(), 4);
    assert_eq!(lowered.funcs.len(), 4);

    // Index space preserved as declaration order.
    let ids: Vec<_> = lowered.funcs.values().copied().collect();
    assert!(module.function(ids[0]).is_declaration());
    assert!(module.function(ids[1]).is_declaration());
    assert!(!module.function(ids[2]).is_declaration());
    assert_eq!(
        module.function(ids[3]).signature().params,
        vec![module.types.double()]
    );
    Ok(())
}

#[test_log::test]
fn exported_memory_is_promoted() -> Result<()> {
    let (module, lowered) = lower(
        r#"(module (memory (export "memory") 1))"#,
        Options::default(),
    )?;
    let mem = module.global(*lowered.memories.values().next().unwrap());
    assert_eq!(mem.name(), "__notdec_mem0");
    assert_eq!(mem.linkage(), ir::Linkage::External);
    assert!(!mem.is_dso_local());
    Ok(())
}
