//! The module lowerer: declaration and definition of all module entities
//! in a fixed phase order. Later phases may assume all artifacts of
//! earlier phases; consumers may rely on the resulting declaration order.

use crate::errors::Error;
use crate::indices::{FuncIndex, LocalIndex};
use crate::wasm_unsupported;
use crate::ir::{Constant, Linkage};
use crate::lower::names::{
    self, ARG_PREFIX, DEFAULT_FUNCNAME_PREFIX, DEFAULT_GLOBAL_PREFIX,
};
use crate::lower::{memory, table, FuncEnv, FuncTranslator, LoweredModule, LoweringContext};
use crate::parse::{EntityType, FunctionBodyData, ParsedModule};
use crate::EntityIndex;
use cranelift_entity::PrimaryMap;
use target_lexicon::{Architecture, BinaryFormat, Environment, OperatingSystem, Triple, Vendor};
use wasmparser::FuncValidatorAllocations;

impl<'a> LoweringContext<'a> {
    /// Lowers a parsed module into the destination IR module.
    pub fn lower(mut self, mut parsed: ParsedModule<'_>) -> crate::Result<LoweredModule> {
        let function_bodies = core::mem::take(&mut parsed.function_bodies);

        self.set_module_metadata(&parsed)?;
        self.declare_imports(&parsed)?;
        self.declare_globals(&parsed)?;
        self.declare_memories(&parsed)?;
        self.apply_data_segments(&parsed)?;
        self.declare_functions(&parsed)?;
        self.declare_tables(&parsed)?;
        self.lower_function_bodies(&parsed, function_bodies)?;
        self.apply_exports(&parsed)?;
        self.assign_default_function_names();
        self.apply_element_segments(&parsed)?;

        debug_assert_eq!(self.funcs.len(), parsed.functions.len());
        Ok(LoweredModule {
            funcs: self.funcs,
            globals: self.globs,
            memories: self.mems,
            tables: self.tables,
        })
    }

    /// Phase 1–2: data layout, target triple, module identifier, interned
    /// signature types, and the fresh-destination precondition.
    fn set_module_metadata(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        if !self.module.is_empty()
            || !self.funcs.is_empty()
            || !self.globs.is_empty()
            || !self.mems.is_empty()
            || !self.tables.is_empty()
        {
            return Err(Error::ModuleNotEmpty);
        }
        if parsed.memories.len() > 1 {
            return Err(wasm_unsupported!("multiple memories"));
        }

        self.module.set_data_layout(crate::DATA_LAYOUT);
        self.module.set_target_triple(Triple {
            architecture: Architecture::Wasm32,
            vendor: Vendor::Unknown,
            operating_system: OperatingSystem::Wasi,
            environment: Environment::Unknown,
            binary_format: BinaryFormat::Wasm,
        });
        if let Some(name) = parsed.names.module_name() {
            self.module.set_name(name);
        }

        for (_, func_type) in parsed.types.iter() {
            let entry = match crate::lower::types::func_signature(&self.module.types, func_type) {
                Ok(sig) => {
                    let func = self.module.types.function(&sig.params, sig.ret);
                    let func_ptr = self.module.types.pointer_to(func);
                    Some(crate::lower::SigTypes { func, func_ptr })
                }
                Err(_) => None,
            };
            self.sig_types.push(entry);
        }

        Ok(())
    }

    /// Phase 3: imports, in declared order, by kind. Imported globals are
    /// part of `parsed.globals` but not of the defined-global walk, so no
    /// double emission happens.
    fn declare_imports(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        for import in &parsed.imports {
            let fallback = || format!("{}.{}", import.module, import.field);
            match import.ty {
                EntityType::Function(type_index) => {
                    let func_index = self.funcs.next_key();
                    let name = parsed
                        .names
                        .func_name(func_index)
                        .map(str::to_string)
                        .unwrap_or_else(fallback);
                    let name = names::declared_name(&name, &self.opts).to_string();
                    let signature = self.func_signature_of(parsed, type_index)?;
                    let param_names = param_names(parsed, func_index, signature.params.len());
                    let id = self
                        .module
                        .declare_function(name, signature, Linkage::External);
                    self.module.function_mut(id).set_param_names(param_names);
                    self.funcs.push(id);
                }
                EntityType::Memory(memory_index) => {
                    let name = parsed
                        .names
                        .memory_name(memory_index)
                        .map(str::to_string)
                        .unwrap_or_else(fallback);
                    memory::declare_memory(self, &parsed.memories[memory_index], Some(&name), true)?;
                }
                EntityType::Global(global_index) => {
                    let name = parsed
                        .names
                        .global_name(global_index)
                        .map(str::to_string)
                        .unwrap_or_else(fallback);
                    let name = names::declared_name(&name, &self.opts).to_string();
                    let ty = crate::lower::types::value_type(
                        &self.module.types,
                        parsed.globals[global_index].content_type,
                    )?;
                    let id = self.module.declare_global(
                        name,
                        ty,
                        Linkage::External,
                        !parsed.globals[global_index].mutable,
                    );
                    self.globs.push(id);
                }
                EntityType::Table(table_index) => {
                    let name = parsed
                        .names
                        .table_name(table_index)
                        .map(str::to_string)
                        .unwrap_or_else(fallback);
                    table::declare_table(
                        self,
                        &parsed.tables[table_index],
                        table_index,
                        Some(&name),
                    )?;
                }
            }
        }

        Ok(())
    }

    /// Phase 4: non-imported globals with evaluated initializers. Opaque
    /// initializers default to aggregate zero.
    fn declare_globals(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        for (global_index, global_ty) in parsed
            .globals
            .iter()
            .skip(parsed.num_imported_globals as usize)
        {
            let def_index = parsed
                .defined_global_index(global_index)
                .expect("imported globals were skipped");
            let name = parsed
                .names
                .global_name(global_index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{DEFAULT_GLOBAL_PREFIX}{}", global_index.as_u32()));
            let name = names::declared_name(&name, &self.opts).to_string();

            let ty = crate::lower::types::value_type(&self.module.types, global_ty.content_type)?;
            let init = self
                .const_eval
                .eval(&self.module.types, &parsed.global_initializers[def_index])?
                .unwrap_or(Constant::AggregateZero { ty });

            let id = self
                .module
                .declare_global(name, ty, Linkage::Internal, !global_ty.mutable);
            self.module.global_mut(id).set_initializer(init);
            self.globs.push(id);
        }

        Ok(())
    }

    /// Phase 5, first pass: non-imported memories.
    fn declare_memories(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        for (memory_index, plan) in parsed
            .memories
            .iter()
            .skip(parsed.num_imported_memories as usize)
        {
            let name = parsed.names.memory_name(memory_index).map(str::to_string);
            memory::declare_memory(self, plan, name.as_deref(), false)?;
        }
        Ok(())
    }

    /// Phase 5, second pass: data segments applied to their memories.
    fn apply_data_segments(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        for (i, segment) in parsed.data_segments.iter().enumerate() {
            memory::apply_data_segment(self, parsed, i, segment)?;
        }
        Ok(())
    }

    /// Phase 6: non-imported function prototypes, with the `FixNames`
    /// rewrites applied at declaration time.
    fn declare_functions(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        for (func_index, &type_index) in parsed
            .functions
            .iter()
            .skip(parsed.num_imported_functions as usize)
        {
            let name = parsed.names.func_name(func_index).unwrap_or("");
            let name = names::declared_name(name, &self.opts).to_string();
            let signature = self.func_signature_of(parsed, type_index)?;
            let param_names = param_names(parsed, func_index, signature.params.len());
            let id = self
                .module
                .declare_function(name, signature, Linkage::Internal);
            self.module.function_mut(id).set_param_names(param_names);
            names::fix_declared_func_name(self.module, id, &self.opts);
            self.funcs.push(id);
        }

        Ok(())
    }

    /// Phase 7: non-imported tables (prototypes; element segments fill
    /// them later).
    fn declare_tables(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        for (table_index, plan) in parsed
            .tables
            .iter()
            .skip(parsed.num_imported_tables as usize)
        {
            let name = parsed.names.table_name(table_index).map(str::to_string);
            table::declare_table(self, plan, table_index, name.as_deref())?;
        }
        Ok(())
    }

    /// Phase 8: function bodies, paired with the prototypes of phase 6 by
    /// position.
    fn lower_function_bodies(
        &mut self,
        parsed: &ParsedModule<'_>,
        function_bodies: PrimaryMap<crate::DefinedFuncIndex, FunctionBodyData<'_>>,
    ) -> crate::Result<()> {
        let mut func_translator = FuncTranslator::new();

        for (def_index, FunctionBodyData { body, validator }) in function_bodies {
            let func_index = parsed.func_index(def_index);
            let func_id = self.funcs[func_index];
            if self.opts.debug_enabled() {
                tracing::debug!(
                    "analyzing function {:?} ({})",
                    self.module.function(func_id).name(),
                    func_index.as_u32(),
                );
            }

            let mut validator = validator.into_validator(FuncValidatorAllocations::default());
            let body_ir = {
                let env = FuncEnv::new(&*self, parsed);
                func_translator.translate_body(&env, func_index, &body, &mut validator)?
            };

            let function = self.module.function_mut(func_id);
            function.set_body(body_ir);
            // Linear-memory address 0 is a legitimate pointer target.
            function.set_null_pointer_is_valid(true);
        }

        Ok(())
    }

    /// Phase 9: export promotion. Functions, memories and globals are
    /// raised to external linkage with dso-local cleared and the export
    /// naming policy applied; table and tag exports record the index only.
    fn apply_exports(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        for export in &parsed.exports {
            match export.index {
                EntityIndex::Function(func_index) => {
                    let id = *self.funcs.get(func_index).ok_or(Error::IndexOutOfRange {
                        kind: "function",
                        index: func_index.as_u32(),
                    })?;
                    let function = self.module.function_mut(id);
                    function.set_linkage(Linkage::External);
                    function.set_dso_local(false);
                    names::apply_export_name_func(self.module, id, export.name, &self.opts);
                }
                EntityIndex::Memory(memory_index) => {
                    let id = *self.mems.get(memory_index).ok_or(Error::IndexOutOfRange {
                        kind: "memory",
                        index: memory_index.as_u32(),
                    })?;
                    let global = self.module.global_mut(id);
                    global.set_linkage(Linkage::External);
                    global.set_dso_local(false);
                    names::apply_export_name_global(self.module, id, export.name, &self.opts);
                }
                EntityIndex::Global(global_index) => {
                    let id = *self.globs.get(global_index).ok_or(Error::IndexOutOfRange {
                        kind: "global",
                        index: global_index.as_u32(),
                    })?;
                    let global = self.module.global_mut(id);
                    global.set_linkage(Linkage::External);
                    global.set_dso_local(false);
                    names::apply_export_name_global(self.module, id, export.name, &self.opts);
                }
                EntityIndex::Table(_) | EntityIndex::Tag(_) => {}
            }
        }

        Ok(())
    }

    /// Phase 10: any function still unnamed gets `func_<i>`.
    fn assign_default_function_names(&mut self) {
        for (func_index, &id) in self.funcs.iter() {
            if self.module.function(id).name().is_empty() {
                self.module
                    .function_mut(id)
                    .set_name(format!("{DEFAULT_FUNCNAME_PREFIX}{}", func_index.as_u32()));
            }
        }
    }

    /// Phase 11: element segments, which need the functions of phase 6/10
    /// to exist.
    fn apply_element_segments(&mut self, parsed: &ParsedModule<'_>) -> crate::Result<()> {
        for segment in &parsed.element_segments {
            table::apply_element_segment(self, segment)?;
        }
        Ok(())
    }
}

fn param_names(parsed: &ParsedModule<'_>, func_index: FuncIndex, num_params: usize) -> Vec<String> {
    (0..num_params)
        .map(|i| {
            parsed
                .names
                .local_name(func_index, LocalIndex::from_u32(i as u32))
                .map(str::to_string)
                .unwrap_or_else(|| format!("{ARG_PREFIX}{i}"))
        })
        .collect()
}
