use crate::errors::Error;
use crate::indices::{
    DataIndex, FuncIndex, GlobalIndex, LocalIndex, MemoryIndex, TableIndex, TypeIndex,
};
use crate::parse::{
    ConstExpr, DataSegment, DataSegmentKind, ElementItems, ElementSegment, ElementSegmentKind,
    EntityType, Export, FunctionBodyData, Import, MemoryPlan, ParsedModule, TablePlan,
};
use crate::wasm_unsupported;
use crate::EntityIndex;
use hashbrown::HashMap;
use wasmparser::{
    BinaryReader, DataKind, DataSectionReader, ElementKind, ElementSectionReader,
    ExportSectionReader, ExternalKind, FunctionSectionReader, GlobalSectionReader,
    ImportSectionReader, IndirectNameMap, MemorySectionReader, Name, NameMap, NameSectionReader,
    Parser, Payload, TableInit, TableSectionReader, TagSectionReader, TypeRef, TypeSectionReader,
    Validator,
};

/// Parses and validates a binary module payload-by-payload, accumulating a
/// [`ParsedModule`].
pub struct ModuleParser<'a, 'wasm> {
    result: ParsedModule<'wasm>,
    validator: &'a mut Validator,
}

impl<'a, 'wasm> ModuleParser<'a, 'wasm> {
    pub fn new(validator: &'a mut Validator) -> Self {
        Self {
            result: ParsedModule::default(),
            validator,
        }
    }

    pub fn parse(mut self, data: &'wasm [u8]) -> crate::Result<ParsedModule<'wasm>> {
        let mut parser = Parser::default();
        parser.set_features(*self.validator.features());

        for payload in parser.parse_all(data) {
            self.parse_payload(payload?)?;
        }

        self.validator.reset();
        Ok(self.result)
    }

    fn parse_payload(&mut self, payload: Payload<'wasm>) -> crate::Result<()> {
        match payload {
            Payload::Version {
                num,
                encoding,
                range,
            } => {
                self.validator.version(num, encoding, &range)?;
            }
            Payload::End(offset) => {
                self.validator.end(offset)?;
            }
            Payload::TypeSection(types) => {
                self.validator.type_section(&types)?;
                self.read_type_section(types)?;
            }
            Payload::ImportSection(imports) => {
                self.validator.import_section(&imports)?;
                self.read_import_section(imports)?;
            }
            Payload::FunctionSection(functions) => {
                self.validator.function_section(&functions)?;
                self.read_function_section(functions)?;
            }
            Payload::TableSection(tables) => {
                self.validator.table_section(&tables)?;
                self.read_table_section(tables)?;
            }
            Payload::MemorySection(memories) => {
                self.validator.memory_section(&memories)?;
                self.read_memory_section(memories)?;
            }
            Payload::TagSection(tags) => {
                self.validator.tag_section(&tags)?;
                self.read_tag_section(&tags)?;
            }
            Payload::GlobalSection(globals) => {
                self.validator.global_section(&globals)?;
                self.read_global_section(globals)?;
            }
            Payload::ExportSection(exports) => {
                self.validator.export_section(&exports)?;
                self.read_export_section(exports)?;
            }
            Payload::StartSection { func, range } => {
                self.validator.start_section(func, &range)?;
                self.result.start = Some(FuncIndex::from_u32(func));
            }
            Payload::ElementSection(elements) => {
                self.validator.element_section(&elements)?;
                self.read_element_section(elements)?;
            }
            Payload::DataCountSection { count, range } => {
                self.validator.data_count_section(count, &range)?;
            }
            Payload::DataSection(section) => {
                self.validator.data_section(&section)?;
                self.read_data_section(section)?;
            }
            Payload::CodeSectionStart { count, range, .. } => {
                self.validator.code_section_start(count, &range)?;
                self.result
                    .function_bodies
                    .reserve_exact(count as usize);
            }
            Payload::CodeSectionEntry(body) => {
                let validator = self.validator.code_section_entry(&body)?;
                self.result
                    .function_bodies
                    .push(FunctionBodyData { body, validator });
            }
            Payload::CustomSection(sec) if sec.name() == "name" => {
                self.read_name_section(NameSectionReader::new(BinaryReader::new(
                    sec.data(),
                    sec.data_offset(),
                )))?;
            }
            Payload::CustomSection(sec) => {
                tracing::debug!("skipping custom section {:?}", sec.name());
            }
            Payload::ModuleSection { .. }
            | Payload::InstanceSection(_)
            | Payload::CoreTypeSection(_)
            | Payload::ComponentSection { .. }
            | Payload::ComponentInstanceSection(_)
            | Payload::ComponentAliasSection(_)
            | Payload::ComponentTypeSection(_)
            | Payload::ComponentCanonicalSection(_)
            | Payload::ComponentStartSection { .. }
            | Payload::ComponentImportSection(_)
            | Payload::ComponentExportSection(_) => {
                return Err(wasm_unsupported!("component module"));
            }
            p => tracing::debug!("unknown section {p:?}"),
        }

        Ok(())
    }

    fn read_type_section(&mut self, types: TypeSectionReader<'wasm>) -> crate::Result<()> {
        let count = types.count();
        self.result.types.reserve_exact(count as usize);

        for ty in types.into_iter_err_on_gc_types() {
            self.result.types.push(ty?);
        }

        Ok(())
    }

    fn read_import_section(&mut self, imports: ImportSectionReader<'wasm>) -> crate::Result<()> {
        self.result.imports.reserve_exact(imports.count() as usize);

        for import in imports {
            let import = import?;
            let ty = match import.ty {
                TypeRef::Func(index) => {
                    let index = TypeIndex::from_u32(index);
                    self.result.functions.push(index);
                    self.result.num_imported_functions += 1;
                    EntityType::Function(index)
                }
                TypeRef::Table(ty) => {
                    self.result.num_imported_tables += 1;
                    EntityType::Table(self.result.tables.push(TablePlan::for_table(ty)))
                }
                TypeRef::Memory(ty) => {
                    self.result.num_imported_memories += 1;
                    EntityType::Memory(self.result.memories.push(MemoryPlan::for_memory(ty)))
                }
                TypeRef::Global(ty) => {
                    self.result.num_imported_globals += 1;
                    EntityType::Global(self.result.globals.push(ty))
                }
                TypeRef::Tag(_) => {
                    return Err(Error::UnsupportedImportKind("tag".into()));
                }
            };

            self.result.imports.push(Import {
                module: import.module,
                field: import.name,
                ty,
            });
        }

        Ok(())
    }

    fn read_function_section(
        &mut self,
        functions: FunctionSectionReader<'wasm>,
    ) -> crate::Result<()> {
        self.result
            .functions
            .reserve_exact(functions.count() as usize);

        for index in functions {
            self.result.functions.push(TypeIndex::from_u32(index?));
        }

        Ok(())
    }

    fn read_table_section(&mut self, tables: TableSectionReader<'wasm>) -> crate::Result<()> {
        self.result.tables.reserve_exact(tables.count() as usize);

        for table in tables {
            let table = table?;
            match table.init {
                TableInit::RefNull => {}
                TableInit::Expr(_) => {
                    return Err(wasm_unsupported!("table init expression"));
                }
            }
            self.result.tables.push(TablePlan::for_table(table.ty));
        }

        Ok(())
    }

    fn read_memory_section(&mut self, memories: MemorySectionReader<'wasm>) -> crate::Result<()> {
        self.result.memories.reserve_exact(memories.count() as usize);

        for ty in memories {
            self.result.memories.push(MemoryPlan::for_memory(ty?));
        }

        Ok(())
    }

    fn read_tag_section(&self, _tags: &TagSectionReader<'wasm>) -> crate::Result<()> {
        Err(wasm_unsupported!("exception handling"))
    }

    fn read_global_section(&mut self, globals: GlobalSectionReader<'wasm>) -> crate::Result<()> {
        self.result.globals.reserve_exact(globals.count() as usize);
        self.result
            .global_initializers
            .reserve_exact(globals.count() as usize);

        for global in globals {
            let global = global?;
            self.result.globals.push(global.ty);
            self.result
                .global_initializers
                .push(ConstExpr::from_wasmparser(global.init_expr)?);
        }

        Ok(())
    }

    fn read_export_section(&mut self, exports: ExportSectionReader<'wasm>) -> crate::Result<()> {
        self.result.exports.reserve_exact(exports.count() as usize);

        for export in exports {
            let export = export?;
            let index = match export.kind {
                ExternalKind::Func => EntityIndex::Function(FuncIndex::from_u32(export.index)),
                ExternalKind::Table => EntityIndex::Table(TableIndex::from_u32(export.index)),
                ExternalKind::Memory => EntityIndex::Memory(MemoryIndex::from_u32(export.index)),
                ExternalKind::Global => EntityIndex::Global(GlobalIndex::from_u32(export.index)),
                ExternalKind::Tag => {
                    return Err(Error::UnsupportedExternalKind("tag".into()));
                }
            };

            self.result.exports.push(Export {
                name: export.name,
                index,
            });
        }

        Ok(())
    }

    fn read_element_section(&mut self, elements: ElementSectionReader<'wasm>) -> crate::Result<()> {
        for element in elements {
            let element = element?;

            let items = match element.items {
                wasmparser::ElementItems::Functions(funcs) => {
                    let mut out = Vec::with_capacity(funcs.count() as usize);
                    for func_index in funcs {
                        out.push(FuncIndex::from_u32(func_index?));
                    }
                    ElementItems::Functions(out.into_boxed_slice())
                }
                wasmparser::ElementItems::Expressions(_, exprs) => {
                    ElementItems::Expressions(exprs.count() as usize)
                }
            };

            let kind = match element.kind {
                ElementKind::Active {
                    table_index,
                    offset_expr,
                } => ElementSegmentKind::Active {
                    table_index,
                    offset: ConstExpr::from_wasmparser(offset_expr)?,
                },
                ElementKind::Passive => ElementSegmentKind::Passive,
                ElementKind::Declared => ElementSegmentKind::Declared,
            };

            self.result.element_segments.push(ElementSegment { kind, items });
        }

        Ok(())
    }

    fn read_data_section(&mut self, section: DataSectionReader<'wasm>) -> crate::Result<()> {
        self.result
            .data_segments
            .reserve_exact(section.count() as usize);

        for entry in section {
            let entry = entry?;

            let kind = match entry.kind {
                DataKind::Active {
                    memory_index,
                    offset_expr,
                } => DataSegmentKind::Active {
                    memory_index: MemoryIndex::from_u32(memory_index),
                    offset: ConstExpr::from_wasmparser(offset_expr)?,
                },
                DataKind::Passive => DataSegmentKind::Passive,
            };

            self.result.data_segments.push(DataSegment {
                kind,
                data: entry.data,
            });
        }

        Ok(())
    }

    fn read_name_section(&mut self, reader: NameSectionReader<'wasm>) -> crate::Result<()> {
        fn for_each_direct_name<'wasm>(
            names: NameMap<'wasm>,
            mut f: impl FnMut(u32, &'wasm str),
        ) -> crate::Result<()> {
            for name in names {
                let name = name?;
                f(name.index, name.name);
            }
            Ok(())
        }

        fn for_each_indirect_name<'wasm, I>(
            names: IndirectNameMap<'wasm>,
            mut f1: impl FnMut(&mut HashMap<I, &'wasm str>, u32, &'wasm str),
            mut f2: impl FnMut(HashMap<I, &'wasm str>, u32),
        ) -> crate::Result<()> {
            for naming in names {
                let naming = naming?;
                let mut result = HashMap::default();

                for name in naming.names {
                    let name = name?;
                    f1(&mut result, name.index, name.name);
                }

                f2(result, naming.index);
            }
            Ok(())
        }

        for subsection in reader {
            match subsection? {
                Name::Module { name, .. } => {
                    self.result.names.module_name = Some(name);
                }
                Name::Function(names) => {
                    let num_functions = self.result.functions.len();
                    let func_names = &mut self.result.names.func_names;
                    for_each_direct_name(names, |idx, name| {
                        // Skip namings of functions that don't exist.
                        if (idx as usize) < num_functions {
                            func_names.insert(FuncIndex::from_u32(idx), name);
                        }
                    })?;
                }
                Name::Local(names) => {
                    let num_functions = self.result.functions.len();
                    let locals_names = &mut self.result.names.locals_names;
                    for_each_indirect_name(
                        names,
                        |result, idx, name| {
                            result.insert(LocalIndex::from_u32(idx), name);
                        },
                        |result, idx| {
                            if (idx as usize) < num_functions {
                                locals_names.insert(FuncIndex::from_u32(idx), result);
                            }
                        },
                    )?;
                }
                Name::Global(names) => {
                    let global_names = &mut self.result.names.global_names;
                    for_each_direct_name(names, |idx, name| {
                        global_names.insert(GlobalIndex::from_u32(idx), name);
                    })?;
                }
                Name::Table(names) => {
                    let table_names = &mut self.result.names.table_names;
                    for_each_direct_name(names, |idx, name| {
                        table_names.insert(TableIndex::from_u32(idx), name);
                    })?;
                }
                Name::Memory(names) => {
                    let memory_names = &mut self.result.names.memory_names;
                    for_each_direct_name(names, |idx, name| {
                        memory_names.insert(MemoryIndex::from_u32(idx), name);
                    })?;
                }
                Name::Data(names) => {
                    let data_names = &mut self.result.names.data_names;
                    for_each_direct_name(names, |idx, name| {
                        data_names.insert(DataIndex::from_u32(idx), name);
                    })?;
                }
                Name::Label(_) | Name::Element(_) | Name::Field(_) | Name::Type(_)
                | Name::Tag(_) | Name::Unknown { .. } => {}
            }
        }

        Ok(())
    }
}
