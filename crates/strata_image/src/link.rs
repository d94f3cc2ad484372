//! Symbol resolution across parsed files.
//!
//! The [`SymbolTable`] holds every message and enum of the compilation by
//! full name. Each file is then linked on its own against the files it can
//! see: itself, its direct imports, and whatever those publicly import.

use std::collections::{HashMap, HashSet};

use strata_diagnostics::DiagnosticSink;
use strata_parser::ast::{EnumDecl, Item, MessageDecl, TypeRef};
use strata_source::{SourceFile, Span};

use crate::compiler::ParsedFile;
use crate::descriptor::{
    EnumDescriptor, EnumValueDescriptor, FieldDescriptor, FieldType, FileDescriptor,
    MessageDescriptor, SourceCodeInfo, SourceLocation,
};
use crate::errors;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SymbolKind {
    Message,
    Enum,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Symbol {
    kind: SymbolKind,
    file: usize,
    span: Span,
}

/// Every declared message and enum, by full name.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    /// Registers the declarations of `files` in order. A name seen again is
    /// reported as a duplicate at its later definition.
    pub(crate) fn build(files: &[ParsedFile], sink: &DiagnosticSink) -> Self {
        let mut table = Self::default();
        for (index, file) in files.iter().enumerate() {
            table.register_items(index, file.ast.package_name(), &file.ast.items, sink);
        }
        table
    }

    fn register_items(&mut self, file: usize, scope: &str, items: &[Item], sink: &DiagnosticSink) {
        for item in items {
            let full_name = qualify(scope, item.name());
            let kind = match item {
                Item::Message(_) => SymbolKind::Message,
                Item::Enum(_) => SymbolKind::Enum,
            };
            let span = item.name_span();
            if let Some(first) = self.symbols.get(&full_name) {
                sink.emit(errors::error_duplicate_symbol(&full_name, span, first.span));
            } else {
                self.symbols
                    .insert(full_name.clone(), Symbol { kind, file, span });
            }
            if let Item::Message(message) = item {
                self.register_items(file, &full_name, &message.nested, sink);
            }
        }
    }

    fn get(&self, full_name: &str) -> Option<&Symbol> {
        self.symbols.get(full_name)
    }
}

pub(crate) fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

/// Files reachable from `start` through public imports, `start` included.
pub(crate) fn public_closure(imports: &[Vec<Option<usize>>], files: &[ParsedFile], start: usize) -> Vec<usize> {
    let mut seen = HashSet::from([start]);
    let mut out = vec![start];
    let mut stack = vec![start];
    while let Some(file) = stack.pop() {
        for (decl, target) in files[file].ast.imports.iter().zip(&imports[file]) {
            if let Some(target) = *target {
                if decl.public && seen.insert(target) {
                    out.push(target);
                    stack.push(target);
                }
            }
        }
    }
    out
}

/// The result of linking one file.
pub(crate) struct LinkedFile {
    pub descriptor: FileDescriptor,
    /// Whether each import declaration provided a referenced symbol.
    pub used_imports: Vec<bool>,
}

/// Links the file at `index`. Errors are emitted to `sink`.
pub(crate) fn link_file(
    index: usize,
    files: &[ParsedFile],
    imports: &[Vec<Option<usize>>],
    table: &SymbolTable,
    source: &SourceFile,
    include_source_code_info: bool,
    sink: &DiagnosticSink,
) -> LinkedFile {
    let file = &files[index];
    let mut visible: HashMap<usize, usize> = HashMap::new();
    for (position, target) in imports[index].iter().enumerate() {
        if let Some(target) = *target {
            for reachable in public_closure(imports, files, target) {
                visible.entry(reachable).or_insert(position);
            }
        }
    }
    let mut linker = Linker {
        index,
        files,
        table,
        source,
        sink,
        visible,
        used_imports: vec![false; file.ast.imports.len()],
        locations: include_source_code_info.then(Vec::new),
    };

    let package = file.ast.package_name();
    let mut message_types = Vec::new();
    let mut enum_types = Vec::new();
    for item in &file.ast.items {
        match item {
            Item::Message(message) => message_types.push(linker.link_message(package, message)),
            Item::Enum(en) => enum_types.push(linker.link_enum(package, en)),
        }
    }

    let descriptor = FileDescriptor {
        name: file.path.clone(),
        package: package.to_string(),
        syntax: file.ast.syntax_value().to_string(),
        dependencies: file.ast.imports.iter().map(|i| i.path.clone()).collect(),
        public_dependencies: file
            .ast
            .imports
            .iter()
            .enumerate()
            .filter(|(_, import)| import.public)
            .map(|(position, _)| position)
            .collect(),
        message_types,
        enum_types,
        source_code_info: linker.locations.take().map(|locations| SourceCodeInfo { locations }),
    };
    LinkedFile {
        descriptor,
        used_imports: linker.used_imports,
    }
}

struct Linker<'a> {
    index: usize,
    files: &'a [ParsedFile],
    table: &'a SymbolTable,
    source: &'a SourceFile,
    sink: &'a DiagnosticSink,
    /// Visible file index to the import declaration that makes it visible.
    visible: HashMap<usize, usize>,
    used_imports: Vec<bool>,
    locations: Option<Vec<SourceLocation>>,
}

impl Linker<'_> {
    fn record(&mut self, symbol: &str, span: Span) {
        if let Some(locations) = &mut self.locations {
            let (start_line, start_column) = self.source.line_col(span.start);
            let (end_line, end_column) = self.source.line_col(span.end.saturating_sub(1).max(span.start));
            locations.push(SourceLocation {
                symbol: symbol.to_string(),
                start_line,
                start_column,
                end_line,
                end_column,
            });
        }
    }

    fn link_message(&mut self, scope: &str, decl: &MessageDecl) -> MessageDescriptor {
        let full_name = qualify(scope, &decl.name);
        self.record(&full_name, decl.span);

        let mut numbers: HashMap<u32, Span> = HashMap::new();
        let mut names: HashMap<&str, Span> = HashMap::new();
        let mut fields = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            if let Some(first) = numbers.get(&field.number) {
                self.sink.emit(errors::error_duplicate_field_number(
                    &full_name,
                    field.number,
                    field.number_span,
                    *first,
                ));
            } else {
                numbers.insert(field.number, field.number_span);
            }
            if let Some(first) = names.get(field.name.as_str()) {
                self.sink.emit(errors::error_duplicate_field_name(
                    &full_name,
                    &field.name,
                    field.name_span,
                    *first,
                ));
            } else {
                names.insert(&field.name, field.name_span);
            }
            self.record(&format!("{full_name}.{}", field.name), field.span);
            fields.push(FieldDescriptor {
                name: field.name.clone(),
                number: field.number,
                label: field.label,
                field_type: self.resolve(&full_name, &field.ty),
            });
        }

        let mut nested_types = Vec::new();
        let mut enum_types = Vec::new();
        for item in &decl.nested {
            match item {
                Item::Message(message) => nested_types.push(self.link_message(&full_name, message)),
                Item::Enum(en) => enum_types.push(self.link_enum(&full_name, en)),
            }
        }
        MessageDescriptor {
            name: decl.name.clone(),
            full_name,
            fields,
            nested_types,
            enum_types,
        }
    }

    fn link_enum(&mut self, scope: &str, decl: &EnumDecl) -> EnumDescriptor {
        let full_name = qualify(scope, &decl.name);
        self.record(&full_name, decl.span);
        EnumDescriptor {
            name: decl.name.clone(),
            full_name,
            values: decl
                .values
                .iter()
                .map(|value| EnumValueDescriptor {
                    name: value.name.clone(),
                    number: value.number,
                })
                .collect(),
        }
    }

    /// Resolves a type reference, searching from the innermost scope outward.
    fn resolve(&mut self, scope: &str, ty: &TypeRef) -> FieldType {
        let (name, absolute, span) = match ty {
            TypeRef::Scalar { scalar, .. } => return FieldType::Scalar(*scalar),
            TypeRef::Named { name, absolute, span } => (name, *absolute, *span),
        };
        let mut candidates = Vec::new();
        if absolute {
            candidates.push(name.clone());
        } else {
            let mut current = scope;
            loop {
                candidates.push(qualify(current, name));
                if current.is_empty() {
                    break;
                }
                current = match current.rfind('.') {
                    Some(dot) => &current[..dot],
                    None => "",
                };
            }
        }

        let table = self.table;
        let mut hidden = None;
        for candidate in candidates {
            let Some(symbol) = table.get(&candidate) else {
                continue;
            };
            let visible = if symbol.file == self.index {
                true
            } else if let Some(&position) = self.visible.get(&symbol.file) {
                self.used_imports[position] = true;
                true
            } else {
                false
            };
            if visible {
                return match symbol.kind {
                    SymbolKind::Message => FieldType::Message(candidate),
                    SymbolKind::Enum => FieldType::Enum(candidate),
                };
            }
            hidden.get_or_insert(symbol.file);
        }
        match hidden {
            Some(file) => self.sink.emit(errors::error_type_not_imported(
                name,
                &self.files[file].path,
                span,
            )),
            None => self.sink.emit(errors::error_unknown_type(name, span)),
        }
        FieldType::Message(name.clone())
    }
}
