use super::engine::{BundleEngine, EngineChunk, EngineInput};
use crate::analyze::parse_program;
use crate::exports::{read_package_json, resolve_export, resolve_file};
use crate::vfs::{VirtualFs, join, parent};
use crate::{PkgscopeError, Result};
use indexmap::IndexSet;
use oxc::allocator::Allocator;
use oxc::ast::Visit;
use oxc::ast::ast::{
    Argument, CallExpression, ExportAllDeclaration, ExportNamedDeclaration, Expression,
    ImportDeclaration, ImportExpression,
};
use oxc::ast::visit::walk;
use oxc::codegen::{Codegen, CodegenOptions};
use std::collections::VecDeque;
use tracing::{debug, trace};

pub const OUTPUT_FILE: &str = "index.js";

const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "crypto", "events", "fs", "http", "https", "module",
    "net", "os", "path", "process", "querystring", "readline", "stream", "string_decoder",
    "timers", "tty", "url", "util", "vm", "worker_threads", "zlib",
];

/// Follows static imports, re-exports, `require()` and `import()` from the
/// entry and emits every reachable module, dependencies first, as a single
/// chunk. Nothing is tree-shaken.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConcatEngine;

impl BundleEngine for ConcatEngine {
    fn bundle(&self, input: EngineInput) -> Result<Vec<EngineChunk>> {
        let mut seen = IndexSet::new();
        let mut queue = VecDeque::new();
        let mut printed = Vec::new();

        seen.insert(input.input.clone());
        queue.push_back(input.input.clone());

        while let Some(id) = queue.pop_front() {
            let source = input
                .plugin
                .load(&id)
                .or_else(|| input.fs.read_to_string(&id))
                .ok_or_else(|| PkgscopeError::bundle(format!("cannot load module {}", display_id(&id))))?;

            let (code, specifiers) = if id.ends_with(".json") {
                (print_json(&id, &source)?, Vec::new())
            } else {
                print_module(&id, &source, input.minify)?
            };

            for specifier in specifiers {
                if input.is_external(&specifier) || is_builtin(&specifier) {
                    trace!("{specifier} left external");
                    continue;
                }

                let resolved = input
                    .plugin
                    .resolve_id(&specifier, Some(&id))
                    .or_else(|| resolve_module(&input.fs, &specifier, &id))
                    .ok_or_else(|| {
                        PkgscopeError::bundle(format!(
                            "could not resolve {specifier:?} from {}",
                            display_id(&id)
                        ))
                    })?;

                if seen.insert(resolved.clone()) {
                    queue.push_back(resolved);
                }
            }

            printed.push((id, code));
        }

        let mut output = String::new();
        for (id, code) in printed.iter().rev() {
            if !input.minify {
                output.push_str(&format!("// {}\n", display_id(id)));
            }
            output.push_str(code);
            if !code.ends_with('\n') {
                output.push('\n');
            }
        }

        debug!(modules = printed.len(), bytes = output.len(), "concatenated bundle");

        Ok(vec![EngineChunk {
            file_name: OUTPUT_FILE.to_string(),
            code: output,
            is_entry: true,
        }])
    }
}

/// Node module resolution over the virtual `node_modules` tree.
pub fn resolve_module(fs: &VirtualFs, specifier: &str, importer: &str) -> Option<String> {
    if specifier.starts_with("./") || specifier.starts_with("../") || matches!(specifier, "." | "..") {
        return resolve_file(fs, &join(&parent(importer), specifier));
    }
    if specifier.starts_with('/') {
        return resolve_file(fs, specifier);
    }

    let (name, subpath) = split_bare_specifier(specifier)?;
    let mut dir = parent(importer);

    loop {
        let package_dir = join(&dir, &format!("node_modules/{name}"));
        if let Some(package_json) = read_package_json(fs, &package_dir) {
            let target = resolve_export(&package_json, fs, &package_dir, &subpath)?;
            return resolve_file(fs, &join(&package_dir, &target));
        }

        if dir == "/" {
            return None;
        }
        dir = parent(&dir);
    }
}

fn split_bare_specifier(specifier: &str) -> Option<(&str, String)> {
    let name_len = if specifier.starts_with('@') {
        let scope_end = specifier.find('/')?;
        specifier[scope_end + 1..]
            .find('/')
            .map_or(specifier.len(), |idx| scope_end + 1 + idx)
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };

    let (name, rest) = specifier.split_at(name_len);
    if name.is_empty() || name.ends_with('/') {
        return None;
    }

    Some((name, format!(".{rest}")))
}

fn is_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let base = specifier.split('/').next().unwrap_or(specifier);
    NODE_BUILTINS.contains(&base)
}

fn display_id(id: &str) -> &str {
    id.trim_start_matches('\0')
}

fn print_json(id: &str, source: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(source)
        .map_err(|err| PkgscopeError::bundle(format!("invalid JSON in {id}: {err}")))?;
    Ok(format!("export default {value};"))
}

fn print_module(id: &str, source: &str, minify: bool) -> Result<(String, Vec<String>)> {
    let allocator = Allocator::default();
    let program = parse_program(&allocator, source, display_id(id))?;

    let mut collector = SpecifierCollector::default();
    collector.visit_program(&program);

    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify,
            ..CodegenOptions::default()
        })
        .build(&program)
        .code;

    Ok((code, collector.specifiers.into_iter().collect()))
}

#[derive(Default)]
struct SpecifierCollector {
    specifiers: IndexSet<String>,
}

impl<'a> Visit<'a> for SpecifierCollector {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        self.specifiers.insert(it.source.value.to_string());
        walk::walk_import_declaration(self, it);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        self.specifiers.insert(it.source.value.to_string());
        walk::walk_export_all_declaration(self, it);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &it.source {
            self.specifiers.insert(source.value.to_string());
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &it.source {
            self.specifiers.insert(literal.value.to_string());
        }
        walk::walk_import_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &it.callee
            && callee.name.as_str() == "require"
            && it.arguments.len() == 1
            && let Some(Argument::StringLiteral(literal)) = it.arguments.first()
        {
            self.specifiers.insert(literal.value.to_string());
        }
        walk::walk_call_expression(self, it);
    }
}
