use crate::{PkgscopeError, Result};
use indexmap::IndexSet;
use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Argument, AssignmentTarget, Declaration, Expression, ModuleExportName, ObjectPropertyKind,
    Program, PropertyKey, Statement,
};
use oxc::parser::Parser;
use oxc::span::SourceType;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Esm,
    Cjs,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInfo {
    pub kind: ModuleKind,
    pub has_default_export: bool,
    /// Statically known export names, in source order, without `default`.
    pub named_exports: Vec<String>,
    /// `export * from` re-exports whose names are only known after linking.
    pub has_star_reexport: bool,
}

impl ModuleInfo {
    pub fn is_cjs(&self) -> bool {
        self.kind == ModuleKind::Cjs
    }
}

/// Classifies `source` as ESM, CommonJS or side-effect only and collects the
/// export names visible without evaluating it.
pub fn analyze_module(source: &str, file_name: &str) -> Result<ModuleInfo> {
    let allocator = Allocator::default();
    let program = parse_program(&allocator, source, file_name)?;
    Ok(analyze_program(&program))
}

/// Parses as a module first and retries as a script, since CommonJS sources
/// can use sloppy-mode syntax that module goal rejects.
pub fn parse_program<'a>(allocator: &'a Allocator, source: &'a str, file_name: &str) -> Result<Program<'a>> {
    let module = Parser::new(allocator, source, SourceType::mjs()).parse();
    if !module.panicked && module.errors.is_empty() {
        return Ok(module.program);
    }

    let script = Parser::new(allocator, source, SourceType::cjs()).parse();
    if !script.panicked && script.errors.is_empty() {
        return Ok(script.program);
    }

    let reason = module
        .errors
        .first()
        .map(|error| error.to_string())
        .unwrap_or_else(|| "unrecoverable syntax error".to_string());
    Err(PkgscopeError::bundle(format!("failed to parse {file_name}: {reason}")))
}

pub fn analyze_program(program: &Program<'_>) -> ModuleInfo {
    let mut scan = ExportScan::default();

    for statement in &program.body {
        scan.esm_statement(statement);
    }

    if scan.esm {
        return scan.finish(ModuleKind::Esm);
    }

    for statement in &program.body {
        scan.cjs_statement(statement);
    }

    if scan.cjs {
        scan.has_default = true;
        scan.finish(ModuleKind::Cjs)
    } else {
        scan.finish(ModuleKind::Unknown)
    }
}

#[derive(Default)]
struct ExportScan {
    esm: bool,
    cjs: bool,
    has_default: bool,
    has_star: bool,
    named: IndexSet<String>,
}

impl ExportScan {
    fn finish(self, kind: ModuleKind) -> ModuleInfo {
        ModuleInfo {
            kind,
            has_default_export: self.has_default,
            named_exports: self.named.into_iter().collect(),
            has_star_reexport: self.has_star,
        }
    }

    fn export_name(&mut self, name: &str) {
        match name {
            "default" => self.has_default = true,
            "__esModule" => {}
            other => {
                self.named.insert(other.to_string());
            }
        }
    }

    fn esm_statement(&mut self, statement: &Statement<'_>) {
        match statement {
            Statement::ImportDeclaration(_) => self.esm = true,
            Statement::ExportDefaultDeclaration(_) => {
                self.esm = true;
                self.has_default = true;
            }
            Statement::ExportAllDeclaration(decl) => {
                self.esm = true;
                match &decl.exported {
                    Some(name) => self.export_name(module_export_name(name)),
                    None => self.has_star = true,
                }
            }
            Statement::ExportNamedDeclaration(decl) => {
                self.esm = true;
                for specifier in &decl.specifiers {
                    self.export_name(module_export_name(&specifier.exported));
                }
                if let Some(declaration) = &decl.declaration {
                    for name in declared_names(declaration) {
                        self.export_name(&name);
                    }
                }
            }
            Statement::ExpressionStatement(stmt) => {
                if mentions_import_meta(&stmt.expression) {
                    self.esm = true;
                }
            }
            // TypeScript-only module syntax; published JavaScript never carries it.
            Statement::TSExportAssignment(_) | Statement::TSNamespaceExportDeclaration(_) => {}
            // Declarations and control flow cannot mark a module as ESM at the top level.
            _ => {}
        }
    }

    fn cjs_statement(&mut self, statement: &Statement<'_>) {
        match statement {
            Statement::ExpressionStatement(stmt) => self.cjs_expression(&stmt.expression),
            Statement::IfStatement(stmt) => {
                self.cjs_statement(&stmt.consequent);
                if let Some(alternate) = &stmt.alternate {
                    self.cjs_statement(alternate);
                }
            }
            Statement::BlockStatement(block) => {
                for inner in &block.body {
                    self.cjs_statement(inner);
                }
            }
            // Exports assigned inside loops, functions or `try` are not statically visible.
            _ => {}
        }
    }

    fn cjs_expression(&mut self, expression: &Expression<'_>) {
        match expression {
            Expression::AssignmentExpression(assign) => {
                self.cjs_assignment(&assign.left, &assign.right);
                // `exports.a = exports.b = void 0`
                self.cjs_expression(&assign.right);
            }
            Expression::SequenceExpression(sequence) => {
                for inner in &sequence.expressions {
                    self.cjs_expression(inner);
                }
            }
            Expression::ParenthesizedExpression(inner) => self.cjs_expression(&inner.expression),
            Expression::CallExpression(call) => {
                if let Some(name) = define_property_export(&call.callee, &call.arguments) {
                    self.cjs = true;
                    self.export_name(&name);
                }
            }
            // Any other expression cannot assign to `exports` at statement level.
            _ => {}
        }
    }

    fn cjs_assignment(&mut self, target: &AssignmentTarget<'_>, right: &Expression<'_>) {
        let (object, property) = match target {
            AssignmentTarget::StaticMemberExpression(member) => {
                (&member.object, member.property.name.as_str())
            }
            AssignmentTarget::ComputedMemberExpression(member) => match &member.expression {
                Expression::StringLiteral(literal) => (&member.object, literal.value.as_str()),
                _ => return,
            },
            _ => return,
        };

        if is_identifier(object, "exports") || is_module_exports(object) {
            self.cjs = true;
            self.export_name(property);
        } else if is_identifier(object, "module") && property == "exports" {
            self.cjs = true;
            self.module_exports_value(right);
        }
    }

    fn module_exports_value(&mut self, right: &Expression<'_>) {
        match right {
            Expression::ObjectExpression(object) => {
                for property in &object.properties {
                    if let ObjectPropertyKind::ObjectProperty(property) = property
                        && let Some(name) = property_key_name(&property.key)
                    {
                        self.export_name(&name);
                    }
                }
            }
            Expression::ParenthesizedExpression(inner) => self.module_exports_value(&inner.expression),
            // `module.exports = require("./impl")` re-exports opaquely.
            _ => {}
        }
    }
}

fn module_export_name<'a>(name: &'a ModuleExportName<'a>) -> &'a str {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.as_str(),
        ModuleExportName::IdentifierReference(ident) => ident.name.as_str(),
        ModuleExportName::StringLiteral(literal) => literal.value.as_str(),
    }
}

fn declared_names(declaration: &Declaration<'_>) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(decl) => decl
            .declarations
            .iter()
            .flat_map(|declarator| declarator.id.get_binding_identifiers())
            .map(|ident| ident.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(function) => function
            .id
            .iter()
            .map(|ident| ident.name.to_string())
            .collect(),
        Declaration::ClassDeclaration(class) => {
            class.id.iter().map(|ident| ident.name.to_string()).collect()
        }
        Declaration::TSEnumDeclaration(decl) => vec![decl.id.name.to_string()],
        _ => Vec::new(),
    }
}

fn property_key_name(key: &PropertyKey<'_>) -> Option<String> {
    match key {
        PropertyKey::StaticIdentifier(ident) => Some(ident.name.to_string()),
        PropertyKey::StringLiteral(literal) => Some(literal.value.to_string()),
        _ => None,
    }
}

fn is_identifier(expression: &Expression<'_>, name: &str) -> bool {
    matches!(expression, Expression::Identifier(ident) if ident.name.as_str() == name)
}

fn is_module_exports(expression: &Expression<'_>) -> bool {
    match expression {
        Expression::StaticMemberExpression(member) => {
            is_identifier(&member.object, "module") && member.property.name.as_str() == "exports"
        }
        _ => false,
    }
}

/// `Object.defineProperty(exports | module.exports, "name", ...)`
fn define_property_export(callee: &Expression<'_>, arguments: &[Argument<'_>]) -> Option<String> {
    let Expression::StaticMemberExpression(member) = callee else {
        return None;
    };
    if !is_identifier(&member.object, "Object") || member.property.name.as_str() != "defineProperty" {
        return None;
    }

    let target = arguments.first()?.as_expression()?;
    if !is_identifier(target, "exports") && !is_module_exports(target) {
        return None;
    }

    match arguments.get(1)?.as_expression()? {
        Expression::StringLiteral(literal) => Some(literal.value.to_string()),
        _ => None,
    }
}

fn mentions_import_meta(expression: &Expression<'_>) -> bool {
    match expression {
        Expression::MetaProperty(meta) => {
            meta.meta.name.as_str() == "import" && meta.property.name.as_str() == "meta"
        }
        Expression::StaticMemberExpression(member) => mentions_import_meta(&member.object),
        Expression::ComputedMemberExpression(member) => {
            mentions_import_meta(&member.object) || mentions_import_meta(&member.expression)
        }
        Expression::CallExpression(call) => {
            mentions_import_meta(&call.callee)
                || call
                    .arguments
                    .iter()
                    .filter_map(Argument::as_expression)
                    .any(mentions_import_meta)
        }
        Expression::BinaryExpression(binary) => {
            mentions_import_meta(&binary.left) || mentions_import_meta(&binary.right)
        }
        Expression::LogicalExpression(logical) => {
            mentions_import_meta(&logical.left) || mentions_import_meta(&logical.right)
        }
        Expression::UnaryExpression(unary) => mentions_import_meta(&unary.argument),
        Expression::ConditionalExpression(conditional) => {
            mentions_import_meta(&conditional.test)
                || mentions_import_meta(&conditional.consequent)
                || mentions_import_meta(&conditional.alternate)
        }
        Expression::ParenthesizedExpression(inner) => mentions_import_meta(&inner.expression),
        Expression::AssignmentExpression(assign) => mentions_import_meta(&assign.right),
        Expression::SequenceExpression(sequence) => {
            sequence.expressions.iter().any(mentions_import_meta)
        }
        Expression::AwaitExpression(inner) => mentions_import_meta(&inner.argument),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(source: &str) -> ModuleInfo {
        analyze_module(source, "test.js").unwrap()
    }

    #[test]
    fn object_literal_module_exports_is_cjs() {
        let info = analyze("const a = 1, b = 2;\nmodule.exports = { a, b };");
        assert_eq!(info.kind, ModuleKind::Cjs);
        assert_eq!(info.named_exports, vec!["a", "b"]);
        assert!(info.has_default_export);
    }

    #[test]
    fn bare_import_is_esm() {
        let info = analyze("import x from 'y';");
        assert_eq!(info.kind, ModuleKind::Esm);
        assert!(info.named_exports.is_empty());
        assert!(!info.has_default_export);
    }

    #[test]
    fn collects_esm_export_names() {
        let info = analyze(
            "export const a = 1, { b, c: [d] } = obj;\n\
             export function f() {}\n\
             export class K {}\n\
             export { a as \"odd name\", f as default };\n\
             export * as ns from './ns.js';\n\
             export * from './rest.js';",
        );
        assert_eq!(info.kind, ModuleKind::Esm);
        assert_eq!(info.named_exports, vec!["a", "b", "d", "f", "K", "odd name", "ns"]);
        assert!(info.has_default_export);
        assert!(info.has_star_reexport);
    }

    #[test]
    fn import_meta_marks_esm() {
        let info = analyze("console.log(x || (0, import.meta.env));");
        assert_eq!(info.kind, ModuleKind::Esm);

        let info = analyze("foo(import.meta.url);");
        assert_eq!(info.kind, ModuleKind::Esm);

        let info = analyze("(a, !import.meta.hot) ? b() : c();");
        assert_eq!(info.kind, ModuleKind::Esm);
    }

    #[test]
    fn conditional_cjs_exports_are_found() {
        let info = analyze(
            "if (process.env.NODE_ENV === 'production') {\n\
               module.exports = require('./prod.js');\n\
             } else if (x) {\n\
               exports.dev = true;\n\
             } else exports.other = 1;",
        );
        assert_eq!(info.kind, ModuleKind::Cjs);
        assert_eq!(info.named_exports, vec!["dev", "other"]);
    }

    #[test]
    fn typescript_style_cjs_output() {
        let info = analyze(
            "\"use strict\";\n\
             Object.defineProperty(exports, \"__esModule\", { value: true });\n\
             exports.b = exports.a = void 0;\n\
             Object.defineProperty(module.exports, \"c\", { get: () => 1 });\n\
             module.exports.d = 4;\n\
             exports[\"e\"] = 5;",
        );
        assert_eq!(info.kind, ModuleKind::Cjs);
        assert_eq!(info.named_exports, vec!["b", "a", "c", "d", "e"]);
    }

    #[test]
    fn plain_scripts_are_unknown() {
        let info = analyze("window.foo = 1; with (obj) { bar(); }");
        assert_eq!(info.kind, ModuleKind::Unknown);
        assert!(info.named_exports.is_empty());
    }

    #[test]
    fn exports_hidden_in_functions_and_loops_are_ignored() {
        let info = analyze(
            "function setup() { exports.a = 1; }\nfor (const k of keys) { module.exports[k] = k; }\ntry { exports.b = 2; } catch {}",
        );
        assert_eq!(info.kind, ModuleKind::Unknown);
        assert!(info.named_exports.is_empty());
    }

    #[test]
    fn unparsable_source_is_a_bundle_error() {
        let err = analyze_module("export const = ;", "broken.js").unwrap_err();
        assert!(matches!(err, PkgscopeError::Bundle { .. }));
        assert!(err.to_string().contains("broken.js"));
    }
}
