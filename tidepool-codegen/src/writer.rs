//! Rust source emission

use crate::config::{GenerateOptions, Generator};
use crate::error::{CodegenError, Result};
use crate::generator::SourceGenerator;
use crate::naming::{ident, module_file_stem, pascal_ident, snake_ident, to_pascal_case};
use crate::schema::{SchemaInfo, TableInfo, TableKind};
use crate::type_mapping::field_type;
use proc_macro2::TokenStream;
use quote::quote;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use syn::{Ident, Type};

const GENERATED_MARKER: &str = "// @generated by tidepool-codegen. Do not edit by hand.";

/// Writes one module per table plus a `mod.rs`
#[derive(Debug, Clone, Copy, Default)]
pub struct RustGenerator;

impl RustGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Source of a single table module
    pub fn generate_table_code(&self, table: &TableInfo, options: &GenerateOptions) -> Result<String> {
        let tokens = self.table_tokens(table, options)?;
        let header = format!(
            "{}\n//! Bindings for {} `{}`.\n\n",
            GENERATED_MARKER,
            match table.kind {
                TableKind::Table => "table",
                TableKind::View => "view",
            },
            table.qualified_name()
        );
        Ok(header + &format_code(&tokens.to_string()))
    }

    /// Source of the `mod.rs` declaring every table module
    ///
    /// `modules` pairs each file stem with the record type it exports.
    pub fn generate_mod_code(&self, schema: &SchemaInfo, module_name: &str, modules: &[(String, String)]) -> String {
        let mut exported = HashSet::new();
        let items = modules.iter().map(|(stem, record)| {
            let module = ident(stem);
            let record_ident = ident(record);
            if exported.insert(record.clone()) {
                quote! {
                    pub mod #module;
                    pub use #module::#record_ident;
                }
            } else {
                quote! { pub mod #module; }
            }
        });
        let tokens = quote! { #(#items)* };

        let header = format!(
            "{}\n//! `{}`: tables of schema `{}`.\n\n",
            GENERATED_MARKER, module_name, schema.name
        );
        header + &format_code(&tokens.to_string())
    }

    fn table_tokens(&self, table: &TableInfo, options: &GenerateOptions) -> Result<TokenStream> {
        let schema_name = table.schema.as_str();
        let table_name = table.name.as_str();

        let record_ident = ident(&record_name(&table.name));

        let fields = unique_idents(table.columns.iter().map(|c| snake_ident(&c.name)));
        let variants = unique_idents(table.columns.iter().map(|c| pascal_ident(&c.name)));
        let column_names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();

        let types = table
            .columns
            .iter()
            .map(|c| {
                let ty = field_type(&c.udt_name, c.nullable);
                syn::parse_str::<Type>(&ty)
                    .map_err(|e| CodegenError::Generation(format!("invalid type '{}' for {}: {}", ty, c.name, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let field_defs = table.columns.iter().zip(&fields).zip(&types).map(|((column, field), ty)| {
            let doc = column.comment.as_deref().map(|c| {
                let text = format!(" {}", c);
                quote! { #[doc = #text] }
            });
            let rename = (options.serde && field.to_string().trim_start_matches("r#") != column.name).then(|| {
                let name = column.name.as_str();
                quote! { #[serde(rename = #name)] }
            });
            quote! {
                #doc
                #rename
                pub #field: #ty,
            }
        });

        let derives = if options.serde {
            quote! { #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)] }
        } else {
            quote! { #[derive(Debug, Clone, PartialEq)] }
        };
        let record_doc = format!(
            " {}",
            table
                .comment
                .clone()
                .unwrap_or_else(|| format!("Row of `{}`", table.qualified_name()))
        );

        let primary_key_variants: Vec<&Ident> = table
            .columns
            .iter()
            .zip(&variants)
            .filter(|(column, _)| table.is_primary_key(&column.name))
            .map(|(_, variant)| variant)
            .collect();

        let from_row = options.from_row.then(|| {
            quote! {
                impl #record_ident {
                    /// Build a record from a row selecting every column by name
                    pub fn from_row(row: &may_postgres::Row) -> Result<Self, may_postgres::Error> {
                        Ok(Self {
                            #( #fields: row.try_get(#column_names)?, )*
                        })
                    }
                }
            }
        });

        Ok(quote! {
            pub const SCHEMA_NAME: &str = #schema_name;
            pub const TABLE_NAME: &str = #table_name;

            #[doc = #record_doc]
            #derives
            pub struct #record_ident {
                #(#field_defs)*
            }

            /// Columns in ordinal order
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub enum Column {
                #(#variants,)*
            }

            impl Column {
                pub const ALL: &'static [Column] = &[#(Column::#variants,)*];

                /// Column name as stored in the database
                pub fn as_str(&self) -> &'static str {
                    match *self {
                        #(Column::#variants => #column_names,)*
                    }
                }
            }

            /// Primary key columns in key order
            pub const PRIMARY_KEY: &[Column] = &[#(Column::#primary_key_variants,)*];

            #from_row
        })
    }

    fn prepare_output_dir(&self, dir: &Path, clean: bool) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| CodegenError::io(dir, e))?;
        if !clean {
            return Ok(());
        }
        let entries = fs::read_dir(dir).map_err(|e| CodegenError::io(dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| CodegenError::io(dir, e))?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "rs") {
                log::debug!("Removing stale {}", path.display());
                fs::remove_file(&path).map_err(|e| CodegenError::io(&path, e))?;
            }
        }
        Ok(())
    }
}

impl SourceGenerator for RustGenerator {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn generate(&self, schema: &SchemaInfo, generator: &Generator, output_dir: &Path) -> Result<Vec<PathBuf>> {
        self.prepare_output_dir(output_dir, generator.target.clean)?;

        let mut written = Vec::with_capacity(schema.tables.len() + 1);
        let mut modules: Vec<(String, String)> = Vec::with_capacity(schema.tables.len());
        let mut stems = HashSet::new();

        for table in &schema.tables {
            let mut stem = module_file_stem(&table.name);
            if stem == "mod" || !stems.insert(stem.clone()) {
                stem = format!("{}_{}", stem, modules.len());
                stems.insert(stem.clone());
            }

            let code = self.generate_table_code(table, &generator.generate)?;
            let path = output_dir.join(format!("{}.rs", stem));
            fs::write(&path, code).map_err(|e| CodegenError::io(&path, e))?;
            log::debug!("Generated {}", path.display());

            modules.push((stem, record_name(&table.name)));
            written.push(path);
        }

        let mod_path = output_dir.join("mod.rs");
        let mod_code = self.generate_mod_code(schema, &generator.target.module_name, &modules);
        fs::write(&mod_path, mod_code).map_err(|e| CodegenError::io(&mod_path, e))?;
        written.push(mod_path);

        Ok(written)
    }
}

/// Record type name for a table; `Column` is taken by the column enum
pub fn record_name(table: &str) -> String {
    let name = to_pascal_case(table);
    if name == "Column" {
        "ColumnRecord".to_string()
    } else {
        name
    }
}

/// Disambiguate identifiers that collide after case conversion
fn unique_idents(idents: impl Iterator<Item = Ident>) -> Vec<Ident> {
    let mut seen = HashSet::new();
    idents
        .enumerate()
        .map(|(i, ident)| {
            let name = ident.to_string();
            if seen.insert(name.clone()) {
                ident
            } else {
                let renamed = format!("{}_{}", name.trim_start_matches("r#"), i + 1);
                seen.insert(renamed.clone());
                crate::naming::ident(&renamed)
            }
        })
        .collect()
}

/// Format Rust code using rustfmt, returning it unformatted when rustfmt is unavailable
fn format_code(code: &str) -> String {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let child = Command::new("rustfmt")
        .args(["--edition", "2021", "--emit", "stdout"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            log::debug!("rustfmt not available ({}), writing unformatted output", e);
            return code.to_string();
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(code.as_bytes()).is_err() {
            return code.to_string();
        }
    }

    match child.wait_with_output() {
        Ok(output) if output.status.success() => match String::from_utf8(output.stdout) {
            Ok(formatted) => formatted,
            Err(_) => code.to_string(),
        },
        _ => {
            log::debug!("rustfmt failed, writing unformatted output");
            code.to_string()
        }
    }
}
