//! Source generators

use crate::config::Generator;
use crate::database::normalize_name;
use crate::error::{CodegenError, Result};
use crate::schema::SchemaInfo;
use crate::writer::RustGenerator;
use std::path::{Path, PathBuf};

/// Turns an introspected schema into source files
pub trait SourceGenerator {
    /// Short name used in configuration, e.g. `rust`
    fn name(&self) -> &'static str;

    /// Write sources for `schema` into `output_dir`, returning the files written
    fn generate(&self, schema: &SchemaInfo, generator: &Generator, output_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Resolve a generator by name
///
/// Matching ignores case and accepts the short name, the type name and the
/// crate-qualified type name.
pub fn generator_for(name: &str) -> Result<Box<dyn SourceGenerator>> {
    match normalize_name(name).as_str() {
        "rust" | "rustgenerator" | "tidepool_codegen::rustgenerator" | "tidepool_codegen::writer::rustgenerator" => {
            Ok(Box::new(RustGenerator::new()))
        }
        _ => Err(CodegenError::UnknownGenerator(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_names() {
        for name in ["rust", "RUST", "RustGenerator", "tidepool_codegen::RustGenerator"] {
            assert_eq!(generator_for(name).unwrap().name(), "rust");
        }
        assert!(matches!(generator_for("java"), Err(CodegenError::UnknownGenerator(_))));
    }
}
