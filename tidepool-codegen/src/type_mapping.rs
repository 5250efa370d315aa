//! PostgreSQL to Rust type mapping

/// Rust type path for a PostgreSQL type name (`pg_type.typname`)
///
/// Array types (`_int4`, ...) map to `Vec` of the element type. Unknown types
/// map to `String`.
pub fn rust_type(udt_name: &str) -> String {
    if let Some(element) = udt_name.strip_prefix('_') {
        return format!("Vec<{}>", rust_type(element));
    }

    match udt_name {
        "char" => "i8",
        "int2" | "smallserial" => "i16",
        "int4" | "serial" => "i32",
        "int8" | "bigserial" => "i64",
        "float4" => "f32",
        "float8" => "f64",
        "bool" => "bool",
        "text" | "varchar" | "bpchar" | "name" | "citext" => "String",
        "bytea" => "Vec<u8>",
        "uuid" => "uuid::Uuid",
        "date" => "chrono::NaiveDate",
        "time" => "chrono::NaiveTime",
        "timestamp" => "chrono::NaiveDateTime",
        "timestamptz" => "chrono::DateTime<chrono::Utc>",
        "json" | "jsonb" => "serde_json::Value",
        "numeric" => "rust_decimal::Decimal",
        _ => "String",
    }
    .to_string()
}

/// Field type, wrapped in `Option` when the column is nullable
pub fn field_type(udt_name: &str, nullable: bool) -> String {
    let base = rust_type(udt_name);
    if nullable {
        format!("Option<{}>", base)
    } else {
        base
    }
}
