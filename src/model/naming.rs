//! Conversions between external (column/table) names and property names.

use heck::ToSnakeCase;

/// Maps a flat or delimited external name (`user_name`, `userName`,
/// `USER_NAME`, `user-name`) onto the property naming convention.
pub fn column_to_property(column: &str) -> String {
    strip_raw(column.trim()).to_snake_case()
}

/// Default external name for a property.
pub fn property_to_column(property: &str) -> String {
    strip_raw(property).to_snake_case()
}

/// Default table name for a model type, from its (possibly path-qualified) type name.
pub fn type_to_table(type_name: &str) -> String {
    short_type_name(type_name).to_snake_case()
}

/// Last path segment of `std::any::type_name`, without generic arguments.
pub fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

fn strip_raw(name: &str) -> &str {
    name.strip_prefix("r#").unwrap_or(name)
}
