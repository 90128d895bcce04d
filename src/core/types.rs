use super::{Value, ValueType};

pub type Row = Vec<Value>;

/// Result metadata for one column position.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    /// Raw column name as known to the database.
    pub name: String,
    /// `AS` label; blank when the query did not alias the column.
    pub label: String,
    /// Declared storage type, when the driver reports one.
    pub declared_type: Option<ValueType>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: String::new(),
            declared_type: None,
        }
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn declared(mut self, ty: ValueType) -> Self {
        self.declared_type = Some(ty);
        self
    }

    /// The label, falling back to the raw name when the label is blank.
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_label() {
        let col = ColumnMeta::new("city").labeled("address.city");
        assert_eq!(col.display_name(), "address.city");
    }

    #[test]
    fn test_blank_label_falls_back_to_name() {
        let col = ColumnMeta::new("user_name").labeled("   ");
        assert_eq!(col.display_name(), "user_name");
    }
}
