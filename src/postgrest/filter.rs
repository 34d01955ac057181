//! Filter operations for PostgrestClient

/// Operator for filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,

    /// Like (case insensitive)
    ILike,
}

impl FilterOperator {
    /// Convert the operator to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::ILike => "ilike",
        }
    }

    /// Render the query-string value for a column filter
    pub fn render(&self, value: &str) -> String {
        format!("{}.{}", self.as_str(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_operator_prefix() {
        assert_eq!(FilterOperator::Eq.render("abc"), "eq.abc");
        assert_eq!(FilterOperator::ILike.render("johndoe"), "ilike.johndoe");
    }
}
