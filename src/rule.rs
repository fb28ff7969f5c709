use crate::rule_type::RuleType;

/// Defines the validation rule for one column of a row.
///
/// Rules are applied positionally: the first rule validates column 0, the
/// second column 1, and so on. A rule list shorter than the row leaves the
/// excess columns unvalidated.
///
/// # Examples
/// ```
/// // validate the second column as a URL and report failures under the
/// // column's name instead of its index
/// use csv_row_sort::rule::ColumnRule;
/// use csv_row_sort::rule_type::RuleType;
/// let rule = ColumnRule::new(RuleType::Url).with_str_name("image_url");
/// ```
#[derive(Clone, Debug)]
pub struct ColumnRule {
    name: String,
    rule_type: RuleType,
}

impl ColumnRule {
    /// Create a new [ColumnRule] with no column name.
    pub fn new(rule_type: RuleType) -> ColumnRule {
        ColumnRule {
            name: String::new(),
            rule_type,
        }
    }

    /// Get the name for this column, empty when none was provided.
    pub fn name(&self) -> &String {
        &self.name
    }

    /// Get the [RuleType] for this column.
    pub fn rule_type(&self) -> &RuleType {
        &self.rule_type
    }

    /// Specify a name for this column. The name is used in error log entries
    /// in place of the 1-based column index.
    pub fn with_name(mut self, name: String) -> ColumnRule {
        self.name = name;
        self
    }

    /// Specify a name for this column as &str
    pub fn with_str_name(mut self, name: &str) -> ColumnRule {
        self.name = name.to_string();
        self
    }
}
