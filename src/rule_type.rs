/// Validation applied to one column. [RuleType::None] always passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleType {
    None,
    Url,
    Protocol,
}
