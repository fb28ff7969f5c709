use csv_row_sort::rule::ColumnRule;
use csv_row_sort::rule_type::RuleType;
use csv_row_sort::sorter::Sorter;
use csv_row_sort::validation::Validator;

mod common;

#[test]
fn test_url_validation_rejects_bare_domains() -> Result<(), anyhow::Error> {
    common::setup();
    let mut sorter = Sorter::new("v", "key", vec![0], None, 100);
    sorter.enable_validation(vec![ColumnRule::new(RuleType::Url)], None)?;

    assert!(sorter.add_row(common::row(&["https://example.com"]))?);
    assert!(!sorter.add_row(common::row(&["test.com"]))?);

    let stats = sorter.sort()?;
    assert_eq!(stats.failed_url_error_count, 1);
    assert_eq!(stats.total_rows_processed, 2);
    assert_eq!(stats.total_rows, 1);
    Ok(())
}

#[test]
fn test_url_requires_dotted_host() -> Result<(), anyhow::Error> {
    let mut validator = Validator::new(vec![ColumnRule::new(RuleType::Url)], None)?;
    assert!(validator.validate_row(&common::row(&["https://example.com/path?q=1"])));
    assert!(!validator.validate_row(&common::row(&["https://localhost"])));
    assert!(!validator.validate_row(&common::row(&["not a url"])));
    assert_eq!(validator.failed_url_error_count(), 2);
    Ok(())
}

#[test]
fn test_protocol_rule() -> Result<(), anyhow::Error> {
    let mut validator = Validator::new(vec![ColumnRule::new(RuleType::Protocol)], None)?;
    assert!(validator.validate_row(&common::row(&["https://anything"])));
    assert!(validator.validate_row(&common::row(&["custom+scheme-1://x"])));
    assert!(!validator.validate_row(&common::row(&["example.com/path"])));
    assert!(!validator.validate_row(&common::row(&["://missing-scheme"])));
    assert_eq!(validator.failed_protocol_error_count(), 2);
    Ok(())
}

#[test]
fn test_empty_fields_pass_every_rule() -> Result<(), anyhow::Error> {
    let rules = vec![
        ColumnRule::new(RuleType::Url),
        ColumnRule::new(RuleType::Protocol),
    ];
    let mut validator = Validator::new(rules, None)?;
    assert!(validator.validate_row(&common::row(&["", ""])));
    assert_eq!(validator.error_count(), 0);
    Ok(())
}

#[test]
fn test_short_rows_and_short_rule_lists() -> Result<(), anyhow::Error> {
    let rules = vec![
        ColumnRule::new(RuleType::None),
        ColumnRule::new(RuleType::Url),
    ];
    let mut validator = Validator::new(rules, None)?;
    // row shorter than the rule list: the url rule never sees a field
    assert!(validator.validate_row(&common::row(&["anything"])));
    // row longer than the rule list: the excess column is unvalidated
    assert!(validator.validate_row(&common::row(&[
        "x",
        "https://example.com",
        "not a url"
    ])));
    Ok(())
}

#[test]
fn test_error_log_format() -> Result<(), anyhow::Error> {
    common::setup();
    let log_path = common::temp_file_name("./target/results/");
    let rules = vec![
        ColumnRule::new(RuleType::Url),
        ColumnRule::new(RuleType::Protocol).with_str_name("link"),
    ];
    let mut sorter = Sorter::new("v", "key", vec![0], None, 100);
    sorter.enable_validation(rules, Some(&log_path))?;

    sorter.add_row(common::row(&["https://example.com", "https://ok"]))?;
    sorter.add_row(common::row(&["test.com", "no-protocol"]))?;
    sorter.sort()?;

    let content = std::fs::read(&log_path)?;
    assert_eq!(&content[..3], b"\xEF\xBB\xBF");
    let text = String::from_utf8(content[3..].to_vec())?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Error Message,Row,Column");
    assert_eq!(lines[1], "test.com does not include a valid domain,2,1");
    assert_eq!(lines[2], "link does not include a valid link protocol,2,link");
    std::fs::remove_file(log_path)?;
    Ok(())
}

#[test]
fn test_named_url_rule_logs_the_column_name() -> Result<(), anyhow::Error> {
    common::setup();
    let log_path = common::temp_file_name("./target/results/");
    let rules = vec![ColumnRule::new(RuleType::Url).with_str_name("image_url")];
    let mut validator = Validator::new(rules, Some(&log_path))?;
    validator.validate_row(&common::row(&["nope"]));
    drop(validator);

    let content = std::fs::read(&log_path)?;
    let text = String::from_utf8(content[3..].to_vec())?;
    assert!(text
        .lines()
        .any(|line| line == "image_url does not include a valid domain,1,image_url"));
    std::fs::remove_file(log_path)?;
    Ok(())
}

#[test]
fn test_first_error_reporting() -> Result<(), anyhow::Error> {
    let mut validator = Validator::new(vec![ColumnRule::new(RuleType::Url)], None)?;
    assert!(validator.first_error_row().is_none());
    validator.validate_row(&common::row(&["https://example.com"]));
    validator.validate_row(&common::row(&["bad"]));
    validator.validate_row(&common::row(&["worse"]));
    assert_eq!(validator.first_error_row(), Some(2));
    assert_eq!(validator.first_error_message().as_deref(), Some("Invalid URL: 2"));
    Ok(())
}

#[test]
fn test_rejected_rows_do_not_enter_the_sort() -> Result<(), anyhow::Error> {
    common::setup();
    let mut sorter = Sorter::new("v", "key", vec![0], None, 100);
    sorter.enable_validation(vec![ColumnRule::new(RuleType::Url)], None)?;
    sorter.add_row(common::row(&["https://a.example.com"]))?;
    sorter.add_row(common::row(&["rejected"]))?;
    sorter.add_row(common::row(&["https://b.example.com"]))?;
    sorter.sort()?;

    let batches = common::collect_batches(&mut sorter, 10)?;
    let values: Vec<&str> = batches
        .iter()
        .flatten()
        .map(|(_, fields)| fields[0].as_str())
        .collect();
    assert_eq!(values.len(), 2);
    assert!(!values.contains(&"rejected"));
    Ok(())
}
