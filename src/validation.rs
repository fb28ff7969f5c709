use std::fs::File;
use std::io::Write;
use std::path::Path;

use regex::Regex;
use url::Url;

use crate::error::Result;
use crate::rule::ColumnRule;
use crate::rule_type::RuleType;

// Stop appending to the error log once a counter passes this; counting
// continues regardless.
const MAX_LOGGED_ERRORS: usize = 5000;

const PROTOCOL_PATTERN: &str = "^[a-zA-Z][a-zA-Z0-9+.-]*://";

/// Applies per-column [ColumnRule]s to rows and keeps failure counters.
///
/// A row fails when any validated, non-empty field fails its rule. Failures
/// are optionally appended to a CSV error log with a
/// `Error Message,Row,Column` header, identifying the column by its name when
/// the rule provides one and by its 1-based index otherwise.
pub struct Validator {
    rules: Vec<ColumnRule>,
    protocol: Regex,
    error_log: Option<File>,
    rows_seen: usize,
    failed_url_error_count: usize,
    failed_protocol_error_count: usize,
    first_error: Option<(usize, RuleType)>,
}

impl Validator {
    pub fn new(rules: Vec<ColumnRule>, error_log_path: Option<&Path>) -> Result<Validator> {
        let error_log = match error_log_path {
            Some(path) => {
                let mut file = File::create(path)?;
                // UTF-8 BOM so spreadsheet tools open the log correctly
                file.write_all(b"\xEF\xBB\xBF")?;
                writeln!(file, "Error Message,Row,Column")?;
                Some(file)
            }
            None => None,
        };

        Ok(Validator {
            rules,
            protocol: Regex::new(PROTOCOL_PATTERN).unwrap(),
            error_log,
            rows_seen: 0,
            failed_url_error_count: 0,
            failed_protocol_error_count: 0,
            first_error: None,
        })
    }

    /// Validate one row. Returns true when every validated field passes.
    /// Counters and the error log are updated for every failing field.
    pub fn validate_row(&mut self, row: &[String]) -> bool {
        let mut failed_url = false;
        let mut failed_protocol = false;
        let mut errors_to_log: Vec<(RuleType, usize, String)> = Vec::new();

        for (col_idx, rule) in self.rules.iter().enumerate() {
            let field = match row.get(col_idx) {
                Some(field) => field,
                None => break,
            };
            if field.is_empty() {
                continue;
            }

            match rule.rule_type() {
                RuleType::None => continue,
                RuleType::Url => {
                    if !has_valid_domain(field) {
                        failed_url = true;
                        let message = if rule.name().is_empty() {
                            format!("{} does not include a valid domain", field)
                        } else {
                            format!("{} does not include a valid domain", rule.name())
                        };
                        errors_to_log.push((RuleType::Url, col_idx, message));
                    }
                }
                RuleType::Protocol => {
                    if !self.protocol.is_match(field) {
                        failed_protocol = true;
                        let message = format!(
                            "{} does not include a valid link protocol",
                            column_identifier(rule, col_idx)
                        );
                        errors_to_log.push((RuleType::Protocol, col_idx, message));
                    }
                }
            }
        }

        for (rule_type, col_idx, message) in errors_to_log {
            self.log_error(rule_type, col_idx, &message);
        }

        if failed_url {
            self.failed_url_error_count += 1;
        }
        if failed_protocol {
            self.failed_protocol_error_count += 1;
        }
        self.rows_seen += 1;

        !failed_url && !failed_protocol
    }

    fn log_error(&mut self, rule_type: RuleType, col_idx: usize, message: &str) {
        if self.first_error.is_none() {
            self.first_error = Some((self.rows_seen, rule_type));
        }

        if self.failed_url_error_count > MAX_LOGGED_ERRORS
            || self.failed_protocol_error_count > MAX_LOGGED_ERRORS
        {
            return;
        }

        if let Some(file) = &mut self.error_log {
            let column = column_identifier(&self.rules[col_idx], col_idx);
            if let Err(e) = writeln!(file, "{},{},{}", message, self.rows_seen + 1, column) {
                log::warn!("failed to append to validation error log: {}", e);
            }
        }
    }

    pub fn rows_seen(&self) -> usize {
        self.rows_seen
    }

    pub fn failed_url_error_count(&self) -> usize {
        self.failed_url_error_count
    }

    pub fn failed_protocol_error_count(&self) -> usize {
        self.failed_protocol_error_count
    }

    pub fn error_count(&self) -> usize {
        self.failed_url_error_count + self.failed_protocol_error_count
    }

    /// 1-based ordinal of the first row that failed validation.
    pub fn first_error_row(&self) -> Option<usize> {
        self.first_error.as_ref().map(|(row, _)| row + 1)
    }

    pub fn first_error_message(&self) -> Option<String> {
        match &self.first_error {
            Some((row, RuleType::Url)) => Some(format!("Invalid URL: {}", row + 1)),
            Some((row, RuleType::Protocol)) => Some(format!("Invalid link: {}", row + 1)),
            _ => None,
        }
    }

    pub(crate) fn flush_log(&mut self) -> Result<()> {
        if let Some(file) = &mut self.error_log {
            file.flush()?;
        }
        Ok(())
    }
}

fn column_identifier(rule: &ColumnRule, col_idx: usize) -> String {
    if rule.name().is_empty() {
        (col_idx + 1).to_string()
    } else {
        rule.name().clone()
    }
}

// An absolute URL whose host carries at least one dot. Bare words like
// "test.com" fail Url::parse because they are relative references.
fn has_valid_domain(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => url.host_str().map_or(false, |host| host.contains('.')),
        Err(_) => false,
    }
}
