use csv_row_sort::dedupe::dedupe_file;
use csv_row_sort::error::SortError;

mod common;

#[test]
fn test_dedupe_keeps_newest_per_key() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let output_path = common::temp_file_name("./target/results/");
    common::write_file(
        &input_path,
        "id,value\n\
         a,1\n\
         b,2\n\
         a,3\n\
         b,4\n\
         a,5\n",
    )?;

    let stats = dedupe_file(&input_path, &output_path, vec![0], 1, 100)?;
    assert_eq!(stats.rows_read, 5);
    assert_eq!(stats.rows_written, 2);

    let lines = common::read_lines(&output_path)?;
    assert_eq!(lines[0], "id,value");
    let mut survivors = lines[1..].to_vec();
    survivors.sort();
    assert_eq!(survivors, vec!["a,5", "b,4"]);
    std::fs::remove_file(input_path)?;
    std::fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_dedupe_cap_larger_than_duplicates() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let output_path = common::temp_file_name("./target/results/");
    common::write_file(&input_path, "id\nx\nx\ny\n")?;

    let stats = dedupe_file(&input_path, &output_path, vec![0], 5, 100)?;
    assert_eq!(stats.rows_written, 3);
    std::fs::remove_file(input_path)?;
    std::fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_dedupe_empty_input() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let output_path = common::temp_file_name("./target/results/");
    common::write_file(&input_path, "")?;

    let result = dedupe_file(&input_path, &output_path, vec![0], 200, 100);
    assert!(matches!(result, Err(SortError::NoHeadersFound(_))));
    std::fs::remove_file(input_path)?;
    Ok(())
}

#[test]
fn test_dedupe_header_only_input() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::temp_file_name("./target/results/");
    let output_path = common::temp_file_name("./target/results/");
    common::write_file(&input_path, "id,value\n")?;

    let stats = dedupe_file(&input_path, &output_path, vec![0], 200, 100)?;
    assert_eq!(stats.rows_read, 0);
    assert_eq!(stats.rows_written, 0);

    let lines = common::read_lines(&output_path)?;
    assert_eq!(lines, vec!["id,value"]);
    std::fs::remove_file(input_path)?;
    std::fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_dedupe_missing_input() {
    common::setup();
    let output_path = common::temp_file_name("./target/results/");
    let result = dedupe_file(
        std::path::Path::new("./target/results/missing.csv"),
        &output_path,
        vec![0],
        200,
        100,
    );
    assert!(matches!(result, Err(SortError::Io(_))));
}
