use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::str::FromStr;

use data_encoding::HEXLOWER;

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();

    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_| {
            panic!("Failed to create results directory: {:?}", results_dir_path)
        });
    }
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

#[allow(dead_code)]
pub fn read_lines(path: &PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn write_file(path: &PathBuf, content: &str) -> Result<(), anyhow::Error> {
    fs::write(path, content)?;
    Ok(())
}

#[allow(dead_code)]
pub fn row(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[allow(dead_code)]
pub fn collect_batches(
    sorter: &mut csv_row_sort::sorter::Sorter,
    batch_size: usize,
) -> Result<Vec<Vec<(String, Vec<String>)>>, anyhow::Error> {
    let mut batches = Vec::new();
    sorter.each_batch(batch_size, |batch| {
        batches.push(batch.to_vec());
        Ok(())
    })?;
    Ok(batches)
}
