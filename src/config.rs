use std::path::PathBuf;

pub(crate) const DEFAULT_MAX_RECORDS_PER_KEY: usize = 200;

#[derive(Clone)]
pub(crate) struct Config {
    source_id: String,
    source_key: String,
    key_columns: Vec<usize>,
    geo_columns: Option<(usize, usize)>,
    buffer_bytes: usize,
    max_records_per_key: usize,
    tmp: Option<PathBuf>,
}

impl Config {
    pub(crate) fn new(
        source_id: String,
        source_key: String,
        key_columns: Vec<usize>,
        geo_columns: Option<(usize, usize)>,
        buffer_bytes: usize,
    ) -> Config {
        Config {
            source_id,
            source_key,
            key_columns,
            geo_columns,
            buffer_bytes,
            max_records_per_key: DEFAULT_MAX_RECORDS_PER_KEY,
            tmp: None,
        }
    }

    pub(crate) fn source_id(&self) -> &String {
        &self.source_id
    }

    pub(crate) fn source_key(&self) -> &String {
        &self.source_key
    }

    pub(crate) fn key_columns(&self) -> &Vec<usize> {
        &self.key_columns
    }

    pub(crate) fn geo_columns(&self) -> Option<(usize, usize)> {
        self.geo_columns
    }

    pub(crate) fn buffer_bytes(&self) -> usize {
        self.buffer_bytes
    }

    pub(crate) fn max_records_per_key(&self) -> usize {
        self.max_records_per_key
    }

    pub(crate) fn set_max_records_per_key(&mut self, max_records_per_key: usize) {
        self.max_records_per_key = max_records_per_key;
    }

    pub(crate) fn tmp(&self) -> &Option<PathBuf> {
        &self.tmp
    }

    pub(crate) fn set_tmp(&mut self, tmp: PathBuf) {
        self.tmp = Some(tmp);
    }
}
