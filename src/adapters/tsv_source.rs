//! Delimited text reader. The header line is consumed on open and exposed
//! separately; data records are streamed in batches.

use crate::domain::model::{Batch, Record, Value};
use crate::domain::ports::RecordSource;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use csv::ByteRecord;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsvOptions {
    pub delimiter: u8,
    /// Largest accepted field, in bytes.
    pub max_field_bytes: usize,
}

impl Default for TsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            max_field_bytes: 10 * 1024 * 1024,
        }
    }
}

pub struct TsvSource<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    record: ByteRecord,
    options: TsvOptions,
}

impl TsvSource<File> {
    pub fn open(path: &Path, options: TsvOptions) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => EtlError::SourceNotFound {
                path: path.to_path_buf(),
            },
            _ => EtlError::IoError(e),
        })?;
        Self::from_reader(file, options)
    }
}

impl<R: Read> TsvSource<R> {
    pub fn from_reader(reader: R, options: TsvOptions) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut header = ByteRecord::new();
        let headers = if reader.read_byte_record(&mut header)? {
            header
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let name = String::from_utf8_lossy(name);
                    // 去掉第一欄可能存在的 UTF-8 BOM
                    if i == 0 {
                        name.trim_start_matches('\u{feff}').to_string()
                    } else {
                        name.into_owned()
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(Self {
            reader,
            headers,
            record: ByteRecord::new(),
            options,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn read_record(&mut self) -> Result<Option<Record>> {
        if !self.reader.read_byte_record(&mut self.record)? {
            return Ok(None);
        }

        let mut fields = Vec::with_capacity(self.record.len());
        for field in self.record.iter() {
            if field.len() > self.options.max_field_bytes {
                return Err(EtlError::FieldTooLarge {
                    line: self.record.position().map_or(0, |p| p.line()),
                    size: field.len(),
                    limit: self.options.max_field_bytes,
                });
            }
            fields.push(Value::Text(String::from_utf8_lossy(field).into_owned()));
        }
        Ok(Some(Record::new(fields)))
    }
}

#[async_trait]
impl<R: Read + Send> RecordSource for TsvSource<R> {
    async fn next_batch(&mut self, max: usize) -> Result<Batch> {
        let mut records = Vec::with_capacity(max.min(64 * 1024));
        while records.len() < max {
            match self.read_record()? {
                Some(record) => records.push(record),
                None => break,
            }
        }
        Ok(Batch::new(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(data: &str) -> TsvSource<&[u8]> {
        TsvSource::from_reader(data.as_bytes(), TsvOptions::default()).unwrap()
    }

    fn texts(record: &Record) -> Vec<&str> {
        record.fields.iter().map(|f| f.as_str().unwrap_or("")).collect()
    }

    #[tokio::test]
    async fn test_header_is_not_emitted_as_data() {
        let mut src = source("code\tproduct_name\n1\tMilk\n2\tBread\n");
        assert_eq!(src.headers(), ["code", "product_name"]);

        let batch = src.next_batch(10).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(texts(&batch.records[0]), vec!["1", "Milk"]);
        assert!(src.next_batch(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ragged_rows_are_passed_through() {
        let mut src = source("a\tb\tc\n1\n1\t2\t3\t4\n");
        let batch = src.next_batch(10).await.unwrap();
        assert_eq!(batch.records[0].arity(), 1);
        assert_eq!(batch.records[1].arity(), 4);
    }

    #[tokio::test]
    async fn test_batches_are_bounded() {
        let mut data = String::from("n\n");
        for i in 0..25 {
            data.push_str(&format!("{}\n", i));
        }
        let mut src = source(&data);
        let sizes = [
            src.next_batch(10).await.unwrap().len(),
            src.next_batch(10).await.unwrap().len(),
            src.next_batch(10).await.unwrap().len(),
            src.next_batch(10).await.unwrap().len(),
        ];
        assert_eq!(sizes, [10, 10, 5, 0]);
    }

    #[tokio::test]
    async fn test_field_over_limit_is_rejected() {
        let data = format!("a\tb\nok\t{}\n", "x".repeat(64));
        let options = TsvOptions {
            max_field_bytes: 16,
            ..TsvOptions::default()
        };
        let mut src = TsvSource::from_reader(data.as_bytes(), options).unwrap();

        match src.next_batch(10).await {
            Err(EtlError::FieldTooLarge { size, limit, line }) => {
                assert_eq!(size, 64);
                assert_eq!(limit, 16);
                assert_eq!(line, 2);
            }
            other => panic!("expected FieldTooLarge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let data: &[u8] = b"name\nab\xffcd\n";
        let mut src = TsvSource::from_reader(data, TsvOptions::default()).unwrap();
        let batch = src.next_batch(1).await.unwrap();
        assert_eq!(texts(&batch.records[0]), vec!["ab\u{fffd}cd"]);
    }

    #[test]
    fn test_bom_is_stripped_from_header() {
        let src = source("\u{feff}code\tname\n");
        assert_eq!(src.headers(), ["code", "name"]);
    }

    #[test]
    fn test_empty_input_has_no_headers() {
        assert!(source("").headers().is_empty());
    }

    #[test]
    fn test_missing_file_is_source_not_found() {
        let result = TsvSource::open(Path::new("/nonexistent/products.tsv"), TsvOptions::default());
        assert!(matches!(result, Err(EtlError::SourceNotFound { .. })));
    }
}
