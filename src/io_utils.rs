//! CSV I/O helpers: delimiter resolution, record decoding, and writer
//! construction. The `-` path convention routes export output to stdout.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Delimiter for an input file: explicit override, else by extension.
pub fn resolve_delimiter(name: &str, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| {
        if name.to_ascii_lowercase().ends_with(".tsv") {
            DEFAULT_TSV_DELIMITER
        } else {
            DEFAULT_CSV_DELIMITER
        }
    })
}

pub fn open_csv_reader(
    reader: impl Read + 'static,
    delimiter: u8,
) -> csv::Reader<Box<dyn Read>> {
    let boxed: Box<dyn Read> = Box::new(reader);
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(boxed)
}

pub fn open_csv_writer(
    path: Option<&Path>,
    delimiter: u8,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let target: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .from_writer(target))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (decoded, _, malformed) = encoding.decode(bytes);
    if malformed {
        return Err(anyhow!(
            "Input is not valid {} text",
            encoding.name()
        ));
    }
    Ok(decoded.into_owned())
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_delimiter_prefers_override_then_extension() {
        assert_eq!(resolve_delimiter("data.tsv", None), b'\t');
        assert_eq!(resolve_delimiter("data.csv", None), b',');
        assert_eq!(resolve_delimiter("data.TSV", None), b'\t');
        assert_eq!(resolve_delimiter("data.tsv", Some(b';')), b';');
    }

    #[test]
    fn decode_bytes_rejects_malformed_input() {
        assert!(decode_bytes(&[0xff, 0xfe, 0x41], UTF_8).is_err());
        assert_eq!(decode_bytes(b"plain", UTF_8).unwrap(), "plain");
    }
}
