//! Tab-separated directory store.
//!
//! An object persists as a directory of three files: `matrix.tsv` (row ids
//! down the first column, column ids across the header), plus one TSV per
//! annotation table. Files may be gzipped; reading is gz-transparent either
//! way. Missing values (NaN cells, null annotation cells) persist as the
//! literal `NA`.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use ndarray::Array2;

use annmat_core::models::{AnnMatrix, Frame, ID_COLUMN, Selector, Value};

use crate::error::{Result, StoreError};
use crate::store::MatrixStore;

pub const MATRIX_FILE: &str = "matrix.tsv";
pub const ROW_META_FILE: &str = "row_meta.tsv";
pub const COL_META_FILE: &str = "col_meta.tsv";

/// The persisted representation of a missing value.
pub const NA: &str = "NA";

/// Directory-of-TSVs implementation of [MatrixStore].
#[derive(Debug, Clone, Default)]
pub struct TsvDirStore {
    /// Write gzipped files. Reading auto-detects either way.
    pub gzip: bool,
}

impl TsvDirStore {
    pub fn new() -> Self {
        TsvDirStore::default()
    }

    pub fn gzipped() -> Self {
        TsvDirStore { gzip: true }
    }
}

impl MatrixStore for TsvDirStore {
    fn load<T: AsRef<Path>>(
        &self,
        path: T,
        rows: &Selector,
        cols: &Selector,
        matrix_only: bool,
    ) -> Result<AnnMatrix> {
        let dir = path.as_ref();
        let matrix_path = locate(dir, MATRIX_FILE)
            .ok_or_else(|| StoreError::InvalidStore(dir.display().to_string()))?;
        let (mat, row_ids, col_ids) = read_matrix(&matrix_path)?;

        let (row_meta, col_meta) = if matrix_only {
            (None, None)
        } else {
            (
                locate(dir, ROW_META_FILE).map(read_frame).transpose()?,
                locate(dir, COL_META_FILE).map(read_frame).transpose()?,
            )
        };

        let g = AnnMatrix::new(mat, row_ids, col_ids, row_meta, col_meta)?;
        if rows.is_all() && cols.is_all() {
            Ok(g)
        } else {
            // in-memory selector pushdown
            Ok(g.subset(rows, cols)?)
        }
    }

    fn store<T: AsRef<Path>>(&self, path: T, g: &AnnMatrix) -> Result<()> {
        let dir = path.as_ref();
        std::fs::create_dir_all(dir)?;

        let header = std::iter::once(ID_COLUMN.to_string())
            .chain(g.col_ids().iter().cloned())
            .collect::<Vec<_>>()
            .join("\t");
        let rows = g.row_ids().iter().enumerate().map(|(i, id)| {
            let mut fields = Vec::with_capacity(g.col_ids().len() + 1);
            fields.push(id.clone());
            for j in 0..g.col_ids().len() {
                fields.push(render_cell(g.mat()[[i, j]]));
            }
            fields.join("\t")
        });
        write_lines(
            &file_path(dir, MATRIX_FILE, self.gzip),
            self.gzip,
            std::iter::once(header).chain(rows),
        )?;

        write_frame(&file_path(dir, ROW_META_FILE, self.gzip), self.gzip, g.row_meta())?;
        write_frame(&file_path(dir, COL_META_FILE, self.gzip), self.gzip, g.col_meta())?;
        Ok(())
    }
}

///
/// Read a delimited annotation table: first line holds column names, null
/// cells are empty or `NA`, and values parse as integers, floats, or
/// strings in that order. Transparently decompresses `.gz` files.
///
pub fn read_frame<T: AsRef<Path>>(path: T) -> Result<Frame> {
    let path = path.as_ref();
    let reader = get_dynamic_reader(path)?;
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => {
            return Err(StoreError::Parse {
                path: path.display().to_string(),
                reason: "empty file".to_string(),
            });
        }
    };
    let names: Vec<String> = header.split('\t').map(String::from).collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    for (lineno, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != names.len() {
            return Err(StoreError::Parse {
                path: path.display().to_string(),
                reason: format!(
                    "line {} has {} fields, header has {}",
                    lineno + 2,
                    fields.len(),
                    names.len()
                ),
            });
        }
        for (c, field) in fields.iter().enumerate() {
            columns[c].push(parse_value(field));
        }
    }

    let mut frame = Frame::new();
    for (name, values) in names.iter().zip(columns) {
        frame.push_column(name, values)?;
    }
    Ok(frame)
}

fn write_frame(path: &Path, gzip: bool, frame: &Frame) -> Result<()> {
    let header = frame.names().join("\t");
    let rows = (0..frame.n_rows()).map(|r| {
        frame
            .names()
            .iter()
            .map(|name| {
                let value = &frame.column(name).expect("iterating own names")[r];
                if value.is_null() {
                    NA.to_string()
                } else {
                    value.render()
                }
            })
            .collect::<Vec<_>>()
            .join("\t")
    });
    write_lines(path, gzip, std::iter::once(header).chain(rows))
}

fn read_matrix(path: &Path) -> Result<(Array2<f64>, Vec<String>, Vec<String>)> {
    let reader = get_dynamic_reader(path)?;
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => {
            return Err(StoreError::Parse {
                path: path.display().to_string(),
                reason: "empty matrix file".to_string(),
            });
        }
    };
    let col_ids: Vec<String> = header.split('\t').skip(1).map(String::from).collect();

    let mut row_ids: Vec<String> = Vec::new();
    let mut cells: Vec<f64> = Vec::new();
    for (lineno, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let row_id = fields.next().expect("split yields at least one field");
        row_ids.push(row_id.to_string());

        let mut n_values = 0;
        for field in fields {
            cells.push(parse_matrix_cell(field, path, lineno)?);
            n_values += 1;
        }
        if n_values != col_ids.len() {
            return Err(StoreError::Parse {
                path: path.display().to_string(),
                reason: format!(
                    "line {} has {} values, header has {} columns",
                    lineno + 2,
                    n_values,
                    col_ids.len()
                ),
            });
        }
    }

    let mat = Array2::from_shape_vec((row_ids.len(), col_ids.len()), cells).map_err(|e| {
        StoreError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok((mat, row_ids, col_ids))
}

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// # Arguments
///
/// - path: path to the file to read
///
fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file = File::open(path)?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::new(file))
}

fn write_lines(path: &Path, gzip: bool, lines: impl Iterator<Item = String>) -> Result<()> {
    if gzip {
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        for line in lines {
            writeln!(encoder, "{}", line)?;
        }
        encoder.finish()?;
    } else {
        let mut writer = BufWriter::new(File::create(path)?);
        for line in lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
    }
    Ok(())
}

fn file_path(dir: &Path, name: &str, gzip: bool) -> PathBuf {
    if gzip {
        dir.join(format!("{}.gz", name))
    } else {
        dir.join(name)
    }
}

/// Find a stored file, preferring the plain name over its `.gz` variant.
fn locate(dir: &Path, name: &str) -> Option<PathBuf> {
    let plain = dir.join(name);
    if plain.is_file() {
        return Some(plain);
    }
    let gz = dir.join(format!("{}.gz", name));
    if gz.is_file() { Some(gz) } else { None }
}

fn render_cell(value: f64) -> String {
    if value.is_nan() {
        NA.to_string()
    } else {
        value.to_string()
    }
}

fn parse_matrix_cell(field: &str, path: &Path, lineno: usize) -> Result<f64> {
    if field.is_empty() || field == NA {
        return Ok(f64::NAN);
    }
    field.parse::<f64>().map_err(|_| StoreError::Parse {
        path: path.display().to_string(),
        reason: format!("line {}: not a number: {}", lineno + 2, field),
    })
}

fn parse_value(field: &str) -> Value {
    if field.is_empty() || field == NA {
        return Value::Null;
    }
    if let Ok(int) = field.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(num) = field.parse::<f64>() {
        return Value::Num(num);
    }
    Value::Str(field.to_string())
}
