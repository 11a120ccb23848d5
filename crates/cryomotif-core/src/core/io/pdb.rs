use crate::core::io::traits::StructureFile;
use crate::core::models::structure::{AtomicStructure, StructureBuilder};
use nalgebra::Point3;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must reach column 54)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn column_char(line: &str, index: usize) -> char {
    line.get(index..index + 1)
        .and_then(|s| s.chars().next())
        .unwrap_or(' ')
}

fn parse_coord(line: &str, line_num: usize, start: usize, columns: &str) -> Result<f64, PdbError> {
    let raw = slice_and_trim(line, start, start + 8);
    raw.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: columns.into(),
            value: raw.into(),
        },
    })
}

/// Reader for fixed-column PDB coordinate files.
///
/// Only `MODEL`, `ATOM` and `HETATM` records are interpreted; everything
/// else is skipped. For atoms with alternate locations only the blank and
/// `A` conformers are kept.
pub struct PdbFile;

impl StructureFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<AtomicStructure, Self::Error> {
        let mut builder = StructureBuilder::new();
        let mut atoms_read = 0usize;

        let mut current_chain: Option<char> = None;
        let mut current_residue: Option<(isize, Option<char>)> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match slice_and_trim(&line, 0, 6) {
                "MODEL" => {
                    let number_str = slice_and_trim(&line, 10, 14);
                    let number = if number_str.is_empty() {
                        1
                    } else {
                        number_str.parse().map_err(|_| PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::InvalidInt {
                                columns: "11-14".into(),
                                value: number_str.into(),
                            },
                        })?
                    };
                    builder.start_model(number);
                    current_chain = None;
                    current_residue = None;
                }
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }

                    let alt_loc = column_char(&line, 16);
                    if alt_loc != ' ' && alt_loc != 'A' {
                        continue;
                    }

                    let serial_str = slice_and_trim(&line, 6, 11);
                    let name = slice_and_trim(&line, 12, 16);
                    let res_name = slice_and_trim(&line, 17, 20);
                    let chain_id = column_char(&line, 21);
                    let res_seq_str = slice_and_trim(&line, 22, 26);
                    let insertion_code = Some(column_char(&line, 26)).filter(|c| *c != ' ');
                    let element = slice_and_trim(&line, 76, 78);

                    if name.is_empty() {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::MissingRequiredField {
                                columns: "13-16".into(),
                            },
                        });
                    }
                    let serial: usize = serial_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "7-11".into(),
                            value: serial_str.into(),
                        },
                    })?;
                    let res_seq: isize = res_seq_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "23-26".into(),
                            value: res_seq_str.into(),
                        },
                    })?;

                    let x = parse_coord(&line, line_num, 30, "31-38")?;
                    let y = parse_coord(&line, line_num, 38, "39-46")?;
                    let z = parse_coord(&line, line_num, 46, "47-54")?;

                    if current_chain != Some(chain_id) {
                        builder.start_chain(chain_id);
                        current_chain = Some(chain_id);
                        current_residue = None;
                    }
                    if current_residue != Some((res_seq, insertion_code)) {
                        builder.start_residue(res_seq, insertion_code, res_name);
                        current_residue = Some((res_seq, insertion_code));
                    }
                    builder.add_atom(serial, name, element, Point3::new(x, y, z));
                    atoms_read += 1;
                }
                _ => {}
            }
        }

        if atoms_read == 0 {
            return Err(PdbError::MissingRecord("ATOM/HETATM".into()));
        }
        Ok(builder.build())
    }
}
