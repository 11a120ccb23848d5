use crate::core::io::traits::VolumeFile;
use crate::core::models::volume::{DensityVolume, VolumeError};
use ndarray::Array3;
use std::io::{self, Read, Write};
use thiserror::Error;

const HEADER_LEN: usize = 1024;
const MRC_2014: i32 = 20140;

#[derive(Debug, Error)]
pub enum MrcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("File ends inside the {section} ({expected} bytes missing)")]
    Truncated {
        section: &'static str,
        expected: usize,
    },
    #[error("Unsupported MRC data mode {0} (supported: 0, 1, 2, 6)")]
    UnsupportedMode(i32),
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    #[error("Invalid volume geometry: {0}")]
    Volume(#[from] VolumeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn from_stamp(stamp: &[u8]) -> Option<Self> {
        match stamp[0] {
            0x44 | 0x41 => Some(Endian::Little),
            0x11 => Some(Endian::Big),
            _ => None,
        }
    }

    fn word(self, bytes: &[u8], word: usize) -> [u8; 4] {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[word * 4..word * 4 + 4]);
        raw
    }

    fn i32_at(self, bytes: &[u8], word: usize) -> i32 {
        let raw = self.word(bytes, word);
        match self {
            Endian::Little => i32::from_le_bytes(raw),
            Endian::Big => i32::from_be_bytes(raw),
        }
    }

    fn f32_at(self, bytes: &[u8], word: usize) -> f32 {
        let raw = self.word(bytes, word);
        match self {
            Endian::Little => f32::from_le_bytes(raw),
            Endian::Big => f32::from_be_bytes(raw),
        }
    }
}

/// Voxel encodings understood by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Int8,
    Int16,
    Float32,
    Uint16,
}

impl Mode {
    fn from_code(code: i32) -> Result<Self, MrcError> {
        match code {
            0 => Ok(Mode::Int8),
            1 => Ok(Mode::Int16),
            2 => Ok(Mode::Float32),
            6 => Ok(Mode::Uint16),
            other => Err(MrcError::UnsupportedMode(other)),
        }
    }

    fn width(self) -> usize {
        match self {
            Mode::Int8 => 1,
            Mode::Int16 | Mode::Uint16 => 2,
            Mode::Float32 => 4,
        }
    }

    fn decode(self, chunk: &[u8], endian: Endian) -> f32 {
        match (self, endian) {
            (Mode::Int8, _) => chunk[0] as i8 as f32,
            (Mode::Int16, Endian::Little) => i16::from_le_bytes([chunk[0], chunk[1]]) as f32,
            (Mode::Int16, Endian::Big) => i16::from_be_bytes([chunk[0], chunk[1]]) as f32,
            (Mode::Uint16, Endian::Little) => u16::from_le_bytes([chunk[0], chunk[1]]) as f32,
            (Mode::Uint16, Endian::Big) => u16::from_be_bytes([chunk[0], chunk[1]]) as f32,
            (Mode::Float32, Endian::Little) => {
                f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
            }
            (Mode::Float32, Endian::Big) => {
                f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
            }
        }
    }
}

/// The subset of the 1024-byte MRC header the pipeline relies on.
#[derive(Debug, Clone, PartialEq)]
struct MrcHeader {
    /// Columns, rows, sections.
    counts: [usize; 3],
    mode: Mode,
    /// Start indices for columns, rows, sections.
    starts: [i32; 3],
    /// Sampling intervals along physical x, y, z.
    sampling: [i32; 3],
    /// Cell edge lengths along physical x, y, z (Å).
    cell: [f32; 3],
    /// Physical axis (0 = x, 1 = y, 2 = z) of columns, rows, sections.
    axis_map: [usize; 3],
    extended_len: usize,
    origin: [f32; 3],
    endian: Endian,
}

impl MrcHeader {
    fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, MrcError> {
        let endian = match Endian::from_stamp(&bytes[212..216]) {
            Some(endian) => endian,
            // Older writers leave the stamp empty; pick the byte order that yields a known mode.
            None if Mode::from_code(Endian::Little.i32_at(bytes, 3)).is_ok() => Endian::Little,
            None => Endian::Big,
        };

        let mut counts = [0usize; 3];
        for (i, count) in counts.iter_mut().enumerate() {
            let raw = endian.i32_at(bytes, i);
            if raw <= 0 {
                return Err(MrcError::InvalidHeader(format!(
                    "grid dimension {} is {}",
                    i + 1,
                    raw
                )));
            }
            *count = raw as usize;
        }

        let mode = Mode::from_code(endian.i32_at(bytes, 3))?;
        let starts = [
            endian.i32_at(bytes, 4),
            endian.i32_at(bytes, 5),
            endian.i32_at(bytes, 6),
        ];
        let sampling = [
            endian.i32_at(bytes, 7),
            endian.i32_at(bytes, 8),
            endian.i32_at(bytes, 9),
        ];
        let cell = [
            endian.f32_at(bytes, 10),
            endian.f32_at(bytes, 11),
            endian.f32_at(bytes, 12),
        ];
        let raw_map = [
            endian.i32_at(bytes, 16),
            endian.i32_at(bytes, 17),
            endian.i32_at(bytes, 18),
        ];
        let axis_map = Self::axis_map(raw_map)?;

        let extended_len = endian.i32_at(bytes, 23);
        if extended_len < 0 {
            return Err(MrcError::InvalidHeader(format!(
                "negative extended header length {}",
                extended_len
            )));
        }

        let origin = [
            endian.f32_at(bytes, 49),
            endian.f32_at(bytes, 50),
            endian.f32_at(bytes, 51),
        ];

        Ok(Self {
            counts,
            mode,
            starts,
            sampling,
            cell,
            axis_map,
            extended_len: extended_len as usize,
            origin,
            endian,
        })
    }

    fn axis_map(raw: [i32; 3]) -> Result<[usize; 3], MrcError> {
        if raw == [0, 0, 0] {
            return Ok([0, 1, 2]);
        }
        let mut seen = [false; 3];
        let mut map = [0usize; 3];
        for (slot, &value) in map.iter_mut().zip(raw.iter()) {
            if !(1..=3).contains(&value) || seen[(value - 1) as usize] {
                return Err(MrcError::InvalidHeader(format!(
                    "MAPC/MAPR/MAPS {:?} is not a permutation of 1, 2, 3",
                    raw
                )));
            }
            seen[(value - 1) as usize] = true;
            *slot = (value - 1) as usize;
        }
        Ok(map)
    }

    /// Per-axis voxel size along physical x, y, z.
    fn voxel_size(&self) -> Result<[f64; 3], MrcError> {
        let mut size = [0.0f64; 3];
        for axis in 0..3 {
            let sampling = self.sampling[axis];
            if sampling <= 0 {
                return Err(MrcError::InvalidHeader(format!(
                    "sampling interval along axis {} is {}",
                    axis + 1,
                    sampling
                )));
            }
            size[axis] = self.cell[axis] as f64 / sampling as f64;
        }
        Ok(size)
    }

    /// Size of the data block in bytes.
    fn data_len(&self) -> Result<usize, MrcError> {
        self.counts
            .iter()
            .try_fold(self.mode.width(), |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| {
                MrcError::InvalidHeader(format!(
                    "grid {:?} is too large to address",
                    self.counts
                ))
            })
    }
}

fn encode_header(volume: &DensityVolume) -> Vec<u8> {
    let [nz, ny, nx] = volume.shape();
    let voxel = volume.voxel_size();
    let origin = volume.origin();
    let start = volume.start();
    let data = volume.data();

    let count = data.len() as f64;
    let (mut dmin, mut dmax, mut sum) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f64);
    for &v in data.iter() {
        dmin = dmin.min(v);
        dmax = dmax.max(v);
        sum += v as f64;
    }
    let mean = sum / count;
    let rms = (data.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / count).sqrt();

    let mut words = [0u8; HEADER_LEN];
    let mut put_i32 = |word: usize, value: i32| {
        words[word * 4..word * 4 + 4].copy_from_slice(&value.to_le_bytes());
    };
    put_i32(0, nx as i32);
    put_i32(1, ny as i32);
    put_i32(2, nz as i32);
    put_i32(3, 2);
    put_i32(4, start[0]);
    put_i32(5, start[1]);
    put_i32(6, start[2]);
    put_i32(7, nx as i32);
    put_i32(8, ny as i32);
    put_i32(9, nz as i32);
    put_i32(16, 1);
    put_i32(17, 2);
    put_i32(18, 3);
    put_i32(22, 1);
    put_i32(27, MRC_2014);
    put_i32(55, 1);

    let mut put_f32 = |word: usize, value: f32| {
        words[word * 4..word * 4 + 4].copy_from_slice(&value.to_le_bytes());
    };
    put_f32(10, (nx as f64 * voxel[0]) as f32);
    put_f32(11, (ny as f64 * voxel[1]) as f32);
    put_f32(12, (nz as f64 * voxel[2]) as f32);
    put_f32(13, 90.0);
    put_f32(14, 90.0);
    put_f32(15, 90.0);
    put_f32(19, dmin);
    put_f32(20, dmax);
    put_f32(21, mean as f32);
    put_f32(49, origin[0] as f32);
    put_f32(50, origin[1] as f32);
    put_f32(51, origin[2] as f32);
    put_f32(54, rms as f32);

    words[208..212].copy_from_slice(b"MAP ");
    words[212..216].copy_from_slice(&[0x44, 0x44, 0x00, 0x00]);
    let label = b"cryomotif";
    words[224..224 + label.len()].copy_from_slice(label);

    words.to_vec()
}

fn read_exact_or(
    reader: &mut impl Read,
    buf: &mut [u8],
    section: &'static str,
) -> Result<(), MrcError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => MrcError::Truncated {
            section,
            expected: buf.len(),
        },
        _ => MrcError::Io(e),
    })
}

/// Reads `len` bytes, growing the buffer only as bytes arrive.
fn read_section(reader: &mut impl Read, len: usize, section: &'static str) -> Result<Vec<u8>, MrcError> {
    let mut buf = Vec::new();
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(MrcError::Truncated {
            section,
            expected: len - buf.len(),
        });
    }
    Ok(buf)
}

/// MRC2014 map codec.
///
/// Reads modes 0, 1, 2 and 6 in either byte order and any axis mapping;
/// the returned grid is always in `(z, y, x)` order. Writes mode 2,
/// little-endian, with the standard `1, 2, 3` axis mapping.
pub struct MrcFile;

impl VolumeFile for MrcFile {
    type Error = MrcError;

    fn read_from(reader: &mut impl Read) -> Result<DensityVolume, Self::Error> {
        let mut header_bytes = [0u8; HEADER_LEN];
        read_exact_or(reader, &mut header_bytes, "header")?;
        let header = MrcHeader::parse(&header_bytes)?;

        let data_len = header.data_len()?;
        if header.extended_len > 0 {
            read_section(reader, header.extended_len, "extended header")?;
        }

        let width = header.mode.width();
        let raw = read_section(reader, data_len, "data block")?;
        let values: Vec<f32> = raw
            .chunks_exact(width)
            .map(|chunk| header.mode.decode(chunk, header.endian))
            .collect();

        let [nc, nr, ns] = header.counts;
        let file_order = Array3::from_shape_vec((ns, nr, nc), values)
            .map_err(|e| MrcError::InvalidHeader(e.to_string()))?;

        // File axes are (sections, rows, columns); find which holds each of z, y, x.
        let file_axis_of = |physical: usize| -> usize {
            let file_slot = header
                .axis_map
                .iter()
                .position(|&p| p == physical)
                .unwrap_or(physical);
            2 - file_slot
        };
        let zyx = file_order
            .permuted_axes([file_axis_of(2), file_axis_of(1), file_axis_of(0)])
            .as_standard_layout()
            .into_owned();

        let mut start = [0i32; 3];
        for (file_slot, &physical) in header.axis_map.iter().enumerate() {
            start[physical] = header.starts[file_slot];
        }

        let origin = header.origin.map(|v| v as f64);
        let volume = DensityVolume::new(zyx, header.voxel_size()?, origin, start)?;
        Ok(volume)
    }

    fn write_to(volume: &DensityVolume, writer: &mut impl Write) -> Result<(), Self::Error> {
        writer.write_all(&encode_header(volume))?;
        let mut block = Vec::with_capacity(volume.len() * 4);
        for &value in volume.data().iter() {
            block.extend_from_slice(&value.to_le_bytes());
        }
        writer.write_all(&block)?;
        writer.flush()?;
        Ok(())
    }
}
