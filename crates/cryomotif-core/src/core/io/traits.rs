use crate::core::models::structure::AtomicStructure;
use crate::core::models::volume::DensityVolume;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Defines the interface for reading atomic structure file formats.
///
/// Implementors handle format-specific parsing and populate an
/// [`AtomicStructure`] through its builder.
pub trait StructureFile {
    /// The error type for I/O and parse failures.
    type Error: Error + From<io::Error>;

    /// Reads a structure from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<AtomicStructure, Self::Error>;

    /// Reads a structure from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<AtomicStructure, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

/// Defines the interface for reading and writing volumetric map formats.
pub trait VolumeFile {
    /// The error type for I/O and decoding failures.
    type Error: Error + From<io::Error>;

    /// Decodes a density volume from a byte stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed, the data block is
    /// truncated, or the voxel spacing is not strictly positive.
    fn read_from(reader: &mut impl Read) -> Result<DensityVolume, Self::Error>;

    /// Encodes a density volume, preserving its voxel size, origin and start.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(volume: &DensityVolume, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads a density volume from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or decoding fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<DensityVolume, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes a density volume to a file path, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(volume: &DensityVolume, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(volume, &mut writer)
    }
}
