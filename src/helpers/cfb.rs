//! OLE Compound File Binary (CFB) reader for legacy Excel (.xls) workbooks
//! Implements the parts of the container format needed to pull a stream out by name

use crate::error::ConverterError;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::helpers::bytes::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use thiserror::Error;

/// Signature at the start of every compound file
pub(crate) const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Sector ids from here up mark free sectors and chain ends
const MAX_REG_SECT: usize = 0xFFFFFFFB;
/// Streams smaller than this live in the mini stream
const MINI_STREAM_CUTOFF: usize = 4096;
const MINI_SECTOR_SIZE: usize = 64;
const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const ROOT_ENTRY: &str = "Root Entry";

/// Errors specific to Compound File Binary format parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table sectors is wrong: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("The number of file allocation table sectors is wrong: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// Compound File Binary structure held in memory
pub(crate) struct Cfb {
    /// Directory entries by stream name
    directories: HashMap<String, Directory>,
    /// File allocation table for regular sectors
    file_allocation_table: Vec<usize>,
    /// Regular sectors, following the header
    sectors: Sectors,
    /// Allocation table of the mini stream
    mini_file_allocation_table: Vec<usize>,
    /// 64-byte sectors of the mini stream
    mini_sectors: Sectors,
}

impl Cfb {
    /// Parses the header, allocation tables and directory of a compound file
    pub(crate) fn new(data: Vec<u8>) -> Result<Cfb, ConverterError> {
        if data.len() < HEADER_SIZE {
            Err(CfbError::FileFormatError)?;
        }
        let header = Header::new(&data[..HEADER_SIZE])?;
        let size = header.sector_size()?;
        let sectors = Sectors { data, size, offset: size };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_shift)?;
        let mini_file_allocation_table = Self::load_mini_file_allocation_table(&file_allocation_table, &sectors, &header)?;
        let mini_sectors = match directories.get(ROOT_ENTRY) {
            Some(root) => Self::load_mini_sectors(&file_allocation_table, &sectors, root)?,
            None => Sectors { data: Vec::new(), size: MINI_SECTOR_SIZE, offset: 0 },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    /// Reads the contents of a stream, or `None` when there is no stream by that name
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, ConverterError> {
        let Some(directory) = self.directories.get(name) else {
            return Ok(None);
        };
        let mut bytes = if directory.count < MINI_STREAM_CUTOFF {
            Self::read_bytes(&self.mini_file_allocation_table, &self.mini_sectors, directory.index)?
        } else {
            Self::read_bytes(&self.file_allocation_table, &self.sectors, directory.index)?
        };
        bytes.truncate(directory.count);
        Ok(Some(bytes))
    }

    /// Loads the file allocation table through the double indirect file allocation table
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, ConverterError> {
        let mut double_indirect_file_allocation_table: Vec<usize> = to_usize_iter(&sectors.data[76..HEADER_SIZE]).collect();

        let mut count = 0usize;
        let mut index = header.double_indirect_file_allocation_table_shift;
        while index < MAX_REG_SECT {
            if count == header.double_indirect_file_allocation_table_count {
                Err(CfbError::DoubleIndirectFileAllocationTableError(count, count + 1))?
            }
            double_indirect_file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
            index = double_indirect_file_allocation_table.pop().ok_or(CfbError::FileFormatError)?;
            count += 1;
        }
        if count != header.double_indirect_file_allocation_table_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(header.double_indirect_file_allocation_table_count, count))?
        }

        let mut file_allocation_table: Vec<usize> = Vec::new();
        let mut count = 0usize;
        for index in double_indirect_file_allocation_table {
            if index < MAX_REG_SECT {
                file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
                count += 1;
            }
        }
        if count != header.file_allocation_table_count {
            Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
        }

        Ok(file_allocation_table)
    }

    /// Loads directory entries from the chain starting at `index`
    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<HashMap<String, Directory>, ConverterError> {
        let bytes = Self::read_bytes(file_allocation_table, sectors, index)?;
        let directories: HashMap<String, Directory> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .filter_map(Directory::new)
            .collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    /// Loads the allocation table of the mini stream
    fn load_mini_file_allocation_table(file_allocation_table: &[usize], sectors: &Sectors, header: &Header) -> Result<Vec<usize>, ConverterError> {
        Ok(if header.mini_file_allocation_table_sector_count > 0 {
            let bytes = Self::read_bytes(file_allocation_table, sectors, header.mini_file_allocation_table_sector_shift)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        })
    }

    /// Loads the mini stream, which is stored in regular sectors behind the root entry
    fn load_mini_sectors(file_allocation_table: &[usize], sectors: &Sectors, root: &Directory) -> Result<Sectors, ConverterError> {
        let mut data = Self::read_bytes(file_allocation_table, sectors, root.index)?;
        data.truncate(root.count);
        Ok(Sectors { data, size: MINI_SECTOR_SIZE, offset: 0 })
    }

    /// Reads a whole chain of sectors. Chains that leave the table or loop are rejected.
    fn read_bytes(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, ConverterError> {
        let mut content: Vec<u8> = Vec::new();
        let mut index = index;
        let mut remaining = file_allocation_table.len();
        while index < MAX_REG_SECT {
            if remaining == 0 {
                Err(CfbError::FileFormatError)?
            }
            content.extend_from_slice(sectors.get(index)?);
            index = *file_allocation_table.get(index).ok_or(CfbError::FileFormatError)?;
            remaining -= 1;
        }
        Ok(content)
    }
}

/// A run of equally sized sectors
#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    /// Size of one sector
    size: usize,
    /// Position of sector 0; regular sectors start after the header
    offset: usize,
}

impl Sectors {
    /// Data of the sector at `index`; the last sector of a file may be short
    fn get(&self, index: usize) -> Result<&[u8], CfbError> {
        let source = index
            .checked_mul(self.size)
            .and_then(|start| start.checked_add(self.offset))
            .ok_or(CfbError::FileFormatError)?;
        let target = self.data.len().min(source.saturating_add(self.size));
        self.data.get(source..target).ok_or(CfbError::FileFormatError)
    }
}

/// CFB file header structure
#[derive(Debug)]
struct Header {
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_shift: usize,
    mini_file_allocation_table_sector_shift: usize,
    mini_file_allocation_table_sector_count: usize,
    double_indirect_file_allocation_table_shift: usize,
    double_indirect_file_allocation_table_count: usize,
}

impl Header {
    /// Parses the first 512 bytes of the file
    fn new(data: &[u8]) -> Result<Self, ConverterError> {
        if data[0..8] != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }

        Ok(Header {
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            file_allocation_table_count: to_usize(&data[44..48]),
            directory_shift: to_usize(&data[48..52]),
            mini_file_allocation_table_sector_shift: to_usize(&data[60..64]),
            mini_file_allocation_table_sector_count: to_usize(&data[64..68]),
            double_indirect_file_allocation_table_shift: to_usize(&data[68..72]),
            double_indirect_file_allocation_table_count: to_usize(&data[72..76]),
        })
    }

    /// Sector size for the major version
    fn sector_size(&self) -> Result<usize, ConverterError> {
        if self.major_version == 3 && self.sector_shift == 0x0009 {
            Ok(512) // 2 ^ 9
        } else if self.major_version == 4 && self.sector_shift == 0x000C {
            // The rest of a version 4 header sector is zero filled
            Ok(4096) // 2 ^ 12
        } else {
            Err(CfbError::SectorSizeError(self.major_version, self.sector_shift))?
        }
    }
}

/// Directory entry of a storage or stream
#[derive(Debug)]
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    /// Reads one 128-byte entry; unallocated entries yield `None`
    fn new(bytes: &[u8]) -> Option<(String, Directory)> {
        if bytes[66] == 0 {
            return None;
        }
        let size = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _) = UTF_16LE.decode_without_bom_handling(&bytes[..size]);
        let name = name.split('\0').next().unwrap_or_default().to_owned();

        let index = to_usize(&bytes[116..120]);
        let count = to_u64(&bytes[120..128]) as usize;
        Some((name, Directory { index, count }))
    }
}
