//! Microsoft Office Binary Interchange File Format (BIFF8)
//! Reader for the record stream of Excel 97-2003 workbooks (.xls files)
//! Handles the record-based binary format and its continuation records

use crate::error::ConverterError;
use crate::helpers::bytes::to_f64;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u32;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use encoding_rs::Encoding;
use encoding_rs::UTF_16LE;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 format parsing
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

/// Reader for BIFF8 (Excel 97-2003) binary format
/// Handles the record-based structure with continuation records
pub(crate) struct Biff8Reader {
    /// Code page of 8-bit strings, set from the CODEPAGE record
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    pointer: usize, // Next record header position in buffer
    chunks: Vec<(usize, usize)>, // Current record body and its continuations (start, end)
    index: usize,  // Current chunk index
    offset: usize, // Offset within current chunk
}

impl Biff8Reader {
    /// Creates a new BIFF8 reader over a workbook stream
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: UTF_16LE,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Moves to the next record and returns its type, gathering any continuation
    /// records into its body. Returns None at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, ConverterError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;
        self.chunks.clear();

        let kind = self.get_u16_at(self.pointer)?;
        self.push_chunk()?;
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            self.push_chunk()?;
        }
        Ok(Some(kind))
    }

    /// Adds the body of the record whose header is at `pointer` and moves past it.
    /// A body running past the end of the stream is cut short.
    fn push_chunk(&mut self) -> Result<(), ConverterError> {
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        let lower = self.pointer + 4;
        let upper = self.buffer.len().min(lower + size);
        self.chunks.push((lower, upper));
        self.pointer = upper;
        Ok(())
    }

    /// Sets the position of the next record header
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
    }

    /// Reads up to `length` bytes from the current chunk of the record
    fn read(&mut self, length: usize) -> &[u8] {
        while let Some(&(lower, upper)) = self.chunks.get(self.index) {
            let source = lower + self.offset;
            if source >= upper {
                self.index += 1;
                self.offset = 0;
                continue;
            }
            let target = upper.min(source + length);
            self.offset += target - source;
            return &self.buffer[source..target];
        }
        &[]
    }

    /// Reads exactly `length` bytes, returning an error if insufficient data
    fn read_exact(&mut self, length: usize) -> Result<&[u8], ConverterError> {
        let data = self.read(length);
        if data.len() == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Whether the current chunk has been read to its end
    fn is_chunk_exhausted(&self) -> bool {
        self.chunks
            .get(self.index)
            .is_some_and(|(lower, upper)| lower + self.offset >= *upper)
    }

    /// Skips `length` bytes, following continuation records
    pub(crate) fn skip(&mut self, length: usize) -> Result<(), ConverterError> {
        let mut remaining = length;
        while remaining > 0 {
            let size = self.read(remaining).len();
            if size == 0 {
                Err(Biff8Error::NoEnoughDataError(remaining))?
            }
            remaining -= size;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ConverterError> {
        self.read_exact(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ConverterError> {
        self.read_exact(2).map(to_u16)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ConverterError> {
        self.read_exact(4).map(to_u32)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, ConverterError> {
        self.read_exact(4).map(to_usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, ConverterError> {
        self.read_exact(8).map(to_u64)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, ConverterError> {
        self.read_exact(8).map(to_f64)
    }

    /// The 16-bit value in the last two bytes of the record
    pub(crate) fn read_last_u16(&self) -> Result<u16, ConverterError> {
        match self.chunks.last() {
            Some(&(lower, upper)) if upper >= lower + 2 => self.get_u16_at(upper - 2),
            _ => Err(Biff8Error::NoEnoughDataError(2))?,
        }
    }

    /// Gets a 16-bit unsigned integer from the specified absolute position
    fn get_u16_at(&self, index: usize) -> Result<u16, ConverterError> {
        match self.buffer.get(index..index + 2) {
            Some(bytes) => Ok(to_u16(bytes)),
            None => Err(Biff8Error::NoEnoughDataError(2))?,
        }
    }

    /// Reads an RK number, the compressed integer or float format of numeric cells
    pub(crate) fn read_rk_number(&mut self) -> Result<f64, ConverterError> {
        let value = self.read_u32()?;
        let is_percentage = (value & 0x01) != 0;
        let is_integer = (value & 0x02) != 0;

        let mut number = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            f64::from_bits(((value & 0xFFFF_FFFC) as u64) << 32)
        };
        if is_percentage {
            number /= 100.0;
        }
        Ok(number)
    }

    /// Reads a short Unicode string (1-byte length prefix)
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, ConverterError> {
        let chars = self.read_u8()? as usize;
        self.read_string(chars, false)
    }

    /// Reads a Unicode string (2-byte length prefix)
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, ConverterError> {
        let chars = self.read_u16()? as usize;
        self.read_string(chars, false)
    }

    /// Reads a rich extended Unicode string, skipping its formatting runs and phonetic data
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, ConverterError> {
        let chars = self.read_u16()? as usize;
        self.read_string(chars, true)
    }

    /// Reads `chars` characters of string data. Character data split over a
    /// continuation record resumes behind a fresh option flag.
    fn read_string(&mut self, chars: usize, is_extended: bool) -> Result<String, ConverterError> {
        let flag = self.read_u8()?;
        let rich_string_count = if is_extended && (flag & 0x8) > 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_size = if is_extended && (flag & 0x4) > 0 {
            self.read_usize()?
        } else {
            0
        };

        let mut content = String::new();
        let mut is_high_byte = (flag & 0x1) > 0;
        let mut remaining = chars;
        while remaining > 0 {
            if self.is_chunk_exhausted() {
                is_high_byte = (self.read_u8()? & 0x1) > 0;
            }
            let read = self.read_chars_into(is_high_byte, remaining, &mut content);
            if read == 0 {
                Err(Biff8Error::NoEnoughDataError(remaining))?
            }
            remaining -= read;
        }
        // Skip rgRun
        self.skip(4 * rich_string_count)?;
        // Skip ExtRst
        self.skip(phonetic_size)?;
        Ok(content)
    }

    /// Decodes up to `chars` characters from the current chunk, returning how many were read.
    /// 16-bit characters are UTF-16; 8-bit characters follow the workbook code page.
    fn read_chars_into(&mut self, is_high_byte: bool, chars: usize, content: &mut String) -> usize {
        let encoding = self.encoding;
        if is_high_byte {
            let bytes = self.read(chars << 1);
            let (string, _) = UTF_16LE.decode_without_bom_handling(bytes);
            content.push_str(&string);
            bytes.len() >> 1
        } else {
            let bytes = self.read(chars);
            if encoding.is_single_byte() {
                let (string, _) = encoding.decode_without_bom_handling(bytes);
                content.push_str(&string);
            } else {
                content.extend(bytes.iter().map(|byte| *byte as char));
            }
            bytes.len()
        }
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
