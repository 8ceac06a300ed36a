use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;

use crate::error::ImageLoadError;

/// LC3 can address 128KB of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Default load address for user programs.
pub const USER_ORIG: u16 = 0x3000;

/// The complete 16-bit address space. Every `u16` is a valid address.
#[derive(Clone, PartialEq, Eq)]
pub struct MemoryImage {
    mem: Box<[u16; MEMORY_MAX]>,
}

impl MemoryImage {
    pub fn new() -> Self {
        MemoryImage {
            mem: Box::new([0; MEMORY_MAX]),
        }
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.mem[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, val: u16) {
        self.mem[addr as usize] = val;
    }

    /// Copy `words` into memory starting at `orig`.
    pub fn load_words(&mut self, orig: u16, words: &[u16]) -> Result<(), ImageLoadError> {
        let start = orig as usize;
        if start + words.len() > MEMORY_MAX {
            return Err(ImageLoadError::TooLong {
                orig,
                len: words.len(),
            });
        }
        self.mem[start..start + words.len()].copy_from_slice(words);
        debug!("Loaded {} words at 0x{orig:04x}", words.len());
        Ok(())
    }

    /// Load a raw image: origin word, then data words.
    ///
    /// Returns the origin. Memory is untouched on failure.
    pub fn load_raw(&mut self, raw: &[u16]) -> Result<u16, ImageLoadError> {
        let (&orig, words) = raw.split_first().ok_or(ImageLoadError::Empty)?;
        self.load_words(orig, words)?;
        Ok(orig)
    }

    /// Load a binary image of big-endian words.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<u16, ImageLoadError> {
        let raw = words_from_bytes(bytes)?;
        self.load_raw(&raw)
    }

    /// Load a binary image file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<u16, ImageLoadError> {
        // Read to byte buffer
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        self.load_bytes(&buffer)
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.mem[..]
    }
}

impl Default for MemoryImage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.mem.iter().filter(|&&word| word != 0).count();
        f.debug_struct("MemoryImage")
            .field("nonzero_words", &used)
            .finish()
    }
}

/// Split a byte buffer into big-endian words, rejecting a partial trailing word.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<u16>, ImageLoadError> {
    if bytes.len() % 2 != 0 {
        return Err(ImageLoadError::Misaligned { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|word| u16::from_be_bytes([word[0], word[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_at_origin() {
        let mut mem = MemoryImage::new();
        let orig = mem
            .load_bytes(&[0x30, 0x00, 0x12, 0x34, 0xAB, 0xCD, 0x00, 0x01])
            .unwrap();
        assert_eq!(orig, 0x3000);
        assert_eq!(mem.read(0x3000), 0x1234);
        assert_eq!(mem.read(0x3001), 0xABCD);
        assert_eq!(mem.read(0x3002), 0x0001);
        assert_eq!(mem.read(0x2FFF), 0);
        assert_eq!(mem.read(0x3003), 0);
        let nonzero = mem.as_slice().iter().filter(|&&w| w != 0).count();
        assert_eq!(nonzero, 3);
    }

    #[test]
    fn partial_word_is_rejected() {
        let mut mem = MemoryImage::new();
        let err = mem.load_bytes(&[0x30, 0x00, 0x12, 0x34, 0xAB]).unwrap_err();
        assert!(matches!(err, ImageLoadError::Misaligned { len: 5 }));
        assert_eq!(mem, MemoryImage::new());
    }

    #[test]
    fn empty_image_is_rejected() {
        let mut mem = MemoryImage::new();
        assert!(matches!(mem.load_bytes(&[]), Err(ImageLoadError::Empty)));
    }

    #[test]
    fn image_must_fit() {
        let mut mem = MemoryImage::new();
        assert!(mem.load_raw(&[0xFFFF, 1]).is_ok());
        assert_eq!(mem.read(0xFFFF), 1);

        let mut mem = MemoryImage::new();
        let err = mem.load_raw(&[0xFFFF, 1, 2]).unwrap_err();
        assert!(matches!(err, ImageLoadError::TooLong { orig: 0xFFFF, len: 2 }));
        assert_eq!(mem, MemoryImage::new());
    }

    #[test]
    fn origin_only_image() {
        let mut mem = MemoryImage::new();
        assert_eq!(mem.load_raw(&[0x4000]).unwrap(), 0x4000);
        assert_eq!(mem, MemoryImage::new());
    }
}
