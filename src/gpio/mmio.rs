// Memory-mapped backend - BCM283x GPIO register block
//
// /dev/gpiomem exposes the GPIO register page without root. Layout (32-bit
// registers): GPFSEL0..5 at 0x00 (3 bits per pin, 10 pins per register),
// GPSET0/1 at 0x1C/0x20, GPCLR0/1 at 0x28/0x2C.

use super::{GpioChip, GpioError, GpioResult, OutputLine, check_pin};
use memmap2::{MmapOptions, MmapRaw};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_GPIOMEM: &str = "/dev/gpiomem";

const BLOCK_SIZE: usize = 4096;
const GPFSEL0: usize = 0x00;
const GPSET0: usize = 0x1C;
const GPCLR0: usize = 0x28;

const FSEL_MASK: u32 = 0b111;
const FSEL_OUTPUT: u32 = 0b001;

/// Shared mapping of the register page
struct Registers {
    map: MmapRaw,
}

impl Registers {
    fn reg(&self, offset: usize) -> *mut u32 {
        debug_assert!(offset + 4 <= BLOCK_SIZE && offset % 4 == 0);
        // offset is a word-aligned register inside the mapped page
        self.map.as_mut_ptr().wrapping_add(offset).cast::<u32>()
    }

    fn read(&self, offset: usize) -> u32 {
        // SAFETY: `reg` stays within the BLOCK_SIZE mapping owned by `self`
        unsafe { self.reg(offset).read_volatile() }
    }

    fn write(&self, offset: usize, value: u32) {
        // SAFETY: see `read`
        unsafe { self.reg(offset).write_volatile(value) }
    }
}

/// Register-level chip. Cloning shares the same mapping.
#[derive(Clone)]
pub struct MmioChip {
    regs: Arc<Registers>,
    path: PathBuf,
}

impl MmioChip {
    /// Maps the register page of `path` (normally /dev/gpiomem)
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        let path = path.as_ref().to_path_buf();
        let map_err = |source| GpioError::Map {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(map_err)?;
        let map = MmapOptions::new()
            .len(BLOCK_SIZE)
            .map_raw(&file)
            .map_err(map_err)?;

        Ok(Self {
            regs: Arc::new(Registers { map }),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GpioChip for MmioChip {
    fn acquire(&self, pin: u32) -> GpioResult<Box<dyn OutputLine>> {
        check_pin(pin)?;
        Ok(Box::new(MmioLine {
            regs: Arc::clone(&self.regs),
            pin,
        }))
    }
}

pub struct MmioLine {
    regs: Arc<Registers>,
    pin: u32,
}

impl MmioLine {
    fn fsel_offset(&self) -> usize {
        GPFSEL0 + (self.pin as usize / 10) * 4
    }

    fn fsel_shift(&self) -> u32 {
        (self.pin % 10) * 3
    }

    fn bank_offset(&self, base: usize) -> usize {
        base + (self.pin as usize / 32) * 4
    }

    fn mask(&self) -> u32 {
        1 << (self.pin % 32)
    }

    fn set_function(&mut self, function: u32) {
        let offset = self.fsel_offset();
        let shift = self.fsel_shift();
        let current = self.regs.read(offset);
        self.regs
            .write(offset, (current & !(FSEL_MASK << shift)) | (function << shift));
    }
}

impl OutputLine for MmioLine {
    fn pin(&self) -> u32 {
        self.pin
    }

    fn configure_output(&mut self) -> GpioResult<()> {
        // Input first to clear all function bits, then output
        self.set_function(0);
        self.set_function(FSEL_OUTPUT);
        Ok(())
    }

    fn set(&mut self) {
        self.regs.write(self.bank_offset(GPSET0), self.mask());
    }

    fn clear(&mut self) {
        self.regs.write(self.bank_offset(GPCLR0), self.mask());
    }

    fn release(&mut self) -> GpioResult<()> {
        self.set_function(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::NamedTempFile;

    fn fake_gpiomem() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(BLOCK_SIZE as u64).unwrap();
        file
    }

    fn word(bytes: &[u8], offset: usize) -> u32 {
        u32::from_ne_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_configure_sets_function_bits() {
        let mem = fake_gpiomem();
        let chip = MmioChip::open(mem.path()).unwrap();

        let mut line = chip.acquire(17).unwrap();
        line.configure_output().unwrap();

        let bytes = fs::read(mem.path()).unwrap();
        // pin 17 lives in GPFSEL1, bits 21..24
        assert_eq!((word(&bytes, 0x04) >> 21) & FSEL_MASK, FSEL_OUTPUT);
    }

    #[test]
    fn test_configure_preserves_neighbours() {
        let mem = fake_gpiomem();
        let chip = MmioChip::open(mem.path()).unwrap();

        let mut a = chip.acquire(10).unwrap();
        let mut b = chip.acquire(11).unwrap();
        a.configure_output().unwrap();
        b.configure_output().unwrap();

        let bytes = fs::read(mem.path()).unwrap();
        let fsel1 = word(&bytes, 0x04);
        assert_eq!(fsel1 & FSEL_MASK, FSEL_OUTPUT);
        assert_eq!((fsel1 >> 3) & FSEL_MASK, FSEL_OUTPUT);
    }

    #[test]
    fn test_set_and_clear_hit_bank_registers() {
        let mem = fake_gpiomem();
        let chip = MmioChip::open(mem.path()).unwrap();

        let mut low = chip.acquire(4).unwrap();
        let mut high = chip.acquire(40).unwrap();
        low.set();
        high.clear();

        let bytes = fs::read(mem.path()).unwrap();
        assert_eq!(word(&bytes, GPSET0), 1 << 4);
        assert_eq!(word(&bytes, GPCLR0 + 4), 1 << 8);
    }

    #[test]
    fn test_open_keeps_device_path() {
        let mem = fake_gpiomem();
        let chip = MmioChip::open(mem.path()).unwrap();
        assert_eq!(chip.path(), mem.path());
    }

    #[test]
    fn test_open_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let result = MmioChip::open(dir.path().join("gpiomem"));
        assert!(matches!(result, Err(GpioError::Map { .. })));
    }
}
