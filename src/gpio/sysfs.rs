// Sysfs backend - /sys/class/gpio file interface

use super::{GpioChip, GpioError, GpioResult, OutputLine, check_pin};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/gpio";

/// Exports pins through `<root>/export` and drives them through
/// `<root>/gpioN/value`.
#[derive(Debug, Clone)]
pub struct SysfsChip {
    root: PathBuf,
}

impl SysfsChip {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for SysfsChip {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT)
    }
}

impl GpioChip for SysfsChip {
    fn acquire(&self, pin: u32) -> GpioResult<Box<dyn OutputLine>> {
        check_pin(pin)?;
        let line = SysfsLine {
            root: self.root.clone(),
            pin,
            value: None,
        };
        // Already exported (by us or someone else) is fine
        if !line.is_exported() {
            write_control(&self.root.join("export"), pin)
                .map_err(|source| GpioError::Export { pin, source })?;
        }
        Ok(Box::new(line))
    }
}

pub struct SysfsLine {
    root: PathBuf,
    pin: u32,
    value: Option<File>,
}

impl SysfsLine {
    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    fn is_exported(&self) -> bool {
        self.pin_dir().exists()
    }

    fn write_value(&mut self, byte: &[u8]) {
        if let Some(file) = &self.value {
            // Unchecked: the scheduler has no error path once running
            let _ = file.write_at(byte, 0);
        }
    }
}

impl OutputLine for SysfsLine {
    fn pin(&self) -> u32 {
        self.pin
    }

    fn configure_output(&mut self) -> GpioResult<()> {
        let pin = self.pin;
        let dir = self.pin_dir();

        let mut direction = OpenOptions::new()
            .write(true)
            .open(dir.join("direction"))
            .map_err(|source| GpioError::Configure { pin, source })?;
        direction
            .write_all(b"out")
            .map_err(|source| GpioError::Configure { pin, source })?;

        let value = OpenOptions::new()
            .write(true)
            .open(dir.join("value"))
            .map_err(|source| GpioError::Open { pin, source })?;
        self.value = Some(value);
        Ok(())
    }

    fn set(&mut self) {
        self.write_value(b"1");
    }

    fn clear(&mut self) {
        self.write_value(b"0");
    }

    fn release(&mut self) -> GpioResult<()> {
        self.value = None;
        if !self.is_exported() {
            return Ok(());
        }
        let pin = self.pin;
        write_control(&self.root.join("unexport"), pin)
            .map_err(|source| GpioError::Unexport { pin, source })
    }
}

fn write_control(path: &Path, pin: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.write_all(pin.to_string().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn read_value(root: &Path, pin: u32) -> std::io::Result<String> {
        fs::read_to_string(root.join(format!("gpio{pin}")).join("value"))
    }

    /// Lays out a fake sysfs tree with the given pins already exported
    fn fake_sysfs(exported: &[u32]) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("export"), "").unwrap();
        fs::write(dir.path().join("unexport"), "").unwrap();
        for pin in exported {
            let pin_dir = dir.path().join(format!("gpio{pin}"));
            fs::create_dir(&pin_dir).unwrap();
            fs::write(pin_dir.join("direction"), "in").unwrap();
            fs::write(pin_dir.join("value"), "0").unwrap();
        }
        dir
    }

    #[test]
    fn test_already_exported_pin_is_tolerated() {
        let dir = fake_sysfs(&[17]);
        let chip = SysfsChip::new(dir.path());

        let mut line = chip.acquire(17).unwrap();
        line.configure_output().unwrap();

        // export was never written
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "");
        assert_eq!(
            fs::read_to_string(dir.path().join("gpio17/direction")).unwrap(),
            "out"
        );
    }

    #[test]
    fn test_export_written_for_new_pin() {
        let dir = fake_sysfs(&[]);
        let chip = SysfsChip::new(dir.path());

        let _line = chip.acquire(4).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "4");
    }

    #[test]
    fn test_set_and_clear_write_value() {
        let dir = fake_sysfs(&[22]);
        let chip = SysfsChip::new(dir.path());
        let mut line = chip.acquire(22).unwrap();
        line.configure_output().unwrap();

        line.set();
        assert_eq!(read_value(dir.path(), 22).unwrap(), "1");
        line.clear();
        assert_eq!(read_value(dir.path(), 22).unwrap(), "0");
        line.write(true);
        assert_eq!(read_value(dir.path(), 22).unwrap(), "1");
    }

    #[test]
    fn test_missing_export_file_reports_pin() {
        let dir = TempDir::new().unwrap();
        let chip = SysfsChip::new(dir.path());

        let err = chip.acquire(9).err().unwrap();
        assert!(matches!(err, GpioError::Export { pin: 9, .. }));
    }

    #[test]
    fn test_configure_fails_when_pin_dir_missing() {
        // export accepted but the kernel never created gpio5/
        let dir = fake_sysfs(&[]);
        let chip = SysfsChip::new(dir.path());
        let mut line = chip.acquire(5).unwrap();

        let err = line.configure_output().unwrap_err();
        assert!(matches!(err, GpioError::Configure { pin: 5, .. }));
    }

    #[test]
    fn test_release_unexports() {
        let dir = fake_sysfs(&[27]);
        let chip = SysfsChip::new(dir.path());
        let mut line = chip.acquire(27).unwrap();
        line.configure_output().unwrap();

        line.release().unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("unexport")).unwrap(),
            "27"
        );
    }

    #[test]
    fn test_default_root() {
        assert_eq!(SysfsChip::default().root(), Path::new("/sys/class/gpio"));
    }

    #[test]
    fn test_invalid_pin_rejected() {
        let dir = fake_sysfs(&[]);
        let chip = SysfsChip::new(dir.path());
        assert!(matches!(chip.acquire(99), Err(GpioError::InvalidPin(99))));
    }
}
