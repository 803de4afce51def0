//! BCM2835-family GPIO driver.
//!
//! Maps the GPIO register block through `/dev/gpiomem` (no root needed on
//! Raspberry Pi OS) and drives pins through the GPSET/GPCLR registers, which
//! makes `write` a single lock-free volatile store.

use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;
use stepr_common::consts::MAX_GPIO_PIN;
use stepr_common::hal::config::HardwareConfig;
use stepr_common::hal::driver::{GpioDriver, HalError, Level};
use tracing::info;

/// Size of the mapped GPIO register block.
const GPIO_BLOCK_SIZE: usize = 4096;

/// Function select registers (3 bits per pin, 10 pins per register).
const GPFSEL0: usize = 0x00 / 4;
/// Output set registers.
const GPSET0: usize = 0x1C / 4;
/// Output clear registers.
const GPCLR0: usize = 0x28 / 4;

const FSEL_OUTPUT: u32 = 0b001;
const FSEL_MASK: u32 = 0b111;

/// Memory-mapped GPIO register access.
pub struct Bcm2835Gpio {
    /// Keeps the mapping alive for `regs`.
    _map: MmapMut,
    regs: *mut u32,
    /// Serializes read-modify-write of the function select registers.
    fsel_lock: Mutex<()>,
}

// SAFETY: `regs` points into `_map`, which lives as long as the driver.
// GPSET/GPCLR stores are independent per bit; GPFSEL updates are serialized
// by `fsel_lock`.
unsafe impl Send for Bcm2835Gpio {}
unsafe impl Sync for Bcm2835Gpio {}

impl Bcm2835Gpio {
    /// Map the GPIO register block from `path` (normally `/dev/gpiomem`).
    ///
    /// # Errors
    /// `HalError::HardwareUnavailable` if the device cannot be opened or mapped.
    pub fn open(path: &Path) -> Result<Self, HalError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(|e| {
                HalError::HardwareUnavailable(format!("cannot open {}: {e}", path.display()))
            })?;

        // SAFETY: the device file stays valid for the mapping's lifetime; all
        // accesses go through volatile reads/writes.
        let mut map = unsafe { MmapOptions::new().len(GPIO_BLOCK_SIZE).map_mut(&file) }
            .map_err(|e| {
                HalError::HardwareUnavailable(format!("cannot map {}: {e}", path.display()))
            })?;
        let regs = map.as_mut_ptr() as *mut u32;

        info!("Mapped GPIO registers from {}", path.display());
        Ok(Self {
            _map: map,
            regs,
            fsel_lock: Mutex::new(()),
        })
    }

    #[inline]
    fn reg_write(&self, index: usize, value: u32) {
        // SAFETY: every index used is below GPIO_BLOCK_SIZE / 4.
        unsafe { core::ptr::write_volatile(self.regs.add(index), value) }
    }

    #[inline]
    fn reg_read(&self, index: usize) -> u32 {
        // SAFETY: see reg_write.
        unsafe { core::ptr::read_volatile(self.regs.add(index)) }
    }
}

/// Function-select register index and bit shift for a pin.
fn fsel_position(pin: u8) -> (usize, u32) {
    (GPFSEL0 + pin as usize / 10, (pin as u32 % 10) * 3)
}

/// Set/clear register bank offset and bit mask for a pin.
fn bank_bit(pin: u8) -> (usize, u32) {
    (pin as usize / 32, 1u32 << (pin % 32))
}

impl GpioDriver for Bcm2835Gpio {
    fn name(&self) -> &'static str {
        "bcm2835"
    }

    fn configure_output(&self, pin: u8) -> Result<(), HalError> {
        if pin > MAX_GPIO_PIN {
            return Err(HalError::InvalidPin(pin));
        }
        let (reg, shift) = fsel_position(pin);
        let _guard = self.fsel_lock.lock();
        let value = (self.reg_read(reg) & !(FSEL_MASK << shift)) | (FSEL_OUTPUT << shift);
        self.reg_write(reg, value);
        Ok(())
    }

    #[inline]
    fn write(&self, pin: u8, level: Level) {
        if pin > MAX_GPIO_PIN {
            return;
        }
        let (bank, bit) = bank_bit(pin);
        let base = if level.is_high() { GPSET0 } else { GPCLR0 };
        self.reg_write(base + bank, bit);
    }
}

/// Factory function registered under "bcm2835".
pub fn create_driver(config: &HardwareConfig) -> Result<Arc<dyn GpioDriver>, HalError> {
    Ok(Arc::new(Bcm2835Gpio::open(&config.gpio_mem_path)?))
}
