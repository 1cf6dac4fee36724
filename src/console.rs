//! Blocking UART console output shared by the command line and the logger.

use core::cell::RefCell;
use critical_section::Mutex;

use embassy_nrf::uarte;

static CONSOLE_TX: Mutex<RefCell<Option<uarte::UarteTx<'static>>>> = Mutex::new(RefCell::new(None));

pub fn stdout_init(tx: uarte::UarteTx<'static>) {
    critical_section::with(|cs| {
        CONSOLE_TX.borrow_ref_mut(cs).replace(tx);
    });
}

pub fn stdout_get() -> StdOut {
    StdOut
}

/// Output is dropped until [`stdout_init`] has run.
fn write_bytes(buf: &[u8]) -> Result<usize, uarte::Error> {
    critical_section::with(|cs| {
        if let Some(tx) = CONSOLE_TX.borrow_ref_mut(cs).as_mut() {
            tx.blocking_write(buf)?;
        }
        Ok(buf.len())
    })
}

pub struct StdOut;

impl embedded_io::ErrorType for StdOut {
    type Error = uarte::Error;
}

impl embedded_io::Write for StdOut {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        write_bytes(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl core::fmt::Write for StdOut {
    /// Bare line feeds go out as CR LF.
    fn write_str(&mut self, s: &str) -> Result<(), core::fmt::Error> {
        let mut lines = s.split('\n');
        if let Some(first) = lines.next() {
            write_bytes(first.as_bytes()).map_err(|_| core::fmt::Error)?;
        }
        for line in lines {
            write_bytes(b"\r\n").map_err(|_| core::fmt::Error)?;
            write_bytes(line.as_bytes()).map_err(|_| core::fmt::Error)?;
        }
        Ok(())
    }
}
