use embedded_hal::i2c::Error as I2cErrorTrait;
use embedded_hal_async::i2c::I2c;

use crate::Error;

/// Byte-wide register access to the transmitter.
///
/// The driver and the RDS pacer only ever talk to the chip through this
/// trait, so the pacing logic can run against a simulated register file.
pub trait RegisterBus {
    /// Read one register.
    async fn read_register(&mut self, reg: u8) -> Result<u8, Error>;
    /// Write one register.
    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error>;
}

/// [`RegisterBus`] over an async I2C peripheral.
#[derive(Debug)]
pub struct I2cRegisterBus<T: I2c, const A: u8 = 0x2C> {
    i2c: T,
}

impl<T: I2c, const A: u8> I2cRegisterBus<T, A> {
    const I2C_ADDRESS: u8 = A;

    pub fn new(i2c: T) -> Self {
        Self { i2c }
    }

    /// Address the chip with an empty write.
    /// Returns `Ok(())` when the chip acknowledges its address.
    pub async fn probe(&mut self) -> Result<(), Error> {
        self.i2c
            .write(Self::I2C_ADDRESS, &[])
            .await
            .map_err(|e| Error::I2c(e.kind()))
    }

    pub fn release(self) -> T {
        self.i2c
    }
}

impl<T: I2c, const A: u8> RegisterBus for I2cRegisterBus<T, A> {
    async fn read_register(&mut self, reg: u8) -> Result<u8, Error> {
        let mut value: [u8; 1] = [0];
        self.i2c
            .write_read(Self::I2C_ADDRESS, &[reg], &mut value)
            .await
            .map_err(|e| Error::I2c(e.kind()))?;
        Ok(value[0])
    }

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        self.i2c
            .write(Self::I2C_ADDRESS, &[reg, value])
            .await
            .map_err(|e| Error::I2c(e.kind()))
    }
}

impl<B: RegisterBus> RegisterBus for &mut B {
    async fn read_register(&mut self, reg: u8) -> Result<u8, Error> {
        (**self).read_register(reg).await
    }

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        (**self).write_register(reg, value).await
    }
}
