//! WS2812 strip output over RMT

use anyhow::Result;
use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::rmt::{RmtChannel, TxRmtDriver};
use log::debug;
use lumeload_strip_lib::{PixelSink, RGB8};
use smart_leds::SmartLedsWrite;
use std::thread::sleep;
use std::time::Duration;
use ws2812_esp32_rmt_driver::Ws2812Esp32Rmt;

/// Frame buffer in front of the WS2812 driver. Pixels are staged in memory
/// and shifted out in one transfer on commit.
pub struct StripDriver {
    driver: Ws2812Esp32Rmt<'static>,
    pixels: Vec<RGB8>,
}

impl StripDriver {
    pub fn new<C: RmtChannel, P: OutputPin>(
        pin: impl Peripheral<P = P> + 'static,
        channel: impl Peripheral<P = C> + 'static,
        num_pixels: usize,
    ) -> Result<Self> {
        debug!("Creating strip driver for {num_pixels} pixels");
        // Extra RMT memory blocks keep the bit stream steady while WiFi interrupts
        let config = TransmitConfig::new().clock_divider(1).mem_block_num(4);
        let tx_driver = TxRmtDriver::new(channel, pin, &config)?;
        let driver = Ws2812Esp32Rmt::new_with_rmt_driver(tx_driver)?;

        Ok(Self {
            driver,
            pixels: vec![RGB8::default(); num_pixels],
        })
    }

    /// Blink the strip purple 3 times (250ms each) as a boot indicator
    pub fn boot_animation(&mut self) -> Result<()> {
        let purple = RGB8::new(128, 0, 128);
        let blink_duration = Duration::from_millis(250);

        for _ in 0..3 {
            self.pixels.fill(purple);
            self.commit()?;
            sleep(blink_duration);

            self.clear()?;
            sleep(blink_duration);
        }

        Ok(())
    }
}

impl PixelSink for StripDriver {
    type Error = <Ws2812Esp32Rmt<'static> as SmartLedsWrite>::Error;

    fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.driver.write(self.pixels.iter().copied())
    }
}
