//! Terminal stand-ins for the strip hardware and the WebSocket clients.

use lumeload_strip_lib::{PixelSink, StateObserver, RGB8};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

/// Draws the strip as one line of 24-bit colored blocks, redrawn in place on
/// every commit.
pub struct TerminalStrip<W: Write> {
    out: W,
    pixels: Vec<RGB8>,
    commits: u64,
}

impl<W: Write> TerminalStrip<W> {
    pub fn new(out: W, num_pixels: usize) -> Self {
        Self {
            out,
            pixels: vec![RGB8::default(); num_pixels],
            commits: 0,
        }
    }

    pub const fn commits(&self) -> u64 {
        self.commits
    }

    /// End the in-place line so following output starts on a fresh one.
    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> PixelSink for TerminalStrip<W> {
    type Error = io::Error;

    fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn commit(&mut self) -> io::Result<()> {
        let mut line = String::with_capacity(self.pixels.len() * 20 + 8);
        line.push('\r');
        for p in &self.pixels {
            let _ = write!(line, "\x1b[38;2;{};{};{}m\u{2588}", p.r, p.g, p.b);
        }
        line.push_str("\x1b[0m");
        self.out.write_all(line.as_bytes())?;
        self.out.flush()?;
        self.commits += 1;
        Ok(())
    }
}

/// Prints every broadcast as one line, the way a connected client would
/// receive it.
pub struct ConsoleObserver<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }
}

impl<W: Write + Send> StateObserver for ConsoleObserver<W> {
    fn broadcast(&self, message: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "<- {message}") {
            log::warn!("Failed to print broadcast: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_draws_every_pixel() {
        let mut strip = TerminalStrip::new(Vec::new(), 3);
        strip.set_pixel(0, RGB8::new(255, 0, 0));
        strip.set_pixel(2, RGB8::new(0, 0, 9));
        strip.set_pixel(5, RGB8::new(1, 1, 1));
        strip.commit().unwrap();

        let text = String::from_utf8(strip.out.clone()).unwrap();
        assert!(text.starts_with('\r'));
        assert!(text.ends_with("\x1b[0m"));
        assert_eq!(text.matches('\u{2588}').count(), 3);
        assert!(text.contains("\x1b[38;2;255;0;0m"));
        assert!(text.contains("\x1b[38;2;0;0;0m"));
        assert!(text.contains("\x1b[38;2;0;0;9m"));
        assert_eq!(strip.commits(), 1);
    }

    #[test]
    fn test_clear_draws_dark_strip() {
        let mut strip = TerminalStrip::new(Vec::new(), 2);
        strip.set_pixel(1, RGB8::new(7, 7, 7));
        strip.clear().unwrap();
        let text = String::from_utf8(strip.out.clone()).unwrap();
        assert_eq!(text.matches("\x1b[38;2;0;0;0m").count(), 2);
    }

    #[test]
    fn test_observer_prints_each_broadcast() {
        let observer = ConsoleObserver::new(Vec::new());
        observer.broadcast(r#"{"mode":1}"#);
        observer.broadcast(r#"{"mode":2}"#);
        let text = String::from_utf8(observer.out.into_inner().unwrap()).unwrap();
        assert_eq!(text, "<- {\"mode\":1}\n<- {\"mode\":2}\n");
    }
}
