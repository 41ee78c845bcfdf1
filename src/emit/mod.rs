//! Output dialects.
//!
//! Both emitters write through [`Sink`], a minimal byte sink so tests can
//! capture the stream in memory and compare byte-exact. The blanket
//! implementation makes any [`std::io::Write`] a sink; the binary hands in
//! a buffered, locked stdout.

use std::io;

pub mod git;
pub mod svn;

/// Byte sink for an emitted stream.
pub trait Sink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

impl<W: io::Write> Sink for W {
    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(self, buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}
