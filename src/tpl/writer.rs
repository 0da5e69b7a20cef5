use std::cell::RefCell;
use std::fmt;
use std::io;
use std::ops::{Deref, DerefMut};

use crate::Result;
use crate::error::Error;
use crate::value::{Datum, Value, write_float};

/// Output sink for template execution.
///
/// Raw strings pass through untouched; values are HTML-escaped unless they are
/// marked safe or escaping is switched off for this writer.
pub struct TemplateWriter<'w> {
    out: &'w mut dyn fmt::Write,
    autoescape: bool,
}

fn sink_error(_: fmt::Error) -> Error {
    Error::Io(io::Error::other("output sink rejected write"))
}

impl<'w> TemplateWriter<'w> {
    pub fn new(out: &'w mut dyn fmt::Write, autoescape: bool) -> Self {
        Self { out, autoescape }
    }

    pub fn autoescape(&self) -> bool {
        self.autoescape
    }

    /// A writer with the same escaping mode onto another sink.
    pub fn redirect<'o>(&self, out: &'o mut dyn fmt::Write) -> TemplateWriter<'o> {
        TemplateWriter::new(out, self.autoescape)
    }

    /// This writer's sink with a different escaping mode.
    pub fn with_autoescape(&mut self, autoescape: bool) -> TemplateWriter<'_> {
        TemplateWriter::new(&mut *self.out, autoescape)
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.out.write_str(s).map_err(sink_error)
    }

    /// Writes a value's text. Common scalar kinds are formatted directly; all
    /// other kinds go through `Value`'s `Display`, producing identical text.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        let escape = self.autoescape && !value.is_safe();
        let out = &mut *self.out;
        let res = match value.resolve() {
            Datum::Nil => Ok(()),
            Datum::Str(s) if escape => escape_html(out, s),
            Datum::Str(s) => out.write_str(s),
            Datum::Bool(true) => out.write_str("True"),
            Datum::Bool(false) => out.write_str("False"),
            Datum::I8(n) => write!(out, "{}", n),
            Datum::I16(n) => write!(out, "{}", n),
            Datum::I32(n) => write!(out, "{}", n),
            Datum::I64(n) => write!(out, "{}", n),
            Datum::I128(n) => write!(out, "{}", n),
            Datum::U8(n) => write!(out, "{}", n),
            Datum::U16(n) => write!(out, "{}", n),
            Datum::U32(n) => write!(out, "{}", n),
            Datum::U64(n) => write!(out, "{}", n),
            Datum::U128(n) => write!(out, "{}", n),
            Datum::F32(f) => write_float(out, *f as f64),
            Datum::F64(f) => write_float(out, *f),
            _ => {
                let text = value.to_string();
                if escape {
                    escape_html(out, &text)
                } else {
                    out.write_str(&text)
                }
            }
        };
        res.map_err(sink_error)
    }
}

/// Writes `s` with `& < > " '` replaced by entities and NUL by U+FFFD.
pub fn escape_html(out: &mut dyn fmt::Write, s: &str) -> fmt::Result {
    let mut last = 0;
    for (i, b) in s.bytes().enumerate() {
        let entity = match b {
            b'\0' => "\u{FFFD}",
            b'"' => "&quot;",
            b'\'' => "&#39;",
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            _ => continue,
        };
        out.write_str(&s[last..i])?;
        out.write_str(entity)?;
        last = i + 1;
    }
    out.write_str(&s[last..])
}

pub fn escape_html_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    // writing into a String cannot fail
    let _ = escape_html(&mut out, s);
    out
}

/// Adapts an `io::Write` to the writer's `fmt::Write` sink, keeping the I/O error.
pub(crate) struct IoSink<W: io::Write> {
    inner: W,
    error: Option<io::Error>,
}

impl<W: io::Write> IoSink<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self { inner, error: None }
    }

    pub(crate) fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

impl<W: io::Write> fmt::Write for IoSink<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write_all(s.as_bytes()).map_err(|e| {
            self.error = Some(e);
            fmt::Error
        })
    }
}

/// Scratch buffers for one render call.
///
/// Every checkout is exclusive and the buffer is cleared when it goes back,
/// including on error paths.
#[derive(Default)]
pub struct BufferPool {
    free: RefCell<Vec<String>>,
}

impl BufferPool {
    pub fn checkout(&self) -> PooledBuffer<'_> {
        let buf = self
            .free
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| String::with_capacity(1024));
        PooledBuffer { pool: self, buf }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.free.borrow().len()
    }
}

pub struct PooledBuffer<'p> {
    pool: &'p BufferPool,
    buf: String,
}

impl Deref for PooledBuffer<'_> {
    type Target = String;

    fn deref(&self) -> &String {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut String {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        self.pool.free.borrow_mut().push(buf);
    }
}
