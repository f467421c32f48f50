use std::io::Write;

use tailcat_api::TailError;

/// Streams already-rendered elements as one JSON array.
///
/// Nothing is written until the first element or [`finish`](Self::finish),
/// so an empty session prints exactly `[]`. Every write is flushed so that
/// a reader of a follow session sees elements as they arrive.
pub struct JsonArrayEmitter<W: Write> {
    out: W,
    emitted: u64,
    finished: bool,
}

impl<W: Write> JsonArrayEmitter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            emitted: 0,
            finished: false,
        }
    }

    /// Number of elements written so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Write one element, preceded by the opening bracket or a separator.
    pub fn emit(&mut self, element: &str) -> Result<(), TailError> {
        self.write_element(element)?;
        self.out.flush()?;
        Ok(())
    }

    /// Write a buffered run of elements in order, flushing once at the end.
    pub fn emit_batch<I>(&mut self, elements: I) -> Result<(), TailError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for element in elements {
            self.write_element(element.as_ref())?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Close the array. Safe to call more than once.
    pub fn finish(&mut self) -> Result<(), TailError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let closing: &[u8] = if self.emitted == 0 { b"[]\n" } else { b"\n]\n" };
        self.out.write_all(closing)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_element(&mut self, element: &str) -> Result<(), TailError> {
        let prefix: &[u8] = if self.emitted == 0 { b"[\n" } else { b",\n" };
        self.out.write_all(prefix)?;
        self.out.write_all(element.as_bytes())?;
        self.emitted += 1;
        Ok(())
    }
}
