//! Sinks for results that are produced incrementally.

use std::io;

/// Errors that can occur while writing to a [`Stream`].
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Writing to the underlying sink failed
    #[error(transparent)]
    Io(#[from] io::Error),
    /// A value could not be serialized
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A sink receiving JSON values one at a time.
pub trait Stream: Send {
    /// Writes the next value.
    fn write_json(&mut self, value: &serde_json::Value) -> Result<(), StreamError>;

    /// Flushes values written so far.
    fn flush(&mut self) -> Result<(), StreamError>;
}

/// Collects the written values in memory.
#[derive(Debug, Default)]
pub struct VecStream {
    values: Vec<serde_json::Value>,
    flushes: usize,
}

impl VecStream {
    /// The values written so far.
    pub fn values(&self) -> &[serde_json::Value] {
        &self.values
    }

    /// Consumes the stream, returning the written values.
    pub fn into_values(self) -> Vec<serde_json::Value> {
        self.values
    }

    /// Number of times the stream was flushed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl Stream for VecStream {
    fn write_json(&mut self, value: &serde_json::Value) -> Result<(), StreamError> {
        self.values.push(value.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Writes the values as the elements of a JSON array.
///
/// The closing bracket is only written by [`JsonArrayWriter::finish`].
#[derive(Debug)]
pub struct JsonArrayWriter<WriterT: io::Write> {
    writer: WriterT,
    count: usize,
}

impl<WriterT: io::Write> JsonArrayWriter<WriterT> {
    /// Constructs a writer emitting to `writer`.
    pub fn new(writer: WriterT) -> Self {
        Self { writer, count: 0 }
    }

    /// Number of elements written so far.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether no element has been written yet.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Closes the array and returns the underlying writer.
    pub fn finish(mut self) -> Result<WriterT, StreamError> {
        let closing: &[u8] = if self.count == 0 { b"[]" } else { b"]" };
        self.writer.write_all(closing)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<WriterT: io::Write + Send> Stream for JsonArrayWriter<WriterT> {
    fn write_json(&mut self, value: &serde_json::Value) -> Result<(), StreamError> {
        let separator: &[u8] = if self.count == 0 { b"[" } else { b"," };
        self.writer.write_all(separator)?;
        serde_json::to_writer(&mut self.writer, value)?;
        self.count += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StreamError> {
        Ok(self.writer.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn writes_array() -> anyhow::Result<()> {
        let mut writer = JsonArrayWriter::new(Vec::new());
        writer.write_json(&json!({"a": 1}))?;
        writer.write_json(&json!("0x2"))?;
        writer.flush()?;
        assert_eq!(writer.len(), 2);

        let output = writer.finish()?;
        assert_eq!(String::from_utf8(output)?, r#"[{"a":1},"0x2"]"#);
        Ok(())
    }

    #[test]
    fn writes_empty_array() -> anyhow::Result<()> {
        let writer = JsonArrayWriter::new(Vec::new());
        assert!(writer.is_empty());
        assert_eq!(writer.finish()?, b"[]");
        Ok(())
    }

    #[test]
    fn collects_values() -> anyhow::Result<()> {
        let mut stream = VecStream::default();
        stream.write_json(&json!(1))?;
        stream.flush()?;

        assert_eq!(stream.values(), &[json!(1)]);
        assert_eq!(stream.flushes(), 1);
        Ok(())
    }
}
