use std::{
    io::{ErrorKind, Read, Write},
    thread,
    time::Duration,
};

use crate::{LightDeckError, Result, WireFrame};

/// Outbound half of the fixture channel.
pub trait FrameSink: Send {
    fn send(&mut self, frame: &WireFrame) -> Result<()>;
}

/// Inbound half of the fixture channel. The payload is never interpreted.
pub trait DrainSource: Send {
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize>;
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn send(&mut self, frame: &WireFrame) -> Result<()> {
        (**self).send(frame)
    }
}

impl<T: DrainSource + ?Sized> DrainSource for Box<T> {
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize> {
        (**self).receive(buffer)
    }
}

/// Writes every frame to a byte stream, e.g. an opened device node.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> FrameSink for WriterSink<W> {
    fn send(&mut self, frame: &WireFrame) -> Result<()> {
        self.writer
            .write_all(frame)
            .and_then(|()| self.writer.flush())
            .map_err(|err| LightDeckError::TransportSend(err.to_string()))
    }
}

/// Reads and discards whatever the fixture sends back.
#[derive(Debug)]
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read + Send> DrainSource for ReaderSource<R> {
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.reader.read(buffer) {
            Ok(0) => Err(LightDeckError::TransportClosed),
            Ok(read) => Ok(read),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) => Err(LightDeckError::TransportReceive(err.to_string())),
        }
    }
}

/// Stand-in fixture for dry runs: accepts every frame, receives nothing.
#[derive(Debug, Clone)]
pub struct NullTransport {
    idle: Duration,
    sent: u64,
}

impl NullTransport {
    /// `idle` is how long each receive blocks before reporting no data.
    pub fn new(idle: Duration) -> Self {
        Self { idle, sent: 0 }
    }

    pub fn frames_sent(&self) -> u64 {
        self.sent
    }
}

impl FrameSink for NullTransport {
    fn send(&mut self, frame: &WireFrame) -> Result<()> {
        self.sent += 1;
        tracing::trace!(frame = self.sent, bytes = frame.len(), "dropped frame");
        Ok(())
    }
}

impl DrainSource for NullTransport {
    fn receive(&mut self, _buffer: &mut [u8]) -> Result<usize> {
        thread::sleep(self.idle);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;
    use crate::FRAME_LEN;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_sink_emits_whole_frames() {
        let mut sink = WriterSink::new(Vec::new());
        let mut frame = [0u8; FRAME_LEN];
        frame[FRAME_LEN - 1] = 9;

        sink.send(&frame).unwrap();
        sink.send(&frame).unwrap();

        let written = sink.into_inner();
        assert_eq!(written.len(), 2 * FRAME_LEN);
        assert_eq!(written[FRAME_LEN - 1], 9);
    }

    #[test]
    fn writer_errors_become_send_failures() {
        let mut sink = WriterSink::new(BrokenPipe);
        let err = sink.send(&[0; FRAME_LEN]).unwrap_err();

        assert!(matches!(err, LightDeckError::TransportSend(ref msg) if msg.contains("unplugged")));
    }

    #[test]
    fn reader_source_reports_end_of_stream() {
        let mut source = ReaderSource::new(Cursor::new(vec![1, 2, 3]));
        let mut buffer = [0u8; 1024];

        assert_eq!(source.receive(&mut buffer).unwrap(), 3);
        assert!(matches!(
            source.receive(&mut buffer),
            Err(LightDeckError::TransportClosed)
        ));
    }

    #[test]
    fn null_transport_counts_frames() {
        let mut null = NullTransport::new(Duration::ZERO);
        null.send(&[0; FRAME_LEN]).unwrap();
        null.send(&[0; FRAME_LEN]).unwrap();

        assert_eq!(null.frames_sent(), 2);
        assert_eq!(null.receive(&mut [0u8; 16]).unwrap(), 0);
    }
}
