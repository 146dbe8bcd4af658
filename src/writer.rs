use std::io;

use crate::engine::Producer;
use crate::worker::on_flusher_thread;

/// `io::Write` adapter that queues every line as one CloudWatch record.
///
/// Lines longer than a record allows are split, like any other oversized
/// message. Lines written from the background flusher thread are discarded.
pub struct LogWriter {
    line_writer: io::LineWriter<Inner>,
}

impl LogWriter {
    pub fn new(producer: Producer) -> Self {
        let line_writer = io::LineWriter::new(Inner { producer });
        Self { line_writer }
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.line_writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.line_writer.flush()
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> io::Result<usize> {
        self.line_writer.write_vectored(bufs)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.line_writer.write_all(buf)
    }

    fn write_fmt(&mut self, fmt: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.line_writer.write_fmt(fmt)
    }
}

struct Inner {
    producer: Producer,
}

impl Inner {
    fn enqueue_lines(&self, buf: &[u8]) -> io::Result<()> {
        if on_flusher_thread() {
            return Ok(());
        }
        let text = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        for line in text.lines().filter(|line| !line.is_empty()) {
            self.producer
                .enqueue(line)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        }
        Ok(())
    }
}

impl io::Write for Inner {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.enqueue_lines(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write(buf).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;
    use crate::client::mock::MockLogs;
    use crate::engine::DeliveryEngine;
    use crate::error::Error;

    fn engine() -> (DeliveryEngine<MockLogs>, Arc<MockLogs>) {
        let mock = Arc::new(MockLogs::default());
        (DeliveryEngine::new(mock.clone(), "writer-logs"), mock)
    }

    #[tokio::test]
    async fn each_line_becomes_one_record() {
        let (mut engine, mock) = engine();
        let mut writer = LogWriter::new(engine.producer());

        writer.write_all(b"first line\nsecond ").unwrap();
        writer.write_all(b"line\n\n").unwrap();
        writer.flush().unwrap();

        engine.flush().await.unwrap();
        assert_eq!(mock.put_messages(), ["first line", "second line"]);
    }

    #[test]
    fn rejects_invalid_utf8() {
        let (engine, _) = engine();
        let mut writer = LogWriter::new(engine.producer());

        let err = writer.write_all(b"\xff\xfe\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(engine.queue_depth(), 0);
    }

    #[test]
    fn closed_queue_is_an_io_error() {
        let (engine, _) = engine();
        let mut writer = LogWriter::new(engine.producer());
        engine.close();

        let err = writer.write_all(b"too late\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(err.to_string(), Error::Closed.to_string());
    }

    #[test]
    fn lines_from_the_flusher_thread_are_dropped() {
        let (engine, _) = engine();
        let producer = engine.producer();

        std::thread::spawn(move || {
            crate::worker::mark_flusher_thread();
            let mut writer = LogWriter::new(producer);
            writer.write_all(b"sent log batch\n").unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(engine.queue_depth(), 0);
    }

    #[test]
    fn works_as_a_tracing_subscriber_writer() {
        let (engine, _) = engine();
        let producer = engine.producer();
        let subscriber = tracing_subscriber::fmt()
            .without_time()
            .with_writer(move || LogWriter::new(producer.clone()))
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user = "ada", "signed in");
        });

        assert_eq!(engine.queue_depth(), 1);
    }
}
