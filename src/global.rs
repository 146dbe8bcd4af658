//! Optional process-wide logger for code that does not carry a logger around.

use std::sync::Arc;

use parking_lot::{const_rwlock, RwLock};

use crate::error::Error;
use crate::logger::{Fields, Level, Logger};

static LOGGER: RwLock<Option<Arc<dyn Logger>>> = const_rwlock(None);

/// Installs `logger` as the process-wide default, returning the previous one.
pub fn set_logger(logger: Arc<dyn Logger>) -> Option<Arc<dyn Logger>> {
    LOGGER.write().replace(logger)
}

/// Removes the process-wide default.
pub fn clear_logger() -> Option<Arc<dyn Logger>> {
    LOGGER.write().take()
}

fn log(level: Level, fields: Fields) -> Result<(), Error> {
    // Clone out of the lock so a slow sink does not block set_logger.
    let logger = LOGGER.read().clone().ok_or(Error::NotInitialized)?;
    logger.log(level, fields)
}

/// Logs at info level through the default logger.
pub fn info(fields: Fields) -> Result<(), Error> {
    log(Level::Info, fields)
}

/// Logs at error level through the default logger.
pub fn error(fields: Fields) -> Result<(), Error> {
    log(Level::Error, fields)
}

/// Logs at debug level through the default logger.
pub fn debug(fields: Fields) -> Result<(), Error> {
    log(Level::Debug, fields)
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};

    use parking_lot::Mutex;

    use super::*;
    use crate::standard::StandardLogger;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // One test, since the default logger is shared by the whole test binary.
    #[test]
    fn shorthands_require_an_installed_logger() {
        clear_logger();
        assert!(matches!(info(Fields::new()), Err(Error::NotInitialized)));
        assert!(matches!(error(Fields::new()), Err(Error::NotInitialized)));
        assert!(matches!(debug(Fields::new()), Err(Error::NotInitialized)));

        let buf = SharedBuf::default();
        assert!(set_logger(Arc::new(StandardLogger::new(buf.clone(), Fields::new()))).is_none());
        info(Fields::new().with("msg", "one")).unwrap();
        error(Fields::new().with("msg", "two")).unwrap();
        debug(Fields::new().with("msg", "three")).unwrap();

        let output = String::from_utf8(buf.0.lock().clone()).unwrap();
        let levels: Vec<String> = output
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["level"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(levels, ["info", "error", "debug"]);

        assert!(clear_logger().is_some());
        assert!(matches!(info(Fields::new()), Err(Error::NotInitialized)));
    }
}
