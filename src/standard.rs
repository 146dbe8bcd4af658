use std::io::{self, Write};

use chrono::Local;
use parking_lot::Mutex;

use crate::error::Error;
use crate::logger::{Fields, Level, Logger};

const TIME_KEY: &str = "time";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Writes each record as one line of JSON to `W`.
///
/// Writes go straight to the output under a lock; nothing is buffered or
/// batched.
pub struct StandardLogger<W> {
    output: Mutex<W>,
    global_fields: Fields,
}

impl StandardLogger<io::Stdout> {
    pub fn stdout(global_fields: Fields) -> Self {
        Self::new(io::stdout(), global_fields)
    }
}

impl<W> StandardLogger<W>
where
    W: Write + Send,
{
    pub fn new(output: W, global_fields: Fields) -> Self {
        Self {
            output: Mutex::new(output),
            global_fields,
        }
    }

    pub fn into_inner(self) -> W {
        self.output.into_inner()
    }
}

impl<W> Logger for StandardLogger<W>
where
    W: Write + Send,
{
    fn log(&self, level: Level, mut fields: Fields) -> Result<(), Error> {
        fields.insert(TIME_KEY, Local::now().format(TIME_FORMAT).to_string());
        let fields = fields.merge(&self.global_fields, level);

        let mut line = serde_json::to_vec(&fields)?;
        line.push(b'\n');

        let mut output = self.output.lock();
        output.write_all(&line)?;
        Ok(())
    }
}
