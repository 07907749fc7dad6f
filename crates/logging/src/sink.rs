// crates/logging/src/sink.rs
use std::fs::File;
use std::io;

use tracing_subscriber::fmt::writer::MakeWriter;

/// Writes console output to standard error.
///
/// The handle is looked up for every event, so output follows fd 2 after
/// daemonization has redirected it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = io::Stderr;

    fn make_writer(&'a self) -> Self::Writer {
        io::stderr()
    }
}

/// Appends formatted events to an already opened log file.
#[derive(Debug)]
pub struct FileWriter {
    file: File,
}

impl FileWriter {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

impl<'a> MakeWriter<'a> for FileWriter {
    type Writer = &'a File;

    fn make_writer(&'a self) -> Self::Writer {
        &self.file
    }
}
