use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// A cloneable destination for subprocess output.
///
/// Clones share the same target, so a caller can hand a sink to a release
/// phase and inspect what was written afterwards.
#[derive(Clone)]
pub struct Sink {
    target: Arc<Mutex<Target>>,
}

enum Target {
    Stdout,
    Stderr,
    Memory(Vec<u8>),
    Writer(Box<dyn Write + Send>),
}

impl Sink {
    /// Forward to this process's standard output.
    pub fn stdout() -> Self {
        Self::new(Target::Stdout)
    }

    /// Forward to this process's standard error.
    pub fn stderr() -> Self {
        Self::new(Target::Stderr)
    }

    /// Collect everything in memory; read it back with [`Sink::contents`].
    pub fn memory() -> Self {
        Self::new(Target::Memory(Vec::new()))
    }

    pub fn from_writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self::new(Target::Writer(Box::new(writer)))
    }

    fn new(target: Target) -> Self {
        Self {
            target: Arc::new(Mutex::new(target)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Target> {
        match self.target.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Write and flush a chunk.
    pub fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        match &mut *self.lock() {
            Target::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()
            }
            Target::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(bytes)?;
                err.flush()
            }
            Target::Memory(buf) => {
                buf.extend_from_slice(bytes);
                Ok(())
            }
            Target::Writer(writer) => {
                writer.write_all(bytes)?;
                writer.flush()
            }
        }
    }

    /// Bytes collected so far. Empty for sinks that are not in-memory.
    pub fn contents(&self) -> Vec<u8> {
        match &*self.lock() {
            Target::Memory(buf) => buf.clone(),
            _ => Vec::new(),
        }
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).to_string()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &*self.lock() {
            Target::Stdout => "stdout",
            Target::Stderr => "stderr",
            Target::Memory(_) => "memory",
            Target::Writer(_) => "writer",
        };
        f.debug_tuple("Sink").field(&kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_clones_share_contents() {
        let sink = Sink::memory();
        let clone = sink.clone();
        clone.write_all(b"abc").expect("write");
        sink.write_all(b"def").expect("write");
        assert_eq!(sink.contents(), b"abcdef");
        assert_eq!(clone.contents_lossy(), "abcdef");
    }

    #[test]
    fn writer_sink_forwards_bytes() {
        let shared = Arc::new(Mutex::new(Vec::new()));

        struct Shared(Arc<Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().expect("lock").extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let sink = Sink::from_writer(Shared(Arc::clone(&shared)));
        sink.write_all(b"chunk").expect("write");
        assert_eq!(&*shared.lock().expect("lock"), b"chunk");
        assert!(sink.contents().is_empty());
    }

    #[test]
    fn debug_names_the_target() {
        assert_eq!(format!("{:?}", Sink::memory()), "Sink(\"memory\")");
        assert_eq!(format!("{:?}", Sink::stderr()), "Sink(\"stderr\")");
    }
}
