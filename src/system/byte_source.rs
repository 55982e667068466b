use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Byte stream the engine pulls bank data through.
///
/// Mirrors the engine's file callbacks: `open`, `read`, `seek` and `close`. A read that
/// returns fewer bytes than requested signals the end of the data.
pub trait ByteSource: Send {
    /// Prepares the source and returns its total size in bytes.
    fn open(&mut self, name: &str) -> io::Result<u64>;

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    fn seek(&mut self, offset: u64) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;
}

/// [`ByteSource`] over a file on disk. The file is opened up front so a missing bank is
/// reported before the engine sees the source.
pub struct FileByteSource {
    path: PathBuf,
    file: Option<File>,
    size: u64,
}

impl FileByteSource {
    pub fn open_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            file: Some(file),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is closed", self.path.display()),
            )
        })
    }
}

impl ByteSource for FileByteSource {
    fn open(&mut self, name: &str) -> io::Result<u64> {
        log::debug!("Opening bank stream '{}' ({})", name, self.path.display());
        self.file()?;
        Ok(self.size)
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let file = self.file()?;
        let mut filled = 0;
        while filled < buffer.len() {
            match file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.file()?.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} was already closed", self.path.display()),
            )),
        }
    }
}
