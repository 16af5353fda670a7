// Per-rank file handles opened and closed collectively

use crate::error::{Error, Result};
use crate::info::Info;
use crate::Comm::{Communicator, Request, World};
use bitflags::bitflags;
use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

bitflags! {
    /// File access mode flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMode: u32 {
        const RDONLY = 1 << 0;
        const WRONLY = 1 << 1;
        const RDWR = 1 << 2;
        const CREATE = 1 << 3;
        const EXCL = 1 << 4;
        const APPEND = 1 << 5;
        /// Accepted and ignored.
        const UNIQUE_OPEN = 1 << 6;
    }
}

/// Origin of a [`File::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

/// One rank's handle on a collectively opened file.
///
/// Every rank has its own OS handle and its own file pointer.
pub struct File {
    file: std::fs::File,
    path: PathBuf,
    mode: AccessMode,
    info: Info,
    pointer: u64,
    world: World,
    rank: usize,
}

impl File {
    /// Open `path` on every rank.
    ///
    /// Collective. Rank 0 performs any creation requested by `CREATE`/`EXCL`
    /// and broadcasts the outcome; then every rank opens its own handle.
    pub fn open(comm: &Communicator, path: impl AsRef<Path>, mode: AccessMode, info: Option<Info>) -> Result<File> {
        let path = path.as_ref().to_path_buf();
        validate_mode(mode)?;

        let mut created = [1u8];
        let mut create_error = None;
        if comm.rank() == 0 && mode.contains(AccessMode::CREATE) {
            let mut options = OpenOptions::new();
            options.write(true);
            if mode.contains(AccessMode::EXCL) {
                options.create_new(true);
            } else {
                options.create(true);
            }
            if let Err(e) = options.open(&path) {
                created[0] = 0;
                create_error = Some(e);
            }
        }
        comm.broadcast(&mut created, 0)?;
        if let Some(e) = create_error {
            return Err(Error::Io(e));
        }
        if created[0] == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("rank 0 could not create {}", path.display()),
            )));
        }

        let mut options = OpenOptions::new();
        options
            .read(!mode.contains(AccessMode::WRONLY))
            .write(!mode.contains(AccessMode::RDONLY));
        let file = options.open(&path)?;

        let pointer = if mode.contains(AccessMode::APPEND) {
            file.metadata()?.len()
        } else {
            0
        };

        log::debug!("rank {} opened {} ({:?})", comm.rank(), path.display(), mode);

        Ok(File {
            file,
            path,
            mode,
            info: info.unwrap_or_default(),
            pointer,
            world: comm.world().clone(),
            rank: comm.rank(),
        })
    }

    /// Remove `path` from the file system.
    pub fn delete(path: impl AsRef<Path>) -> Result<()> {
        std::fs::remove_file(path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// This rank's file pointer.
    pub fn position(&self) -> u64 {
        self.pointer
    }

    /// Read at the file pointer and advance it. Completes before returning.
    pub fn iread(&mut self, buf: &mut [u8]) -> Result<Request> {
        self.check_readable()?;
        let n = read_full_at(&self.file, buf, self.pointer)?;
        self.pointer += n as u64;
        Ok(Request::completed(n))
    }

    /// Write at the file pointer and advance it. Completes before returning.
    pub fn iwrite(&mut self, buf: &[u8]) -> Result<Request> {
        self.check_writable()?;
        end_of(self.pointer, buf.len())?;
        self.file.write_all_at(buf, self.pointer)?;
        self.pointer += buf.len() as u64;
        Ok(Request::completed(buf.len()))
    }

    /// Collective positioned read; returns the bytes read (short at end of file).
    ///
    /// Every rank reaches the barrier, also when its own read failed.
    pub fn read_at_all(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let read = self
            .check_readable()
            .and_then(|_| read_full_at(&self.file, buf, offset));
        self.collective_sync("read_at_all")?;
        read
    }

    /// Collective positioned write.
    ///
    /// Every rank reaches the barrier, also when its own write failed.
    pub fn write_at_all(&mut self, offset: u64, buf: &[u8]) -> Result<usize> {
        let written = self.check_writable().and_then(|_| {
            end_of(offset, buf.len())?;
            self.file.write_all_at(buf, offset)?;
            Ok(buf.len())
        });
        if let Err(e) = &written {
            log::debug!("rank {} write_at_all at {} failed: {}", self.rank, offset, e);
        }
        self.collective_sync("write_at_all")?;
        written
    }

    /// Move this rank's file pointer; returns the new position.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => self.pointer as i64,
            Whence::End => self.size()? as i64,
        };
        let target = base.checked_add(offset).filter(|&p| p >= 0).ok_or_else(|| {
            Error::InvalidArgument(format!("seek to {} + {} is out of range", base, offset))
        })?;
        self.pointer = target as u64;
        Ok(self.pointer)
    }

    /// Collective resize.
    ///
    /// Rank 0 resizes; only rank 0 reports a failed resize, after the barrier.
    pub fn set_size(&mut self, size: u64) -> Result<()> {
        let resized = self.check_writable().and_then(|_| {
            if self.rank == 0 {
                self.file.set_len(size)?;
            }
            Ok(())
        });
        self.collective_sync("set_size")?;
        resized
    }

    pub fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Flush this rank's writes to storage.
    pub fn sync(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Collective close.
    pub fn close(self) -> Result<()> {
        self.collective_sync("close")?;
        log::debug!("rank {} closed {}", self.rank, self.path.display());
        Ok(())
    }

    fn collective_sync(&self, op: &'static str) -> Result<()> {
        if self.world.is_finalized() {
            return Err(Error::Finalized);
        }
        self.world.barrier_wait(op, self.world.config().timeout)
    }

    fn check_readable(&self) -> Result<()> {
        if self.mode.contains(AccessMode::WRONLY) {
            return Err(Error::InvalidArgument(format!(
                "{} was opened write-only",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.mode.contains(AccessMode::RDONLY) {
            return Err(Error::InvalidArgument(format!(
                "{} was opened read-only",
                self.path.display()
            )));
        }
        Ok(())
    }
}

fn validate_mode(mode: AccessMode) -> Result<()> {
    let access = mode & (AccessMode::RDONLY | AccessMode::WRONLY | AccessMode::RDWR);
    if access.bits().count_ones() != 1 {
        return Err(Error::InvalidArgument(format!(
            "exactly one of RDONLY, WRONLY, RDWR required, got {:?}",
            mode
        )));
    }
    if mode.contains(AccessMode::RDONLY) && mode.intersects(AccessMode::CREATE | AccessMode::EXCL) {
        return Err(Error::InvalidArgument(
            "RDONLY cannot be combined with CREATE or EXCL".into(),
        ));
    }
    Ok(())
}

/// Offset one past a `len` byte transfer starting at `offset`.
fn end_of(offset: u64, len: usize) -> Result<u64> {
    offset.checked_add(len as u64).ok_or_else(|| {
        Error::InvalidArgument(format!("{} bytes at offset {} overflow the file offset", len, offset))
    })
}

/// `read_at` until `buf` is full or the file ends.
fn read_full_at(file: &std::fs::File, buf: &mut [u8], offset: u64) -> Result<usize> {
    end_of(offset, buf.len())?;
    let mut filled = 0;
    while filled < buf.len() {
        match file.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
