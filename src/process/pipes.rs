use std::io;
use std::os::fd::{FromRawFd, OwnedFd};

/// Creates one anonymous pipe, returning `(read_end, write_end)`.
///
/// Both ends are close-on-exec, so a spawned program only ever sees the ends
/// that were explicitly wired onto its standard streams.
pub fn anonymous_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [-1; 2];

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    // SAFETY: fds is a valid two-element buffer for pipe2 to fill.
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )))]
    // SAFETY: fds is a valid two-element buffer; fcntl only touches the
    // descriptors pipe just returned.
    let rc = unsafe {
        let rc = libc::pipe(fds.as_mut_ptr());
        if rc == 0 {
            libc::fcntl(fds[0], libc::F_SETFD, libc::FD_CLOEXEC);
            libc::fcntl(fds[1], libc::F_SETFD, libc::FD_CLOEXEC);
        }
        rc
    };

    if rc == -1 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: pipe returned two freshly opened descriptors that nothing else owns.
    let ends = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    Ok(ends)
}

/// The `stages - 1` pipes connecting one pipeline.
///
/// Each end is handed out at most once. Whatever has not been taken is closed
/// when the set is dropped, which is what lets EOF reach the last reader.
#[derive(Debug, Default)]
pub struct PipeSet {
    readers: Vec<Option<OwnedFd>>,
    writers: Vec<Option<OwnedFd>>,
}

impl PipeSet {
    /// Allocates every pipe up front. If one allocation fails, the pipes
    /// created so far are closed before the error is returned.
    pub fn new(count: usize) -> io::Result<Self> {
        Self::with_allocator(count, anonymous_pipe)
    }

    fn with_allocator<F>(count: usize, mut allocate: F) -> io::Result<Self>
    where
        F: FnMut() -> io::Result<(OwnedFd, OwnedFd)>,
    {
        let mut set = PipeSet {
            readers: Vec::with_capacity(count),
            writers: Vec::with_capacity(count),
        };
        for _ in 0..count {
            let (reader, writer) = allocate()?;
            set.readers.push(Some(reader));
            set.writers.push(Some(writer));
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }

    /// Read end of pipe `index`, feeding stage `index + 1`.
    pub fn take_reader(&mut self, index: usize) -> Option<OwnedFd> {
        self.readers.get_mut(index).and_then(Option::take)
    }

    /// Write end of pipe `index`, fed by stage `index`.
    pub fn take_writer(&mut self, index: usize) -> Option<OwnedFd> {
        self.writers.get_mut(index).and_then(Option::take)
    }
}

#[cfg(test)]
impl PipeSet {
    fn open_ends(&self) -> usize {
        self.readers
            .iter()
            .chain(self.writers.iter())
            .filter(|end| end.is_some())
            .count()
    }
}
