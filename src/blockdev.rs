// MITTCFQ BLOCK DEVICE ACCESS
// DIRECT, SYNCHRONOUS, BLOCK-ALIGNED READS. BYPASSES THE PAGE CACHE SO EVERY
// READ REACHES THE I/O SCHEDULER.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

// O_DIRECT NEEDS THE BUFFER ALIGNED TO THE LOGICAL BLOCK SIZE
pub struct AlignedBuf {
    ptr: *mut u8,
    len: usize,
}

impl AlignedBuf {
    pub fn new(len: usize, align: usize) -> Result<Self> {
        let mut ptr: *mut libc::c_void = std::ptr::null_mut();
        let rc = unsafe { libc::posix_memalign(&mut ptr, align, len) };
        if rc != 0 || ptr.is_null() {
            bail!("posix_memalign({}, {}) FAILED: {}", align, len, rc);
        }
        Ok(Self { ptr: ptr as *mut u8, len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len) }
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        unsafe { libc::free(self.ptr as *mut libc::c_void) };
    }
}

pub struct BlockDevice {
    file: File,
    path: PathBuf,
}

impl BlockDevice {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECT | libc::O_SYNC)
            .open(path)
            .with_context(|| format!("CANNOT OPEN {} (O_DIRECT)", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // BLOCK DEVICES REPORT st_size = 0. SEEK TO THE END INSTEAD.
    pub fn size_bytes(&self) -> Result<u64> {
        let mut f = &self.file;
        let size = f
            .seek(SeekFrom::End(0))
            .with_context(|| format!("CANNOT SIZE {}", self.path.display()))?;
        Ok(size)
    }

    pub fn read_block(&self, buf: &mut AlignedBuf, offset: u64) -> Result<usize> {
        let n = self
            .file
            .read_at(buf.as_mut_slice(), offset)
            .with_context(|| format!("READ {} @ {} FAILED", self.path.display(), offset))?;
        if n == 0 {
            bail!("SHORT READ {} @ {}", self.path.display(), offset);
        }
        Ok(n)
    }
}
