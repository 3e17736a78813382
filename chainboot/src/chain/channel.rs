//! File-backed channel shared with a chained installer.
//!
//! Layout (little-endian, [`CHANNEL_SIZE`] bytes):
//!
//! | Offset | Width | Field                                   |
//! |-------:|------:|-----------------------------------------|
//! | 0      | 4     | magic `CBCH`                            |
//! | 4      | 4     | layout version                          |
//! | 8      | 4     | generation, bumped on every child update|
//! | 12     | 1     | download finished                       |
//! | 13     | 1     | install finished                        |
//! | 14     | 1     | download abort                          |
//! | 15     | 1     | install abort                           |
//! | 16     | 4     | download result                         |
//! | 20     | 4     | install result                          |
//! | 24     | 4     | internal error                          |
//! | 28     | 1     | download progress (0-255)               |
//! | 29     | 1     | install progress (0-255)                |
//! | 30     | 2     | reserved                                |
//! | 32     | 520   | current step, UTF-16LE, NUL padded      |
//!
//! The parent writes only the abort flags after creation; every other field
//! is written by the child, which bumps the generation after each update.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

pub const MAGIC: &[u8; 4] = b"CBCH";
pub const LAYOUT_VERSION: u32 = 1;
pub const CHANNEL_SIZE: usize = 552;

/// Maximum step label length in UTF-16 units.
pub const STEP_UNITS: usize = 260;

/// Result code for success.
pub const RESULT_SUCCESS: i32 = 0;
/// Result code for "not reported yet".
pub const RESULT_PENDING: i32 = 0x8000_000A_u32 as i32;
/// Result code for an internal failure.
pub const RESULT_INTERNAL_ERROR: i32 = 0x8000_4005_u32 as i32;

/// Environment variable carrying the channel path to the child.
pub const CHANNEL_ENV: &str = "CHAINBOOT_CHANNEL";

const OFF_MAGIC: u64 = 0;
const OFF_VERSION: u64 = 4;
const OFF_GENERATION: u64 = 8;
const OFF_DOWNLOAD_FINISHED: u64 = 12;
const OFF_INSTALL_FINISHED: u64 = 13;
const OFF_DOWNLOAD_ABORT: u64 = 14;
const OFF_INSTALL_ABORT: u64 = 15;
const OFF_DOWNLOAD_RESULT: u64 = 16;
const OFF_INSTALL_RESULT: u64 = 20;
const OFF_INTERNAL_ERROR: u64 = 24;
const OFF_DOWNLOAD_PROGRESS: u64 = 28;
const OFF_INSTALL_PROGRESS: u64 = 29;
const OFF_STEP: u64 = 32;

/// Decoded channel contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    pub generation: u32,
    pub download_finished: bool,
    pub install_finished: bool,
    pub download_abort: bool,
    pub install_abort: bool,
    pub download_result: i32,
    pub install_result: i32,
    pub internal_error: i32,
    pub download_progress: u8,
    pub install_progress: u8,
    pub current_step: String,
}

/// Raw 0-255 progress as a percentage.
pub fn raw_to_percent(raw: u8) -> u8 {
    ((u32::from(raw) * 100) / 255) as u8
}

impl ChannelState {
    pub fn download_percent(&self) -> u8 {
        raw_to_percent(self.download_progress)
    }

    pub fn install_percent(&self) -> u8 {
        raw_to_percent(self.install_progress)
    }

    /// Combined progress scaled into 0 to 85.
    pub fn blended_percent(&self) -> u8 {
        let sum = u32::from(self.download_percent()) + u32::from(self.install_percent());
        (sum * 85 / 200) as u8
    }

    pub fn both_finished(&self) -> bool {
        self.download_finished && self.install_finished
    }

    /// Install result if reported, else download result, else internal error.
    pub fn final_result(&self) -> i32 {
        if self.install_result != RESULT_PENDING {
            self.install_result
        } else if self.download_result != RESULT_PENDING {
            self.download_result
        } else {
            RESULT_INTERNAL_ERROR
        }
    }

    fn decode(raw: &[u8; CHANNEL_SIZE]) -> io::Result<Self> {
        if &raw[OFF_MAGIC as usize..OFF_MAGIC as usize + MAGIC.len()] != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad chain channel magic"));
        }
        let version = u32_at(raw, OFF_VERSION);
        if version != LAYOUT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported chain channel version {}", version),
            ));
        }

        let units: Vec<u16> = raw[OFF_STEP as usize..]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|&unit| unit != 0)
            .collect();

        Ok(Self {
            generation: u32_at(raw, OFF_GENERATION),
            download_finished: raw[OFF_DOWNLOAD_FINISHED as usize] != 0,
            install_finished: raw[OFF_INSTALL_FINISHED as usize] != 0,
            download_abort: raw[OFF_DOWNLOAD_ABORT as usize] != 0,
            install_abort: raw[OFF_INSTALL_ABORT as usize] != 0,
            download_result: u32_at(raw, OFF_DOWNLOAD_RESULT) as i32,
            install_result: u32_at(raw, OFF_INSTALL_RESULT) as i32,
            internal_error: u32_at(raw, OFF_INTERNAL_ERROR) as i32,
            download_progress: raw[OFF_DOWNLOAD_PROGRESS as usize],
            install_progress: raw[OFF_INSTALL_PROGRESS as usize],
            current_step: String::from_utf16_lossy(&units),
        })
    }
}

fn put(raw: &mut [u8], offset: u64, bytes: &[u8]) {
    let o = offset as usize;
    raw[o..o + bytes.len()].copy_from_slice(bytes);
}

fn u32_at(raw: &[u8], offset: u64) -> u32 {
    let o = offset as usize;
    u32::from_le_bytes([raw[o], raw[o + 1], raw[o + 2], raw[o + 3]])
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset)? {
            0 => return Err(io::ErrorKind::UnexpectedEof.into()),
            n => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset)? {
            0 => return Err(io::ErrorKind::WriteZero.into()),
            n => {
                buf = &buf[n..];
                offset += n as u64;
            }
        }
    }
    Ok(())
}

/// Handle on a chain channel file.
#[derive(Debug)]
pub struct ChainChannel {
    file: File,
    path: PathBuf,
}

impl ChainChannel {
    /// Create a fresh channel: nothing finished, both results pending.
    ///
    /// An existing file at `path` is overwritten.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut raw = [0u8; CHANNEL_SIZE];
        put(&mut raw, OFF_MAGIC, MAGIC);
        put(&mut raw, OFF_VERSION, &LAYOUT_VERSION.to_le_bytes());
        put(&mut raw, OFF_DOWNLOAD_RESULT, &RESULT_PENDING.to_le_bytes());
        put(&mut raw, OFF_INSTALL_RESULT, &RESULT_PENDING.to_le_bytes());
        put(&mut raw, OFF_INTERNAL_ERROR, &RESULT_INTERNAL_ERROR.to_le_bytes());
        write_at(&file, &raw, 0)?;
        file.sync_data()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing channel, as the chained child does.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let channel = Self {
            file,
            path: path.to_path_buf(),
        };
        channel.snapshot()?;
        Ok(channel)
    }

    /// Open the channel named by [`CHANNEL_ENV`], if set.
    pub fn open_from_env() -> io::Result<Option<Self>> {
        match std::env::var_os(CHANNEL_ENV) {
            Some(path) => Self::open(Path::new(&path)).map(Some),
            None => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole channel.
    pub fn snapshot(&self) -> io::Result<ChannelState> {
        let mut raw = [0u8; CHANNEL_SIZE];
        read_at(&self.file, &mut raw, 0)?;
        ChannelState::decode(&raw)
    }

    /// Current generation counter.
    pub fn generation(&self) -> io::Result<u32> {
        let mut raw = [0u8; 4];
        read_at(&self.file, &mut raw, OFF_GENERATION)?;
        Ok(u32::from_le_bytes(raw))
    }

    /// Ask the child to stop both phases.
    pub fn request_abort(&self) -> io::Result<()> {
        write_at(&self.file, &[1, 1], OFF_DOWNLOAD_ABORT)
    }

    /// Whether the parent asked for an abort.
    pub fn abort_requested(&self) -> io::Result<bool> {
        let mut raw = [0u8; 2];
        read_at(&self.file, &mut raw, OFF_DOWNLOAD_ABORT)?;
        Ok(raw[0] != 0 || raw[1] != 0)
    }

    /// Report download progress (0-255).
    pub fn report_download_progress(&self, raw: u8) -> io::Result<()> {
        self.update(OFF_DOWNLOAD_PROGRESS, &[raw])
    }

    /// Report install progress (0-255).
    pub fn report_install_progress(&self, raw: u8) -> io::Result<()> {
        self.update(OFF_INSTALL_PROGRESS, &[raw])
    }

    /// Report the current step label, truncated to [`STEP_UNITS`] units.
    pub fn report_step(&self, step: &str) -> io::Result<()> {
        let mut raw = [0u8; STEP_UNITS * 2];
        for (i, unit) in step.encode_utf16().take(STEP_UNITS).enumerate() {
            raw[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        self.update(OFF_STEP, &raw)
    }

    /// Report the download phase as finished with `result`.
    pub fn report_download_finished(&self, result: i32) -> io::Result<()> {
        write_at(&self.file, &result.to_le_bytes(), OFF_DOWNLOAD_RESULT)?;
        self.update(OFF_DOWNLOAD_FINISHED, &[1])
    }

    /// Report the install phase as finished with `result`.
    pub fn report_install_finished(&self, result: i32) -> io::Result<()> {
        write_at(&self.file, &result.to_le_bytes(), OFF_INSTALL_RESULT)?;
        self.update(OFF_INSTALL_FINISHED, &[1])
    }

    /// Record a detailed internal error code.
    pub fn report_internal_error(&self, code: i32) -> io::Result<()> {
        self.update(OFF_INTERNAL_ERROR, &code.to_le_bytes())
    }

    /// Write a field, then bump the generation.
    fn update(&self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        write_at(&self.file, bytes, offset)?;
        let next = self.generation()?.wrapping_add(1);
        write_at(&self.file, &next.to_le_bytes(), OFF_GENERATION)
    }

    /// Close the channel and delete its file.
    pub fn remove(self) -> io::Result<()> {
        let path = self.path.clone();
        drop(self.file);
        match fs::remove_file(&path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
