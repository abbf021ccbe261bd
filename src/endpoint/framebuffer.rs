//! The Linux framebuffer source endpoint: paced RGB→YUYV conversion into UVC output
//! buffers (§4.5 "Framebuffer→UVC", §4.6 pixel conversion).

use std::convert::TryInto;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Instant;

use crate::error::Result;
use crate::kernel;
use crate::pixel::PairCache;

pub struct FramebufferEndpoint {
    pub device: File,
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    pub line_length: u32,
    pub memory: *mut u8,
    pub mem_size: usize,
    pub frame_interval: std::time::Duration,
    last_fill: Option<Instant>,
    cache: PairCache,
}

// The framebuffer mapping is owned exclusively by this endpoint and touched only from
// the single daemon thread.
unsafe impl Send for FramebufferEndpoint {}

impl FramebufferEndpoint {
    pub fn open(path: &Path, width: u32, height: u32, bpp: u32, framerate: u32) -> Result<Self> {
        let device = kernel::open_nonblocking(path)?;
        let line_length = width * (bpp / 8);
        let mem_size = (line_length * height) as usize;
        let fd = device.as_raw_fd();
        let memory = unsafe {
            nix::libc::mmap(
                std::ptr::null_mut(),
                mem_size,
                nix::libc::PROT_READ,
                nix::libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if memory == nix::libc::MAP_FAILED {
            return Err(crate::error::Error::with_action(
                nix::errno::Errno::last(),
                crate::error::Action::MappingBuffer,
            ));
        }
        Ok(Self {
            device,
            width,
            height,
            bpp,
            line_length,
            memory: memory as *mut u8,
            mem_size,
            frame_interval: std::time::Duration::from_millis(1000 / framerate.max(1) as u64),
            last_fill: None,
            cache: PairCache::new(),
        })
    }

    /// True once `frame_interval` has elapsed since the last fill, gating conversion to
    /// the configured framerate.
    pub fn due(&self, now: Instant) -> bool {
        match self.last_fill {
            None => true,
            Some(last) => now.duration_since(last) >= self.frame_interval,
        }
    }

    fn source(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.memory, self.mem_size) }
    }

    /// Converts the current framebuffer contents into YUYV, writing into `dst`
    /// (expected length `width*height*2`). Returns the number of bytes written.
    pub fn fill_yuyv(&mut self, now: Instant, dst: &mut [u8]) -> usize {
        self.last_fill = Some(now);
        let memory = self.memory;
        let mem_size = self.mem_size;
        let src: &[u8] = unsafe { std::slice::from_raw_parts(memory, mem_size) };
        match self.bpp {
            16 => self.fill_from_16bpp(src, dst),
            24 => self.fill_from_word_bpp(src, dst, 3),
            32 => self.fill_from_word_bpp(src, dst, 4),
            other => {
                log::warn!("unsupported framebuffer bpp {}, emitting black frame", other);
                dst.fill(0);
                dst.len()
            }
        }
    }

    fn fill_from_16bpp(&mut self, src: &[u8], dst: &mut [u8]) -> usize {
        let mut written = 0;
        for y in 0..self.height as usize {
            let row = &src[y * self.line_length as usize..];
            let out_row = &mut dst[y * self.width as usize * 2..];
            for x in (0..self.width as usize).step_by(2) {
                let p0 = u16::from_le_bytes([row[x * 2], row[x * 2 + 1]]);
                let p1 = u16::from_le_bytes([row[x * 2 + 2], row[x * 2 + 3]]);
                let word: &mut [u8; 4] = (&mut out_row[x * 2..x * 2 + 4]).try_into().unwrap();
                crate::pixel::rgb565_pair_to_yuyv(p0, p1, word);
                written += 4;
            }
        }
        written
    }

    fn fill_from_word_bpp(&mut self, src: &[u8], dst: &mut [u8], bytes_per_pixel: usize) -> usize {
        let mut written = 0;
        for y in 0..self.height as usize {
            let row = &src[y * self.line_length as usize..];
            let out_row = &mut dst[y * self.width as usize * 2..];
            for x in (0..self.width as usize).step_by(2) {
                let word0 = read_word(row, x * bytes_per_pixel, bytes_per_pixel);
                let word1 = read_word(row, (x + 1) * bytes_per_pixel, bytes_per_pixel);
                let (out, _cached) = self.cache.convert(word0, word1);
                out_row[x * 2..x * 2 + 4].copy_from_slice(out);
                written += 4;
            }
        }
        written
    }
}

fn read_word(row: &[u8], offset: usize, bytes: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf[..bytes].copy_from_slice(&row[offset..offset + bytes]);
    u32::from_le_bytes(buf)
}

impl Drop for FramebufferEndpoint {
    fn drop(&mut self) {
        unsafe {
            nix::libc::munmap(self.memory as *mut _, self.mem_size);
        }
    }
}
