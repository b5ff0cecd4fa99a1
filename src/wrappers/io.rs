//! Hooks for the file and stream functions; these are where symbolic input
//! enters the program.

use tracing::warn;

use crate::runtime::Runtime;
use crate::solver::Solver;
use crate::wrappers::{c_strlen, sites};

impl<S: Solver> Runtime<S> {
    pub fn wrap_open(&mut self, path: &str, fd: i32) {
        self.set_return_expression(None);
        if fd >= 0 {
            self.maybe_set_input_file(path, fd);
        }
    }

    pub fn wrap_fopen(&mut self, path: &str, fd: Option<i32>) {
        self.set_return_expression(None);
        if let Some(fd) = fd {
            self.maybe_set_input_file(path, fd);
        }
    }

    /// # Safety
    ///
    /// `buf` must be writable for `result` bytes (the real `read` just
    /// filled it).
    pub unsafe fn wrap_read(&mut self, fd: i32, buf: usize, result: isize) {
        let buf_expr = self.get_parameter_expression(1);
        self.try_alternative(buf as u64, buf_expr, sites::READ);
        let count_expr = self.get_parameter_expression(2);
        self.try_alternative(result.max(0) as u64, count_expr, sites::READ);

        self.set_return_expression(None);

        let Ok(length) = usize::try_from(result) else {
            return;
        };

        if self.input_fd() == Some(fd) {
            let offset = self.input_offset();
            self.make_symbolic(buf, length, offset);
            self.set_input_offset(offset + length);
        } else if !self.is_concrete(buf, length) {
            warn!(fd, "concretizing symbolic buffer overwritten by read");
            self.shadow_mut().fill(buf, length, None);
        }
    }

    /// Shared logic for `fread`; `fd` is the stream's descriptor and
    /// `bytes_read` is `result * size`.
    ///
    /// # Safety
    ///
    /// `ptr` must be writable for `bytes_read` bytes.
    pub unsafe fn wrap_fread(
        &mut self,
        fd: i32,
        ptr: usize,
        size: u64,
        nmemb: u64,
        bytes_read: usize,
    ) {
        for (index, value) in [(0, ptr as u64), (1, size), (2, nmemb)] {
            let expr = self.get_parameter_expression(index);
            self.try_alternative(value, expr, sites::FREAD);
        }

        self.set_return_expression(None);

        if bytes_read == 0 {
            return;
        }

        if self.input_fd() == Some(fd) {
            let offset = self.input_offset();
            self.make_symbolic(ptr, bytes_read, offset);
            self.set_input_offset(offset + bytes_read);
        } else if !self.is_concrete(ptr, bytes_read) {
            warn!(fd, "concretizing symbolic buffer overwritten by fread");
            self.shadow_mut().fill(ptr, bytes_read, None);
        }
    }

    /// `n` is the buffer size the real `fgets` was given.
    ///
    /// # Safety
    ///
    /// `str_ptr` must point at the NUL-terminated line `fgets` produced.
    pub unsafe fn wrap_fgets(&mut self, fd: i32, str_ptr: usize, n: i32) {
        let str_expr = self.get_parameter_expression(0);
        self.try_alternative(str_ptr as u64, str_expr, sites::FGETS);
        let n_expr = self.get_parameter_expression(1);
        self.try_alternative(n.max(0) as u64, n_expr, sites::FGETS);

        let result = self.get_parameter_expression(0);
        self.set_return_expression(result);

        // fgets writes at most n - 1 bytes before the terminator; cap the
        // shadowed region at that bound rather than trusting the buffer
        // contents alone.
        let length = c_strlen(str_ptr).min(n.max(1) as usize - 1);
        if length == 0 {
            return;
        }

        if self.input_fd() == Some(fd) {
            let offset = self.input_offset();
            self.make_symbolic(str_ptr, length, offset);
            self.set_input_offset(offset + length);
        } else if !self.is_concrete(str_ptr, length) {
            warn!(fd, "concretizing symbolic buffer overwritten by fgets");
            self.shadow_mut().fill(str_ptr, length, None);
        }
    }

    pub fn wrap_rewind(&mut self, fd: i32) {
        self.set_return_expression(None);
        if self.input_fd() == Some(fd) {
            self.set_input_offset(0);
        }
    }

    /// `fseek` family: `new_pos` is the stream position after the seek, as
    /// reported by `ftell`.
    pub fn wrap_fseek(&mut self, fd: i32, offset: u64, new_pos: Option<u64>) {
        let offset_expr = self.get_parameter_expression(1);
        self.try_alternative(offset, offset_expr, sites::FSEEK);
        self.set_return_expression(None);

        if self.input_fd() == Some(fd) {
            if let Some(pos) = new_pos {
                self.set_input_offset(pos as usize);
            }
        }
    }

    /// `lseek` family. When seeking to an absolute position the offset
    /// expression travels to the return value.
    pub fn wrap_lseek(&mut self, fd: i32, result: u64, whence_is_set: bool) {
        self.set_return_expression(None);

        if whence_is_set {
            let offset_expr = self.get_parameter_expression(1);
            self.set_return_expression(offset_expr);
        }

        if self.input_fd() == Some(fd) {
            self.set_input_offset(result as usize);
        }
    }

    /// `getc`/`fgetc`/`getchar`; `result` is the real call's return value.
    pub fn wrap_getc(&mut self, fd: i32, result: i32) {
        if result < 0 {
            self.set_return_expression(None);
            return;
        }

        if self.input_fd() == Some(fd) {
            let offset = self.input_offset();
            let byte = self.get_input_byte(offset, result as u8);
            self.set_input_offset(offset + 1);
            // getc returns an int; widen the byte accordingly.
            let widened = self.build(|b| b.zext(byte, 24));
            self.set_return_expression(Some(widened));
        } else {
            self.set_return_expression(None);
        }
    }

    pub fn wrap_ungetc(&mut self, fd: i32, result: i32) {
        let pushed_back = self.get_parameter_expression(0);
        self.set_return_expression(pushed_back);

        if self.input_fd() == Some(fd) && result >= 0 {
            let offset = self.input_offset();
            self.set_input_offset(offset.saturating_sub(1));
        }
    }

    /// Mapping the input file makes the mapped bytes symbolic.
    ///
    /// The cursor interaction between `mmap` and `read` is inherently
    /// heuristic: we give the mapped bytes the offsets `off..off+len` and
    /// leave the cursor at `off + len`, so a subsequent `read` continues
    /// after the mapping.
    ///
    /// # Safety
    ///
    /// `result` must be a live mapping of `len` bytes.
    pub unsafe fn wrap_mmap(&mut self, fd: i32, result: usize, len: usize, off: u64) {
        self.set_return_expression(None);

        let len_expr = self.get_parameter_expression(1);
        self.try_alternative(len as u64, len_expr, sites::MMAP);

        if self.input_fd() == Some(fd) {
            self.make_symbolic(result, len, off as usize);
            self.set_input_offset(off as usize + len);
        } else if !self.is_concrete(result, len) {
            self.shadow_mut().fill(result, len, None);
        }
    }
}
