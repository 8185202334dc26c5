//! Null-terminated C string arrays (`argv`, `envp`).

use libc::c_char;
use std::ffi::CStr;
use std::marker::PhantomData;
use std::ptr;

/// Borrowed view over a `char *const[]` terminated by a null pointer.
#[derive(Clone, Copy)]
pub struct CStrArray<'a> {
    ptr: *const *const c_char,
    _marker: PhantomData<&'a CStr>,
}

impl<'a> CStrArray<'a> {
    /// # Safety
    ///
    /// `ptr` is null or points to a null-terminated array of valid C strings
    /// that outlive `'a`.
    pub unsafe fn from_ptr(ptr: *const *const c_char) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub fn iter(&self) -> CStrArrayIter<'a> {
        CStrArrayIter {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<'a> IntoIterator for CStrArray<'a> {
    type Item = &'a CStr;
    type IntoIter = CStrArrayIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct CStrArrayIter<'a> {
    ptr: *const *const c_char,
    _marker: PhantomData<&'a CStr>,
}

impl<'a> Iterator for CStrArrayIter<'a> {
    type Item = &'a CStr;

    fn next(&mut self) -> Option<&'a CStr> {
        if self.ptr.is_null() {
            return None;
        }
        unsafe {
            let entry = *self.ptr;
            if entry.is_null() {
                self.ptr = ptr::null();
                return None;
            }
            self.ptr = self.ptr.add(1);
            Some(CStr::from_ptr(entry))
        }
    }
}

/// Owned pointer table with a trailing null, borrowing its strings.
///
/// This is what gets handed to the original `execve`/`posix_spawn`.
pub struct PtrArray<'a> {
    ptrs: Vec<*const c_char>,
    _marker: PhantomData<&'a CStr>,
}

impl<'a> PtrArray<'a> {
    pub fn new<I>(strings: I) -> Self
    where
        I: IntoIterator<Item = &'a CStr>,
    {
        let mut ptrs: Vec<*const c_char> = strings.into_iter().map(CStr::as_ptr).collect();
        ptrs.push(ptr::null());
        Self {
            ptrs,
            _marker: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }

    /// Entries, excluding the terminator.
    pub fn len(&self) -> usize {
        self.ptrs.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iterates_until_terminator() {
        let strings = [c"/bin/ls", c"-l"];
        let table = PtrArray::new(strings);
        assert_eq!(table.len(), 2);

        let view = unsafe { CStrArray::from_ptr(table.as_ptr()) };
        let collected: Vec<&CStr> = view.iter().collect();
        assert_eq!(collected, vec![c"/bin/ls", c"-l"]);
    }

    #[test]
    fn test_null_array_is_empty() {
        let view = unsafe { CStrArray::from_ptr(ptr::null()) };
        assert!(view.is_null());
        assert_eq!(view.iter().count(), 0);
    }

    #[test]
    fn test_empty_table_is_just_terminator() {
        let table = PtrArray::new(std::iter::empty());
        assert!(table.is_empty());
        assert!(unsafe { (*table.as_ptr()).is_null() });
    }
}
