// Selection of the window-procedure install primitive.
//
// 64-bit user32 exports the long-pointer setter; older 32-bit builds only
// export the legacy variant. Resolution happens at runtime and the fallback
// stays invisible to callers, so the selection logic lives here in a
// platform-neutral shape.

/// Long-pointer attribute setter (`SetWindowLongPtrW` shape).
pub type PreferredSetFn = unsafe extern "system" fn(isize, i32, isize) -> isize;
/// Legacy 32-bit attribute setter (`SetWindowLongW` shape).
pub type LegacySetFn = unsafe extern "system" fn(isize, i32, i32) -> i32;

pub enum WndprocInstaller {
    Preferred(PreferredSetFn),
    Legacy(LegacySetFn),
}

impl WndprocInstaller {
    /// Use the preferred primitive whenever the platform resolved it.
    pub fn select(preferred: Option<PreferredSetFn>, legacy: LegacySetFn) -> Self {
        match preferred {
            Some(set) => Self::Preferred(set),
            None => Self::Legacy(legacy),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }

    /// Store `value` in the window attribute at `index`, returning the
    /// previous value.
    ///
    /// # Safety
    ///
    /// `hwnd` must be a live window handle owned by the caller and `value`
    /// must be valid for the attribute index (a window procedure or context
    /// pointer).
    pub unsafe fn install(&self, hwnd: isize, index: i32, value: isize) -> isize {
        match self {
            Self::Preferred(set) => set(hwnd, index, value),
            Self::Legacy(set) => set(hwnd, index, value as i32) as isize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static PREFERRED_CALLS: Mutex<Vec<(isize, i32, isize)>> = Mutex::new(Vec::new());
    static LEGACY_CALLS: Mutex<Vec<(isize, i32, i32)>> = Mutex::new(Vec::new());

    unsafe extern "system" fn preferred_stub(hwnd: isize, index: i32, value: isize) -> isize {
        PREFERRED_CALLS.lock().unwrap().push((hwnd, index, value));
        11
    }

    unsafe extern "system" fn legacy_stub(hwnd: isize, index: i32, value: i32) -> i32 {
        LEGACY_CALLS.lock().unwrap().push((hwnd, index, value));
        22
    }

    #[test]
    fn test_preferred_primitive_wins_when_available() {
        let installer = WndprocInstaller::select(Some(preferred_stub), legacy_stub);
        assert!(!installer.is_legacy());

        let previous = unsafe { installer.install(0x10, -4, 0x2000) };
        assert_eq!(previous, 11);
        assert!(PREFERRED_CALLS
            .lock()
            .unwrap()
            .contains(&(0x10, -4, 0x2000)));
    }

    #[test]
    fn test_legacy_fallback_receives_identical_arguments() {
        let installer = WndprocInstaller::select(None, legacy_stub);
        assert!(installer.is_legacy());

        let previous = unsafe { installer.install(0x20, -4, 0x3000) };
        assert_eq!(previous, 22);
        assert!(LEGACY_CALLS.lock().unwrap().contains(&(0x20, -4, 0x3000)));
    }
}
