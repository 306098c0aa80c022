// Win32 backing for the disguised listener window.

use std::ffi::OsStr;
use std::iter::once;
use std::os::windows::ffi::OsStrExt;
use std::sync::Arc;

use log::debug;
use windows::core::{s, w, PCWSTR};
use windows::Win32::Foundation::{
    GetLastError, ERROR_CLASS_ALREADY_EXISTS, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM,
};
use windows::Win32::System::DataExchange::COPYDATASTRUCT;
use windows::Win32::System::LibraryLoader::{GetModuleHandleW, GetProcAddress, LoadLibraryW};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, IsWindow, PeekMessageW,
    RegisterClassW, SetWindowLongW, TranslateMessage, UnregisterClassW, GWLP_USERDATA,
    GWLP_WNDPROC, MSG, PM_REMOVE, WINDOW_EX_STYLE, WINDOW_LONG_PTR_INDEX, WINDOW_STYLE,
    WM_COPYDATA, WM_QUIT, WNDCLASSW,
};

use super::context::ListenerContext;
use super::install::{PreferredSetFn, WndprocInstaller};
use super::{ListenerError, MessageWindow, PumpOutcome};
use crate::payload::StatusUpdate;

/// Hidden window registered under the broadcaster's expected class name.
///
/// Created, pumped and destroyed on the supervisor thread only; the message
/// queue belongs to that thread. The context `Arc` held here keeps the
/// pointer lodged in the window's user-data slot valid for the whole window
/// lifetime.
pub(crate) struct Win32Window {
    class_name: Vec<u16>,
    context: Arc<ListenerContext>,
    installer: WndprocInstaller,
    hwnd: Option<HWND>,
}

impl Win32Window {
    pub(crate) fn new(class_name: &str, context: Arc<ListenerContext>) -> Self {
        Self {
            class_name: to_wide(class_name),
            context,
            installer: resolve_installer(),
            hwnd: None,
        }
    }

    fn class_ptr(&self) -> PCWSTR {
        PCWSTR(self.class_name.as_ptr())
    }
}

impl MessageWindow for Win32Window {
    fn ensure_window(&mut self) -> Result<(), ListenerError> {
        if self.hwnd.is_some() {
            return Ok(());
        }

        unsafe {
            let hinstance: HINSTANCE = GetModuleHandleW(None)
                .map_err(|e| ListenerError::WindowCreation(e.to_string()))?
                .into();

            let wc = WNDCLASSW {
                lpfnWndProc: Some(intercept_wndproc),
                hInstance: hinstance,
                lpszClassName: self.class_ptr(),
                ..Default::default()
            };

            let atom = RegisterClassW(&wc);
            if atom == 0 {
                // An earlier cycle may have left the class registered.
                let code = GetLastError();
                if code != ERROR_CLASS_ALREADY_EXISTS {
                    return Err(ListenerError::ClassRegistration(code.0));
                }
            }

            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                self.class_ptr(),
                w!(""),
                WINDOW_STYLE::default(),
                0,
                0,
                0,
                0,
                None,
                None,
                Some(hinstance),
                None,
            )
            .map_err(|e| ListenerError::WindowCreation(e.to_string()))?;

            // Context rides in the user-data slot; `self.context` outlives
            // the window because close() always runs first.
            self.installer.install(
                hwnd.0 as isize,
                GWLP_USERDATA.0,
                Arc::as_ptr(&self.context) as isize,
            );
            self.installer.install(
                hwnd.0 as isize,
                GWLP_WNDPROC.0,
                intercept_wndproc as usize as isize,
            );

            self.hwnd = Some(hwnd);
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.hwnd.is_some()
    }

    fn pump_cycle(&mut self) -> PumpOutcome {
        let Some(hwnd) = self.hwnd else {
            return PumpOutcome::Quit;
        };

        unsafe {
            // Destroyed from outside this process is indistinguishable from
            // quit; the supervisor re-registers on a later cycle.
            if !IsWindow(Some(hwnd)).as_bool() {
                return PumpOutcome::Quit;
            }

            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, Some(hwnd), 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    return PumpOutcome::Quit;
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        PumpOutcome::Drained
    }

    fn close(&mut self) {
        let Some(hwnd) = self.hwnd.take() else {
            return;
        };

        unsafe {
            if IsWindow(Some(hwnd)).as_bool() {
                // Detach the context pointer before the handle goes away.
                self.installer.install(hwnd.0 as isize, GWLP_USERDATA.0, 0);
                let _ = DestroyWindow(hwnd);
            }

            let hinstance = GetModuleHandleW(None).ok().map(HINSTANCE::from);
            let _ = UnregisterClassW(self.class_ptr(), hinstance);
        }
    }
}

impl Drop for Win32Window {
    fn drop(&mut self) {
        self.close();
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(once(0)).collect()
}

/// Resolve the window-attribute setter, preferring the long-pointer export.
fn resolve_installer() -> WndprocInstaller {
    let preferred = unsafe {
        LoadLibraryW(w!("user32.dll"))
            .ok()
            .and_then(|module| GetProcAddress(module, s!("SetWindowLongPtrW")))
            .map(|address| {
                std::mem::transmute::<unsafe extern "system" fn() -> isize, PreferredSetFn>(address)
            })
    };

    let installer = WndprocInstaller::select(preferred, legacy_set);
    if installer.is_legacy() {
        debug!("[WINDOW] Long-pointer setter unavailable; using the legacy variant");
    }
    installer
}

unsafe extern "system" fn legacy_set(hwnd: isize, index: i32, value: i32) -> i32 {
    SetWindowLongW(
        HWND(hwnd as *mut core::ffi::c_void),
        WINDOW_LONG_PTR_INDEX(index),
        value,
    )
}

/// Window procedure for every listener window.
///
/// Runs on the pump thread. Copy-data broadcasts are decoded and fed through
/// the dedup check; an exact repeat is swallowed with a handled result, and
/// everything else falls through to the default procedure.
extern "system" fn intercept_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    unsafe {
        if msg == WM_COPYDATA && lparam.0 != 0 {
            if let Some(context) = window_context(hwnd) {
                let copy_data = &*(lparam.0 as *const COPYDATASTRUCT);
                if !context.accept(decode_copy_data(copy_data)) {
                    return LRESULT(0);
                }
            }
        }

        DefWindowProcW(hwnd, msg, wparam, lparam)
    }
}

unsafe fn window_context<'a>(hwnd: HWND) -> Option<&'a ListenerContext> {
    let raw = window_long_ptr(hwnd, GWLP_USERDATA);
    (raw != 0).then(|| &*(raw as *const ListenerContext))
}

/// Copy the sender-owned buffer into an owned update. The sender may free
/// or reuse the buffer as soon as the message returns.
unsafe fn decode_copy_data(copy_data: &COPYDATASTRUCT) -> StatusUpdate {
    if copy_data.lpData.is_null() || copy_data.cbData < 2 {
        return StatusUpdate::from_wide(&[]);
    }

    let units = std::slice::from_raw_parts(
        copy_data.lpData as *const u16,
        (copy_data.cbData / 2) as usize,
    );
    StatusUpdate::from_wide(units)
}

#[cfg(target_pointer_width = "64")]
unsafe fn window_long_ptr(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX) -> isize {
    windows::Win32::UI::WindowsAndMessaging::GetWindowLongPtrW(hwnd, index)
}

#[cfg(not(target_pointer_width = "64"))]
unsafe fn window_long_ptr(hwnd: HWND, index: WINDOW_LONG_PTR_INDEX) -> isize {
    windows::Win32::UI::WindowsAndMessaging::GetWindowLongW(hwnd, index) as isize
}
