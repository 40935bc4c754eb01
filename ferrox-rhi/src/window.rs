//! Window-surface creation (`window` feature): turns a `raw-window-handle` window handle into a
//! `vk::SurfaceKHR` that [`crate::device::Device::create_swap_chain`] can present through.
//!
//! Only Win32 is supported today, matching the donor engine's own surface bring-up: everything
//! else is rejected rather than guessed at. A second platform would add its own
//! `create_*_surface` function and extension list here rather than widen this one.

use std::ffi::CStr;

use ash::vk;
use raw_window_handle::{HasWindowHandle, RawWindowHandle};

use crate::error::RhiError;

/// Instance extensions a Win32 window surface needs, for `DeviceDesc::surface_extensions`.
pub fn win32_surface_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::surface::NAME, ash::khr::win32_surface::NAME]
}

/// Pulls `(hwnd, hinstance)` out of a window handle, rejecting anything but Win32. Split out
/// from `create_win32_surface` so the rejection path is testable without a real Vulkan instance.
fn win32_handle_parts(window: &dyn HasWindowHandle) -> Result<(isize, isize), RhiError> {
    let handle = window
        .window_handle()
        .map_err(|e| RhiError::SwapChainCreation(format!("window_handle: {e:?}")))?;
    match handle.as_raw() {
        RawWindowHandle::Win32(win) => {
            let hwnd = win.hwnd.get() as isize;
            let hinstance = win.hinstance.map(|h| h.get() as isize).unwrap_or(0);
            Ok((hwnd, hinstance))
        }
        other => Err(RhiError::SwapChainCreation(format!("only Win32 window handles are supported (got {other:?})"))),
    }
}

/// Creates a `VK_KHR_win32_surface` surface from `window`. The instance must already have been
/// created with [`win32_surface_extensions`] enabled (via `DeviceDesc::surface_extensions`).
pub fn create_win32_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &dyn HasWindowHandle,
) -> Result<vk::SurfaceKHR, RhiError> {
    let (hwnd, hinstance) = win32_handle_parts(window)?;
    let create_info = vk::Win32SurfaceCreateInfoKHR::default().hinstance(hinstance).hwnd(hwnd);
    let win32_surface = ash::khr::win32_surface::Instance::new(entry, instance);
    unsafe { win32_surface.create_win32_surface(&create_info, None) }
        .map_err(|e| RhiError::SwapChainCreation(format!("create_win32_surface: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{HandleError, Win32WindowHandle, WindowHandle, XlibWindowHandle};
    use std::num::NonZeroIsize;

    struct FakeWin32Window(Win32WindowHandle);
    impl HasWindowHandle for FakeWin32Window {
        fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
            Ok(unsafe { WindowHandle::borrow_raw(RawWindowHandle::Win32(self.0)) })
        }
    }

    struct FakeXlibWindow(XlibWindowHandle);
    impl HasWindowHandle for FakeXlibWindow {
        fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
            Ok(unsafe { WindowHandle::borrow_raw(RawWindowHandle::Xlib(self.0)) })
        }
    }

    #[test]
    fn win32_handle_parts_extracts_hwnd_and_hinstance() {
        let mut handle = Win32WindowHandle::new(NonZeroIsize::new(0x1234).unwrap());
        handle.hinstance = NonZeroIsize::new(0x5678);
        let window = FakeWin32Window(handle);
        let (hwnd, hinstance) = win32_handle_parts(&window).unwrap();
        assert_eq!(hwnd, 0x1234);
        assert_eq!(hinstance, 0x5678);
    }

    #[test]
    fn win32_handle_parts_rejects_non_win32_handles() {
        let window = FakeXlibWindow(XlibWindowHandle::new(42));
        assert!(win32_handle_parts(&window).is_err());
    }
}
