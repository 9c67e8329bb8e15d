//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] for the settings image. The whole image is
//! kept in RAM and committed as a single blob on every write, so a write is
//! atomic per `nvs_commit()` and reads never touch flash.
//!
//! - **`target_os = "espidf"`** — ESP-IDF NVS, namespace `relayctl`.
//! - **`not(target_os = "espidf")`** — RAM only, for host simulation.

use log::{info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::settings::layout;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const NAMESPACE: &[u8] = b"relayctl\0";
#[cfg(target_os = "espidf")]
const SETTINGS_KEY: &[u8] = b"settings\0";

type Image = [u8; layout::TOTAL];

/// Erased flash reads back as `0xFF`.
const BLANK: Image = [0xFF; layout::TOTAL];

pub struct NvsStorage {
    image: Image,
}

impl NvsStorage {
    /// Initialise NVS flash and load the stored image.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised. A missing or wrongly sized blob loads as blank.
    #[cfg(target_os = "espidf")]
    pub fn new() -> crate::error::Result<Self> {
        // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
        // single main-task context before any concurrent NVS access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
            warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK as i32 || unsafe { nvs_flash_init() } != ESP_OK as i32 {
                return Err(StorageError::IoError.into());
            }
        } else if ret != ESP_OK as i32 {
            return Err(StorageError::IoError.into());
        }

        let mut image = BLANK;
        let loaded = Self::with_nvs_handle(false, |handle| {
            let mut size = image.len();
            // SAFETY: image is valid for `size` bytes; NVS writes at most that.
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    SETTINGS_KEY.as_ptr().cast(),
                    image.as_mut_ptr().cast(),
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size != layout::TOTAL {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }
            Ok(())
        });
        match loaded {
            Ok(()) => info!("NVS: settings image loaded"),
            Err(rc) if rc == ESP_ERR_NVS_NOT_FOUND as i32 => {
                info!("NVS: no stored settings, starting blank");
                image = BLANK;
            }
            Err(rc) => {
                warn!("NVS: settings image unreadable (rc={}), starting blank", rc);
                image = BLANK;
            }
        }
        Ok(Self { image })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> crate::error::Result<Self> {
        info!("NVS: simulation backend");
        Ok(Self { image: BLANK })
    }

    /// Simulated storage pre-loaded with `image`.
    #[cfg(not(target_os = "espidf"))]
    pub fn with_image(image: Image) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Open the namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        // SAFETY: NAMESPACE is NUL-terminated; handle is a valid out-pointer.
        let ret = unsafe { nvs_open(NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }
        let result = f(handle);
        // SAFETY: handle was opened above and is not used afterwards.
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn commit(&self) -> Result<(), StorageError> {
        Self::with_nvs_handle(true, |handle| {
            // SAFETY: the image outlives the call; the key is NUL-terminated.
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    SETTINGS_KEY.as_ptr().cast(),
                    self.image.as_ptr().cast(),
                    self.image.len(),
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|rc| {
            warn!("NVS: commit failed (rc={})", rc);
            StorageError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn commit(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl StoragePort for NvsStorage {
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        let src = offset
            .checked_add(buf.len())
            .and_then(|end| self.image.get(offset..end))
            .ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.image.len())
            .ok_or(StorageError::OutOfBounds)?;
        let previous = self.image;
        self.image[offset..end].copy_from_slice(data);
        if let Err(e) = self.commit() {
            self.image = previous;
            return Err(e);
        }
        Ok(())
    }
}
