//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the [`GarageConfig`] is stored as a single
//! postcard blob under `garage::cfg`.
//!
//! - Config validation: all fields are range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - The simulation backend keeps the blob in memory (dev/test only).

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::GarageConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "garage";
const CONFIG_KEY: &str = "cfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Store raw bytes under the config key (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_put_raw(&self, bytes: Vec<u8>) {
        let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
        self.store.borrow_mut().insert(key, bytes);
    }

    /// Open an NVS namespace, run `f` with the handle, then close it.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, esp_err_t>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn key_cstr() -> [u8; 16] {
        let mut buf = [0u8; 16];
        buf[..CONFIG_KEY.len()].copy_from_slice(CONFIG_KEY.as_bytes());
        buf
    }
}

pub fn validate_config(cfg: &GarageConfig) -> Result<(), ConfigError> {
    if !(5..=3600).contains(&cfg.publish_interval_secs) {
        return Err(ConfigError::ValidationFailed("publish_interval_secs must be 5–3600"));
    }
    if cfg.auto_close_cutoff.hour > 23 || cfg.auto_close_cutoff.minute > 59 {
        return Err(ConfigError::ValidationFailed("auto_close_cutoff must be a valid time of day"));
    }
    if !(60..=86_400).contains(&cfg.auto_close_cooldown_secs) {
        return Err(ConfigError::ValidationFailed("auto_close_cooldown_secs must be 60–86400"));
    }
    if !(1..=300).contains(&cfg.grace_period_secs) {
        return Err(ConfigError::ValidationFailed("grace_period_secs must be 1–300"));
    }
    for pause in [
        cfg.pre_actuation_pause_secs,
        cfg.final_warning_pause_secs,
        cfg.actuation_settle_secs,
    ] {
        if pause > 60 {
            return Err(ConfigError::ValidationFailed("auto-close pauses must be 0–60"));
        }
    }
    if !(1..=3600).contains(&cfg.connect_backoff_secs) {
        return Err(ConfigError::ValidationFailed("connect_backoff_secs must be 1–3600"));
    }
    if !(100..=5000).contains(&cfg.loop_interval_ms) {
        return Err(ConfigError::ValidationFailed("loop_interval_ms must be 100–5000"));
    }
    if !cfg.log_path.starts_with('/') {
        return Err(ConfigError::ValidationFailed("log_path must be absolute"));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<Option<GarageConfig>, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let bytes = {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            match self.store.borrow().get(&key) {
                Some(bytes) => bytes.clone(),
                None => {
                    info!("NvsAdapter: no stored config");
                    return Ok(None);
                }
            }
        };

        #[cfg(target_os = "espidf")]
        let bytes = {
            let key = Self::key_cstr();
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
                let mut size: usize = 0;
                // First call: get size
                let ret = unsafe { nvs_get_blob(handle, key.as_ptr().cast(), core::ptr::null_mut(), &mut size) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                if size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ESP_ERR_NVS_INVALID_LENGTH as esp_err_t);
                }
                let mut buf = vec![0u8; size];
                let ret = unsafe { nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(buf)
            });
            match result {
                Ok(bytes) => bytes,
                // A namespace that was never written cannot be opened read-only.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as esp_err_t => {
                    info!("NvsAdapter: no stored config");
                    return Ok(None);
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}", e);
                    return Err(ConfigError::IoError);
                }
            }
        };

        let cfg: GarageConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(Some(cfg))
    }

    fn save(&self, config: &GarageConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = Self::key_cstr();
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
                let ret = unsafe { nvs_set_blob(handle, key.as_ptr().cast(), bytes.as_ptr().cast(), bytes.len()) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

/// Load the stored config, or persist and return the defaults when the
/// store is empty or unreadable.
pub fn load_or_init(port: &impl ConfigPort) -> GarageConfig {
    match port.load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            let cfg = GarageConfig::default();
            if let Err(e) = port.save(&cfg) {
                log::warn!("Could not persist default config: {e}");
            }
            cfg
        }
        Err(e) => {
            log::warn!("Stored config unusable ({e}), using defaults");
            GarageConfig::default()
        }
    }
}
