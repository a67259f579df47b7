use std::{
    path::PathBuf,
    sync::{Mutex, OnceLock},
};

use soundromeda::app_dirs::CONFIG_HOME_ENV as CONFIG_HOME_VAR;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Points the application directory at `path` until dropped.
pub struct ConfigHomeGuard {
    previous: Option<String>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl ConfigHomeGuard {
    pub fn set(path: PathBuf) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let previous = std::env::var(CONFIG_HOME_VAR).ok();
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(CONFIG_HOME_VAR, path);
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for ConfigHomeGuard {
    fn drop(&mut self) {
        match self.previous.take() {
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            Some(value) => unsafe { std::env::set_var(CONFIG_HOME_VAR, value) },
            // SAFETY: as above.
            None => unsafe { std::env::remove_var(CONFIG_HOME_VAR) },
        }
    }
}
