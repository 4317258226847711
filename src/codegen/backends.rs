//! Backend registry.
//!
//! Backends register once at start-up, possibly from several threads, into
//! a mutex-guarded global list. Everything else about a compilation lives in
//! the per-run [`Compilation`](super::Compilation); this list is the only
//! process-wide state.
//!
//! The built-in Haxe backend is registered on first lookup.

use std::sync::{Arc, Mutex, MutexGuard, Once};

use super::{Backend, CodeGenError, HaxeBackend};

/// Static per-backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Functions with more instructions than this are split.
    pub instruction_limit: usize,
    /// Largest body of a split-off sub-unit.
    pub sub_fn_instruction_limit: usize,
    /// Package constant naming the target package.
    pub package_const_name: String,
    /// Package constant holding text injected after each file start.
    pub header_const_name: String,
    /// Location of the hand-written runtime support code.
    pub runtime_path: String,
    pub line_comment: String,
    pub statement_terminator: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            instruction_limit: 512,
            sub_fn_instruction_limit: 256,
            package_const_name: "haxePackage".to_string(),
            header_const_name: "haxeHeader".to_string(),
            runtime_path: "goruntime".to_string(),
            line_comment: "//".to_string(),
            statement_terminator: ";".to_string(),
        }
    }
}

impl BackendConfig {
    /// Checks the limits are usable.
    pub fn validate(&self, backend: &str) -> Result<(), CodeGenError> {
        if self.instruction_limit == 0 {
            return Err(CodeGenError::invalid_config(
                backend,
                "instruction_limit must be positive",
            ));
        }
        if self.sub_fn_instruction_limit == 0 {
            return Err(CodeGenError::invalid_config(
                backend,
                "sub_fn_instruction_limit must be positive",
            ));
        }
        if self.sub_fn_instruction_limit > self.instruction_limit {
            return Err(CodeGenError::invalid_config(
                backend,
                format!(
                    "sub_fn_instruction_limit ({}) exceeds instruction_limit ({})",
                    self.sub_fn_instruction_limit, self.instruction_limit
                ),
            ));
        }
        Ok(())
    }
}

/// A backend together with its configuration.
pub struct BackendEntry {
    backend: Box<dyn Backend>,
    config: BackendConfig,
}

impl std::fmt::Debug for BackendEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendEntry")
            .field("name", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

impl BackendEntry {
    /// Creates a validated entry.
    pub fn new(backend: impl Backend + 'static, config: BackendConfig) -> Result<Self, CodeGenError> {
        config.validate(backend.name())?;
        Ok(Self {
            backend: Box::new(backend),
            config,
        })
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

static BACKENDS: Mutex<Vec<Arc<BackendEntry>>> = Mutex::new(Vec::new());
static BUILTINS: Once = Once::new();

fn lock() -> MutexGuard<'static, Vec<Arc<BackendEntry>>> {
    // the list stays consistent even if a registering thread panicked
    BACKENDS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn register_builtins() {
    BUILTINS.call_once(|| {
        match BackendEntry::new(HaxeBackend::new(), BackendConfig::default()) {
            Ok(entry) => {
                let mut list = lock();
                if !list.iter().any(|e| e.name() == entry.name()) {
                    list.push(Arc::new(entry));
                }
            }
            Err(e) => log::error!("built-in backend rejected: {}", e),
        }
    });
}

/// Registers a backend. Names must be unique.
pub fn register(entry: BackendEntry) -> Result<Arc<BackendEntry>, CodeGenError> {
    register_builtins();
    let mut list = lock();
    if list.iter().any(|e| e.name() == entry.name()) {
        return Err(CodeGenError::DuplicateBackend {
            name: entry.name().to_string(),
        });
    }
    let entry = Arc::new(entry);
    list.push(Arc::clone(&entry));
    log::debug!("registered backend {}", entry.name());
    Ok(entry)
}

/// Finds a registered backend by name.
pub fn find(name: &str) -> Result<Arc<BackendEntry>, CodeGenError> {
    register_builtins();
    lock()
        .iter()
        .find(|e| e.name() == name)
        .cloned()
        .ok_or_else(|| CodeGenError::UnknownBackend {
            name: name.to_string(),
        })
}

/// Names of all registered backends, in registration order.
pub fn names() -> Vec<String> {
    register_builtins();
    lock().iter().map(|e| e.name().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_haxe_is_registered() {
        let entry = find("haxe").expect("haxe registered");
        assert_eq!(entry.name(), "haxe");
        assert_eq!(entry.config().instruction_limit, 512);
        assert!(names().contains(&"haxe".to_string()));
    }

    #[test]
    fn test_unknown_backend() {
        let err = find("cobol").unwrap_err();
        assert_eq!(err.to_string(), "Target Language Not Found: cobol");
    }

    #[test]
    fn test_duplicate_rejected() {
        let entry = BackendEntry::new(HaxeBackend::new(), BackendConfig::default()).unwrap();
        assert!(matches!(
            register(entry),
            Err(CodeGenError::DuplicateBackend { .. })
        ));
    }

    #[test]
    fn test_config_validation() {
        let bad = BackendConfig {
            sub_fn_instruction_limit: 600,
            ..BackendConfig::default()
        };
        assert!(matches!(
            BackendEntry::new(HaxeBackend::new(), bad),
            Err(CodeGenError::InvalidConfig { .. })
        ));
        let zero = BackendConfig {
            sub_fn_instruction_limit: 0,
            ..BackendConfig::default()
        };
        assert!(zero.validate("haxe").is_err());
        assert!(BackendConfig::default().validate("haxe").is_ok());
    }

    #[test]
    fn test_concurrent_registration() {
        std::thread::scope(|s| {
            for i in 0..8 {
                s.spawn(move || {
                    let name = format!("haxe-concurrent-{}", i);
                    let entry =
                        BackendEntry::new(HaxeBackend::named(&name), BackendConfig::default())
                            .unwrap();
                    register(entry).unwrap();
                });
            }
        });
        let registered = names();
        for i in 0..8 {
            assert!(registered.contains(&format!("haxe-concurrent-{}", i)));
        }
        assert_eq!(registered.iter().filter(|n| *n == "haxe").count(), 1);
    }
}
