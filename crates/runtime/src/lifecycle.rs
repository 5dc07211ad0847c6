//! Lifecycle of the embedded runtime
//!
//! The interpreter is process-global. A bridge constructed while no
//! interpreter is live starts one and owns it: it finalizes it on shutdown.
//! A bridge constructed while an interpreter is already live (started by a
//! host that embeds us, or by another bridge) shares it and never finalizes.
//!
//! ```text
//! (not live) --start--> Ready --shutdown--> ShutDown   (owner: finalizes)
//! (live)     --start--> SharedReady --shutdown--> ShutDown   (sharer: releases only)
//! ```

use crate::config::BridgeConfig;
use crate::interp::Interpreter;
use crate::lock::RuntimeLock;
use pyfunc_core::BridgeError;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// This bridge started the interpreter and will finalize it
    Ready,
    /// The interpreter was already live; it outlives this bridge
    SharedReady,
    /// Shutdown has run; no further runtime access
    ShutDown,
}

pub struct Lifecycle<R: Interpreter> {
    runtime: R,
    lock: &'static RuntimeLock,
    state: LifecycleState,
}

impl<R: Interpreter> Lifecycle<R> {
    /// Bring the runtime to a usable state under the global lock
    pub fn start(runtime: R, config: &BridgeConfig) -> Result<Self, BridgeError> {
        Self::start_with_lock(runtime, config, RuntimeLock::global())
    }

    /// Same as [`Lifecycle::start`] with an explicit lock
    pub fn start_with_lock(
        mut runtime: R,
        config: &BridgeConfig,
        lock: &'static RuntimeLock,
    ) -> Result<Self, BridgeError> {
        let _guard = lock.acquire();

        let shared = runtime.is_initialized();
        if shared {
            info!("embedded runtime already live, sharing it");
        } else {
            runtime.initialize(config).map_err(|e| {
                BridgeError::Init(format!("Could not initialize embedded Python: {}", e))
            })?;
            info!("embedded runtime started");
        }

        if let Err(e) = runtime.attach_namespace(config) {
            if !shared {
                runtime.finalize();
            }
            return Err(BridgeError::Init(format!(
                "Could not initialize embedded Python: {}",
                e
            )));
        }
        debug!(module = %config.main_module, "shared namespace attached");

        let state = if shared {
            LifecycleState::SharedReady
        } else {
            LifecycleState::Ready
        };
        Ok(Lifecycle {
            runtime,
            lock,
            state,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn owns_runtime(&self) -> bool {
        self.state == LifecycleState::Ready
    }

    pub fn is_shut_down(&self) -> bool {
        self.state == LifecycleState::ShutDown
    }

    pub fn lock(&self) -> &'static RuntimeLock {
        self.lock
    }

    /// Run `f` against the runtime with the global lock held
    ///
    /// Re-entrant: `f` may call back into code that takes the lock again.
    pub fn locked<T>(&self, f: impl FnOnce(&R) -> T) -> T {
        let _guard = self.lock.acquire();
        f(&self.runtime)
    }

    /// Read-only access to the backend, for diagnostics
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Release `leftovers`, then finalize the runtime if this bridge owns it
    ///
    /// Idempotent: only the first call has any effect.
    pub fn shutdown(&mut self, leftovers: impl IntoIterator<Item = R::Object>) {
        if self.is_shut_down() {
            return;
        }
        let _guard = self.lock.acquire();
        for object in leftovers {
            self.runtime.release(object);
        }
        if self.owns_runtime() {
            info!("finalizing embedded runtime");
            self.runtime.finalize();
        } else {
            debug!("leaving shared embedded runtime running");
        }
        self.state = LifecycleState::ShutDown;
    }
}

impl<R: Interpreter> Drop for Lifecycle<R> {
    fn drop(&mut self) {
        self.shutdown(std::iter::empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{Obj, Process, ScriptedInterpreter};

    #[test]
    fn test_owner_finalizes_once() {
        let process = Process::shared();
        let config = BridgeConfig::default();
        let mut lifecycle = Lifecycle::start(ScriptedInterpreter::new(&process), &config).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Ready);
        assert!(process.borrow().attached);

        lifecycle.shutdown(std::iter::empty());
        lifecycle.shutdown(std::iter::empty());
        assert!(lifecycle.is_shut_down());
        drop(lifecycle);
        assert_eq!(process.borrow().finalize_count, 1);
    }

    #[test]
    fn test_sharer_never_finalizes() {
        let process = Process::shared();
        process.borrow_mut().initialized = true;
        let config = BridgeConfig::default();
        let lifecycle = Lifecycle::start(ScriptedInterpreter::new(&process), &config).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::SharedReady);
        assert!(!lifecycle.owns_runtime());
        drop(lifecycle);

        let process = process.borrow();
        assert_eq!(process.init_count, 0);
        assert_eq!(process.finalize_count, 0);
        assert!(process.initialized);
    }

    #[test]
    fn test_shutdown_releases_leftovers_under_lock() {
        let process = Process::shared();
        let config = BridgeConfig::default();
        let mut lifecycle = Lifecycle::start(ScriptedInterpreter::new(&process), &config).unwrap();
        let noop: crate::scripted::NativeFn = std::rc::Rc::new(|_: &[Obj]| Ok::<Obj, String>(Obj::None));
        let leftovers = vec![Obj::Func("a".to_string(), noop)];
        lifecycle.shutdown(leftovers);
        assert_eq!(process.borrow().released_functions, vec!["a".to_string()]);
        assert!(!lifecycle.lock().is_held_by_current_thread());
    }

    #[test]
    fn test_locked_holds_the_lock() {
        let process = Process::shared();
        let config = BridgeConfig::default();
        let lifecycle = Lifecycle::start(ScriptedInterpreter::new(&process), &config).unwrap();
        let lock = lifecycle.lock();
        let depth = lifecycle.locked(|_| lock.depth());
        assert!(depth >= 1);
        assert!(!lock.is_held_by_current_thread());
    }
}
