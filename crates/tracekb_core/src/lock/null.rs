//! No-op lock manager.

use super::{LockManager, LockName, LockTimeout};
use crate::error::CoreResult;

/// A lock manager that never blocks.
///
/// Only suitable when a single caller edits the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLockManager;

impl LockManager for NullLockManager {
    fn acquire(&self, _name: &LockName, _timeout: LockTimeout) -> CoreResult<()> {
        Ok(())
    }

    fn release(&self, _name: &LockName) -> CoreResult<()> {
        Ok(())
    }

    fn is_held(&self, _name: &LockName) -> CoreResult<bool> {
        Ok(false)
    }

    fn force_unlock(&self, _name: &LockName) -> CoreResult<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_always_succeeds() {
        let manager = NullLockManager;
        let name = LockName::for_uri("http://host/base1/");
        manager.acquire(&name, LockTimeout::IMMEDIATE).unwrap();
        manager.acquire(&name, LockTimeout::IMMEDIATE).unwrap();
        assert!(!manager.is_held(&name).unwrap());
    }
}
