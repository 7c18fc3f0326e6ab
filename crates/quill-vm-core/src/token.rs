//! Runtime token granting

use parking_lot::Mutex;

use crate::class::ModuleId;
use crate::error::{VmError, VmResult};

#[derive(Debug, Default)]
struct TokenState {
    last_module_id: u16,
    last_class_id: u16,
}

/// Hands out module ids and class ids, both starting at 1
#[derive(Debug, Default)]
pub struct TokenGranter {
    state: Mutex<TokenState>,
}

impl TokenGranter {
    /// Create a granter with no ids handed out
    pub fn new() -> Self {
        Self::default()
    }

    /// Next module id
    pub fn grant_module_id(&self) -> VmResult<ModuleId> {
        let mut state = self.state.lock();
        state.last_module_id = state
            .last_module_id
            .checked_add(1)
            .ok_or_else(|| VmError::state_corrupt("Module id space exhausted"))?;
        Ok(state.last_module_id)
    }

    /// Next class id
    pub fn grant_class_id(&self) -> VmResult<u16> {
        let mut state = self.state.lock();
        state.last_class_id = state
            .last_class_id
            .checked_add(1)
            .ok_or_else(|| VmError::state_corrupt("Class id space exhausted"))?;
        Ok(state.last_class_id)
    }
}
