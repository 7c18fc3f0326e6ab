//! Vtable initialization
//!
//! Offsets are assigned once per class: the parent's layout first, then
//! the class's own fields in declaration order.

use quill_vm_gc::ImmortalArena;

use crate::class::{ClassRef, RuntimeClass, VTableLayout};
use crate::error::{VmError, VmResult};

/// Assign field offsets to `class`, initializing parents first
pub(crate) fn init_vtable(
    classes: &mut ImmortalArena<RuntimeClass>,
    class: ClassRef,
) -> VmResult<()> {
    let mut chain = Vec::new();
    let mut cursor = Some(class);
    while let Some(current) = cursor {
        let descriptor = classes
            .get(current)
            .ok_or_else(|| VmError::state_corrupt(format!("Freed class {current:?} in hierarchy")))?;
        if descriptor.layout.is_some() {
            break;
        }
        if !descriptor.is_completed() {
            return Err(VmError::state_corrupt(format!(
                "Class '{}' is not completed, cannot initialize its vtable",
                descriptor.full_name
            )));
        }
        if chain.contains(&current) {
            return Err(VmError::state_corrupt(format!(
                "Inheritance cycle through '{}'",
                descriptor.full_name
            )));
        }
        chain.push(current);
        cursor = descriptor.parent;
    }

    for current in chain.into_iter().rev() {
        let Some(descriptor) = classes.get(current) else {
            continue;
        };
        let mut layout = match descriptor.parent.and_then(|p| classes.get(p)) {
            Some(parent) => parent.layout.clone().unwrap_or_default(),
            None => VTableLayout::default(),
        };
        for field in &descriptor.fields {
            layout.push(field.name.name().into());
        }
        tracing::trace!(
            class = %descriptor.full_name,
            slots = layout.size(),
            "vtable initialized"
        );
        if let Some(descriptor) = classes.get_mut(current) {
            descriptor.layout = Some(layout);
        }
    }
    Ok(())
}
