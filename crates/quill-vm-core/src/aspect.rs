//! Aspects
//!
//! Aspects travel in constant storage as one entry per argument:
//!
//! ```text
//! aspect/\{Name}/\class/\{Class}._{index}
//! aspect/\{Name}/\class/\{Class}/\method/\{Method}._{index}
//! aspect/\{Name}/\class/\{Class}/\field/\{Field}._{index}
//! ```
//!
//! [`deconstruct`] groups entries by target key and rebuilds one
//! [`RuntimeAspect`] per group. [`distribute`] attaches each aspect to its
//! target and leaves unattachable ones in the module's table.

use std::sync::Arc;

use indexmap::IndexMap;
use quill_vm_gc::ImmortalArena;

use crate::class::{ClassRef, RuntimeClass};
use crate::error::{VmError, VmResult};
use crate::flags::ClassFlags;
use crate::module::{ConstStorage, Module};
use crate::value::Value;

/// Divider between aspect key components
pub const ASPECT_DIVIDER: &str = "/\\";

const ASPECT_PREFIX: &str = "aspect";
const CLASS_MARKER: &str = "class";
const METHOD_MARKER: &str = "method";
const FIELD_MARKER: &str = "field";

/// Name of the aspect that binds extern methods
pub const NATIVE_ASPECT: &str = "native";

/// What an aspect is attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AspectTarget {
    /// A class
    Class {
        /// Class name
        class: Arc<str>,
    },
    /// A method of a class
    Method {
        /// Class name
        class: Arc<str>,
        /// Method name or signature
        method: Arc<str>,
    },
    /// A field of a class
    Field {
        /// Class name
        class: Arc<str>,
        /// Field name
        field: Arc<str>,
    },
}

impl AspectTarget {
    /// Name of the class the target lives in
    pub fn class_name(&self) -> &str {
        match self {
            Self::Class { class } | Self::Method { class, .. } | Self::Field { class, .. } => {
                class
            }
        }
    }
}

/// Positional aspect argument
#[derive(Debug, Clone, PartialEq)]
pub struct AspectArgument {
    /// Position
    pub index: u32,
    /// Value
    pub value: Value,
}

/// Decoded aspect
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeAspect {
    /// Aspect name
    pub name: Arc<str>,
    /// Target
    pub target: AspectTarget,
    /// Arguments ordered by index
    pub arguments: Vec<AspectArgument>,
}

impl RuntimeAspect {
    /// Argument values in order
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.arguments.iter().map(|a| &a.value)
    }
}

/// Constant-storage key for one argument of an aspect
pub fn aspect_key(name: &str, target: &AspectTarget, index: u32) -> String {
    let d = ASPECT_DIVIDER;
    let head = format!("{ASPECT_PREFIX}{d}{name}{d}{CLASS_MARKER}{d}{}", target.class_name());
    match target {
        AspectTarget::Class { .. } => format!("{head}._{index}"),
        AspectTarget::Method { method, .. } => {
            format!("{head}{d}{METHOD_MARKER}{d}{method}._{index}")
        }
        AspectTarget::Field { field, .. } => format!("{head}{d}{FIELD_MARKER}{d}{field}._{index}"),
    }
}

fn marker(kind: &str) -> String {
    format!("{ASPECT_DIVIDER}{kind}{ASPECT_DIVIDER}")
}

/// Parse the group key (text before the argument suffix) into name and target
fn parse_group(group: &str) -> Option<(Arc<str>, AspectTarget)> {
    let rest = group.strip_prefix(&format!("{ASPECT_PREFIX}{ASPECT_DIVIDER}"))?;
    let class_marker = marker(CLASS_MARKER);
    let method_marker = marker(METHOD_MARKER);
    let field_marker = marker(FIELD_MARKER);

    let (name, target) = rest.split_once(&class_marker)?;
    if name.is_empty() {
        return None;
    }

    let target = if target.contains(&method_marker) {
        let (class, method) = target.split_once(&method_marker)?;
        AspectTarget::Method {
            class: class.into(),
            method: method.into(),
        }
    } else if target.contains(&field_marker) {
        let (class, field) = target.split_once(&field_marker)?;
        AspectTarget::Field {
            class: class.into(),
            field: field.into(),
        }
    } else if !target.contains(ASPECT_DIVIDER) {
        AspectTarget::Class {
            class: target.into(),
        }
    } else {
        return None;
    };

    if target.class_name().is_empty() {
        return None;
    }
    Some((name.into(), target))
}

/// Rebuild aspects from constant storage
///
/// Entries that look like aspects but cannot be parsed are logged and skipped.
pub fn deconstruct(storage: &ConstStorage) -> Vec<RuntimeAspect> {
    let prefix = format!("{ASPECT_PREFIX}{ASPECT_DIVIDER}");
    let mut groups: IndexMap<String, Vec<AspectArgument>> = IndexMap::new();

    for (key, value) in storage.iter() {
        let group = key.class();
        if !group.starts_with(&prefix) {
            continue;
        }
        let Some(index) = key.name().strip_prefix('_').and_then(|i| i.parse().ok()) else {
            tracing::warn!(key = %key, "malformed aspect argument index, skipped");
            continue;
        };
        groups.entry(group.to_string()).or_default().push(AspectArgument {
            index,
            value: value.clone(),
        });
    }

    groups
        .into_iter()
        .filter_map(|(group, mut arguments)| match parse_group(&group) {
            Some((name, target)) => {
                arguments.sort_by_key(|a| a.index);
                Some(RuntimeAspect {
                    name,
                    target,
                    arguments,
                })
            }
            None => {
                tracing::warn!(key = %group, "malformed aspect key, skipped");
                None
            }
        })
        .collect()
}

fn find_class(
    module: &Module,
    classes: &ImmortalArena<RuntimeClass>,
    name: &str,
) -> Option<ClassRef> {
    module.class_table.iter().copied().find(|c| {
        module.owns(*c) && classes.get(*c).is_some_and(|d| d.full_name.matches(name))
    })
}

/// Attach the module's pending aspects to their targets
///
/// Missing targets are a data-quality issue: they are logged and the aspect
/// stays in the module's table. A target class that is still unresolved is
/// an error.
pub fn distribute(module: &mut Module, classes: &mut ImmortalArena<RuntimeClass>) -> VmResult<()> {
    let pending = std::mem::take(&mut module.aspects);
    let mut unattached = Vec::new();

    for aspect in pending {
        let class_name = aspect.target.class_name();
        let Some(class) = find_class(module, classes, class_name) else {
            tracing::warn!(
                aspect = %aspect.name,
                class = class_name,
                module = %module.name,
                "aspect target class not found"
            );
            unattached.push(aspect);
            continue;
        };
        let Some(descriptor) = classes.get_mut(class) else {
            unattached.push(aspect);
            continue;
        };
        if descriptor.flags.contains(ClassFlags::UNRESOLVED) {
            return Err(VmError::UnresolvedClass(descriptor.full_name.to_string()));
        }

        match aspect.target.clone() {
            AspectTarget::Class { .. } => {
                if let Some(existing) = descriptor.aspects.iter_mut().find(|a| **a == aspect) {
                    *existing = aspect;
                } else {
                    descriptor.aspects.push(aspect);
                }
            }
            AspectTarget::Method { method, .. } => {
                match descriptor
                    .methods
                    .iter_mut()
                    .find(|m| *m.name == *method || *m.signature == *method)
                {
                    Some(target) => target.aspects.push(aspect),
                    None => {
                        tracing::warn!(
                            aspect = %aspect.name,
                            class = class_name,
                            method = %method,
                            "aspect target method not found"
                        );
                        unattached.push(aspect);
                    }
                }
            }
            AspectTarget::Field { field, .. } => {
                match descriptor
                    .fields
                    .iter_mut()
                    .find(|f| f.name.name() == &*field)
                {
                    Some(target) => target.aspects.push(aspect),
                    None => {
                        tracing::warn!(
                            aspect = %aspect.name,
                            class = class_name,
                            field = %field,
                            "aspect target field not found"
                        );
                        unattached.push(aspect);
                    }
                }
            }
        }
    }

    module.aspects = unattached;
    Ok(())
}
