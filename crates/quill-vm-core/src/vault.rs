//! Vaults
//!
//! A vault is the isolated unit of runtime state: the object heap, the class
//! arena, loaded modules and call frames. One thread owns a vault at a time.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;
use quill_vm_gc::{GcConfig, GcError, GcStats, ImmortalArena, SLOT_SIZE};
use rustc_hash::FxHashSet;

use crate::class::{ClassRef, ModuleId, RuntimeClass, RuntimeToken};
use crate::error::{ErrorCode, FaultKind, VmError, VmResult};
use crate::ffi::{NativeArgs, NativeContext, NativeRegistry};
use crate::flags::MethodFlags;
use crate::frame::{CallFrame, FRAME_OWNER, FrameId, FrameMethod, SYSTEM_FRAMES};
use crate::method::{MethodRef, NativeBinding, RuntimeMethod};
use crate::module::Module;
use crate::names::{Interner, QualifiedTypeName};
use crate::object::{HeapObject, ObjectHeap};
use crate::token::TokenGranter;
use crate::types::CoreTypes;
use crate::value::{ObjectRef, Value};
use crate::version::Version;

/// Name of the entry-point method
pub const ENTRY_POINT: &str = "master";

/// Number of objects expected to survive disposal: the root sentinel
pub const SENTINEL_COUNT: usize = 1;

/// Vault configuration
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault name, used in diagnostics
    pub name: String,
    /// Heap configuration
    pub heap: GcConfig,
    /// Directories searched for `{name}.qmod` dependencies
    pub search_paths: Vec<PathBuf>,
    /// Reject loaded classes that never received a runtime token
    pub validate_tokens: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            name: "vault".to_string(),
            heap: GcConfig::default(),
            search_paths: Vec::new(),
            validate_tokens: true,
        }
    }
}

/// Heap counters reported when a vault is disposed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposeReport {
    /// Objects still alive after disposal
    pub alive_objects: usize,
    /// Payload bytes still alive
    pub alive_bytes: usize,
    /// Payload bytes requested over the vault's lifetime
    pub total_bytes_requested: usize,
}

impl fmt::Display for DisposeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} objects alive ({} bytes), {} bytes requested",
            self.alive_objects, self.alive_bytes, self.total_bytes_requested
        )
    }
}

/// Isolated runtime state
pub struct Vault {
    pub(crate) config: VaultConfig,
    pub(crate) heap: ObjectHeap,
    pub(crate) classes: ImmortalArena<RuntimeClass>,
    pub(crate) modules: IndexMap<ModuleId, Module>,
    pub(crate) types: CoreTypes,
    pub(crate) core_module: ModuleId,
    pub(crate) frames: ImmortalArena<CallFrame>,
    pub(crate) system_frames: Vec<(&'static str, FrameId)>,
    pub(crate) registry: Arc<NativeRegistry>,
    pub(crate) tokens: TokenGranter,
    pub(crate) interner: Interner,
    pub(crate) loading: FxHashSet<Arc<str>>,
    sentinel: ObjectRef,
    disposed: Option<DisposeReport>,
}

impl Vault {
    /// Create a vault with the predefined types, system frames and root sentinel
    pub fn new(config: VaultConfig, registry: Arc<NativeRegistry>) -> VmResult<Self> {
        let tokens = TokenGranter::new();
        let core_module = tokens.grant_module_id()?;
        let mut classes = ImmortalArena::new();
        let types = CoreTypes::install(&mut classes, &tokens, core_module)?;

        let mut heap = ObjectHeap::with_config(config.heap.clone());
        let sentinel = heap
            .allocate_immortal(HeapObject::new(types.object, 0), 0)
            .map_err(out_of_memory)?;

        let mut frames = ImmortalArena::new();
        let mut system_frames = Vec::with_capacity(SYSTEM_FRAMES.len());
        for name in SYSTEM_FRAMES {
            let frame = CallFrame::new(None, FrameMethod::System(name), 0);
            system_frames.push((name, frames.allocate(FRAME_OWNER, frame)));
        }

        tracing::debug!(vault = %config.name, "vault created");

        Ok(Self {
            config,
            heap,
            classes,
            modules: IndexMap::new(),
            types,
            core_module,
            frames,
            system_frames,
            registry,
            tokens,
            interner: Interner::new(),
            loading: FxHashSet::default(),
            sentinel,
            disposed: None,
        })
    }

    /// Vault configuration
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Predefined classes
    pub fn types(&self) -> &CoreTypes {
        &self.types
    }

    /// Module id owning the predefined classes
    pub fn core_module(&self) -> ModuleId {
        self.core_module
    }

    /// Shared native registry
    pub fn registry(&self) -> &Arc<NativeRegistry> {
        &self.registry
    }

    /// Root sentinel object
    pub fn sentinel(&self) -> ObjectRef {
        self.sentinel
    }

    pub(crate) fn ensure_alive(&self) -> VmResult<()> {
        if self.disposed.is_some() {
            return Err(VmError::state_corrupt(format!(
                "Vault '{}' is disposed",
                self.config.name
            )));
        }
        Ok(())
    }

    /// Loaded module by id
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(&id)
    }

    /// Loaded modules in load order
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Loaded module with this name and version
    pub fn find_module(&self, name: &str, version: &Version) -> Option<ModuleId> {
        self.modules
            .values()
            .find(|m| &*m.name == name && m.version == *version)
            .map(|m| m.id)
    }

    /// Whether a module with this name is being loaded
    pub fn is_loading(&self, name: &str) -> bool {
        self.loading.contains(name)
    }

    /// Class descriptor
    pub fn get_class(&self, class: ClassRef) -> Option<&RuntimeClass> {
        self.classes.get(class)
    }

    pub(crate) fn class_or_corrupt(&self, class: ClassRef) -> VmResult<&RuntimeClass> {
        self.classes
            .get(class)
            .ok_or_else(|| VmError::state_corrupt(format!("Class {class:?} is gone")))
    }

    /// Full name of a class, for diagnostics
    pub fn class_name(&self, class: ClassRef) -> String {
        self.classes
            .get(class)
            .map_or_else(|| format!("<freed {class:?}>"), |c| c.full_name.to_string())
    }

    /// `namespace/name` of a class, for stack traces
    pub fn class_name_with_ns(&self, class: ClassRef) -> String {
        self.classes
            .get(class)
            .map_or_else(|| format!("<freed {class:?}>"), |c| c.full_name.name_with_ns().to_string())
    }

    /// Method descriptor
    pub fn method(&self, method: MethodRef) -> Option<&RuntimeMethod> {
        self.classes
            .get(method.class)
            .and_then(|c| c.methods.get(method.index as usize))
    }

    /// Find a class by short name, `namespace/name` or full name
    ///
    /// Predefined classes are searched first, then modules in load order.
    pub fn find_type(&self, query: &str) -> Option<ClassRef> {
        if let Some(class) = self.types.find(&QualifiedTypeName::from_full(query)) {
            return Some(class);
        }
        let matches = |class: &ClassRef| {
            self.classes
                .get(*class)
                .is_some_and(|c| c.full_name.matches(query))
        };
        self.types
            .all()
            .map(|(_, class)| class)
            .find(|c| matches(c))
            .or_else(|| {
                self.modules
                    .values()
                    .flat_map(|m| m.class_table.iter().filter(|c| m.owns(**c)))
                    .copied()
                    .find(|c| matches(c))
            })
    }

    /// Find a class by runtime token
    pub fn find_type_by_token(&self, token: RuntimeToken) -> Option<ClassRef> {
        if !token.is_initialized() {
            return None;
        }
        self.classes
            .iter()
            .find(|(_, c)| c.token == token)
            .map(|(handle, _)| handle)
    }

    /// The public static `master()` method of `module`
    pub fn get_entry_point(&self, module: ModuleId) -> VmResult<MethodRef> {
        let m = self.modules.get(&module).ok_or_else(|| {
            VmError::fatal(ErrorCode::MissingMethod, format!("Module {module} is not loaded"))
        })?;
        for class in m.class_table.iter().copied().filter(|c| m.owns(*c)) {
            let Some(descriptor) = self.classes.get(class) else {
                continue;
            };
            let found = descriptor.methods.iter().position(|method| {
                &*method.name == ENTRY_POINT
                    && method.flags.contains(MethodFlags::PUBLIC | MethodFlags::STATIC)
                    && method.arguments.is_empty()
            });
            if let Some(index) = found {
                return Ok(MethodRef {
                    class,
                    index: index as u32,
                });
            }
        }
        tracing::error!(module = %m.name, "entry point not found");
        Err(VmError::fatal(
            ErrorCode::MissingMethod,
            format!("Entry point '{ENTRY_POINT}' not found in module '{}'", m.name),
        ))
    }

    /// Whether `from` is `to` or inherits from it
    pub fn is_assignable(&self, from: ClassRef, to: ClassRef) -> bool {
        let mut cursor = Some(from);
        let mut depth = 0usize;
        while let Some(current) = cursor {
            if current == to {
                return true;
            }
            depth += 1;
            if depth > self.classes.len() {
                return false;
            }
            cursor = self.classes.get(current).and_then(|c| c.parent);
        }
        false
    }

    /// Vtable offset of field `name` in `class`
    pub fn field_offset(&self, class: ClassRef, name: &str) -> VmResult<usize> {
        let descriptor = self.class_or_corrupt(class)?;
        let layout = descriptor.layout().ok_or_else(|| {
            VmError::state_corrupt(format!(
                "Class '{}' has no initialized vtable",
                descriptor.full_name
            ))
        })?;
        layout.offset(name).ok_or_else(|| {
            VmError::fatal(
                ErrorCode::MissingField,
                format!("Field '{name}' not found in '{}'", descriptor.full_name),
            )
        })
    }

    fn new_object(&self, class: ClassRef, extra_slots: usize) -> VmResult<(HeapObject, usize)> {
        let descriptor = self.class_or_corrupt(class)?;
        if !descriptor.is_completed() || descriptor.layout().is_none() {
            return Err(VmError::state_corrupt(format!(
                "Cannot allocate incomplete class '{}'",
                descriptor.full_name
            )));
        }
        let slots = descriptor.vtable_size();
        Ok((
            HeapObject::new(class, slots),
            (slots + extra_slots) * SLOT_SIZE,
        ))
    }

    /// Allocate a collected instance of `class`
    ///
    /// Runs a collection first when the heap crossed its threshold.
    pub fn allocate(&mut self, class: ClassRef) -> VmResult<ObjectRef> {
        self.allocate_sized(class, 0)
    }

    pub(crate) fn allocate_sized(&mut self, class: ClassRef, extra_slots: usize) -> VmResult<ObjectRef> {
        self.ensure_alive()?;
        let (object, size) = self.new_object(class, extra_slots)?;
        if self.heap.should_collect() {
            self.collect();
        }
        self.heap.allocate(object, size).map_err(out_of_memory)
    }

    /// Allocate an instance of `class` that is never collected
    pub fn allocate_immortal(&mut self, class: ClassRef) -> VmResult<ObjectRef> {
        self.ensure_alive()?;
        let (object, size) = self.new_object(class, 0)?;
        self.heap.allocate_immortal(object, size).map_err(out_of_memory)
    }

    /// Free an object immediately
    pub fn free(&mut self, object: ObjectRef) -> VmResult<()> {
        self.heap.free(object)?;
        Ok(())
    }

    /// Whether `object` still refers to a live object
    pub fn is_alive(&self, object: ObjectRef) -> bool {
        self.heap.contains(object)
    }

    /// Class of an object
    pub fn class_of(&self, object: ObjectRef) -> VmResult<ClassRef> {
        self.heap
            .get(object)
            .map(HeapObject::class)
            .ok_or_else(|| VmError::fault(FaultKind::NullPointer, format!("{object:?} is not alive")))
    }

    /// Read a vtable slot
    pub fn slot(&self, object: ObjectRef, offset: usize) -> VmResult<&Value> {
        let obj = self
            .heap
            .get(object)
            .ok_or_else(|| VmError::fault(FaultKind::NullPointer, format!("{object:?} is not alive")))?;
        obj.slot(offset).ok_or_else(|| {
            VmError::state_corrupt(format!("Slot {offset} outside vtable of {object:?}"))
        })
    }

    /// Write a vtable slot
    pub fn set_slot(&mut self, object: ObjectRef, offset: usize, value: Value) -> VmResult<()> {
        let obj = self
            .heap
            .get_mut(object)
            .ok_or_else(|| VmError::fault(FaultKind::NullPointer, format!("{object:?} is not alive")))?;
        let slot = obj.slot_mut(offset).ok_or_else(|| {
            VmError::state_corrupt(format!("Slot {offset} outside vtable of {object:?}"))
        })?;
        *slot = value;
        Ok(())
    }

    /// Read a field by name
    pub fn get_field(&self, object: ObjectRef, name: &str) -> VmResult<&Value> {
        let offset = self.field_offset(self.class_of(object)?, name)?;
        self.slot(object, offset)
    }

    /// Write a field by name
    pub fn set_field(&mut self, object: ObjectRef, name: &str, value: Value) -> VmResult<()> {
        let offset = self.field_offset(self.class_of(object)?, name)?;
        self.set_slot(object, offset, value)
    }

    /// Objects referenced from call frames
    fn roots(&self) -> Vec<ObjectRef> {
        let mut roots = Vec::new();
        for (_, frame) in self.frames.iter() {
            frame.trace(&mut |r| roots.push(r));
        }
        roots
    }

    /// Run a full collection over the frame roots
    pub fn collect(&mut self) -> usize {
        let roots = self.roots();
        let reclaimed = self.heap.collect(&roots);
        tracing::debug!(vault = %self.config.name, reclaimed, "collection finished");
        reclaimed
    }

    /// Heap counters
    pub fn heap_stats(&self) -> GcStats {
        self.heap.stats()
    }

    /// Call the builtin bound to an extern method
    pub fn invoke_native(
        &mut self,
        method: MethodRef,
        frame: FrameId,
        args: &NativeArgs,
    ) -> VmResult<Option<ObjectRef>> {
        let descriptor = self.method(method).ok_or_else(|| {
            VmError::fatal(ErrorCode::MissingMethod, format!("Method {method:?} not found"))
        })?;
        let function = match &descriptor.native {
            Some(NativeBinding::Builtin { function, .. }) => *function,
            Some(NativeBinding::Unavailable { code, reason }) => {
                return Err(VmError::fatal(*code, reason.clone()));
            }
            Some(NativeBinding::Import(entity)) => {
                return Err(VmError::state_corrupt(format!(
                    "'{}' is bound to external symbol '{}' and needs the interpreter's call bridge",
                    descriptor.signature, entity.symbol
                )));
            }
            None => {
                return Err(VmError::fatal(
                    ErrorCode::TypeLoad,
                    format!("'{}' has no native binding", descriptor.signature),
                ));
            }
        };
        let mut ctx = NativeContext { vault: self, frame };
        Ok(function(&mut ctx, args))
    }

    /// Dispose one module, freeing its classes and their instances
    pub fn dispose_module(&mut self, id: ModuleId) -> VmResult<()> {
        let mut module = self
            .modules
            .shift_remove(&id)
            .ok_or_else(|| VmError::state_corrupt(format!("Module {id} is not loaded")))?;
        module.dispose(&mut self.classes, &mut self.heap);
        Ok(())
    }

    /// Tear the vault down
    ///
    /// Modules are disposed newest first, collected objects are freed, and
    /// with `check_memory_leak` the heap must be left with the root sentinel
    /// only. Calling it again returns the first report.
    pub fn dispose(&mut self) -> VmResult<DisposeReport> {
        if let Some(report) = &self.disposed {
            return Ok(report.clone());
        }
        while let Some((_, mut module)) = self.modules.pop() {
            module.dispose(&mut self.classes, &mut self.heap);
        }
        let freed = self.heap.free_collected();
        self.frames.free_owned_by(FRAME_OWNER);
        self.system_frames.clear();

        let stats = self.heap.stats();
        let report = DisposeReport {
            alive_objects: stats.alive_objects,
            alive_bytes: stats.alive_bytes,
            total_bytes_requested: stats.total_bytes_requested,
        };
        tracing::debug!(vault = %self.config.name, freed, %report, "vault disposed");
        self.disposed = Some(report.clone());

        if self.config.heap.check_memory_leak {
            self.heap.verify_no_leaks(SENTINEL_COUNT)?;
        }
        Ok(report)
    }

    /// Whether [`Vault::dispose`] ran
    pub fn is_disposed(&self) -> bool {
        self.disposed.is_some()
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("name", &self.config.name)
            .field("modules", &self.modules.len())
            .field("classes", &self.classes.len())
            .field("heap", &self.heap.stats())
            .finish()
    }
}

fn out_of_memory(err: GcError) -> VmError {
    match err {
        GcError::OutOfMemory { .. } => {
            tracing::error!(error = %err, "heap exhausted");
            VmError::fatal(ErrorCode::OutOfMemory, err.to_string())
        }
        other => VmError::Gc(other),
    }
}
