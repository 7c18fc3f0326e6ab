//! Call frames and exceptions
//!
//! Frames live in an immortal arena owned by the vault and form a chain
//! through their `parent` links. A thrown exception is recorded on the frame
//! that raised it together with a rendered stack trace.

use std::fmt::Write as _;

use quill_vm_gc::Handle;
use smallvec::SmallVec;

use crate::class::ClassRef;
use crate::error::{ErrorCode, VmError, VmResult};
use crate::method::MethodRef;
use crate::value::{ObjectRef, Value};
use crate::vault::Vault;

/// Handle to a call frame
pub type FrameId = Handle<CallFrame>;

/// Arena owner id used for call frames
pub(crate) const FRAME_OWNER: u32 = 0;

/// Names of the per-vault system frames
pub const SYSTEM_FRAMES: [&str; 5] = ["quill_entry", "#module", "#jit", "#gc", "#ffi"];

/// Method a frame executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMethod {
    /// Managed method
    Managed(MethodRef),
    /// Named system frame with no owning class
    System(&'static str),
}

/// Exception recorded on a frame
#[derive(Debug, Clone)]
pub struct CallFrameException {
    /// Thrown object
    pub value: ObjectRef,
    /// Rendered stack trace, one `\tat` line per frame
    pub stack_trace: String,
    /// Instruction address at the time of the throw
    pub last_ip: u32,
}

/// A call frame
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Calling frame
    pub parent: Option<FrameId>,
    /// Executing method
    pub method: FrameMethod,
    /// Return value slot
    pub return_value: Value,
    /// Argument slots
    pub args: SmallVec<[Value; 4]>,
    /// Evaluation stack
    pub stack: Vec<Value>,
    /// Last executed instruction address
    pub last_ip: u32,
    /// Nesting depth, 0 for a root frame
    pub level: u32,
    /// Pending exception
    pub exception: Option<CallFrameException>,
}

impl CallFrame {
    pub(crate) fn new(parent: Option<FrameId>, method: FrameMethod, level: u32) -> Self {
        Self {
            parent,
            method,
            return_value: Value::Null,
            args: SmallVec::new(),
            stack: Vec::new(),
            last_ip: 0,
            level,
            exception: None,
        }
    }

    /// Report every object the frame keeps alive
    pub fn trace(&self, tracer: &mut dyn FnMut(ObjectRef)) {
        self.return_value.trace(tracer);
        self.args.iter().for_each(|v| v.trace(tracer));
        self.stack.iter().for_each(|v| v.trace(tracer));
        if let Some(exception) = &self.exception {
            tracer(exception.value);
        }
    }
}

/// Outcome of [`Vault::find_handler`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerSearch {
    /// A protected zone catches the exception
    Handled {
        /// Frame owning the zone
        frame: FrameId,
        /// Catch entry address
        address: i32,
    },
    /// No frame catches it
    Unhandled(String),
}

impl Vault {
    /// System frame by name
    pub fn system_frame(&self, name: &str) -> Option<FrameId> {
        self.system_frames
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, id)| *id)
    }

    /// Borrow a frame
    pub fn frame(&self, id: FrameId) -> Option<&CallFrame> {
        self.frames.get(id)
    }

    /// Mutably borrow a frame
    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut CallFrame> {
        self.frames.get_mut(id)
    }

    fn frame_or_corrupt(&self, id: FrameId) -> VmResult<&CallFrame> {
        self.frames
            .get(id)
            .ok_or_else(|| VmError::state_corrupt(format!("Frame {id:?} is gone")))
    }

    /// Push a frame for `method` called from `parent`
    pub fn push_frame(&mut self, parent: Option<FrameId>, method: FrameMethod) -> VmResult<FrameId> {
        let level = match parent {
            Some(p) => self.frame_or_corrupt(p)?.level + 1,
            None => 0,
        };
        Ok(self
            .frames
            .allocate(FRAME_OWNER, CallFrame::new(parent, method, level)))
    }

    /// Pop a frame, returning its contents
    pub fn pop_frame(&mut self, id: FrameId) -> VmResult<CallFrame> {
        if self.system_frames.iter().any(|(_, f)| *f == id) {
            return Err(VmError::state_corrupt("System frames cannot be popped"));
        }
        self.frames
            .free(id)
            .ok_or_else(|| VmError::state_corrupt(format!("Frame {id:?} is gone")))
    }

    /// Allocate an instance of `class` and record it as thrown on `frame`
    pub fn throw_exception(&mut self, frame: FrameId, class: ClassRef) -> VmResult<ObjectRef> {
        let value = self.allocate(class)?;
        self.record_exception(frame, value)?;
        Ok(value)
    }

    /// Like [`Vault::throw_exception`], also setting the `message` field
    pub fn throw_exception_with_message(
        &mut self,
        frame: FrameId,
        class: ClassRef,
        message: &str,
    ) -> VmResult<ObjectRef> {
        let offset = self.field_offset(class, "message").map_err(|_| {
            VmError::fatal(
                ErrorCode::MissingField,
                format!("Exception class '{}' has no message field", self.class_name(class)),
            )
        })?;
        let value = self.allocate(class)?;
        self.set_slot(value, offset, Value::Str(message.into()))?;
        self.record_exception(frame, value)?;
        Ok(value)
    }

    /// Throw the predefined exception for a kernel fault
    ///
    /// Errors other than [`VmError::Fault`] are passed through unchanged.
    pub fn throw_fault(&mut self, frame: FrameId, error: VmError) -> VmResult<ObjectRef> {
        match error {
            VmError::Fault { kind, message } => {
                let class = self.types.for_fault(kind);
                self.throw_exception_with_message(frame, class, &message)
            }
            other => Err(other),
        }
    }

    fn record_exception(&mut self, frame: FrameId, value: ObjectRef) -> VmResult<()> {
        let stack_trace = self.fill_stack_trace(frame)?;
        let record = self
            .frames
            .get_mut(frame)
            .ok_or_else(|| VmError::state_corrupt(format!("Frame {frame:?} is gone")))?;
        record.exception = Some(CallFrameException {
            value,
            stack_trace,
            last_ip: record.last_ip,
        });
        Ok(())
    }

    /// Render the stack trace starting at `frame`, innermost first
    pub fn fill_stack_trace(&self, frame: FrameId) -> VmResult<String> {
        let mut out = String::new();
        let mut cursor = Some(frame);
        while let Some(id) = cursor {
            let current = self.frame_or_corrupt(id)?;
            match current.method {
                FrameMethod::Managed(method) => {
                    let class = self.class_name_with_ns(method.class);
                    let name = self
                        .method(method)
                        .map_or("<unknown>", |m| &*m.name);
                    let _ = writeln!(out, "\tat {class}.{name}");
                }
                FrameMethod::System(name) => {
                    let _ = writeln!(out, "\tat <sys>.{name}");
                }
            }
            cursor = current.parent;
        }
        Ok(out)
    }

    /// Find the innermost protected zone catching `thrown`
    ///
    /// `ip` is the faulting address in `frame`; parent frames are searched at
    /// their own last recorded address.
    pub fn find_handler(&self, frame: FrameId, ip: u32, thrown: ClassRef) -> VmResult<HandlerSearch> {
        let mut cursor = Some((frame, ip));
        while let Some((id, at)) = cursor {
            let current = self.frame_or_corrupt(id)?;
            if let FrameMethod::Managed(method) = current.method {
                let zones = self
                    .method(method)
                    .and_then(|m| m.header.as_ref())
                    .map(|h| h.zones.as_slice())
                    .unwrap_or_default();
                for zone in zones.iter().filter(|z| z.covers(at)) {
                    let catch = zone.catch_types.iter().zip(&zone.catch_addresses).find(
                        |(ty, _)| match ty {
                            Some(ty) => self.is_assignable(thrown, *ty),
                            None => true,
                        },
                    );
                    if let Some((_, address)) = catch {
                        tracing::trace!(frame = ?id, address, "exception handler found");
                        return Ok(HandlerSearch::Handled {
                            frame: id,
                            address: *address,
                        });
                    }
                }
            }
            cursor = current
                .parent
                .and_then(|p| self.frames.get(p).map(|f| (p, f.last_ip)));
        }

        let trace = self.fill_stack_trace(frame)?;
        let report = format!("Unhandled exception {}\n{trace}", self.class_name(thrown));
        tracing::error!(exception = %self.class_name(thrown), "unhandled exception");
        Ok(HandlerSearch::Unhandled(report))
    }
}
