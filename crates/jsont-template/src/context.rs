/*
 * context.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Execution context for a single template render.
//!
//! Compilation turns template text into an immutable instruction tree that
//! can be reused across renders. A [`Context`] carries all of the mutable
//! state for one execution of that tree against one data value:
//!
//! 1. **Scope stack**: frames of data nodes with their iteration cursors
//! 2. **Diagnostics**: error records accumulated in safe mode
//! 3. **Partials**: raw partial sources and the per-render compile cache
//! 4. **Output**: the buffer every instruction appends to
//!
//! A context is created per render and consumed by [`Context::finish`]; it
//! is never reused.

use crate::ast::{Block, INDEX_VARIABLE, Instruction, NamePath, Position, Segment};
use crate::compiler::Compiler;
use crate::error::{ErrorInfo, ErrorKind, TemplateError, TemplateResult};
use crate::repr;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

const META_LEFT: &str = "{";
const META_RIGHT: &str = "}";

/// Default bound on partials applied inside partials.
pub const DEFAULT_MAX_PARTIAL_DEPTH: usize = 16;

/// Receives every unexpected failure caught at the instruction boundary,
/// in both safe and normal mode.
pub trait LoggingHook: Send + Sync {
    fn log(&self, error: &TemplateError);
}

/// The result of a render: its output and any errors recorded in safe mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rendered {
    pub output: String,
    pub errors: Vec<ErrorInfo>,
}

/// One level of the scope stack.
#[derive(Debug, Clone)]
struct Frame {
    node: Value,
    /// 0-based cursor; `None` when the frame is not iterating.
    index: Option<usize>,
    /// Names bound with `{.var}` while this frame is current.
    variables: HashMap<String, Value>,
}

impl Frame {
    fn new(node: Value) -> Self {
        Self {
            node,
            index: None,
            variables: HashMap::new(),
        }
    }

    /// Resolve a single name segment against this frame only.
    fn lookup(&self, segment: &Segment) -> Value {
        match segment {
            Segment::Key(key) if key == INDEX_VARIABLE => match self.index {
                Some(index) => Value::Int(index as i64 + 1),
                None => Value::Missing,
            },
            Segment::Key(key) if key.starts_with('@') => match self.variables.get(key) {
                Some(value) => value.clone(),
                None => self.node.path(key).clone(),
            },
            Segment::Key(key) => self.node.path(key).clone(),
            Segment::Index(index) => self.node.at(*index).clone(),
        }
    }
}

/// Tracks all of the state needed to execute a template against a value.
pub struct Context {
    stack: Vec<Frame>,
    current: Frame,
    safe_execution: bool,
    errors: Vec<ErrorInfo>,
    /// Position of the instruction currently executing.
    position: Position,
    raw_partials: Option<Value>,
    compiled_partials: HashMap<String, Arc<Instruction>>,
    compiler: Option<Arc<dyn Compiler>>,
    logging_hook: Option<Arc<dyn LoggingHook>>,
    partial_depth: usize,
    max_partial_depth: usize,
    buf: String,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.stack.len())
            .field("node", &self.current.node)
            .field("safe_execution", &self.safe_execution)
            .field("errors", &self.errors)
            .field("partial_depth", &self.partial_depth)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context rooted at `node`.
    pub fn new(node: Value) -> Self {
        Self {
            stack: Vec::new(),
            current: Frame::new(node),
            safe_execution: false,
            errors: Vec::new(),
            position: Position::start(),
            raw_partials: None,
            compiled_partials: HashMap::new(),
            compiler: None,
            logging_hook: None,
            partial_depth: 0,
            max_partial_depth: DEFAULT_MAX_PARTIAL_DEPTH,
            buf: String::new(),
        }
    }

    /// Enable or disable safe execution.
    ///
    /// In safe mode no instruction failure halts the render; each one is
    /// recorded in [`Context::errors`] and execution continues.
    pub fn with_safe_execution(mut self, safe: bool) -> Self {
        self.safe_execution = safe;
        self
    }

    /// Supply the raw partials, a JSON object mapping names to template text.
    pub fn with_partials(mut self, partials: Value) -> Self {
        self.raw_partials = Some(partials);
        self
    }

    /// Set the compiler used to compile partials on first use.
    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn with_logging_hook(mut self, hook: Arc<dyn LoggingHook>) -> Self {
        self.logging_hook = Some(hook);
        self
    }

    /// Set the maximum nesting depth of applied partials.
    pub fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = depth;
        self
    }

    pub fn safe_execution_enabled(&self) -> bool {
        self.safe_execution
    }

    pub fn errors(&self) -> &[ErrorInfo] {
        &self.errors
    }

    pub fn meta_left(&self) -> &'static str {
        META_LEFT
    }

    pub fn meta_right(&self) -> &'static str {
        META_RIGHT
    }

    pub fn buffer(&self) -> &str {
        &self.buf
    }

    pub fn append(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Consume the context, returning its output and recorded errors.
    pub fn finish(self) -> Rendered {
        Rendered {
            output: self.buf,
            errors: self.errors,
        }
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Execute a single instruction. `None` is a no-op.
    ///
    /// All instruction execution passes through here so that failures are
    /// tagged with the position and canonical form of the instruction that
    /// raised them.
    pub fn execute<'i>(
        &mut self,
        instruction: impl Into<Option<&'i Instruction>>,
    ) -> TemplateResult<()> {
        let Some(instruction) = instruction.into() else {
            return Ok(());
        };
        self.position = instruction.position();
        match instruction.invoke(self) {
            Ok(()) => Ok(()),
            Err(err @ TemplateError::Execute { .. }) => Err(err),
            Err(err) => {
                // Nested execution may have moved the position.
                self.position = instruction.position();
                let info = self
                    .error(ErrorKind::UnexpectedError)
                    .with_name(err.class_name())
                    .with_data(err.to_string())
                    .with_repr(repr::emit(instruction, false));

                tracing::warn!(
                    line = info.line(),
                    offset = info.offset(),
                    error = %err,
                    "Instruction failed"
                );
                if let Some(hook) = &self.logging_hook {
                    hook.log(&err);
                }

                if self.safe_execution {
                    self.add_error(info);
                    Ok(())
                } else {
                    Err(TemplateError::Execute {
                        info: Box::new(info),
                        source: Some(Box::new(err)),
                    })
                }
            }
        }
    }

    /// Execute a list of instructions in order, stopping at the first
    /// error that propagates.
    pub fn execute_all(&mut self, instructions: &[Instruction]) -> TemplateResult<()> {
        for instruction in instructions {
            self.execute(instruction)?;
        }
        Ok(())
    }

    pub fn execute_block(&mut self, block: &Block) -> TemplateResult<()> {
        self.execute_all(&block.instructions)
    }

    /// Start an error record of `kind` at the currently-executing instruction.
    pub fn error(&self, kind: ErrorKind) -> ErrorInfo {
        ErrorInfo::new(kind, self.position)
    }

    pub fn add_error(&mut self, error: ErrorInfo) {
        self.errors.push(error);
    }

    // ------------------------------------------------------------------
    // Partials
    // ------------------------------------------------------------------

    /// Return the compiled tree for partial `name`, compiling it on first use.
    ///
    /// Returns `Ok(None)` when no partials were supplied, when the name is
    /// absent or its entry is not a string, or when no compiler is set.
    /// In safe mode, syntax errors are recorded under a
    /// `COMPILE_PARTIAL_SYNTAX` error and the partially-compiled tree is
    /// still cached and returned. In normal mode a syntax error propagates.
    pub fn get_partial(&mut self, name: &str) -> TemplateResult<Option<Arc<Instruction>>> {
        let Some(raw_partials) = &self.raw_partials else {
            return Ok(None);
        };

        if let Some(inst) = self.compiled_partials.get(name) {
            tracing::debug!(partial = name, "Partial cache hit");
            return Ok(Some(Arc::clone(inst)));
        }

        // TODO: a non-string partial entry should be reported, not ignored.
        let Some(source) = raw_partials.path(name).as_str() else {
            return Ok(None);
        };
        let Some(compiler) = &self.compiler else {
            return Ok(None);
        };

        tracing::debug!(partial = name, "Compiling partial");
        let template = if self.safe_execution {
            let template = compiler.compile_safe(source);
            if !template.errors().is_empty() {
                let parent = self
                    .error(ErrorKind::CompilePartialSyntax)
                    .with_name(name)
                    .with_children(template.errors().iter().cloned());
                self.add_error(parent);
            }
            template
        } else {
            compiler.compile(source)?
        };

        let inst = Arc::clone(template.code());
        self.compiled_partials
            .insert(name.to_string(), Arc::clone(&inst));
        Ok(Some(inst))
    }

    /// Execute partial `name` against the current node and return its
    /// output, or `None` if the partial is not found.
    ///
    /// The partial runs in a fresh scope: it sees the current node, not the
    /// frames beneath it. Its output goes to a separate buffer.
    pub fn apply_partial(&mut self, name: &str) -> TemplateResult<Option<String>> {
        if self.partial_depth >= self.max_partial_depth {
            return Err(TemplateError::RecursivePartial {
                name: name.to_string(),
                max_depth: self.max_partial_depth,
            });
        }
        let Some(inst) = self.get_partial(name)? else {
            return Ok(None);
        };

        let scope = Frame::new(self.node().clone());
        let saved_stack = std::mem::take(&mut self.stack);
        let saved_current = std::mem::replace(&mut self.current, scope);
        let saved_buf = std::mem::take(&mut self.buf);
        let saved_position = self.position;
        self.partial_depth += 1;

        let result = self.execute(inst.as_ref());

        self.partial_depth -= 1;
        self.position = saved_position;
        let output = std::mem::replace(&mut self.buf, saved_buf);
        self.current = saved_current;
        self.stack = saved_stack;

        result.map(|()| Some(output))
    }

    // ------------------------------------------------------------------
    // Scope stack
    // ------------------------------------------------------------------

    /// The current frame's node.
    pub fn node(&self) -> &Value {
        &self.current.node
    }

    /// Replace the current frame's node. Formatters chain through this.
    pub fn set_node(&mut self, node: impl Into<Value>) {
        self.current.node = node.into();
    }

    /// Push a new frame for `node`.
    pub fn push(&mut self, node: Value) {
        let frame = std::mem::replace(&mut self.current, Frame::new(node));
        self.stack.push(frame);
    }

    /// Pop back to the previous frame.
    pub fn pop(&mut self) {
        match self.stack.pop() {
            Some(frame) => self.current = frame,
            None => tracing::warn!("Pop on empty scope stack"),
        }
    }

    /// Run `f` with `node` pushed as the current frame, popping afterwards
    /// whether or not `f` succeeds.
    pub fn with_scope<T>(
        &mut self,
        node: Value,
        f: impl FnOnce(&mut Self) -> TemplateResult<T>,
    ) -> TemplateResult<T> {
        self.push(node);
        let result = f(self);
        self.pop();
        result
    }

    /// Number of frames beneath the current one.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bind `value` under `name` on the current frame. The binding is
    /// visible to lookups until the frame is popped.
    pub fn bind_variable(&mut self, name: &str, value: Value) {
        self.current.variables.insert(name.to_string(), value);
    }

    // ------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------

    /// Start iterating the current node. Returns false, leaving state
    /// untouched, if the node is not an array.
    pub fn init_iteration(&mut self) -> bool {
        if !self.current.node.is_array() {
            return false;
        }
        self.current.index = Some(0);
        true
    }

    /// The current frame's 0-based iteration cursor.
    pub fn current_index(&self) -> Option<usize> {
        self.current.index
    }

    pub fn has_next(&self) -> bool {
        self.current
            .index
            .is_some_and(|index| index < self.current.node.size())
    }

    /// Push the element at the cursor. An explicit null element is pushed
    /// as the missing sentinel. The cursor does not advance.
    pub fn push_next(&mut self) {
        let index = self.current.index.unwrap_or(0);
        let node = match self.current.node.at(index) {
            Value::Null => Value::Missing,
            node => node.clone(),
        };
        self.push(node);
    }

    pub fn increment(&mut self) {
        if let Some(index) = self.current.index.as_mut() {
            *index += 1;
        }
    }

    // ------------------------------------------------------------------
    // Name resolution
    // ------------------------------------------------------------------

    /// Resolve one name segment, starting at the current frame and walking
    /// the stack outwards. Returns [`Value::Missing`] if no frame has it.
    pub fn resolve_name(&self, segment: &Segment) -> Value {
        let node = self.current.lookup(segment);
        if !node.is_missing() {
            return node;
        }
        for frame in self.stack.iter().rev() {
            let node = frame.lookup(segment);
            if !node.is_missing() {
                return node;
            }
        }
        Value::Missing
    }

    /// Resolve a dotted path.
    ///
    /// Only the first segment walks the stack; the rest are direct child
    /// lookups. A null in the middle of the path yields an inline
    /// diagnostic string rather than an error.
    pub fn resolve(&self, path: &NamePath) -> Value {
        let Some(segments) = path else {
            return self.current.node.clone();
        };
        let Some((first, rest)) = segments.split_first() else {
            return self.current.node.clone();
        };

        let mut node = self.resolve_name(first);
        for segment in rest {
            match node {
                Value::Missing => return Value::Missing,
                Value::Null => {
                    return Value::String(format!(
                        "[JSONT: Can't resolve '{}'.]",
                        repr::names(path)
                    ));
                }
                _ => node = child(&node, segment),
            }
        }
        node
    }

    /// Resolve a path for entering a section or repeated block.
    ///
    /// Unlike [`Context::resolve`], the first segment is looked up against
    /// the current frame only, so a section never picks up a same-named
    /// field from an enclosing scope.
    pub fn resolve_section(&self, path: &NamePath) -> Value {
        let Some(segments) = path else {
            return self.current.node.clone();
        };
        let Some((first, rest)) = segments.split_first() else {
            return self.current.node.clone();
        };

        let mut node = self.current.lookup(first);
        for segment in rest {
            if node.is_missing() {
                break;
            }
            node = child(&node, segment);
        }
        node
    }
}

fn child(node: &Value, segment: &Segment) -> Value {
    match segment {
        Segment::Key(key) => node.path(key).clone(),
        Segment::Index(index) => node.at(*index).clone(),
    }
}
