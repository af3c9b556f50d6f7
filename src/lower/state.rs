use crate::ir::{Block, Inst, Value};

/// What kind of structured construct a control frame models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameKind {
    /// The implicit frame around the whole function body; its continuation
    /// is the dedicated return block.
    Func,
    Block,
    Loop {
        header: Block,
    },
    If {
        /// The conditional branch whose false edge is repointed when an
        /// `else` arm materializes.
        head_branch: Inst,
        /// Whether the false edge still points at the continuation, i.e.
        /// no `else` has been seen.
        reachable_from_top: bool,
    },
    /// An `if` frame after its `else` was entered.
    Else,
}

/// One entry on the control stack: a nested `block`/`loop`/`if` (or the
/// function itself) with its continuation block and result phi.
#[derive(Debug)]
pub(crate) struct ControlStackFrame {
    pub kind: FrameKind,
    /// The block following the construct. Forward branches bind their
    /// operands into `phi` and jump here (except for loops, which branch
    /// back to their header).
    pub following: Block,
    /// The merge phi collecting the construct's result, if it has one.
    pub phi: Option<Value>,
    pub num_results: usize,
    /// Operand stack height when the frame was pushed.
    pub original_stack_size: usize,
    /// Whether any branch targets the continuation block.
    pub exit_branched_to: bool,
}

impl ControlStackFrame {
    pub fn is_loop(&self) -> bool {
        matches!(self.kind, FrameKind::Loop { .. })
    }

    /// Where a `br` to this frame lands: the loop header for loops, the
    /// continuation for everything else.
    pub fn br_destination(&self) -> Block {
        match self.kind {
            FrameKind::Loop { header } => header,
            _ => self.following,
        }
    }

    /// How many operands a branch to this frame carries.
    pub fn br_arity(&self) -> usize {
        if self.is_loop() {
            0
        } else {
            self.num_results
        }
    }

    pub fn set_branched_to_exit(&mut self) {
        if !self.is_loop() {
            self.exit_branched_to = true;
        }
    }
}

/// Mutable state of one function-body translation: the operand stack
/// mirroring Wasm's typed stack, the control stack of nested frames, and
/// the reachability flag for skipping dead code.
pub(crate) struct FuncLoweringState {
    pub stack: Vec<Value>,
    pub control_stack: Vec<ControlStackFrame>,
    pub reachable: bool,
}

impl FuncLoweringState {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            control_stack: Vec::new(),
            reachable: true,
        }
    }

    /// Resets the state and pushes the function frame.
    pub fn initialize(&mut self, return_block: Block, phi: Option<Value>, num_results: usize) {
        self.stack.clear();
        self.control_stack.clear();
        self.reachable = true;
        self.control_stack.push(ControlStackFrame {
            kind: FrameKind::Func,
            following: return_block,
            phi,
            num_results,
            original_stack_size: 0,
            exit_branched_to: false,
        });
    }

    pub fn push_block(&mut self, following: Block, phi: Option<Value>, num_results: usize) {
        let original_stack_size = self.stack.len();
        self.control_stack.push(ControlStackFrame {
            kind: FrameKind::Block,
            following,
            phi,
            num_results,
            original_stack_size,
            exit_branched_to: false,
        });
    }

    pub fn push_loop(
        &mut self,
        header: Block,
        following: Block,
        phi: Option<Value>,
        num_results: usize,
    ) {
        let original_stack_size = self.stack.len();
        self.control_stack.push(ControlStackFrame {
            kind: FrameKind::Loop { header },
            following,
            phi,
            num_results,
            original_stack_size,
            exit_branched_to: false,
        });
    }

    pub fn push_if(
        &mut self,
        head_branch: Inst,
        following: Block,
        phi: Option<Value>,
        num_results: usize,
        reachable: bool,
    ) {
        let original_stack_size = self.stack.len();
        self.control_stack.push(ControlStackFrame {
            kind: FrameKind::If {
                head_branch,
                reachable_from_top: reachable,
            },
            following,
            phi,
            num_results,
            original_stack_size,
            exit_branched_to: false,
        });
    }

    /// The frame `relative_depth` levels up from the top.
    pub fn frame_at(&mut self, relative_depth: u32) -> &mut ControlStackFrame {
        let i = self.control_stack.len() - 1 - relative_depth as usize;
        &mut self.control_stack[i]
    }

    pub fn push1(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop1(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    pub fn pop2(&mut self) -> (Value, Value) {
        let v2 = self.pop1();
        let v1 = self.pop1();
        (v1, v2)
    }

    pub fn pop3(&mut self) -> (Value, Value, Value) {
        let v3 = self.pop1();
        let (v1, v2) = self.pop2();
        (v1, v2, v3)
    }

    pub fn peek1(&self) -> Value {
        *self.stack.last().expect("operand stack underflow")
    }

    pub fn peekn(&self, n: usize) -> &[Value] {
        &self.stack[self.stack.len() - n..]
    }

    pub fn popn(&mut self, n: usize) {
        let len = self.stack.len();
        self.stack.truncate(len - n);
    }
}
