// Instruction set
mod layout;
pub use layout::{sign_extend, Layout};
mod instr;
pub use instr::{decode, Instruction, Operand};
mod symbol;
pub use symbol::{BranchCondition, DirKind, Register, SymbolTable, TrapVector};

// Assembling
pub mod literal;
mod encode;
pub use encode::{encode, encode_statement, parse_instruction, Context, Emit};
mod air;
pub use air::{Air, Assembler};
pub mod reader;

// Running
mod memory;
pub use memory::{words_from_bytes, MemoryImage, MEMORY_MAX, USER_ORIG};
mod state;
pub use state::{ConditionCode, RegisterFile};
mod runtime;
pub use runtime::{RunState, Status, StopHandle};
pub mod io;
pub mod output;

mod error;
pub use error::{AsmError, DecodeError, ImageLoadError, RunError, SourceError};

mod features;
pub use features::Features;
pub mod env;
