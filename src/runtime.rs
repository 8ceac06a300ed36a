use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::air::Air;
use crate::error::{ImageLoadError, RunError};
use crate::features::Features;
use crate::instr::{decode, Instruction, Operand};
use crate::io::{Console, StdConsole};
use crate::memory::MemoryImage;
use crate::state::{ConditionCode, RegisterFile};
use crate::symbol::{Register, TrapVector};

/// Outcome of a step or run.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Status {
    /// More instructions may be executed.
    Running,
    /// `HALT` was executed. Further steps do nothing.
    Halted,
    /// The host requested a stop through a [`StopHandle`].
    Stopped,
}

/// Requests a running program to stop before its next instruction.
///
/// Clones share the same flag, so a handle can be given to another thread.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Allow a stopped program to be resumed.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Represents complete program state during runtime.
pub struct RunState<C = StdConsole> {
    /// System memory - 128KB in size.
    mem: MemoryImage,
    /// 8x 16-bit registers, program counter and condition code
    regs: RegisterFile,
    /// Character device for traps
    console: C,
    features: Features,
    halted: bool,
    stop: StopHandle,
    step_limit: Option<u64>,
    /// Instructions executed so far
    steps: u64,
}

impl<C: Console> RunState<C> {
    /// Start executing `mem` at `pc`.
    pub fn new(mem: MemoryImage, pc: u16, console: C) -> Self {
        RunState {
            mem,
            regs: RegisterFile::new(pc),
            console,
            features: Features::default(),
            halted: false,
            stop: StopHandle::default(),
            step_limit: None,
            steps: 0,
        }
    }

    /// Load a raw image (origin word, then data) and start at its origin.
    pub fn from_raw(raw: &[u16], console: C) -> Result<Self, ImageLoadError> {
        let mut mem = MemoryImage::new();
        let orig = mem.load_raw(raw)?;
        Ok(Self::new(mem, orig, console))
    }

    /// Load a binary image of big-endian words and start at its origin.
    pub fn from_image(bytes: &[u8], console: C) -> Result<Self, ImageLoadError> {
        let mut mem = MemoryImage::new();
        let orig = mem.load_bytes(bytes)?;
        Ok(Self::new(mem, orig, console))
    }

    pub fn from_air(air: &Air, console: C) -> Result<Self, ImageLoadError> {
        Self::from_raw(&air.to_raw(), console)
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run until `HALT`, a stop request or an error.
    pub fn run(&mut self) -> Result<Status, RunError> {
        loop {
            match self.step()? {
                Status::Running => continue,
                status => return Ok(status),
            }
        }
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// A step that fails to decode leaves every register and memory cell untouched.
    pub fn step(&mut self) -> Result<Status, RunError> {
        if self.halted {
            return Ok(Status::Halted);
        }
        // Check-point for hosts to stop a runaway program
        if self.stop.is_stopped() {
            warn!("Stop requested at 0x{:04x}", self.regs.pc());
            return Ok(Status::Stopped);
        }
        if let Some(limit) = self.step_limit {
            if self.steps >= limit {
                return Err(RunError::StepLimitExceeded { limit });
            }
        }

        let pc = self.regs.pc();
        let word = self.mem.read(pc);
        let instr = decode(word).map_err(|_| RunError::IllegalInstruction { pc, word })?;
        if let Instruction::Trap { vector } = instr {
            TrapVector::try_from(vector).map_err(|()| RunError::UnsupportedTrap { pc, word })?;
        }
        trace!("0x{pc:04x}: {instr}");

        // PC incremented before instruction is performed
        self.regs.set_pc(pc.wrapping_add(1));
        self.steps += 1;

        self.execute(instr).map_err(|source| {
            // Leave the trap to be retried
            self.regs.set_pc(pc);
            self.steps -= 1;
            RunError::Io { pc, source }
        })
    }

    /// Only traps touch the console and can fail.
    fn execute(&mut self, instr: Instruction) -> io::Result<Status> {
        use Instruction::*;
        match instr {
            Add { dr, sr1, src2 } => {
                let res = self.reg(sr1).wrapping_add(self.operand(src2));
                if self.features.source_cc {
                    self.regs.set(dr, res);
                    self.regs.set_cc(ConditionCode::of(self.reg(sr1)));
                } else {
                    self.regs.set_with_cc(dr, res);
                }
            }
            And { dr, sr1, src2 } => {
                let res = self.reg(sr1) & self.operand(src2);
                self.regs.set_with_cc(dr, res);
            }
            Br { cond, offset } => {
                if self.regs.cc().matches(cond) {
                    self.regs.set_pc(self.regs.pc_offset(offset));
                }
            }
            Jmp { base } => self.regs.set_pc(self.reg(base)),
            Jsr { offset } => {
                let target = self.regs.pc_offset(offset);
                self.regs.set(Register::R7, self.regs.pc());
                self.regs.set_pc(target);
            }
            Jsrr { base } => {
                // Read base first, it may be R7
                let target = self.reg(base);
                self.regs.set(Register::R7, self.regs.pc());
                self.regs.set_pc(target);
            }
            Ld { dr, offset } => {
                let val = self.mem.read(self.regs.pc_offset(offset));
                self.regs.set_with_cc(dr, val);
            }
            Ldi { dr, offset } => {
                let ptr = self.mem.read(self.regs.pc_offset(offset));
                let val = self.mem.read(ptr);
                self.regs.set_with_cc(dr, val);
            }
            Ldr { dr, base, offset } => {
                let ptr = self.reg(base).wrapping_add(offset as u16);
                let val = self.mem.read(ptr);
                self.regs.set_with_cc(dr, val);
            }
            Lea { dr, offset } => {
                let val = self.regs.pc_offset(offset);
                self.regs.set_with_cc(dr, val);
            }
            Not { dr, sr } => {
                let val = !self.reg(sr);
                self.regs.set_with_cc(dr, val);
            }
            Rti => debug!("RTI ignored at 0x{:04x}", self.regs.pc().wrapping_sub(1)),
            St { sr, offset } => {
                self.mem.write(self.regs.pc_offset(offset), self.reg(sr));
            }
            Sti { sr, offset } => {
                let ptr = self.mem.read(self.regs.pc_offset(offset));
                self.mem.write(ptr, self.reg(sr));
            }
            Str { sr, base, offset } => {
                let ptr = self.reg(base).wrapping_add(offset as u16);
                self.mem.write(ptr, self.reg(sr));
            }
            Trap { vector } => {
                // Vector already checked by `step`
                if let Ok(trap) = TrapVector::try_from(vector) {
                    return self.trap(trap);
                }
            }
        }
        Ok(Status::Running)
    }

    fn trap(&mut self, trap: TrapVector) -> io::Result<Status> {
        debug!("Trap {trap} at 0x{:04x}", self.regs.pc().wrapping_sub(1));
        match trap {
            TrapVector::Getc => {
                let ch = self.console.read_char()?;
                self.regs.set_with_cc(Register::R0, ch as u16);
            }
            TrapVector::In => {
                let ch = self.console.read_char()?;
                self.console.write_char(ch)?;
                self.console.flush()?;
                self.regs.set_with_cc(Register::R0, ch as u16);
            }
            TrapVector::Out => {
                let ch = (self.reg(Register::R0) & 0xFF) as u8;
                self.console.write_char(ch)?;
                self.console.flush()?;
            }
            TrapVector::Puts => {
                let start = self.reg(Register::R0);
                let mut len: u16 = 0;
                // At most one pass over memory
                for i in 0..=u16::MAX {
                    let chr_raw = self.mem.read(start.wrapping_add(i));
                    if chr_raw == 0 {
                        break;
                    }
                    self.console.write_char((chr_raw & 0xFF) as u8)?;
                    len = len.wrapping_add(1);
                }
                self.console.flush()?;
                self.advance_past_string(len);
            }
            TrapVector::Putsp => {
                let start = self.reg(Register::R0);
                let mut len: u16 = 0;
                'string: for i in 0..=u16::MAX {
                    let chr_raw = self.mem.read(start.wrapping_add(i));
                    // Low byte first
                    for chr in [chr_raw & 0xFF, chr_raw >> 8] {
                        if chr == 0 {
                            break 'string;
                        }
                        self.console.write_char(chr as u8)?;
                        len = len.wrapping_add(1);
                    }
                }
                self.console.flush()?;
                self.advance_past_string(len);
            }
            TrapVector::Halt => {
                self.halted = true;
                debug!("Halted after {} instructions", self.steps);
                return Ok(Status::Halted);
            }
        }
        Ok(Status::Running)
    }

    fn advance_past_string(&mut self, len: u16) {
        if !self.features.plain_puts {
            self.regs.set_pc(self.regs.pc().wrapping_add(len));
        }
    }

    #[inline]
    fn reg(&self, reg: Register) -> u16 {
        self.regs.get(reg)
    }

    #[inline]
    fn operand(&self, operand: Operand) -> u16 {
        match operand {
            Operand::Reg(reg) => self.reg(reg),
            Operand::Imm(imm) => imm as u16,
        }
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc()
    }

    pub fn regs(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    pub fn mem(&self) -> &MemoryImage {
        &self.mem
    }

    pub fn mem_mut(&mut self) -> &mut MemoryImage {
        &mut self.mem
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}
