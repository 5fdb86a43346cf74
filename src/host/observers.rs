//! Built-in observers.

use crate::asm::disasm::disassemble_at;
use crate::cpu::Cpu;
use crate::host::observer::{Observer, TickControl};
use log::info;

/// Logs the registers after every tick, together with the opcode just
/// run and the next instruction.
#[derive(Debug, Default)]
pub struct Trace;

impl Trace {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for Trace {
    fn name(&self) -> &str {
        "trace"
    }

    fn on_tick(&mut self, cpu: &mut Cpu) -> TickControl {
        let (next, _) = disassemble_at(&cpu.mem, cpu.pc());
        let ran = cpu.last_instruction().map(|i| i.opcode.mnemonic()).unwrap_or("-");
        info!("#{:<8} {:<3} {}  next: {}", cpu.cycles, ran, cpu.regs, next);
        TickControl::Continue
    }
}

/// Stops the emulator once an instruction jumps to itself, e.g.
/// `SUB PC, 1`, the conventional way for a program to halt.
#[derive(Debug, Default)]
pub struct LoopDetector {
    last_pc: Option<u16>,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Observer for LoopDetector {
    fn name(&self) -> &str {
        "loop-detect"
    }

    fn on_start(&mut self, cpu: &mut Cpu) -> TickControl {
        self.last_pc = Some(cpu.pc());
        TickControl::Continue
    }

    fn on_tick(&mut self, cpu: &mut Cpu) -> TickControl {
        let pc = cpu.pc();
        if self.last_pc.replace(pc) == Some(pc) {
            info!("PC stuck at {:04x} after {} cycles", pc, cpu.cycles);
            return TickControl::Shutdown;
        }
        TickControl::Continue
    }
}

/// Stops the emulator after a fixed number of cycles.
#[derive(Debug)]
pub struct CycleLimit {
    limit: u64,
}

impl CycleLimit {
    pub const DEFAULT_LIMIT: u64 = 10_000;

    pub fn new(limit: u64) -> Self {
        Self { limit }
    }
}

impl Observer for CycleLimit {
    fn name(&self) -> &str {
        "cycle-limit"
    }

    fn on_start(&mut self, cpu: &mut Cpu) -> TickControl {
        if cpu.cycles >= self.limit {
            return TickControl::Shutdown;
        }
        TickControl::Continue
    }

    fn on_tick(&mut self, cpu: &mut Cpu) -> TickControl {
        if cpu.cycles >= self.limit {
            info!("reached cycle limit {}", self.limit);
            return TickControl::Shutdown;
        }
        TickControl::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_loop_detector() {
        let mut cpu = Cpu::new();
        cpu.load(&assemble("SET A, 1\nSUB PC, 1").unwrap(), 0).unwrap();
        let mut detector = LoopDetector::new();
        assert_eq!(detector.on_start(&mut cpu), TickControl::Continue);

        cpu.tick().unwrap();
        assert_eq!(detector.on_tick(&mut cpu), TickControl::Continue);
        cpu.tick().unwrap();
        assert_eq!(detector.on_tick(&mut cpu), TickControl::Shutdown);
    }

    #[test]
    fn test_cycle_limit() {
        let mut cpu = Cpu::new();
        let mut limit = CycleLimit::new(2);

        cpu.tick().unwrap();
        assert_eq!(limit.on_tick(&mut cpu), TickControl::Continue);
        cpu.tick().unwrap();
        assert_eq!(limit.on_tick(&mut cpu), TickControl::Shutdown);
    }

    #[test]
    fn test_zero_cycle_limit_stops_before_first_tick() {
        let mut cpu = Cpu::new();
        assert_eq!(CycleLimit::new(0).on_start(&mut cpu), TickControl::Shutdown);
    }

    #[test]
    fn test_trace_continues() {
        let mut cpu = Cpu::new();
        cpu.tick().unwrap();
        assert_eq!(Trace::new().on_tick(&mut cpu), TickControl::Continue);
    }
}
