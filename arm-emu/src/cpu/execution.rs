use super::core::Cpu;
use super::types::EmuError;
use crate::analysis::Analysis;
use crate::bus::Bus;
use crate::decoder::{Condition, DataProc, Op, Operand2, Register, Shift, ShiftAmount, ShiftKind, Transfer};

impl Cpu {
    /// Execute one decoded instruction located at the current PC.
    ///
    /// `word` is the raw encoding, kept for error reporting. Data accesses go
    /// straight to `bus`; only instruction fetch is cached.
    pub fn execute(
        &mut self,
        op: Op,
        word: u32,
        bus: &mut dyn Bus,
        analysis: &mut Analysis,
    ) -> Result<(), EmuError> {
        match op {
            Op::Bx { rm } => {
                self.exec_bx(rm, analysis);
                Ok(())
            }
            Op::Branch { cond, link, offset } => {
                self.exec_branch(cond, link, offset, analysis);
                Ok(())
            }
            Op::Add(dp) => self.exec_alu(dp, word, analysis, |rn, op2| rn.wrapping_add(op2)),
            Op::Mov(dp) => self.exec_alu(dp, word, analysis, |_, op2| op2),
            Op::Sub(dp) => self.exec_alu(dp, word, analysis, |rn, op2| rn.wrapping_sub(op2)),
            Op::Rsb(dp) => self.exec_alu(dp, word, analysis, |rn, op2| op2.wrapping_sub(rn)),
            Op::And(dp) => self.exec_alu(dp, word, analysis, |rn, op2| rn & op2),
            Op::Mul { rd, rm, rs } => {
                self.exec_mul(rd, rm, rs, analysis);
                Ok(())
            }
            Op::Cmp(dp) => self.exec_cmp(dp, word, analysis),
            Op::Sdt(transfer) => self.exec_transfer(transfer, word, bus, analysis),
        }
    }

    fn shift(&self, value: u32, shift: Shift, word: u32) -> Result<u32, EmuError> {
        let amount = match shift.amount {
            ShiftAmount::Imm(n) => n,
            ShiftAmount::Reg(rs) => self.read_reg(rs) & 0xFF,
        };
        let result = match shift.kind {
            ShiftKind::Lsl => value.checked_shl(amount).unwrap_or(0),
            ShiftKind::Lsr => value.checked_shr(amount).unwrap_or(0),
            ShiftKind::Asr => ((value as i32) >> amount.min(31)) as u32,
            ShiftKind::Ror => {
                return Err(EmuError::UnsupportedShift {
                    word,
                    pc: self.pc(),
                })
            }
        };
        Ok(result)
    }

    fn operand2(&self, op2: Operand2, word: u32) -> Result<u32, EmuError> {
        match op2 {
            Operand2::Imm(imm) => Ok(imm),
            Operand2::Reg { rm, shift: None } => Ok(self.read_reg(rm)),
            Operand2::Reg {
                rm,
                shift: Some(shift),
            } => self.shift(self.read_reg(rm), shift, word),
        }
    }

    fn exec_bx(&mut self, rm: Register, analysis: &mut Analysis) {
        analysis.branches += 1;
        analysis.record_branch(true);
        self.set_pc(self.read_reg(rm));
    }

    fn exec_branch(&mut self, cond: Condition, link: bool, offset: u32, analysis: &mut Analysis) {
        analysis.branches += 1;
        let pc = self.pc();

        // The link form ignores the condition field.
        if link {
            self.write_reg(Register::LR, pc.wrapping_add(4));
            self.set_pc(pc.wrapping_add(8).wrapping_add(offset));
            analysis.record_branch(true);
            return;
        }

        let taken = cond.holds(self.condition);
        if taken {
            self.set_pc(pc.wrapping_add(8).wrapping_add(offset));
        } else {
            self.set_pc(pc.wrapping_add(4));
        }
        analysis.record_branch(taken);
    }

    fn exec_alu(
        &mut self,
        dp: DataProc,
        word: u32,
        analysis: &mut Analysis,
        f: impl FnOnce(u32, u32) -> u32,
    ) -> Result<(), EmuError> {
        analysis.data_processing += 1;
        let op2 = self.operand2(dp.op2, word)?;
        let result = f(self.read_reg(dp.rn), op2);
        self.write_reg(dp.rd, result);
        self.advance_unless_pc(dp.rd);
        Ok(())
    }

    fn exec_mul(&mut self, rd: Register, rm: Register, rs: Register, analysis: &mut Analysis) {
        analysis.data_processing += 1;
        let result = self.read_reg(rm).wrapping_mul(self.read_reg(rs));
        self.write_reg(rd, result);
        self.advance_unless_pc(rd);
    }

    fn exec_cmp(&mut self, dp: DataProc, word: u32, analysis: &mut Analysis) -> Result<(), EmuError> {
        analysis.data_processing += 1;
        let op2 = self.operand2(dp.op2, word)?;
        self.condition = self.read_reg(dp.rn).wrapping_sub(op2);
        // Compare writes no register, so its Rd field is ignored.
        self.set_pc(self.pc().wrapping_add(4));
        Ok(())
    }

    fn exec_transfer(
        &mut self,
        t: Transfer,
        word: u32,
        bus: &mut dyn Bus,
        analysis: &mut Analysis,
    ) -> Result<(), EmuError> {
        analysis.memory += 1;
        let pc = self.pc();
        let fault = |source| EmuError::Memory { pc, source };

        // Immediate addressing always moves a full word.
        let byte = t.byte && matches!(t.offset, Operand2::Reg { .. });
        let addr = self
            .read_reg(t.rn)
            .wrapping_add(self.operand2(t.offset, word)?);

        if t.load {
            let value = if byte {
                bus.read8(addr).map_err(fault)? as u32
            } else {
                bus.read32(addr).map_err(fault)?
            };
            self.write_reg(t.rd, value);
        } else {
            let value = self.read_reg(t.rd);
            if byte {
                bus.write8(addr, value as u8).map_err(fault)?;
            } else {
                bus.write32(addr, value).map_err(fault)?;
            }
        }

        log::trace!(
            "{} {} [{:#010x}]{}",
            if t.load { "ldr" } else { "str" },
            t.rd,
            addr,
            if byte { " (byte)" } else { "" }
        );

        self.advance_unless_pc(t.rd);
        Ok(())
    }
}
