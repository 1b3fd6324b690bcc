use std::cell::Cell;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::{Quirks, Underflow};
use crate::constants::GLYPH_SIZE;
use crate::error::{Result, VmError};
use crate::framebuffer::FrameBuffer;
use crate::keypad::Keypad;
use crate::state::State;

/// Everything outside the CPU state that an instruction may touch
pub struct Peripherals<'a> {
    pub frame: &'a Mutex<FrameBuffer>,
    /// Snapshot of the last change to the frame buffer, waiting to be published
    pub pending: &'a Cell<Option<FrameBuffer>>,
    pub keypad: &'a Keypad,
    pub quirks: Quirks,
}

impl Peripherals<'_> {
    /// Runs `f` against the frame buffer and leaves a snapshot of the result in `pending`.
    /// The caller publishes it once it has let go of both the frame and the CPU state, so a sink
    /// is free to call back into the machine.
    pub(crate) fn with_frame<T>(&self, f: impl FnOnce(&mut FrameBuffer) -> T) -> T {
        let mut frame = lock(self.frame);
        let result = f(&mut frame);
        self.pending.set(Some(frame.clone()));
        result
    }
}

/// What the machine loop should do after an instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Carry on with the instruction at the pc
    Next,
    /// No key was available; the pc was left on the wait so it runs again
    AwaitKey,
}

/// Locks a mutex, carrying on with the data if another thread panicked while holding it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// clear
pub fn clr(state: &mut State, io: &Peripherals) {
    io.with_frame(FrameBuffer::clear);
    state.advance();
}

/// PC = STACK.pop()
pub fn rts(state: &mut State, io: &Peripherals) -> Result<()> {
    match state.pop() {
        Some(addr) => state.pc = addr,
        None => match io.quirks.underflow {
            Underflow::Fault => return Err(VmError::StackUnderflow { pc: state.pc }),
            Underflow::Ignore => state.advance(),
        },
    }
    Ok(())
}

/// PC = addr
pub fn jump(state: &mut State, addr: u16) {
    state.pc = addr;
}

/// STACK.push(PC + 2); PC = addr
pub fn call(state: &mut State, addr: u16) -> Result<()> {
    state.push(state.pc.wrapping_add(2))?;
    state.pc = addr;
    Ok(())
}

/// if Vx == kk then pc += 2
pub fn ske(state: &mut State, x: u8, kk: u8) {
    state.skip_if(state.v[x as usize] == kk);
}

/// if Vx != kk then pc += 2
pub fn skne(state: &mut State, x: u8, kk: u8) {
    state.skip_if(state.v[x as usize] != kk);
}

/// if Vx == Vy then pc += 2
pub fn skre(state: &mut State, x: u8, y: u8) {
    state.skip_if(state.v[x as usize] == state.v[y as usize]);
}

/// Vx = kk
pub fn load(state: &mut State, x: u8, kk: u8) {
    state.v[x as usize] = kk;
    state.advance();
}

/// Vx += kk
/// Add kk to Vx; allow for overflow but implicitly drop it
pub fn add(state: &mut State, x: u8, kk: u8) {
    state.v[x as usize] = state.v[x as usize].wrapping_add(kk);
    state.advance();
}

/// Vx = Vy
pub fn mv(state: &mut State, x: u8, y: u8) {
    state.v[x as usize] = state.v[y as usize];
    state.advance();
}

/// Vx |= Vy
pub fn or(state: &mut State, x: u8, y: u8) {
    state.v[x as usize] |= state.v[y as usize];
    state.advance();
}

/// Vx &= Vy
pub fn and(state: &mut State, x: u8, y: u8) {
    state.v[x as usize] &= state.v[y as usize];
    state.advance();
}

/// Vx ^= Vy
pub fn xor(state: &mut State, x: u8, y: u8) {
    state.v[x as usize] ^= state.v[y as usize];
    state.advance();
}

/// Vx += Vy; VF = overflow
pub fn addr(state: &mut State, x: u8, y: u8) {
    let (res, over) = state.v[x as usize].overflowing_add(state.v[y as usize]);
    state.v[x as usize] = res;
    state.set_flag(over as u8);
    state.advance();
}

/// Vx -= Vy; VF = Vx > Vy
pub fn sub(state: &mut State, x: u8, y: u8) {
    let (vx, vy) = (state.v[x as usize], state.v[y as usize]);
    state.v[x as usize] = vx.wrapping_sub(vy);
    state.set_flag((vx > vy) as u8);
    state.advance();
}

/// Vx >>= 1; VF = lsb
pub fn shr(state: &mut State, x: u8) {
    let vx = state.v[x as usize];
    state.v[x as usize] = vx >> 1;
    state.set_flag(vx & 0x1);
    state.advance();
}

/// Vx = Vy - Vx; VF = Vx < Vy
pub fn subn(state: &mut State, x: u8, y: u8) {
    let (vx, vy) = (state.v[x as usize], state.v[y as usize]);
    state.v[x as usize] = vy.wrapping_sub(vx);
    state.set_flag((vx < vy) as u8);
    state.advance();
}

/// Vx <<= 1; VF = msb
/// The flag is the masked bit itself (0x80) unless the quirk normalizes it to 1
pub fn shl(state: &mut State, io: &Peripherals, x: u8) {
    let vx = state.v[x as usize];
    let msb = vx & 0x80;
    state.v[x as usize] = vx << 1;
    state.set_flag(if io.quirks.normalize_shift_carry {
        (msb != 0) as u8
    } else {
        msb
    });
    state.advance();
}

/// if Vx != Vy then pc += 2
pub fn skrne(state: &mut State, x: u8, y: u8) {
    state.skip_if(state.v[x as usize] != state.v[y as usize]);
}

/// I = addr
pub fn loadi(state: &mut State, addr: u16) {
    state.i = addr;
    state.advance();
}

/// PC = V0 + addr
pub fn jumpi(state: &mut State, addr: u16) {
    state.pc = u16::from(state.v[0x0]) + addr;
}

/// Vx = rand_byte & kk
pub fn rand(state: &mut State, x: u8, kk: u8) {
    let rand_byte: u8 = rand::random();
    state.v[x as usize] = rand_byte & kk;
    state.advance();
}

/// draw_sprite(x=Vx y=Vy size=n)
/// XORs the sprite in memory I..I+n onto the FrameBuffer at Vx, Vy.
/// VF is 1 if any pixel was erased, otherwise 0.
pub fn draw(state: &mut State, io: &Peripherals, x: u8, y: u8, n: u8) -> Result<()> {
    let mut sprite = [0; 0xF];
    let rows = &mut sprite[..n as usize];
    rows.copy_from_slice(state.read(state.i as usize, n as usize)?);

    let (vx, vy) = (state.v[x as usize], state.v[y as usize]);
    let collision = io.with_frame(|frame| frame.draw_sprite(vx, vy, rows));

    state.set_flag(collision as u8);
    state.advance();
    Ok(())
}

/// if Vx.pressed then pc += 2
pub fn skpr(state: &mut State, io: &Peripherals, x: u8) -> Result<()> {
    let pressed = io.keypad.is_pressed(state.v[x as usize])?;
    state.skip_if(pressed);
    Ok(())
}

/// if !Vx.pressed then pc += 2
pub fn skup(state: &mut State, io: &Peripherals, x: u8) -> Result<()> {
    let pressed = io.keypad.is_pressed(state.v[x as usize])?;
    state.skip_if(!pressed);
    Ok(())
}

/// Vx = DT
pub fn moved(state: &mut State, x: u8) {
    state.v[x as usize] = state.delay_timer;
    state.advance();
}

/// await keypress for Vx
/// Consumes a pressed key if there is one; otherwise leaves the pc here so the wait is retried.
pub fn keyd(state: &mut State, io: &Peripherals, x: u8) -> Flow {
    match io.keypad.take_any() {
        Some(key) => {
            state.v[x as usize] = key;
            state.advance();
            Flow::Next
        }
        None => Flow::AwaitKey,
    }
}

/// DT = Vx
pub fn loads(state: &mut State, x: u8) {
    state.delay_timer = state.v[x as usize];
    state.advance();
}

/// ST = Vx
pub fn ld(state: &mut State, x: u8) {
    state.sound_timer = state.v[x as usize];
    state.advance();
}

/// I += Vx
pub fn addi(state: &mut State, x: u8) {
    state.i = state.i.wrapping_add(u16::from(state.v[x as usize]));
    state.advance();
}

/// I = Vx * 5
/// Set I to the memory address of the sprite for Vx
/// See constants::SPRITE_SHEET for more details
pub fn ldspr(state: &mut State, x: u8) {
    state.i = u16::from(state.v[x as usize]) * GLYPH_SIZE;
    state.advance();
}

/// mem[I..I+3] = bcd(Vx)
/// Store BCD repr of Vx in memory starting at address i
pub fn bcd(state: &mut State, x: u8) -> Result<()> {
    let vx = state.v[x as usize];
    let bcd = [vx / 100, vx / 10 % 10, vx % 10];
    state.write(state.i as usize, bcd.len())?.copy_from_slice(&bcd);
    state.advance();
    Ok(())
}

/// mem[I..=I+x] = V0..=Vx
pub fn stor(state: &mut State, x: u8) -> Result<()> {
    let len = x as usize + 1;
    let v = state.v;
    state
        .write(state.i as usize, len)?
        .copy_from_slice(&v[..len]);
    state.advance();
    Ok(())
}

/// V0..=Vx = mem[I..=I+x]
pub fn read(state: &mut State, x: u8) -> Result<()> {
    let len = x as usize + 1;
    let mut v = state.v;
    v[..len].copy_from_slice(state.read(state.i as usize, len)?);
    state.v = v;
    state.advance();
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FLAG;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn addr_carries_iff_sum_overflows(vx in any::<u8>(), vy in any::<u8>()) {
            let mut state = State::new();
            state.v[0x1] = vx;
            state.v[0x2] = vy;
            addr(&mut state, 0x1, 0x2);
            prop_assert_eq!(state.v[0x1], vx.wrapping_add(vy));
            prop_assert_eq!(state.v[FLAG] == 1, u16::from(vx) + u16::from(vy) > 0xFF);
        }

        #[test]
        fn sub_flags_have_opposite_polarity(vx in any::<u8>(), vy in any::<u8>()) {
            let mut state = State::new();
            state.v[0x1] = vx;
            state.v[0x2] = vy;
            sub(&mut state, 0x1, 0x2);
            prop_assert_eq!(state.v[0x1], vx.wrapping_sub(vy));
            prop_assert_eq!(state.v[FLAG], (vx > vy) as u8);

            state.v[0x1] = vx;
            subn(&mut state, 0x1, 0x2);
            prop_assert_eq!(state.v[0x1], vy.wrapping_sub(vx));
            prop_assert_eq!(state.v[FLAG], (vx < vy) as u8);
        }

        #[test]
        fn shifts_carry_the_lost_bit(vx in any::<u8>()) {
            let mut state = State::new();
            state.v[0x3] = vx;
            shr(&mut state, 0x3);
            prop_assert_eq!(state.v[0x3], vx >> 1);
            prop_assert_eq!(state.v[FLAG], vx & 0x1);
        }

        #[test]
        fn bcd_digits_recompose(vx in any::<u8>()) {
            let mut state = State::new();
            state.v[0x4] = vx;
            state.i = 0x400;
            bcd(&mut state, 0x4).unwrap();
            let digits = &state.memory[0x400..0x403];
            prop_assert!(digits.iter().all(|&d| d < 10));
            let value = u16::from(digits[0]) * 100 + u16::from(digits[1]) * 10 + u16::from(digits[2]);
            prop_assert_eq!(value, u16::from(vx));
        }

        #[test]
        fn stor_copies_exactly_x_plus_one_registers(x in 0u8..16) {
            let mut state = State::new();
            for (n, v) in state.v.iter_mut().enumerate() {
                *v = n as u8 + 1;
            }
            state.i = 0x300;
            stor(&mut state, x).unwrap();
            let len = x as usize + 1;
            prop_assert_eq!(&state.memory[0x300..0x300 + len], &state.v[..len]);
            prop_assert!(state.memory[0x300 + len..0x310].iter().all(|&b| b == 0));
        }
    }
}
