use sdl2::keyboard::Keycode;

/// # Keymap
/// Chip-8 input is generated with a hexadecimal keypad.
///
/// Keys 0..F are laid out in order over the left 4 alphanumeric columns.
/// ```text
/// |1|2|3|4|      |0|1|2|3|
/// |Q|W|E|R|  ->  |4|5|6|7|
/// |A|S|D|F|  ->  |8|9|A|B|
/// |Z|X|C|V|      |C|D|E|F|
/// ```
pub fn keymap(key: Keycode) -> Option<u8> {
    match key {
        Keycode::Num1 => Some(0x0),
        Keycode::Num2 => Some(0x1),
        Keycode::Num3 => Some(0x2),
        Keycode::Num4 => Some(0x3),
        Keycode::Q => Some(0x4),
        Keycode::W => Some(0x5),
        Keycode::E => Some(0x6),
        Keycode::R => Some(0x7),
        Keycode::A => Some(0x8),
        Keycode::S => Some(0x9),
        Keycode::D => Some(0xA),
        Keycode::F => Some(0xB),
        Keycode::Z => Some(0xC),
        Keycode::X => Some(0xD),
        Keycode::C => Some(0xE),
        Keycode::V => Some(0xF),
        _ => None,
    }
}
