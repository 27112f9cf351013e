/// Map a named key plus modifiers to the escape sequence a VT-style
/// terminal expects. Unknown combinations map to an empty string, which
/// callers treat as a no-op.
pub fn map_special_key(key: &str, modifiers: &[String]) -> &'static str {
    let key = key.to_ascii_lowercase();
    let ctrl = modifiers.iter().any(|m| m.eq_ignore_ascii_case("ctrl"));
    let shift = modifiers.iter().any(|m| m.eq_ignore_ascii_case("shift"));

    if ctrl {
        match key.as_str() {
            "arrowup" => return "\x1b[1;5A",
            "arrowdown" => return "\x1b[1;5B",
            "arrowright" => return "\x1b[1;5C",
            "arrowleft" => return "\x1b[1;5D",
            _ => {}
        }
    }

    if shift && key == "tab" {
        return "\x1b[Z";
    }

    match key.as_str() {
        "arrowup" => "\x1b[A",
        "arrowdown" => "\x1b[B",
        "arrowright" => "\x1b[C",
        "arrowleft" => "\x1b[D",
        "enter" => "\r",
        "escape" => "\x1b",
        "tab" => "\t",
        "backspace" => "\x7f",
        "delete" => "\x1b[3~",
        "home" => "\x1b[H",
        "end" => "\x1b[F",
        "pageup" => "\x1b[5~",
        "pagedown" => "\x1b[6~",
        "f1" => "\x1bOP",
        "f2" => "\x1bOQ",
        "f3" => "\x1bOR",
        "f4" => "\x1bOS",
        "f5" => "\x1b[15~",
        "f6" => "\x1b[17~",
        "f7" => "\x1b[18~",
        "f8" => "\x1b[19~",
        "f9" => "\x1b[20~",
        "f10" => "\x1b[21~",
        "f11" => "\x1b[23~",
        "f12" => "\x1b[24~",
        _ => "",
    }
}
